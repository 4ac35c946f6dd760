mod balance;
mod kline;
mod market_info;
mod order;
mod orderbook;
mod perp;
mod symbol;
mod ticker;

pub use balance::*;
pub use kline::*;
pub use market_info::*;
pub use order::*;
pub use orderbook::*;
pub use perp::*;
pub use symbol::*;
pub use ticker::*;
