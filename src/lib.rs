mod account;
mod api;
mod client;
mod config;
mod control;
mod credentials;
mod errors;
mod exchange;
mod futures;
mod logger;
mod market;
mod models;
mod notifier;
mod pivot;
mod retry;
mod runtime;
mod serde_helpers;
mod strategy;
mod telemetry;
mod trade;
mod util;

pub mod prelude {

    pub use crate::account::*;
    pub use crate::api::*;
    pub use crate::client::*;
    pub use crate::config::*;
    pub use crate::control::*;
    pub use crate::credentials::*;
    pub use crate::errors::*;
    pub use crate::exchange::*;
    pub use crate::futures::*;
    pub use crate::logger::*;
    pub use crate::market::*;
    pub use crate::models::*;
    pub use crate::notifier::*;
    pub use crate::pivot::*;
    pub use crate::retry::*;
    pub use crate::runtime::*;
    pub use crate::serde_helpers::*;
    pub use crate::strategy::*;
    pub use crate::telemetry::*;
    pub use crate::trade::*;
    pub use crate::util::*;

    pub(crate) use hex::encode as hex_encode;
    pub(crate) use hmac::{Hmac, Mac};
    pub(crate) use log::{error, info, warn};
    pub(crate) use reqwest::{
        header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT},
        Client as ReqwestClient, Response as ReqwestResponse, StatusCode,
    };
    pub(crate) use serde::de::DeserializeOwned;
    pub(crate) use serde::{Deserialize, Deserializer, Serialize, Serializer};
    pub(crate) use serde_json::Value;
    pub(crate) use sha2::Sha256;
    pub(crate) use std::collections::{BTreeMap, HashMap};
    pub(crate) use std::str::FromStr;
    pub(crate) use thiserror::Error;
}

pub use prelude::*;
