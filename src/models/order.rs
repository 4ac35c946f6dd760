use crate::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    StopLossLimit,
    LimitMaker,
    Stop,
    StopMarket,
    #[serde(other)]
    Other,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::StopLossLimit => "STOP_LOSS_LIMIT",
            OrderType::LimitMaker => "LIMIT_MAKER",
            OrderType::Stop => "STOP",
            OrderType::StopMarket => "STOP_MARKET",
            OrderType::Other => "OTHER",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    PendingCancel,
    Rejected,
    Expired,
    #[serde(other)]
    Other,
}

impl OrderStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }
}

/// Acknowledgement of a spot order submission.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: u64,
    #[serde(default = "default_order_list_id")]
    pub order_list_id: i64,
    #[serde(default, with = "crate::serde_helpers::string_to_float_optional")]
    pub executed_qty: Option<f64>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

fn default_order_list_id() -> i64 {
    -1
}

/// One live order as listed by the open-orders endpoint. `order_list_id` is
/// `-1` for plain orders and shared across the two children of an OCO.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    pub order_id: u64,
    pub order_list_id: i64,
    #[serde(rename = "symbol")]
    pub internal_symbol: String,
    #[serde(with = "crate::serde_helpers::string_to_float")]
    pub price: f64,
    #[serde(rename = "origQty", with = "crate::serde_helpers::string_to_float")]
    pub original_quantity: f64,
    #[serde(rename = "executedQty", with = "crate::serde_helpers::string_to_float")]
    pub executed_quantity: f64,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub side: Side,
    /// Creation time, milliseconds on the wire; exposed in seconds via
    /// [`OpenOrder::created_secs`].
    pub time: i64,
}

impl OpenOrder {
    pub fn created_secs(&self) -> i64 {
        self.time / 1000
    }
}

/// Status/fill answer of the single-order query endpoint.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStat {
    pub status: OrderStatus,
    #[serde(rename = "executedQty", with = "crate::serde_helpers::string_to_float")]
    pub executed_quantity: f64,
}

/// OCO submission acknowledgement: the list id plus one report per child.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcoAck {
    pub order_list_id: i64,
    #[serde(default)]
    pub order_reports: Vec<OrderReport>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReport {
    pub order_id: u64,
    #[serde(rename = "type")]
    pub order_type: OrderType,
}

/// The two child ids of a live OCO, classified by type. Zero ids mean the
/// order has not been placed yet; the books rely on that sentinel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OcoOrder {
    pub order_list_id: i64,
    pub limit_order_id: u64,
    pub stop_order_id: u64,
}

impl OcoOrder {
    pub fn is_placed(&self) -> bool {
        self.order_list_id != 0
    }
}

impl TryFrom<&OcoAck> for OcoOrder {
    type Error = BinanceError;

    fn try_from(ack: &OcoAck) -> Result<OcoOrder> {
        let mut oco = OcoOrder {
            order_list_id: ack.order_list_id,
            ..OcoOrder::default()
        };
        for report in &ack.order_reports {
            match report.order_type {
                OrderType::StopLossLimit => oco.stop_order_id = report.order_id,
                OrderType::LimitMaker => oco.limit_order_id = report.order_id,
                other => {
                    return Err(BinanceError::Unexpected(format!(
                        "uncaught OCO child order type: {other:?}"
                    )))
                }
            }
        }
        Ok(oco)
    }
}

/// Which classes of open orders a cancel-all sweep touches.
#[derive(Clone, Copy, Debug)]
pub struct CancelSpec {
    pub normal: bool,
    pub oco: bool,
}

impl CancelSpec {
    pub const ALL: CancelSpec = CancelSpec {
        normal: true,
        oco: true,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_order_deserializes() {
        let raw = r#"{
            "symbol": "LTCBTC",
            "orderId": 1,
            "orderListId": -1,
            "clientOrderId": "myOrder1",
            "price": "0.1",
            "origQty": "1.0",
            "executedQty": "0.25",
            "status": "PARTIALLY_FILLED",
            "type": "LIMIT",
            "side": "BUY",
            "time": 1499827319559
        }"#;
        let order: OpenOrder = serde_json::from_str(raw).unwrap();
        assert_eq!(order.order_id, 1);
        assert_eq!(order.order_list_id, -1);
        assert_eq!(order.price, 0.1);
        assert_eq!(order.original_quantity, 1.0);
        assert_eq!(order.executed_quantity, 0.25);
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.created_secs(), 1499827319);
    }

    #[test]
    fn oco_children_classify_by_type() {
        let raw = r#"{
            "orderListId": 55,
            "orderReports": [
                {"orderId": 10, "type": "STOP_LOSS_LIMIT"},
                {"orderId": 11, "type": "LIMIT_MAKER"}
            ]
        }"#;
        let ack: OcoAck = serde_json::from_str(raw).unwrap();
        let oco = OcoOrder::try_from(&ack).unwrap();
        assert_eq!(oco.order_list_id, 55);
        assert_eq!(oco.stop_order_id, 10);
        assert_eq!(oco.limit_order_id, 11);
        assert!(oco.is_placed());
    }

    #[test]
    fn unexpected_child_type_is_an_error() {
        let ack = OcoAck {
            order_list_id: 1,
            order_reports: vec![OrderReport {
                order_id: 7,
                order_type: OrderType::Market,
            }],
        };
        assert!(OcoOrder::try_from(&ack).is_err());
    }
}
