use crate::api::{Spot, API};
use crate::client::Client;
use crate::errors::Result;
use crate::models::{AccountInfo, Balance, OpenOrder, OrderStat, Symbol};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Signed account surface: balances, open orders, order status.
///
/// The open-order list is cached like the market data: strategies refresh it
/// once at the top of a reconciliation pass and then read with
/// `data_update = false`.
#[derive(Clone)]
pub struct AccountManager {
    pub client: Client,
    pub recv_window: u64,
    open_order_data: Arc<RwLock<Vec<OpenOrder>>>,
}

impl AccountManager {
    pub(crate) fn from_client(client: Client, recv_window: u64) -> Self {
        AccountManager {
            client,
            recv_window,
            open_order_data: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn get_balances(&self) -> Result<HashMap<String, Balance>> {
        let account: AccountInfo = self
            .client
            .get_signed(API::Spot(Spot::Account), self.recv_window, BTreeMap::new())
            .await?;
        Ok(account
            .balances
            .iter()
            .map(|balance| (balance.asset.clone(), Balance::from(balance)))
            .collect())
    }

    /// Balance triple for one asset; zero when the asset is not held.
    pub async fn get_balance(&self, asset: &str) -> Result<Balance> {
        Ok(self
            .get_balances()
            .await?
            .remove(asset)
            .unwrap_or_default())
    }

    /// All live orders across symbols.
    pub async fn get_open_orders(&self) -> Result<Vec<OpenOrder>> {
        self.client
            .get_signed(
                API::Spot(Spot::OpenOrders),
                self.recv_window,
                BTreeMap::new(),
            )
            .await
    }

    pub async fn update_open_order_data(&self) -> Result<()> {
        let open_orders = self.get_open_orders().await?;
        *self
            .open_order_data
            .write()
            .expect("open-order cache poisoned") = open_orders;
        Ok(())
    }

    pub fn open_order_snapshot(&self) -> Vec<OpenOrder> {
        self.open_order_data
            .read()
            .expect("open-order cache poisoned")
            .clone()
    }

    /// Looks up one live order by id; `None` when it is no longer open.
    pub async fn get_open_order_info(
        &self,
        order_id: u64,
        data_update: bool,
    ) -> Result<Option<OpenOrder>> {
        if data_update {
            self.update_open_order_data().await?;
        }
        Ok(self
            .open_order_data
            .read()
            .expect("open-order cache poisoned")
            .iter()
            .find(|order| order.order_id == order_id)
            .cloned())
    }

    /// Status and cumulative fill of any order, open or done.
    pub async fn get_order_stat(&self, order_id: u64, symbol: &Symbol) -> Result<OrderStat> {
        let mut parameters: BTreeMap<String, String> = BTreeMap::new();
        parameters.insert("symbol".into(), symbol.flat());
        parameters.insert("orderId".into(), order_id.to_string());
        self.client
            .get_signed(API::Spot(Spot::Order), self.recv_window, parameters)
            .await
    }
}
