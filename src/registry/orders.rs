//! Order registry — work-order lifecycle gated on photographic evidence.
//!
//! Status is monotonic (`Active` → `Completed`); end evidence can only be
//! attached once start evidence is present, and a completed order accepts
//! no further changes. Ids are assigned monotonically and never reused.

use std::sync::Arc;

use crate::error::OrderError;
use crate::model::{Identity, Order, OrderStatus};
use crate::store::Storage;

/// Work orders, backed by [`Storage`].
pub struct OrderRegistry {
    store: Arc<dyn Storage>,
}

impl OrderRegistry {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    /// Create a new active order for `owner`. The id is max existing + 1,
    /// or 1 for an empty registry.
    pub async fn create(&self, owner: Identity) -> Result<Order, OrderError> {
        let mut orders = self.store.load_orders().await?;
        let id = orders.iter().map(|o| o.id).max().unwrap_or(0) + 1;
        let order = Order::new(id, owner);
        orders.push(order.clone());
        self.store.save_orders(&orders).await?;
        tracing::info!(order = id, owner, "Order created");
        Ok(order)
    }

    /// All orders belonging to `owner`.
    pub async fn list_by_owner(&self, owner: Identity) -> Result<Vec<Order>, OrderError> {
        let orders = self.store.load_orders().await?;
        Ok(orders.into_iter().filter(|o| o.owner == owner).collect())
    }

    /// Look up an order that must belong to `owner`. A wrong owner is
    /// indistinguishable from a missing order.
    pub async fn get_owned(&self, id: i64, owner: Identity) -> Result<Order, OrderError> {
        let orders = self.store.load_orders().await?;
        orders
            .into_iter()
            .find(|o| o.id == id && o.owner == owner)
            .ok_or(OrderError::NotFound(id))
    }

    /// Attach start-of-work evidence. The order stays `Active`.
    pub async fn attach_start_evidence(
        &self,
        id: i64,
        owner: Identity,
        token: String,
    ) -> Result<Order, OrderError> {
        self.mutate_owned(id, owner, |order| {
            if order.status == OrderStatus::Completed {
                return Err(OrderError::Completed(id));
            }
            if order.start_evidence.is_some() {
                return Err(OrderError::AlreadyStarted(id));
            }
            order.start_evidence = Some(token);
            Ok(())
        })
        .await
    }

    /// Attach end-of-work evidence and flip the order to `Completed`.
    /// Requires start evidence to be present already.
    pub async fn attach_finish_evidence(
        &self,
        id: i64,
        owner: Identity,
        token: String,
    ) -> Result<Order, OrderError> {
        self.mutate_owned(id, owner, |order| {
            if order.status == OrderStatus::Completed || order.end_evidence.is_some() {
                return Err(OrderError::Completed(id));
            }
            if order.start_evidence.is_none() {
                return Err(OrderError::NotStarted(id));
            }
            order.end_evidence = Some(token);
            order.status = OrderStatus::Completed;
            Ok(())
        })
        .await
    }

    /// Full read-modify-write on one owned order. The whole collection is
    /// rewritten only after the mutation succeeds, so a rejected
    /// transition leaves the persisted state untouched.
    async fn mutate_owned<F>(
        &self,
        id: i64,
        owner: Identity,
        mutate: F,
    ) -> Result<Order, OrderError>
    where
        F: FnOnce(&mut Order) -> Result<(), OrderError>,
    {
        let mut orders = self.store.load_orders().await?;
        let order = orders
            .iter_mut()
            .find(|o| o.id == id && o.owner == owner)
            .ok_or(OrderError::NotFound(id))?;
        mutate(order)?;
        let updated = order.clone();
        self.store.save_orders(&orders).await?;
        Ok(updated)
    }
}
