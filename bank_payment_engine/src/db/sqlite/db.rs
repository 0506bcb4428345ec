use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::{new_pool, orders, SqliteDatabaseError};
use crate::{
    db::traits::OrderStore,
    db_types::{CompareAndSetResult, NewOrder, Order, OrderId, OrderStatusType, PaymentFields},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Stores a new order. This is the checkout flow's entry point into the store; reconciliation never calls it.
    pub async fn insert_order(&self, order: NewOrder) -> Result<Order, SqliteDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(order, &mut conn).await
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) -> Result<(), SqliteDatabaseError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderStore for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn fetch_order_by_matched_id(&self, id: OrderId) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_id(id, &mut conn).await
    }

    async fn compare_and_set_paid(
        &self,
        id: OrderId,
        expected: OrderStatusType,
        payment: PaymentFields,
    ) -> Result<CompareAndSetResult, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::compare_and_set_paid(id, expected, payment, &mut conn).await
    }

    async fn compare_and_set_cancelled(
        &self,
        id: OrderId,
        expected: OrderStatusType,
    ) -> Result<CompareAndSetResult, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::compare_and_set_cancelled(id, expected, &mut conn).await
    }

    async fn list_pending_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_pending_created_before(cutoff, &mut conn).await
    }
}
