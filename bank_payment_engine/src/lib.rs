//! Bank Payment Engine
//!
//! The engine reconciles bank transfer notifications against storefront orders. Payment providers tell us that money
//! arrived, with whatever memo the customer typed. The engine finds the order referenced in the memo and marks it paid
//! exactly once, no matter how often or how concurrently the provider redelivers the notification.
//!
//! The library is divided into these sections:
//! 1. Order storage ([`mod@db`]). The [`OrderStore`] trait is the only thing the engine needs from a backend. SQLite
//!    and in-memory backends are provided. The data types stored there are defined in [`mod@db_types`].
//! 2. The public API ([`mod@bpe_api`]). [`ReconciliationApi`] applies payments, [`ExpiryApi`] cancels orders that were
//!    never paid.
//! 3. Events ([`mod@events`]). Hooks that fire after a payment is applied or an order expires, and a transport-agnostic
//!    [`NotificationHub`](events::NotificationHub) that fans messages out to connected clients by topic.
//!
//! Memo parsing lives in [`mod@helpers`].
pub mod bpe_api;
pub mod db;
pub mod db_types;
pub mod events;
pub mod helpers;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::{
    memory::{MemoryOrderStore, MemoryStoreError},
    traits::OrderStore,
};
pub use bpe_api::{ExpiryApi, ExpiryResult, ReconcileOutcome, ReconciliationApi, ReconciliationError};
