//! # Bank payment engine public API
//!
//! * [`reconciliation_api`] applies normalised bank transfer notifications to orders, exactly once per order.
//! * [`expiry_api`] cancels orders that were never paid.
//!
//! Both APIs are created by supplying a backend that implements [`OrderStore`](crate::db::traits::OrderStore), plus
//! the event producers that should hear about state changes.
//!
//! ```rust,ignore
//! use bank_payment_engine::{events::EventProducers, ReconciliationApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/bank_payments.db", 5).await?;
//! let api = ReconciliationApi::new(db, EventProducers::default());
//! let outcome = api.apply_payment(&event).await?;
//! ```

pub mod errors;
pub mod expiry_api;
pub mod reconciliation_api;

pub use errors::ReconciliationError;
pub use expiry_api::{ExpiryApi, ExpiryResult};
pub use reconciliation_api::{ReconcileOutcome, ReconciliationApi, UNMATCHED_LOG_TARGET};
