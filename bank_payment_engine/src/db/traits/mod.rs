//! # Order store contract
//!
//! The reconciliation core never owns orders. They belong to the storefront's order management, and this crate only
//! reads them and conditionally mutates their status and payment fields. [`OrderStore`] is the narrow interface that a
//! storage backend must expose for that to work.
//!
//! Every mutation is a compare-and-set on the order's status. This is the only serialisation point between concurrent
//! webhook deliveries and the stale-order sweep, so unrelated orders never contend with each other.
mod order_store;

pub use order_store::OrderStore;
