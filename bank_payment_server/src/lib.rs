//! # Bank payment gateway server
//! This crate hosts the HTTP side of the bank payment gateway. It is responsible for:
//! * Receiving bank transfer notifications from the supported payment providers (SePay and Casso), checking their
//!   credentials and normalising their payloads into payment events.
//! * Handing each event to the reconciliation engine, which matches it to an order and marks the order as paid.
//! * Pushing order status changes to clients that are waiting on a checkout page, over Server-Sent Events.
//! * Cancelling orders that stay unpaid for too long.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/{provider}`: Bank transfer notifications. `provider` is `sepay` or `casso`.
//! * `/orders/{order_id}`: The current status of an order.
//! * `/realtime/orders`: An SSE stream of order updates. Pass `orderId` to follow an order immediately.
//! * `/realtime/connections/{connection_id}/orders/{order_id}`: `POST` to follow another order on an open stream,
//!   `DELETE` to stop following it.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod providers;
pub mod realtime;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
