//! Gateway: HTTP server for the platform webhook.
//!
//! `GET /webhook` answers the subscription handshake, `POST /webhook` runs deliveries through
//! the dispatcher and always acknowledges, `GET /` is a health probe.

mod server;

pub use server::{router, run_gateway, GatewayState};
