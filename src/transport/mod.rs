//! The `transport` module is the HTTP surface of the server.
//!
//! - `http`: the router, the ingestion endpoint and the server entry point.
//! - `sse`: the streaming endpoint that exposes a notifier subscription as a
//!   `text/event-stream` response.

pub mod http;
pub mod sse;

pub use http::{AppState, create_router, start_http_server};
