//! HTTP facade over the guarded timestamp cell.
//!
//! # Endpoints
//!
//! - `GET  /timestamp` — Fetch the stored value as `{"timestamp":N}`
//! - `POST /timestamp` — Store a new value sent as `{"timestamp":N}`
//!
//! Both directions use `text/plain` only.

pub mod routes;

pub use routes::{app_router, serve, AppState, ServiceError};
