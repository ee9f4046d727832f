//! # timestamp-service
//!
//! A small HTTP service that stores one Unix timestamp in memory and lets
//! any number of concurrent callers read or replace it.
//!
//! The value lives in a [`GuardedCell`], which serializes access with a
//! capacity-1 channel permit instead of a lock. The [`server`] module maps
//! `GET`/`POST /timestamp` onto the cell, and [`client`] is the matching
//! HTTP client the binary uses to call its own server once at startup.

pub mod cell;
pub mod client;
pub mod config;
pub mod server;
pub mod timestamp;

pub use cell::{GuardedCell, PermitState};
pub use client::{run_demo, ClientError, TimestampClient};
pub use config::{ConfigError, ServiceConfig};
pub use server::{app_router, AppState, ServiceError};
pub use timestamp::{DecodeError, Timestamp};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
