//! Runtime configuration read from the environment.
//!
//! # Environment Variables
//!
//! - `TIMESTAMP_HOST` — bind address (default: `0.0.0.0`)
//! - `PORT` — HTTP port (default: 10000)
//! - `EXIT_AFTER_DEMO` — exit once the demo round-trip has printed (default: off)

use std::net::SocketAddr;

use thiserror::Error;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 10000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid PORT value: {0}")]
    InvalidPort(String),
}

/// Settings for the service binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Interface the HTTP listener binds to.
    pub host: String,
    /// HTTP port. `0` asks the OS for a free one.
    pub port: u16,
    /// Stop after printing the demo value instead of serving until Ctrl-C.
    pub exit_after_demo: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            exit_after_demo: false,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = lookup("TIMESTAMP_HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(defaults.host);

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => defaults.port,
        };

        let exit_after_demo = lookup("EXIT_AFTER_DEMO")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.exit_after_demo);

        Ok(Self {
            host,
            port,
            exit_after_demo,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL the in-process demo client uses to reach the server bound at `bound`.
    ///
    /// A wildcard bind is reached through `localhost`; any other address is
    /// used as-is.
    pub fn client_base_url(&self, bound: SocketAddr) -> String {
        if bound.ip().is_unspecified() {
            format!("http://localhost:{}", bound.port())
        } else {
            format!("http://{}", bound)
        }
    }
}
