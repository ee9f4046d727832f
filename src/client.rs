//! HTTP client for the timestamp service.
//!
//! Used by the binary to run the demonstration round-trip against its own
//! server: store a timestamp, then read it back. Every request is sent as
//! `text/plain`. Failures are returned as-is; nothing is retried.

use std::io::Write;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use thiserror::Error;

use crate::timestamp::{self, DecodeError, Timestamp};

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection, send, or receive failure.
    #[error("Error when calling REST endpoint: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Unexpected HTTP response code {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The server's answer did not carry a valid timestamp.
    #[error("Unable to parse response: {0}")]
    Decode(#[from] DecodeError),

    /// The fetched value could not be written out.
    #[error("Unable to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// Client bound to one service base URL, e.g. `http://localhost:10000`.
#[derive(Debug, Clone)]
pub struct TimestampClient {
    base_url: String,
    client: reqwest::Client,
}

impl TimestampClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/timestamp", self.base_url)
    }

    /// Store `value`. Returns the acknowledgement body.
    pub async fn set(&self, value: Timestamp) -> Result<String, ClientError> {
        tracing::debug!("Set new timestamp via REST call");
        self.post_body(timestamp::encode(value)).await
    }

    /// Store an arbitrary literal in the `timestamp` field, valid or not.
    pub async fn set_raw(&self, literal: &str) -> Result<String, ClientError> {
        self.post_body(format!("{{\"timestamp\" : {}}}", literal)).await
    }

    async fn post_body(&self, body: String) -> Result<String, ClientError> {
        tracing::debug!("Body: {}", body);
        let response = self
            .client
            .post(self.endpoint())
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Error when calling REST endpoint. Error: {}", e);
                ClientError::from(e)
            })?;

        let status = response.status();
        let text = response.text().await?;
        tracing::debug!("Response: {}", text);

        if !status.is_success() {
            tracing::error!(
                "Unexpected HTTP response code. Status code: {}. Message: {}",
                status,
                text
            );
            return Err(ClientError::Status { status, body: text });
        }
        Ok(text)
    }

    /// Fetch the stored value.
    pub async fn get(&self) -> Result<Timestamp, ClientError> {
        tracing::debug!("Get timestamp back via REST call");
        let response = self
            .client
            .get(self.endpoint())
            .header(CONTENT_TYPE, "text/plain")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Error when calling REST endpoint. Error: {}", e);
                ClientError::from(e)
            })?;

        let status = response.status();
        let text = response.text().await?;
        tracing::debug!("Response: {}", text);

        if !status.is_success() {
            return Err(ClientError::Status { status, body: text });
        }

        timestamp::decode(text.as_bytes()).map_err(|e| {
            tracing::error!("Unable to parse request response as a json value. Error: {}", e);
            ClientError::from(e)
        })
    }
}

/// Store `value` through the service, read it back, and write the fetched
/// value to `out` as a single line.
pub async fn run_demo(
    client: &TimestampClient,
    value: Timestamp,
    out: &mut impl Write,
) -> Result<Timestamp, ClientError> {
    client.set(value).await?;
    let fetched = client.get().await?;
    writeln!(out, "{}", fetched)?;
    out.flush()?;
    Ok(fetched)
}
