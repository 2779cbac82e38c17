//! HTTP client for the external bulk-dispatch API
//!
//! The API is a single GET parameterized by an API key, a target address, a
//! mode, and a quantity. It answers with a JSON payload carrying an optional
//! `error` field; a present `error` is a structured failure and is treated
//! exactly like a transport failure by the coordinator (full refund). At most
//! one attempt is made per user action - no retries, no idempotency key.

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::config;
use crate::core::error::{AppError, AppResult};

/// Seam between the coordinator and the external API.
///
/// Production uses [`HttpDispatcher`]; tests script outcomes with a fake.
#[async_trait]
pub trait BulkDispatcher: Send + Sync {
    /// Performs one bulk-dispatch call for `quantity` units to `target`.
    ///
    /// `Ok(())` means the remote side acknowledged the batch; any `Err` means
    /// the caller must refund the reservation.
    async fn dispatch(&self, target: &str, quantity: i64) -> AppResult<()>;
}

/// Response payload of the dispatch API.
#[derive(Debug, Deserialize)]
struct DispatchResponse {
    /// Present iff the remote side rejected the batch
    error: Option<String>,
    /// Optional human-readable status line, logged verbatim
    status: Option<String>,
}

/// Production dispatcher backed by reqwest.
pub struct HttpDispatcher {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    mode: String,
}

impl HttpDispatcher {
    /// Builds the dispatcher from the process configuration.
    ///
    /// The request timeout bounds how long a reservation stays pending; a
    /// timeout surfaces as `ExternalCall` and is refunded like any failure.
    pub fn from_config() -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config::network::timeout())
            .build()?;
        Ok(Self {
            client,
            api_url: config::DISPATCH_API_URL.clone(),
            api_key: config::DISPATCH_API_KEY.clone(),
            mode: config::DISPATCH_MODE.clone(),
        })
    }

    /// Constructor with explicit endpoints (used by tests).
    pub fn new(api_url: String, api_key: String, mode: String) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config::network::timeout())
            .build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
            mode,
        })
    }
}

#[async_trait]
impl BulkDispatcher for HttpDispatcher {
    async fn dispatch(&self, target: &str, quantity: i64) -> AppResult<()> {
        if self.api_url.is_empty() {
            return Err(AppError::ExternalCall("DISPATCH_API_URL not configured".to_string()));
        }

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("target", target),
                ("mode", self.mode.as_str()),
                ("quantity", &quantity.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::ExternalCall(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ExternalCall(format!("HTTP status {}", status)));
        }

        let payload: DispatchResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalCall(format!("malformed response: {}", e)))?;

        if let Some(error) = payload.error {
            return Err(AppError::ExternalCall(error));
        }
        if let Some(status_line) = payload.status {
            log::debug!("Dispatch API status: {}", status_line);
        }
        Ok(())
    }
}
