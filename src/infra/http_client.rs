//! Outbound HTTP client factory.
//!
//! Stripe and Gemini calls go through clients built here so every request
//! is bounded by the same timeouts. A timed-out ledger call surfaces as
//! `LedgerUnavailable` instead of hanging a request or webhook.

use reqwest::Client;
use std::time::Duration;

use super::InfraError;

/// TCP handshake + TLS.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request/response time for ledger calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Generation can take a while on long resumes.
pub const ANALYSIS_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

pub fn build_client() -> Result<Client, InfraError> {
    build_client_with_timeout(DEFAULT_REQUEST_TIMEOUT)
}

pub fn build_client_with_timeout(timeout: Duration) -> Result<Client, InfraError> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
        .map_err(InfraError::HttpClient)
}
