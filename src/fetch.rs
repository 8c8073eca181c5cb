//! Single-attempt HTTP retrieval.
//!
//! Retry policy deliberately lives in [`crate::cache`]; each method
//! here performs exactly one request and maps every reqwest failure to
//! [`FetchError::Transient`] so the cache can apply its bounded retry
//! loop uniformly.

use crate::cache::FetchError;
use bytes::Bytes;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("vremko/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for all remote products.
#[derive(Clone)]
pub struct Fetcher {
    http: reqwest::Client,
}

impl Fetcher {
    /// Builds the client with a request timeout and a user agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http })
    }

    /// Fetches a page body as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transient`] for connect, timeout, status
    /// or body-read failures.
    pub async fn text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.http.get(url).send().await.map_err(transient)?;
        let response = response.error_for_status().map_err(transient)?;
        response.text().await.map_err(transient)
    }

    /// Fetches a page body as text with URL-encoded query parameters.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Fetcher::text`].
    pub async fn text_query(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<String, FetchError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(transient)?;
        let response = response.error_for_status().map_err(transient)?;
        response.text().await.map_err(transient)
    }

    /// Fetches a binary payload.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Fetcher::text`].
    pub async fn bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self.http.get(url).send().await.map_err(transient)?;
        let response = response.error_for_status().map_err(transient)?;
        response.bytes().await.map_err(transient)
    }
}

fn transient(err: reqwest::Error) -> FetchError {
    FetchError::Transient(err.to_string())
}
