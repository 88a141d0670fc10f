//! HTTP client wrapper shared by catalog queries and media transfers.
//!
//! One `reqwest::Client` is built per run. It carries a connect timeout but
//! no total timeout, since media files are large; stalls are caught by the
//! engine's per-read idle timeout instead.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT_ENCODING, RANGE};
use tracing::{debug, instrument};
use url::Url;

use super::constants::CONNECT_TIMEOUT_SECS;
use super::error::TransferError;
use crate::user_agent;

/// HTTP client for catalog queries and ranged media downloads.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    api_key: Option<String>,
}

impl HttpClient {
    /// Creates a client with the default connect timeout.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
    }

    /// Creates a client with an explicit connect timeout.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialized.
    #[instrument(level = "debug")]
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self {
            client,
            api_key: None,
        })
    }

    /// Appends `api_key=<key>` to every media request.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Returns the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Builds the request URL for a media source, adding credentials.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidUrl`] if `source_url` does not parse.
    pub fn media_url(&self, source_url: &str) -> Result<Url, TransferError> {
        let mut url =
            Url::parse(source_url).map_err(|_| TransferError::invalid_url(source_url))?;
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("api_key", key);
        }
        Ok(url)
    }

    /// Sends a GET for `source_url`, starting at `offset` when non-zero.
    ///
    /// Success statuses (including 206) and 416 are returned to the caller;
    /// every other status becomes [`TransferError::HttpStatus`].
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] for invalid URLs, network failures and error statuses.
    pub async fn get_from(
        &self,
        source_url: &str,
        offset: u64,
        idle_secs: u64,
    ) -> Result<reqwest::Response, TransferError> {
        let url = self.media_url(source_url)?;
        // Byte offsets must refer to the stored representation, not a decoded one.
        let mut request = self.client.get(url).header(ACCEPT_ENCODING, "identity");
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransferError::network(source_url, e, idle_secs))?;

        let status = response.status();
        debug!(status = status.as_u16(), offset, "media response received");
        if status.is_success() || status == reqwest::StatusCode::RANGE_NOT_SATISFIABLE {
            Ok(response)
        } else {
            Err(TransferError::http_status(source_url, status.as_u16()))
        }
    }
}
