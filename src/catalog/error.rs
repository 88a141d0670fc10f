//! Error types for remote catalog queries.

use thiserror::Error;

/// Errors from querying the remote catalog. All of them abort the run.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The remote answered with a failure; the message is the remote's own.
    #[error("remote catalog query failed: {message}")]
    RemoteQuery {
        /// HTTP status of the response (200 when the payload carried the failure).
        status: u16,
        /// Error text supplied by the remote, verbatim.
        message: String,
    },

    /// Network-level error (DNS, connection refused, TLS).
    #[error("network error querying {url}: {source}")]
    Network {
        /// Endpoint that was queried (without credentials).
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The query did not complete in time.
    #[error("timeout querying {url}")]
    Timeout {
        /// Endpoint that was queried (without credentials).
        url: String,
    },

    /// The response body was not the expected JSON document.
    #[error("malformed catalog response from {url}: {reason}")]
    Decode {
        /// Endpoint that was queried (without credentials).
        url: String,
        /// Decoder message.
        reason: String,
    },

    /// The configured API base URL cannot be parsed.
    #[error("invalid catalog base URL: {url}")]
    InvalidBaseUrl {
        /// The rejected value.
        url: String,
    },
}

impl CatalogError {
    /// Creates a remote-reported failure.
    pub fn remote_query(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteQuery {
            status,
            message: message.into(),
        }
    }

    /// Creates a network or timeout error from a reqwest error.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network {
                url,
                source: source.without_url(),
            }
        }
    }
}
