//! HTTP client for the remote videos endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::CatalogError;
use super::{CandidateUrls, CatalogEntry, format_publish_date, parse_publish_date};

/// Public API root of the catalog.
pub const DEFAULT_API_BASE_URL: &str = "https://www.giantbomb.com/api";

/// Maximum number of items the remote returns for one request.
pub const PAGE_LIMIT: u32 = 100;

/// Lower bound used when a cutoff turns the query into a closed range.
const EPOCH_LOWER_BOUND: &str = "1970-01-01 00:00:00";

/// Default limit for one complete catalog request.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;

/// Remote `status_code` meaning success.
const STATUS_OK: i64 = 1;

/// One page of the most recent catalog entries, newest first.
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    /// Total number of matching items reported by the remote.
    pub total_results: u64,
    /// Well-formed entries of this page, in remote order.
    pub entries: Vec<CatalogEntry>,
}

/// Source of catalog pages.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetches the most recent page, optionally limited to items published
    /// at or before `cutoff`.
    async fn fetch_recent(
        &self,
        cutoff: Option<NaiveDateTime>,
    ) -> Result<CatalogPage, CatalogError>;
}

/// Catalog client bound to one API key.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    status_code: Option<i64>,
    #[serde(default)]
    number_of_total_results: Option<u64>,
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct VideoPayload {
    id: i64,
    name: String,
    publish_date: String,
    #[serde(default)]
    hd_url: Option<String>,
    #[serde(default)]
    high_url: Option<String>,
    #[serde(default)]
    low_url: Option<String>,
    #[serde(default)]
    video_show: Option<ShowPayload>,
}

#[derive(Debug, Deserialize)]
struct ShowPayload {
    #[serde(default)]
    title: Option<String>,
}

impl TryFrom<VideoPayload> for CatalogEntry {
    type Error = chrono::ParseError;

    fn try_from(payload: VideoPayload) -> Result<Self, Self::Error> {
        Ok(Self {
            id: payload.id,
            title: payload.name,
            published_at: parse_publish_date(&payload.publish_date)?,
            category: payload.video_show.and_then(|show| show.title),
            candidate_urls: CandidateUrls {
                hd: payload.hd_url,
                high: payload.high_url,
                low: payload.low_url,
            },
        })
    }
}

impl CatalogClient {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidBaseUrl`] if `base_url` is not an
    /// absolute URL.
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let invalid = || CatalogError::InvalidBaseUrl {
            url: base_url.to_string(),
        };
        let mut root = Url::parse(base_url).map_err(|_| invalid())?;
        if !root.path().ends_with('/') {
            let with_slash = format!("{}/", root.path());
            root.set_path(&with_slash);
        }
        let endpoint = root.join("videos/").map_err(|_| invalid())?;

        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
            timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        })
    }

    /// Replaces the limit for one complete catalog request.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the endpoint URL without credentials.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn query_url(&self, cutoff: Option<NaiveDateTime>) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("api_key", &self.api_key)
                .append_pair("format", "json")
                .append_pair("sort", "publish_date:desc")
                .append_pair("limit", &PAGE_LIMIT.to_string());
            if let Some(cutoff) = cutoff {
                let range = format!(
                    "publish_date:{EPOCH_LOWER_BOUND}|{}",
                    format_publish_date(&cutoff)
                );
                pairs.append_pair("filter", &range);
            }
        }
        url
    }
}

#[async_trait]
impl CatalogSource for CatalogClient {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch_recent(
        &self,
        cutoff: Option<NaiveDateTime>,
    ) -> Result<CatalogPage, CatalogError> {
        let endpoint = self.endpoint.to_string();
        let response = self
            .http
            .get(self.query_url(cutoff))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CatalogError::from_reqwest(endpoint.clone(), e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::from_reqwest(endpoint.clone(), e))?;
        debug!(status = status.as_u16(), bytes = body.len(), "catalog response received");

        let decoded = serde_json::from_str::<VideosResponse>(&body);

        if !status.is_success() {
            let message = decoded
                .ok()
                .and_then(|payload| payload.error)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(CatalogError::remote_query(status.as_u16(), message));
        }

        let payload = decoded.map_err(|e| CatalogError::Decode {
            url: endpoint.clone(),
            reason: e.to_string(),
        })?;

        if let Some(code) = payload.status_code
            && code != STATUS_OK
        {
            let message = payload
                .error
                .unwrap_or_else(|| format!("remote status code {code}"));
            return Err(CatalogError::remote_query(status.as_u16(), message));
        }

        let entries: Vec<CatalogEntry> = payload
            .results
            .into_iter()
            .filter_map(|raw| {
                let entry = serde_json::from_value::<VideoPayload>(raw)
                    .map_err(|e| e.to_string())
                    .and_then(|video| CatalogEntry::try_from(video).map_err(|e| e.to_string()));
                match entry {
                    Ok(entry) => Some(entry),
                    Err(reason) => {
                        warn!(reason = %reason, "dropping malformed catalog entry");
                        None
                    }
                }
            })
            .collect();

        let total_results = payload
            .number_of_total_results
            .unwrap_or(entries.len() as u64);
        info!(total_results, returned = entries.len(), "catalog page retrieved");

        Ok(CatalogPage {
            total_results,
            entries,
        })
    }
}
