//! Quality tier resolution for catalog entries.
//!
//! The remote catalog does not populate every tier for every item, but all
//! media URLs follow one naming convention: the last four characters of the
//! file stem are the encoded bitrate (`..._4000.mp4`). When the requested
//! tier is absent, the URL is derived from any other populated tier by
//! rewriting that token.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::catalog::CatalogEntry;

/// Width of the bitrate token at the end of a media file stem.
const BITRATE_TOKEN_WIDTH: usize = 4;

/// Named quality level of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Quality {
    /// 1920x1080, bitrate token `4000`.
    #[default]
    Hd,
    /// 1280x720, bitrate token `3200`.
    High,
    /// 960x540, bitrate token `1800`.
    Low,
}

impl Quality {
    /// All tiers, highest first. Also the reference priority for fallback.
    pub const ALL: [Self; 3] = [Self::Hd, Self::High, Self::Low];

    /// Returns the stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hd => "hd",
            Self::High => "high",
            Self::Low => "low",
        }
    }

    /// Returns the bitrate token encoded in media file names for this tier.
    #[must_use]
    pub fn bitrate(self) -> &'static str {
        match self {
            Self::Hd => "4000",
            Self::High => "3200",
            Self::Low => "1800",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = ResolveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|quality| quality.as_str() == normalized)
            .ok_or_else(|| ResolveError::UnknownQuality {
                value: value.to_string(),
            })
    }
}

/// Errors produced while resolving a download URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No tier of the entry carries a usable URL.
    #[error("no download URL available for item {id}")]
    NotFound {
        /// Catalog item id.
        id: i64,
    },

    /// A reference URL exists but does not follow the bitrate naming convention.
    #[error("cannot derive {quality} URL for item {id} from {reference}")]
    Untransformable {
        /// Catalog item id.
        id: i64,
        /// Requested tier.
        quality: Quality,
        /// The URL the rewrite was attempted on.
        reference: String,
    },

    /// A quality label outside the fixed set.
    #[error("unknown quality '{value}'\n  Suggestion: Use one of: hd, high, low")]
    UnknownQuality {
        /// The rejected label.
        value: String,
    },
}

/// Produces the best available download URL for `requested`.
///
/// # Errors
///
/// Returns [`ResolveError::NotFound`] when every tier is empty, and
/// [`ResolveError::Untransformable`] when the reference URL cannot be
/// rewritten.
pub fn resolve_url(entry: &CatalogEntry, requested: Quality) -> Result<String, ResolveError> {
    if let Some(url) = entry.candidate_urls.get(requested) {
        return Ok(url.to_string());
    }

    let Some((reference_quality, reference)) = Quality::ALL
        .into_iter()
        .find_map(|quality| entry.candidate_urls.get(quality).map(|url| (quality, url)))
    else {
        return Err(ResolveError::NotFound { id: entry.id });
    };

    debug!(
        id = entry.id,
        requested = %requested,
        reference_quality = %reference_quality,
        "requested tier missing, rewriting bitrate token"
    );

    rewrite_bitrate(reference, requested).ok_or_else(|| ResolveError::Untransformable {
        id: entry.id,
        quality: requested,
        reference: reference.to_string(),
    })
}

/// Replaces the bitrate token of a media URL with the one for `quality`.
///
/// Only the file stem's trailing token changes; scheme, host, directories,
/// extension and query are kept. Returns `None` for URLs without an
/// extension or with a stem shorter than the token.
#[must_use]
pub fn rewrite_bitrate(reference: &str, quality: Quality) -> Option<String> {
    let mut url = Url::parse(reference).ok()?;
    let path = url.path().to_string();
    let (directory, file) = path.rsplit_once('/')?;
    let (stem, extension) = file.rsplit_once('.')?;

    let cut = stem.len().checked_sub(BITRATE_TOKEN_WIDTH)?;
    if !stem.is_char_boundary(cut) {
        return None;
    }

    let rewritten = format!(
        "{directory}/{}{}.{extension}",
        &stem[..cut],
        quality.bitrate()
    );
    url.set_path(&rewritten);
    Some(url.into())
}
