//! File naming for transferred items.
//!
//! Titles come straight from the remote catalog, so characters that are
//! invalid or awkward in paths are substituted through a fixed table. Every
//! other character, non-ASCII text included, passes through unchanged.
//!
//! Distinct titles can map to the same name (`"a?b"` and `"ab"`); the later
//! item then finds the earlier file in place and is treated as complete.

use std::path::{Path, PathBuf};

use url::Url;

use crate::resolver::Quality;

/// Marker appended to partial artifacts.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Substitution for one restricted character, or `None` to pass it through.
fn substitute(ch: char) -> Option<&'static str> {
    match ch {
        ':' => Some(" -"),
        '/' => Some("-"),
        '"' => Some("'"),
        '\\' | '?' | '%' | '*' | '|' | '<' | '>' => Some(""),
        _ => None,
    }
}

/// Maps a display title and extension to a filesystem-safe file name.
///
/// `extension` is appended verbatim and is expected to include its dot.
#[must_use]
pub fn sanitize(title: &str, extension: &str) -> String {
    let mut name = String::with_capacity(title.len() + extension.len());
    for ch in title.chars() {
        match substitute(ch) {
            Some(replacement) => name.push_str(replacement),
            None => name.push(ch),
        }
    }
    name.push_str(extension);
    name
}

/// Returns the extension of the URL's last path segment, dot included.
#[must_use]
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.next_back()?;
    let dot_index = last_segment.rfind('.')?;
    let ext = &last_segment[dot_index..];
    if ext.len() <= 1 {
        return None;
    }
    Some(ext.to_string())
}

/// Path of the partial artifact for a final file, e.g. `name.mp4_hd.part`.
#[must_use]
pub fn partial_path(final_path: &Path, quality: Quality) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!("_{quality}{PARTIAL_SUFFIX}"));
    final_path.with_file_name(name)
}
