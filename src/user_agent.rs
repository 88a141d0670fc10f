//! User-Agent string for catalog queries and media downloads.

/// Project URL sent with every request.
const PROJECT_UA_URL: &str = "https://github.com/fierce/catalog-sync";

/// Default User-Agent for all HTTP traffic.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("catalog-sync/{version} (+{PROJECT_UA_URL})")
}
