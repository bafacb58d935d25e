//! Utility functions and helpers.

pub mod http;
#[cfg(test)]
pub(crate) mod testing;

use url::Url;

use crate::error::Result;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> Result<String> {
    Ok(base.join(href.trim())?.to_string())
}

/// Append an endpoint path to a service base URL, keeping any base path prefix.
pub fn join_endpoint(base: &str, path: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Ok(Url::parse(&joined)?)
}
