//! Canonical URL identity

use url::Url;

/// Canonicalize a URL so equivalent addresses collapse to one identity.
///
/// The fragment is dropped and trailing slashes are trimmed from any path
/// other than the domain root. Scheme, host, path and query are otherwise
/// left as parsed. Input that does not parse is returned unchanged.
pub fn normalize(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url.trim()) else {
        return url.to_string();
    };

    parsed.set_fragment(None);

    let path = parsed.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        parsed.set_path(&trimmed);
    }

    parsed.to_string()
}
