//! Allowed-origin matching for public (browser) submissions

use url::Url;

/// Whether `origin` may submit events for a credential listing `allowed`.
///
/// Patterns are `*` (any origin), an exact host, or `*.domain` which also
/// matches the bare domain. An empty list allows everything. The opaque
/// `"null"` origin only passes a wildcard.
pub fn is_allowed_origin(origin: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() || allowed.iter().any(|pattern| pattern == "*") {
        return true;
    }

    if origin == "null" {
        return false;
    }

    let Some(host) = origin_host(origin) else {
        return false;
    };

    allowed.iter().any(|pattern| {
        let pattern = pattern.trim().to_ascii_lowercase();
        match pattern.strip_prefix("*.") {
            Some(domain) => host == domain || host.ends_with(&format!(".{}", domain)),
            None => host == pattern,
        }
    })
}

fn origin_host(origin: &str) -> Option<String> {
    let url = Url::parse(origin).ok()?;
    url.host_str().map(|host| host.to_ascii_lowercase())
}
