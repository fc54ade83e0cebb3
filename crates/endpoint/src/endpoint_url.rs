//! Endpoint URL composition from a route hostname and a path suffix.

use url::{ParseError, Position, Url};

const DEFAULT_SCHEME: &str = "http://";

fn has_http_scheme(hostname: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        hostname
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Build the external URL for an endpoint.
///
/// `http://` is prepended unless the hostname already carries an http(s) scheme.
/// Only the scheme and authority are parsed; `path` is appended verbatim because it
/// may hold placeholders like `%(project_id)s` that must not be escaped.
///
/// ```
/// use endpoint::compose_url;
///
/// assert_eq!(compose_url("example.com", "/v1").unwrap(), "http://example.com/v1");
/// assert_eq!(compose_url("https://example.com", "/v1").unwrap(), "https://example.com/v1");
/// ```
pub fn compose_url(hostname: &str, path: &str) -> Result<String, ParseError> {
    let raw = if has_http_scheme(hostname) {
        hostname.to_string()
    } else {
        format!("{}{}", DEFAULT_SCHEME, hostname)
    };

    let parsed = Url::parse(&raw)?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ParseError::EmptyHost);
    }

    // The parser adds "/" to bare authorities; keep the hostname as given.
    let bare_authority = parsed.path() == "/" && parsed.query().is_none() && parsed.fragment().is_none();
    let base = if bare_authority && !raw.ends_with('/') {
        &parsed[..Position::AfterPort]
    } else {
        parsed.as_str()
    };

    Ok(format!("{}{}", base, path))
}
