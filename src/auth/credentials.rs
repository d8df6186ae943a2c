//! Credential extraction from request headers and cookies.
//!
//! Pure functions of the request: no network, no side effects. The bundle
//! records where each candidate came from because the orchestrator's
//! fallback rules depend on the source.

use axum::http::{HeaderMap, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use percent_encoding::percent_decode_str;

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
use crate::problem::ApiError;

/// Where a bearer candidate was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerSource {
    Cookie,
    Header,
}

/// Credential candidates extracted from a single request.
#[derive(Debug, Clone, Default)]
pub struct CredentialBundle {
    /// Bearer token from the `access_token` cookie.
    pub bearer_from_cookie: Option<String>,
    /// Bearer token from an `Authorization: Bearer` header.
    pub bearer_from_header: Option<String>,
    /// Refresh token, read only from the `refresh_token` cookie.
    pub refresh_token: Option<String>,
    /// Base64 payload from an `Authorization: Basic` header.
    pub basic_payload: Option<String>,
}

impl CredentialBundle {
    /// Extract credentials from request headers, reading cookies from any
    /// `Cookie:` headers present.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let cookie_lines: Vec<String> = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        Self::from_parts(headers, &cookie_lines)
    }

    /// Extract credentials from headers plus raw cookie strings. Cookies may
    /// arrive pre-split (one `"name=value"` per entry) or as full `Cookie:`
    /// header lines; both representations parse identically.
    pub fn from_parts(headers: &HeaderMap, cookies: &[String]) -> Self {
        let mut bundle = Self::default();

        for line in cookies {
            for part in line.split(';') {
                if let Some((name, value)) = parse_cookie_pair(part) {
                    match name {
                        ACCESS_COOKIE_NAME if bundle.bearer_from_cookie.is_none() => {
                            bundle.bearer_from_cookie = Some(value);
                        }
                        REFRESH_COOKIE_NAME if bundle.refresh_token.is_none() => {
                            bundle.refresh_token = Some(value);
                        }
                        _ => {}
                    }
                }
            }
        }

        // HeaderMap lookups are case-insensitive, so any spelling of
        // `Authorization` resolves here.
        if let Some(value) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        {
            if let Some(token) = strip_scheme(value, "Bearer") {
                bundle.bearer_from_header = Some(token.to_string());
            } else if let Some(payload) = strip_scheme(value, "Basic") {
                bundle.basic_payload = Some(payload.to_string());
            }
        }

        bundle
    }

    /// The bearer candidate, cookie taking precedence over the header.
    pub fn bearer(&self) -> Option<(&str, BearerSource)> {
        if let Some(token) = self.bearer_from_cookie.as_deref() {
            return Some((token, BearerSource::Cookie));
        }
        self.bearer_from_header
            .as_deref()
            .map(|token| (token, BearerSource::Header))
    }

    /// True when the request carried no credential material at all.
    pub fn is_empty(&self) -> bool {
        self.bearer_from_cookie.is_none()
            && self.bearer_from_header.is_none()
            && self.refresh_token.is_none()
            && self.basic_payload.is_none()
    }
}

/// Look up a single cookie value across all `Cookie:` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'))
        .find_map(|part| match parse_cookie_pair(part) {
            Some((key, value)) if key == name => Some(value),
            _ => None,
        })
}

/// Decode a Basic payload into username and password.
/// The decoded text splits on the first colon only, so passwords may
/// contain colons.
pub fn decode_basic(payload: &str) -> Result<(String, String), ApiError> {
    let bytes = BASE64.decode(payload.trim()).map_err(|_| {
        ApiError::bad_request("Basic authorization header contains malformed base64")
    })?;
    let text = String::from_utf8(bytes).map_err(|_| {
        ApiError::bad_request("Basic authorization header is not valid UTF-8")
    })?;
    let (username, password) = text.split_once(':').ok_or_else(|| {
        ApiError::bad_request(
            "Basic credentials have an invalid format, expected username:password",
        )
    })?;
    Ok((username.to_string(), password.to_string()))
}

fn parse_cookie_pair(part: &str) -> Option<(&str, String)> {
    let (name, value) = part.trim().split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = percent_decode_str(value.trim())
        .decode_utf8_lossy()
        .into_owned();
    Some((name, value))
}

/// Strip an authorization scheme prefix, matching the scheme name
/// case-insensitively as HTTP requires.
fn strip_scheme<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let (head, rest) = value.split_at_checked(scheme.len() + 1)?;
    let (name, sep) = head.split_at(scheme.len());
    if name.eq_ignore_ascii_case(scheme) && sep == " " {
        Some(rest.trim())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_authorization_header_lookup_is_case_insensitive() {
        for spelling in ["authorization", "Authorization", "AUTHORIZATION", "AuThOrIzAtIoN"] {
            let map = headers(&[(spelling, "Bearer tok123")]);
            let bundle = CredentialBundle::from_headers(&map);
            assert_eq!(bundle.bearer_from_header.as_deref(), Some("tok123"));
        }
    }

    #[test]
    fn test_bearer_scheme_is_case_insensitive() {
        let map = headers(&[("authorization", "bearer tok123")]);
        let bundle = CredentialBundle::from_headers(&map);
        assert_eq!(bundle.bearer_from_header.as_deref(), Some("tok123"));
    }

    #[test]
    fn test_cookie_bearer_wins_over_header() {
        let map = headers(&[
            ("cookie", "access_token=from-cookie"),
            ("authorization", "Bearer from-header"),
        ]);
        let bundle = CredentialBundle::from_headers(&map);
        assert_eq!(
            bundle.bearer(),
            Some(("from-cookie", BearerSource::Cookie))
        );
        assert_eq!(bundle.bearer_from_header.as_deref(), Some("from-header"));
    }

    #[test]
    fn test_header_bearer_used_when_no_cookie() {
        let map = headers(&[("authorization", "Bearer only-header")]);
        let bundle = CredentialBundle::from_headers(&map);
        assert_eq!(
            bundle.bearer(),
            Some(("only-header", BearerSource::Header))
        );
    }

    #[test]
    fn test_refresh_token_read_only_from_cookie() {
        let map = headers(&[
            ("cookie", "refresh_token=rt0"),
            ("x-refresh-token", "ignored"),
        ]);
        let bundle = CredentialBundle::from_headers(&map);
        assert_eq!(bundle.refresh_token.as_deref(), Some("rt0"));

        let map = headers(&[("x-refresh-token", "ignored")]);
        let bundle = CredentialBundle::from_headers(&map);
        assert!(bundle.refresh_token.is_none());
    }

    #[test]
    fn test_cookie_list_and_header_parse_identically() {
        let map = headers(&[("cookie", "access_token=abc; refresh_token=def")]);
        let from_header = CredentialBundle::from_headers(&map);

        let empty = HeaderMap::new();
        let list = vec!["access_token=abc".to_string(), "refresh_token=def".to_string()];
        let from_list = CredentialBundle::from_parts(&empty, &list);

        assert_eq!(
            from_header.bearer_from_cookie,
            from_list.bearer_from_cookie
        );
        assert_eq!(from_header.refresh_token, from_list.refresh_token);
    }

    #[test]
    fn test_cookie_values_are_percent_decoded() {
        let map = headers(&[("cookie", "access_token=a%20b%3Bc")]);
        let bundle = CredentialBundle::from_headers(&map);
        assert_eq!(bundle.bearer_from_cookie.as_deref(), Some("a b;c"));
    }

    #[test]
    fn test_cookie_whitespace_tolerated() {
        let map = headers(&[("cookie", "  access_token = abc123  ; foo=bar")]);
        let bundle = CredentialBundle::from_headers(&map);
        assert_eq!(bundle.bearer_from_cookie.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_basic_payload_extracted() {
        let map = headers(&[("authorization", "Basic dXNlcjpwYXNz")]);
        let bundle = CredentialBundle::from_headers(&map);
        assert_eq!(bundle.basic_payload.as_deref(), Some("dXNlcjpwYXNz"));
        assert!(bundle.bearer_from_header.is_none());
    }

    #[test]
    fn test_empty_bundle() {
        let map = HeaderMap::new();
        let bundle = CredentialBundle::from_headers(&map);
        assert!(bundle.is_empty());
        assert!(bundle.bearer().is_none());
    }

    #[test]
    fn test_cookie_value_lookup() {
        let map = headers(&[("cookie", "foo=bar; refresh_token=rt0")]);
        assert_eq!(cookie_value(&map, "refresh_token").as_deref(), Some("rt0"));
        assert_eq!(cookie_value(&map, "foo").as_deref(), Some("bar"));
        assert!(cookie_value(&map, "access_token").is_none());
    }

    #[test]
    fn test_decode_basic_splits_on_first_colon() {
        // "user@example.com:password"
        let (user, pass) = decode_basic("dXNlckBleGFtcGxlLmNvbTpwYXNzd29yZA==").unwrap();
        assert_eq!(user, "user@example.com");
        assert_eq!(pass, "password");

        // "user:pa:ss" - password keeps its colons
        let (user, pass) = decode_basic("dXNlcjpwYTpzcw==").unwrap();
        assert_eq!(user, "user");
        assert_eq!(pass, "pa:ss");
    }

    #[test]
    fn test_decode_basic_missing_colon() {
        // "usernameonly"
        let err = decode_basic("dXNlcm5hbWVvbmx5").unwrap_err();
        assert!(err.detail().contains("invalid format"));
    }

    #[test]
    fn test_decode_basic_malformed_base64() {
        let err = decode_basic("not base64!!").unwrap_err();
        assert!(err.detail().contains("base64"));
    }
}
