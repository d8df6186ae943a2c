//! Session cookie construction.
//!
//! Cookie attributes are fixed: HttpOnly, Secure, SameSite=Lax, Path=/.
//! Lifetimes track the identity provider's token lifetimes.

/// Cookie name for the access token (short-lived, 1 hour).
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token (long-lived, 30 days).
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Access-token cookie lifetime, matching the provider's access-token expiry.
pub const ACCESS_COOKIE_MAX_AGE_SECS: u64 = 3600;

/// Refresh-token cookie lifetime: 30 days.
pub const REFRESH_COOKIE_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

const COOKIE_ATTRIBUTES: &str = "HttpOnly; Secure; SameSite=Lax; Path=/";

fn build_cookie(name: &str, value: &str, max_age: u64) -> String {
    format!("{}={}; {}; Max-Age={}", name, value, COOKIE_ATTRIBUTES, max_age)
}

/// Set-Cookie value carrying an access token.
pub fn access_cookie(token: &str) -> String {
    build_cookie(ACCESS_COOKIE_NAME, token, ACCESS_COOKIE_MAX_AGE_SECS)
}

/// Set-Cookie value carrying a refresh token.
pub fn refresh_cookie(token: &str) -> String {
    build_cookie(REFRESH_COOKIE_NAME, token, REFRESH_COOKIE_MAX_AGE_SECS)
}

/// Set-Cookie value that expires the access-token cookie.
/// Safe to send even when the client holds no such cookie.
pub fn clear_access_cookie() -> String {
    build_cookie(ACCESS_COOKIE_NAME, "", 0)
}

/// Set-Cookie value that expires the refresh-token cookie.
pub fn clear_refresh_cookie() -> String {
    build_cookie(REFRESH_COOKIE_NAME, "", 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_cookie_format() {
        assert_eq!(
            access_cookie("abc123"),
            "access_token=abc123; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=3600"
        );
    }

    #[test]
    fn test_refresh_cookie_format() {
        assert_eq!(
            refresh_cookie("xyz789"),
            "refresh_token=xyz789; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=2592000"
        );
    }

    #[test]
    fn test_clear_cookies_expire_immediately() {
        assert_eq!(
            clear_access_cookie(),
            "access_token=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0"
        );
        assert_eq!(
            clear_refresh_cookie(),
            "refresh_token=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0"
        );
    }

    #[test]
    fn test_clearing_is_idempotent() {
        assert_eq!(clear_access_cookie(), clear_access_cookie());
        assert_eq!(clear_refresh_cookie(), clear_refresh_cookie());
    }
}
