//! Cookie parsing and `Set-Cookie` construction for the session cookies.

use std::fmt;

use axum::http::{HeaderMap, HeaderValue, header};
use tracing::error;

/// Cookie name for the access token (short-lived, 15 minutes).
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token (long-lived, 7 days).
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// A `Set-Cookie` value. Session cookies are always `HttpOnly`,
/// `SameSite=Strict` and scoped to `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: &'static str,
    value: String,
    max_age: u64,
    secure: bool,
}

impl SetCookie {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
            max_age: 0,
            secure: false,
        }
    }

    /// An empty cookie with `Max-Age=0`, which makes the client drop it.
    pub fn cleared(name: &'static str) -> Self {
        Self::new(name, "")
    }

    pub fn max_age(mut self, secs: u64) -> Self {
        self.max_age = secs;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn to_header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.to_string()).ok()
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
            self.name, self.value, self.max_age
        )?;
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

/// Both session cookies, cleared.
pub fn cleared_session_cookies(secure: bool) -> [SetCookie; 2] {
    [
        SetCookie::cleared(ACCESS_COOKIE_NAME).secure(secure),
        SetCookie::cleared(REFRESH_COOKIE_NAME).secure(secure),
    ]
}

/// Append each cookie as its own `Set-Cookie` header.
pub fn append_cookies(headers: &mut HeaderMap, cookies: impl IntoIterator<Item = SetCookie>) {
    for cookie in cookies {
        match cookie.to_header_value() {
            Some(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            None => error!(cookie = cookie.name, "Cookie value is not a valid header"),
        }
    }
}

/// Whether `headers` already set (or clear) either session cookie.
pub fn sets_session_cookie(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split_once('='))
        .any(|(name, _)| {
            let name = name.trim();
            name == ACCESS_COOKIE_NAME || name == REFRESH_COOKIE_NAME
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_cookie_simple() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("access_token=abc123"),
        );

        assert_eq!(get_cookie(&headers, "access_token"), Some("abc123"));
    }

    #[test]
    fn test_get_cookie_multiple() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; access_token=abc123; refresh_token=xyz789"),
        );

        assert_eq!(get_cookie(&headers, "access_token"), Some("abc123"));
        assert_eq!(get_cookie(&headers, "refresh_token"), Some("xyz789"));
        assert_eq!(get_cookie(&headers, "foo"), Some("bar"));
    }

    #[test]
    fn test_get_cookie_not_found() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("foo=bar"));

        assert_eq!(get_cookie(&headers, "access_token"), None);
        assert_eq!(get_cookie(&HeaderMap::new(), "access_token"), None);
    }

    #[test]
    fn test_set_cookie_format() {
        let cookie = SetCookie::new(ACCESS_COOKIE_NAME, "tok").max_age(900);
        assert_eq!(
            cookie.to_string(),
            "access_token=tok; HttpOnly; SameSite=Strict; Path=/; Max-Age=900"
        );

        let secure = SetCookie::new(REFRESH_COOKIE_NAME, "tok")
            .max_age(604800)
            .secure(true);
        assert_eq!(
            secure.to_string(),
            "refresh_token=tok; HttpOnly; SameSite=Strict; Path=/; Max-Age=604800; Secure"
        );
    }

    #[test]
    fn test_cleared_cookies() {
        let [access, refresh] = cleared_session_cookies(false);
        assert_eq!(
            access.to_string(),
            "access_token=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0"
        );
        assert_eq!(
            refresh.to_string(),
            "refresh_token=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0"
        );
    }

    #[test]
    fn test_append_cookies_keeps_each_header() {
        let mut headers = HeaderMap::new();
        append_cookies(&mut headers, cleared_session_cookies(true));
        assert_eq!(headers.get_all(header::SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn test_sets_session_cookie() {
        let mut headers = HeaderMap::new();
        assert!(!sets_session_cookie(&headers));

        headers.append(header::SET_COOKIE, HeaderValue::from_static("theme=dark; Path=/"));
        assert!(!sets_session_cookie(&headers));

        append_cookies(&mut headers, cleared_session_cookies(false));
        assert!(sets_session_cookie(&headers));
    }
}
