//! Refresh-cookie policy and `Cookie` header parsing.
//!
//! The issuer owns the refresh cookie: its name, its attributes and its
//! lifetime.  [`RefreshCookiePolicy`] renders both the `Set-Cookie` value
//! used at login/refresh and the one used at logout, from the same fields.
//! Browsers only delete a cookie when the clearing header repeats the
//! path and security attributes it was set with.

use std::fmt;

/// Default name of the refresh cookie.
pub const DEFAULT_REFRESH_COOKIE: &str = "refreshToken";

/// Value of the `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    /// Only sent on same-site requests, including top-level navigation.
    #[default]
    Strict,
    /// Sent on same-site requests and top-level cross-site navigation.
    Lax,
    /// Sent everywhere; browsers require `Secure` alongside it.
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        })
    }
}

/// Attributes the issuer applies to the refresh cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshCookiePolicy {
    /// Cookie name.
    pub name: String,
    /// `Path` attribute.
    pub path: String,
    /// `SameSite` attribute.
    pub same_site: SameSite,
    /// Whether to emit `Secure`.
    pub secure: bool,
    /// Whether to emit `HttpOnly`.
    pub http_only: bool,
    /// `Max-Age` in seconds; matches the issuer's refresh window.
    pub max_age_secs: u64,
}

impl Default for RefreshCookiePolicy {
    fn default() -> Self {
        Self {
            name: DEFAULT_REFRESH_COOKIE.to_string(),
            path: "/".to_string(),
            same_site: SameSite::Strict,
            secure: true,
            http_only: true,
            max_age_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl RefreshCookiePolicy {
    /// `Set-Cookie` value that stores `value` for the refresh window.
    ///
    /// ```
    /// use storefront_models::RefreshCookiePolicy;
    ///
    /// let policy = RefreshCookiePolicy::default();
    /// assert_eq!(
    ///     policy.set_cookie("r1"),
    ///     "refreshToken=r1; Path=/; Max-Age=604800; SameSite=Strict; Secure; HttpOnly",
    /// );
    /// ```
    pub fn set_cookie(&self, value: &str) -> String {
        self.render(value, self.max_age_secs)
    }

    /// `Set-Cookie` value that deletes the refresh cookie.
    ///
    /// Uses exactly the attributes of [`Self::set_cookie`].
    pub fn clear_cookie(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={value}; Path={}; Max-Age={max_age}; SameSite={}",
            self.name, self.path, self.same_site
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie
    }
}

/// Split a `Cookie` request header into `(name, value)` pairs.
///
/// Pairs are returned verbatim and in order; nothing is filtered or
/// de-duplicated.  Fragments without `=` are skipped.
///
/// ```
/// use storefront_models::parse_cookie_header;
///
/// let pairs = parse_cookie_header("theme=dark; refreshToken=abc=");
/// assert_eq!(pairs, vec![
///     ("theme".to_string(), "dark".to_string()),
///     ("refreshToken".to_string(), "abc=".to_string()),
/// ]);
/// ```
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|fragment| {
            let (name, value) = fragment.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Find the first cookie called `name` in a `Cookie` request header.
pub fn find_cookie(header: &str, name: &str) -> Option<String> {
    parse_cookie_header(header)
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v)
}
