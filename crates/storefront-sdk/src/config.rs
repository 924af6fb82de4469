//! Client configuration.

use std::time::Duration;

use reqwest::Url;

use crate::error::SdkError;

/// Where the storefront API lives and how long calls may take.
///
/// ```
/// use std::time::Duration;
/// use storefront_sdk::ClientConfig;
///
/// let config = ClientConfig::new("http://localhost:3001/")
///     .unwrap()
///     .with_timeout(Duration::from_secs(5));
/// assert_eq!(
///     config.endpoint("/api/cart").unwrap().as_str(),
///     "http://localhost:3001/api/cart",
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: Url,
    timeout: Option<Duration>,
}

impl ClientConfig {
    /// Parse the API base URL.  Only `http` and `https` are accepted.
    pub fn new(base_url: &str) -> Result<Self, SdkError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SdkError::Config(format!("invalid base URL {base_url:?}: {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(SdkError::Config(format!(
                "base URL must be http(s): {base_url}"
            )));
        }
        Ok(Self {
            base_url,
            timeout: None,
        })
    }

    /// Apply a timeout to every call, refresh included.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Per-call timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolve `path` (which may carry a query string) against the base URL.
    ///
    /// A path prefix on the base URL is kept: `http://h/shop` + `/api/cart`
    /// is `http://h/shop/api/cart`.
    pub fn endpoint(&self, path: &str) -> Result<Url, SdkError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}"))
            .map_err(|e| SdkError::Config(format!("invalid request path {path:?}: {e}")))
    }

    pub(crate) fn http_client(
        &self,
        builder: reqwest::ClientBuilder,
    ) -> Result<reqwest::Client, SdkError> {
        let builder = match self.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        };
        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_scheme() {
        assert!(matches!(
            ClientConfig::new("ftp://example.com"),
            Err(SdkError::Config(_))
        ));
        assert!(ClientConfig::new("not a url").is_err());
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let config = ClientConfig::new("http://example.com/shop/").unwrap();
        assert_eq!(
            config.endpoint("/api/cart?page=2").unwrap().as_str(),
            "http://example.com/shop/api/cart?page=2"
        );
        assert_eq!(
            config.endpoint("auth/refresh").unwrap().as_str(),
            "http://example.com/shop/auth/refresh"
        );
    }

    #[test]
    fn timeout_defaults_to_none() {
        let config = ClientConfig::new("https://example.com").unwrap();
        assert!(config.timeout().is_none());
        let config = config.with_timeout(Duration::from_secs(3));
        assert_eq!(config.timeout(), Some(Duration::from_secs(3)));
    }
}
