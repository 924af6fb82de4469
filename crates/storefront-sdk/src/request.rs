//! Outgoing API requests.
//!
//! [`ApiRequest`] is a re-sendable description of a call: method, path,
//! headers and an optional JSON body.  The pipeline needs to dispatch the
//! same request up to twice, and it needs to remember whether a request
//! has already been retried, so requests are plain data rather than
//! `reqwest::RequestBuilder`s.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::Serialize;
use storefront_models::{is_refresh_path, AccessToken};

use crate::config::ClientConfig;
use crate::error::SdkError;

/// A call to the storefront API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
    retried: bool,
    sent_with: Option<AccessToken>,
}

impl ApiRequest {
    /// A request with no headers and no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
            sent_with: None,
        }
    }

    /// `GET path`
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT path`
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `PATCH path`
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// `DELETE path`
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, SdkError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Set a header.  Setting `Authorization` here stops the pipeline from
    /// attaching its own credential to the first attempt.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path relative to the API base URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the pipeline has already retried this request once.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// Whether this request targets the refresh endpoint.
    pub fn is_refresh(&self) -> bool {
        is_refresh_path(&self.path)
    }

    /// Whether an expiry on this request may trigger a refresh.
    pub(crate) fn is_recoverable(&self) -> bool {
        !self.retried && !self.is_refresh()
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Token the pipeline attached on the last dispatch, if it attached one.
    pub(crate) fn sent_with(&self) -> Option<&AccessToken> {
        self.sent_with.as_ref()
    }

    /// Overwrite `Authorization` with `token`, caller-supplied value
    /// included.  Used for the single retry after a refresh.
    pub(crate) fn replace_authorization(&mut self, token: &AccessToken) -> Result<(), SdkError> {
        self.headers.insert(AUTHORIZATION, bearer_header(token)?);
        Ok(())
    }

    /// Build the `reqwest` request, attaching `token` unless the request
    /// already carries `Authorization`.
    pub(crate) fn to_builder(
        &mut self,
        http: &reqwest::Client,
        config: &ClientConfig,
        token: Option<&AccessToken>,
    ) -> Result<reqwest::RequestBuilder, SdkError> {
        let url = config.endpoint(&self.path)?;
        let mut headers = self.headers.clone();
        let attached = attach_bearer(&mut headers, token)?;
        self.sent_with = if attached { token.cloned() } else { None };

        let builder = http.request(self.method.clone(), url).headers(headers);
        Ok(match &self.body {
            Some(body) => builder.json(body),
            None => builder,
        })
    }
}

/// Attach `token` as a bearer credential if there is one and the headers
/// do not already carry `Authorization`.  Returns whether it attached.
pub(crate) fn attach_bearer(
    headers: &mut HeaderMap,
    token: Option<&AccessToken>,
) -> Result<bool, SdkError> {
    match token {
        Some(token) if !headers.contains_key(AUTHORIZATION) => {
            headers.insert(AUTHORIZATION, bearer_header(token)?);
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn bearer_header(token: &AccessToken) -> Result<HeaderValue, SdkError> {
    let mut value = HeaderValue::from_str(&token.bearer_value())
        .map_err(|e| SdkError::Config(format!("access token is not a valid header value: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> AccessToken {
        AccessToken::new(s).unwrap()
    }

    #[test]
    fn attaches_when_absent() {
        let mut headers = HeaderMap::new();
        assert!(attach_bearer(&mut headers, Some(&token("t1"))).unwrap());
        assert_eq!(headers[AUTHORIZATION], "Bearer t1");
        assert!(headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn caller_authorization_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(!attach_bearer(&mut headers, Some(&token("t1"))).unwrap());
        assert_eq!(headers[AUTHORIZATION], "Basic abc");
    }

    #[test]
    fn nothing_attached_without_token() {
        let mut headers = HeaderMap::new();
        assert!(!attach_bearer(&mut headers, None).unwrap());
        assert!(headers.is_empty());
    }

    #[test]
    fn replace_overrides_caller_header() {
        let mut request = ApiRequest::get("/api/cart")
            .header(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));
        request.replace_authorization(&token("fresh")).unwrap();
        assert_eq!(request.headers[AUTHORIZATION], "Bearer fresh");
    }

    #[test]
    fn recoverability() {
        let mut request = ApiRequest::get("/api/cart");
        assert!(request.is_recoverable());
        request.mark_retried();
        assert!(request.is_retried());
        assert!(!request.is_recoverable());

        let refresh = ApiRequest::post("/auth/refresh");
        assert!(refresh.is_refresh());
        assert!(!refresh.is_recoverable());
    }

    #[test]
    fn builder_records_attached_token() {
        let http = reqwest::Client::new();
        let config = ClientConfig::new("http://localhost:3001").unwrap();

        let mut request = ApiRequest::get("/api/cart");
        let built = request
            .to_builder(&http, &config, Some(&token("t1")))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(built.headers()[AUTHORIZATION], "Bearer t1");
        assert_eq!(request.sent_with(), Some(&token("t1")));

        let mut explicit = ApiRequest::get("/api/cart")
            .header(AUTHORIZATION, HeaderValue::from_static("Bearer mine"));
        explicit.to_builder(&http, &config, Some(&token("t1"))).unwrap();
        assert!(explicit.sent_with().is_none());
    }

    #[test]
    fn json_body_is_serialized() {
        let http = reqwest::Client::new();
        let config = ClientConfig::new("http://localhost:3001").unwrap();
        let mut request = ApiRequest::post("/auth/login")
            .json(&serde_json::json!({ "email": "a@b.c" }))
            .unwrap();
        let built = request.to_builder(&http, &config, None).unwrap().build().unwrap();
        assert_eq!(built.method(), &Method::POST);
        assert_eq!(built.url().path(), "/auth/login");
        assert!(built.body().is_some());
    }
}
