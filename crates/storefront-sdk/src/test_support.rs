//! Live mock issuer for coordinator tests.

use std::sync::Arc;
use std::time::Duration;

use mock_issuer::{serve_ephemeral, IssuerConfig, IssuerState};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};

use crate::config::ClientConfig;

pub(crate) struct Harness {
    pub issuer: Arc<IssuerState>,
    pub config: ClientConfig,
}

pub(crate) async fn harness() -> Harness {
    let issuer = Arc::new(IssuerState::new(
        IssuerConfig::default().with_insecure_cookies(),
    ));
    let addr = serve_ephemeral(issuer.clone()).await.unwrap();
    let config = ClientConfig::new(&format!("http://{addr}"))
        .unwrap()
        .with_timeout(Duration::from_secs(10));
    Harness { issuer, config }
}

impl Harness {
    /// Inbound headers as a browser would send them to a server-side
    /// handler: an unrelated cookie plus the refresh cookie.
    pub fn inbound_cookies(&self, refresh: &str) -> HeaderMap {
        let name = &self.issuer.config().cookie.name;
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {name}={refresh}")).unwrap(),
        );
        headers
    }
}
