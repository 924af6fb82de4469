//! Credential-attaching request pipeline with single-flight refresh.
//!
//! Both coordinators are thin shells around a [`Pipeline`].  The pipeline
//! owns the HTTP client, the current access token and the refresh gate:
//!
//! ```text
//! send ─► dispatch ─► 2xx ───────────────────────────────► Ok(response)
//!                 ├─► other status ──────────────────────► Err(Status)
//!                 └─► 401 ─► refresh path / retried ─────► Err(Expired)
//!                        └─► recover
//!                              ├─ disarmed ──────────────► Err(Expired)
//!                              ├─ refresh in flight ─────► queue, wait, retry once
//!                              ├─ token changed since ───► retry once
//!                              └─ lead the refresh ──────► settle, retry once
//! ```
//!
//! All mutations of [`GateState`] happen inside one short critical section
//! that never spans an `.await`.  Settling a refresh (store or clear the
//! token, clear the flag, drain the queue) is a single such section, so no
//! task can observe a half-settled gate or start a second refresh while
//! the first is being published.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;
use storefront_models::{is_credential_expiry, AccessToken, AuthEndpoint};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::SdkError;
use crate::issuer::{self, RefreshOutcome};
use crate::request::ApiRequest;

/// Who keeps a refreshed access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Custody {
    /// Long-lived client: the refreshed token replaces the stored one.
    Retained,
    /// Per-request server client: the refreshed token only serves the
    /// calls that were waiting for it.
    Transient,
}

type Waiter = oneshot::Sender<Option<AccessToken>>;

#[derive(Debug)]
struct GateState {
    access: Option<AccessToken>,
    refreshing: bool,
    /// Cleared by a terminal refresh failure or a logout; set again by
    /// installing a token.
    armed: bool,
    /// Bumped whenever the credential is installed or dropped from outside
    /// a refresh.  A refresh only publishes its token if the epoch it
    /// started under is still current.
    epoch: u64,
    waiters: VecDeque<Waiter>,
    relayed_set_cookies: Vec<String>,
}

enum Recovery {
    Propagate,
    Join(oneshot::Receiver<Option<AccessToken>>),
    Reuse(AccessToken),
    Lead(u64),
}

pub(crate) struct Pipeline {
    http: reqwest::Client,
    config: ClientConfig,
    custody: Custody,
    state: Mutex<GateState>,
    refreshes: AtomicU64,
}

impl Pipeline {
    pub(crate) fn new(
        http: reqwest::Client,
        config: ClientConfig,
        custody: Custody,
        access: Option<AccessToken>,
    ) -> Self {
        Self {
            http,
            config,
            custody,
            state: Mutex::new(GateState {
                access,
                refreshing: false,
                armed: true,
                epoch: 0,
                waiters: VecDeque::new(),
                relayed_set_cookies: Vec::new(),
            }),
            refreshes: AtomicU64::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Credential slot
    // ------------------------------------------------------------------

    pub(crate) fn access_token(&self) -> Option<AccessToken> {
        self.state().access.clone()
    }

    /// Overwrite the token.  Installing a token re-arms refresh.
    pub(crate) fn set_access_token(&self, token: Option<AccessToken>) {
        let mut state = self.state();
        if token.is_some() {
            state.armed = true;
        }
        state.epoch += 1;
        state.access = token;
    }

    /// Drop the token and stop refreshing until a token is installed.
    pub(crate) fn sign_out(&self) {
        let mut state = self.state();
        state.access = None;
        state.armed = false;
        state.epoch += 1;
    }

    pub(crate) fn session_ended(&self) -> bool {
        !self.state().armed
    }

    pub(crate) fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub(crate) fn relayed_set_cookies(&self) -> Vec<String> {
        self.state().relayed_set_cookies.clone()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    pub(crate) async fn send(&self, mut request: ApiRequest) -> Result<Response, SdkError> {
        let response = self.dispatch(&mut request).await?;
        if !is_credential_expiry(response.status().as_u16()) {
            return ok_or_status(&request, response).await;
        }
        if !request.is_recoverable() {
            debug!(
                path = %request.path(),
                retried = request.is_retried(),
                "credential rejected, not recoverable"
            );
            return Err(expired(&request));
        }
        self.recover(request).await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SdkError> {
        let response = self.send(ApiRequest::get(path)).await?;
        Ok(response.json().await?)
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, SdkError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(ApiRequest::post(path).json(body)?).await?;
        Ok(response.json().await?)
    }

    async fn dispatch(&self, request: &mut ApiRequest) -> Result<Response, SdkError> {
        let token = self.access_token();
        let builder = request.to_builder(&self.http, &self.config, token.as_ref())?;
        debug!(
            method = %request.method(),
            path = %request.path(),
            bearer = request.sent_with().is_some(),
            retried = request.is_retried(),
            "dispatch"
        );
        Ok(builder.send().await?)
    }

    /// Retry once with `token`.  A second expiry is final.
    async fn retry(&self, mut request: ApiRequest, token: &AccessToken) -> Result<Response, SdkError> {
        request.replace_authorization(token)?;
        let response = self.dispatch(&mut request).await?;
        if is_credential_expiry(response.status().as_u16()) {
            warn!(path = %request.path(), "credential rejected again after refresh");
            return Err(expired(&request));
        }
        ok_or_status(&request, response).await
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    async fn recover(&self, mut request: ApiRequest) -> Result<Response, SdkError> {
        request.mark_retried();

        let step = {
            let mut state = self.state();
            if !state.armed {
                Recovery::Propagate
            } else if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                debug!(path = %request.path(), waiters = state.waiters.len(), "joined pending refresh");
                Recovery::Join(rx)
            } else {
                let changed = match (self.custody, state.access.as_ref(), request.sent_with()) {
                    (Custody::Retained, Some(current), Some(sent)) if current != sent => {
                        Some(current.clone())
                    }
                    _ => None,
                };
                match changed {
                    Some(current) => Recovery::Reuse(current),
                    None => {
                        state.refreshing = true;
                        Recovery::Lead(state.epoch)
                    }
                }
            }
        };

        match step {
            Recovery::Propagate => {
                debug!(path = %request.path(), "session ended, not refreshing");
                Err(expired(&request))
            }
            Recovery::Join(rx) => match rx.await {
                Ok(Some(token)) => self.retry(request, &token).await,
                _ => Err(expired(&request)),
            },
            Recovery::Reuse(token) => {
                debug!(path = %request.path(), "token changed since dispatch, retrying");
                self.retry(request, &token).await
            }
            Recovery::Lead(epoch) => {
                let episode = RefreshEpisode::new(self, epoch);
                let RefreshOutcome { token, set_cookies } = self.call_refresh().await;
                match token {
                    Ok(token) => {
                        episode.settle(Some(token.clone()), set_cookies);
                        self.retry(request, &token).await
                    }
                    Err(e) => {
                        warn!(error = %e, "refresh failed, session ended");
                        episode.settle(None, set_cookies);
                        Err(SdkError::SessionEnded(Box::new(e)))
                    }
                }
            }
        }
    }

    async fn call_refresh(&self) -> RefreshOutcome {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        info!(refresh = n, endpoint = AuthEndpoint::Refresh.path(), "refreshing access token");
        issuer::refresh(&self.http, &self.config).await
    }

    /// Publish the outcome of a refresh episode and release every waiter
    /// in the order it queued.
    ///
    /// The credential slot is left alone if it was replaced or cleared
    /// after the episode started (`epoch` no longer current).
    fn settle(&self, epoch: u64, outcome: Option<AccessToken>, set_cookies: Vec<String>) {
        let waiters = {
            let mut state = self.state();
            state.refreshing = false;
            if state.epoch == epoch {
                match (&outcome, self.custody) {
                    (Some(token), Custody::Retained) => state.access = Some(token.clone()),
                    (Some(_), Custody::Transient) => {}
                    (None, _) => {
                        state.access = None;
                        state.armed = false;
                    }
                }
            } else {
                debug!("credential replaced during refresh, outcome not stored");
            }
            state.relayed_set_cookies.extend(set_cookies);
            std::mem::take(&mut state.waiters)
        };

        if outcome.is_some() {
            info!(waiters = waiters.len(), "access token refreshed");
        }
        for waiter in waiters {
            // A waiter whose caller gave up has dropped its receiver.
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Guard for the task leading a refresh.
///
/// If the leading future is dropped before it settles (cancelled, or the
/// caller timed out around it), the episode settles as a failure so the
/// gate is never left closed with waiters stranded.
struct RefreshEpisode<'a> {
    pipeline: &'a Pipeline,
    epoch: u64,
    settled: bool,
}

impl<'a> RefreshEpisode<'a> {
    fn new(pipeline: &'a Pipeline, epoch: u64) -> Self {
        Self {
            pipeline,
            epoch,
            settled: false,
        }
    }

    fn settle(mut self, outcome: Option<AccessToken>, set_cookies: Vec<String>) {
        self.settled = true;
        self.pipeline.settle(self.epoch, outcome, set_cookies);
    }
}

impl Drop for RefreshEpisode<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("refresh abandoned before completion");
            self.pipeline.settle(self.epoch, None, Vec::new());
        }
    }
}

fn expired(request: &ApiRequest) -> SdkError {
    SdkError::Expired {
        path: request.path().to_string(),
    }
}

async fn ok_or_status(request: &ApiRequest, response: Response) -> Result<Response, SdkError> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(issuer::status_error(request.method().as_str(), request.path(), response).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pipeline(custody: Custody) -> Pipeline {
        Pipeline::new(
            reqwest::Client::new(),
            ClientConfig::new("http://127.0.0.1:9").unwrap(),
            custody,
            Some(AccessToken::new("initial").unwrap()),
        )
    }

    fn token(s: &str) -> AccessToken {
        AccessToken::new(s).unwrap()
    }

    /// Mark a refresh as in flight and return its epoch.
    fn start_refresh(p: &Pipeline) -> u64 {
        let mut state = p.state();
        state.refreshing = true;
        state.epoch
    }

    fn queue_waiter(p: &Pipeline) -> oneshot::Receiver<Option<AccessToken>> {
        let (tx, rx) = oneshot::channel();
        p.state().waiters.push_back(tx);
        rx
    }

    #[tokio::test]
    async fn settle_success_releases_waiters_and_stores_token() {
        let p = pipeline(Custody::Retained);
        let epoch = start_refresh(&p);
        let (rx1, rx2) = (queue_waiter(&p), queue_waiter(&p));

        p.settle(epoch, Some(token("fresh")), vec!["refreshToken=r2".into()]);

        assert_eq!(rx1.await.unwrap(), Some(token("fresh")));
        assert_eq!(rx2.await.unwrap(), Some(token("fresh")));
        assert_eq!(p.access_token(), Some(token("fresh")));
        assert!(!p.state().refreshing);
        assert!(!p.session_ended());
    }

    #[tokio::test]
    async fn waiters_are_released_in_queue_order() {
        let p = pipeline(Custody::Retained);
        let epoch = start_refresh(&p);
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4 {
            let rx = queue_waiter(&p);
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                rx.await.unwrap();
                order.lock().unwrap().push(i);
            }));
        }
        // Let every task park on its receiver.
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        p.settle(epoch, Some(token("fresh")), Vec::new());
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn settle_failure_clears_token_and_disarms() {
        let p = pipeline(Custody::Retained);
        let epoch = start_refresh(&p);
        let (rx1, rx2) = (queue_waiter(&p), queue_waiter(&p));

        p.settle(epoch, None, vec!["refreshToken=; Max-Age=0".into()]);

        assert_eq!(rx1.await.unwrap(), None);
        assert_eq!(rx2.await.unwrap(), None);
        assert!(p.access_token().is_none());
        assert!(p.session_ended());
        assert_eq!(p.relayed_set_cookies().len(), 1);
    }

    #[tokio::test]
    async fn transient_custody_does_not_store_refreshed_token() {
        let p = pipeline(Custody::Transient);
        let epoch = start_refresh(&p);
        let rx = queue_waiter(&p);

        p.settle(epoch, Some(token("fresh")), vec!["c=1".into()]);

        assert_eq!(rx.await.unwrap().unwrap().as_str(), "fresh");
        assert_eq!(p.access_token().unwrap().as_str(), "initial");
        assert_eq!(p.relayed_set_cookies(), vec!["c=1".to_string()]);
    }

    #[tokio::test]
    async fn abandoned_episode_settles_as_failure() {
        let p = pipeline(Custody::Retained);
        let epoch = start_refresh(&p);
        let rx = queue_waiter(&p);

        drop(RefreshEpisode::new(&p, epoch));

        assert_eq!(rx.await.unwrap(), None);
        assert!(!p.state().refreshing);
        assert!(p.session_ended());
    }

    #[tokio::test]
    async fn refresh_landing_after_sign_out_is_discarded() {
        let p = pipeline(Custody::Retained);
        let epoch = start_refresh(&p);
        let rx = queue_waiter(&p);

        p.sign_out();
        RefreshEpisode::new(&p, epoch).settle(Some(token("late")), Vec::new());

        assert!(p.access_token().is_none());
        assert!(p.session_ended());
        assert!(!p.state().refreshing);
        assert_eq!(rx.await.unwrap(), Some(token("late")));
    }

    #[test]
    fn refresh_landing_after_new_login_keeps_new_token() {
        let p = pipeline(Custody::Retained);
        let epoch = start_refresh(&p);

        p.set_access_token(Some(token("new-login")));
        p.settle(epoch, Some(token("old-session-refresh")), Vec::new());
        assert_eq!(p.access_token(), Some(token("new-login")));

        // A failure from the old session does not sign the new one out.
        let epoch = start_refresh(&p);
        p.set_access_token(Some(token("newer-login")));
        p.settle(epoch, None, Vec::new());
        assert_eq!(p.access_token(), Some(token("newer-login")));
        assert!(!p.session_ended());
    }

    #[test]
    fn installing_a_token_rearms() {
        let p = pipeline(Custody::Retained);
        p.sign_out();
        assert!(p.session_ended());
        p.set_access_token(None);
        assert!(p.session_ended());
        p.set_access_token(Some(token("t")));
        assert!(!p.session_ended());
    }
}
