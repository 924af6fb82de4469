//! In-memory users, refresh sessions and live access tokens.
//!
//! A refresh session is keyed by the opaque cookie value.  Rotation
//! removes the old key before inserting the new one, so a rotated-out
//! cookie is rejected exactly like a revoked one.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use storefront_models::{AccessClaims, Role};

use crate::config::IssuerConfig;
use crate::error::IssuerError;
use crate::jwt::TokenSigner;

/// Seeded shopper account.
pub const SEED_CUSTOMER_EMAIL: &str = "customer@example.com";
/// Password of [`SEED_CUSTOMER_EMAIL`].
pub const SEED_CUSTOMER_PASSWORD: &str = "customer-pass";
/// Seeded back-office account.
pub const SEED_ADMIN_EMAIL: &str = "admin@example.com";
/// Password of [`SEED_ADMIN_EMAIL`].
pub const SEED_ADMIN_PASSWORD: &str = "admin-pass";

/// A registered account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Persisted record behind a refresh cookie.
#[derive(Debug, Clone)]
struct RefreshSession {
    user_id: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    users: HashMap<String, User>,
    sessions: HashMap<String, RefreshSession>,
    /// Live access token ids and their `exp`.
    live_access: HashMap<String, i64>,
    next_user_id: u64,
    failing_paths: HashSet<String>,
    path_delays: HashMap<String, Duration>,
}

impl Store {
    fn insert_user(&mut self, name: &str, email: &str, password: &str, role: Role) -> User {
        self.next_user_id += 1;
        let user = User {
            id: self.next_user_id.to_string(),
            name: name.to_string(),
            email: email.to_lowercase(),
            password: password.to_string(),
            role,
        };
        self.users.insert(user.email.clone(), user.clone());
        user
    }

    fn user_by_id(&self, id: &str) -> Option<&User> {
        self.users.values().find(|u| u.id == id)
    }

    /// Drop access ids and refresh sessions that are past their expiry.
    fn prune(&mut self, now: DateTime<Utc>) {
        let ts = now.timestamp();
        self.live_access.retain(|_, exp| *exp > ts);
        self.sessions.retain(|_, s| s.expires_at > now);
    }

    fn admit_access(&mut self, claims: &AccessClaims) {
        self.prune(Utc::now());
        self.live_access.insert(claims.jti.clone(), claims.exp);
    }
}

/// Outcome of a successful login, registration or refresh.
#[derive(Debug, Clone)]
pub struct IssuedPair {
    pub access_token: String,
    pub claims: AccessClaims,
    /// New refresh cookie value; `None` when the existing one stays valid.
    pub refresh_token: Option<String>,
}

/// State shared across all Axum handlers.
pub struct IssuerState {
    config: IssuerConfig,
    signer: TokenSigner,
    store: Mutex<Store>,
    refresh_calls: AtomicU64,
    refresh_delay_ms: AtomicU64,
    malformed_refresh: AtomicBool,
    reject_all_access: AtomicBool,
}

impl IssuerState {
    /// Create the state with the two seeded accounts.
    pub fn new(config: IssuerConfig) -> Self {
        let mut store = Store::default();
        store.insert_user("Casey Customer", SEED_CUSTOMER_EMAIL, SEED_CUSTOMER_PASSWORD, Role::Customer);
        store.insert_user("Ada Admin", SEED_ADMIN_EMAIL, SEED_ADMIN_PASSWORD, Role::Admin);

        Self {
            signer: TokenSigner::new(config.jwt_secret.as_bytes(), config.access_ttl_secs),
            config,
            store: Mutex::new(store),
            refresh_calls: AtomicU64::new(0),
            refresh_delay_ms: AtomicU64::new(0),
            malformed_refresh: AtomicBool::new(false),
            reject_all_access: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Issuer operations
    // ------------------------------------------------------------------

    /// Check email + password and open a new refresh session.
    pub fn login(&self, email: &str, password: &str) -> Result<IssuedPair, IssuerError> {
        let user = self
            .store()
            .users
            .get(&email.to_lowercase())
            .filter(|u| u.password == password)
            .cloned()
            .ok_or(IssuerError::InvalidCredentials)?;
        self.open_session(&user)
    }

    /// Create a customer account and open a refresh session for it.
    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<IssuedPair, IssuerError> {
        let user = {
            let mut store = self.store();
            if store.users.contains_key(&email.to_lowercase()) {
                return Err(IssuerError::Conflict(email.to_string()));
            }
            store.insert_user(name, email, password, Role::Customer)
        };
        self.open_session(&user)
    }

    /// Validate a refresh cookie and mint a new access token.
    ///
    /// With rotation enabled the presented cookie is consumed and a new one
    /// is returned in [`IssuedPair::refresh_token`].
    pub fn refresh(&self, refresh_token: Option<&str>) -> Result<IssuedPair, IssuerError> {
        let refresh_token =
            refresh_token.ok_or_else(|| IssuerError::RefreshRejected("no refresh cookie".into()))?;

        let mut store = self.store();
        let session = store
            .sessions
            .get(refresh_token)
            .cloned()
            .ok_or_else(|| IssuerError::RefreshRejected("unknown or revoked session".into()))?;

        if session.expires_at <= Utc::now() {
            store.sessions.remove(refresh_token);
            return Err(IssuerError::RefreshRejected("session expired".into()));
        }

        let role = store
            .user_by_id(&session.user_id)
            .map(|u| u.role)
            .ok_or_else(|| IssuerError::RefreshRejected("account no longer exists".into()))?;

        let (access_token, claims) = self.signer.issue(&session.user_id, role)?;
        store.admit_access(&claims);

        let rotated = if self.config.rotate_refresh {
            store.sessions.remove(refresh_token);
            let next = new_refresh_token();
            store.sessions.insert(next.clone(), session);
            Some(next)
        } else {
            None
        };

        Ok(IssuedPair {
            access_token,
            claims,
            refresh_token: rotated,
        })
    }

    /// Revoke the session behind a refresh cookie.  Unknown cookies are
    /// ignored.
    pub fn logout(&self, refresh_token: Option<&str>) {
        if let Some(token) = refresh_token {
            self.store().sessions.remove(token);
        }
    }

    /// Verify an access token and check that it is still live.
    pub fn authenticate(&self, token: &str) -> Result<AccessClaims, IssuerError> {
        if self.reject_all_access.load(Ordering::SeqCst) {
            return Err(IssuerError::Unauthorized("access tokens are being rejected".into()));
        }
        let claims = self.signer.verify(token)?;
        if !self.store().live_access.contains_key(&claims.jti) {
            return Err(IssuerError::Unauthorized("access token expired".into()));
        }
        Ok(claims)
    }

    /// Look up an account by id.
    pub fn user(&self, id: &str) -> Option<User> {
        self.store().user_by_id(id).cloned()
    }

    fn open_session(&self, user: &User) -> Result<IssuedPair, IssuerError> {
        let (access_token, claims) = self.signer.issue(&user.id, user.role)?;
        let refresh_token = new_refresh_token();
        let window = i64::try_from(self.config.cookie.max_age_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| chrono::Duration::weeks(52));

        let mut store = self.store();
        store.admit_access(&claims);
        store.sessions.insert(
            refresh_token.clone(),
            RefreshSession {
                user_id: user.id.clone(),
                expires_at: Utc::now() + window,
            },
        );

        Ok(IssuedPair {
            access_token,
            claims,
            refresh_token: Some(refresh_token),
        })
    }

    // ------------------------------------------------------------------
    // Fault injection and observation (tests, local development)
    // ------------------------------------------------------------------

    /// Open a session for a seeded or registered account without a
    /// password, returning the refresh cookie value.
    pub fn mint_session(&self, email: &str) -> Option<String> {
        let user = self.store().users.get(&email.to_lowercase()).cloned()?;
        self.open_session(&user).ok()?.refresh_token
    }

    /// Make every access token issued so far answer `401`.
    pub fn expire_access_tokens(&self) {
        self.store().live_access.clear();
    }

    /// Revoke every refresh session.
    pub fn revoke_refresh_sessions(&self) {
        self.store().sessions.clear();
    }

    /// Number of live refresh sessions.
    pub fn session_count(&self) -> usize {
        self.store().sessions.len()
    }

    /// Delay applied before answering each refresh call.
    pub fn set_refresh_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.refresh_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub(crate) fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms.load(Ordering::SeqCst))
    }

    /// Answer refresh calls with `200 {}` instead of a token.
    pub fn set_malformed_refresh(&self, malformed: bool) {
        self.malformed_refresh.store(malformed, Ordering::SeqCst);
    }

    pub(crate) fn malformed_refresh(&self) -> bool {
        self.malformed_refresh.load(Ordering::SeqCst)
    }

    /// Answer every request to `path` with `503`.
    pub fn fail_path(&self, path: &str) {
        self.store().failing_paths.insert(path.to_string());
    }

    /// Hold every request to `path` for `delay` before handling it.
    pub fn delay_path(&self, path: &str, delay: Duration) {
        self.store().path_delays.insert(path.to_string(), delay);
    }

    pub(crate) fn path_fault(&self, path: &str) -> (Option<Duration>, bool) {
        let store = self.store();
        (
            store.path_delays.get(path).copied(),
            store.failing_paths.contains(path),
        )
    }

    /// Reject every access token, even freshly refreshed ones.
    pub fn set_reject_all_access(&self, reject: bool) {
        self.reject_all_access.store(reject, Ordering::SeqCst);
    }

    pub(crate) fn record_refresh_call(&self) {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of calls the refresh endpoint has received.
    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

fn new_refresh_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}
