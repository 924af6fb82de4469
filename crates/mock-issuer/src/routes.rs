//! HTTP surface of the mock issuer.
//!
//! Two groups of routes share one router:
//!
//! * `/auth/*`: the credential-issuer contract (login, register, refresh,
//!   logout).
//! * `/api/*`: a handful of storefront entity endpoints.  Brands and
//!   products are public; the rest need a live bearer token.

use std::sync::Arc;

use axum::extract::{Json, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use storefront_models::{
    find_cookie, AccessClaims, AccessToken, AuthEndpoint, LoginRequest, RegisterRequest, Role,
    TokenResponse,
};
use tracing::info;

use crate::error::IssuerError;
use crate::state::{IssuedPair, IssuerState};

/// Build the issuer + demo API router.
pub fn router(state: Arc<IssuerState>) -> Router {
    Router::new()
        .route(AuthEndpoint::Login.path(), post(login))
        .route(AuthEndpoint::Register.path(), post(register))
        .route(AuthEndpoint::Refresh.path(), post(refresh))
        .route(AuthEndpoint::Logout.path(), post(logout))
        .route("/api/brands", get(list_brands))
        .route("/api/products", get(list_products))
        .route("/api/me", get(me))
        .route("/api/cart", get(cart))
        .route("/api/orders", get(orders))
        .route("/api/admin/dashboard", get(admin_dashboard))
        .layer(middleware::from_fn_with_state(state.clone(), inject_faults))
        .with_state(state)
}

/// Apply the per-path delay and failure switches before routing.
async fn inject_faults(
    State(state): State<Arc<IssuerState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let (delay, failing) = state.path_fault(&path);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if failing {
        return IssuerError::Unavailable(path).into_response();
    }
    next.run(request).await
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn refresh_cookie(state: &IssuerState, headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| find_cookie(v, &state.config().cookie.name))
        .filter(|v| !v.is_empty())
}

fn bearer_claims(state: &IssuerState, headers: &HeaderMap) -> Result<AccessClaims, IssuerError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(AccessToken::from_bearer_header)
        .ok_or_else(|| IssuerError::Unauthorized("missing bearer token".into()))?;
    state.authenticate(token.as_str())
}

fn token_response(state: &IssuerState, pair: IssuedPair) -> Response {
    let body = Json(TokenResponse {
        access_token: Some(pair.access_token),
    });
    match pair.refresh_token {
        Some(refresh) => (
            [(header::SET_COOKIE, state.config().cookie.set_cookie(&refresh))],
            body,
        )
            .into_response(),
        None => body.into_response(),
    }
}

// ---------------------------------------------------------------------------
// Issuer handlers
// ---------------------------------------------------------------------------

/// `POST /auth/login`
async fn login(
    State(state): State<Arc<IssuerState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, IssuerError> {
    let pair = state.login(&req.email, &req.password)?;
    info!(sub = %pair.claims.sub, role = %pair.claims.role, "login");
    Ok(token_response(&state, pair))
}

/// `POST /auth/register`
async fn register(
    State(state): State<Arc<IssuerState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, IssuerError> {
    let pair = state.register(&req.name, &req.email, &req.password)?;
    info!(sub = %pair.claims.sub, "account registered");
    Ok(token_response(&state, pair))
}

/// `POST /auth/refresh`
///
/// A rejected refresh also clears the cookie so the browser stops
/// presenting it.
async fn refresh(State(state): State<Arc<IssuerState>>, headers: HeaderMap) -> Response {
    state.record_refresh_call();

    let delay = state.refresh_delay();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    if state.malformed_refresh() {
        return Json(json!({})).into_response();
    }

    let cookie = refresh_cookie(&state, &headers);
    match state.refresh(cookie.as_deref()) {
        Ok(pair) => {
            info!(
                sub = %pair.claims.sub,
                rotated = pair.refresh_token.is_some(),
                "access token refreshed"
            );
            token_response(&state, pair)
        }
        Err(e) => (
            [(header::SET_COOKIE, state.config().cookie.clear_cookie())],
            e,
        )
            .into_response(),
    }
}

/// `POST /auth/logout`
async fn logout(State(state): State<Arc<IssuerState>>, headers: HeaderMap) -> impl IntoResponse {
    state.logout(refresh_cookie(&state, &headers).as_deref());
    info!("logout");
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, state.config().cookie.clear_cookie())],
    )
}

// ---------------------------------------------------------------------------
// Storefront handlers
// ---------------------------------------------------------------------------

async fn list_brands() -> Json<Value> {
    Json(json!([
        { "id": 1, "name": "Northwind" },
        { "id": 2, "name": "Contoso" },
    ]))
}

async fn list_products() -> Json<Value> {
    Json(json!([
        { "id": 10, "brandId": 1, "name": "Trail Jacket", "price": 129.0 },
        { "id": 11, "brandId": 2, "name": "City Backpack", "price": 59.5 },
    ]))
}

async fn me(
    State(state): State<Arc<IssuerState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, IssuerError> {
    let claims = bearer_claims(&state, &headers)?;
    let user = state
        .user(&claims.sub)
        .ok_or_else(|| IssuerError::Unauthorized("account no longer exists".into()))?;
    Ok(Json(json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "role": user.role,
    })))
}

async fn cart(
    State(state): State<Arc<IssuerState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, IssuerError> {
    let claims = bearer_claims(&state, &headers)?;
    Ok(Json(json!({
        "userId": claims.sub,
        "items": [ { "productId": 10, "quantity": 1 } ],
    })))
}

async fn orders(
    State(state): State<Arc<IssuerState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, IssuerError> {
    let claims = bearer_claims(&state, &headers)?;
    Ok(Json(json!([
        { "id": format!("ord-{}-1", claims.sub), "userId": claims.sub, "status": "paid", "total": 129.0 },
    ])))
}

async fn admin_dashboard(
    State(state): State<Arc<IssuerState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, IssuerError> {
    let claims = bearer_claims(&state, &headers)?;
    if claims.role != Role::Admin {
        return Err(IssuerError::Forbidden("admin only".into()));
    }
    Ok(Json(json!({ "openOrders": 1, "sessions": state.session_count() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IssuerConfig;
    use crate::state::{SEED_ADMIN_EMAIL, SEED_CUSTOMER_EMAIL, SEED_CUSTOMER_PASSWORD};
    use axum::http::HeaderValue;
    use axum_test::TestServer;

    fn setup() -> (TestServer, Arc<IssuerState>) {
        let state = Arc::new(IssuerState::new(IssuerConfig::default()));
        let server = TestServer::new(router(state.clone())).unwrap();
        (server, state)
    }

    fn cookie_header(state: &IssuerState, value: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("{}={value}", state.config().cookie.name)).unwrap()
    }

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
    }

    #[tokio::test]
    async fn login_sets_cookie_and_returns_token() {
        let (server, _) = setup();
        let response = server
            .post("/auth/login")
            .json(&json!({ "email": SEED_CUSTOMER_EMAIL, "password": SEED_CUSTOMER_PASSWORD }))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let set_cookie = response.header(header::SET_COOKIE);
        let set_cookie = set_cookie.to_str().unwrap();
        assert!(set_cookie.starts_with("refreshToken="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Strict"));

        let body: TokenResponse = response.json();
        assert!(body.access_token.is_some());
    }

    #[tokio::test]
    async fn login_with_bad_password_is_unauthorized() {
        let (server, _) = setup();
        let response = server
            .post("/auth/login")
            .json(&json!({ "email": SEED_CUSTOMER_EMAIL, "password": "wrong" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_rotates_cookie() {
        let (server, state) = setup();
        let cookie = state.mint_session(SEED_CUSTOMER_EMAIL).unwrap();

        let response = server
            .post("/auth/refresh")
            .add_header(header::COOKIE, cookie_header(&state, &cookie))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let rotated = response.header(header::SET_COOKIE);
        assert!(!rotated.to_str().unwrap().contains(&cookie));
        assert_eq!(state.refresh_calls(), 1);

        let replay = server
            .post("/auth/refresh")
            .add_header(header::COOKIE, cookie_header(&state, &cookie))
            .await;
        assert_eq!(replay.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejected_refresh_clears_cookie() {
        let (server, state) = setup();
        let response = server.post("/auth/refresh").await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.header(header::SET_COOKIE).to_str().unwrap(),
            state.config().cookie.clear_cookie()
        );
    }

    #[tokio::test]
    async fn malformed_refresh_returns_empty_body() {
        let (server, state) = setup();
        state.set_malformed_refresh(true);
        let cookie = state.mint_session(SEED_CUSTOMER_EMAIL).unwrap();
        let response = server
            .post("/auth/refresh")
            .add_header(header::COOKIE, cookie_header(&state, &cookie))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: TokenResponse = response.json();
        assert!(body.access_token.is_none());
    }

    #[tokio::test]
    async fn logout_clears_with_matching_attributes() {
        let (server, state) = setup();
        let cookie = state.mint_session(SEED_CUSTOMER_EMAIL).unwrap();
        let response = server
            .post("/auth/logout")
            .add_header(header::COOKIE, cookie_header(&state, &cookie))
            .await;
        assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.header(header::SET_COOKIE).to_str().unwrap(),
            state.config().cookie.clear_cookie()
        );
        assert_eq!(state.session_count(), 0);
    }

    #[tokio::test]
    async fn protected_endpoint_requires_live_token() {
        let (server, state) = setup();
        let pair = state.login(SEED_CUSTOMER_EMAIL, SEED_CUSTOMER_PASSWORD).unwrap();

        let ok = server
            .get("/api/cart")
            .add_header(header::AUTHORIZATION, bearer(&pair.access_token))
            .await;
        assert_eq!(ok.status_code(), StatusCode::OK);

        state.expire_access_tokens();
        let expired = server
            .get("/api/cart")
            .add_header(header::AUTHORIZATION, bearer(&pair.access_token))
            .await;
        assert_eq!(expired.status_code(), StatusCode::UNAUTHORIZED);

        let anonymous = server.get("/api/cart").await;
        assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn failing_path_answers_unavailable() {
        let (server, state) = setup();
        let pair = state.login(SEED_CUSTOMER_EMAIL, SEED_CUSTOMER_PASSWORD).unwrap();
        state.fail_path("/api/orders");

        let failed = server
            .get("/api/orders")
            .add_header(header::AUTHORIZATION, bearer(&pair.access_token))
            .await;
        assert_eq!(failed.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let cart = server
            .get("/api/cart")
            .add_header(header::AUTHORIZATION, bearer(&pair.access_token))
            .await;
        assert_eq!(cart.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn public_endpoints_need_no_token() {
        let (server, _) = setup();
        assert_eq!(server.get("/api/brands").await.status_code(), StatusCode::OK);
        assert_eq!(server.get("/api/products").await.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_dashboard_is_forbidden_for_customers() {
        let (server, state) = setup();
        let pair = state.login(SEED_CUSTOMER_EMAIL, SEED_CUSTOMER_PASSWORD).unwrap();
        let response = server
            .get("/api/admin/dashboard")
            .add_header(header::AUTHORIZATION, bearer(&pair.access_token))
            .await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

        let admin_cookie = state.mint_session(SEED_ADMIN_EMAIL).unwrap();
        let admin = state.refresh(Some(&admin_cookie)).unwrap();
        let response = server
            .get("/api/admin/dashboard")
            .add_header(header::AUTHORIZATION, bearer(&admin.access_token))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }
}
