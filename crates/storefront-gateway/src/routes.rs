//! Gateway routes.
//!
//! Every handler builds its own [`ForwardingClient`] from the inbound
//! headers and drops it when the response is sent.  Nothing about a
//! caller's session outlives its request.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use storefront_sdk::{ClientConfig, ForwardingClient};
use tracing::info;

use crate::error::GatewayError;

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// State shared across all Axum handlers.
pub struct AppState {
    /// Upstream API configuration, cloned into each per-request client.
    pub upstream: ClientConfig,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/storefront/catalog", get(catalog))
        .route("/storefront/account", get(account))
        .route("/storefront/admin", get(admin))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Attach any rotated refresh cookies to the response, whether the fan-out
/// succeeded or not.
fn respond(client: &ForwardingClient, result: Result<Value, GatewayError>) -> Response {
    let cookies = AppendHeaders(
        client
            .relayed_set_cookies()
            .into_iter()
            .map(|c| (header::SET_COOKIE, c)),
    );
    match result {
        Ok(body) => (cookies, Json(body)).into_response(),
        Err(e) => (cookies, e).into_response(),
    }
}

fn forwarding_client(state: &AppState, headers: &HeaderMap) -> Result<ForwardingClient, GatewayError> {
    ForwardingClient::from_inbound(&state.upstream, headers).map_err(GatewayError::from)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /healthz`
async fn healthz() -> &'static str {
    "ok"
}

/// `GET /storefront/catalog`: brands and products, no session required.
async fn catalog(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let client = match forwarding_client(&state, &headers) {
        Ok(client) => client,
        Err(e) => return e.into_response(),
    };
    let (brands, products) = tokio::join!(
        client.get_json::<Value>("/api/brands"),
        client.get_json::<Value>("/api/products"),
    );
    let result = brands
        .and_then(|brands| Ok(json!({ "brands": brands, "products": products? })))
        .map_err(GatewayError::from);

    respond(&client, result)
}

/// `GET /storefront/account`: profile, cart and orders for the caller.
///
/// The three upstream calls run concurrently; if the access token has
/// expired they share a single refresh.  All three are awaited before the
/// first failure is reported, so a refresh in flight still lands and its
/// rotated cookie is relayed.
async fn account(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let client = match forwarding_client(&state, &headers) {
        Ok(client) => client,
        Err(e) => return e.into_response(),
    };
    let (me, cart, orders) = tokio::join!(
        client.get_json::<Value>("/api/me"),
        client.get_json::<Value>("/api/cart"),
        client.get_json::<Value>("/api/orders"),
    );
    let result = me
        .and_then(|me| Ok(json!({ "me": me, "cart": cart?, "orders": orders? })))
        .map_err(GatewayError::from);

    info!(
        ok = result.is_ok(),
        refreshes = client.refresh_count(),
        session_ended = client.session_ended(),
        "account view"
    );
    respond(&client, result)
}

/// `GET /storefront/admin`: the upstream admin dashboard.
async fn admin(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let client = match forwarding_client(&state, &headers) {
        Ok(client) => client,
        Err(e) => return e.into_response(),
    };
    let result = client
        .get_json::<Value>("/api/admin/dashboard")
        .await
        .map_err(GatewayError::from);

    respond(&client, result)
}
