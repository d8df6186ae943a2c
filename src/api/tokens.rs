//! Public token endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use serde_json::json;
use tracing::{debug, warn};

use crate::auth::{
    REFRESH_COOKIE_NAME, TokenIssuer, clear_access_cookie, clear_refresh_cookie, cookie_value,
};

#[derive(Clone)]
pub struct TokensState {
    pub issuer: Arc<dyn TokenIssuer>,
}

/// End the session. Revocation at the identity provider is best effort:
/// the client's cookies are cleared no matter what, and calling this with
/// no session at all still succeeds.
pub async fn logout(State(state): State<TokensState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(refresh_token) = cookie_value(&headers, REFRESH_COOKIE_NAME) {
        match state.issuer.revoke(&refresh_token).await {
            Ok(()) => debug!("Refresh token revoked"),
            Err(e) => warn!(error = %e, "Refresh token revocation failed, clearing cookies anyway"),
        }
    }

    (
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, clear_access_cookie()),
            (SET_COOKIE, clear_refresh_cookie()),
        ]),
        Json(json!({ "success": true })),
    )
}
