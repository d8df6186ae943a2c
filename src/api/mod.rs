//! HTTP surface: protected session resources behind the authentication
//! middleware, plus public token endpoints.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use url::Url;

use crate::auth::{AuthGateway, TokenIssuer, require_session};

pub mod session;
pub mod tokens;

use session::SessionState;
use tokens::TokensState;

/// Assemble the API router. Everything except logout requires a session.
pub fn create_api_router(
    gateway: AuthGateway,
    issuer: Arc<dyn TokenIssuer>,
    base_url: Url,
) -> Router {
    let protected = Router::new()
        .route("/.well-known/jmap", get(session::session_resource))
        .route("/auth/session", get(session::verify_session))
        .with_state(SessionState { base_url })
        .layer(middleware::from_fn_with_state(gateway, require_session));

    // Logout is public: a caller with no valid session can still clear
    // their cookies.
    let public = Router::new()
        .route("/auth/logout", post(tokens::logout))
        .with_state(TokensState { issuer });

    protected.merge(public)
}
