pub mod api;
pub mod auth;
pub mod cli;
pub mod cors;
pub mod problem;

use std::sync::Arc;

use api::create_api_router;
use auth::{AuthGateway, BearerVerifier, KeyProvider, TokenIssuer};
use axum::Router;
use cors::cors_layer;
use tokio::net::TcpListener;
use url::Url;

pub struct ServerConfig {
    /// Identity provider app client id that tokens must be bound to
    pub client_id: String,
    /// Public base URL, used to build the session resource's service URLs
    pub base_url: Url,
    /// Comma-separated CORS origin allow-list; empty disables CORS
    pub cors_origins: String,
}

/// Create the application router with the given configuration.
pub fn create_app(
    config: &ServerConfig,
    issuer: Arc<dyn TokenIssuer>,
    keys: Arc<dyn KeyProvider>,
) -> Router {
    let verifier = Arc::new(BearerVerifier::new(keys, config.client_id.clone()));
    let gateway = AuthGateway::new(issuer.clone(), verifier);

    let router = create_api_router(gateway, issuer, config.base_url.clone());

    match cors_layer(&config.cors_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// Run the server on the given listener. This function blocks until the
/// server exits.
pub async fn run_server(
    config: ServerConfig,
    issuer: Arc<dyn TokenIssuer>,
    keys: Arc<dyn KeyProvider>,
    listener: TcpListener,
) -> Result<(), std::io::Error> {
    let app = create_app(&config, issuer, keys);
    axum::serve(listener, app).await
}
