use std::sync::Arc;

use clap::Parser;
use mailgate::auth::{CognitoIssuer, HttpKeyProvider};
use mailgate::cli::{Args, init_logging, validate_base_url};
use mailgate::{ServerConfig, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(base_url) = validate_base_url(&args.base_url) else {
        std::process::exit(1);
    };

    let issuer = match args.idp_endpoint.as_deref() {
        Some(endpoint) => CognitoIssuer::with_endpoint(endpoint, args.client_id.clone()),
        None => CognitoIssuer::new(&args.idp_region, args.client_id.clone()),
    };
    let keys = HttpKeyProvider::new();

    let config = ServerConfig {
        client_id: args.client_id,
        base_url,
        cors_origins: args.cors_origins,
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener
        .local_addr()
        .unwrap_or_else(|_| ([0, 0, 0, 0], args.port).into());

    info!(address = %local_addr, "Listening");

    if let Err(e) = run_server(config, Arc::new(issuer), Arc::new(keys), listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
