//! CLI argument parsing, validation, and startup helpers.

use clap::Parser;
use tracing::error;
use url::Url;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mailgate",
    about = "Authenticating gateway for a mail-access API"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7390")]
    pub port: u16,

    /// Identity provider app client id that tokens must be bound to
    #[arg(long, env = "MAILGATE_CLIENT_ID")]
    pub client_id: String,

    /// Identity provider region, used to derive the provider endpoint
    #[arg(long, env = "MAILGATE_IDP_REGION", default_value = "us-east-1")]
    pub idp_region: String,

    /// Explicit identity provider endpoint, overriding the regional one
    #[arg(long, env = "MAILGATE_IDP_ENDPOINT")]
    pub idp_endpoint: Option<String>,

    /// Comma-separated list of allowed CORS origins; empty disables CORS
    #[arg(long, env = "MAILGATE_CORS_ORIGINS", default_value = "")]
    pub cors_origins: String,

    /// Public base URL, used to build the session resource's service URLs
    #[arg(long, env = "MAILGATE_BASE_URL", default_value = "http://localhost:7390")]
    pub base_url: String,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Parse and validate the public base URL.
/// Returns None and logs an error if validation fails.
pub fn validate_base_url(base_url: &str) -> Option<Url> {
    let url = match Url::parse(base_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %base_url, error = %e, "Invalid base URL");
            return None;
        }
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        error!(url = %base_url, "Base URL must use http or https");
        return None;
    }

    Some(url)
}
