//! Token issuance against the identity provider.
//!
//! The provider speaks the Cognito `x-amz-json-1.1` wire: a single
//! endpoint, with the operation named in the `X-Amz-Target` header.
//! Only three operations are used here: password authentication, refresh,
//! and refresh-token revocation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const TARGET_INITIATE_AUTH: &str = "AWSCognitoIdentityProviderService.InitiateAuth";
const TARGET_REVOKE_TOKEN: &str = "AWSCognitoIdentityProviderService.RevokeToken";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
/// Transport failures are retried once.
const ATTEMPTS: u32 = 2;

fn default_expiry() -> u64 {
    3600
}

/// Tokens minted by the identity provider.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    /// Absent on refresh when the provider does not rotate refresh tokens.
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: u64,
}

/// Errors from the identity provider.
#[derive(Debug)]
pub enum IssuerError {
    /// The provider refused the credentials or the token.
    Rejected(String),
    /// The provider answered but without an access token.
    NoAccessToken,
    /// The provider could not be reached.
    Transport(String),
}

impl std::fmt::Display for IssuerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssuerError::Rejected(e) => write!(f, "Identity provider rejected the request: {}", e),
            IssuerError::NoAccessToken => {
                write!(f, "Identity provider returned no access token")
            }
            IssuerError::Transport(e) => write!(f, "Identity provider unreachable: {}", e),
        }
    }
}

impl std::error::Error for IssuerError {}

/// Mints and revokes tokens. Injected so tests can supply a fake that
/// never touches the network.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Exchange a username and password for a token pair.
    async fn authenticate(&self, username: &str, password: &str)
    -> Result<TokenPair, IssuerError>;

    /// Exchange a refresh token for a fresh token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, IssuerError>;

    /// Invalidate a refresh token at the provider.
    async fn revoke(&self, refresh_token: &str) -> Result<(), IssuerError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: Option<String>,
    refresh_token: Option<String>,
    id_token: Option<String>,
    #[serde(default = "default_expiry")]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
}

/// Issuer backed by an AWS Cognito user pool (or anything speaking the
/// same wire).
pub struct CognitoIssuer {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
}

impl CognitoIssuer {
    pub fn new(region: &str, client_id: impl Into<String>) -> Self {
        Self::with_endpoint(
            format!("https://cognito-idp.{}.amazonaws.com/", region),
            client_id,
        )
    }

    /// Point the issuer at an explicit endpoint, for local providers.
    pub fn with_endpoint(endpoint: impl Into<String>, client_id: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            endpoint: endpoint.into(),
            client_id: client_id.into(),
        }
    }

    async fn post(&self, target: &str, body: &Value) -> Result<reqwest::Response, IssuerError> {
        let mut last_error = String::new();
        for attempt in 1..=ATTEMPTS {
            let result = self
                .client
                .post(&self.endpoint)
                .header("Content-Type", AMZ_JSON)
                .header("X-Amz-Target", target)
                .json(body)
                .send()
                .await;
            match result {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(target = %target, attempt, error = %e, "Identity provider request failed");
                    last_error = e.to_string();
                }
            }
        }
        Err(IssuerError::Transport(last_error))
    }

    /// Run an InitiateAuth flow. When the provider omits a refresh token
    /// from the result, `fallback_refresh` (the token that was presented)
    /// is echoed back so callers always know the session's refresh token.
    async fn initiate_auth(
        &self,
        flow: &str,
        auth_parameters: Value,
        fallback_refresh: Option<&str>,
    ) -> Result<TokenPair, IssuerError> {
        let body = json!({
            "AuthFlow": flow,
            "ClientId": self.client_id,
            "AuthParameters": auth_parameters,
        });
        let response = self.post(TARGET_INITIATE_AUTH, &body).await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(flow = %flow, status = %status, "Identity provider rejected authentication");
            return Err(IssuerError::Rejected(text));
        }

        let parsed: InitiateAuthResponse = response
            .json()
            .await
            .map_err(|e| IssuerError::Transport(e.to_string()))?;
        let result = parsed
            .authentication_result
            .ok_or(IssuerError::NoAccessToken)?;
        let access_token = result.access_token.ok_or(IssuerError::NoAccessToken)?;

        debug!(flow = %flow, "Identity provider issued tokens");
        Ok(TokenPair {
            access_token,
            refresh_token: result
                .refresh_token
                .or_else(|| fallback_refresh.map(str::to_string)),
            id_token: result.id_token,
            expires_in: result.expires_in,
        })
    }
}

#[async_trait]
impl TokenIssuer for CognitoIssuer {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, IssuerError> {
        self.initiate_auth(
            "USER_PASSWORD_AUTH",
            json!({ "USERNAME": username, "PASSWORD": password }),
            None,
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, IssuerError> {
        self.initiate_auth(
            "REFRESH_TOKEN_AUTH",
            json!({ "REFRESH_TOKEN": refresh_token }),
            Some(refresh_token),
        )
        .await
    }

    async fn revoke(&self, refresh_token: &str) -> Result<(), IssuerError> {
        let body = json!({ "Token": refresh_token, "ClientId": self.client_id });
        let response = self.post(TARGET_REVOKE_TOKEN, &body).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IssuerError::Rejected(text));
        }
        Ok(())
    }
}
