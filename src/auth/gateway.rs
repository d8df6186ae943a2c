//! Request authentication orchestration.
//!
//! One entry point, `AuthGateway::resolve`, turns the credentials on a
//! request into either a resolved session or a denial. Precedence:
//! bearer token first (cookie over header), then transparent refresh,
//! then Basic credentials. A bearer presented explicitly in the
//! `Authorization` header fails hard, with no fallback: callers who send
//! a token expect a verdict on that token, not a silent re-login.
//!
//! `require_session` wraps the decision as axum middleware and appends
//! any freshly minted session cookies to the response.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::cookie::{access_cookie, refresh_cookie};
use super::credentials::{BearerSource, CredentialBundle, decode_basic};
use super::issuer::{IssuerError, TokenIssuer, TokenPair};
use super::verify::{BearerVerifier, unverified_claims};
use crate::problem::ApiError;

/// The authenticated caller, stored in request extensions for handlers.
#[derive(Debug, Clone)]
pub struct Identity {
    pub username: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Claims of the access token, when they were decoded along the way.
    pub claims: Option<Map<String, Value>>,
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Identity>().cloned().ok_or_else(|| {
            ApiError::internal(
                "Identity missing from request extensions",
                "require_session layer not applied to this route",
            )
        })
    }
}

/// A successful authentication: who the caller is, plus any Set-Cookie
/// values the response must carry to persist the session.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub identity: Identity,
    pub cookies: Vec<String>,
}

/// Authenticates requests using an injected token issuer and bearer
/// verifier.
#[derive(Clone)]
pub struct AuthGateway {
    issuer: Arc<dyn TokenIssuer>,
    verifier: Arc<BearerVerifier>,
}

impl AuthGateway {
    pub fn new(issuer: Arc<dyn TokenIssuer>, verifier: Arc<BearerVerifier>) -> Self {
        Self { issuer, verifier }
    }

    /// Resolve the request's credentials into a session or a denial.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<ResolvedSession, ApiError> {
        let bundle = CredentialBundle::from_headers(headers);

        if bundle.is_empty() {
            return Err(ApiError::unauthorized(
                "No authentication method provided. Supply a bearer token, \
                 session cookie, or Basic credentials.",
            ));
        }

        let mut denial = None;

        if let Some((token, source)) = bundle.bearer() {
            match self.verifier.verify(token).await {
                Ok(claims) => {
                    debug!(source = ?source, "Bearer token verified");
                    let claims = serde_json::to_value(&claims)
                        .ok()
                        .and_then(|v| match v {
                            Value::Object(map) => Some(map),
                            _ => None,
                        });
                    return Ok(ResolvedSession {
                        identity: Identity {
                            username: claims.as_ref().and_then(claims_username),
                            access_token: token.to_string(),
                            refresh_token: bundle.refresh_token.clone(),
                            claims,
                        },
                        // The token the client presented still works; no
                        // cookies need (re)setting.
                        cookies: Vec::new(),
                    });
                }
                Err(e) if source == BearerSource::Header => return Err(e),
                Err(e) => denial = Some(e),
            }
        }

        if let Some(refresh_token) = bundle.refresh_token.as_deref() {
            match self.issuer.refresh(refresh_token).await {
                Ok(pair) => {
                    debug!("Session refreshed from refresh cookie");
                    return Ok(self.session_from_pair(pair, None));
                }
                Err(IssuerError::NoAccessToken) => {
                    denial = Some(ApiError::upstream(
                        "Identity provider returned no access token",
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "Refresh token exchange failed");
                    denial = Some(ApiError::unauthorized("Invalid or expired refresh token"));
                }
            }
        }

        if bundle.bearer_from_header.is_none() {
            if let Some(payload) = bundle.basic_payload.as_deref() {
                let (username, password) = decode_basic(payload)?;
                match self.issuer.authenticate(&username, &password).await {
                    Ok(pair) => {
                        debug!(username = %username, "Basic credentials accepted");
                        return Ok(self.session_from_pair(pair, Some(username)));
                    }
                    Err(IssuerError::NoAccessToken) => {
                        denial = Some(ApiError::upstream(
                            "Identity provider returned no access token",
                        ));
                    }
                    Err(e) => {
                        warn!(username = %username, error = %e, "Basic authentication failed");
                        denial = Some(ApiError::unauthorized("Invalid credentials"));
                    }
                }
            }
        }

        Err(denial.unwrap_or_else(|| {
            ApiError::unauthorized(
                "No authentication method provided. Supply a bearer token, \
                 session cookie, or Basic credentials.",
            )
        }))
    }

    /// Build a session around freshly issued tokens. The new tokens have
    /// not been round-tripped through the verifier; their claims are read
    /// unverified because they just came from the issuer itself.
    fn session_from_pair(&self, pair: TokenPair, username_hint: Option<String>) -> ResolvedSession {
        let mut cookies = vec![access_cookie(&pair.access_token)];
        // A refresh cookie is only set alongside its access cookie.
        if let Some(rt) = pair.refresh_token.as_deref() {
            cookies.push(refresh_cookie(rt));
        }

        let claims = unverified_claims(&pair.access_token);
        let username = claims
            .as_ref()
            .and_then(claims_username)
            .or(username_hint);

        ResolvedSession {
            identity: Identity {
                username,
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
                claims,
            },
            cookies,
        }
    }
}

fn claims_username(claims: &Map<String, Value>) -> Option<String> {
    ["username", "cognito:username", "email", "sub"]
        .iter()
        .find_map(|key| claims.get(*key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Middleware that authenticates the request, stores the `Identity` in
/// request extensions, and appends session cookies to the response.
pub async fn require_session(
    State(gateway): State<AuthGateway>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = match gateway.resolve(request.headers()).await {
        Ok(session) => session,
        Err(deny) => return deny.into_response(),
    };

    request.extensions_mut().insert(session.identity);
    let mut response = next.run(request).await;

    for cookie in &session.cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Dropping unencodable session cookie"),
        }
    }
    response
}
