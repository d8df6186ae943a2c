//! Bearer token verification.
//!
//! The issuer claim is peeked from the unverified payload only to locate
//! the key set; everything else is checked after full RS256 signature
//! verification. All verification failures collapse to a generic 401 for
//! the caller, with detail kept in server-side logs. The one exception is
//! a token with no issuer claim at all, which is a 400.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::jwks::KeyProvider;
use crate::problem::ApiError;

/// Token purpose, carried by provider-issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    /// Access token: bound to the app client via `client_id`.
    Access,
    /// Identity token: bound to the app client via `aud`.
    Id,
}

/// Audience claim: a single client id or a list of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Audience::One(aud) => aud == client_id,
            Audience::Many(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

/// Claims decoded from a verified bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub token_use: Option<TokenUse>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    pub exp: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, rename = "cognito:username")]
    pub cognito_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenClaims {
    /// Best username available: access tokens carry `username`, identity
    /// tokens `cognito:username` or `email`.
    pub fn display_name(&self) -> Option<String> {
        self.username
            .clone()
            .or_else(|| self.cognito_username.clone())
            .or_else(|| self.email.clone())
            .or_else(|| self.sub.clone())
    }
}

/// Verifies bearer tokens against issuer-published key sets and checks
/// their client binding.
pub struct BearerVerifier {
    keys: Arc<dyn KeyProvider>,
    client_id: String,
}

impl BearerVerifier {
    pub fn new(keys: Arc<dyn KeyProvider>, client_id: impl Into<String>) -> Self {
        Self {
            keys,
            client_id: client_id.into(),
        }
    }

    /// Verify a bearer token and check its claims. Returns the decoded
    /// claims on success, a client-safe denial otherwise.
    pub async fn verify(&self, token: &str) -> Result<TokenClaims, ApiError> {
        let issuer = peek_issuer(token)?;

        let key_set = self.keys.key_set(&issuer).await.map_err(|e| {
            warn!(issuer = %issuer, error = %e, "Failed to resolve verification keys");
            invalid_token()
        })?;

        let header = decode_header(token).map_err(|e| {
            warn!(error = %e, "Token header is not decodable");
            invalid_token()
        })?;
        let kid = header.kid.as_deref().unwrap_or_default();
        let jwk = key_set.find(kid).ok_or_else(|| {
            warn!(issuer = %issuer, kid = %kid, "No matching key in issuer key set");
            invalid_token()
        })?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| {
            warn!(error = %e, "Key set entry is not usable");
            invalid_token()
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        // Audience binding is checked below, per token_use.
        validation.validate_aud = false;

        let data = decode::<TokenClaims>(token, &key, &validation).map_err(|e| {
            warn!(issuer = %issuer, error = %e, "Token verification failed");
            invalid_token()
        })?;
        let claims = data.claims;

        match (claims.token_use, &claims.aud) {
            (Some(TokenUse::Access), _) => {
                if claims.client_id.as_deref() != Some(self.client_id.as_str()) {
                    warn!(issuer = %issuer, "Access token bound to a different client");
                    return Err(invalid_token());
                }
            }
            // A token without token_use but carrying an audience is treated
            // as an identity token.
            (Some(TokenUse::Id), aud) | (None, aud @ Some(_)) => {
                let bound = aud
                    .as_ref()
                    .is_some_and(|aud| aud.contains(&self.client_id));
                if !bound {
                    warn!(issuer = %issuer, "Identity token audience does not include this client");
                    return Err(invalid_token());
                }
            }
            (None, None) => {
                warn!(issuer = %issuer, "Token carries neither token_use nor audience");
                return Err(invalid_token());
            }
        }

        Ok(claims)
    }
}

fn invalid_token() -> ApiError {
    ApiError::unauthorized("Invalid token")
}

/// Decode the payload segment without verifying the signature, returning
/// only the issuer claim. Structural problems are a 401; a syntactically
/// fine token with no issuer is a 400.
fn peek_issuer(token: &str) -> Result<String, ApiError> {
    let claims = unverified_claims(token).ok_or_else(|| {
        warn!("Bearer token is structurally invalid");
        invalid_token()
    })?;
    match claims.get("iss").and_then(Value::as_str) {
        Some(issuer) => Ok(issuer.to_string()),
        None => Err(ApiError::bad_request("Token is missing an issuer claim")),
    }
}

/// Decode a token payload without verification. Only for tokens that just
/// came from the issuer itself, or to locate the key set before real
/// verification.
pub(crate) fn unverified_claims(token: &str) -> Option<Map<String, Value>> {
    let payload = token.split('.').nth(1)?;
    if payload.is_empty() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_token(claims: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(b"{\"alg\":\"RS256\",\"typ\":\"JWT\"}");
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        format!("{}.{}.sig", header, payload)
    }

    #[test]
    fn test_peek_issuer_reads_unverified_payload() {
        let token = fake_token(serde_json::json!({"iss": "https://idp.example.com/pool"}));
        assert_eq!(
            peek_issuer(&token).unwrap(),
            "https://idp.example.com/pool"
        );
    }

    #[test]
    fn test_peek_issuer_rejects_structurally_invalid_tokens() {
        for token in ["", "garbage", "one-segment-only"] {
            let err = peek_issuer(token).unwrap_err();
            assert_eq!(err, ApiError::unauthorized("Invalid token"));
        }
    }

    #[test]
    fn test_peek_issuer_missing_claim_is_bad_request() {
        let token = fake_token(serde_json::json!({"sub": "user-1"}));
        let err = peek_issuer(&token).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(err.detail().contains("issuer"));
    }

    #[test]
    fn test_audience_scalar_and_array() {
        let one = Audience::One("client-a".to_string());
        assert!(one.contains("client-a"));
        assert!(!one.contains("client-b"));

        let many = Audience::Many(vec!["client-a".to_string(), "client-b".to_string()]);
        assert!(many.contains("client-b"));
        assert!(!many.contains("client-c"));
    }

    #[test]
    fn test_token_use_wire_names() {
        assert_eq!(
            serde_json::from_value::<TokenUse>(serde_json::json!("access")).unwrap(),
            TokenUse::Access
        );
        assert_eq!(
            serde_json::from_value::<TokenUse>(serde_json::json!("id")).unwrap(),
            TokenUse::Id
        );
        assert!(serde_json::from_value::<TokenUse>(serde_json::json!("refresh")).is_err());
    }

    #[test]
    fn test_claims_deserialize_with_extras() {
        let claims: TokenClaims = serde_json::from_value(serde_json::json!({
            "iss": "https://idp.example.com/pool",
            "sub": "user-1",
            "token_use": "access",
            "client_id": "client-a",
            "exp": 4_000_000_000u64,
            "username": "alice",
            "scope": "mail.read"
        }))
        .unwrap();
        assert_eq!(claims.token_use, Some(TokenUse::Access));
        assert_eq!(claims.display_name().as_deref(), Some("alice"));
        assert_eq!(claims.extra.get("scope").unwrap(), "mail.read");
    }

    #[test]
    fn test_display_name_fallback_order() {
        let claims: TokenClaims = serde_json::from_value(serde_json::json!({
            "iss": "i",
            "exp": 4_000_000_000u64,
            "cognito:username": "alice",
            "email": "alice@example.com"
        }))
        .unwrap();
        assert_eq!(claims.display_name().as_deref(), Some("alice"));
    }
}
