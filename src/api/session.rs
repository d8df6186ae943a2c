//! Session resource endpoints for authenticated callers.

use axum::{Json, extract::State};
use serde_json::{Value, json};
use url::Url;

use crate::auth::Identity;

#[derive(Clone)]
pub struct SessionState {
    pub base_url: Url,
}

/// The mail protocol's session resource: where to send API calls and who
/// the caller is. Method dispatch itself lives behind `apiUrl`.
pub async fn session_resource(
    State(state): State<SessionState>,
    identity: Identity,
) -> Json<Value> {
    let base = state.base_url.as_str().trim_end_matches('/');
    let username = identity.username.unwrap_or_default();

    Json(json!({
        "capabilities": {
            "urn:ietf:params:jmap:core": {
                "maxSizeUpload": 50_000_000u64,
                "maxConcurrentUpload": 4,
                "maxSizeRequest": 10_000_000u64,
                "maxConcurrentRequests": 4,
                "maxCallsInRequest": 16,
                "maxObjectsInGet": 500,
                "maxObjectsInSet": 500,
                "collationAlgorithms": ["i;ascii-numeric", "i;ascii-casemap"]
            }
        },
        "username": username,
        "apiUrl": format!("{}/api", base),
        "downloadUrl": format!("{}/download/{{accountId}}/{{blobId}}/{{name}}?accept={{type}}", base),
        "uploadUrl": format!("{}/upload/{{accountId}}", base),
        "eventSourceUrl": format!("{}/eventsource?types={{types}}&closeafter={{closeafter}}&ping={{ping}}", base),
        "state": "0"
    }))
}

/// Lightweight probe: 200 with the caller's username when the session is
/// valid, a problem response from the middleware otherwise.
pub async fn verify_session(identity: Identity) -> Json<Value> {
    Json(json!({
        "authenticated": true,
        "username": identity.username,
    }))
}
