//! Request authentication: credential extraction, bearer verification,
//! token issuance, session cookies, and the middleware tying them together.

pub mod cookie;
pub mod credentials;
pub mod gateway;
pub mod issuer;
pub mod jwks;
pub mod verify;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, access_cookie, clear_access_cookie,
    clear_refresh_cookie, refresh_cookie,
};
pub use credentials::{BearerSource, CredentialBundle, cookie_value, decode_basic};
pub use gateway::{AuthGateway, Identity, ResolvedSession, require_session};
pub use issuer::{CognitoIssuer, IssuerError, TokenIssuer, TokenPair};
pub use jwks::{HttpKeyProvider, KeyProvider, KeyProviderError};
pub use verify::{BearerVerifier, TokenClaims, TokenUse};
