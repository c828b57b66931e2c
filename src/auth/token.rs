/// Signed session tokens
///
/// HS256 JWTs carrying the user id (`sub`) and email. Tokens are stateless:
/// there is no revocation list and no refresh, a token lives until `exp`.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims embedded in every session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub email: String,
    /// Issued-at, seconds since the epoch
    #[serde(default)]
    pub iat: i64,
    /// Expiry, seconds since the epoch
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    /// Malformed, wrongly signed, wrong algorithm, expired or missing claims.
    /// Carries no detail.
    #[error("invalid token")]
    Invalid,

    #[error("token signing failed: {0}")]
    Encode(String),
}

/// Issue a token for `user_id`/`email` valid for `ttl` from now
pub fn issue_token(user_id: &str, email: &str, secret: &[u8], ttl: Duration) -> Result<String, TokenError> {
    let now = Utc::now();
    let expires = now
        .checked_add_signed(ttl)
        .ok_or_else(|| TokenError::Encode("token lifetime out of range".to_string()))?;
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now.timestamp(),
        exp: expires.timestamp(),
    };

    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret))
        .map_err(|e| TokenError::Encode(e.to_string()))
}

/// Validate a token and return its claims
///
/// Only HMAC-signed tokens are accepted; a header naming any other algorithm
/// is rejected before the signature is looked at. Expiry is checked with no
/// leeway.
pub fn validate_token(token: &str, secret: &[u8]) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp"]);

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation).map_err(|e| {
        tracing::debug!("🔒 Token rejected: {}", e);
        TokenError::Invalid
    })?;

    let claims = data.claims;
    if claims.sub.is_empty() || claims.email.is_empty() {
        tracing::debug!("🔒 Token rejected: missing subject claims");
        return Err(TokenError::Invalid);
    }

    Ok(claims)
}
