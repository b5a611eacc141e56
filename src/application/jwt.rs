use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::app_error::{AppError, AppResult};
use crate::domain::entities::entitlement::UserId;
use secrecy::ExposeSecret;

/// Session claims issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Verify a session token and return the caller's identity.
///
/// Any decoding failure (bad signature, expired, malformed) maps to
/// `InvalidCredentials`; the underlying reason is only logged.
pub fn verify(token: &str, secret: &secrecy::SecretString) -> AppResult<UserId> {
    let validation = Validation::new(Algorithm::HS256);
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "Session token rejected");
        AppError::InvalidCredentials
    })?;

    if claims.sub.trim().is_empty() {
        return Err(AppError::InvalidCredentials);
    }
    Ok(UserId::new(claims.sub))
}

#[cfg(test)]
pub fn issue(user_id: &str, secret: &secrecy::SecretString, ttl: time::Duration) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use time::OffsetDateTime;

    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + ttl.whole_seconds(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .unwrap()
}
