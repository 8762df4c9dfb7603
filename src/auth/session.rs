//! Signed session tokens.
//!
//! A token is an HS256 JWT carrying `{user, created, host}`. Nothing about a
//! session is stored server side; the claims are re-derived on every request.
//! Lifetime is enforced by the authenticator against `created`, so the
//! registered `exp` claim is neither written nor required.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::SessionSecret;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "user")]
    pub user_id: Uuid,
    #[serde(rename = "created", with = "time::serde::timestamp")]
    pub issued_at: OffsetDateTime,
    #[serde(rename = "host")]
    pub bound_host: String,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to sign session token")]
    Sign(#[source] jsonwebtoken::errors::Error),
    #[error("session token rejected")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct SessionSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionSigner {
    pub fn new(secret: &SessionSecret) -> Self {
        Self::from_bytes(secret.expose())
    }

    pub fn from_bytes(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, claims: &SessionClaims) -> Result<String, SessionError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(SessionError::Sign)
    }

    /// Check the signature and decode the claims. Freshness is not checked here.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(SessionError::Invalid)
    }
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionSigner(<redacted>)")
    }
}
