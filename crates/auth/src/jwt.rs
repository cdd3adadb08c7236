//! Bearer token decoding + validation (HS256).

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use thiserror::Error;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwtError {
    /// Token is malformed or the signature does not verify.
    #[error("invalid token")]
    Invalid,

    /// Signature verified but the claims are not currently valid.
    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Validates a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError>;
}

/// HS256 (shared-secret) validator.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time-window checks run deterministically on the decoded claims;
        // this token shape does not carry the registered `exp`/`iat` claims.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(&secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError> {
        let data =
            decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|_| JwtError::Invalid)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
