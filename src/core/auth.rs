// src/core/auth.rs

//! Principal identification: Argon2 password hashing and HS256 access tokens.

use crate::core::CitrineError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// The reserved internal identity used for sync-created resources and
/// replicated deletes. It cannot be registered or authenticated from outside.
pub const SYSTEM_PRINCIPAL: &str = "system";

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

/// Issues and verifies access tokens for a single signing key.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    secret: String,
    expire_minutes: i64,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>, expire_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            expire_minutes,
        }
    }

    /// Issues a token for an authenticated principal.
    pub fn issue(&self, username: &str) -> Result<String, CitrineError> {
        let expiration = Utc::now() + Duration::minutes(self.expire_minutes);
        let claims = Claims {
            sub: username.to_string(),
            exp: expiration.timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| CitrineError::Internal(format!("token signing: {e}")))?;
        Ok(token)
    }

    /// Verifies a token and returns the principal it identifies.
    /// The `system` principal is internal-only and never accepted here.
    pub fn verify(&self, token: Option<&str>) -> Result<String, CitrineError> {
        let token = token.ok_or(CitrineError::AuthRequired)?;
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        if data.claims.sub == SYSTEM_PRINCIPAL {
            return Err(CitrineError::InvalidToken);
        }
        Ok(data.claims.sub)
    }
}

/// Hashes a password with Argon2 and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, CitrineError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string();
    Ok(hash)
}

/// Checks a password against a stored Argon2 hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
