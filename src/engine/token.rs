//! Token Service
//!
//! Issues and validates the signed bearer tokens that carry a role claim.
//! Tokens are stateless: no refresh, rotation, or revocation; a token is
//! good until its natural expiry.

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::policy::Role;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Invalid role. Must be one of clinician, researcher, developer")]
    InvalidRole,
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Malformed,
}

/// JWT claims. `sub` is a stable subject id minted at issuance so audit
/// records produced with the same token correlate to one actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(role: Role, ttl_minutes: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: Uuid::new_v4().to_string(),
            role: role.as_str().to_string(),
            iat: now,
            exp: now + ttl_minutes * 60,
        }
    }
}

pub struct TokenService {
    secret: String,
    ttl_minutes: i64,
}

impl TokenService {
    pub fn new(secret: impl Into<String>, ttl_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl_minutes,
        }
    }

    /// Issue a signed token for a role string. Rejects anything outside the
    /// recognized role set before signing.
    pub fn issue(&self, role: &str) -> Result<String, TokenError> {
        let role = Role::from_str(role).map_err(|_| TokenError::InvalidRole)?;
        let claims = Claims::new(role, self.ttl_minutes);
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|_| TokenError::Malformed)
    }

    /// Validate signature and expiry and return the claims. The role claim
    /// must be present and non-empty; whether it maps to a permitted view is
    /// an authorization question answered by the gateway, not here.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        })?;

        if data.claims.role.is_empty() {
            return Err(TokenError::Malformed);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key_32_chars_long!!";

    #[test]
    fn test_issue_validate_roundtrip() {
        let service = TokenService::new(SECRET, 60);
        let token = service.issue("clinician").unwrap();
        let claims = service.validate(&token).unwrap();

        assert_eq!(claims.role, "clinician");
        assert!(!claims.sub.is_empty());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_issue_rejects_unknown_role() {
        let service = TokenService::new(SECRET, 60);
        assert!(matches!(
            service.issue("auditor"),
            Err(TokenError::InvalidRole)
        ));
        assert!(matches!(service.issue(""), Err(TokenError::InvalidRole)));
    }

    #[test]
    fn test_expired_token() {
        let service = TokenService::new(SECRET, -5);
        let token = service.issue("researcher").unwrap();
        assert!(matches!(service.validate(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_wrong_secret_is_malformed() {
        let service = TokenService::new(SECRET, 60);
        let token = service.issue("developer").unwrap();

        let other = TokenService::new("different_secret", 60);
        assert!(matches!(other.validate(&token), Err(TokenError::Malformed)));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let service = TokenService::new(SECRET, 60);
        assert!(matches!(
            service.validate("not.a.token"),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_unmapped_role_survives_validation() {
        // Authentication accepts any signed, unexpired, non-empty role claim;
        // the gateway is responsible for denying roles with no view binding.
        let service = TokenService::new(SECRET, 60);
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role: "auditor".to_string(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let validated = service.validate(&token).unwrap();
        assert_eq!(validated.role, "auditor");
    }
}
