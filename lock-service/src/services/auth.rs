//! Bearer token verification.
//!
//! Tokens are issued elsewhere; this service only verifies HS256 signatures
//! and expiry and turns the claims into an [`Identity`].

use crate::models::{Identity, UserRole};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<Identity, anyhow::Error>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id.
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

impl TokenClaims {
    pub fn identity(&self) -> Identity {
        let role = self
            .role
            .as_deref()
            .map(UserRole::parse)
            .unwrap_or(UserRole::User);
        Identity::new(self.id, role)
    }
}

#[derive(Clone)]
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
}

impl JwtAuthenticator {
    pub fn new(secret: &Secret<String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        }
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, token: &str) -> Result<Identity, anyhow::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data = decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow::anyhow!("Invalid access token: {}", e))?;

        Ok(token_data.claims.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, claims: &TokenClaims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(role: Option<&str>, exp_offset: i64) -> TokenClaims {
        TokenClaims {
            id: 42,
            email: Some("kari@example.com".to_string()),
            role: role.map(str::to_string),
            exp: chrono::Utc::now().timestamp() + exp_offset,
        }
    }

    #[test]
    fn valid_token_yields_identity() {
        let auth = JwtAuthenticator::new(&Secret::new("test-secret".to_string()));

        let identity = auth.authenticate(&token("test-secret", &claims(None, 3600))).unwrap();
        assert_eq!(identity, Identity::user(42));

        let identity = auth
            .authenticate(&token("test-secret", &claims(Some("admin"), 3600)))
            .unwrap();
        assert!(identity.is_admin());
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let auth = JwtAuthenticator::new(&Secret::new("test-secret".to_string()));
        assert!(auth
            .authenticate(&token("other-secret", &claims(None, 3600)))
            .is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = JwtAuthenticator::new(&Secret::new("test-secret".to_string()));
        assert!(auth
            .authenticate(&token("test-secret", &claims(None, -3600)))
            .is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let auth = JwtAuthenticator::new(&Secret::new("test-secret".to_string()));
        assert!(auth.authenticate("not-a-token").is_err());
    }
}
