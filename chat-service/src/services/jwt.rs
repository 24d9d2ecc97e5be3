use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::models::Principal;

/// Claims carried by bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub id: String,
    pub email: String,
    pub name: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// HS256 token verification against the shared secret.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = ["exp".to_string()].into_iter().collect();

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Decode and verify a bearer token into the calling principal.
    pub fn verify(&self, token: &str) -> Result<Principal, jsonwebtoken::errors::Error> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(Principal {
            id: data.claims.id,
            email: data.claims.email,
            name: data.claims.name,
        })
    }

    /// Sign a token for `principal`, valid for `ttl_minutes`.
    pub fn issue(
        &self,
        principal: &Principal,
        ttl_minutes: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = TokenClaims {
            id: principal.id.clone(),
            email: principal.email.clone(),
            name: principal.name.clone(),
            exp: (Utc::now() + Duration::minutes(ttl_minutes)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn service(secret: &str) -> JwtService {
        JwtService::new(&JwtConfig {
            secret: Secret::new(secret.to_string()),
        })
    }

    fn bob() -> Principal {
        Principal {
            id: "u-42".to_string(),
            email: "bob@example.com".to_string(),
            name: "Bob".to_string(),
        }
    }

    #[test]
    fn issued_token_verifies() {
        let jwt = service("s3cret");
        let token = jwt.issue(&bob(), 10).unwrap();
        assert_eq!(jwt.verify(&token).unwrap(), bob());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = service("one").issue(&bob(), 10).unwrap();
        assert!(service("two").verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = service("s3cret");
        let token = jwt.issue(&bob(), -10).unwrap();
        assert!(jwt.verify(&token).is_err());
    }
}
