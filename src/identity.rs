use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Role;

/// Who is calling, as vouched for by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
    pub university: String,
}

/// Claims carried by tokens from the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub university: String,
    pub exp: i64,
    pub iat: i64,
}

/// Validates an opaque credential. Issuing credentials is not our job.
pub trait IdentityGate: Send + Sync {
    fn authenticate(&self, credential: &str) -> AppResult<Identity>;
}

/// HS256 bearer tokens signed with a shared secret.
#[derive(Clone)]
pub struct JwtIdentityGate {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityGate {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }
}

impl IdentityGate for JwtIdentityGate {
    fn authenticate(&self, credential: &str) -> AppResult<Identity> {
        let claims = jsonwebtoken::decode::<Claims>(credential, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Unauthenticated(format!("Invalid token: {}", e)))?
            .claims;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthenticated("Invalid token subject".to_string()))?;
        let role = Role::parse(&claims.role)
            .ok_or_else(|| AppError::Unauthenticated("Invalid token role".to_string()))?;

        Ok(Identity {
            user_id,
            role,
            university: claims.university,
        })
    }
}

/// Signs a token the way the identity provider does. Test fixtures only.
#[cfg(test)]
pub fn issue_test_token(secret: &str, identity: &Identity, ttl: chrono::Duration) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = chrono::Utc::now();
    let claims = Claims {
        sub: identity.user_id.to_string(),
        role: identity.role.as_str().to_string(),
        university: identity.university.clone(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
