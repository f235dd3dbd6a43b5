use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{errors::ServiceError, AppState};

/// Claim structure for JWT tokens issued by the (external) auth service
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,          // Subject (customer ID)
    pub name: Option<String>, // Customer's name
    pub email: Option<String>,
    pub is_admin: bool,
    pub iat: i64, // Issued at time
    pub exp: i64, // Expiration time
}

/// Acting identity extracted from the bearer token. Token issuance lives in
/// the auth service; this crate only verifies and consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Administrator role required".to_string(),
            ))
        }
    }
}

/// Verify a bearer token and produce the acting identity.
pub fn verify_token(token: &str, secret: &str) -> Result<AuthUser, ServiceError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| ServiceError::Unauthorized(format!("Invalid bearer token: {}", e)))?;

    let id = Uuid::parse_str(&data.claims.sub)
        .map_err(|_| ServiceError::Unauthorized("Token subject is not a valid id".to_string()))?;

    Ok(AuthUser {
        id,
        name: data.claims.name,
        email: data.claims.email,
        is_admin: data.claims.is_admin,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("Missing Authorization header".to_string())
            })?;

        let token = header_value.strip_prefix("Bearer ").ok_or_else(|| {
            ServiceError::Unauthorized("Authorization header is not a bearer token".to_string())
        })?;

        verify_token(token.trim(), &state.config.jwt_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test_secret_key_for_testing_purposes_only";

    fn mint(claims: &Claims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn verify_round_trip() {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now().timestamp();
        let token = mint(&Claims {
            sub: id.to_string(),
            name: Some("Ada".into()),
            email: Some("ada@example.com".into()),
            is_admin: true,
            iat: now,
            exp: now + 3600,
        });

        let user = verify_token(&token, SECRET).expect("token should verify");
        assert_eq!(user.id, id);
        assert!(user.is_admin);
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = chrono::Utc::now().timestamp();
        let token = mint(&Claims {
            sub: Uuid::new_v4().to_string(),
            name: None,
            email: None,
            is_admin: false,
            iat: now - 7200,
            exp: now - 3600,
        });

        assert!(matches!(
            verify_token(&token, SECRET),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = chrono::Utc::now().timestamp();
        let token = mint(&Claims {
            sub: Uuid::new_v4().to_string(),
            name: None,
            email: None,
            is_admin: false,
            iat: now,
            exp: now + 3600,
        });

        assert!(verify_token(&token, "another_secret_entirely_for_this_test").is_err());
    }

    #[test]
    fn require_admin_gates_non_admins() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            name: None,
            email: None,
            is_admin: false,
        };
        assert!(matches!(
            user.require_admin(),
            Err(ServiceError::Forbidden(_))
        ));
    }
}
