//! JWT creation and verification.
//!
//! Tokens are signed with HS256 using [`JwtConfig::secret`] and expire after
//! [`JwtConfig::access_token_expiry`] seconds.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use genera_config::JwtConfig;
use genera_core::AppError;

use crate::claims::Claims;

/// Creates an access token for `user_id`.
///
/// # Errors
///
/// Returns an internal error if encoding fails.
pub fn create_access_token(
    user_id: Uuid,
    email: &str,
    jwt_config: &JwtConfig,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp() as usize;
    let exp = now + jwt_config.access_token_expiry.max(0) as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp,
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_config.secret.as_bytes()),
    )
    .map_err(|e| AppError::internal_error(format!("Failed to create token: {}", e)))
}

/// Verifies signature and expiry and returns the embedded claims.
///
/// # Errors
///
/// Returns 401 for a bad signature, an expired token, or a malformed token.
pub fn verify_token(token: &str, jwt_config: &JwtConfig) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::unauthorized("Token inválido o expirado"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig::with_secret("test-secret")
    }

    #[test]
    fn test_create_and_verify() {
        let user_id = Uuid::new_v4();
        let token = create_access_token(user_id, "docente@colegio.cl", &config()).unwrap();

        let claims = verify_token(&token, &config()).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "docente@colegio.cl");
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let err = verify_token("not.a.token", &config()).unwrap_err();
        assert_eq!(err.status.as_u16(), 401);
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let token = create_access_token(Uuid::new_v4(), "a@b.cl", &config()).unwrap();
        let other = JwtConfig::with_secret("another-secret");
        assert!(verify_token(&token, &other).is_err());
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let config = config();
        // Past the default 60s leeway.
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "a@b.cl".to_string(),
            exp: now - 120,
            iat: now - 180,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();
        assert!(verify_token(&token, &config).is_err());
    }

    #[test]
    fn test_invalid_subject_is_unauthorized() {
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            email: "a@b.cl".to_string(),
            exp: 0,
            iat: 0,
        };
        assert!(claims.user_id().is_err());
    }

    #[test]
    fn test_claims_serialize() {
        let claims = Claims {
            sub: "abc".to_string(),
            email: "a@b.cl".to_string(),
            exp: 2,
            iat: 1,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["sub"], "abc");
        assert_eq!(json["exp"], 2);
    }
}
