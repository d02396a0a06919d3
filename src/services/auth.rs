// src/services/auth.rs

use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::{
    common::error::AppError,
    models::auth::{Claims, Principal},
};

// Os tokens são emitidos pelo provedor de autenticação; aqui só os validamos.
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    /// Valida assinatura e expiração (HS256) e devolve o utilizador descrito pelas claims.
    pub fn validate_token(&self, token: &str) -> Result<Principal, AppError> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )?;

        Ok(Principal::from(token_data.claims))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::auth::Role;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    pub(crate) const SECRET: &str = "segredo-de-teste";

    pub(crate) fn issue_token(secret: &str, role: Role, clinic_id: Uuid, ttl_secs: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            role,
            clinic_id,
            exp: (now + ttl_secs) as usize,
            iat: now as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_principal() {
        let clinic = Uuid::new_v4();
        let token = issue_token(SECRET, Role::FrontDesk, clinic, 3600);

        let principal = AuthService::new(SECRET.into()).validate_token(&token).unwrap();

        assert_eq!(principal.role, Role::FrontDesk);
        assert_eq!(principal.clinic_id, clinic);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token("outro-segredo", Role::Admin, Uuid::new_v4(), 3600);
        let err = AuthService::new(SECRET.into()).validate_token(&token).unwrap_err();
        assert!(matches!(err, AppError::JwtError(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(SECRET, Role::Admin, Uuid::new_v4(), -3600);
        assert!(AuthService::new(SECRET.into()).validate_token(&token).is_err());
    }
}
