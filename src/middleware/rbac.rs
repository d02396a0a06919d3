// src/middleware/rbac.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

use crate::{
    common::{
        error::{ApiError, AppError},
        i18n::I18nStore,
    },
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::Role,
};

/// 1. O Trait que define um grupo de perfis autorizados
pub trait RoleDef: Send + Sync + 'static {
    fn allowed() -> &'static [Role];
    fn label() -> &'static str;
}

/// 2. O Extractor (Guardião)
pub struct RequireRole<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let locale = Locale::from_headers(&parts.headers);
        let store = I18nStore::default();

        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or_else(|| AppError::InvalidToken.to_api_error(&locale, &store))?;

        if !T::allowed().contains(&user.0.role) {
            tracing::warn!(
                "Perfil {} recusado (exige {})",
                user.0.role.as_str(),
                T::label()
            );
            return Err(AppError::Forbidden(T::label()).to_api_error(&locale, &store));
        }

        Ok(RequireRole(PhantomData))
    }
}

// ---
// GRUPOS DE PERFIS
// ---

/// Operações de caixa e pagamentos.
pub struct FrontDesk;
impl RoleDef for FrontDesk {
    fn allowed() -> &'static [Role] {
        &[Role::FrontDesk, Role::Admin]
    }
    fn label() -> &'static str {
        "FRONT_DESK"
    }
}

/// Manutenção de catálogo e tabela de preços.
pub struct AdminOnly;
impl RoleDef for AdminOnly {
    fn allowed() -> &'static [Role] {
        &[Role::Admin]
    }
    fn label() -> &'static str {
        "ADMIN"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::Principal;
    use axum::http::{Request, StatusCode};
    use uuid::Uuid;

    fn parts_for(role: Option<Role>) -> Parts {
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        if let Some(role) = role {
            parts.extensions.insert(AuthenticatedUser(Principal {
                id: Uuid::new_v4(),
                role,
                clinic_id: Uuid::new_v4(),
            }));
        }
        parts
    }

    #[tokio::test]
    async fn front_desk_and_admin_may_operate_the_till() {
        for role in [Role::FrontDesk, Role::Admin] {
            let mut parts = parts_for(Some(role));
            assert!(RequireRole::<FrontDesk>::from_request_parts(&mut parts, &()).await.is_ok());
        }
    }

    #[tokio::test]
    async fn doctor_cannot_operate_the_till() {
        let mut parts = parts_for(Some(Role::Doctor));
        let err = RequireRole::<FrontDesk>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_user_is_unauthorized() {
        let mut parts = parts_for(None);
        let err = RequireRole::<AdminOnly>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }
}
