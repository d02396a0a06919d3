// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{i18n::Locale, tenancy::TenantContext},
    models::auth::Principal,
};

// Extrator para obter o utilizador autenticado diretamente nos handlers
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Principal);

fn authenticate(app_state: &AppState, headers: &HeaderMap) -> Result<Principal, AppError> {
    let bearer = headers
        .typed_get::<Authorization<Bearer>>()
        .ok_or(AppError::InvalidToken)?;

    app_state.auth_service.validate_token(bearer.token())
}

/// Só exige um token válido.
pub async fn auth_guard(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let locale = Locale::from_headers(request.headers());

    let principal = authenticate(&app_state, request.headers())
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    request.extensions_mut().insert(AuthenticatedUser(principal));
    Ok(next.run(request).await)
}

/// Token válido + X-Tenant-ID igual à clínica do token.
pub async fn tenant_guard(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let locale = Locale::from_headers(request.headers());

    let principal = authenticate(&app_state, request.headers())
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let tenant_id = TenantContext::from_headers(request.headers())
        .filter(|tenant_id| *tenant_id == principal.clinic_id)
        .ok_or_else(|| {
            tracing::warn!(
                "Acesso negado: utilizador {} sem acesso ao tenant pedido",
                principal.id
            );
            AppError::TenantMismatch.to_api_error(&locale, &app_state.i18n_store)
        })?;

    request.extensions_mut().insert(AuthenticatedUser(principal));
    request.extensions_mut().insert(TenantContext(tenant_id));
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                AppError::InvalidToken.to_api_error(
                    &Locale::from_headers(&parts.headers),
                    &crate::common::i18n::I18nStore::default(),
                )
            })
    }
}
