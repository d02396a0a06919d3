// src/handlers/audit.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::{db_utils::get_rls_connection, error::ApiError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{AdminOnly, RequireRole},
        tenancy::TenantContext,
    },
    models::audit::{AuditEntry, AuditFilter},
};

#[utoipa::path(
    get,
    path = "/api/auditoria",
    tag = "Audit",
    responses(
        (status = 200, description = "Registo de auditoria (mais recente primeiro)", body = Vec<AuditEntry>),
        (status = 403, description = "Exige perfil ADMIN")
    ),
    params(
        AuditFilter,
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_audit(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<AdminOnly>,
    Query(filter): Query<AuditFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let entries = app_state
        .audit_service
        .list(&mut *rls_conn, tenant.0, &filter)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(entries)))
}
