// src/handlers/plans.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{db_utils::get_rls_connection, error::ApiError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale, tenancy::TenantContext},
    models::{
        consultation::ConsultationItem,
        treatment_plan::{PlanItem, TreatmentPlanDetail},
    },
};

#[utoipa::path(
    get,
    path = "/api/planos/paciente/{patient_id}",
    tag = "Treatment Plans",
    responses(
        (status = 200, description = "Plano em curso do paciente", body = TreatmentPlanDetail),
        (status = 404, description = "Paciente sem plano em curso")
    ),
    params(
        ("patient_id" = Uuid, Path, description = "ID do Paciente"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_active_plan(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(patient_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let plan = app_state
        .treatment_plan_service
        .active_plan(&mut *rls_conn, tenant.0, patient_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(plan)))
}

#[utoipa::path(
    get,
    path = "/api/planos/{plan_id}",
    tag = "Treatment Plans",
    responses(
        (status = 200, description = "Plano com itens", body = TreatmentPlanDetail),
        (status = 404, description = "Plano inexistente")
    ),
    params(
        ("plan_id" = Uuid, Path, description = "ID do Plano"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_plan(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(plan_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let plan = app_state
        .treatment_plan_service
        .details(&mut *rls_conn, tenant.0, plan_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(plan)))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartPlanItemPayload {
    // Consulta onde o procedimento é executado
    pub consultation_id: Uuid,
}

// POST /api/planos/itens/{item_id}/iniciar
// Cria o item na consulta e conclui o item do plano numa só transação.
#[utoipa::path(
    post,
    path = "/api/planos/itens/{item_id}/iniciar",
    tag = "Treatment Plans",
    request_body = StartPlanItemPayload,
    responses(
        (status = 201, description = "Procedimento executado na consulta", body = ConsultationItem),
        (status = 400, description = "Item já fechado ou consulta de outro paciente")
    ),
    params(
        ("item_id" = Uuid, Path, description = "ID do Item do Plano"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn start_plan_item(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<StartPlanItemPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let item = app_state
        .treatment_plan_service
        .start_procedure_from_plan(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            item_id,
            payload.consultation_id,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    post,
    path = "/api/planos/itens/{item_id}/cancelar",
    tag = "Treatment Plans",
    responses(
        (status = 200, description = "Item cancelado", body = PlanItem),
        (status = 400, description = "Item já fechado")
    ),
    params(
        ("item_id" = Uuid, Path, description = "ID do Item do Plano"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_plan_item(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let item = app_state
        .treatment_plan_service
        .cancel_plan_item(&mut *rls_conn, tenant.0, user.0.id, item_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(item)))
}
