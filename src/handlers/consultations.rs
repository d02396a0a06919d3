// src/handlers/consultations.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::validate_tooth_number;
use crate::{
    common::{
        db_utils::get_rls_connection,
        error::{ApiError, AppError},
    },
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale, tenancy::TenantContext},
    models::consultation::{
        Consultation, ConsultationDetail, ConsultationFilter, ConsultationItem, ConsultationStatus,
    },
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateConsultationPayload {
    pub patient_id: Uuid,
    pub entity_id: Uuid,
    pub doctor_id: Option<Uuid>,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

// POST /api/consultas
// Pode derivar um plano de tratamento a partir dos orçamentos aprovados.
#[utoipa::path(
    post,
    path = "/api/consultas",
    tag = "Consultations",
    request_body = CreateConsultationPayload,
    responses(
        (status = 201, description = "Consulta iniciada", body = Consultation),
        (status = 404, description = "Paciente ou entidade inexistente")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_consultation(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Json(payload): Json<CreateConsultationPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let consultation = app_state
        .consultation_service
        .create(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            payload.patient_id,
            payload.entity_id,
            payload.doctor_id,
            payload.notes.as_deref(),
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(consultation)))
}

#[utoipa::path(
    get,
    path = "/api/consultas",
    tag = "Consultations",
    responses(
        (status = 200, description = "Consultas", body = Vec<Consultation>)
    ),
    params(
        ConsultationFilter,
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_consultations(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Query(filter): Query<ConsultationFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let consultations = app_state
        .consultation_service
        .list(&mut *rls_conn, tenant.0, &filter)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(consultations)))
}

#[utoipa::path(
    get,
    path = "/api/consultas/{consultation_id}",
    tag = "Consultations",
    responses(
        (status = 200, description = "Consulta com procedimentos", body = ConsultationDetail),
        (status = 404, description = "Consulta inexistente")
    ),
    params(
        ("consultation_id" = Uuid, Path, description = "ID da Consulta"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_consultation(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(consultation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let detail = app_state
        .consultation_service
        .get(&mut *rls_conn, tenant.0, consultation_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(detail)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConsultationPayload {
    #[schema(example = "COMPLETED")]
    pub status: Option<ConsultationStatus>,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[utoipa::path(
    put,
    path = "/api/consultas/{consultation_id}",
    tag = "Consultations",
    request_body = UpdateConsultationPayload,
    responses(
        (status = 200, description = "Consulta atualizada", body = Consultation)
    ),
    params(
        ("consultation_id" = Uuid, Path, description = "ID da Consulta"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_consultation(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(consultation_id): Path<Uuid>,
    Json(payload): Json<UpdateConsultationPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let consultation = app_state
        .consultation_service
        .update(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            consultation_id,
            payload.status,
            payload.notes.as_deref(),
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(consultation)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddConsultationItemPayload {
    pub procedure_id: Uuid,

    #[validate(range(min = 1, message = "A quantidade deve ser pelo menos 1."))]
    #[serde(default = "default_quantity")]
    #[schema(example = 1)]
    pub quantity: i32,

    #[validate(custom(function = "validate_tooth_number"))]
    pub tooth_number: Option<i16>,

    pub faces: Option<Vec<String>>,
}

fn default_quantity() -> i32 {
    1
}

#[utoipa::path(
    post,
    path = "/api/consultas/{consultation_id}/itens",
    tag = "Consultations",
    request_body = AddConsultationItemPayload,
    responses(
        (status = 201, description = "Procedimento registado", body = ConsultationItem),
        (status = 400, description = "Consulta fechada, posição inválida ou preço em falta")
    ),
    params(
        ("consultation_id" = Uuid, Path, description = "ID da Consulta"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_consultation_item(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(consultation_id): Path<Uuid>,
    Json(payload): Json<AddConsultationItemPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let item = app_state
        .consultation_service
        .add_item(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            consultation_id,
            payload.procedure_id,
            payload.quantity,
            payload.tooth_number,
            payload.faces,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    delete,
    path = "/api/consultas/itens/{item_id}",
    tag = "Consultations",
    responses(
        (status = 204, description = "Procedimento removido"),
        (status = 400, description = "Consulta concluída")
    ),
    params(
        ("item_id" = Uuid, Path, description = "ID do Item da Consulta"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn remove_consultation_item(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .consultation_service
        .remove_item(&mut *rls_conn, tenant.0, user.0.id, item_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}
