// src/handlers/budgets.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
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
    models::budget::{Budget, BudgetDetail, BudgetFilter, BudgetItem, BudgetStatus},
    services::budget_service::BudgetChanges,
};

// =============================================================================
//  CABEÇALHO
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBudgetPayload {
    pub patient_id: Uuid,
    pub entity_id: Uuid,

    // Omitido = hoje
    #[schema(value_type = Option<String>, format = Date, example = "2025-03-14")]
    pub budget_date: Option<NaiveDate>,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

// POST /api/orcamentos
#[utoipa::path(
    post,
    path = "/api/orcamentos",
    tag = "Budgets",
    request_body = CreateBudgetPayload,
    responses(
        (status = 201, description = "Orçamento criado em rascunho", body = Budget),
        (status = 404, description = "Paciente ou entidade inexistente")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_budget(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Json(payload): Json<CreateBudgetPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let budget = app_state
        .budget_service
        .create(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            payload.patient_id,
            payload.entity_id,
            payload.budget_date,
            payload.notes.as_deref(),
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(budget)))
}

#[utoipa::path(
    get,
    path = "/api/orcamentos",
    tag = "Budgets",
    responses(
        (status = 200, description = "Orçamentos (mais recentes primeiro)", body = Vec<Budget>)
    ),
    params(
        BudgetFilter,
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_budgets(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Query(filter): Query<BudgetFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let budgets = app_state
        .budget_service
        .list(&mut *rls_conn, tenant.0, &filter)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(budgets)))
}

#[utoipa::path(
    get,
    path = "/api/orcamentos/{budget_id}",
    tag = "Budgets",
    responses(
        (status = 200, description = "Orçamento com itens", body = BudgetDetail),
        (status = 404, description = "Orçamento inexistente")
    ),
    params(
        ("budget_id" = Uuid, Path, description = "ID do Orçamento"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_budget(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(budget_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let detail = app_state
        .budget_service
        .details(&mut *rls_conn, tenant.0, budget_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(detail)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBudgetPayload {
    pub entity_id: Option<Uuid>,

    #[schema(value_type = Option<String>, format = Date)]
    pub budget_date: Option<NaiveDate>,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[utoipa::path(
    put,
    path = "/api/orcamentos/{budget_id}",
    tag = "Budgets",
    request_body = UpdateBudgetPayload,
    responses(
        (status = 200, description = "Orçamento atualizado", body = Budget),
        (status = 400, description = "Orçamento não está em rascunho ou já tem itens")
    ),
    params(
        ("budget_id" = Uuid, Path, description = "ID do Orçamento"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_budget(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(budget_id): Path<Uuid>,
    Json(payload): Json<UpdateBudgetPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let budget = app_state
        .budget_service
        .update(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            budget_id,
            BudgetChanges {
                entity_id: payload.entity_id,
                budget_date: payload.budget_date,
                notes: payload.notes.as_deref(),
            },
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(budget)))
}

// =============================================================================
//  ITENS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddBudgetItemPayload {
    pub procedure_id: Uuid,

    #[validate(custom(function = "validate_tooth_number"))]
    #[schema(example = 36)]
    pub tooth_number: Option<i16>,

    // Subconjunto de M, D, V, L, O, I
    #[schema(example = json!(["M", "O"]))]
    pub faces: Option<Vec<String>>,
}

#[utoipa::path(
    post,
    path = "/api/orcamentos/{budget_id}/itens",
    tag = "Budgets",
    request_body = AddBudgetItemPayload,
    responses(
        (status = 201, description = "Item adicionado (totais recalculados)", body = BudgetItem),
        (status = 400, description = "Regra violada: rascunho, dente, faces ou preço")
    ),
    params(
        ("budget_id" = Uuid, Path, description = "ID do Orçamento"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_budget_item(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(budget_id): Path<Uuid>,
    Json(payload): Json<AddBudgetItemPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let item = app_state
        .budget_service
        .add_item(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            budget_id,
            payload.procedure_id,
            payload.tooth_number,
            payload.faces,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    delete,
    path = "/api/orcamentos/{budget_id}/itens/{item_id}",
    tag = "Budgets",
    responses(
        (status = 200, description = "Item removido, devolve o orçamento recalculado", body = Budget),
        (status = 404, description = "Item inexistente")
    ),
    params(
        ("budget_id" = Uuid, Path, description = "ID do Orçamento"),
        ("item_id" = Uuid, Path, description = "ID do Item"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn remove_budget_item(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path((budget_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let budget = app_state
        .budget_service
        .remove_item(&mut *rls_conn, tenant.0, user.0.id, budget_id, item_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(budget)))
}

// =============================================================================
//  ESTADO
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetBudgetStatusPayload {
    #[schema(example = "APPROVED")]
    pub status: BudgetStatus,
}

#[utoipa::path(
    put,
    path = "/api/orcamentos/{budget_id}/estado",
    tag = "Budgets",
    request_body = SetBudgetStatusPayload,
    responses(
        (status = 200, description = "Estado alterado", body = Budget),
        (status = 400, description = "Aprovação de orçamento sem itens")
    ),
    params(
        ("budget_id" = Uuid, Path, description = "ID do Orçamento"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_budget_status(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(budget_id): Path<Uuid>,
    Json(payload): Json<SetBudgetStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let budget = app_state
        .budget_service
        .set_state(&mut *rls_conn, tenant.0, user.0.id, budget_id, payload.status)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(budget)))
}
