// src/handlers/prices.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::validate_not_negative;
use crate::{
    common::{
        db_utils::get_rls_connection,
        error::{ApiError, AppError},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{AdminOnly, RequireRole},
        tenancy::TenantContext,
    },
    models::catalog::Price,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertPricePayload {
    pub procedure_id: Uuid,
    pub entity_id: Uuid,

    // Parte paga pela entidade
    #[validate(custom(function = "validate_not_negative"))]
    #[schema(example = "35.00")]
    pub entity_price: Decimal,

    // Parte paga pelo paciente
    #[validate(custom(function = "validate_not_negative"))]
    #[schema(example = "15.00")]
    pub patient_price: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePricePayload {
    #[validate(custom(function = "validate_not_negative"))]
    pub entity_price: Option<Decimal>,

    #[validate(custom(function = "validate_not_negative"))]
    pub patient_price: Option<Decimal>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PriceListQuery {
    pub entity_id: Option<Uuid>,
}

// PUT /api/precos
#[utoipa::path(
    put,
    path = "/api/precos",
    tag = "Pricing",
    request_body = UpsertPricePayload,
    responses(
        (status = 200, description = "Preço gravado", body = Price),
        (status = 403, description = "Exige perfil ADMIN")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn upsert_price(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<AdminOnly>,
    Json(payload): Json<UpsertPricePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let price = app_state
        .pricing_service
        .upsert_price(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            payload.procedure_id,
            payload.entity_id,
            payload.entity_price,
            payload.patient_price,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(price)))
}

#[utoipa::path(
    get,
    path = "/api/precos",
    tag = "Pricing",
    responses(
        (status = 200, description = "Tabela de preços", body = Vec<Price>)
    ),
    params(
        PriceListQuery,
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_prices(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Query(query): Query<PriceListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let prices = app_state
        .pricing_service
        .list_prices(&mut *rls_conn, tenant.0, query.entity_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(prices)))
}

#[utoipa::path(
    get,
    path = "/api/precos/{procedure_id}/{entity_id}",
    tag = "Pricing",
    responses(
        (status = 200, description = "Preço do artigo para a entidade", body = Price),
        (status = 400, description = "Preço não definido")
    ),
    params(
        ("procedure_id" = Uuid, Path, description = "ID do Artigo"),
        ("entity_id" = Uuid, Path, description = "ID da Entidade"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_price(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path((procedure_id, entity_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let price = app_state
        .pricing_service
        .lookup(&mut *rls_conn, tenant.0, procedure_id, entity_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(price)))
}

#[utoipa::path(
    put,
    path = "/api/precos/{procedure_id}/{entity_id}",
    tag = "Pricing",
    request_body = UpdatePricePayload,
    responses(
        (status = 200, description = "Preço atualizado", body = Price),
        (status = 404, description = "Preço inexistente")
    ),
    params(
        ("procedure_id" = Uuid, Path, description = "ID do Artigo"),
        ("entity_id" = Uuid, Path, description = "ID da Entidade"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_price(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<AdminOnly>,
    Path((procedure_id, entity_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdatePricePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let price = app_state
        .pricing_service
        .update_price(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            procedure_id,
            entity_id,
            payload.entity_price,
            payload.patient_price,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(price)))
}

#[utoipa::path(
    delete,
    path = "/api/precos/{procedure_id}/{entity_id}",
    tag = "Pricing",
    responses(
        (status = 204, description = "Preço removido"),
        (status = 404, description = "Preço inexistente")
    ),
    params(
        ("procedure_id" = Uuid, Path, description = "ID do Artigo"),
        ("entity_id" = Uuid, Path, description = "ID da Entidade"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_price(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<AdminOnly>,
    Path((procedure_id, entity_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    app_state
        .pricing_service
        .delete_price(&mut *rls_conn, tenant.0, user.0.id, procedure_id, entity_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}
