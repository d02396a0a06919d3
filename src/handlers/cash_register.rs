// src/handlers/cash_register.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{validate_not_negative, validate_positive};
use crate::{
    common::{
        db_utils::get_rls_connection,
        error::{ApiError, AppError},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{FrontDesk, RequireRole},
        tenancy::TenantContext,
    },
    models::{
        cash_register::{CashSession, CashSessionSummary, CashierPayment, PendingReceivables},
        invoice::PaymentMethod,
    },
    services::invoice_service::PaymentInput,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionPayload {
    // Fundo de caixa inicial
    #[validate(custom(function = "validate_not_negative"))]
    #[schema(example = "100.00")]
    pub opening_float: Decimal,
}

// POST /api/caixa/sessions
#[utoipa::path(
    post,
    path = "/api/caixa/sessions",
    tag = "Cash Register",
    request_body = OpenSessionPayload,
    responses(
        (status = 201, description = "Caixa aberto", body = CashSession),
        (status = 403, description = "Exige perfil FRONT_DESK"),
        (status = 409, description = "Já existe um caixa aberto")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn open_session(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<FrontDesk>,
    Json(payload): Json<OpenSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let session = app_state
        .cash_register_service
        .open(&mut *rls_conn, tenant.0, user.0.id, payload.opening_float)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(session)))
}

// GET /api/caixa/sessions
#[utoipa::path(
    get,
    path = "/api/caixa/sessions",
    tag = "Cash Register",
    responses(
        (status = 200, description = "Caixa aberto com histórico e totais por método", body = CashSessionSummary),
        (status = 404, description = "Nenhum caixa aberto")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_open_session(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<FrontDesk>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let summary = app_state
        .cash_register_service
        .fetch_open(&mut *rls_conn, tenant.0)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(summary)))
}

#[utoipa::path(
    get,
    path = "/api/caixa/sessions/{session_id}",
    tag = "Cash Register",
    responses(
        (status = 200, description = "Resumo e reconciliação da sessão", body = CashSessionSummary),
        (status = 404, description = "Sessão inexistente")
    ),
    params(
        ("session_id" = Uuid, Path, description = "ID da Sessão"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_session(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<FrontDesk>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let summary = app_state
        .cash_register_service
        .summary(&mut *rls_conn, tenant.0, session_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(summary)))
}

#[utoipa::path(
    get,
    path = "/api/caixa/sessions/{session_id}/pending",
    tag = "Cash Register",
    responses(
        (status = 200, description = "Faturas e parcelas por receber", body = PendingReceivables)
    ),
    params(
        ("session_id" = Uuid, Path, description = "ID da Sessão"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_pending(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<FrontDesk>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let pending = app_state
        .cash_register_service
        .pending(&mut *rls_conn, tenant.0, session_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(pending)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPaymentPayload {
    // Exatamente um dos dois
    pub invoice_id: Option<Uuid>,
    pub installment_id: Option<Uuid>,

    #[validate(custom(function = "validate_positive"))]
    #[schema(example = "20.00")]
    pub amount: Decimal,

    #[schema(example = "CASH")]
    pub method: PaymentMethod,

    pub paid_at: Option<DateTime<Utc>>,

    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/caixa/sessions/{session_id}/payments",
    tag = "Cash Register",
    request_body = RegisterPaymentPayload,
    responses(
        (status = 201, description = "Pagamento registado e propagado à fatura/parcela", body = CashierPayment),
        (status = 400, description = "Sessão fechada ou alvo ambíguo"),
        (status = 500, description = "Falha ao registar (nada foi gravado)")
    ),
    params(
        ("session_id" = Uuid, Path, description = "ID da Sessão"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn register_payment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<FrontDesk>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<RegisterPaymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let payment = app_state
        .cash_register_service
        .register_payment(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            session_id,
            payload.invoice_id,
            payload.installment_id,
            PaymentInput {
                amount: payload.amount,
                method: payload.method,
                paid_at: payload.paid_at,
                notes: payload.notes,
            },
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(payment)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionPayload {
    // Valor contado na gaveta
    #[validate(custom(function = "validate_not_negative"))]
    #[schema(example = "160.00")]
    pub closing_float: Decimal,
}

#[utoipa::path(
    post,
    path = "/api/caixa/sessions/{session_id}/close",
    tag = "Cash Register",
    request_body = CloseSessionPayload,
    responses(
        (status = 200, description = "Caixa fechado com reconciliação", body = CashSessionSummary),
        (status = 400, description = "Sessão já fechada")
    ),
    params(
        ("session_id" = Uuid, Path, description = "ID da Sessão"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn close_session(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<FrontDesk>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<CloseSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let summary = app_state
        .cash_register_service
        .close(&mut *rls_conn, tenant.0, user.0.id, session_id, payload.closing_float)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(summary)))
}
