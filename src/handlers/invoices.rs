// src/handlers/invoices.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
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
    models::invoice::{
        Installment, InstallmentDraft, Invoice, InvoiceDetail, InvoiceFilter, InvoiceItem,
        InvoiceItemOrigin, InvoiceKind, InvoicePayment, PaymentMethod,
    },
    services::invoice_service::{ManualItem, PaymentInput},
};

// =============================================================================
//  1. FATURAS
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoicePayload {
    pub patient_id: Uuid,
    #[schema(example = "CONSULTATION")]
    pub kind: InvoiceKind,
    // Exatamente um, conforme o tipo
    pub consultation_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
}

// POST /api/faturas
// Idempotente: se a origem já tem fatura ativa, devolve-a.
#[utoipa::path(
    post,
    path = "/api/faturas",
    tag = "Invoices",
    request_body = CreateInvoicePayload,
    responses(
        (status = 201, description = "Fatura emitida (ou a existente)", body = Invoice),
        (status = 400, description = "Origem incoerente com o tipo"),
        (status = 404, description = "Origem ou orçamento aprovado inexistente")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Json(payload): Json<CreateInvoicePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let invoice = app_state
        .invoice_service
        .create_invoice(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            payload.patient_id,
            payload.kind,
            payload.consultation_id,
            payload.plan_id,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

#[utoipa::path(
    get,
    path = "/api/faturas",
    tag = "Invoices",
    responses(
        (status = 200, description = "Faturas (mais recentes primeiro)", body = Vec<Invoice>)
    ),
    params(
        InvoiceFilter,
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_invoices(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Query(filter): Query<InvoiceFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let invoices = app_state
        .invoice_service
        .list(&mut *rls_conn, tenant.0, &filter)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(invoices)))
}

#[utoipa::path(
    get,
    path = "/api/faturas/{invoice_id}",
    tag = "Invoices",
    responses(
        (status = 200, description = "Fatura com itens, parcelas e pagamentos", body = InvoiceDetail),
        (status = 404, description = "Fatura inexistente")
    ),
    params(
        ("invoice_id" = Uuid, Path, description = "ID da Fatura"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let detail = app_state
        .invoice_service
        .details(&mut *rls_conn, tenant.0, invoice_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(detail)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddInvoiceItemPayload {
    #[schema(example = "CONSULTATION_ITEM")]
    pub origin: InvoiceItemOrigin,
    pub origin_item_id: Option<Uuid>,
    pub procedure_id: Option<Uuid>,

    #[validate(length(min = 1, max = 255))]
    pub description: Option<String>,

    #[validate(range(min = 1, message = "A quantidade deve ser pelo menos 1."))]
    #[schema(example = 1)]
    pub quantity: i32,

    #[validate(custom(function = "validate_not_negative"))]
    #[schema(example = "25.00")]
    pub unit_price: Decimal,
}

#[utoipa::path(
    post,
    path = "/api/faturas/{invoice_id}/itens",
    tag = "Invoices",
    request_body = AddInvoiceItemPayload,
    responses(
        (status = 201, description = "Item acrescentado ao total", body = InvoiceItem),
        (status = 400, description = "Origem do item não corresponde ao tipo da fatura")
    ),
    params(
        ("invoice_id" = Uuid, Path, description = "ID da Fatura"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_invoice_item(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<AddInvoiceItemPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let item = app_state
        .invoice_service
        .add_item(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            invoice_id,
            ManualItem {
                origin: payload.origin,
                origin_item_id: payload.origin_item_id,
                procedure_id: payload.procedure_id,
                description: payload.description,
                quantity: payload.quantity,
                unit_price: payload.unit_price,
            },
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    post,
    path = "/api/faturas/{invoice_id}/cancelar",
    tag = "Invoices",
    responses(
        (status = 200, description = "Fatura anulada", body = Invoice),
        (status = 400, description = "Fatura com pagamentos ou já anulada")
    ),
    params(
        ("invoice_id" = Uuid, Path, description = "ID da Fatura"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_invoice(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<FrontDesk>,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let invoice = app_state
        .invoice_service
        .cancel(&mut *rls_conn, tenant.0, user.0.id, invoice_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(invoice)))
}

// =============================================================================
//  2. PARCELAS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateInstallmentsPayload {
    #[validate(length(min = 1, message = "Indique pelo menos uma parcela."), nested)]
    pub installments: Vec<InstallmentDraft>,
}

#[utoipa::path(
    post,
    path = "/api/faturas/{invoice_id}/parcelas",
    tag = "Invoices",
    request_body = GenerateInstallmentsPayload,
    responses(
        (status = 201, description = "Parcelas criadas em lote", body = Vec<Installment>),
        (status = 400, description = "Soma diferente do total, fatura não é de plano ou já tem parcelas")
    ),
    params(
        ("invoice_id" = Uuid, Path, description = "ID da Fatura"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn generate_installments(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<FrontDesk>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<GenerateInstallmentsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let installments = app_state
        .invoice_service
        .generate_installments(&mut *rls_conn, tenant.0, user.0.id, invoice_id, &payload.installments)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(installments)))
}

// =============================================================================
//  3. PAGAMENTOS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    #[validate(custom(function = "validate_positive"))]
    #[schema(example = "50.00")]
    pub amount: Decimal,

    #[schema(example = "CASH")]
    pub method: PaymentMethod,

    // Omitido = agora
    pub paid_at: Option<DateTime<Utc>>,

    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl From<PaymentPayload> for PaymentInput {
    fn from(payload: PaymentPayload) -> Self {
        Self {
            amount: payload.amount,
            method: payload.method,
            paid_at: payload.paid_at,
            notes: payload.notes,
        }
    }
}

// Espelha o pagamento numa sessão de caixa aberta
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionQuery {
    pub session_id: Option<Uuid>,
}

#[utoipa::path(
    post,
    path = "/api/faturas/parcelas/{installment_id}/pagamento",
    tag = "Invoices",
    request_body = PaymentPayload,
    responses(
        (status = 200, description = "Parcela paga; estado da fatura recalculado", body = Installment),
        (status = 400, description = "Fatura anulada ou sessão de caixa fechada")
    ),
    params(
        ("installment_id" = Uuid, Path, description = "ID da Parcela"),
        SessionQuery,
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn pay_installment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<FrontDesk>,
    Path(installment_id): Path<Uuid>,
    Query(query): Query<SessionQuery>,
    Json(payload): Json<PaymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let installment = app_state
        .invoice_service
        .pay_installment(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            installment_id,
            payload.into(),
            query.session_id,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(installment)))
}

#[utoipa::path(
    post,
    path = "/api/faturas/{invoice_id}/pagamento-direto",
    tag = "Invoices",
    request_body = PaymentPayload,
    responses(
        (status = 201, description = "Pagamento registado", body = InvoicePayment),
        (status = 400, description = "Fatura com parcelas, anulada ou já paga")
    ),
    params(
        ("invoice_id" = Uuid, Path, description = "ID da Fatura"),
        SessionQuery,
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn pay_invoice_direct(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<FrontDesk>,
    Path(invoice_id): Path<Uuid>,
    Query(query): Query<SessionQuery>,
    Json(payload): Json<PaymentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let payment = app_state
        .invoice_service
        .pay_invoice_direct(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            invoice_id,
            payload.into(),
            query.session_id,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(payment)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn installments_payload(amounts: &[&str]) -> GenerateInstallmentsPayload {
        let installments: Vec<_> = amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| json!({ "number": i + 1, "plannedAmount": amount, "dueDate": "2025-04-01" }))
            .collect();
        serde_json::from_value(json!({ "installments": installments })).unwrap()
    }

    #[test]
    fn each_installment_is_validated() {
        assert!(installments_payload(&["50.00", "50.00", "50.00"]).validate().is_ok());

        let errors = installments_payload(&["200.00", "-50.00"]).validate().unwrap_err();
        assert!(errors.errors().contains_key("installments"));

        assert!(installments_payload(&["50.004", "50.003", "49.993"]).validate().is_err());
        assert!(installments_payload(&[]).validate().is_err());
    }
}
