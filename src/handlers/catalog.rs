// src/handlers/catalog.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

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
    models::catalog::{PayerEntity, Patient, Procedure},
    services::catalog_service::NewProcedure,
};

// =============================================================================
//  ARTIGOS (PROCEDIMENTOS)
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProcedurePayload {
    #[validate(length(min = 1, max = 20, message = "O código é obrigatório."))]
    #[schema(example = "A01")]
    pub code: String,

    #[validate(length(min = 1, message = "A descrição é obrigatória."))]
    #[schema(example = "Restauração em resina")]
    pub description: String,

    #[validate(length(min = 1, message = "A categoria é obrigatória."))]
    #[schema(example = "Dentisteria")]
    pub category: String,

    #[serde(default)]
    pub requires_tooth: bool,

    #[serde(default)]
    pub requires_faces: bool,

    #[validate(range(min = 1, max = 5, message = "Número de faces entre 1 e 5."))]
    pub face_count: Option<i16>,
}

#[utoipa::path(
    post,
    path = "/api/catalog/procedures",
    tag = "Catalog",
    request_body = CreateProcedurePayload,
    responses(
        (status = 201, description = "Artigo criado", body = Procedure),
        (status = 403, description = "Exige perfil ADMIN"),
        (status = 409, description = "Código duplicado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_procedure(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<AdminOnly>,
    Json(payload): Json<CreateProcedurePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let procedure = app_state
        .catalog_service
        .create_procedure(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            NewProcedure {
                code: &payload.code,
                description: &payload.description,
                category: &payload.category,
                requires_tooth: payload.requires_tooth,
                requires_faces: payload.requires_faces,
                face_count: payload.face_count,
            },
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(procedure)))
}

#[utoipa::path(
    get,
    path = "/api/catalog/procedures",
    tag = "Catalog",
    responses(
        (status = 200, description = "Artigos do catálogo", body = Vec<Procedure>)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_procedures(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let procedures = app_state
        .catalog_service
        .list_procedures(&mut *rls_conn, tenant.0)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(procedures)))
}

// =============================================================================
//  ENTIDADES
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntityPayload {
    #[validate(length(min = 1, max = 50, message = "O identificador é obrigatório."))]
    #[schema(example = "particular")]
    pub slug: String,

    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    #[schema(example = "Particular")]
    pub name: String,
}

#[utoipa::path(
    post,
    path = "/api/catalog/entities",
    tag = "Catalog",
    request_body = CreateEntityPayload,
    responses(
        (status = 201, description = "Entidade criada", body = PayerEntity),
        (status = 409, description = "Identificador duplicado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_entity(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequireRole<AdminOnly>,
    Json(payload): Json<CreateEntityPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let entity = app_state
        .catalog_service
        .create_entity(&mut *rls_conn, tenant.0, user.0.id, &payload.slug, &payload.name)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(entity)))
}

#[utoipa::path(
    get,
    path = "/api/catalog/entities",
    tag = "Catalog",
    responses(
        (status = 200, description = "Entidades pagadoras", body = Vec<PayerEntity>)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_entities(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let entities = app_state
        .catalog_service
        .list_entities(&mut *rls_conn, tenant.0)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(entities)))
}

// =============================================================================
//  PACIENTES
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    #[schema(example = "Maria Silva")]
    pub name: String,

    #[validate(length(min = 9, max = 9, message = "O NIF deve ter 9 dígitos."))]
    #[schema(example = "123456789")]
    pub tax_number: Option<String>,

    #[validate(email(message = "Email inválido."))]
    pub email: Option<String>,

    pub phone: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/catalog/patients",
    tag = "Catalog",
    request_body = CreatePatientPayload,
    responses(
        (status = 201, description = "Paciente criado", body = Patient)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_patient(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Json(payload): Json<CreatePatientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let patient = app_state
        .catalog_service
        .create_patient(
            &mut *rls_conn,
            tenant.0,
            user.0.id,
            &payload.name,
            payload.tax_number.as_deref(),
            payload.email.as_deref(),
            payload.phone.as_deref(),
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(patient)))
}

#[utoipa::path(
    get,
    path = "/api/catalog/patients",
    tag = "Catalog",
    responses(
        (status = 200, description = "Pacientes da clínica", body = Vec<Patient>)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Clínica")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_patients(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    tenant: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let mut rls_conn = get_rls_connection(&app_state, &tenant, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let patients = app_state
        .catalog_service
        .list_patients(&mut *rls_conn, tenant.0)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(patients)))
}
