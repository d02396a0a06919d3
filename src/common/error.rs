use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::common::i18n::I18nStore;
use crate::middleware::i18n::Locale;

// Nosso tipo de erro de domínio. As mensagens do `#[error]` são o texto padrão (pt);
// o `I18nStore` traduz pelo `code()` quando o cliente pede outro idioma.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Um ou mais campos são inválidos.")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0} não encontrado(a).")]
    ResourceNotFound(String),

    #[error("Preço não definido para o artigo {procedure_id} e entidade {entity_id}.")]
    PriceNotDefined { procedure_id: Uuid, entity_id: Uuid },

    #[error("Só é possível editar orçamentos em rascunho.")]
    BudgetNotDraft,

    #[error("Não é possível alterar a entidade de um orçamento que já possui itens.")]
    BudgetHasItems,

    #[error("Não é possível aprovar orçamento sem itens.")]
    EmptyBudgetApproval,

    #[error("Número de dente é obrigatório para este artigo.")]
    ToothRequired,

    #[error("Deve indicar pelo menos uma face do dente.")]
    FacesRequired,

    #[error("Faces inválidas: {0}")]
    InvalidFaces(String),

    #[error("Origem da fatura inválida: {0}")]
    InvoiceOriginMismatch(String),

    #[error("O tipo de origem do item não corresponde ao tipo da fatura.")]
    ItemOriginMismatch,

    #[error("Só faturas de plano podem ter parcelas.")]
    InvoiceNotPlan,

    #[error("Parcelas já foram definidas para esta fatura.")]
    InstallmentsAlreadyDefined,

    #[error("Soma das parcelas ({actual}) não coincide com total da fatura ({expected}).")]
    InstallmentSumMismatch { expected: Decimal, actual: Decimal },

    #[error("A parcela {number} deve ser positiva e ter no máximo duas casas decimais ({amount}).")]
    InvalidInstallmentAmount { number: i32, amount: Decimal },

    #[error("Esta fatura tem parcelas definidas. Faça o pagamento através de uma parcela.")]
    InvoiceHasInstallments,

    #[error("Esta fatura já possui pagamentos registados.")]
    InvoiceHasPayments,

    #[error("Não é possível operar sobre uma fatura cancelada.")]
    InvoiceCancelled,

    #[error("Esta fatura já está totalmente paga.")]
    InvoiceAlreadyPaid,

    #[error("Sessão de caixa inválida ou fechada.")]
    SessionNotOpen,

    #[error("Já existe uma sessão de caixa aberta.")]
    SessionAlreadyOpen,

    #[error("Deve indicar exatamente um de fatura ou parcela.")]
    PaymentTargetAmbiguous,

    #[error("Este procedimento já está {0} e não pode ser alterado.")]
    PlanItemClosed(String),

    #[error("A consulta está {0} e não permite adicionar procedimentos.")]
    ConsultationNotActive(String),

    #[error("Não é possível remover itens de uma consulta concluída.")]
    ConsultationCompleted,

    #[error("{0} pertence a outro paciente.")]
    PatientMismatch(String),

    #[error("Registo duplicado: {0}")]
    UniqueConstraintViolation(String),

    #[error("Token de autenticação inválido ou ausente.")]
    InvalidToken,

    #[error("O cabeçalho X-Tenant-ID não corresponde à clínica do utilizador.")]
    TenantMismatch,

    #[error("Acesso restrito ao perfil {0}.")]
    Forbidden(&'static str),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro ao registar pagamento: {0}")]
    PaymentRegistrationFailed(String),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Chave estável usada pelo catálogo de mensagens.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation",
            AppError::ResourceNotFound(_) => "not_found",
            AppError::PriceNotDefined { .. } => "price_not_defined",
            AppError::BudgetNotDraft => "budget_not_draft",
            AppError::BudgetHasItems => "budget_has_items",
            AppError::EmptyBudgetApproval => "empty_budget_approval",
            AppError::ToothRequired => "tooth_required",
            AppError::FacesRequired => "faces_required",
            AppError::InvalidFaces(_) => "invalid_faces",
            AppError::InvoiceOriginMismatch(_) => "invoice_origin_mismatch",
            AppError::ItemOriginMismatch => "item_origin_mismatch",
            AppError::InvoiceNotPlan => "invoice_not_plan",
            AppError::InstallmentsAlreadyDefined => "installments_already_defined",
            AppError::InstallmentSumMismatch { .. } => "installment_sum_mismatch",
            AppError::InvalidInstallmentAmount { .. } => "invalid_installment_amount",
            AppError::InvoiceHasInstallments => "invoice_has_installments",
            AppError::InvoiceHasPayments => "invoice_has_payments",
            AppError::InvoiceCancelled => "invoice_cancelled",
            AppError::InvoiceAlreadyPaid => "invoice_already_paid",
            AppError::SessionNotOpen => "session_not_open",
            AppError::SessionAlreadyOpen => "session_already_open",
            AppError::PaymentTargetAmbiguous => "payment_target_ambiguous",
            AppError::PlanItemClosed(_) => "plan_item_closed",
            AppError::ConsultationNotActive(_) => "consultation_not_active",
            AppError::ConsultationCompleted => "consultation_completed",
            AppError::PatientMismatch(_) => "patient_mismatch",
            AppError::UniqueConstraintViolation(_) => "duplicate",
            AppError::InvalidToken | AppError::JwtError(_) => "invalid_token",
            AppError::TenantMismatch => "tenant_mismatch",
            AppError::Forbidden(_) => "forbidden",
            AppError::PaymentRegistrationFailed(_) => "payment_failed",
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::SessionAlreadyOpen | AppError::UniqueConstraintViolation(_) => {
                StatusCode::CONFLICT
            }
            AppError::InvalidToken | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::TenantMismatch | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::PaymentRegistrationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // Todo o resto são violações de regra de negócio.
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Parâmetros interpolados na mensagem traduzida.
    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            AppError::ResourceNotFound(what) => vec![("resource", what.clone())],
            AppError::PriceNotDefined { procedure_id, entity_id } => vec![
                ("procedure", procedure_id.to_string()),
                ("entity", entity_id.to_string()),
            ],
            AppError::InvalidFaces(faces) => vec![("faces", faces.clone())],
            AppError::InvoiceOriginMismatch(reason) => vec![("reason", reason.clone())],
            AppError::InstallmentSumMismatch { expected, actual } => vec![
                ("expected", expected.to_string()),
                ("actual", actual.to_string()),
            ],
            AppError::InvalidInstallmentAmount { number, amount } => vec![
                ("number", number.to_string()),
                ("amount", amount.to_string()),
            ],
            AppError::PlanItemClosed(status) | AppError::ConsultationNotActive(status) => {
                vec![("status", status.clone())]
            }
            AppError::PatientMismatch(what) => vec![("resource", what.clone())],
            AppError::UniqueConstraintViolation(what) => vec![("resource", what.clone())],
            AppError::Forbidden(role) => vec![("role", role.to_string())],
            _ => vec![],
        }
    }

    pub fn to_api_error(&self, locale: &Locale, store: &I18nStore) -> ApiError {
        let status = self.status();

        if let AppError::ValidationError(errors) = self {
            let mut details = std::collections::HashMap::new();
            for (field, field_errors) in errors.field_errors() {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                details.insert(field.to_string(), messages);
            }
            return ApiError {
                status,
                error: store
                    .translate(&locale.0, self.code(), &[])
                    .unwrap_or_else(|| self.to_string()),
                details: Some(json!(details)),
            };
        }

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // O detalhe fica no log; o cliente recebe só a mensagem genérica.
            tracing::error!("Erro Interno do Servidor: {}", self);
        }

        let error = store
            .translate(&locale.0, self.code(), &self.params())
            .unwrap_or_else(|| self.to_string());

        ApiError {
            status,
            error,
            details: None,
        }
    }
}

// Resposta padronizada de erro da API.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

// Usado pelos middlewares, que não têm acesso ao idioma negociado.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default(), &I18nStore::default())
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rules_map_to_bad_request() {
        assert_eq!(AppError::EmptyBudgetApproval.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::ToothRequired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::PriceNotDefined {
                procedure_id: Uuid::nil(),
                entity_id: Uuid::nil()
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn second_open_session_is_a_conflict() {
        assert_eq!(AppError::SessionAlreadyOpen.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::InternalServerError(anyhow::anyhow!("pool exhausted"));
        let api = err.to_api_error(&Locale("en".into()), &I18nStore::default());

        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.error.contains("pool exhausted"));
    }

    #[test]
    fn not_found_message_is_translated() {
        let err = AppError::ResourceNotFound("Fatura".into());
        let api = err.to_api_error(&Locale("en".into()), &I18nStore::default());

        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert_eq!(api.error, "Fatura not found.");
    }

    #[test]
    fn validation_errors_carry_field_details() {
        let mut errors = validator::ValidationErrors::new();
        let mut field_error = validator::ValidationError::new("range");
        field_error.message = Some("O valor não pode ser negativo.".into());
        errors.add("amount", field_error);

        let api = AppError::ValidationError(errors)
            .to_api_error(&Locale::default(), &I18nStore::default());

        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        let details = api.details.expect("details");
        assert_eq!(details["amount"][0], "O valor não pode ser negativo.");
    }
}
