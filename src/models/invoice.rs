// src/models/invoice.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "invoice_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceKind {
    Consultation, // Fatura de uma consulta
    Plan,         // Fatura de um plano de tratamento
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "invoice_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Pending,   // Pendente
    Partial,   // Paga parcialmente
    Paid,      // Paga
    Cancelled, // Anulada
}

impl InvoiceStatus {
    /// Estado derivado do que já foi pago face ao total.
    pub fn from_paid(paid: Decimal, total: Decimal) -> Self {
        if paid >= total {
            InvoiceStatus::Paid
        } else if paid > Decimal::ZERO {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "invoice_item_origin", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceItemOrigin {
    ConsultationItem,
    PlanItem,
}

impl InvoiceItemOrigin {
    /// Origem de item aceite por cada tipo de fatura.
    pub fn matches(&self, kind: InvoiceKind) -> bool {
        matches!(
            (self, kind),
            (InvoiceItemOrigin::ConsultationItem, InvoiceKind::Consultation)
                | (InvoiceItemOrigin::PlanItem, InvoiceKind::Plan)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "installment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallmentStatus {
    Pending,
    Partial,
    Paid,
}

impl InstallmentStatus {
    pub fn from_amounts(paid: Decimal, planned: Decimal) -> Self {
        if paid >= planned {
            InstallmentStatus::Paid
        } else if paid > Decimal::ZERO {
            InstallmentStatus::Partial
        } else {
            InstallmentStatus::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,     // Dinheiro
    Card,     // Cartão
    Transfer, // Transferência
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Transfer => "TRANSFER",
        }
    }
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub kind: InvoiceKind,

    // Exatamente um dos dois, conforme o tipo
    pub consultation_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,

    #[schema(example = "150.00")]
    pub total: Decimal,
    pub status: InvoiceStatus,
    pub issued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    pub origin: InvoiceItemOrigin,
    pub consultation_item_id: Option<Uuid>,
    pub plan_item_id: Option<Uuid>,
    pub procedure_id: Option<Uuid>,
    #[schema(example = "Restauração em resina")]
    pub description: Option<String>,
    #[schema(example = 1)]
    pub quantity: i32,
    #[schema(example = "50.00")]
    pub unit_price: Decimal,
    #[schema(example = "50.00")]
    pub total: Decimal,
}

// Parcela
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Installment {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    #[schema(example = 1)]
    pub number: i32,
    #[schema(example = "50.00")]
    pub planned_amount: Decimal,
    #[schema(value_type = String, format = Date, example = "2025-04-01")]
    pub due_date: NaiveDate,
    #[schema(example = "0.00")]
    pub paid_amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
    pub method: Option<PaymentMethod>,
    pub status: InstallmentStatus,
    pub notes: Option<String>,
}

// Pagamento direto de uma fatura sem parcelas
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoicePayment {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub invoice_id: Uuid,
    #[schema(example = "75.00")]
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub operator_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub header: Invoice,
    pub patient_name: String,
    pub items: Vec<InvoiceItem>,
    pub installments: Vec<Installment>,
    pub payments: Vec<InvoicePayment>,
    #[schema(example = "50.00")]
    pub paid_total: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct InvoiceFilter {
    pub patient_id: Option<Uuid>,
    pub kind: Option<InvoiceKind>,
    pub status: Option<InvoiceStatus>,
    pub limit: Option<i64>,
}

// Linha de fatura ainda por gravar (projeção de consulta/plano)
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct NewInvoiceItem {
    pub origin: InvoiceItemOrigin,
    pub consultation_item_id: Option<Uuid>,
    pub plan_item_id: Option<Uuid>,
    pub procedure_id: Option<Uuid>,
    pub description: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

// Parcela pedida pelo cliente
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentDraft {
    #[validate(range(min = 1, message = "O número da parcela começa em 1."))]
    #[schema(example = 1)]
    pub number: i32,
    #[validate(custom(function = "crate::handlers::validate_positive"))]
    #[schema(example = "50.00")]
    pub planned_amount: Decimal,
    #[schema(value_type = String, format = Date, example = "2025-04-01")]
    pub due_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn money(v: &str) -> Decimal {
        Decimal::from_str(v).unwrap()
    }

    #[test]
    fn invoice_status_follows_paid_amount() {
        let total = money("150.00");
        assert_eq!(InvoiceStatus::from_paid(Decimal::ZERO, total), InvoiceStatus::Pending);
        assert_eq!(InvoiceStatus::from_paid(money("100.00"), total), InvoiceStatus::Partial);
        assert_eq!(InvoiceStatus::from_paid(money("150.00"), total), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::from_paid(money("200.00"), total), InvoiceStatus::Paid);
    }

    #[test]
    fn installment_status_follows_paid_amount() {
        let planned = money("50.00");
        assert_eq!(InstallmentStatus::from_amounts(Decimal::ZERO, planned), InstallmentStatus::Pending);
        assert_eq!(InstallmentStatus::from_amounts(money("0.01"), planned), InstallmentStatus::Partial);
        assert_eq!(InstallmentStatus::from_amounts(money("50"), planned), InstallmentStatus::Paid);
    }

    #[test]
    fn item_origin_must_match_invoice_kind() {
        assert!(InvoiceItemOrigin::ConsultationItem.matches(InvoiceKind::Consultation));
        assert!(InvoiceItemOrigin::PlanItem.matches(InvoiceKind::Plan));
        assert!(!InvoiceItemOrigin::PlanItem.matches(InvoiceKind::Consultation));
        assert!(!InvoiceItemOrigin::ConsultationItem.matches(InvoiceKind::Plan));
    }

    #[test]
    fn payment_method_uses_screaming_case_on_the_wire() {
        let json = serde_json::to_string(&PaymentMethod::Transfer).unwrap();
        assert_eq!(json, "\"TRANSFER\"");
        let back: PaymentMethod = serde_json::from_str("\"CARD\"").unwrap();
        assert_eq!(back, PaymentMethod::Card);
    }
}
