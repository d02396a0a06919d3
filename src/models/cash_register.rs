// src/models/cash_register.rs

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::invoice::{InvoiceStatus, PaymentMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "cash_session_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashSessionStatus {
    Open,   // Caixa aberto
    Closed, // Caixa fechado
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CashSession {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub operator_id: Uuid,
    pub status: CashSessionStatus,
    #[schema(example = "100.00")]
    pub opening_float: Decimal,
    #[schema(example = "160.00")]
    pub closing_float: Option<Decimal>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl CashSession {
    /// Só sessões abertas aceitam pagamentos ou fecho.
    pub fn ensure_open(self) -> Result<Self, AppError> {
        match self.status {
            CashSessionStatus::Open => Ok(self),
            CashSessionStatus::Closed => Err(AppError::SessionNotOpen),
        }
    }
}

// Pagamento registado no caixa (fatura OU parcela)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CashierPayment {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub session_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub installment_id: Option<Uuid>,
    #[schema(example = "20.00")]
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub operator_id: Uuid,
    pub paid_at: DateTime<Utc>,
    pub notes: Option<String>,
}

// Linha do histórico de pagamentos, já com o nome do paciente
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistoryEntry {
    pub id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
    pub patient_name: Option<String>,
    pub invoice_id: Option<Uuid>,
    pub installment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MethodTotals {
    pub count: i64,
    pub total: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub count: i64,
    #[schema(example = "60.00")]
    pub total: Decimal,
    // Chave: CASH | CARD | TRANSFER
    pub by_method: BTreeMap<String, MethodTotals>,
    pub history: Vec<PaymentHistoryEntry>,
}

impl PaymentSummary {
    pub fn from_history(history: Vec<PaymentHistoryEntry>) -> Self {
        let mut by_method: BTreeMap<String, MethodTotals> = BTreeMap::new();
        let mut total = Decimal::ZERO;

        for entry in &history {
            total += entry.amount;
            let slot = by_method.entry(entry.method.as_str().to_string()).or_default();
            slot.count += 1;
            slot.total += entry.amount;
        }

        Self {
            count: history.len() as i64,
            total,
            by_method,
            history,
        }
    }
}

/// Diferença de fecho: positivo = falta dinheiro na gaveta.
pub fn reconciliation_difference(opening: Decimal, payments: Decimal, closing: Decimal) -> Decimal {
    opening + payments - closing
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CashSessionSummary {
    #[serde(flatten)]
    pub session: CashSession,
    pub payments: PaymentSummary,
    #[schema(example = "160.00")]
    pub expected_closing: Decimal,
    // Só existe depois do fecho
    #[schema(example = "0.00")]
    pub difference: Option<Decimal>,
}

impl CashSessionSummary {
    pub fn new(session: CashSession, payments: PaymentSummary) -> Self {
        let expected_closing = session.opening_float + payments.total;
        let difference = session
            .closing_float
            .map(|closing| reconciliation_difference(session.opening_float, payments.total, closing));
        Self {
            session,
            payments,
            expected_closing,
            difference,
        }
    }
}

// --- Pendentes ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingInvoice {
    pub invoice_id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub status: InvoiceStatus,
    pub total: Decimal,
    pub paid: Decimal,
    pub pending: Decimal,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingInstallment {
    pub installment_id: Uuid,
    pub invoice_id: Uuid,
    pub number: i32,
    pub patient_name: String,
    pub planned_amount: Decimal,
    pub paid_amount: Decimal,
    pub pending: Decimal,
    #[schema(value_type = String, format = Date)]
    pub due_date: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingReceivables {
    pub invoices: Vec<PendingInvoice>,
    pub installments: Vec<PendingInstallment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn money(v: &str) -> Decimal {
        Decimal::from_str(v).unwrap()
    }

    fn entry(amount: &str, method: PaymentMethod) -> PaymentHistoryEntry {
        PaymentHistoryEntry {
            id: Uuid::new_v4(),
            amount: money(amount),
            method,
            paid_at: Utc::now(),
            patient_name: Some("Maria".into()),
            invoice_id: Some(Uuid::new_v4()),
            installment_id: None,
        }
    }

    fn session(opening: &str, closing: Option<&str>) -> CashSession {
        CashSession {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            operator_id: Uuid::new_v4(),
            status: if closing.is_some() { CashSessionStatus::Closed } else { CashSessionStatus::Open },
            opening_float: money(opening),
            closing_float: closing.map(money),
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    #[test]
    fn summary_groups_payments_by_method() {
        let summary = PaymentSummary::from_history(vec![
            entry("20.00", PaymentMethod::Cash),
            entry("30.00", PaymentMethod::Card),
            entry("10.00", PaymentMethod::Cash),
        ]);

        assert_eq!(summary.count, 3);
        assert_eq!(summary.total, money("60.00"));
        assert_eq!(summary.by_method["CASH"], MethodTotals { count: 2, total: money("30.00") });
        assert_eq!(summary.by_method["CARD"], MethodTotals { count: 1, total: money("30.00") });
        assert!(!summary.by_method.contains_key("TRANSFER"));
    }

    #[test]
    fn closing_matching_the_drawer_has_no_difference() {
        let payments = PaymentSummary::from_history(vec![
            entry("20.00", PaymentMethod::Cash),
            entry("30.00", PaymentMethod::Cash),
            entry("10.00", PaymentMethod::Transfer),
        ]);
        let summary = CashSessionSummary::new(session("100.00", Some("160.00")), payments);

        assert_eq!(summary.expected_closing, money("160.00"));
        assert_eq!(summary.difference, Some(Decimal::ZERO));
    }

    #[test]
    fn short_drawer_gives_positive_difference() {
        assert_eq!(
            reconciliation_difference(money("100.00"), money("60.00"), money("150.00")),
            money("10.00")
        );
    }

    #[test]
    fn closed_session_rejects_operations() {
        assert!(session("100.00", None).ensure_open().is_ok());
        assert!(matches!(
            session("100.00", Some("100.00")).ensure_open(),
            Err(AppError::SessionNotOpen)
        ));
    }

    #[test]
    fn open_session_has_no_difference_yet() {
        let summary = CashSessionSummary::new(session("50.00", None), PaymentSummary::default());
        assert_eq!(summary.expected_closing, money("50.00"));
        assert!(summary.difference.is_none());
    }
}
