// src/models/budget.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "budget_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetStatus {
    Draft,    // Rascunho
    Approved, // Aprovado
    Rejected, // Rejeitado
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub entity_id: Uuid,
    #[schema(value_type = String, format = Date, example = "2025-03-14")]
    pub budget_date: NaiveDate,
    pub status: BudgetStatus,
    #[schema(example = "70.00")]
    pub entity_total: Decimal,
    #[schema(example = "30.00")]
    pub patient_total: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BudgetItem {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub budget_id: Uuid,
    pub procedure_id: Uuid,
    #[schema(example = 1)]
    pub quantity: i32,
    #[schema(example = "35.00")]
    pub entity_price: Decimal,
    #[schema(example = "15.00")]
    pub patient_price: Decimal,
    #[schema(example = "35.00")]
    pub entity_subtotal: Decimal,
    #[schema(example = "15.00")]
    pub patient_subtotal: Decimal,
    #[schema(example = 36)]
    pub tooth_number: Option<i16>,
    #[schema(example = json!(["M", "O"]))]
    pub faces: Option<Vec<String>>,
}

// Cabeçalho + itens, para a tela de detalhe
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BudgetDetail {
    #[serde(flatten)]
    pub header: Budget,
    pub patient_name: String,
    pub entity_name: String,
    pub items: Vec<BudgetItem>,
}

// Filtros da listagem
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BudgetFilter {
    pub patient_id: Option<Uuid>,
    pub entity_id: Option<Uuid>,
    pub status: Option<BudgetStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<i64>,
}

/// Totais do cabeçalho, sempre derivados dos itens atuais.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetTotals {
    pub entity_total: Decimal,
    pub patient_total: Decimal,
}

impl BudgetTotals {
    pub fn from_items(items: &[BudgetItem]) -> Self {
        items.iter().fold(
            Self {
                entity_total: Decimal::ZERO,
                patient_total: Decimal::ZERO,
            },
            |acc, item| Self {
                entity_total: acc.entity_total + item.entity_subtotal,
                patient_total: acc.patient_total + item.patient_subtotal,
            },
        )
    }
}
