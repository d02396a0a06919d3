// src/models/treatment_plan.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "plan_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    InProgress, // Em curso
    Completed,  // Concluído
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "plan_item_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanItemStatus {
    Pending,
    Completed,
    Cancelled,
}

impl PlanItemStatus {
    /// Concluído ou cancelado: o item já não conta como trabalho pendente.
    pub fn is_closed(&self) -> bool {
        matches!(self, PlanItemStatus::Completed | PlanItemStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanItemStatus::Pending => "PENDING",
            PlanItemStatus::Completed => "COMPLETED",
            PlanItemStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentPlan {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanItem {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub budget_item_id: Uuid,
    pub procedure_id: Uuid,
    #[schema(example = 1)]
    pub planned_quantity: i32,
    #[schema(example = 0)]
    pub executed_quantity: i32,
    pub status: PlanItemStatus,
    pub tooth_number: Option<i16>,
    pub faces: Option<Vec<String>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentPlanDetail {
    #[serde(flatten)]
    pub header: TreatmentPlan,
    pub items: Vec<PlanItem>,
}

// Item de orçamento aprovado, visto pela derivação do plano.
#[derive(Debug, Clone, FromRow)]
pub struct ApprovedBudgetItem {
    pub budget_id: Uuid,
    pub budget_item_id: Uuid,
    pub procedure_id: Uuid,
    pub quantity: i32,
    pub tooth_number: Option<i16>,
    pub faces: Option<Vec<String>>,
    // Já referenciado por algum item de plano?
    pub consumed: bool,
}

// Dados de um item de plano ainda por gravar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlanItem {
    pub budget_item_id: Uuid,
    pub procedure_id: Uuid,
    pub planned_quantity: i32,
    pub tooth_number: Option<i16>,
    pub faces: Option<Vec<String>>,
}
