// src/models/consultation.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "consultation_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationStatus {
    Started,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl ConsultationStatus {
    /// Só consultas a decorrer aceitam procedimentos.
    pub fn accepts_procedures(&self) -> bool {
        matches!(self, ConsultationStatus::Started | ConsultationStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Started => "STARTED",
            ConsultationStatus::InProgress => "IN_PROGRESS",
            ConsultationStatus::Completed => "COMPLETED",
            ConsultationStatus::Cancelled => "CANCELLED",
            ConsultationStatus::NoShow => "NO_SHOW",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub entity_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub status: ConsultationStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[schema(example = "Dor no 36")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationItem {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub consultation_id: Uuid,
    pub procedure_id: Uuid,
    // Preenchido quando o procedimento veio de um plano de tratamento
    pub plan_item_id: Option<Uuid>,
    #[schema(example = 1)]
    pub quantity: i32,
    #[schema(example = "15.00")]
    pub unit_price: Decimal,
    #[schema(example = "15.00")]
    pub total: Decimal,
    pub tooth_number: Option<i16>,
    pub faces: Option<Vec<String>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationDetail {
    #[serde(flatten)]
    pub header: Consultation,
    pub items: Vec<ConsultationItem>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ConsultationFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<ConsultationStatus>,
}
