// src/services/events.rs

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{common::error::AppError, services::treatment_plan_service::TreatmentPlanService};

/// Factos de domínio publicados dentro da transação que os originou.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainEvent {
    ConsultationCreated {
        tenant_id: Uuid,
        consultation_id: Uuid,
        patient_id: Uuid,
    },
}

// Entrega síncrona aos ouvintes, na mesma conexão/transação do emissor.
#[derive(Clone)]
pub struct EventDispatcher {
    plans: TreatmentPlanService,
}

impl EventDispatcher {
    pub fn new(plans: TreatmentPlanService) -> Self {
        Self { plans }
    }

    pub async fn dispatch(&self, conn: &mut PgConnection, event: DomainEvent) -> Result<(), AppError> {
        match event {
            DomainEvent::ConsultationCreated {
                tenant_id,
                consultation_id,
                patient_id,
            } => {
                tracing::debug!("Evento ConsultationCreated para a consulta {}", consultation_id);
                self.plans
                    .on_consultation_created(conn, tenant_id, patient_id)
                    .await?;
            }
        }
        Ok(())
    }
}
