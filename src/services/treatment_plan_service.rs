// src/services/treatment_plan_service.rs

use std::collections::HashSet;

use serde_json::json;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        consultation_repo::NewConsultationItem, BudgetRepository, ConsultationRepository,
        TreatmentPlanRepository,
    },
    models::{
        consultation::ConsultationItem,
        treatment_plan::{
            ApprovedBudgetItem, NewPlanItem, PlanItem, PlanItemStatus, TreatmentPlan,
            TreatmentPlanDetail,
        },
    },
    services::{
        audit_service::{AuditRecord, AuditService},
        pricing_service::PricingService,
    },
};

/// Itens de plano a criar: um por item de orçamento aprovado.
/// Um orçamento em que algum item já foi planeado fica de fora por inteiro.
pub fn derive_plan_items(approved: &[ApprovedBudgetItem]) -> Vec<NewPlanItem> {
    let consumed_budgets: HashSet<Uuid> = approved
        .iter()
        .filter(|item| item.consumed)
        .map(|item| item.budget_id)
        .collect();

    approved
        .iter()
        .filter(|item| !consumed_budgets.contains(&item.budget_id))
        .map(|item| NewPlanItem {
            budget_item_id: item.budget_item_id,
            procedure_id: item.procedure_id,
            planned_quantity: item.quantity,
            tooth_number: item.tooth_number,
            faces: item.faces.clone(),
        })
        .collect()
}

/// O plano conclui quando todos os itens estão concluídos ou cancelados.
pub fn plan_is_complete(items: &[PlanItem]) -> bool {
    items.iter().all(|item| item.status.is_closed())
}

fn ensure_open(item: &PlanItem) -> Result<(), AppError> {
    if item.status.is_closed() {
        return Err(AppError::PlanItemClosed(item.status.as_str().to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct TreatmentPlanService {
    repo: TreatmentPlanRepository,
    budget_repo: BudgetRepository,
    consultation_repo: ConsultationRepository,
    pricing: PricingService,
    audit: AuditService,
}

impl TreatmentPlanService {
    pub fn new(
        repo: TreatmentPlanRepository,
        budget_repo: BudgetRepository,
        consultation_repo: ConsultationRepository,
        pricing: PricingService,
        audit: AuditService,
    ) -> Self {
        Self {
            repo,
            budget_repo,
            consultation_repo,
            pricing,
            audit,
        }
    }

    /// Reação a `ConsultationCreated`, dentro da transação da consulta.
    pub async fn on_consultation_created(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<TreatmentPlan>, AppError> {
        if self.repo.find_in_progress(&mut *conn, tenant_id, patient_id).await?.is_some() {
            return Ok(None);
        }

        let approved = self
            .budget_repo
            .approved_items_for_patient(&mut *conn, tenant_id, patient_id)
            .await?;
        let new_items = derive_plan_items(&approved);
        if new_items.is_empty() {
            return Ok(None);
        }

        let plan = self.repo.create_plan(&mut *conn, tenant_id, patient_id).await?;
        for item in &new_items {
            self.repo.insert_item(&mut *conn, tenant_id, plan.id, item).await?;
        }

        tracing::info!(
            "📋 Plano de tratamento {} criado para o paciente {} com {} itens",
            plan.id,
            patient_id,
            new_items.len()
        );

        Ok(Some(plan))
    }

    async fn finish_plan_if_done(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        plan_id: Uuid,
    ) -> Result<(), AppError> {
        let items = self.repo.list_items(&mut *conn, tenant_id, plan_id).await?;
        if plan_is_complete(&items) {
            self.repo.complete_plan(&mut *conn, tenant_id, plan_id).await?;
            tracing::info!("✅ Plano de tratamento {} concluído", plan_id);
        }
        Ok(())
    }

    async fn detail(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        plan: TreatmentPlan,
    ) -> Result<TreatmentPlanDetail, AppError> {
        let items = self.repo.list_items(conn, tenant_id, plan.id).await?;
        Ok(TreatmentPlanDetail { header: plan, items })
    }

    pub async fn active_plan<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<TreatmentPlanDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let plan = self
            .repo
            .find_in_progress(&mut *conn, tenant_id, patient_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Plano de tratamento em curso".into()))?;

        self.detail(&mut *conn, tenant_id, plan).await
    }

    pub async fn details<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        plan_id: Uuid,
    ) -> Result<TreatmentPlanDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let plan = self
            .repo
            .find_plan(&mut *conn, tenant_id, plan_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Plano de tratamento".into()))?;

        self.detail(&mut *conn, tenant_id, plan).await
    }

    /// Executa um item do plano numa consulta a decorrer.
    pub async fn start_procedure_from_plan<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        plan_item_id: Uuid,
        consultation_id: Uuid,
    ) -> Result<ConsultationItem, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let item = self
            .repo
            .lock_item(&mut *tx, tenant_id, plan_item_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Item do plano".into()))?;
        ensure_open(&item)?;

        let consultation = self
            .consultation_repo
            .find(&mut *tx, tenant_id, consultation_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Consulta".into()))?;
        if !consultation.status.accepts_procedures() {
            return Err(AppError::ConsultationNotActive(
                consultation.status.as_str().to_string(),
            ));
        }

        let plan = self
            .repo
            .find_plan(&mut *tx, tenant_id, item.plan_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Plano de tratamento".into()))?;
        if plan.patient_id != consultation.patient_id {
            return Err(AppError::PatientMismatch("Consulta".into()));
        }

        // Preço atual para a entidade da consulta, quantidade 1
        let price = self
            .pricing
            .lookup(&mut *tx, tenant_id, item.procedure_id, consultation.entity_id)
            .await?;

        let consultation_item = self
            .consultation_repo
            .insert_item(
                &mut *tx,
                tenant_id,
                consultation_id,
                &NewConsultationItem {
                    procedure_id: item.procedure_id,
                    plan_item_id: Some(item.id),
                    quantity: 1,
                    unit_price: price.patient_price,
                    tooth_number: item.tooth_number,
                    faces: item.faces.as_deref(),
                },
            )
            .await?;

        self.repo
            .close_item(&mut *tx, tenant_id, item.id, PlanItemStatus::Completed)
            .await?;
        self.finish_plan_if_done(&mut *tx, tenant_id, item.plan_id).await?;

        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "START_PLAN_PROCEDURE", "plan_item")
                .object(item.id)
                .details(json!({
                    "consultationId": consultation_id,
                    "consultationItemId": consultation_item.id,
                })),
        );

        Ok(consultation_item)
    }

    pub async fn cancel_plan_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        plan_item_id: Uuid,
    ) -> Result<PlanItem, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let item = self
            .repo
            .lock_item(&mut *tx, tenant_id, plan_item_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Item do plano".into()))?;
        ensure_open(&item)?;

        let cancelled = self
            .repo
            .close_item(&mut *tx, tenant_id, item.id, PlanItemStatus::Cancelled)
            .await?;
        self.finish_plan_if_done(&mut *tx, tenant_id, item.plan_id).await?;

        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "CANCEL_PLAN_ITEM", "plan_item").object(item.id),
        );

        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approved(budget_id: Uuid, consumed: bool) -> ApprovedBudgetItem {
        ApprovedBudgetItem {
            budget_id,
            budget_item_id: Uuid::new_v4(),
            procedure_id: Uuid::new_v4(),
            quantity: 1,
            tooth_number: Some(36),
            faces: Some(vec!["M".into(), "O".into()]),
            consumed,
        }
    }

    fn plan_item(status: PlanItemStatus) -> PlanItem {
        PlanItem {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            budget_item_id: Uuid::new_v4(),
            procedure_id: Uuid::new_v4(),
            planned_quantity: 1,
            executed_quantity: 0,
            status,
            tooth_number: None,
            faces: None,
        }
    }

    #[test]
    fn every_unconsumed_budget_item_becomes_a_plan_item() {
        let budget = Uuid::new_v4();
        let items = vec![approved(budget, false), approved(budget, false)];

        let derived = derive_plan_items(&items);

        assert_eq!(derived.len(), 2);
        assert_eq!(derived[0].budget_item_id, items[0].budget_item_id);
        assert_eq!(derived[0].procedure_id, items[0].procedure_id);
        assert_eq!(derived[0].tooth_number, Some(36));
        assert_eq!(derived[1].faces, items[1].faces);
    }

    #[test]
    fn partially_consumed_budgets_are_skipped_entirely() {
        let consumed = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        let items = vec![
            approved(consumed, true),
            approved(consumed, false),
            approved(fresh, false),
        ];

        let derived = derive_plan_items(&items);

        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].budget_item_id, items[2].budget_item_id);
    }

    #[test]
    fn nothing_to_plan_without_approved_items() {
        assert!(derive_plan_items(&[]).is_empty());
    }

    #[test]
    fn plan_completes_when_every_item_is_closed() {
        assert!(!plan_is_complete(&[
            plan_item(PlanItemStatus::Completed),
            plan_item(PlanItemStatus::Pending),
        ]));
        assert!(plan_is_complete(&[
            plan_item(PlanItemStatus::Completed),
            plan_item(PlanItemStatus::Cancelled),
        ]));
    }

    #[test]
    fn closed_items_cannot_be_touched() {
        assert!(ensure_open(&plan_item(PlanItemStatus::Pending)).is_ok());
        match ensure_open(&plan_item(PlanItemStatus::Cancelled)) {
            Err(AppError::PlanItemClosed(status)) => assert_eq!(status, "CANCELLED"),
            other => panic!("esperava PlanItemClosed, veio {other:?}"),
        }
    }

    // ---
    // Com base de dados
    // ---

    use crate::{
        common::test_fixtures::{audit, seed_approved_budget, seed_clinic},
        db::CatalogRepository,
    };
    use sqlx::PgPool;

    fn service(pool: &PgPool) -> TreatmentPlanService {
        TreatmentPlanService::new(
            TreatmentPlanRepository::new(),
            BudgetRepository::new(),
            ConsultationRepository::new(),
            PricingService::new(CatalogRepository::new(), audit(pool)),
            audit(pool),
        )
    }

    async fn count(pool: &PgPool, sql: &str, patient_id: Uuid) -> i64 {
        sqlx::query_scalar(sql).bind(patient_id).fetch_one(pool).await.unwrap()
    }

    const PLANS: &str = "SELECT COUNT(*) FROM treatment_plans WHERE patient_id = $1";
    const PLAN_ITEMS: &str = r#"
        SELECT COUNT(*) FROM plan_items pi
        JOIN treatment_plans tp ON tp.id = pi.plan_id
        WHERE tp.patient_id = $1
    "#;

    #[sqlx::test(migrations = "./migrations")]
    async fn consultation_derives_plan_from_approved_budget(pool: PgPool) {
        let clinic = seed_clinic(&pool).await;
        let budget_item_id = seed_approved_budget(&pool, &clinic).await;
        let service = service(&pool);
        let mut conn = pool.acquire().await.unwrap();

        let plan = service
            .on_consultation_created(&mut *conn, clinic.tenant_id, clinic.patient_id)
            .await
            .unwrap()
            .expect("plano criado");

        let items = TreatmentPlanRepository::new()
            .list_items(&mut *conn, clinic.tenant_id, plan.id)
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].budget_item_id, budget_item_id);
        assert_eq!(items[0].status, PlanItemStatus::Pending);
        assert_eq!(items[0].tooth_number, Some(36));
        assert_eq!(items[0].executed_quantity, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn plan_in_progress_blocks_a_new_one(pool: PgPool) {
        let clinic = seed_clinic(&pool).await;
        let service = service(&pool);
        let mut conn = pool.acquire().await.unwrap();

        TreatmentPlanRepository::new()
            .create_plan(&mut *conn, clinic.tenant_id, clinic.patient_id)
            .await
            .unwrap();
        seed_approved_budget(&pool, &clinic).await;

        let derived = service
            .on_consultation_created(&mut *conn, clinic.tenant_id, clinic.patient_id)
            .await
            .unwrap();
        assert!(derived.is_none());
        assert_eq!(count(&pool, PLANS, clinic.patient_id).await, 1);
        assert_eq!(count(&pool, PLAN_ITEMS, clinic.patient_id).await, 0);
    }
}
