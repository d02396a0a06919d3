// src/services/budget_service.rs

use chrono::{NaiveDate, Utc};
use serde_json::json;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::BudgetRepository,
    models::budget::{Budget, BudgetDetail, BudgetFilter, BudgetItem, BudgetStatus, BudgetTotals},
    services::{
        audit_service::{AuditRecord, AuditService},
        catalog_service::CatalogService,
        pricing_service::PricingService,
    },
};

// Alterações pedidas ao cabeçalho; `None` mantém o valor atual
#[derive(Debug, Default)]
pub struct BudgetChanges<'a> {
    pub entity_id: Option<Uuid>,
    pub budget_date: Option<NaiveDate>,
    pub notes: Option<&'a str>,
}

#[derive(Clone)]
pub struct BudgetService {
    repo: BudgetRepository,
    catalog: CatalogService,
    pricing: PricingService,
    audit: AuditService,
}

fn ensure_draft(budget: &Budget) -> Result<(), AppError> {
    if budget.status != BudgetStatus::Draft {
        return Err(AppError::BudgetNotDraft);
    }
    Ok(())
}

/// A entidade só muda enquanto o orçamento não tem itens.
fn check_entity_change(budget: &Budget, new_entity: Option<Uuid>, item_count: i64) -> Result<bool, AppError> {
    match new_entity {
        Some(entity_id) if entity_id != budget.entity_id => {
            if item_count > 0 {
                return Err(AppError::BudgetHasItems);
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Aprovar exige pelo menos um item; o resto das transições é livre.
fn check_transition(new_status: BudgetStatus, item_count: i64) -> Result<(), AppError> {
    if new_status == BudgetStatus::Approved && item_count == 0 {
        return Err(AppError::EmptyBudgetApproval);
    }
    Ok(())
}

impl BudgetService {
    pub fn new(
        repo: BudgetRepository,
        catalog: CatalogService,
        pricing: PricingService,
        audit: AuditService,
    ) -> Self {
        Self {
            repo,
            catalog,
            pricing,
            audit,
        }
    }

    async fn locked_budget(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        budget_id: Uuid,
    ) -> Result<Budget, AppError> {
        self.repo
            .lock_budget(conn, tenant_id, budget_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Orçamento".into()))
    }

    // Totais do cabeçalho = soma dos subtotais dos itens atuais
    async fn recompute_totals(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        budget_id: Uuid,
    ) -> Result<Budget, AppError> {
        let items = self.repo.list_items(&mut *conn, tenant_id, budget_id).await?;
        let totals = BudgetTotals::from_items(&items);
        self.repo.save_totals(&mut *conn, tenant_id, budget_id, totals).await
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        patient_id: Uuid,
        entity_id: Uuid,
        budget_date: Option<NaiveDate>,
        notes: Option<&str>,
    ) -> Result<Budget, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        // Paciente e entidade têm de existir
        self.catalog.get_patient(&mut *tx, tenant_id, patient_id).await?;
        self.catalog.get_entity(&mut *tx, tenant_id, entity_id).await?;

        let budget_date = budget_date.unwrap_or_else(|| Utc::now().date_naive());
        let budget = self
            .repo
            .create_budget(&mut *tx, tenant_id, patient_id, entity_id, budget_date, notes)
            .await?;

        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "CREATE_BUDGET", "budget")
                .object(budget.id)
                .details(json!({ "patientId": patient_id, "entityId": entity_id })),
        );

        Ok(budget)
    }

    pub async fn add_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        budget_id: Uuid,
        procedure_id: Uuid,
        tooth_number: Option<i16>,
        faces: Option<Vec<String>>,
    ) -> Result<BudgetItem, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let budget = self.locked_budget(&mut *tx, tenant_id, budget_id).await?;
        ensure_draft(&budget)?;

        let procedure = self.catalog.get_procedure(&mut *tx, tenant_id, procedure_id).await?;
        let position = procedure.resolve_position(tooth_number, faces)?;

        // Preço congelado no momento da inserção
        let price = self
            .pricing
            .lookup(&mut *tx, tenant_id, procedure_id, budget.entity_id)
            .await?;

        let item = self
            .repo
            .insert_item(
                &mut *tx,
                tenant_id,
                budget_id,
                &price,
                position.tooth_number,
                position.faces.as_deref(),
            )
            .await?;

        self.recompute_totals(&mut *tx, tenant_id, budget_id).await?;
        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "ADD_BUDGET_ITEM", "budget")
                .object(budget_id)
                .details(json!({ "itemId": item.id, "procedureId": procedure_id })),
        );

        Ok(item)
    }

    pub async fn remove_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        budget_id: Uuid,
        item_id: Uuid,
    ) -> Result<Budget, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let budget = self.locked_budget(&mut *tx, tenant_id, budget_id).await?;
        ensure_draft(&budget)?;

        if !self.repo.delete_item(&mut *tx, tenant_id, budget_id, item_id).await? {
            return Err(AppError::ResourceNotFound("Item do orçamento".into()));
        }

        let budget = self.recompute_totals(&mut *tx, tenant_id, budget_id).await?;
        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "REMOVE_BUDGET_ITEM", "budget")
                .object(budget_id)
                .details(json!({ "itemId": item_id })),
        );

        Ok(budget)
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        budget_id: Uuid,
        changes: BudgetChanges<'_>,
    ) -> Result<Budget, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let budget = self.locked_budget(&mut *tx, tenant_id, budget_id).await?;
        ensure_draft(&budget)?;

        let item_count = self.repo.count_items(&mut *tx, tenant_id, budget_id).await?;
        let entity_changed = check_entity_change(&budget, changes.entity_id, item_count)?;

        let entity_id = match changes.entity_id {
            Some(entity_id) if entity_changed => {
                self.catalog.get_entity(&mut *tx, tenant_id, entity_id).await?.id
            }
            _ => budget.entity_id,
        };

        let updated = self
            .repo
            .update_header(
                &mut *tx,
                tenant_id,
                budget_id,
                entity_id,
                changes.budget_date.unwrap_or(budget.budget_date),
                changes.notes.or(budget.notes.as_deref()),
            )
            .await?;

        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "UPDATE_BUDGET", "budget")
                .object(budget_id)
                .details(json!({ "entityChanged": entity_changed })),
        );

        Ok(updated)
    }

    pub async fn set_state<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        budget_id: Uuid,
        new_status: BudgetStatus,
    ) -> Result<Budget, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let budget = self.locked_budget(&mut *tx, tenant_id, budget_id).await?;
        let item_count = self.repo.count_items(&mut *tx, tenant_id, budget_id).await?;
        check_transition(new_status, item_count)?;

        let updated = self.repo.set_status(&mut *tx, tenant_id, budget_id, new_status).await?;
        tx.commit().await?;

        tracing::info!(
            "Orçamento {} passou de {:?} para {:?}",
            budget_id,
            budget.status,
            updated.status
        );

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "SET_BUDGET_STATE", "budget")
                .object(budget_id)
                .details(json!({ "from": budget.status, "to": updated.status })),
        );

        Ok(updated)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: &BudgetFilter,
    ) -> Result<Vec<Budget>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_budgets(executor, tenant_id, filter).await
    }

    pub async fn details<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        budget_id: Uuid,
    ) -> Result<BudgetDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let header = self
            .repo
            .find_budget(&mut *conn, tenant_id, budget_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Orçamento".into()))?;
        let (patient_name, entity_name) = self.repo.header_names(&mut *conn, tenant_id, budget_id).await?;
        let items = self.repo.list_items(&mut *conn, tenant_id, budget_id).await?;

        Ok(BudgetDetail {
            header,
            patient_name,
            entity_name,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn budget(status: BudgetStatus) -> Budget {
        Budget {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            entity_id: Uuid::new_v4(),
            budget_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            status,
            entity_total: Decimal::ZERO,
            patient_total: Decimal::ZERO,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(entity: &str, patient: &str) -> BudgetItem {
        let entity = Decimal::from_str(entity).unwrap();
        let patient = Decimal::from_str(patient).unwrap();
        BudgetItem {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            budget_id: Uuid::new_v4(),
            procedure_id: Uuid::new_v4(),
            quantity: 1,
            entity_price: entity,
            patient_price: patient,
            entity_subtotal: entity,
            patient_subtotal: patient,
            tooth_number: None,
            faces: None,
        }
    }

    #[test]
    fn totals_are_the_sum_of_item_subtotals() {
        let mut items = vec![item("35.00", "15.00"), item("20.50", "4.50")];
        let totals = BudgetTotals::from_items(&items);
        assert_eq!(totals.entity_total, Decimal::from_str("55.50").unwrap());
        assert_eq!(totals.patient_total, Decimal::from_str("19.50").unwrap());

        items.remove(0);
        let totals = BudgetTotals::from_items(&items);
        assert_eq!(totals.entity_total, Decimal::from_str("20.50").unwrap());

        let empty = BudgetTotals::from_items(&[]);
        assert_eq!(empty.patient_total, Decimal::ZERO);
    }

    #[test]
    fn approving_requires_items() {
        assert!(matches!(
            check_transition(BudgetStatus::Approved, 0),
            Err(AppError::EmptyBudgetApproval)
        ));
        assert!(check_transition(BudgetStatus::Approved, 1).is_ok());
        assert!(check_transition(BudgetStatus::Rejected, 0).is_ok());
    }

    #[test]
    fn only_drafts_are_editable() {
        assert!(ensure_draft(&budget(BudgetStatus::Draft)).is_ok());
        assert!(matches!(ensure_draft(&budget(BudgetStatus::Approved)), Err(AppError::BudgetNotDraft)));
    }

    #[test]
    fn entity_is_locked_once_items_exist() {
        let b = budget(BudgetStatus::Draft);
        assert!(matches!(
            check_entity_change(&b, Some(Uuid::new_v4()), 1),
            Err(AppError::BudgetHasItems)
        ));
        assert!(check_entity_change(&b, Some(Uuid::new_v4()), 0).unwrap());
        // Mesma entidade não conta como alteração
        assert!(!check_entity_change(&b, Some(b.entity_id), 3).unwrap());
        assert!(!check_entity_change(&b, None, 3).unwrap());
    }
}
