use crate::domains::field::repository::BudgetFieldRepository;
use crate::domains::grant::repository::GrantRepository;
use crate::domains::grant::types::{GrantEntryResponse, NewGrantReceipt};
use crate::errors::ServiceResult;
use crate::validation::{common, Validate};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Trait defining grant ledger service operations
#[async_trait]
pub trait GrantService: Send + Sync {
    /// Record one receipt fanned out over fields. Zero-amount rows are
    /// skipped; an all-zero receipt is rejected. Not retry-safe: a repeat
    /// call appends a second receipt.
    async fn record_receipt(
        &self,
        project_id: Uuid,
        receipt: NewGrantReceipt,
    ) -> ServiceResult<Vec<GrantEntryResponse>>;

    /// Full receipt history for a project, oldest first.
    async fn list_receipts(&self, project_id: Uuid) -> ServiceResult<Vec<GrantEntryResponse>>;

    async fn total_received_for_field(
        &self,
        project_id: Uuid,
        field_id: Uuid,
    ) -> ServiceResult<f64>;

    /// Remove a single allocation row entered in error.
    async fn delete_receipt_entry(&self, id: Uuid) -> ServiceResult<()>;
}

/// Implementation of the grant ledger service
#[derive(Clone)]
pub struct GrantServiceImpl {
    pool: SqlitePool,
    repo: Arc<dyn GrantRepository>,
    field_repo: Arc<dyn BudgetFieldRepository>,
}

impl GrantServiceImpl {
    pub fn new(
        pool: SqlitePool,
        repo: Arc<dyn GrantRepository>,
        field_repo: Arc<dyn BudgetFieldRepository>,
    ) -> Self {
        Self {
            pool,
            repo,
            field_repo,
        }
    }
}

#[async_trait]
impl GrantService for GrantServiceImpl {
    async fn record_receipt(
        &self,
        project_id: Uuid,
        receipt: NewGrantReceipt,
    ) -> ServiceResult<Vec<GrantEntryResponse>> {
        receipt.validate()?;
        common::validate_project_exists(&self.pool, &project_id, "project_id").await?;

        let received_date = receipt.parsed_received_date()?;
        let allocations = receipt.non_zero_allocations();

        for allocation in &allocations {
            common::validate_field_mapped(&self.pool, &project_id, &allocation.field_id).await?;
        }

        let entries = self
            .repo
            .insert_receipt(
                project_id,
                received_date,
                &allocations,
                receipt.remarks.as_deref(),
            )
            .await?;

        log::info!(
            "recorded grant receipt of {} rows for project {} on {}",
            entries.len(),
            project_id,
            received_date
        );

        Ok(entries.into_iter().map(GrantEntryResponse::from).collect())
    }

    async fn list_receipts(&self, project_id: Uuid) -> ServiceResult<Vec<GrantEntryResponse>> {
        common::validate_project_exists(&self.pool, &project_id, "project_id").await?;

        let field_names: HashMap<Uuid, String> = self
            .field_repo
            .find_mappings_for_project(project_id)
            .await?
            .into_iter()
            .map(|(mapping, field)| (mapping.field_id, field.name))
            .collect();

        let entries = self.repo.find_by_project(project_id).await?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let field_id = entry.field_id;
                let response = GrantEntryResponse::from(entry);
                match field_names.get(&field_id) {
                    Some(name) => response.with_field_name(name.clone()),
                    None => response,
                }
            })
            .collect())
    }

    async fn total_received_for_field(
        &self,
        project_id: Uuid,
        field_id: Uuid,
    ) -> ServiceResult<f64> {
        Ok(self.repo.total_for_field(project_id, field_id).await?)
    }

    async fn delete_receipt_entry(&self, id: Uuid) -> ServiceResult<()> {
        let entry = self.repo.find_by_id(id).await?;
        self.repo.delete_entry(id).await?;
        log::info!(
            "deleted grant entry {} ({} for field {})",
            id,
            entry.amount,
            entry.field_id
        );
        Ok(())
    }
}
