use crate::domains::budget::repository::BudgetRepository;
use crate::domains::core::repository::FindById;
use crate::domains::budget::types::{
    BudgetEntry, BudgetTable, BudgetTableRow, NewBudgetEntry,
};
use crate::domains::field::repository::BudgetFieldRepository;
use crate::domains::project::repository::ProjectRepository;
use crate::errors::{DomainError, DomainResult, ServiceResult, ValidationError};
use crate::validation::{common, Validate};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Trait defining budget ledger service operations
#[async_trait]
pub trait BudgetService: Send + Sync {
    /// Upsert one budget cell; retry-safe by construction.
    async fn set_budget(
        &self,
        project_id: Uuid,
        entry: NewBudgetEntry,
    ) -> ServiceResult<BudgetEntry>;

    /// Atomic save of the whole year table: existing entries are replaced
    /// by the given set, all-or-nothing.
    async fn bulk_replace(
        &self,
        project_id: Uuid,
        entries: Vec<NewBudgetEntry>,
    ) -> ServiceResult<Vec<BudgetEntry>>;

    async fn get_budget_entries(&self, project_id: Uuid) -> ServiceResult<Vec<BudgetEntry>>;

    /// Field-by-year budget table with row and column totals.
    async fn get_budget_table(&self, project_id: Uuid) -> ServiceResult<BudgetTable>;

    async fn total_for_field(&self, project_id: Uuid, field_id: Uuid) -> ServiceResult<f64>;

    async fn total_for_year(&self, project_id: Uuid, year_index: u32) -> ServiceResult<f64>;
}

/// Implementation of the budget ledger service
#[derive(Clone)]
pub struct BudgetServiceImpl {
    pool: SqlitePool,
    repo: Arc<dyn BudgetRepository>,
    project_repo: Arc<dyn ProjectRepository>,
    field_repo: Arc<dyn BudgetFieldRepository>,
}

impl BudgetServiceImpl {
    pub fn new(
        pool: SqlitePool,
        repo: Arc<dyn BudgetRepository>,
        project_repo: Arc<dyn ProjectRepository>,
        field_repo: Arc<dyn BudgetFieldRepository>,
    ) -> Self {
        Self {
            pool,
            repo,
            project_repo,
            field_repo,
        }
    }

    async fn validate_entry(
        &self,
        project_id: Uuid,
        duration_years: u32,
        entry: &NewBudgetEntry,
    ) -> DomainResult<()> {
        entry.validate()?;

        if entry.year_index > duration_years {
            return Err(DomainError::Validation(ValidationError::range(
                "year_index",
                1,
                duration_years,
            )));
        }

        common::validate_field_mapped(&self.pool, &project_id, &entry.field_id).await?;
        Ok(())
    }
}

#[async_trait]
impl BudgetService for BudgetServiceImpl {
    async fn set_budget(
        &self,
        project_id: Uuid,
        entry: NewBudgetEntry,
    ) -> ServiceResult<BudgetEntry> {
        let project = self.project_repo.find_by_id(project_id).await?;
        self.validate_entry(project_id, project.duration_years, &entry)
            .await?;

        let saved = self.repo.set_budget(project_id, &entry).await?;
        log::debug!(
            "set budget {} for project {} field {} year {}",
            saved.amount,
            project_id,
            entry.field_id,
            entry.year_index
        );
        Ok(saved)
    }

    async fn bulk_replace(
        &self,
        project_id: Uuid,
        entries: Vec<NewBudgetEntry>,
    ) -> ServiceResult<Vec<BudgetEntry>> {
        let project = self.project_repo.find_by_id(project_id).await?;

        // Validate the whole set before touching the ledger so a bad row
        // cannot leave a half-replaced table.
        let mut seen: HashSet<(Uuid, u32)> = HashSet::new();
        for entry in &entries {
            self.validate_entry(project_id, project.duration_years, entry)
                .await?;
            if !seen.insert((entry.field_id, entry.year_index)) {
                return Err(DomainError::Validation(ValidationError::unique(
                    "(field_id, year_index)",
                ))
                .into());
            }
        }

        let saved = self.repo.bulk_replace(project_id, &entries).await?;
        log::info!(
            "replaced budget table for project {} with {} entries",
            project_id,
            saved.len()
        );
        Ok(saved)
    }

    async fn get_budget_entries(&self, project_id: Uuid) -> ServiceResult<Vec<BudgetEntry>> {
        let _ = self.project_repo.find_by_id(project_id).await?;
        Ok(self.repo.find_by_project(project_id).await?)
    }

    async fn get_budget_table(&self, project_id: Uuid) -> ServiceResult<BudgetTable> {
        let project = self.project_repo.find_by_id(project_id).await?;
        let duration = project.duration_years as usize;

        let entries = self.repo.find_by_project(project_id).await?;
        let mut by_field: HashMap<Uuid, Vec<Option<f64>>> = HashMap::new();
        for entry in &entries {
            let yearly = by_field
                .entry(entry.field_id)
                .or_insert_with(|| vec![None; duration]);
            let idx = entry.year_index as usize;
            if idx >= 1 && idx <= duration {
                yearly[idx - 1] = Some(entry.amount);
            }
        }

        let mappings = self.field_repo.find_mappings_for_project(project_id).await?;
        let mut rows = Vec::with_capacity(mappings.len());
        let mut year_totals = vec![0.0; duration];
        let mut grand_total = 0.0;

        for (mapping, field) in mappings {
            let yearly_amounts = by_field
                .remove(&mapping.field_id)
                .unwrap_or_else(|| vec![None; duration]);
            let field_total: f64 = yearly_amounts.iter().flatten().sum();
            for (i, amount) in yearly_amounts.iter().enumerate() {
                if let Some(a) = amount {
                    year_totals[i] += a;
                }
            }
            grand_total += field_total;

            rows.push(BudgetTableRow {
                field_id: field.id,
                field_name: field.name,
                yearly_amounts,
                field_total,
            });
        }

        Ok(BudgetTable {
            project_id,
            duration_years: project.duration_years,
            rows,
            year_totals,
            grand_total,
        })
    }

    async fn total_for_field(&self, project_id: Uuid, field_id: Uuid) -> ServiceResult<f64> {
        Ok(self.repo.total_for_field(project_id, field_id).await?)
    }

    async fn total_for_year(&self, project_id: Uuid, year_index: u32) -> ServiceResult<f64> {
        Ok(self.repo.total_for_year(project_id, year_index).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::field::repository::SqliteBudgetFieldRepository;
    use crate::domains::budget::repository::SqliteBudgetRepository;
    use crate::domains::project::repository::SqliteProjectRepository;
    use crate::domains::project::types::NewProject;
    use crate::errors::ServiceError;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db_migration::run_migrations(&pool).await.unwrap();
        pool
    }

    struct Fixture {
        svc: BudgetServiceImpl,
        project_id: Uuid,
        field_id: Uuid,
        other_field_id: Uuid,
    }

    async fn fixture(pool: &SqlitePool) -> Fixture {
        let project_repo = Arc::new(SqliteProjectRepository::new(pool.clone()));
        let field_repo = Arc::new(SqliteBudgetFieldRepository::new(pool.clone()));

        let project = project_repo
            .create(&NewProject {
                name: "Soil Health Monitoring".to_string(),
                start_date: "2023-04-01".to_string(),
                duration_years: 3,
                total_value: 2_000_000.0,
                funding_agency: None,
            })
            .await
            .unwrap();

        field_repo
            .seed_default_fields(&["Equipment", "Travel"])
            .await
            .unwrap();
        let fields = field_repo.find_default_fields().await.unwrap();
        let field_id = fields[0].id;
        let other_field_id = fields[1].id;
        field_repo.map_field(project.id, field_id, false).await.unwrap();
        field_repo
            .map_field(project.id, other_field_id, false)
            .await
            .unwrap();

        let svc = BudgetServiceImpl::new(
            pool.clone(),
            Arc::new(SqliteBudgetRepository::new(pool.clone())),
            project_repo,
            field_repo,
        );

        Fixture {
            svc,
            project_id: project.id,
            field_id,
            other_field_id,
        }
    }

    fn entry(field_id: Uuid, year_index: u32, amount: f64) -> NewBudgetEntry {
        NewBudgetEntry {
            field_id,
            year_index,
            amount,
        }
    }

    #[tokio::test]
    async fn set_budget_replaces_not_accumulates() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        f.svc
            .set_budget(f.project_id, entry(f.field_id, 1, 100_000.0))
            .await
            .unwrap();
        f.svc
            .set_budget(f.project_id, entry(f.field_id, 1, 150_000.0))
            .await
            .unwrap();

        let total = f.svc.total_for_field(f.project_id, f.field_id).await.unwrap();
        assert_eq!(total, 150_000.0);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM budget_entries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn set_budget_same_amount_is_idempotent() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        f.svc
            .set_budget(f.project_id, entry(f.field_id, 2, 80_000.0))
            .await
            .unwrap();
        f.svc
            .set_budget(f.project_id, entry(f.field_id, 2, 80_000.0))
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM budget_entries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn rejects_year_outside_duration_and_negative_amount() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        assert!(f
            .svc
            .set_budget(f.project_id, entry(f.field_id, 4, 1000.0))
            .await
            .is_err());
        assert!(f
            .svc
            .set_budget(f.project_id, entry(f.field_id, 0, 1000.0))
            .await
            .is_err());
        assert!(f
            .svc
            .set_budget(f.project_id, entry(f.field_id, 1, -5.0))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn rejects_unmapped_field() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        let result = f
            .svc
            .set_budget(f.project_id, entry(Uuid::new_v4(), 1, 1000.0))
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Domain(DomainError::Validation(
                ValidationError::Relationship(_)
            )))
        ));
    }

    #[tokio::test]
    async fn bulk_replace_is_atomic() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        f.svc
            .bulk_replace(
                f.project_id,
                vec![
                    entry(f.field_id, 1, 100_000.0),
                    entry(f.field_id, 2, 120_000.0),
                    entry(f.other_field_id, 1, 30_000.0),
                ],
            )
            .await
            .unwrap();

        // Second replace contains an out-of-range year: nothing changes
        let result = f
            .svc
            .bulk_replace(
                f.project_id,
                vec![
                    entry(f.field_id, 1, 999_999.0),
                    entry(f.field_id, 9, 1.0),
                ],
            )
            .await;
        assert!(result.is_err());

        let total = f.svc.total_for_field(f.project_id, f.field_id).await.unwrap();
        assert_eq!(total, 220_000.0);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM budget_entries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 3);

        // A valid replace swaps the whole table
        f.svc
            .bulk_replace(f.project_id, vec![entry(f.field_id, 3, 50_000.0)])
            .await
            .unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM budget_entries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn bulk_replace_rejects_duplicate_cells() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        let result = f
            .svc
            .bulk_replace(
                f.project_id,
                vec![entry(f.field_id, 1, 10.0), entry(f.field_id, 1, 20.0)],
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn budget_table_totals() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        f.svc
            .bulk_replace(
                f.project_id,
                vec![
                    entry(f.field_id, 1, 100_000.0),
                    entry(f.field_id, 3, 40_000.0),
                    entry(f.other_field_id, 1, 60_000.0),
                ],
            )
            .await
            .unwrap();

        let table = f.svc.get_budget_table(f.project_id).await.unwrap();
        assert_eq!(table.duration_years, 3);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.year_totals, vec![160_000.0, 0.0, 40_000.0]);
        assert_eq!(table.grand_total, 200_000.0);

        let equipment = table
            .rows
            .iter()
            .find(|r| r.field_id == f.field_id)
            .unwrap();
        assert_eq!(equipment.yearly_amounts, vec![Some(100_000.0), None, Some(40_000.0)]);
        assert_eq!(equipment.field_total, 140_000.0);

        assert_eq!(
            f.svc.total_for_year(f.project_id, 1).await.unwrap(),
            160_000.0
        );
    }
}
