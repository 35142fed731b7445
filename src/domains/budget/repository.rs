use crate::domains::budget::types::{BudgetEntry, BudgetEntryRow, NewBudgetEntry};
use crate::errors::{DbError, DomainResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, query_scalar, Pool, Sqlite};
use uuid::Uuid;

/// Trait defining budget ledger repository operations
#[async_trait]
pub trait BudgetRepository: Send + Sync {
    /// Upsert by (project, field, year); the amount replaces, never adds.
    async fn set_budget(
        &self,
        project_id: Uuid,
        entry: &NewBudgetEntry,
    ) -> DomainResult<BudgetEntry>;

    /// Delete every entry for the project and insert the given set, in one
    /// transaction.
    async fn bulk_replace(
        &self,
        project_id: Uuid,
        entries: &[NewBudgetEntry],
    ) -> DomainResult<Vec<BudgetEntry>>;

    async fn find_by_project(&self, project_id: Uuid) -> DomainResult<Vec<BudgetEntry>>;

    async fn total_for_field(&self, project_id: Uuid, field_id: Uuid) -> DomainResult<f64>;

    async fn total_for_year(&self, project_id: Uuid, year_index: u32) -> DomainResult<f64>;
}

/// SQLite implementation for BudgetRepository
#[derive(Debug, Clone)]
pub struct SqliteBudgetRepository {
    pool: Pool<Sqlite>,
}

impl SqliteBudgetRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row_to_entity(row: BudgetEntryRow) -> DomainResult<BudgetEntry> {
        row.into_entity()
    }
}

#[async_trait]
impl BudgetRepository for SqliteBudgetRepository {
    async fn set_budget(
        &self,
        project_id: Uuid,
        entry: &NewBudgetEntry,
    ) -> DomainResult<BudgetEntry> {
        let now = Utc::now().to_rfc3339();

        query(
            r#"
            INSERT INTO budget_entries (
                id, project_id, field_id, year_index, amount, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_id, field_id, year_index)
            DO UPDATE SET amount = excluded.amount, updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(project_id.to_string())
        .bind(entry.field_id.to_string())
        .bind(entry.year_index as i64)
        .bind(entry.amount)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        let row = query_as::<_, BudgetEntryRow>(
            "SELECT * FROM budget_entries
             WHERE project_id = ? AND field_id = ? AND year_index = ?",
        )
        .bind(project_id.to_string())
        .bind(entry.field_id.to_string())
        .bind(entry.year_index as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        Self::map_row_to_entity(row)
    }

    async fn bulk_replace(
        &self,
        project_id: Uuid,
        entries: &[NewBudgetEntry],
    ) -> DomainResult<Vec<BudgetEntry>> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let project_id_str = project_id.to_string();
        let now = Utc::now().to_rfc3339();

        let result: DomainResult<()> = async {
            query("DELETE FROM budget_entries WHERE project_id = ?")
                .bind(&project_id_str)
                .execute(&mut *tx)
                .await
                .map_err(DbError::from)?;

            for entry in entries {
                query(
                    "INSERT INTO budget_entries (
                        id, project_id, field_id, year_index, amount, created_at, updated_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&project_id_str)
                .bind(entry.field_id.to_string())
                .bind(entry.year_index as i64)
                .bind(entry.amount)
                .bind(&now)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(DbError::from)?;
            }

            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
                self.find_by_project(project_id).await
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn find_by_project(&self, project_id: Uuid) -> DomainResult<Vec<BudgetEntry>> {
        let rows = query_as::<_, BudgetEntryRow>(
            "SELECT * FROM budget_entries WHERE project_id = ?
             ORDER BY field_id ASC, year_index ASC",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(Self::map_row_to_entity).collect()
    }

    async fn total_for_field(&self, project_id: Uuid, field_id: Uuid) -> DomainResult<f64> {
        let total: f64 = query_scalar(
            "SELECT COALESCE(SUM(amount), 0.0) FROM budget_entries
             WHERE project_id = ? AND field_id = ?",
        )
        .bind(project_id.to_string())
        .bind(field_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(total)
    }

    async fn total_for_year(&self, project_id: Uuid, year_index: u32) -> DomainResult<f64> {
        let total: f64 = query_scalar(
            "SELECT COALESCE(SUM(amount), 0.0) FROM budget_entries
             WHERE project_id = ? AND year_index = ?",
        )
        .bind(project_id.to_string())
        .bind(year_index as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(total)
    }
}
