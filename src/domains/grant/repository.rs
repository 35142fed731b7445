use crate::domains::grant::types::{GrantAllocation, GrantEntry, GrantEntryRow};
use crate::errors::{DbError, DomainError, DomainResult};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{query, query_as, query_scalar, Pool, Sqlite};
use uuid::Uuid;

/// Trait defining grant ledger repository operations
#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Insert one receipt's allocations in a single transaction.
    async fn insert_receipt(
        &self,
        project_id: Uuid,
        received_date: NaiveDate,
        allocations: &[&GrantAllocation],
        remarks: Option<&str>,
    ) -> DomainResult<Vec<GrantEntry>>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<GrantEntry>;

    /// Receipt history, oldest first.
    async fn find_by_project(&self, project_id: Uuid) -> DomainResult<Vec<GrantEntry>>;

    async fn total_for_field(&self, project_id: Uuid, field_id: Uuid) -> DomainResult<f64>;

    async fn delete_entry(&self, id: Uuid) -> DomainResult<()>;
}

/// SQLite implementation for GrantRepository
#[derive(Debug, Clone)]
pub struct SqliteGrantRepository {
    pool: Pool<Sqlite>,
}

impl SqliteGrantRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row_to_entity(row: GrantEntryRow) -> DomainResult<GrantEntry> {
        row.into_entity()
    }
}

#[async_trait]
impl GrantRepository for SqliteGrantRepository {
    async fn insert_receipt(
        &self,
        project_id: Uuid,
        received_date: NaiveDate,
        allocations: &[&GrantAllocation],
        remarks: Option<&str>,
    ) -> DomainResult<Vec<GrantEntry>> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let project_id_str = project_id.to_string();
        let date_str = received_date.format("%Y-%m-%d").to_string();
        let now = Utc::now().to_rfc3339();
        let mut ids = Vec::with_capacity(allocations.len());

        let result: DomainResult<()> = async {
            for allocation in allocations {
                let id = Uuid::new_v4();
                query(
                    "INSERT INTO grant_entries (
                        id, project_id, field_id, received_date, amount, remarks, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(id.to_string())
                .bind(&project_id_str)
                .bind(allocation.field_id.to_string())
                .bind(&date_str)
                .bind(allocation.amount)
                .bind(remarks)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(DbError::from)?;
                ids.push(id);
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
            }
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e);
            }
        }

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            entries.push(self.find_by_id(id).await?);
        }
        Ok(entries)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<GrantEntry> {
        let row = query_as::<_, GrantEntryRow>("SELECT * FROM grant_entries WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("Grant Entry".to_string(), id))?;

        Self::map_row_to_entity(row)
    }

    async fn find_by_project(&self, project_id: Uuid) -> DomainResult<Vec<GrantEntry>> {
        let rows = query_as::<_, GrantEntryRow>(
            "SELECT * FROM grant_entries WHERE project_id = ?
             ORDER BY received_date ASC, created_at ASC",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(Self::map_row_to_entity).collect()
    }

    async fn total_for_field(&self, project_id: Uuid, field_id: Uuid) -> DomainResult<f64> {
        let total: f64 = query_scalar(
            "SELECT COALESCE(SUM(amount), 0.0) FROM grant_entries
             WHERE project_id = ? AND field_id = ?",
        )
        .bind(project_id.to_string())
        .bind(field_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(total)
    }

    async fn delete_entry(&self, id: Uuid) -> DomainResult<()> {
        let result = query("DELETE FROM grant_entries WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("Grant Entry".to_string(), id))
        } else {
            Ok(())
        }
    }
}
