use crate::domains::expenditure::types::{
    ExpenditureEntry, ExpenditureEntryRow, NewExpenditureEntry,
};
use crate::errors::{DbError, DomainError, DomainResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, query_scalar, Pool, Sqlite, Transaction};
use uuid::Uuid;

/// Trait defining expenditure ledger repository operations
#[async_trait]
pub trait ExpenditureRepository: Send + Sync {
    async fn insert(
        &self,
        project_id: Uuid,
        entry: &NewExpenditureEntry,
    ) -> DomainResult<ExpenditureEntry>;

    /// Insert several entries all-or-nothing.
    async fn insert_bulk(
        &self,
        project_id: Uuid,
        entries: &[NewExpenditureEntry],
    ) -> DomainResult<Vec<ExpenditureEntry>>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<ExpenditureEntry>;

    /// All entries for a project in canonical period order.
    async fn find_by_project(&self, project_id: Uuid) -> DomainResult<Vec<ExpenditureEntry>>;

    async fn total_for_field(&self, project_id: Uuid, field_id: Uuid) -> DomainResult<f64>;

    async fn delete_entry(&self, id: Uuid) -> DomainResult<()>;
}

/// SQLite implementation for ExpenditureRepository
#[derive(Debug, Clone)]
pub struct SqliteExpenditureRepository {
    pool: Pool<Sqlite>,
}

impl SqliteExpenditureRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row_to_entity(row: ExpenditureEntryRow) -> DomainResult<ExpenditureEntry> {
        row.into_entity()
    }

    async fn insert_with_tx<'t>(
        &self,
        project_id: Uuid,
        entry: &NewExpenditureEntry,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let date = entry.parsed_date()?;

        query(
            "INSERT INTO expenditure_entries (
                id, project_id, field_id, year_index, period_type, period_number,
                amount, expenditure_date, remarks, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(project_id.to_string())
        .bind(entry.field_id.to_string())
        .bind(entry.year_index as i64)
        .bind(entry.period_type.as_str())
        .bind(entry.period_number as i64)
        .bind(entry.amount)
        .bind(date.format("%Y-%m-%d").to_string())
        .bind(&entry.remarks)
        .bind(&now)
        .bind(&now)
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        Ok(id)
    }
}

#[async_trait]
impl ExpenditureRepository for SqliteExpenditureRepository {
    async fn insert(
        &self,
        project_id: Uuid,
        entry: &NewExpenditureEntry,
    ) -> DomainResult<ExpenditureEntry> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        match self.insert_with_tx(project_id, entry, &mut tx).await {
            Ok(id) => {
                tx.commit().await.map_err(DbError::from)?;
                self.find_by_id(id).await
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn insert_bulk(
        &self,
        project_id: Uuid,
        entries: &[NewExpenditureEntry],
    ) -> DomainResult<Vec<ExpenditureEntry>> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let mut ids = Vec::with_capacity(entries.len());

        let result: DomainResult<()> = async {
            for entry in entries {
                ids.push(self.insert_with_tx(project_id, entry, &mut tx).await?);
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

        let mut saved = Vec::with_capacity(ids.len());
        for id in ids {
            saved.push(self.find_by_id(id).await?);
        }
        Ok(saved)
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<ExpenditureEntry> {
        let row = query_as::<_, ExpenditureEntryRow>(
            "SELECT * FROM expenditure_entries WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?
        .ok_or_else(|| DomainError::EntityNotFound("Expenditure Entry".to_string(), id))?;

        Self::map_row_to_entity(row)
    }

    async fn find_by_project(&self, project_id: Uuid) -> DomainResult<Vec<ExpenditureEntry>> {
        let rows = query_as::<_, ExpenditureEntryRow>(
            "SELECT * FROM expenditure_entries WHERE project_id = ?
             ORDER BY year_index ASC, period_type ASC, period_number ASC, expenditure_date ASC",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(Self::map_row_to_entity).collect()
    }

    async fn total_for_field(&self, project_id: Uuid, field_id: Uuid) -> DomainResult<f64> {
        let total: f64 = query_scalar(
            "SELECT COALESCE(SUM(amount), 0.0) FROM expenditure_entries
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
        let result = query("DELETE FROM expenditure_entries WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("Expenditure Entry".to_string(), id))
        } else {
            Ok(())
        }
    }
}
