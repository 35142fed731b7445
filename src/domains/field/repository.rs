use crate::domains::core::repository::FindById;
use crate::domains::field::types::{
    BudgetField, BudgetFieldRow, NewBudgetField, ProjectFieldMapping, ProjectFieldMappingRow,
};
use crate::errors::{DbError, DomainError, DomainResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, query_scalar, Pool, Sqlite, Transaction};
use uuid::Uuid;

/// Trait defining budget field and mapping repository operations
#[async_trait]
pub trait BudgetFieldRepository: FindById<BudgetField> + Send + Sync {
    async fn create_field(&self, new_field: &NewBudgetField, is_default: bool)
        -> DomainResult<BudgetField>;

    async fn create_field_with_tx<'t>(
        &self,
        new_field: &NewBudgetField,
        is_default: bool,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<BudgetField>;

    async fn find_all_fields(&self) -> DomainResult<Vec<BudgetField>>;

    async fn find_default_fields(&self) -> DomainResult<Vec<BudgetField>>;

    /// Mappings for a project, with the mapped field hydrated.
    async fn find_mappings_for_project(
        &self,
        project_id: Uuid,
    ) -> DomainResult<Vec<(ProjectFieldMapping, BudgetField)>>;

    async fn mapping_exists(&self, project_id: Uuid, field_id: Uuid) -> DomainResult<bool>;

    /// Idempotent: re-mapping an already-mapped field is a no-op success.
    async fn map_field(&self, project_id: Uuid, field_id: Uuid, is_custom: bool)
        -> DomainResult<()>;

    async fn map_field_with_tx<'t>(
        &self,
        project_id: Uuid,
        field_id: Uuid,
        is_custom: bool,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()>;

    async fn unmap_field(&self, project_id: Uuid, field_id: Uuid) -> DomainResult<()>;

    /// Apply a computed mapping diff atomically.
    async fn apply_mapping_diff(
        &self,
        project_id: Uuid,
        additions: &[(Uuid, bool)],
        removals: &[Uuid],
    ) -> DomainResult<()>;

    /// The project owning a custom field, if it is mapped anywhere.
    async fn custom_field_owner(&self, field_id: Uuid) -> DomainResult<Option<Uuid>>;

    /// Insert any of the given default field names that are missing.
    async fn seed_default_fields(&self, names: &[&str]) -> DomainResult<()>;
}

/// SQLite implementation for BudgetFieldRepository
#[derive(Debug, Clone)]
pub struct SqliteBudgetFieldRepository {
    pool: Pool<Sqlite>,
}

impl SqliteBudgetFieldRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row_to_entity(row: BudgetFieldRow) -> DomainResult<BudgetField> {
        row.into_entity()
            .map_err(|e| DomainError::Internal(format!("Failed to map field row to entity: {}", e)))
    }
}

#[async_trait]
impl FindById<BudgetField> for SqliteBudgetFieldRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<BudgetField> {
        let row = query_as::<_, BudgetFieldRow>("SELECT * FROM budget_fields WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("Budget Field".to_string(), id))?;

        Self::map_row_to_entity(row)
    }
}

#[async_trait]
impl BudgetFieldRepository for SqliteBudgetFieldRepository {
    async fn create_field(
        &self,
        new_field: &NewBudgetField,
        is_default: bool,
    ) -> DomainResult<BudgetField> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        match self.create_field_with_tx(new_field, is_default, &mut tx).await {
            Ok(field) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(field)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn create_field_with_tx<'t>(
        &self,
        new_field: &NewBudgetField,
        is_default: bool,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<BudgetField> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        query(
            "INSERT INTO budget_fields (id, name, is_default, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(new_field.name.trim())
        .bind(is_default as i64)
        .bind(&now)
        .bind(&now)
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        let row = query_as::<_, BudgetFieldRow>("SELECT * FROM budget_fields WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&mut **tx)
            .await
            .map_err(DbError::from)?;

        Self::map_row_to_entity(row)
    }

    async fn find_all_fields(&self) -> DomainResult<Vec<BudgetField>> {
        let rows = query_as::<_, BudgetFieldRow>(
            "SELECT * FROM budget_fields ORDER BY is_default DESC, name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(Self::map_row_to_entity).collect()
    }

    async fn find_default_fields(&self) -> DomainResult<Vec<BudgetField>> {
        let rows = query_as::<_, BudgetFieldRow>(
            "SELECT * FROM budget_fields WHERE is_default = 1 ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(Self::map_row_to_entity).collect()
    }

    async fn find_mappings_for_project(
        &self,
        project_id: Uuid,
    ) -> DomainResult<Vec<(ProjectFieldMapping, BudgetField)>> {
        let mapping_rows = query_as::<_, ProjectFieldMappingRow>(
            "SELECT * FROM project_field_mappings WHERE project_id = ? ORDER BY created_at ASC",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        let mut result = Vec::with_capacity(mapping_rows.len());
        for mapping_row in mapping_rows {
            let mapping = mapping_row.into_entity()?;
            let field = self.find_by_id(mapping.field_id).await?;
            result.push((mapping, field));
        }

        Ok(result)
    }

    async fn mapping_exists(&self, project_id: Uuid, field_id: Uuid) -> DomainResult<bool> {
        let count: i64 = query_scalar(
            "SELECT COUNT(*) FROM project_field_mappings WHERE project_id = ? AND field_id = ?",
        )
        .bind(project_id.to_string())
        .bind(field_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(count > 0)
    }

    async fn map_field(
        &self,
        project_id: Uuid,
        field_id: Uuid,
        is_custom: bool,
    ) -> DomainResult<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        match self.map_field_with_tx(project_id, field_id, is_custom, &mut tx).await {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn map_field_with_tx<'t>(
        &self,
        project_id: Uuid,
        field_id: Uuid,
        is_custom: bool,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();

        // ON CONFLICT DO NOTHING makes re-mapping a no-op success
        query(
            "INSERT INTO project_field_mappings (id, project_id, field_id, is_custom, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(project_id, field_id) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(project_id.to_string())
        .bind(field_id.to_string())
        .bind(is_custom as i64)
        .bind(&now)
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        Ok(())
    }

    async fn unmap_field(&self, project_id: Uuid, field_id: Uuid) -> DomainResult<()> {
        let result = query(
            "DELETE FROM project_field_mappings WHERE project_id = ? AND field_id = ?",
        )
        .bind(project_id.to_string())
        .bind(field_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("Field Mapping".to_string(), field_id))
        } else {
            Ok(())
        }
    }

    async fn apply_mapping_diff(
        &self,
        project_id: Uuid,
        additions: &[(Uuid, bool)],
        removals: &[Uuid],
    ) -> DomainResult<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let project_id_str = project_id.to_string();

        for field_id in removals {
            query("DELETE FROM project_field_mappings WHERE project_id = ? AND field_id = ?")
                .bind(&project_id_str)
                .bind(field_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(DbError::from)?;
        }

        for (field_id, is_custom) in additions {
            self.map_field_with_tx(project_id, *field_id, *is_custom, &mut tx)
                .await?;
        }

        tx.commit().await.map_err(DbError::from)?;
        Ok(())
    }

    async fn custom_field_owner(&self, field_id: Uuid) -> DomainResult<Option<Uuid>> {
        let owner: Option<String> = query_scalar(
            "SELECT project_id FROM project_field_mappings
             WHERE field_id = ? AND is_custom = 1 LIMIT 1",
        )
        .bind(field_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        match owner {
            Some(id_str) => {
                let id = Uuid::parse_str(&id_str).map_err(|_| {
                    DomainError::Internal(format!("Invalid UUID in mapping: {}", id_str))
                })?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    async fn seed_default_fields(&self, names: &[&str]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let now = Utc::now().to_rfc3339();

        for name in names {
            let count: i64 = query_scalar(
                "SELECT COUNT(*) FROM budget_fields WHERE name = ? AND is_default = 1",
            )
            .bind(name)
            .fetch_one(&mut *tx)
            .await
            .map_err(DbError::from)?;

            if count == 0 {
                query(
                    "INSERT INTO budget_fields (id, name, is_default, created_at, updated_at)
                     VALUES (?, ?, 1, ?, ?)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(name)
                .bind(&now)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(DbError::from)?;
            }
        }

        tx.commit().await.map_err(DbError::from)?;
        Ok(())
    }
}
