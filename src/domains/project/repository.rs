use crate::domains::core::repository::{FindById, HardDeletable};
use crate::domains::project::types::{NewProject, Project, ProjectRow, UpdateProject};
use crate::errors::{DbError, DomainError, DomainResult};
use crate::types::{PaginatedResult, PaginationParams};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{query, query_as, query_scalar, Pool, Sqlite, Transaction};
use uuid::Uuid;

/// Trait defining project repository operations
#[async_trait]
pub trait ProjectRepository: FindById<Project> + HardDeletable + Send + Sync {
    async fn create(&self, new_project: &NewProject) -> DomainResult<Project>;

    async fn update(&self, id: Uuid, update_data: &UpdateProject) -> DomainResult<Project>;

    async fn find_all(&self, params: PaginationParams) -> DomainResult<PaginatedResult<Project>>;

    /// Highest budget year index recorded for the project, if any.
    async fn max_budget_year_index(&self, project_id: Uuid) -> DomainResult<Option<i64>>;

    /// Number of expenditure entries dated after the given date.
    async fn count_expenditures_after(
        &self,
        project_id: Uuid,
        date: NaiveDate,
    ) -> DomainResult<i64>;
}

/// SQLite implementation for ProjectRepository
#[derive(Debug, Clone)]
pub struct SqliteProjectRepository {
    pool: Pool<Sqlite>,
}

impl SqliteProjectRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row_to_entity(row: ProjectRow) -> DomainResult<Project> {
        row.into_entity()
            .map_err(|e| DomainError::Internal(format!("Failed to map project row to entity: {}", e)))
    }

    async fn find_by_id_with_tx<'t>(
        &self,
        id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Project> {
        let row = query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("Project".to_string(), id))?;

        Self::map_row_to_entity(row)
    }
}

#[async_trait]
impl FindById<Project> for SqliteProjectRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Project> {
        let row = query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("Project".to_string(), id))?;

        Self::map_row_to_entity(row)
    }
}

#[async_trait]
impl HardDeletable for SqliteProjectRepository {
    fn entity_name(&self) -> &'static str {
        "projects"
    }

    /// Cascade delete: the project owns its mappings and ledger rows, so
    /// they go in the same transaction. Custom fields scoped to this
    /// project go with it; default fields are shared and stay.
    async fn hard_delete_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let id_str = id.to_string();

        for ledger in ["expenditure_entries", "grant_entries", "budget_entries"] {
            let sql = format!("DELETE FROM {} WHERE project_id = ?", ledger);
            query(&sql)
                .bind(&id_str)
                .execute(&mut **tx)
                .await
                .map_err(DbError::from)?;
        }

        // Collect this project's custom fields before dropping the mappings
        let custom_field_ids: Vec<String> = query_scalar(
            "SELECT field_id FROM project_field_mappings WHERE project_id = ? AND is_custom = 1",
        )
        .bind(&id_str)
        .fetch_all(&mut **tx)
        .await
        .map_err(DbError::from)?;

        query("DELETE FROM project_field_mappings WHERE project_id = ?")
            .bind(&id_str)
            .execute(&mut **tx)
            .await
            .map_err(DbError::from)?;

        for field_id in custom_field_ids {
            query("DELETE FROM budget_fields WHERE id = ? AND is_default = 0")
                .bind(field_id)
                .execute(&mut **tx)
                .await
                .map_err(DbError::from)?;
        }

        let result = query("DELETE FROM projects WHERE id = ?")
            .bind(&id_str)
            .execute(&mut **tx)
            .await
            .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("Project".to_string(), id))
        } else {
            Ok(())
        }
    }

    async fn hard_delete(&self, id: Uuid) -> DomainResult<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        match self.hard_delete_with_tx(id, &mut tx).await {
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
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn create(&self, new_project: &NewProject) -> DomainResult<Project> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let start_date = new_project.parsed_start_date()?;

        query(
            r#"
            INSERT INTO projects (
                id, name, start_date, duration_years, total_value,
                funding_agency, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&new_project.name)
        .bind(start_date.format("%Y-%m-%d").to_string())
        .bind(new_project.duration_years as i64)
        .bind(new_project.total_value)
        .bind(&new_project.funding_agency)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        let project = self.find_by_id_with_tx(id, &mut tx).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(project)
    }

    async fn update(&self, id: Uuid, update_data: &UpdateProject) -> DomainResult<Project> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let _ = self.find_by_id_with_tx(id, &mut tx).await?; // Ensure exists

        let now = Utc::now().to_rfc3339();

        let mut builder = sqlx::QueryBuilder::new("UPDATE projects SET ");
        let mut separated = builder.separated(", ");
        let mut fields_updated = false;

        if let Some(name) = &update_data.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
            fields_updated = true;
        }
        if let Some(duration) = update_data.duration_years {
            separated.push("duration_years = ");
            separated.push_bind_unseparated(duration as i64);
            fields_updated = true;
        }
        if let Some(total_value) = update_data.total_value {
            separated.push("total_value = ");
            separated.push_bind_unseparated(total_value);
            fields_updated = true;
        }
        if let Some(agency) = &update_data.funding_agency {
            separated.push("funding_agency = ");
            separated.push_bind_unseparated(agency);
            fields_updated = true;
        }

        if !fields_updated {
            let project = self.find_by_id_with_tx(id, &mut tx).await?;
            tx.commit().await.map_err(DbError::from)?;
            return Ok(project);
        }

        separated.push("updated_at = ");
        separated.push_bind_unseparated(now);

        builder.push(" WHERE id = ");
        builder.push_bind(id.to_string());

        let result = builder.build().execute(&mut *tx).await.map_err(DbError::from)?;
        if result.rows_affected() == 0 {
            let _ = tx.rollback().await;
            return Err(DomainError::EntityNotFound("Project".to_string(), id));
        }

        let project = self.find_by_id_with_tx(id, &mut tx).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(project)
    }

    async fn find_all(&self, params: PaginationParams) -> DomainResult<PaginatedResult<Project>> {
        let offset = (params.page - 1) * params.per_page;

        let total: i64 = query_scalar("SELECT COUNT(*) FROM projects")
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;

        let rows = query_as::<_, ProjectRow>(
            "SELECT * FROM projects ORDER BY start_date DESC, name ASC LIMIT ? OFFSET ?",
        )
        .bind(params.per_page as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        let entities = rows
            .into_iter()
            .map(Self::map_row_to_entity)
            .collect::<DomainResult<Vec<Project>>>()?;

        Ok(PaginatedResult::new(entities, total as u64, params))
    }

    async fn max_budget_year_index(&self, project_id: Uuid) -> DomainResult<Option<i64>> {
        let max: Option<i64> =
            query_scalar("SELECT MAX(year_index) FROM budget_entries WHERE project_id = ?")
                .bind(project_id.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(DbError::from)?;

        Ok(max)
    }

    async fn count_expenditures_after(
        &self,
        project_id: Uuid,
        date: NaiveDate,
    ) -> DomainResult<i64> {
        let count: i64 = query_scalar(
            "SELECT COUNT(*) FROM expenditure_entries WHERE project_id = ? AND expenditure_date > ?",
        )
        .bind(project_id.to_string())
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(count)
    }
}
