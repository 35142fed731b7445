use crate::domains::core::dependency_checker::DependencyChecker;
use crate::domains::core::repository::FindById;
use crate::domains::field::repository::BudgetFieldRepository;
use crate::domains::field::types::{BudgetField, BudgetFieldResponse, NewBudgetField};
use crate::errors::{DomainError, DomainResult, ServiceResult};
use crate::validation::{validate_entity_exists, Validate};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Trait defining the field registry operations
#[async_trait]
pub trait BudgetFieldService: Send + Sync {
    /// All fields in the system (defaults first).
    async fn list_all_fields(&self) -> ServiceResult<Vec<BudgetField>>;

    /// Fields visible to one project: every default field plus the
    /// project's custom fields, each flagged with its mapping state.
    async fn list_fields_for_project(
        &self,
        project_id: Uuid,
    ) -> ServiceResult<Vec<BudgetFieldResponse>>;

    /// Create a custom field scoped to the project and map it, atomically.
    async fn create_custom_field(
        &self,
        project_id: Uuid,
        new_field: NewBudgetField,
    ) -> ServiceResult<BudgetFieldResponse>;

    /// Idempotent: mapping an already-mapped field succeeds without effect.
    async fn map_field(&self, project_id: Uuid, field_id: Uuid) -> ServiceResult<()>;

    /// Fails if any ledger entry exists for the (project, field) pair.
    async fn unmap_field(&self, project_id: Uuid, field_id: Uuid) -> ServiceResult<()>;

    /// Transactional diff against the current mapping set; entries for
    /// fields that remain mapped are preserved untouched.
    async fn replace_all_mappings(
        &self,
        project_id: Uuid,
        field_ids: Vec<Uuid>,
    ) -> ServiceResult<()>;
}

/// Implementation of the field registry service
#[derive(Clone)]
pub struct BudgetFieldServiceImpl {
    pool: SqlitePool,
    repo: Arc<dyn BudgetFieldRepository>,
    dependency_checker: Arc<dyn DependencyChecker>,
}

impl BudgetFieldServiceImpl {
    pub fn new(
        pool: SqlitePool,
        repo: Arc<dyn BudgetFieldRepository>,
        dependency_checker: Arc<dyn DependencyChecker>,
    ) -> Self {
        Self {
            pool,
            repo,
            dependency_checker,
        }
    }

    /// A default field maps as shared; a custom field only to its owner.
    async fn resolve_is_custom(
        &self,
        project_id: Uuid,
        field: &BudgetField,
    ) -> DomainResult<bool> {
        if field.is_default {
            return Ok(false);
        }

        match self.repo.custom_field_owner(field.id).await? {
            Some(owner) if owner != project_id => Err(DomainError::DependentRecordsExist {
                entity_type: "Budget Field".to_string(),
                id: field.id,
                dependencies: vec!["project_field_mappings".to_string()],
            }),
            _ => Ok(true),
        }
    }

    async fn ensure_no_ledger_history(
        &self,
        project_id: Uuid,
        field_id: Uuid,
    ) -> DomainResult<()> {
        let dependencies = self
            .dependency_checker
            .check_ledger_history(project_id, field_id)
            .await?;

        if dependencies.is_empty() {
            Ok(())
        } else {
            Err(DomainError::DependentRecordsExist {
                entity_type: "Field Mapping".to_string(),
                id: field_id,
                dependencies,
            })
        }
    }
}

#[async_trait]
impl BudgetFieldService for BudgetFieldServiceImpl {
    async fn list_all_fields(&self) -> ServiceResult<Vec<BudgetField>> {
        Ok(self.repo.find_all_fields().await?)
    }

    async fn list_fields_for_project(
        &self,
        project_id: Uuid,
    ) -> ServiceResult<Vec<BudgetFieldResponse>> {
        validate_entity_exists(&self.pool, "projects", &project_id, "project_id").await?;

        let mappings = self.repo.find_mappings_for_project(project_id).await?;
        let mapped: HashMap<Uuid, bool> = mappings
            .iter()
            .map(|(mapping, _)| (mapping.field_id, mapping.is_custom))
            .collect();

        let mut responses = Vec::new();
        for field in self.repo.find_default_fields().await? {
            let is_mapped = mapped.contains_key(&field.id);
            responses.push(BudgetFieldResponse::from_field(field, false, is_mapped));
        }
        for (mapping, field) in mappings {
            if mapping.is_custom {
                responses.push(BudgetFieldResponse::from_field(field, true, true));
            }
        }

        Ok(responses)
    }

    async fn create_custom_field(
        &self,
        project_id: Uuid,
        new_field: NewBudgetField,
    ) -> ServiceResult<BudgetFieldResponse> {
        new_field.validate()?;
        validate_entity_exists(&self.pool, "projects", &project_id, "project_id").await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::Database(e.into()))?;

        let result: DomainResult<BudgetField> = async {
            let field = self
                .repo
                .create_field_with_tx(&new_field, false, &mut tx)
                .await?;
            self.repo
                .map_field_with_tx(project_id, field.id, true, &mut tx)
                .await?;
            Ok(field)
        }
        .await;

        match result {
            Ok(field) => {
                tx.commit()
                    .await
                    .map_err(|e| DomainError::Database(e.into()))?;
                log::info!("created custom field '{}' for project {}", field.name, project_id);
                Ok(BudgetFieldResponse::from_field(field, true, true))
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e.into())
            }
        }
    }

    async fn map_field(&self, project_id: Uuid, field_id: Uuid) -> ServiceResult<()> {
        validate_entity_exists(&self.pool, "projects", &project_id, "project_id").await?;

        let field = self.repo.find_by_id(field_id).await?;
        let is_custom = self.resolve_is_custom(project_id, &field).await?;

        self.repo.map_field(project_id, field_id, is_custom).await?;
        Ok(())
    }

    async fn unmap_field(&self, project_id: Uuid, field_id: Uuid) -> ServiceResult<()> {
        if !self.repo.mapping_exists(project_id, field_id).await? {
            return Err(DomainError::EntityNotFound("Field Mapping".to_string(), field_id).into());
        }

        self.ensure_no_ledger_history(project_id, field_id).await?;
        self.repo.unmap_field(project_id, field_id).await?;
        Ok(())
    }

    async fn replace_all_mappings(
        &self,
        project_id: Uuid,
        field_ids: Vec<Uuid>,
    ) -> ServiceResult<()> {
        validate_entity_exists(&self.pool, "projects", &project_id, "project_id").await?;

        let target: HashSet<Uuid> = field_ids.into_iter().collect();
        let current: HashSet<Uuid> = self
            .repo
            .find_mappings_for_project(project_id)
            .await?
            .into_iter()
            .map(|(mapping, _)| mapping.field_id)
            .collect();

        // Any guarded removal aborts the whole operation before a single
        // row changes.
        let removals: Vec<Uuid> = current.difference(&target).copied().collect();
        for field_id in &removals {
            self.ensure_no_ledger_history(project_id, *field_id).await?;
        }

        let mut additions = Vec::new();
        for field_id in target.difference(&current) {
            let field = self.repo.find_by_id(*field_id).await?;
            let is_custom = self.resolve_is_custom(project_id, &field).await?;
            additions.push((*field_id, is_custom));
        }

        self.repo
            .apply_mapping_diff(project_id, &additions, &removals)
            .await?;

        log::debug!(
            "replaced mappings for project {}: {} added, {} removed",
            project_id,
            additions.len(),
            removals.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::core::dependency_checker::SqliteDependencyChecker;
    use crate::domains::field::repository::SqliteBudgetFieldRepository;
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

    fn service(pool: &SqlitePool) -> BudgetFieldServiceImpl {
        BudgetFieldServiceImpl::new(
            pool.clone(),
            Arc::new(SqliteBudgetFieldRepository::new(pool.clone())),
            Arc::new(SqliteDependencyChecker::new(pool.clone())),
        )
    }

    async fn seed_project(pool: &SqlitePool) -> Uuid {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO projects (id, name, start_date, duration_years, total_value, funding_agency, created_at, updated_at)
             VALUES (?, 'Test Project', '2023-04-01', 3, 1000000, NULL, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn map_field_is_idempotent() {
        let pool = setup_pool().await;
        let svc = service(&pool);
        let project_id = seed_project(&pool).await;

        let repo = SqliteBudgetFieldRepository::new(pool.clone());
        repo.seed_default_fields(&["Equipment"]).await.unwrap();
        let field = repo.find_default_fields().await.unwrap().remove(0);

        svc.map_field(project_id, field.id).await.unwrap();
        svc.map_field(project_id, field.id).await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM project_field_mappings")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn unmap_blocked_by_ledger_history() {
        let pool = setup_pool().await;
        let svc = service(&pool);
        let project_id = seed_project(&pool).await;

        let repo = SqliteBudgetFieldRepository::new(pool.clone());
        repo.seed_default_fields(&["Travel"]).await.unwrap();
        let field = repo.find_default_fields().await.unwrap().remove(0);
        svc.map_field(project_id, field.id).await.unwrap();

        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO expenditure_entries (id, project_id, field_id, year_index, period_type, period_number, amount, expenditure_date, remarks, created_at, updated_at)
             VALUES (?, ?, ?, 2023, 'fy', 1, 5000, '2023-05-10', NULL, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(project_id.to_string())
        .bind(field.id.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        let result = svc.unmap_field(project_id, field.id).await;
        match result {
            Err(ServiceError::Domain(DomainError::DependentRecordsExist {
                dependencies, ..
            })) => assert_eq!(dependencies, vec!["expenditure_entries".to_string()]),
            other => panic!("expected constraint violation, got {:?}", other),
        }

        // The mapping is still there
        assert!(repo.mapping_exists(project_id, field.id).await.unwrap());
    }

    #[tokio::test]
    async fn unmap_clean_mapping_succeeds() {
        let pool = setup_pool().await;
        let svc = service(&pool);
        let project_id = seed_project(&pool).await;

        let repo = SqliteBudgetFieldRepository::new(pool.clone());
        repo.seed_default_fields(&["Contingency"]).await.unwrap();
        let field = repo.find_default_fields().await.unwrap().remove(0);
        svc.map_field(project_id, field.id).await.unwrap();

        svc.unmap_field(project_id, field.id).await.unwrap();
        assert!(!repo.mapping_exists(project_id, field.id).await.unwrap());
    }

    #[tokio::test]
    async fn custom_field_is_scoped_to_its_project() {
        let pool = setup_pool().await;
        let svc = service(&pool);
        let owner_id = seed_project(&pool).await;
        let other_id = seed_project(&pool).await;

        let created = svc
            .create_custom_field(
                owner_id,
                NewBudgetField {
                    name: "Drone Survey".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(created.is_custom && created.is_mapped);

        // Another project cannot claim the custom field
        let result = svc.map_field(other_id, created.id).await;
        assert!(matches!(
            result,
            Err(ServiceError::Domain(DomainError::DependentRecordsExist { .. }))
        ));
    }

    #[tokio::test]
    async fn replace_all_mappings_applies_diff() {
        let pool = setup_pool().await;
        let svc = service(&pool);
        let project_id = seed_project(&pool).await;

        let repo = SqliteBudgetFieldRepository::new(pool.clone());
        repo.seed_default_fields(&["Equipment", "Travel", "Manpower"])
            .await
            .unwrap();
        let fields = repo.find_default_fields().await.unwrap();
        let (a, b, c) = (fields[0].id, fields[1].id, fields[2].id);

        svc.replace_all_mappings(project_id, vec![a, b]).await.unwrap();

        // Give field a some history, then swap b out for c
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO budget_entries (id, project_id, field_id, year_index, amount, created_at, updated_at)
             VALUES (?, ?, ?, 1, 20000, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(project_id.to_string())
        .bind(a.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        svc.replace_all_mappings(project_id, vec![a, c]).await.unwrap();

        assert!(repo.mapping_exists(project_id, a).await.unwrap());
        assert!(!repo.mapping_exists(project_id, b).await.unwrap());
        assert!(repo.mapping_exists(project_id, c).await.unwrap());

        // Field a's ledger history survived the diff
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM budget_entries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        // Removing a field with history aborts the whole replace
        let result = svc.replace_all_mappings(project_id, vec![c]).await;
        assert!(matches!(
            result,
            Err(ServiceError::Domain(DomainError::DependentRecordsExist { .. }))
        ));
        assert!(repo.mapping_exists(project_id, a).await.unwrap());
        assert!(repo.mapping_exists(project_id, c).await.unwrap());
    }
}
