use crate::domains::core::repository::{FindById, HardDeletable};
use crate::domains::period::{
    self, Clock, ReportingPeriodType,
};
use crate::domains::project::repository::ProjectRepository;
use crate::domains::project::types::{
    CurrentPeriodResponse, NewProject, Project, ProjectResponse, UpdateProject,
};
use crate::errors::{DomainError, DomainResult, ServiceResult};
use crate::types::{PaginatedResult, PaginationParams};
use crate::validation::Validate;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Trait defining project service operations
#[async_trait]
pub trait ProjectService: Send + Sync {
    async fn create_project(&self, new_project: NewProject) -> ServiceResult<ProjectResponse>;

    async fn get_project_by_id(&self, id: Uuid) -> ServiceResult<ProjectResponse>;

    async fn list_projects(
        &self,
        params: PaginationParams,
    ) -> ServiceResult<PaginatedResult<ProjectResponse>>;

    async fn update_project(
        &self,
        id: Uuid,
        update_data: UpdateProject,
    ) -> ServiceResult<ProjectResponse>;

    /// Cascade delete the project with its mappings and ledger rows.
    async fn delete_project(&self, id: Uuid) -> ServiceResult<()>;

    /// The reporting period the project is in as of the service clock.
    async fn get_current_period(
        &self,
        id: Uuid,
        period_type: ReportingPeriodType,
    ) -> ServiceResult<CurrentPeriodResponse>;
}

/// Implementation of the project service
#[derive(Clone)]
pub struct ProjectServiceImpl {
    repo: Arc<dyn ProjectRepository>,
    clock: Arc<dyn Clock>,
}

impl ProjectServiceImpl {
    pub fn new(repo: Arc<dyn ProjectRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Shrinking the duration below recorded history would orphan derived
    /// periods, so it is rejected with the offending ledgers listed.
    async fn ensure_duration_shrink_allowed(
        &self,
        project: &Project,
        new_duration: u32,
    ) -> DomainResult<()> {
        if new_duration >= project.duration_years {
            return Ok(());
        }

        let mut dependencies = Vec::new();

        if let Some(max_year) = self.repo.max_budget_year_index(project.id).await? {
            if max_year > new_duration as i64 {
                dependencies.push("budget_entries".to_string());
            }
        }

        let shrunk = Project {
            duration_years: new_duration,
            ..project.clone()
        };
        if self
            .repo
            .count_expenditures_after(project.id, shrunk.end_date())
            .await?
            > 0
        {
            dependencies.push("expenditure_entries".to_string());
        }

        if dependencies.is_empty() {
            Ok(())
        } else {
            Err(DomainError::DependentRecordsExist {
                entity_type: "Project".to_string(),
                id: project.id,
                dependencies,
            })
        }
    }
}

#[async_trait]
impl ProjectService for ProjectServiceImpl {
    async fn create_project(&self, new_project: NewProject) -> ServiceResult<ProjectResponse> {
        new_project.validate()?;

        let project = self.repo.create(&new_project).await?;
        log::info!("created project {} ({})", project.name, project.id);

        Ok(ProjectResponse::from(project))
    }

    async fn get_project_by_id(&self, id: Uuid) -> ServiceResult<ProjectResponse> {
        let project = self.repo.find_by_id(id).await?;
        Ok(ProjectResponse::from(project))
    }

    async fn list_projects(
        &self,
        params: PaginationParams,
    ) -> ServiceResult<PaginatedResult<ProjectResponse>> {
        let result = self.repo.find_all(params).await?;
        Ok(PaginatedResult::new(
            result.items.into_iter().map(ProjectResponse::from).collect(),
            result.total,
            params,
        ))
    }

    async fn update_project(
        &self,
        id: Uuid,
        update_data: UpdateProject,
    ) -> ServiceResult<ProjectResponse> {
        update_data.validate()?;

        let existing = self.repo.find_by_id(id).await?;
        if let Some(new_duration) = update_data.duration_years {
            self.ensure_duration_shrink_allowed(&existing, new_duration)
                .await?;
        }

        let project = self.repo.update(id, &update_data).await?;
        Ok(ProjectResponse::from(project))
    }

    async fn delete_project(&self, id: Uuid) -> ServiceResult<()> {
        self.repo.hard_delete(id).await?;
        log::info!("deleted project {} with its mappings and ledgers", id);
        Ok(())
    }

    async fn get_current_period(
        &self,
        id: Uuid,
        period_type: ReportingPeriodType,
    ) -> ServiceResult<CurrentPeriodResponse> {
        let project = self.repo.find_by_id(id).await?;
        let today = self.clock.today();

        let period = period::derive_current_period(
            period_type,
            project.start_date,
            project.duration_years,
            today,
        );
        let window = period::period_date_range(
            period_type,
            period.year_index,
            period.period_number,
            project.start_date,
        )?;
        let label = period::period_ref_label(period_type, period, project.start_date)?;

        Ok(CurrentPeriodResponse::new(period_type, period, label, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::period::FixedClock;
    use crate::domains::project::repository::SqliteProjectRepository;
    use chrono::NaiveDate;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db_migration::run_migrations(&pool).await.unwrap();
        pool
    }

    fn service(pool: &SqlitePool, today: NaiveDate) -> ProjectServiceImpl {
        ProjectServiceImpl::new(
            Arc::new(SqliteProjectRepository::new(pool.clone())),
            Arc::new(FixedClock(today)),
        )
    }

    fn new_project() -> NewProject {
        NewProject {
            name: "Watershed Development".to_string(),
            start_date: "2023-04-01".to_string(),
            duration_years: 3,
            total_value: 4_500_000.0,
            funding_agency: Some("ICAR".to_string()),
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn create_and_fetch_project() {
        let pool = setup_pool().await;
        let svc = service(&pool, d(2024, 7, 15));

        let created = svc.create_project(new_project()).await.unwrap();
        assert_eq!(created.duration_years, 3);
        assert_eq!(created.end_date, "2026-03-31");

        let fetched = svc.get_project_by_id(created.id).await.unwrap();
        assert_eq!(fetched.name, "Watershed Development");
    }

    #[tokio::test]
    async fn rejects_invalid_input() {
        let pool = setup_pool().await;
        let svc = service(&pool, d(2024, 7, 15));

        let mut bad = new_project();
        bad.name = "   ".to_string();
        assert!(svc.create_project(bad).await.is_err());

        let mut bad = new_project();
        bad.start_date = "01-04-2023".to_string();
        assert!(svc.create_project(bad).await.is_err());

        let mut bad = new_project();
        bad.duration_years = 0;
        assert!(svc.create_project(bad).await.is_err());

        let mut bad = new_project();
        bad.total_value = -1.0;
        assert!(svc.create_project(bad).await.is_err());
    }

    #[tokio::test]
    async fn update_cannot_touch_start_date() {
        let pool = setup_pool().await;
        let svc = service(&pool, d(2024, 7, 15));
        let created = svc.create_project(new_project()).await.unwrap();

        let updated = svc
            .update_project(
                created.id,
                UpdateProject {
                    name: Some("Watershed Development Phase II".to_string()),
                    duration_years: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Watershed Development Phase II");
        assert_eq!(updated.duration_years, 5);
        // Start date survives any update
        assert_eq!(updated.start_date, "2023-04-01");
    }

    #[tokio::test]
    async fn duration_shrink_blocked_by_budget_history() {
        let pool = setup_pool().await;
        let svc = service(&pool, d(2024, 7, 15));
        let created = svc.create_project(new_project()).await.unwrap();

        // Seed a mapping and a third-year budget entry directly
        let now = chrono::Utc::now().to_rfc3339();
        let field_id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO budget_fields (id, name, is_default, created_at, updated_at) VALUES (?, 'Equipment', 1, ?, ?)")
            .bind(&field_id).bind(&now).bind(&now)
            .execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO budget_entries (id, project_id, field_id, year_index, amount, created_at, updated_at) VALUES (?, ?, ?, 3, 100000, ?, ?)")
            .bind(Uuid::new_v4().to_string())
            .bind(created.id.to_string())
            .bind(&field_id)
            .bind(&now).bind(&now)
            .execute(&pool).await.unwrap();

        let result = svc
            .update_project(
                created.id,
                UpdateProject {
                    duration_years: Some(2),
                    ..Default::default()
                },
            )
            .await;

        match result {
            Err(crate::errors::ServiceError::Domain(DomainError::DependentRecordsExist {
                dependencies,
                ..
            })) => assert!(dependencies.contains(&"budget_entries".to_string())),
            other => panic!("expected constraint violation, got {:?}", other.map(|r| r.id)),
        }
    }

    #[tokio::test]
    async fn cascade_delete_leaves_no_orphans() {
        let pool = setup_pool().await;
        let svc = service(&pool, d(2024, 7, 15));
        let created = svc.create_project(new_project()).await.unwrap();
        let project_id = created.id.to_string();

        let now = chrono::Utc::now().to_rfc3339();
        let field_id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO budget_fields (id, name, is_default, created_at, updated_at) VALUES (?, 'Consumables', 0, ?, ?)")
            .bind(&field_id).bind(&now).bind(&now)
            .execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO project_field_mappings (id, project_id, field_id, is_custom, created_at) VALUES (?, ?, ?, 1, ?)")
            .bind(Uuid::new_v4().to_string()).bind(&project_id).bind(&field_id).bind(&now)
            .execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO budget_entries (id, project_id, field_id, year_index, amount, created_at, updated_at) VALUES (?, ?, ?, 1, 50000, ?, ?)")
            .bind(Uuid::new_v4().to_string()).bind(&project_id).bind(&field_id).bind(&now).bind(&now)
            .execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO grant_entries (id, project_id, field_id, received_date, amount, remarks, created_at) VALUES (?, ?, ?, '2023-05-01', 40000, NULL, ?)")
            .bind(Uuid::new_v4().to_string()).bind(&project_id).bind(&field_id).bind(&now)
            .execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO expenditure_entries (id, project_id, field_id, year_index, period_type, period_number, amount, expenditure_date, remarks, created_at, updated_at) VALUES (?, ?, ?, 2023, 'fy', 1, 10000, '2023-05-15', NULL, ?, ?)")
            .bind(Uuid::new_v4().to_string()).bind(&project_id).bind(&field_id).bind(&now).bind(&now)
            .execute(&pool).await.unwrap();

        svc.delete_project(created.id).await.unwrap();

        for table in [
            "projects",
            "project_field_mappings",
            "budget_entries",
            "grant_entries",
            "expenditure_entries",
        ] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(count, 0, "{} still has rows after cascade delete", table);
        }

        // The project's custom field went with it
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM budget_fields")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn current_period_uses_injected_clock() {
        let pool = setup_pool().await;
        let svc = service(&pool, d(2024, 7, 15));
        let created = svc.create_project(new_project()).await.unwrap();

        let fy = svc
            .get_current_period(created.id, ReportingPeriodType::FinancialYear)
            .await
            .unwrap();
        assert_eq!(fy.year_index, 2024);
        assert_eq!(fy.period_number, 2);
        assert_eq!(fy.label, "FY 2024-25 Q2 (Jul-Sep)");

        let pq = svc
            .get_current_period(created.id, ReportingPeriodType::ProjectQuarter)
            .await
            .unwrap();
        assert_eq!(pq.year_index, 2024);
        assert_eq!(pq.period_number, 6);
    }
}
