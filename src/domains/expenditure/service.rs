use crate::domains::core::repository::FindById;
use crate::domains::expenditure::repository::ExpenditureRepository;
use crate::domains::expenditure::types::{
    group_by_period, group_by_year, BulkExpenditureSubmission, ExpenditureEntryResponse,
    NewExpenditureEntry, PeriodGroup, YearGroup,
};
use crate::domains::field::repository::BudgetFieldRepository;
use crate::domains::period::{self, ReportingPeriodType};
use crate::domains::project::repository::ProjectRepository;
use crate::domains::project::types::Project;
use crate::errors::{DomainError, DomainResult, ServiceResult, ValidationError};
use crate::validation::{common, Validate};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Trait defining expenditure ledger service operations
#[async_trait]
pub trait ExpenditureService: Send + Sync {
    /// Record one spend event. The expenditure date must fall inside the
    /// calendar window of the claimed period; otherwise the entry is
    /// rejected at this boundary and nothing is stored.
    async fn record_expenditure(
        &self,
        project_id: Uuid,
        entry: NewExpenditureEntry,
    ) -> ServiceResult<ExpenditureEntryResponse>;

    /// Record one period's spend across several fields. Blank and zero
    /// rows are skipped; the remaining rows are stored all-or-nothing.
    async fn record_bulk(
        &self,
        project_id: Uuid,
        submission: BulkExpenditureSubmission,
    ) -> ServiceResult<Vec<ExpenditureEntryResponse>>;

    async fn list_by_project(
        &self,
        project_id: Uuid,
    ) -> ServiceResult<Vec<ExpenditureEntryResponse>>;

    /// Entries grouped by period in canonical column order.
    async fn group_by_period(&self, project_id: Uuid) -> ServiceResult<Vec<PeriodGroup>>;

    /// Entries grouped by year, ascending.
    async fn group_by_year(&self, project_id: Uuid) -> ServiceResult<Vec<YearGroup>>;

    async fn total_for_field(&self, project_id: Uuid, field_id: Uuid) -> ServiceResult<f64>;

    async fn delete_expenditure(&self, id: Uuid) -> ServiceResult<()>;
}

/// Implementation of the expenditure ledger service
#[derive(Clone)]
pub struct ExpenditureServiceImpl {
    pool: SqlitePool,
    repo: Arc<dyn ExpenditureRepository>,
    project_repo: Arc<dyn ProjectRepository>,
    field_repo: Arc<dyn BudgetFieldRepository>,
}

impl ExpenditureServiceImpl {
    pub fn new(
        pool: SqlitePool,
        repo: Arc<dyn ExpenditureRepository>,
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

    /// Check the claimed (year, period) pair against the project and the
    /// entry date against the period's calendar window.
    async fn validate_period_claim(
        &self,
        project: &Project,
        entry: &NewExpenditureEntry,
    ) -> DomainResult<()> {
        entry.validate()?;

        match entry.period_type {
            ReportingPeriodType::FinancialYear => {
                let first_fy = project.first_financial_year();
                // A project starting mid-quarter can touch one fiscal year
                // past its duration count.
                let last_fy = first_fy + project.duration_years as i32;
                if entry.year_index < first_fy || entry.year_index > last_fy {
                    return Err(DomainError::Validation(ValidationError::range(
                        "year_index",
                        first_fy,
                        last_fy,
                    )));
                }
            }
            ReportingPeriodType::ProjectQuarter => {
                let max = period::max_project_quarters(project.duration_years);
                if entry.period_number > max {
                    return Err(DomainError::Validation(ValidationError::range(
                        "period_number",
                        1,
                        max,
                    )));
                }
            }
        }

        let (window_start, window_end) = period::period_date_range(
            entry.period_type,
            entry.year_index,
            entry.period_number,
            project.start_date,
        )?;

        let date = entry.parsed_date()?;
        if date < window_start || date > window_end {
            let period_label = period::period_label(
                entry.period_type,
                entry.year_index,
                entry.period_number,
                project.start_date,
            )?;
            return Err(DomainError::PeriodMismatch {
                period_label,
                date,
                window_start,
                window_end,
            });
        }

        common::validate_field_mapped(&self.pool, &project.id, &entry.field_id).await?;
        Ok(())
    }

    async fn field_names(&self, project_id: Uuid) -> DomainResult<HashMap<Uuid, String>> {
        Ok(self
            .field_repo
            .find_mappings_for_project(project_id)
            .await?
            .into_iter()
            .map(|(mapping, field)| (mapping.field_id, field.name))
            .collect())
    }
}

#[async_trait]
impl ExpenditureService for ExpenditureServiceImpl {
    async fn record_expenditure(
        &self,
        project_id: Uuid,
        entry: NewExpenditureEntry,
    ) -> ServiceResult<ExpenditureEntryResponse> {
        let project = self.project_repo.find_by_id(project_id).await?;
        self.validate_period_claim(&project, &entry).await?;

        let saved = self.repo.insert(project_id, &entry).await?;
        log::debug!(
            "recorded expenditure {} for project {} field {} in {} {}/{}",
            saved.amount,
            project_id,
            saved.field_id,
            saved.period_type,
            saved.year_index,
            saved.period_number
        );
        Ok(ExpenditureEntryResponse::from(saved))
    }

    async fn record_bulk(
        &self,
        project_id: Uuid,
        submission: BulkExpenditureSubmission,
    ) -> ServiceResult<Vec<ExpenditureEntryResponse>> {
        submission.validate()?;
        let project = self.project_repo.find_by_id(project_id).await?;

        let entries = submission.filled_rows();
        for entry in &entries {
            self.validate_period_claim(&project, entry).await?;
        }

        let saved = self.repo.insert_bulk(project_id, &entries).await?;
        log::info!(
            "recorded {} expenditure rows for project {} ({} blank rows skipped)",
            saved.len(),
            project_id,
            submission.rows.len() - saved.len()
        );
        Ok(saved.into_iter().map(ExpenditureEntryResponse::from).collect())
    }

    async fn list_by_project(
        &self,
        project_id: Uuid,
    ) -> ServiceResult<Vec<ExpenditureEntryResponse>> {
        let _ = self.project_repo.find_by_id(project_id).await?;
        let names = self.field_names(project_id).await?;

        let entries = self.repo.find_by_project(project_id).await?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let field_id = entry.field_id;
                let response = ExpenditureEntryResponse::from(entry);
                match names.get(&field_id) {
                    Some(name) => response.with_field_name(name.clone()),
                    None => response,
                }
            })
            .collect())
    }

    async fn group_by_period(&self, project_id: Uuid) -> ServiceResult<Vec<PeriodGroup>> {
        let _ = self.project_repo.find_by_id(project_id).await?;
        let entries = self.repo.find_by_project(project_id).await?;
        Ok(group_by_period(entries))
    }

    async fn group_by_year(&self, project_id: Uuid) -> ServiceResult<Vec<YearGroup>> {
        let _ = self.project_repo.find_by_id(project_id).await?;
        let entries = self.repo.find_by_project(project_id).await?;
        Ok(group_by_year(entries))
    }

    async fn total_for_field(&self, project_id: Uuid, field_id: Uuid) -> ServiceResult<f64> {
        Ok(self.repo.total_for_field(project_id, field_id).await?)
    }

    async fn delete_expenditure(&self, id: Uuid) -> ServiceResult<()> {
        let entry = self.repo.find_by_id(id).await?;
        self.repo.delete_entry(id).await?;
        log::info!(
            "deleted expenditure entry {} ({} for field {})",
            id,
            entry.amount,
            entry.field_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::expenditure::repository::SqliteExpenditureRepository;
    use crate::domains::expenditure::types::BulkExpenditureRow;
    use crate::domains::field::repository::SqliteBudgetFieldRepository;
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
        svc: ExpenditureServiceImpl,
        project_id: Uuid,
        f1: Uuid,
        f2: Uuid,
    }

    async fn fixture(pool: &SqlitePool) -> Fixture {
        let project_repo = Arc::new(SqliteProjectRepository::new(pool.clone()));
        let field_repo = Arc::new(SqliteBudgetFieldRepository::new(pool.clone()));

        let project = project_repo
            .create(&NewProject {
                name: "Canal Rehabilitation".to_string(),
                start_date: "2023-04-01".to_string(),
                duration_years: 3,
                total_value: 7_500_000.0,
                funding_agency: Some("State PWD".to_string()),
            })
            .await
            .unwrap();

        field_repo
            .seed_default_fields(&["Equipment", "Manpower"])
            .await
            .unwrap();
        let fields = field_repo.find_default_fields().await.unwrap();
        let (f1, f2) = (fields[0].id, fields[1].id);
        field_repo.map_field(project.id, f1, false).await.unwrap();
        field_repo.map_field(project.id, f2, false).await.unwrap();

        let svc = ExpenditureServiceImpl::new(
            pool.clone(),
            Arc::new(SqliteExpenditureRepository::new(pool.clone())),
            project_repo,
            field_repo,
        );

        Fixture { svc, project_id: project.id, f1, f2 }
    }

    fn fy_entry(field_id: Uuid, year: i32, quarter: u32, amount: f64, date: &str) -> NewExpenditureEntry {
        NewExpenditureEntry {
            field_id,
            year_index: year,
            period_type: ReportingPeriodType::FinancialYear,
            period_number: quarter,
            amount,
            expenditure_date: date.to_string(),
            remarks: None,
        }
    }

    #[tokio::test]
    async fn records_expenditure_inside_period_window() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        let saved = f
            .svc
            .record_expenditure(f.project_id, fy_entry(f.f1, 2024, 2, 12_000.0, "2024-08-20"))
            .await
            .unwrap();
        assert_eq!(saved.year_index, 2024);
        assert_eq!(saved.period_number, 2);
    }

    #[tokio::test]
    async fn date_outside_claimed_period_rejected() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        // Oct 5 is Q3, not Q2
        let result = f
            .svc
            .record_expenditure(f.project_id, fy_entry(f.f1, 2024, 2, 12_000.0, "2024-10-05"))
            .await;

        match result {
            Err(ServiceError::Domain(DomainError::PeriodMismatch { period_label, .. })) => {
                assert_eq!(period_label, "FY 2024-25 Q2 (Jul-Sep)");
            }
            other => panic!("expected period mismatch, got {:?}", other),
        }

        // The ledger is untouched
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM expenditure_entries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn project_quarter_window_enforced() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        // Quarter 6 runs Jul-Sep 2024 for a 2023-04-01 start
        let entry = NewExpenditureEntry {
            field_id: f.f1,
            year_index: 2024,
            period_type: ReportingPeriodType::ProjectQuarter,
            period_number: 6,
            amount: 9_000.0,
            expenditure_date: "2024-09-30".to_string(),
            remarks: None,
        };
        f.svc.record_expenditure(f.project_id, entry.clone()).await.unwrap();

        let late = NewExpenditureEntry {
            expenditure_date: "2024-10-01".to_string(),
            ..entry
        };
        assert!(matches!(
            f.svc.record_expenditure(f.project_id, late).await,
            Err(ServiceError::Domain(DomainError::PeriodMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn period_number_beyond_project_duration_rejected() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        let entry = NewExpenditureEntry {
            field_id: f.f1,
            year_index: 2026,
            period_type: ReportingPeriodType::ProjectQuarter,
            period_number: 13,
            amount: 1_000.0,
            expenditure_date: "2026-07-01".to_string(),
            remarks: None,
        };
        assert!(f.svc.record_expenditure(f.project_id, entry).await.is_err());
    }

    #[tokio::test]
    async fn bulk_skips_blank_rows() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        let saved = f
            .svc
            .record_bulk(
                f.project_id,
                BulkExpenditureSubmission {
                    year_index: 2023,
                    period_type: ReportingPeriodType::FinancialYear,
                    period_number: 1,
                    expenditure_date: "2023-05-10".to_string(),
                    rows: vec![
                        BulkExpenditureRow { field_id: f.f1, amount: Some(8_000.0), remarks: None },
                        BulkExpenditureRow { field_id: f.f2, amount: Some(0.0), remarks: None },
                        BulkExpenditureRow { field_id: f.f2, amount: None, remarks: None },
                    ],
                },
            )
            .await
            .unwrap();

        assert_eq!(saved.len(), 1);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM expenditure_entries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn bulk_with_all_blank_rows_rejected() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        let result = f
            .svc
            .record_bulk(
                f.project_id,
                BulkExpenditureSubmission {
                    year_index: 2023,
                    period_type: ReportingPeriodType::FinancialYear,
                    period_number: 1,
                    expenditure_date: "2023-05-10".to_string(),
                    rows: vec![
                        BulkExpenditureRow { field_id: f.f1, amount: None, remarks: None },
                        BulkExpenditureRow { field_id: f.f2, amount: Some(0.0), remarks: None },
                    ],
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn bulk_is_all_or_nothing() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        // Second row targets an unmapped field: nothing persists
        let result = f
            .svc
            .record_bulk(
                f.project_id,
                BulkExpenditureSubmission {
                    year_index: 2023,
                    period_type: ReportingPeriodType::FinancialYear,
                    period_number: 1,
                    expenditure_date: "2023-05-10".to_string(),
                    rows: vec![
                        BulkExpenditureRow { field_id: f.f1, amount: Some(8_000.0), remarks: None },
                        BulkExpenditureRow { field_id: Uuid::new_v4(), amount: Some(2_000.0), remarks: None },
                    ],
                },
            )
            .await;
        assert!(result.is_err());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM expenditure_entries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn grouping_orders_periods_canonically() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        for (year, quarter, date) in [
            (2024, 2, "2024-08-01"),
            (2023, 1, "2023-04-15"),
            (2024, 1, "2024-05-01"),
            (2023, 4, "2024-02-01"),
        ] {
            f.svc
                .record_expenditure(f.project_id, fy_entry(f.f1, year, quarter, 1_000.0, date))
                .await
                .unwrap();
        }

        let groups = f.svc.group_by_period(f.project_id).await.unwrap();
        let order: Vec<(i32, u32)> = groups
            .iter()
            .map(|g| (g.year_index, g.period_number))
            .collect();
        assert_eq!(order, vec![(2023, 1), (2023, 4), (2024, 1), (2024, 2)]);

        let years = f.svc.group_by_year(f.project_id).await.unwrap();
        let order: Vec<i32> = years.iter().map(|g| g.year_index).collect();
        assert_eq!(order, vec![2023, 2024]);
        assert_eq!(years[0].entries.len(), 2);
    }

    #[tokio::test]
    async fn delete_expenditure_removes_row() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        let saved = f
            .svc
            .record_expenditure(f.project_id, fy_entry(f.f1, 2023, 1, 4_000.0, "2023-06-01"))
            .await
            .unwrap();

        f.svc.delete_expenditure(saved.id).await.unwrap();
        assert!(f.svc.delete_expenditure(saved.id).await.is_err());
    }
}
