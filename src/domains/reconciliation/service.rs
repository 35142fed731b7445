use crate::domains::budget::repository::BudgetRepository;
use crate::domains::core::repository::FindById;
use crate::domains::expenditure::repository::ExpenditureRepository;
use crate::domains::field::repository::BudgetFieldRepository;
use crate::domains::grant::repository::GrantRepository;
use crate::domains::period::{self, ReportingPeriodType};
use crate::domains::project::repository::ProjectRepository;
use crate::domains::reconciliation::types::{
    grand_totals, period_columns, periodwise_cells, summarize_fields, BudgetVsExpenditureSummary,
    FieldGrantTotal, PeriodColumn, PeriodwiseReport,
};
use crate::errors::ServiceResult;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Trait defining the reconciliation engine's read-only views
///
/// Every view is a pure function of the three ledgers' current rows -
/// nothing here persists aggregate state, so the numbers can never drift
/// from the underlying entries.
#[async_trait]
pub trait ReconciliationService: Send + Sync {
    /// Every mapped field with its lifetime grant total.
    async fn fields_with_grant_totals(
        &self,
        project_id: Uuid,
    ) -> ServiceResult<Vec<FieldGrantTotal>>;

    /// Budget, grant, expenditure and balance per field, plus a grand
    /// total row. When `field_ids` is given (a paginated view), rows and
    /// the grand total cover exactly that subset.
    async fn budget_vs_expenditure_summary(
        &self,
        project_id: Uuid,
        field_ids: Option<Vec<Uuid>>,
    ) -> ServiceResult<BudgetVsExpenditureSummary>;

    /// Field-by-period expenditure matrix in canonical column order.
    async fn periodwise_report(
        &self,
        project_id: Uuid,
        period_type: ReportingPeriodType,
    ) -> ServiceResult<PeriodwiseReport>;
}

/// Implementation of the reconciliation engine
#[derive(Clone)]
pub struct ReconciliationServiceImpl {
    project_repo: Arc<dyn ProjectRepository>,
    field_repo: Arc<dyn BudgetFieldRepository>,
    budget_repo: Arc<dyn BudgetRepository>,
    grant_repo: Arc<dyn GrantRepository>,
    expenditure_repo: Arc<dyn ExpenditureRepository>,
}

impl ReconciliationServiceImpl {
    pub fn new(
        project_repo: Arc<dyn ProjectRepository>,
        field_repo: Arc<dyn BudgetFieldRepository>,
        budget_repo: Arc<dyn BudgetRepository>,
        grant_repo: Arc<dyn GrantRepository>,
        expenditure_repo: Arc<dyn ExpenditureRepository>,
    ) -> Self {
        Self {
            project_repo,
            field_repo,
            budget_repo,
            grant_repo,
            expenditure_repo,
        }
    }

    async fn mapped_fields(&self, project_id: Uuid) -> ServiceResult<Vec<(Uuid, String, bool)>> {
        Ok(self
            .field_repo
            .find_mappings_for_project(project_id)
            .await?
            .into_iter()
            .map(|(mapping, field)| (mapping.field_id, field.name, mapping.is_custom))
            .collect())
    }
}

#[async_trait]
impl ReconciliationService for ReconciliationServiceImpl {
    async fn fields_with_grant_totals(
        &self,
        project_id: Uuid,
    ) -> ServiceResult<Vec<FieldGrantTotal>> {
        let _ = self.project_repo.find_by_id(project_id).await?;

        let grants = self.grant_repo.find_by_project(project_id).await?;
        let fields = self.mapped_fields(project_id).await?;

        Ok(fields
            .into_iter()
            .map(|(field_id, field_name, is_custom)| {
                let total_received = grants
                    .iter()
                    .filter(|g| g.field_id == field_id)
                    .map(|g| g.amount)
                    .sum();
                FieldGrantTotal {
                    field_id,
                    field_name,
                    is_custom,
                    total_received,
                }
            })
            .collect())
    }

    async fn budget_vs_expenditure_summary(
        &self,
        project_id: Uuid,
        field_ids: Option<Vec<Uuid>>,
    ) -> ServiceResult<BudgetVsExpenditureSummary> {
        let _ = self.project_repo.find_by_id(project_id).await?;

        let mut fields: Vec<(Uuid, String)> = self
            .mapped_fields(project_id)
            .await?
            .into_iter()
            .map(|(id, name, _)| (id, name))
            .collect();

        // A paginated caller displays a subset; the summary row must sum
        // what is displayed, not the global set.
        if let Some(displayed) = field_ids {
            fields.retain(|(id, _)| displayed.contains(id));
        }

        let budget = self.budget_repo.find_by_project(project_id).await?;
        let grants = self.grant_repo.find_by_project(project_id).await?;
        let expenditure = self.expenditure_repo.find_by_project(project_id).await?;

        let rows = summarize_fields(&fields, &budget, &grants, &expenditure);
        let totals = grand_totals(&rows);

        Ok(BudgetVsExpenditureSummary {
            project_id,
            rows,
            totals,
        })
    }

    async fn periodwise_report(
        &self,
        project_id: Uuid,
        period_type: ReportingPeriodType,
    ) -> ServiceResult<PeriodwiseReport> {
        let project = self.project_repo.find_by_id(project_id).await?;

        let fields: Vec<(Uuid, String)> = self
            .mapped_fields(project_id)
            .await?
            .into_iter()
            .map(|(id, name, _)| (id, name))
            .collect();

        let entries: Vec<_> = self
            .expenditure_repo
            .find_by_project(project_id)
            .await?
            .into_iter()
            .filter(|e| e.period_type == period_type)
            .collect();

        let keys = period_columns(&entries, period_type);
        let mut columns = Vec::with_capacity(keys.len());
        for key in &keys {
            let label = period::period_label(
                key.period_type,
                key.year_index,
                key.period_number,
                project.start_date,
            )?;
            columns.push(PeriodColumn {
                year_index: key.year_index,
                period_type: key.period_type,
                period_number: key.period_number,
                label,
            });
        }

        let rows = periodwise_cells(&fields, &keys, &entries);

        let mut column_totals = vec![0.0; keys.len()];
        let mut grand_total = 0.0;
        for row in &rows {
            for (i, cell) in row.cells.iter().enumerate() {
                column_totals[i] += cell;
            }
            grand_total += row.row_total;
        }

        Ok(PeriodwiseReport {
            project_id,
            period_type,
            columns,
            rows,
            column_totals,
            grand_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::budget::repository::SqliteBudgetRepository;
    use crate::domains::budget::types::NewBudgetEntry;
    use crate::domains::expenditure::repository::SqliteExpenditureRepository;
    use crate::domains::expenditure::types::NewExpenditureEntry;
    use crate::domains::field::repository::SqliteBudgetFieldRepository;
    use crate::domains::grant::repository::SqliteGrantRepository;
    use crate::domains::grant::types::GrantAllocation;
    use crate::domains::project::repository::SqliteProjectRepository;
    use crate::domains::project::types::NewProject;
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

    struct Fixture {
        svc: ReconciliationServiceImpl,
        budget_repo: Arc<SqliteBudgetRepository>,
        grant_repo: Arc<SqliteGrantRepository>,
        expenditure_repo: Arc<SqliteExpenditureRepository>,
        project_id: Uuid,
        f1: Uuid,
        f2: Uuid,
    }

    async fn fixture(pool: &SqlitePool) -> Fixture {
        let project_repo = Arc::new(SqliteProjectRepository::new(pool.clone()));
        let field_repo = Arc::new(SqliteBudgetFieldRepository::new(pool.clone()));
        let budget_repo = Arc::new(SqliteBudgetRepository::new(pool.clone()));
        let grant_repo = Arc::new(SqliteGrantRepository::new(pool.clone()));
        let expenditure_repo = Arc::new(SqliteExpenditureRepository::new(pool.clone()));

        let project = project_repo
            .create(&NewProject {
                name: "Seed Bank Expansion".to_string(),
                start_date: "2023-04-01".to_string(),
                duration_years: 3,
                total_value: 3_000_000.0,
                funding_agency: None,
            })
            .await
            .unwrap();

        field_repo
            .seed_default_fields(&["Equipment", "Travel"])
            .await
            .unwrap();
        let fields = field_repo.find_default_fields().await.unwrap();
        let (f1, f2) = (fields[0].id, fields[1].id);
        field_repo.map_field(project.id, f1, false).await.unwrap();
        field_repo.map_field(project.id, f2, false).await.unwrap();

        let svc = ReconciliationServiceImpl::new(
            project_repo,
            field_repo,
            budget_repo.clone(),
            grant_repo.clone(),
            expenditure_repo.clone(),
        );

        Fixture {
            svc,
            budget_repo,
            grant_repo,
            expenditure_repo,
            project_id: project.id,
            f1,
            f2,
        }
    }

    fn spend(field_id: Uuid, quarter: u32, amount: f64, date: &str) -> NewExpenditureEntry {
        NewExpenditureEntry {
            field_id,
            year_index: 2023,
            period_type: ReportingPeriodType::FinancialYear,
            period_number: quarter,
            amount,
            expenditure_date: date.to_string(),
            remarks: None,
        }
    }

    #[tokio::test]
    async fn balance_identity_survives_mutations() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;
        let date = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();

        f.budget_repo
            .set_budget(f.project_id, &NewBudgetEntry { field_id: f.f1, year_index: 1, amount: 100_000.0 })
            .await
            .unwrap();
        f.budget_repo
            .set_budget(f.project_id, &NewBudgetEntry { field_id: f.f1, year_index: 1, amount: 150_000.0 })
            .await
            .unwrap();
        let alloc = GrantAllocation { field_id: f.f1, amount: 80_000.0 };
        f.grant_repo
            .insert_receipt(f.project_id, date, &[&alloc], None)
            .await
            .unwrap();
        let entry = f
            .expenditure_repo
            .insert(f.project_id, &spend(f.f1, 1, 60_000.0, "2023-05-10"))
            .await
            .unwrap();
        f.expenditure_repo
            .insert(f.project_id, &spend(f.f2, 1, 30_000.0, "2023-05-12"))
            .await
            .unwrap();
        // A deletion must flow straight through the recompute
        f.expenditure_repo.delete_entry(entry.id).await.unwrap();
        f.expenditure_repo
            .insert(f.project_id, &spend(f.f1, 1, 45_000.0, "2023-05-20"))
            .await
            .unwrap();

        let summary = f
            .svc
            .budget_vs_expenditure_summary(f.project_id, None)
            .await
            .unwrap();

        for row in &summary.rows {
            assert_eq!(row.balance, row.total_budget - row.total_expenditure);
        }

        let equipment = summary.rows.iter().find(|r| r.field_id == f.f1).unwrap();
        assert_eq!(equipment.total_budget, 150_000.0);
        assert_eq!(equipment.total_grant, 80_000.0);
        assert_eq!(equipment.total_expenditure, 45_000.0);
        assert_eq!(equipment.balance, 105_000.0);

        // Travel has no budget: over-spend shows as a negative balance
        let travel = summary.rows.iter().find(|r| r.field_id == f.f2).unwrap();
        assert_eq!(travel.balance, -30_000.0);

        assert_eq!(summary.totals.total_budget, 150_000.0);
        assert_eq!(summary.totals.total_expenditure, 75_000.0);
        assert_eq!(summary.totals.balance, 75_000.0);
    }

    #[tokio::test]
    async fn summary_subset_sums_displayed_rows_only() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        f.budget_repo
            .set_budget(f.project_id, &NewBudgetEntry { field_id: f.f1, year_index: 1, amount: 100_000.0 })
            .await
            .unwrap();
        f.budget_repo
            .set_budget(f.project_id, &NewBudgetEntry { field_id: f.f2, year_index: 1, amount: 40_000.0 })
            .await
            .unwrap();

        let page = f
            .svc
            .budget_vs_expenditure_summary(f.project_id, Some(vec![f.f2]))
            .await
            .unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.totals.total_budget, 40_000.0);

        let full = f
            .svc
            .budget_vs_expenditure_summary(f.project_id, None)
            .await
            .unwrap();
        assert_eq!(full.totals.total_budget, 140_000.0);
    }

    #[tokio::test]
    async fn grant_totals_per_field() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;
        let date = NaiveDate::from_ymd_opt(2023, 7, 1).unwrap();

        let a1 = GrantAllocation { field_id: f.f1, amount: 25_000.0 };
        let a2 = GrantAllocation { field_id: f.f2, amount: 10_000.0 };
        f.grant_repo
            .insert_receipt(f.project_id, date, &[&a1, &a2], Some("instalment 1"))
            .await
            .unwrap();
        let a3 = GrantAllocation { field_id: f.f1, amount: 15_000.0 };
        f.grant_repo
            .insert_receipt(f.project_id, date, &[&a3], Some("instalment 2"))
            .await
            .unwrap();

        let totals = f.svc.fields_with_grant_totals(f.project_id).await.unwrap();
        let by_field: std::collections::HashMap<Uuid, f64> = totals
            .iter()
            .map(|t| (t.field_id, t.total_received))
            .collect();
        assert_eq!(by_field[&f.f1], 40_000.0);
        assert_eq!(by_field[&f.f2], 10_000.0);
    }

    #[tokio::test]
    async fn periodwise_report_has_labels_and_totals() {
        let pool = setup_pool().await;
        let f = fixture(&pool).await;

        f.expenditure_repo
            .insert(f.project_id, &spend(f.f1, 1, 5_000.0, "2023-05-10"))
            .await
            .unwrap();
        f.expenditure_repo
            .insert(f.project_id, &spend(f.f2, 1, 3_000.0, "2023-06-10"))
            .await
            .unwrap();
        f.expenditure_repo
            .insert(f.project_id, &spend(f.f1, 4, 2_000.0, "2024-02-01"))
            .await
            .unwrap();

        let report = f
            .svc
            .periodwise_report(f.project_id, ReportingPeriodType::FinancialYear)
            .await
            .unwrap();

        assert_eq!(report.columns.len(), 2);
        assert_eq!(report.columns[0].label, "FY 2023-24 Q1 (Apr-Jun)");
        assert_eq!(report.columns[1].label, "FY 2023-24 Q4 (Jan-Mar)");
        assert_eq!(report.column_totals, vec![8_000.0, 2_000.0]);
        assert_eq!(report.grand_total, 10_000.0);

        let equipment = report.rows.iter().find(|r| r.field_id == f.f1).unwrap();
        assert_eq!(equipment.cells, vec![5_000.0, 2_000.0]);
    }
}
