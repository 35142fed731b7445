use crate::errors::{DbError, DomainError, DomainResult};
use async_trait::async_trait;
use sqlx::{query_as, Pool, Sqlite};
use uuid::Uuid;

/// The three ledger tables keyed by (project_id, field_id)
const LEDGER_TABLES: &[&str] = &["budget_entries", "grant_entries", "expenditure_entries"];

/// Trait for dependency checking
#[async_trait]
pub trait DependencyChecker: Send + Sync {
    /// Ledger tables holding rows for a (project, field) pair.
    ///
    /// Mapping removal must never orphan ledger history, so unmap checks
    /// this before touching the mapping row.
    async fn check_ledger_history(
        &self,
        project_id: Uuid,
        field_id: Uuid,
    ) -> DomainResult<Vec<String>>;
}

/// SQLite implementation of the DependencyChecker
pub struct SqliteDependencyChecker {
    pool: Pool<Sqlite>,
}

impl SqliteDependencyChecker {
    /// Create a new SQLite dependency checker
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

/// Query result for dependency count
#[derive(Debug, sqlx::FromRow)]
struct DependencyCount {
    count: i64,
}

#[async_trait]
impl DependencyChecker for SqliteDependencyChecker {
    async fn check_ledger_history(
        &self,
        project_id: Uuid,
        field_id: Uuid,
    ) -> DomainResult<Vec<String>> {
        let project_id_str = project_id.to_string();
        let field_id_str = field_id.to_string();
        let mut found = Vec::new();

        for table in LEDGER_TABLES {
            let query = format!(
                "SELECT COUNT(*) as count FROM {} WHERE project_id = ? AND field_id = ?",
                table
            );

            let count_result: Result<DependencyCount, sqlx::Error> = query_as(&query)
                .bind(&project_id_str)
                .bind(&field_id_str)
                .fetch_one(&self.pool)
                .await;

            let count = match count_result {
                Ok(c) => c.count,
                Err(sqlx::Error::RowNotFound) => 0,
                Err(e) => return Err(DomainError::Database(DbError::from(e))),
            };

            if count > 0 {
                found.push(table.to_string());
            }
        }

        Ok(found)
    }
}
