use crate::domains::budget::repository::{BudgetRepository, SqliteBudgetRepository};
use crate::domains::budget::service::{BudgetService, BudgetServiceImpl};
use crate::domains::core::dependency_checker::{DependencyChecker, SqliteDependencyChecker};
use crate::domains::expenditure::repository::{
    ExpenditureRepository, SqliteExpenditureRepository,
};
use crate::domains::expenditure::service::{ExpenditureService, ExpenditureServiceImpl};
use crate::domains::field::repository::{BudgetFieldRepository, SqliteBudgetFieldRepository};
use crate::domains::field::service::{BudgetFieldService, BudgetFieldServiceImpl};
use crate::domains::grant::repository::{GrantRepository, SqliteGrantRepository};
use crate::domains::grant::service::{GrantService, GrantServiceImpl};
use crate::domains::period::{Clock, SystemClock};
use crate::domains::project::repository::{ProjectRepository, SqliteProjectRepository};
use crate::domains::project::service::{ProjectService, ProjectServiceImpl};
use crate::domains::reconciliation::service::{ReconciliationService, ReconciliationServiceImpl};
use crate::errors::{ServiceError, ServiceResult};
use lazy_static::lazy_static;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Budget fields every project starts from. Custom fields are created per
/// project on top of these.
pub const DEFAULT_BUDGET_FIELDS: &[&str] = &[
    "Equipment",
    "Manpower",
    "Consumables",
    "Travel",
    "Contingency",
    "Overheads",
];

// Global state definitions
lazy_static! {
    static ref INIT_MUTEX: tokio::sync::Mutex<()> = tokio::sync::Mutex::new(());
    static ref INITIALIZED: AtomicBool = AtomicBool::new(false);

    static ref DB_POOL: Mutex<Option<SqlitePool>> = Mutex::new(None);

    // Core services
    static ref DEPENDENCY_CHECKER: Mutex<Option<Arc<dyn DependencyChecker>>> = Mutex::new(None);

    // Repositories
    static ref PROJECT_REPO: Mutex<Option<Arc<dyn ProjectRepository>>> = Mutex::new(None);
    static ref FIELD_REPO: Mutex<Option<Arc<dyn BudgetFieldRepository>>> = Mutex::new(None);
    static ref BUDGET_REPO: Mutex<Option<Arc<dyn BudgetRepository>>> = Mutex::new(None);
    static ref GRANT_REPO: Mutex<Option<Arc<dyn GrantRepository>>> = Mutex::new(None);
    static ref EXPENDITURE_REPO: Mutex<Option<Arc<dyn ExpenditureRepository>>> = Mutex::new(None);

    // Services
    static ref PROJECT_SERVICE: Mutex<Option<Arc<dyn ProjectService>>> = Mutex::new(None);
    static ref FIELD_SERVICE: Mutex<Option<Arc<dyn BudgetFieldService>>> = Mutex::new(None);
    static ref BUDGET_SERVICE: Mutex<Option<Arc<dyn BudgetService>>> = Mutex::new(None);
    static ref GRANT_SERVICE: Mutex<Option<Arc<dyn GrantService>>> = Mutex::new(None);
    static ref EXPENDITURE_SERVICE: Mutex<Option<Arc<dyn ExpenditureService>>> = Mutex::new(None);
    static ref RECONCILIATION_SERVICE: Mutex<Option<Arc<dyn ReconciliationService>>> = Mutex::new(None);
}

// --- Getter functions ---

fn get_from<T: Clone>(
    slot: &Mutex<Option<T>>,
    name: &str,
) -> ServiceResult<T> {
    slot.lock()
        .map_err(|_| ServiceError::Configuration(format!("{} lock poisoned", name)))?
        .clone()
        .ok_or_else(|| ServiceError::Configuration(format!("{} not initialized", name)))
}

pub fn get_db_pool() -> ServiceResult<SqlitePool> {
    get_from(&DB_POOL, "DB_POOL")
}

pub fn get_dependency_checker() -> ServiceResult<Arc<dyn DependencyChecker>> {
    get_from(&DEPENDENCY_CHECKER, "DEPENDENCY_CHECKER")
}

pub fn get_project_repo() -> ServiceResult<Arc<dyn ProjectRepository>> {
    get_from(&PROJECT_REPO, "PROJECT_REPO")
}

pub fn get_field_repo() -> ServiceResult<Arc<dyn BudgetFieldRepository>> {
    get_from(&FIELD_REPO, "FIELD_REPO")
}

pub fn get_budget_repo() -> ServiceResult<Arc<dyn BudgetRepository>> {
    get_from(&BUDGET_REPO, "BUDGET_REPO")
}

pub fn get_grant_repo() -> ServiceResult<Arc<dyn GrantRepository>> {
    get_from(&GRANT_REPO, "GRANT_REPO")
}

pub fn get_expenditure_repo() -> ServiceResult<Arc<dyn ExpenditureRepository>> {
    get_from(&EXPENDITURE_REPO, "EXPENDITURE_REPO")
}

pub fn get_project_service() -> ServiceResult<Arc<dyn ProjectService>> {
    get_from(&PROJECT_SERVICE, "PROJECT_SERVICE")
}

pub fn get_field_service() -> ServiceResult<Arc<dyn BudgetFieldService>> {
    get_from(&FIELD_SERVICE, "FIELD_SERVICE")
}

pub fn get_budget_service() -> ServiceResult<Arc<dyn BudgetService>> {
    get_from(&BUDGET_SERVICE, "BUDGET_SERVICE")
}

pub fn get_grant_service() -> ServiceResult<Arc<dyn GrantService>> {
    get_from(&GRANT_SERVICE, "GRANT_SERVICE")
}

pub fn get_expenditure_service() -> ServiceResult<Arc<dyn ExpenditureService>> {
    get_from(&EXPENDITURE_SERVICE, "EXPENDITURE_SERVICE")
}

pub fn get_reconciliation_service() -> ServiceResult<Arc<dyn ReconciliationService>> {
    get_from(&RECONCILIATION_SERVICE, "RECONCILIATION_SERVICE")
}

/// Initialize global services
pub async fn initialize(db_url: &str) -> ServiceResult<()> {
    // Acquire the async mutex to ensure single initialization
    let _guard = INIT_MUTEX.lock().await;

    if INITIALIZED.load(Ordering::Acquire) {
        return Ok(());
    }

    let result = initialize_internal(db_url).await;

    // Mark as initialized only if successful
    if result.is_ok() {
        INITIALIZED.store(true, Ordering::Release);
    }

    result
}

async fn initialize_internal(db_url: &str) -> ServiceResult<()> {
    // Initialize logging first
    if std::env::var("RUST_LOG").is_err() {
        #[cfg(debug_assertions)]
        std::env::set_var("RUST_LOG", "debug");
        #[cfg(not(debug_assertions))]
        std::env::set_var("RUST_LOG", "info");
    }
    let _ = env_logger::try_init();

    log::info!("starting initialization");
    log::debug!("database url: {}", db_url);

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .map_err(|e| ServiceError::Configuration(format!("Database connection failed: {}", e)))?;

    *DB_POOL
        .lock()
        .map_err(|_| ServiceError::Configuration("DB_POOL lock poisoned".to_string()))? =
        Some(pool.clone());

    // Migrations run before any service is constructed
    crate::db_migration::run_migrations(&pool)
        .await
        .map_err(|e| ServiceError::Configuration(format!("Database migration failed: {}", e)))?;

    // Core services
    let dependency_checker: Arc<dyn DependencyChecker> =
        Arc::new(SqliteDependencyChecker::new(pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Repositories
    let project_repo: Arc<dyn ProjectRepository> =
        Arc::new(SqliteProjectRepository::new(pool.clone()));
    let field_repo: Arc<dyn BudgetFieldRepository> =
        Arc::new(SqliteBudgetFieldRepository::new(pool.clone()));
    let budget_repo: Arc<dyn BudgetRepository> =
        Arc::new(SqliteBudgetRepository::new(pool.clone()));
    let grant_repo: Arc<dyn GrantRepository> = Arc::new(SqliteGrantRepository::new(pool.clone()));
    let expenditure_repo: Arc<dyn ExpenditureRepository> =
        Arc::new(SqliteExpenditureRepository::new(pool.clone()));

    // Ensure the shared lookup data exists before serving requests
    field_repo
        .seed_default_fields(DEFAULT_BUDGET_FIELDS)
        .await
        .map_err(|e| ServiceError::Configuration(format!("Default field seeding failed: {}", e)))?;
    log::debug!("default budget fields verified");

    // Services
    let project_service: Arc<dyn ProjectService> = Arc::new(ProjectServiceImpl::new(
        project_repo.clone(),
        clock.clone(),
    ));
    let field_service: Arc<dyn BudgetFieldService> = Arc::new(BudgetFieldServiceImpl::new(
        pool.clone(),
        field_repo.clone(),
        dependency_checker.clone(),
    ));
    let budget_service: Arc<dyn BudgetService> = Arc::new(BudgetServiceImpl::new(
        pool.clone(),
        budget_repo.clone(),
        project_repo.clone(),
        field_repo.clone(),
    ));
    let grant_service: Arc<dyn GrantService> = Arc::new(GrantServiceImpl::new(
        pool.clone(),
        grant_repo.clone(),
        field_repo.clone(),
    ));
    let expenditure_service: Arc<dyn ExpenditureService> = Arc::new(ExpenditureServiceImpl::new(
        pool.clone(),
        expenditure_repo.clone(),
        project_repo.clone(),
        field_repo.clone(),
    ));
    let reconciliation_service: Arc<dyn ReconciliationService> =
        Arc::new(ReconciliationServiceImpl::new(
            project_repo.clone(),
            field_repo.clone(),
            budget_repo.clone(),
            grant_repo.clone(),
            expenditure_repo.clone(),
        ));

    // Store everything
    let store = |err: &str| ServiceError::Configuration(format!("{} lock poisoned", err));
    *DEPENDENCY_CHECKER.lock().map_err(|_| store("DEPENDENCY_CHECKER"))? = Some(dependency_checker);
    *PROJECT_REPO.lock().map_err(|_| store("PROJECT_REPO"))? = Some(project_repo);
    *FIELD_REPO.lock().map_err(|_| store("FIELD_REPO"))? = Some(field_repo);
    *BUDGET_REPO.lock().map_err(|_| store("BUDGET_REPO"))? = Some(budget_repo);
    *GRANT_REPO.lock().map_err(|_| store("GRANT_REPO"))? = Some(grant_repo);
    *EXPENDITURE_REPO.lock().map_err(|_| store("EXPENDITURE_REPO"))? = Some(expenditure_repo);
    *PROJECT_SERVICE.lock().map_err(|_| store("PROJECT_SERVICE"))? = Some(project_service);
    *FIELD_SERVICE.lock().map_err(|_| store("FIELD_SERVICE"))? = Some(field_service);
    *BUDGET_SERVICE.lock().map_err(|_| store("BUDGET_SERVICE"))? = Some(budget_service);
    *GRANT_SERVICE.lock().map_err(|_| store("GRANT_SERVICE"))? = Some(grant_service);
    *EXPENDITURE_SERVICE.lock().map_err(|_| store("EXPENDITURE_SERVICE"))? = Some(expenditure_service);
    *RECONCILIATION_SERVICE.lock().map_err(|_| store("RECONCILIATION_SERVICE"))? = Some(reconciliation_service);

    log::info!("initialization complete");
    Ok(())
}
