// Public modules
pub mod domains;
pub mod errors;
pub mod globals;
pub mod types;
pub mod validation;

// Private modules
mod db_migration;

/// Initialize the library with the given SQLite database URL.
/// This function must be called before any other function in the library.
pub async fn initialize(db_url: &str) -> errors::ServiceResult<()> {
    globals::initialize(db_url).await
}

/// Get a reference to the SQLite connection pool
/// This is primarily for internal use
pub fn get_db_pool() -> errors::ServiceResult<sqlx::SqlitePool> {
    globals::get_db_pool()
}
