use crate::errors::DomainResult;
use async_trait::async_trait;
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

/// Trait for finding entities by ID
#[async_trait]
pub trait FindById<T> {
    /// Find an entity by ID
    async fn find_by_id(&self, id: Uuid) -> DomainResult<T>;
}

/// Trait for entities that support hard deletion
#[async_trait]
pub trait HardDeletable {
    /// The name of the entity table in the database (for logging)
    fn entity_name(&self) -> &'static str;

    /// Hard delete an entity by ID (standalone)
    async fn hard_delete(&self, id: Uuid) -> DomainResult<()>;

    /// Hard delete an entity by ID within a transaction
    async fn hard_delete_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;
}
