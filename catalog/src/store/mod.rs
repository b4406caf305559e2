pub mod sqlite_store;

use reservation::model::KindId;

use crate::model::ResourceKind;

#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    async fn upsert(&self, kind: &ResourceKind) -> anyhow::Result<()>;
    async fn get(&self, kind: &KindId) -> anyhow::Result<Option<ResourceKind>>;
    async fn list_active(&self) -> anyhow::Result<Vec<ResourceKind>>;
    async fn list_all(&self) -> anyhow::Result<Vec<ResourceKind>>;

    /// Flip the active flag. Returns whether the kind existed.
    async fn set_active(&self, kind: &KindId, active: bool) -> anyhow::Result<bool>;

    /// Remove the kind row itself. Reservations are the caller's problem
    /// (cascade lives in the service layer).
    async fn delete(&self, kind: &KindId) -> anyhow::Result<bool>;
}
