use anyhow::Result;
use async_trait::async_trait;

use super::models::ResourceState;

/// Pluggable state backend trait.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Initialize the backend (create tables, record schema version).
    async fn initialize(&self) -> Result<()>;

    /// Get a resource by address.
    async fn get_resource(&self, address: &str) -> Result<Option<ResourceState>>;

    /// Insert or update a resource.
    async fn upsert_resource(&self, resource: &ResourceState) -> Result<()>;

    /// Delete a resource from state.
    async fn delete_resource(&self, address: &str) -> Result<()>;

    /// List all resources, ordered by address.
    async fn list_resources(&self) -> Result<Vec<ResourceState>>;

    /// Count resources in state.
    async fn count_resources(&self) -> Result<usize>;
}
