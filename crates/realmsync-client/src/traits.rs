//! Client-side traits the reconciliation engine consumes.
//!
//! Both traits are object-safe and `Send + Sync` so the engine can hold them
//! behind `Arc<dyn ...>` and tests can substitute in-memory fakes.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use realmsync_core::{Checkpoint, LiveResource, ResourceConfig};

use crate::error::Result;

/// CRUD access to one live IAM server, kind by kind.
///
/// Transient transport failures are retried beneath this boundary; the
/// engine only sees the final outcome of each call.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    // ==================== Realm-level ====================

    /// Returns the realm's current attributes, or `None` when the realm does
    /// not exist.
    async fn get_realm(&self, realm: &str) -> Result<Option<IndexMap<String, Value>>>;

    async fn create_realm(&self, realm: &str, attributes: &IndexMap<String, Value>) -> Result<()>;

    /// Applies a partial attribute update to an existing realm.
    async fn update_realm(&self, realm: &str, changes: &IndexMap<String, Value>) -> Result<()>;

    async fn delete_realm(&self, realm: &str) -> Result<()>;

    // ==================== Resource kinds ====================

    /// Lists live resources of one kind. Write-only field values are never
    /// present in the returned field maps.
    async fn list(&self, realm: &str, kind: &str) -> Result<Vec<LiveResource>>;

    /// Creates a resource and returns the server-assigned internal id.
    /// Write-only fields are accepted here and never echoed back.
    async fn create(&self, realm: &str, kind: &str, resource: &ResourceConfig) -> Result<String>;

    /// Applies a partial field update to the resource with the given
    /// internal id.
    async fn update(
        &self,
        realm: &str,
        kind: &str,
        internal_id: &str,
        changes: &IndexMap<String, Value>,
    ) -> Result<()>;

    async fn delete(&self, realm: &str, kind: &str, internal_id: &str) -> Result<()>;

    /// Reads one write-only field back through its side path.
    ///
    /// This is a genuinely distinct server endpoint from `list` (e.g. a
    /// client's generated secret); returns `Ok(None)` when the resource has
    /// no value and `Err(Unsupported)` when the kind declares no read-back
    /// path for the field.
    async fn read_write_only_field(
        &self,
        realm: &str,
        kind: &str,
        internal_id: &str,
        field: &str,
    ) -> Result<Option<Value>>;
}

/// Persistence for the last-applied checkpoint per realm.
///
/// Single writer (the reconciler), read at the start of each realm run.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, realm: &str) -> Result<Option<Checkpoint>>;
    async fn put(&self, checkpoint: &Checkpoint) -> Result<()>;
}
