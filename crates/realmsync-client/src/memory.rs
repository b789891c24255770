//! In-memory [`ResourceClient`] used by tests and dry runs.
//!
//! Behaves like the real admin API where it matters to the engine:
//! write-only field values are held in a side store that `list` never
//! returns, internal ids are server-assigned uuids, and the separate
//! read-back path is honored only for kinds that declare one. Every call is
//! recorded in an operation log so tests can assert ordering and the
//! digest fast path (no calls at all).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use realmsync_core::{KindRegistry, LiveResource, ResourceConfig};

use crate::error::{ClientError, Result};
use crate::traits::ResourceClient;

#[derive(Debug, Clone)]
struct StoredResource {
    internal_id: String,
    identity: String,
    fields: IndexMap<String, Value>,
    write_only: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default)]
struct RealmState {
    attributes: IndexMap<String, Value>,
    resources: HashMap<String, Vec<StoredResource>>,
}

#[derive(Debug, Default)]
pub struct InMemoryResourceClient {
    registry: Arc<KindRegistry>,
    state: RwLock<HashMap<String, RealmState>>,
    log: Mutex<Vec<String>>,
    fail_on: Mutex<Option<(String, String)>>,
}

impl InMemoryResourceClient {
    pub fn new(registry: Arc<KindRegistry>) -> Self {
        Self {
            registry,
            state: RwLock::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
        }
    }

    /// Snapshot of every call made so far, in order.
    pub async fn call_log(&self) -> Vec<String> {
        self.log.lock().await.clone()
    }

    /// Mutating calls only (create/update/delete), for ordering assertions.
    pub async fn apply_log(&self) -> Vec<String> {
        self.log
            .lock()
            .await
            .iter()
            .filter(|entry| {
                entry.starts_with("create ")
                    || entry.starts_with("update ")
                    || entry.starts_with("delete ")
            })
            .cloned()
            .collect()
    }

    pub async fn clear_log(&self) {
        self.log.lock().await.clear();
    }

    /// Makes the next mutating call against `kind`/`identity` fail with an
    /// API error, then clears itself.
    pub async fn fail_once_on(&self, kind: &str, identity: &str) {
        *self.fail_on.lock().await = Some((kind.to_string(), identity.to_string()));
    }

    async fn record(&self, entry: String) {
        self.log.lock().await.push(entry);
    }

    async fn check_failure(&self, kind: &str, identity: &str) -> Result<()> {
        let mut fail_on = self.fail_on.lock().await;
        if let Some((k, i)) = fail_on.as_ref()
            && k == kind
            && i == identity
        {
            *fail_on = None;
            return Err(ClientError::api(500, format!("injected failure for {kind}/{identity}")));
        }
        Ok(())
    }

    fn split_write_only(
        &self,
        kind: &str,
        fields: &IndexMap<String, Value>,
    ) -> (IndexMap<String, Value>, IndexMap<String, Value>) {
        let descriptor = self.registry.get(kind);
        let mut regular = IndexMap::new();
        let mut write_only = IndexMap::new();
        for (name, value) in fields {
            let is_secret = descriptor.map(|d| d.is_write_only(name)).unwrap_or(false);
            if is_secret {
                write_only.insert(name.clone(), value.clone());
            } else {
                regular.insert(name.clone(), value.clone());
            }
        }
        (regular, write_only)
    }
}

#[async_trait]
impl ResourceClient for InMemoryResourceClient {
    async fn get_realm(&self, realm: &str) -> Result<Option<IndexMap<String, Value>>> {
        self.record(format!("get_realm {realm}")).await;
        Ok(self
            .state
            .read()
            .await
            .get(realm)
            .map(|state| state.attributes.clone()))
    }

    async fn create_realm(&self, realm: &str, attributes: &IndexMap<String, Value>) -> Result<()> {
        self.record(format!("create realm/{realm}")).await;
        self.check_failure("realm", realm).await?;
        let mut state = self.state.write().await;
        if state.contains_key(realm) {
            return Err(ClientError::api(409, format!("realm {realm} already exists")));
        }
        state.insert(
            realm.to_string(),
            RealmState {
                attributes: attributes.clone(),
                resources: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn update_realm(&self, realm: &str, changes: &IndexMap<String, Value>) -> Result<()> {
        self.record(format!("update realm/{realm}")).await;
        self.check_failure("realm", realm).await?;
        let mut state = self.state.write().await;
        let realm_state = state
            .get_mut(realm)
            .ok_or_else(|| ClientError::not_found(format!("realm {realm}")))?;
        for (name, value) in changes {
            realm_state.attributes.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete_realm(&self, realm: &str) -> Result<()> {
        self.record(format!("delete realm/{realm}")).await;
        self.state
            .write()
            .await
            .remove(realm)
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(format!("realm {realm}")))
    }

    async fn list(&self, realm: &str, kind: &str) -> Result<Vec<LiveResource>> {
        self.record(format!("list {realm}/{kind}")).await;
        let state = self.state.read().await;
        let realm_state = state
            .get(realm)
            .ok_or_else(|| ClientError::not_found(format!("realm {realm}")))?;
        Ok(realm_state
            .resources
            .get(kind)
            .map(|stored| {
                stored
                    .iter()
                    .map(|r| LiveResource {
                        internal_id: r.internal_id.clone(),
                        identity: r.identity.clone(),
                        // Write-only values deliberately stay behind.
                        fields: r.fields.clone(),
                        write_only: IndexMap::new(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(&self, realm: &str, kind: &str, resource: &ResourceConfig) -> Result<String> {
        self.record(format!("create {kind}/{}", resource.identity)).await;
        self.check_failure(kind, &resource.identity).await?;

        let (fields, write_only) = self.split_write_only(kind, &resource.fields);
        let mut state = self.state.write().await;
        let realm_state = state
            .get_mut(realm)
            .ok_or_else(|| ClientError::not_found(format!("realm {realm}")))?;
        let list = realm_state.resources.entry(kind.to_string()).or_default();
        if list.iter().any(|r| r.identity == resource.identity) {
            return Err(ClientError::api(
                409,
                format!("{kind}/{} already exists", resource.identity),
            ));
        }

        let internal_id = Uuid::new_v4().to_string();
        list.push(StoredResource {
            internal_id: internal_id.clone(),
            identity: resource.identity.clone(),
            fields,
            write_only,
        });
        Ok(internal_id)
    }

    async fn update(
        &self,
        realm: &str,
        kind: &str,
        internal_id: &str,
        changes: &IndexMap<String, Value>,
    ) -> Result<()> {
        let identity = {
            let state = self.state.read().await;
            state
                .get(realm)
                .and_then(|rs| rs.resources.get(kind))
                .and_then(|list| list.iter().find(|r| r.internal_id == internal_id))
                .map(|r| r.identity.clone())
                .ok_or_else(|| ClientError::not_found(format!("{kind}/{internal_id}")))?
        };
        self.record(format!("update {kind}/{identity}")).await;
        self.check_failure(kind, &identity).await?;

        let descriptor = self.registry.get(kind).cloned();
        let mut state = self.state.write().await;
        let stored = state
            .get_mut(realm)
            .and_then(|rs| rs.resources.get_mut(kind))
            .and_then(|list| list.iter_mut().find(|r| r.internal_id == internal_id))
            .ok_or_else(|| ClientError::not_found(format!("{kind}/{internal_id}")))?;
        for (name, value) in changes {
            let is_secret = descriptor
                .as_ref()
                .map(|d| d.is_write_only(name))
                .unwrap_or(false);
            if is_secret {
                stored.write_only.insert(name.clone(), value.clone());
            } else {
                stored.fields.insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, realm: &str, kind: &str, internal_id: &str) -> Result<()> {
        let identity = {
            let state = self.state.read().await;
            state
                .get(realm)
                .and_then(|rs| rs.resources.get(kind))
                .and_then(|list| list.iter().find(|r| r.internal_id == internal_id))
                .map(|r| r.identity.clone())
                .ok_or_else(|| ClientError::not_found(format!("{kind}/{internal_id}")))?
        };
        self.record(format!("delete {kind}/{identity}")).await;
        self.check_failure(kind, &identity).await?;

        let mut state = self.state.write().await;
        let list = state
            .get_mut(realm)
            .and_then(|rs| rs.resources.get_mut(kind))
            .ok_or_else(|| ClientError::not_found(format!("{kind}/{internal_id}")))?;
        list.retain(|r| r.internal_id != internal_id);
        Ok(())
    }

    async fn read_write_only_field(
        &self,
        realm: &str,
        kind: &str,
        internal_id: &str,
        field: &str,
    ) -> Result<Option<Value>> {
        self.record(format!("read_write_only {kind}/{internal_id}/{field}")).await;
        let descriptor = self
            .registry
            .get(kind)
            .ok_or_else(|| ClientError::not_found(format!("resource kind {kind}")))?;
        if descriptor.write_only_read_path.is_none() {
            return Err(ClientError::unsupported(kind, field));
        }
        let state = self.state.read().await;
        let stored = state
            .get(realm)
            .and_then(|rs| rs.resources.get(kind))
            .and_then(|list| list.iter().find(|r| r.internal_id == internal_id))
            .ok_or_else(|| ClientError::not_found(format!("{kind}/{internal_id}")))?;
        Ok(stored.write_only.get(field).cloned())
    }
}
