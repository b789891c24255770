//! Checkpoint store implementations.
//!
//! The reconciler is the single writer; both stores only need to guard
//! against concurrent readers in the same process.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

use realmsync_core::Checkpoint;

use crate::error::Result;
use crate::traits::CheckpointStore;

/// Process-local checkpoint store, mainly for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn get(&self, realm: &str) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(realm).cloned())
    }

    async fn put(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.realm.clone(), checkpoint.clone());
        Ok(())
    }
}

/// Checkpoint ledger persisted as a single JSON file mapping realm name to
/// checkpoint. Read-modify-write per put; a missing file reads as empty.
#[derive(Debug)]
pub struct FileCheckpointStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    async fn load(&self) -> Result<HashMap<String, Checkpoint>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn get(&self, realm: &str) -> Result<Option<Checkpoint>> {
        let _guard = self.lock.read().await;
        Ok(self.load().await?.remove(realm))
    }

    async fn put(&self, checkpoint: &Checkpoint) -> Result<()> {
        let _guard = self.lock.write().await;
        let mut all = self.load().await?;
        all.insert(checkpoint.realm.clone(), checkpoint.clone());
        let bytes = serde_json::to_vec_pretty(&all)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}
