//! Reconciler: drives snapshots through load → digest → fetch → diff →
//! order → apply → checkpoint, strictly in source order.
//!
//! A later snapshot's diff is always computed against the live state left
//! behind by the earlier ones, never against earlier desired documents, so
//! the run halts at the first unrecoverable error instead of skipping ahead.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info};

use realmsync_client::{CheckpointStore, ClientError, ResourceClient};
use realmsync_core::{
    Checkpoint, KindRegistry, Operation, OperationKind, RealmConfig, REALM_KIND, ResourceConfig,
    digest::digest,
};

use crate::diff;
use crate::error::{EngineError, Result};
use crate::fetch;
use crate::loader;
use crate::order;
use crate::source::{DocumentSource, RawDocument};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Delete live resources the desired documents do not mention. Off by
    /// default: unmanaged resources are left untouched.
    pub prune: bool,
    /// Compute and report operations without applying or checkpointing.
    pub dry_run: bool,
}

/// Result of reconciling one snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotOutcome {
    pub document: String,
    pub realm: String,
    pub sequence_index: u64,
    pub digest: String,
    /// True when the digest matched the checkpoint and no server call was
    /// made.
    pub skipped: bool,
    /// The ordered operation plan (including noops) for applied snapshots.
    pub operations: Vec<Operation>,
}

impl SnapshotOutcome {
    /// Operations that actually mutate the server.
    pub fn applied_count(&self) -> usize {
        self.operations.iter().filter(|op| !op.is_noop()).count()
    }
}

/// Result of a full run over a document source.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub snapshots: Vec<SnapshotOutcome>,
}

impl RunReport {
    pub fn total_applied(&self) -> usize {
        self.snapshots.iter().map(SnapshotOutcome::applied_count).sum()
    }
}

pub struct Reconciler {
    client: Arc<dyn ResourceClient>,
    checkpoints: Arc<dyn CheckpointStore>,
    registry: Arc<KindRegistry>,
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        checkpoints: Arc<dyn CheckpointStore>,
        registry: Arc<KindRegistry>,
    ) -> Self {
        Self {
            client,
            checkpoints,
            registry,
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Processes every document the source yields, in order, halting on the
    /// first unrecoverable error.
    pub async fn run(&self, source: &mut dyn DocumentSource) -> Result<RunReport> {
        let mut report = RunReport::default();
        let mut sequence_index: u64 = 0;
        while let Some(document) = source.next().await? {
            let outcome = self.reconcile_snapshot(&document, sequence_index).await?;
            report.snapshots.push(outcome);
            sequence_index += 1;
        }
        Ok(report)
    }

    async fn reconcile_snapshot(
        &self,
        document: &RawDocument,
        sequence_index: u64,
    ) -> Result<SnapshotOutcome> {
        let config = loader::load(document, &self.registry)?;
        let digest = digest(&config, &self.registry);

        let checkpoint = self.checkpoints.get(&config.realm).await?;
        if checkpoint
            .as_ref()
            .is_some_and(|c| c.last_applied_digest == digest)
        {
            info!(
                realm = %config.realm,
                document = %document.name,
                "snapshot unchanged since last apply, skipping"
            );
            return Ok(SnapshotOutcome {
                document: document.name.clone(),
                realm: config.realm.clone(),
                sequence_index,
                digest,
                skipped: true,
                operations: Vec::new(),
            });
        }

        let live = fetch::fetch_live(
            self.client.as_ref(),
            &self.registry,
            &config,
            self.options.prune,
        )
        .await?;

        let mut operations = Vec::new();
        match &live {
            None => {
                operations.push(Operation::create(
                    REALM_KIND,
                    config.realm.clone(),
                    realm_payload(&config),
                ));
                for (kind, desired) in &config.resources {
                    let descriptor = self.registry.require(kind)?;
                    operations.extend(diff::diff_kind(descriptor, desired, &[], false));
                }
            }
            Some(live) => {
                operations.extend(diff::diff_realm_attributes(&config, live));
                let kinds: Vec<&str> = if self.options.prune {
                    self.registry.names().collect()
                } else {
                    config.resources.keys().map(String::as_str).collect()
                };
                for kind in kinds {
                    let descriptor = self.registry.require(kind)?;
                    let desired = config.resources_of(kind);
                    let live_resources = live.resources_of(kind);
                    if desired.is_empty() && live_resources.is_empty() {
                        continue;
                    }
                    operations.extend(diff::diff_kind(
                        descriptor,
                        desired,
                        live_resources,
                        self.options.prune,
                    ));
                }
            }
        }

        let operations = order::order(operations, &self.registry)?;
        info!(
            realm = %config.realm,
            document = %document.name,
            planned = operations.iter().filter(|op| !op.is_noop()).count(),
            noops = operations.iter().filter(|op| op.is_noop()).count(),
            dry_run = self.options.dry_run,
            "computed operation plan"
        );

        if !self.options.dry_run {
            self.apply(&config, sequence_index, &operations).await?;
            self.store_checkpoint(&config.realm, &digest, sequence_index, checkpoint)
                .await?;
        }

        Ok(SnapshotOutcome {
            document: document.name.clone(),
            realm: config.realm.clone(),
            sequence_index,
            digest,
            skipped: false,
            operations,
        })
    }

    async fn apply(
        &self,
        config: &RealmConfig,
        sequence_index: u64,
        operations: &[Operation],
    ) -> Result<()> {
        let mut applied = Vec::new();
        for operation in operations {
            if operation.is_noop() {
                continue;
            }
            debug!(realm = %config.realm, operation = %operation.describe(), "applying");
            match self.apply_one(&config.realm, operation).await {
                Ok(()) => applied.push(operation.describe()),
                Err(source) => {
                    return Err(EngineError::PartialApplyFailure {
                        realm: config.realm.clone(),
                        sequence_index,
                        applied,
                        failed: operation.describe(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    async fn apply_one(
        &self,
        realm: &str,
        operation: &Operation,
    ) -> std::result::Result<(), ClientError> {
        if operation.resource_kind == REALM_KIND {
            return match operation.kind {
                OperationKind::Create => {
                    self.client
                        .create_realm(realm, &operation.field_changes)
                        .await
                }
                OperationKind::Update => {
                    self.client
                        .update_realm(realm, &operation.field_changes)
                        .await
                }
                _ => Ok(()),
            };
        }
        match operation.kind {
            OperationKind::Create => {
                let resource = ResourceConfig {
                    identity: operation.identity.clone(),
                    fields: operation.field_changes.clone(),
                };
                self.client
                    .create(realm, &operation.resource_kind, &resource)
                    .await
                    .map(|_| ())
            }
            OperationKind::Update => {
                let internal_id = require_internal_id(operation)?;
                self.client
                    .update(
                        realm,
                        &operation.resource_kind,
                        internal_id,
                        &operation.field_changes,
                    )
                    .await
            }
            OperationKind::Delete => {
                let internal_id = require_internal_id(operation)?;
                self.client
                    .delete(realm, &operation.resource_kind, internal_id)
                    .await
            }
            OperationKind::NoOp => Ok(()),
        }
    }

    /// Persists the new checkpoint unless a stored one already sits at a
    /// higher sequence index (re-running an early snapshot of an advanced
    /// sequence must not regress the ledger).
    async fn store_checkpoint(
        &self,
        realm: &str,
        digest: &str,
        sequence_index: u64,
        existing: Option<Checkpoint>,
    ) -> Result<()> {
        if let Some(existing) = existing
            && existing.sequence_index > sequence_index
        {
            debug!(
                realm,
                stored = existing.sequence_index,
                current = sequence_index,
                "checkpoint already ahead, not regressing"
            );
            return Ok(());
        }
        self.checkpoints
            .put(&Checkpoint::new(realm, digest, sequence_index))
            .await?;
        Ok(())
    }
}

/// Realm attributes plus the enabled flag, as sent on realm creation.
fn realm_payload(config: &RealmConfig) -> IndexMap<String, Value> {
    let mut payload = IndexMap::new();
    payload.insert("enabled".to_string(), Value::Bool(config.enabled));
    for (name, value) in &config.attributes {
        payload.insert(name.clone(), value.clone());
    }
    payload
}

fn require_internal_id(operation: &Operation) -> std::result::Result<&str, ClientError> {
    operation.internal_id.as_deref().ok_or_else(|| {
        ClientError::not_found(format!("internal id for {}", operation.describe()))
    })
}
