//! End-to-end reconciliation runs against the in-memory client.

use std::sync::Arc;

use serde_json::{Value, json};

use realmsync_client::{
    CheckpointStore, ClientError, InMemoryCheckpointStore, InMemoryResourceClient, ResourceClient,
};
use realmsync_core::{KindRegistry, OperationKind};
use realmsync_engine::{EngineError, ReconcileOptions, Reconciler, VecSource};

struct Harness {
    client: Arc<InMemoryResourceClient>,
    checkpoints: Arc<InMemoryCheckpointStore>,
    registry: Arc<KindRegistry>,
}

impl Harness {
    fn new() -> Self {
        let registry = Arc::new(KindRegistry::builtin());
        Self {
            client: Arc::new(InMemoryResourceClient::new(registry.clone())),
            checkpoints: Arc::new(InMemoryCheckpointStore::new()),
            registry,
        }
    }

    fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.client.clone(),
            self.checkpoints.clone(),
            self.registry.clone(),
        )
    }

    fn reconciler_with(&self, options: ReconcileOptions) -> Reconciler {
        self.reconciler().with_options(options)
    }

    async fn run(&self, bodies: Vec<Value>) -> realmsync_engine::RunReport {
        let mut source = VecSource::from_bodies(bodies);
        self.reconciler().run(&mut source).await.unwrap()
    }

    async fn internal_id(&self, realm: &str, kind: &str, identity: &str) -> String {
        self.client
            .list(realm, kind)
            .await
            .unwrap()
            .into_iter()
            .find(|live| live.identity == identity)
            .map(|live| live.internal_id)
            .unwrap_or_else(|| panic!("{kind}/{identity} not found"))
    }

    async fn secret_of(&self, realm: &str, identity: &str) -> Value {
        let id = self.internal_id(realm, "clients", identity).await;
        self.client
            .read_write_only_field(realm, "clients", &id, "secret")
            .await
            .unwrap()
            .expect("secret is set")
    }
}

fn snapshot_with_c1() -> Value {
    json!({
        "realm": "acme",
        "enabled": true,
        "clients": [
            {
                "clientId": "c1",
                "secret": "s1",
                "redirectUris": ["*"]
            }
        ]
    })
}

fn snapshot_with_c1_and_c2() -> Value {
    json!({
        "realm": "acme",
        "enabled": true,
        "clients": [
            {
                "clientId": "c1",
                "secret": "s1",
                "redirectUris": ["*"]
            },
            {
                "clientId": "c2",
                "secret": "s2"
            }
        ]
    })
}

#[tokio::test]
async fn scenario_a_create_then_noop_rerun() {
    let harness = Harness::new();

    let report = harness.run(vec![snapshot_with_c1()]).await;
    assert_eq!(report.snapshots.len(), 1);
    // Realm create plus one client create.
    assert_eq!(report.total_applied(), 2);

    let listed = harness.client.list("acme", "clients").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].identity, "c1");
    // The standard read never exposes the secret; the side path does.
    assert!(listed[0].fields.get("secret").is_none());
    assert_eq!(harness.secret_of("acme", "c1").await, json!("s1"));

    // Same snapshot again: digest matches the checkpoint, zero operations.
    let report = harness.run(vec![snapshot_with_c1()]).await;
    assert!(report.snapshots[0].skipped);
    assert_eq!(report.total_applied(), 0);
}

#[tokio::test]
async fn digest_skip_makes_no_server_calls() {
    let harness = Harness::new();
    harness.run(vec![snapshot_with_c1()]).await;

    harness.client.clear_log().await;
    let report = harness.run(vec![snapshot_with_c1()]).await;
    assert!(report.snapshots[0].skipped);
    assert!(harness.client.call_log().await.is_empty());
}

#[tokio::test]
async fn rerun_without_checkpoint_rediffs_to_noop() {
    let harness = Harness::new();
    harness.run(vec![snapshot_with_c1()]).await;

    // A fresh checkpoint store forces the full fetch/diff path; the live
    // state already matches, so every operation is a noop.
    let fresh = Reconciler::new(
        harness.client.clone(),
        Arc::new(InMemoryCheckpointStore::new()),
        harness.registry.clone(),
    );
    let mut source = VecSource::from_bodies(vec![snapshot_with_c1()]);
    let report = fresh.run(&mut source).await.unwrap();

    assert!(!report.snapshots[0].skipped);
    assert_eq!(report.total_applied(), 0);
    assert!(
        report.snapshots[0]
            .operations
            .iter()
            .all(|op| op.kind == OperationKind::NoOp)
    );
}

#[tokio::test]
async fn scenario_b_adding_client_touches_nothing_else() {
    let harness = Harness::new();
    let report = harness
        .run(vec![snapshot_with_c1(), snapshot_with_c1_and_c2()])
        .await;

    // Snapshot 1 creates exactly c2.
    let second = &report.snapshots[1];
    assert_eq!(second.applied_count(), 1);
    let create = second
        .operations
        .iter()
        .find(|op| op.kind == OperationKind::Create)
        .unwrap();
    assert_eq!(create.identity, "c2");

    assert_eq!(harness.secret_of("acme", "c1").await, json!("s1"));
    assert_eq!(harness.secret_of("acme", "c2").await, json!("s2"));
}

#[tokio::test]
async fn scenario_c_changed_properties_yield_single_update() {
    let harness = Harness::new();
    harness
        .run(vec![snapshot_with_c1(), snapshot_with_c1_and_c2()])
        .await;

    let changed = json!({
        "realm": "acme",
        "enabled": true,
        "clients": [
            {
                "clientId": "c1",
                "secret": "s1b",
                "redirectUris": ["https://x/redirect"]
            },
            {
                "clientId": "c2",
                "secret": "s2"
            }
        ]
    });
    let report = harness.run(vec![changed]).await;
    let outcome = &report.snapshots[0];
    assert_eq!(outcome.applied_count(), 1);

    let update = outcome
        .operations
        .iter()
        .find(|op| op.kind == OperationKind::Update)
        .unwrap();
    assert_eq!(update.identity, "c1");
    assert_eq!(
        update.field_changes["redirectUris"],
        json!(["https://x/redirect"])
    );
    assert_eq!(update.field_changes["secret"], json!("s1b"));

    // c2 re-specified its unchanged secret: noop, nothing re-sent.
    assert!(
        outcome
            .operations
            .iter()
            .any(|op| op.identity == "c2" && op.kind == OperationKind::NoOp)
    );

    let listed = harness.client.list("acme", "clients").await.unwrap();
    let c1 = listed.iter().find(|l| l.identity == "c1").unwrap();
    assert_eq!(c1.fields["redirectUris"], json!(["https://x/redirect"]));
    assert_eq!(harness.secret_of("acme", "c1").await, json!("s1b"));
    assert_eq!(harness.secret_of("acme", "c2").await, json!("s2"));
}

#[tokio::test]
async fn dependency_ordering_client_before_owned_role() {
    let harness = Harness::new();
    harness
        .run(vec![json!({
            "realm": "acme",
            "roles": [{"name": "fleet-admin"}],
            "clients": [{"clientId": "fleet"}]
        })])
        .await;

    let log = harness.client.apply_log().await;
    assert_eq!(
        log,
        vec![
            "create realm/acme",
            "create clients/fleet",
            "create roles/fleet-admin",
        ]
    );
}

#[tokio::test]
async fn omitted_resource_survives_by_default() {
    let harness = Harness::new();
    harness
        .run(vec![snapshot_with_c1(), snapshot_with_c1_and_c2()])
        .await;

    // c2 disappears from the desired document, but prune is off.
    let report = harness.run(vec![snapshot_with_c1()]).await;
    assert!(
        report.snapshots[0]
            .operations
            .iter()
            .all(|op| op.kind != OperationKind::Delete)
    );
    assert_eq!(harness.client.list("acme", "clients").await.unwrap().len(), 2);
}

#[tokio::test]
async fn prune_mode_deletes_unmanaged_resources() {
    let harness = Harness::new();
    harness
        .run(vec![snapshot_with_c1(), snapshot_with_c1_and_c2()])
        .await;

    let reconciler = harness.reconciler_with(ReconcileOptions {
        prune: true,
        dry_run: false,
    });
    let mut source = VecSource::from_bodies(vec![snapshot_with_c1()]);
    let report = reconciler.run(&mut source).await.unwrap();

    let deletes: Vec<_> = report.snapshots[0]
        .operations
        .iter()
        .filter(|op| op.kind == OperationKind::Delete)
        .collect();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].identity, "c2");

    let listed = harness.client.list("acme", "clients").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].identity, "c1");
}

#[tokio::test]
async fn partial_apply_failure_names_applied_and_failed() {
    let harness = Harness::new();
    harness.client.fail_once_on("clients", "b-client").await;

    let mut source = VecSource::from_bodies(vec![json!({
        "realm": "acme",
        "clients": [
            {"clientId": "b-client"},
            {"clientId": "a-client"}
        ]
    })]);
    let err = harness.reconciler().run(&mut source).await.unwrap_err();

    match err {
        EngineError::PartialApplyFailure {
            realm,
            sequence_index,
            applied,
            failed,
            source,
        } => {
            assert_eq!(realm, "acme");
            assert_eq!(sequence_index, 0);
            // Identity order: a-client landed before b-client failed.
            assert_eq!(applied, vec!["create realm/acme", "create clients/a-client"]);
            assert_eq!(failed, "create clients/b-client");
            assert!(matches!(source, ClientError::Api { status: 500, .. }));
        }
        other => panic!("expected PartialApplyFailure, got {other}"),
    }

    // No checkpoint was written; the retry picks up the missing client only.
    assert!(harness.checkpoints.get("acme").await.unwrap().is_none());
    let report = harness
        .run(vec![json!({
            "realm": "acme",
            "clients": [
                {"clientId": "b-client"},
                {"clientId": "a-client"}
            ]
        })])
        .await;
    assert_eq!(report.total_applied(), 1);
    assert_eq!(harness.client.list("acme", "clients").await.unwrap().len(), 2);
}

#[tokio::test]
async fn malformed_document_halts_before_any_server_call() {
    let harness = Harness::new();
    let mut source = VecSource::from_bodies(vec![
        json!({"enabled": true}),
        json!({"realm": "acme"}),
    ]);
    let err = harness.reconciler().run(&mut source).await.unwrap_err();

    assert!(matches!(err, EngineError::MalformedDocument { .. }));
    // The later, well-formed snapshot must not have been applied.
    assert!(harness.client.call_log().await.is_empty());
    assert!(harness.client.get_realm("acme").await.unwrap().is_none());
}

#[tokio::test]
async fn dry_run_plans_without_applying() {
    let harness = Harness::new();
    let reconciler = harness.reconciler_with(ReconcileOptions {
        prune: false,
        dry_run: true,
    });
    let mut source = VecSource::from_bodies(vec![snapshot_with_c1()]);
    let report = reconciler.run(&mut source).await.unwrap();

    assert_eq!(report.total_applied(), 2);
    assert!(harness.client.apply_log().await.is_empty());
    assert!(harness.client.get_realm("acme").await.unwrap().is_none());
    assert!(harness.checkpoints.get("acme").await.unwrap().is_none());
}

#[tokio::test]
async fn realm_attribute_change_updates_realm_only() {
    let harness = Harness::new();
    harness.run(vec![snapshot_with_c1()]).await;

    let report = harness
        .run(vec![json!({
            "realm": "acme",
            "enabled": true,
            "displayName": "ACME Corp",
            "clients": [
                {
                    "clientId": "c1",
                    "secret": "s1",
                    "redirectUris": ["*"]
                }
            ]
        })])
        .await;

    let outcome = &report.snapshots[0];
    assert_eq!(outcome.applied_count(), 1);
    let update = &outcome.operations[0];
    assert_eq!(update.resource_kind, "realm");
    assert_eq!(update.field_changes["displayName"], json!("ACME Corp"));

    let realm = harness.client.get_realm("acme").await.unwrap().unwrap();
    assert_eq!(realm["displayName"], json!("ACME Corp"));
}

#[tokio::test]
async fn checkpoint_advances_with_sequence() {
    let harness = Harness::new();
    harness
        .run(vec![snapshot_with_c1(), snapshot_with_c1_and_c2()])
        .await;

    let checkpoint = harness.checkpoints.get("acme").await.unwrap().unwrap();
    assert_eq!(checkpoint.sequence_index, 1);

    // Re-running the full sequence: snapshot 0 re-diffs (all noop) and must
    // not regress the checkpoint below index 1.
    harness
        .run(vec![snapshot_with_c1(), snapshot_with_c1_and_c2()])
        .await;
    let checkpoint = harness.checkpoints.get("acme").await.unwrap().unwrap();
    assert_eq!(checkpoint.sequence_index, 1);
}
