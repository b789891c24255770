//! State fetcher: pulls the live representation of a realm and its
//! sub-resources, normalized into the same tree shape as a snapshot.

use tracing::debug;

use realmsync_client::ResourceClient;
use realmsync_core::{KindRegistry, LiveRealm, RealmConfig};

use crate::error::Result;

/// Fetches live state for every kind the desired config mentions (and every
/// registered kind when prune mode is on, since unmanaged kinds may hold
/// resources to delete).
///
/// Returns `None` when the realm does not exist yet. For kinds with a
/// write-only read-back path, the live values are retrieved for exactly the
/// resources whose desired counterpart re-specifies the field, so the differ
/// can tell an unchanged secret from a changed one.
pub async fn fetch_live(
    client: &dyn ResourceClient,
    registry: &KindRegistry,
    desired: &RealmConfig,
    prune: bool,
) -> Result<Option<LiveRealm>> {
    let Some(attributes) = client.get_realm(&desired.realm).await? else {
        debug!(realm = %desired.realm, "realm does not exist yet");
        return Ok(None);
    };

    let mut live = LiveRealm::new(&desired.realm);
    live.attributes = attributes;

    let kinds: Vec<&str> = if prune {
        registry.names().collect()
    } else {
        desired
            .resources
            .keys()
            .map(String::as_str)
            .filter(|kind| registry.get(kind).is_some())
            .collect()
    };

    for kind in kinds {
        let mut resources = client.list(&desired.realm, kind).await?;
        debug!(realm = %desired.realm, kind, count = resources.len(), "fetched live resources");

        let descriptor = match registry.get(kind) {
            Some(descriptor) => descriptor,
            None => {
                live.resources.insert(kind.to_string(), resources);
                continue;
            }
        };

        if descriptor.write_only_read_path.is_some() {
            for resource in &mut resources {
                let Some(desired_resource) = desired
                    .resources_of(kind)
                    .iter()
                    .find(|d| d.identity == resource.identity)
                else {
                    continue;
                };
                for field in &descriptor.write_only_fields {
                    if desired_resource.get_field(field).is_none() {
                        continue;
                    }
                    let value = client
                        .read_write_only_field(&desired.realm, kind, &resource.internal_id, field)
                        .await?;
                    if let Some(value) = value {
                        resource.write_only.insert(field.clone(), value);
                    }
                }
            }
        }

        live.resources.insert(kind.to_string(), resources);
    }

    Ok(Some(live))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use realmsync_client::InMemoryResourceClient;
    use realmsync_core::ResourceConfig;

    fn registry() -> Arc<KindRegistry> {
        Arc::new(KindRegistry::builtin())
    }

    async fn seeded_client(registry: Arc<KindRegistry>) -> InMemoryResourceClient {
        let client = InMemoryResourceClient::new(registry);
        client
            .create_realm("acme", &Default::default())
            .await
            .unwrap();
        client
            .create(
                "acme",
                "clients",
                &ResourceConfig::new("web-app")
                    .with_field("clientId", json!("web-app"))
                    .with_field("secret", json!("s1")),
            )
            .await
            .unwrap();
        client
    }

    #[tokio::test]
    async fn test_missing_realm_fetches_none() {
        let registry = registry();
        let client = InMemoryResourceClient::new(registry.clone());
        let desired = RealmConfig::new("acme");

        let live = fetch_live(&client, &registry, &desired, false).await.unwrap();
        assert!(live.is_none());
    }

    #[tokio::test]
    async fn test_fetch_only_desired_kinds_without_prune() {
        let registry = registry();
        let client = seeded_client(registry.clone()).await;
        client.clear_log().await;

        let desired = RealmConfig::new("acme")
            .with_resources("clients", vec![ResourceConfig::new("web-app")]);
        let live = fetch_live(&client, &registry, &desired, false)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(live.resources_of("clients").len(), 1);
        let log = client.call_log().await;
        assert!(log.contains(&"list acme/clients".to_string()));
        assert!(!log.iter().any(|entry| entry == "list acme/roles"));
    }

    #[tokio::test]
    async fn test_prune_fetches_all_registered_kinds() {
        let registry = registry();
        let client = seeded_client(registry.clone()).await;
        client.clear_log().await;

        let desired = RealmConfig::new("acme");
        fetch_live(&client, &registry, &desired, true).await.unwrap();

        let log = client.call_log().await;
        for kind in ["clients", "roles", "clientScopes"] {
            assert!(log.contains(&format!("list acme/{kind}")), "missing list of {kind}");
        }
    }

    #[tokio::test]
    async fn test_write_only_read_back_only_when_respecified() {
        let registry = registry();
        let client = seeded_client(registry.clone()).await;
        client.clear_log().await;

        // Desired does not mention the secret: no read-back call.
        let desired = RealmConfig::new("acme")
            .with_resources("clients", vec![ResourceConfig::new("web-app")]);
        let live = fetch_live(&client, &registry, &desired, false)
            .await
            .unwrap()
            .unwrap();
        assert!(live.resources_of("clients")[0].write_only.is_empty());
        assert!(
            !client
                .call_log()
                .await
                .iter()
                .any(|entry| entry.starts_with("read_write_only"))
        );

        // Desired re-specifies the secret: value comes back via the side path.
        let desired = RealmConfig::new("acme").with_resources(
            "clients",
            vec![ResourceConfig::new("web-app").with_field("secret", json!("s1"))],
        );
        let live = fetch_live(&client, &registry, &desired, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            live.resources_of("clients")[0].write_only.get("secret"),
            Some(&json!("s1"))
        );
    }
}
