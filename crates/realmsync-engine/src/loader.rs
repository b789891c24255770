//! Snapshot loader: pure parse and structural validation of one
//! desired-state document into a [`RealmConfig`]. No network access.

use indexmap::IndexMap;
use serde_json::Value;

use realmsync_core::{KindRegistry, RealmConfig, ResourceConfig};

use crate::error::{EngineError, Result};
use crate::source::RawDocument;

const REALM_FIELD: &str = "realm";
const ENABLED_FIELD: &str = "enabled";

/// Parses and validates a raw document.
///
/// Fails with `MalformedDocument` when the realm name is missing or empty,
/// a resource entry is structurally broken, its identity key is absent, or
/// identity keys repeat within a kind. Top-level keys that are not a
/// registered resource kind land in `attributes`.
pub fn load(document: &RawDocument, registry: &KindRegistry) -> Result<RealmConfig> {
    let malformed = |message: String| EngineError::malformed(&document.name, message);

    let object = document
        .body
        .as_object()
        .ok_or_else(|| malformed("document body is not a JSON object".to_string()))?;

    let realm = object
        .get(REALM_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("realm name is missing".to_string()))?;
    if realm.is_empty() {
        return Err(malformed("realm name is empty".to_string()));
    }

    let enabled = match object.get(ENABLED_FIELD) {
        None => true,
        Some(Value::Bool(enabled)) => *enabled,
        Some(other) => {
            return Err(malformed(format!(
                "enabled must be a boolean, got {other}"
            )));
        }
    };

    let mut config = RealmConfig::new(realm);
    config.enabled = enabled;

    for (key, value) in object {
        if key == REALM_FIELD || key == ENABLED_FIELD {
            continue;
        }
        match registry.get(key) {
            Some(descriptor) => {
                let entries = value.as_array().ok_or_else(|| {
                    malformed(format!("resource kind {key} must be an array"))
                })?;
                let mut resources = Vec::with_capacity(entries.len());
                for entry in entries {
                    let resource =
                        load_resource(&document.name, key, &descriptor.identity_field, entry)?;
                    if resources
                        .iter()
                        .any(|existing: &ResourceConfig| existing.identity == resource.identity)
                    {
                        return Err(malformed(format!(
                            "duplicate identity key {}/{}",
                            key, resource.identity
                        )));
                    }
                    resources.push(resource);
                }
                config.resources.insert(key.clone(), resources);
            }
            None => {
                config.attributes.insert(key.clone(), value.clone());
            }
        }
    }

    Ok(config)
}

fn load_resource(
    document: &str,
    kind: &str,
    identity_field: &str,
    entry: &Value,
) -> Result<ResourceConfig> {
    let object = entry.as_object().ok_or_else(|| {
        EngineError::malformed(document, format!("{kind} entry is not an object"))
    })?;

    let identity = object
        .get(identity_field)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            EngineError::malformed(
                document,
                format!("{kind} entry is missing identity field {identity_field}"),
            )
        })?;
    if identity.is_empty() {
        return Err(EngineError::malformed(
            document,
            format!("{kind} entry has empty identity field {identity_field}"),
        ));
    }

    let fields: IndexMap<String, Value> =
        object.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    Ok(ResourceConfig {
        identity: identity.to_string(),
        fields,
    })
}
