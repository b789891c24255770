//! Content digest over a realm-configuration tree.
//!
//! The digest gates the reconciler's fast path: when a snapshot hashes to
//! the checkpointed digest, the whole fetch/diff/apply cycle is skipped.
//! Hashing goes through a canonical JSON rendering so that map-insertion
//! order never influences the result; fields a kind descriptor marks
//! volatile are left out.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::kind::KindRegistry;
use crate::realm::RealmConfig;

/// Deterministic, insertion-order-independent hash of a realm configuration.
pub fn digest(config: &RealmConfig, registry: &KindRegistry) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"realm\0");
    hasher.update(config.realm.as_bytes());
    hasher.update(b"\0enabled\0");
    hasher.update(if config.enabled { b"1" } else { b"0" });

    hasher.update(b"\0attributes\0");
    hash_object(&mut hasher, config.attributes.iter());

    // Kinds and resources sort by name/identity: the differ keys on
    // identity, so ordering inside a kind carries no meaning.
    let mut kinds: Vec<&String> = config.resources.keys().collect();
    kinds.sort();
    for kind in kinds {
        hasher.update(b"\0kind\0");
        hasher.update(kind.as_bytes());

        let volatile: &[String] = registry
            .get(kind)
            .map(|d| d.volatile_fields.as_slice())
            .unwrap_or(&[]);

        let mut resources: Vec<_> = config.resources_of(kind).iter().collect();
        resources.sort_by(|a, b| a.identity.cmp(&b.identity));
        for resource in resources {
            hasher.update(b"\0resource\0");
            hasher.update(resource.identity.as_bytes());
            hasher.update(b"\0");
            hash_object(
                &mut hasher,
                resource
                    .fields
                    .iter()
                    .filter(|(name, _)| !volatile.iter().any(|v| v == *name)),
            );
        }
    }

    hex::encode(hasher.finalize())
}

fn hash_object<'a>(hasher: &mut Sha256, fields: impl Iterator<Item = (&'a String, &'a Value)>) {
    let sorted: BTreeMap<&String, &Value> = fields.collect();
    for (name, value) in sorted {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(canonical_json(value).as_bytes());
        hasher.update(b"\0");
    }
}

/// Renders a JSON value with object keys sorted at every nesting level.
/// Array order is preserved; order significance is a diffing concern, not a
/// digest one.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let body: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).expect("string key serializes"),
                        canonical_json(v)
                    )
                })
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        other => serde_json::to_string(other).expect("scalar serializes"),
    }
}
