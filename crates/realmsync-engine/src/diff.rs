//! Resource differ: compares a desired subtree against the live subtree for
//! one resource kind and produces create/update/noop/delete operations.

use indexmap::IndexMap;
use serde_json::Value;

use realmsync_core::digest::canonical_json;
use realmsync_core::{
    KindDescriptor, ListSemantics, LiveRealm, LiveResource, Operation, RealmConfig, REALM_KIND,
    ResourceConfig,
};

/// Diffs realm-level attributes (including the enabled flag) and returns an
/// update operation on the reserved `realm` kind, or `None` when nothing
/// differs.
pub fn diff_realm_attributes(desired: &RealmConfig, live: &LiveRealm) -> Option<Operation> {
    let mut changes: IndexMap<String, Value> = IndexMap::new();

    let desired_enabled = Value::Bool(desired.enabled);
    if live.attributes.get("enabled") != Some(&desired_enabled) {
        changes.insert("enabled".to_string(), desired_enabled);
    }
    for (name, value) in &desired.attributes {
        if live.attributes.get(name) != Some(value) {
            changes.insert(name.clone(), value.clone());
        }
    }

    if changes.is_empty() {
        None
    } else {
        Some(Operation::update(
            REALM_KIND,
            desired.realm.clone(),
            desired.realm.clone(),
            changes,
        ))
    }
}

/// Diffs one resource kind, keyed by identity.
///
/// Live resources the desired state does not mention become deletes only in
/// prune mode; the default is non-destructive. A changed identity key is
/// indistinguishable from add-and-forget, so a rename surfaces as a create
/// of the new identity (plus, under prune, a delete of the old one).
pub fn diff_kind(
    descriptor: &KindDescriptor,
    desired: &[ResourceConfig],
    live: &[LiveResource],
    prune: bool,
) -> Vec<Operation> {
    let mut operations = Vec::new();

    for resource in desired {
        match live.iter().find(|l| l.identity == resource.identity) {
            None => {
                // Everything, write-only fields included, goes out on create.
                operations.push(Operation::create(
                    &descriptor.name,
                    &resource.identity,
                    resource.fields.clone(),
                ));
            }
            Some(live_resource) => {
                let changes = field_changes(descriptor, resource, live_resource);
                if changes.is_empty() {
                    operations.push(Operation::noop(
                        &descriptor.name,
                        &resource.identity,
                        Some(live_resource.internal_id.clone()),
                    ));
                } else {
                    operations.push(Operation::update(
                        &descriptor.name,
                        &resource.identity,
                        &live_resource.internal_id,
                        changes,
                    ));
                }
            }
        }
    }

    for live_resource in live {
        if desired.iter().any(|d| d.identity == live_resource.identity) {
            continue;
        }
        if prune {
            operations.push(Operation::delete(
                &descriptor.name,
                &live_resource.identity,
                &live_resource.internal_id,
            ));
        } else {
            operations.push(Operation::noop(
                &descriptor.name,
                &live_resource.identity,
                Some(live_resource.internal_id.clone()),
            ));
        }
    }

    operations
}

/// Computes the changed field subset for an update, never a full replace.
///
/// Write-only fields are never compared against the standard live fields
/// (the server does not return them there). A write-only field present in
/// desired is sent unless the read-back value proves it unchanged.
fn field_changes(
    descriptor: &KindDescriptor,
    desired: &ResourceConfig,
    live: &LiveResource,
) -> IndexMap<String, Value> {
    let mut changes = IndexMap::new();

    for (name, value) in &desired.fields {
        if descriptor.is_write_only(name) {
            match live.write_only.get(name) {
                Some(last_sent) if last_sent == value => {}
                _ => {
                    changes.insert(name.clone(), value.clone());
                }
            }
            continue;
        }

        let differs = match live.fields.get(name) {
            None => true,
            Some(live_value) => values_differ(value, live_value, descriptor.list_semantics(name)),
        };
        if differs {
            changes.insert(name.clone(), value.clone());
        }
    }

    changes
}

fn values_differ(desired: &Value, live: &Value, semantics: ListSemantics) -> bool {
    match (desired, live) {
        (Value::Array(a), Value::Array(b)) if semantics == ListSemantics::Set => {
            !same_as_sets(a, b)
        }
        _ => desired != live,
    }
}

/// Multiset comparison over canonical renderings, so element order and
/// object-key order inside elements do not count as differences.
fn same_as_sets(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a_keys: Vec<String> = a.iter().map(canonical_json).collect();
    let mut b_keys: Vec<String> = b.iter().map(canonical_json).collect();
    a_keys.sort();
    b_keys.sort();
    a_keys == b_keys
}
