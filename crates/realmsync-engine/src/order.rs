//! Dependency orderer: flattens per-kind operation lists into one sequence
//! that respects the registry's dependency graph.

use std::collections::{BTreeMap, BTreeSet};

use realmsync_core::{KindRegistry, Operation, OperationKind, REALM_KIND};

use crate::error::{EngineError, Result};

/// Orders operations across resource kinds.
///
/// Realm-level operations come first; creates/updates follow in topological
/// order of the kind dependency graph; deletes go last in reverse order so
/// dependents disappear before the resources they reference. Within a kind,
/// operations sort by identity key — same input, same output. A cycle in
/// the (configured) graph is a configuration bug and fails the run.
pub fn order(operations: Vec<Operation>, registry: &KindRegistry) -> Result<Vec<Operation>> {
    let mut realm_ops = Vec::new();
    let mut forward: BTreeMap<String, Vec<Operation>> = BTreeMap::new();
    let mut deletes: BTreeMap<String, Vec<Operation>> = BTreeMap::new();

    for operation in operations {
        if operation.resource_kind == REALM_KIND {
            realm_ops.push(operation);
        } else if operation.kind == OperationKind::Delete {
            deletes
                .entry(operation.resource_kind.clone())
                .or_default()
                .push(operation);
        } else {
            forward
                .entry(operation.resource_kind.clone())
                .or_default()
                .push(operation);
        }
    }

    let present: BTreeSet<String> = forward.keys().chain(deletes.keys()).cloned().collect();
    let present_refs: BTreeSet<&str> = present.iter().map(String::as_str).collect();
    let kind_order = topological_order(&present_refs, registry)?;

    let mut ordered = realm_ops;
    for kind in &kind_order {
        if let Some(mut ops) = forward.remove(*kind) {
            ops.sort_by(|a, b| a.identity.cmp(&b.identity));
            ordered.extend(ops);
        }
    }
    for kind in kind_order.iter().rev() {
        if let Some(mut ops) = deletes.remove(*kind) {
            ops.sort_by(|a, b| a.identity.cmp(&b.identity));
            ordered.extend(ops);
        }
    }
    Ok(ordered)
}

/// Kahn's algorithm over the kinds present in this operation set.
/// Dependencies on kinds with no pending operations are ignored; ties break
/// alphabetically to keep the output stable.
fn topological_order<'a>(
    present: &BTreeSet<&'a str>,
    registry: &KindRegistry,
) -> Result<Vec<&'a str>> {
    let mut in_degree: BTreeMap<&str, usize> = present.iter().map(|kind| (*kind, 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for kind in present {
        let Some(descriptor) = registry.get(kind) else {
            continue;
        };
        for dependency in &descriptor.depends_on {
            if let Some(dependency) = present.get(dependency.as_str()).copied() {
                *in_degree.get_mut(kind).expect("kind is present") += 1;
                dependents.entry(dependency).or_default().push(kind);
            }
        }
    }

    // BTreeSet keeps the ready set alphabetically sorted.
    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(kind, _)| *kind)
        .collect();
    let mut ordered = Vec::with_capacity(present.len());

    while let Some(kind) = ready.pop_first() {
        ordered.push(kind);
        for dependent in dependents.remove(kind).unwrap_or_default() {
            let degree = in_degree.get_mut(dependent).expect("kind is present");
            *degree -= 1;
            if *degree == 0 {
                ready.insert(dependent);
            }
        }
    }

    if ordered.len() != present.len() {
        let mut cycle: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(kind, _)| kind.to_string())
            .collect();
        cycle.sort();
        return Err(EngineError::DependencyCycle { kinds: cycle });
    }
    Ok(ordered)
}
