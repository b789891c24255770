use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a single reconciliation step does to one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Create,
    Update,
    NoOp,
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::NoOp => write!(f, "noop"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// One planned change against the live server.
///
/// For Create, `field_changes` is the full desired payload including
/// write-only fields. For Update it carries only the changed field subset,
/// never a full replace. `internal_id` is present for Update/Delete (and for
/// NoOp on an existing resource), absent for Create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub resource_kind: String,
    pub identity: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub field_changes: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
}

impl Operation {
    pub fn create(
        resource_kind: impl Into<String>,
        identity: impl Into<String>,
        fields: IndexMap<String, Value>,
    ) -> Self {
        Self {
            kind: OperationKind::Create,
            resource_kind: resource_kind.into(),
            identity: identity.into(),
            field_changes: fields,
            internal_id: None,
        }
    }

    pub fn update(
        resource_kind: impl Into<String>,
        identity: impl Into<String>,
        internal_id: impl Into<String>,
        changes: IndexMap<String, Value>,
    ) -> Self {
        Self {
            kind: OperationKind::Update,
            resource_kind: resource_kind.into(),
            identity: identity.into(),
            field_changes: changes,
            internal_id: Some(internal_id.into()),
        }
    }

    pub fn noop(
        resource_kind: impl Into<String>,
        identity: impl Into<String>,
        internal_id: Option<String>,
    ) -> Self {
        Self {
            kind: OperationKind::NoOp,
            resource_kind: resource_kind.into(),
            identity: identity.into(),
            field_changes: IndexMap::new(),
            internal_id,
        }
    }

    pub fn delete(
        resource_kind: impl Into<String>,
        identity: impl Into<String>,
        internal_id: impl Into<String>,
    ) -> Self {
        Self {
            kind: OperationKind::Delete,
            resource_kind: resource_kind.into(),
            identity: identity.into(),
            field_changes: IndexMap::new(),
            internal_id: Some(internal_id.into()),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.kind == OperationKind::NoOp
    }

    /// Short `kind resource-kind/identity` form used in logs and failure
    /// reports.
    pub fn describe(&self) -> String {
        format!("{} {}/{}", self.kind, self.resource_kind, self.identity)
    }
}
