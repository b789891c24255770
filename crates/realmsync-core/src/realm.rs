use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Desired state of one realm, built fresh from a single snapshot document.
///
/// `attributes` holds realm-level settings; `resources` maps a resource-kind
/// name to the desired resources of that kind, in document order. Field
/// payloads are opaque JSON beyond identity keys and declared write-only
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmConfig {
    pub realm: String,
    pub enabled: bool,
    #[serde(default)]
    pub attributes: IndexMap<String, Value>,
    #[serde(default)]
    pub resources: IndexMap<String, Vec<ResourceConfig>>,
}

impl RealmConfig {
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            enabled: true,
            attributes: IndexMap::new(),
            resources: IndexMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_resources(mut self, kind: impl Into<String>, list: Vec<ResourceConfig>) -> Self {
        self.resources.insert(kind.into(), list);
        self
    }

    pub fn resources_of(&self, kind: &str) -> &[ResourceConfig] {
        self.resources.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// One desired resource instance of some kind within a realm.
///
/// `fields` is the full desired payload, including the identity field and any
/// write-only fields the document carries. `identity` is the extracted value
/// of the kind's identity field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub identity: String,
    #[serde(default)]
    pub fields: IndexMap<String, Value>,
}

impl ResourceConfig {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn get_field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Live representation of a realm, freshly fetched from the server.
///
/// Structurally the same tree shape as [`RealmConfig`], but write-only field
/// values are never present in `fields` and every resource carries the
/// server-assigned internal id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveRealm {
    pub realm: String,
    pub attributes: IndexMap<String, Value>,
    pub resources: IndexMap<String, Vec<LiveResource>>,
}

impl LiveRealm {
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            attributes: IndexMap::new(),
            resources: IndexMap::new(),
        }
    }

    pub fn resources_of(&self, kind: &str) -> &[LiveResource] {
        self.resources.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find(&self, kind: &str, identity: &str) -> Option<&LiveResource> {
        self.resources_of(kind).iter().find(|r| r.identity == identity)
    }
}

/// Live representation of one resource instance.
///
/// `internal_id` is the server-assigned opaque id, distinct from the identity
/// key and required for update/delete calls. `write_only` holds values
/// retrieved through the separate read-back path (where one exists); the
/// standard read never includes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveResource {
    pub internal_id: String,
    pub identity: String,
    pub fields: IndexMap<String, Value>,
    pub write_only: IndexMap<String, Value>,
}

impl LiveResource {
    pub fn new(internal_id: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            internal_id: internal_id.into(),
            identity: identity.into(),
            fields: IndexMap::new(),
            write_only: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn with_write_only(mut self, key: impl Into<String>, value: Value) -> Self {
        self.write_only.insert(key.into(), value);
        self
    }
}
