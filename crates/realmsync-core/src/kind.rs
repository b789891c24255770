use indexmap::IndexMap;

use crate::error::{CoreError, Result};

/// Reserved kind name for realm-level settings operations.
///
/// Realm attributes are diffed like any other resource kind but are applied
/// through the realm-level client calls; every registered kind implicitly
/// depends on it.
pub const REALM_KIND: &str = "realm";

/// Comparison semantics for list-valued fields.
///
/// Declared per field, never inferred: most lists (redirect URIs, web
/// origins) are sets, while e.g. authentication-flow executions are
/// order-significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSemantics {
    Set,
    Sequence,
}

/// Data-driven description of one resource kind.
///
/// A kind is a registration, not a type: the descriptor names the document
/// key the kind appears under, the admin API path segment, the identity
/// field, write-only field names, which list fields are order-significant,
/// fields excluded from the content digest, and the kinds that must be
/// applied before this one.
#[derive(Debug, Clone)]
pub struct KindDescriptor {
    pub name: String,
    pub api_path: String,
    pub identity_field: String,
    pub write_only_fields: Vec<String>,
    /// Endpoint template for reading one write-only field back, relative to
    /// the kind path, with `{id}` standing for the internal id. `None` when
    /// the kind has no side read path.
    pub write_only_read_path: Option<String>,
    pub ordered_list_fields: Vec<String>,
    pub volatile_fields: Vec<String>,
    pub depends_on: Vec<String>,
}

impl KindDescriptor {
    pub fn new(
        name: impl Into<String>,
        api_path: impl Into<String>,
        identity_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_path: api_path.into(),
            identity_field: identity_field.into(),
            write_only_fields: Vec::new(),
            write_only_read_path: None,
            ordered_list_fields: Vec::new(),
            volatile_fields: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_write_only(mut self, fields: &[&str]) -> Self {
        self.write_only_fields = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_write_only_read_path(mut self, path: impl Into<String>) -> Self {
        self.write_only_read_path = Some(path.into());
        self
    }

    pub fn with_ordered_lists(mut self, fields: &[&str]) -> Self {
        self.ordered_list_fields = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_volatile(mut self, fields: &[&str]) -> Self {
        self.volatile_fields = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_depends_on(mut self, kinds: &[&str]) -> Self {
        self.depends_on = kinds.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn is_write_only(&self, field: &str) -> bool {
        self.write_only_fields.iter().any(|f| f == field)
    }

    pub fn list_semantics(&self, field: &str) -> ListSemantics {
        if self.ordered_list_fields.iter().any(|f| f == field) {
            ListSemantics::Sequence
        } else {
            ListSemantics::Set
        }
    }

    pub fn is_volatile(&self, field: &str) -> bool {
        self.volatile_fields.iter().any(|f| f == field)
    }
}

/// Registry of resource-kind descriptors, keyed by kind name.
///
/// Iteration order is registration order, which keeps log output and fetch
/// order deterministic.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: IndexMap<String, KindDescriptor>,
}

impl KindRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the builtin IAM resource kinds.
    ///
    /// Dependency edges follow ownership: client roles and client scopes
    /// reference clients, identity-provider mappers reference identity
    /// providers.
    pub fn builtin() -> Self {
        let mut registry = Self::default();

        let builtin = [
            KindDescriptor::new("clients", "clients", "clientId")
                .with_write_only(&["secret"])
                .with_write_only_read_path("clients/{id}/client-secret"),
            KindDescriptor::new("roles", "roles", "name").with_depends_on(&["clients"]),
            KindDescriptor::new("clientScopes", "client-scopes", "name")
                .with_depends_on(&["clients"]),
            KindDescriptor::new("identityProviders", "identity-provider/instances", "alias")
                .with_write_only(&["clientSecret"]),
            KindDescriptor::new(
                "identityProviderMappers",
                "identity-provider/mappers",
                "name",
            )
            .with_depends_on(&["identityProviders"]),
            KindDescriptor::new("authenticationFlows", "authentication/flows", "alias")
                .with_ordered_lists(&["authenticationExecutions"]),
        ];

        for descriptor in builtin {
            registry
                .register(descriptor)
                .expect("builtin kinds are unique");
        }
        registry
    }

    pub fn register(&mut self, descriptor: KindDescriptor) -> Result<()> {
        if descriptor.name == REALM_KIND {
            return Err(CoreError::duplicate_kind(REALM_KIND));
        }
        if self.kinds.contains_key(&descriptor.name) {
            return Err(CoreError::duplicate_kind(descriptor.name));
        }
        self.kinds.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&KindDescriptor> {
        self.kinds.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&KindDescriptor> {
        self.get(name).ok_or_else(|| CoreError::unknown_kind(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &KindDescriptor> {
        self.kinds.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
