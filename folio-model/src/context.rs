use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Arbitrary attributes (e.g. tenant, email) available to access
    /// predicates and default filters.
    #[serde(default)]
    pub attributes: Value,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
            attributes: Value::Null,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Immutable per-request caller context.
///
/// Threaded through every access check and hook invocation. Derive a new
/// context with the `with_*` methods instead of mutating a shared one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub principal: Option<Principal>,
    pub locale: Option<String>,
}

impl RequestContext {
    /// A context with no authenticated caller.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A context authenticated as `principal`.
    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
            locale: None,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    pub fn principal_id(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.id.as_str())
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.principal.as_ref().is_some_and(|p| p.has_role(role))
    }
}
