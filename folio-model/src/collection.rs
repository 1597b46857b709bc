use crate::{
    AccessFn, CollectionAccess, CollectionHook, CollectionHooks, Field, HookPhase, Operation,
    RequestContext, Where,
};
use std::fmt;
use std::sync::Arc;

/// Soft-delete configuration: deletions set `field` to a timestamp instead
/// of removing the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDeleteConfig {
    pub field: String,
}

impl Default for SoftDeleteConfig {
    fn default() -> Self {
        Self {
            field: "deletedAt".to_string(),
        }
    }
}

/// Per-collection scoping filter derived from the caller (e.g. owner-only).
///
/// Returning `None` leaves queries unscoped for that caller.
#[derive(Clone)]
pub struct DefaultFilter(Arc<dyn Fn(&RequestContext) -> Option<Where> + Send + Sync>);

impl DefaultFilter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<Where> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn resolve(&self, context: &RequestContext) -> Option<Where> {
        (self.0)(context)
    }
}

impl fmt::Debug for DefaultFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultFilter(..)")
    }
}

/// Describes one kind of document: its field tree plus access, hooks and
/// storage behaviour.
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub slug: String,
    pub fields: Vec<Field>,
    pub access: CollectionAccess,
    pub hooks: CollectionHooks,
    pub soft_delete: Option<SoftDeleteConfig>,
    pub default_filter: Option<DefaultFilter>,
    /// Keeps draft/published version snapshots.
    pub versions: bool,
    /// Read-only through the public facade; owned by another subsystem.
    pub managed: bool,
    /// Maintain `createdAt`/`updatedAt`.
    pub timestamps: bool,
}

impl CollectionConfig {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            fields: Vec::new(),
            access: CollectionAccess::default(),
            hooks: CollectionHooks::default(),
            soft_delete: None,
            default_filter: None,
            versions: false,
            managed: false,
            timestamps: true,
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: Vec<Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn access(mut self, operation: Operation, predicate: AccessFn) -> Self {
        self.access.set(operation, predicate);
        self
    }

    pub fn hook(mut self, phase: HookPhase, hook: CollectionHook) -> Self {
        self.hooks.push(phase, hook);
        self
    }

    /// Enables soft delete on the default `deletedAt` field.
    pub fn soft_delete(mut self) -> Self {
        self.soft_delete = Some(SoftDeleteConfig::default());
        self
    }

    pub fn soft_delete_field(mut self, field: impl Into<String>) -> Self {
        self.soft_delete = Some(SoftDeleteConfig {
            field: field.into(),
        });
        self
    }

    pub fn default_filter(mut self, filter: DefaultFilter) -> Self {
        self.default_filter = Some(filter);
        self
    }

    pub fn versioned(mut self) -> Self {
        self.versions = true;
        self
    }

    pub fn managed(mut self) -> Self {
        self.managed = true;
        self
    }

    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// Name of the soft-delete timestamp field, when soft delete is enabled.
    pub fn deleted_at_field(&self) -> Option<&str> {
        self.soft_delete.as_ref().map(|s| s.field.as_str())
    }
}

/// A singleton document with its own fields, access and hooks.
///
/// Only the `read` and `update` access slots are consulted.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub slug: String,
    pub fields: Vec<Field>,
    pub access: CollectionAccess,
    pub hooks: CollectionHooks,
}

impl GlobalConfig {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            fields: Vec::new(),
            access: CollectionAccess::default(),
            hooks: CollectionHooks::default(),
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: Vec<Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn access(mut self, operation: Operation, predicate: AccessFn) -> Self {
        self.access.set(operation, predicate);
        self
    }

    pub fn hook(mut self, phase: HookPhase, hook: CollectionHook) -> Self {
        self.hooks.push(phase, hook);
        self
    }
}
