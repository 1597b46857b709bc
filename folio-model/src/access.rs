//! Access predicate descriptors.
//!
//! Two independent layers, both "absence means allow":
//! - Collection-level: one [`AccessFn`] per [`Operation`]
//! - Field-level: one [`FieldAccessFn`] per [`FieldOperation`]
//!
//! Predicates are stored as shareable closures returning futures so that
//! synchronous and asynchronous checks share one calling convention.

use crate::{Document, RequestContext};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Future returned by every caller-supplied callback.
pub type CallbackFuture<T> = BoxFuture<'static, anyhow::Result<T>>;

/// A collection-level operation subject to access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Admin,
    Restore,
    ForceDelete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Admin => "admin",
            Self::Restore => "restore",
            Self::ForceDelete => "forceDelete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field-level operation subject to access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldOperation {
    Create,
    Read,
    Update,
}

impl fmt::Display for FieldOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
        })
    }
}

/// Arguments passed to a collection-level predicate.
#[derive(Debug, Clone)]
pub struct AccessArgs {
    pub context: RequestContext,
    /// Target document id, when the operation addresses one document.
    pub id: Option<String>,
    /// Incoming payload for create/update.
    pub data: Option<Document>,
}

/// Collection-level access predicate.
#[derive(Clone)]
pub struct AccessFn(Arc<dyn Fn(AccessArgs) -> CallbackFuture<bool> + Send + Sync>);

impl AccessFn {
    /// Wraps an asynchronous predicate.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(AccessArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        Self(Arc::new(move |args: AccessArgs| f(args).boxed()))
    }

    /// Wraps a synchronous predicate.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&AccessArgs) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(move |args: AccessArgs| {
            let allowed = f(&args);
            futures::future::ready(Ok::<_, anyhow::Error>(allowed)).boxed()
        }))
    }

    /// Allows any caller with an authenticated principal.
    pub fn authenticated() -> Self {
        Self::from_fn(|args| args.context.is_authenticated())
    }

    /// Allows callers holding `role`.
    pub fn role(role: impl Into<String>) -> Self {
        let role = role.into();
        Self::from_fn(move |args| args.context.has_role(&role))
    }

    /// Denies everyone (the operation is only reachable with access overridden).
    pub fn deny() -> Self {
        Self::from_fn(|_| false)
    }

    pub async fn check(&self, args: AccessArgs) -> anyhow::Result<bool> {
        (self.0)(args).await
    }
}

impl fmt::Debug for AccessFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessFn(..)")
    }
}

/// Collection-level predicates, one slot per operation.
#[derive(Debug, Clone, Default)]
pub struct CollectionAccess {
    pub create: Option<AccessFn>,
    pub read: Option<AccessFn>,
    pub update: Option<AccessFn>,
    pub delete: Option<AccessFn>,
    pub admin: Option<AccessFn>,
    pub restore: Option<AccessFn>,
    pub force_delete: Option<AccessFn>,
}

impl CollectionAccess {
    pub fn get(&self, operation: Operation) -> Option<&AccessFn> {
        match operation {
            Operation::Create => self.create.as_ref(),
            Operation::Read => self.read.as_ref(),
            Operation::Update => self.update.as_ref(),
            Operation::Delete => self.delete.as_ref(),
            Operation::Admin => self.admin.as_ref(),
            Operation::Restore => self.restore.as_ref(),
            Operation::ForceDelete => self.force_delete.as_ref(),
        }
    }

    pub fn set(&mut self, operation: Operation, predicate: AccessFn) {
        let slot = match operation {
            Operation::Create => &mut self.create,
            Operation::Read => &mut self.read,
            Operation::Update => &mut self.update,
            Operation::Delete => &mut self.delete,
            Operation::Admin => &mut self.admin,
            Operation::Restore => &mut self.restore,
            Operation::ForceDelete => &mut self.force_delete,
        };
        *slot = Some(predicate);
    }
}

/// Arguments passed to a field-level predicate.
#[derive(Debug, Clone)]
pub struct FieldAccessArgs {
    pub context: RequestContext,
    pub id: Option<String>,
    /// The object that directly contains the field (an array row for
    /// fields nested in arrays).
    pub sibling_data: Document,
    /// The whole document, when one exists (reads and updates).
    pub doc: Option<Document>,
}

/// Field-level access predicate.
#[derive(Clone)]
pub struct FieldAccessFn(Arc<dyn Fn(FieldAccessArgs) -> CallbackFuture<bool> + Send + Sync>);

impl FieldAccessFn {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(FieldAccessArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        Self(Arc::new(move |args: FieldAccessArgs| f(args).boxed()))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&FieldAccessArgs) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(move |args: FieldAccessArgs| {
            let allowed = f(&args);
            futures::future::ready(Ok::<_, anyhow::Error>(allowed)).boxed()
        }))
    }

    pub fn role(role: impl Into<String>) -> Self {
        let role = role.into();
        Self::from_fn(move |args| args.context.has_role(&role))
    }

    pub fn deny() -> Self {
        Self::from_fn(|_| false)
    }

    pub async fn check(&self, args: FieldAccessArgs) -> anyhow::Result<bool> {
        (self.0)(args).await
    }
}

impl fmt::Debug for FieldAccessFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldAccessFn(..)")
    }
}

/// Field-level predicates.
#[derive(Debug, Clone, Default)]
pub struct FieldAccess {
    pub create: Option<FieldAccessFn>,
    pub read: Option<FieldAccessFn>,
    pub update: Option<FieldAccessFn>,
}

impl FieldAccess {
    pub fn get(&self, operation: FieldOperation) -> Option<&FieldAccessFn> {
        match operation {
            FieldOperation::Create => self.create.as_ref(),
            FieldOperation::Read => self.read.as_ref(),
            FieldOperation::Update => self.update.as_ref(),
        }
    }

    pub fn set(&mut self, operation: FieldOperation, predicate: FieldAccessFn) {
        match operation {
            FieldOperation::Create => self.create = Some(predicate),
            FieldOperation::Read => self.read = Some(predicate),
            FieldOperation::Update => self.update = Some(predicate),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.create.is_none() && self.read.is_none() && self.update.is_none()
    }
}
