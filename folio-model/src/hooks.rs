//! Lifecycle hook descriptors.
//!
//! Hooks are caller-supplied async callbacks attached to a [`HookPhase`]
//! either on a single field ([`FieldHook`]) or on a whole collection
//! ([`CollectionHook`]). The engine runs them in declaration order and never
//! concurrently for the same field.

use crate::access::CallbackFuture;
use crate::{Document, Operation, RequestContext};
use futures::future::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A point in the document lifecycle at which hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookPhase {
    BeforeValidate,
    BeforeChange,
    AfterChange,
    BeforeRead,
    AfterRead,
    BeforeDelete,
    AfterDelete,
    BeforeRestore,
    AfterRestore,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BeforeValidate => "beforeValidate",
            Self::BeforeChange => "beforeChange",
            Self::AfterChange => "afterChange",
            Self::BeforeRead => "beforeRead",
            Self::AfterRead => "afterRead",
            Self::BeforeDelete => "beforeDelete",
            Self::AfterDelete => "afterDelete",
            Self::BeforeRestore => "beforeRestore",
            Self::AfterRestore => "afterRestore",
        })
    }
}

/// Hooks grouped by phase, preserving declaration order within a phase.
#[derive(Clone)]
pub struct Hooks<H> {
    phases: BTreeMap<HookPhase, Vec<H>>,
}

impl<H> Hooks<H> {
    pub fn new() -> Self {
        Self {
            phases: BTreeMap::new(),
        }
    }

    /// Hooks registered for `phase`, in declaration order.
    pub fn get(&self, phase: HookPhase) -> &[H] {
        self.phases.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn push(&mut self, phase: HookPhase, hook: H) {
        self.phases.entry(phase).or_default().push(hook);
    }

    pub fn is_empty(&self) -> bool {
        self.phases.values().all(Vec::is_empty)
    }
}

impl<H> Default for Hooks<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for Hooks<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.phases.iter().map(|(phase, hooks)| (phase, hooks.len())))
            .finish()
    }
}

/// Arguments passed to a field-level hook.
#[derive(Debug, Clone)]
pub struct FieldHookArgs {
    pub phase: HookPhase,
    pub operation: Operation,
    /// Name of the field the hook is attached to.
    pub field: String,
    /// Current value (output of the previous hook in the chain); `None` when
    /// the key is absent.
    pub value: Option<Value>,
    /// The object that directly contains the field.
    pub sibling_data: Document,
    /// The stored document before this operation, when one exists.
    pub original_doc: Option<Document>,
    pub context: RequestContext,
}

/// A field-level hook.
///
/// Returning `Ok(Some(v))` replaces the field value with `v` for the next
/// hook in the chain. Returning `Ok(None)` keeps the prior value unchanged.
/// Note that `None` is indistinguishable from a hook that simply forgot to
/// produce a value; to clear a field return `Ok(Some(Value::Null))`.
#[derive(Clone)]
pub struct FieldHook(Arc<dyn Fn(FieldHookArgs) -> CallbackFuture<Option<Value>> + Send + Sync>);

impl FieldHook {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(FieldHookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<Value>>> + Send + 'static,
    {
        Self(Arc::new(move |args: FieldHookArgs| f(args).boxed()))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(FieldHookArgs) -> anyhow::Result<Option<Value>> + Send + Sync + 'static,
    {
        Self(Arc::new(move |args: FieldHookArgs| {
            futures::future::ready(f(args)).boxed()
        }))
    }

    pub async fn call(&self, args: FieldHookArgs) -> anyhow::Result<Option<Value>> {
        (self.0)(args).await
    }
}

impl fmt::Debug for FieldHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldHook(..)")
    }
}

/// Arguments passed to a collection-level hook.
#[derive(Debug, Clone)]
pub struct CollectionHookArgs {
    pub phase: HookPhase,
    pub operation: Operation,
    pub collection: String,
    pub id: Option<String>,
    /// The whole document as produced by the previous hook.
    pub data: Document,
    pub original_doc: Option<Document>,
    pub context: RequestContext,
}

/// A collection-level hook operating on the whole document.
///
/// Same chaining rule as [`FieldHook`]: `Ok(None)` keeps the document.
#[derive(Clone)]
pub struct CollectionHook(
    Arc<dyn Fn(CollectionHookArgs) -> CallbackFuture<Option<Document>> + Send + Sync>,
);

impl CollectionHook {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(CollectionHookArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<Document>>> + Send + 'static,
    {
        Self(Arc::new(move |args: CollectionHookArgs| f(args).boxed()))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(CollectionHookArgs) -> anyhow::Result<Option<Document>> + Send + Sync + 'static,
    {
        Self(Arc::new(move |args: CollectionHookArgs| {
            futures::future::ready(f(args)).boxed()
        }))
    }

    pub async fn call(&self, args: CollectionHookArgs) -> anyhow::Result<Option<Document>> {
        (self.0)(args).await
    }
}

impl fmt::Debug for CollectionHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CollectionHook(..)")
    }
}

pub type FieldHooks = Hooks<FieldHook>;
pub type CollectionHooks = Hooks<CollectionHook>;
