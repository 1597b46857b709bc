//! Schema model for Folio.
//!
//! Defines the declarative types every other Folio crate depends on:
//! - [`Field`]: the closed sum type describing a collection's field tree
//!   (leaf data fields, containers, layout-only fields)
//! - [`CollectionConfig`] / [`GlobalConfig`]: per-collection and singleton
//!   descriptors with access predicates, hooks, soft-delete and versioning
//! - [`Schema`]: the registry of all collections and globals
//! - [`Document`]: the open-ended JSON record the engine reads and writes
//! - [`RequestContext`]: the immutable caller identity threaded through
//!   every access check and hook
//! - [`Where`] / [`Query`]: the storage-facing filter language
//! - [`VersionRecord`]: immutable draft/published snapshots
//!
//! The model is pure data: callbacks are stored as shareable closures
//! ([`AccessFn`], [`FieldHook`], ...) but never invoked here. Execution
//! lives in `folio-engine`.

mod access;
mod collection;
mod context;
mod document;
mod field;
mod hooks;
mod query;
mod schema;
mod validator;
mod version;

pub use access::{
    AccessArgs, AccessFn, CallbackFuture, CollectionAccess, FieldAccess, FieldAccessArgs,
    FieldAccessFn, FieldOperation, Operation,
};
pub use collection::{CollectionConfig, DefaultFilter, GlobalConfig, SoftDeleteConfig};
pub use context::{Principal, RequestContext};
pub use document::{
    BLOCK_TYPE_FIELD, CREATED_AT_FIELD, Document, DocumentExt, ID_FIELD, RELATION_TO_KEY,
    RELATION_VALUE_KEY, SCHEDULED_PUBLISH_FIELD, STATUS_FIELD, UPDATED_AT_FIELD, is_empty_value,
};
pub use field::{
    ArrayField, Block, BlocksField, DataField, Field, FieldBase, FieldType, GroupField,
    LayoutField, NumberOptions, RelationTo, RelationshipOptions, SelectOptions, Tab, TabsField,
    TextOptions, TextPattern,
};
pub use hooks::{
    CollectionHook, CollectionHookArgs, CollectionHooks, FieldHook, FieldHookArgs, FieldHooks,
    HookPhase, Hooks,
};
pub use query::{Query, Sort, Where, compare_values};
pub use schema::{Schema, SchemaError};
pub use validator::{FieldValidator, ValidateArgs, Verdict};
pub use version::{DocStatus, NewVersion, VersionRecord};
