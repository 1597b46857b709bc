//! Document access and mutation engine for Folio.
//!
//! Given a [`Schema`](folio_model::Schema) and a
//! [`StorageBackend`](folio_storage::StorageBackend), the engine executes
//! find/create/update/delete/search/restore operations while enforcing
//! collection and field access, running the hook pipeline, validating
//! nested field trees and populating relationships to a bounded depth.
//!
//! Entry point is [`Folio`]:
//!
//! - [`Folio::collection`]: CRUD, search, count and batches
//! - [`Folio::versions`]: draft/publish state machine and history
//! - [`Folio::global`]: singleton documents
//! - [`Folio::start_scheduler`]: background scheduled publishing
//!
//! # Pipelines
//!
//! Writes: managed check, collection access, field write filter, defaults
//! (create), `beforeValidate`, validation, `beforeChange`, storage write,
//! version append (versioned), `afterChange`, field read filter.
//!
//! Reads: storage read, `beforeRead`, field read filter, population,
//! `afterRead`.
//!
//! Relationship population is the only step that degrades instead of
//! failing: an unresolvable reference keeps its id.

mod access;
mod api;
mod config;
mod defaults;
mod error;
mod globals;
mod hooks;
mod operations;
mod populate;
mod scheduler;
mod validate;
mod versions;
mod walk;

pub use api::{Folio, FolioBuilder, Plugin};
pub use config::{EngineConfig, SchedulerConfig};
pub use error::{EngineError, EngineResult, FieldError};
pub use globals::GlobalOperations;
pub use operations::{BatchResult, CollectionOperations, DeletedFilter, FindOptions, PaginatedDocs};
pub use scheduler::{PollFailure, PollReport, PublishScheduler, ScheduledPublish, SchedulerHandle};
pub use versions::VersionManager;
pub use walk::{Descend, FieldRef, FieldVisitor, walk};
