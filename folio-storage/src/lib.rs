//! Storage layer for Folio.
//!
//! Defines the pluggable [`StorageBackend`] contract the document engine
//! delegates every read and write to, plus [`MemoryStore`], an in-memory
//! reference implementation used by tests and embedders.
//!
//! # Architecture
//!
//! - Documents are open-ended JSON maps keyed by collection slug
//! - Updates are shallow merge patches; `id` is never overwritten
//! - Version snapshots are append-only with strictly increasing ids
//! - Optional capabilities (soft delete, restore, search, transactions)
//!   report [`StorageError::Unsupported`] when a backend lacks them

mod backend;
mod error;
mod memory;

pub use backend::{FindResult, StorageBackend, StorageTransaction};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
