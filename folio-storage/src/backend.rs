//! The storage backend contract.
//!
//! The engine never talks to a database directly. Every read and write goes
//! through [`StorageBackend`], which has three tiers of methods:
//! - required CRUD, globals, versions and scheduling
//! - `count`, provided in terms of `find`
//! - optional capabilities (soft delete, restore, full-text search,
//!   transactions) that default to [`StorageError::Unsupported`]; the engine
//!   falls back to plain `update`/`find` or non-atomic execution
//!
//! Transactions are handles: writes made through
//! [`StorageTransaction::backend`] become visible to other callers on
//! [`commit`](StorageTransaction::commit) and are discarded on
//! [`rollback`](StorageTransaction::rollback). Writes by other callers are
//! never undone by a rollback.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use folio_model::{Document, NewVersion, Query, VersionRecord, Where};
use folio_types::{Timestamp, VersionId};
use std::sync::Arc;

/// One page of matches plus the total number of matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindResult {
    pub docs: Vec<Document>,
    pub total_docs: usize,
}

/// Abstract document storage.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    // ── Documents ───────────────────────────────────────────────

    /// Returns the page of documents matching `query`.
    async fn find(&self, collection: &str, query: &Query) -> StorageResult<FindResult>;

    async fn find_by_id(&self, collection: &str, id: &str) -> StorageResult<Option<Document>>;

    /// Inserts a document. The backend assigns an `id` when none is present.
    async fn create(&self, collection: &str, doc: Document) -> StorageResult<Document>;

    /// Shallow-merges `patch` into the stored document and returns the result.
    async fn update(&self, collection: &str, id: &str, patch: Document) -> StorageResult<Document>;

    /// Removes a document and returns it.
    async fn delete(&self, collection: &str, id: &str) -> StorageResult<Document>;

    /// Counts documents matching `filter`.
    async fn count(&self, collection: &str, filter: Option<&Where>) -> StorageResult<usize> {
        let query = Query {
            filter: filter.cloned(),
            ..Query::new()
        };
        Ok(self.find(collection, &query).await?.total_docs)
    }

    // ── Globals ─────────────────────────────────────────────────

    async fn find_global(&self, slug: &str) -> StorageResult<Option<Document>>;

    /// Shallow-merges `patch` into the global, creating it if absent.
    async fn update_global(&self, slug: &str, patch: Document) -> StorageResult<Document>;

    // ── Versions ────────────────────────────────────────────────

    /// Appends a version snapshot, assigning a strictly increasing id.
    async fn create_version(&self, version: NewVersion) -> StorageResult<VersionRecord>;

    /// All versions of one document, newest first.
    async fn find_versions(&self, collection: &str, parent: &str) -> StorageResult<Vec<VersionRecord>>;

    async fn find_version_by_id(
        &self,
        collection: &str,
        id: VersionId,
    ) -> StorageResult<Option<VersionRecord>>;

    // ── Scheduling ──────────────────────────────────────────────

    /// Documents whose scheduled-publish instant is at or before `now`.
    async fn find_scheduled_documents(
        &self,
        collection: &str,
        now: Timestamp,
    ) -> StorageResult<Vec<Document>>;

    /// Sets or clears the scheduled-publish instant of a document.
    async fn set_scheduled_publish_at(
        &self,
        collection: &str,
        id: &str,
        at: Option<Timestamp>,
    ) -> StorageResult<()>;

    // ── Optional capabilities ───────────────────────────────────

    /// Marks a document deleted by setting `field` to `at`.
    async fn soft_delete(
        &self,
        _collection: &str,
        _id: &str,
        _field: &str,
        _at: Timestamp,
    ) -> StorageResult<Document> {
        Err(StorageError::Unsupported("soft_delete"))
    }

    /// Clears the soft-delete marker `field`.
    async fn restore(&self, _collection: &str, _id: &str, _field: &str) -> StorageResult<Document> {
        Err(StorageError::Unsupported("restore"))
    }

    /// Full-text search over a collection, further narrowed by `query`.
    async fn search(
        &self,
        _collection: &str,
        _text: &str,
        _query: &Query,
    ) -> StorageResult<FindResult> {
        Err(StorageError::Unsupported("search"))
    }

    fn supports_transactions(&self) -> bool {
        false
    }

    async fn begin_transaction(&self) -> StorageResult<Box<dyn StorageTransaction>> {
        Err(StorageError::Unsupported("transactions"))
    }
}

/// An open storage transaction.
#[async_trait]
pub trait StorageTransaction: Send + Sync {
    /// Backend whose reads and writes run inside the transaction.
    fn backend(&self) -> Arc<dyn StorageBackend>;

    async fn commit(self: Box<Self>) -> StorageResult<()>;

    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}
