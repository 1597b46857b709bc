//! In-memory reference backend.
//!
//! Documents live in insertion order per collection behind a
//! `tokio::sync::RwLock`. A transaction holds that lock for writing until it
//! ends and stages its own writes on a private copy, so other callers wait
//! instead of interleaving. Commit installs the copy; rollback drops it.

use crate::backend::{FindResult, StorageBackend, StorageTransaction};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use folio_model::{
    Document, DocumentExt, ID_FIELD, NewVersion, Query, SCHEDULED_PUBLISH_FIELD, VersionRecord,
};
use folio_types::{DocumentId, Timestamp, VersionId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct State {
    collections: HashMap<String, Vec<Document>>,
    globals: HashMap<String, Document>,
    versions: Vec<VersionRecord>,
}

impl State {
    fn docs(&self, collection: &str) -> &[Document] {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn position(&self, collection: &str, id: &str) -> Option<usize> {
        self.docs(collection)
            .iter()
            .position(|doc| doc.id().as_deref() == Some(id))
    }

    fn doc_mut(&mut self, collection: &str, id: &str) -> StorageResult<&mut Document> {
        let index = self
            .position(collection, id)
            .ok_or_else(|| StorageError::not_found(collection, id))?;
        self.collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(index))
            .ok_or_else(|| StorageError::not_found(collection, id))
    }
}

/// A [`StorageBackend`] holding everything in process memory.
#[derive(Debug)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    // Shared with transaction copies so that ids stay unique across rollbacks.
    next_version: Arc<AtomicU64>,
    optional: bool,
}

impl MemoryStore {
    /// Creates an empty store supporting every optional capability.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            next_version: Arc::new(AtomicU64::new(1)),
            optional: true,
        }
    }

    /// Creates an empty store that reports soft delete, restore, search and
    /// transactions as unsupported.
    pub fn without_optional_capabilities() -> Self {
        Self {
            optional: false,
            ..Self::new()
        }
    }

    fn require_optional(&self, capability: &'static str) -> StorageResult<()> {
        if self.optional {
            Ok(())
        } else {
            Err(StorageError::Unsupported(capability))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn select<'a>(
    docs: impl Iterator<Item = &'a Document>,
    query: &Query,
) -> FindResult {
    let mut matched: Vec<Document> = docs
        .filter(|doc| query.filter.as_ref().is_none_or(|f| f.matches(doc)))
        .cloned()
        .collect();
    if let Some(sort) = &query.sort {
        matched.sort_by(|a, b| sort.compare(a, b));
    }
    let total_docs = matched.len();
    let docs = matched
        .into_iter()
        .skip(query.offset())
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();
    FindResult { docs, total_docs }
}

fn merge(target: &mut Document, patch: Document) {
    for (key, value) in patch {
        if key != ID_FIELD {
            target.insert(key, value);
        }
    }
}

fn contains_text(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|v| contains_text(v, needle)),
        Value::Object(map) => map.values().any(|v| contains_text(v, needle)),
        _ => false,
    }
}

#[async_trait]
impl StorageBackend for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn find(&self, collection: &str, query: &Query) -> StorageResult<FindResult> {
        let state = self.state.read().await;
        Ok(select(state.docs(collection).iter(), query))
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        let state = self.state.read().await;
        Ok(state
            .docs(collection)
            .iter()
            .find(|doc| doc.id().as_deref() == Some(id))
            .cloned())
    }

    async fn create(&self, collection: &str, mut doc: Document) -> StorageResult<Document> {
        let id = match doc.id() {
            Some(id) => id,
            None => {
                let id = DocumentId::new().to_string();
                doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
        };
        let mut state = self.state.write().await;
        if state.position(collection, &id).is_some() {
            return Err(StorageError::Conflict(format!(
                "duplicate id {id} in {collection}"
            )));
        }
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn update(&self, collection: &str, id: &str, patch: Document) -> StorageResult<Document> {
        let mut state = self.state.write().await;
        let doc = state.doc_mut(collection, id)?;
        merge(doc, patch);
        Ok(doc.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<Document> {
        let mut state = self.state.write().await;
        let index = state
            .position(collection, id)
            .ok_or_else(|| StorageError::not_found(collection, id))?;
        state
            .collections
            .get_mut(collection)
            .map(|docs| docs.remove(index))
            .ok_or_else(|| StorageError::not_found(collection, id))
    }

    async fn find_global(&self, slug: &str) -> StorageResult<Option<Document>> {
        Ok(self.state.read().await.globals.get(slug).cloned())
    }

    async fn update_global(&self, slug: &str, patch: Document) -> StorageResult<Document> {
        let mut state = self.state.write().await;
        let global = state.globals.entry(slug.to_string()).or_default();
        merge(global, patch);
        Ok(global.clone())
    }

    async fn create_version(&self, version: NewVersion) -> StorageResult<VersionRecord> {
        let id = VersionId::new(self.next_version.fetch_add(1, Ordering::SeqCst));
        let record = VersionRecord {
            id,
            collection: version.collection,
            parent: version.parent,
            snapshot: version.snapshot,
            status: version.status,
            created_at: Timestamp::now(),
            scheduled_publish_at: version.scheduled_publish_at,
        };
        self.state.write().await.versions.push(record.clone());
        Ok(record)
    }

    async fn find_versions(&self, collection: &str, parent: &str) -> StorageResult<Vec<VersionRecord>> {
        let state = self.state.read().await;
        let mut versions: Vec<VersionRecord> = state
            .versions
            .iter()
            .filter(|v| v.collection == collection && v.parent == parent)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(versions)
    }

    async fn find_version_by_id(
        &self,
        collection: &str,
        id: VersionId,
    ) -> StorageResult<Option<VersionRecord>> {
        let state = self.state.read().await;
        Ok(state
            .versions
            .iter()
            .find(|v| v.collection == collection && v.id == id)
            .cloned())
    }

    async fn find_scheduled_documents(
        &self,
        collection: &str,
        now: Timestamp,
    ) -> StorageResult<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state
            .docs(collection)
            .iter()
            .filter(|doc| {
                doc.get_str(SCHEDULED_PUBLISH_FIELD)
                    .and_then(|s| Timestamp::parse(s).ok())
                    .is_some_and(|at| at.has_elapsed_at(&now))
            })
            .cloned()
            .collect())
    }

    async fn set_scheduled_publish_at(
        &self,
        collection: &str,
        id: &str,
        at: Option<Timestamp>,
    ) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let doc = state.doc_mut(collection, id)?;
        match at {
            Some(at) => {
                doc.insert(
                    SCHEDULED_PUBLISH_FIELD.to_string(),
                    Value::String(at.to_rfc3339()),
                );
            }
            None => {
                doc.remove(SCHEDULED_PUBLISH_FIELD);
            }
        }
        Ok(())
    }

    async fn soft_delete(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        at: Timestamp,
    ) -> StorageResult<Document> {
        self.require_optional("soft_delete")?;
        let mut state = self.state.write().await;
        let doc = state.doc_mut(collection, id)?;
        doc.insert(field.to_string(), Value::String(at.to_rfc3339()));
        Ok(doc.clone())
    }

    async fn restore(&self, collection: &str, id: &str, field: &str) -> StorageResult<Document> {
        self.require_optional("restore")?;
        let mut state = self.state.write().await;
        let doc = state.doc_mut(collection, id)?;
        doc.insert(field.to_string(), Value::Null);
        Ok(doc.clone())
    }

    async fn search(&self, collection: &str, text: &str, query: &Query) -> StorageResult<FindResult> {
        self.require_optional("search")?;
        let needle = text.to_lowercase();
        let state = self.state.read().await;
        let hits = state
            .docs(collection)
            .iter()
            .filter(|doc| doc.values().any(|v| contains_text(v, &needle)));
        Ok(select(hits, query))
    }

    fn supports_transactions(&self) -> bool {
        self.optional
    }

    async fn begin_transaction(&self) -> StorageResult<Box<dyn StorageTransaction>> {
        self.require_optional("transactions")?;
        let guard = Arc::clone(&self.state).write_owned().await;
        let staged = Arc::new(MemoryStore {
            state: Arc::new(RwLock::new(State::clone(&guard))),
            next_version: Arc::clone(&self.next_version),
            optional: self.optional,
        });
        debug!(backend = "memory", "transaction started");
        Ok(Box::new(MemoryTransaction { staged, guard }))
    }
}

/// Exclusive access to a [`MemoryStore`] plus the staged copy its writes go to.
struct MemoryTransaction {
    staged: Arc<MemoryStore>,
    guard: OwnedRwLockWriteGuard<State>,
}

#[async_trait]
impl StorageTransaction for MemoryTransaction {
    fn backend(&self) -> Arc<dyn StorageBackend> {
        self.staged.clone()
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let Self { staged, mut guard } = *self;
        *guard = State::clone(&*staged.state.read().await);
        debug!(backend = "memory", "transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        debug!(backend = "memory", "transaction rolled back");
        Ok(())
    }
}
