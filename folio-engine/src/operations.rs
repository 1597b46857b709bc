//! Collection operations.
//!
//! Every write runs the same pipeline:
//!
//! ```text
//! managed check → collection access → strip engine keys → field write filter
//!   → (create: defaults) → beforeValidate → validate → beforeChange
//!   → storage write → (versioned: append version) → afterChange → field read filter
//! ```
//!
//! Reads run: storage read → beforeRead → field read filter → populate →
//! afterRead.

use crate::access::has_field_predicates;
use crate::api::Folio;
use crate::defaults::apply_defaults;
use crate::error::{EngineError, EngineResult};
use crate::hooks::HookScope;
use crate::validate::{Mode, validate};
use crate::versions::append_version;
use folio_model::{
    CREATED_AT_FIELD, CollectionConfig, DocStatus, Document, DocumentExt, FieldOperation,
    HookPhase, ID_FIELD, Operation, Query, SCHEDULED_PUBLISH_FIELD, STATUS_FIELD, Sort,
    UPDATED_AT_FIELD, Where,
};
use folio_storage::{FindResult, StorageError};
use folio_types::{DocumentId, Timestamp};
use futures::future::try_join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Which soft-deleted documents a read sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletedFilter {
    /// Only live documents.
    #[default]
    Exclude,
    /// Live and soft-deleted documents.
    Include,
    /// Only soft-deleted documents.
    Only,
}

/// Options for `find`, `find_by_id_with` and `search`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub filter: Option<Where>,
    pub sort: Option<Sort>,
    /// Page size; `0` returns every match. Defaults to the configured limit.
    pub limit: Option<usize>,
    /// 1-based page.
    pub page: Option<usize>,
    /// Population depth. Defaults to the configured depth.
    pub depth: Option<u32>,
    pub deleted: DeletedFilter,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Where) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_deleted(mut self) -> Self {
        self.deleted = DeletedFilter::Include;
        self
    }

    pub fn only_deleted(mut self) -> Self {
        self.deleted = DeletedFilter::Only;
        self
    }
}

/// One page of documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedDocs {
    pub docs: Vec<Document>,
    pub total_docs: usize,
    pub limit: usize,
    pub page: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PaginatedDocs {
    fn new(docs: Vec<Document>, total_docs: usize, limit: usize, page: usize) -> Self {
        let total_pages = if limit == 0 {
            1
        } else {
            total_docs.div_ceil(limit).max(1)
        };
        Self {
            docs,
            total_docs,
            limit,
            page,
            total_pages,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

/// Outcome of a batch operation.
#[derive(Debug)]
pub struct BatchResult {
    /// Per-item outcomes in input order.
    pub items: Vec<EngineResult<Document>>,
    /// True when the batch ran inside one storage transaction. Atomic
    /// batches only return on full success.
    pub atomic: bool,
}

impl BatchResult {
    pub fn succeeded(&self) -> impl Iterator<Item = &Document> {
        self.items.iter().filter_map(|item| item.as_ref().ok())
    }

    /// Failed items with their input index.
    pub fn failed(&self) -> impl Iterator<Item = (usize, &EngineError)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| item.as_ref().err().map(|e| (index, e)))
    }

    pub fn is_success(&self) -> bool {
        self.items.iter().all(Result::is_ok)
    }
}

fn now_value() -> Value {
    Value::String(Timestamp::now().to_rfc3339())
}

fn text_matches(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|v| text_matches(v, needle)),
        Value::Object(map) => map.values().any(|v| text_matches(v, needle)),
        _ => false,
    }
}

enum BatchOp {
    Create(Document),
    Update(String, Document),
    Delete(String),
}

/// CRUD surface of one collection, bound to a [`Folio`]'s request context.
#[derive(Debug, Clone, Copy)]
pub struct CollectionOperations<'a> {
    folio: &'a Folio,
    config: &'a CollectionConfig,
}

impl<'a> CollectionOperations<'a> {
    pub(crate) fn new(folio: &'a Folio, config: &'a CollectionConfig) -> Self {
        Self { folio, config }
    }

    pub fn slug(&self) -> &'a str {
        &self.config.slug
    }

    pub fn config(&self) -> &'a CollectionConfig {
        self.config
    }

    pub(crate) fn folio(&self) -> &'a Folio {
        self.folio
    }

    // ── Reads ───────────────────────────────────────────────────

    pub async fn find(&self, options: FindOptions) -> EngineResult<PaginatedDocs> {
        self.folio
            .require_access(&self.config.access, Operation::Read, self.slug(), None, None)
            .await?;
        let (query, limit, page) = self.build_query(&options);
        let result = self.folio.storage().find(self.slug(), &query).await?;
        debug!(collection = %self.slug(), total = result.total_docs, "find");
        self.finish_page(result, &options, limit, page).await
    }

    pub async fn find_by_id(&self, id: &str) -> EngineResult<Document> {
        self.find_by_id_with(id, FindOptions::new()).await
    }

    /// `find_by_id` honouring `options.depth` and `options.deleted`.
    pub async fn find_by_id_with(&self, id: &str, options: FindOptions) -> EngineResult<Document> {
        self.folio
            .require_access(&self.config.access, Operation::Read, self.slug(), Some(id), None)
            .await?;
        let doc = self.fetch(id).await?;
        let visible = match options.deleted {
            DeletedFilter::Exclude => !self.is_trashed(&doc),
            DeletedFilter::Include => true,
            DeletedFilter::Only => self.is_trashed(&doc),
        };
        if !visible {
            return Err(EngineError::not_found(self.slug(), id));
        }
        let depth = self.folio.config().clamp_depth(options.depth);
        self.read_pipeline(doc, depth).await
    }

    /// Full-text search. Matches only text the caller may read: the backend
    /// search is used when no field of the collection is read-guarded,
    /// otherwise (or when the backend has no search) the engine scans.
    pub async fn search(&self, text: &str, options: FindOptions) -> EngineResult<PaginatedDocs> {
        self.folio
            .require_access(&self.config.access, Operation::Read, self.slug(), None, None)
            .await?;
        let (query, limit, page) = self.build_query(&options);
        let guarded = !self.folio.is_overriding_access()
            && has_field_predicates(&self.config.fields, FieldOperation::Read);
        let result = if guarded {
            self.scan_search(text, &query).await?
        } else {
            match self.folio.storage().search(self.slug(), text, &query).await {
                Err(e) if e.is_unsupported() => {
                    debug!(collection = %self.slug(), "backend lacks search, scanning");
                    self.scan_search(text, &query).await?
                }
                other => other?,
            }
        };
        self.finish_page(result, &options, limit, page).await
    }

    /// Case-insensitive text scan over the read-filtered view of every match
    /// of `query`, paged afterwards.
    async fn scan_search(&self, text: &str, query: &Query) -> EngineResult<FindResult> {
        let all = self
            .folio
            .storage()
            .find(
                self.slug(),
                &Query {
                    limit: None,
                    page: 1,
                    ..query.clone()
                },
            )
            .await?;
        let needle = text.to_lowercase();
        let mut hits = Vec::new();
        for doc in all.docs {
            let mut visible = doc.clone();
            let id = doc.id();
            self.folio
                .filter_read(&self.config.fields, &mut visible, id.as_deref())
                .await?;
            if visible.values().any(|v| text_matches(v, &needle)) {
                hits.push(doc);
            }
        }
        let total_docs = hits.len();
        let docs = hits
            .into_iter()
            .skip(query.offset())
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(FindResult { docs, total_docs })
    }

    /// Counts live documents visible to the caller.
    pub async fn count(&self, filter: Option<Where>) -> EngineResult<usize> {
        self.folio
            .require_access(&self.config.access, Operation::Read, self.slug(), None, None)
            .await?;
        let filter = self.query_filter(filter, DeletedFilter::Exclude);
        Ok(self.folio.storage().count(self.slug(), filter.as_ref()).await?)
    }

    /// Whether the caller may use the admin surface of this collection.
    pub async fn can_access_admin(&self) -> EngineResult<bool> {
        self.folio
            .has_access(&self.config.access, Operation::Admin, None)
            .await
    }

    // ── Writes ──────────────────────────────────────────────────

    pub async fn create(&self, data: Document) -> EngineResult<Document> {
        self.ensure_writable(Operation::Create)?;
        self.folio
            .require_access(&self.config.access, Operation::Create, self.slug(), None, Some(&data))
            .await?;

        let fields = &self.config.fields;
        let mut data = data;
        self.strip_engine_keys(&mut data, true);
        self.folio
            .filter_write(fields, &mut data, FieldOperation::Create, None, None)
            .await?;
        apply_defaults(fields, &mut data).await?;

        let hooks = self.hooks(Operation::Create, None, None);
        let mut data = hooks.run(HookPhase::BeforeValidate, data).await?;
        validate(
            self.slug(),
            fields,
            &mut data,
            Mode::Create,
            Operation::Create,
            self.folio.context(),
        )
        .await?;
        let mut data = hooks.run(HookPhase::BeforeChange, data).await?;

        if data.id().is_none() {
            data.insert(ID_FIELD.into(), Value::String(DocumentId::new().to_string()));
        }
        if self.config.timestamps {
            let now = now_value();
            data.insert(CREATED_AT_FIELD.into(), now.clone());
            data.insert(UPDATED_AT_FIELD.into(), now);
        }
        if self.config.versions {
            data.insert(STATUS_FIELD.into(), Value::String(DocStatus::Draft.to_string()));
        }

        let created = self.folio.storage().create(self.slug(), data).await?;
        let id = created
            .id()
            .ok_or_else(|| StorageError::InvalidData("created document has no id".into()))?;
        if self.config.versions {
            append_version(self.folio, self.slug(), &id, &created, DocStatus::Draft).await?;
        }

        let hooks = self.hooks(Operation::Create, Some(&id), None);
        let doc = hooks.run(HookPhase::AfterChange, created).await?;
        debug!(collection = %self.slug(), id = %id, "document created");
        self.output(doc, &id).await
    }

    pub async fn update(&self, id: &str, patch: Document) -> EngineResult<Document> {
        self.ensure_writable(Operation::Update)?;
        let existing = self.fetch_live(id).await?;
        self.folio
            .require_access(&self.config.access, Operation::Update, self.slug(), Some(id), Some(&patch))
            .await?;

        let fields = &self.config.fields;
        let mut patch = patch;
        self.strip_engine_keys(&mut patch, false);
        self.folio
            .filter_write(fields, &mut patch, FieldOperation::Update, Some(id), Some(&existing))
            .await?;
        let mut data = existing.clone();
        data.extend(patch);

        let hooks = self.hooks(Operation::Update, Some(id), Some(&existing));
        let mut data = hooks.run(HookPhase::BeforeValidate, data).await?;
        validate(
            self.slug(),
            fields,
            &mut data,
            Mode::Update,
            Operation::Update,
            self.folio.context(),
        )
        .await?;
        let mut data = hooks.run(HookPhase::BeforeChange, data).await?;
        if self.config.timestamps {
            data.insert(UPDATED_AT_FIELD.into(), now_value());
        }
        data.remove(ID_FIELD);

        let updated = self.folio.storage().update(self.slug(), id, data).await?;
        if self.config.versions {
            let status = DocStatus::from_value(updated.get(STATUS_FIELD)).unwrap_or_default();
            append_version(self.folio, self.slug(), id, &updated, status).await?;
        }
        let doc = hooks.run(HookPhase::AfterChange, updated).await?;
        debug!(collection = %self.slug(), id = %id, "document updated");
        self.output(doc, id).await
    }

    /// Deletes a document: soft when the collection has soft delete, hard
    /// otherwise.
    pub async fn delete(&self, id: &str) -> EngineResult<Document> {
        self.ensure_writable(Operation::Delete)?;
        let existing = self.fetch_live(id).await?;
        self.folio
            .require_access(&self.config.access, Operation::Delete, self.slug(), Some(id), None)
            .await?;

        let hooks = self.hooks(Operation::Delete, Some(id), Some(&existing));
        hooks.run(HookPhase::BeforeDelete, existing.clone()).await?;
        let storage = self.folio.storage();
        let removed = match self.config.deleted_at_field() {
            Some(field) => {
                let now = Timestamp::now();
                let mut trashed = match storage.soft_delete(self.slug(), id, field, now).await {
                    Err(e) if e.is_unsupported() => {
                        let mut patch = Document::new();
                        patch.insert(field.to_string(), Value::String(now.to_rfc3339()));
                        storage.update(self.slug(), id, patch).await?
                    }
                    other => other?,
                };
                // A trashed document is never published by the scheduler.
                if trashed.remove(SCHEDULED_PUBLISH_FIELD).is_some() {
                    storage.set_scheduled_publish_at(self.slug(), id, None).await?;
                }
                trashed
            }
            None => storage.delete(self.slug(), id).await?,
        };
        let doc = hooks.run(HookPhase::AfterDelete, removed).await?;
        debug!(collection = %self.slug(), id = %id, soft = self.config.soft_delete.is_some(), "document deleted");
        self.output(doc, id).await
    }

    /// Clears the soft-delete marker of a trashed document.
    pub async fn restore(&self, id: &str) -> EngineResult<Document> {
        let Some(field) = self.config.deleted_at_field() else {
            return Err(EngineError::InvalidOperation(format!(
                "collection '{}' does not use soft delete",
                self.slug()
            )));
        };
        self.ensure_writable(Operation::Restore)?;
        let existing = self.fetch(id).await?;
        if !self.is_trashed(&existing) {
            return Err(EngineError::InvalidOperation(format!(
                "document {}/{id} is not deleted",
                self.slug()
            )));
        }
        self.folio
            .require_access(&self.config.access, Operation::Restore, self.slug(), Some(id), None)
            .await?;

        let hooks = self.hooks(Operation::Restore, Some(id), Some(&existing));
        hooks.run(HookPhase::BeforeRestore, existing.clone()).await?;
        let storage = self.folio.storage();
        let restored = match storage.restore(self.slug(), id, field).await {
            Err(e) if e.is_unsupported() => {
                let mut patch = Document::new();
                patch.insert(field.to_string(), Value::Null);
                storage.update(self.slug(), id, patch).await?
            }
            other => other?,
        };
        let doc = hooks.run(HookPhase::AfterRestore, restored).await?;
        debug!(collection = %self.slug(), id = %id, "document restored");
        self.output(doc, id).await
    }

    /// Permanently removes a document, trashed or not.
    pub async fn force_delete(&self, id: &str) -> EngineResult<Document> {
        self.ensure_writable(Operation::ForceDelete)?;
        let existing = self.fetch(id).await?;
        self.folio
            .require_access(&self.config.access, Operation::ForceDelete, self.slug(), Some(id), None)
            .await?;

        let hooks = self.hooks(Operation::ForceDelete, Some(id), Some(&existing));
        hooks.run(HookPhase::BeforeDelete, existing.clone()).await?;
        let removed = self.folio.storage().delete(self.slug(), id).await?;
        let doc = hooks.run(HookPhase::AfterDelete, removed).await?;
        debug!(collection = %self.slug(), id = %id, "document force-deleted");
        self.output(doc, id).await
    }

    // ── Batches ─────────────────────────────────────────────────

    pub async fn batch_create(&self, docs: Vec<Document>) -> EngineResult<BatchResult> {
        self.run_batch(docs.into_iter().map(BatchOp::Create).collect())
            .await
    }

    pub async fn batch_update(&self, updates: Vec<(String, Document)>) -> EngineResult<BatchResult> {
        self.run_batch(
            updates
                .into_iter()
                .map(|(id, patch)| BatchOp::Update(id, patch))
                .collect(),
        )
        .await
    }

    pub async fn batch_delete(&self, ids: Vec<String>) -> EngineResult<BatchResult> {
        self.run_batch(ids.into_iter().map(BatchOp::Delete).collect())
            .await
    }

    async fn apply(&self, op: BatchOp) -> EngineResult<Document> {
        match op {
            BatchOp::Create(data) => self.create(data).await,
            BatchOp::Update(id, patch) => self.update(&id, patch).await,
            BatchOp::Delete(id) => self.delete(&id).await,
        }
    }

    /// Runs `ops` in order. Inside one storage transaction when the backend
    /// supports it (first failure rolls back and is returned), best-effort
    /// otherwise.
    async fn run_batch(&self, ops: Vec<BatchOp>) -> EngineResult<BatchResult> {
        let storage = self.folio.storage();
        if !storage.supports_transactions() {
            let mut results = Vec::with_capacity(ops.len());
            for op in ops {
                results.push(self.apply(op).await);
            }
            return Ok(BatchResult {
                items: results,
                atomic: false,
            });
        }

        let tx = storage.begin_transaction().await?;
        let folio = self.folio.with_storage(tx.backend());
        let staged = CollectionOperations::new(&folio, self.config);
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            match staged.apply(op).await {
                Ok(doc) => results.push(Ok(doc)),
                Err(e) => {
                    if let Err(rollback) = tx.rollback().await {
                        warn!(collection = %self.slug(), error = %rollback, "batch rollback failed");
                    }
                    return Err(e);
                }
            }
        }
        tx.commit().await?;
        debug!(collection = %self.slug(), items = results.len(), "batch committed");
        Ok(BatchResult {
            items: results,
            atomic: true,
        })
    }

    // ── Pipeline helpers ────────────────────────────────────────

    pub(crate) fn hooks<'b>(
        &'b self,
        operation: Operation,
        id: Option<&'b str>,
        original_doc: Option<&'b Document>,
    ) -> HookScope<'b> {
        HookScope {
            collection: self.slug(),
            fields: &self.config.fields,
            hooks: &self.config.hooks,
            operation,
            id,
            original_doc,
            context: self.folio.context(),
        }
    }

    /// Managed collections only accept writes with access overridden.
    pub(crate) fn ensure_writable(&self, operation: Operation) -> EngineResult<()> {
        if self.config.managed && !self.folio.is_overriding_access() {
            return Err(EngineError::denied(operation, self.slug()));
        }
        Ok(())
    }

    pub(crate) fn is_trashed(&self, doc: &Document) -> bool {
        self.config
            .deleted_at_field()
            .is_some_and(|field| !matches!(doc.get(field), None | Some(Value::Null)))
    }

    /// Fetches a document and re-checks the caller's default scope. Both a
    /// miss and a scope mismatch are `NotFound`.
    pub(crate) async fn fetch(&self, id: &str) -> EngineResult<Document> {
        match self.folio.storage().find_by_id(self.slug(), id).await? {
            Some(doc) if self.folio.in_scope(self.config, &doc) => Ok(doc),
            _ => Err(EngineError::not_found(self.slug(), id)),
        }
    }

    /// Like [`fetch`](Self::fetch), but soft-deleted documents are `NotFound`.
    pub(crate) async fn fetch_live(&self, id: &str) -> EngineResult<Document> {
        let doc = self.fetch(id).await?;
        if self.is_trashed(&doc) {
            return Err(EngineError::not_found(self.slug(), id));
        }
        Ok(doc)
    }

    /// Removes keys only the engine may set from a caller payload.
    pub(crate) fn strip_engine_keys(&self, data: &mut Document, keep_id: bool) {
        if !keep_id {
            data.remove(ID_FIELD);
        }
        for key in [CREATED_AT_FIELD, UPDATED_AT_FIELD, STATUS_FIELD, SCHEDULED_PUBLISH_FIELD] {
            data.remove(key);
        }
        if let Some(field) = self.config.deleted_at_field() {
            data.remove(field);
        }
    }

    /// Applies field read access to a document leaving the engine.
    pub(crate) async fn output(&self, mut doc: Document, id: &str) -> EngineResult<Document> {
        self.folio
            .filter_read(&self.config.fields, &mut doc, Some(id))
            .await?;
        Ok(doc)
    }

    async fn read_pipeline(&self, doc: Document, depth: u32) -> EngineResult<Document> {
        let id = doc.id();
        let hooks = self.hooks(Operation::Read, id.as_deref(), None);
        let mut doc = hooks.run(HookPhase::BeforeRead, doc).await?;
        self.folio
            .filter_read(&self.config.fields, &mut doc, id.as_deref())
            .await?;
        self.folio
            .populate(&self.config.fields, &mut doc, depth)
            .await?;
        hooks.run(HookPhase::AfterRead, doc).await
    }

    /// Caller filter AND default scope AND soft-delete visibility.
    fn query_filter(&self, filter: Option<Where>, deleted: DeletedFilter) -> Option<Where> {
        let trash = self
            .config
            .deleted_at_field()
            .and_then(|field| match deleted {
                DeletedFilter::Exclude => Some(Where::is_null(field)),
                DeletedFilter::Include => None,
                DeletedFilter::Only => Some(Where::exists(field)),
            });
        Where::and_all([filter, self.folio.scope_filter(self.config), trash])
    }

    fn build_query(&self, options: &FindOptions) -> (Query, usize, usize) {
        let limit = options
            .limit
            .unwrap_or(self.folio.config().default_limit);
        let page = options.page.unwrap_or(1).max(1);
        let query = Query {
            filter: self.query_filter(options.filter.clone(), options.deleted),
            sort: options.sort.clone(),
            limit: (limit > 0).then_some(limit),
            page,
            locale: self.folio.context().locale.clone(),
        };
        (query, limit, page)
    }

    async fn finish_page(
        &self,
        result: FindResult,
        options: &FindOptions,
        limit: usize,
        page: usize,
    ) -> EngineResult<PaginatedDocs> {
        let depth = self.folio.config().clamp_depth(options.depth);
        let docs = try_join_all(
            result
                .docs
                .into_iter()
                .map(|doc| self.read_pipeline(doc, depth)),
        )
        .await?;
        Ok(PaginatedDocs::new(docs, result.total_docs, limit, page))
    }
}
