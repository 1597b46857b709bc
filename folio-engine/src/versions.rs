//! Draft/publish state machine for versioned collections.
//!
//! The main document always holds the current state (`_status` is `draft`
//! or `published`). Every state change appends an immutable
//! [`VersionRecord`]; history is never rewritten.

use crate::api::Folio;
use crate::error::{EngineError, EngineResult};
use crate::operations::CollectionOperations;
use crate::validate::{Mode, validate};
use folio_model::{
    DocStatus, Document, FieldOperation, ID_FIELD, NewVersion, Operation,
    SCHEDULED_PUBLISH_FIELD, STATUS_FIELD, UPDATED_AT_FIELD, VersionRecord,
};
use folio_types::{Timestamp, VersionId};
use serde_json::Value;
use tracing::{debug, info};

/// Appends a version snapshot of document `id`.
pub(crate) async fn append_version(
    folio: &Folio,
    collection: &str,
    id: &str,
    snapshot: &Document,
    status: DocStatus,
) -> EngineResult<VersionRecord> {
    let record = folio
        .storage()
        .create_version(NewVersion {
            collection: collection.to_string(),
            parent: id.to_string(),
            snapshot: snapshot.clone(),
            status,
            scheduled_publish_at: snapshot
                .get(SCHEDULED_PUBLISH_FIELD)
                .and_then(Value::as_str)
                .and_then(|s| Timestamp::parse(s).ok()),
        })
        .await?;
    debug!(collection = %collection, id = %id, version = %record.id, status = %status, "version appended");
    Ok(record)
}

/// True when two snapshots hold the same content, ignoring bookkeeping keys.
fn same_content(a: &Document, b: &Document) -> bool {
    const IGNORED: [&str; 3] = [STATUS_FIELD, SCHEDULED_PUBLISH_FIELD, UPDATED_AT_FIELD];
    let content = |doc: &Document| -> Document {
        doc.iter()
            .filter(|(key, _)| !IGNORED.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    };
    content(a) == content(b)
}

fn status_of(doc: &Document) -> DocStatus {
    DocStatus::from_value(doc.get(STATUS_FIELD)).unwrap_or_default()
}

/// Version operations on one versioned collection.
#[derive(Debug, Clone, Copy)]
pub struct VersionManager<'a> {
    ops: CollectionOperations<'a>,
}

impl<'a> VersionManager<'a> {
    pub(crate) fn new(ops: CollectionOperations<'a>) -> Self {
        Self { ops }
    }

    fn slug(&self) -> &'a str {
        self.ops.slug()
    }

    fn folio(&self) -> &'a Folio {
        self.ops.folio()
    }

    /// Live document `id` after the managed, scope and update-access checks.
    async fn writable(&self, id: &str, data: Option<&Document>) -> EngineResult<Document> {
        self.ops.ensure_writable(Operation::Update)?;
        let existing = self.ops.fetch_live(id).await?;
        self.folio()
            .require_access(&self.ops.config().access, Operation::Update, self.slug(), Some(id), data)
            .await?;
        Ok(existing)
    }

    /// The newest version when it is a draft whose content differs from the
    /// main document.
    async fn pending_draft(&self, id: &str, main: &Document) -> EngineResult<Option<VersionRecord>> {
        let versions = self.folio().storage().find_versions(self.slug(), id).await?;
        Ok(versions
            .into_iter()
            .next()
            .filter(|v| v.status == DocStatus::Draft && !same_content(&v.snapshot, main)))
    }

    async fn output_record(&self, mut record: VersionRecord) -> EngineResult<VersionRecord> {
        let parent = record.parent.clone();
        record.snapshot = self.ops.output(record.snapshot, &parent).await?;
        Ok(record)
    }

    /// Publishes the pending draft, or the main document when there is none.
    /// A published document without a pending draft is returned unchanged.
    pub async fn publish(&self, id: &str) -> EngineResult<Document> {
        let existing = self.writable(id, None).await?;
        let pending = self.pending_draft(id, &existing).await?;
        if pending.is_none() && status_of(&existing) == DocStatus::Published {
            debug!(collection = %self.slug(), id = %id, "already published");
            return self.ops.output(existing, id).await;
        }

        let mut data = match pending {
            Some(draft) => draft.snapshot,
            None => existing,
        };
        validate(
            self.slug(),
            &self.ops.config().fields,
            &mut data,
            Mode::Create,
            Operation::Update,
            self.folio().context(),
        )
        .await?;

        data.remove(ID_FIELD);
        data.remove(SCHEDULED_PUBLISH_FIELD);
        data.insert(STATUS_FIELD.into(), Value::String(DocStatus::Published.to_string()));
        if self.ops.config().timestamps {
            data.insert(UPDATED_AT_FIELD.into(), Value::String(Timestamp::now().to_rfc3339()));
        }
        let published = self.folio().storage().update(self.slug(), id, data).await?;
        append_version(self.folio(), self.slug(), id, &published, DocStatus::Published).await?;
        info!(collection = %self.slug(), id = %id, "document published");
        self.ops.output(published, id).await
    }

    /// Returns a published document to draft. A draft is returned unchanged.
    /// A pending draft stays pending: it is re-appended after the unpublish
    /// snapshot.
    pub async fn unpublish(&self, id: &str) -> EngineResult<Document> {
        let existing = self.writable(id, None).await?;
        if status_of(&existing) == DocStatus::Draft {
            return self.ops.output(existing, id).await;
        }
        let pending = self.pending_draft(id, &existing).await?;

        let mut patch = Document::new();
        patch.insert(STATUS_FIELD.into(), Value::String(DocStatus::Draft.to_string()));
        if self.ops.config().timestamps {
            patch.insert(UPDATED_AT_FIELD.into(), Value::String(Timestamp::now().to_rfc3339()));
        }
        let doc = self.folio().storage().update(self.slug(), id, patch).await?;
        append_version(self.folio(), self.slug(), id, &doc, DocStatus::Draft).await?;
        if let Some(draft) = pending {
            append_version(self.folio(), self.slug(), id, &draft.snapshot, DocStatus::Draft).await?;
        }
        info!(collection = %self.slug(), id = %id, "document unpublished");
        self.ops.output(doc, id).await
    }

    /// Records `patch` merged over the main document as a new draft version.
    /// The main document is left untouched; required fields are not checked.
    pub async fn save_draft(&self, id: &str, patch: Document) -> EngineResult<VersionRecord> {
        let existing = self.writable(id, Some(&patch)).await?;
        let mut patch = patch;
        self.ops.strip_engine_keys(&mut patch, false);
        self.folio()
            .filter_write(
                &self.ops.config().fields,
                &mut patch,
                FieldOperation::Update,
                Some(id),
                Some(&existing),
            )
            .await?;

        let mut draft = existing;
        draft.extend(patch);
        validate(
            self.slug(),
            &self.ops.config().fields,
            &mut draft,
            Mode::Update,
            Operation::Update,
            self.folio().context(),
        )
        .await?;
        draft.insert(STATUS_FIELD.into(), Value::String(DocStatus::Draft.to_string()));

        let record = append_version(self.folio(), self.slug(), id, &draft, DocStatus::Draft).await?;
        self.output_record(record).await
    }

    /// Writes a historical snapshot back as the main document.
    pub async fn restore_version(&self, version: VersionId) -> EngineResult<Document> {
        let record = self
            .folio()
            .storage()
            .find_version_by_id(self.slug(), version)
            .await?
            .ok_or_else(|| EngineError::VersionNotFound {
                collection: self.slug().to_string(),
                id: version,
            })?;
        let id = record.parent.as_str();
        self.writable(id, Some(&record.snapshot)).await?;

        let mut data = record.snapshot.clone();
        data.remove(ID_FIELD);
        data.remove(SCHEDULED_PUBLISH_FIELD);
        data.insert(STATUS_FIELD.into(), Value::String(record.status.to_string()));
        if self.ops.config().timestamps {
            data.insert(UPDATED_AT_FIELD.into(), Value::String(Timestamp::now().to_rfc3339()));
        }
        let restored = self.folio().storage().update(self.slug(), id, data).await?;
        append_version(self.folio(), self.slug(), id, &restored, record.status).await?;
        info!(collection = %self.slug(), id = %id, version = %version, "version restored");
        self.ops.output(restored, id).await
    }

    /// Sets the instant at which the scheduler publishes `id`.
    pub async fn schedule_publish(&self, id: &str, at: Timestamp) -> EngineResult<Document> {
        self.set_schedule(id, Some(at)).await
    }

    pub async fn cancel_scheduled_publish(&self, id: &str) -> EngineResult<Document> {
        self.set_schedule(id, None).await
    }

    async fn set_schedule(&self, id: &str, at: Option<Timestamp>) -> EngineResult<Document> {
        self.writable(id, None).await?;
        self.folio()
            .storage()
            .set_scheduled_publish_at(self.slug(), id, at)
            .await?;
        match at {
            Some(at) => info!(collection = %self.slug(), id = %id, at = %at, "publish scheduled"),
            None => info!(collection = %self.slug(), id = %id, "scheduled publish cancelled"),
        }
        let doc = self.ops.fetch(id).await?;
        self.ops.output(doc, id).await
    }

    /// Version history of `id`, newest first.
    pub async fn find_versions(&self, id: &str) -> EngineResult<Vec<VersionRecord>> {
        self.folio()
            .require_access(&self.ops.config().access, Operation::Read, self.slug(), Some(id), None)
            .await?;
        self.ops.fetch(id).await?;
        let versions = self.folio().storage().find_versions(self.slug(), id).await?;
        let mut out = Vec::with_capacity(versions.len());
        for record in versions {
            out.push(self.output_record(record).await?);
        }
        Ok(out)
    }

    pub async fn find_version_by_id(&self, version: VersionId) -> EngineResult<VersionRecord> {
        let not_found = || EngineError::VersionNotFound {
            collection: self.slug().to_string(),
            id: version,
        };
        let record = self
            .folio()
            .storage()
            .find_version_by_id(self.slug(), version)
            .await?
            .ok_or_else(not_found)?;
        self.folio()
            .require_access(
                &self.ops.config().access,
                Operation::Read,
                self.slug(),
                Some(&record.parent),
                None,
            )
            .await?;
        match self.ops.fetch(&record.parent).await {
            Err(e) if e.is_not_found() => return Err(not_found()),
            other => other?,
        };
        self.output_record(record).await
    }
}
