//! Relationship population.
//!
//! Replaces relationship ids with the referenced documents, hop by hop, up
//! to a bounded depth. Every failure along the way (denied read, missing or
//! out-of-scope target, soft-deleted target, storage error) leaves the
//! original id in place instead of failing the read.

use crate::api::Folio;
use crate::error::{EngineError, EngineResult};
use crate::walk::{Descend, FieldRef, FieldVisitor, walk};
use async_trait::async_trait;
use folio_model::{
    DataField, Document, Field, FieldType, Operation, RELATION_TO_KEY, RELATION_VALUE_KEY,
    RelationTo, RelationshipOptions,
};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

/// Populates relationships in `doc` to `depth` hops.
pub(crate) async fn populate(
    folio: &Folio,
    fields: &[Field],
    doc: &mut Document,
    depth: u32,
) -> EngineResult<()> {
    if depth == 0 {
        return Ok(());
    }
    let mut populator = Populator { folio, depth };
    walk(fields, doc, &mut populator).await
}

struct Populator<'a> {
    folio: &'a Folio,
    depth: u32,
}

fn reference_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Populator<'_> {
    async fn resolve_value(&self, opts: &RelationshipOptions, value: Value, depth: u32) -> Value {
        match &opts.relation_to {
            // Objects are already populated and pass through.
            RelationTo::One(target) => match reference_id(&value) {
                Some(id) => match self.resolve(target, &id, depth).await {
                    Some(doc) => Value::Object(doc),
                    None => value,
                },
                None => value,
            },
            RelationTo::Many(targets) => {
                let Value::Object(mut reference) = value else {
                    return value;
                };
                let target = reference
                    .get(RELATION_TO_KEY)
                    .and_then(Value::as_str)
                    .filter(|slug| targets.iter().any(|t| t == slug))
                    .map(str::to_string);
                let id = reference.get(RELATION_VALUE_KEY).and_then(reference_id);
                if let (Some(target), Some(id)) = (target, id) {
                    if let Some(doc) = self.resolve(&target, &id, depth).await {
                        reference.insert(RELATION_VALUE_KEY.to_string(), Value::Object(doc));
                    }
                }
                Value::Object(reference)
            }
        }
    }

    async fn resolve(&self, target: &str, id: &str, depth: u32) -> Option<Document> {
        match self.fetch(target, id, depth).await {
            Ok(Some(doc)) => Some(doc),
            Ok(None) => {
                debug!(collection = %target, id = %id, "relationship target unavailable");
                None
            }
            Err(e) => {
                warn!(collection = %target, id = %id, error = %e, "relationship left unpopulated");
                None
            }
        }
    }

    async fn fetch(&self, target: &str, id: &str, depth: u32) -> EngineResult<Option<Document>> {
        let folio = self.folio;
        let config = folio.collection_config(target)?;
        if !folio.has_access(&config.access, Operation::Read, Some(id)).await? {
            return Err(EngineError::denied(Operation::Read, target));
        }
        let Some(mut doc) = folio.storage().find_by_id(target, id).await? else {
            return Ok(None);
        };
        if !folio.in_scope(config, &doc) {
            return Ok(None);
        }
        let trashed = config
            .deleted_at_field()
            .is_some_and(|field| !matches!(doc.get(field), None | Some(Value::Null)));
        if trashed {
            return Ok(None);
        }
        folio.filter_read(&config.fields, &mut doc, Some(id)).await?;
        populate(folio, &config.fields, &mut doc, depth.saturating_sub(1)).await?;
        Ok(Some(doc))
    }
}

#[async_trait]
impl FieldVisitor for Populator<'_> {
    async fn visit(&mut self, field: FieldRef<'_>, data: &mut Document) -> EngineResult<Descend> {
        let FieldRef::Data(DataField {
            base,
            field_type: FieldType::Relationship(opts),
        }) = field
        else {
            return Ok(Descend::Into);
        };
        let depth = opts.max_depth.map_or(self.depth, |cap| self.depth.min(cap));
        if depth == 0 {
            return Ok(Descend::Into);
        }
        let Some(slot) = data.get_mut(&base.name) else {
            return Ok(Descend::Into);
        };

        let value = slot.take();
        *slot = match value {
            Value::Array(items) if opts.has_many => {
                let this = &*self;
                let resolved = join_all(
                    items
                        .into_iter()
                        .map(|item| this.resolve_value(opts, item, depth)),
                )
                .await;
                Value::Array(resolved)
            }
            Value::Null => Value::Null,
            other => self.resolve_value(opts, other, depth).await,
        };
        Ok(Descend::Into)
    }
}
