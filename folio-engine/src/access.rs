//! Access evaluation.
//!
//! Collection-level predicates gate whole operations and raise
//! [`EngineError::AccessDenied`]. Field-level predicates never raise: they
//! silently drop disallowed keys from incoming payloads and outgoing
//! documents. Both layers treat a missing predicate as "allow".

use crate::error::{EngineError, EngineResult};
use crate::walk::{Descend, FieldRef, FieldVisitor, walk};
use async_trait::async_trait;
use folio_model::{
    AccessArgs, CollectionAccess, Document, Field, FieldAccessArgs, FieldBase, FieldOperation,
    Operation, RequestContext, Tab,
};
use tracing::trace;

/// Evaluates the collection-level predicate for `operation`.
pub(crate) async fn allows(access: &CollectionAccess, operation: Operation, args: AccessArgs) -> EngineResult<bool> {
    match access.get(operation) {
        Some(predicate) => predicate.check(args).await.map_err(EngineError::Callback),
        None => Ok(true),
    }
}

/// Like [`allows`], but raises `AccessDenied` on a `false` verdict.
pub(crate) async fn require(
    access: &CollectionAccess,
    operation: Operation,
    collection: &str,
    args: AccessArgs,
) -> EngineResult<()> {
    if allows(access, operation, args).await? {
        Ok(())
    } else {
        trace!(collection, %operation, "collection access denied");
        Err(EngineError::denied(operation, collection))
    }
}

/// Removes fields the caller may not see or write.
struct FieldFilter {
    operation: FieldOperation,
    context: RequestContext,
    id: Option<String>,
    doc: Option<Document>,
}

#[async_trait]
impl FieldVisitor for FieldFilter {
    async fn visit(&mut self, field: FieldRef<'_>, data: &mut Document) -> EngineResult<Descend> {
        let name = field.name();
        if !data.contains_key(name) {
            return Ok(Descend::Skip);
        }
        let Some(predicate) = field.base().access.get(self.operation) else {
            return Ok(Descend::Into);
        };
        let allowed = predicate
            .check(FieldAccessArgs {
                context: self.context.clone(),
                id: self.id.clone(),
                sibling_data: data.clone(),
                doc: self.doc.clone(),
            })
            .await
            .map_err(EngineError::Callback)?;
        if allowed {
            Ok(Descend::Into)
        } else {
            data.remove(name);
            Ok(Descend::Skip)
        }
    }
}

/// Applies field-level `operation` predicates to `data` in place.
///
/// `doc` is the whole stored document, when one exists.
pub(crate) async fn filter_fields(
    fields: &[Field],
    data: &mut Document,
    operation: FieldOperation,
    context: &RequestContext,
    id: Option<&str>,
    doc: Option<&Document>,
) -> EngineResult<()> {
    let mut filter = FieldFilter {
        operation,
        context: context.clone(),
        id: id.map(str::to_string),
        doc: doc.cloned(),
    };
    walk(fields, data, &mut filter).await
}

/// True when any field in the tree carries a predicate for `operation`.
pub(crate) fn has_field_predicates(fields: &[Field], operation: FieldOperation) -> bool {
    let guarded = |base: &FieldBase| base.access.get(operation).is_some();
    fields.iter().any(|field| match field {
        Field::Data(f) => guarded(&f.base),
        Field::Group(f) => guarded(&f.base) || has_field_predicates(&f.fields, operation),
        Field::Array(f) => guarded(&f.base) || has_field_predicates(&f.fields, operation),
        Field::Blocks(f) => {
            guarded(&f.base)
                || f.blocks
                    .iter()
                    .any(|block| has_field_predicates(&block.fields, operation))
        }
        Field::Tabs(tabs) => tabs.tabs.iter().any(|tab| match tab {
            Tab::Named(group) => {
                guarded(&group.base) || has_field_predicates(&group.fields, operation)
            }
            Tab::Unnamed { fields, .. } => has_field_predicates(fields, operation),
        }),
        Field::Collapsible(layout) | Field::Row(layout) => {
            has_field_predicates(&layout.fields, operation)
        }
    })
}
