//! Hook pipeline execution.
//!
//! A phase runs field-level hooks first (pre-order over the field tree, one
//! chain per field) and then collection-level hooks on the whole document.
//! Every hook is awaited before the next one starts.

use crate::error::{EngineError, EngineResult};
use crate::walk::{Descend, FieldRef, FieldVisitor, walk};
use async_trait::async_trait;
use folio_model::{
    CollectionHookArgs, CollectionHooks, Document, Field, FieldHookArgs, HookPhase, Operation,
    RequestContext,
};

struct FieldHookRunner {
    phase: HookPhase,
    operation: Operation,
    original_doc: Option<Document>,
    context: RequestContext,
}

#[async_trait]
impl FieldVisitor for FieldHookRunner {
    async fn visit(&mut self, field: FieldRef<'_>, data: &mut Document) -> EngineResult<Descend> {
        let hooks = field.base().hooks.get(self.phase);
        if hooks.is_empty() {
            return Ok(Descend::Into);
        }
        let name = field.name();
        let mut value = data.get(name).cloned();
        for hook in hooks {
            let args = FieldHookArgs {
                phase: self.phase,
                operation: self.operation,
                field: name.to_string(),
                value: value.clone(),
                sibling_data: data.clone(),
                original_doc: self.original_doc.clone(),
                context: self.context.clone(),
            };
            // `None` keeps the previous value.
            if let Some(next) = hook.call(args).await.map_err(EngineError::Callback)? {
                value = Some(next);
            }
        }
        if let Some(value) = value {
            data.insert(name.to_string(), value);
        }
        Ok(Descend::Into)
    }
}

/// Everything a hook phase needs besides the document itself.
pub(crate) struct HookScope<'a> {
    pub collection: &'a str,
    pub fields: &'a [Field],
    pub hooks: &'a CollectionHooks,
    pub operation: Operation,
    pub id: Option<&'a str>,
    pub original_doc: Option<&'a Document>,
    pub context: &'a RequestContext,
}

impl HookScope<'_> {
    /// Runs one phase over `data` and returns the transformed document.
    pub async fn run(&self, phase: HookPhase, mut data: Document) -> EngineResult<Document> {
        let mut runner = FieldHookRunner {
            phase,
            operation: self.operation,
            original_doc: self.original_doc.cloned(),
            context: self.context.clone(),
        };
        walk(self.fields, &mut data, &mut runner).await?;

        for hook in self.hooks.get(phase) {
            let args = CollectionHookArgs {
                phase,
                operation: self.operation,
                collection: self.collection.to_string(),
                id: self.id.map(str::to_string),
                data: data.clone(),
                original_doc: self.original_doc.cloned(),
                context: self.context.clone(),
            };
            if let Some(next) = hook.call(args).await.map_err(EngineError::Callback)? {
                data = next;
            }
        }
        Ok(data)
    }
}
