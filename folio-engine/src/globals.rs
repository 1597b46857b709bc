use crate::api::Folio;
use crate::error::EngineResult;
use crate::hooks::HookScope;
use crate::validate::{Mode, validate};
use folio_model::{
    CREATED_AT_FIELD, Document, FieldOperation, GlobalConfig, HookPhase, ID_FIELD, Operation,
    UPDATED_AT_FIELD,
};
use folio_types::Timestamp;
use serde_json::Value;
use tracing::debug;

/// Read/update surface of one global (singleton document).
#[derive(Debug, Clone, Copy)]
pub struct GlobalOperations<'a> {
    folio: &'a Folio,
    config: &'a GlobalConfig,
}

impl<'a> GlobalOperations<'a> {
    pub(crate) fn new(folio: &'a Folio, config: &'a GlobalConfig) -> Self {
        Self { folio, config }
    }

    pub fn slug(&self) -> &'a str {
        &self.config.slug
    }

    fn hooks<'b>(&'b self, operation: Operation, original_doc: Option<&'b Document>) -> HookScope<'b> {
        HookScope {
            collection: &self.config.slug,
            fields: &self.config.fields,
            hooks: &self.config.hooks,
            operation,
            id: None,
            original_doc,
            context: self.folio.context(),
        }
    }

    /// Reads the global; an unset global reads as an empty document.
    pub async fn find(&self, depth: Option<u32>) -> EngineResult<Document> {
        self.folio
            .require_access(&self.config.access, Operation::Read, self.slug(), None, None)
            .await?;
        let doc = self
            .folio
            .storage()
            .find_global(self.slug())
            .await?
            .unwrap_or_default();

        let hooks = self.hooks(Operation::Read, None);
        let mut doc = hooks.run(HookPhase::BeforeRead, doc).await?;
        self.folio
            .filter_read(&self.config.fields, &mut doc, None)
            .await?;
        let depth = self.folio.config().clamp_depth(depth);
        self.folio
            .populate(&self.config.fields, &mut doc, depth)
            .await?;
        debug!(global = %self.slug(), "global read");
        hooks.run(HookPhase::AfterRead, doc).await
    }

    /// Merges `patch` into the global, creating it on first write.
    pub async fn update(&self, patch: Document) -> EngineResult<Document> {
        self.folio
            .require_access(&self.config.access, Operation::Update, self.slug(), None, Some(&patch))
            .await?;
        let existing = self
            .folio
            .storage()
            .find_global(self.slug())
            .await?
            .unwrap_or_default();

        let mut patch = patch;
        for key in [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD] {
            patch.remove(key);
        }
        self.folio
            .filter_write(
                &self.config.fields,
                &mut patch,
                FieldOperation::Update,
                None,
                Some(&existing),
            )
            .await?;
        let mut data = existing.clone();
        data.extend(patch);

        let hooks = self.hooks(Operation::Update, Some(&existing));
        let mut data = hooks.run(HookPhase::BeforeValidate, data).await?;
        validate(
            self.slug(),
            &self.config.fields,
            &mut data,
            Mode::Update,
            Operation::Update,
            self.folio.context(),
        )
        .await?;
        let mut data = hooks.run(HookPhase::BeforeChange, data).await?;
        data.insert(
            UPDATED_AT_FIELD.into(),
            Value::String(Timestamp::now().to_rfc3339()),
        );

        let updated = self.folio.storage().update_global(self.slug(), data).await?;
        let mut doc = hooks.run(HookPhase::AfterChange, updated).await?;
        self.folio
            .filter_read(&self.config.fields, &mut doc, None)
            .await?;
        debug!(global = %self.slug(), "global updated");
        Ok(doc)
    }
}
