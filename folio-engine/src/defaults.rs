use crate::error::EngineResult;
use crate::walk::{Descend, FieldRef, FieldVisitor, walk};
use async_trait::async_trait;
use folio_model::{Document, Field};

/// Fills absent keys with each field's `default_value`.
struct DefaultsFiller;

#[async_trait]
impl FieldVisitor for DefaultsFiller {
    async fn visit(&mut self, field: FieldRef<'_>, data: &mut Document) -> EngineResult<Descend> {
        let base = field.base();
        if let Some(default) = &base.default_value {
            if !data.contains_key(&base.name) {
                data.insert(base.name.clone(), default.clone());
            }
        }
        Ok(Descend::Into)
    }
}

/// Applies default values across the whole tree, including group objects
/// and existing array rows.
pub(crate) async fn apply_defaults(fields: &[Field], data: &mut Document) -> EngineResult<()> {
    walk(fields, data, &mut DefaultsFiller).await
}
