//! Recursive traversal over a collection's field tree.
//!
//! Access filtering, hooks, defaults, validation and population all need
//! the same recursion over groups, arrays, blocks and layout fields. [`walk`]
//! owns that recursion; each pass only implements [`FieldVisitor::visit`]
//! for key-owning fields.
//!
//! Recursion rules:
//! - groups and named tabs descend into the nested object (created empty
//!   when absent, and kept only if a visitor filled it)
//! - arrays descend once per object row
//! - blocks descend once per row using the block selected by `blockType`;
//!   rows with a missing or unknown tag are skipped
//! - unnamed tabs, collapsibles and rows descend with the same object

use crate::error::EngineResult;
use async_trait::async_trait;
use folio_model::{
    ArrayField, BLOCK_TYPE_FIELD, BlocksField, DataField, Document, Field, FieldBase, GroupField,
    Tab,
};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::trace;

/// A key-owning field as seen by a visitor.
#[derive(Debug, Clone, Copy)]
pub enum FieldRef<'a> {
    Data(&'a DataField),
    /// A group field or a named tab.
    Group(&'a GroupField),
    Array(&'a ArrayField),
    Blocks(&'a BlocksField),
}

impl<'a> FieldRef<'a> {
    pub fn base(self) -> &'a FieldBase {
        match self {
            Self::Data(f) => &f.base,
            Self::Group(f) => &f.base,
            Self::Array(f) => &f.base,
            Self::Blocks(f) => &f.base,
        }
    }

    pub fn name(self) -> &'a str {
        &self.base().name
    }
}

/// Whether the walk should recurse into a container after visiting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descend {
    Into,
    Skip,
}

/// One pass over the field tree.
#[async_trait]
pub trait FieldVisitor: Send {
    /// Called pre-order for every key-owning field. `data` is the object
    /// that directly contains the field (the document, a group object or an
    /// array/blocks row).
    async fn visit(&mut self, field: FieldRef<'_>, data: &mut Document) -> EngineResult<Descend>;
}

/// Walks `fields` over `data`, calling `visitor` for every key-owning field.
pub fn walk<'a>(
    fields: &'a [Field],
    data: &'a mut Document,
    visitor: &'a mut dyn FieldVisitor,
) -> BoxFuture<'a, EngineResult<()>> {
    async move {
        for field in fields {
            match field {
                Field::Data(f) => {
                    visitor.visit(FieldRef::Data(f), data).await?;
                }
                Field::Group(group) => walk_group(group, data, visitor).await?,
                Field::Array(array) => {
                    if visitor.visit(FieldRef::Array(array), data).await? == Descend::Skip {
                        continue;
                    }
                    if let Some(Value::Array(rows)) = data.get_mut(&array.base.name) {
                        for row in rows.iter_mut() {
                            if let Value::Object(row) = row {
                                walk(&array.fields, row, &mut *visitor).await?;
                            }
                        }
                    }
                }
                Field::Blocks(blocks) => {
                    if visitor.visit(FieldRef::Blocks(blocks), data).await? == Descend::Skip {
                        continue;
                    }
                    if let Some(Value::Array(rows)) = data.get_mut(&blocks.base.name) {
                        for row in rows.iter_mut() {
                            let Value::Object(row) = row else { continue };
                            let Some(block) = row
                                .get(BLOCK_TYPE_FIELD)
                                .and_then(Value::as_str)
                                .and_then(|slug| blocks.block(slug))
                            else {
                                trace!(field = %blocks.base.name, "skipping row with unknown block type");
                                continue;
                            };
                            walk(&block.fields, row, &mut *visitor).await?;
                        }
                    }
                }
                Field::Tabs(tabs) => {
                    for tab in &tabs.tabs {
                        match tab {
                            Tab::Named(group) => walk_group(group, data, &mut *visitor).await?,
                            Tab::Unnamed { fields, .. } => walk(fields, data, &mut *visitor).await?,
                        }
                    }
                }
                Field::Collapsible(layout) | Field::Row(layout) => {
                    walk(&layout.fields, data, &mut *visitor).await?
                }
            }
        }
        Ok(())
    }
    .boxed()
}

async fn walk_group(
    group: &GroupField,
    data: &mut Document,
    visitor: &mut dyn FieldVisitor,
) -> EngineResult<()> {
    if visitor.visit(FieldRef::Group(group), data).await? == Descend::Skip {
        return Ok(());
    }
    let name = &group.base.name;
    match data.get_mut(name) {
        Some(Value::Object(nested)) => walk(&group.fields, nested, visitor).await,
        None | Some(Value::Null) => {
            let mut nested = Document::new();
            walk(&group.fields, &mut nested, visitor).await?;
            if !nested.is_empty() {
                data.insert(name.clone(), Value::Object(nested));
            }
            Ok(())
        }
        // Wrong shape; validation reports it.
        Some(_) => Ok(()),
    }
}
