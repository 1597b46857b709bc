//! The polymorphic field tree.
//!
//! Every field is exactly one of:
//! - a **data** field ([`DataField`]) holding a scalar, JSON or reference
//!   value under its own key;
//! - a **container** ([`GroupField`], [`ArrayField`], [`BlocksField`]) holding
//!   nested sub-documents under its own key;
//! - a **layout** field ([`TabsField`], collapsible, row) that owns no key
//!   and splices its children into the parent's namespace. Named tabs are the
//!   exception and are modelled as groups ([`Tab::Named`]).

use crate::{FieldAccess, FieldAccessFn, FieldHook, FieldHooks, FieldOperation, FieldValidator, HookPhase};
use regex::Regex;
use serde_json::Value;

/// Properties shared by every field that owns a key in the document.
#[derive(Debug, Clone, Default)]
pub struct FieldBase {
    pub name: String,
    pub label: Option<String>,
    pub required: bool,
    /// Value applied on create when the key is absent.
    pub default_value: Option<Value>,
    pub access: FieldAccess,
    pub hooks: FieldHooks,
    pub validate: Option<FieldValidator>,
}

impl FieldBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Constraints for text fields.
#[derive(Debug, Clone, Default)]
pub struct TextOptions {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Regular expression the whole value must match.
    pub pattern: Option<TextPattern>,
}

/// A text pattern compiled once, when the field is declared. A pattern that
/// fails to compile is reported by [`Schema::validate`](crate::Schema::validate).
#[derive(Debug, Clone)]
pub struct TextPattern {
    source: String,
    compiled: Result<Regex, regex::Error>,
}

impl TextPattern {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let compiled = Regex::new(&format!("^(?:{source})$"));
        Self { source, compiled }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The anchored regex, or `None` when the pattern did not compile.
    pub fn regex(&self) -> Option<&Regex> {
        self.compiled.as_ref().ok()
    }

    pub fn error(&self) -> Option<&regex::Error> {
        self.compiled.as_ref().err()
    }
}

/// Constraints for number fields.
#[derive(Debug, Clone, Default)]
pub struct NumberOptions {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub integer: bool,
}

/// Allowed values for select fields.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    pub options: Vec<String>,
    pub has_many: bool,
}

/// Target(s) of a relationship field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationTo {
    /// Values are plain ids into one collection.
    One(String),
    /// Values are `{"relationTo": slug, "value": id}` objects (polymorphic).
    Many(Vec<String>),
}

impl RelationTo {
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Self::One(slug) => vec![slug.as_str()],
            Self::Many(slugs) => slugs.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        matches!(self, Self::Many(_))
    }
}

/// Options for relationship fields.
#[derive(Debug, Clone)]
pub struct RelationshipOptions {
    pub relation_to: RelationTo,
    pub has_many: bool,
    /// Caps population depth below this field.
    pub max_depth: Option<u32>,
}

/// The value type of a data field.
#[derive(Debug, Clone)]
pub enum FieldType {
    Text(TextOptions),
    Email,
    Number(NumberOptions),
    Checkbox,
    /// RFC 3339 date-time string.
    Date,
    Select(SelectOptions),
    Json,
    /// `[longitude, latitude]`.
    Point,
    Relationship(RelationshipOptions),
}

/// A leaf field holding one value under its own key.
#[derive(Debug, Clone)]
pub struct DataField {
    pub base: FieldBase,
    pub field_type: FieldType,
}

/// Nests a sub-document under its own key.
#[derive(Debug, Clone)]
pub struct GroupField {
    pub base: FieldBase,
    pub fields: Vec<Field>,
}

/// Repeatable list of sub-documents sharing one schema.
#[derive(Debug, Clone)]
pub struct ArrayField {
    pub base: FieldBase,
    pub fields: Vec<Field>,
    pub min_rows: Option<usize>,
    pub max_rows: Option<usize>,
}

/// One named sub-schema of a blocks field.
#[derive(Debug, Clone)]
pub struct Block {
    pub slug: String,
    pub fields: Vec<Field>,
}

impl Block {
    pub fn new(slug: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            slug: slug.into(),
            fields,
        }
    }
}

/// Repeatable list of sub-documents; each row's `blockType` selects a block.
#[derive(Debug, Clone)]
pub struct BlocksField {
    pub base: FieldBase,
    pub blocks: Vec<Block>,
    pub min_rows: Option<usize>,
    pub max_rows: Option<usize>,
}

impl BlocksField {
    /// Looks up the block schema for a row discriminant.
    pub fn block(&self, slug: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.slug == slug)
    }
}

/// One tab of a tabs field.
#[derive(Debug, Clone)]
pub enum Tab {
    /// Stores its children under its own name, exactly like a group.
    Named(GroupField),
    /// Splices its children into the parent's namespace.
    Unnamed { label: String, fields: Vec<Field> },
}

impl Tab {
    pub fn named(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::Named(GroupField {
            base: FieldBase::new(name),
            fields,
        })
    }

    pub fn unnamed(label: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::Unnamed {
            label: label.into(),
            fields,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TabsField {
    pub tabs: Vec<Tab>,
}

/// Layout-only wrapper (collapsible, row).
#[derive(Debug, Clone)]
pub struct LayoutField {
    pub label: Option<String>,
    pub fields: Vec<Field>,
}

/// A node in a collection's field tree.
#[derive(Debug, Clone)]
pub enum Field {
    Data(DataField),
    Group(GroupField),
    Array(ArrayField),
    Blocks(BlocksField),
    Tabs(TabsField),
    Collapsible(LayoutField),
    Row(LayoutField),
}

impl Field {
    fn data(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::Data(DataField {
            base: FieldBase::new(name),
            field_type,
        })
    }

    /// Shorthand for an unconstrained text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::data(name, FieldType::Text(TextOptions::default()))
    }

    pub fn email(name: impl Into<String>) -> Self {
        Self::data(name, FieldType::Email)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::data(name, FieldType::Number(NumberOptions::default()))
    }

    pub fn checkbox(name: impl Into<String>) -> Self {
        Self::data(name, FieldType::Checkbox)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::data(name, FieldType::Date)
    }

    /// Shorthand for a single-choice select field.
    pub fn select<I, S>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::data(
            name,
            FieldType::Select(SelectOptions {
                options: options.into_iter().map(Into::into).collect(),
                has_many: false,
            }),
        )
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::data(name, FieldType::Json)
    }

    pub fn point(name: impl Into<String>) -> Self {
        Self::data(name, FieldType::Point)
    }

    /// Shorthand for a single relationship into `target`.
    pub fn relationship(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::data(
            name,
            FieldType::Relationship(RelationshipOptions {
                relation_to: RelationTo::One(target.into()),
                has_many: false,
                max_depth: None,
            }),
        )
    }

    /// Shorthand for a polymorphic relationship into any of `targets`.
    pub fn polymorphic<I, S>(name: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::data(
            name,
            FieldType::Relationship(RelationshipOptions {
                relation_to: RelationTo::Many(targets.into_iter().map(Into::into).collect()),
                has_many: false,
                max_depth: None,
            }),
        )
    }

    pub fn group(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::Group(GroupField {
            base: FieldBase::new(name),
            fields,
        })
    }

    pub fn array(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::Array(ArrayField {
            base: FieldBase::new(name),
            fields,
            min_rows: None,
            max_rows: None,
        })
    }

    pub fn blocks(name: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self::Blocks(BlocksField {
            base: FieldBase::new(name),
            blocks,
            min_rows: None,
            max_rows: None,
        })
    }

    pub fn tabs(tabs: Vec<Tab>) -> Self {
        Self::Tabs(TabsField { tabs })
    }

    pub fn collapsible(label: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::Collapsible(LayoutField {
            label: Some(label.into()),
            fields,
        })
    }

    pub fn row(fields: Vec<Field>) -> Self {
        Self::Row(LayoutField {
            label: None,
            fields,
        })
    }

    // ── Inspection ──────────────────────────────────────────────

    /// Shared properties of a key-owning field; `None` for layout fields.
    pub fn base(&self) -> Option<&FieldBase> {
        match self {
            Self::Data(f) => Some(&f.base),
            Self::Group(f) => Some(&f.base),
            Self::Array(f) => Some(&f.base),
            Self::Blocks(f) => Some(&f.base),
            Self::Tabs(_) | Self::Collapsible(_) | Self::Row(_) => None,
        }
    }

    pub fn base_mut(&mut self) -> Option<&mut FieldBase> {
        match self {
            Self::Data(f) => Some(&mut f.base),
            Self::Group(f) => Some(&mut f.base),
            Self::Array(f) => Some(&mut f.base),
            Self::Blocks(f) => Some(&mut f.base),
            Self::Tabs(_) | Self::Collapsible(_) | Self::Row(_) => None,
        }
    }

    /// Key this field owns in the document, if any.
    pub fn name(&self) -> Option<&str> {
        self.base().map(|b| b.name.as_str())
    }

    pub fn is_layout(&self) -> bool {
        self.base().is_none()
    }

    // ── Builders ────────────────────────────────────────────────
    //
    // Builders that do not apply to the receiving variant leave it unchanged.

    pub fn required(mut self) -> Self {
        if let Some(base) = self.base_mut() {
            base.required = true;
        }
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        match &mut self {
            Self::Collapsible(layout) | Self::Row(layout) => layout.label = Some(label.into()),
            other => {
                if let Some(base) = other.base_mut() {
                    base.label = Some(label.into());
                }
            }
        }
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        if let Some(base) = self.base_mut() {
            base.default_value = Some(value);
        }
        self
    }

    pub fn access(mut self, operation: FieldOperation, predicate: FieldAccessFn) -> Self {
        if let Some(base) = self.base_mut() {
            base.access.set(operation, predicate);
        }
        self
    }

    pub fn hook(mut self, phase: HookPhase, hook: FieldHook) -> Self {
        if let Some(base) = self.base_mut() {
            base.hooks.push(phase, hook);
        }
        self
    }

    pub fn validate(mut self, validator: FieldValidator) -> Self {
        if let Some(base) = self.base_mut() {
            base.validate = Some(validator);
        }
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        if let Self::Data(DataField { field_type: FieldType::Text(opts), .. }) = &mut self {
            opts.min_length = Some(len);
        }
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        if let Self::Data(DataField { field_type: FieldType::Text(opts), .. }) = &mut self {
            opts.max_length = Some(len);
        }
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        if let Self::Data(DataField { field_type: FieldType::Text(opts), .. }) = &mut self {
            opts.pattern = Some(TextPattern::new(pattern));
        }
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        if let Self::Data(DataField { field_type: FieldType::Number(opts), .. }) = &mut self {
            opts.min = Some(min);
        }
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        if let Self::Data(DataField { field_type: FieldType::Number(opts), .. }) = &mut self {
            opts.max = Some(max);
        }
        self
    }

    pub fn integer(mut self) -> Self {
        if let Self::Data(DataField { field_type: FieldType::Number(opts), .. }) = &mut self {
            opts.integer = true;
        }
        self
    }

    /// Turns a select or relationship field into a list-valued one.
    pub fn has_many(mut self) -> Self {
        if let Self::Data(data) = &mut self {
            match &mut data.field_type {
                FieldType::Select(opts) => opts.has_many = true,
                FieldType::Relationship(opts) => opts.has_many = true,
                _ => {}
            }
        }
        self
    }

    /// Caps population depth below a relationship field.
    pub fn max_depth(mut self, depth: u32) -> Self {
        if let Self::Data(DataField { field_type: FieldType::Relationship(opts), .. }) = &mut self {
            opts.max_depth = Some(depth);
        }
        self
    }

    pub fn min_rows(mut self, rows: usize) -> Self {
        match &mut self {
            Self::Array(f) => f.min_rows = Some(rows),
            Self::Blocks(f) => f.min_rows = Some(rows),
            _ => {}
        }
        self
    }

    pub fn max_rows(mut self, rows: usize) -> Self {
        match &mut self {
            Self::Array(f) => f.max_rows = Some(rows),
            Self::Blocks(f) => f.max_rows = Some(rows),
            _ => {}
        }
        self
    }
}
