//! Storage-facing filter and query types.
//!
//! `Where` is a small boolean filter language over dotted document paths.
//! The engine builds `Where` trees (soft-delete filtering, default scopes)
//! and backends either translate them to their own query language or
//! evaluate them directly with [`Where::matches`].

use crate::{Document, DocumentExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// A filter over documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Where {
    And(Vec<Where>),
    Or(Vec<Where>),
    /// Structural equality. `Value::Null` also matches an absent key.
    Equals { field: String, value: Value },
    NotEquals { field: String, value: Value },
    /// Field value (or any element of a list value) is one of `values`.
    In { field: String, values: Vec<Value> },
    /// `exists: false` matches absent keys and explicit nulls.
    Exists { field: String, exists: bool },
    /// Case-insensitive substring for strings; element match for lists.
    Contains { field: String, value: String },
    GreaterThan { field: String, value: Value },
    LessThan { field: String, value: Value },
}

impl Where {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::NotEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn in_values(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::In {
            field: field.into(),
            values,
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists {
            field: field.into(),
            exists: true,
        }
    }

    /// Matches documents where `field` is absent or null.
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::Exists {
            field: field.into(),
            exists: false,
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn greater_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::GreaterThan {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn less_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::LessThan {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Combines two filters with AND, flattening nested conjunctions.
    pub fn and(self, other: Where) -> Self {
        let mut clauses = match self {
            Self::And(clauses) => clauses,
            single => vec![single],
        };
        match other {
            Self::And(more) => clauses.extend(more),
            single => clauses.push(single),
        }
        Self::And(clauses)
    }

    /// Combines optional filters with AND.
    pub fn and_all(filters: impl IntoIterator<Item = Option<Where>>) -> Option<Where> {
        filters
            .into_iter()
            .flatten()
            .reduce(|acc, next| acc.and(next))
    }

    /// Evaluates the filter against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::And(clauses) => clauses.iter().all(|c| c.matches(doc)),
            Self::Or(clauses) => clauses.iter().any(|c| c.matches(doc)),
            Self::Equals { field, value } => value_equals(doc.get_path(field), value),
            Self::NotEquals { field, value } => !value_equals(doc.get_path(field), value),
            Self::In { field, values } => match doc.get_path(field) {
                Some(Value::Array(items)) => items.iter().any(|item| values.contains(item)),
                Some(found) => values.contains(found),
                None => values.contains(&Value::Null),
            },
            Self::Exists { field, exists } => {
                let present = !matches!(doc.get_path(field), None | Some(Value::Null));
                present == *exists
            }
            Self::Contains { field, value } => match doc.get_path(field) {
                Some(Value::String(s)) => s.to_lowercase().contains(&value.to_lowercase()),
                Some(Value::Array(items)) => items.iter().any(|item| match item {
                    Value::String(s) => s.eq_ignore_ascii_case(value),
                    _ => false,
                }),
                _ => false,
            },
            Self::GreaterThan { field, value } => doc
                .get_path(field)
                .is_some_and(|found| compare_scalars(found, value) == Some(Ordering::Greater)),
            Self::LessThan { field, value } => doc
                .get_path(field)
                .is_some_and(|found| compare_scalars(found, value) == Some(Ordering::Less)),
        }
    }
}

fn value_equals(found: Option<&Value>, expected: &Value) -> bool {
    match (found, expected) {
        (None, Value::Null) => true,
        (None, _) => false,
        // serde_json equality is structural, so composite scope values
        // (lists, objects) compare element by element.
        (Some(found), expected) => found == expected,
    }
}

fn compare_scalars(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order used for sorting: absent/null values sort last, then values
/// are grouped by type (bool, number, string, other).
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            Some(Value::Bool(_)) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(Value::Array(_)) | Some(Value::Object(_)) => 3,
            None | Some(Value::Null) => 4,
        }
    }
    match (a, b) {
        (Some(x), Some(y)) => compare_scalars(x, y).unwrap_or_else(|| rank(a).cmp(&rank(b))),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Sort specification: `"field"` ascending, `"-field"` descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(field) => Self::desc(field),
            None => Self::asc(spec),
        }
    }

    /// Compares two documents by this sort key.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = compare_values(a.get_path(&self.field), b.get_path(&self.field));
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// A storage query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Where>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
    /// Page size; `None` returns every match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

fn default_page() -> usize {
    1
}

impl Query {
    pub fn new() -> Self {
        Self {
            page: 1,
            ..Default::default()
        }
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
        self.page = page.max(1);
        self
    }

    pub fn locale(mut self, locale: Option<String>) -> Self {
        self.locale = locale;
        self
    }

    /// Number of matches to skip for the requested page.
    pub fn offset(&self) -> usize {
        self.limit
            .map(|limit| limit.saturating_mul(self.page.max(1) - 1))
            .unwrap_or(0)
    }
}
