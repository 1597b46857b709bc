//! Field validation.
//!
//! Every error across the tree is collected first; the caller raises one
//! [`EngineError::ValidationFailed`] carrying all of them. Errors inside
//! nested rows are reported against the bare field name.

use crate::error::{EngineError, EngineResult, FieldError};
use crate::walk::{Descend, FieldRef, FieldVisitor, walk};
use async_trait::async_trait;
use folio_model::{
    BLOCK_TYPE_FIELD, Document, Field, FieldBase, FieldType, NumberOptions, Operation,
    RELATION_TO_KEY, RELATION_VALUE_KEY, RelationTo, RelationshipOptions, RequestContext,
    SelectOptions, TextOptions, ValidateArgs, is_empty_value,
};
use folio_types::Timestamp;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
});

/// Which checks a validation pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Required fields plus constraints.
    Create,
    /// Constraints only (updates, draft saves, globals).
    Update,
}

struct Validator {
    mode: Mode,
    operation: Operation,
    context: RequestContext,
    errors: Vec<FieldError>,
}

impl Validator {
    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    async fn run_custom(&mut self, base: &FieldBase, value: &Value, data: &Document) -> EngineResult<()> {
        let Some(validator) = &base.validate else {
            return Ok(());
        };
        let verdict = validator
            .validate(ValidateArgs {
                field: base.name.clone(),
                value: value.clone(),
                sibling_data: data.clone(),
                operation: self.operation,
                context: self.context.clone(),
            })
            .await
            .map_err(EngineError::Callback)?;
        if let Err(message) = verdict {
            self.error(&base.name, message);
        }
        Ok(())
    }

    fn check_rows(&mut self, name: &str, value: &Value, min: Option<usize>, max: Option<usize>) -> bool {
        let Value::Array(rows) = value else {
            self.error(name, "must be a list of rows");
            return false;
        };
        if rows.iter().any(|row| !row.is_object()) {
            self.error(name, "every row must be an object");
        }
        match (min, max) {
            (Some(min), _) if rows.len() < min => {
                self.error(name, format!("requires at least {min} rows"))
            }
            (_, Some(max)) if rows.len() > max => {
                self.error(name, format!("allows at most {max} rows"))
            }
            _ => {}
        }
        true
    }
}

#[async_trait]
impl FieldVisitor for Validator {
    async fn visit(&mut self, field: FieldRef<'_>, data: &mut Document) -> EngineResult<Descend> {
        let base = field.base();
        let name = base.name.as_str();
        let value = data.get(name);

        if is_empty_value(value) {
            if base.required && self.mode == Mode::Create {
                self.error(name, "This field is required.");
            }
            // Descend anyway so required children of an absent group report.
            return Ok(Descend::Into);
        }
        let Some(value) = value.cloned() else {
            return Ok(Descend::Into);
        };

        let descend = match field {
            FieldRef::Data(f) => {
                if let Some(message) = check_data(&f.field_type, &value) {
                    self.error(name, message);
                }
                Descend::Into
            }
            FieldRef::Group(_) => {
                if value.is_object() {
                    Descend::Into
                } else {
                    self.error(name, "must be an object");
                    Descend::Skip
                }
            }
            FieldRef::Array(f) => {
                if self.check_rows(name, &value, f.min_rows, f.max_rows) {
                    Descend::Into
                } else {
                    Descend::Skip
                }
            }
            FieldRef::Blocks(f) => {
                if !self.check_rows(name, &value, f.min_rows, f.max_rows) {
                    Descend::Skip
                } else {
                    let unknown = value.as_array().into_iter().flatten().any(|row| {
                        row.get(BLOCK_TYPE_FIELD)
                            .and_then(Value::as_str)
                            .and_then(|slug| f.block(slug))
                            .is_none()
                    });
                    if unknown {
                        self.error(name, "every row needs a known blockType");
                    }
                    Descend::Into
                }
            }
        };

        self.run_custom(base, &value, data).await?;
        Ok(descend)
    }
}

fn check_data(field_type: &FieldType, value: &Value) -> Option<String> {
    match field_type {
        FieldType::Text(opts) => check_text(opts, value),
        FieldType::Email => match value.as_str() {
            Some(s) if EMAIL_REGEX.is_match(s) => None,
            _ => Some("must be a valid email address".into()),
        },
        FieldType::Number(opts) => check_number(opts, value),
        FieldType::Checkbox => (!value.is_boolean()).then(|| "must be true or false".into()),
        FieldType::Date => match value.as_str().map(Timestamp::parse) {
            Some(Ok(_)) => None,
            _ => Some("must be an RFC 3339 date".into()),
        },
        FieldType::Select(opts) => check_select(opts, value),
        FieldType::Json => None,
        FieldType::Point => check_point(value),
        FieldType::Relationship(opts) => check_relationship(opts, value),
    }
}

fn check_text(opts: &TextOptions, value: &Value) -> Option<String> {
    let Some(text) = value.as_str() else {
        return Some("must be a string".into());
    };
    let len = text.chars().count();
    match (opts.min_length, opts.max_length) {
        (Some(min), _) if len < min => return Some(format!("must be at least {min} characters")),
        (_, Some(max)) if len > max => return Some(format!("must be at most {max} characters")),
        _ => {}
    }
    if let Some(pattern) = &opts.pattern {
        match pattern.regex() {
            Some(re) if re.is_match(text) => {}
            Some(_) => return Some(format!("must match pattern {}", pattern.source())),
            None => return Some(format!("has an invalid pattern: {}", pattern.source())),
        }
    }
    None
}

fn check_number(opts: &NumberOptions, value: &Value) -> Option<String> {
    let Some(n) = value.as_f64() else {
        return Some("must be a number".into());
    };
    if opts.integer && n.fract() != 0.0 {
        return Some("must be an integer".into());
    }
    match (opts.min, opts.max) {
        (Some(min), _) if n < min => Some(format!("must be at least {min}")),
        (_, Some(max)) if n > max => Some(format!("must be at most {max}")),
        _ => None,
    }
}

fn check_select(opts: &SelectOptions, value: &Value) -> Option<String> {
    let allowed = |v: &Value| v.as_str().is_some_and(|s| opts.options.iter().any(|o| o == s));
    if opts.has_many {
        match value.as_array() {
            Some(items) if items.iter().all(allowed) => None,
            Some(_) => Some("contains an invalid option".into()),
            None => Some("must be a list of options".into()),
        }
    } else if allowed(value) {
        None
    } else {
        Some(format!("must be one of: {}", opts.options.join(", ")))
    }
}

fn check_point(value: &Value) -> Option<String> {
    let coords: Option<Vec<f64>> = value
        .as_array()
        .filter(|items| items.len() == 2)
        .and_then(|items| items.iter().map(Value::as_f64).collect());
    match coords.as_deref() {
        Some([lng, lat]) if (-180.0..=180.0).contains(lng) && (-90.0..=90.0).contains(lat) => None,
        Some(_) => Some("coordinates out of range".into()),
        None => Some("must be a [longitude, latitude] pair".into()),
    }
}

fn check_relationship(opts: &RelationshipOptions, value: &Value) -> Option<String> {
    let valid = |item: &Value| match &opts.relation_to {
        RelationTo::One(_) => item.is_string() || item.is_number() || item.is_object(),
        RelationTo::Many(targets) => item
            .get(RELATION_TO_KEY)
            .and_then(Value::as_str)
            .is_some_and(|slug| targets.iter().any(|t| t == slug))
            && item.get(RELATION_VALUE_KEY).is_some_and(|v| !v.is_null()),
    };
    if opts.has_many {
        match value.as_array() {
            Some(items) if items.iter().all(valid) => None,
            Some(_) => Some("contains an invalid reference".into()),
            None => Some("must be a list of references".into()),
        }
    } else if valid(value) {
        None
    } else {
        Some("must be a valid reference".into())
    }
}

/// Validates `data` against `fields` and returns every field error found.
pub(crate) async fn collect_errors(
    fields: &[Field],
    data: &mut Document,
    mode: Mode,
    operation: Operation,
    context: &RequestContext,
) -> EngineResult<Vec<FieldError>> {
    let mut validator = Validator {
        mode,
        operation,
        context: context.clone(),
        errors: Vec::new(),
    };
    walk(fields, data, &mut validator).await?;
    Ok(validator.errors)
}

/// Validates `data` and raises one `ValidationFailed` for all errors.
pub(crate) async fn validate(
    collection: &str,
    fields: &[Field],
    data: &mut Document,
    mode: Mode,
    operation: Operation,
    context: &RequestContext,
) -> EngineResult<()> {
    let errors = collect_errors(fields, data, mode, operation, context).await?;
    if errors.is_empty() {
        Ok(())
    } else {
        Err(EngineError::ValidationFailed {
            collection: collection.to_string(),
            errors,
        })
    }
}
