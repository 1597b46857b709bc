use serde_json::{Map, Value};

/// A document stored in a collection.
///
/// All collection data flows through this type. Its shape is implied by the
/// collection's field tree but never enforced against it: unknown keys are
/// carried through every pipeline untouched.
pub type Document = Map<String, Value>;

/// Engine-assigned primary key.
pub const ID_FIELD: &str = "id";
/// Engine-assigned creation timestamp (RFC 3339).
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Engine-assigned last-update timestamp (RFC 3339).
pub const UPDATED_AT_FIELD: &str = "updatedAt";
/// Publish status of a document in a versioned collection.
pub const STATUS_FIELD: &str = "_status";
/// Pending scheduled-publish instant of a document in a versioned collection.
pub const SCHEDULED_PUBLISH_FIELD: &str = "_scheduledPublishAt";
/// Discriminant selecting the sub-schema of a blocks row.
pub const BLOCK_TYPE_FIELD: &str = "blockType";
/// Target collection key of a polymorphic relationship value.
pub const RELATION_TO_KEY: &str = "relationTo";
/// Referenced id (or populated document) of a polymorphic relationship value.
pub const RELATION_VALUE_KEY: &str = "value";

/// Convenience accessors over [`Document`].
pub trait DocumentExt {
    /// Returns the document's id as a string, accepting numeric ids.
    fn id(&self) -> Option<String>;

    /// Looks up a value by dotted path (e.g. `"meta.owner"`).
    fn get_path(&self, path: &str) -> Option<&Value>;

    /// Extracts a string value by dotted path.
    fn get_str(&self, path: &str) -> Option<&str> {
        self.get_path(path).and_then(Value::as_str)
    }

    /// Extracts a boolean value by dotted path.
    fn get_bool(&self, path: &str) -> Option<bool> {
        self.get_path(path).and_then(Value::as_bool)
    }

    /// Extracts a numeric value by dotted path.
    fn get_number(&self, path: &str) -> Option<f64> {
        self.get_path(path).and_then(Value::as_f64)
    }
}

impl DocumentExt for Document {
    fn id(&self) -> Option<String> {
        match self.get(ID_FIELD)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Returns true for values a `required` field treats as missing:
/// `null`, the empty string, and the empty list.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}
