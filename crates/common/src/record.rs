// Deterministic location of a model record inside the git repository.
//
// Every record of an application lives under `<app>/` in a single file named
// `<app>_<model>_<id>`. Segment validation keeps caller-controlled values
// from escaping that directory.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Maximum allowed length of a single name segment, in characters.
const MAX_SEGMENT_CHARS: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("{0} is required")]
    Empty(&'static str),

    #[error("{0} exceeds maximum length of {MAX_SEGMENT_CHARS} characters")]
    TooLong(&'static str),

    #[error("{0} contains a path separator")]
    Separator(&'static str),

    #[error("{0} contains directory traversal")]
    Traversal(&'static str),

    #[error("{0} contains a control character")]
    Control(&'static str),
}

/// Where a record is stored in the git repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLocation {
    relative_path: String,
    file_name: String,
}

impl RecordLocation {
    /// Build the location for `model_name`/`id` of application `app_name`.
    ///
    /// ```
    /// use gitgate_common::record::RecordLocation;
    ///
    /// let location = RecordLocation::new("billing", "Invoice", "42").unwrap();
    /// assert_eq!(location.relative_path(), "billing");
    /// assert_eq!(location.file_name(), "billing_Invoice_42");
    /// ```
    pub fn new(app_name: &str, model_name: &str, id: &str) -> Result<Self, RecordError> {
        validate_segment("app name", app_name)?;
        validate_segment("model name", model_name)?;
        validate_segment("record id", id)?;

        Ok(Self {
            relative_path: app_name.to_owned(),
            file_name: format!("{app_name}_{model_name}_{id}"),
        })
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn commit_message(&self) -> String {
        format!("update {}", self.file_name)
    }
}

fn validate_segment(label: &'static str, value: &str) -> Result<(), RecordError> {
    if value.trim().is_empty() {
        return Err(RecordError::Empty(label));
    }
    if value.chars().count() > MAX_SEGMENT_CHARS {
        return Err(RecordError::TooLong(label));
    }
    if value.contains('/') || value.contains('\\') {
        return Err(RecordError::Separator(label));
    }
    if value.contains("..") {
        return Err(RecordError::Traversal(label));
    }
    if value.chars().any(char::is_control) {
        return Err(RecordError::Control(label));
    }
    Ok(())
}

/// Compact JSON with object keys sorted at every depth, so the same record
/// always produces the same file content regardless of client key order.
pub fn canonical_json(value: &Value) -> String {
    // Serializing a `Value` tree into a `String` cannot fail.
    serde_json::to_string(&Canonical(value)).unwrap_or_default()
}

struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|(left, _), (right, _)| left.cmp(right));
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &Canonical(value))?;
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(&Canonical(item))?;
                }
                out.end()
            }
            other => other.serialize(serializer),
        }
    }
}
