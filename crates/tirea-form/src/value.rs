//! Raw form values as submitted by a form.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Metadata of a submitted file part.
///
/// File contents are not modeled; upload plumbing lives outside this crate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileValue {
    /// Client-side file name. Empty when no file was picked.
    pub name: String,
    /// MIME type reported by the client.
    #[serde(rename = "type", default)]
    pub content_type: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
}

impl FileValue {
    /// Create file metadata.
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size,
        }
    }

    /// A file input with nothing selected submits a zero-byte part.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// JSON form used as a parsed value.
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "type": self.content_type,
            "size": self.size,
        })
    }
}

/// One entry value of multi-valued form data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    /// A text control value.
    Text(String),
    /// A file part.
    File(FileValue),
}

impl FormValue {
    /// Create a text value.
    #[inline]
    pub fn text(s: impl Into<String>) -> Self {
        FormValue::Text(s.into())
    }

    /// Get the text if this is a text value.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(s) => Some(s),
            FormValue::File(_) => None,
        }
    }

    /// Get the file if this is a file value.
    #[inline]
    pub fn as_file(&self) -> Option<&FileValue> {
        match self {
            FormValue::Text(_) => None,
            FormValue::File(f) => Some(f),
        }
    }

    /// Returns true for file values.
    #[inline]
    pub fn is_file(&self) -> bool {
        matches!(self, FormValue::File(_))
    }

    /// JSON form used as a parsed value.
    pub fn to_json(&self) -> Value {
        match self {
            FormValue::Text(s) => Value::String(s.clone()),
            FormValue::File(f) => f.to_json(),
        }
    }
}

impl From<&str> for FormValue {
    fn from(s: &str) -> Self {
        FormValue::Text(s.to_owned())
    }
}

impl From<String> for FormValue {
    fn from(s: String) -> Self {
        FormValue::Text(s)
    }
}

impl From<FileValue> for FormValue {
    fn from(f: FileValue) -> Self {
        FormValue::File(f)
    }
}

/// The as-submitted input of one node, before validation.
#[derive(Clone, Debug, PartialEq)]
pub enum RawInput {
    /// Entries under a leaf's control name.
    Entries(Vec<FormValue>),
    /// Resolved values of a composite's children; `None` while any child is
    /// unresolved.
    Composite(Option<Value>),
}

impl RawInput {
    /// Shallow equality used for dirty tracking and change short-circuiting.
    ///
    /// File values never compare equal: a re-picked file with the same
    /// metadata may still carry different contents.
    pub fn same_as(&self, other: &RawInput) -> bool {
        match (self, other) {
            (RawInput::Entries(a), RawInput::Entries(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|pair| match pair {
                        (FormValue::Text(x), FormValue::Text(y)) => x == y,
                        _ => false,
                    })
            }
            (RawInput::Composite(a), RawInput::Composite(b)) => a == b,
            _ => false,
        }
    }

    /// Entries of a leaf input.
    pub fn entries(&self) -> Option<&[FormValue]> {
        match self {
            RawInput::Entries(e) => Some(e),
            RawInput::Composite(_) => None,
        }
    }

    /// Returns true for a composite whose children are not all resolved.
    #[inline]
    pub fn is_unresolved(&self) -> bool {
        matches!(self, RawInput::Composite(None))
    }
}
