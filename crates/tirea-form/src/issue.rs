//! Validation issues and their path-addressed wire format.

use crate::traverse::field_path;
use crate::{Field, FieldKey, FieldTree, FormResult, Path};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// A structured validation failure, tagged by `kind`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Issue {
    /// A required control submitted nothing (or an empty string).
    MissingField,
    /// A file was submitted where text was expected.
    UnexpectedFile,
    /// Text was submitted where a file was expected.
    UnexpectedString,
    /// A single-valued control submitted several entries.
    UnexpectedMultipleValues {
        /// Number of entries received.
        count: usize,
    },
    /// Text that does not parse as a number.
    InvalidNumber {
        /// The rejected input.
        input: String,
    },
    /// A file part with no content.
    EmptyFile,
    /// A validator panicked.
    ValidationError {
        /// Panic message.
        error: String,
    },
    /// An issue reported by a schema-validation adapter.
    Schema {
        /// Human-readable message.
        message: String,
        /// Location inside the validated value, relative to the field.
        #[serde(default)]
        path: Path,
    },
    /// A caller-defined issue; see [`CustomIssue`].
    Custom {
        /// Caller-defined kind tag.
        code: String,
        /// Human-readable message.
        #[serde(default)]
        message: String,
        /// Structured payload.
        #[serde(default)]
        data: Value,
    },
}

impl Issue {
    /// Create a validation error issue.
    #[inline]
    pub fn validation_error(error: impl fmt::Display) -> Self {
        Issue::ValidationError {
            error: error.to_string(),
        }
    }

    /// Create a schema issue at the field itself.
    #[inline]
    pub fn schema(message: impl Into<String>) -> Self {
        Issue::Schema {
            message: message.into(),
            path: Path::root(),
        }
    }

    /// Create a schema issue at a location inside the field's value.
    #[inline]
    pub fn schema_at(message: impl Into<String>, path: Path) -> Self {
        Issue::Schema {
            message: message.into(),
            path,
        }
    }

    /// Wrap a caller-defined issue, failing when its payload does not
    /// serialize.
    pub fn try_custom<T: CustomIssue>(issue: &T) -> FormResult<Self> {
        Ok(Issue::Custom {
            code: T::KIND.to_owned(),
            message: issue.message(),
            data: serde_json::to_value(issue)?,
        })
    }

    /// Wrap a caller-defined issue.
    ///
    /// A payload that does not serialize is logged and kept as `null`, so
    /// [`Issue::decode`] will not recover it. Use [`Issue::try_custom`] to
    /// handle that case.
    pub fn custom<T: CustomIssue>(issue: &T) -> Self {
        Self::try_custom(issue).unwrap_or_else(|err| {
            tracing::warn!(kind = T::KIND, error = %err, "custom issue payload did not serialize");
            Issue::Custom {
                code: T::KIND.to_owned(),
                message: issue.message(),
                data: Value::Null,
            }
        })
    }

    /// Recover a caller-defined issue of type `T`.
    pub fn decode<T: CustomIssue + DeserializeOwned>(&self) -> Option<T> {
        match self {
            Issue::Custom { code, data, .. } if code == T::KIND => {
                serde_json::from_value(data.clone()).ok()
            }
            _ => None,
        }
    }

    /// The kind tag as it appears on the wire; custom issues report their code.
    pub fn kind(&self) -> &str {
        match self {
            Issue::MissingField => "MissingField",
            Issue::UnexpectedFile => "UnexpectedFile",
            Issue::UnexpectedString => "UnexpectedString",
            Issue::UnexpectedMultipleValues { .. } => "UnexpectedMultipleValues",
            Issue::InvalidNumber { .. } => "InvalidNumber",
            Issue::EmptyFile => "EmptyFile",
            Issue::ValidationError { .. } => "ValidationError",
            Issue::Schema { .. } => "Schema",
            Issue::Custom { code, .. } => code,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::MissingField => write!(f, "this field is required"),
            Issue::UnexpectedFile => write!(f, "expected text, received a file"),
            Issue::UnexpectedString => write!(f, "expected a file, received text"),
            Issue::UnexpectedMultipleValues { count } => {
                write!(f, "expected a single value, received {count}")
            }
            Issue::InvalidNumber { input } => write!(f, "{input:?} is not a number"),
            Issue::EmptyFile => write!(f, "the file is empty"),
            Issue::ValidationError { error } => write!(f, "validation failed: {error}"),
            Issue::Schema { message, .. } => write!(f, "{message}"),
            Issue::Custom { code, message, .. } if message.is_empty() => write!(f, "{code}"),
            Issue::Custom { message, .. } => write!(f, "{message}"),
        }
    }
}

/// A caller-defined issue kind.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use tirea_form::{CustomIssue, Issue};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct TooShort {
///     min: usize,
/// }
///
/// impl CustomIssue for TooShort {
///     const KIND: &'static str = "TooShort";
/// }
///
/// let issue = Issue::custom(&TooShort { min: 3 });
/// assert_eq!(issue.kind(), "TooShort");
/// assert_eq!(issue.decode::<TooShort>(), Some(TooShort { min: 3 }));
/// ```
pub trait CustomIssue: Serialize {
    /// Kind tag written to [`Issue::Custom::code`].
    const KIND: &'static str;

    /// Human-readable message.
    fn message(&self) -> String {
        String::new()
    }
}

/// A non-empty list of issues.
///
/// An empty failure is not an issue list; it normalizes to "indeterminate".
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Issues(Vec<Issue>);

impl Issues {
    /// Wrap a list, returning `None` when it is empty.
    pub fn new(issues: Vec<Issue>) -> Option<Self> {
        if issues.is_empty() {
            None
        } else {
            Some(Self(issues))
        }
    }

    /// A single issue.
    #[inline]
    pub fn one(issue: Issue) -> Self {
        Self(vec![issue])
    }

    /// Add issues not already present, keeping existing ones first.
    #[must_use]
    pub fn merged(mut self, more: impl IntoIterator<Item = Issue>) -> Self {
        for issue in more {
            if !self.0.contains(&issue) {
                self.0.push(issue);
            }
        }
        self
    }

    /// First issue.
    #[inline]
    pub fn first(&self) -> &Issue {
        &self.0[0]
    }

    /// Borrow as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[Issue] {
        &self.0
    }

    /// Consume into the inner vector.
    #[inline]
    pub fn into_vec(self) -> Vec<Issue> {
        self.0
    }
}

impl std::ops::Deref for Issues {
    type Target = [Issue];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a Issues {
    type Item = &'a Issue;
    type IntoIter = std::slice::Iter<'a, Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Issues addressed by tree path, for transport across a process boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssuesAtPath {
    /// Position of the field in the tree (without the form name).
    pub path: Path,
    /// Issues for that field.
    pub issues: Vec<Issue>,
}

impl IssuesAtPath {
    /// Create an entry.
    pub fn new(path: Path, issues: Vec<Issue>) -> Self {
        Self { path, issues }
    }
}

/// Encode a path-addressed issue list as JSON.
pub fn encode_issues(issues: &[IssuesAtPath]) -> FormResult<String> {
    Ok(serde_json::to_string(issues)?)
}

/// Decode a path-addressed issue list from JSON.
pub fn decode_issues(json: &str) -> FormResult<Vec<IssuesAtPath>> {
    Ok(serde_json::from_str(json)?)
}

/// Accumulates issues per field node.
///
/// Issues are addressed by node identity while being collected and only
/// resolved to paths when [`IssueBuilder::get_issues`] runs against the tree.
#[derive(Debug, Default)]
pub struct IssueBuilder {
    order: Vec<Field>,
    issues: HashMap<FieldKey, Vec<Issue>>,
}

impl IssueBuilder {
    /// Create an empty builder.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issue for a field.
    pub fn add(&mut self, field: &Field, issue: Issue) -> &mut Self {
        let key = field.key();
        if !self.issues.contains_key(&key) {
            self.order.push(field.clone());
        }
        self.issues.entry(key).or_default().push(issue);
        self
    }

    /// Whether any issue was recorded.
    #[inline]
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Number of fields with issues.
    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns true if no issue was recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Resolve recorded issues to the wire format.
    ///
    /// Fails with `FieldNotFound` when a recorded node is no longer part of
    /// `tree`, which usually means a stale node was kept across a tree edit.
    pub fn get_issues(&self, tree: &FieldTree) -> FormResult<Vec<IssuesAtPath>> {
        self.order
            .iter()
            .map(|field| {
                let path = field_path(tree, field)?;
                let issues = self.issues.get(&field.key()).cloned().unwrap_or_default();
                Ok(IssuesAtPath::new(path, issues))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{path, string, FormError};
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Taken {
        name: String,
    }

    impl CustomIssue for Taken {
        const KIND: &'static str = "Taken";

        fn message(&self) -> String {
            format!("{} is taken", self.name)
        }
    }

    #[test]
    fn test_issue_wire_shape() {
        let json = serde_json::to_value(Issue::MissingField).unwrap();
        assert_eq!(json, json!({"kind": "MissingField"}));

        let json = serde_json::to_value(Issue::InvalidNumber { input: "x".into() }).unwrap();
        assert_eq!(json, json!({"kind": "InvalidNumber", "input": "x"}));

        let parsed: Issue =
            serde_json::from_value(json!({"kind": "Schema", "message": "too small"})).unwrap();
        assert_eq!(parsed, Issue::schema("too small"));
    }

    #[test]
    fn test_custom_issue_roundtrip() {
        let issue = Issue::custom(&Taken { name: "bob".into() });
        assert_eq!(issue.kind(), "Taken");
        assert_eq!(issue.to_string(), "bob is taken");
        assert_eq!(issue.decode::<Taken>(), Some(Taken { name: "bob".into() }));
        assert_eq!(Issue::MissingField.decode::<Taken>(), None);
    }

    #[test]
    fn test_issues_never_empty() {
        assert!(Issues::new(vec![]).is_none());
        let issues = Issues::one(Issue::MissingField).merged([Issue::EmptyFile]);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues.first(), &Issue::MissingField);
    }

    #[test]
    fn test_merge_skips_known_issues() {
        let issues = Issues::one(Issue::schema("taken"))
            .merged([Issue::schema("taken"), Issue::EmptyFile, Issue::EmptyFile]);
        assert_eq!(issues.as_slice(), &[Issue::schema("taken"), Issue::EmptyFile]);
    }

    /// A payload whose map keys are not strings cannot become JSON.
    #[derive(Serialize)]
    struct ByPosition(HashMap<(u8, u8), String>);

    impl CustomIssue for ByPosition {
        const KIND: &'static str = "ByPosition";
    }

    #[test]
    fn test_custom_issue_unserializable_payload() {
        let payload = ByPosition(HashMap::from([((0, 1), "x".to_owned())]));
        assert!(matches!(
            Issue::try_custom(&payload),
            Err(FormError::Serialization(_))
        ));
        let issue = Issue::custom(&payload);
        assert_eq!(issue.kind(), "ByPosition");
        assert!(matches!(issue, Issue::Custom { data: Value::Null, .. }));
        assert!(Issue::try_custom(&Taken { name: "bob".into() }).is_ok());
    }

    #[test]
    fn test_builder_resolves_paths() {
        let username = string();
        let email = string();
        let tree = FieldTree::map([("username", username.clone()), ("email", email.clone())]);

        let mut builder = IssueBuilder::new();
        assert!(!builder.has_issues());
        builder.add(&email, Issue::custom(&Taken { name: "a@b".into() }));
        builder.add(&username, Issue::MissingField);
        builder.add(&email, Issue::MissingField);
        assert!(builder.has_issues());
        assert_eq!(builder.len(), 2);

        let issues = builder.get_issues(&tree).unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].path, path!("email"));
        assert_eq!(issues[0].issues.len(), 2);
        assert_eq!(issues[1].path, path!("username"));
    }

    #[test]
    fn test_builder_stale_field() {
        let tree = FieldTree::map([("a", string())]);
        let mut builder = IssueBuilder::new();
        builder.add(&string(), Issue::MissingField);
        let err = builder.get_issues(&tree).unwrap_err();
        assert!(matches!(err, FormError::FieldNotFound { .. }));
    }

    #[test]
    fn test_wire_encoding() {
        let issues = vec![IssuesAtPath::new(path!("items", 0), vec![Issue::EmptyFile])];
        let encoded = encode_issues(&issues).unwrap();
        assert_eq!(encoded, r#"[{"path":["items",0],"issues":[{"kind":"EmptyFile"}]}]"#);
        assert_eq!(decode_issues(&encoded).unwrap(), issues);
    }
}
