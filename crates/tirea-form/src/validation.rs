//! Validation results and the per-node validation runner.

use crate::{Field, Issue, Issues, RawInput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// What a validator returns.
#[derive(Clone, Debug, PartialEq)]
pub enum Validation {
    /// The input parsed to a value.
    Success(Value),
    /// The input was rejected.
    ///
    /// An empty list means "cannot decide yet" and normalizes to
    /// [`Outcome::Indeterminate`].
    Failure(Vec<Issue>),
}

impl Validation {
    /// Accept with a value.
    #[inline]
    pub fn success(value: impl Into<Value>) -> Self {
        Validation::Success(value.into())
    }

    /// Reject with a single issue.
    #[inline]
    pub fn fail(issue: Issue) -> Self {
        Validation::Failure(vec![issue])
    }

    /// Reject with several issues.
    #[inline]
    pub fn fail_many(issues: impl IntoIterator<Item = Issue>) -> Self {
        Validation::Failure(issues.into_iter().collect())
    }

    /// Reject with an optional single issue followed by a list.
    pub fn failure(issue: Option<Issue>, issues: impl IntoIterator<Item = Issue>) -> Self {
        Validation::Failure(issue.into_iter().chain(issues).collect())
    }

    /// Returns true on success.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Validation::Success(_))
    }
}

impl From<Result<Value, Issue>> for Validation {
    fn from(result: Result<Value, Issue>) -> Self {
        match result {
            Ok(value) => Validation::Success(value),
            Err(issue) => Validation::fail(issue),
        }
    }
}

/// Validation state of one node.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Outcome {
    /// Not resolvable yet: unmounted, or a composite child is unresolved.
    #[default]
    Indeterminate,
    /// Valid, with the parsed value.
    Resolved(Value),
    /// Invalid.
    Invalid(Issues),
}

impl Outcome {
    /// The parsed value, if resolved.
    #[inline]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Outcome::Resolved(v) => Some(v),
            _ => None,
        }
    }

    /// The issues, if invalid.
    #[inline]
    pub fn issues(&self) -> Option<&Issues> {
        match self {
            Outcome::Invalid(issues) => Some(issues),
            _ => None,
        }
    }

    /// Tri-state status.
    pub fn status(&self) -> FieldStatus {
        match self {
            Outcome::Indeterminate => FieldStatus::Indeterminate,
            Outcome::Resolved(_) => FieldStatus::Valid,
            Outcome::Invalid(_) => FieldStatus::Invalid,
        }
    }
}

impl From<Validation> for Outcome {
    fn from(validation: Validation) -> Self {
        match validation {
            Validation::Success(value) => Outcome::Resolved(value),
            Validation::Failure(issues) => Issues::new(issues)
                .map(Outcome::Invalid)
                .unwrap_or(Outcome::Indeterminate),
        }
    }
}

/// Observable status of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    /// No value and no issues.
    Indeterminate,
    /// Has a value.
    Valid,
    /// Has issues.
    Invalid,
}

/// Run a node's validator chain over its extracted input.
///
/// Composites with an unresolved child are indeterminate and their validators
/// are not invoked. A panicking validator yields a `ValidationError` issue.
pub fn run_validation(field: &Field, input: &RawInput) -> Outcome {
    if input.is_unresolved() {
        return Outcome::Indeterminate;
    }

    match panic::catch_unwind(AssertUnwindSafe(|| field.run(input))) {
        Ok(validation) => Outcome::from(validation),
        Err(payload) => {
            let error = panic_message(payload.as_ref());
            tracing::warn!(field = %field.key(), error = %error, "validator panicked");
            Outcome::Invalid(Issues::one(Issue::ValidationError { error }))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "validator panicked".to_owned()
    }
}
