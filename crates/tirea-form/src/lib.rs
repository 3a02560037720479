//! Form state over a declarative, recursive field tree.
//!
//! `tirea-form` turns a tree of field definitions into control names, extracts
//! raw input from submitted form data, runs validator chains, and keeps a
//! per-field state map that is replaced (never mutated) on every transition.
//!
//! # Core Concepts
//!
//! - **Field**: an immutable node (`value`, `values`, `group`, `repeat`,
//!   refined with `.validate`) with an opaque identity key
//! - **FieldTree**: fields nested in plain lists and maps
//! - **Path**: the position of a node, serialized as a control name (`a.b[2].c`)
//! - **FormSnapshot**: tree + per-field state, swapped by `Arc` on every change
//! - **Action / reduce**: pure transitions (Mount, Change, Submit, Reset,
//!   SetIssues, SetFields)
//! - **FormController**: owns one form's snapshot; dispatch, subscribe, submit
//! - **IssuesAtPath**: the path-addressed wire format for issues
//!
//! # Transitions
//!
//! ```text
//! Snapshot' = reduce(Snapshot, Action, FormSource)
//! ```
//!
//! - Unchanged snapshots come back as the same `Arc`
//! - Untouched field states stay pointer-equal across snapshots
//! - Children are evaluated before the composites that read them
//!
//! # Quick Start
//!
//! ```
//! use tirea_form::{group, number, repeat, string, FieldTree, FormConfig, FormController, FormData};
//! use serde_json::json;
//!
//! let tree = FieldTree::map([
//!     ("title", string()),
//!     ("lines", repeat(group([("sku", string()), ("qty", number())]), 0)),
//! ]);
//! let form = FormController::new(tree, FormConfig::default().with_name("order")).unwrap();
//!
//! let data = FormData::from_urlencoded(
//!     "order.title=Books&order.lines%5B0%5D.sku=b-1&order.lines%5B0%5D.qty=2",
//! );
//! let result = form.submit(&data);
//! assert!(result.success);
//! assert_eq!(
//!     result.value,
//!     Some(json!({"title": "Books", "lines": [{"sku": "b-1", "qty": 2}]}))
//! );
//! ```

mod config;
mod controller;
mod cow;
mod error;
mod field;
mod form_data;
mod issue;
mod key;
mod path;
mod reducer;
mod state;
mod traverse;
mod tree;
mod validation;
mod value;

// Addressing
pub use error::{FormError, FormResult};
pub use key::FieldKey;
pub use path::{check_key, control_name, parse_control_name, Path, Seg};

// Definitions
pub use field::{
    checkbox, file, files, group, number, optional_string, repeat, string, strings, value,
    value_with, values, values_with, Children, Field, FieldKind, FieldKindTag, Parser, Repeat,
    Validator, MAX_RESTORED_ITEMS,
};
pub use traverse::{field_path, flatten, traverse, FieldIndex, Next, TreeNode, Visitor};
pub use tree::FieldTree;

// Input and validation
pub use form_data::{FormData, FormSource};
pub use issue::{
    decode_issues, encode_issues, CustomIssue, Issue, IssueBuilder, Issues, IssuesAtPath,
};
pub use validation::{run_validation, FieldStatus, Outcome, Validation};
pub use value::{FileValue, FormValue, RawInput};

// State and transitions
pub use config::FormConfig;
pub use controller::{FormController, SubmitOutcome, Submission, Subscription};
pub use cow::{CowMap, Draft};
pub use reducer::{reduce, Action};
pub use state::{FieldState, FormSnapshot, StateMap};
