//! Form transitions.
//!
//! [`reduce`] is a pure function from a snapshot and an [`Action`] to the
//! next snapshot. Full-tree passes walk fields in post-order so composite
//! nodes always see their children's fresh outcomes. When a transition
//! changes nothing the input `Arc` is returned unchanged.

use crate::cow::Draft;
use crate::field::object_value;
use crate::path::{control_name, parse_control_name};
use crate::state::{FieldState, FormSnapshot};
use crate::traverse::FieldIndex;
use crate::validation::run_validation;
use crate::{
    FieldKey, FieldKind, FieldTree, FormError, FormResult, FormSource, Issues, IssuesAtPath,
    Outcome, RawInput,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A form transition.
#[derive(Debug, Clone)]
pub enum Action {
    /// Evaluate every field not evaluated yet and record its initial input.
    Mount,
    /// Controls with these names reported a change.
    Change {
        /// Changed control names, as rendered.
        names: Vec<String>,
    },
    /// Re-evaluate every field and mark the form submitted.
    Submit,
    /// Re-evaluate every field against reset input and clear all flags.
    Reset,
    /// Merge issues produced elsewhere (usually a server) into field state.
    SetIssues(Vec<IssuesAtPath>),
    /// Replace the field tree.
    SetFields(FieldTree),
}

impl Action {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Action::Mount => "mount",
            Action::Change { .. } => "change",
            Action::Submit => "submit",
            Action::Reset => "reset",
            Action::SetIssues(_) => "set_issues",
            Action::SetFields(_) => "set_fields",
        }
    }
}

/// Apply `action` to `snapshot`, reading control values from `source`.
///
/// `Mount`, `Change`, `Submit` and `Reset` need a source. `SetFields` mounts
/// the new nodes only when a source is given and the form is mounted.
pub fn reduce(
    snapshot: &Arc<FormSnapshot>,
    action: &Action,
    source: Option<&dyn FormSource>,
) -> FormResult<Arc<FormSnapshot>> {
    let required = || {
        source.ok_or_else(|| {
            FormError::invalid_operation(format!("{} requires a form source", action.label()))
        })
    };
    let next = match action {
        Action::SetFields(tree) => set_fields(snapshot, tree.clone(), source)?,
        Action::SetIssues(issues) => apply(snapshot, source.unwrap_or(&NoEntries), false, |pass| {
            pass.set_issues(issues)
        })?,
        Action::Mount => apply(snapshot, required()?, true, |pass| pass.mount_pending())?,
        Action::Change { names } => apply(snapshot, required()?, false, |pass| pass.change(names))?,
        Action::Submit => apply(snapshot, required()?, false, |pass| pass.submit())?,
        Action::Reset => apply(snapshot, required()?, false, |pass| pass.reset())?,
    };
    debug!(
        action = action.label(),
        changed = !Arc::ptr_eq(snapshot, &next),
        "form transition"
    );
    Ok(next)
}

fn apply(
    snapshot: &Arc<FormSnapshot>,
    source: &dyn FormSource,
    mounts: bool,
    run: impl FnOnce(&mut Pass<'_>) -> FormResult<()>,
) -> FormResult<Arc<FormSnapshot>> {
    let mut pass = Pass {
        snapshot,
        index: snapshot.index(),
        source,
        draft: snapshot.fields().draft(),
    };
    run(&mut pass)?;
    let mounted = mounts || snapshot.is_mounted();
    if !pass.draft.changed() && mounted == snapshot.is_mounted() {
        return Ok(Arc::clone(snapshot));
    }
    Ok(Arc::new(snapshot.with_fields(pass.draft.commit(), mounted)))
}

struct NoEntries;

impl FormSource for NoEntries {
    fn get_all(&self, _name: &str) -> Vec<crate::FormValue> {
        Vec::new()
    }

    fn names(&self) -> Vec<String> {
        Vec::new()
    }
}

struct Pass<'a> {
    snapshot: &'a FormSnapshot,
    index: &'a FieldIndex,
    source: &'a dyn FormSource,
    draft: Draft<FieldKey, FieldState>,
}

impl<'a> Pass<'a> {
    /// Extract the current input of `key`.
    ///
    /// Leaves read their entries from the source; composites collect their
    /// children's resolved values from the draft.
    fn extract(&self, key: FieldKey) -> FormResult<RawInput> {
        let field = self
            .index
            .field(key)
            .ok_or_else(|| FormError::missing_key(&key))?;
        let child_value = |child: FieldKey| -> FormResult<Option<Value>> {
            Ok(self.draft.get_or_err(&child)?.value().cloned())
        };
        Ok(match field.base_kind() {
            FieldKind::Value(_) | FieldKind::Values(_) => {
                let path = self
                    .index
                    .path_of(key)
                    .ok_or_else(|| FormError::missing_key(&key))?;
                RawInput::Entries(self.source.get_all(&control_name(self.snapshot.name(), path)))
            }
            FieldKind::Group(entries) => {
                let mut values = Vec::with_capacity(entries.len());
                for (name, child) in entries {
                    match child_value(child.key())? {
                        Some(v) => values.push((name.as_str(), v)),
                        None => return Ok(RawInput::Composite(None)),
                    }
                }
                RawInput::Composite(Some(object_value(values)))
            }
            FieldKind::Repeat(repeat) => {
                let mut values = Vec::with_capacity(repeat.items().len());
                for item in repeat.items() {
                    match child_value(item.key())? {
                        Some(v) => values.push(v),
                        None => return Ok(RawInput::Composite(None)),
                    }
                }
                RawInput::Composite(Some(Value::Array(values)))
            }
            FieldKind::Validate { .. } => {
                return Err(FormError::invalid_operation(format!(
                    "field {key} has no extractable base"
                )))
            }
        })
    }

    fn evaluate(&self, key: FieldKey, raw: &RawInput) -> FormResult<Outcome> {
        let field = self
            .index
            .field(key)
            .ok_or_else(|| FormError::missing_key(&key))?;
        let outcome = run_validation(field, raw);
        trace!(field = %key, status = ?outcome.status(), "evaluated");
        Ok(outcome)
    }

    fn state(&self, key: FieldKey) -> FormResult<FieldState> {
        self.draft.get_or_err(&key).cloned()
    }

    fn mount_pending(&mut self) -> FormResult<()> {
        let validate = self.snapshot.config().validate_on_mount;
        let index = self.index;
        for &key in index.post_order() {
            let state = self.state(key)?;
            if state.is_mounted {
                continue;
            }
            let raw = self.extract(key)?;
            let outcome = if validate {
                self.evaluate(key, &raw)?
            } else {
                Outcome::Indeterminate
            };
            self.draft.set(
                key,
                FieldState {
                    initial_raw: Some(raw.clone()),
                    raw: Some(raw),
                    outcome,
                    is_mounted: true,
                    ..state
                },
            );
        }
        Ok(())
    }

    fn change(&mut self, names: &[String]) -> FormResult<()> {
        for name in names {
            let path = match parse_control_name(self.snapshot.name(), name) {
                Ok(Some(path)) => path,
                Ok(None) => {
                    trace!(name = %name, "ignoring change of a foreign control");
                    continue;
                }
                Err(err) => {
                    warn!(name = %name, error = %err, "ignoring change of an unparsable control");
                    continue;
                }
            };
            let Some(target) = self.index.key_at(&path) else {
                warn!(name = %name, "ignoring change of an unknown control");
                continue;
            };

            for key in std::iter::once(target).chain(self.index.ancestors(target)) {
                let state = self.state(key)?;
                let raw = self.extract(key)?;
                if state.raw.as_ref().is_some_and(|prev| prev.same_as(&raw)) {
                    trace!(field = %key, "input unchanged, stopping propagation");
                    break;
                }
                let outcome = self.evaluate(key, &raw)?;
                let is_dirty = is_dirty(&state, &raw);
                self.draft.set(
                    key,
                    FieldState {
                        touched_issues: outcome.issues().cloned(),
                        raw: Some(raw),
                        outcome,
                        is_touched: true,
                        is_dirty,
                        has_external_issues: false,
                        ..state
                    },
                );
            }
        }
        Ok(())
    }

    fn submit(&mut self) -> FormResult<()> {
        let index = self.index;
        for &key in index.post_order() {
            let state = self.state(key)?;
            if state.has_external_issues {
                continue;
            }
            let raw = self.extract(key)?;
            let outcome = self.evaluate(key, &raw)?;
            let is_dirty = is_dirty(&state, &raw);
            self.draft.set(
                key,
                FieldState {
                    touched_issues: outcome.issues().cloned(),
                    raw: Some(raw),
                    outcome,
                    is_touched: true,
                    is_dirty,
                    is_submitted: true,
                    ..state
                },
            );
        }
        Ok(())
    }

    fn reset(&mut self) -> FormResult<()> {
        let index = self.index;
        for &key in index.post_order() {
            let state = self.state(key)?;
            let raw = self.extract(key)?;
            let outcome = self.evaluate(key, &raw)?;
            self.draft.set(
                key,
                FieldState {
                    initial_raw: Some(raw.clone()),
                    raw: Some(raw),
                    outcome,
                    touched_issues: None,
                    is_touched: false,
                    is_dirty: false,
                    is_submitted: false,
                    has_external_issues: false,
                    is_mounted: state.is_mounted,
                },
            );
        }
        Ok(())
    }

    fn set_issues(&mut self, entries: &[IssuesAtPath]) -> FormResult<()> {
        for entry in entries {
            let Some(key) = self.index.key_at(&entry.path) else {
                warn!(path = %entry.path, "ignoring issues for an unknown path");
                continue;
            };
            let mut incoming = entry.issues.iter().cloned();
            let Some(first) = incoming.next() else {
                continue;
            };
            self.draft.update_or_err(&key, |state| {
                let merged = match state.issues() {
                    Some(existing) => existing
                        .clone()
                        .merged(std::iter::once(first).chain(incoming)),
                    None => Issues::one(first).merged(incoming),
                };
                FieldState {
                    touched_issues: Some(merged.clone()),
                    outcome: Outcome::Invalid(merged),
                    is_touched: true,
                    is_submitted: true,
                    has_external_issues: true,
                    ..state.clone()
                }
            })?;
        }
        Ok(())
    }

    /// Re-extract and re-evaluate `key` after its children changed.
    fn refresh(&mut self, key: FieldKey) -> FormResult<()> {
        let state = self.state(key)?;
        let raw = self.extract(key)?;
        if state.raw.as_ref().is_some_and(|prev| prev.same_as(&raw)) {
            return Ok(());
        }
        let outcome = self.evaluate(key, &raw)?;
        let is_dirty = is_dirty(&state, &raw);
        let touched_issues = if state.is_touched {
            outcome.issues().cloned()
        } else {
            state.touched_issues.clone()
        };
        self.draft.set(
            key,
            FieldState {
                raw: Some(raw),
                outcome,
                touched_issues,
                is_dirty,
                ..state
            },
        );
        Ok(())
    }
}

fn is_dirty(state: &FieldState, raw: &RawInput) -> bool {
    state
        .initial_raw
        .as_ref()
        .is_some_and(|initial| !initial.same_as(raw))
}

fn set_fields(
    snapshot: &Arc<FormSnapshot>,
    tree: FieldTree,
    source: Option<&dyn FormSource>,
) -> FormResult<Arc<FormSnapshot>> {
    let old_index = snapshot.index();
    let index = FieldIndex::build(&tree)?;

    let mut draft = snapshot.fields().draft();
    let removed: Vec<FieldKey> = old_index.keys().filter(|k| !index.contains(*k)).collect();
    for key in &removed {
        draft.delete(key);
    }
    let mut added = Vec::new();
    for &key in index.pre_order() {
        if !draft.contains_key(&key) {
            draft.set(key, FieldState::default());
            added.push(key);
        }
    }
    debug!(added = added.len(), removed = removed.len(), "replacing field tree");

    // Composites whose child list changed, and everything above them.
    let mut stale: HashSet<FieldKey> = HashSet::new();
    for &key in index.post_order() {
        if old_index.contains(key) && old_index.children(key) != index.children(key) {
            stale.insert(key);
            stale.extend(index.ancestors(key));
        }
    }

    let next = snapshot.with_tree(tree, index, draft.commit(), snapshot.is_mounted());
    let Some(source) = source.filter(|_| next.is_mounted()) else {
        return Ok(Arc::new(next));
    };
    let mut pass = Pass {
        snapshot: &next,
        index: next.index(),
        source,
        draft: next.fields().draft(),
    };
    pass.mount_pending()?;
    for &key in next.index().post_order() {
        if stale.contains(&key) {
            pass.refresh(key)?;
        }
    }
    let fields = pass.draft.commit();
    Ok(Arc::new(next.with_fields(fields, true)))
}
