//! Form controller: owns the current snapshot of one mounted form.
//!
//! The controller is single-threaded. Dispatch runs to completion before
//! subscribers are notified, and a dispatch started while another one is
//! still running (for example from inside a form source) is rejected with
//! [`FormError::ReentrantDispatch`].

use crate::reducer::{reduce, Action};
use crate::state::FormSnapshot;
use crate::{
    Field, FieldTree, FormConfig, FormData, FormError, FormResult, FormSource, IssueBuilder,
    IssuesAtPath, Path,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

type Subscriber = Rc<dyn Fn(&Arc<FormSnapshot>)>;
type SubmitHandler = Rc<dyn Fn(&Value, &mut IssueBuilder)>;

/// Handle returned by [`FormController::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// No field has issues and the whole tree resolved.
    pub success: bool,
    /// The resolved value, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Issues of every invalid field.
    #[serde(default)]
    pub issues: Vec<IssuesAtPath>,
    /// Paths of every field of the submitted tree. Sent back to rebuild
    /// repeat sizes with [`FieldTree::restore_from_paths`].
    #[serde(default)]
    pub fields: Vec<Path>,
    /// The subset of `issues` with caller-defined kinds.
    #[serde(default)]
    pub custom_issues: Vec<IssuesAtPath>,
}

/// What the submit event handler decided.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    /// Native submission must be blocked.
    pub prevent_default: bool,
    /// The submission result after the submit transition.
    pub submission: Submission,
}

/// Resets the dispatch flag when a dispatch ends, including on error.
struct DispatchGuard<'a>(&'a Cell<bool>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Owner of one form's state.
///
/// # Examples
///
/// ```
/// use tirea_form::{string, FieldTree, FormConfig, FormController, FormData};
///
/// let form = FormController::new(
///     FieldTree::map([("username", string())]),
///     FormConfig::default(),
/// )
/// .unwrap();
///
/// let result = form.submit(&FormData::from_urlencoded("username=bob"));
/// assert!(result.success);
/// assert_eq!(result.value.unwrap()["username"], "bob");
/// ```
pub struct FormController {
    state: RefCell<Arc<FormSnapshot>>,
    source: RefCell<Option<Rc<dyn FormSource>>>,
    subscribers: RefCell<Vec<(Subscription, Subscriber)>>,
    next_subscription: Cell<u64>,
    dispatching: Cell<bool>,
    on_submit: RefCell<Option<SubmitHandler>>,
}

impl fmt::Debug for FormController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormController")
            .field("name", &self.get_state().name())
            .field("mounted", &self.source.borrow().is_some())
            .field("subscribers", &self.subscribers.borrow().len())
            .field("dispatching", &self.dispatching.get())
            .field("on_submit", &self.on_submit.borrow().is_some())
            .finish()
    }
}

impl FormController {
    /// Create a controller for `tree`.
    ///
    /// Fails when the tree reuses a node or holds invalid or duplicate keys.
    pub fn new(tree: impl Into<FieldTree>, config: FormConfig) -> FormResult<Self> {
        let snapshot = FormSnapshot::new(tree.into(), config)?;
        Ok(Self {
            state: RefCell::new(Arc::new(snapshot)),
            source: RefCell::new(None),
            subscribers: RefCell::new(Vec::new()),
            next_subscription: Cell::new(0),
            dispatching: Cell::new(false),
            on_submit: RefCell::new(None),
        })
    }

    /// The current snapshot.
    pub fn get_state(&self) -> Arc<FormSnapshot> {
        Arc::clone(&self.state.borrow())
    }

    /// Call `callback` after every dispatch that changed the snapshot.
    pub fn subscribe(&self, callback: impl Fn(&Arc<FormSnapshot>) + 'static) -> Subscription {
        let id = self.next_subscription.get();
        self.next_subscription.set(id + 1);
        let subscription = Subscription(id);
        self.subscribers
            .borrow_mut()
            .push((subscription, Rc::new(callback)));
        subscription
    }

    /// Remove a subscriber. Returns false when it was already removed.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(s, _)| *s != subscription);
        subscribers.len() != before
    }

    /// Apply `action`, propagating reducer errors.
    pub fn try_dispatch(&self, action: Action) -> FormResult<Arc<FormSnapshot>> {
        let source = self.source.borrow().clone();
        self.dispatch_with(&action, source.as_deref())
    }

    /// Apply `action`. Errors are logged and the prior snapshot is kept.
    pub fn dispatch(&self, action: Action) -> Arc<FormSnapshot> {
        let source = self.source.borrow().clone();
        self.dispatch_logged(action, source.as_deref())
    }

    fn dispatch_with(
        &self,
        action: &Action,
        source: Option<&dyn FormSource>,
    ) -> FormResult<Arc<FormSnapshot>> {
        if self.dispatching.replace(true) {
            return Err(FormError::ReentrantDispatch);
        }
        let guard = DispatchGuard(&self.dispatching);
        let current = self.get_state();
        let next = reduce(&current, action, source)?;
        let changed = !Arc::ptr_eq(&current, &next);
        if changed {
            *self.state.borrow_mut() = Arc::clone(&next);
        }
        drop(guard);

        if changed {
            self.notify(&next);
        }
        Ok(next)
    }

    fn dispatch_logged(&self, action: Action, source: Option<&dyn FormSource>) -> Arc<FormSnapshot> {
        match self.dispatch_with(&action, source) {
            Ok(state) => state,
            Err(err) => {
                tracing::error!(action = action.label(), error = %err, "form dispatch failed");
                self.get_state()
            }
        }
    }

    fn notify(&self, state: &Arc<FormSnapshot>) {
        // Subscribers may (un)subscribe while being notified.
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, s)| Rc::clone(s))
            .collect();
        for subscriber in subscribers {
            subscriber(state);
        }
    }

    /// Attach a live form and evaluate every field.
    pub fn mount(&self, source: Rc<dyn FormSource>) -> Arc<FormSnapshot> {
        *self.source.borrow_mut() = Some(source);
        self.dispatch(Action::Mount)
    }

    /// Detach the live form. State is kept.
    pub fn unmount(&self) {
        self.source.borrow_mut().take();
    }

    /// Whether a live form is attached.
    pub fn is_mounted(&self) -> bool {
        self.source.borrow().is_some()
    }

    /// Handle a change event for the given control names.
    pub fn handle_change<I, S>(&self, names: I) -> Arc<FormSnapshot>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dispatch(Action::Change {
            names: names.into_iter().map(Into::into).collect(),
        })
    }

    /// Handle a reset event.
    pub fn handle_reset(&self) -> Arc<FormSnapshot> {
        self.dispatch(Action::Reset)
    }

    /// Handle a submit event.
    ///
    /// Native submission is blocked exactly when a field has issues after the
    /// submit transition. Otherwise the submit handler runs with the resolved
    /// value; issues it reports are applied as injected issues.
    pub fn handle_submit(&self) -> SubmitOutcome {
        let state = self.dispatch(Action::Submit);
        let prevent_default = state.has_issues();
        if !prevent_default {
            self.run_submit_handler(&state);
        }
        SubmitOutcome {
            prevent_default,
            submission: self.get_result(),
        }
    }

    fn run_submit_handler(&self, state: &FormSnapshot) {
        let Some(handler) = self.on_submit.borrow().clone() else {
            return;
        };
        let Some(value) = state.value() else {
            tracing::warn!("form has no issues but is not fully resolved; skipping submit handler");
            return;
        };
        let mut builder = IssueBuilder::new();
        handler(&value, &mut builder);
        if !builder.has_issues() {
            return;
        }
        match builder.get_issues(state.tree()) {
            Ok(issues) => {
                self.dispatch(Action::SetIssues(issues));
            }
            Err(err) => tracing::error!(error = %err, "submit handler reported issues for unknown fields"),
        }
    }

    /// Validate posted form data without a live form.
    ///
    /// Repeats are first resized from the posted control names (unless
    /// disabled in [`FormConfig`]), then every field is evaluated.
    pub fn submit(&self, data: &FormData) -> Submission {
        let state = self.get_state();
        if state.config().restore_on_submit {
            let restored = state.tree().restore_from_form_data(state.name(), data);
            if restored.paths() != state.tree().paths() {
                self.dispatch_logged(Action::SetFields(restored), None);
            }
        }
        self.dispatch_logged(Action::Submit, Some(data));
        self.get_result()
    }

    /// The submission result of the current snapshot.
    pub fn get_result(&self) -> Submission {
        let state = self.get_state();
        let issues = state.issues();
        let value = if issues.is_empty() { state.value() } else { None };
        Submission {
            success: value.is_some(),
            value,
            issues,
            fields: state.tree().paths(),
            custom_issues: state.custom_issues(),
        }
    }

    /// Inject issues produced elsewhere.
    pub fn set_issues(&self, issues: Vec<IssuesAtPath>) -> Arc<FormSnapshot> {
        self.dispatch(Action::SetIssues(issues))
    }

    /// Replace the field tree with `update(current)`.
    ///
    /// Structural errors in the new tree are returned, not logged.
    pub fn set_fields(
        &self,
        update: impl FnOnce(&FieldTree) -> FormResult<FieldTree>,
    ) -> FormResult<Arc<FormSnapshot>> {
        let tree = update(self.get_state().tree())?;
        self.try_dispatch(Action::SetFields(tree))
    }

    /// Install the submit handler.
    pub fn set_on_submit(&self, handler: impl Fn(&Value, &mut IssueBuilder) + 'static) {
        *self.on_submit.borrow_mut() = Some(Rc::new(handler));
    }

    /// Control name to render for `field`.
    pub fn control_name(&self, field: &Field) -> FormResult<String> {
        self.get_state().control_name(field)
    }
}
