//! Controller transition tests against a live, editable form.

use serde_json::json;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tirea_form::{
    group, number, path, repeat, string, Action, Field, FieldStatus, FieldTree, FormConfig,
    FormController, FormData, FormError, FormSource, FormValue, Issue, IssuesAtPath, Validation,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Form data that can be edited between events, like a rendered form.
#[derive(Default)]
struct LiveForm(RefCell<FormData>);

impl LiveForm {
    fn from_urlencoded(body: &str) -> Rc<Self> {
        Rc::new(Self(RefCell::new(FormData::from_urlencoded(body))))
    }

    fn set(&self, name: &str, value: &str) {
        self.0.borrow_mut().set(name, value);
    }
}

impl FormSource for LiveForm {
    fn get_all(&self, name: &str) -> Vec<FormValue> {
        self.0.borrow().get_all(name)
    }

    fn names(&self) -> Vec<String> {
        self.0.borrow().names()
    }
}

fn min_len(min: usize) -> impl Fn(serde_json::Value) -> Validation + Send + Sync {
    move |v| match v.as_str() {
        Some(s) if s.chars().count() >= min => Validation::Success(v),
        _ => Validation::fail(Issue::schema(format!("must be at least {min} characters"))),
    }
}

// ============================================================================
// Mount
// ============================================================================

#[test]
fn test_mount_evaluates_every_field() {
    init_tracing();
    let name = string();
    let age = number();
    let form = FormController::new(
        FieldTree::map([("name", name.clone()), ("age", age.clone())]),
        FormConfig::default(),
    )
    .unwrap();

    let state = form.mount(LiveForm::from_urlencoded("name=Ann&age=x"));
    assert!(state.is_mounted());
    let name_state = state.field_state(&name).unwrap();
    assert!(name_state.is_mounted);
    assert_eq!(name_state.value(), Some(&json!("Ann")));
    assert_eq!(name_state.initial_raw, name_state.raw);
    assert!(!name_state.is_touched);
    assert_eq!(
        state.field_state(&age).unwrap().issues().map(|i| i.first().clone()),
        Some(Issue::InvalidNumber { input: "x".into() })
    );
    assert!(state.field_state(&age).unwrap().touched_issues.is_none());
}

#[test]
fn test_mount_is_idempotent() {
    let form = FormController::new(
        FieldTree::map([("name", string()), ("tags", repeat(string(), 2))]),
        FormConfig::default(),
    )
    .unwrap();
    let first = form.mount(LiveForm::from_urlencoded("name=a&tags[0]=x&tags[1]=y"));
    let second = form.dispatch(Action::Mount);
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_reused_field_is_rejected() {
    let shared = string();
    let err = FormController::new(
        FieldTree::map([("a", shared.clone()), ("b", shared.clone())]),
        FormConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, FormError::ReusedField { .. }));

    let nested = group([("x", shared.clone()), ("y", shared)]);
    assert!(FormController::new(nested, FormConfig::default()).is_err());
}

// ============================================================================
// Change
// ============================================================================

#[test]
fn test_change_to_same_value_is_noop() {
    let form = FormController::new(FieldTree::map([("name", string())]), FormConfig::default())
        .unwrap();
    let before = form.mount(LiveForm::from_urlencoded("name=bob"));
    let after = form.handle_change(["name"]);
    assert!(Arc::ptr_eq(&before, &after));
}

#[test]
fn test_change_updates_only_affected_entries() {
    let name = string();
    let email = string();
    let live = LiveForm::from_urlencoded("name=bob&email=b@x");
    let form = FormController::new(
        FieldTree::map([("name", name.clone()), ("email", email.clone())]),
        FormConfig::default(),
    )
    .unwrap();
    let before = form.mount(live.clone());

    live.set("name", "");
    let after = form.handle_change(["name"]);
    assert!(!Arc::ptr_eq(&before, &after));

    let state = after.field_state(&name).unwrap();
    assert!(state.is_touched);
    assert!(state.is_dirty);
    assert_eq!(state.status(), FieldStatus::Invalid);
    assert_eq!(
        state.touched_issues.as_ref().map(|i| i.first().clone()),
        Some(Issue::MissingField)
    );
    assert!(Arc::ptr_eq(
        before.fields().entry(&email.key()).unwrap(),
        after.fields().entry(&email.key()).unwrap()
    ));
}

#[test]
fn test_change_back_to_initial_is_clean() {
    let name = string();
    let live = LiveForm::from_urlencoded("name=a");
    let form = FormController::new(FieldTree::map([("name", name.clone())]), FormConfig::default())
        .unwrap();
    form.mount(live.clone());

    live.set("name", "b");
    form.handle_change(["name"]);
    assert!(form.get_state().field_state(&name).unwrap().is_dirty);

    live.set("name", "a");
    let state = form.handle_change(["name"]);
    let field = state.field_state(&name).unwrap();
    assert!(!field.is_dirty);
    assert!(field.is_touched);
}

#[test]
fn test_change_propagates_to_composites() {
    let first = string();
    let profile = group([("first", first.clone()), ("last", string())]).validate(|v| {
        let full = format!(
            "{} {}",
            v["first"].as_str().unwrap_or_default(),
            v["last"].as_str().unwrap_or_default()
        );
        Validation::success(full)
    });
    let live = LiveForm::from_urlencoded("p.profile.first=Ann&p.profile.last=Lee");
    let form = FormController::new(
        FieldTree::map([("profile", profile.clone())]),
        FormConfig::default().with_name("p"),
    )
    .unwrap();
    let mounted = form.mount(live.clone());
    assert_eq!(mounted.value(), Some(json!({"profile": "Ann Lee"})));

    live.set("p.profile.first", "Bo");
    let state = form.handle_change(["p.profile.first", "unrelated", "p.nope", "p..bad"]);
    assert_eq!(state.value(), Some(json!({"profile": "Bo Lee"})));
    let profile_state = state.field_state(&profile).unwrap();
    assert!(profile_state.is_touched);
    assert!(profile_state.is_dirty);

    live.set("p.profile.first", "");
    let state = form.handle_change(["p.profile.first"]);
    assert_eq!(state.field_state(&first).unwrap().status(), FieldStatus::Invalid);
    assert_eq!(state.field_state(&profile).unwrap().status(), FieldStatus::Indeterminate);
    assert_eq!(state.value(), None);
}

// ============================================================================
// Injected issues
// ============================================================================

#[test]
fn test_injected_issues_survive_unchanged_input() {
    let username = string();
    let live = LiveForm::from_urlencoded("username=bob");
    let form = FormController::new(
        FieldTree::map([("username", username.clone())]),
        FormConfig::default(),
    )
    .unwrap();
    form.mount(live.clone());

    let injected = form.set_issues(vec![IssuesAtPath::new(
        path!("username"),
        vec![Issue::schema("taken")],
    )]);
    let state = injected.field_state(&username).unwrap();
    assert!(state.has_external_issues);
    assert!(state.is_submitted && state.is_touched);
    assert_eq!(state.value(), None);

    // Same input: propagation stops before the node, the issue stays.
    let unchanged = form.handle_change(["username"]);
    assert!(Arc::ptr_eq(&injected, &unchanged));

    // Submit does not re-validate nodes carrying injected issues.
    let outcome = form.handle_submit();
    assert!(outcome.prevent_default);
    assert_eq!(outcome.submission.issues[0].issues, vec![Issue::schema("taken")]);

    // New input clears them.
    live.set("username", "bobby");
    let changed = form.handle_change(["username"]);
    let state = changed.field_state(&username).unwrap();
    assert!(!state.has_external_issues);
    assert_eq!(state.value(), Some(&json!("bobby")));
}

#[test]
fn test_injected_issues_on_composite_survive_child_change_without_new_value() {
    let qty = number();
    let line = group([("qty", qty.clone())]);
    let live = LiveForm::from_urlencoded("line.qty=abc");
    let form = FormController::new(FieldTree::map([("line", line.clone())]), FormConfig::default())
        .unwrap();
    form.mount(live.clone());
    form.set_issues(vec![IssuesAtPath::new(
        path!("line"),
        vec![Issue::schema("line rejected")],
    )]);

    // The child is still invalid, so the composite's input is unchanged.
    live.set("line.qty", "xyz");
    let state = form.handle_change(["line.qty"]);
    assert_eq!(
        state.field_state(&qty).unwrap().issues().map(|i| i.first().clone()),
        Some(Issue::InvalidNumber { input: "xyz".into() })
    );
    let line_state = state.field_state(&line).unwrap();
    assert!(line_state.has_external_issues);
    assert_eq!(
        line_state.issues().map(|i| i.first().clone()),
        Some(Issue::schema("line rejected"))
    );

    // Once the child resolves the composite input changes and is re-validated.
    live.set("line.qty", "3");
    let state = form.handle_change(["line.qty"]);
    let line_state = state.field_state(&line).unwrap();
    assert!(!line_state.has_external_issues);
    assert_eq!(line_state.value(), Some(&json!({"qty": 3})));
}

#[test]
fn test_injected_issues_merge() {
    let name = string();
    let form = FormController::new(FieldTree::map([("name", name.clone())]), FormConfig::default())
        .unwrap();
    form.mount(LiveForm::from_urlencoded(""));
    let state = form.set_issues(vec![IssuesAtPath::new(path!("name"), vec![Issue::schema("x")])]);
    let issues = state.field_state(&name).unwrap().issues().unwrap().to_vec();
    assert_eq!(issues, vec![Issue::MissingField, Issue::schema("x")]);
}

#[test]
fn test_repeated_injection_is_noop() {
    let name = string();
    let form = FormController::new(FieldTree::map([("name", name.clone())]), FormConfig::default())
        .unwrap();
    form.mount(LiveForm::from_urlencoded("name=bob"));
    let issues = vec![IssuesAtPath::new(path!("name"), vec![Issue::schema("taken")])];

    let first = form.set_issues(issues.clone());
    let second = form.set_issues(issues);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        second.field_state(&name).unwrap().issues().unwrap().as_slice(),
        &[Issue::schema("taken")]
    );
}

// ============================================================================
// Submit and reset
// ============================================================================

#[test]
fn test_submit_blocks_on_issues() {
    let username = string().validate(min_len(3));
    let live = LiveForm::from_urlencoded("username=");
    let form = FormController::new(FieldTree::map([("username", username.clone())]), FormConfig::default())
        .unwrap();
    form.mount(live.clone());

    let submitted = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&submitted);
    form.set_on_submit(move |value, _| sink.borrow_mut().push(value.clone()));

    let outcome = form.handle_submit();
    assert!(outcome.prevent_default);
    assert!(!outcome.submission.success);
    assert_eq!(outcome.submission.issues.len(), 1);
    assert_eq!(outcome.submission.issues[0].path, path!("username"));
    assert_eq!(outcome.submission.issues[0].issues, vec![Issue::MissingField]);
    let state = form.get_state().field_state(&username).unwrap().clone();
    assert!(state.is_submitted && state.is_touched);
    assert!(submitted.borrow().is_empty());

    live.set("username", "al");
    let outcome = form.handle_submit();
    assert!(outcome.prevent_default);
    assert_eq!(outcome.submission.issues[0].issues[0].kind(), "Schema");

    live.set("username", "alice");
    let outcome = form.handle_submit();
    assert!(!outcome.prevent_default);
    assert!(outcome.submission.success);
    assert_eq!(*submitted.borrow(), vec![json!({"username": "alice"})]);
}

#[test]
fn test_reset_clears_flags() {
    let name = string();
    let live = LiveForm::from_urlencoded("name=a");
    let form = FormController::new(FieldTree::map([("name", name.clone())]), FormConfig::default())
        .unwrap();
    form.mount(live.clone());
    live.set("name", "");
    form.handle_change(["name"]);
    form.handle_submit();
    form.set_issues(vec![IssuesAtPath::new(path!("name"), vec![Issue::schema("no")])]);

    live.set("name", "a");
    let state = form.handle_reset();
    let field = state.field_state(&name).unwrap();
    assert!(!field.is_touched && !field.is_dirty && !field.is_submitted);
    assert!(!field.has_external_issues);
    assert!(field.touched_issues.is_none());
    assert_eq!(field.value(), Some(&json!("a")));
    assert_eq!(field.initial_raw, field.raw);
    assert!(field.is_mounted);
}

// ============================================================================
// Tree edits
// ============================================================================

#[test]
fn test_set_fields_mounts_new_items_and_refreshes_parents() {
    let tags = repeat(string(), 1);
    let live = LiveForm::from_urlencoded("tags[0]=a&tags[1]=b");
    let form = FormController::new(FieldTree::map([("tags", tags.clone())]), FormConfig::default())
        .unwrap();
    let mounted = form.mount(live.clone());
    assert_eq!(mounted.value(), Some(json!({"tags": ["a"]})));

    let pushed = form
        .set_fields(|tree| tree.update_at(&path!("tags"), Field::push_item))
        .unwrap();
    assert_eq!(pushed.value(), Some(json!({"tags": ["a", "b"]})));
    let new_item = pushed.tree().field_at(&path!("tags", 1)).unwrap().clone();
    assert!(pushed.field_state(&new_item).unwrap().is_mounted);
    assert_eq!(pushed.control_name(&new_item).unwrap(), "tags[1]");

    let first_item = pushed.tree().field_at(&path!("tags", 0)).unwrap().key();
    let removed = form
        .set_fields(|tree| tree.update_at(&path!("tags"), |f| f.remove_item(0)))
        .unwrap();
    assert!(!removed.fields().contains_key(&first_item));
    assert_eq!(removed.value(), Some(json!({"tags": ["b"]})));
    assert_eq!(removed.control_name(&new_item).unwrap(), "tags[0]");
}

#[test]
fn test_set_fields_rejects_bad_tree() {
    let form = FormController::new(FieldTree::map([("a", string())]), FormConfig::default())
        .unwrap();
    let before = form.get_state();
    let shared = string();
    let err = form
        .set_fields(|_| Ok(FieldTree::map([("x", shared.clone()), ("y", shared.clone())])))
        .unwrap_err();
    assert!(matches!(err, FormError::ReusedField { .. }));
    assert!(Arc::ptr_eq(&before, &form.get_state()));
}

// ============================================================================
// Dispatch discipline
// ============================================================================

struct ReentrantSource {
    form: RefCell<Weak<FormController>>,
    error: RefCell<Option<FormError>>,
    data: FormData,
}

impl FormSource for ReentrantSource {
    fn get_all(&self, name: &str) -> Vec<FormValue> {
        let form = self.form.borrow().upgrade();
        if let Some(form) = form {
            if let Err(err) = form.try_dispatch(Action::Submit) {
                self.error.borrow_mut().get_or_insert(err);
            }
        }
        self.data.get_all(name)
    }

    fn names(&self) -> Vec<String> {
        self.data.names()
    }
}

#[test]
fn test_reentrant_dispatch_is_rejected() {
    let name = string();
    let form = Rc::new(
        FormController::new(FieldTree::map([("name", name.clone())]), FormConfig::default())
            .unwrap(),
    );
    let source = Rc::new(ReentrantSource {
        form: RefCell::new(Rc::downgrade(&form)),
        error: RefCell::new(None),
        data: FormData::from_urlencoded("name=a"),
    });

    let state = form.mount(source.clone());
    assert!(matches!(
        source.error.borrow().as_ref(),
        Some(FormError::ReentrantDispatch)
    ));
    assert_eq!(state.field_state(&name).unwrap().value(), Some(&json!("a")));

    *source.form.borrow_mut() = Weak::new();
    assert!(form.try_dispatch(Action::Submit).is_ok());
}

#[test]
fn test_subscribers_see_published_state() {
    let form = Rc::new(
        FormController::new(FieldTree::map([("name", string())]), FormConfig::default()).unwrap(),
    );
    let live = LiveForm::from_urlencoded("name=a");
    let calls = Rc::new(Cell::new(0));

    let weak = Rc::downgrade(&form);
    let seen = Rc::clone(&calls);
    form.subscribe(move |state| {
        seen.set(seen.get() + 1);
        let form = weak.upgrade().unwrap();
        assert!(Arc::ptr_eq(&form.get_state(), state));
        // Dispatching from a subscriber is allowed: the transition is over.
        assert!(form.try_dispatch(Action::Mount).is_ok());
    });

    form.mount(live.clone());
    assert_eq!(calls.get(), 1);

    form.handle_change(["name"]);
    assert_eq!(calls.get(), 1, "no-op transitions do not notify");

    live.set("name", "b");
    form.handle_change(["name"]);
    assert_eq!(calls.get(), 2);
}

#[test]
fn test_unmount_keeps_state() {
    let form = FormController::new(FieldTree::map([("name", string())]), FormConfig::default())
        .unwrap();
    let mounted = form.mount(LiveForm::from_urlencoded("name=a"));
    form.unmount();
    assert!(!form.is_mounted());
    assert!(Arc::ptr_eq(&mounted, &form.get_state()));
    // Without a live form there is nothing to read.
    assert!(Arc::ptr_eq(&mounted, &form.dispatch(Action::Submit)));
}
