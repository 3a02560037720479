//! Per-field state and immutable form snapshots.

use crate::cow::CowMap;
use crate::path::control_name;
use crate::traverse::{traverse, FieldIndex, Next, TreeNode, Visitor};
use crate::{
    Field, FieldKey, FieldStatus, FieldTree, FormConfig, FormResult, Issue, Issues, IssuesAtPath,
    Outcome, Path, RawInput,
};
use serde_json::{Map, Value};
use std::sync::Arc;

/// State of one field node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldState {
    /// Input extracted at mount or the last reset.
    pub initial_raw: Option<RawInput>,
    /// Input extracted by the last transition that evaluated this node.
    pub raw: Option<RawInput>,
    /// Current validation outcome.
    pub outcome: Outcome,
    /// Issues as of the last change, submit or injected issue set.
    pub touched_issues: Option<Issues>,
    /// The user changed the node, or the form was submitted.
    pub is_touched: bool,
    /// The current input differs from the initial one.
    pub is_dirty: bool,
    /// The form was submitted since mount or the last reset.
    pub is_submitted: bool,
    /// The node was evaluated against a live form.
    pub is_mounted: bool,
    /// Issues were injected from outside and survive re-validation until the
    /// node's input changes.
    pub has_external_issues: bool,
}

impl FieldState {
    /// The parsed value, if resolved.
    #[inline]
    pub fn value(&self) -> Option<&Value> {
        self.outcome.value()
    }

    /// Current issues, if invalid.
    #[inline]
    pub fn issues(&self) -> Option<&Issues> {
        self.outcome.issues()
    }

    /// Tri-state status.
    #[inline]
    pub fn status(&self) -> FieldStatus {
        self.outcome.status()
    }
}

/// Field states keyed by node identity.
pub type StateMap = CowMap<FieldKey, FieldState>;

/// An immutable view of a whole form.
///
/// Snapshots are replaced, never mutated. Transitions that change nothing
/// return the same `Arc`.
#[derive(Clone, Debug)]
pub struct FormSnapshot {
    config: Arc<FormConfig>,
    tree: Arc<FieldTree>,
    index: Arc<FieldIndex>,
    fields: StateMap,
    mounted: bool,
}

impl FormSnapshot {
    /// Index `tree` and create unmounted state for every field.
    pub fn new(tree: FieldTree, config: FormConfig) -> FormResult<Self> {
        config.validate()?;
        let index = FieldIndex::build(&tree)?;
        let fields = StateMap::from_entries(
            index
                .pre_order()
                .iter()
                .map(|key| (*key, FieldState::default())),
        );
        Ok(Self {
            config: Arc::new(config),
            tree: Arc::new(tree),
            index: Arc::new(index),
            fields,
            mounted: false,
        })
    }

    pub(crate) fn with_fields(&self, fields: StateMap, mounted: bool) -> Self {
        Self {
            config: Arc::clone(&self.config),
            tree: Arc::clone(&self.tree),
            index: Arc::clone(&self.index),
            fields,
            mounted,
        }
    }

    pub(crate) fn with_tree(
        &self,
        tree: FieldTree,
        index: FieldIndex,
        fields: StateMap,
        mounted: bool,
    ) -> Self {
        Self {
            config: Arc::clone(&self.config),
            tree: Arc::new(tree),
            index: Arc::new(index),
            fields,
            mounted,
        }
    }

    /// Form configuration.
    #[inline]
    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    /// Form name, if any.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.config.name.as_deref()
    }

    /// The field tree.
    #[inline]
    pub fn tree(&self) -> &FieldTree {
        &self.tree
    }

    /// Structural index of the tree.
    #[inline]
    pub fn index(&self) -> &FieldIndex {
        &self.index
    }

    /// All field states.
    #[inline]
    pub fn fields(&self) -> &StateMap {
        &self.fields
    }

    /// Whether a live form was mounted.
    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// State of `field`, failing with `MissingKey` for foreign nodes.
    pub fn field_state(&self, field: &Field) -> FormResult<&FieldState> {
        self.fields.get_or_err(&field.key())
    }

    /// State of the field at `path`.
    pub fn state_at(&self, path: &Path) -> Option<&FieldState> {
        self.index
            .key_at(path)
            .and_then(|key| self.fields.get(&key))
    }

    /// Control name to render for `field`.
    pub fn control_name(&self, field: &Field) -> FormResult<String> {
        let path = self
            .index
            .path_of(field.key())
            .ok_or_else(|| crate::FormError::field_not_found(field.key()))?;
        Ok(control_name(self.name(), path))
    }

    /// Whether any field currently has issues.
    pub fn has_issues(&self) -> bool {
        self.fields.iter().any(|(_, state)| state.issues().is_some())
    }

    /// Issues of every invalid field, in tree order.
    pub fn issues(&self) -> Vec<IssuesAtPath> {
        self.index
            .pre_order()
            .iter()
            .filter_map(|key| {
                let issues = self.fields.get(key)?.issues()?;
                let path = self.index.path_of(*key)?;
                Some(IssuesAtPath::new(path.clone(), issues.to_vec()))
            })
            .collect()
    }

    /// Like [`FormSnapshot::issues`], keeping only caller-defined issues.
    pub fn custom_issues(&self) -> Vec<IssuesAtPath> {
        self.issues()
            .into_iter()
            .filter_map(|entry| {
                let custom: Vec<Issue> = entry
                    .issues
                    .into_iter()
                    .filter(|issue| matches!(issue, Issue::Custom { .. }))
                    .collect();
                (!custom.is_empty()).then(|| IssuesAtPath::new(entry.path, custom))
            })
            .collect()
    }

    /// The resolved value of the whole tree.
    ///
    /// Lists and maps assemble their children's values into arrays and
    /// objects. Returns `None` while any field is unresolved.
    pub fn value(&self) -> Option<Value> {
        traverse(&self.tree, &mut Assemble { fields: &self.fields })
    }
}

struct Assemble<'s> {
    fields: &'s StateMap,
}

impl Visitor for Assemble<'_> {
    type Output = Option<Value>;

    fn visit(&mut self, node: TreeNode<'_>, _path: &Path, next: Next<'_>) -> Option<Value> {
        match node {
            TreeNode::Field(field) => self.fields.get(&field.key())?.value().cloned(),
            TreeNode::List(_) => next
                .visit_children(self)
                .into_iter()
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            TreeNode::Map(entries) => {
                let values = next.visit_children(self);
                let mut object = Map::with_capacity(entries.len());
                for ((name, _), value) in entries.iter().zip(values) {
                    object.insert(name.clone(), value?);
                }
                Some(Value::Object(object))
            }
        }
    }
}
