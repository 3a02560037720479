//! Field definition algebra.
//!
//! A [`Field`] is an immutable node handle. Nodes are built from a few
//! constructors ([`value`], [`values`], [`group`], [`repeat`]) and refined with
//! [`Field::validate`], which always returns a new node that shares its base.
//!
//! ```
//! use tirea_form::{group, repeat, string, Issue, Validation};
//!
//! let tag = string().validate(|v| match v.as_str() {
//!     Some(s) if s.len() <= 16 => Validation::success(s.to_lowercase()),
//!     _ => Validation::fail(Issue::schema("tag is too long")),
//! });
//! let post = group([("title", string()), ("tags", repeat(tag, 2))]);
//! assert!(post.items().is_none());
//! assert_eq!(post.children().entries().len(), 2);
//! ```

use crate::{CustomIssue, FieldKey, FormError, FormResult, FormValue, Issue, Path, Seg, Validation};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Parses the entries submitted under a leaf's control name.
pub type Parser = Arc<dyn Fn(&[FormValue]) -> Validation + Send + Sync>;

/// One step of a validator chain, fed the previous step's value.
pub type Validator = Arc<dyn Fn(Value) -> Validation + Send + Sync>;

/// Repeat indices at or above this bound are ignored by
/// [`Field::restore_from_paths`].
pub const MAX_RESTORED_ITEMS: usize = 1024;

/// A node of the field tree.
///
/// Cloning a `Field` clones the handle, not the node: both handles share one
/// identity key. Use [`Field::deep_clone`] for an independent copy.
#[derive(Clone)]
pub struct Field(Arc<FieldNode>);

struct FieldNode {
    key: FieldKey,
    kind: FieldKind,
    issue_kinds: Vec<&'static str>,
}

/// The closed set of node kinds.
#[derive(Clone)]
pub enum FieldKind {
    /// Single-valued control.
    Value(Parser),
    /// Multi-valued control (all entries under one name).
    Values(Parser),
    /// Named children, in insertion order.
    Group(Vec<(String, Field)>),
    /// A dynamic list of clones of a template.
    Repeat(Repeat),
    /// A base node refined by one more validation step.
    Validate {
        /// The refined node. Its children are this node's children.
        base: Field,
        /// Runs after the base succeeded.
        step: Validator,
    },
}

/// Template and current items of a repeat node.
#[derive(Clone)]
pub struct Repeat {
    template: Field,
    items: Vec<Field>,
}

impl Repeat {
    /// The template new items are cloned from.
    #[inline]
    pub fn template(&self) -> &Field {
        &self.template
    }

    /// Current items, in index order.
    #[inline]
    pub fn items(&self) -> &[Field] {
        &self.items
    }
}

/// Tag of a [`FieldKind`], without payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKindTag {
    /// See [`FieldKind::Value`].
    Value,
    /// See [`FieldKind::Values`].
    Values,
    /// See [`FieldKind::Group`].
    Group,
    /// See [`FieldKind::Repeat`].
    Repeat,
    /// See [`FieldKind::Validate`].
    Validate,
}

/// Addressable children of a node.
#[derive(Clone, Copy, Debug)]
pub enum Children<'a> {
    /// A leaf.
    None,
    /// Group entries.
    Group(&'a [(String, Field)]),
    /// Repeat items.
    Repeat(&'a [Field]),
}

impl<'a> Children<'a> {
    /// Children paired with the segment addressing them.
    pub fn entries(&self) -> Vec<(Seg, &'a Field)> {
        match *self {
            Children::None => Vec::new(),
            Children::Group(entries) => entries
                .iter()
                .map(|(k, f)| (Seg::Key(k.clone()), f))
                .collect(),
            Children::Repeat(items) => items
                .iter()
                .enumerate()
                .map(|(i, f)| (Seg::Index(i), f))
                .collect(),
        }
    }

    /// The child at `seg`.
    pub fn get(&self, seg: &Seg) -> Option<&'a Field> {
        match (*self, seg) {
            (Children::Group(entries), Seg::Key(k)) => {
                entries.iter().find(|(name, _)| name == k).map(|(_, f)| f)
            }
            (Children::Repeat(items), Seg::Index(i)) => items.get(*i),
            _ => None,
        }
    }

    /// Returns true for leaves.
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Children::None)
    }
}

impl Field {
    fn from_parts(key: FieldKey, kind: FieldKind, issue_kinds: Vec<&'static str>) -> Self {
        Field(Arc::new(FieldNode {
            key,
            kind,
            issue_kinds,
        }))
    }

    /// Create a node with a fresh key.
    pub fn new(kind: FieldKind) -> Self {
        Self::from_parts(FieldKey::next(), kind, Vec::new())
    }

    /// Same identity, different kind. Used for structural edits.
    fn with_kind(&self, kind: FieldKind) -> Self {
        Self::from_parts(self.0.key, kind, self.0.issue_kinds.clone())
    }

    /// The node's identity key.
    #[inline]
    pub fn key(&self) -> FieldKey {
        self.0.key
    }

    /// The node's kind.
    #[inline]
    pub fn kind(&self) -> &FieldKind {
        &self.0.kind
    }

    /// The node's kind tag.
    pub fn tag(&self) -> FieldKindTag {
        match &self.0.kind {
            FieldKind::Value(_) => FieldKindTag::Value,
            FieldKind::Values(_) => FieldKindTag::Values,
            FieldKind::Group(_) => FieldKindTag::Group,
            FieldKind::Repeat(_) => FieldKindTag::Repeat,
            FieldKind::Validate { .. } => FieldKindTag::Validate,
        }
    }

    /// The innermost non-`Validate` kind; decides how input is extracted.
    pub fn base_kind(&self) -> &FieldKind {
        match &self.0.kind {
            FieldKind::Validate { base, .. } => base.base_kind(),
            kind => kind,
        }
    }

    /// Returns true for group and repeat nodes (through validate wrappers).
    pub fn is_composite(&self) -> bool {
        matches!(self.base_kind(), FieldKind::Group(_) | FieldKind::Repeat(_))
    }

    /// Addressable children. A validate wrapper exposes its base's children.
    pub fn children(&self) -> Children<'_> {
        match &self.0.kind {
            FieldKind::Value(_) | FieldKind::Values(_) => Children::None,
            FieldKind::Group(entries) => Children::Group(entries),
            FieldKind::Repeat(repeat) => Children::Repeat(&repeat.items),
            FieldKind::Validate { base, .. } => base.children(),
        }
    }

    /// The child at `seg`.
    #[inline]
    pub fn child(&self, seg: &Seg) -> Option<&Field> {
        self.children().get(seg)
    }

    /// Repeat payload, through validate wrappers.
    pub fn as_repeat(&self) -> Option<&Repeat> {
        match self.base_kind() {
            FieldKind::Repeat(repeat) => Some(repeat),
            _ => None,
        }
    }

    /// Repeat items, through validate wrappers.
    #[inline]
    pub fn items(&self) -> Option<&[Field]> {
        self.as_repeat().map(Repeat::items)
    }

    /// Issue kinds declared with [`Field::with_issue`].
    #[inline]
    pub fn issue_kinds(&self) -> &[&'static str] {
        &self.0.issue_kinds
    }

    /// Refine this node with one more validation step.
    ///
    /// Returns a new node (new key) whose children are this node's children.
    /// The step only runs when everything before it succeeded.
    #[must_use]
    pub fn validate<F>(&self, step: F) -> Field
    where
        F: Fn(Value) -> Validation + Send + Sync + 'static,
    {
        Self::from_parts(
            FieldKey::next(),
            FieldKind::Validate {
                base: self.clone(),
                step: Arc::new(step),
            },
            self.0.issue_kinds.clone(),
        )
    }

    /// Declare that validators of this node may report issues of kind `T`.
    #[must_use]
    pub fn with_issue<T: CustomIssue>(&self) -> Field {
        let mut issue_kinds = self.0.issue_kinds.clone();
        if !issue_kinds.contains(&T::KIND) {
            issue_kinds.push(T::KIND);
        }
        Self::from_parts(self.0.key, self.0.kind.clone(), issue_kinds)
    }

    /// Run the validator chain over extracted input.
    pub(crate) fn run(&self, input: &crate::RawInput) -> Validation {
        use crate::RawInput;

        match (&self.0.kind, input) {
            (FieldKind::Value(parse) | FieldKind::Values(parse), RawInput::Entries(entries)) => {
                parse(entries)
            }
            (FieldKind::Group(_) | FieldKind::Repeat(_), RawInput::Composite(Some(value))) => {
                Validation::Success(value.clone())
            }
            (FieldKind::Group(_) | FieldKind::Repeat(_), RawInput::Composite(None)) => {
                Validation::Failure(Vec::new())
            }
            (FieldKind::Validate { base, step }, _) => match base.run(input) {
                Validation::Success(value) => step(value),
                failure => failure,
            },
            _ => Validation::fail(Issue::validation_error(format_args!(
                "{:?} field received mismatched input",
                self.tag()
            ))),
        }
    }

    /// Copy the whole subtree with fresh keys. Validators are shared.
    pub fn deep_clone(&self) -> Field {
        let kind = match &self.0.kind {
            FieldKind::Value(parse) => FieldKind::Value(parse.clone()),
            FieldKind::Values(parse) => FieldKind::Values(parse.clone()),
            FieldKind::Group(entries) => FieldKind::Group(
                entries
                    .iter()
                    .map(|(k, f)| (k.clone(), f.deep_clone()))
                    .collect(),
            ),
            FieldKind::Repeat(repeat) => FieldKind::Repeat(Repeat {
                template: repeat.template.deep_clone(),
                items: repeat.items.iter().map(Field::deep_clone).collect(),
            }),
            FieldKind::Validate { base, step } => FieldKind::Validate {
                base: base.deep_clone(),
                step: step.clone(),
            },
        };
        Self::from_parts(FieldKey::next(), kind, self.0.issue_kinds.clone())
    }

    /// Rebuild the innermost kind, keeping every key along the validate chain.
    fn map_base(&self, f: impl FnOnce(&FieldKind) -> FormResult<FieldKind>) -> FormResult<Field> {
        match &self.0.kind {
            FieldKind::Validate { base, step } => Ok(self.with_kind(FieldKind::Validate {
                base: base.map_base(f)?,
                step: step.clone(),
            })),
            kind => Ok(self.with_kind(f(kind)?)),
        }
    }

    /// Replace the child at `seg`, keeping this node's key.
    pub fn with_child(&self, seg: &Seg, child: Field) -> FormResult<Field> {
        self.map_base(|kind| match (kind, seg) {
            (FieldKind::Group(entries), Seg::Key(k)) => {
                let mut entries = entries.clone();
                let slot = entries
                    .iter_mut()
                    .find(|(name, _)| name == k)
                    .ok_or_else(|| FormError::path_not_found(Path::root().key(k.clone())))?;
                slot.1 = child;
                Ok(FieldKind::Group(entries))
            }
            (FieldKind::Repeat(repeat), Seg::Index(i)) if *i < repeat.items.len() => {
                let mut repeat = repeat.clone();
                repeat.items[*i] = child;
                Ok(FieldKind::Repeat(repeat))
            }
            _ => Err(FormError::path_not_found(Path::root().with_segment(seg.clone()))),
        })
    }

    /// Replace the descendant at `path` (relative to this node) with `f(node)`.
    ///
    /// Nodes along the way keep their keys; siblings are reused as-is.
    pub fn update_at(
        &self,
        path: &Path,
        f: impl FnOnce(&Field) -> FormResult<Field>,
    ) -> FormResult<Field> {
        let (head, rest) = path.split_head();
        let Some(head) = head else {
            return f(self);
        };
        let child = self
            .child(head)
            .ok_or_else(|| FormError::path_not_found(path.clone()))?;
        let updated = child.update_at(&rest, f)?;
        self.with_child(head, updated)
    }

    fn map_items(
        &self,
        f: impl FnOnce(&Repeat) -> FormResult<Vec<Field>>,
    ) -> FormResult<Field> {
        self.map_base(|kind| match kind {
            FieldKind::Repeat(repeat) => Ok(FieldKind::Repeat(Repeat {
                template: repeat.template.clone(),
                items: f(repeat)?,
            })),
            _ => Err(FormError::invalid_operation(format!(
                "field {} is not a repeat",
                self.key()
            ))),
        })
    }

    /// A fresh clone of the repeat's template.
    pub fn new_item(&self) -> FormResult<Field> {
        self.as_repeat()
            .map(|repeat| repeat.template.deep_clone())
            .ok_or_else(|| {
                FormError::invalid_operation(format!("field {} is not a repeat", self.key()))
            })
    }

    /// Replace all repeat items.
    pub fn with_items(&self, items: Vec<Field>) -> FormResult<Field> {
        self.map_items(|_| Ok(items))
    }

    /// Append a fresh item.
    pub fn push_item(&self) -> FormResult<Field> {
        self.map_items(|repeat| {
            let mut items = repeat.items.clone();
            items.push(repeat.template.deep_clone());
            Ok(items)
        })
    }

    /// Insert a fresh item at `index` (`index == len` appends).
    pub fn insert_item(&self, index: usize) -> FormResult<Field> {
        self.map_items(|repeat| {
            if index > repeat.items.len() {
                return Err(out_of_bounds(index, repeat.items.len()));
            }
            let mut items = repeat.items.clone();
            items.insert(index, repeat.template.deep_clone());
            Ok(items)
        })
    }

    /// Remove the item at `index`.
    pub fn remove_item(&self, index: usize) -> FormResult<Field> {
        self.map_items(|repeat| {
            if index >= repeat.items.len() {
                return Err(out_of_bounds(index, repeat.items.len()));
            }
            let mut items = repeat.items.clone();
            items.remove(index);
            Ok(items)
        })
    }

    /// Move the item at `from` so that it ends up at `to`.
    pub fn move_item(&self, from: usize, to: usize) -> FormResult<Field> {
        self.map_items(|repeat| {
            let len = repeat.items.len();
            if from >= len || to >= len {
                return Err(out_of_bounds(from.max(to), len));
            }
            let mut items = repeat.items.clone();
            let item = items.remove(from);
            items.insert(to, item);
            Ok(items)
        })
    }

    /// Rebuild repeat sizes from previously observed paths (relative to this
    /// node).
    ///
    /// For a repeat, paths are grouped by their leading index; the item count
    /// becomes `max(index) + 1`, indices without sub-paths are filled with
    /// fresh template clones, and each item is restored from its own
    /// sub-paths. Existing items are reused by position. Groups and validate
    /// wrappers restore their children; leaves are returned unchanged.
    pub fn restore_from_paths(&self, paths: &[Path]) -> Field {
        match &self.0.kind {
            FieldKind::Value(_) | FieldKind::Values(_) => self.clone(),
            FieldKind::Validate { base, step } => self.with_kind(FieldKind::Validate {
                base: base.restore_from_paths(paths),
                step: step.clone(),
            }),
            FieldKind::Group(entries) => {
                let entries = entries
                    .iter()
                    .map(|(name, child)| {
                        let sub = sub_paths(paths, |seg| seg.as_key() == Some(name.as_str()));
                        (name.clone(), child.restore_from_paths(&sub))
                    })
                    .collect();
                self.with_kind(FieldKind::Group(entries))
            }
            FieldKind::Repeat(repeat) => {
                let mut by_index: BTreeMap<usize, Vec<Path>> = BTreeMap::new();
                for path in paths {
                    if let (Some(Seg::Index(i)), rest) = path.split_head() {
                        if *i >= MAX_RESTORED_ITEMS {
                            tracing::warn!(index = *i, "ignoring repeat index above restore limit");
                            continue;
                        }
                        by_index.entry(*i).or_default().push(rest);
                    }
                }
                let count = by_index.keys().next_back().map_or(0, |max| max + 1);
                let items = (0..count)
                    .map(|i| {
                        let item = repeat
                            .items
                            .get(i)
                            .cloned()
                            .unwrap_or_else(|| repeat.template.deep_clone());
                        let sub = by_index.get(&i).map(Vec::as_slice).unwrap_or(&[]);
                        item.restore_from_paths(sub)
                    })
                    .collect();
                self.with_kind(FieldKind::Repeat(Repeat {
                    template: repeat.template.clone(),
                    items,
                }))
            }
        }
    }
}

pub(crate) fn sub_paths(paths: &[Path], head_matches: impl Fn(&Seg) -> bool) -> Vec<Path> {
    paths
        .iter()
        .filter_map(|path| match path.split_head() {
            (Some(head), rest) if head_matches(head) => Some(rest),
            _ => None,
        })
        .collect()
}

fn out_of_bounds(index: usize, len: usize) -> FormError {
    FormError::invalid_operation(format!("repeat index {index} out of bounds (len: {len})"))
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.0.key == other.0.key
    }
}

impl Eq for Field {}

impl Hash for Field {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key.hash(state);
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.key();
        match &self.0.kind {
            FieldKind::Value(_) => write!(f, "Value({key})"),
            FieldKind::Values(_) => write!(f, "Values({key})"),
            FieldKind::Group(entries) => {
                write!(f, "Group({key}) ")?;
                f.debug_map()
                    .entries(entries.iter().map(|(k, v)| (k, v)))
                    .finish()
            }
            FieldKind::Repeat(repeat) => {
                write!(f, "Repeat({key}) ")?;
                f.debug_list().entries(&repeat.items).finish()
            }
            FieldKind::Validate { base, .. } => write!(f, "Validate({key}, {base:?})"),
        }
    }
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Value(_) => f.write_str("Value"),
            FieldKind::Values(_) => f.write_str("Values"),
            FieldKind::Group(entries) => f
                .debug_tuple("Group")
                .field(&entries.iter().map(|(k, _)| k).collect::<Vec<_>>())
                .finish(),
            FieldKind::Repeat(repeat) => f
                .debug_struct("Repeat")
                .field("items", &repeat.items.len())
                .finish(),
            FieldKind::Validate { base, .. } => {
                f.debug_struct("Validate").field("base", &base.key()).finish()
            }
        }
    }
}

impl fmt::Debug for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repeat")
            .field("template", &self.template)
            .field("items", &self.items)
            .finish()
    }
}

// ============================================================================
// Constructors
// ============================================================================

fn single(entries: &[FormValue]) -> Result<&FormValue, Validation> {
    match entries {
        [] => Err(Validation::fail(Issue::MissingField)),
        [one] => Ok(one),
        many => Err(Validation::fail(Issue::UnexpectedMultipleValues {
            count: many.len(),
        })),
    }
}

/// A single-valued leaf with a custom entry parser.
pub fn value_with<F>(parse: F) -> Field
where
    F: Fn(&[FormValue]) -> Validation + Send + Sync + 'static,
{
    Field::new(FieldKind::Value(Arc::new(parse)))
}

/// A multi-valued leaf with a custom entry parser.
pub fn values_with<F>(parse: F) -> Field
where
    F: Fn(&[FormValue]) -> Validation + Send + Sync + 'static,
{
    Field::new(FieldKind::Values(Arc::new(parse)))
}

/// A single-valued leaf accepting exactly one text or file entry.
pub fn value() -> Field {
    value_with(|entries| match single(entries) {
        Ok(entry) => Validation::Success(entry.to_json()),
        Err(failure) => failure,
    })
}

/// A multi-valued leaf collecting every entry into an array.
pub fn values() -> Field {
    values_with(|entries| {
        Validation::Success(Value::Array(entries.iter().map(FormValue::to_json).collect()))
    })
}

/// Named children.
pub fn group<K, I>(entries: I) -> Field
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Field)>,
{
    Field::new(FieldKind::Group(
        entries.into_iter().map(|(k, f)| (k.into(), f)).collect(),
    ))
}

/// A repeat holding `initial_count` independent clones of `template`.
pub fn repeat(template: Field, initial_count: usize) -> Field {
    let items = (0..initial_count).map(|_| template.deep_clone()).collect();
    Field::new(FieldKind::Repeat(Repeat { template, items }))
}

/// Required non-empty text.
pub fn string() -> Field {
    value_with(|entries| match single(entries) {
        Ok(FormValue::Text(s)) if s.is_empty() => Validation::fail(Issue::MissingField),
        Ok(FormValue::Text(s)) => Validation::success(s.clone()),
        Ok(FormValue::File(_)) => Validation::fail(Issue::UnexpectedFile),
        Err(failure) => failure,
    })
}

/// Optional text; absent or empty input resolves to `null`.
pub fn optional_string() -> Field {
    value_with(|entries| match entries {
        [] => Validation::Success(Value::Null),
        _ => match single(entries) {
            Ok(FormValue::Text(s)) if s.is_empty() => Validation::Success(Value::Null),
            Ok(FormValue::Text(s)) => Validation::success(s.clone()),
            Ok(FormValue::File(_)) => Validation::fail(Issue::UnexpectedFile),
            Err(failure) => failure,
        },
    })
}

/// Required number. Integers parse to JSON integers, everything else to
/// floats; non-finite input is rejected.
pub fn number() -> Field {
    value_with(|entries| match single(entries) {
        Ok(FormValue::Text(s)) => parse_number(s),
        Ok(FormValue::File(_)) => Validation::fail(Issue::UnexpectedFile),
        Err(failure) => failure,
    })
}

fn parse_number(input: &str) -> Validation {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Validation::fail(Issue::MissingField);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Validation::Success(Value::from(i));
    }
    match trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Validation::Success(Value::Number(n)),
        None => Validation::fail(Issue::InvalidNumber {
            input: input.to_owned(),
        }),
    }
}

/// A checkbox: `true` when any entry is present.
pub fn checkbox() -> Field {
    value_with(|entries| Validation::Success(Value::Bool(!entries.is_empty())))
}

/// Required non-empty file.
pub fn file() -> Field {
    value_with(|entries| match single(entries) {
        Ok(FormValue::File(f)) if f.is_empty() => Validation::fail(Issue::EmptyFile),
        Ok(FormValue::File(f)) => Validation::Success(f.to_json()),
        Ok(FormValue::Text(_)) => Validation::fail(Issue::UnexpectedString),
        Err(failure) => failure,
    })
}

/// All text entries under one name.
pub fn strings() -> Field {
    values_with(|entries| {
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                FormValue::Text(s) => out.push(Value::String(s.clone())),
                FormValue::File(_) => return Validation::fail(Issue::UnexpectedFile),
            }
        }
        Validation::Success(Value::Array(out))
    })
}

/// All non-empty file entries under one name.
pub fn files() -> Field {
    values_with(|entries| {
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                FormValue::File(f) if f.is_empty() => {}
                FormValue::File(f) => out.push(f.to_json()),
                FormValue::Text(_) => return Validation::fail(Issue::UnexpectedString),
            }
        }
        Validation::Success(Value::Array(out))
    })
}

/// Build an object value from named child values.
pub(crate) fn object_value<'a>(entries: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
    Value::Object(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect::<Map<String, Value>>(),
    )
}
