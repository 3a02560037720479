//! Field-tree traversal.
//!
//! [`traverse`] drives a [`Visitor`] over every node. The visitor decides
//! whether and when to descend by calling [`Next::visit_children`], which
//! yields the children's results in order: list elements and repeat items by
//! index, map and group entries in insertion order.

use crate::path::check_key;
use crate::{Field, FieldKey, FieldTree, FormError, FormResult, Path, Seg};
use std::collections::{HashMap, HashSet};

/// A borrowed node of a field tree.
#[derive(Clone, Copy, Debug)]
pub enum TreeNode<'t> {
    /// A field node (including fields nested inside other fields).
    Field(&'t Field),
    /// A plain list.
    List(&'t [FieldTree]),
    /// A plain map.
    Map(&'t [(String, FieldTree)]),
}

impl<'t> TreeNode<'t> {
    /// Borrow the root of a tree.
    pub fn of(tree: &'t FieldTree) -> Self {
        match tree {
            FieldTree::Field(field) => TreeNode::Field(field),
            FieldTree::List(items) => TreeNode::List(items),
            FieldTree::Map(entries) => TreeNode::Map(entries),
        }
    }

    /// The field, if this is a field node.
    #[inline]
    pub fn as_field(&self) -> Option<&'t Field> {
        match *self {
            TreeNode::Field(field) => Some(field),
            _ => None,
        }
    }

    /// Children paired with the segment addressing them.
    pub fn children(&self) -> Vec<(Seg, TreeNode<'t>)> {
        match *self {
            TreeNode::Field(field) => field
                .children()
                .entries()
                .into_iter()
                .map(|(seg, child)| (seg, TreeNode::Field(child)))
                .collect(),
            TreeNode::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (Seg::Index(i), TreeNode::of(item)))
                .collect(),
            TreeNode::Map(entries) => entries
                .iter()
                .map(|(k, tree)| (Seg::Key(k.clone()), TreeNode::of(tree)))
                .collect(),
        }
    }
}

/// Callback invoked once per visited node.
pub trait Visitor {
    /// Result of visiting one node.
    type Output;

    /// Visit `node` at `path`. Call `next.visit_children(self)` to descend.
    fn visit(&mut self, node: TreeNode<'_>, path: &Path, next: Next<'_>) -> Self::Output;
}

/// Continuation handed to [`Visitor::visit`].
pub struct Next<'t> {
    path: Path,
    children: Vec<(Seg, TreeNode<'t>)>,
}

impl<'t> Next<'t> {
    /// Visit every child and collect the results in child order.
    pub fn visit_children<V: Visitor + ?Sized>(self, visitor: &mut V) -> Vec<V::Output> {
        let Next { path, children } = self;
        children
            .into_iter()
            .map(|(seg, child)| walk(child, path.with_segment(seg), &mut *visitor))
            .collect()
    }

    /// Number of direct children.
    #[inline]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns true for leaves.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

fn walk<V: Visitor + ?Sized>(node: TreeNode<'_>, path: Path, visitor: &mut V) -> V::Output {
    let next = Next {
        path: path.clone(),
        children: node.children(),
    };
    visitor.visit(node, &path, next)
}

/// Traverse `tree` from the root.
pub fn traverse<V: Visitor + ?Sized>(tree: &FieldTree, visitor: &mut V) -> V::Output {
    walk(TreeNode::of(tree), Path::root(), visitor)
}

struct Flatten {
    out: Vec<(Path, Field)>,
}

impl Visitor for Flatten {
    type Output = ();

    fn visit(&mut self, node: TreeNode<'_>, path: &Path, next: Next<'_>) {
        if let Some(field) = node.as_field() {
            self.out.push((path.clone(), field.clone()));
        }
        next.visit_children(self);
    }
}

/// Every field with its path, in pre-order.
pub fn flatten(tree: &FieldTree) -> Vec<(Path, Field)> {
    let mut visitor = Flatten { out: Vec::new() };
    traverse(tree, &mut visitor);
    visitor.out
}

/// The path of `field` in `tree`.
///
/// Fails with `FieldNotFound` when the node is absent and with `ReusedField`
/// when it occurs more than once.
pub fn field_path(tree: &FieldTree, field: &Field) -> FormResult<Path> {
    let mut found = flatten(tree)
        .into_iter()
        .filter(|(_, f)| f.key() == field.key())
        .map(|(path, _)| path);
    let first = found
        .next()
        .ok_or_else(|| FormError::field_not_found(field.key()))?;
    match found.next() {
        Some(second) => Err(FormError::reused_field(field.key(), first, second)),
        None => Ok(first),
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    path: Path,
    field: Field,
    parent: Option<FieldKey>,
    children: Vec<FieldKey>,
}

/// Structural index of a validated field tree.
///
/// Built once per tree: maps keys to paths and back, records the field
/// parent chain (lists and maps are skipped) and a post-order listing in
/// which children always precede their parents.
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    entries: HashMap<FieldKey, IndexEntry>,
    by_path: HashMap<Path, FieldKey>,
    pre_order: Vec<FieldKey>,
    post_order: Vec<FieldKey>,
}

impl FieldIndex {
    /// Index `tree`, validating its structure.
    ///
    /// Fails on invalid or duplicated keys and on reused field nodes.
    pub fn build(tree: &FieldTree) -> FormResult<Self> {
        let mut index = FieldIndex::default();
        index.visit(TreeNode::of(tree), Path::root(), None)?;
        Ok(index)
    }

    fn visit(&mut self, node: TreeNode<'_>, path: Path, parent: Option<FieldKey>) -> FormResult<()> {
        let children = node.children();
        let mut seen = HashSet::new();
        for (seg, _) in &children {
            if let Seg::Key(k) = seg {
                check_key(k)?;
                if !seen.insert(k.as_str()) {
                    return Err(FormError::duplicate_key(path.clone(), k.clone()));
                }
            }
        }

        let own = match node.as_field() {
            Some(field) => {
                let key = field.key();
                if let Some(existing) = self.entries.get(&key) {
                    return Err(FormError::reused_field(key, existing.path.clone(), path));
                }
                if let Some(parent) = parent.and_then(|p| self.entries.get_mut(&p)) {
                    parent.children.push(key);
                }
                self.entries.insert(
                    key,
                    IndexEntry {
                        path: path.clone(),
                        field: field.clone(),
                        parent,
                        children: Vec::new(),
                    },
                );
                self.by_path.insert(path.clone(), key);
                self.pre_order.push(key);
                Some(key)
            }
            None => None,
        };

        for (seg, child) in children {
            self.visit(child, path.with_segment(seg), own.or(parent))?;
        }
        if let Some(key) = own {
            self.post_order.push(key);
        }
        Ok(())
    }

    /// Number of fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the tree has no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` is part of the tree.
    #[inline]
    pub fn contains(&self, key: FieldKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Path of the field with `key`.
    pub fn path_of(&self, key: FieldKey) -> Option<&Path> {
        self.entries.get(&key).map(|e| &e.path)
    }

    /// The field with `key`.
    pub fn field(&self, key: FieldKey) -> Option<&Field> {
        self.entries.get(&key).map(|e| &e.field)
    }

    /// Key of the field at `path`.
    pub fn key_at(&self, path: &Path) -> Option<FieldKey> {
        self.by_path.get(path).copied()
    }

    /// The field at `path`.
    pub fn field_at(&self, path: &Path) -> Option<&Field> {
        self.key_at(path).and_then(|key| self.field(key))
    }

    /// Nearest field ancestor.
    pub fn parent(&self, key: FieldKey) -> Option<FieldKey> {
        self.entries.get(&key).and_then(|e| e.parent)
    }

    /// Field ancestors, nearest first.
    pub fn ancestors(&self, key: FieldKey) -> Vec<FieldKey> {
        std::iter::successors(self.parent(key), |k| self.parent(*k)).collect()
    }

    /// Direct field children, in child order.
    pub fn children(&self, key: FieldKey) -> &[FieldKey] {
        self.entries
            .get(&key)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    /// Keys in pre-order (parents before children).
    #[inline]
    pub fn pre_order(&self) -> &[FieldKey] {
        &self.pre_order
    }

    /// Keys in post-order (children before parents).
    #[inline]
    pub fn post_order(&self) -> &[FieldKey] {
        &self.post_order
    }

    /// Every indexed field key.
    pub fn keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.entries.keys().copied()
    }
}
