//! Field trees: fields nested in plain lists and maps.
//!
//! Lists and maps are structural sugar. They address their children but have
//! no state of their own; only [`Field`] nodes are stateful.

use crate::field::sub_paths;
use crate::path::parse_control_name;
use crate::traverse::flatten;
use crate::{Field, FormError, FormResult, FormSource, Path, Seg};

/// A field, or a plain list/map of trees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldTree {
    /// A stateful field node.
    Field(Field),
    /// Children addressed by index.
    List(Vec<FieldTree>),
    /// Children addressed by key, in insertion order.
    Map(Vec<(String, FieldTree)>),
}

impl From<Field> for FieldTree {
    fn from(field: Field) -> Self {
        FieldTree::Field(field)
    }
}

impl FieldTree {
    /// Build a map node.
    ///
    /// Key validity and uniqueness are checked when the tree is indexed.
    pub fn map<K, T, I>(entries: I) -> Self
    where
        K: Into<String>,
        T: Into<FieldTree>,
        I: IntoIterator<Item = (K, T)>,
    {
        FieldTree::Map(
            entries
                .into_iter()
                .map(|(k, t)| (k.into(), t.into()))
                .collect(),
        )
    }

    /// Build a list node.
    pub fn list<T, I>(items: I) -> Self
    where
        T: Into<FieldTree>,
        I: IntoIterator<Item = T>,
    {
        FieldTree::List(items.into_iter().map(Into::into).collect())
    }

    /// The field at the root, if the root is a field.
    #[inline]
    pub fn as_field(&self) -> Option<&Field> {
        match self {
            FieldTree::Field(field) => Some(field),
            _ => None,
        }
    }

    /// The field at `path`, descending into field children where needed.
    pub fn field_at(&self, path: &Path) -> Option<&Field> {
        let mut tree = self;
        for (depth, seg) in path.iter().enumerate() {
            match (tree, seg) {
                (FieldTree::Field(field), _) => {
                    let rest = Path::from_segments(path.segments()[depth..].to_vec());
                    return descend(field, &rest);
                }
                (FieldTree::List(items), Seg::Index(i)) => tree = items.get(*i)?,
                (FieldTree::Map(entries), Seg::Key(k)) => {
                    tree = entries.iter().find(|(name, _)| name == k).map(|(_, t)| t)?;
                }
                _ => return None,
            }
        }
        tree.as_field()
    }

    /// Replace the field at `path` with `f(field)`.
    ///
    /// Fields along the way keep their keys; everything off the path is reused.
    pub fn update_at(
        &self,
        path: &Path,
        f: impl FnOnce(&Field) -> FormResult<Field>,
    ) -> FormResult<FieldTree> {
        let (head, rest) = path.split_head();
        match (self, head) {
            (FieldTree::Field(field), _) => Ok(FieldTree::Field(field.update_at(path, f)?)),
            (_, None) => Err(FormError::invalid_operation(
                "cannot update a list or map node as a field",
            )),
            (FieldTree::List(items), Some(Seg::Index(i))) if *i < items.len() => {
                let mut items = items.clone();
                items[*i] = items[*i].update_at(&rest, f)?;
                Ok(FieldTree::List(items))
            }
            (FieldTree::Map(entries), Some(Seg::Key(k))) => {
                let mut entries = entries.clone();
                let slot = entries
                    .iter_mut()
                    .find(|(name, _)| name == k)
                    .ok_or_else(|| FormError::path_not_found(path.clone()))?;
                slot.1 = slot.1.update_at(&rest, f)?;
                Ok(FieldTree::Map(entries))
            }
            _ => Err(FormError::path_not_found(path.clone())),
        }
    }

    /// Rebuild repeat sizes from previously observed paths.
    ///
    /// See [`Field::restore_from_paths`]. Lists and maps keep their shape.
    pub fn restore_from_paths(&self, paths: &[Path]) -> FieldTree {
        match self {
            FieldTree::Field(field) => FieldTree::Field(field.restore_from_paths(paths)),
            FieldTree::List(items) => FieldTree::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        item.restore_from_paths(&sub_paths(paths, |seg| seg.as_index() == Some(i)))
                    })
                    .collect(),
            ),
            FieldTree::Map(entries) => FieldTree::Map(
                entries
                    .iter()
                    .map(|(name, tree)| {
                        let sub = sub_paths(paths, |seg| seg.as_key() == Some(name.as_str()));
                        (name.clone(), tree.restore_from_paths(&sub))
                    })
                    .collect(),
            ),
        }
    }

    /// Rebuild repeat sizes from the control names present in submitted data.
    ///
    /// Names that do not belong to the form or do not parse are ignored.
    pub fn restore_from_form_data(&self, form_name: Option<&str>, data: &impl FormSource) -> FieldTree {
        let paths: Vec<Path> = data
            .names()
            .iter()
            .filter_map(|name| match parse_control_name(form_name, name) {
                Ok(path) => path,
                Err(err) => {
                    tracing::trace!(name = %name, error = %err, "ignoring unparsable control name");
                    None
                }
            })
            .collect();
        self.restore_from_paths(&paths)
    }

    /// Paths of every field, in pre-order.
    pub fn paths(&self) -> Vec<Path> {
        flatten(self).into_iter().map(|(path, _)| path).collect()
    }
}

fn descend<'a>(field: &'a Field, path: &Path) -> Option<&'a Field> {
    path.iter().try_fold(field, |node, seg| node.child(seg))
}
