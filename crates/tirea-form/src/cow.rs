//! Copy-on-write map with draft/commit.
//!
//! Every operation returns a map; when the operation changes nothing the
//! returned map shares the same allocation as the input, so callers can use
//! [`CowMap::ptr_eq`] as a cheap "did anything change" test. Values are held
//! behind `Arc` so untouched entries stay pointer-equal across versions.

use crate::{FormError, FormResult};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Immutable map with structural sharing at the entry level.
pub struct CowMap<K, V> {
    inner: Arc<HashMap<K, Arc<V>>>,
}

impl<K, V> Clone for CowMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for CowMap<K, V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(HashMap::new()),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CowMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.iter()).finish()
    }
}

impl<K, V> CowMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: PartialEq,
{
    /// Create an empty map.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a map from entries. Later duplicates win.
    pub fn from_entries(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            inner: Arc::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Arc::new(v)))
                    .collect(),
            ),
        }
    }

    /// Borrow the value for `key`.
    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key).map(Arc::as_ref)
    }

    /// Borrow the shared entry for `key`.
    #[inline]
    pub fn entry(&self, key: &K) -> Option<&Arc<V>> {
        self.inner.get(key)
    }

    /// Borrow the value for `key`, failing with `MissingKey`.
    pub fn get_or_err(&self, key: &K) -> FormResult<&V> {
        self.get(key).ok_or_else(|| FormError::missing_key(key))
    }

    /// Whether `key` has an entry.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true when the map has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Whether both maps share one allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Iterate over entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Arc<V>)> {
        self.inner.iter()
    }

    /// Iterate over keys in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }

    /// Set `key` to `value`.
    #[must_use]
    pub fn set(&self, key: K, value: V) -> Self {
        let mut draft = self.draft();
        draft.set(key, value);
        draft.commit()
    }

    /// Replace the value for `key` with `f(value)`. Absent keys are a no-op.
    #[must_use]
    pub fn update(&self, key: &K, f: impl FnOnce(&V) -> V) -> Self {
        let mut draft = self.draft();
        draft.update(key, f);
        draft.commit()
    }

    /// Like [`CowMap::update`], failing with `MissingKey` for absent keys.
    pub fn update_or_err(&self, key: &K, f: impl FnOnce(&V) -> V) -> FormResult<Self> {
        let mut draft = self.draft();
        draft.update_or_err(key, f)?;
        Ok(draft.commit())
    }

    /// Apply `f` to every listed key that has an entry.
    #[must_use]
    pub fn update_many<'k>(
        &self,
        keys: impl IntoIterator<Item = &'k K>,
        mut f: impl FnMut(&K, &V) -> V,
    ) -> Self
    where
        K: 'k,
    {
        let mut draft = self.draft();
        for key in keys {
            draft.update(key, |v| f(key, v));
        }
        draft.commit()
    }

    /// Remove `key`.
    #[must_use]
    pub fn delete(&self, key: &K) -> Self {
        let mut draft = self.draft();
        draft.delete(key);
        draft.commit()
    }

    /// Set several entries at once.
    #[must_use]
    pub fn set_entries(&self, entries: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut draft = self.draft();
        for (key, value) in entries {
            draft.set(key, value);
        }
        draft.commit()
    }

    /// Start a batch of edits that commits to a single new map.
    #[inline]
    pub fn draft(&self) -> Draft<K, V> {
        Draft {
            base: self.clone(),
            working: None,
        }
    }
}

/// A batch of edits over a [`CowMap`].
///
/// The underlying table is copied on the first edit that changes something;
/// until then reads go to the base map and [`Draft::commit`] returns it as-is.
pub struct Draft<K, V> {
    base: CowMap<K, V>,
    working: Option<HashMap<K, Arc<V>>>,
}

impl<K, V> Draft<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: PartialEq,
{
    fn table(&self) -> &HashMap<K, Arc<V>> {
        self.working.as_ref().unwrap_or(&*self.base.inner)
    }

    fn table_mut(&mut self) -> &mut HashMap<K, Arc<V>> {
        let base = &self.base;
        self.working.get_or_insert_with(|| (*base.inner).clone())
    }

    /// Borrow the current value for `key`.
    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.table().get(key).map(Arc::as_ref)
    }

    /// Borrow the current value for `key`, failing with `MissingKey`.
    pub fn get_or_err(&self, key: &K) -> FormResult<&V> {
        self.get(key).ok_or_else(|| FormError::missing_key(key))
    }

    /// Whether `key` currently has an entry.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.table().contains_key(key)
    }

    /// Set `key` to `value`. Returns true when this changed the entry.
    pub fn set(&mut self, key: K, value: V) -> bool {
        if self.get(&key) == Some(&value) {
            return false;
        }
        self.table_mut().insert(key, Arc::new(value));
        true
    }

    /// Replace the value for `key` with `f(value)`. Absent keys are a no-op.
    pub fn update(&mut self, key: &K, f: impl FnOnce(&V) -> V) -> bool {
        match self.get(key) {
            Some(current) => {
                let next = f(current);
                self.set(key.clone(), next)
            }
            None => false,
        }
    }

    /// Like [`Draft::update`], failing with `MissingKey` for absent keys.
    pub fn update_or_err(&mut self, key: &K, f: impl FnOnce(&V) -> V) -> FormResult<bool> {
        let next = f(self.get_or_err(key)?);
        Ok(self.set(key.clone(), next))
    }

    /// Remove `key`. Returns true when an entry was removed.
    pub fn delete(&mut self, key: &K) -> bool {
        if !self.contains_key(key) {
            return false;
        }
        self.table_mut().remove(key);
        true
    }

    /// Whether any edit changed something.
    #[inline]
    pub fn changed(&self) -> bool {
        self.working.is_some()
    }

    /// Finish the batch.
    ///
    /// Returns the base map itself when nothing changed.
    pub fn commit(self) -> CowMap<K, V> {
        match self.working {
            Some(table) => CowMap {
                inner: Arc::new(table),
            },
            None => self.base,
        }
    }
}
