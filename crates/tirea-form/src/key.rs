//! Identity keys for field-tree nodes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_FIELD_KEY: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique identity of a field node.
///
/// Two nodes are the same field iff they share a key, wherever they sit in the
/// tree. Keys are allocated once per node and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldKey(u64);

impl FieldKey {
    /// Allocate a fresh key.
    pub(crate) fn next() -> Self {
        FieldKey(NEXT_FIELD_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for diagnostics.
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_unique() {
        let keys: HashSet<_> = (0..1000).map(|_| FieldKey::next()).collect();
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn test_display() {
        let key = FieldKey(7);
        assert_eq!(key.to_string(), "f7");
    }
}
