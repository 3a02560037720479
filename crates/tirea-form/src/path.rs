//! Field paths and their form-control name encoding.
//!
//! A path is a sequence of segments addressing a position in a field tree.
//! Each segment is either a key (object entry) or an index (repeat item).
//!
//! Paths serialize to the naming convention used by native multi-level form
//! controls: the first key is written bare, later keys are prefixed with `.`,
//! and indices are always wrapped in brackets.
//!
//! ```
//! use tirea_form::{path, Path};
//!
//! let p = path!("a", 1, "c", "d");
//! assert_eq!(p.serialize(), "a[1].c.d");
//! assert_eq!(Path::parse("a[1].c.d").unwrap(), p);
//! ```

use crate::{FormError, FormResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

const RESERVED: [char; 3] = ['.', '[', ']'];

/// A single segment in a field path.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seg {
    /// Object entry: `.key`
    Key(String),
    /// Repeat item: `[index]`
    Index(usize),
}

impl Seg {
    /// Create a key segment.
    #[inline]
    pub fn key(k: impl Into<String>) -> Self {
        Seg::Key(k.into())
    }

    /// Create an index segment.
    #[inline]
    pub fn index(i: usize) -> Self {
        Seg::Index(i)
    }

    /// Returns true if this is a key segment.
    #[inline]
    pub fn is_key(&self) -> bool {
        matches!(self, Seg::Key(_))
    }

    /// Returns true if this is an index segment.
    #[inline]
    pub fn is_index(&self) -> bool {
        matches!(self, Seg::Index(_))
    }

    /// Get the key if this is a key segment.
    #[inline]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Seg::Key(k) => Some(k),
            Seg::Index(_) => None,
        }
    }

    /// Get the index if this is an index segment.
    #[inline]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Seg::Key(_) => None,
            Seg::Index(i) => Some(*i),
        }
    }

    /// Check that a key segment is serializable.
    pub fn validate(&self) -> FormResult<()> {
        match self {
            Seg::Key(k) => check_key(k),
            Seg::Index(_) => Ok(()),
        }
    }
}

impl fmt::Display for Seg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seg::Key(k) => write!(f, "{}", k),
            Seg::Index(i) => write!(f, "[{}]", i),
        }
    }
}

impl From<String> for Seg {
    fn from(s: String) -> Self {
        Seg::Key(s)
    }
}

impl From<&str> for Seg {
    fn from(s: &str) -> Self {
        Seg::Key(s.to_owned())
    }
}

impl From<&String> for Seg {
    fn from(s: &String) -> Self {
        Seg::Key(s.clone())
    }
}

impl From<usize> for Seg {
    fn from(i: usize) -> Self {
        Seg::Index(i)
    }
}

/// Check that a string can be used as a key segment.
///
/// Keys must be non-empty and must not contain `.`, `[` or `]`.
pub fn check_key(key: &str) -> FormResult<()> {
    if key.is_empty() || key.contains(RESERVED) {
        return Err(FormError::invalid_string_item(key));
    }
    Ok(())
}

fn parse_key(item: &str) -> FormResult<Seg> {
    check_key(item)?;
    Ok(Seg::Key(item.to_owned()))
}

fn parse_index(item: &str) -> FormResult<Seg> {
    let digits_only = !item.is_empty() && item.bytes().all(|b| b.is_ascii_digit());
    // "01" would not survive a serialize round trip.
    let leading_zero = item.len() > 1 && item.starts_with('0');
    if !digits_only || leading_zero {
        return Err(FormError::invalid_number_item(item));
    }
    item.parse::<usize>()
        .map(Seg::Index)
        .map_err(|_| FormError::invalid_number_item(item))
}

/// A complete path into a field tree.
///
/// Paths are immutable sequences of segments. Use builder methods to construct
/// paths incrementally.
///
/// # Examples
///
/// ```
/// use tirea_form::Path;
///
/// let path = Path::root().key("users").index(0).key("name");
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.serialize(), "users[0].name");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path(Vec<Seg>);

impl Path {
    /// Create an empty path (root).
    #[inline]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create an empty path (alias for `new`).
    #[inline]
    pub fn root() -> Self {
        Self::new()
    }

    /// Create a path from a vector of segments.
    #[inline]
    pub fn from_segments(segments: Vec<Seg>) -> Self {
        Self(segments)
    }

    /// Create a path from segments, rejecting keys that cannot be serialized.
    pub fn try_from_segments(segments: Vec<Seg>) -> FormResult<Self> {
        let path = Self(segments);
        path.validate()?;
        Ok(path)
    }

    /// Append a key segment and return self (builder pattern).
    #[inline]
    pub fn key(mut self, k: impl Into<String>) -> Self {
        self.0.push(Seg::Key(k.into()));
        self
    }

    /// Append an index segment and return self (builder pattern).
    #[inline]
    pub fn index(mut self, i: usize) -> Self {
        self.0.push(Seg::Index(i));
        self
    }

    /// Push a segment onto the path (mutating).
    #[inline]
    pub fn push(&mut self, seg: Seg) {
        self.0.push(seg);
    }

    /// Pop the last segment from the path.
    #[inline]
    pub fn pop(&mut self) -> Option<Seg> {
        self.0.pop()
    }

    /// Get the segments of this path.
    #[inline]
    pub fn segments(&self) -> &[Seg] {
        &self.0
    }

    /// Check if this path is empty (root).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the number of segments in this path.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Get the first segment.
    #[inline]
    pub fn first(&self) -> Option<&Seg> {
        self.0.first()
    }

    /// Get the last segment.
    #[inline]
    pub fn last(&self) -> Option<&Seg> {
        self.0.last()
    }

    /// Join this path with another path.
    #[inline]
    pub fn join(&self, other: &Path) -> Path {
        let mut result = self.clone();
        result.0.extend(other.0.iter().cloned());
        result
    }

    /// Append segments and return a new path (non-mutating builder).
    pub fn append<I, S>(&self, segs: I) -> Path
    where
        I: IntoIterator<Item = S>,
        S: Into<Seg>,
    {
        let mut result = self.clone();
        result.0.extend(segs.into_iter().map(Into::into));
        result
    }

    /// Append a segment and return a new path (non-mutating builder).
    #[inline]
    pub fn with_segment(&self, seg: Seg) -> Path {
        let mut result = self.clone();
        result.0.push(seg);
        result
    }

    /// Split off the first segment.
    ///
    /// Returns `(None, root)` for the root path.
    pub fn split_head(&self) -> (Option<&Seg>, Path) {
        match self.0.split_first() {
            Some((head, rest)) => (Some(head), Path(rest.to_vec())),
            None => (None, Path::root()),
        }
    }

    /// Check if this path is a prefix of another path.
    ///
    /// A path is a prefix of itself.
    #[inline]
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Check if this path starts with another path.
    #[inline]
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Remove a prefix, returning the remainder.
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
        self.0.strip_prefix(prefix.0.as_slice()).map(|rest| Path(rest.to_vec()))
    }

    /// Get the parent path (path without the last segment).
    #[inline]
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            let mut p = self.clone();
            p.pop();
            Some(p)
        }
    }

    /// Iterate over the segments.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Seg> {
        self.0.iter()
    }

    /// Check that every key segment is serializable.
    pub fn validate(&self) -> FormResult<()> {
        self.0.iter().try_for_each(Seg::validate)
    }

    /// Serialize to a form-control name.
    ///
    /// The first key is unprefixed, later keys are prefixed with `.`, and
    /// indices are wrapped in `[...]` wherever they occur.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                Seg::Key(k) => {
                    if i > 0 {
                        out.push('.');
                    }
                    out.push_str(k);
                }
                Seg::Index(n) => {
                    let _ = write!(out, "[{n}]");
                }
            }
        }
        out
    }

    /// Parse a form-control name produced by [`Path::serialize`].
    ///
    /// The empty string parses to the root path.
    pub fn parse(s: &str) -> FormResult<Path> {
        let mut path = Path::new();
        let mut rest = s;

        if !rest.is_empty() && !rest.starts_with('[') {
            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            path.push(parse_key(&rest[..end])?);
            rest = &rest[end..];
        }

        while let Some(c) = rest.chars().next() {
            match c {
                '.' => {
                    let body = &rest[1..];
                    let end = body.find(['.', '[']).unwrap_or(body.len());
                    path.push(parse_key(&body[..end])?);
                    rest = &body[end..];
                }
                '[' => {
                    let body = &rest[1..];
                    let end = body
                        .find(']')
                        .ok_or_else(|| FormError::invalid_number_item(body))?;
                    path.push(parse_index(&body[..end])?);
                    rest = &body[end + 1..];
                }
                _ => return Err(FormError::invalid_string_item(rest)),
            }
        }

        Ok(path)
    }
}

/// Build the canonical control name for a node: `serialize([form_name, ...path])`.
pub fn control_name(form_name: Option<&str>, path: &Path) -> String {
    match form_name {
        Some(name) => Path::root().key(name).join(path).serialize(),
        None => path.serialize(),
    }
}

/// Parse a control name and strip the form name, if the form has one.
///
/// Returns `Ok(None)` when the control does not belong to the form.
pub fn parse_control_name(form_name: Option<&str>, name: &str) -> FormResult<Option<Path>> {
    let path = Path::parse(name)?;
    Ok(match form_name {
        Some(form) => path.strip_prefix(&Path::root().key(form)),
        None => Some(path),
    })
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl FromStr for Path {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl FromIterator<Seg> for Path {
    fn from_iter<I: IntoIterator<Item = Seg>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl IntoIterator for Path {
    type Item = Seg;
    type IntoIter = std::vec::IntoIter<Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Seg;
    type IntoIter = std::slice::Iter<'a, Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for Path {
    type Output = Seg;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

/// Construct a `Path` from a sequence of segments.
///
/// # Examples
///
/// ```
/// use tirea_form::path;
///
/// // String literals become Key segments
/// let p = path!("user", "email");
///
/// // Numbers become Index segments
/// let p = path!("items", 0, "name");
/// assert_eq!(p.serialize(), "items[0].name");
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($seg:expr),+ $(,)?) => {{
        let mut p = $crate::Path::root();
        $(
            p.push($crate::path!(@seg $seg));
        )+
        p
    }};
    (@seg $seg:expr) => {
        $crate::Seg::from($seg)
    };
}
