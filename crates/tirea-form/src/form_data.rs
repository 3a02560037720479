//! Multi-valued form data.
//!
//! [`FormSource`] is the read interface the reducer consumes; [`FormData`] is
//! the in-memory implementation, modeled on submitted form data: an ordered
//! list of `(name, value)` entries where a name may repeat.

use crate::FormValue;
use serde::{Deserialize, Serialize};

/// Read access to a form's current entries.
///
/// A DOM adapter implements this over the live form element; server-side
/// revalidation uses [`FormData`].
pub trait FormSource {
    /// All entries submitted under `name`, in document order.
    fn get_all(&self, name: &str) -> Vec<FormValue>;

    /// Whether any entry is submitted under `name`.
    fn has(&self, name: &str) -> bool {
        !self.get_all(name).is_empty()
    }

    /// Distinct entry names, in first-seen order.
    fn names(&self) -> Vec<String>;
}

/// Ordered, multi-valued form entries.
///
/// # Examples
///
/// ```
/// use tirea_form::{FormData, FormSource};
///
/// let data = FormData::from_urlencoded("tags=a&tags=b&name=Bob+Smith");
/// assert_eq!(data.get_all("tags").len(), 2);
/// assert_eq!(data.get("name").and_then(|v| v.as_text()), Some("Bob Smith"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    /// Create empty form data.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    pub fn from_urlencoded(body: &str) -> Self {
        Self::from_urlencoded_bytes(body.as_bytes())
    }

    /// Decode an `application/x-www-form-urlencoded` body from bytes.
    pub fn from_urlencoded_bytes(body: &[u8]) -> Self {
        form_urlencoded::parse(body)
            .map(|(name, value)| (name.into_owned(), FormValue::Text(value.into_owned())))
            .collect()
    }

    /// Encode text entries as `application/x-www-form-urlencoded`.
    ///
    /// File entries are encoded by file name, as browsers do for GET forms.
    pub fn to_urlencoded(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.entries {
            match value {
                FormValue::Text(s) => serializer.append_pair(name, s),
                FormValue::File(f) => serializer.append_pair(name, &f.name),
            };
        }
        serializer.finish()
    }

    /// Append an entry (mutating).
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<FormValue>) -> &mut Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    /// Append an entry and return self (builder pattern).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FormValue>) -> Self {
        self.append(name, value);
        self
    }

    /// Replace every entry under `name` with a single value.
    ///
    /// The new entry takes the position of the first removed one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FormValue>) -> &mut Self {
        let name = name.into();
        let position = self.entries.iter().position(|(n, _)| *n == name);
        self.entries.retain(|(n, _)| *n != name);
        let at = position.unwrap_or(self.entries.len()).min(self.entries.len());
        self.entries.insert(at, (name, value.into()));
        self
    }

    /// Remove every entry under `name`.
    pub fn delete(&mut self, name: &str) -> &mut Self {
        self.entries.retain(|(n, _)| n != name);
        self
    }

    /// First entry under `name`.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// All entries in order.
    #[inline]
    pub fn entries(&self) -> &[(String, FormValue)] {
        &self.entries
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when there are no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FormSource for FormData {
    fn get_all(&self, name: &str) -> Vec<FormValue> {
        self.entries
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (name, _) in &self.entries {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

impl<K, V> FromIterator<(K, V)> for FormData
where
    K: Into<String>,
    V: Into<FormValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileValue;

    #[test]
    fn test_get_all_and_has() {
        let data = FormData::new()
            .with("a", "1")
            .with("b", "2")
            .with("a", "3");
        assert_eq!(data.get_all("a"), vec![FormValue::text("1"), FormValue::text("3")]);
        assert!(data.has("b"));
        assert!(!data.has("c"));
        assert_eq!(data.names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut data = FormData::new().with("a", "1").with("b", "2").with("a", "3");
        data.set("a", "x");
        assert_eq!(
            data.entries(),
            &[
                ("a".to_string(), FormValue::text("x")),
                ("b".to_string(), FormValue::text("2")),
            ]
        );
        data.delete("a");
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_urlencoded_roundtrip() {
        let data = FormData::from_urlencoded("user.name=Ann+Lee&items%5B0%5D.qty=2");
        assert_eq!(data.get("user.name"), Some(&FormValue::text("Ann Lee")));
        assert_eq!(data.get("items[0].qty"), Some(&FormValue::text("2")));
        let encoded = data.to_urlencoded();
        assert_eq!(FormData::from_urlencoded(&encoded), data);
    }

    #[test]
    fn test_file_encoded_by_name() {
        let data = FormData::new().with("doc", FileValue::new("cv.pdf", "application/pdf", 10));
        assert_eq!(data.to_urlencoded(), "doc=cv.pdf");
    }
}
