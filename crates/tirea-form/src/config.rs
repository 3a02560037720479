//! Form configuration.

use crate::path::check_key;
use crate::FormResult;
use serde::{Deserialize, Serialize};

/// Per-form settings.
///
/// # Examples
///
/// ```
/// use tirea_form::FormConfig;
///
/// let config = FormConfig::default().with_name("signup");
/// assert_eq!(config.name.as_deref(), Some("signup"));
/// assert!(config.validate_on_mount);
///
/// let loaded = FormConfig::from_json(r#"{"validate_on_mount": false}"#).unwrap();
/// assert_eq!(loaded.name, None);
/// assert!(!loaded.validate_on_mount);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    /// Prefix of every control name. Must be a valid key segment.
    pub name: Option<String>,
    /// Run validators when nodes are first mounted. When false, mounted nodes
    /// stay indeterminate until the first change or submit.
    pub validate_on_mount: bool,
    /// Resize repeats from the posted control names before a programmatic
    /// submit.
    pub restore_on_submit: bool,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            name: None,
            validate_on_mount: true,
            restore_on_submit: true,
        }
    }
}

impl FormConfig {
    /// Set the form name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Enable or disable validation on mount.
    #[must_use]
    pub fn with_validate_on_mount(mut self, enabled: bool) -> Self {
        self.validate_on_mount = enabled;
        self
    }

    /// Enable or disable repeat restoration on programmatic submit.
    #[must_use]
    pub fn with_restore_on_submit(mut self, enabled: bool) -> Self {
        self.restore_on_submit = enabled;
        self
    }

    /// Load from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> FormResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the form name can prefix control names.
    pub fn validate(&self) -> FormResult<()> {
        match &self.name {
            Some(name) => check_key(name),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FormError;

    #[test]
    fn test_defaults() {
        let config = FormConfig::default();
        assert_eq!(config.name, None);
        assert!(config.validate_on_mount);
        assert!(config.restore_on_submit);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let config = FormConfig::default().with_name("a.b");
        assert!(matches!(
            config.validate(),
            Err(FormError::InvalidStringPathItem { .. })
        ));
        assert!(FormConfig::from_json(r#"{"name": ""}"#).is_err());
        assert!(FormConfig::from_json("not json").is_err());
    }
}
