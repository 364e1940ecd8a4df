//! Compatibility warnings collected while reading a hierarchy.
//!
//! Reading a legacy or untagged layout is not an error, but the caller is told about it.
//! Each warning is logged with [`tracing`] when it is raised and also returned to the caller with the decoded container.

use derive_more::Display;

/// A warning that a node was decoded through a compatibility path.
#[derive(Clone, Debug, PartialEq, Eq, Display)]
#[display("{key}: {message}")]
pub struct CompatibilityWarning {
    key: String,
    message: String,
}

impl CompatibilityWarning {
    /// Create a new warning about the node at `key`.
    #[must_use]
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns the key of the node the warning is about.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the warning message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A collector of [`CompatibilityWarning`]s.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<CompatibilityWarning>,
}

impl Diagnostics {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a warning about the node at `key`.
    pub fn warn(&mut self, key: impl Into<String>, message: impl Into<String>) {
        let warning = CompatibilityWarning::new(key, message);
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Returns the warnings raised so far.
    #[must_use]
    pub fn warnings(&self) -> &[CompatibilityWarning] {
        &self.warnings
    }

    /// Returns true if no warning was raised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Consume the collector and return its warnings.
    #[must_use]
    pub fn into_warnings(self) -> Vec<CompatibilityWarning> {
        self.warnings
    }
}
