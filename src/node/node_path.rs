use derive_more::Display;
use thiserror::Error;

use crate::storage::StorePrefix;

/// A hierarchy node path.
///
/// Paths start with `/`, and the root node is `/`.
/// For example, the primary matrix of a container is at `/X` and the raw snapshot matrix at `/raw/X`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct NodePath(String);

/// An invalid node path.
#[derive(Debug, Error)]
#[error("invalid node path {0}")]
pub struct NodePathError(String);

impl NodePath {
    /// Create a new node path from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`NodePathError`] if `path` is not valid according to [`NodePath::validate`()].
    pub fn new(path: &str) -> Result<Self, NodePathError> {
        if Self::validate(path) {
            Ok(Self(path.to_string()))
        } else {
            Err(NodePathError(path.to_string()))
        }
    }

    /// The root node.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Extracts a string slice containing the node path `String`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path relative to the root, without the leading `/`.
    ///
    /// This is the form used in diagnostics, e.g. `raw/X`.
    #[must_use]
    pub fn key(&self) -> &str {
        self.0.strip_prefix('/').unwrap_or(&self.0)
    }

    /// Indicates if this is the root node.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Returns the name of the node (the final path segment), or an empty string for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit_once('/').map_or("", |(_, name)| name)
    }

    /// Returns the path of the parent node, or [`None`] for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit_once('/').map(|(parent, _)| {
            if parent.is_empty() {
                Self::root()
            } else {
                Self(parent.to_string())
            }
        })
    }

    /// Returns the path of the child `name` of this node.
    ///
    /// # Errors
    ///
    /// Returns [`NodePathError`] if `name` is empty or contains `/`.
    pub fn child(&self, name: &str) -> Result<Self, NodePathError> {
        if name.is_empty() || name.contains('/') {
            return Err(NodePathError(format!("{}/{name}", self.0)));
        }
        if self.is_root() {
            Ok(Self(format!("/{name}")))
        } else {
            Ok(Self(format!("{}/{name}", self.0)))
        }
    }

    /// Returns the path of the sibling node named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NodePathError`] if this is the root node or `name` is not a valid node name.
    pub fn with_name(&self, name: &str) -> Result<Self, NodePathError> {
        self.parent()
            .ok_or_else(|| NodePathError(self.0.clone()))?
            .child(name)
    }

    /// Validates a path according to the following rules:
    /// - A path always starts with `/`, and
    /// - a non-root path cannot end with `/`, because node names must be non-empty and cannot contain `/`.
    ///
    /// Additionally, it checks that there are no empty nodes (i.e. a `//` substring).
    #[must_use]
    pub fn validate(path: &str) -> bool {
        path.eq("/") || (path.starts_with('/') && !path.ends_with('/') && !path.contains("//"))
    }
}

impl TryFrom<&str> for NodePath {
    type Error = NodePathError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl TryFrom<&StorePrefix> for NodePath {
    type Error = NodePathError;

    fn try_from(prefix: &StorePrefix) -> Result<Self, Self::Error> {
        let prefix = prefix.as_str();
        let path = "/".to_string() + prefix.strip_suffix('/').unwrap_or(prefix);
        Self::new(&path)
    }
}
