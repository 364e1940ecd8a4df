//! Groups.
//!
//! A group is a node in a hierarchy.
//! It can have associated attributes and may have child nodes (groups or [`arrays`](crate::array)).
//!
//! Use [`GroupBuilder`] to setup a new group, or use [`Group::open`] to read and/or write an existing group.
//!
//! A group stores its attributes in an accompanying `zarr.json` file. For example:
//! ```json
//! {
//!     "zarr_format": 3,
//!     "node_type": "group",
//!     "attributes": {
//!         "encoding-type": "anndata",
//!         "encoding-version": "0.1.0"
//!     }
//! }
//! ```
//! A group without a `zarr.json` but with children is an implicit group with no attributes.

mod group_builder;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    node::{retrieve_node_metadata, NodeCreateError, NodeMetadata, NodePath, NodePathError},
    storage::{
        discover_children, ListableStorageTraits, ReadableStorageTraits, StorageError,
        WritableStorageTraits,
    },
};

pub use self::group_builder::GroupBuilder;

/// Group attributes.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

fn zarr_format_default() -> usize {
    crate::node::ZARR_FORMAT
}

/// Group metadata.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GroupMetadata {
    /// An integer defining the version of the storage specification to which the group adheres.
    #[serde(default = "zarr_format_default")]
    pub zarr_format: usize,
    /// Optional user defined attributes.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: Attributes,
}

impl Default for GroupMetadata {
    fn default() -> Self {
        Self::new(Attributes::new())
    }
}

impl GroupMetadata {
    /// Create group metadata with `attributes`.
    #[must_use]
    pub fn new(attributes: Attributes) -> Self {
        Self {
            zarr_format: crate::node::ZARR_FORMAT,
            attributes,
        }
    }
}

/// A group.
#[derive(Clone, Debug)]
pub struct Group<TStorage: ?Sized> {
    /// The storage.
    storage: Arc<TStorage>,
    /// The path of the group in the store.
    path: NodePath,
    /// The metadata.
    metadata: GroupMetadata,
}

impl<TStorage: ?Sized> Group<TStorage> {
    /// Create a group in `storage` at `path` with `metadata`.
    /// This does **not** write to the store, use [`store_metadata`](Group::store_metadata) to write `metadata` to `storage`.
    #[must_use]
    pub fn new_with_metadata(storage: Arc<TStorage>, path: NodePath, metadata: GroupMetadata) -> Self {
        Self {
            storage,
            path,
            metadata,
        }
    }

    /// Get path.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Get the underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<TStorage> {
        &self.storage
    }

    /// Get attributes.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.metadata.attributes
    }

    /// Get a string attribute.
    #[must_use]
    pub fn string_attribute(&self, name: &str) -> Option<&str> {
        self.metadata
            .attributes
            .get(name)
            .and_then(serde_json::Value::as_str)
    }

    /// Get metadata.
    #[must_use]
    pub fn metadata(&self) -> &GroupMetadata {
        &self.metadata
    }

    /// Mutably borrow the group attributes.
    #[must_use]
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.metadata.attributes
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits> Group<TStorage> {
    /// Open the group in `storage` at `path`. The metadata is read from the store.
    ///
    /// # Errors
    ///
    /// Returns [`GroupCreateError`] if there is a storage error, there is no node at `path`, or the node is an array.
    pub fn open(storage: Arc<TStorage>, path: &NodePath) -> Result<Self, GroupCreateError> {
        match retrieve_node_metadata(&*storage, path)? {
            Some(NodeMetadata::Group(metadata)) => {
                Ok(Self::new_with_metadata(storage, path.clone(), metadata))
            }
            Some(NodeMetadata::Array(_)) => Err(GroupCreateError::InvalidNodeType(path.clone())),
            None => Err(GroupCreateError::Missing(path.clone())),
        }
    }

    /// Return the paths of the child nodes of the group, in lexicographical order.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an underlying store error.
    pub fn children(&self) -> Result<Vec<NodePath>, StorageError> {
        discover_children(&*self.storage, &self.path)?
            .iter()
            .map(|prefix| NodePath::try_from(prefix).map_err(StorageError::from))
            .collect()
    }

    /// Return the names of the child nodes of the group, in lexicographical order.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if there is an underlying store error.
    pub fn child_names(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .children()?
            .iter()
            .map(|path| path.name().to_string())
            .collect())
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> Group<TStorage> {
    /// Store metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if there is an underlying store error.
    pub fn store_metadata(&self) -> Result<(), StorageError> {
        crate::storage::create_group(&*self.storage, self.path(), &self.metadata)
    }
}

/// A group creation error.
#[derive(Debug, Error)]
pub enum GroupCreateError {
    /// The node is not a group.
    #[error("node at {0} is an array, expected a group")]
    InvalidNodeType(NodePath),
    /// There is no node at the path.
    #[error("no group at {0}")]
    Missing(NodePath),
    /// An invalid node path
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// Storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An error parsing the metadata.
    #[error("{0}")]
    Metadata(String),
}

impl From<NodeCreateError> for GroupCreateError {
    fn from(err: NodeCreateError) -> Self {
        match err {
            NodeCreateError::NodePathError(err) => Self::NodePathError(err),
            NodeCreateError::StorageError(err) => Self::StorageError(err),
            NodeCreateError::Metadata(err) => Self::Metadata(err),
            NodeCreateError::Missing(path) => Self::Missing(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::store::MemoryStore;

    use super::*;

    const JSON_VALID: &str = r#"{
    "zarr_format": 3,
    "node_type": "group",
    "attributes": {
        "encoding-type": "dict",
        "encoding-version": "0.1.0"
    }
}"#;

    #[test]
    fn group_metadata() {
        let metadata: NodeMetadata = serde_json::from_str(JSON_VALID).unwrap();
        let NodeMetadata::Group(metadata) = metadata else {
            panic!("expected group metadata");
        };
        let store = Arc::new(MemoryStore::default());
        let group = Group::new_with_metadata(store, NodePath::root(), metadata);
        assert_eq!(group.string_attribute("encoding-type"), Some("dict"));
        assert_eq!(group.string_attribute("missing"), None);
    }

    #[test]
    fn group_metadata_write_read() {
        let store = Arc::new(MemoryStore::new());
        let group_path = NodePath::new("/uns").unwrap();
        let group = GroupBuilder::new()
            .attribute("encoding-type", "dict")
            .build(store.clone(), group_path.clone());
        group.store_metadata().unwrap();
        let opened = Group::open(store.clone(), &group_path).unwrap();
        assert_eq!(opened.metadata(), group.metadata());
    }

    #[test]
    fn group_children() {
        let store = Arc::new(MemoryStore::new());
        let root = GroupBuilder::new().build(store.clone(), NodePath::root());
        root.store_metadata().unwrap();
        for name in ["obsm", "layers", "X"] {
            GroupBuilder::new()
                .build(store.clone(), NodePath::root().child(name).unwrap())
                .store_metadata()
                .unwrap();
        }
        assert_eq!(root.child_names().unwrap(), vec!["X", "layers", "obsm"]);
    }

    #[test]
    fn group_open_missing() {
        let store = Arc::new(MemoryStore::new());
        assert!(matches!(
            Group::open(store, &NodePath::new("/raw").unwrap()),
            Err(GroupCreateError::Missing(_))
        ));
    }
}
