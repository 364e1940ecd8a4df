//! Hierarchy nodes.
//!
//! A node in a hierarchy represents either an [`Array`](crate::array::Array) or a [`Group`](crate::group::Group).
//! Every node has a [`NodePath`] and [`NodeMetadata`], retrieved with [`retrieve_node_metadata`].

mod node_metadata;
mod node_path;

pub use node_metadata::NodeMetadata;
pub use node_path::{NodePath, NodePathError};
use thiserror::Error;

use crate::{
    group::GroupMetadata,
    storage::{meta_key, ListableStorageTraits, ReadableStorageTraits, StorageError},
};

/// The only supported `zarr_format`.
pub const ZARR_FORMAT: usize = 3;

/// A node creation error.
#[derive(Debug, Error)]
pub enum NodeCreateError {
    /// An invalid node path
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An error parsing the metadata.
    #[error("{0}")]
    Metadata(String),
    /// There is no node at the path.
    #[error("no node at {0}")]
    Missing(NodePath),
}

/// Retrieve the metadata of the node at `path`.
///
/// A node without metadata is an implicit group if any key exists below it.
/// Returns [`None`] if there is no node at `path`.
///
/// # Errors
///
/// Returns [`NodeCreateError`] if the metadata is invalid or there is an underlying store error.
pub fn retrieve_node_metadata<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits>(
    storage: &TStorage,
    path: &NodePath,
) -> Result<Option<NodeMetadata>, NodeCreateError> {
    let key = meta_key(path);
    if let Some(metadata) = storage.get(&key)? {
        let metadata: NodeMetadata = serde_json::from_slice(&metadata)
            .map_err(|err| NodeCreateError::Metadata(format!("{key}: {err}")))?;
        if metadata.zarr_format() != ZARR_FORMAT {
            return Err(NodeCreateError::Metadata(format!(
                "{key}: unsupported zarr_format {}, expected {ZARR_FORMAT}",
                metadata.zarr_format()
            )));
        }
        return Ok(Some(metadata));
    }
    if crate::storage::node_exists(storage, path)? {
        Ok(Some(NodeMetadata::Group(GroupMetadata::default())))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        array::{ArrayMetadata, DataType},
        storage::{create_array, create_group, store::MemoryStore},
    };

    #[test]
    fn node_metadata_array() {
        const JSON_ARRAY: &str = r#"{
            "zarr_format": 3,
            "node_type": "array",
            "shape": [
              10000,
              1000
            ],
            "data_type": "float64",
            "chunk_shape": [
              1000,
              100
            ],
            "compressor": {
              "name": "gzip",
              "level": 1
            },
            "attributes": {
              "encoding-type": "array",
              "encoding-version": "0.2.0"
            }
          }"#;
        let metadata = serde_json::from_str::<NodeMetadata>(JSON_ARRAY).unwrap();
        assert_eq!(metadata.string_attribute("encoding-type"), Some("array"));
        let NodeMetadata::Array(metadata) = metadata else {
            panic!("expected array metadata");
        };
        assert_eq!(metadata.shape, vec![10000, 1000]);
        assert_eq!(metadata.data_type, DataType::Float64);
    }

    #[test]
    fn node_metadata_group() {
        const JSON_GROUP: &str = r#"{
        "zarr_format": 3,
        "node_type": "group",
        "attributes": {
            "encoding-type": "anndata",
            "encoding-version": "0.1.0"
        }
    }"#;
        let metadata = serde_json::from_str::<NodeMetadata>(JSON_GROUP).unwrap();
        assert!(matches!(metadata, NodeMetadata::Group(_)));
        assert_eq!(metadata.string_attribute("encoding-version"), Some("0.1.0"));
    }

    #[test]
    fn node_metadata_implicit_group() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        let mut root = GroupMetadata::default();
        root.attributes
            .insert("encoding-type".to_string(), "anndata".into());
        create_group(&store, &NodePath::root(), &root)?;
        create_array(
            &store,
            &NodePath::new("/uns/pca/variance")?,
            &ArrayMetadata::new(vec![50], DataType::Float32, vec![50]),
        )?;

        let metadata = retrieve_node_metadata(&store, &NodePath::root())?;
        assert_eq!(
            metadata.as_ref().and_then(|metadata| metadata.string_attribute("encoding-type")),
            Some("anndata")
        );
        for path in ["/uns", "/uns/pca"] {
            let metadata = retrieve_node_metadata(&store, &NodePath::new(path)?)?;
            assert_eq!(metadata, Some(NodeMetadata::Group(GroupMetadata::default())));
        }
        assert!(matches!(
            retrieve_node_metadata(&store, &NodePath::new("/uns/pca/variance")?)?,
            Some(NodeMetadata::Array(_))
        ));
        assert!(retrieve_node_metadata(&store, &NodePath::new("/raw")?)?.is_none());
        Ok(())
    }
}
