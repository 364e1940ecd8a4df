use serde::{Deserialize, Serialize};

use crate::{array::ArrayMetadata, group::GroupMetadata};

/// Node metadata ([`ArrayMetadata`] or [`GroupMetadata`]).
///
/// Serialised as the `zarr.json` document of a node, with the variant given by `node_type`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "node_type", rename_all = "lowercase")]
pub enum NodeMetadata {
    /// Array metadata.
    Array(ArrayMetadata),

    /// Group metadata.
    Group(GroupMetadata),
}

impl NodeMetadata {
    /// Returns the attributes of the node.
    #[must_use]
    pub fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        match self {
            Self::Array(metadata) => &metadata.attributes,
            Self::Group(metadata) => &metadata.attributes,
        }
    }

    /// Returns the value of a string attribute, if present.
    #[must_use]
    pub fn string_attribute(&self, name: &str) -> Option<&str> {
        self.attributes().get(name).and_then(serde_json::Value::as_str)
    }

    /// Returns the `zarr_format` of the node.
    #[must_use]
    pub fn zarr_format(&self) -> usize {
        match self {
            Self::Array(metadata) => metadata.zarr_format,
            Self::Group(metadata) => metadata.zarr_format,
        }
    }
}
