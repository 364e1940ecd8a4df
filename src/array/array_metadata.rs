use serde::{Deserialize, Serialize};

use crate::group::Attributes;

use super::{ArrayShape, Compressor, DataType};

fn zarr_format_default() -> usize {
    crate::node::ZARR_FORMAT
}

/// Array metadata.
///
/// An example `JSON` document for a 2 dimensional array of 32-bit floating point numbers chunked along rows:
/// ```json
/// {
///     "zarr_format": 3,
///     "node_type": "array",
///     "shape": [10000, 2000],
///     "data_type": "float32",
///     "chunk_shape": [500, 2000],
///     "compressor": {"name": "gzip", "level": 5},
///     "attributes": {
///         "encoding-type": "array",
///         "encoding-version": "0.2.0"
///     }
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ArrayMetadata {
    /// An integer defining the version of the storage specification to which the array adheres.
    #[serde(default = "zarr_format_default")]
    pub zarr_format: usize,
    /// The length of each dimension of the array.
    pub shape: ArrayShape,
    /// The data type of the array.
    pub data_type: DataType,
    /// The shape of every chunk of the regular chunk grid.
    pub chunk_shape: ArrayShape,
    /// The chunk compressor, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressor: Option<Compressor>,
    /// Optional user defined attributes.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: Attributes,
}

impl ArrayMetadata {
    /// Create array metadata without compression or attributes.
    #[must_use]
    pub fn new(shape: ArrayShape, data_type: DataType, chunk_shape: ArrayShape) -> Self {
        Self {
            zarr_format: crate::node::ZARR_FORMAT,
            shape,
            data_type,
            chunk_shape,
            compressor: None,
            attributes: Attributes::new(),
        }
    }
}
