use thiserror::Error;

use crate::{
    array_subset::{ArraySubset, IncompatibleDimensionalityError},
    node::{NodeCreateError, NodePath, NodePathError},
    storage::StorageError,
};

use super::{ArrayIndices, ArrayShape, DataType};

/// An array creation error.
#[derive(Debug, Error)]
pub enum ArrayCreateError {
    /// The node is not an array.
    #[error("node at {0} is a group, expected an array")]
    InvalidNodeType(NodePath),
    /// There is no node at the path.
    #[error("no array at {0}")]
    Missing(NodePath),
    /// An invalid node path
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// The chunk shape is not compatible with the array shape.
    #[error("chunk shape {1:?} is not valid for an array with shape {0:?}")]
    InvalidChunkShape(ArrayShape, ArrayShape),
    /// A variable length data type with more than one chunk.
    #[error("arrays of data type {0} must have a single chunk, got chunk shape {1:?} for shape {2:?}")]
    VariableLengthChunked(DataType, ArrayShape, ArrayShape),
    /// Storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An error parsing the metadata.
    #[error("{0}")]
    Metadata(String),
}

impl From<NodeCreateError> for ArrayCreateError {
    fn from(err: NodeCreateError) -> Self {
        match err {
            NodeCreateError::NodePathError(err) => Self::NodePathError(err),
            NodeCreateError::StorageError(err) => Self::StorageError(err),
            NodeCreateError::Metadata(err) => Self::Metadata(err),
            NodeCreateError::Missing(path) => Self::Missing(path),
        }
    }
}

/// Array errors.
#[derive(Debug, Error)]
pub enum ArrayError {
    /// A store error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// A compression error.
    #[error("chunk compression failed: {0}")]
    CompressionError(#[from] std::io::Error),
    /// Invalid chunk grid indices.
    #[error("chunk grid indices {_0:?} are out of bounds")]
    InvalidChunkGridIndices(ArrayIndices),
    /// Incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionalityError(#[from] IncompatibleDimensionalityError),
    /// Incompatible array subset.
    #[error("array subset {_0} is not compatible with array shape {_1:?}")]
    InvalidArraySubset(ArraySubset, ArrayShape),
    /// An unexpected chunk decoded size.
    #[error("got chunk decoded size {_0:?}, expected {_1:?}")]
    UnexpectedChunkDecodedSize(usize, usize),
    /// An unexpected bytes input size.
    #[error("got bytes with size {_0:?}, expected {_1:?}")]
    InvalidBytesInputSize(usize, usize),
    /// Incompatible element type.
    #[error("the element type is incompatible with the array data type")]
    IncompatibleElementType,
    /// Invalid element value.
    #[error("an element has an invalid value for its type")]
    InvalidElementValue,
    /// Expected fixed length bytes.
    #[error("expected fixed length array bytes")]
    ExpectedFixedLengthBytes,
    /// Expected variable length bytes.
    #[error("expected variable length array bytes")]
    ExpectedVariableLengthBytes,
    /// Invalid variable sized array offsets.
    #[error("invalid variable sized array offsets")]
    InvalidVariableSizedArrayOffsets,
    /// The chunk is compressed with a compressor which is not enabled.
    #[error("compressor {0} is not enabled, enable the corresponding crate feature")]
    UnsupportedCompressor(String),
}
