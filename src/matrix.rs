//! In-memory matrices.
//!
//! A [`DenseArray`] holds the C-order bytes of an n-dimensional array.
//! A [`SparseMatrix`] is a two dimensional compressed sparse row ([`SparseLayout::Csr`]) or column ([`SparseLayout::Csc`]) matrix.
//!
//! An element is zero if all of its bytes are zero, so a negative floating point zero is a stored (non-zero) element of a sparse matrix.

mod dense_array;
mod sparse_matrix;

pub use dense_array::DenseArray;
pub use sparse_matrix::{SparseLayout, SparseMatrix, UnsupportedSparseLayoutError};

use thiserror::Error;

use crate::array::{ArrayError, ArrayShape, DataType};

/// A matrix error.
#[derive(Debug, Error)]
pub enum MatrixError {
    /// An array error.
    #[error(transparent)]
    ArrayError(#[from] ArrayError),
    /// The data type cannot be held by this matrix.
    #[error("data type {0} is not supported by a {1}")]
    UnsupportedDataType(DataType, &'static str),
    /// The matrix is not two dimensional.
    #[error("expected a two dimensional matrix, got shape {0:?}")]
    NotTwoDimensional(ArrayShape),
    /// The shapes of matrices are incompatible.
    #[error("incompatible shapes {0:?} and {1:?}")]
    IncompatibleShape(ArrayShape, ArrayShape),
    /// The component arrays of a sparse matrix are inconsistent.
    #[error("invalid sparse matrix: {0}")]
    InvalidSparse(String),
}
