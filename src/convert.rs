//! Chunked conversion between sparse and dense matrices.
//!
//! [`dense_to_sparse`] compresses a dense source one window at a time, and [`sparse_to_dense`] expands a sparse source into a dense destination [`Array`] one window at a time.
//! Windows are planned by [`axis_chunks`] along the compressed (major) axis of the sparse layout, so the chunk size bounds the number of rows (CSR) or columns (CSC) held in memory at once.
//! The result of a conversion does not depend on the chunk size.
//!
//! Sources are abstracted by the [`DenseSource`] and [`SparseSource`] traits, implemented for in-memory matrices and for matrices in a store.
//! A source reports the [`StorageIdentity`] of the store it reads from, which is used to detect a conversion which overwrites its own source (see [`overwrite`](crate::overwrite)).

mod sparse_dataset;

pub use sparse_dataset::SparseDataset;
pub(crate) use sparse_dataset::sparse_attributes;

use std::ops::Range;

use thiserror::Error;

use crate::{
    array::{Array, ArrayError, ArrayShape, DataType},
    array_subset::{axis_chunks, ArraySubset, AxisChunksError},
    matrix::{DenseArray, MatrixError, SparseLayout, SparseMatrix},
    node::NodePath,
    storage::{ReadableStorageTraits, StorageError, StorageIdentity, WritableStorageTraits},
};

/// A conversion error.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// An invalid chunk size or axis.
    #[error(transparent)]
    AxisChunksError(#[from] AxisChunksError),
    /// A matrix error.
    #[error(transparent)]
    MatrixError(#[from] MatrixError),
    /// An array error.
    #[error(transparent)]
    ArrayError(#[from] ArrayError),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// The destination does not match the source.
    #[error("destination with shape {destination_shape:?} and data type {destination_data_type} does not match source with shape {source_shape:?} and data type {source_data_type}")]
    IncompatibleDestination {
        /// The source shape.
        source_shape: ArrayShape,
        /// The source data type.
        source_data_type: DataType,
        /// The destination shape.
        destination_shape: ArrayShape,
        /// The destination data type.
        destination_data_type: DataType,
    },
    /// A sparse matrix group in a store is not valid.
    #[error("invalid sparse matrix at {0}: {1}")]
    InvalidSparseDataset(NodePath, String),
}

/// A source of dense data which can be read one subset at a time.
pub trait DenseSource {
    /// The shape of the source.
    fn shape(&self) -> &[u64];

    /// The data type of the source.
    fn data_type(&self) -> &DataType;

    /// Read `subset` of the source.
    ///
    /// # Errors
    /// Returns a [`ConvertError`] if `subset` is out of bounds or the underlying read fails.
    fn read_subset(&self, subset: &ArraySubset) -> Result<DenseArray, ConvertError>;

    /// The identity of the store the source reads from, or [`None`] if it is held in memory.
    fn storage_identity(&self) -> Option<StorageIdentity> {
        None
    }
}

/// A source of sparse data which can be read one major axis range at a time.
pub trait SparseSource {
    /// The layout of the source.
    fn layout(&self) -> SparseLayout;

    /// The `[rows, cols]` shape of the source.
    fn shape(&self) -> [u64; 2];

    /// The data type of the stored elements.
    fn data_type(&self) -> &DataType;

    /// Read the rows (CSR) or columns (CSC) in `range`.
    ///
    /// # Errors
    /// Returns a [`ConvertError`] if `range` is out of bounds or the underlying read fails.
    fn read_major(&self, range: Range<u64>) -> Result<SparseMatrix, ConvertError>;

    /// The identity of the store the source reads from, or [`None`] if it is held in memory.
    fn storage_identity(&self) -> Option<StorageIdentity> {
        None
    }
}

impl DenseSource for DenseArray {
    fn shape(&self) -> &[u64] {
        DenseArray::shape(self)
    }

    fn data_type(&self) -> &DataType {
        DenseArray::data_type(self)
    }

    fn read_subset(&self, subset: &ArraySubset) -> Result<DenseArray, ConvertError> {
        Ok(self.subset(subset)?)
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> DenseSource for Array<TStorage> {
    fn shape(&self) -> &[u64] {
        Array::shape(self)
    }

    fn data_type(&self) -> &DataType {
        Array::data_type(self)
    }

    fn read_subset(&self, subset: &ArraySubset) -> Result<DenseArray, ConvertError> {
        let bytes = self.retrieve_array_subset(subset)?;
        Ok(DenseArray::new(
            subset.shape().to_vec(),
            self.data_type().clone(),
            bytes,
        )?)
    }

    fn storage_identity(&self) -> Option<StorageIdentity> {
        Some(self.storage().storage_identity())
    }
}

impl SparseSource for SparseMatrix {
    fn layout(&self) -> SparseLayout {
        SparseMatrix::layout(self)
    }

    fn shape(&self) -> [u64; 2] {
        SparseMatrix::shape(self)
    }

    fn data_type(&self) -> &DataType {
        SparseMatrix::data_type(self)
    }

    fn read_major(&self, range: Range<u64>) -> Result<SparseMatrix, ConvertError> {
        Ok(self.major_slice(range)?)
    }
}

/// Compress a two dimensional dense `source` into a sparse matrix with `layout`.
///
/// The source is read in windows of `chunk_size` rows (CSR) or columns (CSC), each window is compressed, and the compressed windows are concatenated in order.
///
/// # Errors
/// Returns a [`ConvertError`] if `chunk_size` is zero, the source is not a two dimensional numeric array, or a read fails.
pub fn dense_to_sparse(
    source: &(impl DenseSource + ?Sized),
    chunk_size: u64,
    layout: SparseLayout,
) -> Result<SparseMatrix, ConvertError> {
    let shape = source.shape().to_vec();
    let [_, _] = shape.as_slice() else {
        return Err(MatrixError::NotTwoDimensional(shape).into());
    };
    let axis = layout.major_axis();
    let windows = axis_chunks(&shape, axis, chunk_size)?;
    tracing::debug!(
        "compressing dense {shape:?} {} to {layout} in {} windows of {chunk_size}",
        source.data_type(),
        windows.len()
    );
    let parts = windows
        .map(|window| {
            let dense = source.read_subset(&window)?;
            Ok(SparseMatrix::from_dense(&dense, layout)?)
        })
        .collect::<Result<Vec<_>, ConvertError>>()?;
    Ok(SparseMatrix::concat_major(
        layout,
        shape[1 - axis],
        source.data_type().clone(),
        parts,
    )?)
}

/// Expand a sparse `source` into the dense `destination` array.
///
/// The source is read in windows of `chunk_size` rows (CSR) or columns (CSC), and each window is expanded and written to the matching subset of `destination`.
///
/// # Errors
/// Returns a [`ConvertError`] if `chunk_size` is zero, the destination shape or data type does not match the source, or a read or write fails.
pub fn sparse_to_dense<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits>(
    source: &(impl SparseSource + ?Sized),
    destination: &Array<TStorage>,
    chunk_size: u64,
) -> Result<(), ConvertError> {
    let shape = source.shape();
    if destination.shape() != shape.as_slice() || destination.data_type() != source.data_type() {
        return Err(ConvertError::IncompatibleDestination {
            source_shape: shape.to_vec(),
            source_data_type: source.data_type().clone(),
            destination_shape: destination.shape().to_vec(),
            destination_data_type: destination.data_type().clone(),
        });
    }
    let layout = source.layout();
    let windows = axis_chunks(&shape, layout.major_axis(), chunk_size)?;
    tracing::debug!(
        "expanding {layout} {shape:?} {} to dense {} in {} windows of {chunk_size}",
        source.data_type(),
        destination.path(),
        windows.len()
    );
    for window in windows {
        let major = &window.to_ranges()[layout.major_axis()];
        let dense = source.read_major(major.clone())?.to_dense()?;
        destination.store_array_subset(&window, dense.into_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{array::ArrayBuilder, storage::store::MemoryStore};

    use super::*;

    fn dense(rows: u64, cols: u64) -> DenseArray {
        let elements: Vec<i32> = (0..rows * cols)
            .map(|i| if i % 3 == 0 { i32::try_from(i).unwrap() - 7 } else { 0 })
            .collect();
        DenseArray::from_elements(vec![rows, cols], DataType::Int32, &elements).unwrap()
    }

    #[test]
    fn convert_chunk_invariance() {
        let source = dense(7, 5);
        for layout in [SparseLayout::Csr, SparseLayout::Csc] {
            let reference = SparseMatrix::from_dense(&source, layout).unwrap();
            for chunk_size in 1..=8 {
                assert_eq!(dense_to_sparse(&source, chunk_size, layout).unwrap(), reference);
            }
        }
    }

    #[test]
    fn convert_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let source = dense(6, 4);
        for layout in [SparseLayout::Csr, SparseLayout::Csc] {
            for chunk_size in 1..=6 {
                let sparse = dense_to_sparse(&source, chunk_size, layout).unwrap();
                let destination = ArrayBuilder::new(vec![6, 4], DataType::Int32)
                    .chunk_shape(vec![4, 3])
                    .build(store.clone(), NodePath::new("/dense").unwrap())
                    .unwrap();
                destination.store_metadata().unwrap();
                sparse_to_dense(&sparse, &destination, chunk_size).unwrap();
                assert_eq!(
                    destination.retrieve_elements::<i32>().unwrap(),
                    source.elements::<i32>().unwrap()
                );
                // reading back from the store gives the same sparse matrix
                assert_eq!(dense_to_sparse(&destination, chunk_size, layout).unwrap(), sparse);
            }
        }
    }

    #[test]
    fn convert_duplicates_are_summed() {
        let store = Arc::new(MemoryStore::new());
        let sparse = SparseMatrix::from_elements(
            SparseLayout::Csr,
            [1, 2],
            DataType::Float64,
            &[1.0f64, 2.0],
            vec![1, 1],
            vec![0, 2],
        )
        .unwrap();
        let destination = ArrayBuilder::new(vec![1, 2], DataType::Float64)
            .build(store, NodePath::new("/dense").unwrap())
            .unwrap();
        destination.store_metadata().unwrap();
        sparse_to_dense(&sparse, &destination, 1).unwrap();
        assert_eq!(destination.retrieve_elements::<f64>().unwrap(), vec![0.0, 3.0]);
    }

    #[test]
    fn convert_invalid() {
        let source = dense(2, 2);
        assert!(matches!(
            dense_to_sparse(&source, 0, SparseLayout::Csr),
            Err(ConvertError::AxisChunksError(AxisChunksError::ZeroChunkSize))
        ));
        let vector = DenseArray::zeros(vec![4], DataType::Int32);
        assert!(dense_to_sparse(&vector, 2, SparseLayout::Csr).is_err());

        let store = Arc::new(MemoryStore::new());
        let destination = ArrayBuilder::new(vec![2, 3], DataType::Int32)
            .build(store, NodePath::new("/dense").unwrap())
            .unwrap();
        let sparse = SparseMatrix::from_dense(&source, SparseLayout::Csr).unwrap();
        assert!(matches!(
            sparse_to_dense(&sparse, &destination, 1),
            Err(ConvertError::IncompatibleDestination { .. })
        ));
    }

    #[test]
    fn convert_source_identity() {
        let store = Arc::new(MemoryStore::new());
        let array = ArrayBuilder::new(vec![2, 2], DataType::Int32)
            .build(store.clone(), NodePath::new("/dense").unwrap())
            .unwrap();
        assert_eq!(
            DenseSource::storage_identity(&array),
            Some(store.storage_identity())
        );
        assert_eq!(DenseSource::storage_identity(&dense(1, 1)), None);
    }
}
