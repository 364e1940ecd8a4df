use crate::{
    array::{Array, DataType},
    array_subset::ArraySubset,
    convert::{DenseSource, SparseDataset, SparseSource},
    elem::ElemError,
    matrix::DenseArray,
    node::{retrieve_node_metadata, NodeMetadata, NodePath},
    storage::{
        ReadableListableStorage, ReadableListableStorageTraits, ReadableWritableListableStorage,
        ReadableStorageTraits, ReadableWritableListableStorageTraits, StorageHandle,
        StorageIdentity,
    },
};

use super::{AnnDataError, ContainerError, Matrix};

/// The access mode of a backing store.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BackedMode {
    /// The backed matrix can be read.
    ReadOnly,
    /// The backed matrix can be read and modified in place.
    ReadWrite,
}

/// A store held by a backed container.
#[derive(Clone)]
pub enum BackingStorage {
    /// A read-only handle.
    ReadOnly(ReadableListableStorage),
    /// A read-write handle.
    ReadWrite(ReadableWritableListableStorage),
}

impl std::fmt::Debug for BackingStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackingStorage")
            .field("mode", &self.mode())
            .field("identity", &self.identity())
            .finish()
    }
}

impl From<ReadableListableStorage> for BackingStorage {
    fn from(storage: ReadableListableStorage) -> Self {
        Self::ReadOnly(storage)
    }
}

impl From<ReadableWritableListableStorage> for BackingStorage {
    fn from(storage: ReadableWritableListableStorage) -> Self {
        Self::ReadWrite(storage)
    }
}

impl BackingStorage {
    /// Returns the access mode.
    #[must_use]
    pub fn mode(&self) -> BackedMode {
        match self {
            Self::ReadOnly(_) => BackedMode::ReadOnly,
            Self::ReadWrite(_) => BackedMode::ReadWrite,
        }
    }

    /// Returns a readable view of the store.
    #[must_use]
    pub fn readable(&self) -> ReadableListableStorage {
        match self {
            Self::ReadOnly(storage) => storage.clone(),
            Self::ReadWrite(storage) => std::sync::Arc::new(StorageHandle::new(storage.clone())),
        }
    }

    /// Returns the store if it is writable.
    #[must_use]
    pub fn writable(&self) -> Option<&ReadableWritableListableStorage> {
        match self {
            Self::ReadOnly(_) => None,
            Self::ReadWrite(storage) => Some(storage),
        }
    }

    /// Returns the identity of the store.
    #[must_use]
    pub fn identity(&self) -> StorageIdentity {
        match self {
            Self::ReadOnly(storage) => storage.storage_identity(),
            Self::ReadWrite(storage) => storage.storage_identity(),
        }
    }
}

/// The store backing a container read in backed mode.
#[derive(Clone, Debug)]
pub struct Backing {
    storage: BackingStorage,
    identity: StorageIdentity,
    x_data_type: Option<DataType>,
}

impl Backing {
    /// Create a backing for `storage` with a primary matrix of `x_data_type`.
    pub fn new(storage: impl Into<BackingStorage>, x_data_type: Option<DataType>) -> Self {
        let storage = storage.into();
        Self {
            identity: storage.identity(),
            storage,
            x_data_type,
        }
    }

    /// Returns the store.
    #[must_use]
    pub fn storage(&self) -> &BackingStorage {
        &self.storage
    }

    /// Returns the identity of the store.
    #[must_use]
    pub fn identity(&self) -> &StorageIdentity {
        &self.identity
    }

    /// Returns the access mode.
    #[must_use]
    pub fn mode(&self) -> BackedMode {
        self.storage.mode()
    }

    /// Returns the data type of the primary matrix in the store, if it has one.
    #[must_use]
    pub fn x_data_type(&self) -> Option<&DataType> {
        self.x_data_type.as_ref()
    }

    /// Open the primary matrix `/X` without reading its values.
    ///
    /// # Errors
    /// Returns an [`AnnDataError`] annotated with `X` if the matrix does not exist or is not a dense array or sparse matrix.
    pub fn open_x(&self) -> Result<BackedMatrix, AnnDataError> {
        let path = NodePath::root().child("X")?;
        self.open_matrix(&path)
            .map_err(|err| err.at_key(path.key(), "opening"))
    }

    fn open_matrix(&self, path: &NodePath) -> Result<BackedMatrix, AnnDataError> {
        let readable = self.storage.readable();
        let metadata = retrieve_node_metadata(&*readable, path)?
            .ok_or_else(|| ElemError::Missing(path.clone()))?;
        match metadata {
            NodeMetadata::Group(_) => Ok(BackedMatrix::Sparse(SparseDataset::open(
                readable, path, &metadata,
            )?)),
            NodeMetadata::Array(_) => {
                let array = Array::open(readable, path)?;
                let writable = match self.storage.writable() {
                    Some(storage) => Some(Array::open(storage.clone(), path)?),
                    None => None,
                };
                Ok(BackedMatrix::Dense(BackedDenseArray { array, writable }))
            }
        }
    }
}

/// A dense primary matrix in a backing store.
pub struct BackedDenseArray {
    array: Array<dyn ReadableListableStorageTraits>,
    writable: Option<Array<dyn ReadableWritableListableStorageTraits>>,
}

impl BackedDenseArray {
    /// Returns the array.
    #[must_use]
    pub fn array(&self) -> &Array<dyn ReadableListableStorageTraits> {
        &self.array
    }

    /// Returns true if the array can be modified.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.writable.is_some()
    }

    /// Read `subset` of the array.
    ///
    /// # Errors
    /// Returns an [`AnnDataError`] if `subset` is out of bounds or a read fails.
    pub fn read_subset(&self, subset: &ArraySubset) -> Result<DenseArray, AnnDataError> {
        Ok(self.array.read_subset(subset)?)
    }

    /// Write `values` to `subset` of the array.
    ///
    /// # Errors
    /// Returns [`ContainerError::ReadOnlyBacking`] if the store is read-only, or an [`AnnDataError`] if `values` do not match `subset` or a write fails.
    pub fn store_subset(&self, subset: &ArraySubset, values: &DenseArray) -> Result<(), AnnDataError> {
        let writable = self.writable.as_ref().ok_or(ContainerError::ReadOnlyBacking)?;
        if values.data_type() != writable.data_type() || values.shape() != subset.shape() {
            return Err(ContainerError::IncompatibleShape {
                field: "X".to_string(),
                shape: values.shape().to_vec(),
                expected: format!("{:?} of {}", subset.shape(), writable.data_type()),
            }
            .into());
        }
        writable.store_array_subset(subset, values.bytes().as_borrowed())?;
        Ok(())
    }
}

/// A primary matrix in a backing store, opened without reading its values.
pub enum BackedMatrix {
    /// A dense array.
    Dense(BackedDenseArray),
    /// A sparse matrix group.
    Sparse(SparseDataset<dyn ReadableListableStorageTraits>),
}

impl std::fmt::Debug for BackedMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = if self.is_sparse() { "Sparse" } else { "Dense" };
        f.debug_struct("BackedMatrix")
            .field("variant", &variant)
            .field("shape", &self.shape())
            .field("data_type", self.data_type())
            .finish()
    }
}

impl BackedMatrix {
    /// Returns the shape of the matrix.
    #[must_use]
    pub fn shape(&self) -> Vec<u64> {
        match self {
            Self::Dense(dense) => dense.array.shape().to_vec(),
            Self::Sparse(sparse) => SparseSource::shape(sparse).to_vec(),
        }
    }

    /// Returns the data type of the matrix elements.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        match self {
            Self::Dense(dense) => dense.array.data_type(),
            Self::Sparse(sparse) => SparseSource::data_type(sparse),
        }
    }

    /// Returns true if the matrix is sparse.
    #[must_use]
    pub fn is_sparse(&self) -> bool {
        matches!(self, Self::Sparse(_))
    }

    /// Read the whole matrix into memory.
    ///
    /// # Errors
    /// Returns an [`AnnDataError`] if a read fails.
    pub fn to_matrix(&self) -> Result<Matrix, AnnDataError> {
        match self {
            Self::Dense(dense) => {
                let subset = ArraySubset::new_with_shape(dense.array.shape().to_vec());
                Ok(Matrix::Dense(dense.read_subset(&subset)?))
            }
            Self::Sparse(sparse) => Ok(Matrix::Sparse(sparse.to_memory()?)),
        }
    }

    /// Write `values` to `subset` of a dense matrix in place.
    ///
    /// # Errors
    /// Returns [`ContainerError::NotDense`] for a sparse matrix, [`ContainerError::ReadOnlyBacking`] if the store is read-only, or an [`AnnDataError`] if the write fails.
    pub fn store_dense_subset(
        &self,
        subset: &ArraySubset,
        values: &DenseArray,
    ) -> Result<(), AnnDataError> {
        match self {
            Self::Dense(dense) => dense.store_subset(subset, values),
            Self::Sparse(_) => Err(ContainerError::NotDense.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, sync::Arc};

    use crate::{
        anndata::ErrorKind,
        array::DatasetOptions,
        elem::{write_elem, Elem},
        matrix::{SparseLayout, SparseMatrix},
        storage::store::MemoryStore,
    };

    use super::*;

    #[test]
    fn backed_dense_in_place() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        let writable: ReadableWritableListableStorage = store.clone();
        let readable: ReadableListableStorage = store;
        let x = DenseArray::from_elements(vec![2, 3], DataType::Int32, &[1i32, 2, 3, 4, 5, 6])?;
        write_elem(&writable, &NodePath::new("/X")?, &Elem::Array(x), &DatasetOptions::default())?;

        let read_only = Backing::new(readable, Some(DataType::Int32));
        assert_eq!(read_only.mode(), BackedMode::ReadOnly);
        let matrix = read_only.open_x()?;
        assert_eq!(matrix.shape(), vec![2, 3]);
        let row = ArraySubset::new_with_ranges(&[1..2, 0..3]);
        let values = DenseArray::from_elements(vec![1, 3], DataType::Int32, &[0i32, 0, 9])?;
        let err = matrix.store_dense_subset(&row, &values).unwrap_err();
        assert!(matches!(
            err,
            AnnDataError::Container(ContainerError::ReadOnlyBacking)
        ));

        let read_write = Backing::new(writable, Some(DataType::Int32));
        assert_eq!(read_write.identity(), read_only.identity());
        read_write.open_x()?.store_dense_subset(&row, &values)?;
        let expected = DenseArray::from_elements(vec![2, 3], DataType::Int32, &[1i32, 2, 3, 0, 0, 9])?;
        assert_eq!(read_only.open_x()?.to_matrix()?, Matrix::Dense(expected));
        Ok(())
    }

    #[test]
    fn backed_sparse() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        let writable: ReadableWritableListableStorage = store.clone();
        let x = SparseMatrix::from_elements(
            SparseLayout::Csc,
            [3, 2],
            DataType::Float64,
            &[1.0f64, 2.0],
            vec![2, 0],
            vec![0, 1, 2],
        )?;
        write_elem(&writable, &NodePath::new("/X")?, &Elem::Sparse(x.clone()), &DatasetOptions::default())?;

        let backing = Backing::new(writable, Some(DataType::Float64));
        let matrix = backing.open_x()?;
        assert!(matrix.is_sparse());
        assert_eq!(matrix.data_type(), &DataType::Float64);
        assert_eq!(matrix.to_matrix()?, Matrix::Sparse(x));
        let values = DenseArray::zeros(vec![1, 1], DataType::Float64);
        assert!(matches!(
            matrix.store_dense_subset(&ArraySubset::new_with_ranges(&[0..1, 0..1]), &values),
            Err(AnnDataError::Container(ContainerError::NotDense))
        ));
        Ok(())
    }

    #[test]
    fn backed_missing_x() {
        let backing = Backing::new(
            Arc::new(MemoryStore::new()) as ReadableListableStorage,
            None,
        );
        let err = backing.open_x().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(err.key(), Some("X"));
    }
}
