//! Arrays.
//!
//! An array is a node in a hierarchy used to hold multidimensional array data and associated metadata.
//!
//! Use [`ArrayBuilder`] to setup a new array, or use [`Array::open`] for an existing array.
//!
//! Arrays are split into a regular grid of chunks, each stored under `<array>/c/<i>/<j>…`.
//! Chunks at the edge of the array are truncated to the array bounds.
//! A chunk which has not been written reads as zero (or empty strings for variable length data types).
//! Chunks of fixed size data types are C-order little-endian element bytes, variable length strings use the `vlen-utf8` layout and always occupy a single chunk.

mod array_builder;
mod array_bytes;
mod array_errors;
mod array_metadata;
mod compression;
pub mod data_type;
mod element;

use std::sync::Arc;

pub use self::{
    array_builder::{ArrayBuilder, DatasetOptions},
    array_bytes::{decode_vlen, encode_vlen, ArrayBytes, RawBytes, RawBytesOffsets},
    array_errors::{ArrayCreateError, ArrayError},
    array_metadata::ArrayMetadata,
    compression::Compressor,
    data_type::{DataType, DataTypeSize, StructuredField},
    element::{integers_to_i64, Element, ElementOwned},
};

use itertools::izip;

use crate::{
    array_subset::{bytes_len, ArraySubset},
    group::Attributes,
    node::{NodeMetadata, NodePath},
    storage::{meta_key, ReadableStorageTraits, StorageError, WritableStorageTraits},
};

/// An ND index to an element in an array.
pub type ArrayIndices = Vec<u64>;

/// The shape of an array.
pub type ArrayShape = Vec<u64>;

/// Convert `indices` of an array with `shape` to a C-order linear index.
///
/// The indices are not bounds checked.
#[must_use]
pub fn ravel_indices(indices: &[u64], shape: &[u64]) -> u64 {
    let mut index: u64 = 0;
    let mut count = 1;
    for (i, s) in izip!(indices, shape).rev() {
        index += i * count;
        count *= s;
    }
    index
}

/// An array.
///
/// An array is generic over the storage it is read from or written to.
/// The storage traits it requires depend on the operation:
///  - [`ReadableStorageTraits`]: [`open`](Array::open), [`retrieve_chunk`](Array::retrieve_chunk), [`retrieve_array_subset`](Array::retrieve_array_subset).
///  - [`WritableStorageTraits`]: [`store_metadata`](Array::store_metadata), [`store_chunk`](Array::store_chunk), [`erase_chunk`](Array::erase_chunk).
///  - both: [`store_array_subset`](Array::store_array_subset), which reads and rewrites chunks partially covered by the subset.
#[derive(Debug, Clone)]
pub struct Array<TStorage: ?Sized> {
    /// The storage.
    storage: Arc<TStorage>,
    /// The path of the array in the store.
    path: NodePath,
    /// The metadata.
    metadata: ArrayMetadata,
}

impl<TStorage: ?Sized> Array<TStorage> {
    /// Create an array in `storage` at `path` with `metadata`.
    /// This does **not** write to the store, use [`store_metadata`](Array::store_metadata) to write `metadata` to `storage`.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayCreateError`] if the chunk shape does not match the dimensionality of the array, has a zero component, or splits a variable length array into multiple chunks.
    pub fn new_with_metadata(
        storage: Arc<TStorage>,
        path: NodePath,
        metadata: ArrayMetadata,
    ) -> Result<Self, ArrayCreateError> {
        validate_metadata(&metadata)?;
        Ok(Self {
            storage,
            path,
            metadata,
        })
    }

    /// Get the underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<TStorage> {
        &self.storage
    }

    /// Get the node path.
    #[must_use]
    pub const fn path(&self) -> &NodePath {
        &self.path
    }

    /// Get the metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ArrayMetadata {
        &self.metadata
    }

    /// Get the array shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.metadata.shape
    }

    /// Get the array dimensionality.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.metadata.shape.len()
    }

    /// Get the total number of elements.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.metadata.shape.iter().product()
    }

    /// Get the data type.
    #[must_use]
    pub const fn data_type(&self) -> &DataType {
        &self.metadata.data_type
    }

    /// Get the chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[u64] {
        &self.metadata.chunk_shape
    }

    /// Get the compressor.
    #[must_use]
    pub fn compressor(&self) -> Option<&Compressor> {
        self.metadata.compressor.as_ref()
    }

    /// Get the attributes.
    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.metadata.attributes
    }

    /// Mutably borrow the array attributes.
    #[must_use]
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.metadata.attributes
    }

    /// Get a string attribute.
    #[must_use]
    pub fn string_attribute(&self, name: &str) -> Option<&str> {
        self.metadata
            .attributes
            .get(name)
            .and_then(serde_json::Value::as_str)
    }

    /// Return the shape of the chunk grid (i.e., the number of chunks along each dimension).
    #[must_use]
    pub fn chunk_grid_shape(&self) -> ArrayShape {
        izip!(self.shape(), self.chunk_shape())
            .map(|(&shape, &chunk)| shape.div_ceil(chunk))
            .collect()
    }

    /// Return the array subset of the chunk at `chunk_indices`, truncated to the array bounds.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidChunkGridIndices`] if `chunk_indices` are outside the chunk grid.
    pub fn chunk_subset(&self, chunk_indices: &[u64]) -> Result<ArraySubset, ArrayError> {
        let grid_shape = self.chunk_grid_shape();
        if chunk_indices.len() != grid_shape.len()
            || izip!(chunk_indices, &grid_shape).any(|(index, grid)| index >= grid)
        {
            return Err(ArrayError::InvalidChunkGridIndices(chunk_indices.to_vec()));
        }
        let ranges: Vec<_> = izip!(chunk_indices, self.chunk_shape(), self.shape())
            .map(|(&index, &chunk, &shape)| index * chunk..((index + 1) * chunk).min(shape))
            .collect();
        Ok(ArraySubset::new_with_ranges(&ranges))
    }

    fn validate_subset(&self, array_subset: &ArraySubset) -> Result<(), ArrayError> {
        if array_subset.inbounds(self.shape()) {
            Ok(())
        } else {
            Err(ArrayError::InvalidArraySubset(
                array_subset.clone(),
                self.shape().to_vec(),
            ))
        }
    }

    fn encode_chunk(&self, chunk_bytes: &ArrayBytes<'_>) -> Result<Vec<u8>, ArrayError> {
        let bytes = match chunk_bytes {
            ArrayBytes::Fixed(bytes) => bytes.to_vec(),
            ArrayBytes::Variable(bytes, offsets) => encode_vlen(bytes, offsets)?,
        };
        match self.compressor() {
            Some(compressor) => compressor.encode(&bytes),
            None => Ok(bytes),
        }
    }

    fn decode_chunk(
        &self,
        encoded: &[u8],
        num_elements: u64,
    ) -> Result<ArrayBytes<'static>, ArrayError> {
        let decompressed;
        let bytes = match self.compressor() {
            Some(compressor) => {
                decompressed = compressor.decode(encoded)?;
                decompressed.as_slice()
            }
            None => encoded,
        };
        match self.data_type().size() {
            DataTypeSize::Fixed(size) => {
                let expected = bytes_len(num_elements, size);
                if bytes.len() == expected {
                    Ok(ArrayBytes::new_flen(bytes.to_vec()))
                } else {
                    Err(ArrayError::UnexpectedChunkDecodedSize(bytes.len(), expected))
                }
            }
            DataTypeSize::Variable => decode_vlen(bytes, num_elements),
        }
    }
}

fn validate_metadata(metadata: &ArrayMetadata) -> Result<(), ArrayCreateError> {
    let ArrayMetadata {
        shape,
        chunk_shape,
        data_type,
        ..
    } = metadata;
    if chunk_shape.len() != shape.len() || chunk_shape.contains(&0) {
        return Err(ArrayCreateError::InvalidChunkShape(
            shape.clone(),
            chunk_shape.clone(),
        ));
    }
    if data_type.size() == DataTypeSize::Variable
        && izip!(shape, chunk_shape).any(|(shape, chunk)| chunk < shape)
    {
        return Err(ArrayCreateError::VariableLengthChunked(
            data_type.clone(),
            chunk_shape.clone(),
            shape.clone(),
        ));
    }
    Ok(())
}

impl<TStorage: ?Sized + ReadableStorageTraits> Array<TStorage> {
    /// Open an existing array in `storage` at `path`. The metadata is read from the store.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayCreateError`] if there is a storage error, the metadata is invalid, or the node is not an array.
    pub fn open(storage: Arc<TStorage>, path: &NodePath) -> Result<Self, ArrayCreateError> {
        let key = meta_key(path);
        let metadata = storage
            .get(&key)?
            .ok_or_else(|| ArrayCreateError::Missing(path.clone()))?;
        let metadata: NodeMetadata = serde_json::from_slice(&metadata)
            .map_err(|err| ArrayCreateError::Metadata(format!("{key}: {err}")))?;
        match metadata {
            NodeMetadata::Array(metadata) => {
                if metadata.zarr_format != crate::node::ZARR_FORMAT {
                    return Err(ArrayCreateError::Metadata(format!(
                        "{key}: unsupported zarr_format {}",
                        metadata.zarr_format
                    )));
                }
                Self::new_with_metadata(storage, path.clone(), metadata)
            }
            NodeMetadata::Group(_) => Err(ArrayCreateError::InvalidNodeType(path.clone())),
        }
    }

    /// Read and decode the chunk at `chunk_indices` into its bytes.
    ///
    /// A chunk which does not exist in the store is zero.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - `chunk_indices` are invalid,
    ///  - there is a decoding error, or
    ///  - an underlying store error.
    pub fn retrieve_chunk(&self, chunk_indices: &[u64]) -> Result<ArrayBytes<'static>, ArrayError> {
        let chunk_subset = self.chunk_subset(chunk_indices)?;
        let num_elements = chunk_subset.num_elements();
        match crate::storage::retrieve_chunk(&*self.storage, &self.path, chunk_indices)? {
            Some(encoded) => self.decode_chunk(&encoded, num_elements),
            None => Ok(ArrayBytes::new_zeros(self.data_type(), num_elements)),
        }
    }

    /// Read and decode the `array_subset` of the array into its bytes.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the `array_subset` dimensionality does not match the array or it is out of bounds,
    ///  - there is a decoding error, or
    ///  - an underlying store error.
    pub fn retrieve_array_subset(
        &self,
        array_subset: &ArraySubset,
    ) -> Result<ArrayBytes<'static>, ArrayError> {
        self.validate_subset(array_subset)?;
        let data_type = self.data_type();
        let Some(element_size) = data_type.fixed_size() else {
            // a variable length array is a single chunk
            let indices = vec![0; self.dimensionality()];
            if array_subset.num_elements() == 0 {
                return Ok(ArrayBytes::new_zeros(data_type, 0));
            }
            let chunk = self.retrieve_chunk(&indices)?;
            return chunk.extract_array_subset(array_subset, self.shape(), data_type);
        };

        let mut output = vec![0u8; bytes_len(array_subset.num_elements(), element_size)];
        if array_subset.num_elements() == 0 {
            return Ok(ArrayBytes::new_flen(output));
        }
        for (chunk_indices, _) in array_subset.iter_chunks(self.chunk_shape())? {
            let chunk_subset = self.chunk_subset(&chunk_indices)?;
            let Some(overlap) = chunk_subset.overlap(array_subset)? else {
                continue;
            };
            let chunk_bytes = self.retrieve_chunk(&chunk_indices)?.into_fixed()?;
            let overlap_in_chunk = overlap.relative_to(chunk_subset.start())?;
            let bytes = overlap_in_chunk
                .extract_bytes(&chunk_bytes, chunk_subset.shape(), element_size)
                .map_err(|_| {
                    ArrayError::InvalidArraySubset(overlap.clone(), chunk_subset.shape().to_vec())
                })?;
            overlap
                .relative_to(array_subset.start())?
                .store_bytes(&bytes, &mut output, array_subset.shape(), element_size)
                .map_err(|_| {
                    ArrayError::InvalidArraySubset(overlap.clone(), array_subset.shape().to_vec())
                })?;
        }
        Ok(ArrayBytes::new_flen(output))
    }

    /// Read and decode the `array_subset` of the array into a vector of its elements.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the element type is incompatible with the data type, or any error condition of [`retrieve_array_subset`](Array::retrieve_array_subset).
    pub fn retrieve_array_subset_elements<T: ElementOwned>(
        &self,
        array_subset: &ArraySubset,
    ) -> Result<Vec<T>, ArrayError> {
        T::validate_data_type(self.data_type())?;
        T::from_array_bytes(self.data_type(), self.retrieve_array_subset(array_subset)?)
    }

    /// Read and decode every element of the array.
    ///
    /// # Errors
    /// See [`retrieve_array_subset_elements`](Array::retrieve_array_subset_elements).
    pub fn retrieve_elements<T: ElementOwned>(&self) -> Result<Vec<T>, ArrayError> {
        self.retrieve_array_subset_elements(&ArraySubset::new_with_shape(self.shape().to_vec()))
    }

    #[cfg(feature = "ndarray")]
    /// Read and decode the `array_subset` of the array into an [`ndarray::ArrayD`].
    ///
    /// # Errors
    /// See [`retrieve_array_subset_elements`](Array::retrieve_array_subset_elements).
    pub fn retrieve_array_subset_ndarray<T: ElementOwned>(
        &self,
        array_subset: &ArraySubset,
    ) -> Result<ndarray::ArrayD<T>, ArrayError> {
        let elements = self.retrieve_array_subset_elements(array_subset)?;
        let shape: Vec<usize> = array_subset
            .shape()
            .iter()
            .map(|&dim| bytes_len(dim, 1))
            .collect();
        let num_elements = elements.len();
        ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&shape), elements)
            .map_err(|_| ArrayError::InvalidBytesInputSize(num_elements, shape.iter().product()))
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> Array<TStorage> {
    /// Store metadata.
    ///
    /// # Errors
    /// Returns [`StorageError`] if there is an underlying store error.
    pub fn store_metadata(&self) -> Result<(), StorageError> {
        crate::storage::create_array(&*self.storage, &self.path, &self.metadata)
    }

    /// Encode `chunk_bytes` and store at `chunk_indices`.
    ///
    /// A chunk of fixed size elements which are all zero is erased rather than stored.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - `chunk_indices` are invalid,
    ///  - the length of `chunk_bytes` is not equal to the expected length (the product of the number of elements in the chunk and the data type size),
    ///  - there is an encoding error, or
    ///  - an underlying store error.
    pub fn store_chunk(
        &self,
        chunk_indices: &[u64],
        chunk_bytes: ArrayBytes<'_>,
    ) -> Result<(), ArrayError> {
        let chunk_subset = self.chunk_subset(chunk_indices)?;
        chunk_bytes.validate(chunk_subset.num_elements(), self.data_type())?;
        if matches!(chunk_bytes, ArrayBytes::Fixed(_)) && chunk_bytes.is_zero() {
            return self.erase_chunk(chunk_indices);
        }
        let encoded = self.encode_chunk(&chunk_bytes)?;
        crate::storage::store_chunk(&*self.storage, &self.path, chunk_indices, encoded.into())?;
        Ok(())
    }

    /// Encode `chunk_elements` and store at `chunk_indices`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the element type is incompatible with the data type, or any error condition of [`store_chunk`](Array::store_chunk).
    pub fn store_chunk_elements<T: Element>(
        &self,
        chunk_indices: &[u64],
        chunk_elements: &[T],
    ) -> Result<(), ArrayError> {
        let bytes = T::into_array_bytes(self.data_type(), chunk_elements)?;
        self.store_chunk(chunk_indices, bytes)
    }

    /// Erase the chunk at `chunk_indices`.
    ///
    /// Succeeds if the chunk does not exist.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `chunk_indices` are invalid or there is an underlying store error.
    pub fn erase_chunk(&self, chunk_indices: &[u64]) -> Result<(), ArrayError> {
        self.chunk_subset(chunk_indices)?;
        self.storage
            .erase(&crate::storage::data_key(&self.path, chunk_indices))?;
        Ok(())
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits> Array<TStorage> {
    /// Encode `subset_bytes` and store in `array_subset`.
    ///
    /// Chunks entirely within `array_subset` are written directly, chunks partially within it are read, updated, and rewritten.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the dimensionality of `array_subset` does not match the array or it is out of bounds,
    ///  - the length of `subset_bytes` does not match the expected length governed by the shape of the array subset and the data type size,
    ///  - there is an encoding error, or
    ///  - an underlying store error.
    pub fn store_array_subset(
        &self,
        array_subset: &ArraySubset,
        subset_bytes: ArrayBytes<'_>,
    ) -> Result<(), ArrayError> {
        self.validate_subset(array_subset)?;
        subset_bytes.validate(array_subset.num_elements(), self.data_type())?;
        if array_subset.num_elements() == 0 {
            return Ok(());
        }
        let Some(element_size) = self.data_type().fixed_size() else {
            return self.store_array_subset_variable(array_subset, &subset_bytes);
        };
        let subset_bytes = subset_bytes.into_fixed()?;

        for (chunk_indices, _) in array_subset.iter_chunks(self.chunk_shape())? {
            let chunk_subset = self.chunk_subset(&chunk_indices)?;
            let Some(overlap) = chunk_subset.overlap(array_subset)? else {
                continue;
            };
            let overlap_bytes = overlap
                .relative_to(array_subset.start())?
                .extract_bytes(&subset_bytes, array_subset.shape(), element_size)
                .map_err(|_| {
                    ArrayError::InvalidArraySubset(overlap.clone(), array_subset.shape().to_vec())
                })?;
            if overlap == chunk_subset {
                self.store_chunk(&chunk_indices, ArrayBytes::new_flen(overlap_bytes))?;
            } else {
                let mut chunk_bytes = self.retrieve_chunk(&chunk_indices)?.into_fixed()?.into_owned();
                overlap
                    .relative_to(chunk_subset.start())?
                    .store_bytes(
                        &overlap_bytes,
                        &mut chunk_bytes,
                        chunk_subset.shape(),
                        element_size,
                    )
                    .map_err(|_| {
                        ArrayError::InvalidArraySubset(overlap.clone(), chunk_subset.shape().to_vec())
                    })?;
                self.store_chunk(&chunk_indices, ArrayBytes::new_flen(chunk_bytes))?;
            }
        }
        Ok(())
    }

    fn store_array_subset_variable(
        &self,
        array_subset: &ArraySubset,
        subset_bytes: &ArrayBytes<'_>,
    ) -> Result<(), ArrayError> {
        let chunk_indices = vec![0; self.dimensionality()];
        if array_subset.shape() == self.shape() {
            return self.store_chunk(&chunk_indices, subset_bytes.clone());
        }
        let chunk = self.retrieve_chunk(&chunk_indices)?;
        let mut elements: Vec<&[u8]> = chunk.variable_elements()?.collect();
        for (indices, element) in array_subset
            .iter_indices()
            .zip(subset_bytes.variable_elements()?)
        {
            let index = usize::try_from(ravel_indices(&indices, self.shape()))
                .map_err(|_| ArrayError::InvalidChunkGridIndices(indices.clone()))?;
            if let Some(slot) = elements.get_mut(index) {
                *slot = element;
            }
        }
        let mut bytes = Vec::new();
        let mut offsets = Vec::with_capacity(elements.len() + 1);
        for element in elements {
            offsets.push(bytes.len());
            bytes.extend_from_slice(element);
        }
        offsets.push(bytes.len());
        self.store_chunk(&chunk_indices, ArrayBytes::new_vlen(bytes, offsets))
    }

    /// Encode `subset_elements` and store in `array_subset`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the element type is incompatible with the data type, or any error condition of [`store_array_subset`](Array::store_array_subset).
    pub fn store_array_subset_elements<T: Element>(
        &self,
        array_subset: &ArraySubset,
        subset_elements: &[T],
    ) -> Result<(), ArrayError> {
        let bytes = T::into_array_bytes(self.data_type(), subset_elements)?;
        self.store_array_subset(array_subset, bytes)
    }

    /// Encode `elements` and store them as the whole array.
    ///
    /// # Errors
    /// See [`store_array_subset_elements`](Array::store_array_subset_elements).
    pub fn store_elements<T: Element>(&self, elements: &[T]) -> Result<(), ArrayError> {
        self.store_array_subset_elements(&ArraySubset::new_with_shape(self.shape().to_vec()), elements)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::storage::{store::MemoryStore, ListableStorageTraits};

    use super::*;

    fn test_array(
        store: &Arc<MemoryStore>,
        shape: ArrayShape,
        data_type: DataType,
        chunk_shape: ArrayShape,
    ) -> Array<MemoryStore> {
        let array = ArrayBuilder::new(shape, data_type)
            .chunk_shape(chunk_shape)
            .build(store.clone(), NodePath::new("/array").unwrap())
            .unwrap();
        array.store_metadata().unwrap();
        array
    }

    #[test]
    fn array_ravel_indices() {
        assert_eq!(ravel_indices(&[1, 2], &[3, 4]), 6);
        assert_eq!(ravel_indices(&[], &[]), 0);
    }

    #[test]
    fn array_chunk_grid() {
        let store = Arc::new(MemoryStore::new());
        let array = test_array(&store, vec![5, 4], DataType::UInt8, vec![2, 3]);
        assert_eq!(array.chunk_grid_shape(), vec![3, 2]);
        assert_eq!(
            array.chunk_subset(&[2, 1]).unwrap(),
            ArraySubset::new_with_ranges(&[4..5, 3..4])
        );
        assert!(array.chunk_subset(&[3, 0]).is_err());
    }

    #[test]
    fn array_invalid_metadata() {
        let store = Arc::new(MemoryStore::new());
        let path = NodePath::new("/array").unwrap();
        let zero_chunk = ArrayMetadata::new(vec![4, 4], DataType::Float32, vec![0, 4]);
        assert!(Array::new_with_metadata(store.clone(), path.clone(), zero_chunk).is_err());
        let wrong_dims = ArrayMetadata::new(vec![4, 4], DataType::Float32, vec![4]);
        assert!(Array::new_with_metadata(store.clone(), path.clone(), wrong_dims).is_err());
        let chunked_strings = ArrayMetadata::new(vec![4], DataType::String, vec![2]);
        assert!(matches!(
            Array::new_with_metadata(store, path, chunked_strings),
            Err(ArrayCreateError::VariableLengthChunked(..))
        ));
    }

    #[test]
    fn array_subset_round_trip() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        let array = test_array(&store, vec![5, 4], DataType::Int32, vec![2, 3]);
        let elements: Vec<i32> = (0..20).collect();
        array.store_elements(&elements)?;
        assert_eq!(array.retrieve_elements::<i32>()?, elements);

        let subset = ArraySubset::new_with_ranges(&[1..4, 2..4]);
        assert_eq!(
            array.retrieve_array_subset_elements::<i32>(&subset)?,
            vec![6, 7, 10, 11, 14, 15]
        );

        // a partial update rewrites only the overlapping elements
        array.store_array_subset_elements::<i32>(&subset, &[-1; 6])?;
        let updated = array.retrieve_elements::<i32>()?;
        assert_eq!(&updated[4..8], &[4, 5, -1, -1]);
        assert_eq!(&updated[16..20], &[16, 17, 18, 19]);
        Ok(())
    }

    #[test]
    fn array_missing_and_zero_chunks() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        let array = test_array(&store, vec![4], DataType::Float64, vec![2]);
        assert_eq!(array.retrieve_elements::<f64>()?, vec![0.0; 4]);
        array.store_elements(&[0.0, 0.0, 1.0, 0.0])?;
        // the all zero chunk is not stored
        assert_eq!(
            store.list()?.iter().map(|key| key.as_str()).collect::<Vec<_>>(),
            vec!["array/c/1", "array/zarr.json"]
        );
        assert_eq!(array.retrieve_elements::<f64>()?, vec![0.0, 0.0, 1.0, 0.0]);
        Ok(())
    }

    #[test]
    fn array_strings() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        let array = test_array(&store, vec![2, 2], DataType::String, vec![2, 2]);
        array.store_elements(&["a", "bb", "", "ccc"])?;
        array.store_array_subset_elements(&ArraySubset::new_with_ranges(&[1..2, 0..1]), &["d"])?;
        assert_eq!(
            array.retrieve_elements::<String>()?,
            vec!["a", "bb", "d", "ccc"]
        );
        assert_eq!(
            array.retrieve_array_subset_elements::<String>(&ArraySubset::new_with_ranges(&[
                0..2,
                1..2
            ]))?,
            vec!["bb", "ccc"]
        );
        Ok(())
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn array_compressed() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        let array = ArrayBuilder::new(vec![64], DataType::UInt16)
            .chunk_shape(vec![32])
            .compressor(Some(Compressor::gzip(5)))
            .build(store.clone(), NodePath::new("/compressed")?)?;
        array.store_metadata()?;
        let elements: Vec<u16> = (0..64).collect();
        array.store_elements(&elements)?;
        let reopened = Array::open(store, &NodePath::new("/compressed")?)?;
        assert_eq!(reopened.compressor(), Some(&Compressor::gzip(5)));
        assert_eq!(reopened.retrieve_elements::<u16>()?, elements);
        Ok(())
    }

    #[test]
    fn array_open() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        test_array(&store, vec![3], DataType::Bool, vec![3]);
        let array = Array::open(store.clone(), &NodePath::new("/array")?)?;
        assert_eq!(array.data_type(), &DataType::Bool);
        assert!(matches!(
            Array::open(store, &NodePath::new("/missing")?),
            Err(ArrayCreateError::Missing(_))
        ));
        Ok(())
    }
}
