use crate::{
    array::{ArrayBytes, ArrayError, ArrayShape, DataType, DataTypeSize, Element, ElementOwned},
    array_subset::{bytes_len, ArraySubset},
};

use super::MatrixError;

/// A dense n-dimensional array held in memory in C (row-major) order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DenseArray {
    shape: ArrayShape,
    data_type: DataType,
    bytes: ArrayBytes<'static>,
}

impl DenseArray {
    /// Create a new dense array from C-order `bytes`.
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if `bytes` are not valid for `shape` and `data_type`.
    pub fn new(
        shape: ArrayShape,
        data_type: DataType,
        bytes: ArrayBytes<'_>,
    ) -> Result<Self, MatrixError> {
        bytes.validate(shape.iter().product(), &data_type)?;
        Ok(Self {
            shape,
            data_type,
            bytes: bytes.into_owned(),
        })
    }

    /// Create a new two dimensional dense array from column-major (Fortran order) `bytes` of a fixed size data type.
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if the data type is variable length or `bytes` are not valid for `shape`.
    pub fn new_column_major(
        shape: [u64; 2],
        data_type: DataType,
        bytes: &[u8],
    ) -> Result<Self, MatrixError> {
        let element_size = data_type
            .fixed_size()
            .ok_or_else(|| MatrixError::UnsupportedDataType(data_type.clone(), "column-major array"))?;
        let expected = bytes_len(shape[0].saturating_mul(shape[1]), element_size);
        if bytes.len() != expected {
            return Err(ArrayError::InvalidBytesInputSize(bytes.len(), expected).into());
        }
        let mut row_major = vec![0u8; bytes.len()];
        let (rows, cols) = (bytes_len(shape[0], 1), bytes_len(shape[1], 1));
        for col in 0..cols {
            for row in 0..rows {
                let src = (col * rows + row) * element_size;
                let dst = (row * cols + col) * element_size;
                row_major[dst..dst + element_size].copy_from_slice(&bytes[src..src + element_size]);
            }
        }
        Self::new(shape.to_vec(), data_type, ArrayBytes::new_flen(row_major))
    }

    /// Create a new dense array from `elements`.
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if the element type is incompatible with `data_type` or the number of elements does not match `shape`.
    pub fn from_elements<T: Element>(
        shape: ArrayShape,
        data_type: DataType,
        elements: &[T],
    ) -> Result<Self, MatrixError> {
        let bytes = T::into_array_bytes(&data_type, elements)?;
        Self::new(shape, data_type, bytes)
    }

    /// Create a new dense array of zeros (or empty strings).
    #[must_use]
    pub fn zeros(shape: ArrayShape, data_type: DataType) -> Self {
        let bytes = ArrayBytes::new_zeros(&data_type, shape.iter().product());
        Self {
            shape,
            data_type,
            bytes,
        }
    }

    /// Returns the shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Returns the data type.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Returns the array bytes.
    #[must_use]
    pub fn bytes(&self) -> &ArrayBytes<'static> {
        &self.bytes
    }

    /// Consume the array and return its bytes.
    #[must_use]
    pub fn into_bytes(self) -> ArrayBytes<'static> {
        self.bytes
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Returns the length of the first dimension, or 1 for a scalar.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.shape.first().copied().unwrap_or(1)
    }

    /// Returns true if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_elements() == 0
    }

    /// Returns the elements of the array.
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if the element type is incompatible with the data type.
    pub fn elements<T: ElementOwned>(&self) -> Result<Vec<T>, MatrixError> {
        Ok(T::from_array_bytes(&self.data_type, self.bytes.clone())?)
    }

    /// Returns the `[rows, cols]` shape of a two dimensional array.
    ///
    /// # Errors
    /// Returns [`MatrixError::NotTwoDimensional`] if the array is not two dimensional.
    pub fn shape_2d(&self) -> Result<[u64; 2], MatrixError> {
        match self.shape.as_slice() {
            &[rows, cols] => Ok([rows, cols]),
            _ => Err(MatrixError::NotTwoDimensional(self.shape.clone())),
        }
    }

    /// Extract a subset of the array.
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if `subset` is out of bounds.
    pub fn subset(&self, subset: &ArraySubset) -> Result<Self, MatrixError> {
        let bytes = self
            .bytes
            .extract_array_subset(subset, &self.shape, &self.data_type)?;
        Ok(Self {
            shape: subset.shape().to_vec(),
            data_type: self.data_type.clone(),
            bytes,
        })
    }

    /// Returns true if the data type has a fixed size.
    #[must_use]
    pub fn is_fixed_size(&self) -> bool {
        matches!(self.data_type.size(), DataTypeSize::Fixed(_))
    }

    #[cfg(feature = "ndarray")]
    /// Convert into an [`ndarray::ArrayD`].
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if the element type is incompatible with the data type.
    pub fn to_ndarray<T: ElementOwned>(&self) -> Result<ndarray::ArrayD<T>, MatrixError> {
        let shape: Vec<usize> = self.shape.iter().map(|&dim| bytes_len(dim, 1)).collect();
        let elements = self.elements::<T>()?;
        let num_elements = elements.len();
        ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&shape), elements).map_err(|_| {
            MatrixError::ArrayError(ArrayError::InvalidBytesInputSize(
                num_elements,
                shape.iter().product(),
            ))
        })
    }
}
