use std::{ops::Range, str::FromStr};

use derive_more::Display;
use itertools::Itertools;
use thiserror::Error;

use crate::{
    array::{ArrayBytes, DataType, Element, ElementOwned},
    array_subset::bytes_len,
};

use super::{DenseArray, MatrixError};

/// The layout of a [`SparseMatrix`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum SparseLayout {
    /// Compressed sparse row. The major (compressed) axis is the row axis.
    #[display("csr")]
    Csr,
    /// Compressed sparse column. The major (compressed) axis is the column axis.
    #[display("csc")]
    Csc,
}

/// An unsupported sparse layout error.
#[derive(Debug, Error)]
#[error("unsupported sparse layout {0}, expected csr or csc")]
pub struct UnsupportedSparseLayoutError(pub String);

impl SparseLayout {
    /// The axis along which the matrix is compressed: 0 for CSR, 1 for CSC.
    #[must_use]
    pub const fn major_axis(self) -> usize {
        match self {
            Self::Csr => 0,
            Self::Csc => 1,
        }
    }

    /// The `encoding-type` of a sparse matrix group with this layout.
    #[must_use]
    pub const fn encoding_type(self) -> &'static str {
        match self {
            Self::Csr => "csr_matrix",
            Self::Csc => "csc_matrix",
        }
    }
}

impl FromStr for SparseLayout {
    type Err = UnsupportedSparseLayoutError;

    fn from_str(layout: &str) -> Result<Self, Self::Err> {
        match layout {
            "csr" | "csr_matrix" => Ok(Self::Csr),
            "csc" | "csc_matrix" => Ok(Self::Csc),
            _ => Err(UnsupportedSparseLayoutError(layout.to_string())),
        }
    }
}

/// A compressed sparse matrix.
///
/// The matrix holds three component arrays:
///  - `data`: the stored element bytes,
///  - `indices`: the minor axis index of each stored element, and
///  - `indptr`: the offsets of each major axis slice into `data` and `indices`, with one more entry than the length of the major axis.
///
/// Stored elements are kept in the order they are given; they are not sorted or deduplicated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparseMatrix {
    layout: SparseLayout,
    shape: [u64; 2],
    data_type: DataType,
    data: Vec<u8>,
    indices: Vec<i64>,
    indptr: Vec<i64>,
}

impl SparseMatrix {
    /// Create a new sparse matrix from its component arrays, where `data` holds the little-endian bytes of the stored elements.
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if the data type is not numeric or the component arrays are inconsistent.
    pub fn new(
        layout: SparseLayout,
        shape: [u64; 2],
        data_type: DataType,
        data: Vec<u8>,
        indices: Vec<i64>,
        indptr: Vec<i64>,
    ) -> Result<Self, MatrixError> {
        let matrix = Self {
            layout,
            shape,
            data_type,
            data,
            indices,
            indptr,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    /// Create a new sparse matrix from stored `data` elements.
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if the element type is incompatible with `data_type` or the component arrays are inconsistent.
    pub fn from_elements<T: Element>(
        layout: SparseLayout,
        shape: [u64; 2],
        data_type: DataType,
        data: &[T],
        indices: Vec<i64>,
        indptr: Vec<i64>,
    ) -> Result<Self, MatrixError> {
        let data = T::into_array_bytes(&data_type, data)?.into_fixed()?.into_owned();
        Self::new(layout, shape, data_type, data, indices, indptr)
    }

    /// Create a sparse matrix with no stored elements.
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if the data type is not numeric.
    pub fn empty(
        layout: SparseLayout,
        shape: [u64; 2],
        data_type: DataType,
    ) -> Result<Self, MatrixError> {
        let major = bytes_len(shape[layout.major_axis()], 1);
        Self::new(layout, shape, data_type, vec![], vec![], vec![0; major.saturating_add(1)])
    }

    fn validate(&self) -> Result<(), MatrixError> {
        let invalid = |message: String| Err(MatrixError::InvalidSparse(message));
        if !self.data_type.is_numeric() {
            return Err(MatrixError::UnsupportedDataType(
                self.data_type.clone(),
                "sparse matrix",
            ));
        }
        let nnz = self.indices.len();
        let expected_data = bytes_len(nnz as u64, self.element_size());
        if self.data.len() != expected_data {
            return invalid(format!(
                "data has {} bytes, expected {expected_data} for {nnz} indices",
                self.data.len()
            ));
        }
        if self.indptr.len() as u64 != self.major_len() + 1 {
            return invalid(format!(
                "indptr has length {}, expected {}",
                self.indptr.len(),
                self.major_len() + 1
            ));
        }
        if self.indptr.first() != Some(&0) {
            return invalid("indptr does not start at 0".to_string());
        }
        if !self.indptr.iter().tuple_windows().all(|(a, b)| a <= b) {
            return invalid("indptr is not non-decreasing".to_string());
        }
        if self.indptr.last().copied() != i64::try_from(nnz).ok() {
            return invalid(format!(
                "indptr ends at {:?}, expected the number of stored elements {nnz}",
                self.indptr.last()
            ));
        }
        let minor = self.minor_len();
        if let Some(index) = self
            .indices
            .iter()
            .find(|&&index| u64::try_from(index).map_or(true, |index| index >= minor))
        {
            return invalid(format!("index {index} is out of bounds for minor axis length {minor}"));
        }
        Ok(())
    }

    /// Returns the layout.
    #[must_use]
    pub const fn layout(&self) -> SparseLayout {
        self.layout
    }

    /// Returns the `[rows, cols]` shape.
    #[must_use]
    pub const fn shape(&self) -> [u64; 2] {
        self.shape
    }

    /// Returns the data type of the stored elements.
    #[must_use]
    pub const fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Returns the bytes of the stored elements.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the stored elements.
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if the element type is incompatible with the data type.
    pub fn data_elements<T: ElementOwned>(&self) -> Result<Vec<T>, MatrixError> {
        Ok(T::from_array_bytes(
            &self.data_type,
            ArrayBytes::new_flen(self.data.as_slice()),
        )?)
    }

    /// Returns the minor axis index of each stored element.
    #[must_use]
    pub fn indices(&self) -> &[i64] {
        &self.indices
    }

    /// Returns the offsets of each major axis slice.
    #[must_use]
    pub fn indptr(&self) -> &[i64] {
        &self.indptr
    }

    /// Returns the number of stored elements.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Returns the length of the major (compressed) axis.
    #[must_use]
    pub const fn major_len(&self) -> u64 {
        self.shape[self.layout.major_axis()]
    }

    /// Returns the length of the minor axis.
    #[must_use]
    pub const fn minor_len(&self) -> u64 {
        self.shape[1 - self.layout.major_axis()]
    }

    fn element_size(&self) -> usize {
        self.data_type.fixed_size().unwrap_or(0)
    }

    /// Extract the rows (CSR) or columns (CSC) in `range` as a new sparse matrix.
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if `range` is out of bounds.
    pub fn major_slice(&self, range: Range<u64>) -> Result<Self, MatrixError> {
        if range.start > range.end || range.end > self.major_len() {
            return Err(MatrixError::InvalidSparse(format!(
                "major axis range {range:?} is out of bounds for length {}",
                self.major_len()
            )));
        }
        let start = bytes_len(range.start, 1);
        let end = bytes_len(range.end, 1);
        let offset = self.indptr[start];
        let indptr: Vec<i64> = self.indptr[start..=end]
            .iter()
            .map(|ptr| ptr - offset)
            .collect();
        let (first, last) = (as_index(offset), as_index(self.indptr[end]));
        let element_size = self.element_size();
        let mut shape = self.shape;
        shape[self.layout.major_axis()] = range.end - range.start;
        Ok(Self {
            layout: self.layout,
            shape,
            data_type: self.data_type.clone(),
            data: self.data[first * element_size..last * element_size].to_vec(),
            indices: self.indices[first..last].to_vec(),
            indptr,
        })
    }

    /// Concatenate `parts` along the major axis, stacking rows (CSR) or columns (CSC).
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if the parts have different layouts, data types, or minor axis lengths.
    pub fn concat_major(
        layout: SparseLayout,
        minor_len: u64,
        data_type: DataType,
        parts: impl IntoIterator<Item = Self>,
    ) -> Result<Self, MatrixError> {
        let mut major_len = 0;
        let mut data = Vec::new();
        let mut indices = Vec::new();
        let mut indptr = vec![0i64];
        for part in parts {
            if part.layout != layout || part.minor_len() != minor_len || part.data_type != data_type
            {
                return Err(MatrixError::InvalidSparse(format!(
                    "cannot concatenate a {} {} matrix with minor axis length {} onto a {layout} {data_type} matrix with minor axis length {minor_len}",
                    part.layout,
                    part.data_type,
                    part.minor_len()
                )));
            }
            let offset = *indptr.last().unwrap_or(&0);
            indptr.extend(part.indptr.iter().skip(1).map(|ptr| ptr + offset));
            data.extend_from_slice(&part.data);
            indices.extend_from_slice(&part.indices);
            major_len += part.major_len();
        }
        let mut shape = [0; 2];
        shape[layout.major_axis()] = major_len;
        shape[1 - layout.major_axis()] = minor_len;
        Self::new(layout, shape, data_type, data, indices, indptr)
    }

    /// Compress a two dimensional dense array, storing every non-zero element.
    ///
    /// An element is zero if all of its bytes are zero, so a floating point `-0.0` is stored.
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if `dense` is not a two dimensional numeric array.
    pub fn from_dense(dense: &DenseArray, layout: SparseLayout) -> Result<Self, MatrixError> {
        let [rows, cols] = dense.shape_2d()?;
        let data_type = dense.data_type().clone();
        if !data_type.is_numeric() {
            return Err(MatrixError::UnsupportedDataType(data_type, "sparse matrix"));
        }
        let element_size = data_type.fixed_size().unwrap_or(0);
        let bytes = dense.bytes().clone().into_fixed()?;
        let (rows, cols) = (bytes_len(rows, 1), bytes_len(cols, 1));
        let (major, minor) = match layout {
            SparseLayout::Csr => (rows, cols),
            SparseLayout::Csc => (cols, rows),
        };

        let mut data = Vec::new();
        let mut indices = Vec::new();
        let mut indptr = Vec::with_capacity(major + 1);
        indptr.push(0);
        for i in 0..major {
            for j in 0..minor {
                let position = match layout {
                    SparseLayout::Csr => i * cols + j,
                    SparseLayout::Csc => j * cols + i,
                };
                let element = &bytes[position * element_size..(position + 1) * element_size];
                if element.iter().any(|&byte| byte != 0) {
                    data.extend_from_slice(element);
                    indices.push(as_i64(j));
                }
            }
            indptr.push(as_i64(indices.len()));
        }
        Self::new(
            layout,
            dense.shape_2d()?,
            data_type,
            data,
            indices,
            indptr,
        )
    }

    /// Expand into a two dimensional dense array.
    ///
    /// Elements stored more than once at the same position are summed.
    /// Integers wrap on overflow, and booleans are combined with a logical or.
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if the dense array cannot be allocated.
    pub fn to_dense(&self) -> Result<DenseArray, MatrixError> {
        let element_size = self.element_size();
        let [rows, cols] = self.shape;
        let cols = bytes_len(cols, 1);
        let mut bytes = vec![0u8; bytes_len(rows.saturating_mul(cols as u64), element_size)];
        let mut written = vec![false; bytes_len(self.minor_len(), 1)];
        for (major, (&start, &end)) in self.indptr.iter().tuple_windows().enumerate() {
            let entries = as_index(start)..as_index(end);
            for k in entries.clone() {
                let minor = as_index(self.indices[k]);
                let position = match self.layout {
                    SparseLayout::Csr => major * cols + minor,
                    SparseLayout::Csc => minor * cols + major,
                };
                let target = &mut bytes[position * element_size..(position + 1) * element_size];
                let value = &self.data[k * element_size..(k + 1) * element_size];
                if written[minor] {
                    add_element(&self.data_type, target, value);
                } else {
                    target.copy_from_slice(value);
                    written[minor] = true;
                }
            }
            for k in entries {
                written[as_index(self.indices[k])] = false;
            }
        }
        DenseArray::new(
            self.shape.to_vec(),
            self.data_type.clone(),
            ArrayBytes::new_flen(bytes),
        )
    }
}

/// Add the element `value` to the element `target`, both encoded as `data_type`.
fn add_element(data_type: &DataType, target: &mut [u8], value: &[u8]) {
    macro_rules! add {
        ($type:ty, $op:expr) => {{
            let sum = $op(
                bytemuck::pod_read_unaligned::<$type>(target),
                bytemuck::pod_read_unaligned::<$type>(value),
            );
            target.copy_from_slice(bytemuck::bytes_of(&sum));
        }};
    }
    match data_type {
        DataType::Bool => target[0] |= value[0],
        DataType::Int8 => add!(i8, i8::wrapping_add),
        DataType::Int16 => add!(i16, i16::wrapping_add),
        DataType::Int32 => add!(i32, i32::wrapping_add),
        DataType::Int64 => add!(i64, i64::wrapping_add),
        DataType::UInt8 => add!(u8, u8::wrapping_add),
        DataType::UInt16 => add!(u16, u16::wrapping_add),
        DataType::UInt32 => add!(u32, u32::wrapping_add),
        DataType::UInt64 => add!(u64, u64::wrapping_add),
        DataType::Float32 => add!(f32, <f32 as std::ops::Add>::add),
        DataType::Float64 => add!(f64, <f64 as std::ops::Add>::add),
        DataType::String | DataType::FixedBytes(_) | DataType::Structured(_) => {
            target.copy_from_slice(value);
        }
    }
}

// Validated offsets and indices are non-negative and bounded by in-memory lengths.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn as_index(value: i64) -> usize {
    value as usize
}

#[allow(clippy::cast_possible_wrap)]
fn as_i64(value: usize) -> i64 {
    value as i64
}
