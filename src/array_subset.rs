//! Array subsets.
//!
//! An [`ArraySubset`] is widely used throughout this library when extracting a subset of data from an array.
//! It can produce convenient iterators over the indices or linearised indices of an array subset.
//!
//! [`axis_chunks`] plans the windows of a chunked conversion: consecutive slabs along one axis which together cover an array exactly once.
//!
//! This module also provides convenience functions for extracting and storing the bytes within subsets of an array.

mod iterators;

pub use iterators::{
    axis_chunks, AxisChunks, AxisChunksError, ChunksIterator, ContiguousLinearisedIndicesIterator,
    IndicesIterator,
};

use std::ops::Range;

use derive_more::Display;
use itertools::izip;
use thiserror::Error;

use crate::array::{ArrayIndices, ArrayShape};

/// An array subset.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Default)]
#[display("start {start:?} shape {shape:?}")]
pub struct ArraySubset {
    /// The start of the array subset.
    start: ArrayIndices,
    /// The shape of the array subset.
    shape: ArrayShape,
}

/// An array extract bytes error.
#[derive(Debug, Error)]
#[error("array subset {_0} is incompatible with array of shape {_1:?} and element size {_2}")]
pub struct ArrayExtractBytesError(ArraySubset, ArrayShape, usize);

/// An array store bytes error.
#[derive(Debug, Error)]
pub enum ArrayStoreBytesError {
    /// Invalid array shape.
    #[error("array shape {_1:?} is incompatible with array subset {_0}")]
    InvalidArrayShape(ArraySubset, ArrayShape),
    /// Invalid subset bytes.
    #[error("expected subset bytes to have length {_1}, got {_0}")]
    InvalidSubsetBytes(usize, usize),
    /// Invalid array bytes.
    #[error("expected array bytes to have length {_1}, got {_0}")]
    InvalidArrayBytes(usize, usize),
}

impl ArraySubset {
    /// Create a new array subset with `size` starting at the origin.
    #[must_use]
    pub fn new_with_shape(shape: ArrayShape) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape,
        }
    }

    /// Create a new array subset.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleDimensionalityError`] if the size of `start` and `size` do not match.
    pub fn new_with_start_shape(
        start: ArrayIndices,
        shape: ArrayShape,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() == shape.len() {
            Ok(Self { start, shape })
        } else {
            Err(IncompatibleDimensionalityError::new(
                start.len(),
                shape.len(),
            ))
        }
    }

    /// Create a new array subset from a list of [`Range`]s.
    ///
    /// Ranges with an end before their start are empty.
    #[must_use]
    pub fn new_with_ranges(ranges: &[Range<u64>]) -> Self {
        let start = ranges.iter().map(|range| range.start).collect();
        let shape = ranges
            .iter()
            .map(|range| range.end.saturating_sub(range.start))
            .collect();
        Self { start, shape }
    }

    /// Return the start of the array subset.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Return the shape of the array subset.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the dimensionality of the array subset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Return the end (exclusive) of the array subset.
    #[must_use]
    pub fn end_exc(&self) -> ArrayIndices {
        std::iter::zip(&self.start, &self.shape)
            .map(|(start, size)| start + size)
            .collect()
    }

    /// Return the array subset as a list of [`Range`]s.
    #[must_use]
    pub fn to_ranges(&self) -> Vec<Range<u64>> {
        std::iter::zip(&self.start, &self.shape)
            .map(|(&start, &size)| start..start + size)
            .collect()
    }

    /// Return the number of elements of the array subset.
    ///
    /// Equal to the product of the components of its shape.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Returns true if the array subset is within the bounds of `array_shape`.
    #[must_use]
    pub fn inbounds(&self, array_shape: &[u64]) -> bool {
        self.dimensionality() == array_shape.len()
            && izip!(self.start(), self.shape(), array_shape)
                .all(|(start, size, shape)| start + size <= *shape)
    }

    /// Return the intersection of this array subset with `other`, or [`None`] if they do not overlap.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleDimensionalityError`] if the dimensionality of `other` does not match.
    pub fn overlap(&self, other: &Self) -> Result<Option<Self>, IncompatibleDimensionalityError> {
        if other.dimensionality() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                other.dimensionality(),
                self.dimensionality(),
            ));
        }
        let mut start = Vec::with_capacity(self.dimensionality());
        let mut shape = Vec::with_capacity(self.dimensionality());
        for (range_a, range_b) in std::iter::zip(self.to_ranges(), other.to_ranges()) {
            let range_start = range_a.start.max(range_b.start);
            let range_end = range_a.end.min(range_b.end);
            if range_end <= range_start {
                return Ok(None);
            }
            start.push(range_start);
            shape.push(range_end - range_start);
        }
        Ok(Some(Self { start, shape }))
    }

    /// Return this array subset relative to `offset`, which must not exceed its start.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleDimensionalityError`] if the dimensionality of `offset` does not match.
    pub fn relative_to(&self, offset: &[u64]) -> Result<Self, IncompatibleDimensionalityError> {
        if offset.len() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                offset.len(),
                self.dimensionality(),
            ));
        }
        Ok(Self {
            start: std::iter::zip(&self.start, offset)
                .map(|(start, offset)| start.saturating_sub(*offset))
                .collect(),
            shape: self.shape.clone(),
        })
    }

    /// Return the bytes in this array subset from an array with shape `array_shape` and `element_size`.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayExtractBytesError`] if the length of `array_shape` does not match the array subset dimensionality, the array subset is outside of the bounds of `array_shape`, or `bytes` has the wrong length.
    pub fn extract_bytes(
        &self,
        bytes: &[u8],
        array_shape: &[u64],
        element_size: usize,
    ) -> Result<Vec<u8>, ArrayExtractBytesError> {
        let element_size_u64 = element_size as u64;
        let runs = self
            .iter_contiguous_linearised_indices(array_shape)
            .ok()
            .filter(|_| {
                bytes.len() as u64 == array_shape.iter().product::<u64>() * element_size_u64
            })
            .ok_or_else(|| {
                ArrayExtractBytesError(self.clone(), array_shape.to_vec(), element_size)
            })?;
        let mut bytes_subset = Vec::with_capacity(bytes_len(self.num_elements(), element_size));
        for (array_index, contiguous_elements) in runs {
            let byte_offset = bytes_len(array_index, element_size);
            let byte_length = bytes_len(contiguous_elements, element_size);
            bytes_subset.extend_from_slice(&bytes[byte_offset..byte_offset + byte_length]);
        }
        Ok(bytes_subset)
    }

    /// Store `bytes_subset` corresponding to the bytes of an array (`array_bytes`) with shape `array_shape` and `element_size`.
    ///
    /// # Errors
    ///
    /// Returns [`ArrayStoreBytesError`] if:
    ///  - the length of `array_shape` does not match the array subset dimensionality or the array subset is outside of the bounds of `array_shape`.
    ///  - the length of `bytes_array` is not compatible with the `array_shape` and `element size`, or
    ///  - the length of `bytes_subset` is not compatible with the shape of this subset and `element_size`.
    pub fn store_bytes(
        &self,
        bytes_subset: &[u8],
        bytes_array: &mut [u8],
        array_shape: &[u64],
        element_size: usize,
    ) -> Result<(), ArrayStoreBytesError> {
        let expected_subset_size = bytes_len(self.num_elements(), element_size);
        let expected_array_size = bytes_len(array_shape.iter().product(), element_size);
        if bytes_subset.len() != expected_subset_size {
            return Err(ArrayStoreBytesError::InvalidSubsetBytes(
                bytes_subset.len(),
                expected_subset_size,
            ));
        } else if bytes_array.len() != expected_array_size {
            return Err(ArrayStoreBytesError::InvalidArrayBytes(
                bytes_array.len(),
                expected_array_size,
            ));
        }
        let runs = self
            .iter_contiguous_linearised_indices(array_shape)
            .map_err(|err| ArrayStoreBytesError::InvalidArrayShape(err.1, err.0))?;
        let mut offset = 0;
        for (array_index, contiguous_elements) in runs {
            let byte_index = bytes_len(array_index, element_size);
            let byte_length = bytes_len(contiguous_elements, element_size);
            bytes_array[byte_index..byte_index + byte_length]
                .copy_from_slice(&bytes_subset[offset..offset + byte_length]);
            offset += byte_length;
        }
        Ok(())
    }

    /// Returns an iterator over the indices of elements within the subset.
    #[must_use]
    pub fn iter_indices(&self) -> IndicesIterator {
        IndicesIterator::new(self.clone())
    }

    /// Returns an iterator over the linearised indices of contiguous elements within the subset.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleArrayShapeError`] if the `array_shape` does not encapsulate this array subset.
    pub fn iter_contiguous_linearised_indices(
        &self,
        array_shape: &[u64],
    ) -> Result<ContiguousLinearisedIndicesIterator, IncompatibleArrayShapeError> {
        ContiguousLinearisedIndicesIterator::new(self, array_shape)
    }

    /// Returns an iterator over chunks with shape `chunk_shape` in the array subset.
    ///
    /// All chunks overlapping the array subset are returned, and they all have the same shape `chunk_shape`.
    /// Thus, the subsets of the chunks may extend out over the subset.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_shape` does not match the array subset dimensionality.
    /// Every component of `chunk_shape` must be non-zero.
    pub fn iter_chunks(
        &self,
        chunk_shape: &[u64],
    ) -> Result<ChunksIterator, IncompatibleDimensionalityError> {
        ChunksIterator::new(self, chunk_shape)
    }
}

/// The number of bytes of `num_elements` elements of `element_size`.
///
/// Saturates at [`usize::MAX`], which is never a valid allocation.
pub(crate) fn bytes_len(num_elements: u64, element_size: usize) -> usize {
    usize::try_from(num_elements)
        .ok()
        .and_then(|num_elements| num_elements.checked_mul(element_size))
        .unwrap_or(usize::MAX)
}

/// An incompatible dimensionality error.
#[derive(Copy, Clone, Debug, Error)]
#[error("incompatible dimensionality {0}, expected {1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }
}

/// An incompatible array shape error.
#[derive(Clone, Debug, Error)]
#[error("incompatible array shape {0:?} with array subset {1}")]
pub struct IncompatibleArrayShapeError(pub ArrayShape, pub ArraySubset);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_subset() {
        let subset = ArraySubset::new_with_ranges(&[1..3, 0..4]);
        assert_eq!(subset.start(), &[1, 0]);
        assert_eq!(subset.shape(), &[2, 4]);
        assert_eq!(subset.end_exc(), vec![3, 4]);
        assert_eq!(subset.num_elements(), 8);
        assert!(subset.inbounds(&[3, 4]));
        assert!(!subset.inbounds(&[2, 4]));
        assert!(ArraySubset::new_with_start_shape(vec![0], vec![1, 1]).is_err());
        assert_eq!(subset.to_string(), "start [1, 0] shape [2, 4]");
    }

    #[test]
    fn array_subset_overlap() {
        let a = ArraySubset::new_with_ranges(&[0..4, 0..4]);
        let b = ArraySubset::new_with_ranges(&[2..6, 3..5]);
        assert_eq!(
            a.overlap(&b).unwrap(),
            Some(ArraySubset::new_with_ranges(&[2..4, 3..4]))
        );
        let c = ArraySubset::new_with_ranges(&[4..6, 0..4]);
        assert_eq!(a.overlap(&c).unwrap(), None);
        assert!(a.overlap(&ArraySubset::new_with_shape(vec![1])).is_err());
        assert_eq!(
            b.relative_to(&[2, 2]).unwrap(),
            ArraySubset::new_with_ranges(&[0..4, 1..3])
        );
    }

    #[test]
    fn array_subset_bytes() {
        // 3x4 array of u8 0..12
        let array: Vec<u8> = (0..12).collect();
        let subset = ArraySubset::new_with_ranges(&[1..3, 1..3]);
        let extracted = subset.extract_bytes(&array, &[3, 4], 1).unwrap();
        assert_eq!(extracted, vec![5, 6, 9, 10]);

        let mut array_out = vec![0u8; 12];
        subset
            .store_bytes(&extracted, &mut array_out, &[3, 4], 1)
            .unwrap();
        assert_eq!(array_out, vec![0, 0, 0, 0, 0, 5, 6, 0, 0, 9, 10, 0]);

        assert!(subset.extract_bytes(&array, &[2, 4], 1).is_err());
        assert!(subset.store_bytes(&extracted, &mut [0; 11], &[3, 4], 1).is_err());
    }

    #[test]
    fn array_subset_chunks() {
        let subset = ArraySubset::new_with_ranges(&[1..5, 0..3]);
        let chunks: Vec<_> = subset.iter_chunks(&[2, 2]).unwrap().collect();
        assert_eq!(
            chunks,
            vec![
                (vec![0, 0], ArraySubset::new_with_ranges(&[0..2, 0..2])),
                (vec![0, 1], ArraySubset::new_with_ranges(&[0..2, 2..4])),
                (vec![1, 0], ArraySubset::new_with_ranges(&[2..4, 0..2])),
                (vec![1, 1], ArraySubset::new_with_ranges(&[2..4, 2..4])),
                (vec![2, 0], ArraySubset::new_with_ranges(&[4..6, 0..2])),
                (vec![2, 1], ArraySubset::new_with_ranges(&[4..6, 2..4])),
            ]
        );
        assert!(subset.iter_chunks(&[2]).is_err());
    }
}
