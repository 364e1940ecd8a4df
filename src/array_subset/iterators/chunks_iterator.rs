use std::iter::FusedIterator;

use crate::{
    array::ArrayIndices,
    array_subset::{ArraySubset, IncompatibleDimensionalityError},
};

use super::IndicesIterator;

/// Iterates over the regular sized chunks overlapping this array subset.
/// All chunks have the same size, and may extend over the bounds of the array subset.
///
/// The iterator item is a ([`ArrayIndices`], [`ArraySubset`]) tuple corresponding to the chunk indices and array subset.
#[derive(Clone, Debug)]
pub struct ChunksIterator {
    inner: IndicesIterator,
    chunk_shape: Vec<u64>,
}

impl ChunksIterator {
    /// Create a new chunks iterator.
    ///
    /// Every component of `chunk_shape` must be non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleDimensionalityError`] if `chunk_shape` does not match the dimensionality of `subset`.
    pub fn new(
        subset: &ArraySubset,
        chunk_shape: &[u64],
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if subset.dimensionality() != chunk_shape.len() {
            return Err(IncompatibleDimensionalityError::new(
                chunk_shape.len(),
                subset.dimensionality(),
            ));
        }
        let subset_chunks = if subset.num_elements() == 0 {
            ArraySubset::new_with_shape(vec![0; chunk_shape.len()])
        } else {
            let ranges: Vec<_> = std::iter::zip(subset.to_ranges(), chunk_shape)
                .map(|(range, chunk_size)| {
                    range.start / chunk_size..(range.end - 1) / chunk_size + 1
                })
                .collect();
            ArraySubset::new_with_ranges(&ranges)
        };
        Ok(Self {
            inner: IndicesIterator::new(subset_chunks),
            chunk_shape: chunk_shape.to_vec(),
        })
    }
}

impl Iterator for ChunksIterator {
    type Item = (ArrayIndices, ArraySubset);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|chunk_indices| {
            let start = std::iter::zip(&chunk_indices, &self.chunk_shape)
                .map(|(i, c)| i * c)
                .collect();
            let chunk_subset = ArraySubset {
                start,
                shape: self.chunk_shape.clone(),
            };
            (chunk_indices, chunk_subset)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ChunksIterator {}

impl FusedIterator for ChunksIterator {}
