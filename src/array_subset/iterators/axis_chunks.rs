use std::{iter::FusedIterator, ops::Range};

use thiserror::Error;

use crate::array_subset::ArraySubset;

/// An invalid [`axis_chunks`] request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AxisChunksError {
    /// The chunk size is zero.
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,
    /// The axis does not exist.
    #[error("axis {axis} is out of range for an array with {dimensionality} dimensions")]
    AxisOutOfRange {
        /// The requested axis.
        axis: usize,
        /// The dimensionality of the shape.
        dimensionality: usize,
    },
}

/// Plan the windows of a chunked pass over an array of `shape` along `axis`.
///
/// Each window is an [`ArraySubset`] spanning `chunk_size` consecutive positions along `axis` (fewer for the final window) and the full extent of every other axis.
/// Windows are ordered by increasing start and cover `0..shape[axis]` without gaps or overlaps.
/// An axis of length zero produces no windows.
///
/// The plan is a pure function of its arguments, so a pass is restarted by calling [`axis_chunks`] again.
///
/// # Errors
///
/// Returns [`AxisChunksError`] if `chunk_size` is zero or `axis` is out of range.
pub fn axis_chunks(
    shape: &[u64],
    axis: usize,
    chunk_size: u64,
) -> Result<AxisChunks, AxisChunksError> {
    if chunk_size == 0 {
        return Err(AxisChunksError::ZeroChunkSize);
    }
    if axis >= shape.len() {
        return Err(AxisChunksError::AxisOutOfRange {
            axis,
            dimensionality: shape.len(),
        });
    }
    Ok(AxisChunks {
        shape: shape.to_vec(),
        axis,
        chunk_size,
        position: 0,
    })
}

/// The windows of a chunked pass along one axis, see [`axis_chunks`].
#[derive(Clone, Debug)]
pub struct AxisChunks {
    shape: Vec<u64>,
    axis: usize,
    chunk_size: u64,
    position: u64,
}

impl AxisChunks {
    /// Return the axis being chunked.
    #[must_use]
    pub fn axis(&self) -> usize {
        self.axis
    }

    /// Return the chunk size.
    #[must_use]
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Return the ranges along the chunked axis of the remaining windows.
    pub fn ranges(self) -> impl Iterator<Item = Range<u64>> {
        let axis = self.axis;
        self.map(move |window| window.to_ranges().swap_remove(axis))
    }
}

impl Iterator for AxisChunks {
    type Item = ArraySubset;

    fn next(&mut self) -> Option<Self::Item> {
        let length = self.shape[self.axis];
        if self.position >= length {
            return None;
        }
        let start = self.position;
        let end = start.saturating_add(self.chunk_size).min(length);
        self.position = end;
        let ranges: Vec<Range<u64>> = self
            .shape
            .iter()
            .enumerate()
            .map(|(axis, &size)| if axis == self.axis { start..end } else { 0..size })
            .collect();
        Some(ArraySubset::new_with_ranges(&ranges))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.shape[self.axis].saturating_sub(self.position);
        let windows = usize::try_from(remaining.div_ceil(self.chunk_size)).unwrap_or(usize::MAX);
        (windows, Some(windows))
    }
}

impl ExactSizeIterator for AxisChunks {}

impl FusedIterator for AxisChunks {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_chunks_rows() {
        let windows: Vec<_> = axis_chunks(&[5, 3], 0, 2).unwrap().collect();
        assert_eq!(
            windows,
            vec![
                ArraySubset::new_with_ranges(&[0..2, 0..3]),
                ArraySubset::new_with_ranges(&[2..4, 0..3]),
                ArraySubset::new_with_ranges(&[4..5, 0..3]),
            ]
        );
    }

    #[test]
    fn axis_chunks_columns() {
        let chunks = axis_chunks(&[4, 7], 1, 3).unwrap();
        assert_eq!(chunks.len(), 3);
        let ranges: Vec<_> = chunks.ranges().collect();
        assert_eq!(ranges, vec![0..3, 3..6, 6..7]);
    }

    #[test]
    fn axis_chunks_coverage() {
        for n in 0..40u64 {
            for chunk_size in 1..=n + 2 {
                let chunks = axis_chunks(&[n, 2], 0, chunk_size).unwrap();
                let expected = usize::try_from(n.div_ceil(chunk_size)).unwrap();
                assert_eq!(chunks.len(), expected);
                let mut next_start = 0;
                for range in chunks.ranges() {
                    assert_eq!(range.start, next_start);
                    assert!(range.end > range.start);
                    assert!(range.end - range.start <= chunk_size);
                    next_start = range.end;
                }
                assert_eq!(next_start, n);
            }
        }
    }

    #[test]
    fn axis_chunks_restartable() {
        let first: Vec<_> = axis_chunks(&[10, 10], 1, 4).unwrap().collect();
        let second: Vec<_> = axis_chunks(&[10, 10], 1, 4).unwrap().collect();
        assert_eq!(first, second);
        let mut chunks = axis_chunks(&[1, 1], 0, 1).unwrap();
        assert!(chunks.next().is_some());
        assert!(chunks.next().is_none());
        assert!(chunks.next().is_none());
    }

    #[test]
    fn axis_chunks_invalid() {
        assert_eq!(
            axis_chunks(&[4, 4], 0, 0).unwrap_err(),
            AxisChunksError::ZeroChunkSize
        );
        assert_eq!(
            axis_chunks(&[4, 4], 2, 1).unwrap_err(),
            AxisChunksError::AxisOutOfRange {
                axis: 2,
                dimensionality: 2
            }
        );
    }
}
