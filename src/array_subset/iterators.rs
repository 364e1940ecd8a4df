mod axis_chunks;
mod chunks_iterator;
mod contiguous_linearised_indices_iterator;
mod indices_iterator;

pub use axis_chunks::{axis_chunks, AxisChunks, AxisChunksError};
pub use chunks_iterator::ChunksIterator;
pub use contiguous_linearised_indices_iterator::ContiguousLinearisedIndicesIterator;
pub use indices_iterator::IndicesIterator;
