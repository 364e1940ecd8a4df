use std::sync::Arc;

use serde_json::Value;

use crate::{config::global_config, group::Attributes, node::NodePath};

use super::{Array, ArrayCreateError, ArrayMetadata, ArrayShape, Compressor, DataType, DataTypeSize};

/// Dataset creation options, passed through unchanged to every array written for a field.
///
/// Unset options fall back to the global [`Config`](crate::config::Config).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DatasetOptions {
    /// The chunk shape of new arrays. Arrays of a different dimensionality are chunked automatically.
    pub chunk_shape: Option<ArrayShape>,
    /// The compressor of new arrays.
    pub compressor: Option<Compressor>,
}

impl DatasetOptions {
    /// Set the chunk shape.
    #[must_use]
    pub fn with_chunk_shape(mut self, chunk_shape: ArrayShape) -> Self {
        self.chunk_shape = Some(chunk_shape);
        self
    }

    /// Set the compressor.
    #[must_use]
    pub fn with_compressor(mut self, compressor: Compressor) -> Self {
        self.compressor = Some(compressor);
        self
    }
}

/// An [`Array`] builder.
///
/// The array builder is initialised from an array shape and data type.
///  - The chunk shape is chosen automatically: variable length data types use a single chunk, other arrays are chunked along their first axis by the [target chunk elements](crate::config::Config#target-chunk-elements).
///  - The compressor is the global [default compressor](crate::config::Config#default-compressor).
///  - Attributes are empty.
///
/// Note that [`build`](ArrayBuilder::build) does not modify the store; the array metadata has to be explicitly written with [`Array::store_metadata`].
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # use std::sync::Arc;
/// use zarrs_anndata::array::{ArrayBuilder, Compressor, DataType};
/// use zarrs_anndata::node::NodePath;
/// # let store = Arc::new(zarrs_anndata::storage::store::MemoryStore::new());
/// let array = ArrayBuilder::new(vec![100, 50], DataType::Float32)
///     .chunk_shape(vec![10, 50])
///     .compressor(Some(Compressor::gzip(5)))
///     .attribute("encoding-type", "array")
///     .build(store.clone(), NodePath::new("/X")?)?;
/// array.store_metadata()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ArrayBuilder {
    shape: ArrayShape,
    data_type: DataType,
    chunk_shape: Option<ArrayShape>,
    compressor: Option<Option<Compressor>>,
    attributes: Attributes,
}

impl ArrayBuilder {
    /// Create a new array builder for an array of `shape` and `data_type`.
    #[must_use]
    pub fn new(shape: ArrayShape, data_type: DataType) -> Self {
        Self {
            shape,
            data_type,
            chunk_shape: None,
            compressor: None,
            attributes: Attributes::new(),
        }
    }

    /// Set the chunk shape.
    pub fn chunk_shape(&mut self, chunk_shape: ArrayShape) -> &mut Self {
        self.chunk_shape = Some(chunk_shape);
        self
    }

    /// Set the compressor. [`None`] disables compression.
    pub fn compressor(&mut self, compressor: Option<Compressor>) -> &mut Self {
        self.compressor = Some(compressor);
        self
    }

    /// Apply dataset options.
    ///
    /// A chunk shape is only applied if its dimensionality matches the array.
    pub fn options(&mut self, options: &DatasetOptions) -> &mut Self {
        if let Some(chunk_shape) = &options.chunk_shape {
            if chunk_shape.len() == self.shape.len() {
                self.chunk_shape = Some(chunk_shape.clone());
            }
        }
        if let Some(compressor) = &options.compressor {
            self.compressor = Some(Some(compressor.clone()));
        }
        self
    }

    /// Set the attributes.
    pub fn attributes(&mut self, attributes: Attributes) -> &mut Self {
        self.attributes = attributes;
        self
    }

    /// Set an attribute.
    pub fn attribute(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Build into [`ArrayMetadata`].
    #[must_use]
    pub fn build_metadata(&self) -> ArrayMetadata {
        let chunk_shape = match (&self.chunk_shape, self.data_type.size()) {
            // variable length chunks hold the whole array
            (_, DataTypeSize::Variable) => self.shape.iter().map(|&dim| dim.max(1)).collect(),
            (Some(chunk_shape), DataTypeSize::Fixed(_)) => chunk_shape.clone(),
            (None, DataTypeSize::Fixed(_)) => {
                auto_chunk_shape(&self.shape, global_config().target_chunk_elements())
            }
        };
        let compressor = self
            .compressor
            .clone()
            .unwrap_or_else(|| global_config().default_compressor().cloned());
        let mut metadata = ArrayMetadata::new(self.shape.clone(), self.data_type.clone(), chunk_shape);
        metadata.compressor = compressor;
        metadata.attributes.clone_from(&self.attributes);
        metadata
    }

    /// Build into an [`Array`].
    ///
    /// # Errors
    ///
    /// Returns [`ArrayCreateError`] if the chunk shape is not compatible with the array shape or data type.
    pub fn build<TStorage: ?Sized>(
        &self,
        storage: Arc<TStorage>,
        path: NodePath,
    ) -> Result<Array<TStorage>, ArrayCreateError> {
        Array::new_with_metadata(storage, path, self.build_metadata())
    }
}

/// Chunk `shape` along its first axis so that a chunk holds about `target_elements` elements.
fn auto_chunk_shape(shape: &[u64], target_elements: u64) -> ArrayShape {
    let Some((&rows, inner)) = shape.split_first() else {
        return vec![];
    };
    let inner: Vec<u64> = inner.iter().map(|&dim| dim.max(1)).collect();
    let inner_elements = inner.iter().product::<u64>().max(1);
    let chunk_rows = (target_elements / inner_elements).clamp(1, rows.max(1));
    std::iter::once(chunk_rows).chain(inner).collect()
}

#[cfg(test)]
mod tests {
    use crate::storage::store::MemoryStore;

    use super::*;

    #[test]
    fn array_builder_auto_chunks() {
        assert_eq!(auto_chunk_shape(&[100, 50], 1000), vec![20, 50]);
        assert_eq!(auto_chunk_shape(&[10, 50], 1 << 20), vec![10, 50]);
        assert_eq!(auto_chunk_shape(&[0, 0], 1000), vec![1, 1]);
        assert_eq!(auto_chunk_shape(&[7, 5000], 10), vec![1, 5000]);
        assert_eq!(auto_chunk_shape(&[], 10), Vec::<u64>::new());
    }

    #[test]
    fn array_builder() {
        let store = Arc::new(MemoryStore::new());
        let array = ArrayBuilder::new(vec![8, 4], DataType::Int32)
            .chunk_shape(vec![3, 4])
            .compressor(Some(Compressor::gzip(1)))
            .attribute("encoding-type", "array")
            .build(store.clone(), NodePath::new("/X").unwrap())
            .unwrap();
        assert_eq!(array.chunk_shape(), &[3, 4]);
        assert_eq!(array.compressor(), Some(&Compressor::gzip(1)));
        assert_eq!(array.string_attribute("encoding-type"), Some("array"));

        let strings = ArrayBuilder::new(vec![5], DataType::String)
            .chunk_shape(vec![2])
            .build_metadata();
        assert_eq!(strings.chunk_shape, vec![5]);
    }

    #[test]
    fn array_builder_options() {
        let options = DatasetOptions::default()
            .with_chunk_shape(vec![2, 2])
            .with_compressor(Compressor::gzip(3));
        let matrix = ArrayBuilder::new(vec![4, 4], DataType::Float64)
            .options(&options)
            .build_metadata();
        assert_eq!(matrix.chunk_shape, vec![2, 2]);
        assert_eq!(matrix.compressor, Some(Compressor::gzip(3)));

        // a chunk shape of another dimensionality is ignored
        let vector = ArrayBuilder::new(vec![4], DataType::Float64)
            .options(&options)
            .build_metadata();
        assert_eq!(vector.chunk_shape.len(), 1);
    }
}
