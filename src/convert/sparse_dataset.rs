use std::{ops::Range, sync::Arc};

use crate::{
    array::{integers_to_i64, Array, DataType},
    array_subset::ArraySubset,
    group::Attributes,
    matrix::{SparseLayout, SparseMatrix},
    node::{NodeMetadata, NodePath},
    storage::{ReadableStorageTraits, StorageIdentity},
};

use super::{ConvertError, SparseSource};

/// A sparse matrix in a store, read lazily.
///
/// The matrix is a group with `data`, `indices`, and `indptr` arrays.
/// The layout and shape are read from the `encoding-type` and `shape` attributes of the group, or the legacy `h5sparse_format` and `h5sparse_shape` attributes.
#[derive(Debug, Clone)]
pub struct SparseDataset<TStorage: ?Sized> {
    path: NodePath,
    layout: SparseLayout,
    shape: [u64; 2],
    data: Array<TStorage>,
    indices: Array<TStorage>,
    indptr: Array<TStorage>,
}

fn shape_attribute(attributes: &Attributes, name: &str) -> Option<[u64; 2]> {
    let shape = attributes.get(name)?.as_array()?;
    match shape.as_slice() {
        [rows, cols] => Some([rows.as_u64()?, cols.as_u64()?]),
        _ => None,
    }
}

/// Returns the layout and shape of a sparse matrix group from its attributes, or [`None`] if they are not present.
#[must_use]
pub(crate) fn sparse_attributes(attributes: &Attributes) -> Option<(SparseLayout, [u64; 2])> {
    let encoding = attributes
        .get("encoding-type")
        .or_else(|| attributes.get("h5sparse_format"))?
        .as_str()?;
    let layout = encoding.parse().ok()?;
    let shape =
        shape_attribute(attributes, "shape").or_else(|| shape_attribute(attributes, "h5sparse_shape"))?;
    Some((layout, shape))
}

impl<TStorage: ?Sized + ReadableStorageTraits> SparseDataset<TStorage> {
    /// Open the sparse matrix group at `path` with `metadata`.
    ///
    /// # Errors
    /// Returns a [`ConvertError`] if the node is not a sparse matrix group or its component arrays are invalid.
    pub fn open(
        storage: Arc<TStorage>,
        path: &NodePath,
        metadata: &NodeMetadata,
    ) -> Result<Self, ConvertError> {
        let invalid = |message: String| ConvertError::InvalidSparseDataset(path.clone(), message);
        let NodeMetadata::Group(group) = metadata else {
            return Err(invalid("expected a group".to_string()));
        };
        let (layout, shape) = sparse_attributes(&group.attributes)
            .ok_or_else(|| invalid("missing sparse format or shape attributes".to_string()))?;
        let component = |name: &str| -> Result<Array<TStorage>, ConvertError> {
            let child = path.child(name).map_err(|err| invalid(err.to_string()))?;
            Array::open(storage.clone(), &child).map_err(|err| invalid(format!("{name}: {err}")))
        };
        let (data, indices, indptr) = (component("data")?, component("indices")?, component("indptr")?);
        let major = shape[layout.major_axis()];
        if indptr.shape() != [major + 1].as_slice() || indices.shape() != data.shape() || data.dimensionality() != 1 {
            return Err(invalid(format!(
                "component shapes data {:?}, indices {:?}, indptr {:?} do not match a {layout} matrix with shape {shape:?}",
                data.shape(),
                indices.shape(),
                indptr.shape()
            )));
        }
        if !indices.data_type().is_integer() || !indptr.data_type().is_integer() {
            return Err(invalid("indices and indptr must be integers".to_string()));
        }
        Ok(Self {
            path: path.clone(),
            layout,
            shape,
            data,
            indices,
            indptr,
        })
    }

    /// Returns the path of the matrix group.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Returns the data array.
    #[must_use]
    pub fn data(&self) -> &Array<TStorage> {
        &self.data
    }

    /// Read the whole matrix into memory.
    ///
    /// # Errors
    /// Returns a [`ConvertError`] if a read fails or the component arrays are inconsistent.
    pub fn to_memory(&self) -> Result<SparseMatrix, ConvertError> {
        self.read_major(0..self.shape[self.layout.major_axis()])
    }

    fn read_integers(array: &Array<TStorage>, range: Range<u64>) -> Result<Vec<i64>, ConvertError> {
        let bytes = array.retrieve_array_subset(&ArraySubset::new_with_ranges(&[range]))?;
        Ok(integers_to_i64(array.data_type(), bytes)?)
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> SparseSource for SparseDataset<TStorage> {
    fn layout(&self) -> SparseLayout {
        self.layout
    }

    fn shape(&self) -> [u64; 2] {
        self.shape
    }

    fn data_type(&self) -> &DataType {
        self.data.data_type()
    }

    fn read_major(&self, range: Range<u64>) -> Result<SparseMatrix, ConvertError> {
        if range.start > range.end || range.end > self.shape[self.layout.major_axis()] {
            return Err(ConvertError::InvalidSparseDataset(
                self.path.clone(),
                format!("major axis range {range:?} is out of bounds"),
            ));
        }
        let indptr = Self::read_integers(&self.indptr, range.start..range.end + 1)?;
        let (first, last) = match (indptr.first(), indptr.last()) {
            (Some(&first), Some(&last)) if 0 <= first && first <= last => (first, last),
            _ => {
                return Err(ConvertError::InvalidSparseDataset(
                    self.path.clone(),
                    format!("invalid indptr {indptr:?}"),
                ))
            }
        };
        let elements = first.unsigned_abs()..last.unsigned_abs();
        if elements.end > self.data.shape()[0] {
            return Err(ConvertError::InvalidSparseDataset(
                self.path.clone(),
                format!("indptr {last} exceeds the number of stored elements"),
            ));
        }
        let data = self
            .data
            .retrieve_array_subset(&ArraySubset::new_with_ranges(&[elements.clone()]))?
            .into_fixed()?
            .into_owned();
        let indices = Self::read_integers(&self.indices, elements)?;
        let mut shape = self.shape;
        shape[self.layout.major_axis()] = range.end - range.start;
        Ok(SparseMatrix::new(
            self.layout,
            shape,
            self.data.data_type().clone(),
            data,
            indices,
            indptr.iter().map(|ptr| ptr - first).collect(),
        )?)
    }

    fn storage_identity(&self) -> Option<StorageIdentity> {
        Some(self.data.storage().storage_identity())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::{
        array::{ArrayBuilder, Element},
        group::GroupBuilder,
        storage::store::MemoryStore,
    };

    use super::*;

    fn write_component<T: Element>(
        store: &Arc<MemoryStore>,
        path: &str,
        data_type: DataType,
        elements: &[T],
    ) -> Result<(), Box<dyn Error>> {
        let array = ArrayBuilder::new(vec![elements.len() as u64], data_type)
            .chunk_shape(vec![2])
            .build(store.clone(), NodePath::new(path)?)?;
        array.store_metadata()?;
        array.store_elements(elements)?;
        Ok(())
    }

    #[test]
    fn sparse_dataset_legacy_attributes() -> Result<(), Box<dyn Error>> {
        // [[0, 1], [2, 3], [0, 0]] with int32 indices
        let store = Arc::new(MemoryStore::new());
        GroupBuilder::new()
            .attribute("h5sparse_format", "csr")
            .attribute("h5sparse_shape", serde_json::json!([3, 2]))
            .build(store.clone(), NodePath::new("/X")?)
            .store_metadata()?;
        write_component(&store, "/X/data", DataType::Float64, &[1.0f64, 2.0, 3.0])?;
        write_component(&store, "/X/indices", DataType::Int32, &[1i32, 0, 1])?;
        write_component(&store, "/X/indptr", DataType::Int32, &[0i32, 1, 3, 3])?;

        let path = NodePath::new("/X")?;
        let metadata = crate::node::retrieve_node_metadata(&*store, &path)?.unwrap();
        let dataset = SparseDataset::open(store.clone(), &path, &metadata)?;
        assert_eq!(dataset.shape(), [3, 2]);
        assert_eq!(dataset.layout(), SparseLayout::Csr);

        let rows = dataset.read_major(1..3)?;
        assert_eq!(rows.indptr(), &[0, 2, 2]);
        assert_eq!(rows.indices(), &[0, 1]);
        assert_eq!(rows.data_elements::<f64>()?, vec![2.0, 3.0]);
        assert_eq!(
            dataset.to_memory()?.to_dense()?.elements::<f64>()?,
            vec![0.0, 1.0, 2.0, 3.0, 0.0, 0.0]
        );
        assert!(dataset.read_major(2..4).is_err());
        Ok(())
    }

    #[test]
    fn sparse_dataset_missing_component() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        GroupBuilder::new()
            .attribute("encoding-type", "csc_matrix")
            .attribute("shape", serde_json::json!([2, 2]))
            .build(store.clone(), NodePath::new("/X")?)
            .store_metadata()?;
        write_component(&store, "/X/data", DataType::Float32, &[1.0f32])?;
        let path = NodePath::new("/X")?;
        let metadata = crate::node::retrieve_node_metadata(&*store, &path)?.unwrap();
        assert!(matches!(
            SparseDataset::open(store, &path, &metadata),
            Err(ConvertError::InvalidSparseDataset(..))
        ));
        Ok(())
    }
}
