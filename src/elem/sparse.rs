use crate::{
    array::{ArrayBytes, DataType, DatasetOptions, Element},
    convert::SparseDataset,
    diagnostics::Diagnostics,
    matrix::SparseLayout,
    node::{NodeMetadata, NodePath},
    storage::{ReadableListableStorage, ReadableWritableListableStorage},
};

use super::{
    encoding_attributes, unexpected_elem, write_array, write_group, Elem, ElemEncoding, ElemError,
    ElemRegistry,
};

/// The `csr_matrix` and `csc_matrix` encodings of a sparse matrix.
///
/// The matrix is a group with a `shape` attribute and `data`, `indices` (`int64`), and `indptr` (`int64`) arrays.
#[derive(Clone, Copy, Debug)]
pub struct SparseEncoding {
    layout: SparseLayout,
}

impl SparseEncoding {
    /// Create the encoding of matrices with `layout`.
    #[must_use]
    pub const fn new(layout: SparseLayout) -> Self {
        Self { layout }
    }
}

impl ElemEncoding for SparseEncoding {
    fn encoding_type(&self) -> &'static str {
        self.layout.encoding_type()
    }

    fn encoding_version(&self) -> &'static str {
        "0.1.0"
    }

    fn encode(
        &self,
        _registry: &ElemRegistry,
        storage: &ReadableWritableListableStorage,
        path: &NodePath,
        elem: &Elem,
        options: &DatasetOptions,
    ) -> Result<(), ElemError> {
        let Elem::Sparse(matrix) = elem else {
            return Err(unexpected_elem(self, path, elem));
        };
        if matrix.layout() != self.layout {
            return Err(unexpected_elem(self, path, elem));
        }
        let mut attributes = encoding_attributes(self);
        attributes.insert("shape".to_string(), matrix.shape().to_vec().into());
        write_group(storage, path, attributes)?;

        let nnz = matrix.nnz() as u64;
        write_array(
            storage,
            &path.child("data")?,
            vec![nnz],
            matrix.data_type().clone(),
            ArrayBytes::new_flen(matrix.data()),
            options,
            serde_json::Map::new(),
        )?;
        write_array(
            storage,
            &path.child("indices")?,
            vec![nnz],
            DataType::Int64,
            i64::into_array_bytes(&DataType::Int64, matrix.indices())?,
            options,
            serde_json::Map::new(),
        )?;
        write_array(
            storage,
            &path.child("indptr")?,
            vec![matrix.indptr().len() as u64],
            DataType::Int64,
            i64::into_array_bytes(&DataType::Int64, matrix.indptr())?,
            options,
            serde_json::Map::new(),
        )
    }

    fn decode(
        &self,
        _registry: &ElemRegistry,
        storage: &ReadableListableStorage,
        path: &NodePath,
        metadata: &NodeMetadata,
        _diagnostics: &mut Diagnostics,
    ) -> Result<Elem, ElemError> {
        let dataset = SparseDataset::open(storage.clone(), path, metadata)?;
        Ok(Elem::Sparse(dataset.to_memory()?))
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, sync::Arc};

    use crate::{
        elem::{read_elem, write_elem},
        matrix::SparseMatrix,
        storage::{meta_key, store::MemoryStore, ReadableStorageTraits},
    };

    use super::*;

    #[test]
    fn sparse_layout_on_disk() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        let writable: ReadableWritableListableStorage = store.clone();
        let readable: ReadableListableStorage = store.clone();
        let path = NodePath::new("/X")?;
        let matrix = SparseMatrix::from_elements(
            SparseLayout::Csr,
            [3, 4],
            DataType::Float32,
            &[1.0f32, 2.0, 3.0],
            vec![0, 3, 1],
            vec![0, 2, 2, 3],
        )?;
        write_elem(&writable, &path, &Elem::Sparse(matrix.clone()), &DatasetOptions::default())?;

        let metadata: serde_json::Value =
            serde_json::from_slice(&store.get(&meta_key(&path))?.unwrap())?;
        assert_eq!(metadata["attributes"]["encoding-type"], "csr_matrix");
        assert_eq!(metadata["attributes"]["encoding-version"], "0.1.0");
        assert_eq!(metadata["attributes"]["shape"], serde_json::json!([3, 4]));
        let indptr: serde_json::Value =
            serde_json::from_slice(&store.get(&meta_key(&path.child("indptr")?))?.unwrap())?;
        assert_eq!(indptr["data_type"], "int64");
        assert_eq!(indptr["shape"], serde_json::json!([4]));

        let mut diagnostics = Diagnostics::new();
        assert_eq!(read_elem(&readable, &path, &mut diagnostics)?, Elem::Sparse(matrix));
        Ok(())
    }

    #[test]
    fn sparse_layout_mismatch() -> Result<(), Box<dyn Error>> {
        let store: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
        let matrix = Elem::Sparse(SparseMatrix::empty(SparseLayout::Csc, [2, 2], DataType::Float64)?);
        let encoding = SparseEncoding::new(SparseLayout::Csr);
        assert!(encoding
            .encode(
                crate::elem::default_registry(),
                &store,
                &NodePath::new("/X")?,
                &matrix,
                &DatasetOptions::default()
            )
            .is_err());
        Ok(())
    }
}
