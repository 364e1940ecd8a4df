use crate::{
    anndata::{AnnData, AnnDataError, BackedMatrix, DataFrame, Matrix, Raw},
    array::{ArrayBuilder, DatasetOptions},
    convert::{sparse_to_dense, SparseSource},
    elem::{default_registry, encoding_attributes, write_group, ArrayEncoding, Elem, ElemRegistry},
    group::{Attributes, GroupMetadata},
    legacy::RawLayout,
    node::{retrieve_node_metadata, NodeMetadata, NodePath},
    overwrite::write_guarded,
    storage::{create_group, erase_node, ReadableStorageTraits, ReadableWritableListableStorage},
};

use super::{MatrixField, ANNDATA_ENCODING_TYPE, ANNDATA_ENCODING_VERSION};

const RAW_ENCODING_TYPE: &str = "raw";
const RAW_ENCODING_VERSION: &str = "0.1.0";

/// Writes the fields of one container to a store.
struct FieldWriter<'a> {
    registry: &'a ElemRegistry,
    storage: &'a ReadableWritableListableStorage,
    options: &'a DatasetOptions,
    chunk_size: u64,
}

impl FieldWriter<'_> {
    fn path(key: &str) -> Result<NodePath, AnnDataError> {
        Ok(NodePath::new(&format!("/{key}"))?)
    }

    fn write_elem(&self, key: &str, elem: &Elem) -> Result<(), AnnDataError> {
        self.try_write_elem(key, elem)
            .map_err(|err| err.at_key(key, "writing"))
    }

    fn try_write_elem(&self, key: &str, elem: &Elem) -> Result<(), AnnDataError> {
        let path = Self::path(key)?;
        tracing::debug!("writing {} to {path}", elem.encoding_type());
        self.registry
            .write_elem(self.storage, &path, elem, self.options)?;
        Ok(())
    }

    /// Write the sparse `source` as a dense array at `key`.
    ///
    /// The node at `key` is replaced through an overwrite guard, so a source read from the same node stays intact until the dense array is complete.
    fn write_densified(
        &self,
        key: &str,
        source: &(impl SparseSource + ?Sized),
    ) -> Result<(), AnnDataError> {
        self.try_write_densified(key, source)
            .map_err(|err| err.at_key(key, "writing"))
    }

    fn try_write_densified(
        &self,
        key: &str,
        source: &(impl SparseSource + ?Sized),
    ) -> Result<(), AnnDataError> {
        let path = Self::path(key)?;
        let identity = source.storage_identity();
        tracing::debug!(
            "writing {} {:?} to {path} dense in windows of {}",
            source.layout(),
            source.shape(),
            self.chunk_size
        );
        write_guarded(self.storage, &path, identity.as_ref(), |write_path| {
            let array = ArrayBuilder::new(source.shape().to_vec(), source.data_type().clone())
                .options(self.options)
                .attributes(encoding_attributes(&ArrayEncoding))
                .build(self.storage.clone(), write_path.clone())?;
            array.store_metadata()?;
            sparse_to_dense(source, &array, self.chunk_size)?;
            Ok::<_, AnnDataError>(())
        })
    }

    fn write_matrix(&self, key: &str, matrix: &Matrix, dense: bool) -> Result<(), AnnDataError> {
        match matrix {
            Matrix::Sparse(sparse) if dense => self.write_densified(key, sparse),
            Matrix::Sparse(sparse) => self.write_elem(key, &Elem::Sparse(sparse.clone())),
            Matrix::Dense(array) => self.write_elem(key, &Elem::Array(array.clone())),
        }
    }

    /// Write the primary matrix of a backed container which has not been loaded.
    fn write_backed_x(
        &self,
        adata: &AnnData,
        same_store: bool,
        dense: bool,
    ) -> Result<(), AnnDataError> {
        if adata.x_data_type().is_none() {
            tracing::debug!("skipping X, the backing store has no primary matrix");
            return Ok(());
        }
        if same_store && !dense {
            tracing::debug!("skipping X, it is already in the backing store");
            return Ok(());
        }
        let backed = adata.backed_x()?;
        match backed {
            BackedMatrix::Sparse(sparse) if dense => self.write_densified("X", &sparse),
            BackedMatrix::Dense(_) if same_store => {
                tracing::debug!("skipping X, it is already dense in the backing store");
                Ok(())
            }
            backed => {
                let matrix = backed
                    .to_matrix()
                    .map_err(|err| err.at_key("X", "writing"))?;
                self.write_elem("X", &matrix.into())
            }
        }
    }

    fn write_raw(&self, raw: &Raw, var: &DataFrame, dense: bool) -> Result<(), AnnDataError> {
        let mut attributes = Attributes::new();
        attributes.insert("encoding-type".to_string(), RAW_ENCODING_TYPE.into());
        attributes.insert("encoding-version".to_string(), RAW_ENCODING_VERSION.into());
        write_group(self.storage, &Self::path("raw")?, attributes)
            .map_err(|err| AnnDataError::from(err).at_key("raw", "writing"))?;
        if let Some(x) = raw.x() {
            self.write_matrix("raw/X", x, dense)?;
        }
        self.write_elem("raw/var", &Elem::DataFrame(var.clone()))?;
        self.write_elem("raw/varm", &Elem::Mapping(raw.varm().clone()))
    }

    /// Erase raw snapshot nodes of either layout.
    fn erase_raw(&self) -> Result<(), AnnDataError> {
        let root = NodePath::root();
        for layout in [RawLayout::Subtree, RawLayout::Dotted] {
            let paths = [
                layout.x_path(&root)?,
                layout.var_path(&root)?,
                layout.varm_path(&root)?,
            ];
            for path in paths.into_iter().flatten() {
                erase_node(&**self.storage, &path)
                    .map_err(|err| AnnDataError::from(err).at_key(path.key(), "erasing"))?;
            }
        }
        erase_node(&**self.storage, &Self::path("raw")?)
            .map_err(|err| AnnDataError::from(err).at_key("raw", "erasing"))
    }
}

/// Set the container `encoding-type` and `encoding-version` of the root group, keeping existing values.
fn write_root_attributes(storage: &ReadableWritableListableStorage) -> Result<(), AnnDataError> {
    let root = NodePath::root();
    let mut attributes = match retrieve_node_metadata(&**storage, &root)? {
        Some(NodeMetadata::Group(group)) => group.attributes,
        Some(NodeMetadata::Array(_)) | None => Attributes::new(),
    };
    attributes
        .entry("encoding-type")
        .or_insert_with(|| ANNDATA_ENCODING_TYPE.into());
    attributes
        .entry("encoding-version")
        .or_insert_with(|| ANNDATA_ENCODING_VERSION.into());
    create_group(&**storage, &root, &GroupMetadata::new(attributes))?;
    Ok(())
}

/// Write `adata` to the root of `storage`.
///
/// The fields are written in the order `X`, `raw`, `obs`, `var`, `obsm`, `varm`, `obsp`, `varp`, `layers`, `uns`.
/// String columns of `obs`, `var` and `raw/var` with repeated values are written as categoricals.
///
/// A container which is not backed replaces the whole content of the store.
/// A backed container replaces each of its fields in the store, and its primary matrix is only rewritten if it is written to a different store or densified.
///
/// A failure while writing a field leaves the fields before it written.
///
/// # Errors
/// Returns an [`AnnDataError`]:
///  - [`Configuration`](crate::anndata::ErrorKind::Configuration), before anything is written, if `options` name an unknown field or densify `raw/X` of a container without a raw matrix, or
///  - annotated with the key of the field that failed to be written.
pub fn write_anndata(
    adata: &AnnData,
    storage: &ReadableWritableListableStorage,
    options: &super::WriteOptions,
) -> Result<(), AnnDataError> {
    let dense_fields = options.resolve_dense_fields(adata)?;
    let chunk_size = options.resolve_chunk_size()?;

    let mut obs = adata.obs().clone();
    obs.strings_to_categoricals();
    let mut var = adata.var().clone();
    var.strings_to_categoricals();
    let raw_var = adata.raw().map(|raw| {
        let mut var = raw.var().clone();
        var.strings_to_categoricals();
        var
    });

    let same_store = adata
        .backing()
        .is_some_and(|backing| *backing.identity() == storage.storage_identity());
    if adata.is_backed() {
        tracing::debug!(
            "updating the fields of a backed container in {}",
            storage.storage_identity()
        );
    } else {
        tracing::debug!("truncating {}", storage.storage_identity());
        erase_node(&**storage, &NodePath::root())?;
    }
    write_root_attributes(storage)?;

    let writer = FieldWriter {
        registry: default_registry(),
        storage,
        options: options.get_dataset_options(),
        chunk_size,
    };

    let dense_x = dense_fields.contains(&MatrixField::X);
    match adata.x() {
        Some(x) => writer.write_matrix("X", x, dense_x)?,
        None if adata.is_backed() => writer.write_backed_x(adata, same_store, dense_x)?,
        None => {}
    }

    writer.erase_raw()?;
    if let (Some(raw), Some(raw_var)) = (adata.raw(), &raw_var) {
        writer.write_raw(raw, raw_var, dense_fields.contains(&MatrixField::RawX))?;
    }

    writer.write_elem("obs", &Elem::DataFrame(obs))?;
    writer.write_elem("var", &Elem::DataFrame(var))?;
    for (key, mapping) in [
        ("obsm", adata.obsm()),
        ("varm", adata.varm()),
        ("obsp", adata.obsp()),
        ("varp", adata.varp()),
        ("layers", adata.layers()),
        ("uns", adata.uns()),
    ] {
        writer.write_elem(key, &Elem::Mapping(mapping.clone()))?;
    }
    Ok(())
}
