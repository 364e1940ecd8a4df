use std::collections::{BTreeSet, HashSet};

use crate::{
    anndata::{
        AnnData, AnnDataError, AnnDataFields, Backing, BackingStorage, ContainerError, DataFrame,
        Matrix, Raw,
    },
    array::DataType,
    convert::{dense_to_sparse, sparse_attributes},
    diagnostics::{CompatibilityWarning, Diagnostics},
    elem::{default_registry, open_array, Elem, ElemError, ElemRegistry, Mapping},
    legacy::{clean_uns, RawLayout},
    matrix::SparseLayout,
    node::{retrieve_node_metadata, NodeMetadata, NodePath},
    storage::{discover_children, node_exists, ReadableListableStorage},
};

use super::{MatrixField, ReadOptions, ANNDATA_ENCODING_TYPE, ANNDATA_ENCODING_VERSION};

/// The root children holding container fields, other than the raw snapshot.
const FIELD_NAMES: [&str; 9] = [
    "X", "obs", "var", "obsm", "varm", "obsp", "varp", "layers", "uns",
];

/// A container read from a store, with the compatibility warnings raised while reading it.
#[derive(Debug)]
pub struct ReadOutcome {
    /// The container.
    pub adata: AnnData,
    /// The legacy layouts resolved while reading, one warning per node.
    pub warnings: Vec<CompatibilityWarning>,
}

/// Reads the fields of one container from a store.
struct FieldReader<'a> {
    registry: &'a ElemRegistry,
    storage: &'a ReadableListableStorage,
    sparse_fields: BTreeSet<MatrixField>,
    layout: SparseLayout,
    chunk_size: u64,
}

fn annotate(path: &NodePath) -> impl FnOnce(AnnDataError) -> AnnDataError + '_ {
    move |err| err.at_key(path.key(), "reading")
}

fn invalid_field(path: &NodePath, elem: &Elem) -> AnnDataError {
    ContainerError::InvalidElement {
        field: path.key().to_string(),
        encoding_type: elem.encoding_type(),
    }
    .into()
}

impl FieldReader<'_> {
    fn read_elem(
        &self,
        path: &NodePath,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<Elem>, AnnDataError> {
        if !node_exists(&**self.storage, path)? {
            return Ok(None);
        }
        tracing::debug!("reading {path}");
        Ok(Some(self.registry.read_elem(self.storage, path, diagnostics)?))
    }

    fn read_dataframe(
        &self,
        path: &NodePath,
        diagnostics: &mut Diagnostics,
    ) -> Result<DataFrame, AnnDataError> {
        match self.read_elem(path, diagnostics).map_err(annotate(path))? {
            None => Ok(DataFrame::default()),
            Some(Elem::DataFrame(df)) => Ok(df),
            Some(elem) => Err(invalid_field(path, &elem)),
        }
    }

    fn read_mapping(
        &self,
        path: &NodePath,
        diagnostics: &mut Diagnostics,
    ) -> Result<Mapping, AnnDataError> {
        match self.read_elem(path, diagnostics).map_err(annotate(path))? {
            None => Ok(Mapping::new()),
            Some(Elem::Mapping(mapping)) => Ok(mapping),
            Some(elem) => Err(invalid_field(path, &elem)),
        }
    }

    fn read_matrix(
        &self,
        field: MatrixField,
        path: &NodePath,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<Matrix>, AnnDataError> {
        self.try_read_matrix(field, path, diagnostics)
            .map_err(annotate(path))
    }

    fn try_read_matrix(
        &self,
        field: MatrixField,
        path: &NodePath,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<Matrix>, AnnDataError> {
        let Some(metadata) = retrieve_node_metadata(&**self.storage, path)? else {
            return Ok(None);
        };
        if self.sparse_fields.contains(&field) {
            if let NodeMetadata::Array(_) = metadata {
                let array = open_array(self.storage, path)?;
                tracing::debug!("reading dense {path} as {}", self.layout);
                let sparse = dense_to_sparse(&array, self.chunk_size, self.layout)?;
                return Ok(Some(Matrix::Sparse(sparse)));
            }
            tracing::debug!("{path} is already sparse");
        }
        let elem = self.registry.read_elem(self.storage, path, diagnostics)?;
        Ok(Some(Matrix::from_elem(path.key(), elem)?))
    }

    fn read_raw(&self, diagnostics: &mut Diagnostics) -> Result<Option<Raw>, AnnDataError> {
        let root = NodePath::root();
        let raw_path = root.child("raw")?;
        let layout = RawLayout::detect(&**self.storage, &root, diagnostics)
            .map_err(|err| AnnDataError::from(err).at_key(raw_path.key(), "reading"))?;
        let (Some(x_path), Some(var_path), Some(varm_path)) = (
            layout.x_path(&root)?,
            layout.var_path(&root)?,
            layout.varm_path(&root)?,
        ) else {
            return Ok(None);
        };
        let x = self.read_matrix(MatrixField::RawX, &x_path, diagnostics)?;
        let var = self.read_dataframe(&var_path, diagnostics)?;
        let varm = self.read_mapping(&varm_path, diagnostics)?;
        let raw = Raw::new(x, var, varm)
            .map_err(|err| AnnDataError::from(err).at_key(raw_path.key(), "reading"))?;
        Ok(Some(raw))
    }

    /// Read every field except the primary matrix.
    fn read_fields(&self, diagnostics: &mut Diagnostics) -> Result<AnnDataFields, AnnDataError> {
        let root = NodePath::root();
        let path = |name: &str| root.child(name);
        let mut obs = self.read_dataframe(&path("obs")?, diagnostics)?;
        let mut var = self.read_dataframe(&path("var")?, diagnostics)?;
        let obsm = self.read_mapping(&path("obsm")?, diagnostics)?;
        let varm = self.read_mapping(&path("varm")?, diagnostics)?;
        let obsp = self.read_mapping(&path("obsp")?, diagnostics)?;
        let varp = self.read_mapping(&path("varp")?, diagnostics)?;
        let layers = self.read_mapping(&path("layers")?, diagnostics)?;
        let mut uns = self.read_mapping(&path("uns")?, diagnostics)?;
        let raw = self.read_raw(diagnostics)?;
        clean_uns(&mut uns, &mut obs, &mut var, diagnostics);
        Ok(AnnDataFields {
            x: None,
            obs,
            var,
            obsm,
            varm,
            obsp,
            varp,
            layers,
            uns,
            raw,
            backing: None,
        })
    }
}

/// Check the container attributes of the root group, and warn about root children which are not fields.
fn check_root(
    storage: &ReadableListableStorage,
    diagnostics: &mut Diagnostics,
) -> Result<(), AnnDataError> {
    let root = NodePath::root();
    let metadata = retrieve_node_metadata(&**storage, &root)?
        .ok_or_else(|| ElemError::Missing(root.clone()))?;
    match metadata.string_attribute("encoding-type") {
        None => diagnostics.warn(root.as_str(), "container root without an encoding-type"),
        Some(ANNDATA_ENCODING_TYPE) => match metadata.string_attribute("encoding-version") {
            None => diagnostics.warn(root.as_str(), "container root without an encoding-version"),
            Some(ANNDATA_ENCODING_VERSION) => {}
            Some(version) => {
                return Err(ElemError::UnsupportedVersion {
                    path: root,
                    encoding_type: ANNDATA_ENCODING_TYPE.to_string(),
                    version: version.to_string(),
                }
                .into());
            }
        },
        Some(encoding_type) => {
            return Err(ElemError::UnknownEncoding {
                path: root,
                encoding_type: encoding_type.to_string(),
            }
            .into());
        }
    }

    let known: HashSet<&str> = FIELD_NAMES.into_iter().collect();
    for prefix in discover_children(&**storage, &root)? {
        let child = NodePath::try_from(&prefix)?;
        let name = child.name();
        if known.contains(name) || RawLayout::is_raw_name(name) {
            continue;
        }
        if name.starts_with('_') {
            diagnostics.warn(
                child.key(),
                "ignored a temporary node left by an interrupted overwrite",
            );
        } else {
            diagnostics.warn(child.key(), "ignored a node which is not a container field");
        }
    }
    Ok(())
}

fn field_reader<'a>(
    storage: &'a ReadableListableStorage,
    options: &ReadOptions,
) -> Result<FieldReader<'a>, AnnDataError> {
    Ok(FieldReader {
        registry: default_registry(),
        storage,
        sparse_fields: options.resolve_sparse_fields()?,
        layout: options.resolve_layout()?,
        chunk_size: options.resolve_chunk_size()?,
    })
}

/// Read a container from the root of `storage` into memory.
///
/// Dense primary or raw matrices named by [`ReadOptions::as_sparse`] are compressed one window at a time.
/// Legacy layouts are resolved and reported as [`CompatibilityWarning`]s in the outcome.
///
/// # Errors
/// Returns an [`AnnDataError`]:
///  - [`Configuration`](crate::anndata::ErrorKind::Configuration), before anything is read, if `options` are invalid,
///  - [`Format`](crate::anndata::ErrorKind::Format) if the root is missing or is not a supported container, or
///  - annotated with the key of the field that failed to be read.
pub fn read_anndata(
    storage: &ReadableListableStorage,
    options: &ReadOptions,
) -> Result<ReadOutcome, AnnDataError> {
    let reader = field_reader(storage, options)?;
    let mut diagnostics = Diagnostics::new();
    check_root(storage, &mut diagnostics)?;
    let x = reader.read_matrix(MatrixField::X, &NodePath::root().child("X")?, &mut diagnostics)?;
    let fields = AnnDataFields {
        x,
        ..reader.read_fields(&mut diagnostics)?
    };
    let adata = AnnData::from_fields(fields)?;
    Ok(ReadOutcome {
        adata,
        warnings: diagnostics.into_warnings(),
    })
}

/// Returns the shape and data type of the primary matrix at `path` without reading its values.
fn probe_matrix(
    storage: &ReadableListableStorage,
    path: &NodePath,
) -> Result<Option<([u64; 2], DataType)>, AnnDataError> {
    let Some(metadata) = retrieve_node_metadata(&**storage, path)? else {
        return Ok(None);
    };
    match metadata {
        NodeMetadata::Group(group) => {
            let (_, shape) = sparse_attributes(&group.attributes).ok_or_else(|| {
                ElemError::Invalid(path.clone(), "a group which is not a sparse matrix".to_string())
            })?;
            let data = open_array(storage, &path.child("data")?)?;
            Ok(Some((shape, data.data_type().clone())))
        }
        NodeMetadata::Array(array) => match array.shape[..] {
            [n_obs, n_vars] => Ok(Some(([n_obs, n_vars], array.data_type))),
            _ => Err(ElemError::Invalid(
                path.clone(),
                format!("a matrix with shape {:?}", array.shape),
            )
            .into()),
        },
    }
}

/// Read a container from the root of `storage`, leaving the primary matrix in the store.
///
/// The returned container holds `storage` as its [`Backing`], and its primary matrix is opened on demand with [`AnnData::backed_x`].
/// Only the shape and data type of the primary matrix are read.
/// A request to read the primary matrix as sparse is ignored.
///
/// # Errors
/// See [`read_anndata`].
pub fn read_anndata_backed(
    storage: impl Into<BackingStorage>,
    options: &ReadOptions,
) -> Result<ReadOutcome, AnnDataError> {
    let storage = storage.into();
    let readable = storage.readable();
    let reader = field_reader(&readable, options)?;
    if reader.sparse_fields.contains(&MatrixField::X) {
        tracing::warn!("the primary matrix of a backed container is not read, ignoring as_sparse X");
    }
    let mut diagnostics = Diagnostics::new();
    check_root(&readable, &mut diagnostics)?;

    let x_path = NodePath::root().child("X")?;
    let probe = probe_matrix(&readable, &x_path).map_err(annotate(&x_path))?;
    let mut fields = reader.read_fields(&mut diagnostics)?;
    let x_data_type = match probe {
        Some((shape, data_type)) => {
            let [n_obs, n_vars] = shape;
            if fields.obs.is_empty() && fields.obs.n_rows() == 0 {
                fields.obs = DataFrame::with_default_index(n_obs);
            }
            if fields.var.is_empty() && fields.var.n_rows() == 0 {
                fields.var = DataFrame::with_default_index(n_vars);
            }
            if [fields.obs.n_rows(), fields.var.n_rows()] != [n_obs, n_vars] {
                return Err(AnnDataError::from(ContainerError::IncompatibleShape {
                    field: x_path.key().to_string(),
                    shape: shape.to_vec(),
                    expected: format!(
                        "[{}, {}] (obs, var)",
                        fields.obs.n_rows(),
                        fields.var.n_rows()
                    ),
                }));
            }
            tracing::debug!("backed {} {shape:?} {data_type}", x_path);
            Some(data_type)
        }
        None => None,
    };
    fields.backing = Some(Backing::new(storage, x_data_type));
    let adata = AnnData::from_fields(fields)?;
    Ok(ReadOutcome {
        adata,
        warnings: diagnostics.into_warnings(),
    })
}

#[cfg(test)]
mod tests {
    use std::{error::Error, sync::Arc};

    use crate::{
        anndata::{BackedMode, ErrorKind},
        array::DatasetOptions,
        elem::write_elem,
        group::{Attributes, GroupMetadata},
        io::{write_anndata, WriteOptions},
        matrix::{DenseArray, SparseMatrix},
        storage::{create_group, store::MemoryStore, ReadableWritableListableStorage},
    };

    use super::*;

    fn stores() -> (ReadableWritableListableStorage, ReadableListableStorage) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), store)
    }

    fn dense_x() -> Result<DenseArray, Box<dyn Error>> {
        Ok(DenseArray::from_elements(
            vec![3, 2],
            DataType::Int64,
            &[0i64, 4, 0, 0, 5, 6],
        )?)
    }

    fn root_attributes(encoding_type: &str, encoding_version: &str) -> GroupMetadata {
        let mut attributes = Attributes::new();
        attributes.insert("encoding-type".to_string(), encoding_type.into());
        attributes.insert("encoding-version".to_string(), encoding_version.into());
        GroupMetadata::new(attributes)
    }

    #[test]
    fn read_dense_as_sparse() -> Result<(), Box<dyn Error>> {
        let (writable, readable) = stores();
        let adata = AnnData::new(dense_x()?)?;
        write_anndata(&adata, &writable, &WriteOptions::new())?;

        let outcome = read_anndata(&readable, &ReadOptions::new())?;
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.adata.x(), adata.x());
        assert_eq!(outcome.adata.obs(), adata.obs());

        for layout in ["csr", "csc"] {
            let options = ReadOptions::new()
                .as_sparse(["X"])
                .as_sparse_layout(layout)
                .chunk_size(2);
            let outcome = read_anndata(&readable, &options)?;
            let Some(Matrix::Sparse(x)) = outcome.adata.x() else {
                panic!("expected a sparse X");
            };
            assert_eq!(x.layout().to_string(), layout);
            assert_eq!(x.to_dense()?, dense_x()?);
        }
        Ok(())
    }

    #[test]
    fn read_root_checks() -> Result<(), Box<dyn Error>> {
        let (writable, readable) = stores();
        let err = read_anndata(&readable, &ReadOptions::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        let root = NodePath::root();
        create_group(&*writable, &root, &root_attributes("anndata", "0.2.0"))?;
        let err = read_anndata(&readable, &ReadOptions::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        create_group(&*writable, &root, &root_attributes("mudata", "0.1.0"))?;
        let err = read_anndata(&readable, &ReadOptions::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = read_anndata(&readable, &ReadOptions::new().as_sparse(["layers"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        create_group(&*writable, &root, &GroupMetadata::default())?;
        write_elem(
            &writable,
            &NodePath::new("/_X")?,
            &Elem::Array(dense_x()?),
            &DatasetOptions::default(),
        )?;
        write_elem(
            &writable,
            &NodePath::new("/extra")?,
            &Elem::from("note"),
            &DatasetOptions::default(),
        )?;
        let outcome = read_anndata(&readable, &ReadOptions::new())?;
        let keys: Vec<&str> = outcome.warnings.iter().map(CompatibilityWarning::key).collect();
        assert_eq!(keys, ["/", "_X", "extra"]);
        assert!(outcome.adata.x().is_none());
        Ok(())
    }

    #[test]
    fn read_invalid_field() -> Result<(), Box<dyn Error>> {
        let (writable, readable) = stores();
        write_anndata(&AnnData::new(dense_x()?)?, &writable, &WriteOptions::new())?;
        write_elem(
            &writable,
            &NodePath::new("/obsm")?,
            &Elem::Array(dense_x()?),
            &DatasetOptions::default(),
        )?;
        let err = read_anndata(&readable, &ReadOptions::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Container);
        assert_eq!(err.to_string(), "obsm cannot hold a array element");
        Ok(())
    }

    #[test]
    fn read_backed_probes_x() -> Result<(), Box<dyn Error>> {
        let (writable, _) = stores();
        let sparse = SparseMatrix::from_dense(&dense_x()?, SparseLayout::Csc)?;
        write_anndata(&AnnData::new(sparse.clone())?, &writable, &WriteOptions::new())?;

        let outcome = read_anndata_backed(writable.clone(), &ReadOptions::new().as_sparse(["X"]))?;
        let adata = outcome.adata;
        assert!(adata.x().is_none());
        assert!(adata.is_backed());
        assert_eq!(adata.backing().map(Backing::mode), Some(BackedMode::ReadWrite));
        assert_eq!((adata.n_obs(), adata.n_vars()), (3, 2));
        assert_eq!(adata.x_data_type(), Some(&DataType::Int64));
        assert_eq!(adata.backed_x()?.to_matrix()?, Matrix::Sparse(sparse));
        Ok(())
    }
}
