//! The element codec: encoding and decoding of typed values at nodes of a store.
//!
//! Every value of an AnnData container is an [`Elem`], and every [`Elem`] variant is written as a node tagged with an `encoding-type` and `encoding-version` attribute:
//!
//! | [`Elem`] variant | `encoding-type` | `encoding-version` | node |
//! |------------------|-----------------|--------------------|------|
//! | [`Array`](Elem::Array) | `array` | `0.2.0` | array |
//! | [`Sparse`](Elem::Sparse) | `csr_matrix`, `csc_matrix` | `0.1.0` | group with `data`, `indices`, `indptr` |
//! | [`DataFrame`](Elem::DataFrame) | `dataframe` | `0.2.0` | group with an index and one child per column |
//! | [`Mapping`](Elem::Mapping) | `dict` | `0.1.0` | group with one child per entry |
//! | [`StringArray`](Elem::StringArray) | `string-array` | `0.2.0` | array |
//! | [`Categorical`](Elem::Categorical) | `categorical` | `0.2.0` | group with `codes` and `categories` |
//! | [`String`](Elem::String) | `string` | `0.2.0` | zero dimensional array |
//! | [`Scalar`](Elem::Scalar) | `numeric-scalar` | `0.2.0` | zero dimensional array |
//!
//! Each tag is implemented by an [`ElemEncoding`] held in an [`ElemRegistry`].
//! [`ElemRegistry::read_elem`] dispatches on the `encoding-type` of a node, and falls back to [`legacy::read_untagged`](crate::legacy::read_untagged) for nodes written before the attributes existed.

mod array;
mod categorical;
mod dataframe;
mod mapping;
mod sparse;
mod string;

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, OnceLock},
};

use thiserror::Error;

pub use self::{
    array::{ArrayEncoding, NumericScalarEncoding},
    categorical::CategoricalEncoding,
    dataframe::DataFrameEncoding,
    mapping::MappingEncoding,
    sparse::SparseEncoding,
    string::{StringArrayEncoding, StringEncoding},
};

pub(crate) use self::{dataframe::index_strings, mapping::read_children, string::write_string_array};

use crate::{
    anndata::{Categorical, DataFrame},
    array::{
        Array, ArrayBuilder, ArrayBytes, ArrayCreateError, ArrayError, ArrayShape, DataType,
        DatasetOptions, Element,
    },
    array_subset::ArraySubset,
    convert::ConvertError,
    diagnostics::Diagnostics,
    group::{Attributes, GroupMetadata},
    matrix::{DenseArray, MatrixError, SparseLayout, SparseMatrix},
    node::{retrieve_node_metadata, NodeCreateError, NodeMetadata, NodePath, NodePathError},
    storage::{
        create_group, erase_node, ReadableListableStorage, ReadableWritableListableStorage,
        StorageError,
    },
};

/// A map of named elements.
pub type Mapping = BTreeMap<String, Elem>;

/// A value of an AnnData container.
#[derive(Clone, Debug, PartialEq)]
pub enum Elem {
    /// A dense array of a fixed size data type.
    Array(DenseArray),
    /// A sparse matrix.
    Sparse(SparseMatrix),
    /// A data frame.
    DataFrame(DataFrame),
    /// A map of named elements.
    Mapping(Mapping),
    /// A one dimensional array of strings.
    StringArray(Vec<String>),
    /// A categorical array of strings.
    Categorical(Categorical),
    /// A string.
    String(String),
    /// A numeric or boolean scalar, held as a zero dimensional array.
    Scalar(DenseArray),
}

impl Elem {
    /// Create a numeric or boolean scalar.
    ///
    /// # Errors
    /// Returns a [`MatrixError`] if `T` is incompatible with `data_type`.
    pub fn scalar<T: Element>(data_type: DataType, value: T) -> Result<Self, MatrixError> {
        Ok(Self::Scalar(DenseArray::from_elements(vec![], data_type, &[value])?))
    }

    /// Returns the `encoding-type` the element is written with.
    #[must_use]
    pub fn encoding_type(&self) -> &'static str {
        match self {
            Self::Array(_) => ArrayEncoding::ENCODING_TYPE,
            Self::Sparse(matrix) => matrix.layout().encoding_type(),
            Self::DataFrame(_) => DataFrameEncoding::ENCODING_TYPE,
            Self::Mapping(_) => MappingEncoding::ENCODING_TYPE,
            Self::StringArray(_) => StringArrayEncoding::ENCODING_TYPE,
            Self::Categorical(_) => CategoricalEncoding::ENCODING_TYPE,
            Self::String(_) => StringEncoding::ENCODING_TYPE,
            Self::Scalar(_) => NumericScalarEncoding::ENCODING_TYPE,
        }
    }

    /// Returns the shape of the element, or [`None`] for a mapping.
    ///
    /// The shape of a data frame is its number of rows and columns.
    #[must_use]
    pub fn shape(&self) -> Option<ArrayShape> {
        match self {
            Self::Array(array) | Self::Scalar(array) => Some(array.shape().to_vec()),
            Self::Sparse(matrix) => Some(matrix.shape().to_vec()),
            Self::DataFrame(df) => Some(vec![df.n_rows(), df.n_cols() as u64]),
            Self::Mapping(_) => None,
            Self::StringArray(strings) => Some(vec![strings.len() as u64]),
            Self::Categorical(categorical) => Some(vec![categorical.len() as u64]),
            Self::String(_) => Some(vec![]),
        }
    }
}

impl From<SparseMatrix> for Elem {
    fn from(matrix: SparseMatrix) -> Self {
        Self::Sparse(matrix)
    }
}

impl From<DataFrame> for Elem {
    fn from(df: DataFrame) -> Self {
        Self::DataFrame(df)
    }
}

impl From<Mapping> for Elem {
    fn from(mapping: Mapping) -> Self {
        Self::Mapping(mapping)
    }
}

impl From<Categorical> for Elem {
    fn from(categorical: Categorical) -> Self {
        Self::Categorical(categorical)
    }
}

impl From<Vec<String>> for Elem {
    fn from(strings: Vec<String>) -> Self {
        Self::StringArray(strings)
    }
}

impl From<&str> for Elem {
    fn from(string: &str) -> Self {
        Self::String(string.to_string())
    }
}

/// An element codec error.
#[derive(Debug, Error)]
pub enum ElemError {
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An invalid node path.
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// A node metadata error.
    #[error(transparent)]
    NodeCreateError(#[from] NodeCreateError),
    /// An array creation error.
    #[error(transparent)]
    ArrayCreateError(#[from] ArrayCreateError),
    /// An array error.
    #[error(transparent)]
    ArrayError(#[from] ArrayError),
    /// A matrix error.
    #[error(transparent)]
    MatrixError(#[from] MatrixError),
    /// A conversion error.
    #[error(transparent)]
    ConvertError(#[from] ConvertError),
    /// There is no node at the path.
    #[error("no element at {0}")]
    Missing(NodePath),
    /// The `encoding-type` is not registered.
    #[error("unknown encoding-type {encoding_type} at {path}")]
    UnknownEncoding {
        /// The node path.
        path: NodePath,
        /// The encoding type.
        encoding_type: String,
    },
    /// The `encoding-version` is not supported.
    #[error("unsupported encoding-version {version} of {encoding_type} at {path}")]
    UnsupportedVersion {
        /// The node path.
        path: NodePath,
        /// The encoding type.
        encoding_type: String,
        /// The encoding version.
        version: String,
    },
    /// The node or element is not valid for the encoding.
    #[error("invalid element at {0}: {1}")]
    Invalid(NodePath, String),
}

impl ElemError {
    /// Extract the underlying [`StorageError`] if this error is a store failure.
    ///
    /// # Errors
    /// Returns the error unchanged if it is not a store failure.
    pub fn into_storage_error(self) -> Result<StorageError, Self> {
        match self {
            Self::StorageError(err)
            | Self::NodeCreateError(NodeCreateError::StorageError(err))
            | Self::ArrayCreateError(ArrayCreateError::StorageError(err))
            | Self::ArrayError(ArrayError::StorageError(err))
            | Self::MatrixError(MatrixError::ArrayError(ArrayError::StorageError(err)))
            | Self::ConvertError(
                ConvertError::StorageError(err)
                | ConvertError::ArrayError(ArrayError::StorageError(err))
                | ConvertError::MatrixError(MatrixError::ArrayError(ArrayError::StorageError(err))),
            ) => Ok(err),
            err => Err(err),
        }
    }
}

/// An element encoding, identified by its `encoding-type`.
pub trait ElemEncoding: Send + Sync {
    /// The `encoding-type` attribute.
    fn encoding_type(&self) -> &'static str;

    /// The `encoding-version` attribute written by [`encode`](ElemEncoding::encode).
    fn encoding_version(&self) -> &'static str;

    /// Returns true if a node with `version` can be decoded.
    fn supports_version(&self, version: &str) -> bool {
        version == self.encoding_version()
    }

    /// Encode `elem` to a new node at `path`.
    ///
    /// # Errors
    /// Returns an [`ElemError`] if `elem` cannot be written by this encoding or a write fails.
    fn encode(
        &self,
        registry: &ElemRegistry,
        storage: &ReadableWritableListableStorage,
        path: &NodePath,
        elem: &Elem,
        options: &DatasetOptions,
    ) -> Result<(), ElemError>;

    /// Decode the node at `path` with `metadata`.
    ///
    /// # Errors
    /// Returns an [`ElemError`] if the node is not valid for this encoding or a read fails.
    fn decode(
        &self,
        registry: &ElemRegistry,
        storage: &ReadableListableStorage,
        path: &NodePath,
        metadata: &NodeMetadata,
        diagnostics: &mut Diagnostics,
    ) -> Result<Elem, ElemError>;
}

/// A registry of [`ElemEncoding`]s keyed by `encoding-type`.
#[derive(Clone)]
pub struct ElemRegistry {
    encodings: HashMap<&'static str, Arc<dyn ElemEncoding>>,
}

impl std::fmt::Debug for ElemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<&str> = self.encodings.keys().copied().collect();
        tags.sort_unstable();
        f.debug_struct("ElemRegistry").field("encodings", &tags).finish()
    }
}

impl Default for ElemRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ArrayEncoding));
        registry.register(Arc::new(SparseEncoding::new(SparseLayout::Csr)));
        registry.register(Arc::new(SparseEncoding::new(SparseLayout::Csc)));
        registry.register(Arc::new(DataFrameEncoding));
        registry.register(Arc::new(MappingEncoding));
        registry.register(Arc::new(StringArrayEncoding));
        registry.register(Arc::new(CategoricalEncoding));
        registry.register(Arc::new(StringEncoding));
        registry.register(Arc::new(NumericScalarEncoding));
        registry
    }
}

impl ElemRegistry {
    /// Create a registry without any encodings.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            encodings: HashMap::new(),
        }
    }

    /// Register `encoding`, replacing any encoding with the same `encoding-type`.
    pub fn register(&mut self, encoding: Arc<dyn ElemEncoding>) {
        self.encodings.insert(encoding.encoding_type(), encoding);
    }

    /// Returns the encoding for `encoding_type`.
    #[must_use]
    pub fn get(&self, encoding_type: &str) -> Option<&Arc<dyn ElemEncoding>> {
        self.encodings.get(encoding_type)
    }

    /// Write `elem` at `path`, replacing any existing node.
    ///
    /// # Errors
    /// Returns an [`ElemError`] if the encoding of `elem` is not registered, `elem` is invalid, or a write fails.
    pub fn write_elem(
        &self,
        storage: &ReadableWritableListableStorage,
        path: &NodePath,
        elem: &Elem,
        options: &DatasetOptions,
    ) -> Result<(), ElemError> {
        let encoding_type = elem.encoding_type();
        let encoding = self
            .get(encoding_type)
            .ok_or_else(|| ElemError::UnknownEncoding {
                path: path.clone(),
                encoding_type: encoding_type.to_string(),
            })?;
        erase_node(&**storage, path)?;
        encoding.encode(self, storage, path, elem, options)
    }

    /// Read the element at `path`.
    ///
    /// Nodes without an `encoding-type` are decoded by structural inspection, raising a compatibility warning in `diagnostics`.
    ///
    /// # Errors
    /// Returns an [`ElemError`] if there is no node at `path`, its encoding is unknown or unsupported, or a read fails.
    pub fn read_elem(
        &self,
        storage: &ReadableListableStorage,
        path: &NodePath,
        diagnostics: &mut Diagnostics,
    ) -> Result<Elem, ElemError> {
        let metadata = retrieve_node_metadata(&**storage, path)?
            .ok_or_else(|| ElemError::Missing(path.clone()))?;
        let Some(encoding_type) = metadata.string_attribute("encoding-type") else {
            return crate::legacy::read_untagged(self, storage, path, &metadata, diagnostics);
        };
        let encoding = self
            .get(encoding_type)
            .ok_or_else(|| ElemError::UnknownEncoding {
                path: path.clone(),
                encoding_type: encoding_type.to_string(),
            })?;
        match metadata.string_attribute("encoding-version") {
            Some(version) if !encoding.supports_version(version) => {
                return Err(ElemError::UnsupportedVersion {
                    path: path.clone(),
                    encoding_type: encoding_type.to_string(),
                    version: version.to_string(),
                });
            }
            Some(_) => {}
            None => diagnostics.warn(
                path.key(),
                format!("{encoding_type} element without an encoding-version"),
            ),
        }
        encoding.decode(self, storage, path, &metadata, diagnostics)
    }
}

/// Returns the registry of the built-in encodings.
pub fn default_registry() -> &'static ElemRegistry {
    static REGISTRY: OnceLock<ElemRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ElemRegistry::default)
}

/// Write `elem` at `path` with the [default registry](default_registry), replacing any existing node.
///
/// # Errors
/// See [`ElemRegistry::write_elem`].
pub fn write_elem(
    storage: &ReadableWritableListableStorage,
    path: &NodePath,
    elem: &Elem,
    options: &DatasetOptions,
) -> Result<(), ElemError> {
    default_registry().write_elem(storage, path, elem, options)
}

/// Read the element at `path` with the [default registry](default_registry).
///
/// # Errors
/// See [`ElemRegistry::read_elem`].
pub fn read_elem(
    storage: &ReadableListableStorage,
    path: &NodePath,
    diagnostics: &mut Diagnostics,
) -> Result<Elem, ElemError> {
    default_registry().read_elem(storage, path, diagnostics)
}

/// The `encoding-type` and `encoding-version` attributes of `encoding`.
pub(crate) fn encoding_attributes(encoding: &(impl ElemEncoding + ?Sized)) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("encoding-type".to_string(), encoding.encoding_type().into());
    attributes.insert(
        "encoding-version".to_string(),
        encoding.encoding_version().into(),
    );
    attributes
}

/// The error for an element which an encoding cannot write.
pub(crate) fn unexpected_elem(
    encoding: &(impl ElemEncoding + ?Sized),
    path: &NodePath,
    elem: &Elem,
) -> ElemError {
    ElemError::Invalid(
        path.clone(),
        format!(
            "the {} encoding cannot write a {} element",
            encoding.encoding_type(),
            elem.encoding_type()
        ),
    )
}

/// Create a group at `path` with `attributes`.
pub(crate) fn write_group(
    storage: &ReadableWritableListableStorage,
    path: &NodePath,
    attributes: Attributes,
) -> Result<(), ElemError> {
    create_group(&**storage, path, &GroupMetadata::new(attributes))?;
    Ok(())
}

/// Create an array at `path` holding `bytes`.
pub(crate) fn write_array(
    storage: &ReadableWritableListableStorage,
    path: &NodePath,
    shape: ArrayShape,
    data_type: DataType,
    bytes: ArrayBytes<'_>,
    options: &DatasetOptions,
    attributes: Attributes,
) -> Result<(), ElemError> {
    let subset = ArraySubset::new_with_shape(shape.clone());
    let array = ArrayBuilder::new(shape, data_type)
        .options(options)
        .attributes(attributes)
        .build(storage.clone(), path.clone())?;
    array.store_metadata()?;
    array.store_array_subset(&subset, bytes)?;
    Ok(())
}

/// Open the array at `path`.
pub(crate) fn open_array(
    storage: &ReadableListableStorage,
    path: &NodePath,
) -> Result<Array<dyn crate::storage::ReadableListableStorageTraits>, ElemError> {
    Ok(Array::open(storage.clone(), path)?)
}

/// Read the whole array at `path` into memory.
pub(crate) fn read_dense(
    storage: &ReadableListableStorage,
    path: &NodePath,
) -> Result<DenseArray, ElemError> {
    let array = open_array(storage, path)?;
    let bytes = array.retrieve_array_subset(&ArraySubset::new_with_shape(array.shape().to_vec()))?;
    Ok(DenseArray::new(
        array.shape().to_vec(),
        array.data_type().clone(),
        bytes,
    )?)
}
