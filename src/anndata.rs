//! The AnnData container.
//!
//! An [`AnnData`] is an annotated matrix: a primary matrix `X` of `n_obs` observations by `n_vars` variables, with
//! - `obs` and `var` data frames annotating the observations and variables,
//! - `obsm`/`varm` mappings of per-observation/per-variable matrices,
//! - `obsp`/`varp` mappings of pairwise matrices,
//! - `layers` holding alternative matrices of the same shape as `X`,
//! - `uns` holding unstructured metadata, and
//! - an optional [`Raw`] snapshot of the matrix and variables before filtering.
//!
//! A container read in backed mode keeps a [`Backing`] handle to its store in place of a loaded `X`.

mod anndata_error;
mod backed;
mod categorical;
mod dataframe;

pub use anndata_error::{AnnDataError, ContainerError, ErrorKind};
pub use backed::{BackedDenseArray, BackedMatrix, BackedMode, Backing, BackingStorage};
pub use categorical::Categorical;
pub use dataframe::{DataFrame, DEFAULT_INDEX_NAME};

use crate::{
    array::{ArrayShape, DataType},
    elem::{Elem, Mapping},
    matrix::{DenseArray, SparseMatrix},
};

/// A two dimensional matrix, either dense or sparse.
#[derive(Clone, Debug, PartialEq)]
pub enum Matrix {
    /// A dense matrix.
    Dense(DenseArray),
    /// A compressed sparse matrix.
    Sparse(SparseMatrix),
}

impl Matrix {
    /// Returns the shape of the matrix.
    #[must_use]
    pub fn shape(&self) -> ArrayShape {
        match self {
            Self::Dense(array) => array.shape().to_vec(),
            Self::Sparse(matrix) => matrix.shape().to_vec(),
        }
    }

    /// Returns the data type of the matrix elements.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        match self {
            Self::Dense(array) => array.data_type(),
            Self::Sparse(matrix) => matrix.data_type(),
        }
    }

    /// Returns true if the matrix is sparse.
    #[must_use]
    pub fn is_sparse(&self) -> bool {
        matches!(self, Self::Sparse(_))
    }

    /// Convert the element read for `field` into a matrix.
    ///
    /// # Errors
    /// Returns [`ContainerError::InvalidElement`] if `elem` is not a two dimensional array or a sparse matrix.
    pub fn from_elem(field: &str, elem: Elem) -> Result<Self, ContainerError> {
        match elem {
            Elem::Array(array) if array.shape().len() == 2 => Ok(Self::Dense(array)),
            Elem::Sparse(matrix) => Ok(Self::Sparse(matrix)),
            elem => Err(ContainerError::InvalidElement {
                field: field.to_string(),
                encoding_type: elem.encoding_type(),
            }),
        }
    }
}

impl From<DenseArray> for Matrix {
    fn from(array: DenseArray) -> Self {
        Self::Dense(array)
    }
}

impl From<SparseMatrix> for Matrix {
    fn from(matrix: SparseMatrix) -> Self {
        Self::Sparse(matrix)
    }
}

impl From<Matrix> for Elem {
    fn from(matrix: Matrix) -> Self {
        match matrix {
            Matrix::Dense(array) => Self::Array(array),
            Matrix::Sparse(matrix) => Self::Sparse(matrix),
        }
    }
}

fn incompatible_shape(field: &str, shape: ArrayShape, expected: String) -> ContainerError {
    ContainerError::IncompatibleShape {
        field: field.to_string(),
        shape,
        expected,
    }
}

/// Check that every entry of `mapping` has `expected` as its leading dimensions.
fn validate_mapping(field: &str, mapping: &Mapping, expected: &[u64]) -> Result<(), ContainerError> {
    for (name, elem) in mapping {
        let key = format!("{field}/{name}");
        let shape = elem.shape().ok_or_else(|| ContainerError::InvalidElement {
            field: key.clone(),
            encoding_type: elem.encoding_type(),
        })?;
        if !shape.starts_with(expected) {
            return Err(incompatible_shape(
                &key,
                shape,
                format!("leading dimensions {expected:?}"),
            ));
        }
    }
    Ok(())
}

/// The raw snapshot of a container.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Raw {
    x: Option<Matrix>,
    var: DataFrame,
    varm: Mapping,
}

impl Raw {
    /// Create a raw snapshot.
    ///
    /// An empty `var` is given a default index with one row per column of `x`.
    ///
    /// # Errors
    /// Returns [`ContainerError::IncompatibleShape`] if `x` is not two dimensional, `var` does not have one row per column of `x`, or an entry of `varm` does not have one row per row of `var`.
    pub fn new(x: Option<Matrix>, mut var: DataFrame, varm: Mapping) -> Result<Self, ContainerError> {
        if let Some(x) = &x {
            let shape = x.shape();
            let [_, n_vars] = shape[..] else {
                return Err(incompatible_shape("raw/X", shape, "two dimensions".to_string()));
            };
            if var.n_rows() == 0 && var.is_empty() {
                var = DataFrame::with_default_index(n_vars);
            }
            if n_vars != var.n_rows() {
                return Err(incompatible_shape(
                    "raw/X",
                    shape,
                    format!("{} columns (raw/var)", var.n_rows()),
                ));
            }
        }
        validate_mapping("raw/varm", &varm, &[var.n_rows()])?;
        Ok(Self { x, var, varm })
    }

    /// Returns the raw matrix.
    #[must_use]
    pub fn x(&self) -> Option<&Matrix> {
        self.x.as_ref()
    }

    /// Returns the raw variable annotations.
    #[must_use]
    pub fn var(&self) -> &DataFrame {
        &self.var
    }

    /// Returns the raw per-variable matrices.
    #[must_use]
    pub fn varm(&self) -> &Mapping {
        &self.varm
    }

    /// Returns the number of raw variables.
    #[must_use]
    pub fn n_vars(&self) -> u64 {
        self.var.n_rows()
    }

    /// Consume the snapshot and return its matrix, variables and per-variable matrices.
    #[must_use]
    pub fn into_parts(self) -> (Option<Matrix>, DataFrame, Mapping) {
        (self.x, self.var, self.varm)
    }
}

/// The fields of an [`AnnData`] container, before validation.
#[derive(Clone, Debug, Default)]
pub struct AnnDataFields {
    /// The primary matrix, `[n_obs, n_vars]`.
    pub x: Option<Matrix>,
    /// Observation annotations.
    pub obs: DataFrame,
    /// Variable annotations.
    pub var: DataFrame,
    /// Per-observation matrices.
    pub obsm: Mapping,
    /// Per-variable matrices.
    pub varm: Mapping,
    /// Pairwise observation matrices.
    pub obsp: Mapping,
    /// Pairwise variable matrices.
    pub varp: Mapping,
    /// Alternative matrices with the shape of `x`.
    pub layers: Mapping,
    /// Unstructured metadata.
    pub uns: Mapping,
    /// The raw snapshot.
    pub raw: Option<Raw>,
    /// The backing store of a container read in backed mode.
    pub backing: Option<Backing>,
}

/// An annotated data matrix.
#[derive(Clone, Debug)]
pub struct AnnData {
    x: Option<Matrix>,
    obs: DataFrame,
    var: DataFrame,
    obsm: Mapping,
    varm: Mapping,
    obsp: Mapping,
    varp: Mapping,
    layers: Mapping,
    uns: Mapping,
    raw: Option<Raw>,
    backing: Option<Backing>,
}

impl AnnData {
    /// Create a container from its fields.
    ///
    /// Empty `obs` and `var` data frames are given a default index with one row per row and column of `x`.
    ///
    /// # Errors
    /// Returns [`ContainerError::IncompatibleShape`] if the shape of a field is inconsistent with `obs` and `var`:
    ///  - `x` and every entry of `layers` must have shape `[n_obs, n_vars]`,
    ///  - entries of `obsm` must have `n_obs` rows and entries of `varm` must have `n_vars` rows, and
    ///  - entries of `obsp` must have shape `[n_obs, n_obs]` and entries of `varp` must have shape `[n_vars, n_vars]`.
    pub fn from_fields(fields: AnnDataFields) -> Result<Self, ContainerError> {
        let AnnDataFields {
            x,
            mut obs,
            mut var,
            obsm,
            varm,
            obsp,
            varp,
            layers,
            uns,
            raw,
            backing,
        } = fields;
        if let Some(x) = &x {
            let shape = x.shape();
            if shape.len() != 2 {
                return Err(incompatible_shape("X", shape, "two dimensions".to_string()));
            }
            if obs.n_rows() == 0 && obs.is_empty() {
                obs = DataFrame::with_default_index(shape[0]);
            }
            if var.n_rows() == 0 && var.is_empty() {
                var = DataFrame::with_default_index(shape[1]);
            }
        }
        let (n_obs, n_vars) = (obs.n_rows(), var.n_rows());
        if let Some(x) = &x {
            let shape = x.shape();
            if shape != [n_obs, n_vars] {
                return Err(incompatible_shape(
                    "X",
                    shape,
                    format!("[{n_obs}, {n_vars}] (obs, var)"),
                ));
            }
        }
        validate_mapping("obsm", &obsm, &[n_obs])?;
        validate_mapping("varm", &varm, &[n_vars])?;
        validate_mapping("obsp", &obsp, &[n_obs, n_obs])?;
        validate_mapping("varp", &varp, &[n_vars, n_vars])?;
        validate_mapping("layers", &layers, &[n_obs, n_vars])?;
        for (field, mapping, expected) in [
            ("obsp", &obsp, 2),
            ("varp", &varp, 2),
            ("layers", &layers, 2),
        ] {
            if let Some((name, elem)) = mapping
                .iter()
                .find(|(_, elem)| elem.shape().map(|shape| shape.len()) != Some(expected))
            {
                return Err(incompatible_shape(
                    &format!("{field}/{name}"),
                    elem.shape().unwrap_or_default(),
                    "two dimensions".to_string(),
                ));
            }
        }
        Ok(Self {
            x,
            obs,
            var,
            obsm,
            varm,
            obsp,
            varp,
            layers,
            uns,
            raw,
            backing,
        })
    }

    /// Create a container holding the matrix `x` with default `obs` and `var` indices.
    ///
    /// # Errors
    /// Returns [`ContainerError::IncompatibleShape`] if `x` is not two dimensional.
    pub fn new(x: impl Into<Matrix>) -> Result<Self, ContainerError> {
        Self::from_fields(AnnDataFields {
            x: Some(x.into()),
            ..AnnDataFields::default()
        })
    }

    /// Returns the number of observations.
    #[must_use]
    pub fn n_obs(&self) -> u64 {
        self.obs.n_rows()
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn n_vars(&self) -> u64 {
        self.var.n_rows()
    }

    /// Returns the primary matrix, or [`None`] if it is not loaded.
    #[must_use]
    pub fn x(&self) -> Option<&Matrix> {
        self.x.as_ref()
    }

    /// Returns the observation annotations.
    #[must_use]
    pub fn obs(&self) -> &DataFrame {
        &self.obs
    }

    /// Returns the variable annotations.
    #[must_use]
    pub fn var(&self) -> &DataFrame {
        &self.var
    }

    /// Returns the per-observation matrices.
    #[must_use]
    pub fn obsm(&self) -> &Mapping {
        &self.obsm
    }

    /// Returns the per-variable matrices.
    #[must_use]
    pub fn varm(&self) -> &Mapping {
        &self.varm
    }

    /// Returns the pairwise observation matrices.
    #[must_use]
    pub fn obsp(&self) -> &Mapping {
        &self.obsp
    }

    /// Returns the pairwise variable matrices.
    #[must_use]
    pub fn varp(&self) -> &Mapping {
        &self.varp
    }

    /// Returns the layers.
    #[must_use]
    pub fn layers(&self) -> &Mapping {
        &self.layers
    }

    /// Returns the unstructured metadata.
    #[must_use]
    pub fn uns(&self) -> &Mapping {
        &self.uns
    }

    /// Returns the unstructured metadata for modification.
    #[must_use]
    pub fn uns_mut(&mut self) -> &mut Mapping {
        &mut self.uns
    }

    /// Returns the raw snapshot.
    #[must_use]
    pub fn raw(&self) -> Option<&Raw> {
        self.raw.as_ref()
    }

    /// Returns the store backing the container, if it was read in backed mode.
    #[must_use]
    pub fn backing(&self) -> Option<&Backing> {
        self.backing.as_ref()
    }

    /// Returns true if the container is backed by a store.
    #[must_use]
    pub fn is_backed(&self) -> bool {
        self.backing.is_some()
    }

    /// Returns the data type of the primary matrix.
    ///
    /// For a backed container without a loaded matrix, this is the data type probed when the store was opened.
    #[must_use]
    pub fn x_data_type(&self) -> Option<&DataType> {
        self.x
            .as_ref()
            .map(Matrix::data_type)
            .or_else(|| self.backing.as_ref().and_then(Backing::x_data_type))
    }

    /// Open the primary matrix of the backing store without reading its values.
    ///
    /// # Errors
    /// Returns [`ContainerError::NotBacked`] if the container is not backed, or an [`AnnDataError`] if the matrix cannot be opened.
    pub fn backed_x(&self) -> Result<BackedMatrix, AnnDataError> {
        self.backing
            .as_ref()
            .ok_or(ContainerError::NotBacked)?
            .open_x()
    }

    /// Release the handle to the backing store.
    ///
    /// A backed container should be closed before its store is written by another handle.
    /// Returns the released backing, or [`None`] if the container was not backed.
    pub fn close(&mut self) -> Option<Backing> {
        let backing = self.backing.take();
        if let Some(backing) = &backing {
            tracing::debug!("closed backing store {}", backing.identity());
        }
        backing
    }

    /// Consume the container and return its fields.
    #[must_use]
    pub fn into_fields(self) -> AnnDataFields {
        AnnDataFields {
            x: self.x,
            obs: self.obs,
            var: self.var,
            obsm: self.obsm,
            varm: self.varm,
            obsp: self.obsp,
            varp: self.varp,
            layers: self.layers,
            uns: self.uns,
            raw: self.raw,
            backing: self.backing,
        }
    }
}
