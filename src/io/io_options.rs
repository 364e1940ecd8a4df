use std::collections::BTreeSet;

use crate::{
    anndata::{AnnData, AnnDataError},
    array::DatasetOptions,
    config::global_config,
    matrix::{SparseLayout, UnsupportedSparseLayoutError},
};

use super::MatrixField;

fn parse_fields<'a>(
    tokens: impl IntoIterator<Item = &'a String>,
) -> Result<BTreeSet<MatrixField>, AnnDataError> {
    tokens.into_iter().map(|token| token.parse()).collect()
}

fn validate_chunk_size(chunk_size: u64) -> Result<u64, AnnDataError> {
    if chunk_size == 0 {
        Err(AnnDataError::Configuration(
            "the conversion chunk size must be positive".to_string(),
        ))
    } else {
        Ok(chunk_size)
    }
}

/// Options for [`write_anndata`](super::write_anndata).
///
/// ```rust
/// # use zarrs_anndata::io::WriteOptions;
/// let options = WriteOptions::new().as_dense(["X", "raw/X"]).chunk_size(500);
/// ```
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    as_dense: Vec<String>,
    force_dense: Option<bool>,
    dataset_options: DatasetOptions,
    chunk_size: Option<u64>,
}

impl WriteOptions {
    /// Create options which write every field as it is held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the sparse matrices named by `fields` (`X`, `raw/X` or `raw.X`) dense.
    ///
    /// Field names are validated by [`write_anndata`](super::write_anndata) before anything is written.
    #[must_use]
    pub fn as_dense<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.as_dense = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Write the primary matrix, and the raw matrix if there is one, dense.
    #[deprecated(note = "use `as_dense` instead")]
    #[must_use]
    pub fn force_dense(mut self, force_dense: bool) -> Self {
        self.force_dense = Some(force_dense);
        self
    }

    /// Set the dataset options of every array written.
    #[must_use]
    pub fn dataset_options(mut self, dataset_options: DatasetOptions) -> Self {
        self.dataset_options = dataset_options;
        self
    }

    /// Set the number of rows (CSR) or columns (CSC) converted at once when writing a sparse matrix dense.
    ///
    /// Defaults to the [sparse to dense chunk size](crate::config::Config#sparse-to-dense-chunk-size).
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Returns the dataset options.
    #[must_use]
    pub fn get_dataset_options(&self) -> &DatasetOptions {
        &self.dataset_options
    }

    pub(crate) fn resolve_chunk_size(&self) -> Result<u64, AnnDataError> {
        validate_chunk_size(
            self.chunk_size
                .unwrap_or_else(|| global_config().sparse_to_dense_chunk_size()),
        )
    }

    /// Resolve the fields to write dense for `adata`.
    pub(crate) fn resolve_dense_fields(
        &self,
        adata: &AnnData,
    ) -> Result<BTreeSet<MatrixField>, AnnDataError> {
        let mut fields = parse_fields(&self.as_dense)?;
        if let Some(force_dense) = self.force_dense {
            tracing::warn!("force_dense is deprecated, use as_dense");
            if force_dense {
                fields.insert(MatrixField::X);
                if adata.raw().and_then(|raw| raw.x()).is_some() {
                    fields.insert(MatrixField::RawX);
                }
            }
        }
        if fields.contains(&MatrixField::RawX) && adata.raw().and_then(|raw| raw.x()).is_none() {
            return Err(AnnDataError::Configuration(
                "raw/X cannot be written dense, the container has no raw matrix".to_string(),
            ));
        }
        Ok(fields)
    }
}

/// Options for [`read_anndata`](super::read_anndata) and [`read_anndata_backed`](super::read_anndata_backed).
///
/// ```rust
/// # use zarrs_anndata::io::ReadOptions;
/// let options = ReadOptions::new().as_sparse(["X"]).as_sparse_layout("csc").chunk_size(1000);
/// ```
#[derive(Clone, Debug)]
pub struct ReadOptions {
    as_sparse: Vec<String>,
    as_sparse_layout: String,
    chunk_size: Option<u64>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            as_sparse: Vec::new(),
            as_sparse_layout: "csr".to_string(),
            chunk_size: None,
        }
    }
}

impl ReadOptions {
    /// Create options which read every field as it is stored.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the dense matrices named by `fields` (`X`, `raw/X` or `raw.X`) as sparse.
    #[must_use]
    pub fn as_sparse<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.as_sparse = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the layout of matrices read as sparse, `csr` (the default) or `csc`.
    #[must_use]
    pub fn as_sparse_layout(mut self, layout: impl Into<String>) -> Self {
        self.as_sparse_layout = layout.into();
        self
    }

    /// Set the number of rows (CSR) or columns (CSC) converted at once when reading a dense matrix as sparse.
    ///
    /// Defaults to the [dense to sparse chunk size](crate::config::Config#dense-to-sparse-chunk-size).
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub(crate) fn resolve_chunk_size(&self) -> Result<u64, AnnDataError> {
        validate_chunk_size(
            self.chunk_size
                .unwrap_or_else(|| global_config().dense_to_sparse_chunk_size()),
        )
    }

    pub(crate) fn resolve_sparse_fields(&self) -> Result<BTreeSet<MatrixField>, AnnDataError> {
        parse_fields(&self.as_sparse)
    }

    pub(crate) fn resolve_layout(&self) -> Result<SparseLayout, AnnDataError> {
        self.as_sparse_layout
            .parse()
            .map_err(|err: UnsupportedSparseLayoutError| AnnDataError::Configuration(err.to_string()))
    }
}
