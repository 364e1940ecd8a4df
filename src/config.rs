//! Global configuration options.

use std::sync::OnceLock;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::array::Compressor;

/// Global configuration options for the zarrs_anndata crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
/// Every option can be overridden per call through [`WriteOptions`](crate::io::WriteOptions) or [`ReadOptions`](crate::io::ReadOptions).
///
/// # Conversion Configuration Options
///
/// ## Dense To Sparse Chunk Size
/// > default: `6000`
///
/// The number of rows (CSR) or columns (CSC) of a dense array read at once when it is reinterpreted as a sparse matrix on read.
///
/// ## Sparse To Dense Chunk Size
/// > default: `1000`
///
/// The number of rows (CSR) or columns (CSC) of a sparse matrix expanded at once when it is written as a dense array.
///
/// # Dataset Configuration Options
///
/// ## Target Chunk Elements
/// > default: `1048576`
///
/// New arrays without an explicit chunk shape are chunked along their first axis so that a chunk holds about this many elements.
///
/// ## Default Compressor
/// > default: [`None`]
///
/// The compressor applied to chunks of new arrays without an explicit compressor.
#[derive(Debug, Clone)]
pub struct Config {
    dense_to_sparse_chunk_size: u64,
    sparse_to_dense_chunk_size: u64,
    target_chunk_elements: u64,
    default_compressor: Option<Compressor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dense_to_sparse_chunk_size: 6000,
            sparse_to_dense_chunk_size: 1000,
            target_chunk_elements: 1 << 20,
            default_compressor: None,
        }
    }
}

impl Config {
    /// Get the [dense to sparse chunk size](#dense-to-sparse-chunk-size) configuration.
    #[must_use]
    pub fn dense_to_sparse_chunk_size(&self) -> u64 {
        self.dense_to_sparse_chunk_size
    }

    /// Set the [dense to sparse chunk size](#dense-to-sparse-chunk-size) configuration.
    pub fn set_dense_to_sparse_chunk_size(&mut self, chunk_size: u64) {
        self.dense_to_sparse_chunk_size = chunk_size;
    }

    /// Get the [sparse to dense chunk size](#sparse-to-dense-chunk-size) configuration.
    #[must_use]
    pub fn sparse_to_dense_chunk_size(&self) -> u64 {
        self.sparse_to_dense_chunk_size
    }

    /// Set the [sparse to dense chunk size](#sparse-to-dense-chunk-size) configuration.
    pub fn set_sparse_to_dense_chunk_size(&mut self, chunk_size: u64) {
        self.sparse_to_dense_chunk_size = chunk_size;
    }

    /// Get the [target chunk elements](#target-chunk-elements) configuration.
    #[must_use]
    pub fn target_chunk_elements(&self) -> u64 {
        self.target_chunk_elements
    }

    /// Set the [target chunk elements](#target-chunk-elements) configuration.
    pub fn set_target_chunk_elements(&mut self, target_chunk_elements: u64) {
        self.target_chunk_elements = target_chunk_elements;
    }

    /// Get the [default compressor](#default-compressor) configuration.
    #[must_use]
    pub fn default_compressor(&self) -> Option<&Compressor> {
        self.default_compressor.as_ref()
    }

    /// Set the [default compressor](#default-compressor) configuration.
    pub fn set_default_compressor(&mut self, compressor: Option<Compressor>) {
        self.default_compressor = compressor;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global zarrs_anndata configuration.
///
/// This might deadlock if the global config is already mutably held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default())).read()
}

/// Returns a mutable reference to the global zarrs_anndata configuration.
///
/// This might deadlock if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default())).write()
}
