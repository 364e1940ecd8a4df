//! A rust library to persist and reload annotated data matrices ([AnnData](https://anndata.readthedocs.io)) in a Zarr-style hierarchy.
//!
//! An [`AnnData`](anndata::AnnData) container holds a primary matrix `X` of shape `[n_obs, n_vars]`, the `obs` and `var` data frames annotating its rows and columns, the `obsm`, `varm`, `obsp`, `varp`, `layers` and `uns` mappings, and an optional raw snapshot.
//! [`io::write_anndata`] writes a container below the root of a store, and [`io::read_anndata`] and [`io::read_anndata_backed`] read it back.
//!
//! ## Getting Started
//! - [`io`] describes the layout of a container in a store and the representation overrides.
//! - [`convert`] streams sparse/dense conversions one window of rows or columns at a time.
//! - [`overwrite`] guards a conversion whose destination is in the store it reads from.
//! - [`legacy`] resolves layouts written by older versions of the format.
//! - [`elem`] is the codec for the individual elements of a container.
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! use zarrs_anndata::{
//!     anndata::{AnnData, Matrix},
//!     io::{read_anndata, write_anndata, ReadOptions, WriteOptions},
//!     array::DataType,
//!     matrix::{SparseLayout, SparseMatrix},
//!     storage::{store::MemoryStore, ReadableListableStorage, ReadableWritableListableStorage},
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! let x = SparseMatrix::from_elements(
//!     SparseLayout::Csr,
//!     [2, 3],
//!     DataType::Float32,
//!     &[1.0f32, 2.0],
//!     vec![0, 2],
//!     vec![0, 1, 2],
//! )?;
//! let adata = AnnData::new(x.clone())?;
//!
//! // Store X dense, then read it back as sparse
//! let storage: ReadableWritableListableStorage = store.clone();
//! write_anndata(&adata, &storage, &WriteOptions::new().as_dense(["X"]))?;
//! let storage: ReadableListableStorage = store;
//! let outcome = read_anndata(&storage, &ReadOptions::new().as_sparse(["X"]))?;
//! assert_eq!(outcome.adata.x(), Some(&Matrix::Sparse(x)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `gzip`: gzip compression of dataset chunks.
//!
//! #### Non-Default
//!  - `ndarray`: [`ndarray`] utility functions for [`DenseArray`](matrix::DenseArray).
//!
//! ## Logging
//! Conversion progress is logged at the `debug` level and compatibility resolutions at the `warn` level with [`tracing`].
//! Compatibility warnings are also returned with every read, see [`io::ReadOutcome`].
//!
//! ## Licence
//! `zarrs_anndata` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted for inclusion in the work by you, as defined in the Apache-2.0 license, shall be dual licensed as above, without any additional terms or conditions.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod anndata;
pub mod array;
pub mod array_subset;
pub mod config;
pub mod convert;
pub mod diagnostics;
pub mod elem;
pub mod group;
pub mod io;
pub mod legacy;
pub mod matrix;
pub mod node;
pub mod overwrite;
pub mod storage;
