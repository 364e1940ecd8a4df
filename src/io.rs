//! Reading and writing [`AnnData`](crate::anndata::AnnData) containers.
//!
//! A container is stored as a hierarchy below the root group of a store:
//!
//! | key | element |
//! |-----|---------|
//! | `X` | the primary matrix, an `array` or a `csr_matrix`/`csc_matrix` group |
//! | `raw` | the raw snapshot group with `X`, `var` and `varm` children |
//! | `obs`, `var` | `dataframe` groups |
//! | `obsm`, `varm`, `obsp`, `varp`, `layers`, `uns` | `dict` groups |
//!
//! The root group carries `encoding-type = "anndata"` and `encoding-version = "0.1.0"`.
//!
//! [`write_anndata`] can store the sparse primary or raw matrix dense ([`WriteOptions::as_dense`]), and [`read_anndata`] can read a dense primary or raw matrix as sparse ([`ReadOptions::as_sparse`]).
//! Both conversions run one window of rows or columns at a time (see [`convert`](crate::convert)).
//! Densifying a matrix of a backed container into its own store is guarded by an [`OverwriteGuard`](crate::overwrite::OverwriteGuard).
//!
//! [`read_anndata_backed`] reads every field except the primary matrix, which stays in the store behind a [`Backing`](crate::anndata::Backing) handle.
//!
//! Every error raised while reading or writing a field is annotated with the key of the field, see [`AnnDataError::AtKey`].

mod io_options;
mod read_anndata;
mod write_anndata;

use std::str::FromStr;

use derive_more::Display;

pub use io_options::{ReadOptions, WriteOptions};
pub use read_anndata::{read_anndata, read_anndata_backed, ReadOutcome};
pub use write_anndata::write_anndata;

use crate::anndata::AnnDataError;

/// The `encoding-type` of the root group of a container.
pub const ANNDATA_ENCODING_TYPE: &str = "anndata";

/// The `encoding-version` of the root group of a container.
pub const ANNDATA_ENCODING_VERSION: &str = "0.1.0";

/// A matrix field whose representation can be overridden when reading or writing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum MatrixField {
    /// The primary matrix.
    #[display("X")]
    X,
    /// The raw snapshot matrix.
    #[display("raw/X")]
    RawX,
}

impl FromStr for MatrixField {
    type Err = AnnDataError;

    /// Parse `X`, `raw/X`, or the legacy spelling `raw.X`.
    fn from_str(field: &str) -> Result<Self, Self::Err> {
        match field {
            "X" => Ok(Self::X),
            "raw/X" | "raw.X" => Ok(Self::RawX),
            _ => Err(AnnDataError::Configuration(format!(
                "{field:?} is not a matrix field, expected \"X\" or \"raw/X\""
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::anndata::ErrorKind;

    use super::*;

    #[test]
    fn matrix_field_tokens() -> Result<(), AnnDataError> {
        assert_eq!("X".parse::<MatrixField>()?, MatrixField::X);
        assert_eq!("raw/X".parse::<MatrixField>()?, MatrixField::RawX);
        assert_eq!("raw.X".parse::<MatrixField>()?, MatrixField::RawX);
        assert_eq!(MatrixField::RawX.to_string(), "raw/X");
        for token in ["obsm", "x", "raw", "/X", ""] {
            let err = token.parse::<MatrixField>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
        Ok(())
    }
}
