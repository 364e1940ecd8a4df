use thiserror::Error;

use crate::{
    array::{ArrayCreateError, ArrayError, ArrayShape},
    convert::ConvertError,
    elem::ElemError,
    matrix::MatrixError,
    node::{NodeCreateError, NodePathError},
    overwrite::OverwriteError,
    storage::StorageError,
};

/// A container construction error.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// A field does not have the shape implied by the other fields.
    #[error("{field} has shape {shape:?}, expected {expected}")]
    IncompatibleShape {
        /// The field.
        field: String,
        /// The shape of the field.
        shape: ArrayShape,
        /// A description of the expected shape.
        expected: String,
    },
    /// A data frame column is not valid.
    #[error("invalid data frame column {column}: {reason}")]
    InvalidColumn {
        /// The column name.
        column: String,
        /// The reason.
        reason: String,
    },
    /// A categorical is not valid.
    #[error("invalid categorical: {0}")]
    InvalidCategorical(String),
    /// An element is not valid for a field.
    #[error("{field} cannot hold a {encoding_type} element")]
    InvalidElement {
        /// The field.
        field: String,
        /// The encoding type of the element.
        encoding_type: &'static str,
    },
    /// The container is not backed by a store.
    #[error("the container is not backed by a store")]
    NotBacked,
    /// The backing store is read-only.
    #[error("the backing store of the container is read-only")]
    ReadOnlyBacking,
    /// The backed primary matrix is not dense.
    #[error("the backed primary matrix is not dense")]
    NotDense,
}

/// The kind of an [`AnnDataError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid options, raised before any input or output.
    Configuration,
    /// An unrecognised or inconsistent encoding in the store.
    Format,
    /// An underlying store failure.
    Storage,
    /// An inconsistent container.
    Container,
}

/// An error reading or writing an AnnData container.
#[derive(Debug, Error)]
pub enum AnnDataError {
    /// Invalid options.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// An unrecognised or inconsistent encoding.
    #[error(transparent)]
    Format(ElemError),
    /// An underlying store failure.
    #[error(transparent)]
    Storage(StorageError),
    /// A failure to swap a converted field into place.
    #[error(transparent)]
    Overwrite(OverwriteError),
    /// An inconsistent container.
    #[error(transparent)]
    Container(#[from] ContainerError),
    /// An error at a key of the store.
    #[error("error {action} {key}: {source}")]
    AtKey {
        /// The path of the node in the store.
        key: String,
        /// What was being done, e.g. `reading` or `writing`.
        action: &'static str,
        /// The error.
        source: Box<AnnDataError>,
    },
}

impl AnnDataError {
    /// Returns the kind of the error, seeing through any key annotations.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Format(_) => ErrorKind::Format,
            Self::Storage(_) | Self::Overwrite(_) => ErrorKind::Storage,
            Self::Container(_) => ErrorKind::Container,
            Self::AtKey { source, .. } => source.kind(),
        }
    }

    /// Returns the innermost key the error is annotated with, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::AtKey { key, source, .. } => source.key().or(Some(key)),
            _ => None,
        }
    }

    /// Annotate the error with the key it occurred at.
    #[must_use]
    pub fn at_key(self, key: impl Into<String>, action: &'static str) -> Self {
        Self::AtKey {
            key: key.into(),
            action,
            source: Box::new(self),
        }
    }
}

impl From<ElemError> for AnnDataError {
    fn from(err: ElemError) -> Self {
        match err.into_storage_error() {
            Ok(err) => Self::Storage(err),
            Err(err) => Self::Format(err),
        }
    }
}

impl From<StorageError> for AnnDataError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<OverwriteError> for AnnDataError {
    fn from(err: OverwriteError) -> Self {
        match err {
            OverwriteError::StorageError(err) => Self::Storage(err),
            err => Self::Overwrite(err),
        }
    }
}

macro_rules! impl_from_via_elem {
    ($($error:ty),*) => {
        $(
            impl From<$error> for AnnDataError {
                fn from(err: $error) -> Self {
                    ElemError::from(err).into()
                }
            }
        )*
    };
}

impl_from_via_elem!(
    ArrayError,
    ArrayCreateError,
    ConvertError,
    MatrixError,
    NodeCreateError,
    NodePathError
);

#[cfg(test)]
mod tests {
    use crate::node::NodePath;

    use super::*;

    #[test]
    fn error_kind_through_annotations() {
        let err = AnnDataError::Configuration("bad".to_string())
            .at_key("/raw/X", "writing")
            .at_key("/raw", "writing");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.key(), Some("/raw/X"));

        let err: AnnDataError = ElemError::StorageError(StorageError::ReadOnly).into();
        assert_eq!(err.kind(), ErrorKind::Storage);
        let err: AnnDataError = ArrayError::StorageError(StorageError::ReadOnly).into();
        assert_eq!(err.at_key("/X", "writing").kind(), ErrorKind::Storage);
        let err: AnnDataError =
            ElemError::Invalid(NodePath::new("/obs").unwrap(), "no index".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("/obs"));
    }
}
