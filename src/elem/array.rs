use crate::{
    array::DatasetOptions,
    diagnostics::Diagnostics,
    node::{NodeMetadata, NodePath},
    storage::{ReadableListableStorage, ReadableWritableListableStorage},
};

use super::{
    encoding_attributes, read_dense, unexpected_elem, write_array, Elem, ElemEncoding, ElemError,
    ElemRegistry,
};

/// The `array` encoding of a dense array of a fixed size data type.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArrayEncoding;

impl ArrayEncoding {
    /// The `encoding-type` attribute.
    pub const ENCODING_TYPE: &'static str = "array";
}

impl ElemEncoding for ArrayEncoding {
    fn encoding_type(&self) -> &'static str {
        Self::ENCODING_TYPE
    }

    fn encoding_version(&self) -> &'static str {
        "0.2.0"
    }

    fn encode(
        &self,
        _registry: &ElemRegistry,
        storage: &ReadableWritableListableStorage,
        path: &NodePath,
        elem: &Elem,
        options: &DatasetOptions,
    ) -> Result<(), ElemError> {
        let Elem::Array(array) = elem else {
            return Err(unexpected_elem(self, path, elem));
        };
        if !array.is_fixed_size() {
            return Err(ElemError::Invalid(
                path.clone(),
                format!("an array of {} is written as a string array", array.data_type()),
            ));
        }
        write_array(
            storage,
            path,
            array.shape().to_vec(),
            array.data_type().clone(),
            array.bytes().as_borrowed(),
            options,
            encoding_attributes(self),
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
        let NodeMetadata::Array(_) = metadata else {
            return Err(ElemError::Invalid(path.clone(), "expected an array".to_string()));
        };
        let array = read_dense(storage, path)?;
        if !array.is_fixed_size() {
            return Err(ElemError::Invalid(
                path.clone(),
                format!("unexpected data type {}", array.data_type()),
            ));
        }
        Ok(Elem::Array(array))
    }
}

/// The `numeric-scalar` encoding of a numeric or boolean scalar, written as a zero dimensional array.
#[derive(Clone, Copy, Debug, Default)]
pub struct NumericScalarEncoding;

impl NumericScalarEncoding {
    /// The `encoding-type` attribute.
    pub const ENCODING_TYPE: &'static str = "numeric-scalar";
}

impl ElemEncoding for NumericScalarEncoding {
    fn encoding_type(&self) -> &'static str {
        Self::ENCODING_TYPE
    }

    fn encoding_version(&self) -> &'static str {
        "0.2.0"
    }

    fn encode(
        &self,
        _registry: &ElemRegistry,
        storage: &ReadableWritableListableStorage,
        path: &NodePath,
        elem: &Elem,
        options: &DatasetOptions,
    ) -> Result<(), ElemError> {
        let Elem::Scalar(scalar) = elem else {
            return Err(unexpected_elem(self, path, elem));
        };
        if !scalar.shape().is_empty() || !scalar.is_fixed_size() {
            return Err(ElemError::Invalid(
                path.clone(),
                format!(
                    "a scalar must be a zero dimensional array of a fixed size data type, got {:?} {}",
                    scalar.shape(),
                    scalar.data_type()
                ),
            ));
        }
        write_array(
            storage,
            path,
            vec![],
            scalar.data_type().clone(),
            scalar.bytes().as_borrowed(),
            options,
            encoding_attributes(self),
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
        let NodeMetadata::Array(_) = metadata else {
            return Err(ElemError::Invalid(path.clone(), "expected an array".to_string()));
        };
        let scalar = read_dense(storage, path)?;
        if !scalar.shape().is_empty() || !scalar.is_fixed_size() {
            return Err(ElemError::Invalid(
                path.clone(),
                format!("expected a numeric scalar, got {:?} {}", scalar.shape(), scalar.data_type()),
            ));
        }
        Ok(Elem::Scalar(scalar))
    }
}
