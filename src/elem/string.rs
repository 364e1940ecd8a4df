use crate::{
    array::{ArrayShape, DataType, DatasetOptions, Element, ElementOwned},
    diagnostics::Diagnostics,
    legacy::decode_fixed_strings,
    node::{NodeMetadata, NodePath},
    storage::{ReadableListableStorage, ReadableWritableListableStorage},
};

use super::{
    encoding_attributes, read_dense, unexpected_elem, write_array, Elem, ElemEncoding, ElemError,
    ElemRegistry,
};

/// The `string-array` encoding of a one dimensional array of strings.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringArrayEncoding;

impl StringArrayEncoding {
    /// The `encoding-type` attribute.
    pub const ENCODING_TYPE: &'static str = "string-array";
}

/// Write `strings` as a `string-array` at `path`.
pub(crate) fn write_string_array(
    storage: &ReadableWritableListableStorage,
    path: &NodePath,
    strings: &[String],
    options: &DatasetOptions,
) -> Result<(), ElemError> {
    write_strings(storage, path, vec![strings.len() as u64], strings, options, &StringArrayEncoding)
}

fn write_strings(
    storage: &ReadableWritableListableStorage,
    path: &NodePath,
    shape: ArrayShape,
    strings: &[String],
    options: &DatasetOptions,
    encoding: &dyn ElemEncoding,
) -> Result<(), ElemError> {
    let bytes = String::into_array_bytes(&DataType::String, strings)?;
    write_array(
        storage,
        path,
        shape,
        DataType::String,
        bytes,
        options,
        encoding_attributes(encoding),
    )
}

/// Read the strings of the array at `path`, decoding fixed length strings.
fn read_strings(
    storage: &ReadableListableStorage,
    path: &NodePath,
) -> Result<(ArrayShape, Vec<String>), ElemError> {
    let array = read_dense(storage, path)?;
    let shape = array.shape().to_vec();
    let data_type = array.data_type().clone();
    let strings = match data_type {
        DataType::String => String::from_array_bytes(&data_type, array.into_bytes())?,
        DataType::FixedBytes(width) => {
            decode_fixed_strings(path, &array.into_bytes().into_fixed()?, width)?
        }
        data_type => {
            return Err(ElemError::Invalid(
                path.clone(),
                format!("expected strings, got {data_type}"),
            ))
        }
    };
    Ok((shape, strings))
}

impl ElemEncoding for StringArrayEncoding {
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
        let Elem::StringArray(strings) = elem else {
            return Err(unexpected_elem(self, path, elem));
        };
        write_string_array(storage, path, strings, options)
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
        let (shape, strings) = read_strings(storage, path)?;
        if shape.len() != 1 {
            return Err(ElemError::Invalid(
                path.clone(),
                format!("expected a one dimensional string array, got shape {shape:?}"),
            ));
        }
        Ok(Elem::StringArray(strings))
    }
}

/// The `string` encoding of a single string, written as a zero dimensional array.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringEncoding;

impl StringEncoding {
    /// The `encoding-type` attribute.
    pub const ENCODING_TYPE: &'static str = "string";
}

impl ElemEncoding for StringEncoding {
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
        let Elem::String(string) = elem else {
            return Err(unexpected_elem(self, path, elem));
        };
        write_strings(
            storage,
            path,
            vec![],
            std::slice::from_ref(string),
            options,
            self,
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
        let (shape, strings) = read_strings(storage, path)?;
        match (shape.as_slice(), <[String; 1]>::try_from(strings)) {
            ([], Ok([string])) => Ok(Elem::String(string)),
            _ => Err(ElemError::Invalid(
                path.clone(),
                format!("expected a zero dimensional string, got shape {shape:?}"),
            )),
        }
    }
}
