use crate::{
    anndata::Categorical,
    array::{integers_to_i64, DataType, DatasetOptions, Element},
    array_subset::ArraySubset,
    diagnostics::Diagnostics,
    node::{NodeMetadata, NodePath},
    storage::{ReadableListableStorage, ReadableWritableListableStorage},
};

use super::{
    encoding_attributes, open_array, unexpected_elem, write_array, write_group, write_string_array,
    Elem, ElemEncoding, ElemError, ElemRegistry,
};

/// The `categorical` encoding of a [`Categorical`].
///
/// The categorical is a group with an `ordered` attribute, `int32` `codes` and a `categories` string array.
#[derive(Clone, Copy, Debug, Default)]
pub struct CategoricalEncoding;

impl CategoricalEncoding {
    /// The `encoding-type` attribute.
    pub const ENCODING_TYPE: &'static str = "categorical";
}

impl ElemEncoding for CategoricalEncoding {
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
        let Elem::Categorical(categorical) = elem else {
            return Err(unexpected_elem(self, path, elem));
        };
        let mut attributes = encoding_attributes(self);
        attributes.insert("ordered".to_string(), categorical.ordered().into());
        write_group(storage, path, attributes)?;
        write_array(
            storage,
            &path.child("codes")?,
            vec![categorical.len() as u64],
            DataType::Int32,
            i32::into_array_bytes(&DataType::Int32, categorical.codes())?,
            options,
            serde_json::Map::new(),
        )?;
        write_string_array(
            storage,
            &path.child("categories")?,
            categorical.categories(),
            options,
        )
    }

    fn decode(
        &self,
        registry: &ElemRegistry,
        storage: &ReadableListableStorage,
        path: &NodePath,
        metadata: &NodeMetadata,
        diagnostics: &mut Diagnostics,
    ) -> Result<Elem, ElemError> {
        let NodeMetadata::Group(group) = metadata else {
            return Err(ElemError::Invalid(path.clone(), "expected a group".to_string()));
        };
        let ordered = group
            .attributes
            .get("ordered")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        let codes = open_array(storage, &path.child("codes")?)?;
        if codes.dimensionality() != 1 {
            return Err(ElemError::Invalid(
                path.clone(),
                format!("codes have shape {:?}", codes.shape()),
            ));
        }
        let bytes =
            codes.retrieve_array_subset(&ArraySubset::new_with_shape(codes.shape().to_vec()))?;
        let codes = integers_to_i64(codes.data_type(), bytes)?
            .into_iter()
            .map(i32::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ElemError::Invalid(path.clone(), "code out of range".to_string()))?;

        let categories = match registry.read_elem(storage, &path.child("categories")?, diagnostics)? {
            Elem::StringArray(categories) => categories,
            elem => {
                return Err(ElemError::Invalid(
                    path.clone(),
                    format!("expected string categories, got a {} element", elem.encoding_type()),
                ))
            }
        };
        let categorical = Categorical::new(codes, categories, ordered)
            .map_err(|err| ElemError::Invalid(path.clone(), err.to_string()))?;
        Ok(Elem::Categorical(categorical))
    }
}
