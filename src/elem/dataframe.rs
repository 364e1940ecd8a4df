use crate::{
    anndata::DataFrame,
    array::{integers_to_i64, DatasetOptions},
    diagnostics::Diagnostics,
    node::{NodeMetadata, NodePath},
    storage::{ReadableListableStorage, ReadableWritableListableStorage},
};

use super::{
    encoding_attributes, unexpected_elem, write_group, write_string_array, Elem, ElemEncoding,
    ElemError, ElemRegistry,
};

/// The `dataframe` encoding of a [`DataFrame`].
///
/// The data frame is a group with an `_index` attribute naming the index child, a `column-order` attribute listing the column children, and one child per column.
#[derive(Clone, Copy, Debug, Default)]
pub struct DataFrameEncoding;

impl DataFrameEncoding {
    /// The `encoding-type` attribute.
    pub const ENCODING_TYPE: &'static str = "dataframe";
}

/// Convert an index element to strings.
///
/// String arrays are used as is and integer arrays are formatted.
pub(crate) fn index_strings(path: &NodePath, elem: Elem) -> Result<Vec<String>, ElemError> {
    match elem {
        Elem::StringArray(index) => Ok(index),
        Elem::Array(array) if array.shape().len() == 1 && array.data_type().is_integer() => {
            let data_type = array.data_type().clone();
            Ok(integers_to_i64(&data_type, array.into_bytes())?
                .into_iter()
                .map(|value| value.to_string())
                .collect())
        }
        elem => Err(ElemError::Invalid(
            path.clone(),
            format!("a {} element is not a valid index", elem.encoding_type()),
        )),
    }
}

impl ElemEncoding for DataFrameEncoding {
    fn encoding_type(&self) -> &'static str {
        Self::ENCODING_TYPE
    }

    fn encoding_version(&self) -> &'static str {
        "0.2.0"
    }

    fn supports_version(&self, version: &str) -> bool {
        matches!(version, "0.1.0" | "0.2.0")
    }

    fn encode(
        &self,
        registry: &ElemRegistry,
        storage: &ReadableWritableListableStorage,
        path: &NodePath,
        elem: &Elem,
        options: &DatasetOptions,
    ) -> Result<(), ElemError> {
        let Elem::DataFrame(df) = elem else {
            return Err(unexpected_elem(self, path, elem));
        };
        let mut attributes = encoding_attributes(self);
        attributes.insert("_index".to_string(), df.index_name().into());
        attributes.insert(
            "column-order".to_string(),
            df.column_names().collect::<Vec<_>>().into(),
        );
        write_group(storage, path, attributes)?;
        write_string_array(storage, &path.child(df.index_name())?, df.index(), options)?;
        for (name, column) in df.columns() {
            registry.write_elem(storage, &path.child(name)?, column, options)?;
        }
        Ok(())
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
        let index_name = group
            .attributes
            .get("_index")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ElemError::Invalid(path.clone(), "missing _index attribute".to_string()))?;
        let column_order: Vec<&str> = match group.attributes.get("column-order") {
            None => vec![],
            Some(serde_json::Value::Array(names)) => names
                .iter()
                .map(|name| {
                    name.as_str().ok_or_else(|| {
                        ElemError::Invalid(path.clone(), "invalid column-order attribute".to_string())
                    })
                })
                .collect::<Result<_, _>>()?,
            // a single column is sometimes written as a bare string
            Some(serde_json::Value::String(name)) => vec![name.as_str()],
            Some(_) => {
                return Err(ElemError::Invalid(
                    path.clone(),
                    "invalid column-order attribute".to_string(),
                ))
            }
        };

        let index_path = path.child(index_name)?;
        let index = index_strings(
            &index_path,
            registry.read_elem(storage, &index_path, diagnostics)?,
        )?;
        let mut df = DataFrame::new(index).with_index_name(index_name);
        for name in column_order {
            let column = registry.read_elem(storage, &path.child(name)?, diagnostics)?;
            df.insert_column(name, column)
                .map_err(|err| ElemError::Invalid(path.clone(), err.to_string()))?;
        }
        Ok(Elem::DataFrame(df))
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, sync::Arc};

    use crate::{
        array::{DataType, Element},
        elem::{read_elem, write_array, write_elem},
        group::Attributes,
        matrix::DenseArray,
        storage::store::MemoryStore,
    };

    use super::*;

    #[test]
    fn dataframe_integer_index() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        let writable: ReadableWritableListableStorage = store.clone();
        let readable: ReadableListableStorage = store;
        let path = NodePath::new("/var")?;
        let mut attributes = encoding_attributes(&DataFrameEncoding);
        attributes.insert("_index".to_string(), "id".into());
        attributes.insert("column-order".to_string(), "n".into());
        write_group(&writable, &path, attributes)?;
        write_array(
            &writable,
            &path.child("id")?,
            vec![2],
            DataType::UInt16,
            u16::into_array_bytes(&DataType::UInt16, &[10, 11])?,
            &DatasetOptions::default(),
            Attributes::new(),
        )?;
        write_elem(
            &writable,
            &path.child("n")?,
            &Elem::Array(DenseArray::from_elements(vec![2], DataType::Int8, &[1i8, 2])?),
            &DatasetOptions::default(),
        )?;

        let mut diagnostics = Diagnostics::new();
        let Elem::DataFrame(df) = read_elem(&readable, &path, &mut diagnostics)? else {
            panic!("expected a data frame");
        };
        assert_eq!(df.index_name(), "id");
        assert_eq!(df.index(), ["10", "11"]);
        assert_eq!(df.column_names().collect::<Vec<_>>(), ["n"]);
        // the untagged index is a legacy array
        assert_eq!(diagnostics.warnings().len(), 1);
        Ok(())
    }

    #[test]
    fn dataframe_column_length_mismatch() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        let writable: ReadableWritableListableStorage = store.clone();
        let readable: ReadableListableStorage = store;
        let path = NodePath::new("/obs")?;
        let df = DataFrame::with_default_index(2);
        write_elem(&writable, &path, &Elem::DataFrame(df), &DatasetOptions::default())?;
        // add a column of the wrong length behind the codec's back
        let mut attributes = encoding_attributes(&DataFrameEncoding);
        attributes.insert("_index".to_string(), "_index".into());
        attributes.insert("column-order".to_string(), vec!["bad"].into());
        write_group(&writable, &path, attributes)?;
        write_string_array(&writable, &path.child("bad")?, &["x".to_string()], &DatasetOptions::default())?;

        let mut diagnostics = Diagnostics::new();
        assert!(matches!(
            read_elem(&readable, &path, &mut diagnostics),
            Err(ElemError::Invalid(..))
        ));
        Ok(())
    }
}
