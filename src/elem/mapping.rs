use crate::{
    array::DatasetOptions,
    diagnostics::Diagnostics,
    node::{NodeMetadata, NodePath},
    storage::{discover_children, ReadableListableStorage, ReadableWritableListableStorage},
};

use super::{
    encoding_attributes, unexpected_elem, write_group, Elem, ElemEncoding, ElemError, ElemRegistry,
    Mapping,
};

/// The `dict` encoding of a [`Mapping`], written as a group with one child per entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct MappingEncoding;

impl MappingEncoding {
    /// The `encoding-type` attribute.
    pub const ENCODING_TYPE: &'static str = "dict";
}

/// Read every child of the group at `path` into a [`Mapping`].
pub(crate) fn read_children(
    registry: &ElemRegistry,
    storage: &ReadableListableStorage,
    path: &NodePath,
    diagnostics: &mut Diagnostics,
) -> Result<Mapping, ElemError> {
    let mut mapping = Mapping::new();
    for prefix in discover_children(&**storage, path)? {
        let Some(name) = prefix.name() else {
            continue;
        };
        let child = path.child(name)?;
        mapping.insert(name.to_string(), registry.read_elem(storage, &child, diagnostics)?);
    }
    Ok(mapping)
}

impl ElemEncoding for MappingEncoding {
    fn encoding_type(&self) -> &'static str {
        Self::ENCODING_TYPE
    }

    fn encoding_version(&self) -> &'static str {
        "0.1.0"
    }

    fn encode(
        &self,
        registry: &ElemRegistry,
        storage: &ReadableWritableListableStorage,
        path: &NodePath,
        elem: &Elem,
        options: &DatasetOptions,
    ) -> Result<(), ElemError> {
        let Elem::Mapping(mapping) = elem else {
            return Err(unexpected_elem(self, path, elem));
        };
        write_group(storage, path, encoding_attributes(self))?;
        for (name, value) in mapping {
            registry.write_elem(storage, &path.child(name)?, value, options)?;
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
        let NodeMetadata::Group(_) = metadata else {
            return Err(ElemError::Invalid(path.clone(), "expected a group".to_string()));
        };
        Ok(Elem::Mapping(read_children(registry, storage, path, diagnostics)?))
    }
}
