//! Resolution of legacy on-disk layouts.
//!
//! Stores written before the `encoding-type` attribute convention are decoded by structural inspection:
//! - untagged groups are sparse matrices if they carry `h5sparse_format`/`h5sparse_shape` attributes, otherwise mappings,
//! - fixed-length (`S<n>`) strings are decoded to strings, and a single fixed-length string is unwrapped to a bare string,
//! - structured (compound) record arrays are data frames with one column per field, the first field being the row index,
//! - the raw snapshot may be a `raw` group or the top-level `raw.X`, `raw.var` and `raw.varm` nodes ([`RawLayout`]),
//! - categories of `obs`/`var` columns may be held in `uns` under `<column>_categories` ([`clean_uns`]).
//!
//! Each resolution raises a [`CompatibilityWarning`](crate::diagnostics::CompatibilityWarning) naming the node.

use crate::{
    anndata::{Categorical, DataFrame},
    array::{integers_to_i64, DataType, StructuredField},
    convert::{sparse_attributes, SparseDataset},
    diagnostics::Diagnostics,
    elem::{index_strings, read_children, read_dense, Elem, ElemError, ElemRegistry, Mapping},
    matrix::DenseArray,
    node::{NodeMetadata, NodePath},
    storage::{node_exists, ListableStorageTraits, ReadableListableStorage, ReadableStorageTraits},
};

/// Decode NUL padded fixed-length strings of `width` bytes.
///
/// # Errors
/// Returns [`ElemError::Invalid`] if `width` is zero, `bytes` is not a multiple of `width`, or a string is not valid UTF-8.
pub fn decode_fixed_strings(
    path: &NodePath,
    bytes: &[u8],
    width: usize,
) -> Result<Vec<String>, ElemError> {
    if width == 0 || bytes.len() % width != 0 {
        return Err(ElemError::Invalid(
            path.clone(),
            format!("{} bytes are not a whole number of S{width} strings", bytes.len()),
        ));
    }
    bytes
        .chunks_exact(width)
        .map(|string| {
            let len = string.iter().rposition(|&byte| byte != 0).map_or(0, |last| last + 1);
            String::from_utf8(string[..len].to_vec())
                .map_err(|err| ElemError::Invalid(path.clone(), err.to_string()))
        })
        .collect()
}

/// Split `num_records` packed structured records into one column per field.
///
/// Fixed-length string fields become string arrays, other fields become one dimensional arrays.
///
/// # Errors
/// Returns [`ElemError::Invalid`] if `bytes` do not hold `num_records` records or a field cannot be decoded.
pub fn decode_records(
    path: &NodePath,
    fields: &[StructuredField],
    bytes: &[u8],
    num_records: usize,
) -> Result<Vec<(String, Elem)>, ElemError> {
    let record_size = DataType::Structured(fields.to_vec())
        .fixed_size()
        .unwrap_or(0);
    if record_size.checked_mul(num_records) != Some(bytes.len()) {
        return Err(ElemError::Invalid(
            path.clone(),
            format!(
                "{} bytes do not hold {num_records} records of {record_size} bytes",
                bytes.len()
            ),
        ));
    }
    let offsets = DataType::field_offsets(fields);
    fields
        .iter()
        .zip(offsets)
        .map(|(field, offset)| {
            let size = field.data_type.fixed_size().unwrap_or(0);
            let field_bytes: Vec<u8> = bytes
                .chunks_exact(record_size.max(1))
                .flat_map(|record| &record[offset..offset + size])
                .copied()
                .collect();
            let column = match &field.data_type {
                DataType::FixedBytes(width) => {
                    Elem::StringArray(decode_fixed_strings(path, &field_bytes, *width)?)
                }
                DataType::Structured(_) | DataType::String => {
                    return Err(ElemError::Invalid(
                        path.clone(),
                        format!("field {} has unsupported type {}", field.name, field.data_type),
                    ))
                }
                data_type => Elem::Array(DenseArray::new(
                    vec![num_records as u64],
                    data_type.clone(),
                    field_bytes.into(),
                )?),
            };
            Ok((field.name.clone(), column))
        })
        .collect()
}

/// Build a data frame from record columns, the first column being the row index.
fn records_to_dataframe(
    path: &NodePath,
    columns: Vec<(String, Elem)>,
) -> Result<DataFrame, ElemError> {
    let mut columns = columns.into_iter();
    let Some((index_name, index)) = columns.next() else {
        return Err(ElemError::Invalid(
            path.clone(),
            "a record array without fields has no index".to_string(),
        ));
    };
    let mut df = DataFrame::new(index_strings(path, index)?).with_index_name(index_name);
    for (name, column) in columns {
        df.insert_column(name, column)
            .map_err(|err| ElemError::Invalid(path.clone(), err.to_string()))?;
    }
    Ok(df)
}

/// Decode a node without an `encoding-type` attribute by inspecting its structure.
///
/// # Errors
/// Returns an [`ElemError`] if the node cannot be interpreted or a read fails.
pub fn read_untagged(
    registry: &ElemRegistry,
    storage: &ReadableListableStorage,
    path: &NodePath,
    metadata: &NodeMetadata,
    diagnostics: &mut Diagnostics,
) -> Result<Elem, ElemError> {
    if let NodeMetadata::Group(group) = metadata {
        if sparse_attributes(&group.attributes).is_some() {
            diagnostics.warn(path.key(), "read an h5sparse matrix without an encoding-type");
            let dataset = SparseDataset::open(storage.clone(), path, metadata)?;
            return Ok(Elem::Sparse(dataset.to_memory()?));
        }
        diagnostics.warn(path.key(), "read a group without an encoding-type as a mapping");
        return Ok(Elem::Mapping(read_children(registry, storage, path, diagnostics)?));
    }

    let dense = read_dense(storage, path)?;
    let shape = dense.shape().to_vec();
    let data_type = dense.data_type().clone();
    match data_type {
        DataType::FixedBytes(width) => {
            let strings = decode_fixed_strings(path, &dense.into_bytes().into_fixed()?, width)?;
            match (shape.as_slice(), <[String; 1]>::try_from(strings)) {
                ([] | [1], Ok([string])) => {
                    diagnostics.warn(path.key(), "unwrapped a fixed-length string to a string");
                    Ok(Elem::String(string))
                }
                ([_], Err(strings)) => {
                    diagnostics.warn(path.key(), "read fixed-length strings as a string array");
                    Ok(Elem::StringArray(strings))
                }
                _ => Err(ElemError::Invalid(
                    path.clone(),
                    format!("fixed-length strings with shape {shape:?}"),
                )),
            }
        }
        DataType::String => {
            let strings = dense.elements::<String>()?;
            diagnostics.warn(path.key(), "read strings without an encoding-type");
            match (shape.as_slice(), <[String; 1]>::try_from(strings)) {
                ([], Ok([string])) => Ok(Elem::String(string)),
                ([_], Ok(strings)) => Ok(Elem::StringArray(strings.into())),
                ([_], Err(strings)) => Ok(Elem::StringArray(strings)),
                _ => Err(ElemError::Invalid(
                    path.clone(),
                    format!("strings with shape {shape:?}"),
                )),
            }
        }
        DataType::Structured(fields) => {
            if shape.len() != 1 {
                return Err(ElemError::Invalid(
                    path.clone(),
                    format!("records with shape {shape:?}"),
                ));
            }
            diagnostics.warn(path.key(), "read a record array as a data frame");
            let num_records = dense.len();
            let bytes = dense.into_bytes().into_fixed()?;
            let columns = decode_records(
                path,
                &fields,
                &bytes,
                usize::try_from(num_records).unwrap_or(usize::MAX),
            )?;
            Ok(Elem::DataFrame(records_to_dataframe(path, columns)?))
        }
        _ => {
            diagnostics.warn(path.key(), "read an array without an encoding-type");
            if shape.is_empty() {
                Ok(Elem::Scalar(dense))
            } else {
                Ok(Elem::Array(dense))
            }
        }
    }
}

/// The layout of the raw snapshot in a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawLayout {
    /// There is no raw snapshot.
    Absent,
    /// A `raw` group with `X`, `var` and `varm` children.
    Subtree,
    /// The legacy top-level `raw.X`, `raw.var` and `raw.varm` nodes.
    Dotted,
}

const DOTTED_RAW_NAMES: [&str; 3] = ["raw.X", "raw.var", "raw.varm"];

impl RawLayout {
    /// Detect the raw snapshot layout of the hierarchy below `root` by node existence.
    ///
    /// A dotted layout raises a compatibility warning.
    ///
    /// # Errors
    /// Returns [`ElemError::Invalid`] if both layouts are present, or an [`ElemError`] if a store read fails.
    pub fn detect<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits>(
        storage: &TStorage,
        root: &NodePath,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self, ElemError> {
        let subtree = node_exists(storage, &root.child("raw")?)?;
        let mut dotted = false;
        for name in DOTTED_RAW_NAMES {
            dotted |= node_exists(storage, &root.child(name)?)?;
        }
        match (subtree, dotted) {
            (true, true) => Err(ElemError::Invalid(
                root.clone(),
                "both a raw group and raw.* nodes are present".to_string(),
            )),
            (true, false) => Ok(Self::Subtree),
            (false, true) => {
                diagnostics.warn("raw", "read the raw snapshot from raw.X, raw.var and raw.varm");
                Ok(Self::Dotted)
            }
            (false, false) => Ok(Self::Absent),
        }
    }

    fn field_path(self, root: &NodePath, field: &str) -> Result<Option<NodePath>, ElemError> {
        Ok(match self {
            Self::Absent => None,
            Self::Subtree => Some(root.child("raw")?.child(field)?),
            Self::Dotted => Some(root.child(&format!("raw.{field}"))?),
        })
    }

    /// The path of the raw matrix, or [`None`] if the raw snapshot is absent.
    ///
    /// # Errors
    /// Returns [`ElemError::NodePathError`] if `root` cannot have children.
    pub fn x_path(self, root: &NodePath) -> Result<Option<NodePath>, ElemError> {
        self.field_path(root, "X")
    }

    /// The path of the raw variable table, or [`None`] if the raw snapshot is absent.
    ///
    /// # Errors
    /// Returns [`ElemError::NodePathError`] if `root` cannot have children.
    pub fn var_path(self, root: &NodePath) -> Result<Option<NodePath>, ElemError> {
        self.field_path(root, "var")
    }

    /// The path of the raw variable annotations, or [`None`] if the raw snapshot is absent.
    ///
    /// # Errors
    /// Returns [`ElemError::NodePathError`] if `root` cannot have children.
    pub fn varm_path(self, root: &NodePath) -> Result<Option<NodePath>, ElemError> {
        self.field_path(root, "varm")
    }

    /// Returns true if `name` is a root child belonging to a raw snapshot layout.
    #[must_use]
    pub fn is_raw_name(name: &str) -> bool {
        name == "raw" || DOTTED_RAW_NAMES.contains(&name)
    }
}

const CATEGORIES_SUFFIX: &str = "_categories";

fn legacy_categorical(column: &Elem, categories: &[String]) -> Option<Categorical> {
    let Elem::Array(codes) = column else {
        return None;
    };
    if codes.shape().len() != 1 || !codes.data_type().is_integer() {
        return None;
    }
    let codes = integers_to_i64(codes.data_type(), codes.bytes().as_borrowed()).ok()?;
    let codes = codes
        .into_iter()
        .map(i32::try_from)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    Categorical::new(codes, categories.to_vec(), false).ok()
}

/// Move legacy categories from `uns` into the `obs` and `var` columns they belong to.
///
/// An entry `<column>_categories` of `uns` holding strings is applied to every integer column named `<column>` of `obs` or `var` whose codes are in range.
/// Applied entries are removed from `uns`, each raising a compatibility warning.
pub fn clean_uns(
    uns: &mut Mapping,
    obs: &mut DataFrame,
    var: &mut DataFrame,
    diagnostics: &mut Diagnostics,
) {
    let keys: Vec<String> = uns
        .keys()
        .filter(|key| key.len() > CATEGORIES_SUFFIX.len() && key.ends_with(CATEGORIES_SUFFIX))
        .cloned()
        .collect();
    for key in keys {
        let Some(Elem::StringArray(categories)) = uns.get(&key) else {
            continue;
        };
        let name = &key[..key.len() - CATEGORIES_SUFFIX.len()];
        let mut applied = false;
        for (field, df) in [("obs", &mut *obs), ("var", &mut *var)] {
            let Some(categorical) = df
                .column(name)
                .and_then(|column| legacy_categorical(column, categories))
            else {
                continue;
            };
            if df.insert_column(name, Elem::Categorical(categorical)).is_ok() {
                diagnostics.warn(
                    format!("uns/{key}"),
                    format!("moved legacy categories to the {field} column {name}"),
                );
                applied = true;
            }
        }
        if applied {
            uns.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, sync::Arc};

    use crate::{
        array::{ArrayBytes, DatasetOptions},
        elem::{default_registry, read_elem, write_array, write_elem},
        group::Attributes,
        matrix::{SparseLayout, SparseMatrix},
        storage::{store::MemoryStore, ReadableWritableListableStorage},
    };

    use super::*;

    fn stores() -> (ReadableWritableListableStorage, ReadableListableStorage) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), store)
    }

    fn untagged(
        storage: &ReadableWritableListableStorage,
        path: &NodePath,
        shape: Vec<u64>,
        data_type: DataType,
        bytes: Vec<u8>,
    ) -> Result<(), Box<dyn Error>> {
        write_array(
            storage,
            path,
            shape,
            data_type,
            ArrayBytes::new_flen(bytes),
            &DatasetOptions::default(),
            Attributes::new(),
        )?;
        Ok(())
    }

    #[test]
    fn legacy_fixed_strings() -> Result<(), Box<dyn Error>> {
        let path = NodePath::new("/obs")?;
        assert_eq!(
            decode_fixed_strings(&path, b"ab\0\0abcd\0\0\0\0", 4)?,
            vec!["ab".to_string(), "abcd".to_string(), String::new()]
        );
        assert!(decode_fixed_strings(&path, b"abc", 2).is_err());
        assert!(decode_fixed_strings(&path, b"", 0).is_err());
        assert!(decode_fixed_strings(&path, &[0xff, 0xfe], 2).is_err());
        Ok(())
    }

    #[test]
    fn legacy_string_unwrap() -> Result<(), Box<dyn Error>> {
        let (writable, readable) = stores();
        let single = NodePath::new("/uns/title")?;
        let many = NodePath::new("/uns/names")?;
        untagged(&writable, &single, vec![1], DataType::FixedBytes(8), b"pbmc3k\0\0".to_vec())?;
        untagged(&writable, &many, vec![2], DataType::FixedBytes(2), b"a\0bc".to_vec())?;

        let mut diagnostics = Diagnostics::new();
        assert_eq!(
            read_elem(&readable, &single, &mut diagnostics)?,
            Elem::String("pbmc3k".to_string())
        );
        assert_eq!(
            read_elem(&readable, &many, &mut diagnostics)?,
            Elem::StringArray(vec!["a".to_string(), "bc".to_string()])
        );
        let keys: Vec<&str> = diagnostics.warnings().iter().map(|w| w.key()).collect();
        assert_eq!(keys, ["uns/title", "uns/names"]);
        Ok(())
    }

    #[test]
    fn legacy_record_dataframe() -> Result<(), Box<dyn Error>> {
        let (writable, readable) = stores();
        let path = NodePath::new("/obs")?;
        let fields = vec![
            StructuredField::new("index", DataType::FixedBytes(3)),
            StructuredField::new("n_genes", DataType::Int32),
            StructuredField::new("batch", DataType::FixedBytes(1)),
        ];
        let mut bytes = Vec::new();
        for (index, n_genes, batch) in [(b"c1\0", 10i32, b"a"), (b"c22", -3, b"b")] {
            bytes.extend_from_slice(index);
            bytes.extend_from_slice(&n_genes.to_le_bytes());
            bytes.extend_from_slice(batch);
        }
        untagged(&writable, &path, vec![2], DataType::Structured(fields), bytes)?;

        let mut diagnostics = Diagnostics::new();
        let expected = DataFrame::new(vec!["c1".to_string(), "c22".to_string()])
            .with_index_name("index")
            .with_column(
                "n_genes",
                Elem::Array(DenseArray::from_elements(vec![2], DataType::Int32, &[10i32, -3])?),
            )?
            .with_column("batch", vec!["a".to_string(), "b".to_string()].into())?;
        assert_eq!(
            read_elem(&readable, &path, &mut diagnostics)?,
            Elem::DataFrame(expected)
        );
        assert_eq!(diagnostics.warnings().len(), 1);
        Ok(())
    }

    #[test]
    fn legacy_untagged_groups() -> Result<(), Box<dyn Error>> {
        let (writable, readable) = stores();
        let matrix = SparseMatrix::from_elements(
            SparseLayout::Csr,
            [2, 2],
            DataType::Float32,
            &[1.0f32, 2.0],
            vec![1, 0],
            vec![0, 1, 2],
        )?;
        let path = NodePath::new("/X")?;
        write_elem(&writable, &path, &Elem::Sparse(matrix.clone()), &DatasetOptions::default())?;
        // Rewrite the group metadata with the h5sparse attributes only
        let mut attributes = Attributes::new();
        attributes.insert("h5sparse_format".to_string(), "csr".into());
        attributes.insert("h5sparse_shape".to_string(), vec![2u64, 2].into());
        crate::elem::write_group(&writable, &path, attributes)?;

        let uns = NodePath::new("/uns")?;
        untagged(&writable, &uns.child("n")?, vec![], DataType::UInt8, vec![7])?;
        crate::elem::write_group(&writable, &uns, Attributes::new())?;

        let mut diagnostics = Diagnostics::new();
        assert_eq!(read_elem(&readable, &path, &mut diagnostics)?, Elem::Sparse(matrix));
        let mut expected = Mapping::new();
        expected.insert("n".to_string(), Elem::scalar(DataType::UInt8, 7u8)?);
        assert_eq!(
            default_registry().read_elem(&readable, &uns, &mut diagnostics)?,
            Elem::Mapping(expected)
        );
        assert_eq!(diagnostics.warnings().len(), 3);
        Ok(())
    }

    #[test]
    fn legacy_raw_layout() -> Result<(), Box<dyn Error>> {
        let (writable, readable) = stores();
        let root = NodePath::root();
        let mut diagnostics = Diagnostics::new();
        assert_eq!(RawLayout::detect(&*readable, &root, &mut diagnostics)?, RawLayout::Absent);
        assert_eq!(RawLayout::Absent.x_path(&root)?, None);

        write_elem(&writable, &NodePath::new("/raw.var")?, &Elem::DataFrame(DataFrame::with_default_index(2)), &DatasetOptions::default())?;
        assert_eq!(RawLayout::detect(&*readable, &root, &mut diagnostics)?, RawLayout::Dotted);
        assert_eq!(diagnostics.warnings().len(), 1);
        assert_eq!(
            RawLayout::Dotted.var_path(&root)?,
            Some(NodePath::new("/raw.var")?)
        );
        assert_eq!(
            RawLayout::Subtree.varm_path(&root)?,
            Some(NodePath::new("/raw/varm")?)
        );

        write_elem(&writable, &NodePath::new("/raw/var")?, &Elem::DataFrame(DataFrame::with_default_index(2)), &DatasetOptions::default())?;
        assert!(matches!(
            RawLayout::detect(&*readable, &root, &mut diagnostics),
            Err(ElemError::Invalid(..))
        ));
        assert!(RawLayout::is_raw_name("raw.X"));
        assert!(!RawLayout::is_raw_name("rawX"));
        Ok(())
    }

    #[test]
    fn legacy_clean_uns() -> Result<(), Box<dyn Error>> {
        let codes = Elem::Array(DenseArray::from_elements(vec![3], DataType::Int8, &[1i8, 0, 1])?);
        let mut obs = DataFrame::with_default_index(3).with_column("louvain", codes.clone())?;
        let mut var = DataFrame::with_default_index(3).with_column("louvain", codes)?;
        let out_of_range = Elem::Array(DenseArray::from_elements(vec![3], DataType::Int8, &[5i8, 0, 1])?);
        obs.insert_column("batch", out_of_range.clone())?;

        let mut uns = Mapping::new();
        uns.insert("louvain_categories".to_string(), vec!["a".to_string(), "b".to_string()].into());
        uns.insert("batch_categories".to_string(), vec!["x".to_string(), "y".to_string()].into());
        uns.insert("_categories".to_string(), vec!["z".to_string()].into());

        let mut diagnostics = Diagnostics::new();
        clean_uns(&mut uns, &mut obs, &mut var, &mut diagnostics);

        let expected = Elem::Categorical(Categorical::new(
            vec![1, 0, 1],
            vec!["a".to_string(), "b".to_string()],
            false,
        )?);
        assert_eq!(obs.column("louvain"), Some(&expected));
        assert_eq!(var.column("louvain"), Some(&expected));
        assert_eq!(obs.column("batch"), Some(&out_of_range));
        assert_eq!(
            uns.keys().collect::<Vec<_>>(),
            ["_categories", "batch_categories"]
        );
        assert_eq!(diagnostics.warnings().len(), 2);
        Ok(())
    }
}
