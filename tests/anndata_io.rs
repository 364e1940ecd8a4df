use std::{error::Error, sync::Arc};

use zarrs_anndata::{
    anndata::{AnnData, AnnDataFields, DataFrame, ErrorKind, Matrix, Raw},
    array::{ArrayBuilder, DataType, DatasetOptions},
    convert::{dense_to_sparse, sparse_to_dense},
    diagnostics::Diagnostics,
    elem::{read_elem, write_elem, Elem, Mapping},
    group::{Attributes, GroupMetadata},
    io::{read_anndata, read_anndata_backed, write_anndata, ReadOptions, WriteOptions},
    matrix::{DenseArray, SparseLayout, SparseMatrix},
    node::{retrieve_node_metadata, NodePath},
    storage::{
        create_group, node_exists,
        store::{FilesystemStore, MemoryStore},
        ReadableListableStorage, ReadableWritableListableStorage,
    },
};

type TestResult = Result<(), Box<dyn Error>>;

fn memory_storage() -> (ReadableWritableListableStorage, ReadableListableStorage) {
    let store = Arc::new(MemoryStore::new());
    (store.clone(), store)
}

fn filesystem_storage(
    path: &std::path::Path,
) -> Result<(ReadableWritableListableStorage, ReadableListableStorage), Box<dyn Error>> {
    let store = Arc::new(FilesystemStore::new(path)?);
    Ok((store.clone(), store))
}

/// A 100x50 matrix with roughly one nonzero element in eleven.
fn dense_100x50() -> Result<DenseArray, Box<dyn Error>> {
    let elements: Vec<f64> = (0..100u32)
        .flat_map(|row| (0..50u32).map(move |col| (row, col)))
        .map(|(row, col)| {
            if (row * 7 + col * 3) % 11 == 0 {
                f64::from(row * 50 + col) + 0.5
            } else {
                0.0
            }
        })
        .collect();
    Ok(DenseArray::from_elements(vec![100, 50], DataType::Float64, &elements)?)
}

fn root_attribute(storage: &ReadableListableStorage, name: &str) -> Result<Option<String>, Box<dyn Error>> {
    let metadata = retrieve_node_metadata(&**storage, &NodePath::root())?;
    Ok(metadata.and_then(|metadata| metadata.string_attribute(name).map(ToString::to_string)))
}

fn encoding_type(storage: &ReadableListableStorage, path: &str) -> Result<Option<String>, Box<dyn Error>> {
    let metadata = retrieve_node_metadata(&**storage, &NodePath::new(path)?)?;
    Ok(metadata.and_then(|metadata| metadata.string_attribute("encoding-type").map(ToString::to_string)))
}

#[test]
fn sparse_x_written_dense_read_sparse() -> TestResult {
    let (writable, readable) = memory_storage();
    let dense = dense_100x50()?;
    let x = SparseMatrix::from_dense(&dense, SparseLayout::Csr)?;
    let adata = AnnData::new(x.clone())?;
    write_anndata(&adata, &writable, &WriteOptions::new().as_dense(["X"]).chunk_size(13))?;
    assert_eq!(encoding_type(&readable, "/X")?.as_deref(), Some("array"));

    let outcome = read_anndata(&readable, &ReadOptions::new())?;
    assert_eq!(outcome.adata.x(), Some(&Matrix::Dense(dense.clone())));

    let options = ReadOptions::new().as_sparse(["X"]).chunk_size(7);
    let outcome = read_anndata(&readable, &options)?;
    assert_eq!(outcome.adata.x(), Some(&Matrix::Sparse(x)));
    assert!(outcome.warnings.is_empty());

    let options = options.as_sparse_layout("csc");
    let outcome = read_anndata(&readable, &options)?;
    let csc = SparseMatrix::from_dense(&dense, SparseLayout::Csc)?;
    assert_eq!(outcome.adata.x(), Some(&Matrix::Sparse(csc)));
    Ok(())
}

#[test]
fn absent_raw_leaves_no_raw_subtree() -> TestResult {
    let (writable, readable) = memory_storage();
    let adata = AnnData::new(dense_100x50()?)?;
    write_anndata(&adata, &writable, &WriteOptions::new())?;
    for path in ["/raw", "/raw.X", "/raw.var", "/raw.varm"] {
        assert!(!node_exists(&*readable, &NodePath::new(path)?)?);
    }
    let outcome = read_anndata(&readable, &ReadOptions::new())?;
    assert!(outcome.adata.raw().is_none());
    assert_eq!(outcome.adata.x(), adata.x());
    Ok(())
}

#[test]
fn resave_keeps_encoding_version() -> TestResult {
    let (writable, readable) = memory_storage();
    write_anndata(&AnnData::new(dense_100x50()?)?, &writable, &WriteOptions::new())?;
    assert_eq!(root_attribute(&readable, "encoding-version")?.as_deref(), Some("0.1.0"));

    let outcome = read_anndata_backed(writable.clone(), &ReadOptions::new())?;
    let mut attributes = Attributes::new();
    attributes.insert("encoding-type".to_string(), "anndata".into());
    attributes.insert("encoding-version".to_string(), "0.1.0+local".into());
    create_group(&*writable, &NodePath::root(), &GroupMetadata::new(attributes))?;

    write_anndata(&outcome.adata, &writable, &WriteOptions::new())?;
    assert_eq!(
        root_attribute(&readable, "encoding-version")?.as_deref(),
        Some("0.1.0+local")
    );
    assert_eq!(encoding_type(&readable, "/X")?.as_deref(), Some("array"));
    Ok(())
}

/// Densify the sparse X of a backed container into its own store and into a different store holding a stale X, and compare the results.
fn densify_in_place(
    (source, source_readable): (ReadableWritableListableStorage, ReadableListableStorage),
    (other, other_readable): (ReadableWritableListableStorage, ReadableListableStorage),
) -> TestResult {
    let dense = dense_100x50()?;
    let x = SparseMatrix::from_dense(&dense, SparseLayout::Csc)?;
    write_anndata(&AnnData::new(x)?, &source, &WriteOptions::new())?;
    write_anndata(&AnnData::new(DenseArray::zeros(vec![4, 4], DataType::Int8))?, &other, &WriteOptions::new())?;

    let backed = read_anndata_backed(source.clone(), &ReadOptions::new())?.adata;
    let options = WriteOptions::new().as_dense(["X"]).chunk_size(9);
    write_anndata(&backed, &other, &options)?;
    write_anndata(&backed, &source, &options)?;

    let in_place = read_anndata(&source_readable, &ReadOptions::new())?;
    let elsewhere = read_anndata(&other_readable, &ReadOptions::new())?;
    assert_eq!(in_place.adata.x(), Some(&Matrix::Dense(dense)));
    assert_eq!(in_place.adata.x(), elsewhere.adata.x());
    assert!(in_place.warnings.is_empty());
    assert!(!node_exists(&*source_readable, &NodePath::new("/_X")?)?);
    Ok(())
}

#[test]
fn densify_in_place_memory() -> TestResult {
    densify_in_place(memory_storage(), memory_storage())
}

#[test]
fn densify_in_place_filesystem() -> TestResult {
    let source = tempfile::TempDir::new()?;
    let other = tempfile::TempDir::new()?;
    densify_in_place(filesystem_storage(source.path())?, filesystem_storage(other.path())?)
}

#[test]
fn backed_write_skips_x_in_own_store() -> TestResult {
    let dir = tempfile::TempDir::new()?;
    let (writable, _) = filesystem_storage(dir.path())?;
    let x = SparseMatrix::from_dense(&dense_100x50()?, SparseLayout::Csr)?;
    write_anndata(&AnnData::new(x.clone())?, &writable, &WriteOptions::new())?;

    // A second handle on the same directory is the same store
    let (reopened, readable) = filesystem_storage(dir.path())?;
    let backed = read_anndata_backed(readable.clone(), &ReadOptions::new())?.adata;
    write_anndata(&backed, &reopened, &WriteOptions::new())?;
    assert_eq!(encoding_type(&readable, "/X")?.as_deref(), Some("csr_matrix"));
    let outcome = read_anndata(&readable, &ReadOptions::new())?;
    assert_eq!(outcome.adata.x(), Some(&Matrix::Sparse(x)));
    Ok(())
}

#[test]
fn backed_without_x_writes_to_other_store() -> TestResult {
    let (source, source_readable) = memory_storage();
    let adata = AnnData::from_fields(AnnDataFields {
        obs: DataFrame::with_default_index(3),
        ..AnnDataFields::default()
    })?;
    write_anndata(&adata, &source, &WriteOptions::new())?;
    let backed = read_anndata_backed(source_readable, &ReadOptions::new())?.adata;
    assert!(backed.x_data_type().is_none());

    for options in [WriteOptions::new(), WriteOptions::new().as_dense(["X"])] {
        let (other, other_readable) = memory_storage();
        write_anndata(&backed, &other, &options)?;
        assert!(!node_exists(&*other_readable, &NodePath::new("/X")?)?);
        let outcome = read_anndata(&other_readable, &ReadOptions::new())?;
        assert!(outcome.adata.x().is_none());
        assert_eq!(outcome.adata.n_obs(), 3);
    }
    Ok(())
}

fn raw_fields() -> Result<(DenseArray, DataFrame), Box<dyn Error>> {
    let x = DenseArray::from_elements(vec![3, 4], DataType::UInt32, &[1u32, 0, 2, 0, 0, 3, 0, 4, 5, 0, 0, 6])?;
    let var = DataFrame::new(["g0", "g1", "g2", "g3"].map(ToString::to_string).to_vec())
        .with_index_name("gene_ids")
        .with_column(
            "dispersion",
            Elem::Array(DenseArray::from_elements(vec![4], DataType::Float32, &[0.5f32, 1.5, 2.5, 3.5])?),
        )?;
    Ok((x, var))
}

#[test]
fn legacy_raw_layouts_are_equivalent() -> TestResult {
    let (raw_x, raw_var) = raw_fields()?;
    let x = DenseArray::from_elements(vec![3, 2], DataType::UInt32, &[1u32, 2, 3, 4, 5, 6])?;
    let options = DatasetOptions::default();

    let (subtree, subtree_readable) = memory_storage();
    let adata = AnnData::from_fields(AnnDataFields {
        x: Some(Matrix::Dense(x.clone())),
        raw: Some(Raw::new(Some(Matrix::Dense(raw_x.clone())), raw_var.clone(), Mapping::new())?),
        ..AnnDataFields::default()
    })?;
    write_anndata(&adata, &subtree, &WriteOptions::new())?;
    assert_eq!(encoding_type(&subtree_readable, "/raw")?.as_deref(), Some("raw"));

    let (dotted, dotted_readable) = memory_storage();
    let mut attributes = Attributes::new();
    attributes.insert("encoding-type".to_string(), "anndata".into());
    attributes.insert("encoding-version".to_string(), "0.1.0".into());
    create_group(&*dotted, &NodePath::root(), &GroupMetadata::new(attributes))?;
    for (path, elem) in [
        ("/X", Elem::Array(x)),
        ("/obs", Elem::DataFrame(DataFrame::with_default_index(3))),
        ("/var", Elem::DataFrame(DataFrame::with_default_index(2))),
        ("/raw.X", Elem::Array(raw_x)),
        ("/raw.var", Elem::DataFrame(raw_var)),
        ("/raw.varm", Elem::Mapping(Mapping::new())),
    ] {
        write_elem(&dotted, &NodePath::new(path)?, &elem, &options)?;
    }

    let from_subtree = read_anndata(&subtree_readable, &ReadOptions::new())?;
    let from_dotted = read_anndata(&dotted_readable, &ReadOptions::new())?;
    assert!(from_subtree.adata.raw().is_some());
    assert_eq!(from_subtree.adata.raw(), from_dotted.adata.raw());
    assert!(from_subtree.warnings.is_empty());
    let keys: Vec<&str> = from_dotted.warnings.iter().map(|warning| warning.key()).collect();
    assert_eq!(keys, ["raw"]);

    // Both layouts at once are ambiguous
    write_elem(&subtree, &NodePath::new("/raw.X")?, &Elem::Array(DenseArray::zeros(vec![3, 4], DataType::UInt32)), &options)?;
    let err = read_anndata(&subtree_readable, &ReadOptions::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert_eq!(err.key(), Some("raw"));

    // Writing replaces the legacy layout with the raw group
    write_anndata(&from_dotted.adata, &dotted, &WriteOptions::new().as_dense(["raw.X"]))?;
    assert!(!node_exists(&*dotted_readable, &NodePath::new("/raw.X")?)?);
    assert_eq!(encoding_type(&dotted_readable, "/raw/X")?.as_deref(), Some("array"));
    Ok(())
}

#[test]
fn invalid_overrides_fail_before_io() -> TestResult {
    let (writable, readable) = memory_storage();
    let adata = AnnData::new(dense_100x50()?)?;
    for options in [
        WriteOptions::new().as_dense(["raw/X"]),
        WriteOptions::new().as_dense(["X", "obsp"]),
    ] {
        let err = write_anndata(&adata, &writable, &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!node_exists(&*readable, &NodePath::root())?);
    }
    for options in [
        ReadOptions::new().as_sparse(["raw"]),
        ReadOptions::new().as_sparse_layout("coo"),
    ] {
        let err = read_anndata(&readable, &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
    Ok(())
}

#[test]
fn conversion_is_chunk_invariant() -> TestResult {
    let store = Arc::new(MemoryStore::new());
    let dense = DenseArray::from_elements(
        vec![6, 5],
        DataType::Int32,
        &(0..30).map(|i| if i % 4 == 1 { i - 10 } else { 0 }).collect::<Vec<i32>>(),
    )?;
    for layout in [SparseLayout::Csr, SparseLayout::Csc] {
        let reference = SparseMatrix::from_dense(&dense, layout)?;
        for chunk_size in 1..=6 {
            let sparse = dense_to_sparse(&dense, chunk_size, layout)?;
            assert_eq!(sparse, reference);

            let path = NodePath::new(&format!("/{layout}/{chunk_size}"))?;
            let array = ArrayBuilder::new(vec![6, 5], DataType::Int32)
                .options(&DatasetOptions::default().with_chunk_shape(vec![4, 2]))
                .build(store.clone(), path.clone())?;
            array.store_metadata()?;
            sparse_to_dense(&sparse, &array, chunk_size)?;

            let readable: ReadableListableStorage = store.clone();
            let elem = read_elem(&readable, &path, &mut Diagnostics::new())?;
            assert_eq!(elem, Elem::Array(dense.clone()));
        }
    }
    Ok(())
}
