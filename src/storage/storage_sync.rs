use crate::{
    array::ArrayMetadata,
    group::GroupMetadata,
    node::{NodeMetadata, NodePath},
};

use super::{
    data_key, meta_key, Bytes, MaybeBytes, StorageError, StorageIdentity, StoreKey, StoreKeys,
    StoreKeysPrefixes, StorePrefix, StorePrefixes,
};

/// Readable storage traits.
pub trait ReadableStorageTraits: Send + Sync {
    /// Retrieve the value (bytes) associated with a given [`StoreKey`].
    ///
    /// Returns [`None`] if the key is not found.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError>;

    /// Return the size in bytes of the value at `key`.
    ///
    /// Returns [`None`] if the key is not found.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError>;

    /// Return the identity of the data behind this store.
    ///
    /// Handles with equal identities read and write the same data.
    fn storage_identity(&self) -> StorageIdentity;
}

/// Listable storage traits.
pub trait ListableStorageTraits: Send + Sync {
    /// Retrieve all [`StoreKeys`] in the store.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying error with the store.
    fn list(&self) -> Result<StoreKeys, StorageError> {
        self.list_prefix(&StorePrefix::root())
    }

    /// Retrieve all [`StoreKeys`] with a given [`StorePrefix`].
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the prefix is not a directory or there is an underlying error with the store.
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError>;

    /// Retrieve all [`StoreKeys`] and [`StorePrefix`] which are direct children of [`StorePrefix`].
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the prefix is not a directory or there is an underlying error with the store.
    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError>;
}

/// Writable storage traits.
pub trait WritableStorageTraits: Send + Sync {
    /// Store bytes at a [`StoreKey`].
    ///
    /// # Errors
    /// Returns a [`StorageError`] on failure to store.
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError>;

    /// Erase a [`StoreKey`].
    ///
    /// Succeeds if the key does not exist.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn erase(&self, key: &StoreKey) -> Result<(), StorageError>;

    /// Erase all [`StoreKey`] under [`StorePrefix`].
    ///
    /// Succeeds if there are no keys under the prefix.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the erase fails.
    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError>;

    /// Move all keys under `from` so that they are under `to` instead.
    ///
    /// `to` must not contain any keys.
    /// Stores which can perform this natively (e.g. a directory rename) should implement it, otherwise [`move_node`] falls back to copying.
    ///
    /// # Errors
    /// Returns [`StorageError::Unsupported`] by default, or a [`StorageError`] if the move fails.
    fn rename_prefix(&self, from: &StorePrefix, to: &StorePrefix) -> Result<(), StorageError> {
        Err(StorageError::Unsupported(format!(
            "rename of {from} to {to} is not supported by this store"
        )))
    }
}

/// A supertrait of [`ReadableStorageTraits`] and [`WritableStorageTraits`].
pub trait ReadableWritableStorageTraits: ReadableStorageTraits + WritableStorageTraits {}

impl<T> ReadableWritableStorageTraits for T where T: ReadableStorageTraits + WritableStorageTraits {}

/// A supertrait of [`ReadableStorageTraits`] and [`ListableStorageTraits`].
pub trait ReadableListableStorageTraits: ReadableStorageTraits + ListableStorageTraits {}

impl<T> ReadableListableStorageTraits for T where T: ReadableStorageTraits + ListableStorageTraits {}

/// A supertrait of [`ReadableWritableStorageTraits`] and [`ListableStorageTraits`].
pub trait ReadableWritableListableStorageTraits:
    ReadableWritableStorageTraits + ListableStorageTraits
{
}

impl<T> ReadableWritableListableStorageTraits for T where
    T: ReadableWritableStorageTraits + ListableStorageTraits
{
}

fn store_metadata_json(
    storage: &(impl WritableStorageTraits + ?Sized),
    path: &NodePath,
    metadata: &NodeMetadata,
) -> Result<(), StorageError> {
    let key = meta_key(path);
    let json = serde_json::to_vec_pretty(metadata)
        .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
    storage.set(&key, json.into())
}

/// Create a group.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying error with the store.
pub fn create_group(
    storage: &(impl WritableStorageTraits + ?Sized),
    path: &NodePath,
    group: &GroupMetadata,
) -> Result<(), StorageError> {
    store_metadata_json(storage, path, &NodeMetadata::Group(group.clone()))
}

/// Create an array.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying error with the store.
pub fn create_array(
    storage: &(impl WritableStorageTraits + ?Sized),
    path: &NodePath,
    array: &ArrayMetadata,
) -> Result<(), StorageError> {
    store_metadata_json(storage, path, &NodeMetadata::Array(array.clone()))
}

/// Store a chunk.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying error with the store.
pub fn store_chunk(
    storage: &(impl WritableStorageTraits + ?Sized),
    array_path: &NodePath,
    chunk_grid_indices: &[u64],
    chunk_encoded: Bytes,
) -> Result<(), StorageError> {
    storage.set(&data_key(array_path, chunk_grid_indices), chunk_encoded)
}

/// Retrieve a chunk.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying error with the store.
pub fn retrieve_chunk(
    storage: &(impl ReadableStorageTraits + ?Sized),
    array_path: &NodePath,
    chunk_grid_indices: &[u64],
) -> Result<MaybeBytes, StorageError> {
    storage.get(&data_key(array_path, chunk_grid_indices))
}

/// Discover the children of a node.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying error with the store.
pub fn discover_children(
    storage: &(impl ListableStorageTraits + ?Sized),
    path: &NodePath,
) -> Result<StorePrefixes, StorageError> {
    let prefix: StorePrefix = path.try_into()?;
    Ok(storage.list_dir(&prefix)?.prefixes().clone())
}

/// Erase a node (group or array) and all of its children.
///
/// Succeeds if the node does not exist.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying error with the store.
pub fn erase_node(
    storage: &(impl WritableStorageTraits + ?Sized),
    path: &NodePath,
) -> Result<(), StorageError> {
    let prefix = path.try_into()?;
    storage.erase_prefix(&prefix)
}

/// Check if a node exists.
///
/// A node exists if it has metadata, or if it is an implicit group with at least one key below it.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying error with the store.
pub fn node_exists<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits>(
    storage: &TStorage,
    path: &NodePath,
) -> Result<bool, StorageError> {
    if storage.size_key(&meta_key(path))?.is_some() {
        return Ok(true);
    }
    let prefix: StorePrefix = path.try_into()?;
    let children = storage.list_dir(&prefix)?;
    Ok(!children.keys().is_empty() || !children.prefixes().is_empty())
}

/// Copy every key under `from` to the equivalent key under `to`.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying error with the store.
pub fn copy_prefix<
    TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits,
>(
    storage: &TStorage,
    from: &StorePrefix,
    to: &StorePrefix,
) -> Result<(), StorageError> {
    for key in storage.list_prefix(from)? {
        let Some(target) = key.rebase(from, to) else {
            continue;
        };
        if let Some(value) = storage.get(&key)? {
            storage.set(&target, value)?;
        }
    }
    Ok(())
}

/// Move a node (group or array) and all of its children from `from` to `to`.
///
/// Any existing node at `to` is erased first.
/// The move uses [`WritableStorageTraits::rename_prefix`] if the store supports it, otherwise keys are copied and then the source is erased.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying error with the store.
pub fn move_node<
    TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits,
>(
    storage: &TStorage,
    from: &NodePath,
    to: &NodePath,
) -> Result<(), StorageError> {
    let from: StorePrefix = from.try_into()?;
    let to: StorePrefix = to.try_into()?;
    storage.erase_prefix(&to)?;
    match storage.rename_prefix(&from, &to) {
        Ok(()) => Ok(()),
        Err(StorageError::Unsupported(_)) => {
            copy_prefix(storage, &from, &to)?;
            storage.erase_prefix(&from)
        }
        Err(err) => Err(err),
    }
}
