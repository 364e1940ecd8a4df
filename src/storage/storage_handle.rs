use std::sync::Arc;

use super::{
    Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError,
    StorageIdentity, StoreKey, StoreKeys, StoreKeysPrefixes, StorePrefix, WritableStorageTraits,
};

/// A storage handle.
///
/// This is a handle to shared storage which can be owned and cloned, even if the storage it references is unsized.
/// It implements every storage trait its storage implements, so wrapping a [`ReadableWritableListableStorage`](super::ReadableWritableListableStorage) gives a value that can be used as a [`ReadableListableStorage`](super::ReadableListableStorage).
#[derive(Debug)]
pub struct StorageHandle<TStorage: ?Sized>(Arc<TStorage>);

impl<TStorage: ?Sized> Clone for StorageHandle<TStorage> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<TStorage: ?Sized> StorageHandle<TStorage> {
    /// Create a new storage handle.
    pub const fn new(storage: Arc<TStorage>) -> Self {
        Self(storage)
    }

    /// Returns the underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<TStorage> {
        &self.0
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> ReadableStorageTraits for StorageHandle<TStorage> {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        self.0.get(key)
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        self.0.size_key(key)
    }

    fn storage_identity(&self) -> StorageIdentity {
        self.0.storage_identity()
    }
}

impl<TStorage: ?Sized + ListableStorageTraits> ListableStorageTraits for StorageHandle<TStorage> {
    fn list(&self) -> Result<StoreKeys, StorageError> {
        self.0.list()
    }

    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        self.0.list_prefix(prefix)
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        self.0.list_dir(prefix)
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> WritableStorageTraits for StorageHandle<TStorage> {
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        self.0.set(key, value)
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.0.erase(key)
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.0.erase_prefix(prefix)
    }

    fn rename_prefix(&self, from: &StorePrefix, to: &StorePrefix) -> Result<(), StorageError> {
        self.0.rename_prefix(from, to)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::storage::{
        store::MemoryStore, ReadableListableStorage, ReadableWritableListableStorage,
    };

    use super::*;

    #[test]
    fn storage_handle_read_view() -> Result<(), Box<dyn Error>> {
        let store: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
        let key = StoreKey::new("a/b")?;
        store.set(&key, Bytes::from_static(b"ab"))?;
        let view: ReadableListableStorage = Arc::new(StorageHandle::new(store.clone()));
        assert_eq!(view.get(&key)?, Some(Bytes::from_static(b"ab")));
        assert_eq!(view.list()?, vec![key]);
        assert_eq!(view.storage_identity(), store.storage_identity());
        Ok(())
    }
}
