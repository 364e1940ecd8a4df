//! Store implementations.

mod filesystem_store;
mod memory_store;

pub use filesystem_store::{FilesystemStore, FilesystemStoreCreateError};
pub use memory_store::MemoryStore;

#[cfg(test)]
pub(crate) mod test_util {
    use std::error::Error;

    use crate::storage::{
        ListableStorageTraits, ReadableStorageTraits, StorePrefix, WritableStorageTraits,
    };

    pub fn store_write_read<
        TStorage: ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits,
    >(
        store: &TStorage,
    ) -> Result<(), Box<dyn Error>> {
        store.set(&"a/b".try_into()?, vec![0, 1, 2].into())?;
        store.set(&"a/c".try_into()?, vec![3].into())?;
        store.set(&"a/d/e".try_into()?, vec![].into())?;
        store.set(&"a/f/g".try_into()?, vec![4, 5].into())?;
        store.set(&"b/c/d".try_into()?, vec![].into())?;

        assert_eq!(store.get(&"a/b".try_into()?)?.unwrap().as_ref(), &[0, 1, 2]);
        assert_eq!(store.size_key(&"a/f/g".try_into()?)?, Some(2));
        assert!(store.get(&"a/x".try_into()?)?.is_none());

        assert_eq!(
            store.list()?,
            &[
                "a/b".try_into()?,
                "a/c".try_into()?,
                "a/d/e".try_into()?,
                "a/f/g".try_into()?,
                "b/c/d".try_into()?,
            ]
        );
        assert_eq!(
            store.list_prefix(&"a/f/".try_into()?)?,
            &["a/f/g".try_into()?]
        );

        let list_dir = store.list_dir(&"a/".try_into()?)?;
        assert_eq!(list_dir.keys(), &["a/b".try_into()?, "a/c".try_into()?]);
        assert_eq!(
            list_dir.prefixes(),
            &["a/d/".try_into()?, "a/f/".try_into()?]
        );

        store.erase(&"a/c".try_into()?)?;
        store.erase(&"a/c".try_into()?)?;
        assert!(store.get(&"a/c".try_into()?)?.is_none());

        store.erase_prefix(&"b/".try_into()?)?;
        let list_dir = store.list_dir(&StorePrefix::root())?;
        assert_eq!(list_dir.prefixes(), &["a/".try_into()?]);
        Ok(())
    }

    pub fn store_rename<
        TStorage: ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits,
    >(
        store: &TStorage,
    ) -> Result<(), Box<dyn Error>> {
        store.set(&"raw/_X/zarr.json".try_into()?, vec![1].into())?;
        store.set(&"raw/_X/c/0/0".try_into()?, vec![2].into())?;
        store.rename_prefix(&"raw/_X/".try_into()?, &"raw/X/".try_into()?)?;
        assert_eq!(
            store.list_prefix(&"raw/".try_into()?)?,
            &["raw/X/c/0/0".try_into()?, "raw/X/zarr.json".try_into()?]
        );
        assert_eq!(
            store.get(&"raw/X/c/0/0".try_into()?)?.unwrap().as_ref(),
            &[2]
        );
        Ok(())
    }
}
