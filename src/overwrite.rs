//! Safe replacement of a node which may alias the source of its new contents.
//!
//! Converting a field in place (e.g. densifying the sparse matrix at `X` of a store into `X` of the same store) reads the source while the destination is written.
//! An [`OverwriteGuard`] chooses an [`OverwritePlan`] before the first write:
//!  - [`OverwritePlan::Direct`]: the destination does not exist, so it is written directly.
//!  - [`OverwritePlan::EraseThenWrite`]: the destination exists in a different store than the source, so it is erased up front and written directly.
//!  - [`OverwritePlan::TemporarySwap`]: the destination exists in the same store as the source, so the new contents are written to a [temporary sibling](temporary_path) and swapped in by [`OverwriteGuard::commit`].
//!
//! Until a swap is committed, the complete original node remains at the destination.
//! The swap itself erases the destination and then moves the temporary node into place.
//! There is no multi-key transaction in a store, so a failure between those two steps leaves the new contents only at the temporary path, which is reported by [`OverwriteError::IncompleteSwap`].

use std::sync::Arc;

use thiserror::Error;

use crate::{
    node::{NodePath, NodePathError},
    storage::{
        erase_node, move_node, node_exists, ListableStorageTraits, ReadableStorageTraits,
        StorageError, StorageIdentity, WritableStorageTraits,
    },
};

/// An overwrite error.
#[derive(Debug, Error)]
pub enum OverwriteError {
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// The destination has no temporary sibling path (e.g. it is the root).
    #[error(transparent)]
    NodePathError(#[from] NodePathError),
    /// The swap failed after the destination was erased.
    #[error("swapping {temporary} into {target} failed, the new contents remain at {temporary}: {source}")]
    IncompleteSwap {
        /// The destination.
        target: NodePath,
        /// The temporary path holding the new contents.
        temporary: NodePath,
        /// The underlying error.
        source: StorageError,
    },
}

/// How a destination node is replaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OverwritePlan {
    /// The destination does not exist and is written directly.
    Direct,
    /// The destination exists in a store other than the source and is erased before writing.
    EraseThenWrite,
    /// The destination exists in the same store as the source, so the new contents are written to `temporary` and swapped in on commit.
    TemporarySwap {
        /// The temporary sibling of the destination.
        temporary: NodePath,
    },
}

/// Returns the temporary sibling of `path`, whose name is the name of `path` prefixed by `_`.
///
/// For example, the temporary path of `/X` is `/_X` and of `/raw/X` is `/raw/_X`.
///
/// # Errors
/// Returns a [`NodePathError`] if `path` is the root.
pub fn temporary_path(path: &NodePath) -> Result<NodePath, NodePathError> {
    path.with_name(&format!("_{}", path.name()))
}

/// Decide how to replace `target` in `storage` with contents read from a source in the store with `source_identity` (or [`None`] for an in-memory source).
///
/// # Errors
/// Returns an [`OverwriteError`] if there is an underlying store error or `target` is the root.
pub fn plan_overwrite<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits>(
    storage: &TStorage,
    target: &NodePath,
    source_identity: Option<&StorageIdentity>,
) -> Result<OverwritePlan, OverwriteError> {
    if !node_exists(storage, target)? {
        return Ok(OverwritePlan::Direct);
    }
    if source_identity == Some(&storage.storage_identity()) {
        Ok(OverwritePlan::TemporarySwap {
            temporary: temporary_path(target)?,
        })
    } else {
        Ok(OverwritePlan::EraseThenWrite)
    }
}

/// A guard over the replacement of a destination node.
///
/// Write the new contents to [`write_path`](OverwriteGuard::write_path), then [`commit`](OverwriteGuard::commit).
/// A guard dropped without being committed is [aborted](OverwriteGuard::abort).
#[derive(Debug)]
pub struct OverwriteGuard<
    TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits,
> {
    storage: Arc<TStorage>,
    target: NodePath,
    plan: OverwritePlan,
    finished: bool,
}

impl<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits>
    OverwriteGuard<TStorage>
{
    /// Plan the replacement of `target` with contents read from a source in the store with `source_identity`.
    ///
    /// For [`OverwritePlan::EraseThenWrite`] the destination is erased, and for [`OverwritePlan::TemporarySwap`] any stale temporary node is erased.
    ///
    /// # Errors
    /// Returns an [`OverwriteError`] if there is an underlying store error or `target` is the root.
    pub fn begin(
        storage: Arc<TStorage>,
        target: NodePath,
        source_identity: Option<&StorageIdentity>,
    ) -> Result<Self, OverwriteError> {
        let plan = plan_overwrite(&*storage, &target, source_identity)?;
        match &plan {
            OverwritePlan::Direct => {}
            OverwritePlan::EraseThenWrite => erase_node(&*storage, &target)?,
            OverwritePlan::TemporarySwap { temporary } => erase_node(&*storage, temporary)?,
        }
        tracing::debug!("overwriting {target} with plan {plan:?}");
        Ok(Self {
            storage,
            target,
            plan,
            finished: false,
        })
    }

    /// Returns the plan.
    #[must_use]
    pub fn plan(&self) -> &OverwritePlan {
        &self.plan
    }

    /// Returns the destination path.
    #[must_use]
    pub fn target(&self) -> &NodePath {
        &self.target
    }

    /// Returns the path the new contents must be written to.
    #[must_use]
    pub fn write_path(&self) -> &NodePath {
        match &self.plan {
            OverwritePlan::Direct | OverwritePlan::EraseThenWrite => &self.target,
            OverwritePlan::TemporarySwap { temporary } => temporary,
        }
    }

    /// Commit the new contents, swapping in the temporary node if required.
    ///
    /// # Errors
    /// Returns [`OverwriteError::IncompleteSwap`] if the swap fails.
    /// The new contents then remain at the temporary path, and the destination may be partially or completely erased.
    pub fn commit(mut self) -> Result<(), OverwriteError> {
        self.finished = true;
        if let OverwritePlan::TemporarySwap { temporary } = &self.plan {
            move_node(&*self.storage, temporary, &self.target).map_err(|source| {
                OverwriteError::IncompleteSwap {
                    target: self.target.clone(),
                    temporary: temporary.clone(),
                    source,
                }
            })?;
            tracing::debug!("swapped {temporary} into {}", self.target);
        }
        Ok(())
    }

    /// Abandon the replacement, erasing whatever was written to [`write_path`](OverwriteGuard::write_path).
    ///
    /// For [`OverwritePlan::TemporarySwap`] the original destination is untouched.
    ///
    /// # Errors
    /// Returns an [`OverwriteError`] if there is an underlying store error.
    pub fn abort(mut self) -> Result<(), OverwriteError> {
        self.finished = true;
        self.erase_written()
    }

    fn erase_written(&self) -> Result<(), OverwriteError> {
        erase_node(&*self.storage, self.write_path())?;
        Ok(())
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits> Drop
    for OverwriteGuard<TStorage>
{
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                "overwrite of {} was not committed, erasing {}",
                self.target,
                self.write_path()
            );
            if let Err(err) = self.erase_written() {
                tracing::warn!("failed to erase {}: {err}", self.write_path());
            }
        }
    }
}

/// Replace `target` with the contents written by `write`, guarded by an [`OverwriteGuard`].
///
/// `write` is called with the path to write to. The guard is committed if `write` succeeds, and aborted otherwise.
///
/// # Errors
/// Returns the error of `write`, or an [`OverwriteError`] converted into `E`.
pub fn write_guarded<TStorage, T, E>(
    storage: &Arc<TStorage>,
    target: &NodePath,
    source_identity: Option<&StorageIdentity>,
    write: impl FnOnce(&NodePath) -> Result<T, E>,
) -> Result<T, E>
where
    TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits,
    E: From<OverwriteError>,
{
    let guard = OverwriteGuard::begin(storage.clone(), target.clone(), source_identity)?;
    match write(guard.write_path()) {
        Ok(value) => {
            guard.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = guard.abort() {
                tracing::warn!("failed to abort overwrite of {target}: {abort_err}");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::{
        array::{Array, ArrayBuilder, DataType},
        storage::store::{FilesystemStore, MemoryStore},
    };

    use super::*;

    fn write_vector<TStorage: ?Sized + WritableStorageTraits + ReadableStorageTraits>(
        storage: &Arc<TStorage>,
        path: &NodePath,
        elements: &[i32],
    ) -> Result<(), Box<dyn Error>> {
        let array = ArrayBuilder::new(vec![elements.len() as u64], DataType::Int32)
            .build(storage.clone(), path.clone())?;
        array.store_metadata()?;
        array.store_elements(elements)?;
        Ok(())
    }

    #[test]
    fn overwrite_temporary_path() {
        assert_eq!(
            temporary_path(&NodePath::new("/X").unwrap()).unwrap().as_str(),
            "/_X"
        );
        assert_eq!(
            temporary_path(&NodePath::new("/raw/X").unwrap()).unwrap().as_str(),
            "/raw/_X"
        );
        assert!(temporary_path(&NodePath::root()).is_err());
    }

    #[test]
    fn overwrite_plans() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        let other = MemoryStore::new();
        let path = NodePath::new("/X")?;
        let identity = store.storage_identity();
        assert_eq!(plan_overwrite(&*store, &path, Some(&identity))?, OverwritePlan::Direct);
        write_vector(&store, &path, &[1, 2])?;
        assert_eq!(
            plan_overwrite(&*store, &path, Some(&identity))?,
            OverwritePlan::TemporarySwap {
                temporary: NodePath::new("/_X")?
            }
        );
        assert_eq!(
            plan_overwrite(&*store, &path, Some(&other.storage_identity()))?,
            OverwritePlan::EraseThenWrite
        );
        assert_eq!(plan_overwrite(&*store, &path, None)?, OverwritePlan::EraseThenWrite);
        Ok(())
    }

    #[test]
    fn overwrite_swap_keeps_original_until_commit() -> Result<(), Box<dyn Error>> {
        let path = tempfile::TempDir::new()?;
        let store = Arc::new(FilesystemStore::new(path.path())?);
        let target = NodePath::new("/raw/X")?;
        write_vector(&store, &target, &[1, 2, 3])?;

        let guard = OverwriteGuard::begin(store.clone(), target.clone(), Some(&store.storage_identity()))?;
        write_vector(&store, guard.write_path(), &[4, 5])?;
        // the original is complete until the swap
        let original = Array::open(store.clone(), &target)?;
        assert_eq!(original.retrieve_elements::<i32>()?, vec![1, 2, 3]);
        guard.commit()?;

        let replaced = Array::open(store.clone(), &target)?;
        assert_eq!(replaced.retrieve_elements::<i32>()?, vec![4, 5]);
        assert!(!node_exists(&*store, &NodePath::new("/raw/_X")?)?);
        Ok(())
    }

    #[test]
    fn overwrite_abort_and_drop() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        let target = NodePath::new("/X")?;
        let temporary = NodePath::new("/_X")?;
        write_vector(&store, &target, &[1])?;

        let result: Result<(), Box<dyn Error>> =
            write_guarded(&store, &target, Some(&store.storage_identity()), |path| {
                write_vector(&store, path, &[9])?;
                Err("conversion failed".into())
            });
        assert!(result.is_err());
        assert!(!node_exists(&*store, &temporary)?);
        assert_eq!(
            Array::open(store.clone(), &target)?.retrieve_elements::<i32>()?,
            vec![1]
        );

        {
            let guard =
                OverwriteGuard::begin(store.clone(), target.clone(), Some(&store.storage_identity()))?;
            write_vector(&store, guard.write_path(), &[9])?;
        }
        assert!(!node_exists(&*store, &temporary)?);
        assert!(node_exists(&*store, &target)?);
        Ok(())
    }

    #[test]
    fn overwrite_erase_then_write() -> Result<(), Box<dyn Error>> {
        let store = Arc::new(MemoryStore::new());
        let target = NodePath::new("/X")?;
        write_vector(&store, &target, &[1, 2, 3])?;
        write_guarded::<_, _, Box<dyn Error>>(&store, &target, None, |path| {
            assert_eq!(path, &target);
            // the destination was erased up front
            assert!(!node_exists(&*store, path)?);
            write_vector(&store, path, &[7])
        })?;
        assert_eq!(
            Array::open(store, &target)?.retrieve_elements::<i32>()?,
            vec![7]
        );
        Ok(())
    }
}
