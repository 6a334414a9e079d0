//! Local filesystem object store.
//!
//! Objects are stored as plain files under a configured root directory and
//! accessed using standard filesystem operations via `tokio::fs` for async
//! I/O.

use crate::error::{ErrorKind, Result};
use crate::key::validate as validate_key;
use crate::store::{BoxAsyncRead, BoxAsyncWrite, ObjectStore};
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem object store.
///
/// Stores payloads as files under a root directory on the local filesystem.
/// All keys are resolved relative to the configured root; a key can never
/// resolve outside it.
///
/// # Examples
///
/// ```no_run
/// use depot_storage::store::LocalStore;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalStore::new("local", "/var/lib/depot/objects")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalStore {
    name: String,
    /// Root directory for object payloads
    root: PathBuf,
}
impl LocalStore {
    /// Create a new local filesystem store.
    ///
    /// # Arguments
    /// * `root` - Absolute path to the object root directory
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists and is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(root));
        }

        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(root));
            }
        } else {
            // Use non-async here; it'll only happen once on store
            // initialization and it's not worth making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }

        Ok(Self { name: name.into(), root })
    }

    /// Get the absolute path for an object key.
    ///
    /// Validates the key and joins it with the root directory. The
    /// validation is what upholds the containment invariant: the resolved
    /// path always stays inside the store root.
    fn absolute_path(&self, key: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_key(key.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn map_io_error(e: std::io::Error, key: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(key.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(key.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    async fn ensure_parent(&self, abs_path: &Path, key: &Path) -> Result<()> {
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, key))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, key: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(key)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, key: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(key)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, key))?)
    }

    async fn reader(&self, key: &Path) -> Result<BoxAsyncRead> {
        let abs_path = self.absolute_path(key)?;
        let file = fs::File::open(&abs_path).await.map_err(|e| Self::map_io_error(e, key))?;
        Ok(Box::pin(file))
    }

    async fn write(&self, key: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(key)?;
        self.ensure_parent(&abs_path, key).await?;
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, key))?)
    }

    async fn writer(&self, key: &Path) -> Result<BoxAsyncWrite> {
        let abs_path = self.absolute_path(key)?;
        self.ensure_parent(&abs_path, key).await?;
        let file = fs::File::create(&abs_path).await.map_err(|e| Self::map_io_error(e, key))?;
        Ok(Box::pin(file))
    }

    async fn delete(&self, key: &Path) -> Result<()> {
        let abs_path = self.absolute_path(key)?;
        Ok(fs::remove_file(&abs_path).await.map_err(|e| Self::map_io_error(e, key))?)
    }
}
