//! In-memory object store for testing.

use crate::error::{ErrorKind, Result};
use crate::key::validate as validate_key;
use crate::store::{BoxAsyncRead, BoxAsyncWrite, ObjectStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

// Uses a std RwLock rather than tokio's: the critical sections never hold
// the lock across an await point, and MockWriter needs to commit its buffer
// from inside poll_shutdown, where awaiting is not an option.
type Objects = Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>;

/// In-memory object store for testing.
///
/// Payloads are stored in a `HashMap` behind a lock, so all trait methods
/// can operate on `&self` without external synchronisation. Ideal for unit
/// tests that need an [`ObjectStore`] without filesystem dependencies.
///
/// # Examples
///
/// ```
/// use depot_storage::store::{MockStore, ObjectStore};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MockStore::with_objects([
///     ("ab/cdef", b"payload".as_slice()),
/// ]);
/// assert!(store.exists(Path::new("ab/cdef")).await?);
///
/// store.write(Path::new("other"), b"data...").await?;
/// assert!(store.exists(Path::new("other")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockStore {
    name: String,
    objects: Objects,
}

impl MockStore {
    /// Create a mock store pre-populated with objects.
    ///
    /// Panics if any key fails validation (e.g. path traversal). If test
    /// setup is wrong, then the test should not pass.
    pub fn with_objects(objects: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (key, data) in objects {
            let key = key.into();
            let Ok(validated) = validate_key(&key) else {
                // The panic here is DELIBERATE. MockStore is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockStore::with_objects: invalid key {}", key.display());
            };
            map.insert(validated, data.into());
        }
        Self {
            name: "mock".to_string(),
            objects: Arc::new(RwLock::new(map)),
        }
    }

    /// Change the name of the mock store.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
impl Default for MockStore {
    fn default() -> Self {
        let objects: [(&str, &[u8]); 0] = [];
        Self::with_objects(objects)
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, key: &Path) -> Result<bool> {
        let key = validate_key(key)?;
        Ok(self.objects.read().unwrap().contains_key(&key))
    }

    async fn read(&self, key: &Path) -> Result<Vec<u8>> {
        let validated = validate_key(key)?;
        let objects = self.objects.read().unwrap();
        match objects.get(&validated) {
            Some(data) => Ok(data.clone()),
            None => exn::bail!(ErrorKind::NotFound(key.to_path_buf())),
        }
    }

    async fn reader(&self, key: &Path) -> Result<BoxAsyncRead> {
        let data = self.read(key).await?;
        Ok(Box::pin(Cursor::new(data)))
    }

    async fn write(&self, key: &Path, data: &[u8]) -> Result<()> {
        let key = validate_key(key)?;
        self.objects.write().unwrap().insert(key, data.to_vec());
        Ok(())
    }

    async fn writer(&self, key: &Path) -> Result<BoxAsyncWrite> {
        let key = validate_key(key)?;
        Ok(Box::pin(MockWriter {
            key,
            buf: Vec::new(),
            objects: Arc::clone(&self.objects),
        }))
    }

    async fn delete(&self, key: &Path) -> Result<()> {
        let validated = validate_key(key)?;
        match self.objects.write().unwrap().remove(&validated) {
            Some(_) => Ok(()),
            None => exn::bail!(ErrorKind::NotFound(key.to_path_buf())),
        }
    }
}

/// Buffers writes and commits the object on `shutdown()`, mirroring how a
/// remote store would only make the object visible once the upload is
/// complete.
struct MockWriter {
    key: PathBuf,
    buf: Vec<u8>,
    objects: Objects,
}
impl AsyncWrite for MockWriter {
    fn poll_write(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, data: &[u8]) -> Poll<std::io::Result<usize>> {
        self.buf.extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let key = std::mem::take(&mut self.key);
        let data = std::mem::take(&mut self.buf);
        self.objects.write().unwrap().insert(key, data);
        Poll::Ready(Ok(()))
    }
}
