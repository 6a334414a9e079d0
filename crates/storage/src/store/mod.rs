//! Object store trait and implementations.
//!
//! This module defines the `ObjectStore` trait, which provides a unified
//! interface for reading and writing physical payloads across different
//! backends (local filesystem today; the trait is the seam a remote
//! provider would plug into).

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalStore;
#[cfg(feature = "mock")]
pub use self::mock::MockStore;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};

pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send + Sync + 'static>>;
pub type BoxAsyncWrite = Pin<Box<dyn AsyncWrite + Send + Sync + 'static>>;

/// Unified interface for physical payload storage.
///
/// Payloads are addressed purely by opaque object key; the engine never
/// derives meaning from a key beyond handing it back to the store that
/// issued it. All operations are asynchronous and the streaming variants
/// ([`reader`](Self::reader) / [`writer`](Self::writer)) never require the
/// whole payload in memory.
///
/// # Key Handling
/// All keys are relative to the store root and are validated with
/// [`validate_key`](crate::validate_key) before use. Implementations must
/// enforce this validation: a key may never resolve outside the store root.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use depot_storage::{ObjectStore, error::Result};
///
/// async fn payload_len(store: &dyn ObjectStore, key: &Path) -> Result<u64> {
///     if store.exists(key).await? {
///         let data = store.read(key).await?;
///         Ok(data.len() as u64)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the configured store (used for logging only).
    fn name(&self) -> &str;

    /// Check if an object exists.
    async fn exists(&self, key: &Path) -> Result<bool>;

    /// Read the complete object contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if no object
    /// exists under the key. Prefer [`reader`](Self::reader) for payloads of
    /// unknown size.
    async fn read(&self, key: &Path) -> Result<Vec<u8>>;

    /// Open an object for streaming reads.
    ///
    /// The async setup (opening the file/connection) happens before
    /// returning; the returned reader yields bytes incrementally. Returns
    /// [`NotFound`](crate::error::ErrorKind::NotFound) if no object exists
    /// under the key.
    async fn reader(&self, key: &Path) -> Result<BoxAsyncRead>;

    /// Write complete object contents.
    ///
    /// Creates a new object or overwrites an existing one.
    ///
    /// # Notes
    /// - Implementations create intermediate key segments as needed.
    async fn write(&self, key: &Path, data: &[u8]) -> Result<()>;

    /// Open an object for streaming writes.
    ///
    /// # Notes
    /// - Implementations create intermediate key segments as needed.
    /// - Callers must call `shutdown()` before dropping so buffered data is
    ///   committed and errors are propagated.
    async fn writer(&self, key: &Path) -> Result<BoxAsyncWrite>;

    /// Delete an object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if no object
    /// exists under the key; callers for whom already-gone is fine are
    /// expected to swallow that variant themselves.
    async fn delete(&self, key: &Path) -> Result<()>;
}
