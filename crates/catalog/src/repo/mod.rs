//! One repository per catalog entity.
//!
//! Repositories are thin, cloneable wrappers around the connection pool.
//! Anything that must be atomic under concurrency (the blob reference count,
//! the received-chunk set) is a single SQL statement here, never a
//! read-then-write in the caller.

mod blobs;
mod directories;
mod file_refs;
mod sessions;

pub use self::blobs::{BlobRepo, Release};
pub use self::directories::DirectoryRepo;
pub use self::file_refs::FileRefRepo;
pub use self::sessions::SessionRepo;

/// Which children a tree listing should yield.
///
/// The three traversal families each want a different slice of the
/// parent/child relation: live listings and trash walk live nodes, restore
/// walks nodes dragged along by a subtree trash, and purge walks everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildFilter {
    /// `is_deleted = 0`
    Live,
    /// `is_deleted = 1 AND deleted_by = 'process'`
    TrashedByProcess,
    /// No deletion-state filter at all.
    Any,
}
