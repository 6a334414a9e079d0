//! SQLite catalog database for depot metadata.
//!
//! This crate provides the durable catalog that binds per-user directory
//! trees to content-addressed blobs. Unlike a cache, the catalog *is* the
//! source of truth: the physical object store holds anonymous payloads
//! that only the catalog can name.
//!
//! # Architecture
//! Four entity types, one table each:
//! - **Directories**: per-user tree nodes. Parent links are deliberately not
//!   enforced with foreign keys; the engine's traversals carry visited-sets
//!   and repair heuristics instead.
//! - **Blobs**: unique physical payloads keyed by content digest
//!   (BLAKE3), reference-counted. At most one row per digest system-wide.
//! - **FileRefs**: user-visible, nameable pointers from a directory position
//!   to a blob. Many refs may share one blob.
//! - **UploadSessions**: resumable ingestion bookkeeping, with the
//!   received-chunk set stored as rows so recording a chunk is one atomic
//!   insert.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{
    Blob, DeleteMarker, Directory, Disposition, FileRef, SessionStatus, StorageProvider, Strategy, UploadSession,
};
pub use crate::repo::{BlobRepo, ChildFilter, DirectoryRepo, FileRefRepo, Release, SessionRepo};
