//! The depot storage engine.
//!
//! Everything user-visible in the system funnels through the [`Engine`]:
//! resumable uploads that deduplicate identical content into a single
//! reference-counted blob, the recursive tree lifecycle (trash, restore,
//! permanent delete) and streamed archive export. HTTP framing, routing and
//! authentication live upstream; the engine receives an already-resolved
//! [`Principal`] and speaks in catalog ids.
//!
//! # Re-runnability
//! Nothing here assumes a cross-table transaction. The lifecycle traversals
//! carry visited-sets and use conditional single-statement updates, so a
//! caller can retry any of them after a mid-traversal failure without
//! double-processing nodes. The one place that genuinely needs mutual
//! exclusion, the blob reference count, is an atomic upsert/decrement in
//! the catalog.

pub mod config;
pub mod error;
mod export;
pub mod name;
mod principal;
mod purge;
mod restore;
pub mod sniff;
mod trash;
mod tree;
mod upload;
mod walk;

pub use crate::config::EngineConfig;
pub use crate::principal::{Principal, Role};
pub use crate::tree::Listing;
pub use crate::upload::{ChunkOutcome, UploadStatus, UploadTicket};

use crate::upload::temp::TempStore;
use depot_catalog::{BlobRepo, Database, DirectoryRepo, FileRefRepo, SessionRepo};
use depot_storage::StoreHandle;

/// The storage engine.
///
/// Construct one per process and hand it around by reference; every
/// operation takes `&self` and the repos inside share one pool.
pub struct Engine {
    store: StoreHandle,
    dirs: DirectoryRepo,
    blobs: BlobRepo,
    files: FileRefRepo,
    sessions: SessionRepo,
    temp: TempStore,
    config: EngineConfig,
}

impl Engine {
    pub fn new(db: &Database, store: StoreHandle, config: EngineConfig) -> Self {
        Self {
            store,
            dirs: DirectoryRepo::from(db),
            blobs: BlobRepo::from(db),
            files: FileRefRepo::from(db),
            sessions: SessionRepo::from(db),
            temp: TempStore::new(config.temp_root.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use depot_storage::store::MockStore;
    use std::sync::Arc;
    use uuid::Uuid;

    /// An engine wired to an in-memory catalog, a mock object store and a
    /// throwaway temp root, plus a provisioned principal with a root
    /// directory.
    pub(crate) struct Harness {
        pub engine: Engine,
        pub principal: Principal,
        pub store: StoreHandle,
        // Held so the temp root outlives the test.
        _temp: tempfile::TempDir,
    }

    pub(crate) async fn harness() -> Harness {
        harness_with(|config| config).await
    }

    impl Harness {
        /// Push a small payload through the whole direct-upload path and
        /// return the resulting file reference.
        pub(crate) async fn upload_small_file(
            &self,
            parent: Uuid,
            file_name: &str,
            bytes: &[u8],
        ) -> depot_catalog::FileRef {
            let ticket = self
                .engine
                .init_upload(&self.principal, parent, file_name, bytes.len() as i64, None)
                .await
                .unwrap();
            self.engine.upload_chunk(&self.principal, ticket.session_id, 0, bytes).await.unwrap();
            self.engine.complete_upload(&self.principal, ticket.session_id).await.unwrap()
        }
    }

    pub(crate) async fn harness_with(tweak: impl FnOnce(EngineConfig) -> EngineConfig) -> Harness {
        let db = Database::connect_in_memory().await.unwrap();
        let store: StoreHandle = Arc::new(MockStore::default());
        let temp = tempfile::tempdir().unwrap();
        let config = tweak(EngineConfig {
            temp_root: temp.path().to_path_buf(),
            ..EngineConfig::default()
        });
        let engine = Engine::new(&db, Arc::clone(&store), config);

        let user_id = Uuid::new_v4();
        let root = engine.create_root(user_id).await.unwrap();
        let principal = Principal::new(user_id, Role::User, root.id);
        Harness { engine, principal, store, _temp: temp }
    }
}
