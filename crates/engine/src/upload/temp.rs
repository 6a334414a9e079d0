//! Session-scoped temp storage for in-flight chunks and merge output.
//!
//! Plain filesystem area keyed by session id. Reclaimed on completion,
//! cancellation or the expiry sweep, never left to accumulate.

use std::io;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

pub(crate) struct TempStore {
    root: PathBuf,
}

impl TempStore {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The directory holding a session's `chunk-<n>` files.
    pub(crate) fn session_dir(&self, session_id: Uuid) -> PathBuf {
        self.root.join(session_id.to_string())
    }

    pub(crate) fn chunk_path(&self, session_id: Uuid, index: i64) -> PathBuf {
        self.session_dir(session_id).join(format!("chunk-{index}"))
    }

    /// Where the reassembled payload lands before dedup decides its fate.
    pub(crate) fn merged_path(&self, session_id: Uuid) -> PathBuf {
        self.root.join(format!("{session_id}-merged"))
    }

    pub(crate) async fn write_chunk(&self, session_id: Uuid, index: i64, bytes: &[u8]) -> io::Result<()> {
        fs::create_dir_all(self.session_dir(session_id)).await?;
        fs::write(self.chunk_path(session_id, index), bytes).await
    }

    /// Open the merged-payload file for writing, creating the temp root if
    /// this is the first thing the session touches (imports skip the chunk
    /// path entirely).
    pub(crate) async fn create_merged(&self, session_id: Uuid) -> io::Result<fs::File> {
        fs::create_dir_all(&self.root).await?;
        fs::File::create(self.merged_path(session_id)).await
    }

    /// Remove everything a session left behind. Already-gone is fine.
    pub(crate) async fn remove_session(&self, session_id: Uuid) -> io::Result<()> {
        ignore_missing(fs::remove_dir_all(self.session_dir(session_id)).await)?;
        ignore_missing(fs::remove_file(self.merged_path(session_id)).await)
    }
}

fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
