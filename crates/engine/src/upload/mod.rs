//! The resumable-upload state machine.
//!
//! `initiated → uploading → {uploaded|imported} → completed`, with `failed`
//! and `cancelled` reachable from any non-terminal state. Chunk recording
//! is idempotent (client retries are free), completion is all-or-nothing,
//! and every operation verifies session ownership before touching anything.

mod finalize;
pub(crate) mod temp;

use crate::error::{ErrorKind, Result};
use crate::{Engine, Principal};
use depot_catalog::{FileRef, SessionStatus, Strategy, UploadSession};
use exn::{OptionExt, ResultExt};
use time::{Duration, UtcDateTime};
use tokio::io::AsyncRead;
use uuid::Uuid;

/// What `init_upload` hands back for the client to drive the rest.
#[derive(Debug)]
pub struct UploadTicket {
    pub session_id: Uuid,
    pub strategy: Strategy,
    pub chunk_size: i64,
    pub total_chunks: i64,
}

/// Result of offering one chunk.
#[derive(Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
    Accepted { received: i64, total: i64 },
    /// The index was already recorded; the incoming bytes were discarded.
    Skipped,
}

/// Point-in-time session accounting. Reading it never mutates anything.
#[derive(Debug)]
pub struct UploadStatus {
    pub status: SessionStatus,
    pub strategy: Strategy,
    pub received_chunks: Vec<i64>,
    pub total_chunks: i64,
    pub progress: f64,
}

impl Engine {
    /// Start an upload session under a live, owned parent directory.
    ///
    /// Strategy is `direct` (one chunk) when the payload fits within the
    /// caller's role-dependent chunk threshold, `chunked` otherwise.
    pub async fn init_upload(
        &self,
        principal: &Principal,
        parent_id: Uuid,
        file_name: &str,
        size: i64,
        declared_mime: Option<&str>,
    ) -> Result<UploadTicket> {
        if size <= 0 {
            exn::bail!(ErrorKind::InvalidArgument("payload size must be positive"));
        }
        let file_name = crate::name::validate_file_name(file_name)?;
        let parent = self
            .dirs
            .get_live(principal.user_id, parent_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::NotFound)?;

        let chunk_size = self.config.chunk_size(principal.role);
        let (strategy, total_chunks) = match size <= chunk_size {
            true => (Strategy::Direct, 1),
            false => (Strategy::Chunked, (size as u64).div_ceil(chunk_size as u64) as i64),
        };
        let expires_at = UtcDateTime::now() + Duration::seconds(self.config.session_ttl_secs as i64);
        let session = UploadSession::new(
            principal.user_id,
            parent.id,
            file_name,
            size,
            declared_mime.map(str::to_string),
            strategy,
            chunk_size,
            total_chunks,
            expires_at,
        );
        self.sessions.insert(&session).await.or_raise(|| ErrorKind::Catalog)?;
        tracing::debug!(session = %session.id, %strategy, total_chunks, "upload session initiated");
        Ok(UploadTicket { session_id: session.id, strategy, chunk_size, total_chunks })
    }

    /// Start an import session: the engine itself will pull the bytes from
    /// a third-party source via [`run_import`](Self::run_import). Import
    /// sources are slow and flaky, so these sessions get the longer TTL.
    pub async fn init_import(
        &self,
        principal: &Principal,
        parent_id: Uuid,
        file_name: &str,
        size: i64,
        declared_mime: Option<&str>,
    ) -> Result<UploadTicket> {
        if size <= 0 {
            exn::bail!(ErrorKind::InvalidArgument("payload size must be positive"));
        }
        let file_name = crate::name::validate_file_name(file_name)?;
        let parent = self
            .dirs
            .get_live(principal.user_id, parent_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::NotFound)?;

        let chunk_size = self.config.chunk_size(principal.role);
        let total_chunks = ((size as u64).div_ceil(chunk_size as u64) as i64).max(1);
        let expires_at = UtcDateTime::now() + Duration::seconds(self.config.import_ttl_secs as i64);
        let session = UploadSession::new(
            principal.user_id,
            parent.id,
            file_name,
            size,
            declared_mime.map(str::to_string),
            Strategy::Import,
            chunk_size,
            total_chunks,
            expires_at,
        );
        self.sessions.insert(&session).await.or_raise(|| ErrorKind::Catalog)?;
        Ok(UploadTicket { session_id: session.id, strategy: Strategy::Import, chunk_size, total_chunks })
    }

    /// Offer one chunk.
    ///
    /// Idempotent: an index that is already in the received set reports
    /// [`ChunkOutcome::Skipped`] and the incoming bytes are discarded. The
    /// stored chunk is never overwritten, so however often a client
    /// retries, `complete_upload` sees the same payload.
    pub async fn upload_chunk(
        &self,
        principal: &Principal,
        session_id: Uuid,
        chunk_index: i64,
        bytes: &[u8],
    ) -> Result<ChunkOutcome> {
        let session = self.load_owned_session(principal, session_id).await?;
        if session.status == SessionStatus::Cancelled {
            exn::bail!(ErrorKind::Conflict("upload was cancelled"));
        }
        if session.status.is_terminal() {
            exn::bail!(ErrorKind::Conflict("upload session is already terminal"));
        }
        if session.strategy == Strategy::Import {
            exn::bail!(ErrorKind::Conflict("import sessions do not accept chunks"));
        }
        if chunk_index < 0 || chunk_index >= session.total_chunks {
            exn::bail!(ErrorKind::InvalidArgument("chunk index out of range"));
        }
        if self.sessions.has_chunk(session.id, chunk_index).await.or_raise(|| ErrorKind::Catalog)? {
            return Ok(ChunkOutcome::Skipped);
        }

        self.temp.write_chunk(session.id, chunk_index, bytes).await.or_raise(|| ErrorKind::Storage)?;
        let temp_dir = self.temp.session_dir(session.id);
        self.sessions
            .mark_uploading(session.id, &temp_dir.to_string_lossy())
            .await
            .or_raise(|| ErrorKind::Catalog)?;
        if !self.sessions.record_chunk(session.id, chunk_index).await.or_raise(|| ErrorKind::Catalog)? {
            // Lost a race against a concurrent retry of the same index.
            return Ok(ChunkOutcome::Skipped);
        }
        let received = self.sessions.received_count(session.id).await.or_raise(|| ErrorKind::Catalog)?;
        Ok(ChunkOutcome::Accepted { received, total: session.total_chunks })
    }

    /// Finalize a session whose chunks have all arrived.
    ///
    /// Rejects (mutating nothing) while any chunk is missing. On success
    /// the payload is deduplicated into the blob store, the file reference
    /// exists, the temp area is gone and the session row is deleted. On
    /// failure the session is marked `failed` and temp cleanup is attempted
    /// independently before the error propagates.
    pub async fn complete_upload(&self, principal: &Principal, session_id: Uuid) -> Result<FileRef> {
        let session = self.load_owned_session(principal, session_id).await?;
        if session.status.is_terminal() {
            exn::bail!(ErrorKind::Conflict("upload session is already terminal"));
        }
        if session.strategy == Strategy::Import {
            exn::bail!(ErrorKind::Conflict("import sessions are finalized by the importer"));
        }
        let received = self.sessions.received_count(session.id).await.or_raise(|| ErrorKind::Catalog)?;
        if received != session.total_chunks {
            exn::bail!(ErrorKind::Conflict("not all chunks have been uploaded yet"));
        }

        let outcome = async {
            let (merged, digest, size) = self.merge_chunks(&session).await?;
            self.finalize_payload(&session, &merged, digest, size, SessionStatus::Uploaded).await
        }
        .await;
        self.conclude(session.id, outcome).await
    }

    /// Pull an import session's bytes from its source and finalize them
    /// under the same contract as a chunked upload.
    ///
    /// Source failures mark the session `failed`; the status update and
    /// the temp cleanup are attempted independently so one failing cannot
    /// block the other.
    pub async fn run_import<R>(&self, principal: &Principal, session_id: Uuid, source: R) -> Result<FileRef>
    where
        R: AsyncRead + Unpin,
    {
        let session = self.load_owned_session(principal, session_id).await?;
        if session.status.is_terminal() {
            exn::bail!(ErrorKind::Conflict("import session is already terminal"));
        }
        if session.strategy != Strategy::Import {
            exn::bail!(ErrorKind::Conflict("session is not an import session"));
        }
        self.sessions.set_status(session.id, SessionStatus::Uploading).await.or_raise(|| ErrorKind::Catalog)?;

        let outcome = async {
            let (merged, digest, size) = self.pull_import(&session, source).await?;
            self.finalize_payload(&session, &merged, digest, size, SessionStatus::Imported).await
        }
        .await;
        self.conclude(session.id, outcome).await
    }

    /// Cancel a non-terminal session: temp storage and the session row are
    /// removed outright, in-flight chunks included.
    pub async fn cancel_upload(&self, principal: &Principal, session_id: Uuid) -> Result<()> {
        let session = self.load_owned_session(principal, session_id).await?;
        if session.status.is_terminal() {
            exn::bail!(ErrorKind::Conflict("upload session is already terminal"));
        }
        self.temp.remove_session(session.id).await.or_raise(|| ErrorKind::Storage)?;
        self.sessions.delete(session.id).await.or_raise(|| ErrorKind::Catalog)?;
        tracing::debug!(session = %session.id, "upload session cancelled");
        Ok(())
    }

    /// Session accounting for client polling. Pure read.
    pub async fn upload_status(&self, principal: &Principal, session_id: Uuid) -> Result<UploadStatus> {
        let session = self.load_owned_session(principal, session_id).await?;
        let received_chunks = self.sessions.received_indices(session.id).await.or_raise(|| ErrorKind::Catalog)?;
        let progress = match session.total_chunks {
            0 => 1.0,
            total => received_chunks.len() as f64 / total as f64,
        };
        Ok(UploadStatus {
            status: session.status,
            strategy: session.strategy,
            received_chunks,
            total_chunks: session.total_chunks,
            progress,
        })
    }

    /// Background reclamation of sessions past their expiry: temp area and
    /// row removal are attempted independently per session. Returns how
    /// many rows were reclaimed.
    pub async fn sweep_expired_sessions(&self) -> Result<u64> {
        let expired = self.sessions.list_expired(UtcDateTime::now()).await.or_raise(|| ErrorKind::Catalog)?;
        let mut reclaimed = 0;
        for session in expired {
            if let Err(err) = self.temp.remove_session(session.id).await {
                tracing::warn!(session = %session.id, error = %err, "expiry sweep could not remove temp area");
            }
            match self.sessions.delete(session.id).await {
                Ok(_) => reclaimed += 1,
                Err(err) => tracing::warn!(session = %session.id, error = ?err, "expiry sweep could not delete session row"),
            }
        }
        if reclaimed > 0 {
            tracing::info!(reclaimed, "expired upload sessions reclaimed");
        }
        Ok(reclaimed)
    }

    async fn load_owned_session(&self, principal: &Principal, session_id: Uuid) -> Result<UploadSession> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::NotFound)?;
        if session.user_id != principal.user_id {
            exn::bail!(ErrorKind::Unauthorized);
        }
        Ok(session)
    }

    /// Shared tail of every finalize path: terminal bookkeeping on success,
    /// independent failure-marking and cleanup on error.
    async fn conclude(&self, session_id: Uuid, outcome: Result<FileRef>) -> Result<FileRef> {
        match outcome {
            Ok(file) => {
                self.sessions.set_status(session_id, SessionStatus::Completed).await.or_raise(|| ErrorKind::Catalog)?;
                // Terminal sessions don't linger; drop the row (chunk rows
                // cascade with it).
                self.sessions.delete(session_id).await.or_raise(|| ErrorKind::Catalog)?;
                Ok(file)
            },
            Err(err) => {
                if let Err(status_err) = self.sessions.set_status(session_id, SessionStatus::Failed).await {
                    tracing::warn!(session = %session_id, error = ?status_err, "could not record session failure");
                }
                if let Err(cleanup_err) = self.temp.remove_session(session_id).await {
                    tracing::warn!(session = %session_id, error = %cleanup_err, "could not clean up temp area after failure");
                }
                Err(err)
            },
        }
    }
}
