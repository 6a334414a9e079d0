//! Merge, digest, sniff, dedupe and record a finished payload.
//!
//! This is the single finalize contract every ingestion strategy funnels
//! into: chunked and direct uploads arrive via [`Engine::merge_chunks`],
//! imports via [`Engine::pull_import`], and both hand a fully assembled
//! payload file to [`Engine::finalize_payload`].

use crate::error::{ErrorKind, Result};
use crate::{Engine, sniff};
use depot_catalog::{Blob, FileRef, SessionStatus, StorageProvider, UploadSession};
use exn::ResultExt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Chunks and payloads move through fixed-size buffers; a whole file is
/// never held in memory.
const COPY_BUF: usize = 64 * 1024;

impl Engine {
    /// Concatenate the session's chunks in index order into one payload
    /// file, computing the content digest on the way through.
    pub(crate) async fn merge_chunks(&self, session: &UploadSession) -> Result<(PathBuf, String, i64)> {
        let mut out = self.temp.create_merged(session.id).await.or_raise(|| ErrorKind::Storage)?;
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; COPY_BUF];
        let mut total: i64 = 0;

        for index in 0..session.total_chunks {
            let chunk_path = self.temp.chunk_path(session.id, index);
            let mut chunk = match fs::File::open(&chunk_path).await {
                Ok(file) => file,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    // The received-set said this chunk exists; its file is
                    // gone. Re-uploading the chunk is not possible once the
                    // set claims it, so surface the inconsistency.
                    exn::bail!(ErrorKind::Integrity("recorded chunk file is missing"));
                },
                Err(err) => return Err(err).or_raise(|| ErrorKind::Storage),
            };
            loop {
                let n = chunk.read(&mut buf).await.or_raise(|| ErrorKind::Storage)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
                out.write_all(&buf[..n]).await.or_raise(|| ErrorKind::Storage)?;
                total += n as i64;
            }
        }
        out.flush().await.or_raise(|| ErrorKind::Storage)?;
        Ok((self.temp.merged_path(session.id), hasher.finalize().to_hex().to_string(), total))
    }

    /// Stream a third-party source into the merged-payload slot, computing
    /// the content digest on the way through.
    pub(crate) async fn pull_import<R>(&self, session: &UploadSession, mut source: R) -> Result<(PathBuf, String, i64)>
    where
        R: AsyncRead + Unpin,
    {
        let mut out = self.temp.create_merged(session.id).await.or_raise(|| ErrorKind::Storage)?;
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; COPY_BUF];
        let mut total: i64 = 0;
        loop {
            let n = source.read(&mut buf).await.or_raise(|| ErrorKind::Storage)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            out.write_all(&buf[..n]).await.or_raise(|| ErrorKind::Storage)?;
            total += n as i64;
        }
        out.flush().await.or_raise(|| ErrorKind::Storage)?;
        Ok((self.temp.merged_path(session.id), hasher.finalize().to_hex().to_string(), total))
    }

    /// Dedupe and record an assembled payload.
    ///
    /// Sniffs the true MIME from the payload's leading bytes (the declared
    /// value is spoofable), upserts the blob, stores the payload only when
    /// this digest is new system-wide, creates the file reference, bumps
    /// the parent's informational size and leaves the session in
    /// `pre_status` with its temp area gone.
    pub(crate) async fn finalize_payload(
        &self,
        session: &UploadSession,
        merged: &Path,
        digest: String,
        size: i64,
        pre_status: SessionStatus,
    ) -> Result<FileRef> {
        let head = read_head(merged, sniff::SNIFF_LEN).await.or_raise(|| ErrorKind::Storage)?;
        let detected = sniff::detect(&head, &session.file_name, session.declared_mime.as_deref());
        let disposition = sniff::disposition_for(&detected);

        // Key layout fans payloads out over 256 top-level buckets.
        let object_key = format!("{}/{}", &digest[..2], &digest[2..]);
        let candidate =
            Blob::new(session.user_id, digest, detected.clone(), size, StorageProvider::Local, object_key);
        let candidate_id = candidate.id;
        let stored = self.blobs.ingest(&candidate).await.or_raise(|| ErrorKind::Catalog)?;

        if stored.id == candidate_id {
            // Fresh content: stream the merged payload into the store.
            let mut reader = fs::File::open(merged).await.or_raise(|| ErrorKind::Storage)?;
            let mut writer = self.store.writer(Path::new(&stored.object_key)).await.or_raise(|| ErrorKind::Storage)?;
            tokio::io::copy(&mut reader, &mut writer).await.or_raise(|| ErrorKind::Storage)?;
            writer.shutdown().await.or_raise(|| ErrorKind::Storage)?;
        } else {
            // An identical payload already exists; this one is surplus.
            tracing::debug!(blob = %stored.id, refs = stored.ref_count, "duplicate content; discarding merged payload");
        }

        let file = FileRef::new(
            session.user_id,
            session.parent_id,
            stored.id,
            session.file_name.as_str(),
            session.declared_mime.clone().unwrap_or_else(|| detected.clone()),
            disposition,
        );
        self.files.insert(&file).await.or_raise(|| ErrorKind::Catalog)?;
        self.dirs.add_size(session.parent_id, size).await.or_raise(|| ErrorKind::Catalog)?;
        self.sessions.set_status(session.id, pre_status).await.or_raise(|| ErrorKind::Catalog)?;
        self.temp.remove_session(session.id).await.or_raise(|| ErrorKind::Storage)?;
        tracing::debug!(file = %file.id, blob = %stored.id, "payload finalized");
        Ok(file)
    }
}

async fn read_head(path: &Path, len: usize) -> io::Result<Vec<u8>> {
    let file = fs::File::open(path).await?;
    let mut buf = Vec::with_capacity(len);
    file.take(len as u64).read_to_end(&mut buf).await?;
    Ok(buf)
}
