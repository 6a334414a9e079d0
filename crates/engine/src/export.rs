//! Streamed archive export of a directory subtree.

use crate::error::{ErrorKind, Result};
use crate::walk::Event;
use crate::{Engine, Principal, name};
use async_compression::tokio::write::GzipEncoder;
use depot_catalog::ChildFilter;
use exn::{OptionExt, ResultExt};
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_tar::{Builder, EntryType, Header};
use uuid::Uuid;

impl Engine {
    /// Export a live subtree as a gzipped tar stream into `writer`.
    ///
    /// One entry per live file reference, streamed straight from the object
    /// store; one explicit directory entry per live directory so empty
    /// folders round-trip. Entry names are sanitised (no separators, no
    /// `..`), and the store's key validation keeps every physical open
    /// inside the storage root. A payload missing from the store is
    /// skipped, not fatal. The archive is consumed incrementally; the
    /// subtree's bytes are never materialised in memory at once.
    pub async fn export_directory<W>(&self, principal: &Principal, dir_id: Uuid, writer: W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send + Sync + 'static,
    {
        let dir = self
            .dirs
            .get_live(principal.user_id, dir_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::NotFound)?;

        let mut builder = Builder::new(GzipEncoder::new(writer));
        let mut prefix: Vec<String> = Vec::new();

        for event in self.walk_subtree(principal.user_id, &dir, ChildFilter::Live).await? {
            match event {
                Event::EnterDir(entered) => {
                    prefix.push(name::sanitize_entry(&entered.name));
                    let mut header = Header::new_gnu();
                    header.set_entry_type(EntryType::dir());
                    header.set_size(0);
                    header.set_mode(0o755);
                    header.set_mtime(entered.updated_at.unix_timestamp().max(0) as u64);
                    builder
                        .append_data(&mut header, format!("{}/", prefix.join("/")), tokio::io::empty())
                        .await
                        .or_raise(|| ErrorKind::Storage)?;
                },
                Event::LeaveDir(_) => {
                    prefix.pop();
                },
                Event::File(file) => {
                    let Some(blob) = self.blobs.get(file.blob_id).await.or_raise(|| ErrorKind::Catalog)? else {
                        tracing::warn!(file = %file.id, blob = %file.blob_id, "blob row missing; skipping entry");
                        continue;
                    };
                    // reader() validates the key, which is what pins the
                    // resolved path inside the storage root.
                    let reader = match self.store.reader(Path::new(&blob.object_key)).await {
                        Ok(reader) => reader,
                        Err(err) if matches!(&*err, depot_storage::error::ErrorKind::NotFound(_)) => {
                            tracing::warn!(file = %file.id, key = %blob.object_key, "payload missing; skipping entry");
                            continue;
                        },
                        Err(err) => return Err(err).or_raise(|| ErrorKind::Storage),
                    };
                    let entry_path = format!("{}/{}", prefix.join("/"), name::sanitize_entry(&file.name));
                    let mut header = Header::new_gnu();
                    header.set_entry_type(EntryType::file());
                    header.set_size(blob.size.max(0) as u64);
                    header.set_mode(0o644);
                    header.set_mtime(file.updated_at.unix_timestamp().max(0) as u64);
                    builder.append_data(&mut header, entry_path, reader).await.or_raise(|| ErrorKind::Storage)?;
                },
            }
        }

        let mut encoder = builder.into_inner().await.or_raise(|| ErrorKind::Storage)?;
        encoder.shutdown().await.or_raise(|| ErrorKind::Storage)?;
        Ok(())
    }
}
