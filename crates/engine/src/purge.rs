//! Permanent deletion: remove rows, release blob references, reclaim
//! payloads.

use crate::error::{ErrorKind, Result};
use crate::walk::Event;
use crate::{Engine, Principal};
use depot_catalog::{Blob, ChildFilter, FileRef, Release};
use exn::{OptionExt, ResultExt};
use std::path::Path;
use uuid::Uuid;

impl Engine {
    /// Permanently delete a directory subtree, trashed or not.
    ///
    /// Depth-first: at each level the file references go first (each one
    /// releasing its blob reference, reclaiming the payload when the count
    /// hits zero), then child directories after their own subtree, then the
    /// explicitly targeted directory last.
    ///
    /// Not transactional: a failure mid-walk leaves already-processed
    /// nodes gone, and re-running finishes the rest without
    /// double-processing.
    pub async fn delete_directory(&self, principal: &Principal, dir_id: Uuid) -> Result<()> {
        self.guard_root(principal, dir_id)?;
        let dir = self
            .dirs
            .get(principal.user_id, dir_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::NotFound)?;

        for event in self.walk_subtree(principal.user_id, &dir, ChildFilter::Any).await? {
            match event {
                Event::File(file) => self.purge_file_ref(&file).await?,
                Event::LeaveDir(child) if child.id != dir.id => {
                    self.dirs.delete(child.id).await.or_raise(|| ErrorKind::Catalog)?;
                },
                _ => {},
            }
        }
        // The explicit target goes last.
        self.dirs.delete(dir.id).await.or_raise(|| ErrorKind::Catalog)?;
        tracing::debug!(directory = %dir.id, "subtree permanently deleted");
        Ok(())
    }

    /// Permanently delete a single file reference.
    pub async fn delete_file(&self, principal: &Principal, file_id: Uuid) -> Result<()> {
        let file = self
            .files
            .get(principal.user_id, file_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::NotFound)?;
        self.purge_file_ref(&file).await
    }

    /// Delete one reference row, release its blob reference, and reclaim
    /// the physical payload if this was the last reference.
    async fn purge_file_ref(&self, file: &FileRef) -> Result<()> {
        self.files.delete(file.id).await.or_raise(|| ErrorKind::Catalog)?;
        match self.blobs.release(file.blob_id).await.or_raise(|| ErrorKind::Catalog)? {
            Release::Reclaimed(blob) => self.unlink_payload(&blob).await,
            Release::Retained(_) => Ok(()),
            Release::Missing => {
                // The reference was dangling. Not fatal to the walk, but
                // something upstream broke an invariant.
                tracing::warn!(file = %file.id, blob = %file.blob_id, "blob row missing while releasing reference");
                Ok(())
            },
        }
    }

    /// Best-effort physical unlink: a payload that is already gone is fine,
    /// any other storage error surfaces.
    async fn unlink_payload(&self, blob: &Blob) -> Result<()> {
        match self.store.delete(Path::new(&blob.object_key)).await {
            Ok(()) => {
                tracing::debug!(blob = %blob.id, key = %blob.object_key, "payload reclaimed");
                Ok(())
            },
            Err(err) if matches!(&*err, depot_storage::error::ErrorKind::NotFound(_)) => {
                tracing::debug!(blob = %blob.id, key = %blob.object_key, "payload already gone");
                Ok(())
            },
            Err(err) => Err(err).or_raise(|| ErrorKind::Storage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::harness;

    #[tokio::test]
    async fn test_delete_reclaims_last_reference() {
        let h = harness().await;
        let user = h.principal.user_id;
        let file = h.upload_small_file(h.principal.root_dir_id, "only.txt", b"unique contents").await;
        let blob = h.engine.blobs.get(file.blob_id).await.unwrap().unwrap();
        assert!(h.store.exists(Path::new(&blob.object_key)).await.unwrap());

        h.engine.delete_file(&h.principal, file.id).await.unwrap();

        assert!(h.engine.files.get(user, file.id).await.unwrap().is_none());
        assert!(h.engine.blobs.get(file.blob_id).await.unwrap().is_none());
        assert!(!h.store.exists(Path::new(&blob.object_key)).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_with_surviving_sibling_decrements_only() {
        let h = harness().await;
        // Two refs to identical content -> one blob, ref_count 2.
        let first = h.upload_small_file(h.principal.root_dir_id, "copy-a.txt", b"shared contents").await;
        let second = h.upload_small_file(h.principal.root_dir_id, "copy-b.txt", b"shared contents").await;
        assert_eq!(first.blob_id, second.blob_id);

        h.engine.delete_file(&h.principal, first.id).await.unwrap();

        let blob = h.engine.blobs.get(second.blob_id).await.unwrap().unwrap();
        assert_eq!(blob.ref_count, 1);
        assert!(h.store.exists(Path::new(&blob.object_key)).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_directory_children_before_parent() {
        let h = harness().await;
        let user = h.principal.user_id;
        let top = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("top")).await.unwrap();
        let mid = h.engine.create_directory(&h.principal, top.id, Some("mid")).await.unwrap();
        let file = h.upload_small_file(mid.id, "leaf.txt", b"leaf contents").await;

        h.engine.delete_directory(&h.principal, top.id).await.unwrap();

        assert!(h.engine.dirs.get(user, top.id).await.unwrap().is_none());
        assert!(h.engine.dirs.get(user, mid.id).await.unwrap().is_none());
        assert!(h.engine.files.get(user, file.id).await.unwrap().is_none());
        assert!(h.engine.blobs.get(file.blob_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_directory_covers_trashed_nodes() {
        let h = harness().await;
        let user = h.principal.user_id;
        let dir = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("dir")).await.unwrap();
        let file = h.upload_small_file(dir.id, "trashed.txt", b"trashed contents").await;
        h.engine.trash_directory(&h.principal, dir.id).await.unwrap();

        h.engine.delete_directory(&h.principal, dir.id).await.unwrap();
        assert!(h.engine.dirs.get(user, dir.id).await.unwrap().is_none());
        assert!(h.engine.files.get(user, file.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_payload_is_not_fatal() {
        let h = harness().await;
        let file = h.upload_small_file(h.principal.root_dir_id, "gone.txt", b"soon gone").await;
        let blob = h.engine.blobs.get(file.blob_id).await.unwrap().unwrap();
        // Someone unlinked the payload out-of-band.
        h.store.delete(Path::new(&blob.object_key)).await.unwrap();
        h.engine.delete_file(&h.principal, file.id).await.unwrap();
        assert!(h.engine.blobs.get(file.blob_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_terminates_on_forged_cycle() {
        let h = harness().await;
        let user = h.principal.user_id;
        let a = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("a")).await.unwrap();
        let b = h.engine.create_directory(&h.principal, a.id, Some("b")).await.unwrap();
        h.engine.dirs.set_parent(user, a.id, b.id).await.unwrap();

        h.engine.delete_directory(&h.principal, a.id).await.unwrap();
        assert!(h.engine.dirs.get(user, a.id).await.unwrap().is_none());
        assert!(h.engine.dirs.get(user, b.id).await.unwrap().is_none());
    }
}
