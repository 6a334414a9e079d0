//! Soft-delete ("trash") a subtree.

use crate::error::{ErrorKind, Result};
use crate::walk::Event;
use crate::{Engine, Principal};
use depot_catalog::ChildFilter;
use exn::{OptionExt, ResultExt};
use uuid::Uuid;

impl Engine {
    /// Trash a directory subtree.
    ///
    /// The explicitly targeted directory is marked `deleted_by = 'user'`.
    /// Every descendant (files first at each level, child directories
    /// after their own subtree) gets `'process'`, so a later restore can
    /// tell "explicitly trashed" apart from "dragged along".
    pub async fn trash_directory(&self, principal: &Principal, dir_id: Uuid) -> Result<()> {
        self.guard_root(principal, dir_id)?;
        let dir = self
            .dirs
            .get_live(principal.user_id, dir_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::NotFound)?;

        if !self.dirs.trash_root(dir.id).await.or_raise(|| ErrorKind::Catalog)? {
            exn::bail!(ErrorKind::Conflict("directory is already trashed"));
        }

        for event in self.walk_subtree(principal.user_id, &dir, ChildFilter::Live).await? {
            match event {
                Event::File(file) => {
                    self.files.trash_subtree(file.id).await.or_raise(|| ErrorKind::Catalog)?;
                },
                Event::LeaveDir(child) if child.id != dir.id => {
                    self.dirs.trash_subtree(child.id).await.or_raise(|| ErrorKind::Catalog)?;
                },
                _ => {},
            }
        }
        tracing::debug!(directory = %dir.id, "subtree trashed");
        Ok(())
    }

    /// Trash a single file reference.
    pub async fn trash_file(&self, principal: &Principal, file_id: Uuid) -> Result<()> {
        let file = self
            .files
            .get_live(principal.user_id, file_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::NotFound)?;
        if !self.files.trash_root(file.id).await.or_raise(|| ErrorKind::Catalog)? {
            exn::bail!(ErrorKind::Conflict("file is already trashed"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::harness;
    use depot_catalog::DeleteMarker;

    #[tokio::test]
    async fn test_trash_marks_target_user_and_descendants_process() {
        let h = harness().await;
        let user = h.principal.user_id;
        let top = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("top")).await.unwrap();
        let mid = h.engine.create_directory(&h.principal, top.id, Some("mid")).await.unwrap();
        let leaf = h.engine.create_directory(&h.principal, mid.id, Some("leaf")).await.unwrap();

        h.engine.trash_directory(&h.principal, top.id).await.unwrap();

        let top = h.engine.dirs.get(user, top.id).await.unwrap().unwrap();
        assert!(top.is_deleted);
        assert_eq!(top.deleted_by, DeleteMarker::User);
        for id in [mid.id, leaf.id] {
            let dir = h.engine.dirs.get(user, id).await.unwrap().unwrap();
            assert!(dir.is_deleted);
            assert_eq!(dir.deleted_by, DeleteMarker::Process);
        }
    }

    #[tokio::test]
    async fn test_trash_twice_conflicts() {
        let h = harness().await;
        let dir = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("dir")).await.unwrap();
        h.engine.trash_directory(&h.principal, dir.id).await.unwrap();
        let err = h.engine.trash_directory(&h.principal, dir.id).await.unwrap_err();
        // Already-gone reads as not-found: the listing no longer shows it.
        assert!(matches!(&*err, ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_trash_file() {
        let h = harness().await;
        let user = h.principal.user_id;
        let file = h.upload_small_file(h.principal.root_dir_id, "doc.txt", b"contents").await;
        h.engine.trash_file(&h.principal, file.id).await.unwrap();
        let file = h.engine.files.get(user, file.id).await.unwrap().unwrap();
        assert!(file.is_deleted);
        assert_eq!(file.deleted_by, DeleteMarker::User);
        // Trashing again: it is no longer live.
        let err = h.engine.trash_file(&h.principal, file.id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_trash_terminates_on_forged_cycle() {
        let h = harness().await;
        let user = h.principal.user_id;
        let a = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("a")).await.unwrap();
        let b = h.engine.create_directory(&h.principal, a.id, Some("b")).await.unwrap();
        // Forge a cycle: a's parent becomes its own descendant.
        h.engine.dirs.set_parent(user, a.id, b.id).await.unwrap();

        h.engine.trash_directory(&h.principal, b.id).await.unwrap();
        let a = h.engine.dirs.get(user, a.id).await.unwrap().unwrap();
        let b = h.engine.dirs.get(user, b.id).await.unwrap().unwrap();
        assert!(a.is_deleted && b.is_deleted);
    }
}
