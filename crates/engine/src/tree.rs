//! Namespace tree operations: create, rename, move, list.

use crate::error::{ErrorKind, Result};
use crate::{Engine, Principal, name};
use depot_catalog::{ChildFilter, Directory, FileRef};
use exn::{OptionExt, ResultExt};
use uuid::Uuid;

/// The immediate, live contents of a directory.
#[derive(Debug)]
pub struct Listing {
    pub directories: Vec<Directory>,
    pub files: Vec<FileRef>,
}

impl Engine {
    /// Reject mutating operations aimed at the caller's own root.
    pub(crate) fn guard_root(&self, principal: &Principal, target: Uuid) -> Result<()> {
        if target == principal.root_dir_id {
            exn::bail!(ErrorKind::InvalidArgument("operations on the root directory are not allowed"));
        }
        Ok(())
    }

    /// Provision the per-user root directory. Called once per account by
    /// the (out-of-scope) signup path; tests use it too.
    pub async fn create_root(&self, user_id: Uuid) -> Result<Directory> {
        let root = Directory::new(user_id, None, "root");
        self.dirs.insert(&root).await.or_raise(|| ErrorKind::Catalog)?;
        Ok(root)
    }

    /// Create a directory under a live, owned parent. An empty name falls
    /// back to a placeholder.
    pub async fn create_directory(
        &self,
        principal: &Principal,
        parent_id: Uuid,
        dir_name: Option<&str>,
    ) -> Result<Directory> {
        let dir_name = name::directory_name_or_default(dir_name)?;
        let parent = self
            .dirs
            .get_live(principal.user_id, parent_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::NotFound)?;

        let dir = Directory::new(principal.user_id, Some(parent.id), dir_name);
        self.dirs.insert(&dir).await.or_raise(|| ErrorKind::Catalog)?;
        tracing::debug!(directory = %dir.id, parent = %parent.id, "directory created");
        Ok(dir)
    }

    /// Rename a live directory. The new name faces the same character
    /// blacklist as creation.
    pub async fn rename_directory(&self, principal: &Principal, dir_id: Uuid, new_name: &str) -> Result<()> {
        self.guard_root(principal, dir_id)?;
        let new_name = name::validate_directory_name(new_name)?;
        let renamed = self
            .dirs
            .rename(principal.user_id, dir_id, &new_name)
            .await
            .or_raise(|| ErrorKind::Catalog)?;
        match renamed {
            true => Ok(()),
            false => exn::bail!(ErrorKind::NotFound),
        }
    }

    /// Move a live directory under another live directory.
    pub async fn move_directory(&self, principal: &Principal, dir_id: Uuid, target_id: Uuid) -> Result<()> {
        self.guard_root(principal, dir_id)?;
        if dir_id == target_id {
            exn::bail!(ErrorKind::InvalidArgument("cannot move a directory into itself"));
        }
        let target = self
            .dirs
            .get_live(principal.user_id, target_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::NotFound)?;
        let dir = self
            .dirs
            .get_live(principal.user_id, dir_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::NotFound)?;
        if dir.parent_id == Some(target.id) {
            exn::bail!(ErrorKind::Conflict("directory is already in the target destination"));
        }
        self.dirs.set_parent(principal.user_id, dir.id, target.id).await.or_raise(|| ErrorKind::Catalog)?;
        Ok(())
    }

    /// List the live immediate children (directories and file references)
    /// of an owned, live directory.
    pub async fn list_directory(&self, principal: &Principal, dir_id: Uuid) -> Result<Listing> {
        let dir = self
            .dirs
            .get_live(principal.user_id, dir_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::NotFound)?;
        let directories =
            self.dirs.children(principal.user_id, dir.id, ChildFilter::Live).await.or_raise(|| ErrorKind::Catalog)?;
        let files =
            self.files.children(principal.user_id, dir.id, ChildFilter::Live).await.or_raise(|| ErrorKind::Catalog)?;
        Ok(Listing { directories, files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::harness;

    #[tokio::test]
    async fn test_create_directory_under_root() {
        let h = harness().await;
        let dir = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("Documents")).await.unwrap();
        assert_eq!(dir.name, "Documents");
        assert_eq!(dir.parent_id, Some(h.principal.root_dir_id));
    }

    #[tokio::test]
    async fn test_create_directory_defaults_name() {
        let h = harness().await;
        let dir = h.engine.create_directory(&h.principal, h.principal.root_dir_id, None).await.unwrap();
        assert_eq!(dir.name, name::DEFAULT_DIRECTORY_NAME);
    }

    #[tokio::test]
    async fn test_create_directory_rejects_bad_names_and_parents() {
        let h = harness().await;
        let err = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("a/b")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument(_)));
        // Unknown parent is indistinguishable from someone else's parent.
        let err = h.engine.create_directory(&h.principal, Uuid::new_v4(), Some("ok")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_create_directory_rejects_trashed_parent() {
        let h = harness().await;
        let parent = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("parent")).await.unwrap();
        h.engine.trash_directory(&h.principal, parent.id).await.unwrap();
        let err = h.engine.create_directory(&h.principal, parent.id, Some("child")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_rename_directory() {
        let h = harness().await;
        let dir = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("before")).await.unwrap();
        h.engine.rename_directory(&h.principal, dir.id, "after").await.unwrap();
        let listing = h.engine.list_directory(&h.principal, h.principal.root_dir_id).await.unwrap();
        assert_eq!(listing.directories[0].name, "after");
        // Same blacklist as creation.
        let err = h.engine.rename_directory(&h.principal, dir.id, "a|b").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_move_directory_rejects_noop_and_self() {
        let h = harness().await;
        let a = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("a")).await.unwrap();
        let b = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("b")).await.unwrap();

        // No-op move to the current parent.
        let err = h.engine.move_directory(&h.principal, a.id, h.principal.root_dir_id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));
        // Into itself.
        let err = h.engine.move_directory(&h.principal, a.id, a.id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument(_)));
        // A real move works.
        h.engine.move_directory(&h.principal, a.id, b.id).await.unwrap();
        let listing = h.engine.list_directory(&h.principal, b.id).await.unwrap();
        assert_eq!(listing.directories.len(), 1);
        assert_eq!(listing.directories[0].id, a.id);
    }

    #[tokio::test]
    async fn test_root_guard() {
        let h = harness().await;
        let err = h.engine.rename_directory(&h.principal, h.principal.root_dir_id, "new-root").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument(_)));
        let err = h.engine.trash_directory(&h.principal, h.principal.root_dir_id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument(_)));
        let err = h.engine.delete_directory(&h.principal, h.principal.root_dir_id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_listing_excludes_trashed_nodes() {
        let h = harness().await;
        let keep = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("keep")).await.unwrap();
        let gone = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("gone")).await.unwrap();
        h.engine.trash_directory(&h.principal, gone.id).await.unwrap();
        let listing = h.engine.list_directory(&h.principal, h.principal.root_dir_id).await.unwrap();
        assert_eq!(listing.directories.len(), 1);
        assert_eq!(listing.directories[0].id, keep.id);
    }

    #[tokio::test]
    async fn test_foreign_tree_is_invisible() {
        let h = harness().await;
        let stranger = crate::Principal::new(Uuid::new_v4(), crate::Role::User, Uuid::new_v4());
        let dir = h.engine.create_directory(&h.principal, h.principal.root_dir_id, Some("mine")).await.unwrap();
        let err = h.engine.list_directory(&stranger, dir.id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound));
        let err = h.engine.rename_directory(&stranger, dir.id, "stolen").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound));
    }
}
