//! Restore a trashed subtree, repairing the ancestor chain on the way.

use crate::error::{ErrorKind, Result};
use crate::walk::Event;
use crate::{Engine, Principal};
use depot_catalog::{ChildFilter, DeleteMarker, Directory};
use exn::{OptionExt, ResultExt};
use std::collections::HashSet;
use uuid::Uuid;

impl Engine {
    /// Restore an explicitly trashed directory and everything its trash
    /// dragged along.
    ///
    /// Two independent phases:
    /// 1. walk the ancestor chain upward and make sure the target has a
    ///    live parent to reappear under (see [`restore_ancestors`](Self::restore_ancestors));
    /// 2. restore the target itself, then every descendant whose marker is
    ///    `process`. Descendants a user trashed independently keep their
    ///    marker and stay in the trash.
    pub async fn restore_directory(&self, principal: &Principal, dir_id: Uuid) -> Result<()> {
        self.guard_root(principal, dir_id)?;
        let dir = self
            .dirs
            .get(principal.user_id, dir_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::NotFound)?;
        // Only an explicitly trashed node is restorable by name; anything
        // else is invisible here, same as a bad id.
        if !dir.is_deleted || dir.deleted_by != DeleteMarker::User {
            exn::bail!(ErrorKind::NotFound);
        }

        self.restore_ancestors(principal, dir.parent_id).await?;
        self.dirs.restore(dir.id).await.or_raise(|| ErrorKind::Catalog)?;

        for event in self.walk_subtree(principal.user_id, &dir, ChildFilter::TrashedByProcess).await? {
            match event {
                Event::File(file) => {
                    self.files.restore_if_process(file.id).await.or_raise(|| ErrorKind::Catalog)?;
                },
                Event::EnterDir(child) if child.id != dir.id => {
                    self.dirs.restore_if_process(child.id).await.or_raise(|| ErrorKind::Catalog)?;
                },
                _ => {},
            }
        }
        tracing::debug!(directory = %dir.id, "subtree restored");
        Ok(())
    }

    /// Restore a single explicitly trashed file.
    pub async fn restore_file(&self, principal: &Principal, file_id: Uuid) -> Result<()> {
        let file = self
            .files
            .get(principal.user_id, file_id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::NotFound)?;
        if !file.is_deleted || file.deleted_by != DeleteMarker::User {
            exn::bail!(ErrorKind::NotFound);
        }
        self.restore_ancestors(principal, Some(file.parent_id)).await?;
        self.files.restore(file.id).await.or_raise(|| ErrorKind::Catalog)?;
        Ok(())
    }

    /// Walk the parent chain upward until the restored node has somewhere
    /// live to land.
    ///
    /// - live parent: done.
    /// - parent trashed by `process`: undo that marker and keep climbing;
    ///   the chain above it may be trashed too.
    /// - parent trashed by `user`: leave it untouched and stop. Restoring a
    ///   child does not resurrect an ancestor the user trashed on purpose.
    /// - parent row missing entirely: its record was hard-deleted out from
    ///   under us. Synthesize a placeholder directory with that exact id
    ///   under the user's root so the child has somewhere to live. This is
    ///   a best-effort repair of data that should never go missing, so it
    ///   is logged loudly; frequent triggering is a bug signal upstream.
    ///
    /// Carries its own visited-set: a corrupted parent chain may loop.
    pub(crate) async fn restore_ancestors(&self, principal: &Principal, start: Option<Uuid>) -> Result<()> {
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut current = start;
        while let Some(parent_id) = current {
            if !visited.insert(parent_id) {
                break;
            }
            match self.dirs.get(principal.user_id, parent_id).await.or_raise(|| ErrorKind::Catalog)? {
                Some(parent) if !parent.is_deleted => break,
                Some(parent) => match parent.deleted_by {
                    DeleteMarker::Process => {
                        self.dirs.restore_if_process(parent.id).await.or_raise(|| ErrorKind::Catalog)?;
                        current = parent.parent_id;
                    },
                    // A deliberately trashed ancestor stays trashed.
                    _ => break,
                },
                None => {
                    tracing::warn!(
                        parent = %parent_id,
                        user = %principal.user_id,
                        "ancestor row missing; synthesizing placeholder under root"
                    );
                    let mut placeholder = Directory::new(
                        principal.user_id,
                        Some(principal.root_dir_id),
                        format!("recovered-{}", &parent_id.to_string()[..8]),
                    );
                    placeholder.id = parent_id;
                    self.dirs.insert(&placeholder).await.or_raise(|| ErrorKind::Catalog)?;
                    break;
                },
            }
        }
        Ok(())
    }
}
