//! Repository for directory tree nodes.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{Directory, DirectoryRow};
use crate::repo::ChildFilter;
use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;
use uuid::Uuid;

/// Repository for [`Directory`] rows.
///
/// All queries are scoped by owner where the caller acts on behalf of a
/// user; the id-only mutations (`trash_subtree`, `restore`, `delete`, ...)
/// are reserved for traversals that already resolved ownership at the
/// subtree root.
#[derive(Debug, Clone)]
pub struct DirectoryRepo {
    pool: SqlitePool,
}
impl From<&Database> for DirectoryRepo {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl DirectoryRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, dir: &Directory) -> Result<()> {
        let row = DirectoryRow::from(dir);
        sqlx::query(include_str!("../../queries/insert_directory.sql"))
            .bind(row.id)
            .bind(row.user_id)
            .bind(row.parent_id)
            .bind(row.name)
            .bind(row.size)
            .bind(row.is_deleted)
            .bind(row.deleted_by)
            .bind(row.deleted_at)
            .bind(row.created_at)
            .bind(row.updated_at)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Get a directory regardless of deletion state.
    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Directory>> {
        let row: Option<DirectoryRow> = sqlx::query_as(include_str!("../../queries/get_directory.sql"))
            .bind(user_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Directory::try_from).transpose()
    }

    /// Get a directory only if it is not soft-deleted.
    pub async fn get_live(&self, user_id: Uuid, id: Uuid) -> Result<Option<Directory>> {
        let row: Option<DirectoryRow> = sqlx::query_as(include_str!("../../queries/get_live_directory.sql"))
            .bind(user_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Directory::try_from).transpose()
    }

    /// List immediate child directories, sliced by `filter`.
    pub async fn children(&self, user_id: Uuid, parent_id: Uuid, filter: ChildFilter) -> Result<Vec<Directory>> {
        let query = match filter {
            ChildFilter::Live => include_str!("../../queries/list_child_dirs_live.sql"),
            ChildFilter::TrashedByProcess => include_str!("../../queries/list_child_dirs_trashed.sql"),
            ChildFilter::Any => include_str!("../../queries/list_child_dirs_any.sql"),
        };
        let rows: Vec<DirectoryRow> = sqlx::query_as(query)
            .bind(user_id.to_string())
            .bind(parent_id.to_string())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Directory::try_from).collect()
    }

    /// Rename a live directory. Returns `false` if no live row matched.
    pub async fn rename(&self, user_id: Uuid, id: Uuid, name: &str) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/rename_directory.sql"))
            .bind(name)
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(user_id.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Re-parent a live directory. Returns `false` if no live row matched.
    pub async fn set_parent(&self, user_id: Uuid, id: Uuid, parent_id: Uuid) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/move_directory.sql"))
            .bind(parent_id.to_string())
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(user_id.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark an explicitly targeted directory trashed (`deleted_by = 'user'`).
    ///
    /// Conditional: only a live node not already swept up by a subtree trash
    /// qualifies. Returns `false` when the condition did not match.
    pub async fn trash_root(&self, id: Uuid) -> Result<bool> {
        let now = UtcDateTime::now().unix_timestamp();
        let result = sqlx::query(include_str!("../../queries/trash_directory_root.sql"))
            .bind(now)
            .bind(now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a descendant trashed (`deleted_by = 'process'`).
    pub async fn trash_subtree(&self, id: Uuid) -> Result<bool> {
        let now = UtcDateTime::now().unix_timestamp();
        let result = sqlx::query(include_str!("../../queries/trash_directory_subtree.sql"))
            .bind(now)
            .bind(now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Restore a directory unconditionally (marker back to `none`).
    pub async fn restore(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/restore_directory.sql"))
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Restore a directory only if it was dragged along by a subtree trash.
    /// A `user`-marked row is left untouched and `false` is returned.
    pub async fn restore_if_process(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/restore_directory_if_process.sql"))
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Hard-delete a directory row.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/delete_directory.sql"))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Adjust the informational cumulative size.
    pub async fn add_size(&self, id: Uuid, delta: i64) -> Result<()> {
        sqlx::query(include_str!("../../queries/add_directory_size.sql"))
            .bind(delta)
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeleteMarker;

    async fn repo() -> DirectoryRepo {
        let db = Database::connect_in_memory().await.unwrap();
        DirectoryRepo::from(&db)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = repo().await;
        let user = Uuid::new_v4();
        let dir = Directory::new(user, None, "root");
        repo.insert(&dir).await.unwrap();
        let fetched = repo.get(user, dir.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "root");
        assert!(fetched.is_root());
        // Unknown owner sees nothing.
        assert!(repo.get(Uuid::new_v4(), dir.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_children_filters() {
        let repo = repo().await;
        let user = Uuid::new_v4();
        let root = Directory::new(user, None, "root");
        repo.insert(&root).await.unwrap();
        let live = Directory::new(user, Some(root.id), "live");
        let swept = Directory::new(user, Some(root.id), "swept");
        repo.insert(&live).await.unwrap();
        repo.insert(&swept).await.unwrap();
        repo.trash_subtree(swept.id).await.unwrap();

        let live_children = repo.children(user, root.id, ChildFilter::Live).await.unwrap();
        assert_eq!(live_children.len(), 1);
        assert_eq!(live_children[0].id, live.id);

        let trashed = repo.children(user, root.id, ChildFilter::TrashedByProcess).await.unwrap();
        assert_eq!(trashed.len(), 1);
        assert_eq!(trashed[0].id, swept.id);
        assert_eq!(trashed[0].deleted_by, DeleteMarker::Process);

        let any = repo.children(user, root.id, ChildFilter::Any).await.unwrap();
        assert_eq!(any.len(), 2);
    }

    #[tokio::test]
    async fn test_trash_root_is_conditional() {
        let repo = repo().await;
        let user = Uuid::new_v4();
        let dir = Directory::new(user, None, "dir");
        repo.insert(&dir).await.unwrap();
        // First trash wins...
        assert!(repo.trash_root(dir.id).await.unwrap());
        // ...second one has nothing live left to mark.
        assert!(!repo.trash_root(dir.id).await.unwrap());
        let fetched = repo.get(user, dir.id).await.unwrap().unwrap();
        assert!(fetched.is_deleted);
        assert_eq!(fetched.deleted_by, DeleteMarker::User);
    }

    #[tokio::test]
    async fn test_trash_root_refuses_process_marked_rows() {
        let repo = repo().await;
        let user = Uuid::new_v4();
        let dir = Directory::new(user, None, "dir");
        repo.insert(&dir).await.unwrap();
        repo.trash_subtree(dir.id).await.unwrap();
        // A node swept up by a subtree trash cannot be re-marked 'user'.
        assert!(!repo.trash_root(dir.id).await.unwrap());
        let fetched = repo.get(user, dir.id).await.unwrap().unwrap();
        assert_eq!(fetched.deleted_by, DeleteMarker::Process);
    }

    #[tokio::test]
    async fn test_restore_if_process_leaves_user_marked_rows() {
        let repo = repo().await;
        let user = Uuid::new_v4();
        let dir = Directory::new(user, None, "dir");
        repo.insert(&dir).await.unwrap();
        repo.trash_root(dir.id).await.unwrap();
        assert!(!repo.restore_if_process(dir.id).await.unwrap());
        assert!(repo.get(user, dir.id).await.unwrap().unwrap().is_deleted);
        // Unconditional restore clears it.
        assert!(repo.restore(dir.id).await.unwrap());
        let fetched = repo.get(user, dir.id).await.unwrap().unwrap();
        assert!(!fetched.is_deleted);
        assert_eq!(fetched.deleted_by, DeleteMarker::None);
        assert!(fetched.deleted_at.is_none());
    }

    #[tokio::test]
    async fn test_rename_and_move_require_live_rows() {
        let repo = repo().await;
        let user = Uuid::new_v4();
        let root = Directory::new(user, None, "root");
        let dir = Directory::new(user, Some(root.id), "dir");
        repo.insert(&root).await.unwrap();
        repo.insert(&dir).await.unwrap();
        assert!(repo.rename(user, dir.id, "renamed").await.unwrap());
        repo.trash_root(dir.id).await.unwrap();
        assert!(!repo.rename(user, dir.id, "nope").await.unwrap());
        assert!(!repo.set_parent(user, dir.id, root.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_hard() {
        let repo = repo().await;
        let user = Uuid::new_v4();
        let dir = Directory::new(user, None, "doomed");
        repo.insert(&dir).await.unwrap();
        assert!(repo.delete(dir.id).await.unwrap());
        assert!(repo.get(user, dir.id).await.unwrap().is_none());
        assert!(!repo.delete(dir.id).await.unwrap());
    }
}
