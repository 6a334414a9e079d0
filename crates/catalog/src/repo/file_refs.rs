//! Repository for user-visible file references.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{FileRef, FileRefRow};
use crate::repo::ChildFilter;
use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;
use uuid::Uuid;

/// Repository for [`FileRef`] rows.
///
/// Deleting a ref never touches its blob here; reference accounting lives
/// in [`BlobRepo`](crate::BlobRepo) and is always the caller's next step.
#[derive(Debug, Clone)]
pub struct FileRefRepo {
    pool: SqlitePool,
}
impl From<&Database> for FileRefRepo {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl FileRefRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, file: &FileRef) -> Result<()> {
        let row = FileRefRow::from(file);
        sqlx::query(include_str!("../../queries/insert_file_ref.sql"))
            .bind(row.id)
            .bind(row.user_id)
            .bind(row.parent_id)
            .bind(row.blob_id)
            .bind(row.name)
            .bind(row.declared_mime)
            .bind(row.disposition)
            .bind(row.inline_preview)
            .bind(row.force_inline_preview)
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

    /// Get a file reference regardless of deletion state.
    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<FileRef>> {
        let row: Option<FileRefRow> = sqlx::query_as(include_str!("../../queries/get_file_ref.sql"))
            .bind(user_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRef::try_from).transpose()
    }

    /// Get a file reference only if it is not soft-deleted.
    pub async fn get_live(&self, user_id: Uuid, id: Uuid) -> Result<Option<FileRef>> {
        let row: Option<FileRefRow> = sqlx::query_as(include_str!("../../queries/get_live_file_ref.sql"))
            .bind(user_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRef::try_from).transpose()
    }

    /// List the file references directly under a directory, sliced by `filter`.
    pub async fn children(&self, user_id: Uuid, parent_id: Uuid, filter: ChildFilter) -> Result<Vec<FileRef>> {
        let query = match filter {
            ChildFilter::Live => include_str!("../../queries/list_child_files_live.sql"),
            ChildFilter::TrashedByProcess => include_str!("../../queries/list_child_files_trashed.sql"),
            ChildFilter::Any => include_str!("../../queries/list_child_files_any.sql"),
        };
        let rows: Vec<FileRefRow> = sqlx::query_as(query)
            .bind(user_id.to_string())
            .bind(parent_id.to_string())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(FileRef::try_from).collect()
    }

    /// Mark an explicitly targeted file trashed (`deleted_by = 'user'`).
    pub async fn trash_root(&self, id: Uuid) -> Result<bool> {
        let now = UtcDateTime::now().unix_timestamp();
        let result = sqlx::query(include_str!("../../queries/trash_file_ref_root.sql"))
            .bind(now)
            .bind(now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a descendant file trashed (`deleted_by = 'process'`).
    pub async fn trash_subtree(&self, id: Uuid) -> Result<bool> {
        let now = UtcDateTime::now().unix_timestamp();
        let result = sqlx::query(include_str!("../../queries/trash_file_ref_subtree.sql"))
            .bind(now)
            .bind(now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Restore a file unconditionally (marker back to `none`).
    pub async fn restore(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/restore_file_ref.sql"))
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Restore a file only if it was dragged along by a subtree trash.
    pub async fn restore_if_process(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/restore_file_ref_if_process.sql"))
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Hard-delete a file reference row.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/delete_file_ref.sql"))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// How many references (live or trashed) point at a blob.
    pub async fn count_for_blob(&self, blob_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(include_str!("../../queries/count_file_refs_for_blob.sql"))
            .bind(blob_id.to_string())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeleteMarker, Disposition};

    async fn repo() -> FileRefRepo {
        let db = Database::connect_in_memory().await.unwrap();
        FileRefRepo::from(&db)
    }

    fn file(user: Uuid, parent: Uuid, blob: Uuid, name: &str) -> FileRef {
        FileRef::new(user, parent, blob, name, "text/plain", Disposition::Inline)
    }

    #[tokio::test]
    async fn test_insert_get_and_owner_scoping() {
        let repo = repo().await;
        let (user, parent, blob) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let f = file(user, parent, blob, "notes.txt");
        repo.insert(&f).await.unwrap();
        assert_eq!(repo.get(user, f.id).await.unwrap().unwrap().name, "notes.txt");
        // A different user resolves nothing, not an authorization error.
        assert!(repo.get(Uuid::new_v4(), f.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_children_filters() {
        let repo = repo().await;
        let (user, parent, blob) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let live = file(user, parent, blob, "live.txt");
        let swept = file(user, parent, blob, "swept.txt");
        repo.insert(&live).await.unwrap();
        repo.insert(&swept).await.unwrap();
        repo.trash_subtree(swept.id).await.unwrap();

        assert_eq!(repo.children(user, parent, ChildFilter::Live).await.unwrap().len(), 1);
        let trashed = repo.children(user, parent, ChildFilter::TrashedByProcess).await.unwrap();
        assert_eq!(trashed.len(), 1);
        assert_eq!(trashed[0].deleted_by, DeleteMarker::Process);
        assert_eq!(repo.children(user, parent, ChildFilter::Any).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_restore_if_process_spares_user_trashed_files() {
        let repo = repo().await;
        let (user, parent, blob) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let f = file(user, parent, blob, "kept-in-trash.txt");
        repo.insert(&f).await.unwrap();
        repo.trash_root(f.id).await.unwrap();
        assert!(!repo.restore_if_process(f.id).await.unwrap());
        assert!(repo.get(user, f.id).await.unwrap().unwrap().is_deleted);
    }

    #[tokio::test]
    async fn test_count_for_blob() {
        let repo = repo().await;
        let (user, parent, blob) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        repo.insert(&file(user, parent, blob, "one.txt")).await.unwrap();
        repo.insert(&file(user, parent, blob, "two.txt")).await.unwrap();
        assert_eq!(repo.count_for_blob(blob).await.unwrap(), 2);
        assert_eq!(repo.count_for_blob(Uuid::new_v4()).await.unwrap(), 0);
    }
}
