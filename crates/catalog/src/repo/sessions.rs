//! Repository for resumable upload sessions.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{SessionRow, SessionStatus, UploadSession};
use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;
use uuid::Uuid;

/// Repository for [`UploadSession`] rows and their received-chunk set.
///
/// Chunk recording is a single `INSERT OR IGNORE`; a zero-row result *is*
/// the duplicate-detection signal, so client retries are idempotent without
/// any read-then-write window.
#[derive(Debug, Clone)]
pub struct SessionRepo {
    pool: SqlitePool,
}
impl From<&Database> for SessionRepo {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl SessionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, session: &UploadSession) -> Result<()> {
        let row = SessionRow::from(session);
        sqlx::query(include_str!("../../queries/insert_session.sql"))
            .bind(row.id)
            .bind(row.user_id)
            .bind(row.parent_id)
            .bind(row.file_name)
            .bind(row.size)
            .bind(row.declared_mime)
            .bind(row.strategy)
            .bind(row.status)
            .bind(row.chunk_size)
            .bind(row.total_chunks)
            .bind(row.temp_dir)
            .bind(row.expires_at)
            .bind(row.created_at)
            .bind(row.updated_at)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Load a session by id. Ownership is the engine's check, not a query
    /// filter: a mismatch must surface as an authorization failure, not a
    /// not-found.
    pub async fn get(&self, id: Uuid) -> Result<Option<UploadSession>> {
        let row: Option<SessionRow> = sqlx::query_as(include_str!("../../queries/get_session.sql"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(UploadSession::try_from).transpose()
    }

    pub async fn set_status(&self, id: Uuid, status: SessionStatus) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/set_session_status.sql"))
            .bind(status.to_string())
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the temp area and flip the session into `uploading` in one
    /// statement (first chunk arrival).
    pub async fn mark_uploading(&self, id: Uuid, temp_dir: &str) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/mark_session_uploading.sql"))
            .bind(temp_dir)
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically add a chunk index to the received set.
    ///
    /// Returns `false` when the index was already recorded, in which case
    /// the caller reports "skipped" and discards the incoming bytes.
    pub async fn record_chunk(&self, id: Uuid, chunk_index: i64) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/record_chunk.sql"))
            .bind(id.to_string())
            .bind(chunk_index)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether a chunk index is already in the received set.
    pub async fn has_chunk(&self, id: Uuid, chunk_index: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(include_str!("../../queries/has_chunk.sql"))
            .bind(id.to_string())
            .bind(chunk_index)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(count > 0)
    }

    pub async fn received_count(&self, id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(include_str!("../../queries/count_chunks.sql"))
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(count)
    }

    pub async fn received_indices(&self, id: Uuid) -> Result<Vec<i64>> {
        let indices: Vec<i64> = sqlx::query_scalar(include_str!("../../queries/list_chunks.sql"))
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(indices)
    }

    /// Delete a session row; its chunk rows cascade.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(include_str!("../../queries/delete_session.sql"))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Sessions past their expiry, eligible for background reclamation.
    pub async fn list_expired(&self, now: UtcDateTime) -> Result<Vec<UploadSession>> {
        let rows: Vec<SessionRow> = sqlx::query_as(include_str!("../../queries/list_expired_sessions.sql"))
            .bind(now.unix_timestamp())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(UploadSession::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Strategy;
    use time::Duration;

    async fn repo() -> SessionRepo {
        let db = Database::connect_in_memory().await.unwrap();
        SessionRepo::from(&db)
    }

    fn session(total_chunks: i64, expires_in: Duration) -> UploadSession {
        UploadSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "archive.zip",
            total_chunks * 1024,
            None,
            Strategy::Chunked,
            1024,
            total_chunks,
            UtcDateTime::now() + expires_in,
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = repo().await;
        let s = session(3, Duration::hours(1));
        repo.insert(&s).await.unwrap();
        let fetched = repo.get(s.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, SessionStatus::Initiated);
        assert_eq!(fetched.total_chunks, 3);
    }

    #[tokio::test]
    async fn test_record_chunk_is_idempotent() {
        let repo = repo().await;
        let s = session(3, Duration::hours(1));
        repo.insert(&s).await.unwrap();
        assert!(repo.record_chunk(s.id, 0).await.unwrap());
        assert!(repo.record_chunk(s.id, 2).await.unwrap());
        // Retry of an already-recorded index reports a duplicate.
        assert!(!repo.record_chunk(s.id, 0).await.unwrap());
        assert_eq!(repo.received_count(s.id).await.unwrap(), 2);
        assert_eq!(repo.received_indices(s.id).await.unwrap(), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_delete_cascades_chunk_rows() {
        let repo = repo().await;
        let s = session(2, Duration::hours(1));
        repo.insert(&s).await.unwrap();
        repo.record_chunk(s.id, 0).await.unwrap();
        assert!(repo.delete(s.id).await.unwrap());
        assert!(repo.get(s.id).await.unwrap().is_none());
        assert_eq!(repo.received_count(s.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_expired() {
        let repo = repo().await;
        let stale = session(1, Duration::hours(-2));
        let fresh = session(1, Duration::hours(2));
        repo.insert(&stale).await.unwrap();
        repo.insert(&fresh).await.unwrap();
        let expired = repo.list_expired(UtcDateTime::now()).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, stale.id);
    }

    #[tokio::test]
    async fn test_status_transitions_persist() {
        let repo = repo().await;
        let s = session(1, Duration::hours(1));
        repo.insert(&s).await.unwrap();
        assert!(repo.set_status(s.id, SessionStatus::Failed).await.unwrap());
        assert_eq!(repo.get(s.id).await.unwrap().unwrap().status, SessionStatus::Failed);
        assert!(repo.mark_uploading(s.id, "/tmp/depot/sess").await.unwrap());
        let fetched = repo.get(s.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, SessionStatus::Uploading);
        assert_eq!(fetched.temp_dir.as_deref(), Some("/tmp/depot/sess"));
    }
}
