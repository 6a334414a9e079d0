//! Repository for content-addressed blob rows.
//!
//! This is the one place in the system where true mutual exclusion is
//! required: the reference count moves only through single atomic
//! statements (a conditional upsert on ingest, a conditional decrement on
//! release), so concurrent finalize/delete of the same digest can never
//! lose an update.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{Blob, BlobRow};
use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;
use uuid::Uuid;

/// Outcome of releasing one reference to a blob.
#[derive(Debug)]
pub enum Release {
    /// Count hit zero: the row is gone and the payload should be reclaimed.
    Reclaimed(Blob),
    /// Other references remain; nothing to clean up.
    Retained(Blob),
    /// No such blob row. The reference was already dangling.
    Missing,
}

/// Repository for [`Blob`] rows.
#[derive(Debug, Clone)]
pub struct BlobRepo {
    pool: SqlitePool,
}
impl From<&Database> for BlobRepo {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl BlobRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_digest(&self, digest: &str) -> Result<Option<Blob>> {
        let row: Option<BlobRow> = sqlx::query_as(include_str!("../../queries/find_blob_by_digest.sql"))
            .bind(digest)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Blob::try_from).transpose()
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Blob>> {
        let row: Option<BlobRow> = sqlx::query_as(include_str!("../../queries/get_blob.sql"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Blob::try_from).transpose()
    }

    /// Ingest a candidate blob.
    ///
    /// One atomic upsert: if no row exists for the digest the candidate is
    /// inserted with a reference count of one; otherwise the existing row's
    /// count is incremented. Either way the *surviving* row is returned;
    /// compare its id against the candidate's to learn whether the payload
    /// still needs to be stored or is a duplicate to discard.
    pub async fn ingest(&self, candidate: &Blob) -> Result<Blob> {
        let row = BlobRow::from(candidate);
        let stored: BlobRow = sqlx::query_as(include_str!("../../queries/ingest_blob.sql"))
            .bind(row.id)
            .bind(row.uploader_id)
            .bind(row.digest)
            .bind(row.hash_algo)
            .bind(row.detected_mime)
            .bind(row.size)
            .bind(row.provider)
            .bind(row.object_key)
            .bind(row.ref_count)
            .bind(row.created_at)
            .bind(row.updated_at)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        stored.try_into()
    }

    /// Release one reference.
    ///
    /// The decrement and the zero-count row deletion run in one transaction;
    /// the decrement itself is conditional (`ref_count > 0`) so concurrent
    /// releases cannot drive the count negative. Physical payload cleanup is
    /// the caller's job, and only on [`Release::Reclaimed`].
    pub async fn release(&self, id: Uuid) -> Result<Release> {
        let now = UtcDateTime::now().unix_timestamp();
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let row: Option<BlobRow> = sqlx::query_as(include_str!("../../queries/decrement_blob.sql"))
            .bind(now)
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some(row) = row else {
            // Nothing matched: the row is gone, or was already at zero.
            return Ok(Release::Missing);
        };
        let reclaimed = row.ref_count <= 0;
        if reclaimed {
            sqlx::query(include_str!("../../queries/delete_blob_if_unreferenced.sql"))
                .bind(&row.id)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        let blob = Blob::try_from(row)?;
        Ok(match reclaimed {
            true => Release::Reclaimed(blob),
            false => Release::Retained(blob),
        })
    }
}
