use crate::error::{Error, ErrorKind};
use crate::models::{parse_timestamp, parse_uuid};
use derive_more::Display;
use std::str::FromStr;
use time::UtcDateTime;
use uuid::Uuid;

/// Storage provider tag.
///
/// Only `local` is wired up today; the tag (together with the opaque object
/// key) is what keeps a provider migration possible without rewriting
/// digests.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageProvider {
    #[default]
    #[display("local")]
    Local,
    #[display("s3")]
    S3,
    #[display("r2")]
    R2,
    #[display("gcs")]
    Gcs,
}
impl FromStr for StorageProvider {
    type Err = Error;
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            "r2" => Ok(Self::R2),
            "gcs" => Ok(Self::Gcs),
            _ => exn::bail!(ErrorKind::InvalidData("storage provider")),
        }
    }
}

/// A unique physical payload, identified by content digest.
///
/// At most one blob row exists per distinct digest system-wide; the
/// reference count tracks how many live [`FileRef`](crate::FileRef)s point
/// at it. A count of zero means the payload is garbage and must be
/// reclaimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub id: Uuid,
    /// The user whose upload first materialized this payload.
    pub uploader_id: Uuid,
    pub digest: String,
    pub hash_algo: String,
    pub detected_mime: String,
    pub size: i64,
    pub provider: StorageProvider,
    /// Opaque object key. Deliberately decoupled from the digest.
    pub object_key: String,
    pub ref_count: i64,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

impl Blob {
    /// Build a candidate blob with a reference count of one. Whether this
    /// exact row survives depends on the atomic upsert in
    /// [`BlobRepo::ingest`](crate::BlobRepo::ingest).
    pub fn new(
        uploader_id: Uuid,
        digest: impl Into<String>,
        detected_mime: impl Into<String>,
        size: i64,
        provider: StorageProvider,
        object_key: impl Into<String>,
    ) -> Self {
        let now = UtcDateTime::now();
        Self {
            id: Uuid::new_v4(),
            uploader_id,
            digest: digest.into(),
            hash_algo: "blake3".to_string(),
            detected_mime: detected_mime.into(),
            size,
            provider,
            object_key: object_key.into(),
            ref_count: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BlobRow {
    pub(crate) id: String,
    pub(crate) uploader_id: String,
    pub(crate) digest: String,
    pub(crate) hash_algo: String,
    pub(crate) detected_mime: String,
    pub(crate) size: i64,
    pub(crate) provider: String,
    pub(crate) object_key: String,
    pub(crate) ref_count: i64,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl From<&Blob> for BlobRow {
    fn from(blob: &Blob) -> Self {
        Self {
            id: blob.id.to_string(),
            uploader_id: blob.uploader_id.to_string(),
            digest: blob.digest.clone(),
            hash_algo: blob.hash_algo.clone(),
            detected_mime: blob.detected_mime.clone(),
            size: blob.size,
            provider: blob.provider.to_string(),
            object_key: blob.object_key.clone(),
            ref_count: blob.ref_count,
            created_at: blob.created_at.unix_timestamp(),
            updated_at: blob.updated_at.unix_timestamp(),
        }
    }
}
impl TryFrom<BlobRow> for Blob {
    type Error = Error;
    fn try_from(row: BlobRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&row.id, "blob id")?,
            uploader_id: parse_uuid(&row.uploader_id, "blob uploader id")?,
            digest: row.digest,
            hash_algo: row.hash_algo,
            detected_mime: row.detected_mime,
            size: row.size,
            provider: row.provider.parse()?,
            object_key: row.object_key,
            ref_count: row.ref_count,
            created_at: parse_timestamp(row.created_at, "blob created_at")?,
            updated_at: parse_timestamp(row.updated_at, "blob updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("local", StorageProvider::Local)]
    #[case("s3", StorageProvider::S3)]
    #[case("r2", StorageProvider::R2)]
    #[case("gcs", StorageProvider::Gcs)]
    fn test_provider_round_trip(#[case] text: &str, #[case] provider: StorageProvider) {
        assert_eq!(text.parse::<StorageProvider>().unwrap(), provider);
        assert_eq!(provider.to_string(), text);
    }

    #[test]
    fn test_new_blob_starts_at_one_reference() {
        let blob = Blob::new(Uuid::new_v4(), "digest", "image/png", 1024, StorageProvider::Local, "ab/cdef");
        assert_eq!(blob.ref_count, 1);
        assert_eq!(blob.hash_algo, "blake3");
    }

    #[test]
    fn test_row_round_trip() {
        let blob = Blob::new(Uuid::new_v4(), "digest", "application/pdf", 2048, StorageProvider::Local, "ab/cdef");
        let row = BlobRow::from(&blob);
        let back = Blob::try_from(row).unwrap();
        // Unix timestamps strip sub-second precision.
        assert_eq!(back.id, blob.id);
        assert_eq!(back.digest, blob.digest);
        assert_eq!(back.provider, blob.provider);
        assert_eq!(back.ref_count, 1);
    }
}
