use crate::error::{Error, ErrorKind};
use crate::models::{DeleteMarker, parse_timestamp, parse_uuid};
use derive_more::Display;
use std::str::FromStr;
use time::UtcDateTime;
use uuid::Uuid;

/// How a file should be served to a browser.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq)]
pub enum Disposition {
    #[display("inline")]
    Inline,
    #[default]
    #[display("attachment")]
    Attachment,
}
impl FromStr for Disposition {
    type Err = Error;
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "inline" => Ok(Self::Inline),
            "attachment" => Ok(Self::Attachment),
            _ => exn::bail!(ErrorKind::InvalidData("disposition")),
        }
    }
}

/// A user-visible, nameable pointer from a directory position to a blob.
///
/// Many refs may point at the same blob (that's the dedup); deleting a ref
/// therefore decrements the blob, never directly deletes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Uuid,
    pub blob_id: Uuid,
    pub name: String,
    /// What the client claimed. Informational only; serving decisions use
    /// the blob's sniffed `detected_mime`.
    pub declared_mime: String,
    pub disposition: Disposition,
    pub inline_preview: bool,
    pub force_inline_preview: bool,
    pub is_deleted: bool,
    pub deleted_by: DeleteMarker,
    pub deleted_at: Option<UtcDateTime>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

impl FileRef {
    pub fn new(
        user_id: Uuid,
        parent_id: Uuid,
        blob_id: Uuid,
        name: impl Into<String>,
        declared_mime: impl Into<String>,
        disposition: Disposition,
    ) -> Self {
        let now = UtcDateTime::now();
        let inline = disposition == Disposition::Inline;
        Self {
            id: Uuid::new_v4(),
            user_id,
            parent_id,
            blob_id,
            name: name.into(),
            declared_mime: declared_mime.into(),
            disposition,
            inline_preview: inline,
            force_inline_preview: inline,
            is_deleted: false,
            deleted_by: DeleteMarker::None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FileRefRow {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) parent_id: String,
    pub(crate) blob_id: String,
    pub(crate) name: String,
    pub(crate) declared_mime: String,
    pub(crate) disposition: String,
    pub(crate) inline_preview: bool,
    pub(crate) force_inline_preview: bool,
    pub(crate) is_deleted: bool,
    pub(crate) deleted_by: String,
    pub(crate) deleted_at: Option<i64>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl From<&FileRef> for FileRefRow {
    fn from(file: &FileRef) -> Self {
        Self {
            id: file.id.to_string(),
            user_id: file.user_id.to_string(),
            parent_id: file.parent_id.to_string(),
            blob_id: file.blob_id.to_string(),
            name: file.name.clone(),
            declared_mime: file.declared_mime.clone(),
            disposition: file.disposition.to_string(),
            inline_preview: file.inline_preview,
            force_inline_preview: file.force_inline_preview,
            is_deleted: file.is_deleted,
            deleted_by: file.deleted_by.to_string(),
            deleted_at: file.deleted_at.map(|t| t.unix_timestamp()),
            created_at: file.created_at.unix_timestamp(),
            updated_at: file.updated_at.unix_timestamp(),
        }
    }
}
impl TryFrom<FileRefRow> for FileRef {
    type Error = Error;
    fn try_from(row: FileRefRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&row.id, "file id")?,
            user_id: parse_uuid(&row.user_id, "file user id")?,
            parent_id: parse_uuid(&row.parent_id, "file parent id")?,
            blob_id: parse_uuid(&row.blob_id, "file blob id")?,
            name: row.name,
            declared_mime: row.declared_mime,
            disposition: row.disposition.parse()?,
            inline_preview: row.inline_preview,
            force_inline_preview: row.force_inline_preview,
            is_deleted: row.is_deleted,
            deleted_by: row.deleted_by.parse()?,
            deleted_at: row.deleted_at.map(|t| parse_timestamp(t, "file deleted_at")).transpose()?,
            created_at: parse_timestamp(row.created_at, "file created_at")?,
            updated_at: parse_timestamp(row.updated_at, "file updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_disposition_sets_preview_flags() {
        let file = FileRef::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), "a.png", "image/png", Disposition::Inline);
        assert!(file.inline_preview);
        assert!(file.force_inline_preview);
    }

    #[test]
    fn test_attachment_disposition_clears_preview_flags() {
        let file = FileRef::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), "a.bin", "application/octet-stream", Disposition::Attachment);
        assert!(!file.inline_preview);
        assert!(!file.force_inline_preview);
    }

    #[test]
    fn test_row_round_trip() {
        let file = FileRef::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), "notes.txt", "text/plain", Disposition::Inline);
        let back = FileRef::try_from(FileRefRow::from(&file)).unwrap();
        assert_eq!(back.id, file.id);
        assert_eq!(back.blob_id, file.blob_id);
        assert_eq!(back.disposition, Disposition::Inline);
        assert_eq!(back.deleted_by, DeleteMarker::None);
    }
}
