use crate::error::Error;
use crate::models::{DeleteMarker, parse_timestamp, parse_uuid};
use time::UtcDateTime;
use uuid::Uuid;

/// Node in a per-user directory tree.
///
/// Every non-root directory has exactly one parent that either exists and
/// belongs to the same user, or is reconstructable by the engine's
/// ancestor-repair path. Roots have no parent and are never trashed,
/// restored or purged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    pub id: Uuid,
    pub user_id: Uuid,
    /// `None` only for the per-user root.
    pub parent_id: Option<Uuid>,
    pub name: String,
    /// Cumulative subtree size in bytes. Informational, not authoritative.
    pub size: i64,
    pub is_deleted: bool,
    pub deleted_by: DeleteMarker,
    pub deleted_at: Option<UtcDateTime>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

impl Directory {
    /// Create a fresh, live directory under the given parent.
    pub fn new(user_id: Uuid, parent_id: Option<Uuid>, name: impl Into<String>) -> Self {
        let now = UtcDateTime::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            parent_id,
            name: name.into(),
            size: 0,
            is_deleted: false,
            deleted_by: DeleteMarker::None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this is a per-user root.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DirectoryRow {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) parent_id: Option<String>,
    pub(crate) name: String,
    pub(crate) size: i64,
    pub(crate) is_deleted: bool,
    pub(crate) deleted_by: String,
    pub(crate) deleted_at: Option<i64>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl From<&Directory> for DirectoryRow {
    fn from(dir: &Directory) -> Self {
        Self {
            id: dir.id.to_string(),
            user_id: dir.user_id.to_string(),
            parent_id: dir.parent_id.map(|id| id.to_string()),
            name: dir.name.clone(),
            size: dir.size,
            is_deleted: dir.is_deleted,
            deleted_by: dir.deleted_by.to_string(),
            deleted_at: dir.deleted_at.map(|t| t.unix_timestamp()),
            created_at: dir.created_at.unix_timestamp(),
            updated_at: dir.updated_at.unix_timestamp(),
        }
    }
}
impl TryFrom<DirectoryRow> for Directory {
    type Error = Error;
    fn try_from(row: DirectoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&row.id, "directory id")?,
            user_id: parse_uuid(&row.user_id, "directory user id")?,
            parent_id: row.parent_id.as_deref().map(|id| parse_uuid(id, "directory parent id")).transpose()?,
            name: row.name,
            size: row.size,
            is_deleted: row.is_deleted,
            deleted_by: row.deleted_by.parse()?,
            deleted_at: row.deleted_at.map(|t| parse_timestamp(t, "directory deleted_at")).transpose()?,
            created_at: parse_timestamp(row.created_at, "directory created_at")?,
            updated_at: parse_timestamp(row.updated_at, "directory updated_at")?,
        })
    }
}
