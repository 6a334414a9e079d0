use crate::error::{Error, ErrorKind};
use crate::models::{parse_timestamp, parse_uuid};
use derive_more::Display;
use std::str::FromStr;
use time::UtcDateTime;
use uuid::Uuid;

/// How bytes reach the engine.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Small payload, single chunk.
    #[display("direct")]
    Direct,
    /// Payload split into fixed-size chunks, reassembled on completion.
    #[display("chunked")]
    Chunked,
    /// Payload pulled from a third-party source by the engine itself.
    #[display("import")]
    Import,
}
impl FromStr for Strategy {
    type Err = Error;
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "direct" => Ok(Self::Direct),
            "chunked" => Ok(Self::Chunked),
            "import" => Ok(Self::Import),
            _ => exn::bail!(ErrorKind::InvalidData("upload strategy")),
        }
    }
}

/// Upload session lifecycle.
///
/// `initiated → uploading → {uploaded|imported} → completed`, with `failed`
/// and `cancelled` reachable from any non-terminal state.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    #[display("initiated")]
    Initiated,
    #[display("uploading")]
    Uploading,
    #[display("uploaded")]
    Uploaded,
    #[display("imported")]
    Imported,
    #[display("completed")]
    Completed,
    #[display("failed")]
    Failed,
    #[display("cancelled")]
    Cancelled,
}
impl SessionStatus {
    /// Terminal states accept no further chunk, completion or cancellation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}
impl FromStr for SessionStatus {
    type Err = Error;
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "initiated" => Ok(Self::Initiated),
            "uploading" => Ok(Self::Uploading),
            "uploaded" => Ok(Self::Uploaded),
            "imported" => Ok(Self::Imported),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => exn::bail!(ErrorKind::InvalidData("session status")),
        }
    }
}

/// Resumable-upload bookkeeping.
///
/// The received-chunk set lives in its own table (`upload_chunks`), not on
/// this struct: recording a chunk must be a single atomic insert, and the
/// set is only ever counted or enumerated, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Uuid,
    pub file_name: String,
    pub size: i64,
    pub declared_mime: Option<String>,
    pub strategy: Strategy,
    pub status: SessionStatus,
    pub chunk_size: i64,
    pub total_chunks: i64,
    /// Session-scoped temp area holding `chunk-<n>` files until completion.
    pub temp_dir: Option<String>,
    /// Sessions past this instant are eligible for background reclamation.
    pub expires_at: UtcDateTime,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

impl UploadSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        parent_id: Uuid,
        file_name: impl Into<String>,
        size: i64,
        declared_mime: Option<String>,
        strategy: Strategy,
        chunk_size: i64,
        total_chunks: i64,
        expires_at: UtcDateTime,
    ) -> Self {
        let now = UtcDateTime::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            parent_id,
            file_name: file_name.into(),
            size,
            declared_mime,
            strategy,
            status: SessionStatus::Initiated,
            chunk_size,
            total_chunks,
            temp_dir: None,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SessionRow {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) parent_id: String,
    pub(crate) file_name: String,
    pub(crate) size: i64,
    pub(crate) declared_mime: Option<String>,
    pub(crate) strategy: String,
    pub(crate) status: String,
    pub(crate) chunk_size: i64,
    pub(crate) total_chunks: i64,
    pub(crate) temp_dir: Option<String>,
    pub(crate) expires_at: i64,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl From<&UploadSession> for SessionRow {
    fn from(session: &UploadSession) -> Self {
        Self {
            id: session.id.to_string(),
            user_id: session.user_id.to_string(),
            parent_id: session.parent_id.to_string(),
            file_name: session.file_name.clone(),
            size: session.size,
            declared_mime: session.declared_mime.clone(),
            strategy: session.strategy.to_string(),
            status: session.status.to_string(),
            chunk_size: session.chunk_size,
            total_chunks: session.total_chunks,
            temp_dir: session.temp_dir.clone(),
            expires_at: session.expires_at.unix_timestamp(),
            created_at: session.created_at.unix_timestamp(),
            updated_at: session.updated_at.unix_timestamp(),
        }
    }
}
impl TryFrom<SessionRow> for UploadSession {
    type Error = Error;
    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&row.id, "session id")?,
            user_id: parse_uuid(&row.user_id, "session user id")?,
            parent_id: parse_uuid(&row.parent_id, "session parent id")?,
            file_name: row.file_name,
            size: row.size,
            declared_mime: row.declared_mime,
            strategy: row.strategy.parse()?,
            status: row.status.parse()?,
            chunk_size: row.chunk_size,
            total_chunks: row.total_chunks,
            temp_dir: row.temp_dir,
            expires_at: parse_timestamp(row.expires_at, "session expires_at")?,
            created_at: parse_timestamp(row.created_at, "session created_at")?,
            updated_at: parse_timestamp(row.updated_at, "session updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SessionStatus::Initiated, false)]
    #[case(SessionStatus::Uploading, false)]
    #[case(SessionStatus::Uploaded, false)]
    #[case(SessionStatus::Imported, false)]
    #[case(SessionStatus::Completed, true)]
    #[case(SessionStatus::Failed, true)]
    #[case(SessionStatus::Cancelled, true)]
    fn test_terminal_states(#[case] status: SessionStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[test]
    fn test_row_round_trip() {
        let session = UploadSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "movie.mp4",
            12 * 1024 * 1024,
            Some("video/mp4".to_string()),
            Strategy::Chunked,
            5 * 1024 * 1024,
            3,
            UtcDateTime::now(),
        );
        let back = UploadSession::try_from(SessionRow::from(&session)).unwrap();
        assert_eq!(back.id, session.id);
        assert_eq!(back.strategy, Strategy::Chunked);
        assert_eq!(back.status, SessionStatus::Initiated);
        assert_eq!(back.total_chunks, 3);
    }
}
