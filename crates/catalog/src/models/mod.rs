mod blob;
mod directory;
mod file_ref;
mod marker;
mod session;

pub use self::blob::{Blob, StorageProvider};
pub use self::directory::Directory;
pub use self::file_ref::{Disposition, FileRef};
pub use self::marker::DeleteMarker;
pub use self::session::{SessionStatus, Strategy, UploadSession};

pub(crate) use self::blob::BlobRow;
pub(crate) use self::directory::DirectoryRow;
pub(crate) use self::file_ref::FileRefRow;
pub(crate) use self::session::SessionRow;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::UtcDateTime;
use uuid::Uuid;

pub(crate) fn parse_uuid(value: &str, field: &'static str) -> Result<Uuid> {
    Uuid::parse_str(value).or_raise(|| ErrorKind::InvalidData(field))
}

pub(crate) fn parse_timestamp(value: i64, field: &'static str) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp(value).or_raise(|| ErrorKind::InvalidData(field))
}
