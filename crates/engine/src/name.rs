//! Display-name validation and archive-entry sanitisation.

use crate::error::{ErrorKind, Result};

/// Characters that are unsafe in directory names across the filesystems the
/// export archive may be unpacked on.
const FORBIDDEN: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// What an unnamed directory ends up being called.
pub const DEFAULT_DIRECTORY_NAME: &str = "Untitled Folder";

/// Validate a directory display name: trimmed, 1–255 characters, none of
/// the filesystem-unsafe characters, no control characters.
pub fn validate_directory_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 255 {
        exn::bail!(ErrorKind::InvalidArgument("directory name must be 1-255 characters"));
    }
    if name.chars().any(|c| FORBIDDEN.contains(&c) || c.is_control()) {
        exn::bail!(ErrorKind::InvalidArgument("directory name contains forbidden characters"));
    }
    Ok(name.to_string())
}

/// As [`validate_directory_name`], but an absent or empty name falls back
/// to [`DEFAULT_DIRECTORY_NAME`].
pub fn directory_name_or_default(name: Option<&str>) -> Result<String> {
    match name.map(str::trim) {
        None | Some("") => Ok(DEFAULT_DIRECTORY_NAME.to_string()),
        Some(name) => validate_directory_name(name),
    }
}

/// Validate a file display name. File names are more permissive than
/// directory names (clients upload what they upload); only the length is
/// enforced, plus control characters. Separators are dealt with at export
/// time by [`sanitize_entry`].
pub fn validate_file_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 255 {
        exn::bail!(ErrorKind::InvalidArgument("file name must be 1-255 characters"));
    }
    if name.chars().any(char::is_control) {
        exn::bail!(ErrorKind::InvalidArgument("file name contains control characters"));
    }
    Ok(name.to_string())
}

/// Sanitise a display name for use as an archive entry segment: no path
/// separators, no `..` traversal, trimmed.
pub fn sanitize_entry(name: &str) -> String {
    let mut sanitized = name.replace(['/', '\\'], "_");
    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", "_");
    }
    sanitized.trim().to_string()
}
