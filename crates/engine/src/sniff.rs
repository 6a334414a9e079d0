//! Content-based MIME detection.
//!
//! A client-declared MIME type is spoofable, so serving decisions use the
//! type sniffed from the payload's leading bytes. Detection falls back to
//! the file extension, then the declared value, then the octet-stream
//! catch-all.

use depot_catalog::Disposition;
use std::collections::HashSet;
use std::sync::LazyLock;

/// How many leading bytes [`detect`] needs to see. Longest offset checked
/// is the `ftyp` box probe at byte 4..12.
pub const SNIFF_LEN: usize = 512;

pub const OCTET_STREAM: &str = "application/octet-stream";

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];
const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];
const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];
const ICO_MAGIC: [u8; 4] = [0x00, 0x00, 0x01, 0x00];

/// MIME types a browser can render directly; everything else is served as
/// an attachment.
static INLINE_MIME: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        // Images
        "image/png",
        "image/jpeg",
        "image/webp",
        "image/avif",
        "image/svg+xml",
        "image/gif",
        "image/x-icon",
        // Audio
        "audio/mpeg",
        "audio/ogg",
        "audio/wav",
        "audio/webm",
        "audio/aac",
        // Video (browser-playable only)
        "video/mp4",
        "video/webm",
        "video/ogg",
        // Documents
        "application/pdf",
        // Plain text ONLY
        "text/plain",
        "text/csv",
        "text/tab-separated-values",
    ])
});

/// Detect a MIME type from magic bytes alone.
///
/// Returns `None` if no signature matches or the input is too short to
/// decide.
pub fn from_magic_bytes(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&PNG_MAGIC) {
        return Some("image/png");
    }
    if bytes.starts_with(&JPEG_MAGIC) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    // RIFF containers: the subtype lives at byte 8.
    if bytes.starts_with(b"RIFF") && bytes.len() >= 12 {
        if &bytes[8..12] == b"WEBP" {
            return Some("image/webp");
        }
        if &bytes[8..12] == b"WAVE" {
            return Some("audio/wav");
        }
    }
    if bytes.starts_with(b"%PDF-") {
        return Some("application/pdf");
    }
    if bytes.starts_with(&ZIP_MAGIC) {
        return Some("application/zip");
    }
    if bytes.starts_with(&GZIP_MAGIC) {
        return Some("application/gzip");
    }
    if bytes.starts_with(b"ID3") || bytes.starts_with(&[0xFF, 0xFB]) || bytes.starts_with(&[0xFF, 0xF3]) {
        return Some("audio/mpeg");
    }
    if bytes.starts_with(b"OggS") {
        return Some("audio/ogg");
    }
    // ISO base media: a `ftyp` box right after the 4-byte size.
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return Some("video/mp4");
    }
    if bytes.starts_with(&EBML_MAGIC) {
        return Some("video/webm");
    }
    if bytes.starts_with(&ICO_MAGIC) {
        return Some("image/x-icon");
    }
    if bytes.starts_with(b"<svg") || (bytes.starts_with(b"<?xml") && find_window(bytes, b"<svg")) {
        return Some("image/svg+xml");
    }
    None
}

fn find_window(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Detect the MIME type for a payload.
///
/// Magic bytes win; otherwise the file extension; otherwise whatever the
/// client declared; otherwise [`OCTET_STREAM`].
pub fn detect(bytes: &[u8], file_name: &str, declared: Option<&str>) -> String {
    if let Some(mime) = from_magic_bytes(bytes) {
        return mime.to_string();
    }
    if let Some(mime) = mime_guess::from_path(file_name).first_raw() {
        return mime.to_string();
    }
    match declared {
        Some(declared) if !declared.trim().is_empty() => declared.to_string(),
        _ => OCTET_STREAM.to_string(),
    }
}

/// Whether a MIME type is on the inline allow-list.
pub fn is_inline(mime: &str) -> bool {
    INLINE_MIME.contains(mime)
}

/// Serving disposition for a detected MIME type.
pub fn disposition_for(mime: &str) -> Disposition {
    match is_inline(mime) {
        true => Disposition::Inline,
        false => Disposition::Attachment,
    }
}
