//! Image/video sniffing for uploaded media.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::MediaResult;

/// Coarse kind of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Unknown,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];

/// Leading bytes read from a file whose extension says nothing.
pub const SNIFF_LEN: u64 = 64 * 1024;

/// Classify media by file extension, falling back to content.
///
/// `bytes` may be just the start of the file. Content with a readable image
/// signature is an image; any other non-empty content is assumed to be video.
pub fn detect_media_kind(file_name: impl AsRef<Path>, bytes: &[u8]) -> MediaKind {
    if let Some(kind) = kind_from_extension(file_name.as_ref()) {
        return kind;
    }

    if bytes.is_empty() {
        MediaKind::Unknown
    } else if image::guess_format(bytes).is_ok_and(|f| f.reading_enabled()) {
        MediaKind::Image
    } else {
        MediaKind::Video
    }
}

/// Classify a file on disk, reading at most [`SNIFF_LEN`] bytes.
///
/// A known extension is trusted without opening the file.
pub fn detect_media_file(path: impl AsRef<Path>) -> MediaResult<MediaKind> {
    let path = path.as_ref();
    if let Some(kind) = kind_from_extension(path) {
        return Ok(kind);
    }

    let mut head = Vec::new();
    File::open(path)?.take(SNIFF_LEN).read_to_end(&mut head)?;
    Ok(detect_media_kind(path, &head))
}

fn kind_from_extension(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{encode_frame, TransportFormat};
    use image::RgbImage;

    #[test]
    fn test_by_extension() {
        assert_eq!(detect_media_kind("photo.JPG", &[]), MediaKind::Image);
        assert_eq!(detect_media_kind("clip.mov", &[]), MediaKind::Video);
    }

    #[test]
    fn test_by_content() {
        let png = encode_frame(&RgbImage::new(4, 4), TransportFormat::Png).unwrap();
        assert_eq!(detect_media_kind("upload.bin", &png), MediaKind::Image);
        assert_eq!(detect_media_kind("upload.bin", &png[..16]), MediaKind::Image);
        assert_eq!(detect_media_kind("upload.bin", b"\x00\x00\x00\x18ftypmp42"), MediaKind::Video);
        assert_eq!(detect_media_kind("upload", &[]), MediaKind::Unknown);
    }

    #[test]
    fn test_file_known_extension_is_not_opened() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.mp4");
        assert_eq!(detect_media_file(&missing).unwrap(), MediaKind::Video);
        assert!(detect_media_file(dir.path().join("missing.bin")).is_err());
    }

    #[test]
    fn test_file_reads_only_a_prefix() {
        let dir = tempfile::tempdir().unwrap();

        let mut png = encode_frame(&RgbImage::new(4, 4), TransportFormat::Png).unwrap();
        // Trailing bytes past the sniff window are never looked at
        png.resize(SNIFF_LEN as usize * 4, 0);
        let upload = dir.path().join("upload");
        std::fs::write(&upload, &png).unwrap();
        assert_eq!(detect_media_file(&upload).unwrap(), MediaKind::Image);

        let video = dir.path().join("capture");
        std::fs::write(&video, b"\x00\x00\x00\x18ftypmp42isom").unwrap();
        assert_eq!(detect_media_file(&video).unwrap(), MediaKind::Video);

        let empty = dir.path().join("empty");
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(detect_media_file(&empty).unwrap(), MediaKind::Unknown);
    }
}
