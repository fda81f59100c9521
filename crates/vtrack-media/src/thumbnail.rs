//! Thumbnail generation.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Width of generated thumbnails (height keeps aspect ratio).
pub const THUMBNAIL_SCALE_WIDTH: u32 = 480;

/// Write the first frame of a video as an image (format from the extension).
pub async fn extract_thumbnail(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let video_path = video_path.as_ref();
    let output_path = output_path.as_ref();

    if !video_path.exists() {
        return Err(MediaError::FileNotFound(video_path.to_path_buf()));
    }

    FfmpegRunner::new()
        .with_timeout(60)
        .run(&thumbnail_command(video_path, output_path))
        .await
}

fn thumbnail_command(video_path: &Path, output_path: &Path) -> FfmpegCommand {
    FfmpegCommand::new(video_path, output_path)
        .single_frame()
        .video_filter(format!("scale={}:-2", THUMBNAIL_SCALE_WIDTH))
        .log_level("error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_command() {
        let args = thumbnail_command(Path::new("in.mp4"), Path::new("thumb.jpg")).build_args();
        assert!(args.windows(2).any(|w| w == ["-vframes", "1"]));
        assert!(args.windows(2).any(|w| w == ["-vf", "scale=480:-2"]));
        // First frame: no seek
        assert!(!args.contains(&"-ss".to_string()));
    }

    #[tokio::test]
    async fn test_missing_video() {
        let result = extract_thumbnail("/no/such/video.mp4", "/tmp/thumb.jpg").await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
