//! Best-effort preview derivation from the annotated video.
//!
//! Two secondary artifacts are produced with FFmpeg: a looping GIF and a
//! VP9/Opus WebM. Either one may be missing afterwards; failures are logged
//! and never returned to the caller.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};

/// Settings for the derived previews.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewConfig {
    /// Frame rate of the looping preview
    pub loop_fps: u32,
    /// Width of the looping preview (height keeps aspect ratio)
    pub loop_width: u32,
    pub streaming_video_codec: String,
    pub streaming_video_bitrate: String,
    pub streaming_audio_codec: String,
    /// Per-invocation timeout
    pub timeout_secs: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            loop_fps: 10,
            loop_width: 640,
            streaming_video_codec: "libvpx-vp9".to_string(),
            streaming_video_bitrate: "1M".to_string(),
            streaming_audio_codec: "libopus".to_string(),
            timeout_secs: 600,
        }
    }
}

/// Paths of the previews that were produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedPreviews {
    pub loop_preview: Option<PathBuf>,
    pub streaming_preview: Option<PathBuf>,
}

/// Derives preview formats from a primary video.
#[derive(Debug, Clone, Default)]
pub struct PreviewFinalizer {
    config: PreviewConfig,
}

impl PreviewFinalizer {
    pub fn new(config: PreviewConfig) -> Self {
        Self { config }
    }

    /// Derive both previews next to `primary` (same stem, `.gif` / `.webm`).
    pub async fn derive(&self, primary: impl AsRef<Path>) -> DerivedPreviews {
        let primary = primary.as_ref();
        let loop_path = primary.with_extension("gif");
        let streaming_path = primary.with_extension("webm");

        DerivedPreviews {
            loop_preview: self
                .run_best_effort("loop", &self.loop_command(primary, &loop_path))
                .await,
            streaming_preview: self
                .run_best_effort("streaming", &self.streaming_command(primary, &streaming_path))
                .await,
        }
    }

    /// Fixed-rate, fixed-width, endlessly looping GIF.
    pub fn loop_command(&self, input: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(input, output)
            .video_filter(format!(
                "fps={},scale={}:-1:flags=lanczos",
                self.config.loop_fps, self.config.loop_width
            ))
            .loop_count(0)
    }

    /// Compressed streaming WebM; an absent audio track is fine.
    pub fn streaming_command(&self, input: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(input, output)
            .video_codec(&self.config.streaming_video_codec)
            .video_bitrate(&self.config.streaming_video_bitrate)
            .audio_codec(&self.config.streaming_audio_codec)
    }

    async fn run_best_effort(&self, kind: &str, cmd: &FfmpegCommand) -> Option<PathBuf> {
        let runner = FfmpegRunner::new().with_timeout(self.config.timeout_secs);
        match runner.run(cmd).await {
            Ok(()) => {
                info!(preview = kind, output = %cmd.output_path().display(), "Preview derived");
                Some(cmd.output_path().to_path_buf())
            }
            Err(e) => {
                warn!(preview = kind, error = %e, "Preview derivation failed, skipping");
                None
            }
        }
    }
}
