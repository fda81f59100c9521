//! Raw frame decoding/encoding through FFmpeg pipes.
//!
//! Frames travel as packed RGB24 (`image::RgbImage`). The decoder side reads
//! `width * height * 3` bytes per frame from FFmpeg's stdout; the encoder side
//! writes the same layout to FFmpeg's stdin.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::command::{check_ffmpeg, FfmpegCommand, PIPE};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Size and rate of a frame stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self { width, height, fps }
    }

    /// Bytes per packed RGB24 frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    fn check(&self, frame: &RgbImage) -> MediaResult<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(MediaError::FrameSizeMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width: frame.width(),
                height: frame.height(),
            });
        }
        Ok(())
    }
}

/// A sequential supplier of decoded frames.
#[async_trait]
pub trait FrameSource: Send {
    fn geometry(&self) -> FrameGeometry;

    /// Next frame in stream order, `None` once the source is exhausted.
    async fn next_frame(&mut self) -> MediaResult<Option<RgbImage>>;

    /// Advance past one frame without keeping it. Returns `false` at the end.
    async fn skip_frame(&mut self) -> MediaResult<bool> {
        Ok(self.next_frame().await?.is_some())
    }
}

/// A consumer of frames that produces an output artifact.
#[async_trait]
pub trait FrameSink: Send {
    async fn write_frame(&mut self, frame: &RgbImage) -> MediaResult<()>;

    /// Flush and close the output. No frames may be written afterwards.
    async fn finish(&mut self) -> MediaResult<()>;
}

/// Bytes of FFmpeg stderr kept for error reports.
const STDERR_TAIL_BYTES: usize = 8 * 1024;

/// Background reader that keeps a child's stderr pipe from filling up.
///
/// Only the last [`STDERR_TAIL_BYTES`] are retained.
struct StderrTail {
    handle: Option<JoinHandle<Vec<u8>>>,
}

impl StderrTail {
    fn spawn(child: &mut Child) -> Self {
        let handle = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut tail = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            tail.extend_from_slice(&chunk[..n]);
                            if tail.len() > STDERR_TAIL_BYTES {
                                tail.drain(..tail.len() - STDERR_TAIL_BYTES);
                            }
                        }
                    }
                }
                tail
            })
        });
        Self { handle }
    }

    /// Wait for the pipe to close and return what was kept.
    async fn collect(&mut self) -> String {
        let tail = match self.handle.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => Vec::new(),
        };
        String::from_utf8_lossy(&tail).trim().to_string()
    }
}

/// Decodes a video file into RGB frames with an FFmpeg child process.
pub struct FfmpegFrameSource {
    child: Child,
    stderr: StderrTail,
    stdout: BufReader<ChildStdout>,
    geometry: FrameGeometry,
    scratch: Vec<u8>,
    exhausted: bool,
}

impl FfmpegFrameSource {
    /// Probe and open a video file for decoding.
    pub async fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        let info = probe_video(path).await?;
        let geometry = info.geometry()?;
        check_ffmpeg()?;

        let cmd = FfmpegCommand::new(path, PIPE).raw_rgb_output();
        let child = cmd.to_process(Stdio::null(), Stdio::piped()).spawn()?;
        let source = Self::from_child(child, geometry)?;

        info!(
            path = %path.display(),
            width = geometry.width,
            height = geometry.height,
            fps = geometry.fps,
            "Opened video source"
        );
        Ok(source)
    }

    /// Wrap a spawned decoder writing raw RGB24 frames to stdout.
    fn from_child(mut child: Child, geometry: FrameGeometry) -> MediaResult<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None))?;
        let stderr = StderrTail::spawn(&mut child);

        Ok(Self {
            child,
            stderr,
            stdout: BufReader::new(stdout),
            geometry,
            scratch: vec![0; geometry.frame_len()],
            exhausted: false,
        })
    }

    /// Fill the scratch buffer with the next frame. `false` at end of stream.
    async fn read_into_scratch(&mut self) -> MediaResult<bool> {
        if self.exhausted {
            return Ok(false);
        }

        match self.stdout.read_exact(&mut self.scratch).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.exhausted = true;
                self.reap().await?;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Wait for the decoder to exit and surface decode failures.
    async fn reap(&mut self) -> MediaResult<()> {
        let (status, stderr) = wait_for_exit(&mut self.child, &mut self.stderr).await?;
        if status.success() {
            debug!("Video source exhausted");
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg decoder failed",
                (!stderr.is_empty()).then_some(stderr),
                status.code(),
            ))
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    async fn next_frame(&mut self) -> MediaResult<Option<RgbImage>> {
        if !self.read_into_scratch().await? {
            return Ok(None);
        }
        let frame = RgbImage::from_raw(self.geometry.width, self.geometry.height, self.scratch.clone())
            .ok_or_else(|| MediaError::internal("Decoded frame has unexpected length"))?;
        Ok(Some(frame))
    }

    async fn skip_frame(&mut self) -> MediaResult<bool> {
        self.read_into_scratch().await
    }
}

/// Output settings for the annotated video encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderOptions {
    /// Output frame rate; `None` reuses the source rate
    pub fps: Option<f64>,
    pub video_codec: String,
    pub pixel_format: String,
    pub crf: Option<u8>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            fps: None,
            video_codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            crf: Some(23),
        }
    }
}

/// Encodes RGB frames into a video file with an FFmpeg child process.
pub struct FfmpegFrameSink {
    child: Child,
    stderr: StderrTail,
    stdin: Option<ChildStdin>,
    geometry: FrameGeometry,
    output: PathBuf,
    frames_written: u64,
}

impl FfmpegFrameSink {
    /// Start an encoder writing to `output`.
    pub async fn create(
        output: impl AsRef<Path>,
        geometry: FrameGeometry,
        options: &EncoderOptions,
    ) -> MediaResult<Self> {
        check_ffmpeg()?;
        let output = output.as_ref().to_path_buf();
        let fps = options.fps.unwrap_or(geometry.fps);

        let mut cmd = FfmpegCommand::new(PIPE, &output)
            .raw_rgb_input(geometry.width, geometry.height, fps)
            // yuv420p needs even dimensions
            .video_filter("pad=ceil(iw/2)*2:ceil(ih/2)*2")
            .video_codec(&options.video_codec)
            .pixel_format(&options.pixel_format);
        if let Some(crf) = options.crf {
            cmd = cmd.crf(crf);
        }

        let child = cmd.to_process(Stdio::piped(), Stdio::null()).spawn()?;
        info!(output = %output.display(), fps, "Started video encoder");
        Self::from_child(child, geometry, output)
    }

    /// Wrap a spawned encoder reading raw RGB24 frames from stdin.
    fn from_child(mut child: Child, geometry: FrameGeometry, output: PathBuf) -> MediaResult<Self> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("Failed to capture FFmpeg stdin", None, None))?;
        let stderr = StderrTail::spawn(&mut child);

        Ok(Self {
            child,
            stderr,
            stdin: Some(stdin),
            geometry,
            output,
            frames_written: 0,
        })
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

#[async_trait]
impl FrameSink for FfmpegFrameSink {
    async fn write_frame(&mut self, frame: &RgbImage) -> MediaResult<()> {
        self.geometry.check(frame)?;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::internal("Encoder already finished"))?;
        stdin.write_all(frame.as_raw()).await?;
        self.frames_written += 1;
        Ok(())
    }

    async fn finish(&mut self) -> MediaResult<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush().await?;
            // Closing stdin signals end of stream
            drop(stdin);
        }

        let (status, stderr) = wait_for_exit(&mut self.child, &mut self.stderr).await?;
        if status.success() {
            info!(
                output = %self.output.display(),
                frames = self.frames_written,
                "Video encoder finished"
            );
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg encoder failed",
                (!stderr.is_empty()).then_some(stderr),
                status.code(),
            ))
        }
    }
}

/// Image format used to ship a frame to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFormat {
    Jpeg { quality: u8 },
    Png,
}

impl Default for TransportFormat {
    fn default() -> Self {
        TransportFormat::Jpeg { quality: 90 }
    }
}

impl std::str::FromStr for TransportFormat {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(TransportFormat::default()),
            "png" => Ok(TransportFormat::Png),
            other => Err(MediaError::internal(format!("unsupported transport format: {}", other))),
        }
    }
}

/// Encode a frame for transport to the detector.
pub fn encode_frame(frame: &RgbImage, format: TransportFormat) -> MediaResult<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        TransportFormat::Jpeg { quality } => {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            encoder.encode_image(frame)?;
        }
        TransportFormat::Png => {
            frame.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
    }
    Ok(buf)
}

/// Wait for an FFmpeg child to exit, then collect the tail of its stderr.
async fn wait_for_exit(
    child: &mut Child,
    stderr: &mut StderrTail,
) -> MediaResult<(ExitStatus, String)> {
    let status = child.wait().await?;
    Ok((status, stderr.collect().await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_frame_len() {
        assert_eq!(FrameGeometry::new(4, 2, 30.0).frame_len(), 24);
    }

    #[test]
    fn test_geometry_check() {
        let geometry = FrameGeometry::new(4, 2, 30.0);
        assert!(geometry.check(&RgbImage::new(4, 2)).is_ok());
        assert!(matches!(
            geometry.check(&RgbImage::new(2, 4)),
            Err(MediaError::FrameSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_encode_frame_formats() {
        let frame = RgbImage::from_pixel(16, 8, Rgb([200, 10, 10]));

        let jpeg = encode_frame(&frame, TransportFormat::default()).unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);

        let png = encode_frame(&frame, TransportFormat::Png).unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded, frame);
    }

    /// Run `script` under `sh` with the same pipes FFmpeg gets.
    #[cfg(unix)]
    fn spawn_sh(script: &str, stdin: Stdio, stdout: Stdio) -> Child {
        tokio::process::Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_source_survives_chatty_stderr() {
        let child = spawn_sh(
            "yes error | head -c 200000 >&2; head -c 48 /dev/zero",
            Stdio::null(),
            Stdio::piped(),
        );
        let mut source = FfmpegFrameSource::from_child(child, FrameGeometry::new(4, 4, 30.0)).unwrap();

        let limit = std::time::Duration::from_secs(10);
        let frame = tokio::time::timeout(limit, source.next_frame()).await.unwrap().unwrap();
        assert_eq!(frame.unwrap().dimensions(), (4, 4));
        let end = tokio::time::timeout(limit, source.next_frame()).await.unwrap().unwrap();
        assert!(end.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sink_survives_chatty_stderr() {
        let child = spawn_sh(
            "yes error | head -c 200000 >&2; cat >/dev/null",
            Stdio::piped(),
            Stdio::null(),
        );
        let geometry = FrameGeometry::new(64, 64, 30.0);
        let mut sink = FfmpegFrameSink::from_child(child, geometry, PathBuf::from("out.mp4")).unwrap();

        let frame = RgbImage::new(64, 64);
        let run = async {
            for _ in 0..10 {
                sink.write_frame(&frame).await.unwrap();
            }
            sink.finish().await.unwrap();
        };
        tokio::time::timeout(std::time::Duration::from_secs(10), run)
            .await
            .unwrap();
        assert_eq!(sink.frames_written(), 10);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sink_failure_reports_stderr_tail() {
        let child = spawn_sh(
            "cat >/dev/null; yes noise | head -c 50000 >&2; echo boom >&2; exit 3",
            Stdio::piped(),
            Stdio::null(),
        );
        let geometry = FrameGeometry::new(2, 2, 30.0);
        let mut sink = FfmpegFrameSink::from_child(child, geometry, PathBuf::from("out.mp4")).unwrap();

        sink.write_frame(&RgbImage::new(2, 2)).await.unwrap();
        match sink.finish().await {
            Err(MediaError::FfmpegFailed { stderr, exit_code, .. }) => {
                let stderr = stderr.unwrap();
                assert!(stderr.ends_with("boom"));
                assert!(stderr.len() <= STDERR_TAIL_BYTES);
                assert_eq!(exit_code, Some(3));
            }
            other => panic!("expected encoder failure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_transport_format_parse() {
        assert_eq!("JPG".parse::<TransportFormat>().unwrap(), TransportFormat::default());
        assert_eq!("png".parse::<TransportFormat>().unwrap(), TransportFormat::Png);
        assert!("tiff".parse::<TransportFormat>().is_err());
    }
}
