#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper and frame handling for vtrack.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and execution
//! - Raw RGB frame decoding and encoding through FFmpeg pipes
//! - Frame transport encoding (JPEG/PNG) for the detector
//! - Track overlay rendering (boxes, tags, trails)
//! - Best-effort preview derivation (looping GIF, streaming WebM)
//! - Thumbnail extraction and media-kind sniffing

pub mod command;
pub mod error;
pub mod frames;
pub mod media_kind;
pub mod overlay;
pub mod preview;
pub mod probe;
pub mod thumbnail;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{
    encode_frame, EncoderOptions, FfmpegFrameSink, FfmpegFrameSource, FrameGeometry, FrameSink,
    FrameSource, TransportFormat,
};
pub use media_kind::{detect_media_file, detect_media_kind, MediaKind};
pub use overlay::OverlayRenderer;
pub use preview::{DerivedPreviews, PreviewConfig, PreviewFinalizer};
pub use probe::{probe_video, VideoInfo};
pub use thumbnail::extract_thumbnail;
