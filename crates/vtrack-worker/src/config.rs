//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use vtrack_media::{EncoderOptions, PreviewConfig, TransportFormat};
use vtrack_tracker::{TrackerConfig, DEFAULT_MAX_DISTANCE, DEFAULT_TRAIL_WINDOW};

/// Frame pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Run detection on every Nth frame (1-based frame numbering)
    pub frame_interval: u64,
    /// Maximum centroid distance for continuing a track
    pub max_distance: f64,
    /// Drop tracks unmatched for this many sampled frames (`None` = never)
    pub evict_after: Option<u32>,
    /// Trail points drawn per track
    pub trail_window: usize,
    /// Minimum gap between consecutive detector calls
    pub delay_between_requests: Duration,
    /// Frame encoding sent to the detector
    pub transport: TransportFormat,
    /// Annotated video encoder settings
    pub encoder: EncoderOptions,
    /// Font for track tags; system fonts are tried when unset
    pub font_path: Option<PathBuf>,
    /// Derive GIF/WebM previews after the run
    pub previews_enabled: bool,
    pub previews: PreviewConfig,
    /// Directory for run artifacts
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_interval: 10,
            max_distance: DEFAULT_MAX_DISTANCE,
            evict_after: None,
            trail_window: DEFAULT_TRAIL_WINDOW,
            delay_between_requests: Duration::from_secs(1),
            transport: TransportFormat::default(),
            encoder: EncoderOptions::default(),
            font_path: None,
            previews_enabled: true,
            previews: PreviewConfig::default(),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            frame_interval: env_parse("VTRACK_FRAME_INTERVAL")
                .filter(|n: &u64| *n > 0)
                .unwrap_or(defaults.frame_interval),
            max_distance: env_parse("VTRACK_MAX_DISTANCE").unwrap_or(defaults.max_distance),
            evict_after: env_parse("VTRACK_EVICT_AFTER"),
            trail_window: env_parse("VTRACK_TRAIL_WINDOW").unwrap_or(defaults.trail_window),
            delay_between_requests: env_parse::<f64>("VTRACK_REQUEST_DELAY_SECS")
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.delay_between_requests),
            transport: env_parse("VTRACK_TRANSPORT_FORMAT").unwrap_or(defaults.transport),
            encoder: EncoderOptions {
                fps: env_parse("VTRACK_OUTPUT_FPS"),
                ..defaults.encoder
            },
            font_path: std::env::var("VTRACK_FONT_PATH").ok().map(PathBuf::from),
            previews_enabled: std::env::var("VTRACK_PREVIEWS")
                .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "off"))
                .unwrap_or(defaults.previews_enabled),
            previews: defaults.previews,
            output_dir: std::env::var("VTRACK_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
        }
    }

    /// Tracker settings derived from this config.
    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            max_distance: self.max_distance,
            evict_after: self.evict_after,
        }
    }

    /// Whether 1-based frame `index` is sent to the detector.
    pub fn is_sampled(&self, index: u64) -> bool {
        index % self.frame_interval.max(1) == 0
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.frame_interval, 10);
        assert_eq!(config.max_distance, 50.0);
        assert_eq!(config.evict_after, None);
        assert_eq!(config.trail_window, 10);
        assert_eq!(config.delay_between_requests, Duration::from_secs(1));
        assert_eq!(config.transport, TransportFormat::Jpeg { quality: 90 });
    }

    #[test]
    fn test_sampling() {
        let config = PipelineConfig::default();
        let sampled: Vec<u64> = (1..=35).filter(|&i| config.is_sampled(i)).collect();
        assert_eq!(sampled, vec![10, 20, 30]);

        let every = PipelineConfig {
            frame_interval: 1,
            ..PipelineConfig::default()
        };
        assert!((1..=5).all(|i| every.is_sampled(i)));
    }

    #[test]
    fn test_tracker_config() {
        let config = PipelineConfig {
            max_distance: 30.0,
            evict_after: Some(4),
            ..PipelineConfig::default()
        };
        assert_eq!(
            config.tracker(),
            TrackerConfig {
                max_distance: 30.0,
                evict_after: Some(4)
            }
        );
    }
}
