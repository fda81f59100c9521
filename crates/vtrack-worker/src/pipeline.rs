//! Frame pipeline: sample, detect, associate, render, write.
//!
//! One run reads a frame source to exhaustion. Every `frame_interval`-th
//! frame (1-based) goes through the detector and tracker; the annotated
//! frame goes to the sink and one position row per tracked object goes to
//! the log. Frames whose detector call fails are dropped without touching
//! tracker state.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn, Instrument};
use vtrack_detector::{DetectorResult, ObjectDetector};
use vtrack_media::{
    encode_frame, DerivedPreviews, FfmpegFrameSink, FfmpegFrameSource, FrameSink, FrameSource,
    OverlayRenderer, PreviewFinalizer,
};
use vtrack_models::{Detection, PositionRow};
use vtrack_tracker::{CentroidTracker, TrailStore};

use crate::chart::TrajectoryChart;
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::logging::RunLogger;
use crate::position_log::PositionLogWriter;

/// Lifecycle of one processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Source and sink are open, no frame read yet
    Open,
    /// Reading frames
    Sampling,
    /// Source exhausted, outputs flushed
    Closed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Open => "open",
            RunState::Sampling => "sampling",
            RunState::Closed => "closed",
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub frames_read: u64,
    pub frames_sampled: u64,
    pub frames_written: u64,
    pub detector_failures: u64,
    pub rows_logged: u64,
    pub tracks_created: u32,
}

/// Result of [`FramePipeline::process`].
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub summary: RunSummary,
    /// Full centroid history of every identity seen
    pub trails: TrailStore,
}

/// Files produced by [`FramePipeline::process_video`].
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub run_id: String,
    pub annotated_video: PathBuf,
    pub position_log: PathBuf,
    pub trajectory_chart: PathBuf,
    pub previews: DerivedPreviews,
    pub summary: RunSummary,
}

/// Drives detection and tracking over a frame stream.
pub struct FramePipeline<D: ObjectDetector> {
    detector: D,
    config: PipelineConfig,
    renderer: OverlayRenderer,
}

impl<D: ObjectDetector> FramePipeline<D> {
    pub fn new(detector: D, config: PipelineConfig, renderer: OverlayRenderer) -> Self {
        Self {
            detector,
            config,
            renderer,
        }
    }

    /// Create a pipeline, loading the overlay font named in the config.
    pub fn with_config(detector: D, config: PipelineConfig) -> PipelineResult<Self> {
        let renderer = OverlayRenderer::load(config.font_path.as_deref())?;
        Ok(Self::new(detector, config, renderer))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Run the frame loop until `source` is exhausted.
    ///
    /// Tracker and trail state live for this call only.
    pub async fn process<S, K, W>(
        &self,
        source: &mut S,
        sink: &mut K,
        log: &mut PositionLogWriter<W>,
        logger: &RunLogger,
    ) -> PipelineResult<RunOutput>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
        W: Write,
    {
        let mut tracker = CentroidTracker::new(self.config.tracker());
        let mut trails = TrailStore::new();
        let mut summary = RunSummary::default();
        let mut detector_calls = 0u64;
        let rows_before = log.rows();

        let state = self.transition(logger, RunState::Open, RunState::Sampling);

        let mut index = 0u64;
        loop {
            index += 1;

            if !self.config.is_sampled(index) {
                if !source.skip_frame().await? {
                    break;
                }
                summary.frames_read += 1;
                continue;
            }

            let Some(mut frame) = source.next_frame().await? else {
                break;
            };
            summary.frames_read += 1;
            summary.frames_sampled += 1;

            let payload = encode_frame(&frame, self.config.transport)?;
            let result = self.detect(&payload, detector_calls).await;
            detector_calls += 1;
            let detections = match result {
                Ok(detections) => detections,
                Err(e) => {
                    summary.detector_failures += 1;
                    warn!(
                        run_id = %logger.run_id(),
                        frame = index,
                        error = %e,
                        timeout = e.is_timeout(),
                        "Detector call failed, skipping frame"
                    );
                    continue;
                }
            };

            let tracked = tracker.update(&detections);
            for object in tracked.values() {
                trails.append(object.id, &object.label, object.centroid);
                self.renderer.draw_track(
                    &mut frame,
                    object,
                    trails.recent(object.id, self.config.trail_window),
                );
                log.append(&PositionRow::from_tracked(index, object))?;
            }

            sink.write_frame(&frame).await?;
            summary.frames_written += 1;

            debug!(
                frame = index,
                detections = detections.len(),
                tracked = tracked.len(),
                live_tracks = tracker.len(),
                "Processed frame"
            );
        }

        sink.finish().await?;
        log.flush()?;
        self.transition(logger, state, RunState::Closed);

        summary.rows_logged = log.rows() - rows_before;
        summary.tracks_created = tracker.next_id();

        Ok(RunOutput { summary, trails })
    }

    /// Process a video file end to end, writing every artifact to `output_dir`.
    pub async fn process_video(
        &self,
        input: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> PipelineResult<ArtifactBundle> {
        let input = input.as_ref();
        let output_dir = output_dir.as_ref();
        let logger = RunLogger::new(&input.display().to_string());

        self.run_video(input, output_dir, &logger)
            .instrument(logger.create_span())
            .await
    }

    async fn run_video(
        &self,
        input: &Path,
        output_dir: &Path,
        logger: &RunLogger,
    ) -> PipelineResult<ArtifactBundle> {
        logger.log_start("video tracking");
        std::fs::create_dir_all(output_dir)?;

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());
        let annotated_video = output_dir.join(format!("{}_annotated.mp4", stem));
        let position_log = output_dir.join(format!("{}_positions.csv", stem));
        let trajectory_chart = output_dir.join(format!("{}_trajectories.html", stem));

        let mut source = FfmpegFrameSource::open(input).await?;
        let mut sink =
            FfmpegFrameSink::create(&annotated_video, source.geometry(), &self.config.encoder)
                .await?;
        let mut log = PositionLogWriter::create(&position_log)?;

        let output = self.process(&mut source, &mut sink, &mut log, logger).await?;
        TrajectoryChart::from_trails(&output.trails).write_to(&trajectory_chart)?;

        let previews = if self.config.previews_enabled {
            let previews = PreviewFinalizer::new(self.config.previews.clone())
                .derive(&annotated_video)
                .await;
            if previews.loop_preview.is_none() || previews.streaming_preview.is_none() {
                logger.log_warning("one or more previews were not produced");
            }
            previews
        } else {
            DerivedPreviews::default()
        };

        let summary = output.summary;
        logger.log_completion(&format!(
            "{} frames read, {} sampled, {} written, {} detector failures, {} tracks",
            summary.frames_read,
            summary.frames_sampled,
            summary.frames_written,
            summary.detector_failures,
            summary.tracks_created
        ));

        Ok(ArtifactBundle {
            run_id: logger.run_id().to_string(),
            annotated_video,
            position_log,
            trajectory_chart,
            previews,
            summary,
        })
    }

    /// Send one encoded frame, honoring the inter-request delay.
    async fn detect(&self, payload: &[u8], calls_so_far: u64) -> DetectorResult<Vec<Detection>> {
        let delay = self.config.delay_between_requests;
        if calls_so_far > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.detector.detect(payload).await
    }

    fn transition(&self, logger: &RunLogger, from: RunState, to: RunState) -> RunState {
        logger.log_state(from.as_str(), to.as_str());
        to
    }
}
