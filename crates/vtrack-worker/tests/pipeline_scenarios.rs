//! End-to-end frame pipeline runs over in-memory frames and a scripted detector.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use vtrack_detector::{DetectorError, DetectorResult, ObjectDetector};
use vtrack_media::{FrameGeometry, FrameSink, FrameSource, MediaResult, OverlayRenderer};
use vtrack_models::{BoundingBox, Centroid, Detection};
use vtrack_worker::{FramePipeline, PipelineConfig, PositionLogWriter, RunLogger, RunOutput};

const SIZE: u32 = 64;

/// Frames whose (0, 0) pixel encodes their 1-based index.
struct MemorySource {
    frames: VecDeque<RgbImage>,
}

impl MemorySource {
    fn new(count: u8) -> Self {
        let frames = (1..=count)
            .map(|i| {
                let mut frame = RgbImage::new(SIZE, SIZE);
                frame.put_pixel(0, 0, Rgb([i, i, i]));
                frame
            })
            .collect();
        Self { frames }
    }
}

#[async_trait]
impl FrameSource for MemorySource {
    fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(SIZE, SIZE, 30.0)
    }

    async fn next_frame(&mut self) -> MediaResult<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}

#[derive(Default)]
struct MemorySink {
    frames: Vec<RgbImage>,
    finished: bool,
}

impl MemorySink {
    fn frame_markers(&self) -> Vec<u8> {
        self.frames.iter().map(|f| f.get_pixel(0, 0)[0]).collect()
    }
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn write_frame(&mut self, frame: &RgbImage) -> MediaResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    async fn finish(&mut self) -> MediaResult<()> {
        self.finished = true;
        Ok(())
    }
}

/// Returns one scripted response per call; `None` entries fail.
struct ScriptedDetector {
    responses: Vec<Option<Vec<Detection>>>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    fn new(responses: Vec<Option<Vec<Detection>>>) -> Self {
        Self {
            responses,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ObjectDetector for ScriptedDetector {
    async fn detect(&self, image: &[u8]) -> DetectorResult<Vec<Detection>> {
        assert!(!image.is_empty());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(call).cloned().flatten() {
            Some(detections) => Ok(detections),
            None => Err(DetectorError::request_failed(503, "unavailable")),
        }
    }
}

fn car(x: i32, y: i32, w: i32, h: i32) -> Detection {
    Detection::new("car", 0.9, BoundingBox::new(x, y, w, h))
}

fn every_frame() -> PipelineConfig {
    PipelineConfig {
        frame_interval: 1,
        delay_between_requests: Duration::ZERO,
        previews_enabled: false,
        ..PipelineConfig::default()
    }
}

struct Run {
    output: RunOutput,
    sink: MemorySink,
    csv: String,
    calls: usize,
}

async fn run(config: PipelineConfig, frames: u8, responses: Vec<Option<Vec<Detection>>>) -> Run {
    let pipeline = FramePipeline::new(
        ScriptedDetector::new(responses),
        config,
        OverlayRenderer::default(),
    );
    let mut source = MemorySource::new(frames);
    let mut sink = MemorySink::default();
    let mut log = PositionLogWriter::new(Vec::new()).unwrap();
    let logger = RunLogger::with_run_id("test-run", "memory");

    let output = pipeline
        .process(&mut source, &mut sink, &mut log, &logger)
        .await
        .unwrap();

    let calls = pipeline_calls(&pipeline);
    Run {
        output,
        sink,
        csv: String::from_utf8(log.into_inner()).unwrap(),
        calls,
    }
}

fn pipeline_calls(pipeline: &FramePipeline<ScriptedDetector>) -> usize {
    pipeline.detector().calls.load(Ordering::SeqCst)
}

/// Data rows as (frame, object_id) pairs.
fn rows(csv: &str) -> Vec<(u64, u32)> {
    csv.lines()
        .skip(1)
        .map(|line| {
            let mut fields = line.split(',');
            let frame = fields.next().unwrap().parse().unwrap();
            let id = fields.next().unwrap().parse().unwrap();
            (frame, id)
        })
        .collect()
}

#[tokio::test]
async fn single_object_keeps_identity_while_drifting() {
    let responses = (0..5).map(|i| Some(vec![car(10 + 5 * i, 10, 20, 20)])).collect();

    let run = run(every_frame(), 5, responses).await;

    assert_eq!(run.output.summary.tracks_created, 1);
    assert_eq!(run.output.summary.rows_logged, 5);
    assert_eq!(rows(&run.csv), vec![(1, 0), (2, 0), (3, 0), (4, 0), (5, 0)]);

    let trail = run.output.trails.get(0).unwrap();
    assert_eq!(trail.key, "car_0");
    assert_eq!(trail.points.len(), 5);
    assert_eq!(trail.points[4], Centroid::new(40, 20));
    assert!(run.sink.finished);
}

#[tokio::test]
async fn unmatched_track_persists_unchanged() {
    let responses = vec![
        Some(vec![car(-10, -10, 20, 20), car(190, 190, 20, 20)]),
        Some(vec![car(-5, -5, 20, 20)]),
    ];

    let run = run(every_frame(), 2, responses).await;

    assert_eq!(run.output.summary.tracks_created, 2);
    assert_eq!(rows(&run.csv), vec![(1, 0), (1, 1), (2, 0)]);

    let trails = &run.output.trails;
    assert_eq!(trails.get(0).unwrap().points, vec![Centroid::new(0, 0), Centroid::new(5, 5)]);
    assert_eq!(trails.get(1).unwrap().points, vec![Centroid::new(200, 200)]);
}

#[tokio::test]
async fn detector_failure_skips_frame() {
    let responses = vec![
        Some(vec![car(10, 10, 20, 20)]),
        Some(vec![car(12, 10, 20, 20)]),
        None,
        Some(vec![car(16, 10, 20, 20)]),
        Some(vec![car(18, 10, 20, 20)]),
    ];

    let run = run(every_frame(), 5, responses).await;

    let summary = &run.output.summary;
    assert_eq!(summary.frames_sampled, 5);
    assert_eq!(summary.detector_failures, 1);
    assert_eq!(summary.frames_written, 4);
    assert_eq!(rows(&run.csv), vec![(1, 0), (2, 0), (4, 0), (5, 0)]);
    assert_eq!(run.sink.frame_markers(), vec![1, 2, 4, 5]);
    assert_eq!(run.output.trails.get(0).unwrap().points.len(), 4);
}

#[tokio::test]
async fn empty_detections_forward_frame_unannotated() {
    let responses = vec![Some(vec![car(10, 10, 20, 20)]), Some(vec![]), Some(vec![car(12, 10, 20, 20)])];

    let run = run(every_frame(), 3, responses).await;

    assert_eq!(run.output.summary.frames_written, 3);
    assert_eq!(run.output.summary.tracks_created, 1);
    assert_eq!(rows(&run.csv), vec![(1, 0), (3, 0)]);

    let untouched = MemorySource::new(3).frames[1].clone();
    assert_eq!(run.sink.frames[1], untouched);
    assert_ne!(run.sink.frames[0], MemorySource::new(3).frames[0]);
}

#[tokio::test]
async fn only_sampled_frames_reach_detector_and_output() {
    let config = PipelineConfig {
        frame_interval: 10,
        ..every_frame()
    };
    let responses = vec![Some(vec![car(10, 10, 20, 20)]), Some(vec![car(14, 10, 20, 20)])];

    let run = run(config, 25, responses).await;

    let summary = &run.output.summary;
    assert_eq!(summary.frames_read, 25);
    assert_eq!(summary.frames_sampled, 2);
    assert_eq!(summary.frames_written, 2);
    assert_eq!(run.calls, 2);
    assert_eq!(run.sink.frame_markers(), vec![10, 20]);
    assert_eq!(rows(&run.csv), vec![(10, 0), (20, 0)]);
}

#[tokio::test]
async fn requests_are_throttled() {
    let config = PipelineConfig {
        delay_between_requests: Duration::from_millis(30),
        ..every_frame()
    };
    let responses = vec![Some(vec![]), Some(vec![]), Some(vec![])];

    let started = Instant::now();
    let run = run(config, 3, responses).await;

    assert_eq!(run.calls, 3);
    // Two waits: none before the first call
    assert!(started.elapsed() >= Duration::from_millis(60));
}

#[tokio::test]
async fn empty_source_closes_outputs() {
    let run = run(every_frame(), 0, vec![]).await;

    assert!(run.sink.finished);
    assert_eq!(run.output.summary.frames_read, 0);
    assert_eq!(run.csv, "frame,object_id,label,x,y,w,h\n");
    assert!(run.output.trails.is_empty());
}
