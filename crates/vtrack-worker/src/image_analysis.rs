//! Single-image object analysis.

use image::{Rgb, RgbImage};
use tracing::info;
use vtrack_detector::ObjectDetector;
use vtrack_media::OverlayRenderer;
use vtrack_models::Detection;

use crate::error::{PipelineError, PipelineResult};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Annotated image and the formatted labels drawn on it.
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    pub image: RgbImage,
    /// `"{label} ({confidence}%)"` per detection, in detector order
    pub labels: Vec<String>,
    pub detections: Vec<Detection>,
}

/// Detect objects in an encoded image and draw them.
///
/// Unlike the video pipeline, a detector failure here is returned to the
/// caller since there is no other frame to fall back on.
pub async fn analyze_image<D: ObjectDetector + ?Sized>(
    detector: &D,
    renderer: &OverlayRenderer,
    bytes: &[u8],
) -> PipelineResult<ImageAnalysis> {
    let mut image = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::invalid_image(e.to_string()))?
        .to_rgb8();

    let detections = detector.detect(bytes).await?;
    let labels: Vec<String> = detections.iter().map(format_label).collect();

    for (detection, label) in detections.iter().zip(&labels) {
        renderer.draw_box(&mut image, &detection.bbox, BOX_COLOR);
        renderer.draw_tag(&mut image, label, detection.bbox.x, detection.bbox.y, BOX_COLOR);
    }

    info!(objects = detections.len(), "Analyzed image");
    Ok(ImageAnalysis {
        image,
        labels,
        detections,
    })
}

pub fn format_label(detection: &Detection) -> String {
    format!("{} ({:.1}%)", detection.label, detection.confidence * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vtrack_detector::{DetectorError, DetectorResult};
    use vtrack_media::{encode_frame, TransportFormat};
    use vtrack_models::BoundingBox;

    struct FixedDetector(DetectorResult<Vec<Detection>>);

    #[async_trait]
    impl ObjectDetector for FixedDetector {
        async fn detect(&self, _image: &[u8]) -> DetectorResult<Vec<Detection>> {
            match &self.0 {
                Ok(d) => Ok(d.clone()),
                Err(_) => Err(DetectorError::request_failed(500, "boom")),
            }
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode_frame(&RgbImage::new(width, height), TransportFormat::Png).unwrap()
    }

    #[test]
    fn test_format_label() {
        let d = Detection::new("dog", 0.875, BoundingBox::new(0, 0, 1, 1));
        assert_eq!(format_label(&d), "dog (87.5%)");
    }

    #[tokio::test]
    async fn test_draws_green_boxes() {
        let detector = FixedDetector(Ok(vec![Detection::new(
            "cat",
            0.5,
            BoundingBox::new(4, 4, 10, 10),
        )]));

        let result = analyze_image(&detector, &OverlayRenderer::default(), &png(32, 32))
            .await
            .unwrap();

        assert_eq!(result.labels, vec!["cat (50.0%)".to_string()]);
        assert_eq!(*result.image.get_pixel(4, 4), BOX_COLOR);
        assert_eq!(*result.image.get_pixel(14, 14), BOX_COLOR);
    }

    #[tokio::test]
    async fn test_invalid_image() {
        let detector = FixedDetector(Ok(vec![]));
        let result = analyze_image(&detector, &OverlayRenderer::default(), b"not an image").await;
        assert!(matches!(result, Err(PipelineError::InvalidImage(_))));
    }

    #[tokio::test]
    async fn test_detector_error_propagates() {
        let detector = FixedDetector(Err(DetectorError::request_failed(500, "boom")));
        let result = analyze_image(&detector, &OverlayRenderer::default(), &png(8, 8)).await;
        assert!(matches!(result, Err(PipelineError::Detector(_))));
    }
}
