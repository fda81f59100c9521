//! Detection service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, warn};
use vtrack_models::Detection;

use crate::error::{DetectorError, DetectorResult};
use crate::types::AnalyzeResponse;
use crate::ObjectDetector;

const DEFAULT_ANALYZE_PATH: &str = "vision/v3.2/analyze";
const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Configuration for the detection client.
///
/// Scoped to one processing run: the pipeline receives it at construction.
#[derive(Clone)]
pub struct DetectorConfig {
    /// Base URL of the vision service
    pub endpoint: String,
    /// Subscription key sent with every request
    pub api_key: String,
    /// Path of the analyze operation, relative to `endpoint`
    pub analyze_path: String,
    /// Request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for DetectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("analyze_path", &self.analyze_path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8001".to_string(),
            api_key: String::new(),
            analyze_path: DEFAULT_ANALYZE_PATH.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl DetectorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("VTRACK_DETECTOR_ENDPOINT").unwrap_or(defaults.endpoint),
            api_key: std::env::var("VTRACK_DETECTOR_KEY").unwrap_or_default(),
            analyze_path: std::env::var("VTRACK_DETECTOR_ANALYZE_PATH")
                .unwrap_or(defaults.analyze_path),
            timeout: Duration::from_secs(
                std::env::var("VTRACK_DETECTOR_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Full URL of the analyze operation.
    pub fn analyze_url(&self) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.analyze_path.trim_start_matches('/')
        )
    }
}

/// Client for the vision service's object analysis.
pub struct DetectorClient {
    http: Client,
    config: DetectorConfig,
}

impl DetectorClient {
    /// Create a new detection client.
    pub fn new(config: DetectorConfig) -> DetectorResult<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(DetectorError::not_configured("endpoint is empty"));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DetectorError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> DetectorResult<Self> {
        Self::new(DetectorConfig::from_env())
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run object analysis on one encoded image.
    pub async fn analyze(&self, image: &[u8]) -> DetectorResult<AnalyzeResponse> {
        let url = self.config.analyze_url();
        debug!(bytes = image.len(), "Sending object analysis request to {}", url);

        let response = self
            .http
            .post(&url)
            .query(&[("visualFeatures", "Objects")])
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Detector request rejected");
            return Err(DetectorError::request_failed(status.as_u16(), body));
        }

        let body = response.bytes().await.map_err(|e| self.map_send_error(e))?;
        let analysis: AnalyzeResponse = serde_json::from_slice(&body)?;
        Ok(analysis)
    }

    fn map_send_error(&self, e: reqwest::Error) -> DetectorError {
        if e.is_timeout() {
            DetectorError::Timeout(self.config.timeout.as_secs())
        } else {
            DetectorError::Network(e)
        }
    }
}

#[async_trait]
impl ObjectDetector for DetectorClient {
    async fn detect(&self, image: &[u8]) -> DetectorResult<Vec<Detection>> {
        let analysis = self.analyze(image).await?;
        Ok(analysis.into_detections())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vtrack_models::BoundingBox;
    use wiremock::matchers::{body_bytes, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> DetectorConfig {
        DetectorConfig {
            endpoint: server.uri(),
            api_key: "secret".to_string(),
            timeout: Duration::from_secs(5),
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.analyze_url(), "http://localhost:8001/vision/v3.2/analyze");
    }

    #[test]
    fn test_analyze_url_joins_slashes() {
        let config = DetectorConfig {
            endpoint: "https://vision.example.com/".to_string(),
            analyze_path: "/vision/v3.2/analyze".to_string(),
            ..DetectorConfig::default()
        };
        assert_eq!(config.analyze_url(), "https://vision.example.com/vision/v3.2/analyze");
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = DetectorConfig {
            api_key: "super-secret".to_string(),
            ..DetectorConfig::default()
        };
        assert!(!format!("{:?}", config).contains("super-secret"));
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let config = DetectorConfig {
            endpoint: " ".to_string(),
            ..DetectorConfig::default()
        };
        assert!(matches!(
            DetectorClient::new(config),
            Err(DetectorError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_detect_parses_objects() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vision/v3.2/analyze"))
            .and(query_param("visualFeatures", "Objects"))
            .and(header("Ocp-Apim-Subscription-Key", "secret"))
            .and(body_bytes(vec![1u8, 2, 3]))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "objects": [
                    {"object": "car", "confidence": 0.9,
                     "rectangle": {"x": 10, "y": 10, "w": 20, "h": 20}}
                ],
                "requestId": "r-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = DetectorClient::new(config_for(&server)).unwrap();
        let detections = client.detect(&[1, 2, 3]).await.unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "car");
        assert_eq!(detections[0].bbox, BoundingBox::new(10, 10, 20, 20));
    }

    #[tokio::test]
    async fn test_detect_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limit"))
            .mount(&server)
            .await;

        let client = DetectorClient::new(config_for(&server)).unwrap();
        let err = client.detect(&[0]).await.unwrap_err();

        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("rate limit"));
    }

    #[tokio::test]
    async fn test_detect_rejects_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = DetectorClient::new(config_for(&server)).unwrap();
        let err = client.detect(&[0]).await.unwrap_err();
        assert!(matches!(err, DetectorError::Json(_)));
    }

    #[tokio::test]
    async fn test_detect_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"objects": []}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let config = DetectorConfig {
            timeout: Duration::from_millis(200),
            ..config_for(&server)
        };
        let client = DetectorClient::new(config).unwrap();
        let err = client.detect(&[0]).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
