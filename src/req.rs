pub mod http {
    use std::{thread, time::Duration};

    use reqwest::{
        blocking::{Client, Response},
        header::{CONTENT_TYPE, LOCATION},
        StatusCode,
    };
    use tracing::{debug, info, warn};

    use crate::config::Settings;
    use crate::model::{
        AnalysisResult, ErrorEnvelope, Feature, OperationStatus, ReadOperation, ReadPage,
        SegmentMode,
    };

    const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
    const OPERATION_LOCATION: &str = "Operation-Location";
    const ANALYZE_PATH: &str = "computervision/imageanalysis:analyze?api-version=2023-10-01";
    const SEGMENT_PATH: &str = "computervision/imageanalysis:segment?api-version=2023-02-01-preview";
    const READ_PATH: &str =
        "formrecognizer/documentModels/prebuilt-read:analyze?api-version=2023-07-31";
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    #[derive(Debug, thiserror::Error)]
    pub enum ApiError {
        #[error("HTTP Response Error: Status code: {status}, Reason: {reason}, Message: {message}")]
        Status {
            status: u16,
            reason: String,
            message: String,
        },
        #[error("request failed: {0}")]
        Transport(#[from] reqwest::Error),
        #[error("malformed response: {0}")]
        Decode(#[from] serde_json::Error),
        #[error("read operation response has no Operation-Location header")]
        MissingOperationLocation,
        #[error("read operation failed: {0}")]
        OperationFailed(String),
        #[error("read operation did not finish after {0} polls")]
        PollExhausted(u32),
    }

    /// Pacing of the read operation poll loop.
    #[derive(Clone, Copy, Debug)]
    pub struct ReadOptions {
        pub poll_interval: Duration,
        pub max_polls: u32,
    }

    impl Default for ReadOptions {
        fn default() -> Self {
            ReadOptions {
                poll_interval: Duration::from_secs(1),
                max_polls: 120,
            }
        }
    }

    pub struct VisionClient {
        settings: Settings,
        http: Client,
    }

    impl VisionClient {
        pub fn new(settings: Settings) -> anyhow::Result<Self> {
            let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
            Ok(Self::with_http(settings, http))
        }

        pub fn with_http(settings: Settings, http: Client) -> Self {
            VisionClient { settings, http }
        }

        pub fn analyze(
            &self,
            image: &[u8],
            features: &[Feature],
        ) -> Result<AnalysisResult, ApiError> {
            let features = features
                .iter()
                .map(|f| f.as_str())
                .collect::<Vec<_>>()
                .join(",");
            let url = self
                .settings
                .endpoint_url(&format!("{ANALYZE_PATH}&features={features}"));

            let body = self.post_image(&url, image)?.text()?;
            debug!(%body, "analysis result");
            let result: AnalysisResult = serde_json::from_str(&body)?;
            debug!(
                model_version = ?result.model_version,
                size = ?result.metadata.as_ref().map(|m| (m.width, m.height)),
                "analysis parsed"
            );
            Ok(result)
        }

        pub fn segment(&self, image: &[u8], mode: SegmentMode) -> Result<Vec<u8>, ApiError> {
            let url = self
                .settings
                .endpoint_url(&format!("{SEGMENT_PATH}&mode={}", mode.as_str()));
            let bytes = self.post_image(&url, image)?.bytes()?;
            debug!(len = bytes.len(), "segmentation result");
            Ok(bytes.into())
        }

        /// Submits a `prebuilt-read` job and polls it until the service settles.
        pub fn read_text(
            &self,
            image: &[u8],
            options: ReadOptions,
        ) -> Result<Vec<ReadPage>, ApiError> {
            let url = self.settings.endpoint_url(READ_PATH);
            let response = self.post_image(&url, image)?;
            let operation = response
                .headers()
                .get(OPERATION_LOCATION)
                .or_else(|| response.headers().get(LOCATION))
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or(ApiError::MissingOperationLocation)?;
            info!(%operation, "read operation accepted");

            for attempt in 1..=options.max_polls {
                let response = check(
                    self.http
                        .get(&operation)
                        .header(KEY_HEADER, self.settings.key())
                        .send()?,
                )?;
                let state: ReadOperation = serde_json::from_str(&response.text()?)?;
                debug!(attempt, status = ?state.status, "polled read operation");

                match state.status {
                    OperationStatus::Succeeded => {
                        return Ok(state.analyze_result.unwrap_or_default().pages);
                    }
                    OperationStatus::Failed => {
                        let message = state
                            .error
                            .map(|e| e.message)
                            .filter(|m| !m.is_empty())
                            .unwrap_or_else(|| "no error details".to_string());
                        return Err(ApiError::OperationFailed(message));
                    }
                    OperationStatus::Unknown => {
                        warn!(attempt, "unrecognised read operation status");
                    }
                    OperationStatus::NotStarted | OperationStatus::Running => {}
                }
                if attempt < options.max_polls {
                    thread::sleep(options.poll_interval);
                }
            }

            Err(ApiError::PollExhausted(options.max_polls))
        }

        fn post_image(&self, url: &str, image: &[u8]) -> Result<Response, ApiError> {
            info!(%url, bytes = image.len(), "posting image");
            let response = self
                .http
                .post(url)
                .header(KEY_HEADER, self.settings.key())
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(image.to_vec())
                .send()?;
            check(response)
        }
    }

    fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        debug!(%status, "service responded");
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().unwrap_or_default();
        Err(status_error(status, &text))
    }

    fn status_error(status: StatusCode, text: &str) -> ApiError {
        let message = match serde_json::from_str::<ErrorEnvelope>(text) {
            Ok(envelope) if !envelope.error.code.is_empty() => {
                format!("({}) {}", envelope.error.code, envelope.error.message)
            }
            Ok(envelope) => envelope.error.message,
            Err(_) => text.trim().to_string(),
        };

        ApiError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message,
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::req::socket::{MockServer, Reply};

        fn client(url: &str) -> VisionClient {
            let settings = Settings::resolve(Some(url.to_string()), Some("test-key".into())).unwrap();
            let http = Client::builder().no_proxy().build().unwrap();
            VisionClient::with_http(settings, http)
        }

        #[test]
        fn analyze_posts_image_with_key_and_features() {
            let server = MockServer::bind().unwrap();
            let url = server.url();
            let handle = server.start(vec![Reply::json(
                200,
                r#"{"tagsResult": {"values": [{"name": "outdoor", "confidence": 0.99}]}}"#,
            )]);

            let result = client(&url)
                .analyze(b"fake-image", &[Feature::Caption, Feature::DenseCaptions])
                .unwrap();
            assert_eq!(result.tags()[0].name, "outdoor");

            let requests = handle.join().unwrap();
            assert_eq!(requests.len(), 1);
            let request = &requests[0];
            assert_eq!(request.method, "POST");
            assert_eq!(
                request.path,
                "/computervision/imageanalysis:analyze?api-version=2023-10-01&features=caption,denseCaptions"
            );
            assert_eq!(request.header("ocp-apim-subscription-key"), Some("test-key"));
            assert_eq!(request.header("content-type"), Some("application/octet-stream"));
            assert_eq!(request.body, b"fake-image");
        }

        #[test]
        fn non_success_status_carries_code_and_message() {
            let server = MockServer::bind().unwrap();
            let url = server.url();
            let handle = server.start(vec![Reply::json(
                401,
                r#"{"error": {"code": "401", "message": "Access denied due to invalid subscription key."}}"#,
            )]);

            let err = client(&url).analyze(b"img", &[Feature::Tags]).unwrap_err();
            handle.join().unwrap();

            assert!(matches!(err, ApiError::Status { status: 401, .. }));
            let shown = err.to_string();
            assert!(shown.contains("401"), "{shown}");
            assert!(shown.contains("Unauthorized"), "{shown}");
            assert!(shown.contains("invalid subscription key"), "{shown}");
        }

        #[test]
        fn plain_text_error_body_is_kept() {
            let server = MockServer::bind().unwrap();
            let url = server.url();
            let handle = server.start(vec![Reply::new(500, "text/plain", b"boom".to_vec())]);

            let err = client(&url)
                .segment(b"img", SegmentMode::BackgroundRemoval)
                .unwrap_err();
            handle.join().unwrap();

            match err {
                ApiError::Status { status, message, .. } => {
                    assert_eq!(status, 500);
                    assert_eq!(message, "boom");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn malformed_json_is_a_decode_error() {
            let server = MockServer::bind().unwrap();
            let url = server.url();
            let handle = server.start(vec![Reply::json(200, "not json")]);

            let err = client(&url).analyze(b"img", &[Feature::Objects]).unwrap_err();
            handle.join().unwrap();
            assert!(matches!(err, ApiError::Decode(_)));
        }

        #[test]
        fn segment_returns_raw_bytes() {
            let server = MockServer::bind().unwrap();
            let url = server.url();
            let png = vec![0x89, b'P', b'N', b'G', 1, 2, 3];
            let handle = server.start(vec![Reply::new(200, "image/png", png.clone())]);

            let bytes = client(&url)
                .segment(b"img", SegmentMode::ForegroundMatting)
                .unwrap();
            assert_eq!(bytes, png);

            let requests = handle.join().unwrap();
            assert_eq!(
                requests[0].path,
                "/computervision/imageanalysis:segment?api-version=2023-02-01-preview&mode=foregroundMatting"
            );
        }

        #[test]
        fn read_polls_until_succeeded() {
            let server = MockServer::bind().unwrap();
            let url = server.url();
            let operation = format!("{url}operations/42");
            let handle = server.start(vec![
                Reply::new(202, "application/json", Vec::new())
                    .with_header("Operation-Location", &operation),
                Reply::json(200, r#"{"status": "running"}"#),
                Reply::json(
                    200,
                    r#"{"status": "succeeded", "analyzeResult": {"pages": [
                        {"pageNumber": 1, "lines": [{"content": "Revenue"}, {"content": "2024"}]}
                    ]}}"#,
                ),
            ]);

            let options = ReadOptions {
                poll_interval: Duration::from_millis(1),
                max_polls: 5,
            };
            let pages = client(&url).read_text(b"img", options).unwrap();
            assert_eq!(pages.len(), 1);
            assert_eq!(pages[0].lines[1].content, "2024");

            let requests = handle.join().unwrap();
            assert_eq!(requests.len(), 3);
            assert_eq!(
                requests[0].path,
                "/formrecognizer/documentModels/prebuilt-read:analyze?api-version=2023-07-31"
            );
            assert_eq!(requests[1].method, "GET");
            assert_eq!(requests[1].path, "/operations/42");
            assert_eq!(requests[2].header("ocp-apim-subscription-key"), Some("test-key"));
        }

        #[test]
        fn read_reports_failed_operation() {
            let server = MockServer::bind().unwrap();
            let url = server.url();
            let operation = format!("{url}operations/7");
            let handle = server.start(vec![
                Reply::new(202, "application/json", Vec::new())
                    .with_header("Operation-Location", &operation),
                Reply::json(
                    200,
                    r#"{"status": "failed", "error": {"code": "InvalidImage", "message": "The file is corrupted."}}"#,
                ),
            ]);

            let err = client(&url)
                .read_text(b"img", ReadOptions { poll_interval: Duration::ZERO, max_polls: 3 })
                .unwrap_err();
            handle.join().unwrap();
            assert_eq!(err.to_string(), "read operation failed: The file is corrupted.");
        }

        #[test]
        fn read_gives_up_after_max_polls() {
            let server = MockServer::bind().unwrap();
            let url = server.url();
            let operation = format!("{url}operations/9");
            let handle = server.start(vec![
                Reply::new(202, "application/json", Vec::new())
                    .with_header("Operation-Location", &operation),
                Reply::json(200, r#"{"status": "notStarted"}"#),
                Reply::json(200, r#"{"status": "running"}"#),
            ]);

            let err = client(&url)
                .read_text(b"img", ReadOptions { poll_interval: Duration::ZERO, max_polls: 2 })
                .unwrap_err();
            handle.join().unwrap();
            assert!(matches!(err, ApiError::PollExhausted(2)));
        }

        #[test]
        fn read_without_operation_location_fails() {
            let server = MockServer::bind().unwrap();
            let url = server.url();
            let handle = server.start(vec![Reply::new(202, "application/json", Vec::new())]);

            let err = client(&url)
                .read_text(b"img", ReadOptions::default())
                .unwrap_err();
            handle.join().unwrap();
            assert!(matches!(err, ApiError::MissingOperationLocation));
        }

        #[test]
        fn last_poll_does_not_sleep() {
            let server = MockServer::bind().unwrap();
            let url = server.url();
            let operation = format!("{url}operations/3");
            let handle = server.start(vec![
                Reply::new(202, "application/json", Vec::new())
                    .with_header("Operation-Location", &operation),
                Reply::json(200, r#"{"status": "running"}"#),
            ]);

            let started = std::time::Instant::now();
            let err = client(&url)
                .read_text(
                    b"img",
                    ReadOptions { poll_interval: Duration::from_secs(10), max_polls: 1 },
                )
                .unwrap_err();
            handle.join().unwrap();

            assert!(matches!(err, ApiError::PollExhausted(1)));
            assert!(started.elapsed() < Duration::from_secs(5));
        }

        #[test]
        fn unreachable_endpoint_is_a_transport_error() {
            let url = MockServer::bind().unwrap().url();

            let err = client(&url).analyze(b"img", &[Feature::Tags]).unwrap_err();
            assert!(matches!(err, ApiError::Transport(_)), "{err}");
            assert!(err.to_string().starts_with("request failed:"), "{err}");
        }
    }
}
