//! Executes one bounded HTTP request against a target and classifies the outcome.
//!
//! The prober never fails: timeouts, transport errors and bad configuration all come
//! back as a failed [`HealthCheckResult`] carrying the time spent until the failure.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Url};
use std::time::{Duration, Instant};
use tracing::{error, warn};

use crate::db::models::{HealthCheckResult, Target, MAX_RESPONSE_BODY_CHARS, TRUNCATION_MARKER};

pub const TIMEOUT_MESSAGE: &str = "Request timeout";
const DEFAULT_BODY_CONTENT_TYPE: &str = "application/json";

#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &Target, timeout: Duration) -> HealthCheckResult;
}

pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pulse-monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build_request(&self, target: &Target) -> Result<RequestBuilder, String> {
        let method = Method::from_bytes(target.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| format!("Invalid HTTP method: {}", target.method))?;
        let url = Url::parse(&target.url)
            .map_err(|e| format!("Invalid URL '{}': {e}", target.url))?;

        let mut headers = HeaderMap::new();
        let mut body_content_type = None;
        if let Some(configured) = &target.headers {
            for (key, value) in configured {
                // Content-Type travels with the body instead.
                if key.eq_ignore_ascii_case("content-type") {
                    body_content_type = Some(value.as_str());
                    continue;
                }
                match (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    (Ok(name), Ok(value)) => {
                        headers.append(name, value);
                    }
                    _ => {
                        warn!(target_id = target.id, header = %key, "Failed to add header. Skipping it.");
                    }
                }
            }
        }

        let mut request = self.client.request(method.clone(), url).headers(headers);

        if let Some(body) = target.body.as_deref().filter(|b| !b.is_empty()) {
            if sends_body(&method) {
                let content_type = body_content_type
                    .and_then(|ct| HeaderValue::from_str(ct).ok())
                    .unwrap_or(HeaderValue::from_static(DEFAULT_BODY_CONTENT_TYPE));
                request = request
                    .header(CONTENT_TYPE, content_type)
                    .body(body.to_owned());
            }
        }

        Ok(request)
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &Target, timeout: Duration) -> HealthCheckResult {
        let prepared_at = Instant::now();
        let request = match self.build_request(target) {
            Ok(request) => request,
            Err(message) => {
                error!(target_id = target.id, target_name = %target.name, error = %message, "Error preparing probe request.");
                return HealthCheckResult::failure(elapsed_ms(prepared_at), message);
            }
        };

        let started = Instant::now();
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = match response.text().await {
                Ok(text) => truncate_body(text),
                Err(e) => {
                    warn!(target_id = target.id, error = %e, "Failed to read response body.");
                    String::new()
                }
            };
            Ok::<_, reqwest::Error>((status, body, elapsed_ms(started)))
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok((status, body, latency_ms))) => {
                let status_code = status.as_u16();
                HealthCheckResult {
                    is_success: (200..400).contains(&status_code),
                    status_code,
                    latency_ms,
                    response_body: Some(body),
                    error_message: None,
                }
            }
            Ok(Err(e)) if e.is_timeout() => {
                HealthCheckResult::failure(elapsed_ms(started), TIMEOUT_MESSAGE)
            }
            Ok(Err(e)) => HealthCheckResult::failure(elapsed_ms(started), describe_error(&e)),
            Err(_) => HealthCheckResult::failure(elapsed_ms(started), TIMEOUT_MESSAGE),
        }
    }
}

fn sends_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

fn elapsed_ms(since: Instant) -> i64 {
    i64::try_from(since.elapsed().as_millis()).unwrap_or(i64::MAX)
}

/// Caps a body at [`MAX_RESPONSE_BODY_CHARS`] characters, marking the cut.
pub fn truncate_body(mut body: String) -> String {
    if let Some((cut, _)) = body.char_indices().nth(MAX_RESPONSE_BODY_CHARS) {
        body.truncate(cut);
        body.push_str(TRUNCATION_MARKER);
    }
    body
}

/// reqwest's top-level message is terse; the source chain names the real cause
/// (DNS failure, refused connection, TLS alert).
fn describe_error(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
