//! Site checks.
//!
//! One check is a single HTTP GET followed, when configured, by a certificate
//! inspection and a keyword scan. The first failing layer decides the verdict:
//!
//! 1. transport: request could not complete (`timeout`, `no_response`)
//! 2. protocol: status differs from the expected code (`wrong_code`)
//! 3. trust: certificate expired or issued for another host
//! 4. content: a configured keyword is missing from the body
//!
//! Every outcome is returned as a [`CheckResult`]; nothing here returns `Err`.

mod keywords;
mod retry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info};

use crate::config::{Defaults, Site, DEFAULT_HTTPS_PORT};
use crate::error_handling::CheckErrorKind;
use crate::time_utils::Clock;
use crate::tls::check_ssl;

pub use keywords::{check_keywords, KeywordCheckResult};
pub use retry::run_with_retry;

/// Verdict of one check attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub error: Option<String>,
    pub error_kind: Option<CheckErrorKind>,
    /// Page body, kept only when a keyword was missing.
    pub body: Option<String>,
}

impl CheckResult {
    pub fn ok(status_code: u16, response_time_ms: u64) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            response_time_ms: Some(response_time_ms),
            ..Default::default()
        }
    }

    pub fn failed(kind: CheckErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            error_kind: Some(kind),
            ..Default::default()
        }
    }

    fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    fn with_response_time(mut self, response_time_ms: u64) -> Self {
        self.response_time_ms = Some(response_time_ms);
        self
    }

    /// One-line description for logs and operator summaries.
    pub fn summary(&self) -> String {
        let code = self
            .status_code
            .map(|c| format!(" ({c})"))
            .unwrap_or_default();
        match &self.error {
            Some(error) if !self.success => format!("{code} - {error}"),
            _ => code,
        }
    }
}

/// Something that can judge a site once.
#[async_trait]
pub trait SiteProbe: Send + Sync {
    async fn check(&self, site: &Site, defaults: &Defaults) -> CheckResult;
}

/// The HTTP + TLS + keyword checker.
pub struct HttpChecker {
    client: Arc<reqwest::Client>,
    clock: Arc<dyn Clock>,
}

impl HttpChecker {
    pub fn new(client: Arc<reqwest::Client>, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock }
    }
}

#[async_trait]
impl SiteProbe for HttpChecker {
    async fn check(&self, site: &Site, defaults: &Defaults) -> CheckResult {
        let start = Instant::now();
        let elapsed_ms = |start: Instant| start.elapsed().as_millis() as u64;

        let response = match self
            .client
            .get(&site.url)
            .timeout(Duration::from_secs(defaults.timeout_seconds))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return transport_failure(&e).with_response_time(elapsed_ms(start)),
        };
        let response_time_ms = elapsed_ms(start);
        let status_code = response.status().as_u16();
        let final_url = response.url().clone();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return transport_failure(&e)
                    .with_status(status_code)
                    .with_response_time(response_time_ms)
            }
        };

        if site.check_http_code && status_code != site.expected_code {
            return CheckResult::failed(
                CheckErrorKind::WrongCode,
                format!(
                    "Wrong HTTP code: {status_code}, expected: {}",
                    site.expected_code
                ),
            )
            .with_status(status_code)
            .with_response_time(response_time_ms);
        }

        if site.check_ssl {
            if let Some((host, port)) = https_target(&site.url) {
                let ssl = check_ssl(&host, port, self.clock.now()).await;
                if !ssl.valid {
                    let kind = ssl.error_kind.unwrap_or(CheckErrorKind::SslExpired);
                    let error = ssl
                        .error
                        .unwrap_or_else(|| "SSL check failed".to_string());
                    return CheckResult::failed(kind, error)
                        .with_status(status_code)
                        .with_response_time(response_time_ms);
                }
                debug!(
                    "[{}] certificate valid for {} more days",
                    site.id,
                    ssl.days_until_expiry.unwrap_or_default()
                );
            }
        }

        if !site.keywords.is_empty() {
            let keywords = check_keywords(&body, &site.keywords);
            if !keywords.found {
                let missing = keywords.missing_keyword.unwrap_or_default();
                let error = if keywords.found_keywords.is_empty() {
                    format!("Keyword missing: {missing}")
                } else {
                    format!(
                        "Keyword missing: {missing} (found: {})",
                        keywords.found_keywords.join(", ")
                    )
                };
                info!("[{}] keyword check failed at {final_url}", site.id);
                return CheckResult {
                    body: Some(body),
                    ..CheckResult::failed(CheckErrorKind::KeywordMissing, error)
                        .with_status(status_code)
                        .with_response_time(response_time_ms)
                };
            }
        }

        CheckResult::ok(status_code, response_time_ms)
    }
}

/// Maps a request/body error onto the transport taxonomy.
fn transport_failure(error: &reqwest::Error) -> CheckResult {
    if error.is_timeout() {
        CheckResult::failed(CheckErrorKind::Timeout, "Timeout")
    } else if error.is_connect() {
        CheckResult::failed(
            CheckErrorKind::NoResponse,
            format!("Connection error: {error}"),
        )
    } else {
        CheckResult::failed(CheckErrorKind::NoResponse, format!("Client error: {error}"))
    }
}

/// Host and port to inspect, for `https` URLs only.
fn https_target(raw_url: &str) -> Option<(String, u16)> {
    let url = url::Url::parse(raw_url).ok()?;
    if url.scheme() != "https" {
        return None;
    }
    let host = url.host_str()?.to_string();
    Some((host, url.port().unwrap_or(DEFAULT_HTTPS_PORT)))
}
