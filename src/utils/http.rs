// src/utils/http.rs

//! HTTP client utilities.
//!
//! Every outbound request goes through [`ResilientFetcher`], which owns the
//! single retry loop ([`with_retry`]) shared by page fetches, existence
//! probes, document downloads and geocoding queries.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, LAST_MODIFIED, RANGE};
use reqwest::{Client, Method, Response};

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &HttpConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Attempt budget and linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub delay_step: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            delay_step: Duration::from_millis(config.delay_step_ms),
        }
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            delay_step: Duration::ZERO,
        }
    }

    pub fn with_attempts(self, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..self
        }
    }

    /// Pause after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay + self.delay_step * attempt.saturating_sub(1)
    }
}

/// Run `op` until it succeeds or the attempt budget is spent.
///
/// `op` receives the 1-based attempt number. Any error counts as a failed
/// attempt; the final one is reported as [`AppError::RetryExhausted`].
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, url: &str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                log::debug!("Attempt {}/{} for {} failed: {}", attempt, attempts, url, e);
                last_error = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
            }
        }
    }

    Err(AppError::RetryExhausted {
        url: url.to_string(),
        attempts,
        last_error,
    })
}

/// Method, headers and body of one request.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: Vec<(HeaderName, String)>,
    pub body: Option<String>,
}

impl FetchOptions {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn head() -> Self {
        Self {
            method: Method::HEAD,
            ..Self::get()
        }
    }

    /// URL-encoded form POST.
    pub fn form(pairs: &[(&str, &str)]) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        Self {
            method: Method::POST,
            headers: vec![(
                CONTENT_TYPE,
                "application/x-www-form-urlencoded; charset=UTF-8".to_string(),
            )],
            body: Some(body),
        }
    }

    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// What an existence check learned about a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeInfo {
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
}

impl ProbeInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        };
        Self {
            last_modified: text(LAST_MODIFIED)
                .and_then(|s| DateTime::parse_from_rfc2822(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            content_type: text(CONTENT_TYPE),
        }
    }

    /// Soft-404 pages come back as HTML with a success status.
    pub fn looks_like_document(&self) -> bool {
        !self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.to_lowercase().contains("text/html"))
    }
}

/// HTTP client with a bounded retry loop around every request.
#[derive(Debug, Clone)]
pub struct ResilientFetcher {
    client: Client,
    policy: RetryPolicy,
    probe_attempts: u32,
}

impl ResilientFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            policy: RetryPolicy::from_config(config),
            probe_attempts: config.probe_attempts,
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send a request, retrying transport failures and non-success statuses.
    pub async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
        max_attempts: u32,
    ) -> Result<Response> {
        let policy = self.policy.with_attempts(max_attempts);
        with_retry(&policy, url, move |_| self.send_once(url, options)).await
    }

    /// Like [`fetch`](Self::fetch), but the body is decoded inside the retry
    /// loop so an unusable body counts as a failed attempt.
    pub async fn fetch_decoded<T, F>(
        &self,
        url: &str,
        options: &FetchOptions,
        max_attempts: u32,
        decode: F,
    ) -> Result<T>
    where
        F: Fn(&str, &str) -> Result<T> + Sync,
    {
        let policy = self.policy.with_attempts(max_attempts);
        let decode = &decode;
        with_retry(&policy, url, move |_| async move {
            let response = self.send_once(url, options).await?;
            let body = response.text().await?;
            decode(url, &body)
        })
        .await
    }

    /// GET a page as text; body read failures are retried too.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let options = &FetchOptions::get();
        with_retry(&self.policy, url, move |_| async move {
            let response = self.send_once(url, options).await?;
            Ok::<_, AppError>(response.text().await?)
        })
        .await
    }

    /// GET a document body.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let options = &FetchOptions::get();
        with_retry(&self.policy, url, move |_| async move {
            let response = self.send_once(url, options).await?;
            Ok::<_, AppError>(response.bytes().await?.to_vec())
        })
        .await
    }

    /// Check that a document exists without downloading it.
    ///
    /// Uses HEAD, falling back to a one-byte ranged GET when the server
    /// rejects HEAD. Returns `None` when the document is missing.
    pub async fn probe(&self, url: &str) -> Option<ProbeInfo> {
        let head = &FetchOptions::head();
        let ranged = &FetchOptions::get().header(RANGE, "bytes=0-0");
        let policy = self.policy.with_attempts(self.probe_attempts);

        let result = with_retry(&policy, url, move |_| async move {
            match self.send_once(url, head).await {
                Err(AppError::Status {
                    status: 405 | 501, ..
                }) => self.send_once(url, ranged).await,
                other => other,
            }
        })
        .await;

        match result {
            Ok(response) => {
                let info = ProbeInfo::from_headers(response.headers());
                if info.looks_like_document() {
                    Some(info)
                } else {
                    log::debug!("Probe {} returned an HTML page", url);
                    None
                }
            }
            Err(e) => {
                log::debug!("Probe miss: {}", e);
                None
            }
        }
    }

    async fn send_once(&self, url: &str, options: &FetchOptions) -> Result<Response> {
        let mut request = self.client.request(options.method.clone(), url);
        for (name, value) in &options.headers {
            request = request.header(name.clone(), value.as_str());
        }
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

/// The read-only web operations discovery and download need.
#[async_trait]
pub trait WebClient: Send + Sync {
    /// GET a page as text.
    async fn get_text(&self, url: &str) -> Result<String>;

    /// GET a document body.
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// Existence check; `None` when the document is missing.
    async fn probe(&self, url: &str) -> Option<ProbeInfo>;
}

#[async_trait]
impl WebClient for ResilientFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        ResilientFetcher::get_text(self, url).await
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        ResilientFetcher::get_bytes(self, url).await
    }

    async fn probe(&self, url: &str) -> Option<ProbeInfo> {
        ResilientFetcher::probe(self, url).await
    }
}
