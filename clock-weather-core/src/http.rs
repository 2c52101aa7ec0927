//! GET-and-parse-JSON client with bounded retries.
//!
//! Retried:
//! - 429 and 500/502/503/504 responses
//! - network failures with no HTTP response: refused or dropped
//!   connections, timeouts, bodies cut off mid-read
//!
//! Everything else (other non-200 statuses, undecodable bodies) fails on the
//! first attempt.

use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use serde_json::Value;
use tokio_retry::{RetryIf, strategy::ExponentialBackoff};
use tracing::{debug, error, warn};

use crate::error::FetchError;

pub const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

pub const DEFAULT_MAX_ATTEMPTS: usize = 5;
pub const DEFAULT_BACKOFF_FACTOR: u64 = 2;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = concat!(
    "clock-weather/",
    env!("CARGO_PKG_VERSION"),
    " (desktop clock dashboard)"
);

/// Backoff schedule for [`RetryClient`].
///
/// The delay before retry `n` (starting at 1) is
/// `backoff_unit * backoff_factor^n`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    pub backoff_factor: u64,
    pub backoff_unit: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            backoff_unit: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget, delays scaled down to milliseconds. Handy in tests.
    pub fn fast() -> Self {
        Self {
            backoff_unit: Duration::from_millis(1),
            max_delay: Duration::from_millis(50),
            ..Self::default()
        }
    }

    /// Delays slept between attempts; yields `max_attempts - 1` items.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let unit_ms = u64::try_from(self.backoff_unit.as_millis()).unwrap_or(u64::MAX);
        ExponentialBackoff::from_millis(self.backoff_factor.max(1))
            .factor(unit_ms)
            .max_delay(self.max_delay)
            .take(self.max_attempts.saturating_sub(1))
    }

    /// Worst-case time spent sleeping before the call gives up.
    pub fn total_backoff(&self) -> Duration {
        self.delays().sum()
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    RETRY_STATUSES.contains(&status.as_u16())
}

/// Whether another attempt may succeed where this one failed.
pub fn is_transient(err: &FetchError) -> bool {
    match err {
        FetchError::Status { status, .. } => is_retryable_status(*status),
        FetchError::Network { source, .. } => {
            source.is_connect() || source.is_timeout() || source.is_request() || source.is_body()
        }
        FetchError::Decode { .. } | FetchError::Client(_) => false,
    }
}

#[derive(Debug, Clone)]
pub struct RetryClient {
    http: Client,
    policy: RetryPolicy,
}

impl RetryClient {
    pub fn new(user_agent: &str, timeout: Duration, policy: RetryPolicy) -> Result<Self, FetchError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/geo+json, application/json"),
        );

        let http = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { http, policy })
    }

    /// GET `url` and parse the body as JSON, retrying transient failures.
    pub async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0usize;

        let result = RetryIf::spawn(
            self.policy.delays(),
            || {
                attempt += 1;
                let n = attempt;
                async move {
                    let outcome = self.get_once(url).await;
                    if let Err(e) = &outcome {
                        if is_transient(e) && n < max_attempts {
                            warn!(url, attempt = n, max_attempts, error = %e, "transient failure, retrying");
                        }
                    }
                    outcome
                }
            },
            is_transient,
        )
        .await;

        if let Err(e) = &result {
            error!(url, attempts = attempt, error = %e, "GET failed");
        }
        result
    }

    async fn get_once(&self, url: &str) -> Result<Value, FetchError> {
        debug!(url, "GET");

        let res = self.http.get(url).send().await.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;

        let status = res.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        let body = res.bytes().await.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;

        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
