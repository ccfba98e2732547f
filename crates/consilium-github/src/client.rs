use std::time::Duration;

use chrono::Utc;
use consilium_reconcile::{RetryPolicy, TransientApiError};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::errors::GitHubError;

/// Public GitHub REST endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const AGENT: &str = concat!("consilium/", env!("CARGO_PKG_VERSION"));
/// Largest page GitHub serves.
pub const PAGE_SIZE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Wait assumed when a secondary limit gives no reset hint.
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Authenticated, retrying GitHub REST client.
pub struct GitHubClient {
    http: Client,
    api_base_url: String,
    token: String,
    retry: RetryPolicy,
}

impl GitHubClient {
    /// Client for api.github.com.
    pub fn new(token: impl Into<String>) -> Result<Self, GitHubError> {
        Self::with_api_base_url(token, DEFAULT_API_BASE_URL)
    }

    /// Client for an explicit API base URL (GitHub Enterprise, test servers).
    pub fn with_api_base_url(
        token: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Result<Self, GitHubError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(GitHubError::InvalidInput {
                field: "token".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        let api_base_url = api_base_url.into();
        if api_base_url.trim().is_empty() {
            return Err(GitHubError::InvalidInput {
                field: "api_base_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| TransientApiError::Network(error.to_string()))?;

        Ok(Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            token,
            retry: RetryPolicy::default(),
        })
    }

    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Retry policy in use.
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    /// GET `path` and decode the body, retrying transient failures.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TransientApiError> {
        self.retry
            .run(path, || self.send(self.http.get(self.url(path)).query(query)))
    }

    /// GET every page of a list endpoint.
    pub fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, TransientApiError> {
        let mut items = Vec::new();
        for page in 1.. {
            let mut params = query.to_vec();
            params.push(("per_page", PAGE_SIZE.to_string()));
            params.push(("page", page.to_string()));
            let batch: Vec<T> = self.get_json(path, &params)?;
            let full = batch.len() >= PAGE_SIZE;
            debug!(path, page, items = batch.len(), "fetched page");
            items.extend(batch);
            if !full {
                break;
            }
        }
        Ok(items)
    }

    /// POST a JSON body once and decode the response.
    ///
    /// Not retried here: a timed-out POST may still have landed, so the
    /// caller decides whether another attempt is safe.
    pub fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TransientApiError> {
        self.send(self.http.post(self.url(path)).json(body))
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TransientApiError> {
        let response = request
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let limit = RateLimit::from_headers(response.headers());
            let message = response
                .text()
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(classify_status(
                status.as_u16(),
                &limit,
                Utc::now().timestamp(),
                message,
            ));
        }
        response
            .json()
            .map_err(|error| TransientApiError::Decode(error.to_string()))
    }
}

fn transport_error(error: reqwest::Error) -> TransientApiError {
    if error.is_timeout() {
        TransientApiError::Timeout(error.to_string())
    } else if error.is_decode() {
        TransientApiError::Decode(error.to_string())
    } else {
        TransientApiError::Network(error.to_string())
    }
}

/// Rate-limit headers of a failed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimit {
    /// `X-RateLimit-Remaining`.
    pub remaining: Option<u64>,
    /// `X-RateLimit-Reset`, unix seconds.
    pub reset_at: Option<i64>,
    /// `Retry-After`, seconds.
    pub retry_after: Option<u64>,
}

impl RateLimit {
    fn from_headers(headers: &HeaderMap) -> Self {
        fn number<N: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<N> {
            headers.get(name)?.to_str().ok()?.trim().parse().ok()
        }
        Self {
            remaining: number(headers, "x-ratelimit-remaining"),
            reset_at: number(headers, "x-ratelimit-reset"),
            retry_after: number(headers, "retry-after"),
        }
    }
}

/// Maps a non-success status to the retry taxonomy.
///
/// A 403 or 429 is a rate limit when the quota is spent or the host asks
/// for a pause; the wait runs one second past the advertised reset.
pub fn classify_status(
    status: u16,
    limit: &RateLimit,
    now: i64,
    message: String,
) -> TransientApiError {
    let throttled = matches!(status, 403 | 429);
    if let (true, Some(secs)) = (throttled, limit.retry_after) {
        return TransientApiError::RateLimited {
            reset_in: Duration::from_secs(secs),
        };
    }
    if throttled && limit.remaining == Some(0) {
        let reset_in = match limit.reset_at {
            Some(reset_at) => Duration::from_secs((reset_at - now).max(0) as u64 + 1),
            None => DEFAULT_RATE_LIMIT_WAIT,
        };
        return TransientApiError::RateLimited { reset_in };
    }
    if status == 429 {
        return TransientApiError::RateLimited {
            reset_in: DEFAULT_RATE_LIMIT_WAIT,
        };
    }
    if (500..600).contains(&status) {
        return TransientApiError::Server { status, message };
    }
    TransientApiError::Rejected { status, message }
}
