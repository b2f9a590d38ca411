// GitHub API HTTP client.
// Runs conditional GETs, honours cooldowns and rate limits, and classifies every response.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, AUTHORIZATION, ETAG, HeaderMap, HeaderValue, IF_NONE_MATCH, LINK, RETRY_AFTER},
};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::error::{RepoBarError, Result};

use super::request_state::RequestState;
use super::types::RateLimitSnapshot;

pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_API_HOST: &str = "api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("repobar/", env!("CARGO_PKG_VERSION"));

/// Delay before retrying a 202 response that carried no Retry-After.
pub const STILL_COMPUTING_DELAY: Duration = Duration::seconds(90);
/// Delay before retrying a rate-limited request that carried no reset hint.
pub const RATE_LIMIT_FALLBACK: Duration = Duration::seconds(60);

/// Source of the bearer token used for every request.
pub trait TokenProvider: Send + Sync + fmt::Debug {
    fn bearer_token(&self) -> Option<String>;
}

/// Token provider backed by a fixed token.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone()).filter(|t| !t.is_empty())
    }
}

/// A completed response accepted by the runner.
///
/// For a 304 the body is the one cached alongside the matching ETag.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == StatusCode::NOT_MODIFIED
    }
}

/// GitHub API client with ETag caching, cooldown and rate limit tracking.
///
/// Cloning is cheap; clones share the same [`RequestState`].
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
    state: Arc<RequestState>,
}

impl GitHubClient {
    /// Create a client against `base_url` (api.github.com or an Enterprise `/api/v3` root).
    pub fn new(
        base_url: &str,
        tokens: Arc<dyn TokenProvider>,
        state: Arc<RequestState>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RepoBarError::Other(format!("Invalid API base URL {base_url}: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            tokens,
            state,
        })
    }

    /// Host used to namespace on-disk caches.
    pub fn api_host(&self) -> &str {
        self.base_url.host_str().unwrap_or(DEFAULT_API_HOST)
    }

    pub fn state(&self) -> &Arc<RequestState> {
        &self.state
    }

    /// Build an API URL from path segments and query pairs.
    pub fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url.to_string()
    }

    /// Make a conditional GET request.
    ///
    /// 2xx responses are accepted, as is any status listed in `allowed`. Everything else
    /// is classified into rate-limited, still-computing or bad-status errors.
    pub async fn get(&self, url: &str, allowed: &[StatusCode]) -> Result<ApiResponse> {
        let now = Utc::now();
        if let Some(until) = self.state.rate_limit_reset(now) {
            debug!(url, %until, "skipping request while rate limited");
            return Err(RepoBarError::rate_limited(until));
        }
        if let Some(until) = self.state.cooldown(url, now) {
            debug!(url, %until, "skipping request during cooldown");
            return Err(RepoBarError::still_computing(until));
        }

        let token = self
            .tokens
            .bearer_token()
            .ok_or(RepoBarError::MissingToken)?;
        let authorization = bearer_header(&token)?;
        let cached = self.state.cached_response(url);

        let mut request = self.client.get(url).header(AUTHORIZATION, authorization);
        if let Some(cached) = &cached {
            request = request.header(IF_NONE_MATCH, cached.etag.as_str());
        }
        let response = request.send().await?;

        let status = response.status();
        let mut headers = response.headers().clone();
        let now = Utc::now();
        if let Some(snapshot) = rate_limit_snapshot(&headers, now) {
            self.state.record_snapshot(snapshot);
        }
        let remaining = header_u64(&headers, "x-ratelimit-remaining");

        match status {
            StatusCode::NOT_MODIFIED => {
                let Some(cached) = cached else {
                    return Err(RepoBarError::BadStatus {
                        code: status.as_u16(),
                        message: "Not Modified without a cached response".to_string(),
                    });
                };
                debug!(url, "not modified, reusing cached body");
                if !headers.contains_key(LINK) {
                    if let Some(value) = cached
                        .link
                        .as_deref()
                        .and_then(|link| HeaderValue::from_str(link).ok())
                    {
                        headers.insert(LINK, value);
                    }
                }
                self.state.clear_rate_limit_if_recovered(remaining, now);
                Ok(ApiResponse {
                    status,
                    headers,
                    body: cached.body,
                })
            }
            StatusCode::ACCEPTED => {
                let retry_after =
                    now + header_seconds(&headers, RETRY_AFTER).unwrap_or(STILL_COMPUTING_DELAY);
                info!(url, %retry_after, "GitHub is still computing, cooling down");
                self.state.set_cooldown(url, retry_after);
                Err(RepoBarError::still_computing(retry_after))
            }
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
                if remaining.is_none_or(|r| r == 0) =>
            {
                let reset = header_u64(&headers, "x-ratelimit-reset")
                    .and_then(epoch_to_datetime)
                    .or_else(|| header_seconds(&headers, RETRY_AFTER).map(|d| now + d))
                    .unwrap_or(now + RATE_LIMIT_FALLBACK);
                let error = RepoBarError::rate_limited(reset);
                info!(url, %reset, "rate limit exhausted");
                self.state.set_rate_limited(url, reset, &error.to_string());
                Err(error)
            }
            status if status.is_success() || allowed.contains(&status) => {
                let body = response.bytes().await?;
                let etag = header_str(&headers, ETAG).filter(|_| status.is_success());
                if let Some(etag) = etag {
                    let link = header_str(&headers, LINK).map(str::to_string);
                    self.state
                        .store_response(url, etag.to_string(), body.clone(), link);
                }
                self.state.clear_rate_limit_if_recovered(remaining, now);
                Ok(ApiResponse {
                    status,
                    headers,
                    body,
                })
            }
            status => {
                let body = response.bytes().await.unwrap_or_default();
                Err(RepoBarError::BadStatus {
                    code: status.as_u16(),
                    message: error_message(status, &body),
                })
            }
        }
    }
}

/// GitHub error bodies look like `{"message": "..."}`.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected status")
                .to_string()
        })
}

/// `Authorization` value for `token`, marked sensitive so it never shows up in debug output.
fn bearer_header(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| RepoBarError::InvalidHeader(format!("authorization: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Unix seconds to a timestamp; values beyond the representable range are `None`.
fn epoch_to_datetime(epoch: u64) -> Option<DateTime<Utc>> {
    i64::try_from(epoch)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl reqwest::header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    header_str(headers, name).and_then(|v| v.parse().ok())
}

fn header_seconds(headers: &HeaderMap, name: impl reqwest::header::AsHeaderName) -> Option<Duration> {
    header_str(headers, name)
        .and_then(|v| v.parse::<i64>().ok())
        .map(Duration::seconds)
}

/// Rate limit usage from response headers, if the server sent any.
fn rate_limit_snapshot(headers: &HeaderMap, now: DateTime<Utc>) -> Option<RateLimitSnapshot> {
    let snapshot = RateLimitSnapshot {
        limit: header_u64(headers, "x-ratelimit-limit"),
        remaining: header_u64(headers, "x-ratelimit-remaining"),
        used: header_u64(headers, "x-ratelimit-used"),
        reset_at: header_u64(headers, "x-ratelimit-reset").and_then(epoch_to_datetime),
        resource: header_str(headers, "x-ratelimit-resource").map(str::to_string),
        observed_at: now,
    };

    if snapshot.limit.is_none() && snapshot.remaining.is_none() && snapshot.reset_at.is_none() {
        None
    } else {
        Some(snapshot)
    }
}
