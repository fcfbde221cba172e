//! GitLab REST client with bounded-concurrency batches.
//!
//! [`GitLabClient::execute`] performs one authenticated `GET` and turns every
//! outcome into either a decoded [`RemoteResponse`] or a tagged
//! [`RemoteFailure`]; it never panics and never returns a bare transport
//! error. [`GitLabClient::execute_many`] runs a batch of requests through a
//! per-batch semaphore and returns one slot per request, in submission
//! order, once every request in the batch has finished.
//!
//! # Authentication
//!
//! Every request carries the `PRIVATE-TOKEN` header and the configured
//! `User-Agent`. Both are installed as default headers when the client is
//! built.
//!
//! # Timeouts
//!
//! The connect timeout and total timeout from `[http]` apply to every call.
//! An expired call becomes [`RemoteFailure::Timeout`] and is not retried.

use anyhow::{Context, Result};
use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderValue, LINK, USER_AGENT};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::{Credentials, HttpConfig};
use crate::error::RemoteFailure;
use crate::excerpt::strip_markup;

/// Characters of an error body kept in [`RemoteFailure::Other`].
const ERROR_BODY_LIMIT: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    /// Relative to `<base>/api/v4/`.
    Path(String),
    /// Fully-qualified, e.g. a pagination link.
    Url(String),
}

/// Description of one outbound `GET`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    target: Target,
    query: Vec<(String, String)>,
}

impl RequestSpec {
    /// Request an API path such as `projects/42/issues`.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            target: Target::Path(path.into()),
            query: Vec::new(),
        }
    }

    /// Request an absolute URL as-is.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            target: Target::Url(url.into()),
            query: Vec::new(),
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Short label for log lines.
    pub fn describe(&self) -> &str {
        match &self.target {
            Target::Path(p) => p,
            Target::Url(u) => u,
        }
    }
}

/// A successful (2xx) response with its JSON body decoded.
#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: serde_json::Value,
    /// Target of the `rel="next"` entry of the `Link` header, if any.
    pub next_page: Option<String>,
}

impl RemoteResponse {
    /// Decode the body into a typed payload.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, RemoteFailure> {
        serde_json::from_value(self.body).map_err(|e| RemoteFailure::Decode(e.to_string()))
    }
}

/// Result slot produced for each request of a batch.
pub type RemoteResult = std::result::Result<RemoteResponse, RemoteFailure>;

/// Authenticated client bound to one GitLab instance.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: reqwest::Client,
    base_url: String,
}

impl GitLabClient {
    /// Build a client with auth headers and timeouts installed.
    pub fn new(credentials: &Credentials, http: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(&credentials.token)
            .context("GitLab API token contains characters not allowed in a header")?;
        token.set_sensitive(true);
        headers.insert("PRIVATE-TOKEN", token);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&http.user_agent).context("Invalid user agent")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http: client,
            base_url: credentials.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Instance base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether `url` points below this instance's base URL. Only such URLs
    /// may receive the token.
    pub fn is_own_url(&self, url: &str) -> bool {
        url.strip_prefix(self.base_url.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Fully-qualified URL for `spec`, excluding query parameters.
    pub fn url_for(&self, spec: &RequestSpec) -> String {
        match &spec.target {
            Target::Path(path) => {
                format!("{}/api/v4/{}", self.base_url, path.trim_start_matches('/'))
            }
            Target::Url(url) => url.clone(),
        }
    }

    /// Perform one request.
    pub async fn execute(&self, spec: &RequestSpec) -> RemoteResult {
        let url = self.url_for(spec);
        let result = self.send(&url, &spec.query).await;
        match &result {
            Ok(response) => {
                debug!(target_url = %url, status = response.status, "GitLab request ok")
            }
            Err(failure) => debug!(target_url = %url, %failure, "GitLab request failed"),
        }
        result
    }

    async fn send(&self, url: &str, query: &[(String, String)]) -> RemoteResult {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| RemoteFailure::from_reqwest(&e))?;

        let status = response.status().as_u16();
        let next_page = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_link);

        let text = response
            .text()
            .await
            .map_err(|e| RemoteFailure::from_reqwest(&e))?;

        if !(200..300).contains(&status) {
            return Err(RemoteFailure::from_status(status, truncate_body(&text)));
        }

        let body = serde_json::from_str(&text).map_err(|e| RemoteFailure::Decode(e.to_string()))?;

        Ok(RemoteResponse {
            status,
            body,
            next_page,
        })
    }

    /// Run `specs` with at most `limit` requests in flight.
    ///
    /// Returns exactly one slot per spec, in submission order. A failed
    /// request only fills its own slot; siblings keep running.
    pub async fn execute_many(&self, specs: &[RequestSpec], limit: usize) -> Vec<RemoteResult> {
        if specs.is_empty() {
            return Vec::new();
        }
        let limit = limit.max(1);
        debug!("Dispatching batch of {} requests (limit {})", specs.len(), limit);

        let semaphore = Semaphore::new(limit);
        let semaphore = &semaphore;
        let requests = specs.iter().map(|spec| async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return Err(RemoteFailure::Transport("request pool closed".to_string())),
            };
            self.execute(spec).await
        });

        let slots = join_all(requests).await;
        let failed = slots.iter().filter(|r| r.is_err()).count();
        debug!("Batch finished: {} ok, {} failed", slots.len() - failed, failed);
        slots
    }
}

/// Extract the `rel="next"` target from a `Link` header value.
pub fn next_page_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let (target, params) = entry.trim().split_once(';')?;
        let url = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        let is_next = params.split(';').any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        is_next.then(|| url.to_string())
    })
}

fn truncate_body(text: &str) -> String {
    strip_markup(text).chars().take(ERROR_BODY_LIMIT).collect()
}
