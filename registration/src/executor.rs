use crate::config::RetryPolicy;
use crate::errors::ApiError;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Url};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::sleep;

/// A single outbound call, replayable across attempts.
#[derive(Clone, Debug)]
pub struct RequestSpec {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl RequestSpec {
    pub fn get(url: Url) -> Self {
        RequestSpec {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn post_json(url: Url, body: serde_json::Value) -> Self {
        RequestSpec {
            method: Method::POST,
            url,
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }
}

/// Status and undecoded body of a response. The API sometimes answers with
/// HTML error pages, so interpretation is left to the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Sends requests to the email-marketing API, retrying transport failures and
/// throttling with linear backoff.
///
/// Clones share one lane: at most one request is on the wire at any time
/// across the whole process, including the background worker.
#[derive(Clone)]
pub struct RequestExecutor {
    client: reqwest::Client,
    policy: RetryPolicy,
    lane: Arc<Semaphore>,
}

impl RequestExecutor {
    pub fn new(client: reqwest::Client, policy: RetryPolicy) -> Self {
        RequestExecutor {
            client,
            policy,
            lane: Arc::new(Semaphore::new(1)),
        }
    }

    /// Executes `spec` with retries.
    ///
    /// Transport failures on the last attempt surface as `ApiError::Network`.
    /// A 429 on the last attempt is returned as a response, not an error.
    pub async fn execute(&self, spec: &RequestSpec) -> Result<RawResponse, ApiError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.send_once(spec).await {
                Ok(response) if response.status == StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= max_attempts {
                        tracing::warn!(
                            path = spec.url.path(),
                            attempt,
                            "still throttled, giving up"
                        );
                        return Ok(response);
                    }
                    let delay = self.policy.throttle_backoff(attempt);
                    tracing::warn!(
                        path = spec.url.path(),
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "throttled by API, backing off"
                    );
                    sleep(delay).await;
                }
                Ok(response) => return Ok(response),
                Err(source) => {
                    if attempt >= max_attempts {
                        return Err(ApiError::Network {
                            attempts: attempt,
                            source,
                        });
                    }
                    let delay = self.policy.transport_backoff(attempt);
                    tracing::warn!(
                        path = spec.url.path(),
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "request failed: {source}, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    // The URL carries the credential in its query. Only the path is logged and
    // transport errors are stripped of the URL before they leave this function.
    async fn send_once(&self, spec: &RequestSpec) -> Result<RawResponse, reqwest::Error> {
        // The lane is never closed, so acquire cannot fail.
        let _permit = self.lane.acquire().await.ok();

        let mut request = self
            .client
            .request(spec.method.clone(), spec.url.clone())
            .headers(spec.headers.clone());
        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(reqwest::Error::without_url)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(reqwest::Error::without_url)?;

        tracing::debug!(method = %spec.method, path = spec.url.path(), %status, "API call finished");

        Ok(RawResponse { status, body })
    }
}
