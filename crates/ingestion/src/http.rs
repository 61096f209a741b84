//! Shared HTTP plumbing for the source clients

use crate::resilience::{create_rate_limiter, RetryPolicy, SourceRateLimiter};
use citeset_common::config::FetchConfig;
use citeset_common::errors::{AppError, Result};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// Rate-limited JSON client for one source
pub(crate) struct ApiClient {
    source: &'static str,
    client: reqwest::Client,
    limiter: Arc<SourceRateLimiter>,
    retry: RetryPolicy,
}

impl ApiClient {
    pub(crate) fn new(source: &'static str, config: &FetchConfig, headers: HeaderMap) -> Result<Self> {
        let user_agent = match &config.mailto {
            Some(mailto) => format!("citeset/{} (mailto:{})", citeset_common::VERSION, mailto),
            None => format!("citeset/{}", citeset_common::VERSION),
        };

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            source,
            client,
            limiter: create_rate_limiter(config.requests_per_minute),
            retry: RetryPolicy::new(config.retry_budget()),
        })
    }

    #[cfg(test)]
    pub(crate) fn without_retries(mut self) -> Self {
        self.retry = RetryPolicy::none();
        self
    }

    /// GET `url` and decode the JSON body
    ///
    /// `subject` names what was requested; it becomes the identifier of an
    /// `IdentifierNotFound` error on 404.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        subject: &str,
    ) -> Result<T> {
        self.retry
            .run(self.source, move || async move {
                self.limiter.until_ready().await;
                debug!(source = self.source, url = url, "GET");

                let response = self
                    .client
                    .get(url)
                    .query(query)
                    .send()
                    .await
                    .map_err(|e| classify_request_error(self.source, e))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(classify_status(self.source, status, subject, &body));
                }

                response.json::<T>().await.map_err(|e| AppError::Upstream {
                    source_name: self.source.to_string(),
                    message: format!("invalid response body: {}", e),
                })
            })
            .await
    }
}

/// Map a non-success HTTP status to an error
pub(crate) fn classify_status(source: &str, status: StatusCode, subject: &str, body: &str) -> AppError {
    let snippet: String = body.chars().take(200).collect();
    match status {
        StatusCode::NOT_FOUND => AppError::IdentifierNotFound {
            id: subject.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => AppError::TransientFetch {
            source_name: source.to_string(),
            message: format!("rate limited (HTTP {})", status.as_u16()),
        },
        s if s.is_server_error() => AppError::TransientFetch {
            source_name: source.to_string(),
            message: format!("HTTP {}: {}", s.as_u16(), snippet),
        },
        s => AppError::Upstream {
            source_name: source.to_string(),
            message: format!("HTTP {}: {}", s.as_u16(), snippet),
        },
    }
}

/// Map a transport error; timeouts and connection failures are transient
fn classify_request_error(source: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() || err.is_connect() {
        AppError::TransientFetch {
            source_name: source.to_string(),
            message: err.to_string(),
        }
    } else {
        AppError::HttpClient(err)
    }
}
