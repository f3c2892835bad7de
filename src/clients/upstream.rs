use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::UpstreamConfig;
use crate::middleware::internal::INTERNAL_KEY_HEADER;
use crate::types::ServiceKind;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Cannot connect to {service} service after {attempts} attempts")]
    Unavailable { service: &'static str, attempts: u32 },

    #[error("{service} service did not respond in time")]
    Timeout { service: &'static str },

    #[error("{service} service rejected the request with status {status}")]
    Rejected { service: &'static str, status: u16 },

    #[error("{service} service returned unexpected status {status}")]
    UnexpectedStatus { service: &'static str, status: u16 },

    #[error("Invalid response from {service} service: {message}")]
    Decode { service: &'static str, message: String },

    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
}

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    pub fn allows_another(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// Sibling services answer with `{"success": true, "data": ...}`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

enum Failure {
    Retryable { timed_out: bool },
    Final(UpstreamError),
}

/// JSON client for one sibling service.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    service: ServiceKind,
    retry: RetryPolicy,
    internal_key: Option<String>,
}

impl UpstreamClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        service: ServiceKind,
        retry: RetryPolicy,
        internal_key: Option<String>,
    ) -> Result<Self, UpstreamError> {
        Url::parse(base_url).map_err(|e| UpstreamError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            service,
            retry,
            internal_key,
        })
    }

    pub fn url(&self, path: &str) -> Result<Url, UpstreamError> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw).map_err(|e| UpstreamError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    /// GET a JSON resource. `Ok(None)` when the sibling answers 404.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, UpstreamError> {
        let url = self.url(path)?;
        let service = self.service.display_name();
        let mut attempts = 0;
        let mut last_timed_out = false;

        while self.retry.allows_another(attempts) {
            attempts += 1;
            match self.attempt::<T>(url.clone()).await {
                Ok(value) => return Ok(value),
                Err(Failure::Final(err)) => return Err(err),
                Err(Failure::Retryable { timed_out }) => {
                    last_timed_out = timed_out;
                    if self.retry.allows_another(attempts) {
                        warn!(
                            "{} service attempt {}/{} failed for {}, retrying in {:?}",
                            service, attempts, self.retry.max_attempts, url, self.retry.delay
                        );
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }

        if last_timed_out {
            Err(UpstreamError::Timeout { service })
        } else {
            Err(UpstreamError::Unavailable { service, attempts })
        }
    }

    async fn attempt<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, Failure> {
        let service = self.service.display_name();
        let mut request = self.http.get(url);
        if let Some(key) = &self.internal_key {
            request = request.header(INTERNAL_KEY_HEADER, key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(Failure::Retryable { timed_out: true }),
            Err(e) => {
                debug!("{} service request error: {}", service, e);
                return Err(Failure::Retryable { timed_out: false });
            }
        };

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => response
                .json::<Envelope<T>>()
                .await
                .map(|envelope| Some(envelope.data))
                .map_err(|e| {
                    Failure::Final(UpstreamError::Decode {
                        service,
                        message: e.to_string(),
                    })
                }),
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                Err(Failure::Retryable { timed_out: false })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Failure::Final(UpstreamError::Rejected {
                service,
                status: status.as_u16(),
            })),
            _ => Err(Failure::Final(UpstreamError::UnexpectedStatus {
                service,
                status: status.as_u16(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str, attempts: u32) -> UpstreamClient {
        UpstreamClient::new(
            reqwest::Client::new(),
            base,
            ServiceKind::Projects,
            RetryPolicy {
                max_attempts: attempts,
                delay: Duration::from_millis(1),
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn retry_policy_counts_attempts() {
        let policy = RetryPolicy::from_config(&UpstreamConfig {
            max_attempts: 0,
            ..UpstreamConfig::default()
        });
        assert_eq!(policy.max_attempts, 1);
        assert!(policy.allows_another(0));
        assert!(!policy.allows_another(1));
    }

    #[test]
    fn joins_paths_without_double_slash() {
        let c = client("http://127.0.0.1:8003/", 1);
        assert_eq!(
            c.url("/internal/projects/7").unwrap().as_str(),
            "http://127.0.0.1:8003/internal/projects/7"
        );
    }

    #[test]
    fn rejects_bad_base_url() {
        let result = UpstreamClient::new(
            reqwest::Client::new(),
            "not a url",
            ServiceKind::Account,
            RetryPolicy {
                max_attempts: 1,
                delay: Duration::ZERO,
            },
            None,
        );
        assert!(matches!(result, Err(UpstreamError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn unreachable_service_exhausts_attempts() {
        // Port 9 (discard) is closed on loopback in any sane test environment
        let c = client("http://127.0.0.1:9", 3);
        let err = c.get_json::<serde_json::Value>("/health").await.unwrap_err();
        match err {
            UpstreamError::Unavailable { service, attempts } => {
                assert_eq!(service, "project");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            format!("{}", UpstreamError::Unavailable { service: "project", attempts: 6 }),
            "Cannot connect to project service after 6 attempts"
        );
    }
}
