//! Shared HTTP plumbing for the third-party integrations (Telegram, GitHub,
//! Deepseek, FAL.AI).

use std::time::Duration;

use backon::ExponentialBuilder;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Error)]
pub enum IntegrationError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid credentials")]
    Unauthorized,
    #[error("json error: {0}")]
    Serde(String),
    #[error("{service} rejected the request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },
}

impl IntegrationError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

pub fn http_client() -> Result<Client, IntegrationError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("protagonizei/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| IntegrationError::Transport(e.to_string()))
}

pub fn retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(10))
        .with_max_times(3)
        .with_jitter()
}

pub fn map_reqwest_error(e: reqwest::Error) -> IntegrationError {
    if e.is_timeout() {
        IntegrationError::Timeout
    } else {
        IntegrationError::Transport(e.to_string())
    }
}

/// Turn a non-success status into the matching error, passing successful
/// responses through.
pub async fn check_status(res: Response) -> Result<Response, IntegrationError> {
    match res.status() {
        s if s.is_success() => Ok(res),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(IntegrationError::Unauthorized),
        StatusCode::TOO_MANY_REQUESTS => Err(IntegrationError::RateLimited),
        s => {
            let status = s.as_u16();
            let body = res.text().await.unwrap_or_default();
            Err(IntegrationError::Http { status, body })
        }
    }
}
