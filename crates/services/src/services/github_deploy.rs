//! Triggers a frontend rebuild through GitHub's `repository_dispatch` API.

use backon::Retryable;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use ts_rs::TS;

use super::{
    config::GithubConfig,
    integration_client::{IntegrationError, check_status, http_client, map_reqwest_error, retry_policy},
};

const GITHUB_API_URL: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";

#[derive(Debug, Serialize)]
struct DispatchRequest<'a> {
    event_type: &'a str,
    client_payload: DispatchPayload<'a>,
}

#[derive(Debug, Serialize)]
struct DispatchPayload<'a> {
    reason: &'a str,
    triggered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DeployTriggered {
    pub repository: String,
    pub event_type: String,
    pub triggered_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct GithubDeployClient {
    http: Client,
    token: SecretString,
    repository: String,
    event_type: String,
}

impl GithubDeployClient {
    pub fn new(config: &GithubConfig) -> Result<Self, IntegrationError> {
        Ok(Self {
            http: http_client()?,
            token: SecretString::from(config.token.expose_secret().to_owned()),
            repository: config.repository.clone(),
            event_type: config.dispatch_event.clone(),
        })
    }

    pub fn dispatch_url(&self) -> String {
        format!("{GITHUB_API_URL}/repos/{}/dispatches", self.repository)
    }

    pub async fn trigger(&self, reason: &str) -> Result<DeployTriggered, IntegrationError> {
        let triggered_at = Utc::now();
        let request = DispatchRequest {
            event_type: &self.event_type,
            client_payload: DispatchPayload {
                reason,
                triggered_at,
            },
        };

        (|| async { self.send_dispatch(&request).await })
            .retry(retry_policy())
            .when(|e: &IntegrationError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "GitHub dispatch failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await?;

        info!(
            repository = %self.repository,
            event_type = %self.event_type,
            reason,
            "Deploy triggered"
        );

        Ok(DeployTriggered {
            repository: self.repository.clone(),
            event_type: self.event_type.clone(),
            triggered_at,
        })
    }

    async fn send_dispatch(&self, request: &DispatchRequest<'_>) -> Result<(), IntegrationError> {
        let res = self
            .http
            .post(self.dispatch_url())
            .bearer_auth(self.token.expose_secret())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        // GitHub answers 204 No Content on success
        check_status(res).await?;
        Ok(())
    }
}
