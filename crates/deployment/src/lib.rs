use async_trait::async_trait;
use db::{DBService, DBServiceError};
use services::services::{
    balance::BalanceService,
    config::{Config, ConfigError},
    github_deploy::GithubDeployClient,
    integration_client::IntegrationError,
    notification::NotificationService,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] DBServiceError),
    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

/// Everything a request handler may reach: storage, configuration and the
/// outbound integrations.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Config;

    fn db(&self) -> &DBService;

    fn notification_service(&self) -> &NotificationService;

    fn balance_service(&self) -> &BalanceService;

    /// `None` when no GitHub repository is configured
    fn deploy_client(&self) -> Option<&GithubDeployClient>;
}
