use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    balance::BalanceService, config::Config, github_deploy::GithubDeployClient,
    notification::NotificationService,
};
use tracing::{info, warn};

struct Inner {
    config: Config,
    db: DBService,
    notification_service: NotificationService,
    balance_service: BalanceService,
    deploy_client: Option<GithubDeployClient>,
}

#[derive(Clone)]
pub struct LocalDeployment {
    inner: Arc<Inner>,
}

impl LocalDeployment {
    /// Connect to the configured database and build the integration clients.
    pub async fn from_config(config: Config) -> Result<Self, DeploymentError> {
        let db = DBService::new(&config.database_url).await?;
        Self::from_parts(config, db)
    }

    pub fn from_parts(config: Config, db: DBService) -> Result<Self, DeploymentError> {
        let notification_service = NotificationService::new(config.telegram.as_ref())?;
        let balance_service = BalanceService::new(config.deepseek.as_ref(), config.fal.as_ref())?;
        let deploy_client = config
            .github
            .as_ref()
            .map(GithubDeployClient::new)
            .transpose()?;

        if config.auth.debug_bypass {
            warn!("DEBUG_BYPASS_AUTH is set: protected endpoints accept unauthenticated requests");
        }
        info!(
            telegram = notification_service.is_configured(),
            github = deploy_client.is_some(),
            deepseek = config.deepseek.is_some(),
            fal = config.fal.is_some(),
            "Integrations configured"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                db,
                notification_service,
                balance_service,
                deploy_client,
            }),
        })
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Config::from_env()?;
        Self::from_config(config).await
    }

    fn config(&self) -> &Config {
        &self.inner.config
    }

    fn db(&self) -> &DBService {
        &self.inner.db
    }

    fn notification_service(&self) -> &NotificationService {
        &self.inner.notification_service
    }

    fn balance_service(&self) -> &BalanceService {
        &self.inner.balance_service
    }

    fn deploy_client(&self) -> Option<&GithubDeployClient> {
        self.inner.deploy_client.as_ref()
    }
}
