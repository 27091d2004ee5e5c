//! Process configuration, read once from the environment and handed to each
//! collaborator at construction.

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

const DEFAULT_FAL_BALANCE_URL: &str = "https://rest.alpha.fal.ai/billing/user_balance";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("invalid host address '{0}'")]
    InvalidHost(String),
    #[error("invalid url for {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        source: url::ParseError,
    },
    #[error("GITHUB_REPOSITORY must look like owner/repo, got '{0}'")]
    InvalidRepository(String),
}

/// Flat view of the environment, one field per variable.
#[derive(Debug, Deserialize)]
struct EnvConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_database_url")]
    database_url: String,
    auth_jwt_secret: Option<String>,
    #[serde(default)]
    debug_bypass_auth: bool,
    telegram_bot_token: Option<String>,
    telegram_chat_id: Option<String>,
    github_token: Option<String>,
    github_repository: Option<String>,
    #[serde(default = "default_dispatch_event")]
    github_dispatch_event: String,
    deepseek_api_key: Option<String>,
    fal_api_key: Option<String>,
    fal_balance_url: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "sqlite://protagonizei.db?mode=rwc".to_string()
}

fn default_dispatch_event() -> String {
    "deploy".to_string()
}

#[derive(Debug)]
pub struct AuthConfig {
    pub jwt_secret: Option<SecretString>,
    pub debug_bypass: bool,
}

#[derive(Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub chat_id: String,
}

#[derive(Debug)]
pub struct GithubConfig {
    pub token: SecretString,
    pub repository: String,
    pub dispatch_event: String,
}

#[derive(Debug)]
pub struct DeepseekConfig {
    pub api_key: SecretString,
}

#[derive(Debug)]
pub struct FalConfig {
    pub api_key: SecretString,
    pub balance_url: Url,
}

#[derive(Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub auth: AuthConfig,
    pub telegram: Option<TelegramConfig>,
    pub github: Option<GithubConfig>,
    pub deepseek: Option<DeepseekConfig>,
    pub fal: Option<FalConfig>,
}

impl Config {
    /// Load from the process environment. The binary merges `.env` into it
    /// before anything else runs.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self, ConfigError> {
        let env: EnvConfig = envy::from_iter(vars)?;

        let ip: IpAddr = env
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(env.host.clone()))?;

        let github = match (non_empty(env.github_token), non_empty(env.github_repository)) {
            (Some(token), Some(repository)) => {
                if !is_owner_repo(&repository) {
                    return Err(ConfigError::InvalidRepository(repository));
                }
                Some(GithubConfig {
                    token: SecretString::from(token),
                    repository,
                    dispatch_event: env.github_dispatch_event,
                })
            }
            _ => None,
        };

        let fal = match non_empty(env.fal_api_key) {
            Some(api_key) => {
                let raw = non_empty(env.fal_balance_url)
                    .unwrap_or_else(|| DEFAULT_FAL_BALANCE_URL.to_string());
                let balance_url = Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
                    key: "FAL_BALANCE_URL",
                    source,
                })?;
                Some(FalConfig {
                    api_key: SecretString::from(api_key),
                    balance_url,
                })
            }
            None => None,
        };

        let telegram = match (non_empty(env.telegram_bot_token), non_empty(env.telegram_chat_id)) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig {
                bot_token: SecretString::from(token),
                chat_id,
            }),
            _ => None,
        };

        Ok(Self {
            listen_addr: SocketAddr::new(ip, env.port),
            database_url: env.database_url,
            auth: AuthConfig {
                jwt_secret: non_empty(env.auth_jwt_secret).map(SecretString::from),
                debug_bypass: env.debug_bypass_auth,
            },
            telegram,
            github,
            deepseek: non_empty(env.deepseek_api_key).map(|api_key| DeepseekConfig {
                api_key: SecretString::from(api_key),
            }),
            fal,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_owner_repo(repository: &str) -> bool {
    matches!(
        repository.split_once('/'),
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/')
    )
}
