pub mod balance;
pub mod config;
pub mod github_deploy;
pub mod integration_client;
pub mod notification;
pub mod rotating_selector;
pub mod stats;
