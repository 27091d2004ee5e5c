//! Site rebuilds and provider balances.

use axum::{
    Extension, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use deployment::Deployment;
use services::services::{
    balance::BalancesReport, github_deploy::DeployTriggered, integration_client::IntegrationError,
};
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::auth::{Caller, require_editor},
};

/// Trigger a site rebuild and notify the team
pub async fn trigger_deploy(
    State(deployment): State<DeploymentImpl>,
    Extension(caller): Extension<Caller>,
) -> Result<ResponseJson<ApiResponse<DeployTriggered>>, ApiError> {
    let client = deployment
        .deploy_client()
        .ok_or(IntegrationError::NotConfigured("github"))?;

    let reason = format!("Manual deploy requested by {}", caller.name());
    let triggered = client.trigger(&reason).await?;

    deployment
        .notification_service()
        .notify(
            "Deploy triggered",
            &format!("{} ({})", reason, triggered.repository),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(triggered)))
}

/// Current balances of the AI providers
pub async fn get_balances(
    State(deployment): State<DeploymentImpl>,
) -> ResponseJson<ApiResponse<BalancesReport>> {
    ResponseJson(ApiResponse::success(
        deployment.balance_service().fetch_all().await,
    ))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/integrations",
        Router::new()
            .route("/deploy", post(trigger_deploy))
            .route("/balances", get(get_balances))
            .route_layer(from_fn_with_state(deployment.clone(), require_editor)),
    )
}
