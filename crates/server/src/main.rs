use anyhow::Context;
use deployment::Deployment;
use server::{DeploymentImpl, routes};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be merged before the log filter and the config read the environment
    dotenvy::dotenv().ok();
    utils::logging::init_tracing("info,server=debug,services=debug,sqlx=warn");

    let deployment = DeploymentImpl::new()
        .await
        .context("failed to initialise deployment")?;
    let addr = deployment.config().listen_addr;

    let app = routes::router(deployment);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server running on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
