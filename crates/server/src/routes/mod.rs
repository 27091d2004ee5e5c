use axum::{
    Router,
    http::{Method, header},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::DeploymentImpl;

pub mod dashboard;
pub mod health;
pub mod integrations;
pub mod random_content;

pub fn router(deployment: DeploymentImpl) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let api_routes = Router::new()
        .merge(health::router(&deployment))
        .merge(dashboard::router(&deployment))
        .merge(random_content::router(&deployment))
        .merge(integrations::router(&deployment));

    Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}
