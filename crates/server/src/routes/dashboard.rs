//! Order statistics for the editorial dashboard.

use axum::{
    Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use deployment::Deployment;
use services::services::stats::{DashboardStats, StatsQuery, StatsService};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::auth::require_editor};

/// Order statistics for the dashboard.
///
/// `start_date`/`end_date` (YYYY-MM-DD) and a comma-separated `status`
/// list narrow the orders; unparseable values are ignored.
pub async fn get_dashboard_stats(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<StatsQuery>,
) -> Result<ResponseJson<ApiResponse<DashboardStats>>, ApiError> {
    let stats = StatsService::dashboard_stats(&deployment.db().pool, query.into_filter()).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/dashboard/stats", get(get_dashboard_stats))
        .route_layer(from_fn_with_state(deployment.clone(), require_editor))
}
