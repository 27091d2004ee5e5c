//! Public endpoints handing out videos in rotation.

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::content::ContentPool;
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::rotating_selector::{RotatingSelector, Selection, VideoPostView};
use ts_rs::TS;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RandomVideoResponse {
    pub success: bool,
    pub reset_occurred: bool,
    pub data: VideoPostView,
}

#[derive(Debug, Default, Deserialize)]
pub struct SocialMediaQuery {
    pub tag: Option<String>,
}

/// 206 signals that the rotation was exhausted and started over with this pick.
fn respond(selection: Selection) -> (StatusCode, ResponseJson<RandomVideoResponse>) {
    let status = if selection.reset_occurred {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    (
        status,
        ResponseJson(RandomVideoResponse {
            success: true,
            reset_occurred: selection.reset_occurred,
            data: selection.post,
        }),
    )
}

/// Next video post of the blog rotation
pub async fn random_video_post(
    State(deployment): State<DeploymentImpl>,
) -> Result<(StatusCode, ResponseJson<RandomVideoResponse>), ApiError> {
    let selection = RotatingSelector::select(&deployment.db().pool, ContentPool::Post, None).await?;
    Ok(respond(selection))
}

/// Next social media video, optionally limited to a tag slug
pub async fn random_social_media(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<SocialMediaQuery>,
) -> Result<(StatusCode, ResponseJson<RandomVideoResponse>), ApiError> {
    let selection = RotatingSelector::select(
        &deployment.db().pool,
        ContentPool::SocialMedia,
        query.tag.as_deref(),
    )
    .await?;
    Ok(respond(selection))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/random-video-post", get(random_video_post))
        .route("/random-social-media", get(random_social_media))
}
