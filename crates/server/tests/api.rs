use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use db::{
    DBService,
    models::{
        content::{ContentPool, CreatePost, Post, Taxonomy, Term},
        order::{CreateOrder, Order, OrderStatus},
    },
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::Value;
use server::{DeploymentImpl, middleware::auth::Claims, routes};
use services::services::config::Config;
use tower::ServiceExt;
use utils::response::ApiResponse;

const SECRET: &str = "test-secret";

async fn app_with(vars: &[(&str, &str)]) -> (Router, DBService) {
    let config = Config::from_vars(
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>(),
    )
    .unwrap();
    let db = DBService::new_in_memory().await.unwrap();
    let deployment = DeploymentImpl::from_parts(config, db.clone()).unwrap();
    (routes::router(deployment), db)
}

async fn app() -> (Router, DBService) {
    app_with(&[("AUTH_JWT_SECRET", SECRET)]).await
}

fn token(role: &str) -> String {
    let claims = Claims {
        sub: "editor@protagonizei".to_string(),
        role: role.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as u64,
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn envelope(body: Value) -> ApiResponse<Value> {
    serde_json::from_value(body).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_as(uri: &str, role: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token(role)))
        .body(Body::empty())
        .unwrap()
}

async fn video_post(db: &DBService, pool: ContentPool, title: &str) -> Post {
    let data = CreatePost::with_video(pool, title, format!("https://cdn.example/{title}.mp4"));
    Post::create(&db.pool, &data).await.unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let (app, _db) = app().await;
    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    let response = envelope(body);
    assert!(response.is_success());
    assert_eq!(response.message(), None);
    assert_eq!(response.into_data(), Some(Value::from("ok")));
}

#[tokio::test]
async fn random_video_post_rotates_then_resets() {
    let (app, db) = app().await;
    video_post(&db, ContentPool::Post, "one").await;
    video_post(&db, ContentPool::Post, "two").await;

    let mut titles = Vec::new();
    for _ in 0..2 {
        let (status, body) = send(&app, get("/api/random-video-post")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reset_occurred"], false);
        titles.push(body["data"]["title"].as_str().unwrap().to_string());
    }
    titles.sort();
    assert_eq!(titles, vec!["one", "two"]);

    let (status, body) = send(&app, get("/api/random-video-post")).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body["success"], true);
    assert_eq!(body["reset_occurred"], true);
    assert!(body["data"]["video_url"].as_str().unwrap().ends_with(".mp4"));
}

#[tokio::test]
async fn random_video_post_without_videos_is_404() {
    let (app, _db) = app().await;
    let (status, body) = send(&app, get("/api/random-video-post")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let response = envelope(body);
    assert!(!response.is_success());
    assert_eq!(response.message(), Some("No post with a video found"));
    assert!(response.into_data().is_none());
}

#[tokio::test]
async fn random_social_media_filters_by_tag() {
    let (app, db) = app().await;
    let tag = Term::create(&db.pool, Taxonomy::PostTag, "Natal", "natal")
        .await
        .unwrap();
    let tagged = video_post(&db, ContentPool::SocialMedia, "tagged").await;
    Post::attach_term(&db.pool, tagged.id, tag.id).await.unwrap();
    video_post(&db, ContentPool::SocialMedia, "untagged").await;

    let (status, body) = send(&app, get("/api/random-social-media?tag=natal")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "tagged");
    assert_eq!(body["data"]["tags"], "Natal");

    let (status, _) = send(&app, get("/api/random-social-media?tag=unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // regular posts never show up in the social media rotation
    video_post(&db, ContentPool::Post, "blog").await;
    let (status, body) = send(&app, get("/api/random-social-media")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "untagged");
}

#[tokio::test]
async fn dashboard_stats_requires_editor() {
    let (app, _db) = app().await;

    let (status, body) = send(&app, get("/api/dashboard/stats")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, get_as("/api/dashboard/stats", "subscriber")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let bad = Request::builder()
        .uri("/api/dashboard/stats")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, bad).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dashboard_stats_aggregates_filtered_orders() {
    let (app, db) = app().await;
    for (status, amount, coupon) in [
        (OrderStatus::Completed, 100.0, Some("WELCOME")),
        (OrderStatus::Paid, 50.5, None),
        (OrderStatus::Created, 80.0, Some("WELCOME")),
    ] {
        let mut data = CreateOrder::new("Maria", "Lia");
        data.status = Some(status.to_string());
        data.payment_amount = Some(amount);
        data.coupon_code = coupon.map(str::to_string);
        Order::create(&db.pool, &data).await.unwrap();
    }

    let (status, body) = send(&app, get_as("/api/dashboard/stats", "editor")).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["total_orders"], 3);
    assert_eq!(stats["paid_orders"], 2);
    assert_eq!(stats["total_revenue"], 150.5);
    assert_eq!(stats["total_coupons_used"], 2);
    assert_eq!(stats["top_coupons"][0]["code"], "WELCOME");
    assert_eq!(stats["recent_orders"].as_array().unwrap().len(), 3);

    let (status, body) = send(
        &app,
        get_as("/api/dashboard/stats?status=paid,completed,bogus", "administrator"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_orders"], 2);
    assert_eq!(
        body["data"]["filters"]["statuses"],
        serde_json::json!(["paid", "completed"])
    );
}

#[tokio::test]
async fn debug_bypass_skips_authentication() {
    let (app, _db) = app_with(&[("DEBUG_BYPASS_AUTH", "true")]).await;
    let (status, body) = send(&app, get("/api/dashboard/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_orders"], 0);
}

#[tokio::test]
async fn integrations_report_missing_configuration() {
    let (app, _db) = app().await;

    let deploy = Request::builder()
        .method("POST")
        .uri("/api/integrations/deploy")
        .header(header::AUTHORIZATION, format!("Bearer {}", token("editor")))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, deploy).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "github is not configured");

    let (status, body) = send(&app, get_as("/api/integrations/balances", "editor")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deepseek"]["available"], false);
    assert_eq!(body["data"]["fal"]["error"], "fal is not configured");

    let (status, _) = send(&app, get("/api/integrations/balances")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
