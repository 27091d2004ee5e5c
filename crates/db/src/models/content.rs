use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Which collection of video-bearing posts a record belongs to
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "post_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContentPool {
    Post,
    SocialMedia,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "taxonomy", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Taxonomy {
    Category,
    PostTag,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Term {
    pub id: Uuid,
    pub taxonomy: Taxonomy,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Post {
    pub id: Uuid,
    pub post_type: ContentPool,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub video: Option<String>, // Attachment JSON, JSON string, or bare URL
    pub used: Option<bool>,    // NULL reads as unused
    pub featured_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn is_used(&self) -> bool {
        self.used.unwrap_or(false)
    }

    /// URL of the attached video. Accepts an attachment object with a `url`
    /// key, a JSON string, or a bare URL.
    pub fn video_url(&self) -> Option<String> {
        self.video.as_deref().and_then(resolve_video_url)
    }
}

pub fn resolve_video_url(raw: &str) -> Option<String> {
    let url = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => map
            .get("url")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        Ok(serde_json::Value::String(s)) => Some(s),
        Ok(_) => None,
        Err(_) => Some(raw.to_string()),
    }?;

    let url = url.trim();
    (!url.is_empty()).then(|| url.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreatePost {
    pub post_type: ContentPool,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub video: Option<String>,
    pub used: Option<bool>,
    pub featured_image_url: Option<String>,
}

impl CreatePost {
    pub fn with_video(post_type: ContentPool, title: impl Into<String>, video: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            post_type,
            slug: title.to_lowercase().replace(' ', "-"),
            title,
            content: String::new(),
            excerpt: None,
            video: Some(video.into()),
            used: None,
            featured_image_url: None,
        }
    }
}

/// Partition of a pool the rotation runs over: every eligible post of
/// `pool`, optionally narrowed to posts carrying `term_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostFilter {
    pub pool: ContentPool,
    pub term_id: Option<Uuid>,
}

impl PostFilter {
    pub fn pool(pool: ContentPool) -> Self {
        Self {
            pool,
            term_id: None,
        }
    }

    pub fn with_term(pool: ContentPool, term_id: Uuid) -> Self {
        Self {
            pool,
            term_id: Some(term_id),
        }
    }
}

// Mirrors resolve_video_url: object -> $.url, JSON string -> itself, other JSON -> NULL, non-JSON -> raw.
const VIDEO_URL_SQL: &str = r#"CASE
        WHEN p.video IS NULL THEN NULL
        WHEN json_valid(p.video) THEN
            CASE json_type(p.video)
                WHEN 'object' THEN json_extract(p.video, '$.url')
                WHEN 'text' THEN json_extract(p.video, '$')
                ELSE NULL
            END
        ELSE p.video
    END"#;

/// Eligible posts of the filtered partition; binds `$1` = pool, `$2` = term id or NULL.
fn eligible_clause() -> String {
    format!(
        r#"p.post_type = $1
    AND TRIM(COALESCE({VIDEO_URL_SQL}, '')) != ''
    AND ($2 IS NULL OR EXISTS (
        SELECT 1 FROM post_terms pt WHERE pt.post_id = p.id AND pt.term_id = $2
    ))"#
    )
}

const POST_COLUMNS: &str = "p.id, p.post_type, p.title, p.slug, p.content, p.excerpt, p.video, p.used, p.featured_image_url, p.created_at";

impl Post {
    pub async fn create(pool: &SqlitePool, data: &CreatePost) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Post>(
            r#"INSERT INTO posts
                (id, post_type, title, slug, content, excerpt, video, used, featured_image_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, post_type, title, slug, content, excerpt, video, used, featured_image_url, created_at"#,
        )
        .bind(id)
        .bind(data.post_type)
        .bind(&data.title)
        .bind(&data.slug)
        .bind(&data.content)
        .bind(&data.excerpt)
        .bind(&data.video)
        .bind(data.used)
        .bind(&data.featured_image_url)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1");
        sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_pool(pool: &SqlitePool, content_pool: ContentPool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE p.post_type = $1 ORDER BY datetime(p.created_at) DESC"
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(content_pool)
            .fetch_all(pool)
            .await
    }

    pub async fn attach_term(pool: &SqlitePool, post_id: Uuid, term_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO post_terms (post_id, term_id) VALUES ($1, $2)")
            .bind(post_id)
            .bind(term_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Pick one unused eligible post at random and mark it used in the same
    /// statement. Returns `None` when the partition has no unused eligible post.
    pub async fn claim_random_unused<'e, E>(
        executor: E,
        filter: &PostFilter,
    ) -> Result<Option<Uuid>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            r#"UPDATE posts SET used = 1
            WHERE id = (
                SELECT p.id FROM posts p
                WHERE {eligible}
                  AND COALESCE(p.used, 0) = 0
                ORDER BY RANDOM()
                LIMIT 1
            )
            AND COALESCE(used, 0) = 0
            RETURNING id"#,
            eligible = eligible_clause()
        );
        sqlx::query_scalar::<_, Uuid>(&sql)
            .bind(filter.pool)
            .bind(filter.term_id)
            .fetch_optional(executor)
            .await
    }

    /// Number of eligible posts in the partition, used or not
    pub async fn count_eligible<'e, E>(executor: E, filter: &PostFilter) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT COUNT(*) FROM posts p WHERE {eligible}",
            eligible = eligible_clause()
        );
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.pool)
            .bind(filter.term_id)
            .fetch_one(executor)
            .await
    }

    /// Clear the used flag on every eligible post of the partition. Posts
    /// outside the partition keep their flag.
    pub async fn reset_used<'e, E>(executor: E, filter: &PostFilter) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "UPDATE posts SET used = 0 WHERE id IN (SELECT p.id FROM posts p WHERE {eligible})",
            eligible = eligible_clause()
        );
        let result = sqlx::query(&sql)
            .bind(filter.pool)
            .bind(filter.term_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

impl Term {
    pub async fn create(
        pool: &SqlitePool,
        taxonomy: Taxonomy,
        name: &str,
        slug: &str,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Term>(
            r#"INSERT INTO terms (id, taxonomy, name, slug)
            VALUES ($1, $2, $3, $4)
            RETURNING id, taxonomy, name, slug"#,
        )
        .bind(id)
        .bind(taxonomy)
        .bind(name)
        .bind(slug)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_slug(
        pool: &SqlitePool,
        taxonomy: Taxonomy,
        slug: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Term>(
            "SELECT id, taxonomy, name, slug FROM terms WHERE taxonomy = $1 AND slug = $2",
        )
        .bind(taxonomy)
        .bind(slug)
        .fetch_optional(pool)
        .await
    }

    pub async fn names_for_post(
        pool: &SqlitePool,
        post_id: Uuid,
        taxonomy: Taxonomy,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"SELECT t.name
            FROM terms t
            JOIN post_terms pt ON pt.term_id = t.id
            WHERE pt.post_id = $1 AND t.taxonomy = $2
            ORDER BY t.name"#,
        )
        .bind(post_id)
        .bind(taxonomy)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    #[test]
    fn test_resolve_video_url_shapes() {
        assert_eq!(
            resolve_video_url(r#"{"url": "https://cdn/x.mp4", "mime_type": "video/mp4"}"#).as_deref(),
            Some("https://cdn/x.mp4")
        );
        assert_eq!(
            resolve_video_url(r#""https://cdn/y.mp4""#).as_deref(),
            Some("https://cdn/y.mp4")
        );
        assert_eq!(
            resolve_video_url("https://cdn/z.mp4").as_deref(),
            Some("https://cdn/z.mp4")
        );
        assert_eq!(resolve_video_url(r#"{"url": ""}"#), None);
        assert_eq!(resolve_video_url("42"), None);
        assert_eq!(resolve_video_url("   "), None);
    }

    #[tokio::test]
    async fn test_eligibility_matches_rust_resolution() {
        let db = DBService::new_in_memory().await.unwrap();
        let pool = ContentPool::Post;
        for video in [
            r#"{"url": "https://cdn/a.mp4"}"#,
            r#""https://cdn/b.mp4""#,
            "https://cdn/c.mp4",
            r#"{"url": ""}"#,
            r#"{"id": 12}"#,
            "",
        ] {
            Post::create(&db.pool, &CreatePost::with_video(pool, "clip", video))
                .await
                .unwrap();
        }
        let mut no_video = CreatePost::with_video(pool, "text only", "");
        no_video.video = None;
        Post::create(&db.pool, &no_video).await.unwrap();

        let eligible = Post::count_eligible(&db.pool, &PostFilter::pool(pool))
            .await
            .unwrap();
        let resolved = Post::find_by_pool(&db.pool, pool)
            .await
            .unwrap()
            .iter()
            .filter(|p| p.video_url().is_some())
            .count();
        assert_eq!(eligible, 3);
        assert_eq!(resolved, 3);
    }

    #[tokio::test]
    async fn test_claim_marks_used_and_skips_used() {
        let db = DBService::new_in_memory().await.unwrap();
        let mut used = CreatePost::with_video(ContentPool::SocialMedia, "old", "https://cdn/old.mp4");
        used.used = Some(true);
        Post::create(&db.pool, &used).await.unwrap();
        let fresh = Post::create(
            &db.pool,
            &CreatePost::with_video(ContentPool::SocialMedia, "new", "https://cdn/new.mp4"),
        )
        .await
        .unwrap();

        let filter = PostFilter::pool(ContentPool::SocialMedia);
        let claimed = Post::claim_random_unused(&db.pool, &filter).await.unwrap();
        assert_eq!(claimed, Some(fresh.id));
        assert!(Post::find_by_id(&db.pool, fresh.id).await.unwrap().unwrap().is_used());

        assert_eq!(Post::claim_random_unused(&db.pool, &filter).await.unwrap(), None);
        assert_eq!(Post::reset_used(&db.pool, &filter).await.unwrap(), 2);
        assert!(Post::claim_random_unused(&db.pool, &filter).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_names_for_post_by_taxonomy() {
        let db = DBService::new_in_memory().await.unwrap();
        let post = Post::create(
            &db.pool,
            &CreatePost::with_video(ContentPool::Post, "tagged", "https://cdn/t.mp4"),
        )
        .await
        .unwrap();
        let news = Term::create(&db.pool, Taxonomy::Category, "News", "news").await.unwrap();
        let kids = Term::create(&db.pool, Taxonomy::PostTag, "Kids", "kids").await.unwrap();
        Post::attach_term(&db.pool, post.id, news.id).await.unwrap();
        Post::attach_term(&db.pool, post.id, kids.id).await.unwrap();

        let categories = Term::names_for_post(&db.pool, post.id, Taxonomy::Category)
            .await
            .unwrap();
        assert_eq!(categories, vec!["News".to_string()]);

        let found = Term::find_by_slug(&db.pool, Taxonomy::PostTag, "kids")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, kids.id);
        assert!(
            Term::find_by_slug(&db.pool, Taxonomy::Category, "kids")
                .await
                .unwrap()
                .is_none()
        );
    }
}
