//! Random video selection without repetition. Each pick marks the post as
//! used; once every eligible post of the partition is used, the partition is
//! reset and the rotation starts over.

use chrono::{DateTime, Utc};
use db::models::content::{ContentPool, Post, PostFilter, Taxonomy, Term};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;
use utils::text::auto_excerpt;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

/// Public projection of a selected post
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct VideoPostView {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub video_url: Option<String>,
    pub categories: String,
    pub tags: String,
    pub featured_image_url: Option<String>,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Selection {
    pub post: VideoPostView,
    pub reset_occurred: bool,
}

pub struct RotatingSelector;

impl RotatingSelector {
    /// Pick one unused eligible post of `pool`, optionally restricted to
    /// posts tagged `tag` (a `post_tag` slug), and mark it used.
    pub async fn select(
        db: &SqlitePool,
        pool: ContentPool,
        tag: Option<&str>,
    ) -> Result<Selection, SelectorError> {
        let filter = match tag.map(str::trim).filter(|t| !t.is_empty()) {
            Some(slug) => {
                let term = Term::find_by_slug(db, Taxonomy::PostTag, slug)
                    .await?
                    .ok_or_else(|| SelectorError::NotFound(format!("Tag '{slug}' not found")))?;
                PostFilter::with_term(pool, term.id)
            }
            None => PostFilter::pool(pool),
        };

        let (post_id, reset_occurred) = Self::claim(db, &filter, tag).await?;

        let post = Post::find_by_id(db, post_id).await?.ok_or_else(|| {
            SelectorError::Internal(format!("Selected post {post_id} disappeared"))
        })?;

        debug!(
            post_id = %post.id,
            pool = %pool,
            reset_occurred,
            "Selected video post"
        );

        Ok(Selection {
            post: Self::project(db, post).await?,
            reset_occurred,
        })
    }

    async fn claim(
        db: &SqlitePool,
        filter: &PostFilter,
        tag: Option<&str>,
    ) -> Result<(Uuid, bool), SelectorError> {
        if let Some(id) = Post::claim_random_unused(db, filter).await? {
            return Ok((id, false));
        }
        Self::claim_after_exhaustion(db, filter, tag).await
    }

    /// Slow path once the lock-free claim found nothing. The write lock is
    /// taken up front so the recheck, reset and claim see no interleaved
    /// writer; a claim that becomes possible meanwhile wins over a reset.
    async fn claim_after_exhaustion(
        db: &SqlitePool,
        filter: &PostFilter,
        tag: Option<&str>,
    ) -> Result<(Uuid, bool), SelectorError> {
        let mut tx = db.begin_with("BEGIN IMMEDIATE").await?;

        if let Some(id) = Post::claim_random_unused(&mut *tx, filter).await? {
            tx.commit().await?;
            debug!(pool = %filter.pool, "Unused post appeared before reset");
            return Ok((id, false));
        }

        if Post::count_eligible(&mut *tx, filter).await? == 0 {
            tx.rollback().await?;
            return Err(SelectorError::NotFound(match tag {
                Some(tag) => format!("No {} with a video found for tag '{tag}'", filter.pool),
                None => format!("No {} with a video found", filter.pool),
            }));
        }

        let reset = Post::reset_used(&mut *tx, filter).await?;
        let claimed = Post::claim_random_unused(&mut *tx, filter).await?;
        tx.commit().await?;

        info!(
            pool = %filter.pool,
            tag = ?tag,
            reset,
            "Video rotation exhausted, used flags reset"
        );

        match claimed {
            Some(id) => Ok((id, true)),
            None => {
                warn!(pool = %filter.pool, "No candidate after resetting used flags");
                Err(SelectorError::Internal(
                    "Failed to select a post after resetting the rotation".to_string(),
                ))
            }
        }
    }

    async fn project(db: &SqlitePool, post: Post) -> Result<VideoPostView, SelectorError> {
        let categories = Term::names_for_post(db, post.id, Taxonomy::Category).await?;
        let tags = Term::names_for_post(db, post.id, Taxonomy::PostTag).await?;
        let video_url = post.video_url();

        let excerpt = match post.excerpt.as_deref().map(str::trim) {
            Some(excerpt) if !excerpt.is_empty() => excerpt.to_string(),
            _ => auto_excerpt(&post.content),
        };

        Ok(VideoPostView {
            id: post.id,
            title: post.title,
            content: post.content,
            excerpt,
            video_url,
            categories: categories.join(", "),
            tags: tags.join(", "),
            featured_image_url: post.featured_image_url,
            slug: post.slug,
            created_at: post.created_at,
        })
    }
}
