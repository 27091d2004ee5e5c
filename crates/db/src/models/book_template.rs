use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// Personalised book layout an order is produced from
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct BookTemplate {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl BookTemplate {
    pub async fn create(pool: &SqlitePool, title: &str) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, BookTemplate>(
            r#"INSERT INTO book_templates (id, title, created_at)
            VALUES ($1, $2, $3)
            RETURNING id, title, created_at"#,
        )
        .bind(id)
        .bind(title)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BookTemplate>(
            "SELECT id, title, created_at FROM book_templates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
