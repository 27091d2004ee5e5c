use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Order lifecycle. The happy path runs from `Created` to `Completed`;
/// `Canceled` and `Error` are terminal side exits.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Created,
    AwaitingPayment,
    Paid,
    Thanked,
    CreatedAssetsText,
    CreatedAssetsIllustration,
    CreatedAssetsMerge,
    ReadyForDelivery,
    Delivered,
    Completed,
    Canceled,
    Error,
}

impl OrderStatus {
    /// Statuses from `Paid` onward along the happy path.
    pub const REVENUE: [OrderStatus; 8] = [
        OrderStatus::Paid,
        OrderStatus::Thanked,
        OrderStatus::CreatedAssetsText,
        OrderStatus::CreatedAssetsIllustration,
        OrderStatus::CreatedAssetsMerge,
        OrderStatus::ReadyForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Completed,
    ];

    pub fn counts_as_revenue(self) -> bool {
        Self::REVENUE.contains(&self)
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Created => "Created",
            OrderStatus::AwaitingPayment => "Awaiting Payment",
            OrderStatus::Paid => "Paid",
            OrderStatus::Thanked => "Thanked",
            OrderStatus::CreatedAssetsText => "Text Created",
            OrderStatus::CreatedAssetsIllustration => "Illustrations Created",
            OrderStatus::CreatedAssetsMerge => "Book Assembled",
            OrderStatus::ReadyForDelivery => "Ready for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Completed => "Completed",
            OrderStatus::Canceled => "Canceled",
            OrderStatus::Error => "Error",
        }
    }
}

/// Order as read for reporting. `status` keeps the stored text so that values
/// outside the known lifecycle survive the read.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Order {
    pub id: Uuid,
    pub status: Option<String>,
    pub payment_amount: Option<f64>,
    pub coupon_code: Option<String>,
    pub template_id: Option<Uuid>,
    pub template_title: Option<String>, // Joined from book_templates
    pub buyer_name: String,
    pub child_name: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn known_status(&self) -> Option<OrderStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    /// Coupon code, if one was applied and is not blank
    pub fn applied_coupon(&self) -> Option<&str> {
        self.coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    pub fn amount(&self) -> f64 {
        self.payment_amount
            .filter(|amount| amount.is_finite())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateOrder {
    pub status: Option<String>,
    pub payment_amount: Option<f64>,
    pub coupon_code: Option<String>,
    pub template_id: Option<Uuid>,
    pub buyer_name: String,
    pub child_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl CreateOrder {
    pub fn new(buyer_name: impl Into<String>, child_name: impl Into<String>) -> Self {
        Self {
            status: Some(OrderStatus::Created.to_string()),
            payment_amount: None,
            coupon_code: None,
            template_id: None,
            buyer_name: buyer_name.into(),
            child_name: child_name.into(),
            created_at: None,
        }
    }
}

/// Date range (inclusive, by UTC day) and status set applied before aggregation.
/// An empty `statuses` list means every status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct OrderFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub statuses: Vec<OrderStatus>,
}

const ORDER_SELECT: &str = r#"SELECT
    o.id,
    o.status,
    o.payment_amount,
    o.coupon_code,
    o.template_id,
    t.title AS template_title,
    o.buyer_name,
    o.child_name,
    o.created_at
FROM orders o
LEFT JOIN book_templates t ON t.id = o.template_id"#;

impl Order {
    pub async fn create(pool: &SqlitePool, data: &CreateOrder) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let created_at = data.created_at.unwrap_or_else(Utc::now);
        sqlx::query(
            r#"INSERT INTO orders
                (id, status, payment_amount, coupon_code, template_id, buyer_name, child_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)"#,
        )
        .bind(id)
        .bind(&data.status)
        .bind(data.payment_amount)
        .bind(&data.coupon_code)
        .bind(data.template_id)
        .bind(&data.buyer_name)
        .bind(&data.child_name)
        .bind(created_at)
        .execute(pool)
        .await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("{ORDER_SELECT} WHERE o.id = $1");
        sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Orders matching `filter`, newest first.
    pub async fn find_for_stats(
        pool: &SqlitePool,
        filter: &OrderFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Sqlite>::new(ORDER_SELECT);
        query.push(" WHERE 1 = 1");

        if let Some(start) = filter.start_date {
            query
                .push(" AND date(o.created_at) >= ")
                .push_bind(start.format("%Y-%m-%d").to_string());
        }
        if let Some(end) = filter.end_date {
            query
                .push(" AND date(o.created_at) <= ")
                .push_bind(end.format("%Y-%m-%d").to_string());
        }
        if !filter.statuses.is_empty() {
            query.push(" AND o.status IN (");
            let mut separated = query.separated(", ");
            for status in &filter.statuses {
                separated.push_bind(status.to_string());
            }
            separated.push_unseparated(")");
        }

        query.push(" ORDER BY datetime(o.created_at) DESC, o.rowid DESC");

        query.build_query_as::<Order>().fetch_all(pool).await
    }
}
