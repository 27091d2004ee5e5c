//! Dashboard statistics: a single pass over the filtered orders.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use db::models::order::{Order, OrderFilter, OrderStatus};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::debug;
use ts_rs::TS;
use uuid::Uuid;

const TOP_COUPONS: usize = 10;
const RECENT_ORDERS: usize = 10;

/// Funnel stages, looked up by status.
const FUNNEL_STAGES: [OrderStatus; 4] = [
    OrderStatus::Created,
    OrderStatus::AwaitingPayment,
    OrderStatus::Paid,
    OrderStatus::Completed,
];

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct StatusBucket {
    pub status: OrderStatus,
    pub label: String,
    pub count: u32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct MonthBucket {
    pub key: String, // YYYY-MM
    pub label: String,
    pub count: u32,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct TemplateBucket {
    pub title: String,
    pub count: u32,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CouponBucket {
    pub code: String,
    pub count: u32,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct FunnelStage {
    pub status: OrderStatus,
    pub label: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct RecentOrder {
    pub id: Uuid,
    pub buyer_name: String,
    pub child_name: String,
    pub status: Option<String>,
    pub status_label: Option<String>,
    pub payment_amount: f64,
    pub coupon_code: Option<String>,
    pub template_title: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for RecentOrder {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            buyer_name: order.buyer_name.clone(),
            child_name: order.child_name.clone(),
            status: order.status.clone(),
            status_label: order.known_status().map(|s| s.label().to_string()),
            payment_amount: order.amount(),
            coupon_code: order.applied_coupon().map(str::to_string),
            template_title: order.template_title.clone(),
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct DashboardStats {
    pub total_orders: u32,
    pub total_revenue: f64,
    pub total_coupons_used: u32,
    pub paid_orders: u32,
    pub average_order_value: f64,
    pub orders_by_status: Vec<StatusBucket>,
    pub orders_by_month: Vec<MonthBucket>,
    pub orders_by_template: Vec<TemplateBucket>,
    pub top_coupons: Vec<CouponBucket>,
    pub recent_orders: Vec<RecentOrder>,
    pub conversion_funnel: Vec<FunnelStage>,
    pub filters: OrderFilter,
}

/// Raw query parameters of the stats endpoint. Anything that fails to parse
/// is dropped rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
}

impl StatsQuery {
    pub fn into_filter(self) -> OrderFilter {
        let parse_date = |raw: Option<String>| {
            raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        };

        let mut statuses: Vec<OrderStatus> = Vec::new();
        for status in self
            .status
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| s.trim().parse::<OrderStatus>().ok())
        {
            if !statuses.contains(&status) {
                statuses.push(status);
            }
        }

        OrderFilter {
            start_date: parse_date(self.start_date),
            end_date: parse_date(self.end_date),
            statuses,
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    count: u32,
    amount: f64,
}

#[derive(Debug)]
struct MonthTally {
    label: String,
    tally: Tally,
}

/// Buckets that remember the order keys were first seen in.
#[derive(Debug, Default)]
struct EncounterBuckets {
    index: HashMap<String, usize>,
    buckets: Vec<(String, Tally)>,
}

impl EncounterBuckets {
    fn entry(&mut self, key: &str) -> &mut Tally {
        let position = match self.index.get(key) {
            Some(&position) => position,
            None => {
                self.buckets.push((key.to_string(), Tally::default()));
                self.index.insert(key.to_string(), self.buckets.len() - 1);
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[position].1
    }
}

/// Running state of the single pass over the orders.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    total_orders: u32,
    total_revenue: f64,
    total_coupons_used: u32,
    paid_orders: u32,
    by_status: HashMap<OrderStatus, Tally>,
    by_month: BTreeMap<String, MonthTally>,
    by_template: EncounterBuckets,
    by_coupon: EncounterBuckets,
    recent: Vec<RecentOrder>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate `orders` in iteration order.
    pub fn aggregate<'a>(
        orders: impl IntoIterator<Item = &'a Order>,
        filters: OrderFilter,
    ) -> DashboardStats {
        let mut aggregator = Self::new();
        for order in orders {
            aggregator.push(order);
        }
        aggregator.finish(filters)
    }

    pub fn push(&mut self, order: &Order) {
        let amount = order.amount();
        let status = order.known_status();
        let is_revenue = status.is_some_and(OrderStatus::counts_as_revenue);
        let revenue = if is_revenue { amount } else { 0.0 };

        self.total_orders += 1;
        if is_revenue {
            self.total_revenue += amount;
            self.paid_orders += 1;
        }

        if let Some(status) = status {
            let tally = self.by_status.entry(status).or_default();
            tally.count += 1;
            tally.amount += amount;
        }

        let month = self
            .by_month
            .entry(order.created_at.format("%Y-%m").to_string())
            .or_insert_with(|| MonthTally {
                label: order.created_at.format("%b/%Y").to_string(),
                tally: Tally::default(),
            });
        month.tally.count += 1;
        month.tally.amount += revenue;

        if let Some(title) = order
            .template_title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
        {
            let tally = self.by_template.entry(title);
            tally.count += 1;
            tally.amount += revenue;
        }

        if let Some(code) = order.applied_coupon() {
            self.total_coupons_used += 1;
            let tally = self.by_coupon.entry(code);
            tally.count += 1;
            tally.amount += revenue;
        }

        if self.recent.len() < RECENT_ORDERS {
            self.recent.push(RecentOrder::from(order));
        }
    }

    pub fn finish(self, filters: OrderFilter) -> DashboardStats {
        let orders_by_status: Vec<StatusBucket> = OrderStatus::iter()
            .map(|status| {
                let tally = self.by_status.get(&status);
                StatusBucket {
                    status,
                    label: status.label().to_string(),
                    count: tally.map_or(0, |t| t.count),
                    value: round_cents(tally.map_or(0.0, |t| t.amount)),
                }
            })
            .collect();

        let conversion_funnel = FUNNEL_STAGES
            .iter()
            .map(|&status| FunnelStage {
                status,
                label: status.label().to_string(),
                count: self.by_status.get(&status).map_or(0, |t| t.count),
            })
            .collect();

        // BTreeMap keys are YYYY-MM, so iteration is chronological
        let orders_by_month = self
            .by_month
            .into_iter()
            .map(|(key, month)| MonthBucket {
                key,
                label: month.label,
                count: month.tally.count,
                revenue: round_cents(month.tally.amount),
            })
            .collect();

        let orders_by_template = self
            .by_template
            .buckets
            .into_iter()
            .map(|(title, tally)| TemplateBucket {
                title,
                count: tally.count,
                revenue: round_cents(tally.amount),
            })
            .collect();

        let mut top_coupons: Vec<CouponBucket> = self
            .by_coupon
            .buckets
            .into_iter()
            .map(|(code, tally)| CouponBucket {
                code,
                count: tally.count,
                revenue: round_cents(tally.amount),
            })
            .collect();
        // sort_by is stable: ties keep first-seen order
        top_coupons.sort_by(|a, b| b.count.cmp(&a.count));
        top_coupons.truncate(TOP_COUPONS);

        let average_order_value = if self.paid_orders > 0 {
            round_cents(self.total_revenue / f64::from(self.paid_orders))
        } else {
            0.0
        };

        DashboardStats {
            total_orders: self.total_orders,
            total_revenue: round_cents(self.total_revenue),
            total_coupons_used: self.total_coupons_used,
            paid_orders: self.paid_orders,
            average_order_value,
            orders_by_status,
            orders_by_month,
            orders_by_template,
            top_coupons,
            recent_orders: self.recent,
            conversion_funnel,
            filters,
        }
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct StatsService;

impl StatsService {
    /// Fetch the orders matching `filter` (newest first) and aggregate them.
    pub async fn dashboard_stats(
        pool: &SqlitePool,
        filter: OrderFilter,
    ) -> Result<DashboardStats, StatsError> {
        let orders = Order::find_for_stats(pool, &filter).await?;
        debug!(
            orders = orders.len(),
            start_date = ?filter.start_date,
            end_date = ?filter.end_date,
            "Aggregating dashboard stats"
        );
        Ok(StatsAggregator::aggregate(&orders, filter))
    }
}
