use std::{fs, path::PathBuf};

use db::models::{
    content::ContentPool,
    order::{OrderFilter, OrderStatus},
};
use server::routes::random_content::RandomVideoResponse;
use services::services::{
    balance::{BalancesReport, CurrencyBalance, ProviderBalance},
    github_deploy::DeployTriggered,
    rotating_selector::VideoPostView,
    stats::{
        CouponBucket, DashboardStats, FunnelStage, MonthBucket, RecentOrder, StatusBucket,
        TemplateBucket,
    },
};
use ts_rs::TS;
use utils::response::ApiResponse;

fn generate_types_content() -> String {
    let decls = [
        ApiResponse::<()>::decl(),
        OrderStatus::decl(),
        OrderFilter::decl(),
        ContentPool::decl(),
        StatusBucket::decl(),
        MonthBucket::decl(),
        TemplateBucket::decl(),
        CouponBucket::decl(),
        FunnelStage::decl(),
        RecentOrder::decl(),
        DashboardStats::decl(),
        VideoPostView::decl(),
        RandomVideoResponse::decl(),
        DeployTriggered::decl(),
        CurrencyBalance::decl(),
        ProviderBalance::decl(),
        BalancesReport::decl(),
    ];

    let body = decls
        .iter()
        .map(|decl| format!("export {}", decl.trim_end()))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "// This file was generated by `cargo run --bin generate_types`. Do not edit it manually.\n\n{body}\n"
    )
}

fn main() -> std::io::Result<()> {
    let shared = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared");
    fs::create_dir_all(&shared)?;

    let path = shared.join("types.ts");
    fs::write(&path, generate_types_content())?;
    println!("Wrote {}", path.display());
    Ok(())
}
