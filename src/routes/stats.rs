//! Aggregate counts across the store.

use crate::db::CrmDb;
use crate::error::ApiError;
use crate::models::{DealStatus, TaskStatus};
use rocket::serde::json::Json;
use rocket_db_pools::sqlx::FromRow;
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

/// Entity counts and the total value of the open pipeline.
#[derive(Debug, Serialize, Deserialize, JsonSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub customers: i64,
    pub leads: i64,
    pub open_deals: i64,
    pub pending_tasks: i64,
    pub pipeline_value: f64,
    pub campaigns: i64,
    pub campaign_logs: i64,
}

/// One-query aggregate over the whole store.
#[openapi(tag = "Stats")]
#[get("/stats")]
pub async fn get_stats(mut db: Connection<CrmDb>) -> Result<Json<Stats>, ApiError> {
    let stats: Stats = sqlx::query_as(
        r#"
        SELECT
            CAST((SELECT COUNT(*) FROM customers) AS BIGINT) AS customers,
            CAST((SELECT COUNT(*) FROM leads) AS BIGINT) AS leads,
            CAST((SELECT COUNT(*) FROM deals WHERE status = $1) AS BIGINT) AS open_deals,
            CAST((SELECT COUNT(*) FROM tasks WHERE status != $2) AS BIGINT) AS pending_tasks,
            CAST((SELECT COALESCE(SUM(amount), 0) FROM deals WHERE status = $1) AS REAL) AS pipeline_value,
            CAST((SELECT COUNT(*) FROM campaigns) AS BIGINT) AS campaigns,
            CAST((SELECT COUNT(*) FROM campaign_logs) AS BIGINT) AS campaign_logs
        "#,
    )
    .bind(DealStatus::Open)
    .bind(TaskStatus::Done)
    .fetch_one(&mut **db)
    .await?;

    Ok(Json(stats))
}
