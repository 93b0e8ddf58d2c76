//! Deal record endpoints and the pipeline view.

use crate::db::CrmDb;
use crate::error::ApiError;
use crate::models::{DataResponse, Deal, DealStage, DealStatus, MessageResponse};
use crate::routes::helpers::{ensure_customer, require_field};
use chrono::Utc;
use rocket::serde::json::Json;
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_stage() -> DealStage {
    DealStage::New
}

fn default_status() -> DealStatus {
    DealStatus::Open
}

/// Create/update payload for a deal.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DealRequest {
    pub customer_id: i64,
    pub title: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default = "default_stage")]
    pub stage: DealStage,
    #[serde(default = "default_status")]
    pub status: DealStatus,
}

/// One bucket of the pipeline view: a stage, its open deals, and their total
/// value.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStage {
    pub stage: DealStage,
    pub total_amount: f64,
    pub deals: Vec<Deal>,
}

/// List deals, optionally filtered by customer, stage, and/or status.
#[openapi(tag = "Deals")]
#[get("/deals?<customer>&<stage>&<status>")]
pub async fn list_deals(
    customer: Option<i64>,
    stage: Option<DealStage>,
    status: Option<DealStatus>,
    mut db: Connection<CrmDb>,
) -> Result<Json<DataResponse<Vec<Deal>>>, ApiError> {
    let deals: Vec<Deal> = sqlx::query_as(
        r#"SELECT id, customer_id, title, amount, stage, status, created_at
           FROM deals
           WHERE ($1 IS NULL OR customer_id = $1)
             AND ($2 IS NULL OR stage = $2)
             AND ($3 IS NULL OR status = $3)
           ORDER BY created_at ASC, id ASC"#,
    )
    .bind(customer)
    .bind(stage)
    .bind(status)
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(DataResponse { data: deals }))
}

/// Open deals bucketed by stage in pipeline order.
///
/// Computed by a single scan per request; nothing is materialized.
#[openapi(tag = "Deals")]
#[get("/deals/pipeline")]
pub async fn deal_pipeline(
    mut db: Connection<CrmDb>,
) -> Result<Json<DataResponse<Vec<PipelineStage>>>, ApiError> {
    let open: Vec<Deal> = sqlx::query_as(
        r#"SELECT id, customer_id, title, amount, stage, status, created_at
           FROM deals
           WHERE status = $1
           ORDER BY created_at ASC, id ASC"#,
    )
    .bind(DealStatus::Open)
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(DataResponse {
        data: group_by_stage(open),
    }))
}

fn group_by_stage(deals: Vec<Deal>) -> Vec<PipelineStage> {
    let mut buckets: HashMap<DealStage, Vec<Deal>> = HashMap::new();
    for deal in deals {
        buckets.entry(deal.stage).or_default().push(deal);
    }

    DealStage::ALL
        .iter()
        .map(|stage| {
            let deals = buckets.remove(stage).unwrap_or_default();
            PipelineStage {
                stage: *stage,
                total_amount: deals.iter().map(|deal| deal.amount).sum(),
                deals,
            }
        })
        .collect()
}

/// Fetch a single deal by id.
#[openapi(tag = "Deals")]
#[get("/deals/<id>")]
pub async fn get_deal(id: i64, mut db: Connection<CrmDb>) -> Result<Json<Deal>, ApiError> {
    let deal: Option<Deal> = sqlx::query_as(
        r#"SELECT id, customer_id, title, amount, stage, status, created_at
           FROM deals
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    deal.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Deal {id} not found")))
}

/// Create a deal under an existing customer.
#[openapi(tag = "Deals")]
#[post("/deals", data = "<request>")]
pub async fn create_deal(
    request: Json<DealRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Deal>, ApiError> {
    let title = require_field("title", &request.title)?.to_string();
    ensure_customer(request.customer_id, &mut db).await?;

    let deal: Deal = sqlx::query_as(
        r#"INSERT INTO deals (customer_id, title, amount, stage, status, created_at)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id, customer_id, title, amount, stage, status, created_at"#,
    )
    .bind(request.customer_id)
    .bind(&title)
    .bind(request.amount)
    .bind(request.stage)
    .bind(request.status)
    .bind(Utc::now())
    .fetch_one(&mut **db)
    .await?;

    Ok(Json(deal))
}

/// Replace a deal's fields. Moving a deal between stages goes through here;
/// the pipeline view reflects the change on its next read.
#[openapi(tag = "Deals")]
#[put("/deals/<id>", data = "<request>")]
pub async fn update_deal(
    id: i64,
    request: Json<DealRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Deal>, ApiError> {
    let title = require_field("title", &request.title)?.to_string();
    ensure_customer(request.customer_id, &mut db).await?;

    let deal: Option<Deal> = sqlx::query_as(
        r#"UPDATE deals
           SET customer_id = $1, title = $2, amount = $3, stage = $4, status = $5
           WHERE id = $6
           RETURNING id, customer_id, title, amount, stage, status, created_at"#,
    )
    .bind(request.customer_id)
    .bind(&title)
    .bind(request.amount)
    .bind(request.stage)
    .bind(request.status)
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    deal.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Deal {id} not found")))
}

/// Delete a deal.
#[openapi(tag = "Deals")]
#[delete("/deals/<id>")]
pub async fn delete_deal(
    id: i64,
    mut db: Connection<CrmDb>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM deals WHERE id = $1")
        .bind(id)
        .execute(&mut **db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Deal {id} not found")));
    }

    Ok(Json(MessageResponse {
        message: format!("Deal {id} deleted"),
    }))
}
