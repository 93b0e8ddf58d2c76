//! Campaign record endpoints: the campaign itself, its ordered steps, its
//! append-only log, and the blast trigger.

use crate::blast::{self, RunReport};
use crate::db::CrmDb;
use crate::error::ApiError;
use crate::mail::Mailer;
use crate::models::{
    Campaign, CampaignLog, CampaignStatus, CampaignStep, DataResponse, MessageResponse, Segment,
    StepKind,
};
use crate::routes::helpers::require_field;
use chrono::{NaiveDate, Utc};
use rocket::State;
use rocket::serde::json::Json;
use rocket_db_pools::sqlx::SqlitePool;
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Deserialize;
use std::sync::Arc;

fn default_status() -> CampaignStatus {
    CampaignStatus::Draft
}

/// Create/update payload for a campaign.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_status")]
    pub status: CampaignStatus,
}

/// Create/update payload for a campaign step. Email steps carry
/// `subject|||body` in `details`; wait steps are stored but not interpreted.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepRequest {
    pub kind: StepKind,
    #[serde(default)]
    pub details: String,
    /// Position in the step sequence; appended after the current last step
    /// when omitted.
    #[serde(default)]
    pub step_order: Option<i64>,
}

/// Blast trigger payload: which segment to resolve recipients from.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub segment_id: i64,
}

async fn ensure_campaign(campaign_id: i64, db: &mut Connection<CrmDb>) -> Result<(), ApiError> {
    let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM campaigns WHERE id = $1")
        .bind(campaign_id)
        .fetch_optional(db.as_mut())
        .await?;

    found
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound(format!("Campaign {campaign_id} not found")))
}

/// List campaigns, optionally filtered by status.
#[openapi(tag = "Campaigns")]
#[get("/campaigns?<status>")]
pub async fn list_campaigns(
    status: Option<CampaignStatus>,
    mut db: Connection<CrmDb>,
) -> Result<Json<DataResponse<Vec<Campaign>>>, ApiError> {
    let campaigns: Vec<Campaign> = sqlx::query_as(
        r#"SELECT id, name, description, start_date, end_date, status, created_at
           FROM campaigns
           WHERE ($1 IS NULL OR status = $1)
           ORDER BY created_at DESC, id DESC"#,
    )
    .bind(status)
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(DataResponse { data: campaigns }))
}

/// Fetch a single campaign by id.
#[openapi(tag = "Campaigns")]
#[get("/campaigns/<id>")]
pub async fn get_campaign(id: i64, mut db: Connection<CrmDb>) -> Result<Json<Campaign>, ApiError> {
    let campaign: Option<Campaign> = sqlx::query_as(
        r#"SELECT id, name, description, start_date, end_date, status, created_at
           FROM campaigns
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    campaign
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Campaign {id} not found")))
}

/// Create a campaign.
#[openapi(tag = "Campaigns")]
#[post("/campaigns", data = "<request>")]
pub async fn create_campaign(
    request: Json<CampaignRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Campaign>, ApiError> {
    let name = require_field("name", &request.name)?.to_string();

    let campaign: Campaign = sqlx::query_as(
        r#"INSERT INTO campaigns (name, description, start_date, end_date, status, created_at)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id, name, description, start_date, end_date, status, created_at"#,
    )
    .bind(&name)
    .bind(&request.description)
    .bind(request.start_date)
    .bind(request.end_date)
    .bind(request.status)
    .bind(Utc::now())
    .fetch_one(&mut **db)
    .await?;

    Ok(Json(campaign))
}

/// Replace a campaign's fields.
#[openapi(tag = "Campaigns")]
#[put("/campaigns/<id>", data = "<request>")]
pub async fn update_campaign(
    id: i64,
    request: Json<CampaignRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Campaign>, ApiError> {
    let name = require_field("name", &request.name)?.to_string();

    let campaign: Option<Campaign> = sqlx::query_as(
        r#"UPDATE campaigns
           SET name = $1, description = $2, start_date = $3, end_date = $4, status = $5
           WHERE id = $6
           RETURNING id, name, description, start_date, end_date, status, created_at"#,
    )
    .bind(&name)
    .bind(&request.description)
    .bind(request.start_date)
    .bind(request.end_date)
    .bind(request.status)
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    campaign
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Campaign {id} not found")))
}

/// Delete a campaign. The store cascades to its steps and log rows.
#[openapi(tag = "Campaigns")]
#[delete("/campaigns/<id>")]
pub async fn delete_campaign(
    id: i64,
    mut db: Connection<CrmDb>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM campaigns WHERE id = $1")
        .bind(id)
        .execute(&mut **db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Campaign {id} not found")));
    }

    Ok(Json(MessageResponse {
        message: format!("Campaign {id} deleted"),
    }))
}

/// List a campaign's steps in execution order.
#[openapi(tag = "Campaigns")]
#[get("/campaigns/<id>/steps")]
pub async fn list_campaign_steps(
    id: i64,
    mut db: Connection<CrmDb>,
) -> Result<Json<DataResponse<Vec<CampaignStep>>>, ApiError> {
    ensure_campaign(id, &mut db).await?;

    let steps: Vec<CampaignStep> = sqlx::query_as(
        r#"SELECT id, campaign_id, kind, details, step_order
           FROM campaign_steps
           WHERE campaign_id = $1
           ORDER BY step_order ASC, id ASC"#,
    )
    .bind(id)
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(DataResponse { data: steps }))
}

/// Add a step to a campaign.
#[openapi(tag = "Campaigns")]
#[post("/campaigns/<id>/steps", data = "<request>")]
pub async fn add_campaign_step(
    id: i64,
    request: Json<StepRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<CampaignStep>, ApiError> {
    ensure_campaign(id, &mut db).await?;

    let step: CampaignStep = sqlx::query_as(
        r#"INSERT INTO campaign_steps (campaign_id, kind, details, step_order)
           VALUES ($1, $2, $3,
                   COALESCE($4, (SELECT COALESCE(MAX(step_order), 0) + 1
                                 FROM campaign_steps
                                 WHERE campaign_id = $1)))
           RETURNING id, campaign_id, kind, details, step_order"#,
    )
    .bind(id)
    .bind(request.kind)
    .bind(&request.details)
    .bind(request.step_order)
    .fetch_one(&mut **db)
    .await?;

    Ok(Json(step))
}

/// Fetch a single step of a campaign.
#[openapi(tag = "Campaigns")]
#[get("/campaigns/<id>/steps/<step_id>")]
pub async fn get_campaign_step(
    id: i64,
    step_id: i64,
    mut db: Connection<CrmDb>,
) -> Result<Json<CampaignStep>, ApiError> {
    let step: Option<CampaignStep> = sqlx::query_as(
        r#"SELECT id, campaign_id, kind, details, step_order
           FROM campaign_steps
           WHERE campaign_id = $1 AND id = $2"#,
    )
    .bind(id)
    .bind(step_id)
    .fetch_optional(&mut **db)
    .await?;

    step.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Step {step_id} of campaign {id} not found")))
}

/// Replace a step's fields.
#[openapi(tag = "Campaigns")]
#[put("/campaigns/<id>/steps/<step_id>", data = "<request>")]
pub async fn update_campaign_step(
    id: i64,
    step_id: i64,
    request: Json<StepRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<CampaignStep>, ApiError> {
    let step: Option<CampaignStep> = sqlx::query_as(
        r#"UPDATE campaign_steps
           SET kind = $1, details = $2, step_order = COALESCE($3, step_order)
           WHERE campaign_id = $4 AND id = $5
           RETURNING id, campaign_id, kind, details, step_order"#,
    )
    .bind(request.kind)
    .bind(&request.details)
    .bind(request.step_order)
    .bind(id)
    .bind(step_id)
    .fetch_optional(&mut **db)
    .await?;

    step.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Step {step_id} of campaign {id} not found")))
}

/// Remove a step from a campaign.
#[openapi(tag = "Campaigns")]
#[delete("/campaigns/<id>/steps/<step_id>")]
pub async fn delete_campaign_step(
    id: i64,
    step_id: i64,
    mut db: Connection<CrmDb>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM campaign_steps WHERE campaign_id = $1 AND id = $2")
        .bind(id)
        .bind(step_id)
        .execute(&mut **db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!(
            "Step {step_id} of campaign {id} not found"
        )));
    }

    Ok(Json(MessageResponse {
        message: format!("Step {step_id} deleted"),
    }))
}

/// The campaign's append-only delivery log, oldest row first.
#[openapi(tag = "Campaigns")]
#[get("/campaigns/<id>/logs")]
pub async fn list_campaign_logs(
    id: i64,
    mut db: Connection<CrmDb>,
) -> Result<Json<DataResponse<Vec<CampaignLog>>>, ApiError> {
    ensure_campaign(id, &mut db).await?;

    let logs: Vec<CampaignLog> = sqlx::query_as(
        r#"SELECT id, campaign_id, segment_id, recipient_email, step_id, status, detail, timestamp
           FROM campaign_logs
           WHERE campaign_id = $1
           ORDER BY id ASC"#,
    )
    .bind(id)
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(DataResponse { data: logs }))
}

/// Run a campaign against a segment.
///
/// Synchronous inside the request: the response arrives after every send
/// attempt has been made and logged. Re-running the same campaign re-sends
/// and re-logs everything.
#[openapi(tag = "Campaigns")]
#[post("/campaigns/<id>/run", data = "<request>")]
pub async fn run_campaign(
    id: i64,
    request: Json<RunRequest>,
    pool: &State<SqlitePool>,
    mailer: &State<Arc<dyn Mailer>>,
) -> Result<Json<RunReport>, ApiError> {
    let campaign: Campaign = sqlx::query_as(
        r#"SELECT id, name, description, start_date, end_date, status, created_at
           FROM campaigns
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool.inner())
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Campaign {id} not found")))?;

    let segment: Segment = sqlx::query_as(
        r#"SELECT id, name, filter_kind, filter_value, created_at
           FROM segments
           WHERE id = $1"#,
    )
    .bind(request.segment_id)
    .fetch_optional(pool.inner())
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Segment {} not found", request.segment_id)))?;

    let report = blast::execute(pool.inner(), mailer.inner().as_ref(), &campaign, &segment).await?;

    Ok(Json(report))
}
