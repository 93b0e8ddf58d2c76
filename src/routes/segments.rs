//! Segment endpoints: saved recipient filters and their resolved previews.

use crate::blast;
use crate::db::CrmDb;
use crate::error::ApiError;
use crate::models::{DataResponse, MessageResponse, Segment, SegmentKind};
use crate::routes::helpers::require_field;
use chrono::Utc;
use rocket::State;
use rocket::serde::json::Json;
use rocket_db_pools::sqlx::SqlitePool;
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

/// Create/update payload for a segment.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRequest {
    pub name: String,
    pub filter_kind: SegmentKind,
    /// Status value to match; a blank or omitted value selects every row of
    /// the filtered entity.
    #[serde(default)]
    pub filter_value: Option<String>,
}

/// Resolved recipient preview for a segment.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipientsResponse {
    pub segment_id: i64,
    pub count: usize,
    pub recipients: Vec<String>,
}

/// Validate and normalize a request's filter value: blank collapses to none,
/// anything else must parse as a status of the filtered entity.
fn normalized_filter_value(request: &SegmentRequest) -> Result<Option<String>, ApiError> {
    let value = request
        .filter_value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(value) = value {
        blast::validate_filter_value(request.filter_kind, value).map_err(ApiError::BadRequest)?;
    }

    Ok(value.map(|value| value.to_string()))
}

/// List all segments.
#[openapi(tag = "Segments")]
#[get("/segments")]
pub async fn list_segments(
    mut db: Connection<CrmDb>,
) -> Result<Json<DataResponse<Vec<Segment>>>, ApiError> {
    let segments: Vec<Segment> = sqlx::query_as(
        r#"SELECT id, name, filter_kind, filter_value, created_at
           FROM segments
           ORDER BY name COLLATE NOCASE ASC"#,
    )
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(DataResponse { data: segments }))
}

/// Fetch a single segment by id.
#[openapi(tag = "Segments")]
#[get("/segments/<id>")]
pub async fn get_segment(id: i64, mut db: Connection<CrmDb>) -> Result<Json<Segment>, ApiError> {
    let segment: Option<Segment> = sqlx::query_as(
        r#"SELECT id, name, filter_kind, filter_value, created_at
           FROM segments
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    segment
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Segment {id} not found")))
}

/// Create a segment. The filter value, when present, must be a status of the
/// filtered entity.
#[openapi(tag = "Segments")]
#[post("/segments", data = "<request>")]
pub async fn create_segment(
    request: Json<SegmentRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Segment>, ApiError> {
    let name = require_field("name", &request.name)?.to_string();
    let filter_value = normalized_filter_value(&request)?;

    let segment: Segment = sqlx::query_as(
        r#"INSERT INTO segments (name, filter_kind, filter_value, created_at)
           VALUES ($1, $2, $3, $4)
           RETURNING id, name, filter_kind, filter_value, created_at"#,
    )
    .bind(&name)
    .bind(request.filter_kind)
    .bind(filter_value)
    .bind(Utc::now())
    .fetch_one(&mut **db)
    .await?;

    Ok(Json(segment))
}

/// Replace a segment's fields.
#[openapi(tag = "Segments")]
#[put("/segments/<id>", data = "<request>")]
pub async fn update_segment(
    id: i64,
    request: Json<SegmentRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Segment>, ApiError> {
    let name = require_field("name", &request.name)?.to_string();
    let filter_value = normalized_filter_value(&request)?;

    let segment: Option<Segment> = sqlx::query_as(
        r#"UPDATE segments
           SET name = $1, filter_kind = $2, filter_value = $3
           WHERE id = $4
           RETURNING id, name, filter_kind, filter_value, created_at"#,
    )
    .bind(&name)
    .bind(request.filter_kind)
    .bind(filter_value)
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    segment
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Segment {id} not found")))
}

/// Delete a segment.
#[openapi(tag = "Segments")]
#[delete("/segments/<id>")]
pub async fn delete_segment(
    id: i64,
    mut db: Connection<CrmDb>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM segments WHERE id = $1")
        .bind(id)
        .execute(&mut **db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Segment {id} not found")));
    }

    Ok(Json(MessageResponse {
        message: format!("Segment {id} deleted"),
    }))
}

/// Preview the recipients a segment currently resolves to, using the same
/// routine the blast engine runs.
#[openapi(tag = "Segments")]
#[get("/segments/<id>/recipients")]
pub async fn segment_recipients(
    id: i64,
    pool: &State<SqlitePool>,
) -> Result<Json<RecipientsResponse>, ApiError> {
    let segment: Segment = sqlx::query_as(
        r#"SELECT id, name, filter_kind, filter_value, created_at
           FROM segments
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool.inner())
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Segment {id} not found")))?;

    let recipients = blast::resolve_recipients(pool.inner(), &segment).await?;

    Ok(Json(RecipientsResponse {
        segment_id: id,
        count: recipients.len(),
        recipients,
    }))
}
