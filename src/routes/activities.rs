//! Activity log endpoints and the timeline view.

use crate::db::CrmDb;
use crate::error::ApiError;
use crate::models::{Activity, ActivityKind, DataResponse, MessageResponse};
use crate::routes::helpers::require_field;
use chrono::{NaiveDate, Utc};
use rocket::serde::json::Json;
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

/// Create/update payload for an activity.
///
/// `relatedType`/`relatedId` loosely reference a customer, deal, or lead;
/// nothing checks the target exists, matching the audit-trail character of
/// the table.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRequest {
    pub subject: String,
    pub kind: ActivityKind,
    pub date: NaiveDate,
    #[serde(default)]
    pub related_type: String,
    #[serde(default)]
    pub related_id: Option<i64>,
    #[serde(default)]
    pub notes: String,
}

/// One day of the timeline view.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDay {
    pub date: NaiveDate,
    pub activities: Vec<Activity>,
}

/// List activities, optionally filtered by kind and/or related entity type.
#[openapi(tag = "Activities")]
#[get("/activities?<kind>&<related_type>")]
pub async fn list_activities(
    kind: Option<ActivityKind>,
    related_type: Option<String>,
    mut db: Connection<CrmDb>,
) -> Result<Json<DataResponse<Vec<Activity>>>, ApiError> {
    let activities: Vec<Activity> = sqlx::query_as(
        r#"SELECT id, subject, kind, date, related_type, related_id, notes, created_at
           FROM activities
           WHERE ($1 IS NULL OR kind = $1)
             AND ($2 IS NULL OR related_type = $2)
           ORDER BY date DESC, id DESC"#,
    )
    .bind(kind)
    .bind(related_type)
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(DataResponse { data: activities }))
}

/// Activities bucketed by calendar date, newest day first.
///
/// Computed by a single scan per request; nothing is materialized.
#[openapi(tag = "Activities")]
#[get("/activities/timeline")]
pub async fn activity_timeline(
    mut db: Connection<CrmDb>,
) -> Result<Json<DataResponse<Vec<TimelineDay>>>, ApiError> {
    let activities: Vec<Activity> = sqlx::query_as(
        r#"SELECT id, subject, kind, date, related_type, related_id, notes, created_at
           FROM activities
           ORDER BY date DESC, id DESC"#,
    )
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(DataResponse {
        data: group_by_day(activities),
    }))
}

/// Group activities already sorted by date descending into per-day buckets.
fn group_by_day(activities: Vec<Activity>) -> Vec<TimelineDay> {
    let mut days: Vec<TimelineDay> = Vec::new();
    for activity in activities {
        match days.last_mut() {
            Some(day) if day.date == activity.date => day.activities.push(activity),
            _ => days.push(TimelineDay {
                date: activity.date,
                activities: vec![activity],
            }),
        }
    }
    days
}

/// Fetch a single activity by id.
#[openapi(tag = "Activities")]
#[get("/activities/<id>")]
pub async fn get_activity(id: i64, mut db: Connection<CrmDb>) -> Result<Json<Activity>, ApiError> {
    let activity: Option<Activity> = sqlx::query_as(
        r#"SELECT id, subject, kind, date, related_type, related_id, notes, created_at
           FROM activities
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    activity
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Activity {id} not found")))
}

/// Record an activity.
#[openapi(tag = "Activities")]
#[post("/activities", data = "<request>")]
pub async fn create_activity(
    request: Json<ActivityRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Activity>, ApiError> {
    let subject = require_field("subject", &request.subject)?.to_string();

    let activity: Activity = sqlx::query_as(
        r#"INSERT INTO activities (subject, kind, date, related_type, related_id, notes, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           RETURNING id, subject, kind, date, related_type, related_id, notes, created_at"#,
    )
    .bind(&subject)
    .bind(request.kind)
    .bind(request.date)
    .bind(&request.related_type)
    .bind(request.related_id)
    .bind(&request.notes)
    .bind(Utc::now())
    .fetch_one(&mut **db)
    .await?;

    Ok(Json(activity))
}

/// Replace an activity's fields.
#[openapi(tag = "Activities")]
#[put("/activities/<id>", data = "<request>")]
pub async fn update_activity(
    id: i64,
    request: Json<ActivityRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Activity>, ApiError> {
    let subject = require_field("subject", &request.subject)?.to_string();

    let activity: Option<Activity> = sqlx::query_as(
        r#"UPDATE activities
           SET subject = $1, kind = $2, date = $3, related_type = $4, related_id = $5, notes = $6
           WHERE id = $7
           RETURNING id, subject, kind, date, related_type, related_id, notes, created_at"#,
    )
    .bind(&subject)
    .bind(request.kind)
    .bind(request.date)
    .bind(&request.related_type)
    .bind(request.related_id)
    .bind(&request.notes)
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    activity
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Activity {id} not found")))
}

/// Delete an activity.
#[openapi(tag = "Activities")]
#[delete("/activities/<id>")]
pub async fn delete_activity(
    id: i64,
    mut db: Connection<CrmDb>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM activities WHERE id = $1")
        .bind(id)
        .execute(&mut **db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Activity {id} not found")));
    }

    Ok(Json(MessageResponse {
        message: format!("Activity {id} deleted"),
    }))
}
