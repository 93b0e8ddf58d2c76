//! Reminder record endpoints.

use crate::db::CrmDb;
use crate::error::ApiError;
use crate::models::{DataResponse, MessageResponse, Reminder};
use crate::routes::helpers::{ensure_customer, require_field};
use chrono::{NaiveDate, Utc};
use rocket::serde::json::Json;
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Deserialize;

/// Create/update payload for a reminder.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRequest {
    pub customer_id: i64,
    pub message: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed: bool,
}

/// List reminders, optionally filtered by customer and/or completion.
#[openapi(tag = "Reminders")]
#[get("/reminders?<customer>&<completed>")]
pub async fn list_reminders(
    customer: Option<i64>,
    completed: Option<bool>,
    mut db: Connection<CrmDb>,
) -> Result<Json<DataResponse<Vec<Reminder>>>, ApiError> {
    let reminders: Vec<Reminder> = sqlx::query_as(
        r#"SELECT id, customer_id, message, due_date, completed, created_at
           FROM reminders
           WHERE ($1 IS NULL OR customer_id = $1)
             AND ($2 IS NULL OR completed = $2)
           ORDER BY due_date IS NULL, due_date ASC, id ASC"#,
    )
    .bind(customer)
    .bind(completed)
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(DataResponse { data: reminders }))
}

/// Fetch a single reminder by id.
#[openapi(tag = "Reminders")]
#[get("/reminders/<id>")]
pub async fn get_reminder(id: i64, mut db: Connection<CrmDb>) -> Result<Json<Reminder>, ApiError> {
    let reminder: Option<Reminder> = sqlx::query_as(
        r#"SELECT id, customer_id, message, due_date, completed, created_at
           FROM reminders
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    reminder
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Reminder {id} not found")))
}

/// Create a reminder under an existing customer.
#[openapi(tag = "Reminders")]
#[post("/reminders", data = "<request>")]
pub async fn create_reminder(
    request: Json<ReminderRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Reminder>, ApiError> {
    let message = require_field("message", &request.message)?.to_string();
    ensure_customer(request.customer_id, &mut db).await?;

    let reminder: Reminder = sqlx::query_as(
        r#"INSERT INTO reminders (customer_id, message, due_date, completed, created_at)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING id, customer_id, message, due_date, completed, created_at"#,
    )
    .bind(request.customer_id)
    .bind(&message)
    .bind(request.due_date)
    .bind(request.completed)
    .bind(Utc::now())
    .fetch_one(&mut **db)
    .await?;

    Ok(Json(reminder))
}

/// Replace a reminder's fields, including its completed flag.
#[openapi(tag = "Reminders")]
#[put("/reminders/<id>", data = "<request>")]
pub async fn update_reminder(
    id: i64,
    request: Json<ReminderRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Reminder>, ApiError> {
    let message = require_field("message", &request.message)?.to_string();
    ensure_customer(request.customer_id, &mut db).await?;

    let reminder: Option<Reminder> = sqlx::query_as(
        r#"UPDATE reminders
           SET customer_id = $1, message = $2, due_date = $3, completed = $4
           WHERE id = $5
           RETURNING id, customer_id, message, due_date, completed, created_at"#,
    )
    .bind(request.customer_id)
    .bind(&message)
    .bind(request.due_date)
    .bind(request.completed)
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    reminder
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Reminder {id} not found")))
}

/// Delete a reminder.
#[openapi(tag = "Reminders")]
#[delete("/reminders/<id>")]
pub async fn delete_reminder(
    id: i64,
    mut db: Connection<CrmDb>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM reminders WHERE id = $1")
        .bind(id)
        .execute(&mut **db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Reminder {id} not found")));
    }

    Ok(Json(MessageResponse {
        message: format!("Reminder {id} deleted"),
    }))
}
