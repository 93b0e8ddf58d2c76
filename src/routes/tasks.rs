//! Task record endpoints.

use crate::db::CrmDb;
use crate::error::ApiError;
use crate::models::{DataResponse, MessageResponse, Task, TaskStatus};
use crate::routes::helpers::{ensure_customer, require_field};
use chrono::{NaiveDate, Utc};
use rocket::serde::json::Json;
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Deserialize;

fn default_status() -> TaskStatus {
    TaskStatus::Todo
}

/// Create/update payload for a task.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub customer_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
}

/// List tasks, optionally filtered by customer and/or status.
#[openapi(tag = "Tasks")]
#[get("/tasks?<customer>&<status>")]
pub async fn list_tasks(
    customer: Option<i64>,
    status: Option<TaskStatus>,
    mut db: Connection<CrmDb>,
) -> Result<Json<DataResponse<Vec<Task>>>, ApiError> {
    let tasks: Vec<Task> = sqlx::query_as(
        r#"SELECT id, customer_id, title, description, due_date, status, created_at
           FROM tasks
           WHERE ($1 IS NULL OR customer_id = $1)
             AND ($2 IS NULL OR status = $2)
           ORDER BY due_date IS NULL, due_date ASC, id ASC"#,
    )
    .bind(customer)
    .bind(status)
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(DataResponse { data: tasks }))
}

/// Fetch a single task by id.
#[openapi(tag = "Tasks")]
#[get("/tasks/<id>")]
pub async fn get_task(id: i64, mut db: Connection<CrmDb>) -> Result<Json<Task>, ApiError> {
    let task: Option<Task> = sqlx::query_as(
        r#"SELECT id, customer_id, title, description, due_date, status, created_at
           FROM tasks
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    task.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Task {id} not found")))
}

/// Create a task under an existing customer.
#[openapi(tag = "Tasks")]
#[post("/tasks", data = "<request>")]
pub async fn create_task(
    request: Json<TaskRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Task>, ApiError> {
    let title = require_field("title", &request.title)?.to_string();
    ensure_customer(request.customer_id, &mut db).await?;

    let task: Task = sqlx::query_as(
        r#"INSERT INTO tasks (customer_id, title, description, due_date, status, created_at)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id, customer_id, title, description, due_date, status, created_at"#,
    )
    .bind(request.customer_id)
    .bind(&title)
    .bind(&request.description)
    .bind(request.due_date)
    .bind(request.status)
    .bind(Utc::now())
    .fetch_one(&mut **db)
    .await?;

    Ok(Json(task))
}

/// Replace a task's fields.
#[openapi(tag = "Tasks")]
#[put("/tasks/<id>", data = "<request>")]
pub async fn update_task(
    id: i64,
    request: Json<TaskRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Task>, ApiError> {
    let title = require_field("title", &request.title)?.to_string();
    ensure_customer(request.customer_id, &mut db).await?;

    let task: Option<Task> = sqlx::query_as(
        r#"UPDATE tasks
           SET customer_id = $1, title = $2, description = $3, due_date = $4, status = $5
           WHERE id = $6
           RETURNING id, customer_id, title, description, due_date, status, created_at"#,
    )
    .bind(request.customer_id)
    .bind(&title)
    .bind(&request.description)
    .bind(request.due_date)
    .bind(request.status)
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    task.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Task {id} not found")))
}

/// Delete a task.
#[openapi(tag = "Tasks")]
#[delete("/tasks/<id>")]
pub async fn delete_task(
    id: i64,
    mut db: Connection<CrmDb>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(&mut **db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Task {id} not found")));
    }

    Ok(Json(MessageResponse {
        message: format!("Task {id} deleted"),
    }))
}
