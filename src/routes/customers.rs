//! Customer record endpoints.

use crate::db::CrmDb;
use crate::error::ApiError;
use crate::models::{Customer, CustomerStatus, DataResponse, MessageResponse};
use crate::routes::helpers::{require_field, search_term};
use chrono::Utc;
use rocket::serde::json::Json;
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Deserialize;

fn default_status() -> CustomerStatus {
    CustomerStatus::Lead
}

/// Create/update payload for a customer. Omitted optional fields default.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default = "default_status")]
    pub status: CustomerStatus,
    #[serde(default)]
    pub notes: String,
}

/// List customers, optionally filtered by a case-insensitive substring over
/// name/email (`q`) and/or an exact status.
#[openapi(tag = "Customers")]
#[get("/customers?<q>&<status>")]
pub async fn list_customers(
    q: Option<String>,
    status: Option<CustomerStatus>,
    mut db: Connection<CrmDb>,
) -> Result<Json<DataResponse<Vec<Customer>>>, ApiError> {
    let term = search_term(q);

    let customers: Vec<Customer> = sqlx::query_as(
        r#"SELECT id, name, email, phone, status, notes, created_at
           FROM customers
           WHERE ($1 IS NULL OR status = $1)
             AND ($2 IS NULL OR instr(lower(name), $2) > 0 OR instr(lower(email), $2) > 0)
           ORDER BY name COLLATE NOCASE ASC"#,
    )
    .bind(status)
    .bind(term)
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(DataResponse { data: customers }))
}

/// Fetch a single customer by id.
#[openapi(tag = "Customers")]
#[get("/customers/<id>")]
pub async fn get_customer(id: i64, mut db: Connection<CrmDb>) -> Result<Json<Customer>, ApiError> {
    let customer: Option<Customer> = sqlx::query_as(
        r#"SELECT id, name, email, phone, status, notes, created_at
           FROM customers
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    customer
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Customer {id} not found")))
}

/// Create a customer. A duplicate email is rejected by the store's unique
/// constraint and surfaces as a 409.
#[openapi(tag = "Customers")]
#[post("/customers", data = "<request>")]
pub async fn create_customer(
    request: Json<CustomerRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Customer>, ApiError> {
    let name = require_field("name", &request.name)?.to_string();
    let email = require_field("email", &request.email)?.to_string();

    let customer: Customer = sqlx::query_as(
        r#"INSERT INTO customers (name, email, phone, status, notes, created_at)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id, name, email, phone, status, notes, created_at"#,
    )
    .bind(&name)
    .bind(&email)
    .bind(&request.phone)
    .bind(request.status)
    .bind(&request.notes)
    .bind(Utc::now())
    .fetch_one(&mut **db)
    .await?;

    log::info!("created customer {} ({})", customer.id, customer.email);

    Ok(Json(customer))
}

/// Replace a customer's fields. Last write wins; there is no optimistic
/// concurrency control.
#[openapi(tag = "Customers")]
#[put("/customers/<id>", data = "<request>")]
pub async fn update_customer(
    id: i64,
    request: Json<CustomerRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Customer>, ApiError> {
    let name = require_field("name", &request.name)?.to_string();
    let email = require_field("email", &request.email)?.to_string();

    let customer: Option<Customer> = sqlx::query_as(
        r#"UPDATE customers
           SET name = $1, email = $2, phone = $3, status = $4, notes = $5
           WHERE id = $6
           RETURNING id, name, email, phone, status, notes, created_at"#,
    )
    .bind(&name)
    .bind(&email)
    .bind(&request.phone)
    .bind(request.status)
    .bind(&request.notes)
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    customer
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Customer {id} not found")))
}

/// Delete a customer. The store cascades to its contacts, tasks, deals, and
/// reminders.
#[openapi(tag = "Customers")]
#[delete("/customers/<id>")]
pub async fn delete_customer(
    id: i64,
    mut db: Connection<CrmDb>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM customers WHERE id = $1")
        .bind(id)
        .execute(&mut **db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Customer {id} not found")));
    }

    log::info!("deleted customer {id}");

    Ok(Json(MessageResponse {
        message: format!("Customer {id} deleted"),
    }))
}
