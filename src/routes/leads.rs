//! Lead record endpoints, including conversion into a customer.

use crate::db::CrmDb;
use crate::error::ApiError;
use crate::models::{
    Contact, Customer, CustomerStatus, DataResponse, Lead, LeadStatus, MessageResponse,
};
use crate::routes::helpers::{require_field, search_term};
use chrono::Utc;
use rocket::State;
use rocket::serde::json::Json;
use rocket_db_pools::sqlx::SqlitePool;
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

fn default_status() -> LeadStatus {
    LeadStatus::New
}

/// Create/update payload for a lead.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub company: String,
    #[serde(default = "default_status")]
    pub status: LeadStatus,
    #[serde(default)]
    pub notes: String,
}

/// Result of a lead conversion: the new customer and its primary contact.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub customer: Customer,
    pub contact: Contact,
}

/// List leads, optionally filtered by a case-insensitive substring over
/// name/email/company (`q`) and/or an exact status.
#[openapi(tag = "Leads")]
#[get("/leads?<q>&<status>")]
pub async fn list_leads(
    q: Option<String>,
    status: Option<LeadStatus>,
    mut db: Connection<CrmDb>,
) -> Result<Json<DataResponse<Vec<Lead>>>, ApiError> {
    let term = search_term(q);

    let leads: Vec<Lead> = sqlx::query_as(
        r#"SELECT id, name, email, phone, company, status, notes, created_at
           FROM leads
           WHERE ($1 IS NULL OR status = $1)
             AND ($2 IS NULL
                  OR instr(lower(name), $2) > 0
                  OR instr(lower(email), $2) > 0
                  OR instr(lower(company), $2) > 0)
           ORDER BY name COLLATE NOCASE ASC"#,
    )
    .bind(status)
    .bind(term)
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(DataResponse { data: leads }))
}

/// Fetch a single lead by id.
#[openapi(tag = "Leads")]
#[get("/leads/<id>")]
pub async fn get_lead(id: i64, mut db: Connection<CrmDb>) -> Result<Json<Lead>, ApiError> {
    let lead: Option<Lead> = sqlx::query_as(
        r#"SELECT id, name, email, phone, company, status, notes, created_at
           FROM leads
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    lead.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Lead {id} not found")))
}

/// Create a lead. A duplicate email is rejected by the store's unique
/// constraint and surfaces as a 409.
#[openapi(tag = "Leads")]
#[post("/leads", data = "<request>")]
pub async fn create_lead(
    request: Json<LeadRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Lead>, ApiError> {
    let name = require_field("name", &request.name)?.to_string();
    let email = require_field("email", &request.email)?.to_string();

    let lead: Lead = sqlx::query_as(
        r#"INSERT INTO leads (name, email, phone, company, status, notes, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           RETURNING id, name, email, phone, company, status, notes, created_at"#,
    )
    .bind(&name)
    .bind(&email)
    .bind(&request.phone)
    .bind(&request.company)
    .bind(request.status)
    .bind(&request.notes)
    .bind(Utc::now())
    .fetch_one(&mut **db)
    .await?;

    Ok(Json(lead))
}

/// Replace a lead's fields.
#[openapi(tag = "Leads")]
#[put("/leads/<id>", data = "<request>")]
pub async fn update_lead(
    id: i64,
    request: Json<LeadRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Lead>, ApiError> {
    let name = require_field("name", &request.name)?.to_string();
    let email = require_field("email", &request.email)?.to_string();

    let lead: Option<Lead> = sqlx::query_as(
        r#"UPDATE leads
           SET name = $1, email = $2, phone = $3, company = $4, status = $5, notes = $6
           WHERE id = $7
           RETURNING id, name, email, phone, company, status, notes, created_at"#,
    )
    .bind(&name)
    .bind(&email)
    .bind(&request.phone)
    .bind(&request.company)
    .bind(request.status)
    .bind(&request.notes)
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    lead.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Lead {id} not found")))
}

/// Delete a lead.
#[openapi(tag = "Leads")]
#[delete("/leads/<id>")]
pub async fn delete_lead(
    id: i64,
    mut db: Connection<CrmDb>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM leads WHERE id = $1")
        .bind(id)
        .execute(&mut **db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Lead {id} not found")));
    }

    Ok(Json(MessageResponse {
        message: format!("Lead {id} deleted"),
    }))
}

/// Convert a lead into a customer with a primary contact.
///
/// Runs inside one store transaction: the new customer copies the lead's
/// name/email/phone/notes with status forced to `lead`, a contact with role
/// "Primary" is created under it, and the lead row is deleted. Any failure,
/// including a duplicate customer email, rolls back all three steps.
#[openapi(tag = "Leads")]
#[post("/leads/<id>/convert")]
pub async fn convert_lead(
    id: i64,
    pool: &State<SqlitePool>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let mut tx = pool.begin().await?;

    let lead: Lead = sqlx::query_as(
        r#"SELECT id, name, email, phone, company, status, notes, created_at
           FROM leads
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Lead {id} not found")))?;

    let customer: Customer = sqlx::query_as(
        r#"INSERT INTO customers (name, email, phone, status, notes, created_at)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id, name, email, phone, status, notes, created_at"#,
    )
    .bind(&lead.name)
    .bind(&lead.email)
    .bind(&lead.phone)
    .bind(CustomerStatus::Lead)
    .bind(&lead.notes)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    let contact: Contact = sqlx::query_as(
        r#"INSERT INTO contacts (customer_id, name, email, phone, role, created_at)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id, customer_id, name, email, phone, role, created_at"#,
    )
    .bind(customer.id)
    .bind(&lead.name)
    .bind(&lead.email)
    .bind(&lead.phone)
    .bind("Primary")
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM leads WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    log::info!("converted lead {} into customer {}", id, customer.id);

    Ok(Json(ConvertResponse { customer, contact }))
}
