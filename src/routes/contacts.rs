//! Contact record endpoints.

use crate::db::CrmDb;
use crate::error::ApiError;
use crate::models::{Contact, DataResponse, MessageResponse};
use crate::routes::helpers::{ensure_customer, require_field};
use chrono::Utc;
use rocket::serde::json::Json;
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Deserialize;

/// Create/update payload for a contact.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    pub customer_id: i64,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role: String,
}

/// List contacts, optionally restricted to one customer.
#[openapi(tag = "Contacts")]
#[get("/contacts?<customer>")]
pub async fn list_contacts(
    customer: Option<i64>,
    mut db: Connection<CrmDb>,
) -> Result<Json<DataResponse<Vec<Contact>>>, ApiError> {
    let contacts: Vec<Contact> = sqlx::query_as(
        r#"SELECT id, customer_id, name, email, phone, role, created_at
           FROM contacts
           WHERE ($1 IS NULL OR customer_id = $1)
           ORDER BY name COLLATE NOCASE ASC"#,
    )
    .bind(customer)
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(DataResponse { data: contacts }))
}

/// Fetch a single contact by id.
#[openapi(tag = "Contacts")]
#[get("/contacts/<id>")]
pub async fn get_contact(id: i64, mut db: Connection<CrmDb>) -> Result<Json<Contact>, ApiError> {
    let contact: Option<Contact> = sqlx::query_as(
        r#"SELECT id, customer_id, name, email, phone, role, created_at
           FROM contacts
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    contact
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Contact {id} not found")))
}

/// Create a contact under an existing customer.
#[openapi(tag = "Contacts")]
#[post("/contacts", data = "<request>")]
pub async fn create_contact(
    request: Json<ContactRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Contact>, ApiError> {
    let name = require_field("name", &request.name)?.to_string();
    ensure_customer(request.customer_id, &mut db).await?;

    let contact: Contact = sqlx::query_as(
        r#"INSERT INTO contacts (customer_id, name, email, phone, role, created_at)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id, customer_id, name, email, phone, role, created_at"#,
    )
    .bind(request.customer_id)
    .bind(&name)
    .bind(&request.email)
    .bind(&request.phone)
    .bind(&request.role)
    .bind(Utc::now())
    .fetch_one(&mut **db)
    .await?;

    Ok(Json(contact))
}

/// Replace a contact's fields.
#[openapi(tag = "Contacts")]
#[put("/contacts/<id>", data = "<request>")]
pub async fn update_contact(
    id: i64,
    request: Json<ContactRequest>,
    mut db: Connection<CrmDb>,
) -> Result<Json<Contact>, ApiError> {
    let name = require_field("name", &request.name)?.to_string();
    ensure_customer(request.customer_id, &mut db).await?;

    let contact: Option<Contact> = sqlx::query_as(
        r#"UPDATE contacts
           SET customer_id = $1, name = $2, email = $3, phone = $4, role = $5
           WHERE id = $6
           RETURNING id, customer_id, name, email, phone, role, created_at"#,
    )
    .bind(request.customer_id)
    .bind(&name)
    .bind(&request.email)
    .bind(&request.phone)
    .bind(&request.role)
    .bind(id)
    .fetch_optional(&mut **db)
    .await?;

    contact
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Contact {id} not found")))
}

/// Delete a contact.
#[openapi(tag = "Contacts")]
#[delete("/contacts/<id>")]
pub async fn delete_contact(
    id: i64,
    mut db: Connection<CrmDb>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
        .bind(id)
        .execute(&mut **db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Contact {id} not found")));
    }

    Ok(Json(MessageResponse {
        message: format!("Contact {id} deleted"),
    }))
}
