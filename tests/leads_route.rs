use chrono::Utc;
use crm_server::models::CustomerStatus;
use crm_server::routes::leads::{ConvertResponse, convert_lead, create_lead, get_lead};
use crm_server::test_support::{TestDatabase, TestRocketBuilder};
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use rocket::routes;

async fn client_for(db: &TestDatabase) -> Client {
    TestRocketBuilder::new()
        .with_database(db)
        .mount_api_routes(routes![convert_lead, create_lead, get_lead])
        .async_client()
        .await
}

async fn seed_lead(client: &Client) -> i64 {
    let response = client
        .post("/api/v1/leads")
        .header(ContentType::JSON)
        .body(
            r#"{"name": "Grace Hopper", "email": "grace@navy.example",
                "phone": "555-0100", "company": "USS Hopper", "notes": "met at conf"}"#,
        )
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let lead: crm_server::models::Lead = response.into_json().await.expect("valid JSON payload");
    lead.id
}

#[tokio::test]
async fn converting_a_lead_creates_customer_and_primary_contact() {
    let db = TestDatabase::new().await.expect("test database");
    let client = client_for(&db).await;
    let lead_id = seed_lead(&client).await;

    let response = client
        .post(format!("/api/v1/leads/{lead_id}/convert"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let converted: ConvertResponse = response.into_json().await.expect("valid JSON payload");
    assert_eq!(converted.customer.name, "Grace Hopper");
    assert_eq!(converted.customer.email, "grace@navy.example");
    assert_eq!(converted.customer.phone, "555-0100");
    assert_eq!(converted.customer.notes, "met at conf");
    assert_eq!(converted.customer.status, CustomerStatus::Lead);
    assert_eq!(converted.contact.customer_id, converted.customer.id);
    assert_eq!(converted.contact.role, "Primary");
    assert_eq!(converted.contact.email, "grace@navy.example");

    // The source lead is gone.
    let response = client
        .get(format!("/api/v1/leads/{lead_id}"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);

    let customers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
        .fetch_one(db.pool())
        .await
        .expect("count succeeded");
    assert_eq!(customers, 1);
}

#[tokio::test]
async fn failed_conversion_rolls_back_every_step() {
    let db = TestDatabase::new().await.expect("test database");
    let client = client_for(&db).await;
    let lead_id = seed_lead(&client).await;

    // A customer already owns the lead's email, so the conversion's insert
    // hits the unique constraint.
    sqlx::query(
        "INSERT INTO customers (name, email, phone, status, notes, created_at) VALUES ('Existing', 'grace@navy.example', '', 'customer', '', $1)",
    )
    .bind(Utc::now())
    .execute(db.pool())
    .await
    .expect("customer seeded");

    let response = client
        .post(format!("/api/v1/leads/{lead_id}/convert"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);

    // Nothing persisted: the lead survives, no contact was created, and the
    // only customer is the pre-existing one.
    let response = client
        .get(format!("/api/v1/leads/{lead_id}"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let contacts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contacts")
        .fetch_one(db.pool())
        .await
        .expect("count succeeded");
    assert_eq!(contacts, 0);

    let customers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
        .fetch_one(db.pool())
        .await
        .expect("count succeeded");
    assert_eq!(customers, 1);
}

#[tokio::test]
async fn converting_an_unknown_lead_is_not_found() {
    let db = TestDatabase::new().await.expect("test database");
    let client = client_for(&db).await;

    let response = client.post("/api/v1/leads/999/convert").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
}
