use chrono::Utc;
use crm_server::models::{Customer, CustomerStatus, DataResponse};
use crm_server::routes::customers::{
    create_customer, delete_customer, get_customer, list_customers,
};
use crm_server::test_support::TestDatabase;
use crm_server::test_support::TestRocketBuilder;
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use rocket::routes;
use sqlx::SqlitePool;

async fn client_for(db: &TestDatabase) -> Client {
    TestRocketBuilder::new()
        .with_database(db)
        .mount_api_routes(routes![
            create_customer,
            delete_customer,
            get_customer,
            list_customers
        ])
        .async_client()
        .await
}

async fn create(client: &Client, body: &str) -> (Status, Option<Customer>) {
    let response = client
        .post("/api/v1/customers")
        .header(ContentType::JSON)
        .body(body)
        .dispatch()
        .await;

    let status = response.status();
    let customer = if status == Status::Ok {
        response.into_json().await
    } else {
        None
    };
    (status, customer)
}

#[tokio::test]
async fn duplicate_customer_email_is_rejected() {
    let db = TestDatabase::new().await.expect("test database");
    let client = client_for(&db).await;

    let (status, customer) =
        create(&client, r#"{"name": "Acme Corp", "email": "hello@acme.io"}"#).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(customer.unwrap().status, CustomerStatus::Lead);

    let (status, _) =
        create(&client, r#"{"name": "Acme Again", "email": "hello@acme.io"}"#).await;
    assert_eq!(status, Status::Conflict);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
        .fetch_one(db.pool())
        .await
        .expect("count succeeded");
    assert_eq!(rows, 1, "the rejected create must not leave a row behind");
}

#[tokio::test]
async fn blank_required_field_is_a_bad_request() {
    let db = TestDatabase::new().await.expect("test database");
    let client = client_for(&db).await;

    let (status, _) = create(&client, r#"{"name": "   ", "email": "x@y.z"}"#).await;
    assert_eq!(status, Status::BadRequest);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
        .fetch_one(db.pool())
        .await
        .expect("count succeeded");
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn search_matches_name_and_email_case_insensitively() {
    let db = TestDatabase::new().await.expect("test database");
    let client = client_for(&db).await;

    create(&client, r#"{"name": "ACME Industrial", "email": "ops@example.com"}"#).await;
    create(&client, r#"{"name": "Globex", "email": "sales@acme.example"}"#).await;
    create(&client, r#"{"name": "Initech", "email": "info@initech.example"}"#).await;

    let response = client.get("/api/v1/customers?q=acme").dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    let payload: DataResponse<Vec<Customer>> =
        response.into_json().await.expect("valid JSON payload");
    let names: Vec<&str> = payload.data.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["ACME Industrial", "Globex"]);
}

async fn seed_child_rows(pool: &SqlitePool, customer_id: i64) {
    sqlx::query(
        "INSERT INTO contacts (customer_id, name, email, phone, role, created_at) VALUES ($1, 'Ann', '', '', 'Primary', $2)",
    )
    .bind(customer_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("contact seeded");

    sqlx::query(
        "INSERT INTO tasks (customer_id, title, description, status, created_at) VALUES ($1, 'Call back', '', 'todo', $2)",
    )
    .bind(customer_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("task seeded");

    sqlx::query(
        "INSERT INTO deals (customer_id, title, amount, stage, status, created_at) VALUES ($1, 'Renewal', 1200.0, 'new', 'open', $2)",
    )
    .bind(customer_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("deal seeded");

    sqlx::query(
        "INSERT INTO reminders (customer_id, message, completed, created_at) VALUES ($1, 'Follow up', 0, $2)",
    )
    .bind(customer_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("reminder seeded");
}

#[tokio::test]
async fn deleting_a_customer_cascades_to_children() {
    let db = TestDatabase::new().await.expect("test database");
    let client = client_for(&db).await;

    let (_, customer) =
        create(&client, r#"{"name": "Acme Corp", "email": "hello@acme.io"}"#).await;
    let customer_id = customer.unwrap().id;

    seed_child_rows(db.pool(), customer_id).await;

    let response = client
        .delete(format!("/api/v1/customers/{customer_id}"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    for table in ["contacts", "tasks", "deals", "reminders"] {
        let remaining: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE customer_id = $1"))
                .bind(customer_id)
                .fetch_one(db.pool())
                .await
                .expect("count succeeded");
        assert_eq!(remaining, 0, "{table} rows should cascade away");
    }

    let response = client
        .get(format!("/api/v1/customers/{customer_id}"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
}
