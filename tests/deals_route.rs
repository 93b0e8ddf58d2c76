use chrono::Utc;
use crm_server::models::{DataResponse, Deal, DealStage};
use crm_server::routes::deals::{PipelineStage, create_deal, deal_pipeline, update_deal};
use crm_server::test_support::{TestDatabase, TestRocketBuilder};
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use rocket::routes;

async fn client_for(db: &TestDatabase) -> Client {
    TestRocketBuilder::new()
        .with_database(db)
        .mount_api_routes(routes![create_deal, deal_pipeline, update_deal])
        .async_client()
        .await
}

async fn seed_customer(db: &TestDatabase) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO customers (name, email, phone, status, notes, created_at) VALUES ('Acme', 'acme@example.com', '', 'customer', '', $1) RETURNING id",
    )
    .bind(Utc::now())
    .fetch_one(db.pool())
    .await
    .expect("customer seeded")
}

async fn create(client: &Client, body: String) -> Deal {
    let response = client
        .post("/api/v1/deals")
        .header(ContentType::JSON)
        .body(body)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    response.into_json().await.expect("valid JSON payload")
}

async fn pipeline(client: &Client) -> Vec<PipelineStage> {
    let response = client.get("/api/v1/deals/pipeline").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let payload: DataResponse<Vec<PipelineStage>> =
        response.into_json().await.expect("valid JSON payload");
    payload.data
}

fn bucket(stages: &[PipelineStage], stage: DealStage) -> &PipelineStage {
    stages.iter().find(|b| b.stage == stage).expect("bucket present")
}

#[tokio::test]
async fn pipeline_groups_open_deals_by_stage() {
    let db = TestDatabase::new().await.expect("test database");
    let client = client_for(&db).await;
    let customer_id = seed_customer(&db).await;

    create(
        &client,
        format!(r#"{{"customerId": {customer_id}, "title": "Starter", "amount": 100.0}}"#),
    )
    .await;
    create(
        &client,
        format!(
            r#"{{"customerId": {customer_id}, "title": "Upgrade", "amount": 250.0, "stage": "proposal"}}"#
        ),
    )
    .await;
    // Closed deals stay out of the pipeline regardless of stage.
    create(
        &client,
        format!(
            r#"{{"customerId": {customer_id}, "title": "Old", "amount": 900.0, "stage": "won", "status": "closed"}}"#
        ),
    )
    .await;

    let stages = pipeline(&client).await;
    assert_eq!(stages.len(), 6);
    assert_eq!(stages[0].stage, DealStage::New);

    assert_eq!(bucket(&stages, DealStage::New).deals.len(), 1);
    assert_eq!(bucket(&stages, DealStage::Proposal).total_amount, 250.0);
    assert!(bucket(&stages, DealStage::Won).deals.is_empty());
}

#[tokio::test]
async fn moving_a_deal_to_won_shows_under_won() {
    let db = TestDatabase::new().await.expect("test database");
    let client = client_for(&db).await;
    let customer_id = seed_customer(&db).await;

    let deal = create(
        &client,
        format!(
            r#"{{"customerId": {customer_id}, "title": "Renewal", "amount": 1200.0, "stage": "negotiation"}}"#
        ),
    )
    .await;

    let response = client
        .put(format!("/api/v1/deals/{}", deal.id))
        .header(ContentType::JSON)
        .body(format!(
            r#"{{"customerId": {customer_id}, "title": "Renewal", "amount": 1200.0, "stage": "won"}}"#
        ))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let moved: Deal = response.into_json().await.expect("valid JSON payload");
    assert_eq!(moved.stage, DealStage::Won);

    let stages = pipeline(&client).await;
    let won = bucket(&stages, DealStage::Won);
    assert_eq!(won.deals.len(), 1);
    assert_eq!(won.deals[0].id, deal.id);
    assert!(bucket(&stages, DealStage::Negotiation).deals.is_empty());
}
