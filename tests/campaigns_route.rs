use chrono::Utc;
use crm_server::blast::RunReport;
use crm_server::mail::MemoryMailer;
use crm_server::models::{Campaign, CampaignLog, CampaignStatus, DataResponse, DeliveryStatus};
use crm_server::routes::campaigns::{
    add_campaign_step, create_campaign, get_campaign, list_campaign_logs, run_campaign,
};
use crm_server::test_support::{TestDatabase, TestRocketBuilder};
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use rocket::routes;
use std::sync::Arc;

async fn client_for(db: &TestDatabase, mailer: Arc<MemoryMailer>) -> Client {
    TestRocketBuilder::new()
        .with_database(db)
        .with_mailer(mailer)
        .mount_api_routes(routes![
            add_campaign_step,
            create_campaign,
            get_campaign,
            list_campaign_logs,
            run_campaign
        ])
        .async_client()
        .await
}

/// Three leads with status `new` and a segment selecting them.
async fn seed_recipients(db: &TestDatabase) -> i64 {
    for email in ["ada@example.com", "grace@example.com", "ann@example.com"] {
        sqlx::query(
            "INSERT INTO leads (name, email, phone, company, status, notes, created_at) VALUES ($1, $1, '', '', 'new', '', $2)",
        )
        .bind(email)
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .expect("lead seeded");
    }

    sqlx::query_scalar(
        "INSERT INTO segments (name, filter_kind, filter_value, created_at) VALUES ('fresh leads', 'lead', 'new', $1) RETURNING id",
    )
    .bind(Utc::now())
    .fetch_one(db.pool())
    .await
    .expect("segment seeded")
}

async fn seed_campaign(client: &Client, steps: &[(&str, &str)]) -> i64 {
    let response = client
        .post("/api/v1/campaigns")
        .header(ContentType::JSON)
        .body(r#"{"name": "Spring push", "status": "active"}"#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let campaign: Campaign = response.into_json().await.expect("valid JSON payload");

    for (kind, details) in steps {
        let response = client
            .post(format!("/api/v1/campaigns/{}/steps", campaign.id))
            .header(ContentType::JSON)
            .body(format!(r#"{{"kind": "{kind}", "details": "{details}"}}"#))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }

    campaign.id
}

async fn run(client: &Client, campaign_id: i64, segment_id: i64) -> RunReport {
    let response = client
        .post(format!("/api/v1/campaigns/{campaign_id}/run"))
        .header(ContentType::JSON)
        .body(format!(r#"{{"segmentId": {segment_id}}}"#))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    response.into_json().await.expect("valid JSON payload")
}

async fn logs(client: &Client, campaign_id: i64) -> Vec<CampaignLog> {
    let response = client
        .get(format!("/api/v1/campaigns/{campaign_id}/logs"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let payload: DataResponse<Vec<CampaignLog>> =
        response.into_json().await.expect("valid JSON payload");
    payload.data
}

#[tokio::test]
async fn blast_logs_one_row_per_recipient_and_email_step() {
    let db = TestDatabase::new().await.expect("test database");
    let mailer = Arc::new(MemoryMailer::new());
    let client = client_for(&db, Arc::clone(&mailer)).await;

    let segment_id = seed_recipients(&db).await;
    let campaign_id = seed_campaign(
        &client,
        &[
            ("email", "Welcome|||Glad to have you."),
            ("email", "Follow up|||Any questions?"),
        ],
    )
    .await;

    let report = run(&client, campaign_id, segment_id).await;
    assert_eq!(report.recipients, 3);
    assert_eq!(report.email_steps, 2);
    assert_eq!(report.attempts, 6);
    assert_eq!(report.sent, 6);
    assert_eq!(report.failed, 0);

    let rows = logs(&client, campaign_id).await;
    assert_eq!(rows.len(), 6);
    for row in &rows {
        assert_eq!(row.campaign_id, campaign_id);
        assert_eq!(row.segment_id, segment_id);
        assert_eq!(row.status, DeliveryStatus::Sent);
        assert!(row.step_id > 0);
    }

    // Each recipient got both steps.
    for email in ["ada@example.com", "grace@example.com", "ann@example.com"] {
        let per_recipient = rows.iter().filter(|r| r.recipient_email == email).count();
        assert_eq!(per_recipient, 2);
    }

    let delivered = mailer.sent();
    assert_eq!(delivered.len(), 6);
    assert!(delivered.iter().any(|m| m.subject == "Welcome"));
    assert!(delivered.iter().any(|m| m.subject == "Follow up"));

    // The run marks the campaign completed.
    let response = client
        .get(format!("/api/v1/campaigns/{campaign_id}"))
        .dispatch()
        .await;
    let campaign: Campaign = response.into_json().await.expect("valid JSON payload");
    assert_eq!(campaign.status, CampaignStatus::Completed);
}

#[tokio::test]
async fn relay_failure_is_logged_and_does_not_abort_the_batch() {
    let db = TestDatabase::new().await.expect("test database");
    let mailer = Arc::new(MemoryMailer::new());
    mailer.fail_for("grace@example.com");
    let client = client_for(&db, Arc::clone(&mailer)).await;

    let segment_id = seed_recipients(&db).await;
    let campaign_id = seed_campaign(&client, &[("email", "Hello|||Hi.")]).await;

    let report = run(&client, campaign_id, segment_id).await;
    assert_eq!(report.attempts, 3);
    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 1);

    let rows = logs(&client, campaign_id).await;
    let failed: Vec<_> = rows
        .iter()
        .filter(|r| r.status == DeliveryStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].recipient_email, "grace@example.com");
    assert!(failed[0].detail.contains("simulated relay failure"));

    assert_eq!(mailer.sent().len(), 2);
}

#[tokio::test]
async fn malformed_email_step_fails_per_recipient_without_crashing() {
    let db = TestDatabase::new().await.expect("test database");
    let mailer = Arc::new(MemoryMailer::new());
    let client = client_for(&db, Arc::clone(&mailer)).await;

    let segment_id = seed_recipients(&db).await;
    // First step lacks the subject/body separator; the second is fine.
    let campaign_id = seed_campaign(
        &client,
        &[("email", "no separator here"), ("email", "Ok|||Fine.")],
    )
    .await;

    let report = run(&client, campaign_id, segment_id).await;
    assert_eq!(report.attempts, 6);
    assert_eq!(report.sent, 3);
    assert_eq!(report.failed, 3);

    let rows = logs(&client, campaign_id).await;
    let parse_failures: Vec<_> = rows
        .iter()
        .filter(|r| r.status == DeliveryStatus::Failed)
        .collect();
    assert_eq!(parse_failures.len(), 3);
    for row in parse_failures {
        assert!(row.detail.contains("separator"));
    }

    // Only the well-formed step reached the relay.
    assert_eq!(mailer.sent().len(), 3);
}

#[tokio::test]
async fn wait_steps_are_stored_but_not_executed() {
    let db = TestDatabase::new().await.expect("test database");
    let mailer = Arc::new(MemoryMailer::new());
    let client = client_for(&db, Arc::clone(&mailer)).await;

    let segment_id = seed_recipients(&db).await;
    let campaign_id = seed_campaign(
        &client,
        &[("wait", "3 days"), ("email", "Ping|||Still there?")],
    )
    .await;

    let report = run(&client, campaign_id, segment_id).await;
    assert_eq!(report.wait_steps_skipped, 1);
    assert_eq!(report.email_steps, 1);
    assert_eq!(report.attempts, 3);

    // No log rows for the wait step.
    let rows = logs(&client, campaign_id).await;
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn rerunning_a_campaign_resends_and_relogs() {
    let db = TestDatabase::new().await.expect("test database");
    let mailer = Arc::new(MemoryMailer::new());
    let client = client_for(&db, Arc::clone(&mailer)).await;

    let segment_id = seed_recipients(&db).await;
    let campaign_id = seed_campaign(&client, &[("email", "Hello|||Hi.")]).await;

    run(&client, campaign_id, segment_id).await;
    run(&client, campaign_id, segment_id).await;

    assert_eq!(logs(&client, campaign_id).await.len(), 6);
    assert_eq!(mailer.sent().len(), 6);
}
