use crm_server::mail::MemoryMailer;
use crm_server::routes::emails::send_email;
use crm_server::test_support::TestRocketBuilder;
use rocket::http::{ContentType, Status};
use rocket::routes;
use std::sync::Arc;

#[test]
fn sends_one_email_through_the_relay() {
    let mailer = Arc::new(MemoryMailer::new());
    let client = TestRocketBuilder::new()
        .with_mailer(Arc::clone(&mailer))
        .mount_api_routes(routes![send_email])
        .blocking_client();

    let response = client
        .post("/api/v1/email/send")
        .header(ContentType::JSON)
        .body(r#"{"to": "ada@example.com", "subject": "Hi", "body": "Hello."}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.com");
    assert_eq!(sent[0].subject, "Hi");
}

#[test]
fn relay_failure_surfaces_as_bad_gateway() {
    let mailer = Arc::new(MemoryMailer::new());
    mailer.fail_for("bounce@example.com");

    let client = TestRocketBuilder::new()
        .with_mailer(Arc::clone(&mailer))
        .mount_api_routes(routes![send_email])
        .blocking_client();

    let response = client
        .post("/api/v1/email/send")
        .header(ContentType::JSON)
        .body(r#"{"to": "bounce@example.com", "subject": "Hi"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::BadGateway);
    assert!(mailer.sent().is_empty());
}

#[test]
fn blank_recipient_is_a_bad_request() {
    let client = TestRocketBuilder::new()
        .mount_api_routes(routes![send_email])
        .blocking_client();

    let response = client
        .post("/api/v1/email/send")
        .header(ContentType::JSON)
        .body(r#"{"to": "  ", "subject": "Hi"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);
}
