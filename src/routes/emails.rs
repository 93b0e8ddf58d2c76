//! Ad-hoc email sending, outside any campaign.

use crate::error::ApiError;
use crate::mail::{Mailer, OutboundEmail};
use crate::models::MessageResponse;
use crate::routes::helpers::require_field;
use rocket::State;
use rocket::serde::json::Json;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Deserialize;
use std::sync::Arc;

/// Payload for a one-off send.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    pub to: String,
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

/// Send one email through the relay.
///
/// A relay failure surfaces as a 502; no log row is written (the campaign log
/// belongs to campaign runs).
#[openapi(tag = "Email")]
#[post("/email/send", data = "<request>")]
pub async fn send_email(
    request: Json<SendEmailRequest>,
    mailer: &State<Arc<dyn Mailer>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let to = require_field("to", &request.to)?.to_string();
    let subject = require_field("subject", &request.subject)?.to_string();

    let outbound = OutboundEmail {
        to: to.clone(),
        subject,
        body: request.body.clone(),
    };

    mailer
        .send(&outbound)
        .await
        .map_err(|err| ApiError::MailRelay(err.to_string()))?;

    Ok(Json(MessageResponse {
        message: format!("Email sent to {to}"),
    }))
}
