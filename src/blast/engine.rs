//! The recipients × email-steps execution loop.

use crate::error::ApiError;
use crate::mail::{Mailer, OutboundEmail};
use crate::models::{
    Campaign, CampaignStatus, CampaignStep, CustomerStatus, DeliveryStatus, LeadStatus, Segment,
    SegmentKind, StepKind,
};
use chrono::Utc;
use rocket_db_pools::sqlx::{self, SqlitePool};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::steps::parse_email_details;

/// Summary of one campaign run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Number of addresses the segment resolved to.
    pub recipients: usize,
    /// Email steps executed (including ones that failed to parse).
    pub email_steps: usize,
    /// Wait steps present on the campaign but not interpreted.
    pub wait_steps_skipped: usize,
    /// Send attempts made, one log row each.
    pub attempts: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Check a segment's `filter_value` against the status space of its
/// `filter_kind` entity.
pub fn validate_filter_value(kind: SegmentKind, value: &str) -> Result<(), String> {
    match kind {
        SegmentKind::Lead => value.parse::<LeadStatus>().map(|_| ()),
        SegmentKind::Customer => value.parse::<CustomerStatus>().map(|_| ()),
    }
}

/// Resolve a segment into the email addresses it selects.
///
/// Leads or customers (by `filter_kind`) whose status equals `filter_value`,
/// or every row of that entity when the filter value is null or blank. The
/// same routine backs the segment preview endpoint and the blast engine.
pub async fn resolve_recipients(
    pool: &SqlitePool,
    segment: &Segment,
) -> Result<Vec<String>, ApiError> {
    let filter = segment
        .filter_value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(value) = filter {
        validate_filter_value(segment.filter_kind, value).map_err(ApiError::BadRequest)?;
    }

    let table = match segment.filter_kind {
        SegmentKind::Lead => "leads",
        SegmentKind::Customer => "customers",
    };

    let query = format!("SELECT email FROM {table} WHERE ($1 IS NULL OR status = $1) ORDER BY id");

    let recipients: Vec<String> = sqlx::query_scalar(&query)
        .bind(filter)
        .fetch_all(pool)
        .await?;

    Ok(recipients)
}

/// Run a campaign against a segment.
///
/// Appends exactly one `campaign_logs` row per send attempt as the loop goes,
/// so an interrupted run keeps the rows already written. Re-running the same
/// campaign re-sends and re-logs everything; there is no deduplication across
/// runs. The campaign row is marked completed once the loop finishes.
pub async fn execute(
    pool: &SqlitePool,
    mailer: &dyn Mailer,
    campaign: &Campaign,
    segment: &Segment,
) -> Result<RunReport, ApiError> {
    let recipients = resolve_recipients(pool, segment).await?;

    let steps: Vec<CampaignStep> = sqlx::query_as(
        r#"SELECT id, campaign_id, kind, details, step_order
           FROM campaign_steps
           WHERE campaign_id = $1
           ORDER BY step_order ASC, id ASC"#,
    )
    .bind(campaign.id)
    .fetch_all(pool)
    .await?;

    log::info!(
        "running campaign {} against segment {}: {} recipients, {} steps",
        campaign.id,
        segment.id,
        recipients.len(),
        steps.len()
    );

    let mut report = RunReport {
        recipients: recipients.len(),
        email_steps: 0,
        wait_steps_skipped: 0,
        attempts: 0,
        sent: 0,
        failed: 0,
    };

    for step in &steps {
        match step.kind {
            StepKind::Wait => {
                // Stored but never interpreted; no delay semantics exist.
                log::debug!("skipping wait step {} of campaign {}", step.id, campaign.id);
                report.wait_steps_skipped += 1;
            }
            StepKind::Email => {
                report.email_steps += 1;
                let content = parse_email_details(&step.details);

                for recipient in &recipients {
                    let (status, detail) = match &content {
                        Err(err) => (DeliveryStatus::Failed, err.to_string()),
                        Ok(email) => {
                            let outbound = OutboundEmail {
                                to: recipient.clone(),
                                subject: email.subject.clone(),
                                body: email.body.clone(),
                            };
                            match mailer.send(&outbound).await {
                                Ok(()) => (DeliveryStatus::Sent, String::new()),
                                Err(err) => {
                                    log::warn!(
                                        "campaign {} step {} to {}: {}",
                                        campaign.id,
                                        step.id,
                                        recipient,
                                        err
                                    );
                                    (DeliveryStatus::Failed, err.to_string())
                                }
                            }
                        }
                    };

                    sqlx::query(
                        r#"INSERT INTO campaign_logs
                           (campaign_id, segment_id, recipient_email, step_id, status, detail, timestamp)
                           VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
                    )
                    .bind(campaign.id)
                    .bind(segment.id)
                    .bind(recipient)
                    .bind(step.id)
                    .bind(status)
                    .bind(&detail)
                    .bind(Utc::now())
                    .execute(pool)
                    .await?;

                    report.attempts += 1;
                    match status {
                        DeliveryStatus::Sent => report.sent += 1,
                        _ => report.failed += 1,
                    }
                }
            }
        }
    }

    sqlx::query("UPDATE campaigns SET status = $1 WHERE id = $2")
        .bind(CampaignStatus::Completed)
        .bind(campaign.id)
        .execute(pool)
        .await?;

    log::info!(
        "campaign {} finished: {} sent, {} failed",
        campaign.id,
        report.sent,
        report.failed
    );

    Ok(report)
}
