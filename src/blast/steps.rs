//! Parsing of email step payloads.

use thiserror::Error;

/// Separator between subject and body in an email step's `details` column.
pub const DETAILS_SEPARATOR: &str = "|||";

/// Subject and body extracted from an email step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepParseError {
    #[error("email step details missing '{DETAILS_SEPARATOR}' separator")]
    MissingSeparator,
}

/// Parse an email step's `details` as `subject|||body`.
///
/// Only the first separator is significant, so the body may itself contain
/// `|||`. A missing separator is a well-defined parse failure; the blast
/// engine records it per recipient instead of aborting the batch.
pub fn parse_email_details(details: &str) -> Result<EmailContent, StepParseError> {
    let (subject, body) = details
        .split_once(DETAILS_SEPARATOR)
        .ok_or(StepParseError::MissingSeparator)?;

    Ok(EmailContent {
        subject: subject.to_string(),
        body: body.to_string(),
    })
}
