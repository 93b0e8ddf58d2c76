//! Outbound email delivery.
//!
//! All sending goes through the [`Mailer`] trait so the campaign engine and
//! the ad-hoc send endpoint are independent of the concrete transport. The
//! production transport is SMTP via `lettre`; tests use [`MemoryMailer`],
//! which records deliveries and can be told to fail specific recipients.

pub mod config;
pub mod memory;
pub mod smtp;

pub use config::MailConfig;
pub use memory::MemoryMailer;
pub use smtp::SmtpMailer;

use thiserror::Error;

/// A single plain-text email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Transport-agnostic mail delivery.
#[rocket::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutboundEmail) -> Result<(), MailError>;
}
