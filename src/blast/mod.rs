//! Campaign blast execution.
//!
//! A blast resolves a segment into a recipient list, then walks the cross
//! product of recipients and the campaign's email steps, attempting one send
//! per pair and appending one `campaign_logs` row per attempt. Wait steps are
//! stored and listed but carry no executable semantics; the engine skips them.
//! A relay or parse failure is recorded on the affected rows and never aborts
//! the remaining attempts.

pub mod engine;
pub mod steps;

pub use engine::{RunReport, execute, resolve_recipients, validate_filter_value};
pub use steps::{EmailContent, StepParseError, parse_email_details};
