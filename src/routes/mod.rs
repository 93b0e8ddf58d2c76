//! HTTP route handlers grouped by resource domain.
//!
//! Each submodule corresponds to one record type of the CRM (customers,
//! leads, campaigns, etc.) and exposes typed Rocket handlers annotated with
//! `#[openapi]` so `rocket_okapi` can derive an OpenAPI document
//! automatically.

pub mod activities;
pub mod campaigns;
pub mod contacts;
pub mod customers;
pub mod deals;
pub mod emails;
pub mod health;
pub(crate) mod helpers;
pub mod leads;
pub mod reminders;
pub mod segments;
pub mod stats;
pub mod tasks;
