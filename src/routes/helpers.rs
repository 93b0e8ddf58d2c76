//! Shared helper functions for Rocket route handlers.

use crate::db::CrmDb;
use crate::error::ApiError;
use rocket_db_pools::{Connection, sqlx};

/// Reject a blank required field with a 400 naming the field.
pub fn require_field<'v>(name: &str, value: &'v str) -> Result<&'v str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("'{name}' must not be empty")));
    }
    Ok(trimmed)
}

/// Normalize an optional substring-search term: trimmed, lower-cased, blank
/// terms dropped.
pub fn search_term(q: Option<String>) -> Option<String> {
    q.and_then(|value| {
        let normalized = value.trim().to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        }
    })
}

/// Verify that a customer row exists.
///
/// Returns [`ApiError::NotFound`] when the id is unknown; child records
/// (contacts, tasks, deals, reminders) check their parent through this before
/// writing.
pub async fn ensure_customer(customer_id: i64, db: &mut Connection<CrmDb>) -> Result<(), ApiError> {
    let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM customers WHERE id = $1")
        .bind(customer_id)
        .fetch_optional(db.as_mut())
        .await?;

    found
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound(format!("Customer {customer_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_required_fields_are_rejected() {
        assert!(require_field("name", "  ").is_err());
        assert_eq!(require_field("name", " Acme ").unwrap(), "Acme");
    }

    #[test]
    fn search_terms_normalize() {
        assert_eq!(
            search_term(Some("  ACME ".to_string())),
            Some("acme".to_string())
        );
        assert_eq!(search_term(Some("   ".to_string())), None);
        assert_eq!(search_term(None), None);
    }
}
