use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::Violation;

pub type Id = String;

pub type Timestamp = DateTime<Utc>;

/// Free-form JSON object used for `conf`, `executor_config` and friends.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

pub fn now() -> Timestamp {
    Utc::now()
}

pub fn generate_job_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Identifiers are case-sensitive and must contain at least one
/// non-whitespace character.
pub fn require_identifier(field: &'static str, value: Option<String>) -> Result<Id, Violation> {
    let value = value.ok_or(Violation::Missing { field })?;
    check_identifier(field, &value)?;
    Ok(value)
}

pub fn check_identifier(field: &'static str, value: &str) -> Result<(), Violation> {
    if value.trim().is_empty() {
        return Err(Violation::Empty { field });
    }
    Ok(())
}

/// A key carried in a request body must agree with the key the request
/// addresses.
pub fn check_same_identifier(
    field: &'static str,
    current: &str,
    requested: Option<&str>,
) -> Result<(), Violation> {
    match requested {
        Some(requested) if requested != current => Err(Violation::IdentifierChanged {
            field,
            current: current.to_string(),
            requested: requested.to_string(),
        }),
        _ => Ok(()),
    }
}

pub fn non_negative_u32(field: &'static str, value: i64) -> Result<u32, Violation> {
    if value < 0 {
        return Err(Violation::Negative { field, value });
    }
    u32::try_from(value).map_err(|_| Violation::OutOfRange { field, value })
}
