use thiserror::Error;

/// A single rejected field in a create or patch payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("field '{field}' is required")]
    Missing { field: &'static str },

    #[error("field '{field}' must not be empty")]
    Empty { field: &'static str },

    #[error("field '{field}' must not be negative (got {value})")]
    Negative { field: &'static str, value: i64 },

    #[error("field '{field}' is out of range (got {value})")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("field '{field}' must be a finite, non-negative number")]
    InvalidNumber { field: &'static str },

    #[error("identifier '{field}' cannot change from '{current}' to '{requested}'")]
    IdentifierChanged {
        field: &'static str,
        current: String,
        requested: String,
    },

    #[error("end_date is only allowed once a run is finished, not while '{state}'")]
    EndDateBeforeFinish { state: &'static str },

    #[error("used ({used}) + queued ({queued}) slots exceed the pool's {total} slots")]
    SlotOvercommit { used: u32, queued: u32, total: u32 },

    #[error("slots cannot drop to {slots} while {in_use} slots are in use")]
    SlotsBelowUsage { slots: u32, in_use: u32 },

    #[error("cannot order by unknown field '{field}'")]
    UnknownOrderField { field: String },

    #[error("limit must be at least 1")]
    ZeroLimit,
}

impl Violation {
    /// The payload or query field the violation is about.
    pub fn field(&self) -> Option<&str> {
        match self {
            Violation::Missing { field }
            | Violation::Empty { field }
            | Violation::Negative { field, .. }
            | Violation::OutOfRange { field, .. }
            | Violation::InvalidNumber { field }
            | Violation::IdentifierChanged { field, .. } => Some(field),
            Violation::EndDateBeforeFinish { .. } => Some("end_date"),
            Violation::SlotOvercommit { .. } => Some("used_slots"),
            Violation::SlotsBelowUsage { .. } => Some("slots"),
            Violation::UnknownOrderField { .. } => Some("order_by"),
            Violation::ZeroLimit => Some("limit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_display() {
        let err = Violation::SlotOvercommit {
            used: 8,
            queued: 5,
            total: 10,
        };
        assert_eq!(
            err.to_string(),
            "used (8) + queued (5) slots exceed the pool's 10 slots"
        );
        assert_eq!(err.field(), Some("used_slots"));
    }

    #[test]
    fn test_violation_field() {
        assert_eq!(Violation::Missing { field: "conn_type" }.field(), Some("conn_type"));
        assert_eq!(Violation::ZeroLimit.field(), Some("limit"));
        assert_eq!(
            Violation::UnknownOrderField {
                field: "bogus".to_string()
            }
            .field(),
            Some("order_by")
        );
    }
}
