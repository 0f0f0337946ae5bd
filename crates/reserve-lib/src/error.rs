//! Error types for record normalization

use thiserror::Error;

use crate::models::ServiceCategory;

/// Errors raised while turning raw provider records into comparable keys
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// A required attribute is missing, empty or unparseable
    #[error("malformed {service} record: {field} {reason}")]
    MalformedRecord {
        service: ServiceCategory,
        field: &'static str,
        reason: String,
    },

    /// A reservation covers zero or a negative number of units
    #[error("reservation {id} has invalid quantity {quantity}")]
    InvalidQuantity { id: String, quantity: i64 },
}

impl ReconcileError {
    pub(crate) fn missing(service: ServiceCategory, field: &'static str) -> Self {
        ReconcileError::MalformedRecord {
            service,
            field,
            reason: "is missing or empty".to_string(),
        }
    }

    pub(crate) fn malformed(
        service: ServiceCategory,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        ReconcileError::MalformedRecord {
            service,
            field,
            reason: reason.into(),
        }
    }

    /// Short reason label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::MalformedRecord { .. } => "malformed_record",
            ReconcileError::InvalidQuantity { .. } => "invalid_quantity",
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
