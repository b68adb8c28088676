//! Billing engine error taxonomy.

use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    /// Entity missing or owned by another user. Both look the same to callers.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No billable work items found for the request")]
    NoBillableItems,

    #[error("Rate '{rate_name}' is not defined on project {project_id}")]
    InvalidRate {
        project_id: String,
        rate_name: String,
    },

    #[error("Invoice number allocation failed: {0}")]
    AllocationFailure(String),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Who has to act on an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Client,
    Infrastructure,
}

impl BillingError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        BillingError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BillingError::NotFound { .. }
            | BillingError::Validation(_)
            | BillingError::NoBillableItems
            | BillingError::InvalidRate { .. } => ErrorCategory::Client,
            BillingError::AllocationFailure(_)
            | BillingError::Render(_)
            | BillingError::Storage(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Infrastructure
    }

    /// Label used for the error counter.
    pub fn label(&self) -> &'static str {
        match self {
            BillingError::NotFound { .. } => "not_found",
            BillingError::Validation(_) => "validation",
            BillingError::NoBillableItems => "no_billable_items",
            BillingError::InvalidRate { .. } => "invalid_rate",
            BillingError::AllocationFailure(_) => "allocation_failure",
            BillingError::Render(_) => "render",
            BillingError::Storage(_) => "storage",
        }
    }
}

impl From<mongodb::error::Error> for BillingError {
    fn from(err: mongodb::error::Error) -> Self {
        BillingError::Storage(err.to_string())
    }
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::NotFound { .. } => AppError::NotFound(anyhow::Error::new(err)),
            BillingError::Validation(_)
            | BillingError::NoBillableItems
            | BillingError::InvalidRate { .. } => AppError::BadRequest(anyhow::Error::new(err)),
            BillingError::AllocationFailure(_) => AppError::ServiceUnavailable,
            BillingError::Render(msg) => AppError::BadGateway(msg),
            BillingError::Storage(_) => AppError::DatabaseError(anyhow::Error::new(err)),
        }
    }
}
