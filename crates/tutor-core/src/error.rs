//! Error Types

use thiserror::Error;

/// Result type alias for marketplace operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Marketplace error types
#[derive(Error, Debug)]
pub enum MarketError {
    /// Malformed or out-of-range input (time ordering, rating bounds)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced entity is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Actor lacks ownership or role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// State-machine violation, duplicate, already booked, already paid
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payment provider declined the charge
    #[error("Payment declined: {0}")]
    Payment(String),

    /// Missing, malformed or expired credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Stable classification of a [`MarketError`]
///
/// Callers branch on this instead of matching error text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Conflict,
    Payment,
    Auth,
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Payment => "PAYMENT_ERROR",
            ErrorKind::Auth => "AUTH_ERROR",
            ErrorKind::Unavailable => "UNAVAILABLE",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MarketError {
    pub fn validation(msg: impl Into<String>) -> Self {
        MarketError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        MarketError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        MarketError::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        MarketError::Conflict(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::Validation(_) => ErrorKind::Validation,
            MarketError::NotFound(_) => ErrorKind::NotFound,
            MarketError::Forbidden(_) => ErrorKind::Forbidden,
            MarketError::Conflict(_) => ErrorKind::Conflict,
            MarketError::Payment(_) => ErrorKind::Payment,
            MarketError::Auth(_) => ErrorKind::Auth,
            MarketError::Store(StoreError::UniqueViolation { .. }) => ErrorKind::Conflict,
            MarketError::Store(StoreError::LockTimeout { .. }) => ErrorKind::Unavailable,
            MarketError::Store(StoreError::Poisoned) | MarketError::Config(_) => ErrorKind::Internal,
        }
    }

    /// Check if the caller may retry the operation as-is
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            MarketError::Validation(msg)
            | MarketError::NotFound(msg)
            | MarketError::Forbidden(msg)
            | MarketError::Conflict(msg) => msg.clone(),
            MarketError::Payment(_) => "Payment was declined. No charge was made.".into(),
            MarketError::Auth(_) => "Authentication required. Please sign in again.".into(),
            MarketError::Store(StoreError::UniqueViolation { .. }) => {
                "This record already exists.".into()
            }
            MarketError::Store(StoreError::LockTimeout { .. }) => {
                "The resource is busy. Please try again.".into()
            }
            _ => "An unexpected error occurred.".into(),
        }
    }
}

/// Persistence store failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A commit would break a unique constraint
    #[error("unique constraint `{constraint}` violated")]
    UniqueViolation { constraint: &'static str },

    /// Waiting for a row lock exceeded the configured timeout
    #[error("timed out waiting for lock on {table} row {id}")]
    LockTimeout { table: &'static str, id: uuid::Uuid },

    /// A previous writer panicked while holding the store lock
    #[error("store state poisoned")]
    Poisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_is_conflict() {
        let err = MarketError::from(StoreError::UniqueViolation {
            constraint: "bookings.availability_id",
        });
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_lock_timeout_is_retryable() {
        let err = MarketError::from(StoreError::LockTimeout {
            table: "availability",
            id: uuid::Uuid::nil(),
        });
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.is_retryable());
    }
}
