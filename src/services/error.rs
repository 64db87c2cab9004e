//! Domain error taxonomy for the licensing services
//!
//! Business-rule violations are raised as specific typed variants and turned
//! into user-facing responses by the API layer. Persistence failures are
//! wrapped into [`LicensingError::Service`] at the service boundary and
//! logged with context; raw store errors never cross it.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LicensingError {
    /// Referenced entity absent
    #[error("{0} not found")]
    NotFound(String),

    /// License inactive or no free seats
    #[error("License {0} is not available: {1}")]
    NotAvailable(Uuid, String),

    /// Duplicate active assignment for the same license and holder
    #[error("License {0} is already assigned to this holder")]
    AlreadyAssigned(Uuid),

    /// Actor lacks standing for the operation
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Operation would remove the last administrator
    #[error("Admin protection: {0}")]
    AdminProtection(String),

    /// Malformed input to a log or assignment write
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected failures; logged with context before being
    /// surfaced in a caller-safe form
    #[error("Service error: {0}")]
    Service(String),
}

impl From<sqlx::Error> for LicensingError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => LicensingError::NotFound("Record".to_string()),
            sqlx::Error::Database(db_err)
                if db_err.message().contains("UNIQUE constraint failed") =>
            {
                // The partial unique indexes on active assignments are the
                // only UNIQUE constraints the services write against.
                LicensingError::Service(format!("Constraint violation: {}", db_err.message()))
            }
            _ => LicensingError::Service(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for LicensingError {
    fn from(err: anyhow::Error) -> Self {
        LicensingError::Service(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, LicensingError>;
