use thiserror::Error;

use crate::domain::LedgerError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Car with license plate {0} already exists")]
    CarAlreadyExists(String),

    #[error("Customer already exists (license {license} or national id {national_id})")]
    CustomerAlreadyExists {
        license: String,
        national_id: String,
    },

    #[error("Invalid {field}: {message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// True when the failure is an unknown plate or license.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::Ledger(e) if e.is_not_found())
    }
}
