use thiserror::Error;

use super::Cents;

/// Failures of ledger operations. None of them leave the ledger partially
/// modified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Car not found: {0}")]
    CarNotFound(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Car {0} is not available for rent")]
    CarNotAvailable(String),

    #[error("Car {0} is available, not rented")]
    CarNotRented(String),

    #[error("Car {0} is currently rented; release it before removing")]
    CarIsRented(String),

    #[error("Customer {license} still has {count} rented car(s); release them first")]
    CustomerHasRentals { license: String, count: usize },

    #[error("A rental must last at least one day")]
    InvalidDays,

    #[error("Rental total overflows: {days} day(s) at {price_per_day} cents per day")]
    PriceOverflow { price_per_day: Cents, days: u32 },

    #[error("Outstanding total of customer {0} overflows")]
    OutstandingOverflow(String),

    #[error("Corrupt ledger snapshot: {0}")]
    CorruptSnapshot(String),
}

impl LedgerError {
    /// True for the "unknown plate / unknown license" family of failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::CarNotFound(_) | LedgerError::CustomerNotFound(_)
        )
    }
}
