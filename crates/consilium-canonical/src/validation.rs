use thiserror::Error;

/// Validation errors for canonical primitives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// When a value does not match the required pattern.
    #[error("{field} ('{value}') is not allowed")]
    PatternMismatch {
        /// Field name that failed validation.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// When a numeric quantity exceeds its bounds.
    #[error("{field} ({value}) is out of bounds")]
    OutOfBounds {
        /// Field name that is out of bounds.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// A credit amount below zero.
    #[error("amount {0} is negative")]
    NegativeAmount(f64),
    /// A credit amount finer than one hundredth.
    #[error("amount {0} has more than two decimal places")]
    ExcessPrecision(f64),
    /// NaN or infinity where a finite amount is required.
    #[error("amount is not a finite number")]
    NonFinite,
}
