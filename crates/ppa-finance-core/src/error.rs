use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PpaFinanceError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Not found: '{key}' is not present in the {table} table")]
    NotFound { table: String, key: String },

    #[error("Out of range: {what} = {value} ({reason})")]
    OutOfRange {
        what: String,
        value: String,
        reason: String,
    },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    DidNotConverge {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Missing FX rate for currency {currency}")]
    MissingRate { currency: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PpaFinanceError {
    /// True for solver failures, which callers may treat as "no answer"
    /// rather than as a broken input.
    pub fn is_convergence_failure(&self) -> bool {
        matches!(self, PpaFinanceError::DidNotConverge { .. })
    }
}

impl From<serde_json::Error> for PpaFinanceError {
    fn from(e: serde_json::Error) -> Self {
        PpaFinanceError::SerializationError(e.to_string())
    }
}
