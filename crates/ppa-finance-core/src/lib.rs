pub mod error;
pub mod time_value;
pub mod types;

pub mod capex;
pub mod exit;
pub mod projection;
pub mod reference;
pub mod search;

#[cfg(feature = "debt")]
pub mod debt;

pub use error::PpaFinanceError;
pub use search::model::{
    project_ppa_tenor, solve_ppa_term, FixedTenorOutput, PpaModelInput, PpaModelOutput, TermSearchOutcome,
};
pub use types::*;

/// Standard result type for all ppa-finance operations
pub type PpaFinanceResult<T> = Result<T, PpaFinanceError>;
