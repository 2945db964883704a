use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::time_value::{excel_npv, irr, DEFAULT_IRR_GUESS};
use crate::types::{Money, Rate};
use crate::PpaFinanceResult;

/// Sale of the project at the end of `exit_year`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitRecord {
    pub exit_year: u32,
    /// Remaining cashflows discounted back to the exit year
    pub exit_value: Money,
    pub irr_with_exit_pct: Decimal,
}

/// Exit value and IRR for each candidate exit year.
///
/// Exit years outside `1..=tenor`, or with no cashflow left after them, are
/// skipped; an empty result is not an error.
pub fn compute_exit_values(
    cash_flows: &[Money],
    discount_rate: Rate,
    exit_years: &[u32],
) -> PpaFinanceResult<Vec<ExitRecord>> {
    let tenor = cash_flows.len().saturating_sub(1);
    let mut records = Vec::new();

    for &exit_year in exit_years {
        let t = exit_year as usize;
        if t == 0 || t > tenor {
            continue;
        }
        let remaining = &cash_flows[t + 1..];
        if remaining.is_empty() {
            continue;
        }

        let exit_value = excel_npv(discount_rate, remaining)?;
        let truncated = truncated_series(cash_flows, t, exit_value);
        let irr_with_exit_pct = irr(&truncated, DEFAULT_IRR_GUESS)? * dec!(100);

        records.push(ExitRecord {
            exit_year,
            exit_value,
            irr_with_exit_pct,
        });
    }

    Ok(records)
}

/// The cashflow series with the exit value booked in `exit_year` and every
/// later year zeroed.
pub fn truncated_series(cash_flows: &[Money], exit_year: usize, exit_value: Money) -> Vec<Money> {
    cash_flows
        .iter()
        .enumerate()
        .map(|(year, cf)| match year.cmp(&exit_year) {
            std::cmp::Ordering::Less => *cf,
            std::cmp::Ordering::Equal => cf + exit_value,
            std::cmp::Ordering::Greater => Decimal::ZERO,
        })
        .collect()
}
