use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PpaFinanceError;
use crate::time_value::{excel_npv, irr, DEFAULT_IRR_GUESS};
use crate::types::{Money, Rate};
use crate::PpaFinanceResult;

/// Loan terms for a DSCR-sculpted facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtFacilityInput {
    /// Facility size; sized from the sculpted debt service when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility_size: Option<Money>,
    pub loan_tenor_years: u32,
    pub interest_rate: Rate,
    /// Debt service is sized as CFADS / min_dscr
    pub min_dscr: Decimal,
}

/// A single year of the debt schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtScheduleRow {
    pub year: u32,
    pub opening_balance: Money,
    pub interest: Money,
    pub principal: Money,
    /// Negative of principal, as it hits the balance
    pub principal_amortization: Money,
    pub closing_balance: Money,
    pub debt_service: Money,
    /// Target coverage while the loan is outstanding
    pub dscr: Option<Decimal>,
    pub levered_cashflow: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtScheduleOutput {
    pub rows: Vec<DebtScheduleRow>,
    pub facility_size: Money,
    /// facility_size / total_project_cost
    pub leverage: Decimal,
    /// Sponsor equity at close (negative)
    pub equity_invested: Money,
    pub levered_irr_pct: Decimal,
    pub total_interest: Money,
    pub total_principal: Money,
}

/// Facility size supported by a sculpted profile: the NPV, at the loan rate,
/// of `cash_flows[1..=loan_tenor] / min_dscr`.
pub fn size_debt_facility(
    cash_flows: &[Money],
    loan_tenor_years: u32,
    interest_rate: Rate,
    min_dscr: Decimal,
) -> PpaFinanceResult<Money> {
    validate_terms(cash_flows, loan_tenor_years, min_dscr)?;
    let debt_service: Vec<Money> = cash_flows[1..=loan_tenor_years as usize]
        .iter()
        .map(|cf| cf / min_dscr)
        .collect();
    excel_npv(interest_rate, &debt_service)
}

/// Build the year-by-year debt schedule and levered returns.
///
/// `cash_flows[0]` is the construction outflow and is not used for sizing;
/// years past the loan tenor pass the unlevered cashflow straight through.
pub fn build_debt_schedule(
    total_project_cost: Money,
    facility_size: Money,
    loan_tenor_years: u32,
    interest_rate: Rate,
    min_dscr: Decimal,
    cash_flows: &[Money],
) -> PpaFinanceResult<DebtScheduleOutput> {
    validate_terms(cash_flows, loan_tenor_years, min_dscr)?;
    if total_project_cost <= Decimal::ZERO {
        return Err(PpaFinanceError::InvalidInput {
            field: "total_project_cost".into(),
            reason: "Total project cost must be positive".into(),
        });
    }
    if facility_size < Decimal::ZERO {
        return Err(PpaFinanceError::InvalidInput {
            field: "facility_size".into(),
            reason: "Facility size cannot be negative".into(),
        });
    }

    let project_years = cash_flows.len() - 1;
    let mut rows = Vec::with_capacity(project_years);
    let mut balance = facility_size;
    let mut total_interest = Decimal::ZERO;
    let mut total_principal = Decimal::ZERO;

    for (i, cash_flow) in cash_flows[1..].iter().enumerate() {
        let year = i as u32 + 1;

        if year <= loan_tenor_years {
            let debt_service = cash_flow / min_dscr;
            let interest = balance * interest_rate;
            let principal = debt_service - interest;
            let closing = balance - principal;

            total_interest += interest;
            total_principal += principal;

            rows.push(DebtScheduleRow {
                year,
                opening_balance: balance,
                interest,
                principal,
                principal_amortization: -principal,
                closing_balance: closing,
                debt_service,
                dscr: Some(min_dscr),
                levered_cashflow: cash_flow - debt_service,
            });
            balance = closing;
        } else {
            rows.push(DebtScheduleRow {
                year,
                opening_balance: Decimal::ZERO,
                interest: Decimal::ZERO,
                principal: Decimal::ZERO,
                principal_amortization: Decimal::ZERO,
                closing_balance: Decimal::ZERO,
                debt_service: Decimal::ZERO,
                dscr: None,
                levered_cashflow: *cash_flow,
            });
        }
    }

    let leverage = facility_size / total_project_cost;
    let equity_invested = -(total_project_cost - facility_size);

    let mut equity_flows = Vec::with_capacity(rows.len() + 1);
    equity_flows.push(equity_invested);
    equity_flows.extend(rows.iter().map(|r| r.levered_cashflow));
    let levered_irr_pct = irr(&equity_flows, DEFAULT_IRR_GUESS)? * dec!(100);

    Ok(DebtScheduleOutput {
        rows,
        facility_size,
        leverage,
        equity_invested,
        levered_irr_pct,
        total_interest,
        total_principal,
    })
}

fn validate_terms(cash_flows: &[Money], loan_tenor_years: u32, min_dscr: Decimal) -> PpaFinanceResult<()> {
    if cash_flows.len() < 2 {
        return Err(PpaFinanceError::InvalidInput {
            field: "cash_flows".into(),
            reason: "Need a construction year and at least one operating year".into(),
        });
    }
    let project_years = cash_flows.len() - 1;
    if loan_tenor_years == 0 || loan_tenor_years as usize > project_years {
        return Err(PpaFinanceError::InvalidInput {
            field: "loan_tenor_years".into(),
            reason: format!("Loan tenor must be within 1..={project_years} years"),
        });
    }
    if min_dscr <= Decimal::ZERO {
        return Err(PpaFinanceError::InvalidInput {
            field: "min_dscr".into(),
            reason: "Minimum DSCR must be positive".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn flows() -> Vec<Money> {
        let mut cfs = vec![dec!(-1000)];
        cfs.extend(std::iter::repeat(dec!(150)).take(12));
        cfs
    }

    #[test]
    fn test_debt_service_sized_to_dscr() {
        let out = build_debt_schedule(dec!(1000), dec!(500), 8, dec!(0.08), dec!(1.25), &flows()).unwrap();
        assert_eq!(out.rows.len(), 12);
        for row in &out.rows[..8] {
            assert_eq!(row.debt_service, dec!(120));
            assert_eq!(row.dscr, Some(dec!(1.25)));
            assert_eq!(row.levered_cashflow, dec!(30));
            assert_eq!(row.principal, row.debt_service - row.interest);
            assert_eq!(row.closing_balance, row.opening_balance - row.principal);
        }
    }

    #[test]
    fn test_first_year_interest_and_balance() {
        let out = build_debt_schedule(dec!(1000), dec!(500), 8, dec!(0.08), dec!(1.25), &flows()).unwrap();
        let y1 = &out.rows[0];
        assert_eq!(y1.opening_balance, dec!(500));
        assert_eq!(y1.interest, dec!(40));
        assert_eq!(y1.principal, dec!(80));
        assert_eq!(y1.principal_amortization, dec!(-80));
        assert_eq!(y1.closing_balance, dec!(420));
        assert_eq!(out.rows[1].opening_balance, dec!(420));
    }

    #[test]
    fn test_post_loan_years_pass_through() {
        let out = build_debt_schedule(dec!(1000), dec!(500), 8, dec!(0.08), dec!(1.25), &flows()).unwrap();
        for row in &out.rows[8..] {
            assert_eq!(row.debt_service, Decimal::ZERO);
            assert_eq!(row.opening_balance, Decimal::ZERO);
            assert_eq!(row.dscr, None);
            assert_eq!(row.levered_cashflow, dec!(150));
        }
    }

    #[test]
    fn test_leverage_and_equity() {
        let out = build_debt_schedule(dec!(1000), dec!(600), 8, dec!(0.08), dec!(1.25), &flows()).unwrap();
        assert_eq!(out.leverage, dec!(0.6));
        assert_eq!(out.equity_invested, dec!(-400));
        assert!(out.levered_irr_pct > Decimal::ZERO);
    }

    #[test]
    fn test_sized_facility_amortises_to_zero() {
        let cfs = flows();
        let size = size_debt_facility(&cfs, 8, dec!(0.08), dec!(1.25)).unwrap();
        let out = build_debt_schedule(dec!(1000), size, 8, dec!(0.08), dec!(1.25), &cfs).unwrap();
        assert!(out.rows[7].closing_balance.abs() < dec!(0.000001));
        assert!((out.total_principal - size).abs() < dec!(0.000001));
    }

    #[test]
    fn test_loan_tenor_longer_than_project_rejected() {
        let err = build_debt_schedule(dec!(1000), dec!(500), 13, dec!(0.08), dec!(1.25), &flows()).unwrap_err();
        match err {
            PpaFinanceError::InvalidInput { field, .. } => assert_eq!(field, "loan_tenor_years"),
            other => panic!("Expected InvalidInput, got: {other:?}"),
        }
    }

    #[test]
    fn test_zero_dscr_rejected() {
        assert!(size_debt_facility(&flows(), 5, dec!(0.08), Decimal::ZERO).is_err());
    }
}
