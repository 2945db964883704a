#![cfg(feature = "debt")]

use ppa_finance_core::capex::budget::{AdminAssumptions, ProjectParameters};
use ppa_finance_core::debt::schedule::{build_debt_schedule, size_debt_facility, DebtFacilityInput};
use ppa_finance_core::{solve_ppa_term, PpaFinanceError, PpaModelInput};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn project() -> ProjectParameters {
    ProjectParameters {
        country: "Panama".into(),
        capacity_kw: dec!(1000),
        epc_cost_excl_vat: dec!(700_000),
        epc_cost_vat: dec!(49_000),
        current_tariff: dec!(0.20),
        tariff_discount: dec!(0.10),
        forecast_generation_kwh: dec!(1_400_000),
        land_rent_expense: Decimal::ZERO,
        recs_enabled: false,
        offtaker_investment_share: Decimal::ZERO,
        asset_ownership_transferred: true,
    }
}

fn levered_input(debt: DebtFacilityInput) -> PpaModelInput {
    PpaModelInput {
        project: project(),
        admin: AdminAssumptions::default(),
        target_irr_pct: dec!(12),
        min_tenor: 1,
        max_tenor: 25,
        debt: Some(debt),
        policy: None,
        tiers: None,
    }
}

fn twenty_year_flows() -> Vec<Decimal> {
    let mut cfs = vec![dec!(-2_000_000)];
    cfs.extend((1..=20).map(|y| dec!(200_000) + Decimal::from(y) * dec!(2_000)));
    cfs
}

// ===========================================================================
// Schedule mechanics
// ===========================================================================

#[test]
fn test_schedule_rows_follow_sculpting() {
    let cfs = twenty_year_flows();
    let out = build_debt_schedule(dec!(2_000_000), dec!(1_200_000), 15, dec!(0.07), dec!(1.30), &cfs).unwrap();

    assert_eq!(out.rows.len(), 20);
    for (i, row) in out.rows.iter().enumerate() {
        let cf = cfs[i + 1];
        if row.year <= 15 {
            assert_eq!(row.debt_service, cf / dec!(1.30));
            assert_eq!(row.interest, row.opening_balance * dec!(0.07));
            assert_eq!(row.levered_cashflow, cf - row.debt_service);
        } else {
            assert_eq!(row.debt_service, Decimal::ZERO);
            assert_eq!(row.levered_cashflow, cf);
        }
    }
    for pair in out.rows[..15].windows(2) {
        assert_eq!(pair[1].opening_balance, pair[0].closing_balance);
    }
}

#[test]
fn test_totals_match_rows() {
    let cfs = twenty_year_flows();
    let out = build_debt_schedule(dec!(2_000_000), dec!(1_200_000), 15, dec!(0.07), dec!(1.30), &cfs).unwrap();
    let interest: Decimal = out.rows.iter().map(|r| r.interest).sum();
    let principal: Decimal = out.rows.iter().map(|r| r.principal).sum();
    assert_eq!(out.total_interest, interest);
    assert_eq!(out.total_principal, principal);
    assert_eq!(out.leverage, dec!(0.6));
    assert_eq!(out.equity_invested, dec!(-800_000));
}

#[test]
fn test_gearing_lifts_equity_return() {
    let cfs = twenty_year_flows();
    let size = size_debt_facility(&cfs, 15, dec!(0.07), dec!(1.30)).unwrap();
    let out = build_debt_schedule(dec!(2_000_000), size, 15, dec!(0.07), dec!(1.30), &cfs).unwrap();
    let unlevered = ppa_finance_core::time_value::irr(&cfs, dec!(0.10)).unwrap() * dec!(100);
    // Debt at 7% below the project return gears the equity IRR up
    assert!(out.levered_irr_pct > unlevered);
    assert!(out.rows[14].closing_balance.abs() < dec!(0.0001));
}

// ===========================================================================
// Orchestrated run
// ===========================================================================

#[test]
fn test_solve_with_sized_debt() {
    let output = solve_ppa_term(&levered_input(DebtFacilityInput {
        facility_size: None,
        loan_tenor_years: 3,
        interest_rate: dec!(0.06),
        min_dscr: dec!(1.25),
    }))
    .unwrap();
    let term = output.result.outcome.optimal().unwrap();

    if term.ppa_term >= 3 {
        let debt = term.debt.as_ref().expect("debt schedule for a covered loan tenor");
        assert_eq!(debt.rows.len(), term.ppa_term as usize);
        assert_eq!(debt.equity_invested, -(-term.cash_flows[0] - debt.facility_size));
        assert!(debt.rows[2].closing_balance.abs() < dec!(0.0001));
    } else {
        assert!(term.debt.is_none());
    }
}

#[test]
fn test_loan_longer_than_ppa_omitted_with_warning() {
    let output = solve_ppa_term(&levered_input(DebtFacilityInput {
        facility_size: Some(dec!(400_000)),
        loan_tenor_years: 25,
        interest_rate: dec!(0.06),
        min_dscr: dec!(1.25),
    }))
    .unwrap();
    let term = output.result.outcome.optimal().unwrap();
    assert!(term.ppa_term < 25);
    assert!(term.debt.is_none());
    assert!(output.warnings.iter().any(|w| w.contains("debt schedule omitted")));
}

#[test]
fn test_invalid_dscr_rejected_up_front() {
    let err = solve_ppa_term(&levered_input(DebtFacilityInput {
        facility_size: None,
        loan_tenor_years: 5,
        interest_rate: dec!(0.06),
        min_dscr: Decimal::ZERO,
    }))
    .unwrap_err();
    match err {
        PpaFinanceError::InvalidInput { field, .. } => assert_eq!(field, "debt.min_dscr"),
        other => panic!("Expected InvalidInput, got: {other:?}"),
    }
}
