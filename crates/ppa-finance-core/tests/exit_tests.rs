use ppa_finance_core::exit::valuation::{compute_exit_values, truncated_series};
use ppa_finance_core::time_value::{excel_npv, npv};
use ppa_finance_core::PpaFinanceError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn twenty_year_flows() -> Vec<Decimal> {
    let mut cfs = vec![dec!(-1_500_000)];
    cfs.extend((1..=20).map(|y| dec!(150_000) + Decimal::from(y) * dec!(1_500)));
    cfs
}

// ===========================================================================
// Exit at year 10 of a 20-year series
// ===========================================================================

#[test]
fn test_exit_value_is_npv_of_years_11_to_20() {
    let cfs = twenty_year_flows();
    let records = compute_exit_values(&cfs, dec!(0.10), &[10]).unwrap();
    assert_eq!(records.len(), 1);

    let expected: Decimal = (11..=20)
        .map(|y| {
            let periods = (y - 10) as usize;
            let mut discount = Decimal::ONE;
            for _ in 0..periods {
                discount *= dec!(1.10);
            }
            cfs[y] / discount
        })
        .sum();
    assert!((records[0].exit_value - expected).abs() < dec!(0.000001));
    assert_eq!(records[0].exit_value, excel_npv(dec!(0.10), &cfs[11..]).unwrap());
}

#[test]
fn test_truncated_series_zeroes_tail() {
    let cfs = twenty_year_flows();
    let exit_value = excel_npv(dec!(0.10), &cfs[11..]).unwrap();
    let series = truncated_series(&cfs, 10, exit_value);

    assert_eq!(series.len(), 21);
    assert_eq!(&series[..10], &cfs[..10]);
    assert_eq!(series[10], cfs[10] + exit_value);
    assert!(series[11..].iter().all(|v| *v == Decimal::ZERO));
}

#[test]
fn test_irr_with_exit_zeroes_npv_of_truncated_series() {
    let cfs = twenty_year_flows();
    let records = compute_exit_values(&cfs, dec!(0.10), &[10]).unwrap();
    let series = truncated_series(&cfs, 10, records[0].exit_value);
    let value = npv(records[0].irr_with_exit_pct / dec!(100), &series).unwrap();
    assert!(value.abs() < dec!(0.01));
}

#[test]
fn test_standard_exit_years() {
    let cfs = twenty_year_flows();
    let records = compute_exit_values(&cfs, dec!(0.10), &[5, 10, 15]).unwrap();
    let years: Vec<u32> = records.iter().map(|r| r.exit_year).collect();
    assert_eq!(years, vec![5, 10, 15]);
    // Less of the stream is left to sell as the exit moves out
    assert!(records[0].exit_value > records[1].exit_value);
    assert!(records[1].exit_value > records[2].exit_value);
}

#[test]
fn test_short_series_keeps_only_interior_exits() {
    let cfs: Vec<Decimal> = twenty_year_flows().into_iter().take(9).collect();
    let records = compute_exit_values(&cfs, dec!(0.10), &[5, 10, 15]).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].exit_year, 5);
}

// ===========================================================================
// Extreme discount rates
// ===========================================================================

#[test]
fn test_exit_rate_near_minus_one_is_an_error() {
    let cfs = twenty_year_flows();
    match compute_exit_values(&cfs, dec!(-0.9999999), &[1]).unwrap_err() {
        PpaFinanceError::OutOfRange { what, .. } => assert_eq!(what, "discount rate"),
        other => panic!("Expected OutOfRange, got: {other:?}"),
    }
}

#[test]
fn test_exit_rate_far_above_one_is_an_error() {
    let cfs = twenty_year_flows();
    assert!(compute_exit_values(&cfs, dec!(1000000000), &[1]).is_err());
}
