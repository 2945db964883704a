use ppa_finance_core::capex::tiers::{capex_piecewise, TierTable};
use ppa_finance_core::reference::fx::{build_fx_table, refresh_policy_rates, FxQuotes, StaticFxProvider};
use ppa_finance_core::reference::policy::{PolicyTable, PolicyTableConfig};
use ppa_finance_core::{PpaFinanceError, LAST_MODEL_YEAR};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

// ===========================================================================
// FX table
// ===========================================================================

#[test]
fn test_fx_table_compounds_for_every_country() {
    let policy = PolicyTable::reference().unwrap();
    let fx = build_fx_table(&policy);

    for record in policy.records() {
        let curve = fx.curve(&record.country).unwrap();
        assert_eq!(curve.len(), LAST_MODEL_YEAR as usize);
        assert_eq!(fx.rate(&record.country, 1).unwrap(), record.fx_rate);
        for year in 2..=LAST_MODEL_YEAR {
            let prev = fx.rate(&record.country, year - 1).unwrap();
            let this = fx.rate(&record.country, year).unwrap();
            assert_eq!(this, prev * (Decimal::ONE + record.devaluation_factor));
        }
    }
}

#[test]
fn test_fx_lookup_errors() {
    let fx = build_fx_table(&PolicyTable::reference().unwrap());
    assert!(matches!(fx.rate("Peru", 0), Err(PpaFinanceError::OutOfRange { .. })));
    assert!(matches!(fx.rate("Peru", 26), Err(PpaFinanceError::OutOfRange { .. })));
    assert!(matches!(fx.rate("Atlantis", 1), Err(PpaFinanceError::NotFound { .. })));
}

#[test]
fn test_refreshed_rates_flow_into_fx_table() {
    let policy = PolicyTable::reference().unwrap();
    let mut rates: BTreeMap<String, Decimal> = policy
        .records()
        .iter()
        .map(|r| (r.currency.code().to_string(), r.fx_rate))
        .collect();
    rates.insert("PEN".into(), dec!(3.70));

    let provider = StaticFxProvider::new(FxQuotes {
        as_of: chrono::NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        rates,
    });
    let refreshed = refresh_policy_rates(&provider, &policy).unwrap();
    let fx = build_fx_table(&refreshed);

    assert_eq!(fx.rate("Peru", 1).unwrap(), dec!(3.70));
    assert_eq!(fx.rate("Peru", 2).unwrap(), dec!(3.70) * dec!(1.03));
    assert_eq!(fx.rate("Chile", 1).unwrap(), dec!(900));
}

#[test]
fn test_missing_quote_is_missing_rate() {
    let policy = PolicyTable::reference().unwrap();
    let provider = StaticFxProvider::new(FxQuotes {
        as_of: chrono::NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        rates: BTreeMap::from([("USD".to_string(), Decimal::ONE)]),
    });
    match refresh_policy_rates(&provider, &policy) {
        Err(PpaFinanceError::MissingRate { currency }) => assert_eq!(currency, "COP"),
        other => panic!("Expected MissingRate, got: {other:?}"),
    }
}

#[test]
fn test_policy_config_from_json() {
    let json = r#"{
        "countries": [{
            "country": "Peru",
            "currency": "PEN",
            "fx_rate": "3.8",
            "devaluation_factor_pct": "3",
            "tariff_escalator_pct": "5",
            "om_escalator_pct": "2",
            "land_rent_escalator_pct": "2",
            "vat_pct": "18",
            "corporate_tax_pct": "29.5",
            "tax_exemption_years": 0
        }]
    }"#;
    let config: PolicyTableConfig = serde_json::from_str(json).unwrap();
    let table = config.normalize().unwrap();
    let peru = table.lookup("Peru").unwrap();
    assert_eq!(peru.corporate_tax_rate, dec!(0.295));
    assert_eq!(peru.vat_rate, dec!(0.18));
    assert!(table.lookup("Chile").is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_fx_curve_follows_devaluation(base in 1u32..5000, dev_bps in 0u32..1500) {
        let mut config = PolicyTableConfig::default();
        config.countries[0].fx_rate = Decimal::from(base);
        config.countries[0].devaluation_factor_pct = Decimal::new(dev_bps as i64, 2);
        let policy = config.normalize().unwrap();
        let record = &policy.records()[0];
        let fx = build_fx_table(&policy);

        prop_assert_eq!(fx.rate(&record.country, 1).unwrap(), Decimal::from(base));
        for year in 2..=LAST_MODEL_YEAR {
            let prev = fx.rate(&record.country, year - 1).unwrap();
            prop_assert_eq!(
                fx.rate(&record.country, year).unwrap(),
                prev * (Decimal::ONE + record.devaluation_factor)
            );
        }
    }
}

// ===========================================================================
// CAPEX tiers
// ===========================================================================

#[test]
fn test_capex_at_every_threshold_equals_cumulative_cost() {
    let table = TierTable::default();
    for fx_rate in [dec!(1), dec!(3.8), dec!(4000)] {
        for tier in table.tiers() {
            let (cost, used) = capex_piecewise(tier.size_above_kw, fx_rate, &table).unwrap();
            assert_eq!(cost, tier.from_previous_tranche * fx_rate);
            assert_eq!(used, fx_rate);
        }
    }
}

#[test]
fn test_custom_tier_table_below_minimum() {
    let table: TierTable = serde_json::from_str(
        r#"[{"size_above_kw": "50", "cost_per_kw": "30", "from_previous_tranche": "1500"}]"#,
    )
    .unwrap();
    assert!(matches!(
        capex_piecewise(dec!(49), Decimal::ONE, &table),
        Err(PpaFinanceError::OutOfRange { .. })
    ));
    assert_eq!(capex_piecewise(dec!(60), Decimal::ONE, &table).unwrap().0, dec!(1800));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_capex_non_decreasing_in_size(a in 0u32..20_000, b in 0u32..20_000) {
        let (small, large) = if a <= b { (a, b) } else { (b, a) };
        let table = TierTable::default();
        let (c_small, _) = capex_piecewise(Decimal::from(small), dec!(1), &table).unwrap();
        let (c_large, _) = capex_piecewise(Decimal::from(large), dec!(1), &table).unwrap();
        prop_assert!(c_small <= c_large);
    }
}
