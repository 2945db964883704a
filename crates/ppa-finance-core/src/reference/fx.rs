use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PpaFinanceError;
use crate::reference::policy::PolicyTable;
use crate::types::{FIRST_MODEL_YEAR, LAST_MODEL_YEAR};
use crate::PpaFinanceResult;

// ---------------------------------------------------------------------------
// Provider seam
// ---------------------------------------------------------------------------

/// Spot quotes keyed by three-letter currency code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxQuotes {
    pub as_of: NaiveDate,
    pub rates: BTreeMap<String, Decimal>,
}

/// Source of today's exchange rates. Network access, caching and retries are
/// the implementor's concern.
pub trait FxProvider {
    fn latest_rates(&self) -> PpaFinanceResult<FxQuotes>;
}

/// Serves a fixed set of quotes.
#[derive(Debug, Clone)]
pub struct StaticFxProvider {
    quotes: FxQuotes,
}

impl StaticFxProvider {
    pub fn new(quotes: FxQuotes) -> Self {
        Self { quotes }
    }

    /// Quotes taken from the base rates already held in a policy table.
    pub fn from_policy(policy: &PolicyTable, as_of: NaiveDate) -> Self {
        let rates = policy
            .records()
            .iter()
            .map(|r| (r.currency.code().to_string(), r.fx_rate))
            .collect();
        Self {
            quotes: FxQuotes { as_of, rates },
        }
    }
}

impl FxProvider for StaticFxProvider {
    fn latest_rates(&self) -> PpaFinanceResult<FxQuotes> {
        Ok(self.quotes.clone())
    }
}

/// Map provider quotes onto countries. Every currency referenced by the
/// policy table must be quoted with a positive rate.
pub fn resolve_country_rates(
    quotes: &FxQuotes,
    policy: &PolicyTable,
) -> PpaFinanceResult<BTreeMap<String, Decimal>> {
    let mut by_country = BTreeMap::new();

    for record in policy.records() {
        let code = record.currency.code();
        let rate = quotes
            .rates
            .get(code)
            .copied()
            .ok_or_else(|| PpaFinanceError::MissingRate {
                currency: code.to_string(),
            })?;
        if rate <= Decimal::ZERO {
            return Err(PpaFinanceError::InvalidInput {
                field: "rates".into(),
                reason: format!("Quote for {code} must be positive, got {rate}"),
            });
        }
        by_country.insert(record.country.clone(), rate);
    }

    Ok(by_country)
}

/// Pull today's quotes from `provider` and return the policy table with its
/// base FX rates refreshed.
pub fn refresh_policy_rates(
    provider: &dyn FxProvider,
    policy: &PolicyTable,
) -> PpaFinanceResult<PolicyTable> {
    let quotes = provider.latest_rates()?;
    tracing::debug!(as_of = %quotes.as_of, quotes = quotes.rates.len(), "resolving FX quotes");
    let rates = resolve_country_rates(&quotes, policy)?;
    policy.with_fx_rates(&rates)
}

// ---------------------------------------------------------------------------
// Compounded FX table
// ---------------------------------------------------------------------------

/// Per-country FX rate for model years 1..=25, compounded from the base rate
/// by the annual devaluation factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxTable {
    curves: BTreeMap<String, Vec<Decimal>>,
}

/// Build the FX table for every country in the policy table.
pub fn build_fx_table(policy: &PolicyTable) -> FxTable {
    let horizon = (LAST_MODEL_YEAR - FIRST_MODEL_YEAR + 1) as usize;
    let mut curves = BTreeMap::new();

    for record in policy.records() {
        let step = Decimal::ONE + record.devaluation_factor;
        let mut curve = Vec::with_capacity(horizon);
        let mut rate = record.fx_rate;
        curve.push(rate);
        for _ in 1..horizon {
            rate *= step;
            curve.push(rate);
        }
        curves.insert(record.country.clone(), curve);
    }

    FxTable { curves }
}

impl FxTable {
    /// FX rate for `country` in model year `year` (1-based).
    pub fn rate(&self, country: &str, year: u32) -> PpaFinanceResult<Decimal> {
        let curve = self.curve(country)?;
        if !(FIRST_MODEL_YEAR..=LAST_MODEL_YEAR).contains(&year) {
            return Err(PpaFinanceError::OutOfRange {
                what: "fx year".into(),
                value: year.to_string(),
                reason: format!(
                    "FX table covers years {FIRST_MODEL_YEAR}..={LAST_MODEL_YEAR} for '{country}'"
                ),
            });
        }
        Ok(curve[(year - FIRST_MODEL_YEAR) as usize])
    }

    /// Whole curve for a country, index 0 holding year 1.
    pub fn curve(&self, country: &str) -> PpaFinanceResult<&[Decimal]> {
        self.curves
            .get(country)
            .map(Vec::as_slice)
            .ok_or_else(|| PpaFinanceError::NotFound {
                table: "fx".into(),
                key: country.to_string(),
            })
    }

    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.curves.keys().map(String::as_str)
    }
}
