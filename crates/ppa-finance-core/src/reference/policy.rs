use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::PpaFinanceError;
use crate::types::{Currency, Rate};
use crate::PpaFinanceResult;

// ---------------------------------------------------------------------------
// Configuration (percent units, as supplied by the reference-data owner)
// ---------------------------------------------------------------------------

/// One country row of the reference policy table. Every `_pct` field is a
/// percentage (19.0 = 19%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRow {
    pub country: String,
    pub currency: Currency,
    /// Units of local currency per unit of reporting currency today
    pub fx_rate: Decimal,
    pub devaluation_factor_pct: Decimal,
    pub tariff_escalator_pct: Decimal,
    pub om_escalator_pct: Decimal,
    pub land_rent_escalator_pct: Decimal,
    pub vat_pct: Decimal,
    pub corporate_tax_pct: Decimal,
    /// Whole years from COD during which corporate tax is not charged
    pub tax_exemption_years: u32,
}

/// Reference policy table as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTableConfig {
    pub countries: Vec<PolicyRow>,
}

impl Default for PolicyTableConfig {
    /// Reference jurisdictions with indicative FX rates.
    fn default() -> Self {
        let row = |country: &str,
                   currency: Currency,
                   fx_rate: Decimal,
                   devaluation: Decimal,
                   tariff_esc: Decimal,
                   vat: Decimal,
                   tax: Decimal,
                   exemption: u32| PolicyRow {
            country: country.to_string(),
            currency,
            fx_rate,
            devaluation_factor_pct: devaluation,
            tariff_escalator_pct: tariff_esc,
            om_escalator_pct: dec!(2.00),
            land_rent_escalator_pct: dec!(2.00),
            vat_pct: vat,
            corporate_tax_pct: tax,
            tax_exemption_years: exemption,
        };

        Self {
            countries: vec![
                row("Colombia", Currency::COP, dec!(4000.00), dec!(5.00), dec!(7.00), dec!(19.00), dec!(35.00), 15),
                row("Peru", Currency::PEN, dec!(3.80), dec!(3.00), dec!(5.00), dec!(18.00), dec!(29.50), 0),
                row("Chile", Currency::CLP, dec!(900.00), dec!(3.00), dec!(5.00), dec!(19.00), dec!(25.00), 0),
                row("Mexico", Currency::MXN, dec!(17.50), dec!(4.00), dec!(6.00), dec!(16.00), dec!(30.00), 0),
                row("Panama", Currency::USD, dec!(1.00), dec!(0.00), dec!(2.00), dec!(7.00), dec!(25.00), 0),
                row("Costa Rica", Currency::CRC, dec!(530.00), dec!(4.00), dec!(6.00), dec!(13.00), dec!(30.00), 8),
                row("Honduras", Currency::HNL, dec!(24.50), dec!(5.00), dec!(7.00), dec!(15.00), dec!(25.00), 5),
                row("Guatemala", Currency::GTQ, dec!(7.80), dec!(4.00), dec!(6.00), dec!(12.00), dec!(25.00), 10),
                row("Ecuador", Currency::USD, dec!(1.00), dec!(0.00), dec!(2.00), dec!(15.00), dec!(25.00), 10),
            ],
        }
    }
}

impl PolicyTableConfig {
    /// Validate the rows and convert every percentage into a decimal rate.
    /// This is the only place percentages are divided by 100.
    pub fn normalize(&self) -> PpaFinanceResult<PolicyTable> {
        let mut seen = BTreeSet::new();
        let mut records = Vec::with_capacity(self.countries.len());

        for row in &self.countries {
            if row.country.trim().is_empty() {
                return Err(PpaFinanceError::InvalidInput {
                    field: "country".into(),
                    reason: "Country name cannot be empty".into(),
                });
            }
            if !seen.insert(row.country.clone()) {
                return Err(PpaFinanceError::InvalidInput {
                    field: "country".into(),
                    reason: format!("Duplicate policy row for '{}'", row.country),
                });
            }
            if row.fx_rate <= Decimal::ZERO {
                return Err(PpaFinanceError::InvalidInput {
                    field: "fx_rate".into(),
                    reason: format!("FX rate for '{}' must be positive", row.country),
                });
            }
            if row.devaluation_factor_pct <= dec!(-100) {
                return Err(PpaFinanceError::InvalidInput {
                    field: "devaluation_factor_pct".into(),
                    reason: format!("Devaluation for '{}' must be above -100%", row.country),
                });
            }
            for (field, value) in [
                ("vat_pct", row.vat_pct),
                ("corporate_tax_pct", row.corporate_tax_pct),
            ] {
                if value < Decimal::ZERO || value > dec!(100) {
                    return Err(PpaFinanceError::InvalidInput {
                        field: field.into(),
                        reason: format!("{field} for '{}' must be within 0..=100", row.country),
                    });
                }
            }

            records.push(PolicyRecord {
                country: row.country.clone(),
                currency: row.currency.clone(),
                fx_rate: row.fx_rate,
                devaluation_factor: pct(row.devaluation_factor_pct),
                tariff_escalator: pct(row.tariff_escalator_pct),
                om_escalator: pct(row.om_escalator_pct),
                land_rent_escalator: pct(row.land_rent_escalator_pct),
                vat_rate: pct(row.vat_pct),
                corporate_tax_rate: pct(row.corporate_tax_pct),
                tax_exemption_years: row.tax_exemption_years,
            });
        }

        Ok(PolicyTable { records })
    }
}

fn pct(value: Decimal) -> Rate {
    value / dec!(100)
}

// ---------------------------------------------------------------------------
// Normalised reference data
// ---------------------------------------------------------------------------

/// Per-country policy, all rates as decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub country: String,
    pub currency: Currency,
    pub fx_rate: Decimal,
    pub devaluation_factor: Rate,
    pub tariff_escalator: Rate,
    pub om_escalator: Rate,
    pub land_rent_escalator: Rate,
    pub vat_rate: Rate,
    pub corporate_tax_rate: Rate,
    pub tax_exemption_years: u32,
}

/// Immutable policy table, one record per country in configuration order.
/// Only built through `PolicyTableConfig::normalize`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyTable {
    records: Vec<PolicyRecord>,
}

impl PolicyTable {
    /// The built-in reference table.
    pub fn reference() -> PpaFinanceResult<Self> {
        PolicyTableConfig::default().normalize()
    }

    pub fn lookup(&self, country: &str) -> PpaFinanceResult<&PolicyRecord> {
        self.records
            .iter()
            .find(|r| r.country == country)
            .ok_or_else(|| PpaFinanceError::NotFound {
                table: "policy".into(),
                key: country.to_string(),
            })
    }

    pub fn records(&self) -> &[PolicyRecord] {
        &self.records
    }

    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.country.as_str())
    }

    /// Copy of the table with base FX rates replaced by `rates`
    /// (country → rate). Every country must be covered with a positive rate.
    pub fn with_fx_rates(&self, rates: &BTreeMap<String, Decimal>) -> PpaFinanceResult<Self> {
        let mut records = self.records.clone();
        for record in &mut records {
            let rate = rates
                .get(&record.country)
                .copied()
                .ok_or_else(|| PpaFinanceError::MissingRate {
                    currency: record.currency.code().to_string(),
                })?;
            if rate <= Decimal::ZERO {
                return Err(PpaFinanceError::InvalidInput {
                    field: "fx_rate".into(),
                    reason: format!("FX rate for '{}' must be positive, got {rate}", record.country),
                });
            }
            record.fx_rate = rate;
        }
        Ok(Self { records })
    }
}
