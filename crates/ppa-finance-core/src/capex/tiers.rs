use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PpaFinanceError;
use crate::types::Money;
use crate::PpaFinanceResult;

/// One tranche of the piecewise CAPEX schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapexTier {
    /// Lower bound of the tranche in kW; sizes at or above it fall here
    pub size_above_kw: Decimal,
    /// Marginal cost per kW inside the tranche
    pub cost_per_kw: Money,
    /// Cost of all capacity below `size_above_kw`
    pub from_previous_tranche: Money,
}

/// Ascending tier schedule. The cumulative cost of each tier must equal the
/// previous tier's cumulative cost plus its marginal cost over its width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CapexTier>", into = "Vec<CapexTier>")]
pub struct TierTable {
    tiers: Vec<CapexTier>,
}

impl Default for TierTable {
    fn default() -> Self {
        let tier = |size_above_kw, cost_per_kw, from_previous_tranche| CapexTier {
            size_above_kw,
            cost_per_kw,
            from_previous_tranche,
        };
        Self {
            tiers: vec![
                tier(dec!(0), dec!(40), dec!(0)),
                tier(dec!(500), dec!(35), dec!(20000)),
                tier(dec!(1000), dec!(30), dec!(37500)),
                tier(dec!(2000), dec!(25), dec!(67500)),
                tier(dec!(5000), dec!(20), dec!(142500)),
                tier(dec!(10000), dec!(15), dec!(242500)),
            ],
        }
    }
}

impl TierTable {
    pub fn new(tiers: Vec<CapexTier>) -> PpaFinanceResult<Self> {
        if tiers.is_empty() {
            return Err(PpaFinanceError::InvalidInput {
                field: "tiers".into(),
                reason: "Tier table needs at least one tier".into(),
            });
        }

        for (i, pair) in tiers.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.size_above_kw <= prev.size_above_kw {
                return Err(PpaFinanceError::InvalidInput {
                    field: "tiers".into(),
                    reason: format!("Tier {} threshold must exceed tier {i}", i + 1),
                });
            }
            let expected = prev.from_previous_tranche
                + prev.cost_per_kw * (next.size_above_kw - prev.size_above_kw);
            if next.from_previous_tranche != expected {
                return Err(PpaFinanceError::InvalidInput {
                    field: "tiers".into(),
                    reason: format!(
                        "Tier {} cumulative cost {} should be {expected}",
                        i + 1,
                        next.from_previous_tranche
                    ),
                });
            }
        }

        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[CapexTier] {
        &self.tiers
    }

    /// The highest tier whose threshold is at or below `size_kw`.
    pub fn tier_for(&self, size_kw: Decimal) -> PpaFinanceResult<&CapexTier> {
        let count = self.tiers.partition_point(|t| t.size_above_kw <= size_kw);
        if count == 0 {
            return Err(PpaFinanceError::OutOfRange {
                what: "plant size (kW)".into(),
                value: size_kw.to_string(),
                reason: format!(
                    "below the minimum tier breakpoint of {}",
                    self.tiers[0].size_above_kw
                ),
            });
        }
        Ok(&self.tiers[count - 1])
    }
}

impl TryFrom<Vec<CapexTier>> for TierTable {
    type Error = PpaFinanceError;

    fn try_from(tiers: Vec<CapexTier>) -> Result<Self, Self::Error> {
        Self::new(tiers)
    }
}

impl From<TierTable> for Vec<CapexTier> {
    fn from(table: TierTable) -> Self {
        table.tiers
    }
}

/// Piecewise CAPEX for a plant of `size_kw`, priced in the tier currency and
/// converted with `fx_rate`. Returns the converted cost and the rate used.
pub fn capex_piecewise(
    size_kw: Decimal,
    fx_rate: Decimal,
    tiers: &TierTable,
) -> PpaFinanceResult<(Money, Decimal)> {
    let tier = tiers.tier_for(size_kw)?;
    let subtotal = tier.from_previous_tranche + (size_kw - tier.size_above_kw) * tier.cost_per_kw;
    Ok((subtotal * fx_rate, fx_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_consistent() {
        let table = TierTable::default();
        assert!(TierTable::new(table.tiers().to_vec()).is_ok());
    }

    #[test]
    fn test_size_inside_first_tier() {
        let (cost, fx) = capex_piecewise(dec!(100), dec!(1), &TierTable::default()).unwrap();
        assert_eq!(cost, dec!(4000));
        assert_eq!(fx, dec!(1));
    }

    #[test]
    fn test_threshold_belongs_to_upper_tier() {
        let table = TierTable::default();
        assert_eq!(table.tier_for(dec!(500)).unwrap().cost_per_kw, dec!(35));
        assert_eq!(table.tier_for(dec!(499.99)).unwrap().cost_per_kw, dec!(40));
    }

    #[test]
    fn test_cost_at_boundaries_equals_cumulative() {
        let table = TierTable::default();
        for tier in table.tiers() {
            let (cost, _) = capex_piecewise(tier.size_above_kw, dec!(3.8), &table).unwrap();
            assert_eq!(cost, tier.from_previous_tranche * dec!(3.8));
        }
    }

    #[test]
    fn test_reference_plant() {
        // 2302 kW: 67,500 + 302 * 25 = 75,050
        let (cost, _) = capex_piecewise(dec!(2302), dec!(1), &TierTable::default()).unwrap();
        assert_eq!(cost, dec!(75050));
    }

    #[test]
    fn test_beyond_last_threshold() {
        let (cost, _) = capex_piecewise(dec!(12000), dec!(1), &TierTable::default()).unwrap();
        assert_eq!(cost, dec!(272500));
    }

    #[test]
    fn test_below_minimum_is_out_of_range() {
        let err = capex_piecewise(dec!(-1), dec!(1), &TierTable::default()).unwrap_err();
        assert!(matches!(err, PpaFinanceError::OutOfRange { .. }));
    }

    #[test]
    fn test_inconsistent_cumulative_rejected() {
        let mut tiers = TierTable::default().tiers().to_vec();
        tiers[2].from_previous_tranche = dec!(40000);
        assert!(TierTable::new(tiers).is_err());
    }

    #[test]
    fn test_unsorted_rejected() {
        let mut tiers = TierTable::default().tiers().to_vec();
        tiers.swap(1, 2);
        assert!(TierTable::new(tiers).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let bad = r#"[{"size_above_kw": 0, "cost_per_kw": 10, "from_previous_tranche": 0},
                      {"size_above_kw": 100, "cost_per_kw": 5, "from_previous_tranche": 999}]"#;
        assert!(serde_json::from_str::<TierTable>(bad).is_err());

        let good = r#"[{"size_above_kw": 0, "cost_per_kw": 10, "from_previous_tranche": 0},
                       {"size_above_kw": 100, "cost_per_kw": 5, "from_previous_tranche": 1000}]"#;
        let table: TierTable = serde_json::from_str(good).unwrap();
        assert_eq!(table.tiers().len(), 2);
    }
}
