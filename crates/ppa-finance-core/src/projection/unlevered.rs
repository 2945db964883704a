use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PpaFinanceError;
use crate::projection::ledger::{LedgerRow, ProjectionLedger};
use crate::reference::fx::FxTable;
use crate::reference::policy::PolicyRecord;
use crate::time_value::{irr, DEFAULT_IRR_GUESS};
use crate::types::{Money, Rate, LAST_MODEL_YEAR};
use crate::PpaFinanceResult;

/// Share of the REC value paid away as a fee when RECs are traded.
const REC_FEE_FACTOR: Decimal = dec!(0.30);

/// Environmental/social reporting is only carried in the first years.
const ES_REPORTING_YEARS: u32 = 2;

// ---------------------------------------------------------------------------
// Input / output types
// ---------------------------------------------------------------------------

/// Project economics consumed by the projector. Amounts are in local
/// currency; the projector converts them with the FX table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionInputs {
    pub country: String,
    /// Installed capacity (kW DC)
    pub capacity_kw: Decimal,
    /// Year-1 yield (kWh per kW per year)
    pub specific_power_output: Decimal,
    pub annual_power_degradation: Rate,
    /// Contract tariff excluding VAT (local currency per kWh)
    pub tariff_excl_vat: Money,
    /// O&M and monitoring cost per W per year
    pub om_expense_per_watt: Money,
    pub insurance_rate: Rate,
    pub total_construction_cost_incl_vat: Money,
    /// Asset management fee as a share of revenue
    pub asset_management_fee: Rate,
    pub land_rent_expense: Money,
    pub recs_enabled: bool,
    /// REC value per MWh
    pub rec_cost: Money,
    /// Charged in the final contract year; zero when the asset is handed over
    pub dismantling_cost: Money,
    pub es_reporting_excl_vat: Money,
    /// VAT paid on CAPEX, recoverable against operating VAT
    pub project_vat: Money,
    pub depreciation_years: u32,
    pub inverter_replacement_year: u32,
    pub inverter_replacement_excl_vat: Money,
    pub total_project_cost_excl_vat: Money,
    pub total_capex_incl_vat: Money,
}

/// Ledger, flat cashflow series and IRR for one contract tenor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnleveredProjection {
    pub tenor: u32,
    /// Unlevered post-tax IRR in percent
    pub irr_pct: Decimal,
    /// Index 0 = construction outflow
    pub cash_flows: Vec<Money>,
    pub ledger: ProjectionLedger,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Build the year-by-year ledger for a contract of `tenor` years and solve
/// its IRR.
pub fn project_unlevered(
    tenor: u32,
    inputs: &ProjectionInputs,
    policy: &PolicyRecord,
    fx_table: &FxTable,
) -> PpaFinanceResult<UnleveredProjection> {
    let ledger = build_ledger(tenor, inputs, policy, fx_table)?;
    let cash_flows = ledger.cash_flows();
    let irr_pct = irr(&cash_flows, DEFAULT_IRR_GUESS)? * dec!(100);

    tracing::trace!(tenor, irr_pct = %irr_pct, "unlevered projection");

    Ok(UnleveredProjection {
        tenor,
        irr_pct,
        cash_flows,
        ledger,
    })
}

/// Build the ledger only, without solving the IRR.
pub fn build_ledger(
    tenor: u32,
    inputs: &ProjectionInputs,
    policy: &PolicyRecord,
    fx_table: &FxTable,
) -> PpaFinanceResult<ProjectionLedger> {
    validate_inputs(tenor, inputs, policy)?;

    let country = inputs.country.as_str();
    let fx_y1 = fx_table.rate(country, 1)?;
    let mut rows = Vec::with_capacity(tenor as usize + 1);

    // ── Year 0: construction ─────────────────────────────────────────
    let vat_paid_y0 = inputs.project_vat / fx_y1;
    let opening_y0 = Decimal::ZERO;
    let recovery_y0 = -(opening_y0 + vat_paid_y0).min(Decimal::ZERO);
    let closing_y0 = opening_y0 + vat_paid_y0 + recovery_y0;
    let ebitda_y0 = -inputs.total_capex_incl_vat / fx_y1;

    rows.push(LedgerRow {
        year: 0,
        fx_rate: fx_y1,
        ebitda: ebitda_y0,
        vat_paid_on_capex: vat_paid_y0,
        net_op_vat_for_recovery: Decimal::ZERO,
        opening_vat_balance: opening_y0,
        capex_vat_additions: vat_paid_y0,
        capex_vat_recovery: recovery_y0,
        closing_vat_balance: closing_y0,
        project_cashflow: ebitda_y0,
        ..LedgerRow::default()
    });

    // ── Years 1..=tenor: operations ──────────────────────────────────
    let mut opening_balance = closing_y0;

    for year in 1..=tenor {
        let row = operating_year(year, tenor, opening_balance, fx_y1, inputs, policy, fx_table)?;
        opening_balance = row.closing_vat_balance;
        rows.push(row);
    }

    Ok(ProjectionLedger { rows })
}

fn operating_year(
    year: u32,
    tenor: u32,
    opening_balance: Money,
    fx_y1: Decimal,
    inputs: &ProjectionInputs,
    policy: &PolicyRecord,
    fx_table: &FxTable,
) -> PpaFinanceResult<LedgerRow> {
    let inverter_year = year == inputs.inverter_replacement_year;
    let dismantling_year = year == tenor;
    let tax_multiplier = if year <= policy.tax_exemption_years {
        Decimal::ZERO
    } else {
        Decimal::ONE
    };

    // Indices
    let elapsed = u64::from(year - 1);
    let degradation_idx = (Decimal::ONE - inputs.annual_power_degradation).powu(u64::from(year));
    let tariff_idx = (Decimal::ONE + policy.tariff_escalator).powu(elapsed);
    let om_idx = (Decimal::ONE + policy.om_escalator).powu(elapsed);
    let land_idx = (Decimal::ONE + policy.land_rent_escalator).powu(elapsed);
    let fx = fx_table.rate(&inputs.country, year)?;

    // Output and revenue
    let annual_output = inputs.specific_power_output * inputs.capacity_kw * degradation_idx;
    let energy_price = inputs.tariff_excl_vat * tariff_idx / fx;
    let revenue = energy_price * annual_output;

    // Opex
    let om_expense = -om_idx * inputs.om_expense_per_watt * inputs.capacity_kw * dec!(1000) / fx;
    let insurance_expense = -inputs.insurance_rate * inputs.total_construction_cost_incl_vat * om_idx / fx;
    let management_expense = -inputs.asset_management_fee * revenue * om_idx;
    let land_expense = -(land_idx * inputs.land_rent_expense) / fx;
    let rec_expense = if inputs.recs_enabled {
        -(annual_output / dec!(1000)) * inputs.rec_cost * REC_FEE_FACTOR / fx
    } else {
        Decimal::ZERO
    };
    let dismantling_expense = if dismantling_year {
        -inputs.dismantling_cost / fx
    } else {
        Decimal::ZERO
    };
    let es_expense = if year <= ES_REPORTING_YEARS {
        -(inputs.es_reporting_excl_vat * om_idx) / fx
    } else {
        Decimal::ZERO
    };

    let total_opex = om_expense
        + insurance_expense
        + management_expense
        + land_expense
        + rec_expense
        + dismantling_expense
        + es_expense;
    let ebitda = revenue + total_opex;

    // VAT credit: recovery is capped by the carried balance and by the VAT
    // generated this year.
    let vat_additions = Decimal::ZERO;
    let net_op_vat = ebitda * policy.vat_rate;
    let vat_recovery = -(opening_balance + vat_additions).min(net_op_vat);
    let closing_balance = opening_balance + vat_additions + vat_recovery;

    // Depreciation, with the replacement inverter joining the base from its year
    let depreciation = if year <= inputs.depreciation_years {
        let mut base = inputs.total_project_cost_excl_vat;
        if year >= inputs.inverter_replacement_year {
            base += inputs.inverter_replacement_excl_vat;
        }
        -(base / Decimal::from(inputs.depreciation_years)) / fx
    } else {
        Decimal::ZERO
    };

    let taxable_income = ebitda + depreciation;
    let tax = -(taxable_income * policy.corporate_tax_rate * tax_multiplier);

    let tax_paid_ungeared = tax - vat_recovery;
    // Priced at the FX rate prevailing at financial close
    let inverter_replacement_expense = if inverter_year {
        -inputs.inverter_replacement_excl_vat / fx_y1
    } else {
        Decimal::ZERO
    };
    let project_cashflow = ebitda + tax_paid_ungeared + inverter_replacement_expense;

    Ok(LedgerRow {
        year,
        tenor_active: true,
        inverter_replacement: inverter_year,
        dismantling: dismantling_year,
        tax_exemption_multiplier: tax_multiplier,
        inflation_year_counter: year - 1,
        power_degradation_index: degradation_idx,
        tariff_index: tariff_idx,
        om_index: om_idx,
        land_index: land_idx,
        fx_rate: fx,
        annual_output_kwh: annual_output,
        energy_price,
        revenue,
        om_expense,
        insurance_expense,
        management_expense,
        land_expense,
        rec_expense,
        dismantling_expense,
        es_expense,
        total_opex,
        ebitda,
        vat_paid_on_capex: Decimal::ZERO,
        net_op_vat_for_recovery: net_op_vat,
        opening_vat_balance: opening_balance,
        capex_vat_additions: vat_additions,
        capex_vat_recovery: vat_recovery,
        closing_vat_balance: closing_balance,
        depreciation,
        taxable_income,
        tax,
        tax_paid_ungeared,
        inverter_replacement_expense,
        project_cashflow,
    })
}

fn validate_inputs(tenor: u32, inputs: &ProjectionInputs, policy: &PolicyRecord) -> PpaFinanceResult<()> {
    if tenor == 0 || tenor > LAST_MODEL_YEAR {
        return Err(PpaFinanceError::OutOfRange {
            what: "tenor".into(),
            value: tenor.to_string(),
            reason: format!("contract tenor must be within 1..={LAST_MODEL_YEAR} years"),
        });
    }
    if policy.country != inputs.country {
        return Err(PpaFinanceError::InvalidInput {
            field: "country".into(),
            reason: format!(
                "Policy record is for '{}' but inputs are for '{}'",
                policy.country, inputs.country
            ),
        });
    }
    if inputs.capacity_kw <= Decimal::ZERO {
        return Err(PpaFinanceError::InvalidInput {
            field: "capacity_kw".into(),
            reason: "Capacity must be positive".into(),
        });
    }
    if inputs.annual_power_degradation < Decimal::ZERO || inputs.annual_power_degradation >= Decimal::ONE {
        return Err(PpaFinanceError::InvalidInput {
            field: "annual_power_degradation".into(),
            reason: "Degradation must be within [0, 1)".into(),
        });
    }
    if inputs.total_capex_incl_vat <= Decimal::ZERO {
        return Err(PpaFinanceError::InvalidInput {
            field: "total_capex_incl_vat".into(),
            reason: "Total CAPEX must be positive".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::fx::build_fx_table;
    use crate::reference::policy::PolicyTable;
    use pretty_assertions::assert_eq;

    fn inputs(country: &str) -> ProjectionInputs {
        ProjectionInputs {
            country: country.into(),
            capacity_kw: dec!(1000),
            specific_power_output: dec!(1300),
            annual_power_degradation: dec!(0.004),
            tariff_excl_vat: dec!(0.12),
            om_expense_per_watt: dec!(0.0096),
            insurance_rate: dec!(0.005),
            total_construction_cost_incl_vat: dec!(900000),
            asset_management_fee: dec!(0.03),
            land_rent_expense: dec!(5000),
            recs_enabled: false,
            rec_cost: dec!(1.5),
            dismantling_cost: dec!(16000),
            es_reporting_excl_vat: dec!(1000),
            project_vat: dec!(60000),
            depreciation_years: 20,
            inverter_replacement_year: 12,
            inverter_replacement_excl_vat: dec!(17000),
            total_project_cost_excl_vat: dec!(850000),
            total_capex_incl_vat: dec!(950000),
        }
    }

    fn run(country: &str, tenor: u32) -> UnleveredProjection {
        let table = PolicyTable::reference().unwrap();
        let fx = build_fx_table(&table);
        project_unlevered(tenor, &inputs(country), table.lookup(country).unwrap(), &fx).unwrap()
    }

    #[test]
    fn test_construction_row() {
        let p = run("Panama", 20);
        let y0 = &p.ledger.rows[0];
        assert_eq!(y0.ebitda, dec!(-950000));
        assert_eq!(y0.project_cashflow, dec!(-950000));
        assert_eq!(y0.vat_paid_on_capex, dec!(60000));
        assert_eq!(y0.closing_vat_balance, dec!(60000));
        assert_eq!(y0.capex_vat_recovery, Decimal::ZERO);
        assert_eq!(p.cash_flows[0], dec!(-950000));
    }

    #[test]
    fn test_ledger_shape() {
        let p = run("Panama", 15);
        assert_eq!(p.ledger.rows.len(), 16);
        assert_eq!(p.cash_flows.len(), 16);
        for (i, row) in p.ledger.rows.iter().enumerate() {
            assert_eq!(row.year as usize, i);
        }
        assert!(p.ledger.operating().iter().all(|r| r.tenor_active));
    }

    #[test]
    fn test_first_operating_year_revenue() {
        let p = run("Panama", 10);
        let y1 = &p.ledger.rows[1];
        // 1300 * 1000 * 0.996 = 1,294,800 kWh at 0.12
        assert_eq!(y1.annual_output_kwh, dec!(1294800));
        assert_eq!(y1.energy_price, dec!(0.12));
        assert_eq!(y1.revenue, dec!(155376));
        // O&M: 0.0096 * 1000 * 1000 = 9,600
        assert_eq!(y1.om_expense, dec!(-9600));
        assert_eq!(y1.insurance_expense, dec!(-4500));
        assert_eq!(y1.land_expense, dec!(-5000));
        assert_eq!(y1.es_expense, dec!(-1000));
        assert_eq!(y1.rec_expense, Decimal::ZERO);
    }

    #[test]
    fn test_vat_ledger_carries_forward() {
        let p = run("Colombia", 25);
        let rows = &p.ledger.rows;
        for row in rows {
            assert_eq!(
                row.closing_vat_balance,
                row.opening_vat_balance + row.capex_vat_additions + row.capex_vat_recovery
            );
        }
        for pair in rows.windows(2) {
            assert_eq!(pair[1].opening_vat_balance, pair[0].closing_vat_balance);
        }
    }

    #[test]
    fn test_vat_recovery_capped_by_balance() {
        let p = run("Panama", 25);
        for row in p.ledger.operating() {
            assert!(-row.capex_vat_recovery <= row.opening_vat_balance);
            assert!(row.closing_vat_balance >= Decimal::ZERO);
        }
        // The credit is eventually exhausted
        assert_eq!(p.ledger.rows[25].closing_vat_balance, Decimal::ZERO);
    }

    #[test]
    fn test_tax_exemption_window() {
        // Ecuador: 10-year exemption
        let p = run("Ecuador", 15);
        for row in p.ledger.operating() {
            if row.year <= 10 {
                assert_eq!(row.tax, Decimal::ZERO, "year {}", row.year);
                assert_eq!(row.tax_exemption_multiplier, Decimal::ZERO);
            } else {
                assert_eq!(row.tax_exemption_multiplier, Decimal::ONE);
                assert_eq!(row.tax, -(row.taxable_income * dec!(0.25)));
            }
        }
    }

    #[test]
    fn test_dismantling_only_in_final_year() {
        let p = run("Panama", 8);
        for row in p.ledger.operating() {
            if row.year == 8 {
                assert!(row.dismantling);
                assert_eq!(row.dismantling_expense, dec!(-16000));
            } else {
                assert!(!row.dismantling);
                assert_eq!(row.dismantling_expense, Decimal::ZERO);
            }
        }
    }

    #[test]
    fn test_inverter_replacement_priced_at_year_one_fx() {
        let p = run("Colombia", 20);
        let y12 = &p.ledger.rows[12];
        assert!(y12.inverter_replacement);
        assert_eq!(y12.inverter_replacement_expense, dec!(-17000) / dec!(4000));
        assert!(p
            .ledger
            .operating()
            .iter()
            .filter(|r| r.year != 12)
            .all(|r| r.inverter_replacement_expense.is_zero()));
    }

    #[test]
    fn test_depreciation_base_steps_up_after_replacement() {
        let p = run("Panama", 25);
        let rows = &p.ledger.rows;
        assert_eq!(rows[11].depreciation, dec!(-42500));
        assert_eq!(rows[12].depreciation, dec!(-43350));
        assert_eq!(rows[20].depreciation, dec!(-43350));
        assert_eq!(rows[21].depreciation, Decimal::ZERO);
    }

    #[test]
    fn test_es_expense_only_first_two_years() {
        let p = run("Panama", 5);
        let es: Vec<Decimal> = p.ledger.column(|r| r.es_expense);
        assert!(es[1] < Decimal::ZERO);
        assert!(es[2] < Decimal::ZERO);
        assert!(es[3..].iter().all(|v| v.is_zero()));
    }

    #[test]
    fn test_recs_reduce_ebitda() {
        let table = PolicyTable::reference().unwrap();
        let fx = build_fx_table(&table);
        let policy = table.lookup("Panama").unwrap();
        let mut with_recs = inputs("Panama");
        with_recs.recs_enabled = true;
        let a = build_ledger(5, &inputs("Panama"), policy, &fx).unwrap();
        let b = build_ledger(5, &with_recs, policy, &fx).unwrap();
        // 1,294.8 MWh * 1.5 * 0.3
        assert_eq!(b.rows[1].rec_expense, dec!(-582.66));
        assert!(b.rows[1].ebitda < a.rows[1].ebitda);
    }

    #[test]
    fn test_projection_is_deterministic() {
        assert_eq!(run("Honduras", 18), run("Honduras", 18));
    }

    #[test]
    fn test_rejects_zero_tenor() {
        let table = PolicyTable::reference().unwrap();
        let fx = build_fx_table(&table);
        let err = project_unlevered(0, &inputs("Peru"), table.lookup("Peru").unwrap(), &fx).unwrap_err();
        assert!(matches!(err, PpaFinanceError::OutOfRange { .. }));
    }

    #[test]
    fn test_rejects_mismatched_policy() {
        let table = PolicyTable::reference().unwrap();
        let fx = build_fx_table(&table);
        let err = build_ledger(5, &inputs("Peru"), table.lookup("Chile").unwrap(), &fx).unwrap_err();
        assert!(matches!(err, PpaFinanceError::InvalidInput { .. }));
    }
}
