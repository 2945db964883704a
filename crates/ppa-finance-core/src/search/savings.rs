use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::capex::budget::{AdminAssumptions, ProjectBudget, ProjectParameters};
use crate::projection::ledger::ProjectionLedger;
use crate::time_value::excel_npv;
use crate::types::{Kwh, Money};
use crate::PpaFinanceResult;

/// One year of the offtaker's "buy from the grid" comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonYear {
    pub year: u32,
    /// Grid tariff the offtaker would otherwise pay, escalated naturally
    pub reference_tariff: Money,
    pub offtaker_savings: Money,
    pub provider_savings: Money,
}

/// Reporting metrics for the accepted tenor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermMetrics {
    /// Total generation over every ledger row, the construction year included
    pub average_annual_output_kwh: Kwh,
    /// Total generation over operating years only
    pub average_operating_output_kwh: Kwh,
    pub total_generation_kwh: Kwh,
    pub total_revenue: Money,
    /// NPV of operating-year EBITDA at `AdminAssumptions::npv_discount_rate`
    pub npv_ebitda: Money,
    pub tariff_excl_vat: Money,
    pub equivalent_monthly_payment: Money,
    pub average_payment_annual: Money,
    pub average_payment_monthly: Money,
    pub average_offtaker_savings: Money,
    pub average_provider_savings: Money,
    pub offtaker_investment: Money,
    pub direct_offtaker_investment: Money,
    /// Years for self-built savings to repay a direct investment
    pub payback_year: Option<u32>,
}

/// Per-year comparison against the offtaker's current tariff.
pub fn offtaker_comparison(
    ledger: &ProjectionLedger,
    params: &ProjectParameters,
    admin: &AdminAssumptions,
) -> Vec<ComparisonYear> {
    let growth = Decimal::ONE + admin.reference_tariff_escalator;
    ledger
        .operating()
        .iter()
        .map(|row| {
            let reference_tariff = params.current_tariff * growth.powu(u64::from(row.year - 1));
            let offtaker_savings = reference_tariff * row.annual_output_kwh;
            ComparisonYear {
                year: row.year,
                reference_tariff,
                offtaker_savings,
                provider_savings: offtaker_savings * params.tariff_discount,
            }
        })
        .collect()
}

pub fn term_metrics(
    ledger: &ProjectionLedger,
    comparison: &[ComparisonYear],
    params: &ProjectParameters,
    admin: &AdminAssumptions,
    budget: &ProjectBudget,
) -> PpaFinanceResult<TermMetrics> {
    let tenor = Decimal::from(ledger.tenor().max(1));

    let total_generation_kwh = ledger.operating_total(|r| r.annual_output_kwh);
    let ledger_years = Decimal::from(ledger.rows.len().max(1));
    let average_annual_output_kwh = total_generation_kwh / ledger_years;
    let average_operating_output_kwh = total_generation_kwh / tenor;
    let total_revenue = ledger.operating_total(|r| r.revenue);

    let ebitda: Vec<Money> = ledger.operating().iter().map(|r| r.ebitda).collect();
    let npv_ebitda = excel_npv(admin.npv_discount_rate, &ebitda)?;

    let average_offtaker_savings = comparison.iter().map(|c| c.offtaker_savings).sum::<Money>() / tenor
        - (budget.om_monitoring_expense_excl_vat + admin.insurance_rate * budget.total_capex_incl_vat);
    let average_provider_savings = comparison.iter().map(|c| c.provider_savings).sum::<Money>() / tenor;

    let direct_offtaker_investment = budget.direct_offtaker_investment(params);
    let payback_year = if average_offtaker_savings > Decimal::ZERO {
        (direct_offtaker_investment / average_offtaker_savings).ceil().to_u32()
    } else {
        None
    };

    let average_payment_annual = total_revenue * budget.fx_rate / tenor;

    Ok(TermMetrics {
        average_annual_output_kwh,
        average_operating_output_kwh,
        total_generation_kwh,
        total_revenue,
        npv_ebitda,
        tariff_excl_vat: budget.tariff_excl_vat,
        equivalent_monthly_payment: average_annual_output_kwh * budget.tariff_excl_vat / dec!(12),
        average_payment_annual,
        average_payment_monthly: average_payment_annual / dec!(12),
        average_offtaker_savings,
        average_provider_savings,
        offtaker_investment: params.offtaker_investment_share * (params.epc_cost_excl_vat + params.epc_cost_vat),
        direct_offtaker_investment,
        payback_year,
    })
}
