use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Kwh, Money};

/// One year of the unlevered projection. Row 0 is construction; rows
/// 1..=tenor are operating years. Expenses, depreciation, tax and VAT
/// recovery are stored as negative values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub year: u32,

    // Flags
    pub tenor_active: bool,
    pub inverter_replacement: bool,
    pub dismantling: bool,
    /// 0 while the corporate tax exemption applies, 1 afterwards
    pub tax_exemption_multiplier: Decimal,

    // Indices
    pub inflation_year_counter: u32,
    pub power_degradation_index: Decimal,
    pub tariff_index: Decimal,
    pub om_index: Decimal,
    pub land_index: Decimal,
    pub fx_rate: Decimal,

    // Output and revenue
    pub annual_output_kwh: Kwh,
    pub energy_price: Money,
    pub revenue: Money,

    // Opex
    pub om_expense: Money,
    pub insurance_expense: Money,
    pub management_expense: Money,
    pub land_expense: Money,
    pub rec_expense: Money,
    pub dismantling_expense: Money,
    pub es_expense: Money,
    pub total_opex: Money,

    pub ebitda: Money,

    // VAT credit ledger
    pub vat_paid_on_capex: Money,
    pub net_op_vat_for_recovery: Money,
    pub opening_vat_balance: Money,
    pub capex_vat_additions: Money,
    pub capex_vat_recovery: Money,
    pub closing_vat_balance: Money,

    // Corporate tax
    pub depreciation: Money,
    pub taxable_income: Money,
    pub tax: Money,

    pub tax_paid_ungeared: Money,
    pub inverter_replacement_expense: Money,
    pub project_cashflow: Money,
}

/// Year-indexed ledger, `rows[y].year == y`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionLedger {
    pub rows: Vec<LedgerRow>,
}

impl ProjectionLedger {
    /// Contract tenor covered by the ledger (number of operating rows).
    pub fn tenor(&self) -> u32 {
        self.rows.len().saturating_sub(1) as u32
    }

    pub fn construction(&self) -> Option<&LedgerRow> {
        self.rows.first()
    }

    pub fn operating(&self) -> &[LedgerRow] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Project cashflow per year, index 0 = construction.
    pub fn cash_flows(&self) -> Vec<Money> {
        self.column(|r| r.project_cashflow)
    }

    /// Extract one series across all rows.
    pub fn column(&self, field: impl Fn(&LedgerRow) -> Decimal) -> Vec<Decimal> {
        self.rows.iter().map(field).collect()
    }

    /// Sum of one series over the operating years.
    pub fn operating_total(&self, field: impl Fn(&LedgerRow) -> Decimal) -> Decimal {
        self.operating().iter().map(field).sum()
    }
}
