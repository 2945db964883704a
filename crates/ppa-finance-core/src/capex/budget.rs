use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::capex::tiers::{capex_piecewise, TierTable};
use crate::error::PpaFinanceError;
use crate::projection::unlevered::ProjectionInputs;
use crate::reference::fx::FxTable;
use crate::reference::policy::PolicyRecord;
use crate::types::{Kwh, Money, Rate};
use crate::PpaFinanceResult;

const HOURS_PER_YEAR: Decimal = dec!(8760);

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Scenario supplied by the developer / contractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectParameters {
    pub country: String,
    /// Installed capacity (kW DC)
    pub capacity_kw: Decimal,
    pub epc_cost_excl_vat: Money,
    pub epc_cost_vat: Money,
    /// Offtaker's current utility tariff per kWh
    pub current_tariff: Money,
    /// Discount granted on the current tariff (decimal)
    pub tariff_discount: Rate,
    /// P90 annual generation forecast
    pub forecast_generation_kwh: Kwh,
    /// Annual land rent
    #[serde(default)]
    pub land_rent_expense: Money,
    #[serde(default)]
    pub recs_enabled: bool,
    /// Share of EPC (incl. VAT) funded by the offtaker
    #[serde(default)]
    pub offtaker_investment_share: Rate,
    /// When the asset passes to the offtaker, no dismantling cost is borne
    #[serde(default)]
    pub asset_ownership_transferred: bool,
}

/// Fixed assumptions owned by the platform administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminAssumptions {
    pub contingency_rate: Rate,
    pub depreciation_years: u32,
    pub annual_power_degradation: Rate,
    pub inverter_replacement_year: u32,
    pub insurance_rate: Rate,
    pub asset_management_fee: Rate,
    /// REC value per MWh in reporting currency
    pub rec_rate: Money,
    /// Development / readiness cost as a share of EPC
    pub readiness_rate: Rate,
    pub environmental_social_cost: Money,
    pub due_diligence_cost: Money,
    pub es_reporting_expense: Money,
    /// O&M and monitoring cost per kW per year in reporting currency
    pub om_monitoring_per_kw: Money,
    pub om_monitoring_discount: Rate,
    /// Replacement inverter cost per kW in reporting currency
    pub inverter_replacement_per_kw: Money,
    /// Dismantling cost as a share of EPC
    pub dismantling_rate: Rate,
    /// Annual escalation of the offtaker's utility tariff
    pub reference_tariff_escalator: Rate,
    pub npv_discount_rate: Rate,
    pub exit_discount_rate: Rate,
    pub exit_years: Vec<u32>,
}

impl Default for AdminAssumptions {
    fn default() -> Self {
        Self {
            contingency_rate: dec!(0.03),
            depreciation_years: 20,
            annual_power_degradation: dec!(0.004),
            inverter_replacement_year: 12,
            insurance_rate: dec!(0.005),
            asset_management_fee: dec!(0.03),
            rec_rate: dec!(1.5),
            readiness_rate: dec!(0.05),
            environmental_social_cost: Decimal::ZERO,
            due_diligence_cost: Decimal::ZERO,
            es_reporting_expense: Decimal::ZERO,
            om_monitoring_per_kw: dec!(12),
            om_monitoring_discount: dec!(0.20),
            inverter_replacement_per_kw: dec!(17),
            dismantling_rate: dec!(0.02),
            reference_tariff_escalator: dec!(0.01),
            npv_discount_rate: dec!(0.10),
            exit_discount_rate: dec!(0.10),
            exit_years: vec![5, 10, 15],
        }
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Cost build-up and derived operating quantities, in local currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectBudget {
    /// Year-1 FX rate used for every conversion below
    pub fx_rate: Decimal,
    pub project_management_excl_vat: Money,
    pub readiness_excl_vat: Money,
    pub environmental_social_excl_vat: Money,
    pub due_diligence_excl_vat: Money,
    pub contingencies_excl_vat: Money,
    pub total_project_cost_excl_vat: Money,
    pub project_management_vat: Money,
    pub readiness_vat: Money,
    pub contingencies_vat: Money,
    pub environmental_social_vat: Money,
    pub due_diligence_vat: Money,
    pub project_vat: Money,
    pub total_project_cost_incl_vat: Money,
    pub specific_cost_incl_vat: Money,
    pub total_capex_incl_vat: Money,
    pub total_construction_cost_incl_vat: Money,
    pub tariff_excl_vat: Money,
    pub specific_power_output: Decimal,
    pub capacity_factor: Decimal,
    pub om_monitoring_expense_excl_vat: Money,
    pub om_expense_per_watt: Money,
    pub inverter_replacement_excl_vat: Money,
    pub dismantling_cost: Money,
    pub rec_cost: Money,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Aggregate the scenario into project cost, VAT and the per-unit operating
/// quantities the projector needs.
pub fn build_project_budget(
    params: &ProjectParameters,
    admin: &AdminAssumptions,
    policy: &PolicyRecord,
    fx_table: &FxTable,
    tiers: &TierTable,
) -> PpaFinanceResult<ProjectBudget> {
    validate_parameters(params)?;

    let (project_management_excl_vat, fx_rate) =
        capex_piecewise(params.capacity_kw, fx_table.rate(&params.country, 1)?, tiers)?;

    let epc = params.epc_cost_excl_vat;
    let readiness_excl_vat = epc * admin.readiness_rate;
    let es_excl_vat = admin.environmental_social_cost;
    let dd_excl_vat = admin.due_diligence_cost;
    let contingencies_excl_vat =
        admin.contingency_rate * (epc + project_management_excl_vat + es_excl_vat + dd_excl_vat);

    let total_project_cost_excl_vat = epc
        + project_management_excl_vat
        + readiness_excl_vat
        + contingencies_excl_vat
        + es_excl_vat
        + dd_excl_vat;

    let vat = policy.vat_rate;
    let project_management_vat = project_management_excl_vat * vat;
    let readiness_vat = readiness_excl_vat * vat;
    let contingencies_vat = contingencies_excl_vat * vat;
    let es_vat = es_excl_vat * vat;
    let dd_vat = dd_excl_vat * vat;
    let project_vat = params.epc_cost_vat
        + project_management_vat
        + readiness_vat
        + contingencies_vat
        + es_vat
        + dd_vat;

    let total_project_cost_incl_vat = total_project_cost_excl_vat + project_vat;

    // The offtaker's share of EPC is not financed by the project
    let specific_cost_incl_vat = ((Decimal::ONE - params.offtaker_investment_share)
        * (epc + params.epc_cost_vat)
        + (project_vat - params.epc_cost_vat)
        + (total_project_cost_excl_vat - epc))
        / params.capacity_kw;
    let total_capex_incl_vat = specific_cost_incl_vat * params.capacity_kw;
    let total_construction_cost_incl_vat = total_capex_incl_vat - readiness_excl_vat - readiness_vat;

    let tariff_excl_vat = params.current_tariff * (Decimal::ONE - params.tariff_discount);
    let specific_power_output = params.forecast_generation_kwh / params.capacity_kw;
    let capacity_factor = params.forecast_generation_kwh / (HOURS_PER_YEAR * params.capacity_kw);

    let om_monitoring_expense_excl_vat = admin.om_monitoring_per_kw
        * (Decimal::ONE - admin.om_monitoring_discount)
        * params.capacity_kw
        * fx_rate;
    let om_expense_per_watt = om_monitoring_expense_excl_vat / (params.capacity_kw * dec!(1000));

    let inverter_replacement_excl_vat = admin.inverter_replacement_per_kw * params.capacity_kw * fx_rate;
    let dismantling_cost = if params.asset_ownership_transferred {
        Decimal::ZERO
    } else {
        admin.dismantling_rate * epc
    };
    let rec_cost = admin.rec_rate * fx_rate;

    Ok(ProjectBudget {
        fx_rate,
        project_management_excl_vat,
        readiness_excl_vat,
        environmental_social_excl_vat: es_excl_vat,
        due_diligence_excl_vat: dd_excl_vat,
        contingencies_excl_vat,
        total_project_cost_excl_vat,
        project_management_vat,
        readiness_vat,
        contingencies_vat,
        environmental_social_vat: es_vat,
        due_diligence_vat: dd_vat,
        project_vat,
        total_project_cost_incl_vat,
        specific_cost_incl_vat,
        total_capex_incl_vat,
        total_construction_cost_incl_vat,
        tariff_excl_vat,
        specific_power_output,
        capacity_factor,
        om_monitoring_expense_excl_vat,
        om_expense_per_watt,
        inverter_replacement_excl_vat,
        dismantling_cost,
        rec_cost,
    })
}

impl ProjectBudget {
    /// Projector inputs for this budget.
    pub fn projection_inputs(&self, params: &ProjectParameters, admin: &AdminAssumptions) -> ProjectionInputs {
        ProjectionInputs {
            country: params.country.clone(),
            capacity_kw: params.capacity_kw,
            specific_power_output: self.specific_power_output,
            annual_power_degradation: admin.annual_power_degradation,
            tariff_excl_vat: self.tariff_excl_vat,
            om_expense_per_watt: self.om_expense_per_watt,
            insurance_rate: admin.insurance_rate,
            total_construction_cost_incl_vat: self.total_construction_cost_incl_vat,
            asset_management_fee: admin.asset_management_fee,
            land_rent_expense: params.land_rent_expense,
            recs_enabled: params.recs_enabled,
            rec_cost: self.rec_cost,
            dismantling_cost: self.dismantling_cost,
            es_reporting_excl_vat: admin.es_reporting_expense,
            project_vat: self.project_vat,
            depreciation_years: admin.depreciation_years,
            inverter_replacement_year: admin.inverter_replacement_year,
            inverter_replacement_excl_vat: self.inverter_replacement_excl_vat,
            total_project_cost_excl_vat: self.total_project_cost_excl_vat,
            total_capex_incl_vat: self.total_capex_incl_vat,
        }
    }

    /// What the offtaker would spend building the plant itself.
    pub fn direct_offtaker_investment(&self, params: &ProjectParameters) -> Money {
        params.epc_cost_excl_vat
            + self.project_management_excl_vat
            + self.contingencies_excl_vat
            + params.epc_cost_vat
            + self.project_management_vat
            + self.contingencies_vat
    }
}

fn validate_parameters(params: &ProjectParameters) -> PpaFinanceResult<()> {
    if params.capacity_kw <= Decimal::ZERO {
        return Err(PpaFinanceError::InvalidInput {
            field: "capacity_kw".into(),
            reason: "Capacity must be positive".into(),
        });
    }
    for (field, value) in [
        ("epc_cost_excl_vat", params.epc_cost_excl_vat),
        ("epc_cost_vat", params.epc_cost_vat),
        ("current_tariff", params.current_tariff),
        ("forecast_generation_kwh", params.forecast_generation_kwh),
        ("land_rent_expense", params.land_rent_expense),
    ] {
        if value < Decimal::ZERO {
            return Err(PpaFinanceError::InvalidInput {
                field: field.into(),
                reason: "Value cannot be negative".into(),
            });
        }
    }
    for (field, value) in [
        ("tariff_discount", params.tariff_discount),
        ("offtaker_investment_share", params.offtaker_investment_share),
    ] {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(PpaFinanceError::InvalidInput {
                field: field.into(),
                reason: "Share must be within [0, 1]".into(),
            });
        }
    }
    Ok(())
}
