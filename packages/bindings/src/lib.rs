use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use ppa_finance_core::capex::tiers::{capex_piecewise, TierTable};
use ppa_finance_core::debt::schedule::{self, DebtFacilityInput};
use ppa_finance_core::exit::valuation;
use ppa_finance_core::reference::fx;
use ppa_finance_core::reference::policy::PolicyTableConfig;
use ppa_finance_core::PpaModelInput;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Tenor search
// ---------------------------------------------------------------------------

#[napi]
pub fn solve_ppa_term(input_json: String) -> NapiResult<String> {
    let input: PpaModelInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = ppa_finance_core::solve_ppa_term(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn project_ppa_tenor(input_json: String, tenor: u32) -> NapiResult<String> {
    let input: PpaModelInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = ppa_finance_core::project_ppa_tenor(&input, tenor).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Debt and exit
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct DebtScheduleRequest {
    cash_flows: Vec<Decimal>,
    #[serde(default)]
    total_project_cost: Option<Decimal>,
    #[serde(flatten)]
    facility: DebtFacilityInput,
}

#[napi]
pub fn build_debt_schedule(input_json: String) -> NapiResult<String> {
    let req: DebtScheduleRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let total_project_cost = match req.total_project_cost {
        Some(cost) => cost,
        None => -req
            .cash_flows
            .first()
            .copied()
            .ok_or_else(|| to_napi_error("cash_flows cannot be empty"))?,
    };
    let facility_size = match req.facility.facility_size {
        Some(size) => size,
        None => schedule::size_debt_facility(
            &req.cash_flows,
            req.facility.loan_tenor_years,
            req.facility.interest_rate,
            req.facility.min_dscr,
        )
        .map_err(to_napi_error)?,
    };
    let output = schedule::build_debt_schedule(
        total_project_cost,
        facility_size,
        req.facility.loan_tenor_years,
        req.facility.interest_rate,
        req.facility.min_dscr,
        &req.cash_flows,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct ExitRequest {
    cash_flows: Vec<Decimal>,
    discount_rate: Decimal,
    exit_years: Vec<u32>,
}

#[napi]
pub fn compute_exit_values(input_json: String) -> NapiResult<String> {
    let req: ExitRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = valuation::compute_exit_values(&req.cash_flows, req.discount_rate, &req.exit_years)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

#[napi]
pub fn build_fx_table(policy_json: Option<String>) -> NapiResult<String> {
    let config: PolicyTableConfig = match policy_json {
        Some(json) => serde_json::from_str(&json).map_err(to_napi_error)?,
        None => PolicyTableConfig::default(),
    };
    let policy = config.normalize().map_err(to_napi_error)?;
    serde_json::to_string(&fx::build_fx_table(&policy)).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct CapexRequest {
    size_kw: Decimal,
    fx_rate: Decimal,
    #[serde(default)]
    tiers: Option<TierTable>,
}

#[napi]
pub fn calculate_capex(input_json: String) -> NapiResult<String> {
    let req: CapexRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let tiers = req.tiers.unwrap_or_default();
    let (capex, fx_rate) = capex_piecewise(req.size_kw, req.fx_rate, &tiers).map_err(to_napi_error)?;
    serde_json::to_string(&serde_json::json!({ "capex": capex, "fx_rate": fx_rate })).map_err(to_napi_error)
}
