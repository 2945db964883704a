use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::Value;

use ppa_finance_core::debt::schedule::{build_debt_schedule, size_debt_facility, DebtFacilityInput};
use ppa_finance_core::exit::valuation::compute_exit_values;

use crate::input;

/// Debt request read from a file or stdin
#[derive(Deserialize)]
struct DebtRequest {
    cash_flows: Vec<Decimal>,
    /// Defaults to the year-0 outflow
    #[serde(default)]
    total_project_cost: Option<Decimal>,
    #[serde(flatten)]
    facility: DebtFacilityInput,
}

/// Arguments for the sculpted debt schedule
#[derive(Args)]
pub struct DebtArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Unlevered cash flows, year 0 first (comma-separated, e.g. "-1000,150,150")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,

    /// Total project cost; defaults to the year-0 outflow
    #[arg(long)]
    pub total_cost: Option<Decimal>,

    /// Facility size; sized from the sculpted debt service when omitted
    #[arg(long)]
    pub facility_size: Option<Decimal>,

    /// Loan tenor in years
    #[arg(long)]
    pub loan_tenor: Option<u32>,

    /// Annual interest rate (decimal)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Minimum DSCR used to sculpt debt service
    #[arg(long, default_value = "1.25")]
    pub min_dscr: Decimal,
}

pub fn run_debt(args: DebtArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: DebtRequest = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        DebtRequest {
            cash_flows: args
                .cash_flows
                .ok_or("--cash-flows is required (or provide --input)")?,
            total_project_cost: args.total_cost,
            facility: DebtFacilityInput {
                facility_size: args.facility_size,
                loan_tenor_years: args
                    .loan_tenor
                    .ok_or("--loan-tenor is required (or provide --input)")?,
                interest_rate: args.rate.ok_or("--rate is required (or provide --input)")?,
                min_dscr: args.min_dscr,
            },
        }
    };

    let facility = &request.facility;
    let total_project_cost = match request.total_project_cost {
        Some(cost) => cost,
        None => -request
            .cash_flows
            .first()
            .copied()
            .ok_or("cash flows cannot be empty")?,
    };
    let facility_size = match facility.facility_size {
        Some(size) => size,
        None => size_debt_facility(
            &request.cash_flows,
            facility.loan_tenor_years,
            facility.interest_rate,
            facility.min_dscr,
        )?,
    };

    let result = build_debt_schedule(
        total_project_cost,
        facility_size,
        facility.loan_tenor_years,
        facility.interest_rate,
        facility.min_dscr,
        &request.cash_flows,
    )?;
    Ok(serde_json::to_value(result)?)
}

/// Exit request read from a file or stdin
#[derive(Deserialize)]
struct ExitRequest {
    cash_flows: Vec<Decimal>,
    #[serde(default = "default_exit_rate")]
    discount_rate: Decimal,
    #[serde(default = "default_exit_years")]
    exit_years: Vec<u32>,
}

fn default_exit_rate() -> Decimal {
    dec!(0.10)
}

fn default_exit_years() -> Vec<u32> {
    vec![5, 10, 15]
}

/// Arguments for exit valuation
#[derive(Args)]
pub struct ExitArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Unlevered cash flows, year 0 first (comma-separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,

    /// Discount rate applied to the cash flows after exit (decimal)
    #[arg(long, default_value = "0.10")]
    pub discount_rate: Decimal,

    /// Candidate exit years (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = "5,10,15")]
    pub exit_years: Vec<u32>,
}

pub fn run_exit(args: ExitArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: ExitRequest = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        ExitRequest {
            cash_flows: args
                .cash_flows
                .ok_or("--cash-flows is required (or provide --input)")?,
            discount_rate: args.discount_rate,
            exit_years: args.exit_years,
        }
    };

    let records = compute_exit_values(&request.cash_flows, request.discount_rate, &request.exit_years)?;
    if records.is_empty() {
        tracing::warn!("no exit year falls inside the cash flow series");
    }
    Ok(serde_json::to_value(records)?)
}
