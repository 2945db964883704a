use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use ppa_finance_core::capex::budget::{AdminAssumptions, ProjectParameters};
use ppa_finance_core::debt::schedule::DebtFacilityInput;
use ppa_finance_core::reference::policy::PolicyTableConfig;
use ppa_finance_core::{project_ppa_tenor, solve_ppa_term, PpaModelInput, FIRST_MODEL_YEAR, LAST_MODEL_YEAR};

use crate::input;

/// Project and hurdle flags shared by `solve` and `project`
#[derive(Args)]
pub struct ModelFlags {
    /// Path to JSON/YAML model input (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Policy table file replacing the built-in reference data
    #[arg(long)]
    pub policy: Option<String>,

    /// Country of the project (must exist in the policy table)
    #[arg(long)]
    pub country: Option<String>,

    /// Installed capacity in kW DC
    #[arg(long)]
    pub capacity_kw: Option<Decimal>,

    /// EPC cost excluding VAT (local currency)
    #[arg(long)]
    pub epc_cost: Option<Decimal>,

    /// VAT on the EPC contract; defaults to EPC cost times the country VAT rate
    #[arg(long)]
    pub epc_vat: Option<Decimal>,

    /// Offtaker's current electricity tariff per kWh
    #[arg(long)]
    pub tariff: Option<Decimal>,

    /// Discount on the current tariff as a decimal (0.10 = 10%)
    #[arg(long, default_value = "0")]
    pub tariff_discount: Decimal,

    /// Forecast year-1 generation in kWh
    #[arg(long)]
    pub generation_kwh: Option<Decimal>,

    /// Annual land rent (local currency)
    #[arg(long, default_value = "0")]
    pub land_rent: Decimal,

    /// Trade renewable energy certificates
    #[arg(long)]
    pub recs: bool,

    /// Share of EPC funded by the offtaker (decimal)
    #[arg(long, default_value = "0")]
    pub offtaker_share: Decimal,

    /// Asset is handed to the offtaker at the end of the PPA (no dismantling)
    #[arg(long)]
    pub ownership_transferred: bool,

    /// Target unlevered IRR in percent (12 = 12%)
    #[arg(long)]
    pub target_irr: Option<Decimal>,
}

/// Arguments for the tenor search
#[derive(Args)]
pub struct SolveArgs {
    #[command(flatten)]
    pub model: ModelFlags,

    /// Shortest tenor to consider
    #[arg(long)]
    pub min_tenor: Option<u32>,

    /// Longest tenor to consider
    #[arg(long)]
    pub max_tenor: Option<u32>,

    /// Loan tenor in years; enables the debt schedule
    #[arg(long)]
    pub loan_tenor: Option<u32>,

    /// Annual loan interest rate (decimal)
    #[arg(long)]
    pub loan_rate: Option<Decimal>,

    /// Minimum DSCR used to sculpt debt service
    #[arg(long, default_value = "1.25")]
    pub min_dscr: Decimal,

    /// Facility size; sized from the sculpted debt service when omitted
    #[arg(long)]
    pub facility_size: Option<Decimal>,
}

pub fn run_solve(args: SolveArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut model = load_model_input(&args.model)?;

    if let Some(min) = args.min_tenor {
        model.min_tenor = min;
    }
    if let Some(max) = args.max_tenor {
        model.max_tenor = max;
    }
    if let Some(loan_tenor_years) = args.loan_tenor {
        let interest_rate = args
            .loan_rate
            .ok_or("--loan-rate is required with --loan-tenor")?;
        model.debt = Some(DebtFacilityInput {
            facility_size: args.facility_size,
            loan_tenor_years,
            interest_rate,
            min_dscr: args.min_dscr,
        });
    }

    let result = solve_ppa_term(&model)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for a fixed-tenor projection
#[derive(Args)]
pub struct ProjectArgs {
    #[command(flatten)]
    pub model: ModelFlags,

    /// Contract tenor in years (1-25)
    #[arg(long)]
    pub tenor: u32,
}

pub fn run_project(args: ProjectArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let model = load_model_input(&args.model)?;
    let result = project_ppa_tenor(&model, args.tenor)?;
    Ok(serde_json::to_value(result)?)
}

/// Model input from `--input`, piped stdin, or individual flags, in that order.
fn load_model_input(flags: &ModelFlags) -> Result<PpaModelInput, Box<dyn std::error::Error>> {
    let policy: Option<PolicyTableConfig> = match &flags.policy {
        Some(path) => Some(input::file::read_input(path)?),
        None => None,
    };

    let mut model: PpaModelInput = if let Some(ref path) = flags.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        model_from_flags(flags, policy.as_ref())?
    };

    if policy.is_some() {
        model.policy = policy;
    }
    Ok(model)
}

fn model_from_flags(
    flags: &ModelFlags,
    policy: Option<&PolicyTableConfig>,
) -> Result<PpaModelInput, Box<dyn std::error::Error>> {
    let country = flags
        .country
        .clone()
        .ok_or("--country is required (or provide --input)")?;
    let capacity_kw = flags
        .capacity_kw
        .ok_or("--capacity-kw is required (or provide --input)")?;
    let epc_cost_excl_vat = flags
        .epc_cost
        .ok_or("--epc-cost is required (or provide --input)")?;
    let current_tariff = flags
        .tariff
        .ok_or("--tariff is required (or provide --input)")?;
    let forecast_generation_kwh = flags
        .generation_kwh
        .ok_or("--generation-kwh is required (or provide --input)")?;
    let target_irr_pct = flags
        .target_irr
        .ok_or("--target-irr is required (or provide --input)")?;

    let epc_cost_vat = match flags.epc_vat {
        Some(vat) => vat,
        None => {
            let table = match policy {
                Some(config) => config.normalize()?,
                None => PolicyTableConfig::default().normalize()?,
            };
            epc_cost_excl_vat * table.lookup(&country)?.vat_rate
        }
    };

    Ok(PpaModelInput {
        project: ProjectParameters {
            country,
            capacity_kw,
            epc_cost_excl_vat,
            epc_cost_vat,
            current_tariff,
            tariff_discount: flags.tariff_discount,
            forecast_generation_kwh,
            land_rent_expense: flags.land_rent,
            recs_enabled: flags.recs,
            offtaker_investment_share: flags.offtaker_share,
            asset_ownership_transferred: flags.ownership_transferred,
        },
        admin: AdminAssumptions::default(),
        target_irr_pct,
        min_tenor: FIRST_MODEL_YEAR,
        max_tenor: LAST_MODEL_YEAR,
        debt: None,
        policy: None,
        tiers: None,
    })
}
