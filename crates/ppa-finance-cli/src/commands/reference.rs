use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use ppa_finance_core::capex::tiers::{capex_piecewise, TierTable};
use ppa_finance_core::reference::fx::{build_fx_table, refresh_policy_rates, FxQuotes, StaticFxProvider};
use ppa_finance_core::reference::policy::{PolicyTable, PolicyTableConfig};
use ppa_finance_core::{FIRST_MODEL_YEAR, LAST_MODEL_YEAR};

use crate::input;

/// Policy table from `--policy` (or the built-in one), with base FX rates
/// replaced by `--rates` quotes when given.
fn load_policy(policy: Option<&str>, rates: Option<&str>) -> Result<PolicyTable, Box<dyn std::error::Error>> {
    let config: PolicyTableConfig = match policy {
        Some(path) => input::file::read_input(path)?,
        None => PolicyTableConfig::default(),
    };
    let table = config.normalize()?;

    match rates {
        Some(path) => {
            let quotes: FxQuotes = input::file::read_input(path)?;
            let provider = StaticFxProvider::new(quotes);
            Ok(refresh_policy_rates(&provider, &table)?)
        }
        None => Ok(table),
    }
}

/// Arguments for the FX table
#[derive(Args)]
pub struct FxTableArgs {
    /// Policy table file replacing the built-in reference data
    #[arg(long)]
    pub policy: Option<String>,

    /// FX quotes file ({"as_of": "YYYY-MM-DD", "rates": {"COP": "4100", ...}})
    #[arg(long)]
    pub rates: Option<String>,

    /// Restrict to one country
    #[arg(long)]
    pub country: Option<String>,
}

pub fn run_fx_table(args: FxTableArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let policy = load_policy(args.policy.as_deref(), args.rates.as_deref())?;
    let fx = build_fx_table(&policy);

    let countries: Vec<String> = match args.country {
        Some(country) => {
            fx.curve(&country)?;
            vec![country]
        }
        None => fx.countries().map(str::to_string).collect(),
    };

    let mut rows = Vec::new();
    for year in FIRST_MODEL_YEAR..=LAST_MODEL_YEAR {
        let mut row = Map::new();
        row.insert("year".into(), json!(year));
        for country in &countries {
            row.insert(country.clone(), json!(fx.rate(country, year)?));
        }
        rows.push(Value::Object(row));
    }
    Ok(Value::Array(rows))
}

/// Arguments for the piecewise CAPEX calculation
#[derive(Args)]
pub struct CapexArgs {
    /// Plant size in kW
    #[arg(long)]
    pub size_kw: Decimal,

    /// Country whose year-1 FX rate converts the cost
    #[arg(long, default_value = "Panama")]
    pub country: String,

    /// Explicit FX rate (overrides the country lookup)
    #[arg(long)]
    pub fx_rate: Option<Decimal>,

    /// Tier schedule file replacing the built-in tiers
    #[arg(long)]
    pub tiers: Option<String>,

    /// Policy table file replacing the built-in reference data
    #[arg(long)]
    pub policy: Option<String>,
}

pub fn run_capex(args: CapexArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let tiers: TierTable = match &args.tiers {
        Some(path) => input::file::read_input(path)?,
        None => TierTable::default(),
    };
    let fx_rate = match args.fx_rate {
        Some(rate) => rate,
        None => {
            let policy = load_policy(args.policy.as_deref(), None)?;
            build_fx_table(&policy).rate(&args.country, FIRST_MODEL_YEAR)?
        }
    };

    let tier = tiers.tier_for(args.size_kw)?;
    let (capex, fx_rate) = capex_piecewise(args.size_kw, fx_rate, &tiers)?;

    Ok(json!({
        "size_kw": args.size_kw,
        "country": args.country,
        "fx_rate": fx_rate,
        "capex": capex,
        "tier": tier,
    }))
}

/// Arguments for the policy table listing
#[derive(Args)]
pub struct PolicyArgs {
    /// Policy table file replacing the built-in reference data
    #[arg(long)]
    pub policy: Option<String>,

    /// FX quotes file refreshing the base rates
    #[arg(long)]
    pub rates: Option<String>,
}

pub fn run_policy(args: PolicyArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let policy = load_policy(args.policy.as_deref(), args.rates.as_deref())?;
    Ok(serde_json::to_value(policy.records())?)
}
