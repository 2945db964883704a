use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::capex::budget::{build_project_budget, AdminAssumptions, ProjectBudget, ProjectParameters};
use crate::capex::tiers::TierTable;
use crate::exit::valuation::{compute_exit_values, ExitRecord};
use crate::projection::ledger::ProjectionLedger;
use crate::projection::unlevered::{project_unlevered, UnleveredProjection};
use crate::reference::fx::{build_fx_table, FxTable};
use crate::reference::policy::{PolicyTable, PolicyTableConfig};
use crate::search::savings::{offtaker_comparison, term_metrics, ComparisonYear, TermMetrics};
use crate::search::term::{search_ppa_term, TenorEvaluation, TermSearchInput};
use crate::types::{with_metadata, ComputationOutput, Money, FIRST_MODEL_YEAR, LAST_MODEL_YEAR};
use crate::PpaFinanceResult;

#[cfg(feature = "debt")]
use crate::error::PpaFinanceError;
#[cfg(feature = "debt")]
use crate::debt::schedule::{build_debt_schedule, size_debt_facility, DebtFacilityInput, DebtScheduleOutput};

// ---------------------------------------------------------------------------
// Input / output types
// ---------------------------------------------------------------------------

/// Everything needed to size a PPA contract for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PpaModelInput {
    pub project: ProjectParameters,
    #[serde(default)]
    pub admin: AdminAssumptions,
    /// Hurdle in percent (12 = 12%)
    pub target_irr_pct: Decimal,
    #[serde(default = "default_min_tenor")]
    pub min_tenor: u32,
    #[serde(default = "default_max_tenor")]
    pub max_tenor: u32,
    #[cfg(feature = "debt")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debt: Option<DebtFacilityInput>,
    /// Replaces the built-in reference table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyTableConfig>,
    /// Replaces the built-in CAPEX tier schedule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiers: Option<TierTable>,
}

fn default_min_tenor() -> u32 {
    FIRST_MODEL_YEAR
}

fn default_max_tenor() -> u32 {
    LAST_MODEL_YEAR
}

/// Results for the accepted tenor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalTerm {
    pub ppa_term: u32,
    pub irr_pct: Decimal,
    pub cash_flows: Vec<Money>,
    pub ledger: ProjectionLedger,
    pub metrics: TermMetrics,
    pub comparison: Vec<ComparisonYear>,
    pub exit_records: Vec<ExitRecord>,
    #[cfg(feature = "debt")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debt: Option<DebtScheduleOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TermSearchOutcome {
    Feasible(Box<OptimalTerm>),
    /// No tenor in the window reached the target; not an error
    Infeasible {
        target_irr_pct: Decimal,
        best_irr_pct: Option<Decimal>,
        evaluated: u32,
    },
}

impl TermSearchOutcome {
    pub fn optimal(&self) -> Option<&OptimalTerm> {
        match self {
            TermSearchOutcome::Feasible(term) => Some(term.as_ref()),
            TermSearchOutcome::Infeasible { .. } => None,
        }
    }
}

/// Ledger for a contract tenor fixed by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedTenorOutput {
    pub budget: ProjectBudget,
    pub projection: UnleveredProjection,
    pub meets_target: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpaModelOutput {
    pub budget: ProjectBudget,
    pub outcome: TermSearchOutcome,
    pub evaluations: Vec<TenorEvaluation>,
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Find the shortest PPA tenor whose unlevered IRR meets the target.
///
/// Builds the project budget, the FX table and the per-tenor projections,
/// then reports the offtaker comparison, exit scenarios and, when requested,
/// the sculpted debt schedule for the accepted tenor.
pub fn solve_ppa_term(input: &PpaModelInput) -> PpaFinanceResult<ComputationOutput<PpaModelOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    #[cfg(feature = "debt")]
    {
        if let Some(debt) = &input.debt {
            validate_debt_input(debt)?;
        }
    }

    let (policy_table, fx_table, budget) = prepare(input)?;
    let policy = policy_table.lookup(&input.project.country)?;

    let search_input = TermSearchInput {
        projection: budget.projection_inputs(&input.project, &input.admin),
        target_irr_pct: input.target_irr_pct,
        min_tenor: input.min_tenor,
        max_tenor: input.max_tenor,
    };
    let search = search_ppa_term(&search_input, policy, &fx_table)?;
    warnings.extend(search.warnings.iter().cloned());

    let outcome = match &search.accepted {
        Some(projection) => {
            let comparison = offtaker_comparison(&projection.ledger, &input.project, &input.admin);
            let metrics = term_metrics(&projection.ledger, &comparison, &input.project, &input.admin, &budget)?;
            if metrics.payback_year.is_none() {
                warnings.push("Offtaker savings do not cover running costs; no payback year".into());
            }

            let exit_records = match compute_exit_values(
                &projection.cash_flows,
                input.admin.exit_discount_rate,
                &input.admin.exit_years,
            ) {
                Ok(records) => records,
                Err(e) if e.is_convergence_failure() => {
                    warnings.push(format!("Exit analysis omitted: {e}"));
                    Vec::new()
                }
                Err(e) => return Err(e),
            };

            #[cfg(feature = "debt")]
            let debt = match &input.debt {
                Some(debt) => levered_returns(debt, &projection.cash_flows, &mut warnings)?,
                None => None,
            };

            TermSearchOutcome::Feasible(Box::new(OptimalTerm {
                ppa_term: projection.tenor,
                irr_pct: projection.irr_pct,
                cash_flows: projection.cash_flows.clone(),
                ledger: projection.ledger.clone(),
                metrics,
                comparison,
                exit_records,
                #[cfg(feature = "debt")]
                debt,
            }))
        }
        None => {
            warnings.push(format!(
                "No tenor in {}..={} reaches the target IRR of {}%",
                input.min_tenor, input.max_tenor, input.target_irr_pct
            ));
            TermSearchOutcome::Infeasible {
                target_irr_pct: input.target_irr_pct,
                best_irr_pct: search.best().map(|(_, irr)| irr),
                evaluated: search.evaluations.len() as u32,
            }
        }
    };

    let output = PpaModelOutput {
        budget,
        outcome,
        evaluations: search.evaluations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "PPA Term Search (Unlevered IRR, Greedy Minimal Tenor)",
        &serde_json::json!({
            "country": input.project.country,
            "capacity_kw": input.project.capacity_kw.to_string(),
            "epc_cost_excl_vat": input.project.epc_cost_excl_vat.to_string(),
            "current_tariff": input.project.current_tariff.to_string(),
            "tariff_discount": input.project.tariff_discount.to_string(),
            "target_irr_pct": input.target_irr_pct.to_string(),
            "tenor_window": format!("{}..={}", input.min_tenor, input.max_tenor),
            "custom_policy": input.policy.is_some(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Project a single contract tenor without searching.
pub fn project_ppa_tenor(
    input: &PpaModelInput,
    tenor: u32,
) -> PpaFinanceResult<ComputationOutput<FixedTenorOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let (policy_table, fx_table, budget) = prepare(input)?;
    let policy = policy_table.lookup(&input.project.country)?;
    let inputs = budget.projection_inputs(&input.project, &input.admin);
    let projection = project_unlevered(tenor, &inputs, policy, &fx_table)?;

    let meets_target = projection.irr_pct >= input.target_irr_pct;
    if !meets_target {
        warnings.push(format!(
            "IRR of {}% at {tenor} years is below the {}% target",
            projection.irr_pct.round_dp(2),
            input.target_irr_pct
        ));
    }

    let output = FixedTenorOutput {
        budget,
        projection,
        meets_target,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Unlevered PPA Projection (Fixed Tenor)",
        &serde_json::json!({
            "country": input.project.country,
            "capacity_kw": input.project.capacity_kw.to_string(),
            "tenor": tenor,
            "target_irr_pct": input.target_irr_pct.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Reference data and budget shared by every entry point.
fn prepare(input: &PpaModelInput) -> PpaFinanceResult<(PolicyTable, FxTable, ProjectBudget)> {
    let policy_table = match &input.policy {
        Some(config) => config.normalize()?,
        None => PolicyTable::reference()?,
    };
    let tiers = input.tiers.clone().unwrap_or_default();
    let fx_table = build_fx_table(&policy_table);
    let policy = policy_table.lookup(&input.project.country)?;
    let budget = build_project_budget(&input.project, &input.admin, policy, &fx_table, &tiers)?;
    Ok((policy_table, fx_table, budget))
}

#[cfg(feature = "debt")]
fn validate_debt_input(debt: &DebtFacilityInput) -> PpaFinanceResult<()> {
    if debt.loan_tenor_years < FIRST_MODEL_YEAR || debt.loan_tenor_years > LAST_MODEL_YEAR {
        return Err(PpaFinanceError::InvalidInput {
            field: "debt.loan_tenor_years".into(),
            reason: format!("Loan tenor must be within {FIRST_MODEL_YEAR}..={LAST_MODEL_YEAR} years"),
        });
    }
    if debt.min_dscr <= Decimal::ZERO {
        return Err(PpaFinanceError::InvalidInput {
            field: "debt.min_dscr".into(),
            reason: "Minimum DSCR must be positive".into(),
        });
    }
    if debt.interest_rate <= -Decimal::ONE {
        return Err(PpaFinanceError::InvalidInput {
            field: "debt.interest_rate".into(),
            reason: "Interest rate must exceed -100%".into(),
        });
    }
    Ok(())
}

/// Debt schedule for the accepted tenor. A loan longer than the contract, or
/// a levered IRR that does not converge, drops the schedule with a warning.
#[cfg(feature = "debt")]
fn levered_returns(
    debt: &DebtFacilityInput,
    cash_flows: &[Money],
    warnings: &mut Vec<String>,
) -> PpaFinanceResult<Option<DebtScheduleOutput>> {
    let tenor = cash_flows.len().saturating_sub(1) as u32;
    if debt.loan_tenor_years > tenor {
        warnings.push(format!(
            "Loan tenor of {} years exceeds the {tenor}-year PPA; debt schedule omitted",
            debt.loan_tenor_years
        ));
        return Ok(None);
    }

    let total_project_cost = -cash_flows.first().copied().unwrap_or_default();
    let facility_size = match debt.facility_size {
        Some(size) => size,
        None => size_debt_facility(cash_flows, debt.loan_tenor_years, debt.interest_rate, debt.min_dscr)?,
    };
    if facility_size > total_project_cost {
        warnings.push(format!(
            "Facility of {facility_size} exceeds the total project cost of {total_project_cost}"
        ));
    }

    match build_debt_schedule(
        total_project_cost,
        facility_size,
        debt.loan_tenor_years,
        debt.interest_rate,
        debt.min_dscr,
        cash_flows,
    ) {
        Ok(schedule) => Ok(Some(schedule)),
        Err(e) if e.is_convergence_failure() => {
            tracing::warn!(error = %e, "levered IRR did not converge");
            warnings.push(format!("Debt schedule omitted: {e}"));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
