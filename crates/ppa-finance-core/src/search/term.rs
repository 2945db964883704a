use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PpaFinanceError;
use crate::projection::unlevered::{project_unlevered, ProjectionInputs, UnleveredProjection};
use crate::reference::fx::FxTable;
use crate::reference::policy::PolicyRecord;
use crate::types::{FIRST_MODEL_YEAR, LAST_MODEL_YEAR};
use crate::PpaFinanceResult;

/// Projector inputs plus the tenor window and return hurdle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermSearchInput {
    pub projection: ProjectionInputs,
    /// Hurdle in percent (12 = 12%)
    pub target_irr_pct: Decimal,
    #[serde(default = "default_min_tenor")]
    pub min_tenor: u32,
    #[serde(default = "default_max_tenor")]
    pub max_tenor: u32,
}

fn default_min_tenor() -> u32 {
    FIRST_MODEL_YEAR
}

fn default_max_tenor() -> u32 {
    LAST_MODEL_YEAR
}

/// IRR observed for one candidate tenor. `irr_pct` is `None` when the solver
/// did not converge and the candidate was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenorEvaluation {
    pub tenor: u32,
    pub irr_pct: Option<Decimal>,
    pub meets_target: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermSearchResult {
    /// Shortest tenor whose IRR reached the target
    pub accepted: Option<UnleveredProjection>,
    pub evaluations: Vec<TenorEvaluation>,
    pub warnings: Vec<String>,
}

impl TermSearchResult {
    /// Highest IRR among evaluated candidates, with its tenor.
    pub fn best(&self) -> Option<(u32, Decimal)> {
        self.evaluations
            .iter()
            .filter_map(|e| e.irr_pct.map(|irr| (e.tenor, irr)))
            .max_by(|a, b| a.1.cmp(&b.1))
    }
}

/// Walk tenors in ascending order and accept the first whose IRR meets the
/// target.
///
/// A candidate whose IRR does not converge is recorded and skipped; any other
/// failure aborts the search. Exhausting the window is a normal outcome with
/// `accepted == None`.
pub fn search_ppa_term(
    input: &TermSearchInput,
    policy: &PolicyRecord,
    fx_table: &FxTable,
) -> PpaFinanceResult<TermSearchResult> {
    validate_window(input)?;

    let mut evaluations = Vec::new();
    let mut warnings = Vec::new();

    for tenor in input.min_tenor..=input.max_tenor {
        let projection = match project_unlevered(tenor, &input.projection, policy, fx_table) {
            Ok(p) => p,
            Err(e) if e.is_convergence_failure() => {
                tracing::warn!(tenor, error = %e, "skipping tenor: IRR did not converge");
                warnings.push(format!("Tenor {tenor} skipped: {e}"));
                evaluations.push(TenorEvaluation {
                    tenor,
                    irr_pct: None,
                    meets_target: false,
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        let meets_target = projection.irr_pct >= input.target_irr_pct;
        tracing::debug!(
            tenor,
            irr_pct = %projection.irr_pct,
            target_irr_pct = %input.target_irr_pct,
            accepted = meets_target,
            "evaluated tenor"
        );
        evaluations.push(TenorEvaluation {
            tenor,
            irr_pct: Some(projection.irr_pct),
            meets_target,
        });

        if meets_target {
            tracing::info!(tenor, irr_pct = %projection.irr_pct, "term search found a feasible tenor");
            return Ok(TermSearchResult {
                accepted: Some(projection),
                evaluations,
                warnings,
            });
        }
    }

    tracing::info!(
        target_irr_pct = %input.target_irr_pct,
        evaluated = evaluations.len(),
        "term search found no feasible tenor"
    );
    Ok(TermSearchResult {
        accepted: None,
        evaluations,
        warnings,
    })
}

fn validate_window(input: &TermSearchInput) -> PpaFinanceResult<()> {
    if input.min_tenor < FIRST_MODEL_YEAR || input.max_tenor > LAST_MODEL_YEAR {
        return Err(PpaFinanceError::OutOfRange {
            what: "tenor window".into(),
            value: format!("{}..={}", input.min_tenor, input.max_tenor),
            reason: format!("must lie within {FIRST_MODEL_YEAR}..={LAST_MODEL_YEAR}"),
        });
    }
    if input.min_tenor > input.max_tenor {
        return Err(PpaFinanceError::InvalidInput {
            field: "min_tenor".into(),
            reason: "Minimum tenor cannot exceed maximum tenor".into(),
        });
    }
    Ok(())
}
