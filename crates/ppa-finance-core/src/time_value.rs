use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::PpaFinanceError;
use crate::types::{Money, Rate};
use crate::PpaFinanceResult;

/// Newton step size below which the IRR is considered converged.
const IRR_TOLERANCE: Decimal = dec!(0.0000000001);
pub const MAX_IRR_ITERATIONS: u32 = 100;
pub const DEFAULT_IRR_GUESS: Rate = dec!(0.10);

// Iterates are held inside this band between Newton steps.
const RATE_FLOOR: Rate = dec!(-0.99);
const RATE_CEILING: Rate = dec!(100);

/// Net Present Value of a series of cash flows, the first of which sits at
/// time zero and is not discounted.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> PpaFinanceResult<Money> {
    check_rate(rate)?;

    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r).ok_or_else(|| discount_overflow(rate))?;
        }
        result = cf
            .checked_div(discount)
            .and_then(|pv| result.checked_add(pv))
            .ok_or_else(|| discount_overflow(rate))?;
    }

    Ok(result)
}

/// Spreadsheet-style NPV: `values[i]` is received at the end of period
/// `i + 1`, so every value is discounted at least once.
pub fn excel_npv(rate: Rate, values: &[Money]) -> PpaFinanceResult<Money> {
    check_rate(rate)?;

    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut result = Decimal::ZERO;

    for v in values {
        discount = discount.checked_mul(one_plus_r).ok_or_else(|| discount_overflow(rate))?;
        result = v
            .checked_div(discount)
            .and_then(|pv| result.checked_add(pv))
            .ok_or_else(|| discount_overflow(rate))?;
    }

    Ok(result)
}

/// Internal Rate of Return using Newton-Raphson.
///
/// `cash_flows[0]` sits at time zero. Convergence is declared when the Newton
/// step falls below 1e-10; the solver gives up after 100 iterations. It also
/// gives up early, with the same error, when the series has no sign change,
/// when the derivative vanishes, or when an intermediate value overflows.
pub fn irr(cash_flows: &[Money], guess: Rate) -> PpaFinanceResult<Rate> {
    let has_inflow = cash_flows.iter().any(|cf| *cf > Decimal::ZERO);
    let has_outflow = cash_flows.iter().any(|cf| *cf < Decimal::ZERO);
    if !has_inflow || !has_outflow {
        return Err(not_converged(0, Decimal::ZERO));
    }

    let mut rate = guess;
    let mut last_step = Decimal::ZERO;

    for i in 0..MAX_IRR_ITERATIONS {
        let (value, slope) =
            npv_and_derivative(cash_flows, rate).ok_or_else(|| not_converged(i, last_step))?;

        if slope.is_zero() {
            return Err(not_converged(i, value));
        }

        let step = value
            .checked_div(slope)
            .ok_or_else(|| not_converged(i, last_step))?;
        let next = rate
            .checked_sub(step)
            .ok_or_else(|| not_converged(i, step))?;

        if step.abs() < IRR_TOLERANCE {
            return Ok(next);
        }

        last_step = step;
        rate = next.clamp(RATE_FLOOR, RATE_CEILING);
    }

    Err(not_converged(MAX_IRR_ITERATIONS, last_step))
}

/// NPV and its first derivative with respect to the rate. `None` when the
/// discount base is non-positive or any step overflows.
fn npv_and_derivative(cash_flows: &[Money], rate: Rate) -> Option<(Money, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }

    let mut value = Decimal::ZERO;
    let mut slope = Decimal::ZERO;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r)?;
        }
        value = value.checked_add(cf.checked_div(discount)?)?;
        if t > 0 {
            let weighted = Decimal::from(t as u64).checked_mul(*cf)?;
            let next_discount = discount.checked_mul(one_plus_r)?;
            slope = slope.checked_sub(weighted.checked_div(next_discount)?)?;
        }
    }

    Some((value, slope))
}

fn check_rate(rate: Rate) -> PpaFinanceResult<()> {
    if rate <= dec!(-1) {
        return Err(PpaFinanceError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    Ok(())
}

/// Discount factors left the representable Decimal range.
fn discount_overflow(rate: Rate) -> PpaFinanceError {
    PpaFinanceError::OutOfRange {
        what: "discount rate".into(),
        value: rate.to_string(),
        reason: "discount factors overflow decimal precision".into(),
    }
}

fn not_converged(iterations: u32, last_delta: Decimal) -> PpaFinanceError {
    PpaFinanceError::DidNotConverge {
        function: "IRR".into(),
        iterations,
        last_delta,
    }
}
