//! Evaluation and inversion of metric formulas.
//!
//! | formula_type      | value                          | coefficient from observed      |
//! |-------------------|--------------------------------|--------------------------------|
//! | `cost_per_unit`   | `base / coefficient`           | `base / observed`              |
//! | `conversion_rate` | `base * coefficient`           | `observed / base`              |
//! | `constant`        | `coefficient`                  | `observed`                     |
//! | `power_function`  | `coefficient * base^parameter1`| `observed / base^parameter1`   |

use mediaplan_types::{FormulaDefinition, FormulaType};
use rust_decimal::prelude::{MathematicalOps, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::{FormulaError, FormulaResult};

/// Value of `formula` applied to `base`.
///
/// `base` is ignored for `constant` formulas.
pub fn evaluate(formula: &FormulaDefinition, base: Decimal) -> FormulaResult<Decimal> {
    let formula_type = formula.formula_type;
    let overflow = || FormulaError::Overflow { formula_type };

    match formula_type {
        FormulaType::CostPerUnit => {
            let coefficient = formula
                .coefficient
                .filter(|c| !c.is_zero())
                .ok_or(FormulaError::DivisionByZero { formula_type })?;
            base.checked_div(coefficient).ok_or_else(overflow)
        }
        FormulaType::ConversionRate => {
            let coefficient = coefficient(formula)?;
            base.checked_mul(coefficient).ok_or_else(overflow)
        }
        FormulaType::Constant => coefficient(formula),
        FormulaType::PowerFunction => {
            let coefficient = coefficient(formula)?;
            let exponent = formula.parameter1.ok_or(FormulaError::MissingParameter1)?;
            let scaled = pow(base, exponent)?;
            coefficient.checked_mul(scaled).ok_or_else(overflow)
        }
    }
}

/// Coefficient that makes `formula` reproduce `observed` from `base`.
///
/// Only the formula's type and parameters are read; its current coefficient
/// is irrelevant.
pub fn reverse_calculate_coefficient(
    formula: &FormulaDefinition,
    base: Decimal,
    observed: Decimal,
) -> FormulaResult<Decimal> {
    let formula_type = formula.formula_type;
    let overflow = || FormulaError::Overflow { formula_type };
    let div_zero = || FormulaError::DivisionByZero { formula_type };

    match formula_type {
        FormulaType::CostPerUnit => {
            if observed.is_zero() {
                return Err(div_zero());
            }
            base.checked_div(observed).ok_or_else(overflow)
        }
        FormulaType::ConversionRate => {
            if base.is_zero() {
                return Err(div_zero());
            }
            observed.checked_div(base).ok_or_else(overflow)
        }
        FormulaType::Constant => Ok(observed),
        FormulaType::PowerFunction => {
            let exponent = formula.parameter1.ok_or(FormulaError::MissingParameter1)?;
            let scaled = pow(base, exponent)?;
            if scaled.is_zero() {
                return Err(div_zero());
            }
            observed.checked_div(scaled).ok_or_else(overflow)
        }
    }
}

fn coefficient(formula: &FormulaDefinition) -> FormulaResult<Decimal> {
    formula.coefficient.ok_or(FormulaError::MissingCoefficient {
        formula_type: formula.formula_type,
    })
}

/// `base ^ exponent`, exact for integer exponents.
fn pow(base: Decimal, exponent: Decimal) -> FormulaResult<Decimal> {
    let formula_type = FormulaType::PowerFunction;
    if exponent.is_zero() {
        return Ok(Decimal::ONE);
    }
    if base.is_zero() {
        return if exponent.is_sign_positive() {
            Ok(Decimal::ZERO)
        } else {
            Err(FormulaError::DivisionByZero { formula_type })
        };
    }
    if exponent.fract().is_zero() {
        let n = exponent
            .to_i64()
            .ok_or(FormulaError::Overflow { formula_type })?;
        return base
            .checked_powi(n)
            .ok_or(FormulaError::Overflow { formula_type });
    }
    if base.is_sign_negative() {
        return Err(FormulaError::NumericDomain {
            base: base.to_string(),
            exponent: exponent.to_string(),
        });
    }
    base.checked_powd(exponent)
        .ok_or(FormulaError::Overflow { formula_type })
}
