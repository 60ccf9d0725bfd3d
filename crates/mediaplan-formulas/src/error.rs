use mediaplan_types::FormulaType;
use thiserror::Error;

/// Errors from formula evaluation and metric recalculation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormulaError {
    #[error("division by zero evaluating {formula_type} formula")]
    DivisionByZero { formula_type: FormulaType },

    #[error("{formula_type} formula has no coefficient")]
    MissingCoefficient { formula_type: FormulaType },

    #[error("power_function formula has no parameter1 (exponent)")]
    MissingParameter1,

    #[error("decimal overflow evaluating {formula_type} formula")]
    Overflow { formula_type: FormulaType },

    #[error("power_function cannot raise negative base {base} to fractional exponent {exponent}")]
    NumericDomain { base: String, exponent: String },

    #[error("cyclic formula dependency through metric '{metric}'")]
    CyclicDependency { metric: String },
}

pub type FormulaResult<T> = Result<T, FormulaError>;
