//! Sandboxed expression and condition evaluation for Varka scripts
//!
//! Script authors are untrusted, so the evaluator is built whitelist-first:
//! the grammar in [`expr`] is the complete set of constructs that can run.
//! [`ConditionEvaluator`] layers the string infix operators on top, and
//! [`substitute`] handles `{path}` placeholder expansion. At every outer
//! boundary, failures degrade to `false` (or to the untouched input) and
//! never propagate into the dispatch path.

pub mod condition;
pub mod eval;
pub mod expr;
pub mod substitute;

use thiserror::Error;

/// Expression evaluation errors
///
/// These exist for diagnostics only; at the condition boundary every one of
/// them degrades to `false`.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    #[error("blank expression")]
    Blank,

    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("bad number literal '{0}'")]
    BadNumber(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("division or modulo by zero")]
    DivisionByZero,
}

/// Result type for expression evaluation
pub type EvalResult<T> = Result<T, EvalError>;

pub use condition::ConditionEvaluator;
pub use eval::ExpressionEvaluator;
pub use expr::parse_expr;
pub use substitute::substitute;
