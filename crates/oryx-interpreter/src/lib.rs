//! Evaluation engine for Oryx specifications.
//!
//! This crate walks the operand and predicate trees from `oryx-ast` against
//! live target-program state reached through the [`TargetState`] trait, with
//! a per-call-lifecycle [`LookupContext`] that memoizes variable lookups and
//! `old(...)` captures.

use smol_str::SmolStr;
use thiserror::Error;

mod adapt;
mod context;
mod eval;
mod satisfies;

pub use adapt::{adapt, TargetType};
pub use context::{CacheKey, ContextKind, LookupContext, TargetState};
pub use eval::{
    compare_numeric, evaluate, full_match_regex, holds, holds_all, holds_any, save_old_values,
    values_equal, within_delta,
};
pub use satisfies::{PredicateRegistry, PredicateResolver, SatisfiesPredicate};

/// Errors that can occur while evaluating a specification.
///
/// An error is always distinguishable from a predicate that evaluated to
/// false: a check that failed to run surfaces as `Err`, never as `Ok(false)`.
#[derive(Error, Debug, Clone)]
pub enum EvalError {
    #[error("unresolved reference: {name}")]
    UnresolvedReference { name: SmolStr },

    #[error("unresolved predicate: {name}")]
    UnresolvedPredicate { name: SmolStr },

    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("result value is not available in this phase")]
    ResultUnavailable,

    #[error("division by zero")]
    DivisionByZero,

    #[error("cannot instantiate {class_name}: {message}")]
    Instantiation { class_name: SmolStr, message: String },

    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: SmolStr, message: String },
}

/// Result type for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;
