//! Counterexample-guided enumerative program synthesis.
//!
//! Terms are enumerated by grammar shape and pruned by behavioral
//! equivalence on a growing point set; a unifier combines them through a
//! decision tree over enumerated predicates; an SMT gateway verifies the
//! assembled candidate and feeds counterexamples back into the loop.

#![warn(clippy::all, rust_2018_idioms)]
#![allow(clippy::new_without_default, clippy::module_name_repetitions)]

use types::Point;

pub mod context;
pub mod enumerators;
pub mod eval;
pub mod exprs;
pub mod sample;
pub mod semantics;
pub mod signature;
pub mod smt;
pub mod solver;
pub mod types;

pub type Result<T> = std::result::Result<T, SynthError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthError {
    /// Malformed API use.
    #[error("argument error: {0}")]
    Argument(String),

    /// The backend produced a counterexample the solver has already seen;
    /// the loop invariant is broken.
    #[error("duplicate counterexample point {0}")]
    DuplicatePoint(Point),

    /// Unrecognized expression or type variant; indicates a missing case.
    #[error("unhandled case: {0}")]
    UnhandledCase(&'static str),

    #[error("solver error: {0}")]
    Solver(#[from] smt::SolverError),

    #[error("evaluation error: {0}")]
    Eval(#[from] eval::EvalError),
}
