//! Verification seam between the synthesis loop and the SMT backend.
//!
//! The driver and the unifier only see the [`Verifier`] trait; the concrete
//! boolector-backed gateway lives in [`smt_boolector`]. Tests substitute
//! scripted verifiers through the same seam.

use crate::{exprs::ExprRef, types::Point};

pub mod smt_boolector;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum SolverError {
    /// The queried constraints are unsatisfiable.
    #[error("Unsat")]
    Unsat,

    /// Unknown result passed along from the SMT solver used.
    #[error("Unknown")]
    Unknown,

    /// A failure in the glue layer between the core and the backend.
    #[error("solver glue failure: {0}")]
    Generic(String),
}

/// Outcome of verifying a candidate against the specification.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The negated specification is unsatisfiable; the candidate is the
    /// answer.
    Valid,
    /// A point at which the candidate violates the specification.
    Counterexample(Point),
}

pub trait Verifier {
    /// Substitute `candidate` as the interpretation of the synthesis
    /// function and decide the (negated) specification.
    fn verify(&mut self, candidate: &ExprRef) -> crate::Result<Verdict>;
}
