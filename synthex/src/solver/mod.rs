//! The outer CEGIS loop: enumerate terms, unify, verify, harvest
//! counterexamples.

use std::time::{Duration, Instant};

use hashbrown::HashSet;
use tracing::{debug, warn};

use crate::{
    context::SynthesisContext,
    enumerators::Generator,
    exprs::ExprRef,
    smt::Verifier,
    types::Point,
    Result, SynthError,
};

pub mod decision_tree;
pub mod term_solver;
pub mod unifier;

pub use term_solver::{SigToTerm, TermSolver};
pub use unifier::{Unified, Unifier};

pub const DEFAULT_MAX_TERM_SIZE: usize = 20;
pub const DEFAULT_MAX_PRED_SIZE: usize = 20;

pub struct Solver<'ctx> {
    ctx: &'ctx SynthesisContext,
    points: Vec<Point>,
    point_set: HashSet<Point>,
    max_term_size: usize,
    max_pred_size: usize,
    budget: Option<Duration>,
}

impl<'ctx> Solver<'ctx> {
    #[must_use]
    pub fn new(ctx: &'ctx SynthesisContext) -> Self {
        Self {
            ctx,
            points: Vec::new(),
            point_set: HashSet::new(),
            max_term_size: DEFAULT_MAX_TERM_SIZE,
            max_pred_size: DEFAULT_MAX_PRED_SIZE,
            budget: None,
        }
    }

    /// Bound the enumerated term and predicate sizes.
    #[must_use]
    pub fn with_bounds(mut self, max_term_size: usize, max_pred_size: usize) -> Self {
        self.max_term_size = max_term_size;
        self.max_pred_size = max_pred_size;
        self
    }

    /// Wall-clock budget, checked between outer iterations.
    #[must_use]
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    #[must_use]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Record a counterexample. A point the backend already produced once
    /// indicates a broken loop invariant and is fatal.
    pub fn add_point(&mut self, point: Point) -> Result<()> {
        if !self.point_set.insert(point.clone()) {
            return Err(SynthError::DuplicatePoint(point));
        }
        self.points.push(point);
        Ok(())
    }

    /// Run the CEGIS loop. `Ok(None)` when no expression within the grammar
    /// and size bounds satisfies the specification.
    pub fn solve<V: Verifier>(
        &mut self,
        term_generator: Generator,
        pred_generator: Generator,
        verifier: &mut V,
    ) -> Result<Option<ExprRef>> {
        let spec = self.ctx.synthesis_spec()?;
        let mut term_solver = TermSolver::new(spec.canon_spec, term_generator, self.max_term_size);
        let mut unifier = Unifier::new(self.ctx, pred_generator, self.max_pred_size);
        for point in &self.points {
            term_solver.add_point(point.clone());
            unifier.add_point(point.clone());
        }

        let started = Instant::now();
        loop {
            if let Some(budget) = self.budget {
                if started.elapsed() > budget {
                    warn!(?budget, "wall-clock budget exhausted");
                    return Ok(None);
                }
            }

            let Some(sig_to_term) = term_solver.solve() else {
                debug!("term solver exhausted the grammar");
                return Ok(None);
            };
            match unifier.unify(&sig_to_term, verifier)? {
                None => {
                    debug!("unifier exhausted the predicate grammar");
                    return Ok(None);
                }
                Some(Unified::Expr(expr)) => {
                    debug!(%expr, points = self.points.len(), "synthesis complete");
                    return Ok(Some(expr));
                }
                Some(Unified::Counterexample(point)) => {
                    debug!(%point, "counterexample");
                    self.add_point(point.clone())?;
                    term_solver.add_point(point.clone());
                    unifier.add_point(point);
                }
            }
        }
    }
}
