//! Signature-based term enumeration: keep one representative term per
//! distinct behavior on the current point set, stop once every point is
//! covered.

use hashbrown::HashMap;
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::{
    enumerators::Generator,
    eval::{evaluate, EvaluationContext},
    exprs::{with_id, ExprRef},
    signature::{Signature, SignatureFactory},
    types::{Point, Value},
};

/// Insertion-ordered map from signature to the first-enumerated term
/// producing it. The `None` key is the vacuous cover produced by an empty
/// point set; no point discriminates that term.
pub type SigToTerm = IndexMap<Option<Signature>, ExprRef>;

pub struct TermSolver {
    spec: ExprRef,
    term_generator: Generator,
    points: Vec<Point>,
    max_term_size: usize,
    prev_expr_id_to_sig: HashMap<u64, Signature>,
    eval_ctx: EvaluationContext,
}

impl TermSolver {
    #[must_use]
    pub fn new(spec: ExprRef, term_generator: Generator, max_term_size: usize) -> Self {
        Self {
            spec,
            term_generator,
            points: Vec::new(),
            max_term_size,
            prev_expr_id_to_sig: HashMap::new(),
            eval_ctx: EvaluationContext::new(),
        }
    }

    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Enumerate terms of growing size until the union of their signatures
    /// covers every point. `None` when the size bound is exhausted first.
    pub fn solve(&mut self) -> Option<SigToTerm> {
        if self.points.is_empty() {
            return self.trivial_solve();
        }

        let factory = SignatureFactory::new(self.points.len());
        let mut covered = factory.mint();
        let mut sig_to_term = SigToTerm::new();
        let mut monotonic_expr_id = 0u64;

        for size in 1..=self.max_term_size {
            self.term_generator.set_size(size);
            let mut stream = self.term_generator.generate();
            while let Some(term) = stream.next() {
                let term = with_id(&term, monotonic_expr_id);
                monotonic_expr_id += 1;

                let sig = compute_signature(
                    &self.spec,
                    &self.points,
                    &factory,
                    &self.prev_expr_id_to_sig,
                    &mut self.eval_ctx,
                    &term,
                );
                let key = Some(sig);
                if key.as_ref().is_some_and(Signature::is_empty) || sig_to_term.contains_key(&key) {
                    continue;
                }

                trace!(%term, "new behavior class");
                if let Some(sig) = &key {
                    covered.union_with(sig);
                }
                sig_to_term.insert(key, term);

                if covered.is_full() {
                    drop(stream);
                    debug!(
                        terms = sig_to_term.len(),
                        points = self.points.len(),
                        "term cover complete"
                    );
                    self.cache_results(&sig_to_term);
                    return Some(sig_to_term);
                }
            }
        }

        debug!(max_size = self.max_term_size, "term enumeration exhausted");
        None
    }

    /// With no points every term is vacuously correct; return the first one
    /// the grammar yields, keyed by the `None` sentinel.
    fn trivial_solve(&mut self) -> Option<SigToTerm> {
        for size in 1..=self.max_term_size {
            self.term_generator.set_size(size);
            if let Some(term) = self.term_generator.generate().next() {
                let mut sig_to_term = SigToTerm::new();
                sig_to_term.insert(None, term);
                return Some(sig_to_term);
            }
        }
        None
    }

    /// Signatures of the successful pass become the cache for the next one;
    /// deterministic enumeration keeps expression ids stable across passes.
    fn cache_results(&mut self, sig_to_term: &SigToTerm) {
        self.prev_expr_id_to_sig = sig_to_term
            .iter()
            .filter_map(|(sig, term)| Some((term.expr_id?, sig.clone()?)))
            .collect();
    }
}

/// Bit `i` is set when the spec, with `term` substituted for the synthesis
/// function, evaluates to true at point `i`. Cached prefixes are copied in
/// and only the new suffix is re-evaluated.
fn compute_signature(
    spec: &ExprRef,
    points: &[Point],
    factory: &SignatureFactory,
    prev_expr_id_to_sig: &HashMap<u64, Signature>,
    eval_ctx: &mut EvaluationContext,
    term: &ExprRef,
) -> Signature {
    let mut sig = factory.mint();
    eval_ctx.set_interpretation_map(vec![term.clone()]);

    let start = match term.expr_id.and_then(|id| prev_expr_id_to_sig.get(&id)) {
        Some(prev) => {
            sig.copy_in(prev);
            prev.size_of_universe()
        }
        None => 0,
    };
    for (idx, point) in points.iter().enumerate().skip(start) {
        eval_ctx.set_valuation_map(point);
        if matches!(evaluate(spec, eval_ctx), Ok(Value::Bool(true))) {
            sig.add(idx);
        }
    }
    sig
}
