//! Combine per-region candidate terms into one total expression by
//! learning a decision tree over enumerated predicates.

use hashbrown::HashMap;
use indexmap::IndexMap;
use tracing::{debug, trace};

use super::{
    decision_tree::{learn_decision_tree, DecisionTree},
    term_solver::SigToTerm,
};
use crate::{
    context::SynthesisContext,
    enumerators::Generator,
    eval::{evaluate, EvaluationContext},
    exprs::{with_id, ExprRef},
    signature::{Signature, SignatureFactory},
    smt::{Verdict, Verifier},
    types::{Point, Value},
    Result, SynthError,
};

/// Outcome of one unification attempt.
#[derive(Debug, Clone)]
pub enum Unified {
    /// A verified expression; the final answer.
    Expr(ExprRef),
    /// The assembled candidate was refuted at this point.
    Counterexample(Point),
}

pub struct Unifier<'ctx> {
    ctx: &'ctx SynthesisContext,
    pred_generator: Generator,
    max_pred_size: usize,
    points: Vec<Point>,
    eval_ctx: EvaluationContext,
    prev_pred_id_to_sig: HashMap<u64, Signature>,
}

impl<'ctx> Unifier<'ctx> {
    #[must_use]
    pub fn new(ctx: &'ctx SynthesisContext, pred_generator: Generator, max_pred_size: usize) -> Self {
        Self {
            ctx,
            pred_generator,
            max_pred_size,
            points: Vec::new(),
            eval_ctx: EvaluationContext::new(),
            prev_pred_id_to_sig: HashMap::new(),
        }
    }

    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Unify the terms into one expression and hand it to the verifier.
    /// `None` when the predicate grammar is exhausted without a learnable
    /// tree.
    pub fn unify<V: Verifier>(
        &mut self,
        sig_to_term: &SigToTerm,
        verifier: &mut V,
    ) -> Result<Option<Unified>> {
        if let Some(unified) = self.try_trivial_unification(sig_to_term, verifier)? {
            return Ok(Some(unified));
        }

        let factory = SignatureFactory::new(self.points.len());
        let mut sig_to_pred: IndexMap<Signature, ExprRef> = IndexMap::new();
        let mut monotonic_pred_id = 0u64;
        let mut current_pred_size = 1;

        while current_pred_size <= self.max_pred_size {
            self.pred_generator.set_size(current_pred_size);
            let mut new_preds_generated = false;
            let mut stream = self.pred_generator.generate();
            while let Some(pred) = stream.next() {
                let pred = with_id(&pred, monotonic_pred_id);
                monotonic_pred_id += 1;

                let sig = compute_pred_signature(
                    &self.points,
                    &factory,
                    &self.prev_pred_id_to_sig,
                    &mut self.eval_ctx,
                    &pred,
                );
                // A predicate that holds nowhere or everywhere partitions
                // nothing.
                if !sig.is_empty() && !sig.is_full() && !sig_to_pred.contains_key(&sig) {
                    trace!(%pred, "new predicate");
                    sig_to_pred.insert(sig, pred);
                    new_preds_generated = true;
                }
            }
            drop(stream);

            if !new_preds_generated {
                current_pred_size += 1;
                continue;
            }

            let (term_sigs, terms) = split_entries(sig_to_term)?;
            let pred_sigs: Vec<Signature> = sig_to_pred.keys().cloned().collect();
            let preds: Vec<ExprRef> = sig_to_pred.values().cloned().collect();

            let Some(tree) = learn_decision_tree(&pred_sigs, &term_sigs, self.points.len()) else {
                debug!(size = current_pred_size, "decision tree learning failed");
                current_pred_size += 1;
                continue;
            };

            let expr = decision_tree_to_expr(self.ctx, &tree, &preds, &terms)?;
            debug!(%expr, "assembled candidate");
            self.prev_pred_id_to_sig = sig_to_pred
                .iter()
                .filter_map(|(sig, pred)| Some((pred.expr_id?, sig.clone())))
                .collect();
            return match verifier.verify(&expr)? {
                Verdict::Valid => Ok(Some(Unified::Expr(expr))),
                Verdict::Counterexample(point) => Ok(Some(Unified::Counterexample(point))),
            };
        }

        debug!(max_size = self.max_pred_size, "predicate enumeration exhausted");
        Ok(None)
    }

    /// A term whose signature is full (or the `None` vacuous cover)
    /// satisfies the spec at every point; verify it alone.
    fn try_trivial_unification<V: Verifier>(
        &mut self,
        sig_to_term: &SigToTerm,
        verifier: &mut V,
    ) -> Result<Option<Unified>> {
        let trivial = sig_to_term
            .iter()
            .find(|(sig, _)| sig.as_ref().map_or(true, Signature::is_full))
            .map(|(_, term)| term.clone());
        let Some(term) = trivial else {
            return Ok(None);
        };
        match verifier.verify(&term)? {
            Verdict::Valid => Ok(Some(Unified::Expr(term))),
            Verdict::Counterexample(point) => Ok(Some(Unified::Counterexample(point))),
        }
    }
}

/// Bit `i` is set when the predicate evaluates to true at point `i`.
fn compute_pred_signature(
    points: &[Point],
    factory: &SignatureFactory,
    prev_pred_id_to_sig: &HashMap<u64, Signature>,
    eval_ctx: &mut EvaluationContext,
    pred: &ExprRef,
) -> Signature {
    let mut sig = factory.mint();
    let start = match pred.expr_id.and_then(|id| prev_pred_id_to_sig.get(&id)) {
        Some(prev) => {
            sig.copy_in(prev);
            prev.size_of_universe()
        }
        None => 0,
    };
    for (idx, point) in points.iter().enumerate().skip(start) {
        eval_ctx.set_valuation_map(point);
        if matches!(evaluate(pred, eval_ctx), Ok(Value::Bool(true))) {
            sig.add(idx);
        }
    }
    sig
}

fn split_entries(sig_to_term: &SigToTerm) -> Result<(Vec<Signature>, Vec<ExprRef>)> {
    let mut sigs = Vec::with_capacity(sig_to_term.len());
    let mut terms = Vec::with_capacity(sig_to_term.len());
    for (sig, term) in sig_to_term {
        let Some(sig) = sig else {
            // The vacuous cover is handled by trivial unification.
            return Err(SynthError::UnhandledCase(
                "vacuous term cover reached decision-tree learning",
            ));
        };
        sigs.push(sig.clone());
        terms.push(term.clone());
    }
    Ok((sigs, terms))
}

/// Fold the tree: leaves to terms, nodes to `ite(pred, positive, negative)`.
fn decision_tree_to_expr(
    ctx: &SynthesisContext,
    tree: &DecisionTree,
    preds: &[ExprRef],
    terms: &[ExprRef],
) -> Result<ExprRef> {
    match tree {
        DecisionTree::Leaf { label } => Ok(terms[*label].clone()),
        DecisionTree::Node {
            attribute,
            positive,
            negative,
        } => {
            let positive = decision_tree_to_expr(ctx, positive, preds, terms)?;
            let negative = decision_tree_to_expr(ctx, negative, preds, terms)?;
            ctx.make_function_expr("ite", vec![preds[*attribute].clone(), positive, negative])
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Unified, Unifier};
    use crate::{
        context::SynthesisContext,
        enumerators::{Generator, GeneratorFactory},
        eval::{evaluate, EvaluationContext},
        exprs::{Expr, ExprRef},
        semantics::{core::CoreInstantiator, lia::LiaInstantiator},
        smt::{Verdict, Verifier},
        solver::term_solver::TermSolver,
        types::{Point, Type, Value},
        Result,
    };

    /// Scripted verifier: counts calls, accepts everything.
    struct AcceptAll {
        calls: usize,
    }

    impl Verifier for AcceptAll {
        fn verify(&mut self, _candidate: &ExprRef) -> Result<Verdict> {
            self.calls += 1;
            Ok(Verdict::Valid)
        }
    }

    fn setup_context() -> SynthesisContext {
        SynthesisContext::new(vec![
            Box::new(CoreInstantiator::new()),
            Box::new(LiaInstantiator::new()),
        ])
    }

    /// spec `f(x) >= x and f(x) >= 0` (f is max(x, 0)).
    fn setup_relu(ctx: &SynthesisContext) -> (TermSolver, Generator) {
        let x = ctx.make_variable(Type::Int, "x", 0).unwrap();
        let f = ctx.make_synth_fun("f", vec![Type::Int], Type::Int);
        let app = ctx.make_app(&f, vec![x.clone()]);
        let zero = Expr::constant(Value::Int(0));
        ctx.assert_spec(
            ctx.make_function_expr("ge", vec![app.clone(), x.clone()])
                .unwrap(),
        );
        ctx.assert_spec(ctx.make_function_expr("ge", vec![app, zero.clone()]).unwrap());

        let param = Expr::formal_parameter(f, 0);
        let term_gen = Generator::leaf(vec![zero.clone(), param.clone()]);

        let le = ctx.instantiate_function("le", &[Type::Int, Type::Int]).unwrap();
        let factory = GeneratorFactory::new();
        let leaf_ph = factory.placeholder("Leaf").unwrap();
        factory.define("Leaf", Generator::leaf(vec![param, zero]));
        let pred_gen = Generator::func(le, vec![leaf_ph.clone(), leaf_ph]);

        let spec = ctx.synthesis_spec().unwrap().canon_spec;
        (TermSolver::new(spec, term_gen, 2), pred_gen)
    }

    #[test]
    fn test_trivial_unification_skips_predicates() {
        let ctx = setup_context();
        let (mut term_solver, pred_gen) = setup_relu(&ctx);
        // Empty point set: vacuous cover, keyed None.
        let sig_to_term = term_solver.solve().unwrap();
        assert!(sig_to_term.first().unwrap().0.is_none());

        let mut unifier = Unifier::new(&ctx, pred_gen, 3);
        let mut verifier = AcceptAll { calls: 0 };
        let unified = unifier.unify(&sig_to_term, &mut verifier).unwrap().unwrap();
        match unified {
            Unified::Expr(e) => assert_eq!(e.to_string(), "0"),
            Unified::Counterexample(_) => panic!("verifier accepts everything"),
        }
        assert_eq!(verifier.calls, 1);
    }

    #[test]
    fn test_decision_tree_unification_agrees_pointwise() {
        let ctx = setup_context();
        let (mut term_solver, pred_gen) = setup_relu(&ctx);
        let points = [
            Point::new(vec![Value::Int(-1)]),
            Point::new(vec![Value::Int(1)]),
        ];
        let mut unifier = Unifier::new(&ctx, pred_gen, 3);
        for point in &points {
            term_solver.add_point(point.clone());
            unifier.add_point(point.clone());
        }

        // `0` covers x = -1, `x` covers x = 1; no term is full.
        let sig_to_term = term_solver.solve().unwrap();
        assert_eq!(sig_to_term.len(), 2);

        let mut verifier = AcceptAll { calls: 0 };
        let unified = unifier.unify(&sig_to_term, &mut verifier).unwrap().unwrap();
        let Unified::Expr(expr) = unified else {
            panic!("verifier accepts everything");
        };

        // The emitted conditional is max(x, 0) on both points.
        let mut eval_ctx = EvaluationContext::new();
        for (point, expected) in points.iter().zip([0i64, 1]) {
            eval_ctx.set_valuation_map(point);
            assert_eq!(evaluate(&expr, &eval_ctx), Ok(Value::Int(expected)));
        }
    }

    #[test]
    fn test_counterexample_is_propagated() {
        struct RefuteOnce {
            refuted: bool,
        }
        impl Verifier for RefuteOnce {
            fn verify(&mut self, _candidate: &ExprRef) -> Result<Verdict> {
                if self.refuted {
                    return Ok(Verdict::Valid);
                }
                self.refuted = true;
                Ok(Verdict::Counterexample(Point::new(vec![Value::Int(7)])))
            }
        }

        let ctx = setup_context();
        let (mut term_solver, pred_gen) = setup_relu(&ctx);
        let sig_to_term = term_solver.solve().unwrap();
        let mut unifier = Unifier::new(&ctx, pred_gen, 3);
        let mut verifier = RefuteOnce { refuted: false };
        match unifier.unify(&sig_to_term, &mut verifier).unwrap().unwrap() {
            Unified::Counterexample(point) => {
                assert_eq!(point, Point::new(vec![Value::Int(7)]));
            }
            Unified::Expr(_) => panic!("first verification must be refuted"),
        }
    }
}
