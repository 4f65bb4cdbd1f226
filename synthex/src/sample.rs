//! Sample sufficiency: given a generator describing an intended solution,
//! construct a minimal point set that pins the solution down through the
//! enumerator/unifier pipeline.
//!
//! Three passes, each driving the full solver on specs induced by the
//! collected valuations and harvesting SMT equivalence counterexamples:
//! term sufficiency per conditional term of the intended solution,
//! predicate sufficiency per atomic predicate and path assignment, and the
//! generator's own completion.

use std::rc::Rc;

use tracing::debug;

use crate::{
    context::SynthesisContext,
    enumerators::Generator,
    eval::{evaluate, EvaluationContext},
    exprs::{Expr, ExprRef, FunctionInfo},
    smt::smt_boolector::SmtGateway,
    solver::Solver,
    types::{Point, Value},
    Result, SynthError,
};

/// A sample point together with the intended output at that point.
pub type Valuation = (Point, Value);

/// A path through the intended solution: atomic predicates with their truth
/// values, and the term the solution produces on that path.
pub type PredTermMapping = Vec<(Vec<(ExprRef, bool)>, ExprRef)>;

/// Describes a known-intended solution to re-derive.
pub trait SolutionGenerator {
    fn context(&self) -> &SynthesisContext;

    fn synth_fun(&self) -> Rc<FunctionInfo>;

    /// The intended solution decomposed into guard-paths and terms. Every
    /// path assigns a truth value to each atomic predicate it mentions.
    fn pred_term_mapping(&self) -> PredTermMapping;

    fn atomic_predicates(&self) -> Vec<ExprRef>;

    /// Term and predicate grammars for the per-term sub-problems.
    fn term_grammar(&self) -> (Generator, Generator);

    /// Grammars for the predicate-indicator sub-problems.
    fn indicator_grammar(&self) -> (Generator, Generator);

    /// Two range-type constants with distinct values, used to synthesize
    /// predicate indicators.
    fn distinct_constants(&self) -> (ExprRef, ExprRef);

    /// The intended solution's output at a point.
    fn intended_value_at(&self, point: &Point) -> Result<Value>;

    /// Any remaining points the generator deems necessary.
    fn complete(&self, valuations: &[Valuation]) -> Result<Vec<Valuation>>;
}

/// Run all three passes and return the difference set over the initial
/// valuations.
pub fn sufficient_sample_set<G: SolutionGenerator>(
    generator: &G,
    initial: &[Valuation],
) -> Result<Vec<Valuation>> {
    let mut valuations = initial.to_vec();
    let term_points = term_sufficient_samples(generator, &valuations)?;
    debug!(count = term_points.len(), "term-sufficiency pass done");
    valuations.extend(term_points);

    let pred_points = pred_sufficient_samples(generator, &valuations)?;
    debug!(count = pred_points.len(), "predicate-sufficiency pass done");
    valuations.extend(pred_points);

    let completion = generator.complete(&valuations)?;
    debug!(count = completion.len(), "completion pass done");
    valuations.extend(completion);

    Ok(difference(valuations, initial))
}

/// For each `(guard-path, term)` of the intended mapping, synthesize against
/// the term under its guard and harvest equivalence counterexamples.
pub fn term_sufficient_samples<G: SolutionGenerator>(
    generator: &G,
    initial: &[Valuation],
) -> Result<Vec<Valuation>> {
    let ctx = generator.context();
    let mut eval_ctx = EvaluationContext::new();
    let mut valuations = initial.to_vec();

    let mapping = generator.pred_term_mapping();
    for (idx, (pred_list, term)) in mapping.iter().enumerate() {
        debug!(entry = idx + 1, total = mapping.len(), %term, "conditional term");
        let relevant: Vec<Valuation> = valuations
            .iter()
            .filter(|(point, _)| eval_pred_list(&mut eval_ctx, pred_list, point))
            .cloned()
            .collect();
        let guard = pred_list_guard(ctx, pred_list)?;
        let new_points = guarded_term_samples(generator, &guard, term, relevant)?;
        valuations.extend(new_points);
    }

    Ok(difference(valuations, initial))
}

/// For each atomic predicate, each subset of the other predicates and each
/// assignment to it, collect points distinguishing the predicate's two
/// branches under that partial path.
pub fn pred_sufficient_samples<G: SolutionGenerator>(
    generator: &G,
    initial: &[Valuation],
) -> Result<Vec<Valuation>> {
    let atomic = generator.atomic_predicates();
    let mapping = generator.pred_term_mapping();
    let mut valuations = initial.to_vec();
    let mut eval_ctx = EvaluationContext::new();

    for (idx, current) in atomic.iter().enumerate() {
        debug!(pred = idx + 1, total = atomic.len(), %current, "distinguishing predicate");
        let others: Vec<ExprRef> = atomic
            .iter()
            .filter(|p| !Rc::ptr_eq(p, current))
            .cloned()
            .collect();

        for subset in 0..(1usize << others.len()) {
            let fixed: Vec<ExprRef> = others
                .iter()
                .enumerate()
                .filter(|(i, _)| subset & (1 << i) != 0)
                .map(|(_, p)| p.clone())
                .collect();
            let unfixed: Vec<ExprRef> = others
                .iter()
                .filter(|p| !fixed.iter().any(|q| Rc::ptr_eq(p, q)))
                .cloned()
                .collect();

            for assignment in 0..(1usize << fixed.len()) {
                let fixed_values: Vec<(ExprRef, bool)> = fixed
                    .iter()
                    .enumerate()
                    .map(|(i, p)| (p.clone(), assignment & (1 << i) != 0))
                    .collect();

                let relevant: Vec<Valuation> = valuations
                    .iter()
                    .filter(|(point, _)| eval_pred_list(&mut eval_ctx, &fixed_values, point))
                    .cloned()
                    .collect();
                let relevant_mapping: PredTermMapping = mapping
                    .iter()
                    .filter(|(path, _)| consistent(path, &fixed_values))
                    .cloned()
                    .collect();

                let new_points = distinguishing_points(
                    generator,
                    current,
                    &fixed_values,
                    &unfixed,
                    relevant,
                    &relevant_mapping,
                )?;
                for (point, _) in new_points {
                    let output = generator.intended_value_at(&point)?;
                    valuations.push((point, output));
                }
            }
        }
    }

    Ok(difference(valuations, initial))
}

/// Synthesize the intended `term` under `guard`, adding a counterexample
/// per round until the solver's answer is equivalent to the term.
fn guarded_term_samples<G: SolutionGenerator>(
    generator: &G,
    guard: &ExprRef,
    term: &ExprRef,
    mut initial: Vec<Valuation>,
) -> Result<Vec<Valuation>> {
    let gateway = SmtGateway::new(generator.context());
    if initial.is_empty() {
        // The guard may be unsatisfiable, in which case the path needs no
        // samples at all.
        match gateway.sample(guard)? {
            None => return Ok(Vec::new()),
            Some(point) => initial.push(valuation_at(term, point)?),
        }
    }
    solve_until_sufficient(generator, generator.term_grammar(), &initial, |found| {
        match gateway.check_equivalence(found, term, Some(guard))? {
            None => Ok(None),
            Some(point) => Ok(Some(valuation_at(term, point)?)),
        }
    })
}

/// Build the sub-problem "distinguish `current = true` from `current =
/// false` under the fixed partial path" and harvest its counterexamples.
fn distinguishing_points<G: SolutionGenerator>(
    generator: &G,
    current: &ExprRef,
    fixed_values: &[(ExprRef, bool)],
    unfixed: &[ExprRef],
    relevant_valuations: Vec<Valuation>,
    relevant_mapping: &PredTermMapping,
) -> Result<Vec<Valuation>> {
    let ctx = generator.context();

    let restrict = |keep_true: bool| -> PredTermMapping {
        relevant_mapping
            .iter()
            .filter(|(path, _)| {
                path.iter()
                    .any(|(p, value)| Rc::ptr_eq(p, current) && *value == keep_true)
            })
            .map(|(path, term)| {
                let filtered: Vec<(ExprRef, bool)> = path
                    .iter()
                    .filter(|(p, _)| unfixed.iter().any(|q| Rc::ptr_eq(p, q)))
                    .cloned()
                    .collect();
                (filtered, term.clone())
            })
            .collect()
    };
    let true_mapping = restrict(true);
    let false_mapping = restrict(false);
    if true_mapping.is_empty() || false_mapping.is_empty() {
        // The intended solution never takes one of the branches under this
        // path; nothing to distinguish.
        return Ok(Vec::new());
    }

    let true_term = mapping_to_expr(ctx, &true_mapping)?;
    let false_term = mapping_to_expr(ctx, &false_mapping)?;
    let condition = pred_list_guard(ctx, fixed_values)?;
    let branches_differ = ctx.make_function_expr("ne", vec![true_term, false_term])?;
    let precondition = ctx.make_function_expr("and", vec![condition, branches_differ])?;

    let (on_true, on_false) = generator.distinct_constants();
    let indicator =
        ctx.make_function_expr("ite", vec![current.clone(), on_true, on_false])?;

    let remapped: Vec<Valuation> = relevant_valuations
        .into_iter()
        .map(|(point, _)| valuation_at(&indicator, point))
        .collect::<Result<_>>()?;

    let gateway = SmtGateway::new(ctx);
    solve_until_sufficient(
        generator,
        generator.indicator_grammar(),
        &remapped,
        |found| match gateway.check_equivalence(found, &indicator, Some(&precondition))? {
            None => Ok(None),
            Some(point) => Ok(Some(valuation_at(&indicator, point)?)),
        },
    )
}

/// The core loop shared by both passes: assert the point-induced spec,
/// solve, ask the oracle for a counterexample, repeat until none remains.
fn solve_until_sufficient<G, F>(
    generator: &G,
    grammars: (Generator, Generator),
    initial: &[Valuation],
    mut check_solution: F,
) -> Result<Vec<Valuation>>
where
    G: SolutionGenerator,
    F: FnMut(&ExprRef) -> Result<Option<Valuation>>,
{
    let ctx = generator.context();
    let synth_fun = generator.synth_fun();
    let mut valuations = initial.to_vec();

    loop {
        ctx.clear_assertions();
        ctx.assert_spec(points_to_spec(ctx, &synth_fun, &valuations)?);

        let mut solver = Solver::new(ctx);
        let mut gateway = SmtGateway::new(ctx);
        let (term_gen, pred_gen) = (grammars.0.clone(), grammars.1.clone());
        let Some(solution) = solver.solve(term_gen, pred_gen, &mut gateway)? else {
            return Err(SynthError::Argument(
                "sub-problem grammar cannot reproduce the intended solution".to_string(),
            ));
        };

        match check_solution(&solution)? {
            None => return Ok(difference(valuations, initial)),
            Some(valuation) => {
                if valuations.contains(&valuation) {
                    return Err(SynthError::DuplicatePoint(valuation.0));
                }
                valuations.push(valuation);
            }
        }
    }
}

/// The spec induced by the collected valuations:
/// `⋀ᵢ (x⃗ = pointᵢ → f(x⃗) = outputᵢ)` over the registered variables, so
/// the spec evaluates pointwise and counterexamples are the failing
/// examples themselves.
fn points_to_spec(
    ctx: &SynthesisContext,
    synth_fun: &Rc<FunctionInfo>,
    valuations: &[Valuation],
) -> Result<ExprRef> {
    if valuations.is_empty() {
        return Ok(Expr::constant(Value::Bool(true)));
    }
    let variables: Vec<ExprRef> = ctx
        .synthesis_spec()?
        .variables
        .iter()
        .map(|info| Expr::variable(info.clone()))
        .collect();
    let app = ctx.make_app(synth_fun, variables.clone());

    let mut conjuncts = Vec::with_capacity(valuations.len());
    for (point, output) in valuations {
        let mut bindings = Vec::with_capacity(variables.len());
        for (var, value) in variables.iter().zip(point.values()) {
            bindings.push(
                ctx.make_function_expr("eq", vec![var.clone(), Expr::constant(*value)])?,
            );
        }
        let here = ctx.make_ac_function_expr("and", bindings)?;
        let correct =
            ctx.make_function_expr("eq", vec![app.clone(), Expr::constant(*output)])?;
        conjuncts.push(ctx.make_function_expr("implies", vec![here, correct])?);
    }
    ctx.make_ac_function_expr("and", conjuncts)
}

/// Conjunction of the predicates at their required truth values; `true`
/// for the empty path.
fn pred_list_guard(
    ctx: &SynthesisContext,
    pred_list: &[(ExprRef, bool)],
) -> Result<ExprRef> {
    if pred_list.is_empty() {
        return Ok(Expr::constant(Value::Bool(true)));
    }
    let mut literals = Vec::with_capacity(pred_list.len());
    for (pred, value) in pred_list {
        literals.push(if *value {
            pred.clone()
        } else {
            ctx.make_function_expr("not", vec![pred.clone()])?
        });
    }
    ctx.make_ac_function_expr("and", literals)
}

/// Does the full path agree with the partial assignment?
fn consistent(path: &[(ExprRef, bool)], partial: &[(ExprRef, bool)]) -> bool {
    partial.iter().all(|(pred, value)| {
        path.iter()
            .any(|(q, w)| Rc::ptr_eq(pred, q) && value == w)
    })
}

/// Does the point satisfy every predicate at its required truth value?
fn eval_pred_list(
    eval_ctx: &mut EvaluationContext,
    pred_list: &[(ExprRef, bool)],
    point: &Point,
) -> bool {
    eval_ctx.set_valuation_map(point);
    pred_list.iter().all(|(pred, value)| {
        matches!(evaluate(pred, eval_ctx), Ok(Value::Bool(b)) if b == *value)
    })
}

/// Fold a guard-path mapping back into a nested conditional expression.
fn mapping_to_expr(ctx: &SynthesisContext, mapping: &PredTermMapping) -> Result<ExprRef> {
    if mapping.len() == 1 {
        let (path, term) = &mapping[0];
        if !path.is_empty() {
            return Err(SynthError::Argument(
                "intended-solution mapping does not cover all paths".to_string(),
            ));
        }
        return Ok(term.clone());
    }
    let Some((first_path, _)) = mapping.first() else {
        return Err(SynthError::Argument(
            "empty intended-solution mapping".to_string(),
        ));
    };
    let Some((condition, _)) = first_path.first() else {
        return Err(SynthError::Argument(
            "ambiguous intended-solution mapping".to_string(),
        ));
    };
    let condition = condition.clone();

    let narrow = |wanted: bool| -> PredTermMapping {
        mapping
            .iter()
            .filter(|(path, _)| {
                path.iter()
                    .any(|(p, value)| Rc::ptr_eq(p, &condition) && *value == wanted)
            })
            .map(|(path, term)| {
                let filtered: Vec<(ExprRef, bool)> = path
                    .iter()
                    .filter(|(p, _)| !Rc::ptr_eq(p, &condition))
                    .cloned()
                    .collect();
                (filtered, term.clone())
            })
            .collect()
    };

    let then_expr = mapping_to_expr(ctx, &narrow(true))?;
    let else_expr = mapping_to_expr(ctx, &narrow(false))?;
    ctx.make_function_expr("ite", vec![condition, then_expr, else_expr])
}

/// Evaluate `term` at `point`, forming a valuation.
fn valuation_at(term: &ExprRef, point: Point) -> Result<Valuation> {
    let mut eval_ctx = EvaluationContext::new();
    eval_ctx.set_valuation_map(&point);
    let output = evaluate(term, &eval_ctx)?;
    Ok((point, output))
}

/// The collected valuations minus the initial ones.
fn difference(valuations: Vec<Valuation>, initial: &[Valuation]) -> Vec<Valuation> {
    valuations
        .into_iter()
        .filter(|v| !initial.contains(v))
        .collect()
}
