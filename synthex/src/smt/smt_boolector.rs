//! Boolector-backed SMT gateway.
//!
//! Booleans are 1-bit vectors, integers 64-bit two's-complement vectors.
//! Every query runs on a fresh solver context; models are decoded into
//! points per the declared variable types.

use std::rc::Rc;

use boolector::{
    option::{BtorOption, ModelGen},
    Btor, SolverResult, BV,
};
use tracing::debug;

use super::{SolverError, Verdict, Verifier};
use crate::{
    context::{SynthesisContext, SynthesisSpec},
    exprs::{Expr, ExprKind, ExprRef, FunctionKind, VarInfo, UNDEFINED_OFFSET},
    types::{mask, Point, Type, Value},
    Result, SynthError,
};

/// Handles the creation of terms and owns the underlying solver state.
#[derive(Debug, Clone)]
pub struct SmtContext {
    pub ctx: Rc<Btor>,
}

impl Default for SmtContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtContext {
    #[must_use]
    pub fn new() -> Self {
        let ctx = Rc::new(Btor::new());
        ctx.set_opt(BtorOption::Incremental(true));
        ctx.set_opt(BtorOption::ModelGen(ModelGen::All));
        Self { ctx }
    }

    #[must_use]
    pub fn unconstrained(&self, width: u32, name: &str) -> SmtTerm {
        SmtTerm(BV::new(self.ctx.clone(), width, Some(name)))
    }

    #[must_use]
    pub fn from_bool(&self, value: bool) -> SmtTerm {
        SmtTerm(BV::from_bool(self.ctx.clone(), value))
    }

    #[must_use]
    pub fn from_u64(&self, value: u64, width: u32) -> SmtTerm {
        SmtTerm(BV::from_u64(self.ctx.clone(), value, width))
    }

    #[must_use]
    pub fn zero(&self, width: u32) -> SmtTerm {
        SmtTerm(BV::zero(self.ctx.clone(), width))
    }

    #[must_use]
    pub fn one(&self, width: u32) -> SmtTerm {
        SmtTerm(BV::from_u64(self.ctx.clone(), 1, width))
    }

    pub fn assert(&self, constraint: &SmtTerm) {
        constraint.0.assert();
    }

    pub fn check(&self) -> Result<bool> {
        match self.ctx.sat() {
            SolverResult::Sat => Ok(true),
            SolverResult::Unsat => Ok(false),
            SolverResult::Unknown => Err(SolverError::Unknown.into()),
        }
    }
}

/// A bit-vector term in the backend. Comparison and arithmetic helpers
/// mirror the subset of the solver surface the encoders need.
#[derive(Debug, Clone, PartialEq)]
pub struct SmtTerm(pub BV<Rc<Btor>>);

impl SmtTerm {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.get_width()
    }

    #[must_use]
    pub fn _eq(&self, other: &Self) -> Self {
        debug_assert_eq!(self.width(), other.width());
        Self(self.0._eq(&other.0))
    }

    #[must_use]
    pub fn _ne(&self, other: &Self) -> Self {
        debug_assert_eq!(self.width(), other.width());
        Self(self.0._ne(&other.0))
    }

    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self(self.0.add(&other.0))
    }

    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        Self(self.0.sub(&other.0))
    }

    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        Self(self.0.mul(&other.0))
    }

    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        Self(self.0.and(&other.0))
    }

    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        Self(self.0.or(&other.0))
    }

    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        Self(self.0.xor(&other.0))
    }

    #[must_use]
    pub fn not(&self) -> Self {
        Self(self.0.not())
    }

    #[must_use]
    pub fn slt(&self, other: &Self) -> Self {
        Self(self.0.slt(&other.0))
    }

    #[must_use]
    pub fn slte(&self, other: &Self) -> Self {
        Self(self.0.slte(&other.0))
    }

    #[must_use]
    pub fn sgt(&self, other: &Self) -> Self {
        Self(self.0.sgt(&other.0))
    }

    #[must_use]
    pub fn sgte(&self, other: &Self) -> Self {
        Self(self.0.sgte(&other.0))
    }

    #[must_use]
    pub fn ult(&self, other: &Self) -> Self {
        Self(self.0.ult(&other.0))
    }

    #[must_use]
    pub fn ulte(&self, other: &Self) -> Self {
        Self(self.0.ulte(&other.0))
    }

    #[must_use]
    pub fn sll(&self, other: &Self) -> Self {
        Self(self.0.sll(&other.0))
    }

    #[must_use]
    pub fn srl(&self, other: &Self) -> Self {
        Self(self.0.srl(&other.0))
    }

    /// `self` must be one bit wide; selects between the branches.
    #[must_use]
    pub fn ite(&self, then_term: &Self, else_term: &Self) -> Self {
        debug_assert_eq!(self.width(), 1);
        Self(self.0.cond_bv(&then_term.0, &else_term.0))
    }

    /// The constant bit pattern, when the term simplifies to one.
    #[must_use]
    pub fn get_constant(&self) -> Option<u64> {
        let bits = self.0.as_binary_str()?;
        u64::from_str_radix(&bits, 2).ok()
    }

    /// Read one solution for the term from the current model.
    fn solution_bits(&self) -> Result<u64> {
        let solution = self.0.get_a_solution().disambiguate();
        u64::from_str_radix(solution.as_01x_str(), 2).map_err(|e| {
            SynthError::from(SolverError::Generic(format!("unreadable model value: {e}")))
        })
    }
}

/// Encode a value as a term.
fn value_to_term(smt: &SmtContext, value: &Value) -> SmtTerm {
    match value {
        Value::Bool(b) => smt.from_bool(*b),
        Value::Int(i) => smt.from_u64(*i as u64, 64),
        Value::BitVec { bits, width } => smt.from_u64(*bits, *width),
    }
}

fn type_width(ty: Type) -> u32 {
    match ty {
        Type::Bool => 1,
        Type::Int => 64,
        Type::BitVec(width) => width,
    }
}

/// Encode an expression. `vars` holds the term for each universally
/// quantified variable by offset; `interpretations` the assumed bodies of
/// the synthesis functions; `frame` the encoded arguments of the enclosing
/// synthesis-function application.
pub fn encode_expr(
    smt: &SmtContext,
    expr: &Expr,
    vars: &[SmtTerm],
    interpretations: &[ExprRef],
    frame: Option<&[SmtTerm]>,
) -> Result<SmtTerm> {
    match &expr.kind {
        ExprKind::Constant(value) => Ok(value_to_term(smt, value)),
        ExprKind::Variable(info) => {
            let offset = info.eval_offset.get();
            if offset == UNDEFINED_OFFSET || offset >= vars.len() {
                return Err(SynthError::UnhandledCase("variable without an SMT binding"));
            }
            Ok(vars[offset].clone())
        }
        ExprKind::FormalParameter { position, .. } => {
            let slots = frame.unwrap_or(vars);
            slots
                .get(*position)
                .cloned()
                .ok_or(SynthError::UnhandledCase("formal parameter out of range"))
        }
        ExprKind::FunctionApp { op, children } => {
            let mut encoded = Vec::with_capacity(children.len());
            for child in children {
                encoded.push(encode_expr(smt, child, vars, interpretations, frame)?);
            }
            match &op.kind {
                FunctionKind::Interpreted { smt_encode, .. } => Ok(smt_encode(smt, &encoded)),
                FunctionKind::Unknown { slot } => {
                    let body = interpretations
                        .get(*slot)
                        .cloned()
                        .ok_or(SynthError::UnhandledCase(
                            "synthesis function without an interpretation",
                        ))?;
                    encode_expr(smt, &body, vars, interpretations, Some(&encoded))
                }
            }
        }
    }
}

/// Decode the current model into a point, per declared variable type.
fn model_to_point(vars: &[SmtTerm], var_infos: &[Rc<VarInfo>]) -> Result<Point> {
    let mut values = Vec::with_capacity(vars.len());
    for (term, info) in vars.iter().zip(var_infos) {
        let bits = term.solution_bits()?;
        let value = match info.ty {
            Type::Bool => Value::Bool(bits != 0),
            Type::Int => Value::Int(bits as i64),
            Type::BitVec(width) => Value::bit_vec(bits & mask(width), width),
        };
        values.push(value);
    }
    Ok(Point::new(values))
}

/// The SMT gateway: one fresh backend context per query.
pub struct SmtGateway<'ctx> {
    ctx: &'ctx SynthesisContext,
}

impl<'ctx> SmtGateway<'ctx> {
    #[must_use]
    pub fn new(ctx: &'ctx SynthesisContext) -> Self {
        Self { ctx }
    }

    fn fresh_vars(smt: &SmtContext, spec: &SynthesisSpec) -> Vec<SmtTerm> {
        spec.variables
            .iter()
            .map(|info| smt.unconstrained(type_width(info.ty), &info.name))
            .collect()
    }

    /// Check the negated specification with `candidate` substituted for the
    /// synthesis function. Unsat means the candidate is the answer.
    pub fn verify_candidate(&self, candidate: &ExprRef) -> Result<Verdict> {
        let spec = self.ctx.synthesis_spec()?;
        let smt = SmtContext::new();
        let vars = Self::fresh_vars(&smt, &spec);
        let neg_spec = self
            .ctx
            .make_function_expr("not", vec![spec.canon_spec.clone()])?;
        let interpretations = vec![candidate.clone()];
        let constraint = encode_expr(&smt, &neg_spec, &vars, &interpretations, None)?;
        smt.assert(&constraint);
        if smt.check()? {
            let point = model_to_point(&vars, &spec.variables)?;
            debug!(%candidate, %point, "candidate refuted");
            Ok(Verdict::Counterexample(point))
        } else {
            debug!(%candidate, "candidate verified");
            Ok(Verdict::Valid)
        }
    }

    /// A point where `found` and `intended` disagree under `precondition`,
    /// or `None` when they are equivalent. Both expressions range over the
    /// synthesis function's formal parameters.
    pub fn check_equivalence(
        &self,
        found: &ExprRef,
        intended: &ExprRef,
        precondition: Option<&ExprRef>,
    ) -> Result<Option<Point>> {
        let spec = self.ctx.synthesis_spec()?;
        let smt = SmtContext::new();
        let vars = Self::fresh_vars(&smt, &spec);
        let lhs = encode_expr(&smt, found, &vars, &[], None)?;
        let rhs = encode_expr(&smt, intended, &vars, &[], None)?;
        let mut constraint = lhs._ne(&rhs);
        if let Some(precondition) = precondition {
            let guard = encode_expr(&smt, precondition, &vars, &[], None)?;
            constraint = guard.and(&constraint);
        }
        smt.assert(&constraint);
        if smt.check()? {
            Ok(Some(model_to_point(&vars, &spec.variables)?))
        } else {
            Ok(None)
        }
    }

    /// A point satisfying `predicate`, or `None` when it is unsatisfiable.
    pub fn sample(&self, predicate: &ExprRef) -> Result<Option<Point>> {
        let spec = self.ctx.synthesis_spec()?;
        let smt = SmtContext::new();
        let vars = Self::fresh_vars(&smt, &spec);
        let constraint = encode_expr(&smt, predicate, &vars, &[], None)?;
        smt.assert(&constraint);
        if smt.check()? {
            Ok(Some(model_to_point(&vars, &spec.variables)?))
        } else {
            Ok(None)
        }
    }
}

impl Verifier for SmtGateway<'_> {
    fn verify(&mut self, candidate: &ExprRef) -> Result<Verdict> {
        self.verify_candidate(candidate)
    }
}

#[cfg(test)]
mod test {
    use super::{SmtContext, SmtGateway};
    use crate::{
        context::SynthesisContext,
        exprs::Expr,
        semantics::{bv::BvInstantiator, core::CoreInstantiator, lia::LiaInstantiator},
        smt::Verdict,
        types::{Point, Type, Value},
    };

    fn setup_context() -> SynthesisContext {
        SynthesisContext::new(vec![
            Box::new(CoreInstantiator::new()),
            Box::new(LiaInstantiator::new()),
            Box::new(BvInstantiator::new()),
        ])
    }

    #[test]
    fn test_term_constants() {
        let smt = SmtContext::new();
        let a = smt.from_u64(41, 32);
        let b = smt.one(32);
        assert_eq!(a.add(&b).get_constant(), Some(42));
        assert_eq!(smt.from_bool(true).get_constant(), Some(1));
        assert_eq!(smt.zero(8).get_constant(), Some(0));
    }

    #[test]
    fn test_signed_comparison_terms() {
        let smt = SmtContext::new();
        let minus_one = smt.from_u64(u64::MAX, 64);
        let one = smt.one(64);
        assert_eq!(minus_one.slt(&one).get_constant(), Some(1));
        assert_eq!(minus_one.ult(&one).get_constant(), Some(0));
    }

    #[test]
    fn test_verify_valid_candidate() {
        // spec: f(x) >= x, candidate: f := _arg_0.
        let ctx = setup_context();
        let x = ctx.make_variable(Type::Int, "x", 0).unwrap();
        let f = ctx.make_synth_fun("f", vec![Type::Int], Type::Int);
        let app = ctx.make_app(&f, vec![x.clone()]);
        ctx.assert_spec(ctx.make_function_expr("ge", vec![app, x]).unwrap());

        let gateway = SmtGateway::new(&ctx);
        let identity = Expr::formal_parameter(f, 0);
        assert_eq!(gateway.verify_candidate(&identity).unwrap(), Verdict::Valid);
    }

    #[test]
    fn test_verify_returns_counterexample() {
        // spec: f(x) >= x, candidate: f := 0 fails for positive x.
        let ctx = setup_context();
        let x = ctx.make_variable(Type::Int, "x", 0).unwrap();
        let f = ctx.make_synth_fun("f", vec![Type::Int], Type::Int);
        let app = ctx.make_app(&f, vec![x.clone()]);
        ctx.assert_spec(ctx.make_function_expr("ge", vec![app, x]).unwrap());

        let gateway = SmtGateway::new(&ctx);
        let zero = Expr::constant(Value::Int(0));
        match gateway.verify_candidate(&zero).unwrap() {
            Verdict::Counterexample(point) => match point.values() {
                [Value::Int(x)] => assert!(*x > 0),
                other => panic!("bad model decode: {other:?}"),
            },
            Verdict::Valid => panic!("f := 0 cannot satisfy f(x) >= x"),
        }
    }

    #[test]
    fn test_equivalence_check() {
        let ctx = setup_context();
        ctx.make_variable(Type::Int, "x", 0).unwrap();
        let f = ctx.make_synth_fun("f", vec![Type::Int], Type::Int);
        let p = Expr::formal_parameter(f.clone(), 0);
        let zero = Expr::constant(Value::Int(0));
        let p_plus_zero = ctx.make_function_expr("add", vec![p.clone(), zero]).unwrap();

        let gateway = SmtGateway::new(&ctx);
        assert_eq!(gateway.check_equivalence(&p, &p_plus_zero, None).unwrap(), None);

        let one = Expr::constant(Value::Int(1));
        let p_plus_one = ctx.make_function_expr("add", vec![p.clone(), one]).unwrap();
        assert!(gateway
            .check_equivalence(&p, &p_plus_one, None)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_equivalence_respects_precondition() {
        let ctx = setup_context();
        ctx.make_variable(Type::Int, "x", 0).unwrap();
        let f = ctx.make_synth_fun("f", vec![Type::Int], Type::Int);
        let p = Expr::formal_parameter(f.clone(), 0);
        let zero = Expr::constant(Value::Int(0));
        // Under x <= 0, max(x, 0) collapses to 0.
        let guard = ctx.make_function_expr("le", vec![p.clone(), zero.clone()]).unwrap();
        let gateway = SmtGateway::new(&ctx);
        let cex = gateway
            .check_equivalence(&zero, &p, Some(&guard))
            .unwrap()
            .unwrap();
        match cex.values() {
            [Value::Int(x)] => assert!(*x < 0),
            other => panic!("bad model decode: {other:?}"),
        }
    }

    #[test]
    fn test_sample_and_bit_vector_decode() {
        let ctx = setup_context();
        let b = ctx.make_variable(Type::BitVec(8), "b", 0).unwrap();
        let gateway = SmtGateway::new(&ctx);
        let wanted = ctx
            .make_function_expr("eq", vec![b, Expr::constant(Value::bit_vec(0xa5, 8))])
            .unwrap();
        let point = gateway.sample(&wanted).unwrap().unwrap();
        assert_eq!(point, Point::new(vec![Value::bit_vec(0xa5, 8)]));

        let ctx2 = setup_context();
        let p = ctx2.make_variable(Type::Bool, "p", 0).unwrap();
        let gateway2 = SmtGateway::new(&ctx2);
        let no_point = gateway2
            .sample(
                &ctx2
                    .make_function_expr("and", vec![p.clone(), ctx2.make_function_expr("not", vec![p]).unwrap()])
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(no_point, None);
    }
}
