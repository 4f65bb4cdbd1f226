//! Pointwise evaluation of expressions under a valuation map and an
//! interpretation of the synthesis functions.

use crate::{
    exprs::{Expr, ExprKind, ExprRef, FunctionKind, UNDEFINED_OFFSET},
    types::{Point, Value},
};

/// A semantics-level failure during evaluation. Signature computation
/// converts these into "signature bit off"; they never abort a solve.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("unbound variable `{0}`")]
    UnboundVariable(String),

    #[error("type mismatch in `{0}`")]
    TypeMismatch(&'static str),

    #[error("undefined result of `{0}`")]
    Undefined(&'static str),

    #[error("no interpretation bound for `{0}`")]
    MissingInterpretation(String),
}

/// Carries the valuation vector (indexed by variable offset) and the
/// interpretation map from synthesis-function slot to an assumed body.
#[derive(Debug, Default)]
pub struct EvaluationContext {
    valuation: Vec<Value>,
    interpretations: Vec<ExprRef>,
}

impl EvaluationContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_valuation_map(&mut self, point: &Point) {
        self.valuation.clear();
        self.valuation.extend_from_slice(point.values());
    }

    pub fn set_interpretation_map(&mut self, interpretations: Vec<ExprRef>) {
        self.interpretations = interpretations;
    }
}

/// Evaluate `expr` under the context's valuation and interpretations.
pub fn evaluate(expr: &Expr, ctx: &EvaluationContext) -> Result<Value, EvalError> {
    eval_expr(expr, ctx, None)
}

/// `frame` holds the evaluated arguments of the enclosing synthesis-function
/// application; formal parameters read it in preference to the valuation
/// vector. On the canonical spec the two coincide.
fn eval_expr(
    expr: &Expr,
    ctx: &EvaluationContext,
    frame: Option<&[Value]>,
) -> Result<Value, EvalError> {
    match &expr.kind {
        ExprKind::Constant(value) => Ok(*value),
        ExprKind::Variable(info) => {
            let offset = info.eval_offset.get();
            if offset == UNDEFINED_OFFSET {
                return Err(EvalError::UnboundVariable(info.name.clone()));
            }
            ctx.valuation
                .get(offset)
                .copied()
                .ok_or_else(|| EvalError::UnboundVariable(info.name.clone()))
        }
        ExprKind::FormalParameter { fun, position, .. } => {
            let slots = frame.unwrap_or(&ctx.valuation);
            slots
                .get(*position)
                .copied()
                .ok_or_else(|| EvalError::UnboundVariable(format!("{}#{position}", fun.name)))
        }
        ExprKind::FunctionApp { op, children } => match &op.kind {
            FunctionKind::Interpreted { evaluate, .. } => {
                let mut args = Vec::with_capacity(children.len());
                for child in children {
                    args.push(eval_expr(child, ctx, frame)?);
                }
                evaluate(&args)
            }
            FunctionKind::Unknown { slot } => {
                let body = ctx
                    .interpretations
                    .get(*slot)
                    .cloned()
                    .ok_or_else(|| EvalError::MissingInterpretation(op.name.clone()))?;
                let mut args = Vec::with_capacity(children.len());
                for child in children {
                    args.push(eval_expr(child, ctx, frame)?);
                }
                eval_expr(&body, ctx, Some(&args))
            }
        },
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use super::{evaluate, EvalError, EvaluationContext};
    use crate::{
        context::SynthesisContext,
        exprs::Expr,
        semantics::{core::CoreInstantiator, lia::LiaInstantiator},
        types::{Point, Type, Value},
    };

    fn setup_context() -> SynthesisContext {
        SynthesisContext::new(vec![
            Box::new(CoreInstantiator::new()),
            Box::new(LiaInstantiator::new()),
        ])
    }

    #[test]
    fn test_variable_and_constant() {
        let ctx = setup_context();
        let x = ctx.make_variable(Type::Int, "x", 0).unwrap();
        let mut eval_ctx = EvaluationContext::new();
        eval_ctx.set_valuation_map(&Point::new(vec![Value::Int(3)]));

        let sum = ctx
            .make_function_expr("add", vec![x, Expr::constant(Value::Int(4))])
            .unwrap();
        assert_eq!(evaluate(&sum, &eval_ctx), Ok(Value::Int(7)));
    }

    #[test]
    fn test_unbound_variable_is_an_error() {
        let ctx = setup_context();
        let x = ctx.make_variable(Type::Int, "x", 1).unwrap();
        let mut eval_ctx = EvaluationContext::new();
        eval_ctx.set_valuation_map(&Point::new(vec![Value::Int(0)]));
        assert_eq!(
            evaluate(&x, &eval_ctx),
            Err(EvalError::UnboundVariable("x".to_string()))
        );
    }

    #[test]
    fn test_interpretation_of_synthesis_function() {
        let ctx = setup_context();
        let x = ctx.make_variable(Type::Int, "x", 0).unwrap();
        let y = ctx.make_variable(Type::Int, "y", 1).unwrap();
        let f = ctx.make_synth_fun("f", vec![Type::Int, Type::Int], Type::Int);
        let app = ctx.make_app(&f, vec![x, y]);

        // f := add(_arg_0, _arg_1)
        let body = ctx
            .make_function_expr(
                "add",
                vec![
                    Expr::formal_parameter(f.clone(), 0),
                    Expr::formal_parameter(f.clone(), 1),
                ],
            )
            .unwrap();

        let mut eval_ctx = EvaluationContext::new();
        eval_ctx.set_valuation_map(&Point::new(vec![Value::Int(2), Value::Int(5)]));
        eval_ctx.set_interpretation_map(vec![body]);
        assert_eq!(evaluate(&app, &eval_ctx), Ok(Value::Int(7)));
    }

    #[test]
    fn test_missing_interpretation() {
        let ctx = setup_context();
        let x = ctx.make_variable(Type::Int, "x", 0).unwrap();
        let f = ctx.make_synth_fun("f", vec![Type::Int], Type::Int);
        let app = ctx.make_app(&f, vec![x]);

        let mut eval_ctx = EvaluationContext::new();
        eval_ctx.set_valuation_map(&Point::new(vec![Value::Int(0)]));
        assert_eq!(
            evaluate(&app, &eval_ctx),
            Err(EvalError::MissingInterpretation("f".to_string()))
        );
    }

    #[test]
    fn test_parameters_read_evaluated_arguments() {
        // f applied to constants rather than the point variables.
        let ctx = setup_context();
        let f = ctx.make_synth_fun("f", vec![Type::Int], Type::Int);
        let app = ctx.make_app(&f, vec![Expr::constant(Value::Int(9))]);

        let mut eval_ctx = EvaluationContext::new();
        eval_ctx.set_valuation_map(&Point::new(vec![Value::Int(1)]));
        eval_ctx.set_interpretation_map(vec![Expr::formal_parameter(f.clone(), 0)]);
        assert_eq!(evaluate(&app, &eval_ctx), Ok(Value::Int(9)));
    }
}
