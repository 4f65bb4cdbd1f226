//! The synthesis context: registered variables, synthesis functions,
//! operator instantiators and the asserted specification.

use std::{cell::RefCell, rc::Rc};

use crate::{
    exprs::{expr_type, Expr, ExprRef, FunctionInfo, FunctionKind, VarInfo},
    semantics::FunctionInstantiator,
    types::{Type, Value, MAX_BIT_VEC_WIDTH},
    Result, SynthError,
};

pub struct SynthesisContext {
    instantiators: Vec<Box<dyn FunctionInstantiator>>,
    variables: RefCell<Vec<Rc<VarInfo>>>,
    synth_funs: RefCell<Vec<Rc<FunctionInfo>>>,
    assertions: RefCell<Vec<ExprRef>>,
}

/// The canonicalized problem handed to the sub-solvers: variables in
/// evaluation-offset order, the synthesis functions, and the specification
/// as one conjunction.
pub struct SynthesisSpec {
    pub variables: Vec<Rc<VarInfo>>,
    pub synth_funs: Vec<Rc<FunctionInfo>>,
    pub canon_spec: ExprRef,
}

impl SynthesisContext {
    #[must_use]
    pub fn new(instantiators: Vec<Box<dyn FunctionInstantiator>>) -> Self {
        Self {
            instantiators,
            variables: RefCell::new(Vec::new()),
            synth_funs: RefCell::new(Vec::new()),
            assertions: RefCell::new(Vec::new()),
        }
    }

    /// Register a universally quantified variable at the given valuation
    /// offset and return an expression for it.
    pub fn make_variable(&self, ty: Type, name: &str, offset: usize) -> Result<ExprRef> {
        if let Type::BitVec(width) = ty {
            if width == 0 || width > MAX_BIT_VEC_WIDTH {
                return Err(SynthError::Argument(format!(
                    "unsupported bit-vector width {width} for variable `{name}`"
                )));
            }
        }
        let mut variables = self.variables.borrow_mut();
        if variables
            .iter()
            .any(|v| v.name == name || v.eval_offset.get() == offset)
        {
            return Err(SynthError::Argument(format!(
                "variable `{name}` (offset {offset}) clashes with an existing registration"
            )));
        }
        let info = Rc::new(VarInfo::new(ty, name));
        info.eval_offset.set(offset);
        variables.push(info.clone());
        Ok(Expr::variable(info))
    }

    /// Declare a synthesis function; its interpretation-map slot is assigned
    /// in declaration order.
    #[must_use]
    pub fn make_synth_fun(
        &self,
        name: &str,
        arg_types: Vec<Type>,
        range_type: Type,
    ) -> Rc<FunctionInfo> {
        let mut synth_funs = self.synth_funs.borrow_mut();
        let info = Rc::new(FunctionInfo {
            name: name.to_string(),
            arg_types,
            range_type,
            kind: FunctionKind::Unknown {
                slot: synth_funs.len(),
            },
        });
        synth_funs.push(info.clone());
        info
    }

    /// Resolve an operator descriptor through the registered instantiators.
    pub fn instantiate_function(&self, name: &str, arg_types: &[Type]) -> Result<Rc<FunctionInfo>> {
        for instantiator in &self.instantiators {
            if let Some(op) = instantiator.instantiate(name, arg_types) {
                return Ok(op);
            }
        }
        Err(SynthError::Argument(format!(
            "cannot instantiate function `{name}` with argument types {arg_types:?}"
        )))
    }

    /// Build an application of a named operator over the given children.
    pub fn make_function_expr(&self, name: &str, children: Vec<ExprRef>) -> Result<ExprRef> {
        let arg_types: Vec<Type> = children.iter().map(|c| expr_type(c)).collect();
        let op = self.instantiate_function(name, &arg_types)?;
        Ok(Expr::function_app(op, children))
    }

    /// Apply a known descriptor (typically a synthesis function).
    #[must_use]
    pub fn make_app(&self, op: &Rc<FunctionInfo>, children: Vec<ExprRef>) -> ExprRef {
        Expr::function_app(op.clone(), children)
    }

    /// Fold a variadic associative-commutative operator (`and`, `or`) into
    /// nested binary applications.
    pub fn make_ac_function_expr(&self, name: &str, children: Vec<ExprRef>) -> Result<ExprRef> {
        let mut iter = children.into_iter();
        let Some(first) = iter.next() else {
            return Err(SynthError::Argument(format!(
                "`{name}` needs at least one operand"
            )));
        };
        let mut acc = first;
        for child in iter {
            acc = self.make_function_expr(name, vec![acc, child])?;
        }
        Ok(acc)
    }

    /// Formal-parameter expressions for every argument of `fun`, in order.
    #[must_use]
    pub fn formal_parameters(&self, fun: &Rc<FunctionInfo>) -> Vec<ExprRef> {
        (0..fun.arity())
            .map(|position| Expr::formal_parameter(fun.clone(), position))
            .collect()
    }

    pub fn assert_spec(&self, spec: ExprRef) {
        self.assertions.borrow_mut().push(spec);
    }

    pub fn clear_assertions(&self) {
        self.assertions.borrow_mut().clear();
    }

    /// The canonicalized specification. Registered variable offsets must
    /// form a contiguous range starting at zero; points are tuples in that
    /// order.
    pub fn synthesis_spec(&self) -> Result<SynthesisSpec> {
        let mut variables = self.variables.borrow().clone();
        variables.sort_by_key(|v| v.eval_offset.get());
        for (idx, var) in variables.iter().enumerate() {
            if var.eval_offset.get() != idx {
                return Err(SynthError::Argument(format!(
                    "variable offsets are not contiguous at `{}`",
                    var.name
                )));
            }
        }

        let assertions = self.assertions.borrow().clone();
        let canon_spec = if assertions.is_empty() {
            Expr::constant(Value::Bool(true))
        } else {
            self.make_ac_function_expr("and", assertions)?
        };

        Ok(SynthesisSpec {
            variables,
            synth_funs: self.synth_funs.borrow().clone(),
            canon_spec,
        })
    }
}

#[cfg(test)]
mod test {
    use super::SynthesisContext;
    use crate::{
        semantics::{core::CoreInstantiator, lia::LiaInstantiator},
        types::{Type, Value},
    };

    fn setup_context() -> SynthesisContext {
        SynthesisContext::new(vec![
            Box::new(CoreInstantiator::new()),
            Box::new(LiaInstantiator::new()),
        ])
    }

    #[test]
    fn test_duplicate_variable_is_rejected() {
        let ctx = setup_context();
        ctx.make_variable(Type::Int, "x", 0).unwrap();
        assert!(ctx.make_variable(Type::Int, "x", 1).is_err());
        assert!(ctx.make_variable(Type::Int, "y", 0).is_err());
        assert!(ctx.make_variable(Type::Int, "y", 1).is_ok());
    }

    #[test]
    fn test_ac_fold() {
        let ctx = setup_context();
        let x = ctx.make_variable(Type::Bool, "p", 0).unwrap();
        let y = ctx.make_variable(Type::Bool, "q", 1).unwrap();
        let z = ctx.make_variable(Type::Bool, "r", 2).unwrap();
        let folded = ctx
            .make_ac_function_expr("and", vec![x.clone(), y, z])
            .unwrap();
        assert_eq!(folded.to_string(), "(and (and p q) r)");
        let single = ctx.make_ac_function_expr("or", vec![x]).unwrap();
        assert_eq!(single.to_string(), "p");
        assert!(ctx.make_ac_function_expr("and", vec![]).is_err());
    }

    #[test]
    fn test_canon_spec_defaults_to_true() {
        let ctx = setup_context();
        let spec = ctx.synthesis_spec().unwrap();
        assert_eq!(spec.canon_spec.to_string(), "true");
    }

    #[test]
    fn test_canon_spec_conjunction_and_clear() {
        let ctx = setup_context();
        let x = ctx.make_variable(Type::Int, "x", 0).unwrap();
        let c = ctx
            .make_function_expr("ge", vec![x.clone(), crate::exprs::Expr::constant(Value::Int(0))])
            .unwrap();
        ctx.assert_spec(c.clone());
        ctx.assert_spec(c);
        let spec = ctx.synthesis_spec().unwrap();
        assert_eq!(spec.canon_spec.to_string(), "(and (ge x 0) (ge x 0))");

        ctx.clear_assertions();
        assert_eq!(ctx.synthesis_spec().unwrap().canon_spec.to_string(), "true");
    }

    #[test]
    fn test_offsets_must_be_contiguous() {
        let ctx = setup_context();
        ctx.make_variable(Type::Int, "x", 1).unwrap();
        assert!(ctx.synthesis_spec().is_err());
    }
}
