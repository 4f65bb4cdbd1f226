//! Core theory: Boolean connectives, polymorphic equality and `ite`.

use std::rc::Rc;

use super::{cached, descriptor, DescriptorCache, FunctionInstantiator};
use crate::{
    eval::EvalError,
    exprs::FunctionInfo,
    smt::smt_boolector::{SmtContext, SmtTerm},
    types::{Type, Value},
};

#[derive(Default)]
pub struct CoreInstantiator {
    cache: DescriptorCache,
}

impl CoreInstantiator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FunctionInstantiator for CoreInstantiator {
    fn instantiate(&self, name: &str, arg_types: &[Type]) -> Option<Rc<FunctionInfo>> {
        let build: fn(&str, &[Type]) -> Rc<FunctionInfo> = match (name, arg_types) {
            ("and", [Type::Bool, Type::Bool]) => {
                |name, args| descriptor(name, args, Type::Bool, eval_and, smt_and)
            }
            ("or", [Type::Bool, Type::Bool]) => {
                |name, args| descriptor(name, args, Type::Bool, eval_or, smt_or)
            }
            ("implies", [Type::Bool, Type::Bool]) => {
                |name, args| descriptor(name, args, Type::Bool, eval_implies, smt_implies)
            }
            ("not", [Type::Bool]) => {
                |name, args| descriptor(name, args, Type::Bool, eval_not, smt_not)
            }
            ("eq", [lhs, rhs]) if lhs == rhs => {
                |name, args| descriptor(name, args, Type::Bool, eval_eq, smt_eq)
            }
            ("ne", [lhs, rhs]) if lhs == rhs => {
                |name, args| descriptor(name, args, Type::Bool, eval_ne, smt_ne)
            }
            ("ite", [Type::Bool, then_ty, else_ty]) if then_ty == else_ty => {
                |name, args| descriptor(name, args, args[1], eval_ite, smt_ite)
            }
            _ => return None,
        };
        Some(cached(&self.cache, name, arg_types, || {
            build(name, arg_types)
        }))
    }
}

fn eval_and(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::Bool(a), Value::Bool(b)] => Ok(Value::Bool(*a && *b)),
        _ => Err(EvalError::TypeMismatch("and")),
    }
}

fn eval_or(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::Bool(a), Value::Bool(b)] => Ok(Value::Bool(*a || *b)),
        _ => Err(EvalError::TypeMismatch("or")),
    }
}

fn eval_implies(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::Bool(a), Value::Bool(b)] => Ok(Value::Bool(!*a || *b)),
        _ => Err(EvalError::TypeMismatch("implies")),
    }
}

fn eval_not(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::Bool(a)] => Ok(Value::Bool(!*a)),
        _ => Err(EvalError::TypeMismatch("not")),
    }
}

fn eval_eq(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [a, b] if a.ty() == b.ty() => Ok(Value::Bool(a == b)),
        _ => Err(EvalError::TypeMismatch("eq")),
    }
}

fn eval_ne(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [a, b] if a.ty() == b.ty() => Ok(Value::Bool(a != b)),
        _ => Err(EvalError::TypeMismatch("ne")),
    }
}

fn eval_ite(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::Bool(cond), then_value, else_value] => {
            Ok(if *cond { *then_value } else { *else_value })
        }
        _ => Err(EvalError::TypeMismatch("ite")),
    }
}

fn smt_and(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].and(&args[1])
}

fn smt_or(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].or(&args[1])
}

fn smt_implies(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].not().or(&args[1])
}

fn smt_not(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].not()
}

fn smt_eq(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0]._eq(&args[1])
}

fn smt_ne(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0]._ne(&args[1])
}

fn smt_ite(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].ite(&args[1], &args[2])
}

#[cfg(test)]
mod test {
    use super::{CoreInstantiator, FunctionInstantiator};
    use crate::{
        exprs::FunctionKind,
        types::{Type, Value},
    };

    #[test]
    fn test_signatures() {
        let core = CoreInstantiator::new();
        assert!(core.instantiate("and", &[Type::Bool, Type::Bool]).is_some());
        assert!(core.instantiate("and", &[Type::Int, Type::Int]).is_none());
        assert!(core.instantiate("eq", &[Type::Int, Type::Int]).is_some());
        assert!(core.instantiate("eq", &[Type::Int, Type::Bool]).is_none());
        assert!(core
            .instantiate("ite", &[Type::Bool, Type::Int, Type::Int])
            .is_some());
        assert!(core.instantiate("nand", &[Type::Bool, Type::Bool]).is_none());
    }

    #[test]
    fn test_instantiation_is_cached() {
        let core = CoreInstantiator::new();
        let a = core.instantiate("not", &[Type::Bool]).unwrap();
        let b = core.instantiate("not", &[Type::Bool]).unwrap();
        assert!(std::rc::Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_ite_evaluates() {
        let core = CoreInstantiator::new();
        let ite = core
            .instantiate("ite", &[Type::Bool, Type::Int, Type::Int])
            .unwrap();
        let FunctionKind::Interpreted { evaluate, .. } = &ite.kind else {
            panic!("core ops are interpreted");
        };
        assert_eq!(
            evaluate(&[Value::Bool(true), Value::Int(1), Value::Int(2)]),
            Ok(Value::Int(1))
        );
        assert_eq!(
            evaluate(&[Value::Bool(false), Value::Int(1), Value::Int(2)]),
            Ok(Value::Int(2))
        );
        assert_eq!(ite.range_type, Type::Int);
    }
}
