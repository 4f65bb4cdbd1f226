//! Linear integer arithmetic.
//!
//! Integers evaluate with 64-bit two's-complement wrap-around so the
//! concrete semantics agree with the BV64 SMT encoding.

use std::rc::Rc;

use super::{cached, descriptor, DescriptorCache, FunctionInstantiator};
use crate::{
    eval::EvalError,
    exprs::FunctionInfo,
    smt::smt_boolector::{SmtContext, SmtTerm},
    types::{Type, Value},
};

#[derive(Default)]
pub struct LiaInstantiator {
    cache: DescriptorCache,
}

impl LiaInstantiator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FunctionInstantiator for LiaInstantiator {
    fn instantiate(&self, name: &str, arg_types: &[Type]) -> Option<Rc<FunctionInfo>> {
        let build: fn(&str, &[Type]) -> Rc<FunctionInfo> = match (name, arg_types) {
            ("add", [Type::Int, Type::Int]) => {
                |name, args| descriptor(name, args, Type::Int, eval_add, smt_add)
            }
            ("sub", [Type::Int, Type::Int]) => {
                |name, args| descriptor(name, args, Type::Int, eval_sub, smt_sub)
            }
            ("mul", [Type::Int, Type::Int]) => {
                |name, args| descriptor(name, args, Type::Int, eval_mul, smt_mul)
            }
            ("neg", [Type::Int]) => {
                |name, args| descriptor(name, args, Type::Int, eval_neg, smt_neg)
            }
            ("le", [Type::Int, Type::Int]) => {
                |name, args| descriptor(name, args, Type::Bool, eval_le, smt_le)
            }
            ("lt", [Type::Int, Type::Int]) => {
                |name, args| descriptor(name, args, Type::Bool, eval_lt, smt_lt)
            }
            ("ge", [Type::Int, Type::Int]) => {
                |name, args| descriptor(name, args, Type::Bool, eval_ge, smt_ge)
            }
            ("gt", [Type::Int, Type::Int]) => {
                |name, args| descriptor(name, args, Type::Bool, eval_gt, smt_gt)
            }
            _ => return None,
        };
        Some(cached(&self.cache, name, arg_types, || {
            build(name, arg_types)
        }))
    }
}

fn int_args(args: &[Value], op: &'static str) -> Result<(i64, i64), EvalError> {
    match args {
        [Value::Int(a), Value::Int(b)] => Ok((*a, *b)),
        _ => Err(EvalError::TypeMismatch(op)),
    }
}

fn eval_add(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = int_args(args, "add")?;
    Ok(Value::Int(a.wrapping_add(b)))
}

fn eval_sub(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = int_args(args, "sub")?;
    Ok(Value::Int(a.wrapping_sub(b)))
}

fn eval_mul(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = int_args(args, "mul")?;
    Ok(Value::Int(a.wrapping_mul(b)))
}

fn eval_neg(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::Int(a)] => Ok(Value::Int(a.wrapping_neg())),
        _ => Err(EvalError::TypeMismatch("neg")),
    }
}

fn eval_le(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = int_args(args, "le")?;
    Ok(Value::Bool(a <= b))
}

fn eval_lt(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = int_args(args, "lt")?;
    Ok(Value::Bool(a < b))
}

fn eval_ge(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = int_args(args, "ge")?;
    Ok(Value::Bool(a >= b))
}

fn eval_gt(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = int_args(args, "gt")?;
    Ok(Value::Bool(a > b))
}

fn smt_add(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].add(&args[1])
}

fn smt_sub(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].sub(&args[1])
}

fn smt_mul(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].mul(&args[1])
}

fn smt_neg(smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    smt.zero(args[0].width()).sub(&args[0])
}

fn smt_le(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].slte(&args[1])
}

fn smt_lt(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].slt(&args[1])
}

fn smt_ge(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].sgte(&args[1])
}

fn smt_gt(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].sgt(&args[1])
}
