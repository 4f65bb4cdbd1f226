//! Fixed-width bit-vector theory (widths up to 64 bits).

use std::rc::Rc;

use super::{cached, descriptor, DescriptorCache, FunctionInstantiator};
use crate::{
    eval::EvalError,
    exprs::FunctionInfo,
    smt::smt_boolector::{SmtContext, SmtTerm},
    types::{mask, Type, Value},
};

#[derive(Default)]
pub struct BvInstantiator {
    cache: DescriptorCache,
}

impl BvInstantiator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FunctionInstantiator for BvInstantiator {
    fn instantiate(&self, name: &str, arg_types: &[Type]) -> Option<Rc<FunctionInfo>> {
        let build: fn(&str, &[Type]) -> Rc<FunctionInfo> = match (name, arg_types) {
            ("bvadd", [Type::BitVec(a), Type::BitVec(b)]) if a == b => {
                |name, args| descriptor(name, args, args[0], eval_bvadd, smt_bvadd)
            }
            ("bvsub", [Type::BitVec(a), Type::BitVec(b)]) if a == b => {
                |name, args| descriptor(name, args, args[0], eval_bvsub, smt_bvsub)
            }
            ("bvand", [Type::BitVec(a), Type::BitVec(b)]) if a == b => {
                |name, args| descriptor(name, args, args[0], eval_bvand, smt_bvand)
            }
            ("bvor", [Type::BitVec(a), Type::BitVec(b)]) if a == b => {
                |name, args| descriptor(name, args, args[0], eval_bvor, smt_bvor)
            }
            ("bvxor", [Type::BitVec(a), Type::BitVec(b)]) if a == b => {
                |name, args| descriptor(name, args, args[0], eval_bvxor, smt_bvxor)
            }
            ("bvnot", [Type::BitVec(_)]) => {
                |name, args| descriptor(name, args, args[0], eval_bvnot, smt_bvnot)
            }
            ("bvneg", [Type::BitVec(_)]) => {
                |name, args| descriptor(name, args, args[0], eval_bvneg, smt_bvneg)
            }
            ("bvshl", [Type::BitVec(a), Type::BitVec(b)]) if a == b => {
                |name, args| descriptor(name, args, args[0], eval_bvshl, smt_bvshl)
            }
            ("bvlshr", [Type::BitVec(a), Type::BitVec(b)]) if a == b => {
                |name, args| descriptor(name, args, args[0], eval_bvlshr, smt_bvlshr)
            }
            ("bvule", [Type::BitVec(a), Type::BitVec(b)]) if a == b => {
                |name, args| descriptor(name, args, Type::Bool, eval_bvule, smt_bvule)
            }
            ("bvult", [Type::BitVec(a), Type::BitVec(b)]) if a == b => {
                |name, args| descriptor(name, args, Type::Bool, eval_bvult, smt_bvult)
            }
            _ => return None,
        };
        Some(cached(&self.cache, name, arg_types, || {
            build(name, arg_types)
        }))
    }
}

fn bv_args(args: &[Value], op: &'static str) -> Result<(u64, u64, u32), EvalError> {
    match args {
        [Value::BitVec { bits: a, width: wa }, Value::BitVec { bits: b, width: wb }]
            if wa == wb =>
        {
            Ok((*a, *b, *wa))
        }
        _ => Err(EvalError::TypeMismatch(op)),
    }
}

fn bv_arg(args: &[Value], op: &'static str) -> Result<(u64, u32), EvalError> {
    match args {
        [Value::BitVec { bits, width }] => Ok((*bits, *width)),
        _ => Err(EvalError::TypeMismatch(op)),
    }
}

fn eval_bvadd(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b, width) = bv_args(args, "bvadd")?;
    Ok(Value::bit_vec(a.wrapping_add(b), width))
}

fn eval_bvsub(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b, width) = bv_args(args, "bvsub")?;
    Ok(Value::bit_vec(a.wrapping_sub(b), width))
}

fn eval_bvand(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b, width) = bv_args(args, "bvand")?;
    Ok(Value::bit_vec(a & b, width))
}

fn eval_bvor(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b, width) = bv_args(args, "bvor")?;
    Ok(Value::bit_vec(a | b, width))
}

fn eval_bvxor(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b, width) = bv_args(args, "bvxor")?;
    Ok(Value::bit_vec(a ^ b, width))
}

fn eval_bvnot(args: &[Value]) -> Result<Value, EvalError> {
    let (a, width) = bv_arg(args, "bvnot")?;
    Ok(Value::bit_vec(!a, width))
}

fn eval_bvneg(args: &[Value]) -> Result<Value, EvalError> {
    let (a, width) = bv_arg(args, "bvneg")?;
    Ok(Value::bit_vec(a.wrapping_neg(), width))
}

fn eval_bvshl(args: &[Value]) -> Result<Value, EvalError> {
    let (a, shift, width) = bv_args(args, "bvshl")?;
    let shifted = if shift >= u64::from(width) { 0 } else { a << shift };
    Ok(Value::bit_vec(shifted, width))
}

fn eval_bvlshr(args: &[Value]) -> Result<Value, EvalError> {
    let (a, shift, width) = bv_args(args, "bvlshr")?;
    let shifted = if shift >= u64::from(width) {
        0
    } else {
        (a & mask(width)) >> shift
    };
    Ok(Value::bit_vec(shifted, width))
}

fn eval_bvule(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b, _) = bv_args(args, "bvule")?;
    Ok(Value::Bool(a <= b))
}

fn eval_bvult(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b, _) = bv_args(args, "bvult")?;
    Ok(Value::Bool(a < b))
}

fn smt_bvadd(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].add(&args[1])
}

fn smt_bvsub(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].sub(&args[1])
}

fn smt_bvand(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].and(&args[1])
}

fn smt_bvor(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].or(&args[1])
}

fn smt_bvxor(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].xor(&args[1])
}

fn smt_bvnot(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].not()
}

fn smt_bvneg(smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    smt.zero(args[0].width()).sub(&args[0])
}

fn smt_bvshl(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].sll(&args[1])
}

fn smt_bvlshr(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].srl(&args[1])
}

fn smt_bvule(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].ulte(&args[1])
}

fn smt_bvult(_smt: &SmtContext, args: &[SmtTerm]) -> SmtTerm {
    args[0].ult(&args[1])
}

#[cfg(test)]
mod test {
    use super::{BvInstantiator, FunctionInstantiator};
    use crate::{
        exprs::FunctionKind,
        types::{Type, Value},
    };

    fn eval(name: &str, args: &[Value]) -> Value {
        let bv = BvInstantiator::new();
        let arg_types: Vec<_> = args.iter().map(Value::ty).collect();
        let op = bv.instantiate(name, &arg_types).unwrap();
        let FunctionKind::Interpreted { evaluate, .. } = &op.kind else {
            panic!("bv ops are interpreted");
        };
        evaluate(args).unwrap()
    }

    #[test]
    fn test_wrapping_arithmetic() {
        let a = Value::bit_vec(0xff, 8);
        let b = Value::bit_vec(0x02, 8);
        assert_eq!(eval("bvadd", &[a, b]), Value::bit_vec(0x01, 8));
        assert_eq!(eval("bvsub", &[b, a]), Value::bit_vec(0x03, 8));
        assert_eq!(eval("bvneg", &[b]), Value::bit_vec(0xfe, 8));
    }

    #[test]
    fn test_bitwise() {
        let a = Value::bit_vec(0b1100, 4);
        let b = Value::bit_vec(0b1010, 4);
        assert_eq!(eval("bvand", &[a, b]), Value::bit_vec(0b1000, 4));
        assert_eq!(eval("bvor", &[a, b]), Value::bit_vec(0b1110, 4));
        assert_eq!(eval("bvxor", &[a, b]), Value::bit_vec(0b0110, 4));
        assert_eq!(eval("bvnot", &[a]), Value::bit_vec(0b0011, 4));
    }

    #[test]
    fn test_shifts_saturate_at_width() {
        let a = Value::bit_vec(0b0110, 4);
        assert_eq!(
            eval("bvshl", &[a, Value::bit_vec(1, 4)]),
            Value::bit_vec(0b1100, 4)
        );
        assert_eq!(
            eval("bvlshr", &[a, Value::bit_vec(2, 4)]),
            Value::bit_vec(0b0001, 4)
        );
        assert_eq!(
            eval("bvshl", &[a, Value::bit_vec(5, 4)]),
            Value::bit_vec(0, 4)
        );
    }

    #[test]
    fn test_mixed_widths_are_rejected() {
        let bv = BvInstantiator::new();
        assert!(bv
            .instantiate("bvadd", &[Type::BitVec(8), Type::BitVec(16)])
            .is_none());
    }
}
