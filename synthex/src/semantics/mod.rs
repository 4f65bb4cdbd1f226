//! Operator instantiators: map `(name, argument types)` to operator
//! descriptors carrying a concrete evaluator and an SMT encoder.
//!
//! Instantiators cache descriptors so repeated instantiation of the same
//! operator shares one descriptor; the core never relies on operator
//! equality beyond that identity.

use std::rc::Rc;

use crate::{
    exprs::{EvaluateFn, FunctionInfo, FunctionKind, SmtEncodeFn},
    types::Type,
};

pub mod bv;
pub mod core;
pub mod lia;

pub trait FunctionInstantiator {
    /// Resolve `name` for the given argument types, or `None` when this
    /// theory does not define it.
    fn instantiate(&self, name: &str, arg_types: &[Type]) -> Option<Rc<FunctionInfo>>;
}

pub(crate) fn descriptor(
    name: &str,
    arg_types: &[Type],
    range_type: Type,
    evaluate: EvaluateFn,
    smt_encode: SmtEncodeFn,
) -> Rc<FunctionInfo> {
    Rc::new(FunctionInfo {
        name: name.to_string(),
        arg_types: arg_types.to_vec(),
        range_type,
        kind: FunctionKind::Interpreted {
            evaluate,
            smt_encode,
        },
    })
}

/// Shared cache shape used by the concrete instantiators.
pub(crate) type DescriptorCache =
    std::cell::RefCell<hashbrown::HashMap<(String, Vec<Type>), Rc<FunctionInfo>>>;

pub(crate) fn cached<F>(
    cache: &DescriptorCache,
    name: &str,
    arg_types: &[Type],
    build: F,
) -> Rc<FunctionInfo>
where
    F: FnOnce() -> Rc<FunctionInfo>,
{
    let key = (name.to_string(), arg_types.to_vec());
    cache.borrow_mut().entry(key).or_insert_with(build).clone()
}
