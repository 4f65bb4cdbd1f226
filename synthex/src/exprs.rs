//! Immutable expression trees shared through `Rc`, plus the variable and
//! operator descriptors they reference.

use std::{cell::Cell, fmt, rc::Rc};

use crate::{
    eval::EvalError,
    smt::smt_boolector::{SmtContext, SmtTerm},
    types::{Type, Value},
};

/// Sentinel for a variable that has not been registered with an evaluation
/// offset yet.
pub const UNDEFINED_OFFSET: usize = usize::MAX;

/// A universally quantified variable of the specification.
///
/// `eval_offset` locates the variable in the valuation vector once it has
/// been registered with the synthesis context.
#[derive(Debug)]
pub struct VarInfo {
    pub name: String,
    pub ty: Type,
    pub eval_offset: Cell<usize>,
}

impl VarInfo {
    #[must_use]
    pub fn new(ty: Type, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ty,
            eval_offset: Cell::new(UNDEFINED_OFFSET),
        }
    }
}

/// Pointwise evaluation callback of an interpreted operator.
pub type EvaluateFn = fn(&[Value]) -> Result<Value, EvalError>;

/// SMT encoding callback of an interpreted operator.
pub type SmtEncodeFn = fn(&SmtContext, &[SmtTerm]) -> SmtTerm;

/// How applications of a function are given meaning.
#[derive(Debug, Clone)]
pub enum FunctionKind {
    /// An operator supplied by a semantics instantiator; opaque to the core
    /// except through its two callbacks.
    Interpreted {
        evaluate: EvaluateFn,
        smt_encode: SmtEncodeFn,
    },
    /// A synthesis function. `slot` indexes the interpretation map of the
    /// evaluation and SMT contexts.
    Unknown { slot: usize },
}

/// Descriptor of a (possibly unknown) function symbol.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    pub arg_types: Vec<Type>,
    pub range_type: Type,
    pub kind: FunctionKind,
}

impl FunctionInfo {
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arg_types.len()
    }
}

pub type ExprRef = Rc<Expr>;

/// An expression node. `expr_id` is an opaque cache key assigned by the
/// enumeration passes; it is `None` until `with_id` stamps it.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub expr_id: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Variable(Rc<VarInfo>),
    Constant(Value),
    /// Placeholder for the argument of a synthesis function at a given
    /// position.
    FormalParameter {
        fun: Rc<FunctionInfo>,
        ty: Type,
        position: usize,
    },
    FunctionApp {
        op: Rc<FunctionInfo>,
        children: Vec<ExprRef>,
    },
}

impl Expr {
    #[must_use]
    pub fn variable(info: Rc<VarInfo>) -> ExprRef {
        Rc::new(Expr {
            kind: ExprKind::Variable(info),
            expr_id: None,
        })
    }

    #[must_use]
    pub fn constant(value: Value) -> ExprRef {
        Rc::new(Expr {
            kind: ExprKind::Constant(value),
            expr_id: None,
        })
    }

    /// Placeholder for argument `position` of the synthesis function `fun`.
    ///
    /// # Panics
    ///
    /// Panics when `position` is out of range for the function.
    #[must_use]
    pub fn formal_parameter(fun: Rc<FunctionInfo>, position: usize) -> ExprRef {
        let ty = fun.arg_types[position];
        Rc::new(Expr {
            kind: ExprKind::FormalParameter { fun, ty, position },
            expr_id: None,
        })
    }

    #[must_use]
    pub fn function_app(op: Rc<FunctionInfo>, children: Vec<ExprRef>) -> ExprRef {
        debug_assert_eq!(op.arity(), children.len());
        Rc::new(Expr {
            kind: ExprKind::FunctionApp { op, children },
            expr_id: None,
        })
    }
}

/// Shallow copy of the root node carrying the given cache id. Sub-terms stay
/// shared; identical sub-terms only share ids after explicit rewriting.
#[must_use]
pub fn with_id(expr: &ExprRef, id: u64) -> ExprRef {
    Rc::new(Expr {
        kind: expr.kind.clone(),
        expr_id: Some(id),
    })
}

/// The type an expression evaluates to.
#[must_use]
pub fn expr_type(expr: &Expr) -> Type {
    match &expr.kind {
        ExprKind::Variable(info) => info.ty,
        ExprKind::Constant(value) => value.ty(),
        ExprKind::FormalParameter { ty, .. } => *ty,
        ExprKind::FunctionApp { op, .. } => op.range_type,
    }
}

/// Structural size: leaves count one, applications one plus their children.
#[must_use]
pub fn expression_size(expr: &Expr) -> usize {
    match &expr.kind {
        ExprKind::Variable(_) | ExprKind::Constant(_) | ExprKind::FormalParameter { .. } => 1,
        ExprKind::FunctionApp { children, .. } => {
            1 + children.iter().map(|c| expression_size(c)).sum::<usize>()
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Variable(info) => write!(f, "{}", info.name),
            ExprKind::Constant(value) => write!(f, "{value}"),
            ExprKind::FormalParameter { position, .. } => write!(f, "_arg_{position}"),
            ExprKind::FunctionApp { op, children } => {
                write!(f, "({}", op.name)?;
                for child in children {
                    write!(f, " {child}")?;
                }
                write!(f, ")")
            }
        }
    }
}
