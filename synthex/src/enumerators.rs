//! Grammar-shaped, size-indexed lazy enumeration of candidate expressions.
//!
//! A [`Generator`] yields every expression of exactly the size set through
//! [`Generator::set_size`]. Composition clones nodes so no two occurrences
//! of a sub-grammar share mutable size state; recursion goes through
//! placeholders resolved lazily against a [`GeneratorFactory`] and is broken
//! by size accounting (an application of arity `k` needs at least `k + 1`
//! size).

use std::{cell::RefCell, rc::Rc};

use hashbrown::{HashMap, HashSet};
use tracing::trace;

use crate::{
    exprs::{Expr, ExprRef, FunctionInfo},
    Result, SynthError,
};

/// Optional filter applied to every expression a node yields.
pub type Validator = Rc<dyn Fn(&Expr) -> bool>;

#[derive(Clone)]
pub enum Generator {
    Leaf(LeafGen),
    Func(FuncGen),
    Alt(AltGen),
    Placeholder(PlaceholderGen),
}

#[derive(Clone)]
pub struct LeafGen {
    leaves: Vec<ExprRef>,
    allowed_size: usize,
    validator: Option<Validator>,
}

#[derive(Clone)]
pub struct FuncGen {
    op: Rc<FunctionInfo>,
    children: Vec<Generator>,
    allowed_size: usize,
    validator: Option<Validator>,
}

#[derive(Clone)]
pub struct AltGen {
    children: Vec<Generator>,
}

#[derive(Clone)]
pub struct PlaceholderGen {
    factory: GeneratorFactory,
    identifier: String,
    instance: Option<Box<Generator>>,
}

impl Generator {
    /// A multiset of pre-built leaves, yielded exactly at size one.
    #[must_use]
    pub fn leaf(leaves: Vec<ExprRef>) -> Self {
        Generator::Leaf(LeafGen {
            leaves,
            allowed_size: 0,
            validator: None,
        })
    }

    /// Applications of `op` over the child grammars.
    ///
    /// # Panics
    ///
    /// Panics when the child count does not match the operator arity or the
    /// arity is zero.
    #[must_use]
    pub fn func(op: Rc<FunctionInfo>, children: Vec<Generator>) -> Self {
        assert!(!children.is_empty());
        assert_eq!(op.arity(), children.len());
        Generator::Func(FuncGen {
            op,
            children,
            allowed_size: 0,
            validator: None,
        })
    }

    /// Concatenation of the child streams, in declared order.
    ///
    /// # Panics
    ///
    /// Panics when fewer than two alternatives are supplied.
    #[must_use]
    pub fn alt(children: Vec<Generator>) -> Self {
        assert!(children.len() >= 2);
        Generator::Alt(AltGen { children })
    }

    /// Attach an object validator to this node; rejected expressions are
    /// skipped.
    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        match &mut self {
            Generator::Leaf(leaf) => leaf.validator = Some(validator),
            Generator::Func(func) => func.validator = Some(validator),
            Generator::Alt(_) | Generator::Placeholder(_) => {}
        }
        self
    }

    pub fn set_size(&mut self, size: usize) {
        match self {
            Generator::Leaf(leaf) => leaf.allowed_size = size,
            Generator::Func(func) => func.allowed_size = size,
            Generator::Alt(alt) => {
                for child in &mut alt.children {
                    child.set_size(size);
                }
            }
            Generator::Placeholder(ph) => {
                if size > 0 {
                    let mut instance = ph
                        .factory
                        .instantiate(&ph.identifier)
                        .unwrap_or_else(|| panic!("unresolved placeholder `{}`", ph.identifier));
                    instance.set_size(size);
                    ph.instance = Some(Box::new(instance));
                } else {
                    ph.instance = None;
                }
            }
        }
    }

    /// Yield every expression of exactly the current size.
    pub fn generate(&mut self) -> Box<dyn Iterator<Item = ExprRef> + '_> {
        match self {
            Generator::Leaf(leaf) => {
                if leaf.allowed_size != 1 {
                    return Box::new(std::iter::empty());
                }
                let validator = leaf.validator.clone();
                Box::new(leaf.leaves.iter().cloned().filter(move |leaf| {
                    validator.as_ref().map_or(true, |validate| validate(leaf))
                }))
            }
            Generator::Func(func) => {
                let arity = func.children.len();
                if func.allowed_size < arity + 1 {
                    return Box::new(std::iter::empty());
                }
                Box::new(FuncIter {
                    op: func.op.clone(),
                    children: &mut func.children,
                    validator: func.validator.clone(),
                    partitions: Compositions::new(func.allowed_size - 1, arity),
                    columns: Vec::new(),
                    index: 0,
                    total: 0,
                })
            }
            Generator::Alt(alt) => Box::new(alt.children.iter_mut().flat_map(Generator::generate)),
            Generator::Placeholder(ph) => match ph.instance.as_mut() {
                Some(instance) => instance.generate(),
                None => Box::new(std::iter::empty()),
            },
        }
    }
}

/// Walks the size partitions of a functional node, materializing each
/// child's stream per partition and yielding the Cartesian product as a
/// mixed-radix odometer with the first child varying fastest.
struct FuncIter<'a> {
    op: Rc<FunctionInfo>,
    children: &'a mut Vec<Generator>,
    validator: Option<Validator>,
    partitions: Compositions,
    columns: Vec<Vec<ExprRef>>,
    index: usize,
    total: usize,
}

impl Iterator for FuncIter<'_> {
    type Item = ExprRef;

    fn next(&mut self) -> Option<ExprRef> {
        loop {
            if self.index < self.total {
                let mut remainder = self.index;
                self.index += 1;
                let mut args = Vec::with_capacity(self.columns.len());
                for column in &self.columns {
                    args.push(column[remainder % column.len()].clone());
                    remainder /= column.len();
                }
                let expr = Expr::function_app(self.op.clone(), args);
                if self
                    .validator
                    .as_ref()
                    .map_or(true, |validate| validate(&expr))
                {
                    return Some(expr);
                }
                continue;
            }

            let partition = self.partitions.next()?;
            trace!(op = %self.op.name, ?partition, "descending into partition");
            self.columns.clear();
            for (child, size) in self.children.iter_mut().zip(&partition) {
                child.set_size(*size);
                self.columns.push(child.generate().collect());
            }
            if self.columns.iter().any(Vec::is_empty) {
                continue;
            }
            self.total = self.columns.iter().map(Vec::len).product();
            self.index = 0;
        }
    }
}

/// Ordered partitions of `total` into `parts` positive parts, in ascending
/// lexicographic order.
struct Compositions {
    total: usize,
    parts: usize,
    current: Vec<usize>,
    started: bool,
}

impl Compositions {
    fn new(total: usize, parts: usize) -> Self {
        Self {
            total,
            parts,
            current: Vec::new(),
            started: false,
        }
    }
}

impl Iterator for Compositions {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if !self.started {
            self.started = true;
            if self.parts == 0 || self.total < self.parts {
                return None;
            }
            self.current = vec![1; self.parts];
            self.current[self.parts - 1] = self.total - (self.parts - 1);
            return Some(self.current.clone());
        }

        // Find the rightmost position whose suffix still has slack, bump it
        // and reset the suffix to its minimal form.
        for i in (0..self.parts.saturating_sub(1)).rev() {
            let suffix_sum: usize = self.current[i + 1..].iter().sum();
            let suffix_len = self.parts - 1 - i;
            if suffix_sum > suffix_len {
                self.current[i] += 1;
                for j in i + 1..self.parts - 1 {
                    self.current[j] = 1;
                }
                self.current[self.parts - 1] = suffix_sum - 1 - (suffix_len - 1);
                return Some(self.current.clone());
            }
        }
        None
    }
}

/// Binds identifiers to prototype generators so grammars can reference
/// themselves (and each other). Placeholders clone the prototype afresh on
/// every `set_size` descent.
#[derive(Clone, Default)]
pub struct GeneratorFactory {
    inner: Rc<RefCell<FactoryInner>>,
}

#[derive(Default)]
struct FactoryInner {
    placeholders: HashSet<String>,
    templates: HashMap<String, Generator>,
}

impl GeneratorFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a placeholder for `identifier`. Registering the same identifier
    /// twice is an [`SynthError::Argument`] error.
    pub fn placeholder(&self, identifier: &str) -> Result<Generator> {
        let mut inner = self.inner.borrow_mut();
        if !inner.placeholders.insert(identifier.to_string()) {
            return Err(SynthError::Argument(format!(
                "placeholder identifier `{identifier}` already in use"
            )));
        }
        Ok(Generator::Placeholder(PlaceholderGen {
            factory: self.clone(),
            identifier: identifier.to_string(),
            instance: None,
        }))
    }

    /// Bind `identifier` to a prototype and return a placeholder referring
    /// to it.
    #[must_use]
    pub fn define(&self, identifier: &str, template: Generator) -> Generator {
        let mut inner = self.inner.borrow_mut();
        inner.placeholders.insert(identifier.to_string());
        inner.templates.insert(identifier.to_string(), template);
        Generator::Placeholder(PlaceholderGen {
            factory: self.clone(),
            identifier: identifier.to_string(),
            instance: None,
        })
    }

    fn instantiate(&self, identifier: &str) -> Option<Generator> {
        self.inner.borrow().templates.get(identifier).cloned()
    }
}
