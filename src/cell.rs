//! Lazy value cells - the dependency-tracked computation graph.
//!
//! A [`Cell`] is either a *literal* (a value stored directly) or a *derived*
//! node (a formula over other cells). Reads are memoized; `set` rewires the
//! node and transitively invalidates everything that ever read through it.
//! Invalidation is lazy: cleared cells do not recompute until the next read.
//!
//! A cell with neither a value nor a formula reads as `None`. That is the
//! normal state of geometry before a renderer has resolved the block tree,
//! so the arithmetic combinators propagate absence instead of failing.
//!
//! Cycles in the graph are malformed by construction but detected anyway:
//! re-entering a cell mid-evaluation yields [`Error::CyclicDependency`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::{Error, Result};

// =============================================================================
// Value
// =============================================================================

/// A value held by a cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Num(f64),
    Bool(bool),
    Str(Rc<str>),
}

impl Value {
    /// Numeric view; non-numeric values read as absent.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<Rc<str>> {
        match self {
            Value::Str(s) => Some(Rc::clone(s)),
            _ => None,
        }
    }

    /// Truthiness for the boolean combinators: `false`, `0`, and the empty
    /// string are false, everything else is true.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Num(n) => *n != 0.0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Num(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s.as_str()))
    }
}

// =============================================================================
// Cell
// =============================================================================

/// Formula body: pure function over the already-evaluated argument values.
pub type CellFn = Rc<dyn Fn(&[Option<Value>]) -> Option<Value>>;

struct Formula {
    func: CellFn,
    args: Vec<Cell>,
}

struct CellInner {
    /// Diagnostic label, usually the owning property name.
    name: &'static str,
    value: Option<Value>,
    formula: Option<Formula>,
    /// Cells whose cached value was computed through this one.
    used_by: Vec<Weak<RefCell<CellInner>>>,
    /// Re-entrancy marker for cycle detection.
    evaluating: bool,
}

/// A memoized computation node. Cheap to clone; clones share the node.
#[derive(Clone)]
pub struct Cell {
    inner: Rc<RefCell<CellInner>>,
}

impl Cell {
    fn new(name: &'static str, value: Option<Value>, formula: Option<Formula>) -> Self {
        let cell = Cell {
            inner: Rc::new(RefCell::new(CellInner {
                name,
                value,
                formula: None,
                used_by: Vec::new(),
                evaluating: false,
            })),
        };
        if let Some(formula) = formula {
            cell.install_formula(formula.func, formula.args);
        }
        cell
    }

    /// A cell with neither value nor formula; reads as `None`.
    pub fn empty(name: &'static str) -> Self {
        Self::new(name, None, None)
    }

    /// A literal cell.
    pub fn literal(name: &'static str, value: impl Into<Value>) -> Self {
        Self::new(name, Some(value.into()), None)
    }

    /// A derived cell computing `func` over `args` on demand.
    pub fn derived(
        name: &'static str,
        func: impl Fn(&[Option<Value>]) -> Option<Value> + 'static,
        args: Vec<Cell>,
    ) -> Self {
        Self::new(
            name,
            None,
            Some(Formula {
                func: Rc::new(func),
                args,
            }),
        )
    }

    /// Diagnostic label.
    pub fn name(&self) -> &'static str {
        self.inner.borrow().name
    }

    /// Whether the cell can produce a value at all (literal set or formula
    /// attached). Geometry cells exist before resolution but read as `None`;
    /// this distinguishes "declared" from "never touched".
    pub fn exists(&self) -> bool {
        let inner = self.inner.borrow();
        inner.value.is_some() || inner.formula.is_some()
    }

    /// Whether two handles refer to the same node.
    pub fn same(&self, other: &Cell) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Cached value, computing (and caching) through the formula if needed.
    ///
    /// `Ok(None)` means absent - a declared-but-unresolved cell. `Err` only
    /// occurs for a malformed graph (a cell depending on itself).
    pub fn get(&self) -> Result<Option<Value>> {
        let (func, args) = {
            let inner = self.inner.borrow();
            if inner.evaluating {
                return Err(Error::CyclicDependency(inner.name.to_owned()));
            }
            if inner.value.is_some() {
                return Ok(inner.value.clone());
            }
            let Some(formula) = inner.formula.as_ref() else {
                return Ok(None);
            };
            (Rc::clone(&formula.func), formula.args.clone())
        };

        self.inner.borrow_mut().evaluating = true;
        let computed = Self::eval(&func, &args);
        self.inner.borrow_mut().evaluating = false;

        let value = computed?;
        self.inner.borrow_mut().value = value.clone();
        Ok(value)
    }

    fn eval(func: &CellFn, args: &[Cell]) -> Result<Option<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(arg.get()?);
        }
        Ok(func(&values))
    }

    /// Numeric read; non-numeric values count as absent.
    pub fn get_num(&self) -> Result<Option<f64>> {
        Ok(self.get()?.and_then(|v| v.as_num()))
    }

    pub fn get_str(&self) -> Result<Option<Rc<str>>> {
        Ok(self.get()?.and_then(|v| v.as_str()))
    }

    /// Integer read, rounding; used for level numbers.
    pub fn get_level(&self) -> Result<Option<i64>> {
        Ok(self.get_num()?.map(|n| n.round() as i64))
    }

    /// Value, or `default` if absent.
    pub fn get_or(&self, default: impl Into<Value>) -> Result<Value> {
        Ok(self.get()?.unwrap_or_else(|| default.into()))
    }

    /// Numeric value, or `default` if absent.
    pub fn num_or(&self, default: f64) -> Result<f64> {
        Ok(self.get_num()?.unwrap_or(default))
    }

    /// Value, or [`Error::MissingValue`] naming this cell.
    pub fn require(&self) -> Result<Value> {
        self.get()?
            .ok_or_else(|| Error::MissingValue(self.name().to_owned()))
    }

    /// Numeric value, or [`Error::MissingValue`].
    pub fn require_num(&self) -> Result<f64> {
        self.require()?
            .as_num()
            .ok_or_else(|| Error::MissingValue(self.name().to_owned()))
    }

    /// Non-negative numeric value, or an error.
    pub fn require_nonnegative(&self) -> Result<f64> {
        let value = self.require_num()?;
        if value < 0.0 {
            return Err(Error::NegativeValue {
                name: self.name().to_owned(),
                value,
            });
        }
        Ok(value)
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Store a literal, dropping any formula and invalidating dependents.
    pub fn set_value(&self, value: impl Into<Value>) {
        self.invalidate();
        self.detach_args();
        self.inner.borrow_mut().value = Some(value.into());
    }

    /// Alias this cell to `source`: its value becomes whatever `source`
    /// reads as, tracked through invalidation. A first-class edge, not a
    /// copy.
    pub fn set_cell(&self, source: &Cell) {
        self.invalidate();
        self.detach_args();
        self.install_formula(
            Rc::new(|values: &[Option<Value>]| values[0].clone()),
            vec![source.clone()],
        );
    }

    /// Replace the formula wholesale.
    pub fn set_formula(
        &self,
        func: impl Fn(&[Option<Value>]) -> Option<Value> + 'static,
        args: Vec<Cell>,
    ) {
        self.invalidate();
        self.detach_args();
        self.install_formula(Rc::new(func), args);
    }

    /// Drop both value and formula, returning the cell to the empty state
    /// and invalidating dependents. Used when resolution state is discarded.
    pub(crate) fn clear(&self) {
        self.invalidate();
        self.detach_args();
    }

    /// Clear the cache here and in every cell that read through this one.
    /// Lazy: nothing recomputes until the next `get`.
    pub fn invalidate(&self) {
        let dependents = {
            let mut inner = self.inner.borrow_mut();
            if inner.value.is_none() {
                return; // already invalidated
            }
            tracing::trace!(cell = inner.name, "invalidate");
            inner.value = None;
            inner.used_by.clone()
        };
        for dependent in dependents {
            if let Some(inner) = dependent.upgrade() {
                Cell { inner }.invalidate();
            }
        }
    }

    fn install_formula(&self, func: CellFn, args: Vec<Cell>) {
        for arg in &args {
            arg.add_dependent(self);
        }
        let mut inner = self.inner.borrow_mut();
        inner.formula = Some(Formula { func, args });
    }

    fn detach_args(&self) {
        let formula = self.inner.borrow_mut().formula.take();
        if let Some(formula) = formula {
            for arg in &formula.args {
                arg.remove_dependent(self);
            }
        }
    }

    fn add_dependent(&self, dependent: &Cell) {
        self.inner
            .borrow_mut()
            .used_by
            .push(Rc::downgrade(&dependent.inner));
    }

    fn remove_dependent(&self, dependent: &Cell) {
        let target = Rc::as_ptr(&dependent.inner);
        self.inner
            .borrow_mut()
            .used_by
            .retain(|weak| weak.as_ptr() != target && weak.strong_count() > 0);
    }

    // =========================================================================
    // Combinators
    // =========================================================================

    fn binary(
        &self,
        name: &'static str,
        other: impl Into<Cell>,
        f: impl Fn(f64, f64) -> f64 + 'static,
    ) -> Cell {
        Cell::derived(
            name,
            move |values| match (num(&values[0]), num(&values[1])) {
                (Some(a), Some(b)) => Some(Value::Num(f(a, b))),
                _ => None,
            },
            vec![self.clone(), other.into()],
        )
    }

    pub fn add(&self, other: impl Into<Cell>) -> Cell {
        self.binary("add", other, |a, b| a + b)
    }

    pub fn sub(&self, other: impl Into<Cell>) -> Cell {
        self.binary("sub", other, |a, b| a - b)
    }

    pub fn mul(&self, other: impl Into<Cell>) -> Cell {
        self.binary("mul", other, |a, b| a * b)
    }

    pub fn div(&self, other: impl Into<Cell>) -> Cell {
        self.binary("div", other, |a, b| a / b)
    }

    /// Robust minimum: an absent operand yields the other one. Transform's
    /// aspect-ratio rule relies on this when only one dimension is given.
    pub fn min(&self, other: impl Into<Cell>) -> Cell {
        Cell::derived(
            "min",
            |values| robust(&values[0], &values[1], f64::min),
            vec![self.clone(), other.into()],
        )
    }

    /// Robust maximum; see [`Cell::min`].
    pub fn max(&self, other: impl Into<Cell>) -> Cell {
        Cell::derived(
            "max",
            |values| robust(&values[0], &values[1], f64::max),
            vec![self.clone(), other.into()],
        )
    }

    pub fn and(&self, other: impl Into<Cell>) -> Cell {
        Cell::derived(
            "and",
            |values| match &values[0] {
                Some(a) if a.truthy() => values[1].clone(),
                other => other.clone(),
            },
            vec![self.clone(), other.into()],
        )
    }

    pub fn or(&self, other: impl Into<Cell>) -> Cell {
        Cell::derived(
            "or",
            |values| match &values[0] {
                Some(a) if a.truthy() => Some(a.clone()),
                _ => values[1].clone(),
            },
            vec![self.clone(), other.into()],
        )
    }

    pub fn not(&self) -> Cell {
        Cell::derived(
            "not",
            |values| Some(Value::Bool(!values[0].as_ref().is_some_and(Value::truthy))),
            vec![self.clone()],
        )
    }

    /// Ternary over truthiness of `self`.
    pub fn cond(&self, then: impl Into<Cell>, otherwise: impl Into<Cell>) -> Cell {
        Cell::derived(
            "cond",
            |values| {
                if values[0].as_ref().is_some_and(Value::truthy) {
                    values[1].clone()
                } else {
                    values[2].clone()
                }
            },
            vec![self.clone(), then.into(), otherwise.into()],
        )
    }

    /// First present of the two.
    pub fn or_else(&self, other: impl Into<Cell>) -> Cell {
        Cell::derived(
            "or_else",
            |values| values[0].clone().or_else(|| values[1].clone()),
            vec![self.clone(), other.into()],
        )
    }

    /// `other` if `self` is present, absent otherwise. Gates a formula on
    /// the availability of a controlling value.
    pub fn and_then(&self, other: impl Into<Cell>) -> Cell {
        Cell::derived(
            "and_then",
            |values| values[0].as_ref().and(values[1].clone()),
            vec![self.clone(), other.into()],
        )
    }

    /// Absent-propagating map by a pure function.
    pub fn apply(
        &self,
        name: &'static str,
        f: impl Fn(Value) -> Option<Value> + 'static,
    ) -> Cell {
        Cell::derived(
            name,
            move |values| values[0].clone().and_then(&f),
            vec![self.clone()],
        )
    }
}

impl From<&Cell> for Cell {
    fn from(cell: &Cell) -> Self {
        cell.clone()
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::literal("const", n)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::literal("const", n)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::literal("const", b)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::literal("const", s)
    }
}

impl From<Value> for Cell {
    fn from(v: Value) -> Self {
        Cell::literal("const", v)
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Cell")
            .field("name", &inner.name)
            .field("value", &inner.value)
            .field("derived", &inner.formula.is_some())
            .finish()
    }
}

/// Numeric view of an evaluated formula argument.
pub(crate) fn num(value: &Option<Value>) -> Option<f64> {
    value.as_ref().and_then(Value::as_num)
}

fn robust(a: &Option<Value>, b: &Option<Value>, f: impl Fn(f64, f64) -> f64) -> Option<Value> {
    match (num(a), num(b)) {
        (Some(a), Some(b)) => Some(Value::Num(f(a, b))),
        (Some(a), None) => Some(Value::Num(a)),
        (None, Some(b)) => Some(Value::Num(b)),
        (None, None) => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
