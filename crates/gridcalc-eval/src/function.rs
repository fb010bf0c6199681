//! The contract every built-in or host-supplied function satisfies.

use gridcalc_common::{CalcError, Value};
use gridcalc_parse::Locale;

bitflags::bitflags! {
    /// Describes properties of a function. Informational: the interpreter
    /// evaluates every function the same way.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct FnCaps: u8 {
        /// Same output for the same input, no side effects.
        const PURE         = 0b0000_0001;
        /// Folds any number of values, ranges included, into one.
        const REDUCTION    = 0b0000_0010;
        /// Only numeric input is meaningful.
        const NUMERIC_ONLY = 0b0000_0100;
    }
}

/// An evaluated argument.
///
/// Range arguments arrive materialised row-major with obscured merge
/// positions left out. Neither variant ever holds an error: errors are
/// propagated by the interpreter before the function runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    Range(Vec<Vec<Value>>),
}

impl Arg {
    pub fn is_range(&self) -> bool {
        matches!(self, Arg::Range(_))
    }

    /// Every value, row-major.
    pub fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Arg::Value(v) => Box::new(std::iter::once(v)),
            Arg::Range(rows) => Box::new(rows.iter().flatten()),
        }
    }

    /// The single value of a scalar argument or a one-cell range.
    pub fn scalar(&self) -> Result<&Value, CalcError> {
        match self {
            Arg::Value(v) => Ok(v),
            Arg::Range(rows) => match rows.as_slice() {
                [row] if row.len() == 1 => Ok(&row[0]),
                [] => Ok(&EMPTY),
                _ => Err(CalcError::arg_type(
                    "a multi-cell range was given where a single value is expected",
                )),
            },
        }
    }
}

static EMPTY: Value = Value::Empty;

/// What a function may learn about the call site.
#[derive(Debug, Clone, Copy)]
pub struct FunctionContext {
    pub locale: Locale,
}

impl Default for FunctionContext {
    fn default() -> Self {
        Self {
            locale: Locale::invariant(),
        }
    }
}

/// A named spreadsheet function.
///
/// Lookup is by exact (case-sensitive) name. The interpreter checks the
/// argument count against [`min_args`](Function::min_args) and
/// [`max_args`](Function::max_args) before calling
/// [`eval`](Function::eval), so implementations may index arguments freely
/// up to `min_args`.
pub trait Function: Send + Sync + 'static {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE
    }

    fn name(&self) -> &'static str;

    fn min_args(&self) -> usize {
        0
    }

    fn variadic(&self) -> bool {
        false
    }

    /// Upper bound on arguments; `None` for variadic functions.
    fn max_args(&self) -> Option<usize> {
        if self.variadic() {
            None
        } else {
            Some(self.min_args())
        }
    }

    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError>;
}
