//! AST walker.
//!
//! The interpreter is pure with respect to the grid: it only reads values
//! through an [`EvaluationContext`] and returns the value the cell should
//! store. Whether a referenced cell is up to date is the scheduler's
//! business, never the interpreter's.

use std::cell::Cell;
use std::cmp::Ordering;
use std::sync::Arc;

use gridcalc_common::{CalcError, Rect, SheetId, Value};
use gridcalc_parse::{ASTNode, ASTNodeType, Locale, ReferenceType};

use crate::coercion::{sanitize_numeric, to_number, to_text};
use crate::function::{Arg, Function, FunctionContext};
use crate::function_registry;
use crate::reference::{CellKey, RefTarget, Reference};

/// Read access to a workbook for the interpreter.
pub trait EvaluationContext {
    fn locale(&self) -> Locale {
        Locale::invariant()
    }

    /// Resolves a parsed reference for a formula on `current`.
    fn resolve(&self, reference: &ReferenceType, current: SheetId) -> Reference;

    fn sheet_name(&self, sheet: SheetId) -> Option<&str>;

    /// Stored value at `key`; [`Value::Empty`] for unmaterialised cells.
    fn cell_value(&self, key: CellKey) -> Value;

    /// True for positions inside a merged region other than its anchor.
    fn is_obscured(&self, _key: CellKey) -> bool {
        false
    }

    fn get_function(&self, name: &str) -> Option<Arc<dyn Function>> {
        function_registry::get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalState {
    Idle,
    Evaluating,
    Done,
    Error,
}

pub struct Interpreter<'a> {
    pub context: &'a dyn EvaluationContext,
    current_sheet: Cell<SheetId>,
    state: Cell<EvalState>,
}

impl<'a> Interpreter<'a> {
    pub fn new(context: &'a dyn EvaluationContext, current_sheet: SheetId) -> Self {
        Self {
            context,
            current_sheet: Cell::new(current_sheet),
            state: Cell::new(EvalState::Idle),
        }
    }

    /// Sheet that unqualified references resolve against.
    pub fn current_sheet(&self) -> SheetId {
        self.current_sheet.get()
    }

    pub fn state(&self) -> EvalState {
        self.state.get()
    }

    /// Evaluates `node` into the value a cell stores. Errors become
    /// [`Value::Error`].
    pub fn evaluate(&self, node: &ASTNode) -> Value {
        self.state.set(EvalState::Evaluating);
        let value = self.evaluate_ast(node).unwrap_or_else(Value::Error);
        self.state.set(if value.is_error() {
            EvalState::Error
        } else {
            EvalState::Done
        });
        value
    }

    /// Evaluates `node` as if it lived on `sheet`, restoring the current
    /// sheet afterwards. Safe to call while another evaluation is running.
    pub fn evaluate_in_sheet(&self, sheet: SheetId, node: &ASTNode) -> Value {
        let saved_sheet = self.current_sheet.replace(sheet);
        let saved_state = self.state.get();
        let value = self.evaluate(node);
        self.current_sheet.set(saved_sheet);
        if saved_state == EvalState::Evaluating {
            self.state.set(saved_state);
        }
        value
    }

    /// Scalar evaluation; any error short-circuits as `Err`.
    pub fn evaluate_ast(&self, node: &ASTNode) -> Result<Value, CalcError> {
        match &node.node_type {
            ASTNodeType::Literal(Value::Error(e)) => Err(e.clone()),
            ASTNodeType::Literal(v) => Ok(v.clone()),
            ASTNodeType::Reference {
                original,
                reference,
            } => self.eval_reference(original, reference),
            ASTNodeType::UnaryOp { op, expr } => self.eval_unary(op, expr),
            ASTNodeType::BinaryOp { op, left, right } => self.eval_binary(op, left, right),
            ASTNodeType::Function { name, args } => self.eval_function(name, args),
        }
    }

    fn locale(&self) -> Locale {
        self.context.locale()
    }

    fn resolve(&self, original: &str, reference: &ReferenceType) -> Result<(SheetId, RefTarget), CalcError> {
        let resolved = self.context.resolve(reference, self.current_sheet());
        match resolved.area() {
            Some((sheet, _)) => Ok((sheet, resolved.target)),
            None => Err(resolved.to_error(original)),
        }
    }

    /* ===================  references  =================== */

    fn eval_reference(&self, original: &str, reference: &ReferenceType) -> Result<Value, CalcError> {
        match self.resolve(original, reference)? {
            (sheet, RefTarget::Point(a)) => self.read_point(CellKey::new(sheet, a.col, a.row)),
            (sheet, RefTarget::Range(rect)) if rect.is_single_cell() => {
                self.read_point(CellKey::new(sheet, rect.col1, rect.row1))
            }
            (_, RefTarget::Range(_)) => Err(CalcError::arg_type(format!(
                "range {original} used where a single value is expected"
            ))),
        }
    }

    fn read_point(&self, key: CellKey) -> Result<Value, CalcError> {
        if self.context.is_obscured(key) {
            return Ok(Value::Number(0.0));
        }
        match self.context.cell_value(key) {
            Value::Error(e) => Err(self.propagate(&e, key)),
            v => Ok(v),
        }
    }

    /// Row-major values of `rect`, obscured positions skipped.
    fn read_range(&self, sheet: SheetId, rect: Rect) -> Result<Vec<Vec<Value>>, CalcError> {
        let mut rows = Vec::with_capacity(rect.height() as usize);
        for row in rect.row1..=rect.row2 {
            let mut values = Vec::with_capacity(rect.width() as usize);
            for col in rect.col1..=rect.col2 {
                let key = CellKey::new(sheet, col, row);
                if self.context.is_obscured(key) {
                    continue;
                }
                match self.context.cell_value(key) {
                    Value::Error(e) => return Err(self.propagate(&e, key)),
                    v => values.push(v),
                }
            }
            if !values.is_empty() {
                rows.push(values);
            }
        }
        Ok(rows)
    }

    fn propagate(&self, err: &CalcError, key: CellKey) -> CalcError {
        err.propagated(self.context.sheet_name(key.sheet), key.col, key.row)
    }

    /* ===================  operators  =================== */

    fn eval_unary(&self, op: &str, expr: &ASTNode) -> Result<Value, CalcError> {
        let v = self.evaluate_ast(expr)?;
        let n = to_number(&v, &self.locale())?;
        let result = match op {
            "-" => -n,
            "+" => n,
            "%" => n / 100.0,
            _ => return Err(CalcError::syntax(format!("unknown unary operator '{op}'"))),
        };
        Ok(Value::Number(sanitize_numeric(result)?))
    }

    fn eval_binary(&self, op: &str, left: &ASTNode, right: &ASTNode) -> Result<Value, CalcError> {
        let l = self.evaluate_ast(left)?;
        let r = self.evaluate_ast(right)?;

        match op {
            "+" => self.numeric_binary(&l, &r, |a, b| Ok(a + b)),
            "-" => self.numeric_binary(&l, &r, |a, b| Ok(a - b)),
            "*" => self.numeric_binary(&l, &r, |a, b| Ok(a * b)),
            "/" => self.numeric_binary(&l, &r, divide),
            "^" => self.numeric_binary(&l, &r, power),
            "&" => {
                let locale = self.locale();
                Ok(Value::Text(format!(
                    "{}{}",
                    to_text(&l, &locale)?,
                    to_text(&r, &locale)?
                )))
            }
            "=" | "<>" | "<" | ">" | "<=" | ">=" => {
                let ord = compare_values(&l, &r);
                let result = match op {
                    "=" => ord == Ordering::Equal,
                    "<>" => ord != Ordering::Equal,
                    "<" => ord == Ordering::Less,
                    ">" => ord == Ordering::Greater,
                    "<=" => ord != Ordering::Greater,
                    _ => ord != Ordering::Less,
                };
                Ok(Value::Boolean(result))
            }
            _ => Err(CalcError::syntax(format!("unknown operator '{op}'"))),
        }
    }

    fn numeric_binary<F>(&self, l: &Value, r: &Value, f: F) -> Result<Value, CalcError>
    where
        F: Fn(f64, f64) -> Result<f64, CalcError>,
    {
        let locale = self.locale();
        let a = to_number(l, &locale)?;
        let b = to_number(r, &locale)?;
        Ok(Value::Number(sanitize_numeric(f(a, b)?)?))
    }

    /* ===================  functions  =================== */

    fn eval_function(&self, name: &str, args: &[ASTNode]) -> Result<Value, CalcError> {
        let Some(func) = self.context.get_function(name) else {
            return Err(CalcError::unknown_function(name));
        };

        let got = args.len();
        let min = func.min_args();
        let max = func.max_args();
        if got < min || max.is_some_and(|m| got > m) {
            let expected = match max {
                Some(m) if m == min => format!("{min}"),
                Some(m) => format!("{min} to {m}"),
                None => format!("at least {min}"),
            };
            return Err(CalcError::arg_count(name, &expected, got));
        }

        let evaluated = args
            .iter()
            .map(|a| self.eval_arg(a))
            .collect::<Result<Vec<_>, _>>()?;

        let ctx = FunctionContext {
            locale: self.locale(),
        };
        match func.eval(&evaluated, &ctx)? {
            Value::Error(e) => Err(e),
            Value::Number(n) => Ok(Value::Number(sanitize_numeric(n)?)),
            other => Ok(other),
        }
    }

    /// Ranges stay ranges when passed to a function.
    fn eval_arg(&self, node: &ASTNode) -> Result<Arg, CalcError> {
        if let ASTNodeType::Reference {
            original,
            reference,
        } = &node.node_type
        {
            if let (sheet, RefTarget::Range(rect)) = self.resolve(original, reference)? {
                return Ok(Arg::Range(self.read_range(sheet, rect)?));
            }
        }
        Ok(Arg::Value(self.evaluate_ast(node)?))
    }
}

pub(crate) fn divide(a: f64, b: f64) -> Result<f64, CalcError> {
    if b == 0.0 {
        Err(CalcError::domain("division by zero"))
    } else {
        Ok(a / b)
    }
}

pub(crate) fn power(base: f64, exp: f64) -> Result<f64, CalcError> {
    if base == 0.0 && exp < 0.0 {
        return Err(CalcError::domain("zero raised to a negative power"));
    }
    let result = base.powf(exp);
    if result.is_nan() {
        return Err(CalcError::domain(format!("{base}^{exp} is undefined")));
    }
    Ok(result)
}

fn rank(v: &Value) -> u8 {
    match v {
        Value::Empty | Value::Number(_) | Value::Date(_) | Value::Time(_) | Value::Error(_) => 0,
        Value::Text(_) => 1,
        Value::Boolean(_) => 2,
    }
}

/// Total order used by comparison operators: numbers sort before text,
/// text before booleans. Text compares by code point, case-sensitively.
/// An empty operand takes the zero value of the other side's type.
pub fn compare_values(l: &Value, r: &Value) -> Ordering {
    use Value::*;
    match (l, r) {
        (Empty, Empty) => Ordering::Equal,
        (Empty, Text(s)) => "".cmp(s.as_str()),
        (Text(s), Empty) => s.as_str().cmp(""),
        (Empty, Boolean(b)) => false.cmp(b),
        (Boolean(b), Empty) => b.cmp(&false),
        (Text(a), Text(b)) => a.cmp(b),
        (Boolean(a), Boolean(b)) => a.cmp(b),
        _ => match rank(l).cmp(&rank(r)) {
            Ordering::Equal => {
                let a = l.as_serial_number().unwrap_or(0.0);
                let b = r.as_serial_number().unwrap_or(0.0);
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            other => other,
        },
    }
}
