use crate::coercion::to_bool;
use crate::function::{Arg, Function, FunctionContext};
use crate::func_caps;
use gridcalc_common::{CalcError, Value};

/* ─────────────────────────── TRUE() / FALSE() ───────────────── */

#[derive(Debug)]
pub struct TrueFn;

impl Function for TrueFn {
    func_caps!(PURE);

    fn name(&self) -> &'static str {
        "TRUE"
    }
    fn eval(&self, _args: &[Arg], _ctx: &FunctionContext) -> Result<Value, CalcError> {
        Ok(Value::Boolean(true))
    }
}

#[derive(Debug)]
pub struct FalseFn;

impl Function for FalseFn {
    func_caps!(PURE);

    fn name(&self) -> &'static str {
        "FALSE"
    }
    fn eval(&self, _args: &[Arg], _ctx: &FunctionContext) -> Result<Value, CalcError> {
        Ok(Value::Boolean(false))
    }
}

/* ─────────────────────────── AND() / OR() ───────────────────── */

/// Logical values an AND/OR call looks at. Empty values and text inside
/// ranges are skipped; scalar text must read as TRUE or FALSE.
fn logical_values(name: &str, args: &[Arg]) -> Result<Vec<bool>, CalcError> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Arg::Value(Value::Empty) => {}
            Arg::Value(v) => out.push(to_bool(v)?),
            Arg::Range(_) => {
                for v in arg.values() {
                    match v {
                        Value::Boolean(b) => out.push(*b),
                        Value::Number(n) | Value::Date(n) | Value::Time(n) => out.push(*n != 0.0),
                        _ => {}
                    }
                }
            }
        }
    }
    if out.is_empty() {
        return Err(CalcError::arg_type(format!("{name} found no logical values")));
    }
    Ok(out)
}

#[derive(Debug)]
pub struct AndFn;

impl Function for AndFn {
    func_caps!(PURE, REDUCTION);

    fn name(&self) -> &'static str {
        "AND"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(&self, args: &[Arg], _ctx: &FunctionContext) -> Result<Value, CalcError> {
        let values = logical_values("AND", args)?;
        Ok(Value::Boolean(values.into_iter().all(|b| b)))
    }
}

#[derive(Debug)]
pub struct OrFn;

impl Function for OrFn {
    func_caps!(PURE, REDUCTION);

    fn name(&self) -> &'static str {
        "OR"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(&self, args: &[Arg], _ctx: &FunctionContext) -> Result<Value, CalcError> {
        let values = logical_values("OR", args)?;
        Ok(Value::Boolean(values.into_iter().any(|b| b)))
    }
}

/* ─────────────────────────── NOT() ──────────────────────────── */

#[derive(Debug)]
pub struct NotFn;

impl Function for NotFn {
    func_caps!(PURE);

    fn name(&self) -> &'static str {
        "NOT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval(&self, args: &[Arg], _ctx: &FunctionContext) -> Result<Value, CalcError> {
        Ok(Value::Boolean(!to_bool(args[0].scalar()?)?))
    }
}

/* ─────────────────────────── IF() ───────────────────────────── */

/// `IF(condition, then, [else])`. Both branches have already been
/// evaluated by the time this runs; a missing else yields FALSE.
#[derive(Debug)]
pub struct IfFn;

impl Function for IfFn {
    func_caps!(PURE);

    fn name(&self) -> &'static str {
        "IF"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn max_args(&self) -> Option<usize> {
        Some(3)
    }
    fn eval(&self, args: &[Arg], _ctx: &FunctionContext) -> Result<Value, CalcError> {
        let cond = to_bool(args[0].scalar()?)?;
        if cond {
            args[1].scalar().cloned()
        } else {
            match args.get(2) {
                Some(arg) => arg.scalar().cloned(),
                None => Ok(Value::Boolean(false)),
            }
        }
    }
}

pub fn register_builtins() {
    crate::register_functions!(TrueFn, FalseFn, AndFn, OrFn, NotFn, IfFn);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_workbook::TestWorkbook;
    use gridcalc_common::ErrorKind;
    use std::sync::Arc;

    fn b(v: bool) -> Value {
        Value::Boolean(v)
    }

    #[test]
    fn constants() {
        let wb = TestWorkbook::new()
            .with_function(Arc::new(TrueFn))
            .with_function(Arc::new(FalseFn));
        assert_eq!(wb.eval("=TRUE()"), b(true));
        assert_eq!(wb.eval("=FALSE()"), b(false));
    }

    #[test]
    fn and_or_over_ranges() {
        let wb = TestWorkbook::new()
            .with_cell_a1("Sheet1", "A1", b(true))
            .with_cell_a1("Sheet1", "A2", Value::Number(1.0))
            .with_cell_a1("Sheet1", "A3", Value::Text("skip".into()));
        assert_eq!(wb.eval("=AND(A1:A4)"), b(true));
        assert_eq!(wb.eval("=AND(A1:A4,0)"), b(false));
        assert_eq!(wb.eval("=OR(FALSE,0,A1)"), b(true));
        assert_eq!(wb.eval("=OR(\"false\")"), b(false));
        let v = wb.eval("=AND(B1:B3)");
        assert_eq!(
            v.as_error().map(|e| e.kind),
            Some(ErrorKind::InvalidArgumentType)
        );
    }

    #[test]
    fn not_and_if() {
        let wb = TestWorkbook::new();
        assert_eq!(wb.eval("=NOT(0)"), b(true));
        assert_eq!(wb.eval("=IF(1>2,\"yes\",\"no\")"), Value::Text("no".into()));
        assert_eq!(wb.eval("=IF(TRUE,5)"), Value::Number(5.0));
        assert_eq!(wb.eval("=IF(FALSE,5)"), b(false));
    }

    #[test]
    fn if_evaluates_arguments_eagerly() {
        let wb = TestWorkbook::new();
        let v = wb.eval("=IF(TRUE,1,1/0)");
        assert_eq!(v.as_error().map(|e| e.kind), Some(ErrorKind::Domain));
    }
}
