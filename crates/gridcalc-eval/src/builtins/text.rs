use super::utils::{count_arg, int_arg, text_arg};
use crate::coercion::to_text;
use crate::function::{Arg, Function, FunctionContext};
use crate::func_caps;
use gridcalc_common::{CalcError, Value};

/* ─────────────────────────── LEN() ──────────────────────────── */

/// Number of characters in the text form of the argument.
#[derive(Debug)]
pub struct LenFn;

impl Function for LenFn {
    func_caps!(PURE);

    fn name(&self) -> &'static str {
        "LEN"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let s = text_arg(&args[0], &ctx.locale)?;
        Ok(Value::Number(s.chars().count() as f64))
    }
}

/* ─────────────────────────── LEFT() / RIGHT() ───────────────── */

#[derive(Debug)]
pub struct LeftFn;

impl Function for LeftFn {
    func_caps!(PURE);

    fn name(&self) -> &'static str {
        "LEFT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let s = text_arg(&args[0], &ctx.locale)?;
        let n = count_arg(args.get(1), &ctx.locale)?;
        Ok(Value::Text(s.chars().take(n).collect()))
    }
}

#[derive(Debug)]
pub struct RightFn;

impl Function for RightFn {
    func_caps!(PURE);

    fn name(&self) -> &'static str {
        "RIGHT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let s = text_arg(&args[0], &ctx.locale)?;
        let n = count_arg(args.get(1), &ctx.locale)?;
        let len = s.chars().count();
        Ok(Value::Text(s.chars().skip(len.saturating_sub(n)).collect()))
    }
}

/* ─────────────────────────── MID() ──────────────────────────── */

/// `MID(text, start, count)` with a 1-based start.
#[derive(Debug)]
pub struct MidFn;

impl Function for MidFn {
    func_caps!(PURE);

    fn name(&self) -> &'static str {
        "MID"
    }
    fn min_args(&self) -> usize {
        3
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let s = text_arg(&args[0], &ctx.locale)?;
        let start = int_arg(&args[1], &ctx.locale)?;
        let count = int_arg(&args[2], &ctx.locale)?;
        if start < 1 {
            return Err(CalcError::arg_type(format!("MID start {start} is below 1")));
        }
        if count < 0 {
            return Err(CalcError::arg_type(format!("MID count {count} is negative")));
        }
        Ok(Value::Text(
            s.chars()
                .skip((start - 1) as usize)
                .take(count as usize)
                .collect(),
        ))
    }
}

/* ─────────────────────────── case & whitespace ──────────────── */

#[derive(Debug)]
pub struct UpperFn;

impl Function for UpperFn {
    func_caps!(PURE);

    fn name(&self) -> &'static str {
        "UPPER"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        Ok(Value::Text(text_arg(&args[0], &ctx.locale)?.to_uppercase()))
    }
}

#[derive(Debug)]
pub struct LowerFn;

impl Function for LowerFn {
    func_caps!(PURE);

    fn name(&self) -> &'static str {
        "LOWER"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        Ok(Value::Text(text_arg(&args[0], &ctx.locale)?.to_lowercase()))
    }
}

/// Strips leading and trailing spaces and collapses inner runs to one.
#[derive(Debug)]
pub struct TrimFn;

impl Function for TrimFn {
    func_caps!(PURE);

    fn name(&self) -> &'static str {
        "TRIM"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let s = text_arg(&args[0], &ctx.locale)?;
        let words: Vec<&str> = s.split(' ').filter(|w| !w.is_empty()).collect();
        Ok(Value::Text(words.join(" ")))
    }
}

/* ─────────────────────────── CONCATENATE() ──────────────────── */

/// Joins the text form of every argument; ranges contribute each member
/// row-major.
#[derive(Debug)]
pub struct ConcatenateFn;

impl Function for ConcatenateFn {
    func_caps!(PURE, REDUCTION);

    fn name(&self) -> &'static str {
        "CONCATENATE"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let mut out = String::new();
        for v in args.iter().flat_map(Arg::values) {
            out.push_str(&to_text(v, &ctx.locale)?);
        }
        Ok(Value::Text(out))
    }
}

/// Case-sensitive text equality.
#[derive(Debug)]
pub struct ExactFn;

impl Function for ExactFn {
    func_caps!(PURE);

    fn name(&self) -> &'static str {
        "EXACT"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let a = text_arg(&args[0], &ctx.locale)?;
        let b = text_arg(&args[1], &ctx.locale)?;
        Ok(Value::Boolean(a == b))
    }
}

pub fn register_builtins() {
    crate::register_functions!(
        LenFn,
        LeftFn,
        RightFn,
        MidFn,
        UpperFn,
        LowerFn,
        TrimFn,
        ConcatenateFn,
        ExactFn,
    );
}
