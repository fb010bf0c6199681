use super::utils::{collect_numbers, int_arg, number_arg};
use crate::function::{Arg, Function, FunctionContext};
use crate::func_caps;
use crate::interpreter::{divide, power};
use gridcalc_common::{CalcError, Value};

/* ─────────────────────────── SUM() ──────────────────────────── */

/// Adds numbers across scalars and ranges. Text and booleans inside
/// ranges are ignored; scalar text must parse as a number.
#[derive(Debug)]
pub struct SumFn;

impl Function for SumFn {
    func_caps!(PURE, REDUCTION, NUMERIC_ONLY);

    fn name(&self) -> &'static str {
        "SUM"
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let nums = collect_numbers(args, &ctx.locale)?;
        Ok(Value::Number(nums.iter().sum()))
    }
}

/* ─────────────────────────── PRODUCT() ──────────────────────── */

#[derive(Debug)]
pub struct ProductFn;

impl Function for ProductFn {
    func_caps!(PURE, REDUCTION, NUMERIC_ONLY);

    fn name(&self) -> &'static str {
        "PRODUCT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let nums = collect_numbers(args, &ctx.locale)?;
        if nums.is_empty() {
            return Ok(Value::Number(0.0));
        }
        Ok(Value::Number(nums.iter().product()))
    }
}

/* ─────────────────────────── AVERAGE() ──────────────────────── */

#[derive(Debug)]
pub struct AverageFn;

impl Function for AverageFn {
    func_caps!(PURE, REDUCTION, NUMERIC_ONLY);

    fn name(&self) -> &'static str {
        "AVERAGE"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let nums = collect_numbers(args, &ctx.locale)?;
        if nums.is_empty() {
            return Err(CalcError::domain("AVERAGE of no numbers"));
        }
        Ok(Value::Number(nums.iter().sum::<f64>() / nums.len() as f64))
    }
}

/* ─────────────────────────── MIN() / MAX() ──────────────────── */

#[derive(Debug)]
pub struct MinFn;

impl Function for MinFn {
    func_caps!(PURE, REDUCTION, NUMERIC_ONLY);

    fn name(&self) -> &'static str {
        "MIN"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let nums = collect_numbers(args, &ctx.locale)?;
        Ok(Value::Number(
            nums.into_iter().reduce(f64::min).unwrap_or(0.0),
        ))
    }
}

#[derive(Debug)]
pub struct MaxFn;

impl Function for MaxFn {
    func_caps!(PURE, REDUCTION, NUMERIC_ONLY);

    fn name(&self) -> &'static str {
        "MAX"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let nums = collect_numbers(args, &ctx.locale)?;
        Ok(Value::Number(
            nums.into_iter().reduce(f64::max).unwrap_or(0.0),
        ))
    }
}

/* ─────────────────────────── COUNT() ────────────────────────── */

/// Counts numeric values. Scalar text counts only when it parses.
#[derive(Debug)]
pub struct CountFn;

impl Function for CountFn {
    func_caps!(PURE, REDUCTION);

    fn name(&self) -> &'static str {
        "COUNT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let mut count = 0usize;
        for arg in args {
            count += match arg {
                Arg::Value(Value::Text(s)) => ctx.locale.parse_number(s).is_some() as usize,
                Arg::Value(Value::Boolean(_)) => 1,
                _ => arg
                    .values()
                    .filter(|v| v.as_serial_number().is_some())
                    .count(),
            };
        }
        Ok(Value::Number(count as f64))
    }
}

/* ─────────────────────────── single-number functions ────────── */

#[derive(Debug)]
pub struct AbsFn;

impl Function for AbsFn {
    func_caps!(PURE, NUMERIC_ONLY);

    fn name(&self) -> &'static str {
        "ABS"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        Ok(Value::Number(number_arg(&args[0], &ctx.locale)?.abs()))
    }
}

#[derive(Debug)]
pub struct SqrtFn;

impl Function for SqrtFn {
    func_caps!(PURE, NUMERIC_ONLY);

    fn name(&self) -> &'static str {
        "SQRT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let n = number_arg(&args[0], &ctx.locale)?;
        if n < 0.0 {
            return Err(CalcError::domain(format!(
                "square root of negative number {n}"
            )));
        }
        Ok(Value::Number(n.sqrt()))
    }
}

/// Rounds down to the nearest integer.
#[derive(Debug)]
pub struct IntFn;

impl Function for IntFn {
    func_caps!(PURE, NUMERIC_ONLY);

    fn name(&self) -> &'static str {
        "INT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        Ok(Value::Number(number_arg(&args[0], &ctx.locale)?.floor()))
    }
}

/// `ROUND(number, [digits])`, half away from zero. Negative digits round
/// left of the decimal point.
#[derive(Debug)]
pub struct RoundFn;

impl Function for RoundFn {
    func_caps!(PURE, NUMERIC_ONLY);

    fn name(&self) -> &'static str {
        "ROUND"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let n = number_arg(&args[0], &ctx.locale)?;
        let digits = match args.get(1) {
            Some(a) => int_arg(a, &ctx.locale)?.clamp(-308, 308) as i32,
            None => 0,
        };
        let rounded = if digits >= 0 {
            let factor = 10f64.powi(digits);
            (n * factor).round() / factor
        } else {
            let factor = 10f64.powi(-digits);
            (n / factor).round() * factor
        };
        Ok(Value::Number(if rounded.is_finite() { rounded } else { n }))
    }
}

/// Remainder with the sign of the divisor.
#[derive(Debug)]
pub struct ModFn;

impl Function for ModFn {
    func_caps!(PURE, NUMERIC_ONLY);

    fn name(&self) -> &'static str {
        "MOD"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let n = number_arg(&args[0], &ctx.locale)?;
        let d = number_arg(&args[1], &ctx.locale)?;
        let q = divide(n, d)?;
        Ok(Value::Number(n - d * q.floor()))
    }
}

#[derive(Debug)]
pub struct PowerFn;

impl Function for PowerFn {
    func_caps!(PURE, NUMERIC_ONLY);

    fn name(&self) -> &'static str {
        "POWER"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let base = number_arg(&args[0], &ctx.locale)?;
        let exp = number_arg(&args[1], &ctx.locale)?;
        Ok(Value::Number(power(base, exp)?))
    }
}

#[derive(Debug)]
pub struct PiFn;

impl Function for PiFn {
    func_caps!(PURE);

    fn name(&self) -> &'static str {
        "PI"
    }
    fn eval(&self, _args: &[Arg], _ctx: &FunctionContext) -> Result<Value, CalcError> {
        Ok(Value::Number(std::f64::consts::PI))
    }
}

pub fn register_builtins() {
    crate::register_functions!(
        SumFn, ProductFn, AverageFn, MinFn, MaxFn, CountFn, AbsFn, SqrtFn, IntFn, RoundFn, ModFn,
        PowerFn, PiFn,
    );
}
