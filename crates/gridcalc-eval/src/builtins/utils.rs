use gridcalc_common::{CalcError, Value};
use gridcalc_parse::Locale;

use crate::coercion::{to_number, to_text};
use crate::function::Arg;

/// Numbers a reduction sees: scalar arguments are coerced (text must
/// parse), range members count only when they already are numeric.
pub fn collect_numbers(args: &[Arg], locale: &Locale) -> Result<Vec<f64>, CalcError> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Arg::Value(Value::Empty) => {}
            Arg::Value(v) => out.push(to_number(v, locale)?),
            Arg::Range(_) => out.extend(arg.values().filter_map(Value::as_serial_number)),
        }
    }
    Ok(out)
}

pub fn number_arg(arg: &Arg, locale: &Locale) -> Result<f64, CalcError> {
    to_number(arg.scalar()?, locale)
}

/// Numeric argument truncated towards zero.
pub fn int_arg(arg: &Arg, locale: &Locale) -> Result<i64, CalcError> {
    Ok(number_arg(arg, locale)?.trunc() as i64)
}

pub fn text_arg(arg: &Arg, locale: &Locale) -> Result<String, CalcError> {
    to_text(arg.scalar()?, locale)
}

/// Optional character count, defaulting to 1; negative counts are rejected.
pub fn count_arg(arg: Option<&Arg>, locale: &Locale) -> Result<usize, CalcError> {
    match arg {
        None | Some(Arg::Value(Value::Empty)) => Ok(1),
        Some(a) => {
            let n = int_arg(a, locale)?;
            usize::try_from(n)
                .map_err(|_| CalcError::arg_type(format!("character count {n} is negative")))
        }
    }
}
