//! Date and time construction and extraction over serial numbers.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use super::utils::{int_arg, number_arg};
use crate::function::{Arg, Function, FunctionContext};
use crate::func_caps;
use gridcalc_common::{CalcError, Value, date_to_serial, serial_to_datetime};

fn to_datetime(serial: f64) -> Result<NaiveDateTime, CalcError> {
    serial_to_datetime(serial)
        .ok_or_else(|| CalcError::domain(format!("{serial} is not a valid date serial")))
}

/* ─────────────────────────── DATE() ─────────────────────────── */

/// `DATE(year, month, day)`. Months and days outside their usual range
/// roll over into neighbouring months and years; years below 1900 are
/// offset by 1900.
#[derive(Debug)]
pub struct DateFn;

impl Function for DateFn {
    func_caps!(PURE, NUMERIC_ONLY);

    fn name(&self) -> &'static str {
        "DATE"
    }
    fn min_args(&self) -> usize {
        3
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let mut year = int_arg(&args[0], &ctx.locale)?;
        let month = int_arg(&args[1], &ctx.locale)?;
        let day = int_arg(&args[2], &ctx.locale)?;
        if (0..1900).contains(&year) {
            year += 1900;
        }
        if !(0..=9999).contains(&year) {
            return Err(CalcError::domain(format!("year {year} is out of range")));
        }

        let months = year * 12 + (month - 1);
        let out_of_range = || CalcError::domain("date is out of range");
        let first = i32::try_from(months.div_euclid(12))
            .ok()
            .and_then(|y| NaiveDate::from_ymd_opt(y, months.rem_euclid(12) as u32 + 1, 1))
            .ok_or_else(out_of_range)?;
        let date = Duration::try_days(day - 1)
            .and_then(|d| first.checked_add_signed(d))
            .ok_or_else(out_of_range)?;

        let serial = date_to_serial(&date);
        if serial < 0.0 {
            return Err(out_of_range());
        }
        Ok(Value::Date(serial))
    }
}

/* ─────────────────────────── TIME() ─────────────────────────── */

/// `TIME(hour, minute, second)` as a fraction of a day; whole days wrap.
#[derive(Debug)]
pub struct TimeFn;

impl Function for TimeFn {
    func_caps!(PURE, NUMERIC_ONLY);

    fn name(&self) -> &'static str {
        "TIME"
    }
    fn min_args(&self) -> usize {
        3
    }
    fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
        let h = int_arg(&args[0], &ctx.locale)?;
        let m = int_arg(&args[1], &ctx.locale)?;
        let s = int_arg(&args[2], &ctx.locale)?;
        let total = h
            .checked_mul(3600)
            .and_then(|x| x.checked_add(m.checked_mul(60)?))
            .and_then(|x| x.checked_add(s))
            .ok_or_else(|| CalcError::domain("time is out of range"))?;
        if total < 0 {
            return Err(CalcError::domain("time is negative"));
        }
        Ok(Value::Time((total % 86_400) as f64 / 86_400.0))
    }
}

/* ─────────────────────────── parts ──────────────────────────── */

macro_rules! date_part_fn {
    ($ty:ident, $name:literal, |$dt:ident| $body:expr) => {
        #[derive(Debug)]
        pub struct $ty;

        impl Function for $ty {
            func_caps!(PURE, NUMERIC_ONLY);

            fn name(&self) -> &'static str {
                $name
            }
            fn min_args(&self) -> usize {
                1
            }
            fn eval(&self, args: &[Arg], ctx: &FunctionContext) -> Result<Value, CalcError> {
                let $dt = to_datetime(number_arg(&args[0], &ctx.locale)?)?;
                Ok(Value::Number($body as f64))
            }
        }
    };
}

date_part_fn!(YearFn, "YEAR", |dt| dt.year());
date_part_fn!(MonthFn, "MONTH", |dt| dt.month());
date_part_fn!(DayFn, "DAY", |dt| dt.day());
date_part_fn!(HourFn, "HOUR", |dt| dt.hour());
date_part_fn!(MinuteFn, "MINUTE", |dt| dt.minute());
date_part_fn!(SecondFn, "SECOND", |dt| dt.second());

pub fn register_builtins() {
    crate::register_functions!(
        DateFn, TimeFn, YearFn, MonthFn, DayFn, HourFn, MinuteFn, SecondFn,
    );
}
