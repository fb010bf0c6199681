use chrono::{Duration as ChronoDur, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt::{self, Display};

use crate::CalcError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ───────────────────── date-serial utilities ─────────────────────────
Serial date system (1900 based):
  Serial 1  = 1900-01-01
  Serial 59 = 1900-02-28
  Serial 60 = 1900-02-29  (phantom day kept for compatibility)
  Serial 61 = 1900-03-01
Base date = 1899-12-31 so that serial 1 = base + 1 day = 1900-01-01.
Time is stored as fractional days (no timezone).
------------------------------------------------------------------- */

const SERIAL_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1899, 12, 31) {
    Some(d) => d,
    None => panic!("invalid epoch"),
};

const PHANTOM_LEAP_END: NaiveDate = match NaiveDate::from_ymd_opt(1900, 3, 1) {
    Some(d) => d,
    None => panic!("invalid date"),
};

const PHANTOM_LEAP_DAY: NaiveDate = match NaiveDate::from_ymd_opt(1900, 2, 28) {
    Some(d) => d,
    None => panic!("invalid date"),
};

pub fn date_to_serial(date: &NaiveDate) -> f64 {
    let days = (*date - SERIAL_EPOCH).num_days();
    // Dates on or after 1900-03-01 get +1 to account for phantom Feb 29
    let serial_days = if *date >= PHANTOM_LEAP_END {
        days + 1
    } else {
        days
    };
    serial_days as f64
}

pub fn datetime_to_serial(dt: &NaiveDateTime) -> f64 {
    let secs_in_day = dt.time().num_seconds_from_midnight() as f64;
    date_to_serial(&dt.date()) + secs_in_day / 86_400.0
}

pub fn time_to_serial(t: &NaiveTime) -> f64 {
    t.num_seconds_from_midnight() as f64 / 86_400.0
}

/// Converts a serial number back to a calendar date/time.
///
/// Returns `None` for negative or non-finite serials and for serials past
/// the end of the representable calendar.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let frac_secs = (serial.fract() * 86_400.0).round() as i64;

    // Serial 60 is phantom 1900-02-29; map to 1900-02-28
    let date = if days == 60 {
        PHANTOM_LEAP_DAY
    } else {
        let offset = if days < 60 { days } else { days - 1 };
        SERIAL_EPOCH.checked_add_signed(ChronoDur::try_days(offset)?)?
    };

    // A fraction that rounds up to a full day rolls into the next date.
    let (date, secs) = if frac_secs >= 86_400 {
        (date.succ_opt()?, frac_secs - 86_400)
    } else {
        (date, frac_secs)
    };
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, 0)?;
    Some(date.and_time(time))
}

/// A typed cell or expression value.
///
/// Dates and times are serial numbers with their own display; in
/// arithmetic they behave like [`Value::Number`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Serial day number, displayed as a calendar date.
    Date(f64),
    /// Fraction of a day, displayed as a clock time.
    Time(f64),
    Error(CalcError),
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Number(n) => write!(f, "{}", format_number(*n, '.')),
            Value::Text(s) => write!(f, "{s}"),
            Value::Boolean(true) => write!(f, "TRUE"),
            Value::Boolean(false) => write!(f, "FALSE"),
            Value::Date(serial) => match serial_to_datetime(*serial) {
                Some(dt) => write!(f, "{}", dt.date().format("%Y-%m-%d")),
                None => write!(f, "{}", format_number(*serial, '.')),
            },
            Value::Time(serial) => match serial_to_datetime(serial.rem_euclid(1.0)) {
                Some(dt) => write!(f, "{}", dt.time().format("%H:%M:%S")),
                None => write!(f, "{}", format_number(*serial, '.')),
            },
            Value::Error(e) => write!(f, "{}", e.kind),
        }
    }
}

impl From<CalcError> for Value {
    fn from(error: CalcError) -> Self {
        Value::Error(error)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl Value {
    pub fn from_date(date: NaiveDate) -> Self {
        Value::Date(date_to_serial(&date))
    }

    pub fn from_time(time: NaiveTime) -> Self {
        Value::Time(time_to_serial(&time))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn as_error(&self) -> Option<&CalcError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Serial/numeric view of numbers, dates and times.
    pub fn as_serial_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) | Value::Date(n) | Value::Time(n) => Some(*n),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Error(_) => "error",
        }
    }

    /// Renders the value the way it is written back into formula text,
    /// using `decimal` as the decimal separator for numbers.
    pub fn to_source_text(&self, decimal: char) -> String {
        match self {
            Value::Number(n) | Value::Date(n) | Value::Time(n) => format_number(*n, decimal),
            Value::Error(e) => e.kind.token().to_string(),
            other => other.to_string(),
        }
    }
}

/// Shortest round-tripping rendering of a double, with integral values
/// printed without a fractional part.
pub fn format_number(n: f64, decimal: char) -> String {
    let text = if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    };
    if decimal == '.' {
        text
    } else {
        text.replace('.', &decimal.to_string())
    }
}
