//! Value coercions shared by operators and functions.
//!
//! | from      | number        | text               | boolean          |
//! |-----------|---------------|--------------------|------------------|
//! | empty     | 0             | `""`               | FALSE            |
//! | boolean   | 1 / 0         | `TRUE` / `FALSE`   | itself           |
//! | text      | locale number | itself             | `TRUE` / `FALSE` |
//! | date/time | serial        | serial             | serial ≠ 0       |

use gridcalc_common::{CalcError, Value};
use gridcalc_parse::Locale;

pub fn to_number(v: &Value, locale: &Locale) -> Result<f64, CalcError> {
    match v {
        Value::Empty => Ok(0.0),
        Value::Number(n) | Value::Date(n) | Value::Time(n) => Ok(*n),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Text(s) => locale.parse_number(s).ok_or_else(|| {
            CalcError::arg_type(format!("cannot use \"{s}\" as a number"))
        }),
        Value::Error(e) => Err(e.clone()),
    }
}

pub fn to_text(v: &Value, locale: &Locale) -> Result<String, CalcError> {
    match v {
        Value::Empty => Ok(String::new()),
        Value::Number(n) | Value::Date(n) | Value::Time(n) => Ok(locale.format_number(*n)),
        Value::Boolean(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Value::Text(s) => Ok(s.clone()),
        Value::Error(e) => Err(e.clone()),
    }
}

pub fn to_bool(v: &Value) -> Result<bool, CalcError> {
    match v {
        Value::Empty => Ok(false),
        Value::Boolean(b) => Ok(*b),
        Value::Number(n) | Value::Date(n) | Value::Time(n) => Ok(*n != 0.0),
        Value::Text(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
        Value::Text(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
        Value::Text(s) => Err(CalcError::arg_type(format!(
            "cannot use \"{s}\" as a logical value"
        ))),
        Value::Error(e) => Err(e.clone()),
    }
}

/// Rejects NaN and infinities produced by arithmetic.
pub fn sanitize_numeric(n: f64) -> Result<f64, CalcError> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err(CalcError::domain("result is not a finite number"))
    }
}

/// Reads constant cell input: a locale number, `TRUE`/`FALSE`, or text.
pub fn parse_constant(text: &str, locale: &Locale) -> Value {
    if text.is_empty() {
        return Value::Empty;
    }
    if let Some(n) = locale.parse_number(text) {
        return Value::Number(n);
    }
    if text.eq_ignore_ascii_case("TRUE") {
        Value::Boolean(true)
    } else if text.eq_ignore_ascii_case("FALSE") {
        Value::Boolean(false)
    } else {
        Value::Text(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_common::ErrorKind;

    #[test]
    fn numbers_from_every_kind() {
        let inv = Locale::invariant();
        assert_eq!(to_number(&Value::Empty, &inv).unwrap(), 0.0);
        assert_eq!(to_number(&Value::Boolean(true), &inv).unwrap(), 1.0);
        assert_eq!(to_number(&Value::Text(" 2.5 ".into()), &inv).unwrap(), 2.5);
        assert_eq!(to_number(&Value::Date(45000.0), &inv).unwrap(), 45000.0);
        let err = to_number(&Value::Text("abc".into()), &inv).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgumentType);
    }

    #[test]
    fn text_follows_locale() {
        let de = Locale::comma_decimal();
        assert_eq!(to_text(&Value::Number(1.5), &de).unwrap(), "1,5");
        assert_eq!(to_text(&Value::Empty, &de).unwrap(), "");
        assert_eq!(to_number(&Value::Text("1,5".into()), &de).unwrap(), 1.5);
    }

    #[test]
    fn constants() {
        let inv = Locale::invariant();
        assert_eq!(parse_constant("12", &inv), Value::Number(12.0));
        assert_eq!(parse_constant("true", &inv), Value::Boolean(true));
        assert_eq!(parse_constant("hello", &inv), Value::Text("hello".into()));
        assert_eq!(parse_constant("", &inv), Value::Empty);
    }

    #[test]
    fn booleans() {
        assert!(to_bool(&Value::Number(2.0)).unwrap());
        assert!(!to_bool(&Value::Empty).unwrap());
        assert!(to_bool(&Value::Text("x".into())).is_err());
    }
}
