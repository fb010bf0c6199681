/// Separators used when reading and writing formula text.
///
/// - `decimal_separator` splits the integral and fractional part of number
///   literals and of text coerced to a number.
/// - `argument_separator` splits function arguments.
///
/// The two must differ. Numbers never carry thousands separators.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Locale {
    pub decimal_separator: char,
    pub argument_separator: char,
}

impl Default for Locale {
    fn default() -> Self {
        Self::invariant()
    }
}

impl Locale {
    /// `.` decimals, `,` between arguments.
    pub const fn invariant() -> Self {
        Locale {
            decimal_separator: '.',
            argument_separator: ',',
        }
    }

    /// `,` decimals, `;` between arguments.
    pub const fn comma_decimal() -> Self {
        Locale {
            decimal_separator: ',',
            argument_separator: ';',
        }
    }

    /// Parses a number written with this locale's decimal separator.
    ///
    /// Accepts an optional sign, digits, one decimal separator and an
    /// exponent. Rejects the other locale's separator, infinities and NaN.
    pub fn parse_number(&self, s: &str) -> Option<f64> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        let mut normalised = String::with_capacity(s.len());
        for ch in s.chars() {
            match ch {
                '0'..='9' | '+' | '-' | 'e' | 'E' => normalised.push(ch),
                c if c == self.decimal_separator => normalised.push('.'),
                _ => return None,
            }
        }
        normalised.parse::<f64>().ok().filter(|n| n.is_finite())
    }

    /// Renders a number with this locale's decimal separator.
    pub fn format_number(&self, n: f64) -> String {
        gridcalc_common::format_number(n, self.decimal_separator)
    }

    /// Case folding for name lookups; ASCII-only.
    pub fn fold_case(&self, s: &str) -> String {
        s.to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_locale_decimal() {
        let inv = Locale::invariant();
        assert_eq!(inv.parse_number("1.5"), Some(1.5));
        assert_eq!(inv.parse_number(" -2e3 "), Some(-2000.0));
        assert_eq!(inv.parse_number("1,5"), None);
        assert_eq!(inv.parse_number("inf"), None);

        let de = Locale::comma_decimal();
        assert_eq!(de.parse_number("1,5"), Some(1.5));
        assert_eq!(de.parse_number("1.5"), None);
        assert_eq!(de.format_number(0.25), "0,25");
    }
}
