//! Reference text grammar.
//!
//! ```text
//! reference := [sheet '!'] point [':' [sheet '!'] point]
//!            | "'" name "'"
//!            | identifier
//! sheet     := "'" quoted "'" | bare
//! point     := ['$'] letters ['$'] digits
//! ```
//!
//! A single-quoted token without a trailing `!` is a named area; so is a bare
//! identifier that does not read as a cell address.

use std::fmt::{self, Display};

use gridcalc_common::Address;

use crate::ParsingError;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceType {
    Cell {
        sheet: Option<String>,
        addr: Address,
    },
    Range {
        sheet: Option<String>,
        start: Address,
        end: Address,
    },
    NamedRange(String),
}

enum SheetSplit<'a> {
    /// `'...'` with nothing after the closing quote.
    QuotedName(String),
    Qualified(Option<String>, &'a str),
}

impl ReferenceType {
    /// Parse `A1`, `$A$1:B2`, `Sheet2!A1`, `'My Sheet'!A1:B2`, `'name'` or `name`.
    pub fn from_string(reference: &str) -> Result<Self, ParsingError> {
        let invalid = || ParsingError::InvalidReference(reference.to_string());

        let (sheet, rest) = match split_sheet(reference)? {
            SheetSplit::QuotedName(name) if !name.is_empty() => {
                return Ok(ReferenceType::NamedRange(name));
            }
            SheetSplit::QuotedName(_) => return Err(invalid()),
            SheetSplit::Qualified(sheet, rest) => (sheet, rest),
        };

        if let Some((left, right)) = rest.split_once(':') {
            let right = match split_sheet(right)? {
                SheetSplit::Qualified(None, r) => r,
                SheetSplit::Qualified(Some(s2), r)
                    if sheet.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(&s2)) =>
                {
                    r
                }
                _ => return Err(invalid()),
            };
            let start = Address::parse_a1(left).map_err(|_| invalid())?;
            let end = Address::parse_a1(right).map_err(|_| invalid())?;
            return Ok(ReferenceType::Range { sheet, start, end });
        }

        match Address::parse_a1(rest) {
            Ok(addr) => Ok(ReferenceType::Cell { sheet, addr }),
            Err(_) if sheet.is_none() && is_name_identifier(rest) => {
                Ok(ReferenceType::NamedRange(rest.to_string()))
            }
            Err(_) => Err(invalid()),
        }
    }

    pub fn sheet(&self) -> Option<&str> {
        match self {
            ReferenceType::Cell { sheet, .. } | ReferenceType::Range { sheet, .. } => {
                sheet.as_deref()
            }
            ReferenceType::NamedRange(_) => None,
        }
    }

    /// Same reference with its sheet qualifier replaced.
    pub fn with_sheet(&self, new_sheet: Option<String>) -> Self {
        match self {
            ReferenceType::Cell { addr, .. } => ReferenceType::Cell {
                sheet: new_sheet,
                addr: *addr,
            },
            ReferenceType::Range { start, end, .. } => ReferenceType::Range {
                sheet: new_sheet,
                start: *start,
                end: *end,
            },
            ReferenceType::NamedRange(n) => ReferenceType::NamedRange(n.clone()),
        }
    }
}

impl Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceType::Cell { sheet, addr } => {
                if let Some(sheet) = sheet {
                    write!(f, "{}!", quote_sheet_name(sheet))?;
                }
                write!(f, "{addr}")
            }
            ReferenceType::Range { sheet, start, end } => {
                if let Some(sheet) = sheet {
                    write!(f, "{}!", quote_sheet_name(sheet))?;
                }
                write!(f, "{start}:{end}")
            }
            ReferenceType::NamedRange(name) if is_name_identifier(name) => write!(f, "{name}"),
            ReferenceType::NamedRange(name) => write!(f, "'{}'", name.replace('\'', "''")),
        }
    }
}

fn split_sheet(text: &str) -> Result<SheetSplit<'_>, ParsingError> {
    let invalid = || ParsingError::InvalidReference(text.to_string());

    if let Some(inner) = text.strip_prefix('\'') {
        let bytes = inner.as_bytes();
        let mut unescaped = String::new();
        let mut i = 0;
        let mut seg_start = 0;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    unescaped.push_str(&inner[seg_start..=i]);
                    i += 2;
                    seg_start = i;
                    continue;
                }
                unescaped.push_str(&inner[seg_start..i]);
                let after = &inner[i + 1..];
                return match after.strip_prefix('!') {
                    Some(rest) if !unescaped.is_empty() => {
                        Ok(SheetSplit::Qualified(Some(unescaped), rest))
                    }
                    Some(_) => Err(invalid()),
                    None if after.is_empty() => Ok(SheetSplit::QuotedName(unescaped)),
                    None => Err(invalid()),
                };
            }
            i += 1;
        }
        return Err(invalid());
    }

    match text.split_once('!') {
        Some((sheet, rest)) if !sheet.is_empty() => {
            Ok(SheetSplit::Qualified(Some(sheet.to_string()), rest))
        }
        Some(_) => Err(invalid()),
        None => Ok(SheetSplit::Qualified(None, text)),
    }
}

/// True for text usable unquoted as a name: starts with a letter or `_`,
/// continues with letters, digits, `_` or `.`, and does not read as a cell
/// address or a boolean literal.
pub fn is_name_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return false;
    }
    if text.eq_ignore_ascii_case("TRUE") || text.eq_ignore_ascii_case("FALSE") {
        return false;
    }
    !has_cell_shape(text)
}

/// Letters then digits, like `A0` or `ZZZZ1`, whether or not the address
/// fits the grid.
fn has_cell_shape(text: &str) -> bool {
    let digits = text.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    digits.len() < text.len()
        && !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Renders a sheet name for use as a qualifier, quoting it when it would
/// not read back as a bare sheet name.
pub fn quote_sheet_name(name: &str) -> String {
    let bare = !name.is_empty()
        && !name.as_bytes()[0].is_ascii_digit()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    if bare {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}
