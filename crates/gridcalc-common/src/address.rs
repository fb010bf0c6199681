//! Grid coordinates shared by the parser and the engine.
//!
//! Columns and rows are 1-based. Column letters are base-26 without a zero
//! digit (`A` = 1, `Z` = 26, `AA` = 27).

use std::error::Error;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default grid width: 26×26 columns (`A` .. `YZ`).
pub const DEFAULT_MAX_COLUMNS: u32 = 26 * 26;
/// Default grid height.
pub const DEFAULT_MAX_ROWS: u32 = 0x7FFF;

/// Generation-checked handle to a sheet owned by a workbook.
///
/// A handle whose sheet was removed never resolves again, even when the
/// slot is reused for a new sheet.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SheetId {
    index: u32,
    generation: u32,
}

impl SheetId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AddressError {
    Empty,
    MissingColumn(String),
    MissingRow(String),
    ColumnOverflow(String),
    RowOverflow(String),
    Trailing(String),
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::Empty => write!(f, "empty address"),
            AddressError::MissingColumn(s) => write!(f, "missing column letters in '{s}'"),
            AddressError::MissingRow(s) => write!(f, "missing row number in '{s}'"),
            AddressError::ColumnOverflow(s) => write!(f, "column out of range in '{s}'"),
            AddressError::RowOverflow(s) => write!(f, "row out of range in '{s}'"),
            AddressError::Trailing(s) => write!(f, "unexpected characters in '{s}'"),
        }
    }
}

impl Error for AddressError {}

const COL_FIXED: u8 = 0b01;
const ROW_FIXED: u8 = 0b10;

/// One grid position plus the per-axis "fixed" markers written as `$`.
///
/// The markers only steer reference translation on structural edits; two
/// addresses naming the same position compare equal through [`Address::same_cell`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    pub col: u32,
    pub row: u32,
    flags: u8,
}

impl Address {
    pub const fn new(col: u32, row: u32) -> Self {
        Self { col, row, flags: 0 }
    }

    pub const fn with_fixed(col: u32, row: u32, col_fixed: bool, row_fixed: bool) -> Self {
        let mut flags = 0;
        if col_fixed {
            flags |= COL_FIXED;
        }
        if row_fixed {
            flags |= ROW_FIXED;
        }
        Self { col, row, flags }
    }

    pub const fn col_fixed(self) -> bool {
        self.flags & COL_FIXED != 0
    }

    pub const fn row_fixed(self) -> bool {
        self.flags & ROW_FIXED != 0
    }

    /// Same position with both fixed markers cleared.
    pub const fn unfixed(self) -> Self {
        Self::new(self.col, self.row)
    }

    pub const fn same_cell(self, other: Address) -> bool {
        self.col == other.col && self.row == other.row
    }

    pub const fn is_within(self, max_cols: u32, max_rows: u32) -> bool {
        self.col >= 1 && self.row >= 1 && self.col <= max_cols && self.row <= max_rows
    }

    /// Parses `[$]Letters[$]Digits`, case-insensitive. Bounds are not
    /// checked beyond "at least 1 and fits in u32".
    pub fn parse_a1(text: &str) -> Result<Self, AddressError> {
        let bytes = text.as_bytes();
        if bytes.is_empty() {
            return Err(AddressError::Empty);
        }
        let mut i = 0;

        let col_fixed = bytes[i] == b'$';
        if col_fixed {
            i += 1;
        }
        let col_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        if i == col_start {
            return Err(AddressError::MissingColumn(text.to_string()));
        }
        let col = letters_to_column(&text[col_start..i])
            .ok_or_else(|| AddressError::ColumnOverflow(text.to_string()))?;

        let row_fixed = i < bytes.len() && bytes[i] == b'$';
        if row_fixed {
            i += 1;
        }
        let row_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == row_start {
            return Err(AddressError::MissingRow(text.to_string()));
        }
        if i != bytes.len() {
            return Err(AddressError::Trailing(text.to_string()));
        }
        let row = text[row_start..i]
            .parse::<u32>()
            .ok()
            .filter(|r| *r >= 1)
            .ok_or_else(|| AddressError::RowOverflow(text.to_string()))?;

        Ok(Self::with_fixed(col, row, col_fixed, row_fixed))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.col_fixed() {
            f.write_str("$")?;
        }
        f.write_str(&column_to_letters(self.col))?;
        if self.row_fixed() {
            f.write_str("$")?;
        }
        write!(f, "{}", self.row)
    }
}

/// Converts column letters (`"A"`, `"bc"`) to a 1-based column number.
/// Returns `None` for empty input, non-letters or overflow.
pub fn letters_to_column(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut result = 0u32;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        result = result
            .checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A' + 1) as u32)?;
    }
    Some(result)
}

/// Converts a 1-based column number to its letters. `0` renders as an empty string.
pub fn column_to_letters(mut col: u32) -> String {
    let mut result = Vec::with_capacity(3);
    while col > 0 {
        col -= 1;
        result.push((col % 26) as u8 + b'A');
        col /= 26;
    }
    result.reverse();
    String::from_utf8(result).unwrap_or_default()
}

/// Inclusive rectangle of grid positions, always normalised so that
/// `col1 <= col2` and `row1 <= row2`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rect {
    pub row1: u32,
    pub col1: u32,
    pub row2: u32,
    pub col2: u32,
}

impl Rect {
    pub fn new(col1: u32, row1: u32, col2: u32, row2: u32) -> Self {
        Self {
            col1: col1.min(col2),
            row1: row1.min(row2),
            col2: col1.max(col2),
            row2: row1.max(row2),
        }
    }

    pub fn from_corners(a: Address, b: Address) -> Self {
        Self::new(a.col, a.row, b.col, b.row)
    }

    pub fn single(col: u32, row: u32) -> Self {
        Self::new(col, row, col, row)
    }

    /// Parses `A1` or `A1:B2` (fixed markers ignored).
    pub fn parse_a1(text: &str) -> Result<Self, AddressError> {
        match text.split_once(':') {
            Some((a, b)) => Ok(Self::from_corners(
                Address::parse_a1(a)?,
                Address::parse_a1(b)?,
            )),
            None => {
                let a = Address::parse_a1(text)?;
                Ok(Self::single(a.col, a.row))
            }
        }
    }

    pub fn top_left(&self) -> Address {
        Address::new(self.col1, self.row1)
    }

    pub fn width(&self) -> u32 {
        self.col2 - self.col1 + 1
    }

    pub fn height(&self) -> u32 {
        self.row2 - self.row1 + 1
    }

    pub fn is_single_cell(&self) -> bool {
        self.col1 == self.col2 && self.row1 == self.row2
    }

    pub fn contains(&self, col: u32, row: u32) -> bool {
        col >= self.col1 && col <= self.col2 && row >= self.row1 && row <= self.row2
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.contains(other.col1, other.row1) && self.contains(other.col2, other.row2)
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.col1 <= other.col2
            && other.col1 <= self.col2
            && self.row1 <= other.row2
            && other.row1 <= self.row2
    }

    pub fn is_within(&self, max_cols: u32, max_rows: u32) -> bool {
        self.top_left().is_within(max_cols, max_rows)
            && Address::new(self.col2, self.row2).is_within(max_cols, max_rows)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.top_left())
        } else {
            write!(
                f,
                "{}:{}",
                self.top_left(),
                Address::new(self.col2, self.row2)
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_have_no_zero_digit() {
        assert_eq!(letters_to_column("A"), Some(1));
        assert_eq!(letters_to_column("z"), Some(26));
        assert_eq!(letters_to_column("AA"), Some(27));
        assert_eq!(letters_to_column("YZ"), Some(DEFAULT_MAX_COLUMNS));
        assert_eq!(letters_to_column(""), None);
        assert_eq!(letters_to_column("A1"), None);
        assert_eq!(column_to_letters(1), "A");
        assert_eq!(column_to_letters(27), "AA");
        assert_eq!(column_to_letters(702), "ZZ");
        assert_eq!(column_to_letters(703), "AAA");
    }

    #[test]
    fn parse_a1_reads_fixed_markers() {
        let a = Address::parse_a1("$b7").unwrap();
        assert_eq!((a.col, a.row), (2, 7));
        assert!(a.col_fixed());
        assert!(!a.row_fixed());
        assert_eq!(a.to_string(), "$B7");

        let a = Address::parse_a1("C$3").unwrap();
        assert!(a.row_fixed());
        assert_eq!(a.to_string(), "C$3");
        assert!(a.same_cell(Address::new(3, 3)));
        assert_ne!(a, Address::new(3, 3));
    }

    #[test]
    fn parse_a1_rejects_malformed_text() {
        assert_eq!(Address::parse_a1(""), Err(AddressError::Empty));
        assert!(matches!(
            Address::parse_a1("12"),
            Err(AddressError::MissingColumn(_))
        ));
        assert!(matches!(
            Address::parse_a1("AB"),
            Err(AddressError::MissingRow(_))
        ));
        assert!(matches!(
            Address::parse_a1("A0"),
            Err(AddressError::RowOverflow(_))
        ));
        assert!(matches!(
            Address::parse_a1("A1x"),
            Err(AddressError::Trailing(_))
        ));
    }

    #[test]
    fn rect_geometry() {
        let r = Rect::parse_a1("C3:A1").unwrap();
        assert_eq!(r, Rect::new(1, 1, 3, 3));
        assert!(r.contains(2, 2));
        assert!(!r.contains(4, 1));
        assert!(r.intersects(&Rect::new(3, 3, 5, 5)));
        assert!(!r.intersects(&Rect::new(4, 1, 5, 5)));
        assert_eq!(r.to_string(), "A1:C3");
        assert_eq!(Rect::single(2, 2).to_string(), "B2");
        assert!(!Rect::new(1, 1, 677, 1).is_within(DEFAULT_MAX_COLUMNS, DEFAULT_MAX_ROWS));
    }
}
