//! Reference Resolver: turns parsed reference text into a sheet-bound
//! [`Reference`].
//!
//! Resolution never fails loudly. A malformed, unknown or out-of-grid
//! reference yields a [`Reference`] whose [`is_valid`](Reference::is_valid)
//! is false; callers turn that into an `InvalidReference` error value.

use std::fmt;

use gridcalc_common::{Address, CalcError, Rect, SheetId};
use gridcalc_parse::ReferenceType;

/// One grid position in a specific sheet. Orders sheet by sheet, then
/// row-major, which is also storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub sheet: SheetId,
    pub row: u32,
    pub col: u32,
}

impl CellKey {
    pub const fn new(sheet: SheetId, col: u32, row: u32) -> Self {
        Self { sheet, col, row }
    }

    pub const fn address(self) -> Address {
        Address::new(self.col, self.row)
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}!{}", self.sheet.index(), self.address())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefTarget {
    Point(Address),
    Range(Rect),
}

impl RefTarget {
    pub fn rect(&self) -> Rect {
        match self {
            RefTarget::Point(a) => Rect::single(a.col, a.row),
            RefTarget::Range(r) => *r,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Problem {
    Malformed,
    UnknownSheet,
    UnknownName,
    OutOfBounds,
}

/// A resolved Point or Range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub sheet: Option<SheetId>,
    pub target: RefTarget,
    problem: Option<Problem>,
}

impl Reference {
    pub fn point(sheet: SheetId, addr: Address) -> Self {
        Self {
            sheet: Some(sheet),
            target: RefTarget::Point(addr.unfixed()),
            problem: None,
        }
    }

    pub fn range(sheet: SheetId, rect: Rect) -> Self {
        Self {
            sheet: Some(sheet),
            target: RefTarget::Range(rect),
            problem: None,
        }
    }

    fn invalid(problem: Problem) -> Self {
        Self {
            sheet: None,
            target: RefTarget::Point(Address::new(0, 0)),
            problem: Some(problem),
        }
    }

    /// True iff the sheet is known and every coordinate lies in the grid.
    pub fn is_valid(&self) -> bool {
        self.sheet.is_some() && self.problem.is_none()
    }

    /// Resolved sheet and rectangle, for valid references only.
    pub fn area(&self) -> Option<(SheetId, Rect)> {
        match (self.sheet, self.problem) {
            (Some(sheet), None) => Some((sheet, self.target.rect())),
            _ => None,
        }
    }

    /// The error value a formula gets for reading this reference.
    pub fn to_error(&self, text: &str) -> CalcError {
        let msg = match self.problem {
            Some(Problem::Malformed) => format!("'{text}' is not a valid reference"),
            Some(Problem::UnknownSheet) => format!("'{text}' refers to an unknown sheet"),
            Some(Problem::UnknownName) => format!("'{text}' is not a defined name"),
            Some(Problem::OutOfBounds) => format!("'{text}' lies outside the grid"),
            None => format!("'{text}' could not be resolved"),
        };
        CalcError::reference(msg)
    }
}

/// What a reference is resolved against.
pub trait ReferenceScope {
    /// Case-insensitive sheet lookup.
    fn sheet_by_name(&self, name: &str) -> Option<SheetId>;

    /// Case-insensitive named-area lookup.
    fn named_area(&self, name: &str) -> Option<(SheetId, Rect)>;

    /// `(max_columns, max_rows)`
    fn grid_bounds(&self) -> (u32, u32);
}

/// Resolves `reference` for a formula living on `current`.
pub fn resolve(scope: &dyn ReferenceScope, reference: &ReferenceType, current: SheetId) -> Reference {
    let (max_cols, max_rows) = scope.grid_bounds();
    let sheet_for = |name: &Option<String>| match name {
        Some(name) => scope.sheet_by_name(name),
        None => Some(current),
    };
    match reference {
        ReferenceType::Cell { sheet, addr } => {
            let Some(id) = sheet_for(sheet) else {
                return Reference::invalid(Problem::UnknownSheet);
            };
            if !addr.is_within(max_cols, max_rows) {
                return Reference::invalid(Problem::OutOfBounds);
            }
            Reference::point(id, *addr)
        }
        ReferenceType::Range { sheet, start, end } => {
            let Some(id) = sheet_for(sheet) else {
                return Reference::invalid(Problem::UnknownSheet);
            };
            let rect = Rect::from_corners(*start, *end);
            if !rect.is_within(max_cols, max_rows) {
                return Reference::invalid(Problem::OutOfBounds);
            }
            Reference::range(id, rect)
        }
        ReferenceType::NamedRange(name) => match scope.named_area(name) {
            Some((id, rect)) => Reference::range(id, rect),
            None => Reference::invalid(Problem::UnknownName),
        },
    }
}

/// Parses and resolves reference text such as `Sheet2!$A1` or `A1:C3`.
pub fn resolve_text(scope: &dyn ReferenceScope, text: &str, current: SheetId) -> Reference {
    match ReferenceType::from_string(text) {
        Ok(reference) => resolve(scope, &reference, current),
        Err(_) => Reference::invalid(Problem::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_common::ErrorKind;

    struct Scope;

    const DATA: SheetId = SheetId::new(1, 0);
    const MAIN: SheetId = SheetId::new(0, 0);

    impl ReferenceScope for Scope {
        fn sheet_by_name(&self, name: &str) -> Option<SheetId> {
            name.eq_ignore_ascii_case("data").then_some(DATA)
        }
        fn named_area(&self, name: &str) -> Option<(SheetId, Rect)> {
            name.eq_ignore_ascii_case("rates")
                .then(|| (DATA, Rect::new(2, 1, 2, 10)))
        }
        fn grid_bounds(&self) -> (u32, u32) {
            (26 * 26, 0x7FFF)
        }
    }

    #[test]
    fn unqualified_references_use_current_sheet() {
        let r = resolve_text(&Scope, "b3", MAIN);
        assert!(r.is_valid());
        assert_eq!(r.sheet, Some(MAIN));
        assert_eq!(r.target, RefTarget::Point(Address::new(2, 3)));
    }

    #[test]
    fn qualified_and_named() {
        let r = resolve_text(&Scope, "DATA!$A$1:B2", MAIN);
        assert_eq!(r.area(), Some((DATA, Rect::new(1, 1, 2, 2))));
        let r = resolve_text(&Scope, "'rates'", MAIN);
        assert_eq!(r.area(), Some((DATA, Rect::new(2, 1, 2, 10))));
        let r = resolve_text(&Scope, "Rates", MAIN);
        assert!(r.is_valid());
    }

    #[test]
    fn failures_are_invalid_references() {
        for text in ["Nope!A1", "ZZZ1", "A40000", "'missing'", "A1:", "1A"] {
            let r = resolve_text(&Scope, text, MAIN);
            assert!(!r.is_valid(), "{text}");
            assert_eq!(r.to_error(text).kind, ErrorKind::InvalidReference);
        }
    }

    #[test]
    fn row_zero_is_malformed_not_a_name() {
        let r = resolve_text(&Scope, "A0", MAIN);
        assert!(!r.is_valid());
        assert_eq!(
            r.to_error("A0").message.as_deref(),
            Some("'A0' is not a valid reference")
        );
    }
}
