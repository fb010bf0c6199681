use gridcalc_common::{Address, Rect};
use gridcalc_parse::{Locale, ReferenceType, TokenSubType, TokenType, Tokenizer, TokenizerError};

/// A row or column insert/delete on one sheet. Lines are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOperation {
    InsertRows { before: u32, count: u32 },
    DeleteRows { start: u32, count: u32 },
    InsertColumns { before: u32, count: u32 },
    DeleteColumns { start: u32, count: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Columns,
}

/// What happened to one edited line index.
enum Line {
    Kept(u32),
    Deleted,
}

impl ShiftOperation {
    pub fn axis(&self) -> Axis {
        match self {
            ShiftOperation::InsertRows { .. } | ShiftOperation::DeleteRows { .. } => Axis::Rows,
            ShiftOperation::InsertColumns { .. } | ShiftOperation::DeleteColumns { .. } => {
                Axis::Columns
            }
        }
    }

    /// First line whose contents move or disappear.
    pub fn first_affected(&self) -> u32 {
        match *self {
            ShiftOperation::InsertRows { before, .. }
            | ShiftOperation::InsertColumns { before, .. } => before,
            ShiftOperation::DeleteRows { start, .. }
            | ShiftOperation::DeleteColumns { start, .. } => start,
        }
    }

    fn map_line(&self, line: u32, limit: u32) -> Line {
        let moved = match *self {
            ShiftOperation::InsertRows { before, count }
            | ShiftOperation::InsertColumns { before, count } => {
                if line < before {
                    line
                } else {
                    line.saturating_add(count)
                }
            }
            ShiftOperation::DeleteRows { start, count }
            | ShiftOperation::DeleteColumns { start, count } => {
                if line < start {
                    line
                } else if line - start < count {
                    return Line::Deleted;
                } else {
                    line - count
                }
            }
        };
        if moved > limit {
            Line::Deleted
        } else {
            Line::Kept(moved)
        }
    }

    /// New position of a stored cell, or `None` when it is deleted or
    /// pushed off the grid. Storage always moves, whatever the `$` markers
    /// of references pointing at it.
    pub fn map_cell(&self, col: u32, row: u32, limit: u32) -> Option<(u32, u32)> {
        match self.axis() {
            Axis::Rows => match self.map_line(row, limit) {
                Line::Kept(r) => Some((col, r)),
                Line::Deleted => None,
            },
            Axis::Columns => match self.map_line(col, limit) {
                Line::Kept(c) => Some((c, row)),
                Line::Deleted => None,
            },
        }
    }

    /// Adjusts a point reference. A fixed axis stays put; a relative axis
    /// follows the cell it points at and is lost when that cell is deleted.
    pub fn adjust_point(&self, addr: Address, limit: u32) -> Option<Address> {
        let (line, fixed) = match self.axis() {
            Axis::Rows => (addr.row, addr.row_fixed()),
            Axis::Columns => (addr.col, addr.col_fixed()),
        };
        if fixed {
            return Some(addr);
        }
        let Line::Kept(new) = self.map_line(line, limit) else {
            return None;
        };
        Some(self.with_line(addr, new))
    }

    fn with_line(&self, addr: Address, line: u32) -> Address {
        match self.axis() {
            Axis::Rows => Address::with_fixed(addr.col, line, addr.col_fixed(), addr.row_fixed()),
            Axis::Columns => {
                Address::with_fixed(line, addr.row, addr.col_fixed(), addr.row_fixed())
            }
        }
    }

    /// Adjusts a range reference given as written. Relative endpoints move;
    /// a range partially covering deleted lines shrinks, one wholly inside
    /// them is lost.
    pub fn adjust_range(&self, start: Address, end: Address, limit: u32) -> Option<(Address, Address)> {
        let (lo, hi) = match self.axis() {
            Axis::Rows if start.row > end.row => (end, start),
            Axis::Columns if start.col > end.col => (end, start),
            _ => (start, end),
        };
        let line = |a: Address| match self.axis() {
            Axis::Rows => (a.row, a.row_fixed()),
            Axis::Columns => (a.col, a.col_fixed()),
        };
        let (lo_line, lo_fixed) = line(lo);
        let (hi_line, hi_fixed) = line(hi);

        let new_lo = if lo_fixed {
            lo_line
        } else {
            self.shift_low_edge(lo_line)
        };
        let new_hi = if hi_fixed {
            hi_line
        } else {
            self.shift_high_edge(hi_line)?
        };
        if new_lo > new_hi || new_lo > limit {
            return None;
        }
        let new_hi = new_hi.min(limit);
        Some((self.with_line(lo, new_lo), self.with_line(hi, new_hi)))
    }

    /// Adjusts a plain rectangle (named area, merged region).
    pub fn adjust_rect(&self, rect: Rect, limit: u32) -> Option<Rect> {
        let (a, b) = self.adjust_range(rect.top_left(), Address::new(rect.col2, rect.row2), limit)?;
        Some(Rect::from_corners(a, b))
    }

    /// Low edge of a range: a deleted low edge snaps to the first line after
    /// the deletion.
    fn shift_low_edge(&self, line: u32) -> u32 {
        match *self {
            ShiftOperation::InsertRows { before, count }
            | ShiftOperation::InsertColumns { before, count } => {
                if line < before {
                    line
                } else {
                    line.saturating_add(count)
                }
            }
            ShiftOperation::DeleteRows { start, count }
            | ShiftOperation::DeleteColumns { start, count } => {
                if line < start {
                    line
                } else if line - start < count {
                    start
                } else {
                    line - count
                }
            }
        }
    }

    /// High edge of a range: a deleted high edge snaps to the last line
    /// before the deletion.
    fn shift_high_edge(&self, line: u32) -> Option<u32> {
        match *self {
            ShiftOperation::InsertRows { before, count }
            | ShiftOperation::InsertColumns { before, count } => Some(if line < before {
                line
            } else {
                line.saturating_add(count)
            }),
            ShiftOperation::DeleteRows { start, count }
            | ShiftOperation::DeleteColumns { start, count } => {
                if line < start {
                    Some(line)
                } else if line - start < count {
                    start.checked_sub(1).filter(|l| *l >= 1)
                } else {
                    Some(line - count)
                }
            }
        }
    }
}

/// Text of an invalidated reference.
pub const DELETED_REFERENCE: &str = "#REF!";

/// Rewrites the cell and range references in `formula`.
///
/// `edit` sees every positional reference and returns replacement text for
/// the ones that change. Everything else, whitespace included, is kept
/// byte for byte. Returns `None` when nothing changed.
pub fn rewrite_references<F>(
    formula: &str,
    locale: Locale,
    mut edit: F,
) -> Result<Option<String>, TokenizerError>
where
    F: FnMut(&ReferenceType) -> Option<String>,
{
    let tokenizer = Tokenizer::new_with_locale(formula, locale)?;
    let mut out = String::with_capacity(formula.len());
    let mut cursor = 0;
    let mut changed = false;
    for token in &tokenizer.items {
        if token.token_type != TokenType::Operand || token.subtype != TokenSubType::Range {
            continue;
        }
        let Ok(reference) = ReferenceType::from_string(&token.value) else {
            continue;
        };
        if matches!(reference, ReferenceType::NamedRange(_)) {
            continue;
        }
        if let Some(replacement) = edit(&reference) {
            out.push_str(&formula[cursor..token.start]);
            out.push_str(&replacement);
            cursor = token.end;
            changed = true;
        }
    }
    if !changed {
        return Ok(None);
    }
    out.push_str(&formula[cursor..]);
    Ok(Some(out))
}

/// Applies `op` to a parsed reference. `None` means unchanged; a deleted
/// reference becomes [`DELETED_REFERENCE`].
pub fn shift_reference(reference: &ReferenceType, op: &ShiftOperation, limit: u32) -> Option<String> {
    let adjusted = match reference {
        ReferenceType::Cell { sheet, addr } => match op.adjust_point(*addr, limit) {
            Some(a) if a == *addr => return None,
            Some(a) => ReferenceType::Cell {
                sheet: sheet.clone(),
                addr: a,
            },
            None => return Some(DELETED_REFERENCE.to_string()),
        },
        ReferenceType::Range { sheet, start, end } => match op.adjust_range(*start, *end, limit) {
            Some((s, e)) if s == *start && e == *end => return None,
            Some((s, e)) => ReferenceType::Range {
                sheet: sheet.clone(),
                start: s,
                end: e,
            },
            None => return Some(DELETED_REFERENCE.to_string()),
        },
        ReferenceType::NamedRange(_) => return None,
    };
    Some(adjusted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: u32 = 0x7FFF;

    fn a(text: &str) -> Address {
        Address::parse_a1(text).unwrap()
    }

    fn shift(formula: &str, op: ShiftOperation) -> String {
        rewrite_references(formula, Locale::invariant(), |r| shift_reference(r, &op, LIMIT))
            .unwrap()
            .unwrap_or_else(|| formula.to_string())
    }

    #[test]
    fn points_follow_their_cells() {
        let del = ShiftOperation::DeleteRows { start: 2, count: 1 };
        assert_eq!(del.adjust_point(a("A1"), LIMIT), Some(a("A1")));
        assert_eq!(del.adjust_point(a("A2"), LIMIT), None);
        assert_eq!(del.adjust_point(a("A3"), LIMIT), Some(a("A2")));
        assert_eq!(del.adjust_point(a("A$3"), LIMIT), Some(a("A$3")));

        let ins = ShiftOperation::InsertColumns { before: 2, count: 2 };
        assert_eq!(ins.adjust_point(a("B5"), LIMIT), Some(a("D5")));
        assert_eq!(ins.adjust_point(a("A5"), LIMIT), Some(a("A5")));
        assert_eq!(ins.adjust_point(a("$B5"), LIMIT), Some(a("$B5")));
    }

    #[test]
    fn ranges_shrink_and_grow() {
        let del = ShiftOperation::DeleteRows { start: 2, count: 2 };
        assert_eq!(del.adjust_range(a("A1"), a("A5"), LIMIT), Some((a("A1"), a("A3"))));
        assert_eq!(del.adjust_range(a("A2"), a("A5"), LIMIT), Some((a("A2"), a("A3"))));
        assert_eq!(del.adjust_range(a("A1"), a("A3"), LIMIT), Some((a("A1"), a("A1"))));
        assert_eq!(del.adjust_range(a("A2"), a("A3"), LIMIT), None);

        let ins = ShiftOperation::InsertRows { before: 3, count: 1 };
        assert_eq!(ins.adjust_range(a("A1"), a("A5"), LIMIT), Some((a("A1"), a("A6"))));
    }

    #[test]
    fn off_grid_cells_are_dropped() {
        let ins = ShiftOperation::InsertRows { before: 1, count: 1 };
        assert_eq!(ins.map_cell(1, LIMIT, LIMIT), None);
        assert_eq!(ins.map_cell(1, 4, LIMIT), Some((1, 5)));
    }

    #[test]
    fn rewrite_keeps_surrounding_text() {
        let del = ShiftOperation::DeleteRows { start: 2, count: 1 };
        assert_eq!(shift("=SUM(A1:A3) +  A3", del), "=SUM(A1:A2) +  A2");
        assert_eq!(shift("=A2*2", del), "=#REF!*2");
        assert_eq!(shift("=\"A3\"&A1", del), "=\"A3\"&A1");
        assert_eq!(shift("=Sheet2!B4", del), "=Sheet2!B3");
    }

    #[test]
    fn names_are_left_alone() {
        let del = ShiftOperation::DeleteRows { start: 1, count: 1 };
        assert_eq!(
            rewrite_references("=SUM(rates)", Locale::invariant(), |r| shift_reference(r, &del, LIMIT))
                .unwrap(),
            None
        );
    }
}
