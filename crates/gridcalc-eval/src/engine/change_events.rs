//! Batched change notification.
//!
//! A pass never notifies from inside the evaluator. It collects the cells
//! whose visible value changed and, once the pass is over, folds them into
//! rectangles: maximal runs along each row first, then runs with identical
//! column spans on consecutive rows are stacked.

use std::collections::BTreeMap;
use std::time::Duration;

use gridcalc_common::{Rect, SheetId};

use crate::reference::CellKey;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangedRegion {
    pub sheet: SheetId,
    pub rect: Rect,
}

/// Summary of one recalculation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalResult {
    /// Cells evaluated in this pass.
    pub computed_cells: usize,
    /// Cells that ended the pass as `CircularReference`.
    pub cycle_errors: usize,
    pub changed: Vec<ChangedRegion>,
    pub elapsed: Duration,
}

impl EvalResult {
    /// True when `key` lies inside one of the changed regions.
    pub fn touches(&self, key: CellKey) -> bool {
        self.changed
            .iter()
            .any(|r| r.sheet == key.sheet && r.rect.contains(key.col, key.row))
    }
}

/// Receives one batch per pass.
pub trait ChangeListener {
    fn on_recalculated(&mut self, result: &EvalResult);
}

impl<F> ChangeListener for F
where
    F: FnMut(&EvalResult),
{
    fn on_recalculated(&mut self, result: &EvalResult) {
        self(result)
    }
}

/// Folds cells into rectangles, per sheet, in sheet-id then row-major order.
pub fn coalesce<I>(cells: I) -> Vec<ChangedRegion>
where
    I: IntoIterator<Item = CellKey>,
{
    let mut by_sheet: BTreeMap<SheetId, BTreeMap<u32, Vec<u32>>> = BTreeMap::new();
    for key in cells {
        by_sheet
            .entry(key.sheet)
            .or_default()
            .entry(key.row)
            .or_default()
            .push(key.col);
    }

    let mut out = Vec::new();
    for (sheet, rows) in by_sheet {
        // Open rectangles that may still grow downwards, keyed by column span.
        let mut open: Vec<Rect> = Vec::new();
        for (row, mut cols) in rows {
            cols.sort_unstable();
            cols.dedup();
            let mut runs = Vec::new();
            let mut iter = cols.into_iter();
            if let Some(first) = iter.next() {
                let (mut start, mut end) = (first, first);
                for c in iter {
                    if c == end + 1 {
                        end = c;
                    } else {
                        runs.push((start, end));
                        start = c;
                        end = c;
                    }
                }
                runs.push((start, end));
            }

            let mut still_open = Vec::with_capacity(runs.len());
            for (c1, c2) in runs {
                let grown = open
                    .iter()
                    .position(|r| r.col1 == c1 && r.col2 == c2 && r.row2 + 1 == row);
                match grown {
                    Some(i) => {
                        let mut rect = open.swap_remove(i);
                        rect.row2 = row;
                        still_open.push(rect);
                    }
                    None => still_open.push(Rect::new(c1, row, c2, row)),
                }
            }
            // Whatever did not grow this row is final.
            out.extend(open.drain(..).map(|rect| ChangedRegion { sheet, rect }));
            open = still_open;
        }
        out.extend(open.into_iter().map(|rect| ChangedRegion { sheet, rect }));
    }
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const S: SheetId = SheetId::new(0, 0);

    fn k(col: u32, row: u32) -> CellKey {
        CellKey::new(S, col, row)
    }

    #[test]
    fn row_runs_merge() {
        let regions = coalesce([k(1, 1), k(2, 1), k(3, 1), k(5, 1)]);
        assert_eq!(
            regions,
            vec![
                ChangedRegion { sheet: S, rect: Rect::new(1, 1, 3, 1) },
                ChangedRegion { sheet: S, rect: Rect::new(5, 1, 5, 1) },
            ]
        );
    }

    #[test]
    fn matching_runs_stack_vertically() {
        let regions = coalesce([k(1, 1), k(2, 1), k(1, 2), k(2, 2), k(1, 3)]);
        assert_eq!(
            regions,
            vec![
                ChangedRegion { sheet: S, rect: Rect::new(1, 1, 2, 2) },
                ChangedRegion { sheet: S, rect: Rect::new(1, 3, 1, 3) },
            ]
        );
    }

    #[test]
    fn gaps_between_rows_split() {
        let regions = coalesce([k(1, 1), k(1, 3)]);
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn sheets_stay_apart() {
        let other = SheetId::new(1, 0);
        let regions = coalesce([k(1, 1), CellKey::new(other, 1, 1)]);
        assert_eq!(regions.len(), 2);
        assert!(regions.iter().any(|r| r.sheet == other));
    }

    #[test]
    fn closures_are_listeners() {
        let mut seen = 0;
        let mut listener = |r: &EvalResult| seen += r.computed_cells;
        listener.on_recalculated(&EvalResult {
            computed_cells: 3,
            ..Default::default()
        });
        assert_eq!(seen, 3);
    }
}
