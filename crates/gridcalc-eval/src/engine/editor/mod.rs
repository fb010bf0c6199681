//! Structural edits: row/column insert and delete, sheet rename.
//!
//! Formula text is rewritten workbook-wide before anything is recalculated.
//! The graph is then rebuilt from the rewritten formulas, and every cell
//! whose text changed or that read a moved address is marked dirty.

pub mod reference_adjuster;

pub use reference_adjuster::{Axis, ShiftOperation};

use std::collections::BTreeSet;

use gridcalc_common::{CalcError, Rect, SheetId};
use gridcalc_parse::{ReferenceType, parse_with_locale};
use tracing::{debug, info_span, trace};

use self::reference_adjuster::{rewrite_references, shift_reference};
use super::eval::Engine;
use crate::error::EngineError;
use crate::reference::CellKey;

impl Engine {
    pub fn insert_rows(&mut self, sheet: SheetId, before: u32, count: u32) -> Result<(), EngineError> {
        self.apply_shift(sheet, ShiftOperation::InsertRows { before, count })
    }

    pub fn delete_rows(&mut self, sheet: SheetId, start: u32, count: u32) -> Result<(), EngineError> {
        self.apply_shift(sheet, ShiftOperation::DeleteRows { start, count })
    }

    pub fn insert_columns(&mut self, sheet: SheetId, before: u32, count: u32) -> Result<(), EngineError> {
        self.apply_shift(sheet, ShiftOperation::InsertColumns { before, count })
    }

    pub fn delete_columns(&mut self, sheet: SheetId, start: u32, count: u32) -> Result<(), EngineError> {
        self.apply_shift(sheet, ShiftOperation::DeleteColumns { start, count })
    }

    /// Formula text of every formula cell, keyed by position.
    fn formula_texts(&self) -> Vec<(CellKey, String)> {
        let mut out = Vec::new();
        for (id, sheet) in self.workbook.iter() {
            for (col, row, cell) in sheet.iter() {
                if let Some(text) = cell.formula_text() {
                    out.push((CellKey::new(id, col, row), text.to_string()));
                }
            }
        }
        out
    }

    /// Replaces a formula's text and AST in place.
    fn replace_formula_text(&mut self, key: CellKey, text: String) {
        let parsed = parse_with_locale(&text, self.config.locale).map_err(CalcError::from);
        if let Some(cell) = self
            .workbook
            .sheet_mut(key.sheet)
            .and_then(|s| s.get_mut(key.col, key.row))
        {
            trace!(cell = %key, formula = %text, "formula rewritten");
            cell.rewrite_formula(text, parsed);
        }
        self.pending_parse.remove(&key);
    }

    pub fn apply_shift(&mut self, sheet: SheetId, op: ShiftOperation) -> Result<(), EngineError> {
        let sheet_name = self.workbook.get(sheet)?.name().to_lowercase();
        let (max_cols, max_rows) = (self.config.max_columns, self.config.max_rows);
        let limit = match op.axis() {
            Axis::Rows => max_rows,
            Axis::Columns => max_cols,
        };
        let first = op.first_affected();
        let count = match op {
            ShiftOperation::InsertRows { count, .. }
            | ShiftOperation::DeleteRows { count, .. }
            | ShiftOperation::InsertColumns { count, .. }
            | ShiftOperation::DeleteColumns { count, .. } => count,
        };
        if count == 0 || first == 0 || first > limit {
            return Err(EngineError::InvalidRange(format!("{op:?}")));
        }

        let span = info_span!("structural_edit", ?op);
        let _enter = span.enter();

        let affected = match op.axis() {
            Axis::Rows => Rect::new(1, first, max_cols, max_rows),
            Axis::Columns => Rect::new(first, 1, max_cols, max_rows),
        };
        let old_readers = self.graph.dependents_of_rect(sheet, &affected);
        let moved_before: Vec<(u32, u32)> = self.workbook.get(sheet)?.positions_in(&affected);

        // Rewrite text while every cell is still at its old position.
        let locale = self.config.locale;
        let mut rewritten = Vec::new();
        for (key, text) in self.formula_texts() {
            let outcome = rewrite_references(&text, locale, |r| {
                let targets_sheet = match r.sheet() {
                    Some(name) => name.to_lowercase() == sheet_name,
                    None => key.sheet == sheet,
                };
                if targets_sheet {
                    shift_reference(r, &op, limit)
                } else {
                    None
                }
            });
            match outcome {
                Ok(Some(new_text)) => rewritten.push((key, new_text)),
                Ok(None) => {}
                // Text that does not tokenize has no references to move.
                Err(err) => trace!(cell = %key, error = %err, "formula left as is"),
            }
        }

        let map_key = |k: CellKey| -> Option<CellKey> {
            if k.sheet != sheet {
                return Some(k);
            }
            op.map_cell(k.col, k.row, limit)
                .map(|(c, r)| CellKey::new(sheet, c, r))
        };

        let target = self.workbook.get_mut(sheet)?;
        let dropped = target.remap_cells(|c, r| op.map_cell(c, r, limit));
        target.remap_merges(|m| op.adjust_rect(m, limit));
        let moved_after = target.positions_in(&affected);
        let moved_names = self.names.adjust(sheet, |r| op.adjust_rect(r, limit));

        let mut seeds: BTreeSet<CellKey> = BTreeSet::new();
        for name in &moved_names {
            seeds.extend(self.graph.consumers_of_name(name).into_iter().filter_map(map_key));
        }
        seeds.extend(old_readers.into_iter().filter_map(map_key));

        let rewritten_count = rewritten.len();
        for (old_key, text) in rewritten {
            if let Some(key) = map_key(old_key) {
                self.replace_formula_text(key, text);
                seeds.insert(key);
            }
        }

        self.dirty = std::mem::take(&mut self.dirty)
            .into_iter()
            .filter_map(map_key)
            .collect();
        self.pending_parse = std::mem::take(&mut self.pending_parse)
            .into_iter()
            .filter_map(map_key)
            .collect();
        self.pending_changes = std::mem::take(&mut self.pending_changes)
            .into_iter()
            .filter_map(map_key)
            .collect();
        for (col, row) in moved_before.into_iter().chain(moved_after) {
            self.pending_changes.insert(CellKey::new(sheet, col, row));
        }

        self.graph.reset();
        let formulas: Vec<CellKey> = self.formula_texts().into_iter().map(|(k, _)| k).collect();
        self.relink_all(formulas);

        debug!(
            rewritten = rewritten_count,
            dropped = dropped.len(),
            names = moved_names.len(),
            "structural edit applied"
        );
        self.mark_dirty(seeds);
        self.after_edit();
        Ok(())
    }

    /// Renames a sheet and rewrites every formula qualifier naming it.
    pub fn rename_sheet(&mut self, id: SheetId, name: &str) -> Result<(), EngineError> {
        let old = self.workbook.rename_sheet(id, name)?;
        if old == name {
            return Ok(());
        }
        let old_lower = old.to_lowercase();
        let locale = self.config.locale;

        let mut seeds = Vec::new();
        for (key, text) in self.formula_texts() {
            let outcome = rewrite_references(&text, locale, |r: &ReferenceType| {
                r.sheet()
                    .filter(|s| s.to_lowercase() == old_lower)
                    .map(|_| r.with_sheet(Some(name.to_string())).to_string())
            });
            if let Ok(Some(new_text)) = outcome {
                self.replace_formula_text(key, new_text);
                self.relink(key);
                seeds.push(key);
            }
        }
        debug!(from = %old, to = name, rewritten = seeds.len(), "sheet renamed");

        // Formulas that named the new sheet before it existed resolve now.
        for key in self.graph.unresolved() {
            self.relink(key);
            seeds.push(key);
        }
        self.mark_dirty(seeds);
        self.after_edit();
        Ok(())
    }
}
