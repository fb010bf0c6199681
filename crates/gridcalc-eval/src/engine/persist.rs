//! Boundary with the persistence layer.
//!
//! Saving yields the cell's source text and cached value. Loading stores the
//! text unparsed; parsing, linking and evaluation wait for the next pass so
//! that nothing is evaluated before the whole sheet is in memory.
//!
//! Text constants that would read back as a formula, number or boolean are
//! saved behind a leading [`TEXT_PREFIX`].

use gridcalc_common::{Address, SheetId, Value};

use super::cell::{Cell, CellContent};
use super::eval::Engine;
use crate::coercion::parse_constant;
use crate::error::EngineError;

/// Marks saved text that must load as text whatever it looks like.
pub const TEXT_PREFIX: char = '\'';

/// What the persistence layer stores for one cell.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SavedCell {
    /// Formula text including `=`, or the constant written as source text.
    pub formula: String,
    pub cached: Value,
}

impl Engine {
    /// `None` for unmaterialised cells.
    pub fn save_cell(&self, sheet: SheetId, addr: Address) -> Result<Option<SavedCell>, EngineError> {
        let key = self.check_address(sheet, addr)?;
        let Some(cell) = self.cell(key) else {
            return Ok(None);
        };
        let formula = match cell.content() {
            CellContent::Formula(f) => f.text().to_string(),
            CellContent::Constant(Value::Text(t)) => self.text_source(t),
            CellContent::Constant(v) => v.to_source_text(self.config.locale.decimal_separator),
        };
        Ok(Some(SavedCell {
            formula,
            cached: cell.value().clone(),
        }))
    }

    /// Stores saved text. Formulas keep `cached` as their value until the
    /// next pass parses and recomputes them; constants are read from the
    /// text.
    pub fn load_cell(
        &mut self,
        sheet: SheetId,
        addr: Address,
        text: &str,
        cached: Value,
    ) -> Result<(), EngineError> {
        let key = self.check_address(sheet, addr)?;
        if let Some(rest) = text.strip_prefix(TEXT_PREFIX) {
            self.take_cell(key);
            self.store(key, Cell::constant(Value::Text(rest.to_string())));
            self.mark_dirty([key]);
            return Ok(());
        }
        if !text.starts_with('=') {
            let value = parse_constant(text, &self.config.locale);
            if value.is_empty() {
                return self.clear_cell(sheet, addr);
            }
            self.take_cell(key);
            self.store(key, Cell::constant(value));
            self.mark_dirty([key]);
            return Ok(());
        }
        self.take_cell(key);
        self.store(key, Cell::pending(text.to_string(), cached));
        self.pending_parse.insert(key);
        self.dirty.insert(key);
        Ok(())
    }

    fn text_source(&self, text: &str) -> String {
        let ambiguous = text.starts_with('=')
            || text.starts_with(TEXT_PREFIX)
            || parse_constant(text, &self.config.locale) != Value::Text(text.to_string());
        if ambiguous {
            format!("{TEXT_PREFIX}{text}")
        } else {
            text.to_string()
        }
    }

    /// Saves every materialised cell of `sheet` in storage order.
    pub fn save_sheet(&self, sheet: SheetId) -> Result<Vec<(Address, SavedCell)>, EngineError> {
        let s = self.workbook.get(sheet)?;
        let mut out = Vec::with_capacity(s.len());
        for (col, row, _) in s.iter() {
            let addr = Address::new(col, row);
            if let Some(saved) = self.save_cell(sheet, addr)? {
                out.push((addr, saved));
            }
        }
        Ok(out)
    }
}
