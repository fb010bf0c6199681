use gridcalc_common::{Rect, SheetId, Value};
use gridcalc_parse::{Locale, ReferenceType};

use super::EvalConfig;
use super::named_range::NamedAreaTable;
use super::workbook::Workbook;
use crate::interpreter::EvaluationContext;
use crate::reference::{self, CellKey, Reference, ReferenceScope};

/// Read-only view of the engine handed to the interpreter and the
/// dependency manager.
pub struct EngineContext<'a> {
    pub workbook: &'a Workbook,
    pub names: &'a NamedAreaTable,
    pub config: &'a EvalConfig,
}

impl<'a> EngineContext<'a> {
    pub fn new(workbook: &'a Workbook, names: &'a NamedAreaTable, config: &'a EvalConfig) -> Self {
        Self {
            workbook,
            names,
            config,
        }
    }
}

impl ReferenceScope for EngineContext<'_> {
    fn sheet_by_name(&self, name: &str) -> Option<SheetId> {
        self.workbook.sheet_id(name)
    }

    fn named_area(&self, name: &str) -> Option<(SheetId, Rect)> {
        self.names
            .get(name)
            .filter(|area| self.workbook.contains(area.sheet))
            .map(|area| (area.sheet, area.rect))
    }

    fn grid_bounds(&self) -> (u32, u32) {
        (self.config.max_columns, self.config.max_rows)
    }
}

impl EvaluationContext for EngineContext<'_> {
    fn locale(&self) -> Locale {
        self.config.locale
    }

    fn resolve(&self, reference: &ReferenceType, current: SheetId) -> Reference {
        reference::resolve(self, reference, current)
    }

    fn sheet_name(&self, sheet: SheetId) -> Option<&str> {
        self.workbook.sheet(sheet).map(|s| s.name())
    }

    fn cell_value(&self, key: CellKey) -> Value {
        self.workbook
            .sheet(key.sheet)
            .map(|s| s.value_at(key.col, key.row).clone())
            .unwrap_or(Value::Empty)
    }

    fn is_obscured(&self, key: CellKey) -> bool {
        self.workbook
            .sheet(key.sheet)
            .is_some_and(|s| s.is_obscured(key.col, key.row))
    }
}
