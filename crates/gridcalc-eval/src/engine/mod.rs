//! Gridcalc recalculation engine
//!
//! Owns the workbook, tracks dependencies between cells and recomputes
//! dirty cells on request.

pub mod cell;
pub mod change_events;
pub mod context;
pub mod editor;
pub mod eval;
pub mod graph;
pub mod named_range;
pub mod persist;
pub mod scheduler;
pub mod sheet;
pub mod workbook;

#[cfg(test)]
mod tests;

pub use cell::{Cell, CellContent, CellFlags, CellState, Formula};
pub use change_events::{ChangeListener, ChangedRegion, EvalResult};
pub use editor::ShiftOperation;
pub use eval::Engine;
pub use graph::{Dependency, DependencyGraph};
pub use named_range::{NamedArea, NamedAreaTable};
pub use persist::SavedCell;
pub use scheduler::RecalcScope;
pub use sheet::Sheet;
pub use workbook::Workbook;

use gridcalc_common::{DEFAULT_MAX_COLUMNS, DEFAULT_MAX_ROWS};
use gridcalc_parse::Locale;

/// Configuration for the evaluation engine
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Separators for formula text and text-to-number coercion.
    pub locale: Locale,
    /// Run a transitive pass after every edit.
    pub auto_recalculate: bool,
    pub max_columns: u32,
    pub max_rows: u32,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            locale: Locale::invariant(),
            auto_recalculate: false,
            max_columns: DEFAULT_MAX_COLUMNS,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}
