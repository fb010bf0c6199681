pub mod coercion;
pub mod error;
pub mod function;
pub mod function_registry;
pub mod interpreter;
pub mod reference;

pub mod builtins;

pub use error::EngineError;
pub use reference::{CellKey, RefTarget, Reference};

mod macros;
#[cfg(test)]
pub mod test_workbook;

pub mod engine;

pub use gridcalc_common::{Address, CalcError, ErrorKind, Rect, SheetId, Value};
pub use gridcalc_parse::Locale;
