//! Errors for misuse of the engine API.
//!
//! Formula problems never show up here: they are stored in the cell as a
//! [`Value::Error`](gridcalc_common::Value::Error).

use gridcalc_common::{Address, SheetId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no sheet named '{0}'")]
    UnknownSheet(String),

    #[error("sheet handle {0:?} no longer refers to a live sheet")]
    StaleSheet(SheetId),

    #[error("a sheet named '{0}' already exists")]
    DuplicateSheet(String),

    #[error("'{0}' is not a valid sheet name")]
    InvalidSheetName(String),

    #[error("{addr} is outside the {max_columns}x{max_rows} grid")]
    OutOfBounds {
        addr: Address,
        max_columns: u32,
        max_rows: u32,
    },

    #[error("'{0}' is not a valid name")]
    InvalidName(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),
}
