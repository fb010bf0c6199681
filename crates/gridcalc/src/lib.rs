//! Meta crate that re-exports the gridcalc building blocks. Downstream users
//! can depend on this crate and opt into specific layers via feature flags
//! while keeping access to the underlying crates.

#[cfg(feature = "common")]
pub use gridcalc_common as common;

#[cfg(feature = "parse")]
pub use gridcalc_parse as parse;

#[cfg(feature = "eval")]
pub use gridcalc_eval as eval;

#[cfg(feature = "common")]
pub use gridcalc_common::{Address, CalcError, ErrorKind, Rect, SheetId, Value};

#[cfg(feature = "parse")]
pub use gridcalc_parse::{Locale, canonical_formula, parse, parse_with_locale};

#[cfg(feature = "eval")]
pub use gridcalc_eval::engine::{
    ChangeListener, ChangedRegion, Engine, EvalConfig, EvalResult, RecalcScope, SavedCell,
};

#[cfg(feature = "eval")]
pub use gridcalc_eval::EngineError;

#[cfg(feature = "eval")]
pub mod doc_examples;
