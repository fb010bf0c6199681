//! Common test helpers
use gridcalc_common::{Address, ErrorKind, SheetId, Value};

use crate::engine::{Engine, EvalConfig, EvalResult, RecalcScope};

pub fn a1(text: &str) -> Address {
    Address::parse_a1(text).expect("bad A1 address in test")
}

/// Engine with a single `Sheet1`.
pub fn engine() -> (Engine, SheetId) {
    let mut engine = Engine::new(EvalConfig::default());
    let sheet = engine.add_sheet("Sheet1").unwrap();
    (engine, sheet)
}

pub fn set(engine: &mut Engine, sheet: SheetId, cell: &str, text: &str) {
    engine.set_formula(sheet, a1(cell), text).unwrap();
}

pub fn value(engine: &Engine, sheet: SheetId, cell: &str) -> Value {
    engine.get_value(sheet, a1(cell)).unwrap()
}

pub fn recalc(engine: &mut Engine) -> EvalResult {
    engine.recalculate(RecalcScope::Transitive).unwrap()
}

pub fn num(n: f64) -> Value {
    Value::Number(n)
}

pub fn error_kind(v: &Value) -> Option<ErrorKind> {
    v.as_error().map(|e| e.kind)
}
