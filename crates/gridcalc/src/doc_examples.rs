use crate::{Address, Engine, EvalConfig, Value};

/// Evaluate a formula in a minimal workbook and return the resulting value.
///
/// This helper is intended for documentation examples to avoid repetitive setup.
///
/// # Example
///
/// ```rust
/// # use gridcalc::doc_examples::eval_scalar;
/// let value = eval_scalar("=SUM(1,2,3)")?;
/// assert_eq!(value, gridcalc::Value::Number(6.0));
/// # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
/// ```
pub fn eval_scalar(formula: &str) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
    let mut engine = Engine::new(EvalConfig::default());
    let sheet = engine.add_sheet("Sheet1")?;
    let addr = Address::new(1, 1);
    engine.set_formula(sheet, addr, formula)?;
    Ok(engine.evaluate_cell(sheet, addr)?)
}
