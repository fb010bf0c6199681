//! Lightweight in-memory workbook for interpreter and builtin unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use gridcalc_common::{
    Address, DEFAULT_MAX_COLUMNS, DEFAULT_MAX_ROWS, Rect, SheetId, Value,
};
use gridcalc_parse::{Locale, ReferenceType, parse_with_locale};

use crate::function::Function;
use crate::function_registry;
use crate::interpreter::{EvaluationContext, Interpreter};
use crate::reference::{self, CellKey, Reference, ReferenceScope};

#[derive(Default)]
struct Sheet {
    name: String,
    cells: HashMap<(u32, u32), Value>,
    merges: Vec<Rect>,
}

pub struct TestWorkbook {
    sheets: Vec<Sheet>,
    names: HashMap<String, (SheetId, Rect)>,
    fns: HashMap<&'static str, Arc<dyn Function>>,
    locale: Locale,
}

impl Default for TestWorkbook {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkbook {
    /// A workbook with a single empty `Sheet1`.
    pub fn new() -> Self {
        Self {
            sheets: vec![Sheet {
                name: "Sheet1".into(),
                ..Default::default()
            }],
            names: HashMap::new(),
            fns: HashMap::new(),
            locale: Locale::invariant(),
        }
    }

    pub fn with_sheet(mut self, name: &str) -> Self {
        self.sheets.push(Sheet {
            name: name.into(),
            ..Default::default()
        });
        self
    }

    pub fn sheet(&self, name: &str) -> SheetId {
        self.sheet_by_name(name).expect("unknown sheet in test")
    }

    fn sheet_mut(&mut self, name: &str) -> &mut Sheet {
        let idx = self.sheet(name).index() as usize;
        &mut self.sheets[idx]
    }

    pub fn with_cell_a1(mut self, sheet: &str, a1: &str, v: Value) -> Self {
        let addr = Address::parse_a1(a1).expect("bad A1 ref in with_cell_a1");
        self.sheet_mut(sheet).cells.insert((addr.col, addr.row), v);
        self
    }

    pub fn with_merge(mut self, sheet: &str, a1: &str) -> Self {
        let rect = Rect::parse_a1(a1).expect("bad A1 range in with_merge");
        self.sheet_mut(sheet).merges.push(rect);
        self
    }

    pub fn with_named_area(mut self, name: &str, sheet: &str, a1: &str) -> Self {
        let rect = Rect::parse_a1(a1).expect("bad A1 range in with_named_area");
        let id = self.sheet(sheet);
        self.names.insert(name.to_ascii_lowercase(), (id, rect));
        self
    }

    pub fn with_function(mut self, func: Arc<dyn Function>) -> Self {
        self.fns.insert(func.name(), func);
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Interpreter positioned on `Sheet1`.
    pub fn interpreter(&self) -> Interpreter<'_> {
        Interpreter::new(self, SheetId::new(0, 0))
    }

    /// Parses and evaluates `formula` on `Sheet1`.
    pub fn eval(&self, formula: &str) -> Value {
        match parse_with_locale(formula, self.locale) {
            Ok(ast) => self.interpreter().evaluate(&ast),
            Err(e) => Value::Error(e.into()),
        }
    }
}

impl ReferenceScope for TestWorkbook {
    fn sheet_by_name(&self, name: &str) -> Option<SheetId> {
        self.sheets
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
            .map(|i| SheetId::new(i as u32, 0))
    }

    fn named_area(&self, name: &str) -> Option<(SheetId, Rect)> {
        self.names.get(&name.to_ascii_lowercase()).copied()
    }

    fn grid_bounds(&self) -> (u32, u32) {
        (DEFAULT_MAX_COLUMNS, DEFAULT_MAX_ROWS)
    }
}

impl EvaluationContext for TestWorkbook {
    fn locale(&self) -> Locale {
        self.locale
    }

    fn resolve(&self, reference: &ReferenceType, current: SheetId) -> Reference {
        reference::resolve(self, reference, current)
    }

    fn sheet_name(&self, sheet: SheetId) -> Option<&str> {
        self.sheets
            .get(sheet.index() as usize)
            .map(|s| s.name.as_str())
    }

    fn cell_value(&self, key: CellKey) -> Value {
        self.sheets
            .get(key.sheet.index() as usize)
            .and_then(|s| s.cells.get(&(key.col, key.row)).cloned())
            .unwrap_or_default()
    }

    fn is_obscured(&self, key: CellKey) -> bool {
        self.sheets
            .get(key.sheet.index() as usize)
            .is_some_and(|s| {
                s.merges.iter().any(|m| {
                    m.contains(key.col, key.row) && !(m.col1 == key.col && m.row1 == key.row)
                })
            })
    }

    fn get_function(&self, name: &str) -> Option<Arc<dyn Function>> {
        if let Some(f) = self.fns.get(name) {
            return Some(Arc::clone(f));
        }
        crate::builtins::load_builtins();
        function_registry::get(name)
    }
}
