//! Per-cell content, cached value and state flags.

use gridcalc_common::{CalcError, Value};
use gridcalc_parse::ASTNode;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CellFlags: u8 {
        /// Display needs rebuilding. Orthogonal to the value state.
        const LAYOUT_DIRTY  = 0b0000_0001;
        /// Value needs recomputation.
        const CALC_DIRTY    = 0b0000_0010;
        /// On the scheduler's pull stack in the current pass.
        const EVALUATING    = 0b0000_0100;
        /// Cached value is an error.
        const ERROR         = 0b0000_1000;
        /// Formula text loaded but not yet parsed or linked.
        const PARSE_PENDING = 0b0001_0000;
    }
}

/// Value-side state of a cell. `Error` is a clean cell whose value is an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Clean,
    CalcDirty,
    Evaluating,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    text: String,
    /// `None` while parsing is pending.
    parsed: Option<Result<ASTNode, CalcError>>,
    /// Set when the formula parsed but a reference could not be linked.
    link_error: Option<CalcError>,
}

impl Formula {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn ast(&self) -> Option<&ASTNode> {
        match &self.parsed {
            Some(Ok(ast)) => Some(ast),
            _ => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed.is_some()
    }

    /// The error this formula evaluates to without running the
    /// interpreter: a syntax error or a link failure.
    pub fn static_error(&self) -> Option<&CalcError> {
        match &self.parsed {
            Some(Err(e)) => Some(e),
            _ => self.link_error.as_ref(),
        }
    }

    pub fn link_error(&self) -> Option<&CalcError> {
        self.link_error.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Constant(Value),
    Formula(Formula),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    content: CellContent,
    value: Value,
    flags: CellFlags,
}

impl Cell {
    pub fn constant(value: Value) -> Self {
        let mut cell = Self {
            content: CellContent::Constant(value.clone()),
            value: Value::Empty,
            flags: CellFlags::LAYOUT_DIRTY | CellFlags::CALC_DIRTY,
        };
        cell.store_value(value);
        cell
    }

    pub fn formula(text: String, parsed: Result<ASTNode, CalcError>) -> Self {
        Self {
            content: CellContent::Formula(Formula {
                text,
                parsed: Some(parsed),
                link_error: None,
            }),
            value: Value::Empty,
            flags: CellFlags::LAYOUT_DIRTY | CellFlags::CALC_DIRTY,
        }
    }

    /// Formula loaded from storage; parsing waits for the next pass.
    pub fn pending(text: String, cached: Value) -> Self {
        let mut cell = Self {
            content: CellContent::Formula(Formula {
                text,
                parsed: None,
                link_error: None,
            }),
            value: Value::Empty,
            flags: CellFlags::LAYOUT_DIRTY | CellFlags::CALC_DIRTY | CellFlags::PARSE_PENDING,
        };
        cell.store_value(cached);
        cell
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn flags(&self) -> CellFlags {
        self.flags
    }

    pub fn formula_ref(&self) -> Option<&Formula> {
        match &self.content {
            CellContent::Formula(f) => Some(f),
            CellContent::Constant(_) => None,
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self.content, CellContent::Formula(_))
    }

    pub fn formula_text(&self) -> Option<&str> {
        self.formula_ref().map(Formula::text)
    }

    pub fn state(&self) -> CellState {
        if self.flags.contains(CellFlags::EVALUATING) {
            CellState::Evaluating
        } else if self.flags.contains(CellFlags::CALC_DIRTY) {
            CellState::CalcDirty
        } else if self.flags.contains(CellFlags::ERROR) {
            CellState::Error
        } else {
            CellState::Clean
        }
    }

    pub fn is_calc_dirty(&self) -> bool {
        self.flags.contains(CellFlags::CALC_DIRTY)
    }

    pub fn is_evaluating(&self) -> bool {
        self.flags.contains(CellFlags::EVALUATING)
    }

    pub fn is_layout_dirty(&self) -> bool {
        self.flags.contains(CellFlags::LAYOUT_DIRTY)
    }

    pub fn mark_calc_dirty(&mut self) {
        self.flags.insert(CellFlags::CALC_DIRTY);
    }

    pub fn begin_evaluation(&mut self) {
        self.flags.insert(CellFlags::EVALUATING);
    }

    /// Stores a freshly computed value and leaves the cell clean. Returns
    /// true when the value differs from the previous one.
    pub fn finish_evaluation(&mut self, value: Value) -> bool {
        self.flags
            .remove(CellFlags::EVALUATING | CellFlags::CALC_DIRTY);
        let changed = self.value != value;
        if changed {
            self.flags.insert(CellFlags::LAYOUT_DIRTY);
        }
        self.store_value(value);
        changed
    }

    /// Carries a previous value over into a freshly built cell so the next
    /// evaluation can tell whether anything visibly changed.
    pub(crate) fn seed_value(&mut self, value: Value) {
        self.store_value(value);
    }

    pub fn clear_layout_dirty(&mut self) {
        self.flags.remove(CellFlags::LAYOUT_DIRTY);
    }

    /// Replaces the formula text, keeping the cached value. Used when a
    /// structural edit rewrites references.
    pub fn rewrite_formula(&mut self, text: String, parsed: Result<ASTNode, CalcError>) {
        if let CellContent::Formula(f) = &mut self.content {
            f.text = text;
            f.parsed = Some(parsed);
            f.link_error = None;
            self.flags.remove(CellFlags::PARSE_PENDING);
        }
    }

    /// Completes a deferred parse.
    pub fn finish_parse(&mut self, parsed: Result<ASTNode, CalcError>) {
        if let CellContent::Formula(f) = &mut self.content {
            f.parsed = Some(parsed);
        }
        self.flags.remove(CellFlags::PARSE_PENDING);
    }

    pub fn is_parse_pending(&self) -> bool {
        self.flags.contains(CellFlags::PARSE_PENDING)
    }

    pub fn set_link_error(&mut self, err: Option<CalcError>) {
        if let CellContent::Formula(f) = &mut self.content {
            f.link_error = err;
        }
    }

    fn store_value(&mut self, value: Value) {
        self.flags.set(CellFlags::ERROR, value.is_error());
        self.value = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_transitions() {
        let ast = gridcalc_parse::parse("=1+1").unwrap();
        let mut cell = Cell::formula("=1+1".into(), Ok(ast));
        assert_eq!(cell.state(), CellState::CalcDirty);
        cell.begin_evaluation();
        assert_eq!(cell.state(), CellState::Evaluating);
        assert!(cell.finish_evaluation(Value::Number(2.0)));
        assert_eq!(cell.state(), CellState::Clean);
        assert!(cell.is_layout_dirty());
        cell.clear_layout_dirty();

        cell.mark_calc_dirty();
        cell.begin_evaluation();
        assert!(!cell.finish_evaluation(Value::Number(2.0)));
        assert!(!cell.is_layout_dirty());

        cell.mark_calc_dirty();
        cell.finish_evaluation(Value::Error(CalcError::circular()));
        assert_eq!(cell.state(), CellState::Error);
    }

    #[test]
    fn syntax_errors_are_static() {
        let cell = Cell::formula("=1+".into(), Err(CalcError::syntax("unexpected end")));
        let f = cell.formula_ref().unwrap();
        assert!(f.ast().is_none());
        assert!(f.static_error().is_some());
    }

    #[test]
    fn pending_cells_keep_cached_value() {
        let cell = Cell::pending("=A1".into(), Value::Number(3.0));
        assert!(cell.is_parse_pending());
        assert_eq!(cell.value(), &Value::Number(3.0));
        assert!(!cell.formula_ref().unwrap().is_parsed());
    }
}
