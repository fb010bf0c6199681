use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use gridcalc_common::{Address, CalcError, Rect, SheetId, Value};
use gridcalc_parse::parse_with_locale;
use tracing::{debug, info, info_span, trace, warn};

use super::EvalConfig;
use super::cell::{Cell, CellState};
use super::change_events::{ChangeListener, EvalResult, coalesce};
use super::context::EngineContext;
use super::graph::{Dependency, DependencyGraph};
use super::named_range::{NamedArea, NamedAreaTable};
use super::scheduler::{RecalcScope, Scheduler};
use super::workbook::Workbook;
use crate::builtins::load_builtins;
use crate::coercion::parse_constant;
use crate::error::EngineError;
use crate::function::Function;
use crate::function_registry;
use crate::interpreter::Interpreter;
use crate::reference::CellKey;

/// The recalculation engine: workbook storage, dependency graph and
/// scheduler behind one editing API.
///
/// Edits only mark cells dirty unless [`EvalConfig::auto_recalculate`] is
/// set; values are brought up to date by [`Engine::recalculate`].
pub struct Engine {
    pub(crate) config: EvalConfig,
    pub(crate) workbook: Workbook,
    pub(crate) names: NamedAreaTable,
    pub(crate) graph: DependencyGraph,
    pub(crate) dirty: BTreeSet<CellKey>,
    /// Loaded formulas whose text has not been parsed yet.
    pub(crate) pending_parse: BTreeSet<CellKey>,
    /// Cells whose visible value changed outside the scheduler (cleared,
    /// replaced by a constant, moved) since the last pass.
    pub(crate) pending_changes: BTreeSet<CellKey>,
    listener: Option<Box<dyn ChangeListener>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EvalConfig::default())
    }
}

impl Engine {
    pub fn new(config: EvalConfig) -> Self {
        load_builtins();
        Self {
            config,
            workbook: Workbook::new(),
            names: NamedAreaTable::new(),
            graph: DependencyGraph::new(),
            dirty: BTreeSet::new(),
            pending_parse: BTreeSet::new(),
            pending_changes: BTreeSet::new(),
            listener: None,
        }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Adds `f` to the process-wide function library.
    pub fn register_function(f: Arc<dyn Function>) {
        function_registry::register(f);
    }

    /* ─────────────────────────── sheets ─────────────────────────── */

    pub fn add_sheet(&mut self, name: &str) -> Result<SheetId, EngineError> {
        let id = self.workbook.add_sheet(name)?;
        debug!(sheet = name, "sheet added");
        // Formulas naming this sheet may resolve now.
        self.relink_unresolved();
        self.after_edit();
        Ok(id)
    }

    /// Destroys the sheet and its cells. Formulas elsewhere that read it are
    /// relinked and end up as reference errors.
    pub fn remove_sheet(&mut self, id: SheetId) -> Result<(), EngineError> {
        self.workbook.get(id)?;
        let mut consumers: BTreeSet<CellKey> = self.graph.consumers_of_sheet(id).into_iter().collect();
        for name in self.names.remove_sheet(id) {
            consumers.extend(self.graph.consumers_of_name(&name));
        }
        consumers.retain(|k| k.sheet != id);

        let sheet = self.workbook.remove_sheet(id)?;
        for (col, row, _) in sheet.iter() {
            self.graph.invalidate(CellKey::new(id, col, row));
        }
        self.dirty.retain(|k| k.sheet != id);
        self.pending_parse.retain(|k| k.sheet != id);
        self.pending_changes.retain(|k| k.sheet != id);
        debug!(sheet = sheet.name(), readers = consumers.len(), "sheet removed");

        self.relink_all(consumers.iter().copied());
        self.mark_dirty(consumers);
        self.after_edit();
        Ok(())
    }

    /// Case-insensitive.
    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.workbook.sheet_id(name)
    }

    pub fn sheet_name(&self, id: SheetId) -> Option<&str> {
        self.workbook.sheet(id).map(|s| s.name())
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook
            .iter()
            .map(|(_, s)| s.name().to_string())
            .collect()
    }

    /* ─────────────────────────── cells ──────────────────────────── */

    pub(crate) fn check_address(&self, sheet: SheetId, addr: Address) -> Result<CellKey, EngineError> {
        self.workbook.get(sheet)?;
        if !addr.is_within(self.config.max_columns, self.config.max_rows) {
            return Err(EngineError::OutOfBounds {
                addr,
                max_columns: self.config.max_columns,
                max_rows: self.config.max_rows,
            });
        }
        Ok(CellKey::new(sheet, addr.col, addr.row))
    }

    /// Stores `text` at `addr`. Text starting with `=` is a formula; anything
    /// else is read as a number, a boolean or plain text.
    ///
    /// A formula that fails to parse is still stored; its value becomes the
    /// syntax error.
    pub fn set_formula(&mut self, sheet: SheetId, addr: Address, text: &str) -> Result<(), EngineError> {
        let key = self.check_address(sheet, addr)?;
        if !text.starts_with('=') {
            let value = parse_constant(text, &self.config.locale);
            return self.set_value(sheet, addr, value);
        }

        let parsed = parse_with_locale(text, self.config.locale).map_err(CalcError::from);
        if let Err(err) = &parsed {
            debug!(cell = %key, error = %err, "formula failed to parse");
        }
        let mut cell = Cell::formula(text.to_string(), parsed);
        if let Some(previous) = self.take_cell(key) {
            cell.seed_value(previous.value().clone());
        }
        self.store(key, cell);
        self.relink(key);
        self.mark_dirty([key]);
        self.after_edit();
        Ok(())
    }

    /// Stores a constant. [`Value::Empty`] clears the cell.
    pub fn set_value(&mut self, sheet: SheetId, addr: Address, value: Value) -> Result<(), EngineError> {
        let key = self.check_address(sheet, addr)?;
        if value.is_empty() {
            return self.clear_cell(sheet, addr);
        }
        let previous = self.take_cell(key);
        if previous.as_ref().map(Cell::value) != Some(&value) {
            self.pending_changes.insert(key);
        }
        self.store(key, Cell::constant(value));
        self.mark_dirty([key]);
        self.after_edit();
        Ok(())
    }

    /// Dematerialises the cell; readers see the default value again.
    pub fn clear_cell(&mut self, sheet: SheetId, addr: Address) -> Result<(), EngineError> {
        let key = self.check_address(sheet, addr)?;
        let Some(previous) = self.take_cell(key) else {
            return Ok(());
        };
        self.dirty.remove(&key);
        if !previous.value().is_empty() {
            self.pending_changes.insert(key);
        }
        self.mark_dirty([key]);
        self.after_edit();
        Ok(())
    }

    /// Last computed value; dirty cells report their previous value.
    pub fn get_value(&self, sheet: SheetId, addr: Address) -> Result<Value, EngineError> {
        let key = self.check_address(sheet, addr)?;
        Ok(self
            .workbook
            .sheet(key.sheet)
            .map(|s| s.value_at(key.col, key.row).clone())
            .unwrap_or_default())
    }

    /// `None` for unmaterialised cells.
    pub fn cell_state(&self, sheet: SheetId, addr: Address) -> Option<CellState> {
        self.cell(CellKey::new(sheet, addr.col, addr.row))
            .map(Cell::state)
    }

    pub fn formula(&self, sheet: SheetId, addr: Address) -> Option<String> {
        self.cell(CellKey::new(sheet, addr.col, addr.row))
            .and_then(Cell::formula_text)
            .map(str::to_string)
    }

    pub fn cell(&self, key: CellKey) -> Option<&Cell> {
        self.workbook
            .sheet(key.sheet)
            .and_then(|s| s.get(key.col, key.row))
    }

    /// Cells waiting for the next pass, in storage order per sheet id.
    pub fn dirty_cells(&self) -> Vec<CellKey> {
        self.dirty.iter().copied().collect()
    }

    /* ─────────────────────────── evaluation ─────────────────────── */

    pub fn recalculate(&mut self, scope: RecalcScope) -> Result<EvalResult, EngineError> {
        if let RecalcScope::Cell(key) = scope {
            self.check_address(key.sheet, key.address())?;
        }
        Ok(self.run_pass(scope))
    }

    fn run_pass(&mut self, scope: RecalcScope) -> EvalResult {
        let start = Instant::now();
        let span = info_span!("recalculate", ?scope);
        let _enter = span.enter();

        self.parse_pending();
        let stats = Scheduler::new(
            &mut self.workbook,
            &self.names,
            &self.graph,
            &self.config,
            &mut self.dirty,
        )
        .run(scope);

        let mut changed = std::mem::take(&mut self.pending_changes);
        changed.extend(stats.changed);
        let result = EvalResult {
            computed_cells: stats.computed,
            cycle_errors: stats.cycle_errors,
            changed: coalesce(changed),
            elapsed: start.elapsed(),
        };
        info!(
            computed = result.computed_cells,
            cycle_errors = result.cycle_errors,
            regions = result.changed.len(),
            "recalculation finished"
        );
        if let Some(listener) = self.listener.as_mut() {
            listener.on_recalculated(&result);
        }
        result
    }

    /// Recalculates one cell (pulling whatever it reads) and returns its
    /// value.
    pub fn evaluate_cell(&mut self, sheet: SheetId, addr: Address) -> Result<Value, EngineError> {
        let key = self.check_address(sheet, addr)?;
        self.recalculate(RecalcScope::Cell(key))?;
        self.get_value(sheet, addr)
    }

    /// Evaluates `text` as if it were a formula on `sheet`, without storing
    /// it. Reads the values currently cached in the grid.
    pub fn evaluate_expression(&self, sheet: SheetId, text: &str) -> Result<Value, EngineError> {
        self.workbook.get(sheet)?;
        let source = if text.starts_with('=') {
            text.to_string()
        } else {
            format!("={text}")
        };
        let ast = match parse_with_locale(&source, self.config.locale) {
            Ok(ast) => ast,
            Err(err) => return Ok(Value::Error(err.into())),
        };
        let ctx = EngineContext::new(&self.workbook, &self.names, &self.config);
        Ok(Interpreter::new(&ctx, sheet).evaluate(&ast))
    }

    /* ─────────────────────────── names ──────────────────────────── */

    pub fn define_name(&mut self, name: &str, sheet: SheetId, rect: Rect) -> Result<(), EngineError> {
        self.workbook.get(sheet)?;
        if !rect.is_within(self.config.max_columns, self.config.max_rows) {
            return Err(EngineError::InvalidRange(rect.to_string()));
        }
        if let Err(err) = self.names.define(name, sheet, rect) {
            warn!(name, "rejected name definition");
            return Err(err);
        }
        self.refresh_name(name);
        Ok(())
    }

    /// Returns false when no such name existed.
    pub fn remove_name(&mut self, name: &str) -> bool {
        if self.names.remove(name).is_none() {
            return false;
        }
        self.refresh_name(name);
        true
    }

    fn refresh_name(&mut self, name: &str) {
        let consumers = self.graph.consumers_of_name(name);
        debug!(name, readers = consumers.len(), "name changed");
        self.relink_all(consumers.iter().copied());
        self.mark_dirty(consumers);
        self.after_edit();
    }

    pub fn named_area(&self, name: &str) -> Option<&NamedArea> {
        self.names.get(name)
    }

    pub fn names(&self) -> Vec<NamedArea> {
        self.names.iter().cloned().collect()
    }

    /* ─────────────────────────── merges ─────────────────────────── */

    pub fn merge_cells(&mut self, sheet: SheetId, rect: Rect) -> Result<(), EngineError> {
        if !rect.is_within(self.config.max_columns, self.config.max_rows) {
            return Err(EngineError::InvalidRange(rect.to_string()));
        }
        if !self.workbook.get_mut(sheet)?.add_merge(rect) {
            return Err(EngineError::InvalidRange(format!(
                "{rect} is a single cell or overlaps an existing merge"
            )));
        }
        let readers = self.graph.dependents_of_rect(sheet, &rect);
        self.mark_dirty(readers);
        self.after_edit();
        Ok(())
    }

    /// Returns false when `rect` was not merged.
    pub fn unmerge_cells(&mut self, sheet: SheetId, rect: Rect) -> Result<bool, EngineError> {
        if !self.workbook.get_mut(sheet)?.remove_merge(&rect) {
            return Ok(false);
        }
        let readers = self.graph.dependents_of_rect(sheet, &rect);
        self.mark_dirty(readers);
        self.after_edit();
        Ok(true)
    }

    /* ─────────────────────────── observers ──────────────────────── */

    pub fn set_listener<L>(&mut self, listener: L)
    where
        L: ChangeListener + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    pub fn dependents_of(&self, sheet: SheetId, addr: Address) -> Vec<CellKey> {
        self.graph
            .dependents_of(CellKey::new(sheet, addr.col, addr.row))
    }

    pub fn precedents_of(&self, sheet: SheetId, addr: Address) -> Vec<Dependency> {
        self.graph
            .precedents_of(CellKey::new(sheet, addr.col, addr.row))
            .to_vec()
    }

    /// Re-serialises a formula with upper-cased references and minimal
    /// parentheses.
    pub fn canonical_formula(&self, text: &str) -> Result<String, CalcError> {
        gridcalc_parse::canonical_formula(text, &self.config.locale).map_err(CalcError::from)
    }

    /// Cells whose display needs rebuilding; clears the flag.
    pub fn take_layout_dirty(&mut self) -> Vec<CellKey> {
        let mut out = Vec::new();
        for id in self.workbook.sheet_ids().to_vec() {
            if let Some(sheet) = self.workbook.sheet_mut(id) {
                for (col, row, cell) in sheet.iter_mut() {
                    if cell.is_layout_dirty() {
                        cell.clear_layout_dirty();
                        out.push(CellKey::new(id, col, row));
                    }
                }
            }
        }
        out
    }

    /* ─────────────────────────── internals ──────────────────────── */

    /// Removes the cell from storage together with its outgoing edges.
    pub(crate) fn take_cell(&mut self, key: CellKey) -> Option<Cell> {
        let cell = self
            .workbook
            .sheet_mut(key.sheet)?
            .remove(key.col, key.row)?;
        self.graph.invalidate(key);
        self.pending_parse.remove(&key);
        Some(cell)
    }

    pub(crate) fn store(&mut self, key: CellKey, cell: Cell) {
        if let Some(sheet) = self.workbook.sheet_mut(key.sheet) {
            sheet.insert(key.col, key.row, cell);
        }
    }

    /// Rebuilds the outgoing edges of `key` from its current AST and records
    /// any link failure on the cell.
    pub(crate) fn relink(&mut self, key: CellKey) {
        let ctx = EngineContext::new(&self.workbook, &self.names, &self.config);
        let formula = self
            .workbook
            .sheet(key.sheet)
            .and_then(|s| s.get(key.col, key.row))
            .and_then(Cell::formula_ref);
        let Some(formula) = formula else {
            self.graph.invalidate(key);
            return;
        };
        if !formula.is_parsed() {
            return;
        }
        let link_error = match formula.ast() {
            Some(ast) => self.graph.rebuild_dependencies(key, ast, &ctx).err(),
            None => {
                self.graph.invalidate(key);
                None
            }
        };
        if let Some(err) = &link_error {
            warn!(cell = %key, error = %err, "formula references could not be resolved");
        }
        if let Some(cell) = self
            .workbook
            .sheet_mut(key.sheet)
            .and_then(|s| s.get_mut(key.col, key.row))
        {
            cell.set_link_error(link_error);
        }
    }

    pub(crate) fn relink_all<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = CellKey>,
    {
        for key in keys {
            self.relink(key);
        }
    }

    fn relink_unresolved(&mut self) {
        let unresolved = self.graph.unresolved();
        if unresolved.is_empty() {
            return;
        }
        self.relink_all(unresolved.iter().copied());
        self.mark_dirty(unresolved);
    }

    /// Marks the seeds and everything that transitively reads them
    /// `CalcDirty`. Unmaterialised seeds only contribute their readers.
    pub(crate) fn mark_dirty<I>(&mut self, seeds: I)
    where
        I: IntoIterator<Item = CellKey>,
    {
        let closure = self.graph.dirty_closure(seeds);
        trace!(cells = closure.len(), "dirty closure");
        for key in closure {
            if let Some(cell) = self
                .workbook
                .sheet_mut(key.sheet)
                .and_then(|s| s.get_mut(key.col, key.row))
            {
                cell.mark_calc_dirty();
                self.dirty.insert(key);
            }
        }
    }

    /// Parses and links formulas loaded since the last pass.
    fn parse_pending(&mut self) {
        if self.pending_parse.is_empty() {
            return;
        }
        let keys = std::mem::take(&mut self.pending_parse);
        debug!(cells = keys.len(), "parsing loaded formulas");
        let locale = self.config.locale;
        for &key in &keys {
            if let Some(cell) = self
                .workbook
                .sheet_mut(key.sheet)
                .and_then(|s| s.get_mut(key.col, key.row))
            {
                let Some(text) = cell.formula_text().map(str::to_string) else {
                    continue;
                };
                cell.finish_parse(parse_with_locale(&text, locale).map_err(CalcError::from));
            }
            self.relink(key);
        }
        self.mark_dirty(keys);
    }

    pub(crate) fn after_edit(&mut self) {
        if self.config.auto_recalculate {
            self.run_pass(RecalcScope::Transitive);
        }
    }
}
