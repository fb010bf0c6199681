//! Recalculation Scheduler.
//!
//! Targets are visited in storage order. Before a cell is evaluated every
//! dirty precedent is pulled first, so the interpreter only ever reads
//! finished values. The pull runs on an explicit stack of frames rather
//! than native recursion; long reference chains cannot overflow it.
//!
//! A precedent that is already `EVALUATING` closes a cycle. Every frame from
//! that precedent up to the top of the stack is marked cyclic and stores
//! `CircularReference` when it unwinds, without entering the interpreter.

use std::collections::BTreeSet;

use gridcalc_common::{CalcError, Value};
use tracing::trace;

use super::EvalConfig;
use super::cell::CellContent;
use super::context::EngineContext;
use super::graph::{Dependency, DependencyGraph};
use super::named_range::NamedAreaTable;
use super::workbook::Workbook;
use crate::interpreter::Interpreter;
use crate::reference::CellKey;

/// What a pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecalcScope {
    /// The cell and whatever dirty cells it reads.
    Cell(CellKey),
    /// Every dirty cell.
    Transitive,
    /// Every materialised cell, dirty or not.
    Full,
}

#[derive(Debug, Default)]
pub(crate) struct PassStats {
    pub computed: usize,
    pub cycle_errors: usize,
    pub changed: Vec<CellKey>,
}

struct Frame {
    key: CellKey,
    pending: Vec<CellKey>,
    cyclic: bool,
}

pub(crate) struct Scheduler<'a> {
    workbook: &'a mut Workbook,
    names: &'a NamedAreaTable,
    graph: &'a DependencyGraph,
    config: &'a EvalConfig,
    dirty: &'a mut BTreeSet<CellKey>,
    stats: PassStats,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        workbook: &'a mut Workbook,
        names: &'a NamedAreaTable,
        graph: &'a DependencyGraph,
        config: &'a EvalConfig,
        dirty: &'a mut BTreeSet<CellKey>,
    ) -> Self {
        Self {
            workbook,
            names,
            graph,
            config,
            dirty,
            stats: PassStats::default(),
        }
    }

    /// Dirty cells in workbook sheet order, row-major within a sheet.
    fn ordered_dirty(&self) -> Vec<CellKey> {
        self.workbook
            .sheet_ids()
            .iter()
            .flat_map(|&sheet| {
                self.dirty
                    .range(CellKey::new(sheet, 0, 0)..=CellKey::new(sheet, u32::MAX, u32::MAX))
                    .copied()
            })
            .collect()
    }

    pub fn run(mut self, scope: RecalcScope) -> PassStats {
        match scope {
            RecalcScope::Cell(key) => {
                // A clean cycle member is only re-detected when its partners
                // are revisited with it.
                let mut targets = self.cycle_members(key);
                targets.insert(key);
                for target in targets {
                    if let Some(cell) = self
                        .workbook
                        .sheet_mut(target.sheet)
                        .and_then(|s| s.get_mut(target.col, target.row))
                    {
                        cell.mark_calc_dirty();
                        self.dirty.insert(target);
                    }
                }
                self.compute(key);
            }
            RecalcScope::Transitive => {
                for key in self.ordered_dirty() {
                    self.compute(key);
                }
            }
            RecalcScope::Full => {
                let ids = self.workbook.sheet_ids().to_vec();
                for sheet in ids {
                    if let Some(s) = self.workbook.sheet_mut(sheet) {
                        for (col, row, cell) in s.iter_mut() {
                            cell.mark_calc_dirty();
                            self.dirty.insert(CellKey::new(sheet, col, row));
                        }
                    }
                }
                for key in self.ordered_dirty() {
                    self.compute(key);
                }
            }
        }
        self.stats
    }

    /// Cells that both read `key` and are read by it, directly or not.
    fn cycle_members(&self, key: CellKey) -> BTreeSet<CellKey> {
        let downstream = self.graph.dirty_closure([key]);
        if downstream.len() <= 1 {
            return BTreeSet::new();
        }
        let mut upstream = BTreeSet::new();
        let mut to_visit = vec![key];
        while let Some(cell) = to_visit.pop() {
            for dep in self.graph.precedents_of(cell) {
                match *dep {
                    Dependency::Point(k) => {
                        if upstream.insert(k) {
                            to_visit.push(k);
                        }
                    }
                    Dependency::Range { sheet, rect } => {
                        let Some(s) = self.workbook.sheet(sheet) else {
                            continue;
                        };
                        for (col, row) in s.positions_in(&rect) {
                            let k = CellKey::new(sheet, col, row);
                            if upstream.insert(k) {
                                to_visit.push(k);
                            }
                        }
                    }
                }
            }
        }
        upstream.retain(|k| downstream.contains(k));
        upstream
    }

    /// Dirty cells `key` reads, in the order they should be pulled.
    fn dirty_precedents(&self, key: CellKey) -> Vec<CellKey> {
        let mut out = Vec::new();
        for dep in self.graph.precedents_of(key) {
            match *dep {
                Dependency::Point(k) => {
                    if self.dirty.contains(&k) {
                        out.push(k);
                    }
                }
                Dependency::Range { sheet, rect } => {
                    let lo = CellKey::new(sheet, 0, rect.row1);
                    let hi = CellKey::new(sheet, u32::MAX, rect.row2);
                    out.extend(
                        self.dirty
                            .range(lo..=hi)
                            .filter(|k| k.col >= rect.col1 && k.col <= rect.col2)
                            .copied(),
                    );
                }
            }
        }
        // Popped from the back; reverse so the first reference is pulled first.
        out.reverse();
        out
    }

    fn is_evaluating(&self, key: CellKey) -> bool {
        self.workbook
            .sheet(key.sheet)
            .and_then(|s| s.get(key.col, key.row))
            .is_some_and(|c| c.is_evaluating())
    }

    fn begin(&mut self, key: CellKey) -> Option<Frame> {
        let cell = self
            .workbook
            .sheet_mut(key.sheet)
            .and_then(|s| s.get_mut(key.col, key.row));
        let Some(cell) = cell else {
            // Cleared since it was marked.
            self.dirty.remove(&key);
            return None;
        };
        cell.begin_evaluation();
        Some(Frame {
            key,
            pending: self.dirty_precedents(key),
            cyclic: false,
        })
    }

    /// Computes `root` and every dirty cell it transitively reads. Each cell
    /// is computed at most once per pass.
    fn compute(&mut self, root: CellKey) {
        if !self.dirty.contains(&root) {
            return;
        }
        let mut stack: Vec<Frame> = Vec::new();
        if let Some(frame) = self.begin(root) {
            stack.push(frame);
        }

        while let Some(top) = stack.last_mut() {
            if let Some(next) = top.pending.pop() {
                if !self.dirty.contains(&next) {
                    continue;
                }
                if self.is_evaluating(next) {
                    if let Some(pos) = stack.iter().position(|f| f.key == next) {
                        trace!(cell = %next, depth = stack.len() - pos, "cycle detected");
                        for frame in &mut stack[pos..] {
                            frame.cyclic = true;
                        }
                    }
                    continue;
                }
                if let Some(frame) = self.begin(next) {
                    stack.push(frame);
                }
                continue;
            }

            if let Some(frame) = stack.pop() {
                self.finish(frame);
            }
        }
    }

    fn finish(&mut self, frame: Frame) {
        let value = if frame.cyclic {
            self.stats.cycle_errors += 1;
            Value::Error(CalcError::circular())
        } else {
            self.evaluate(frame.key)
        };
        self.dirty.remove(&frame.key);
        self.stats.computed += 1;
        let changed = self
            .workbook
            .sheet_mut(frame.key.sheet)
            .and_then(|s| s.get_mut(frame.key.col, frame.key.row))
            .is_some_and(|cell| cell.finish_evaluation(value));
        if changed {
            self.stats.changed.push(frame.key);
        }
    }

    fn evaluate(&self, key: CellKey) -> Value {
        let Some(cell) = self
            .workbook
            .sheet(key.sheet)
            .and_then(|s| s.get(key.col, key.row))
        else {
            return Value::Empty;
        };
        match cell.content() {
            CellContent::Constant(v) => v.clone(),
            CellContent::Formula(f) => {
                if let Some(err) = f.static_error() {
                    return Value::Error(err.clone());
                }
                let Some(ast) = f.ast() else {
                    // Parse still pending: keep the cached value.
                    return cell.value().clone();
                };
                let ctx = EngineContext::new(&*self.workbook, self.names, self.config);
                Interpreter::new(&ctx, key.sheet).evaluate(ast)
            }
        }
    }
}
