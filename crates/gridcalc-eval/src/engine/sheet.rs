//! Sparse cell storage for one sheet.

use std::collections::BTreeMap;

use gridcalc_common::{Rect, Value};

use super::cell::Cell;

/// Value every unmaterialised address reads as.
static DEFAULT_VALUE: Value = Value::Empty;

/// Materialised cells keyed `(row, col)` so iteration is row-major, plus the
/// sheet's merged regions.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<(u32, u32), Cell>,
    merges: Vec<Rect>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn get(&self, col: u32, row: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    pub fn get_mut(&mut self, col: u32, row: u32) -> Option<&mut Cell> {
        self.cells.get_mut(&(row, col))
    }

    /// Stored value, or the shared default for unmaterialised addresses.
    pub fn value_at(&self, col: u32, row: u32) -> &Value {
        self.get(col, row).map_or(&DEFAULT_VALUE, Cell::value)
    }

    pub fn insert(&mut self, col: u32, row: u32, cell: Cell) -> Option<Cell> {
        self.cells.insert((row, col), cell)
    }

    pub fn remove(&mut self, col: u32, row: u32) -> Option<Cell> {
        self.cells.remove(&(row, col))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// `(col, row, cell)` in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, &Cell)> {
        self.cells.iter().map(|(&(row, col), cell)| (col, row, cell))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, u32, &mut Cell)> {
        self.cells
            .iter_mut()
            .map(|(&(row, col), cell)| (col, row, cell))
    }

    /// `(col, row)` of every materialised cell inside `rect`.
    pub fn positions_in(&self, rect: &Rect) -> Vec<(u32, u32)> {
        self.cells
            .range((rect.row1, 0)..=(rect.row2, u32::MAX))
            .filter(|&(&(_, col), _)| col >= rect.col1 && col <= rect.col2)
            .map(|(&(row, col), _)| (col, row))
            .collect()
    }

    /// Moves every cell to the position `map` gives it. Cells mapped to
    /// `None` are removed and returned with their old position.
    pub(crate) fn remap_cells<F>(&mut self, map: F) -> Vec<(u32, u32, Cell)>
    where
        F: Fn(u32, u32) -> Option<(u32, u32)>,
    {
        let old = std::mem::take(&mut self.cells);
        let mut dropped = Vec::new();
        for ((row, col), cell) in old {
            match map(col, row) {
                Some((c, r)) => {
                    self.cells.insert((r, c), cell);
                }
                None => dropped.push((col, row, cell)),
            }
        }
        dropped
    }

    /* ─────────────── merged regions ─────────────── */

    pub fn merges(&self) -> &[Rect] {
        &self.merges
    }

    /// Adds a merged region. Overlapping an existing merge is rejected.
    pub(crate) fn add_merge(&mut self, rect: Rect) -> bool {
        if rect.is_single_cell() || self.merges.iter().any(|m| m.intersects(&rect)) {
            return false;
        }
        self.merges.push(rect);
        true
    }

    pub(crate) fn remove_merge(&mut self, rect: &Rect) -> bool {
        let before = self.merges.len();
        self.merges.retain(|m| m != rect);
        self.merges.len() != before
    }

    pub(crate) fn remap_merges<F>(&mut self, map: F)
    where
        F: Fn(Rect) -> Option<Rect>,
    {
        self.merges = self
            .merges
            .iter()
            .filter_map(|m| map(*m))
            .filter(|m| !m.is_single_cell())
            .collect();
    }

    pub fn merge_at(&self, col: u32, row: u32) -> Option<Rect> {
        self.merges.iter().copied().find(|m| m.contains(col, row))
    }

    /// Inside a merge but not its top-left anchor.
    pub fn is_obscured(&self, col: u32, row: u32) -> bool {
        self.merge_at(col, row)
            .is_some_and(|m| !(m.col1 == col && m.row1 == row))
    }
}
