//! Dependency Manager.
//!
//! Two indexes are kept per edge so both directions answer without a scan:
//!
//! * `precedents`: consumer cell -> what its formula reads.
//! * `point_dependents`: read address -> consumers (hashed, O(1)).
//! * `range_edges`: per sheet, one `(rect, consumer)` pair per range read.
//!   Membership is tested geometrically, so a full-column reference costs
//!   one edge rather than thousands.
//!
//! Name lookups are tracked separately so redefining a name can relink the
//! formulas that use it, including ones that failed to resolve.

use std::collections::BTreeSet;

use gridcalc_common::{CalcError, Rect, SheetId};
use gridcalc_parse::{ASTNode, ASTNodeType, ReferenceType};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::reference::{self, CellKey, RefTarget, ReferenceScope};

/// One thing a formula reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    Point(CellKey),
    Range { sheet: SheetId, rect: Rect },
}

impl Dependency {
    pub fn sheet(&self) -> SheetId {
        match self {
            Dependency::Point(k) => k.sheet,
            Dependency::Range { sheet, .. } => *sheet,
        }
    }

    pub fn covers(&self, key: CellKey) -> bool {
        match self {
            Dependency::Point(k) => *k == key,
            Dependency::Range { sheet, rect } => *sheet == key.sheet && rect.contains(key.col, key.row),
        }
    }
}

/// `(reference text, parsed reference)` for every reference node in
/// evaluation order.
pub fn collect_references(ast: &ASTNode) -> Vec<(&str, &ReferenceType)> {
    fn walk<'a>(node: &'a ASTNode, out: &mut Vec<(&'a str, &'a ReferenceType)>) {
        match &node.node_type {
            ASTNodeType::Reference {
                original,
                reference,
            } => out.push((original.as_str(), reference)),
            ASTNodeType::UnaryOp { expr, .. } => walk(expr, out),
            ASTNodeType::BinaryOp { left, right, .. } => {
                walk(left, out);
                walk(right, out);
            }
            ASTNodeType::Function { args, .. } => args.iter().for_each(|a| walk(a, out)),
            ASTNodeType::Literal(_) => {}
        }
    }
    let mut out = Vec::new();
    walk(ast, &mut out);
    out
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    precedents: FxHashMap<CellKey, SmallVec<[Dependency; 4]>>,
    point_dependents: FxHashMap<CellKey, FxHashSet<CellKey>>,
    range_edges: FxHashMap<SheetId, Vec<(Rect, CellKey)>>,
    /// Lower-cased name -> formulas that look it up.
    name_consumers: FxHashMap<String, FxHashSet<CellKey>>,
    consumer_names: FxHashMap<CellKey, SmallVec<[String; 2]>>,
    /// Formulas with at least one reference that did not resolve.
    unresolved: FxHashSet<CellKey>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the outgoing edges of `cell` with the references in `ast`.
    ///
    /// All or nothing: when any reference fails to resolve the cell keeps no
    /// edges, is remembered as unresolved and the first failure is
    /// returned. Name lookups are recorded either way.
    pub fn rebuild_dependencies(
        &mut self,
        cell: CellKey,
        ast: &ASTNode,
        scope: &dyn ReferenceScope,
    ) -> Result<(), CalcError> {
        self.invalidate(cell);

        let mut deps: SmallVec<[Dependency; 4]> = SmallVec::new();
        let mut failure = None;
        for (text, reference) in collect_references(ast) {
            if let ReferenceType::NamedRange(name) = reference {
                self.record_name(cell, name);
            }
            let resolved = reference::resolve(scope, reference, cell.sheet);
            let Some(sheet) = resolved.sheet.filter(|_| resolved.is_valid()) else {
                if failure.is_none() {
                    failure = Some(resolved.to_error(text));
                }
                continue;
            };
            let dep = match resolved.target {
                RefTarget::Point(addr) => Dependency::Point(CellKey::new(sheet, addr.col, addr.row)),
                RefTarget::Range(rect) => Dependency::Range { sheet, rect },
            };
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }

        if let Some(err) = failure {
            debug!(%cell, error = %err, "formula has unresolved references");
            self.unresolved.insert(cell);
            return Err(err);
        }

        for dep in &deps {
            match *dep {
                Dependency::Point(target) => {
                    self.point_dependents.entry(target).or_default().insert(cell);
                }
                Dependency::Range { sheet, rect } => {
                    self.range_edges.entry(sheet).or_default().push((rect, cell));
                }
            }
        }
        trace!(%cell, edges = deps.len(), "dependencies recorded");
        if !deps.is_empty() {
            self.precedents.insert(cell, deps);
        }
        Ok(())
    }

    fn record_name(&mut self, cell: CellKey, name: &str) {
        let name = name.to_lowercase();
        self.name_consumers
            .entry(name.clone())
            .or_default()
            .insert(cell);
        let names = self.consumer_names.entry(cell).or_default();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    /// Removes every outgoing edge and name usage of `cell`.
    pub fn invalidate(&mut self, cell: CellKey) {
        self.unresolved.remove(&cell);
        if let Some(deps) = self.precedents.remove(&cell) {
            for dep in deps {
                match dep {
                    Dependency::Point(target) => {
                        if let Some(set) = self.point_dependents.get_mut(&target) {
                            set.remove(&cell);
                            if set.is_empty() {
                                self.point_dependents.remove(&target);
                            }
                        }
                    }
                    Dependency::Range { sheet, rect } => {
                        if let Some(edges) = self.range_edges.get_mut(&sheet) {
                            edges.retain(|(r, c)| !(*c == cell && *r == rect));
                            if edges.is_empty() {
                                self.range_edges.remove(&sheet);
                            }
                        }
                    }
                }
            }
        }
        if let Some(names) = self.consumer_names.remove(&cell) {
            for name in names {
                if let Some(set) = self.name_consumers.get_mut(&name) {
                    set.remove(&cell);
                    if set.is_empty() {
                        self.name_consumers.remove(&name);
                    }
                }
            }
        }
    }

    /// Drops the whole graph.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Consumers reading `key` directly or through a range, sorted.
    pub fn dependents_of(&self, key: CellKey) -> Vec<CellKey> {
        let mut out: BTreeSet<CellKey> = self
            .point_dependents
            .get(&key)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        if let Some(edges) = self.range_edges.get(&key.sheet) {
            out.extend(
                edges
                    .iter()
                    .filter(|(rect, _)| rect.contains(key.col, key.row))
                    .map(|(_, c)| *c),
            );
        }
        out.into_iter().collect()
    }

    /// Consumers reading any position inside `rect`, sorted.
    pub fn dependents_of_rect(&self, sheet: SheetId, rect: &Rect) -> Vec<CellKey> {
        let mut out = BTreeSet::new();
        for (target, consumers) in &self.point_dependents {
            if target.sheet == sheet && rect.contains(target.col, target.row) {
                out.extend(consumers.iter().copied());
            }
        }
        if let Some(edges) = self.range_edges.get(&sheet) {
            out.extend(
                edges
                    .iter()
                    .filter(|(r, _)| r.intersects(rect))
                    .map(|(_, c)| *c),
            );
        }
        out.into_iter().collect()
    }

    pub fn precedents_of(&self, cell: CellKey) -> &[Dependency] {
        self.precedents.get(&cell).map_or(&[], |d| d.as_slice())
    }

    /// Formulas with an edge into `sheet`, sorted.
    pub fn consumers_of_sheet(&self, sheet: SheetId) -> Vec<CellKey> {
        let mut out = BTreeSet::new();
        for (target, consumers) in &self.point_dependents {
            if target.sheet == sheet {
                out.extend(consumers.iter().copied());
            }
        }
        if let Some(edges) = self.range_edges.get(&sheet) {
            out.extend(edges.iter().map(|(_, c)| *c));
        }
        out.into_iter().collect()
    }

    /// Formulas that look up `name`, sorted.
    pub fn consumers_of_name(&self, name: &str) -> Vec<CellKey> {
        let mut out: Vec<CellKey> = self
            .name_consumers
            .get(&name.to_lowercase())
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    pub fn unresolved(&self) -> Vec<CellKey> {
        let mut out: Vec<CellKey> = self.unresolved.iter().copied().collect();
        out.sort();
        out
    }

    pub fn is_unresolved(&self, cell: CellKey) -> bool {
        self.unresolved.contains(&cell)
    }

    pub fn edge_count(&self) -> usize {
        self.precedents.values().map(SmallVec::len).sum()
    }

    /// Fixed-point closure over dependents: the seeds plus every cell that
    /// transitively reads one of them.
    pub fn dirty_closure<I>(&self, seeds: I) -> BTreeSet<CellKey>
    where
        I: IntoIterator<Item = CellKey>,
    {
        let mut affected = BTreeSet::new();
        let mut to_visit: Vec<CellKey> = seeds.into_iter().collect();
        while let Some(key) = to_visit.pop() {
            if !affected.insert(key) {
                continue;
            }
            to_visit.extend(
                self.dependents_of(key)
                    .into_iter()
                    .filter(|d| !affected.contains(d)),
            );
        }
        affected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_parse::parse;

    const S1: SheetId = SheetId::new(0, 0);
    const S2: SheetId = SheetId::new(1, 0);

    struct Scope;

    impl ReferenceScope for Scope {
        fn sheet_by_name(&self, name: &str) -> Option<SheetId> {
            match name.to_lowercase().as_str() {
                "sheet1" => Some(S1),
                "sheet2" => Some(S2),
                _ => None,
            }
        }
        fn named_area(&self, name: &str) -> Option<(SheetId, Rect)> {
            name.eq_ignore_ascii_case("block")
                .then(|| (S2, Rect::new(1, 1, 2, 2)))
        }
        fn grid_bounds(&self) -> (u32, u32) {
            (676, 0x7FFF)
        }
    }

    fn key(sheet: SheetId, a1: &str) -> CellKey {
        let a = gridcalc_common::Address::parse_a1(a1).unwrap();
        CellKey::new(sheet, a.col, a.row)
    }

    fn link(g: &mut DependencyGraph, cell: CellKey, formula: &str) -> Result<(), CalcError> {
        let ast = parse(formula).unwrap();
        g.rebuild_dependencies(cell, &ast, &Scope)
    }

    #[test]
    fn point_and_range_edges() {
        let mut g = DependencyGraph::new();
        let b1 = key(S1, "B1");
        link(&mut g, b1, "=A1+SUM(A2:A10)+A1").unwrap();
        assert_eq!(g.precedents_of(b1).len(), 2);
        assert_eq!(g.dependents_of(key(S1, "A1")), vec![b1]);
        assert_eq!(g.dependents_of(key(S1, "A7")), vec![b1]);
        assert!(g.dependents_of(key(S1, "A11")).is_empty());
        assert!(g.dependents_of(key(S2, "A1")).is_empty());
    }

    #[test]
    fn unresolved_formula_keeps_no_edges() {
        let mut g = DependencyGraph::new();
        let c1 = key(S1, "C1");
        let err = link(&mut g, c1, "=A1+Missing!B2").unwrap_err();
        assert_eq!(err.kind, gridcalc_common::ErrorKind::InvalidReference);
        assert!(g.precedents_of(c1).is_empty());
        assert!(g.dependents_of(key(S1, "A1")).is_empty());
        assert!(g.is_unresolved(c1));

        link(&mut g, c1, "=A1").unwrap();
        assert!(!g.is_unresolved(c1));
        assert_eq!(g.dependents_of(key(S1, "A1")), vec![c1]);
    }

    #[test]
    fn names_are_tracked_even_when_unresolved() {
        let mut g = DependencyGraph::new();
        let a = key(S1, "A1");
        let b = key(S1, "B1");
        link(&mut g, a, "=SUM(block)").unwrap();
        assert!(link(&mut g, b, "=SUM(nothing)").is_err());
        assert_eq!(g.consumers_of_name("BLOCK"), vec![a]);
        assert_eq!(g.consumers_of_name("nothing"), vec![b]);
        assert_eq!(g.dependents_of(key(S2, "B2")), vec![a]);
        assert_eq!(g.consumers_of_sheet(S2), vec![a]);
    }

    #[test]
    fn invalidate_removes_both_directions() {
        let mut g = DependencyGraph::new();
        let b1 = key(S1, "B1");
        link(&mut g, b1, "=A1+SUM(Sheet2!A1:A3)").unwrap();
        assert_eq!(g.edge_count(), 2);
        g.invalidate(b1);
        assert_eq!(g.edge_count(), 0);
        assert!(g.dependents_of(key(S1, "A1")).is_empty());
        assert!(g.dependents_of(key(S2, "A2")).is_empty());
    }

    #[test]
    fn closure_reaches_second_order_dependents() {
        let mut g = DependencyGraph::new();
        let (a1, b1, c1, d1) = (key(S1, "A1"), key(S1, "B1"), key(S1, "C1"), key(S1, "D1"));
        link(&mut g, b1, "=A1*2").unwrap();
        link(&mut g, c1, "=SUM(A1:B1)").unwrap();
        link(&mut g, d1, "=C1").unwrap();
        let closure: Vec<_> = g.dirty_closure([a1]).into_iter().collect();
        assert_eq!(closure, vec![a1, b1, c1, d1]);
    }

    #[test]
    fn closure_terminates_on_cycles() {
        let mut g = DependencyGraph::new();
        let (a1, b1) = (key(S1, "A1"), key(S1, "B1"));
        link(&mut g, a1, "=B1").unwrap();
        link(&mut g, b1, "=A1").unwrap();
        assert_eq!(g.dirty_closure([a1]).len(), 2);
    }
}
