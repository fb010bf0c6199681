//! Randomised checks on a small grid: graph edges agree from both ends and
//! a finished pass leaves nothing to do.
use gridcalc_common::{Address, SheetId};
use proptest::prelude::*;

use super::common::engine;
use crate::engine::{Engine, RecalcScope};
use crate::reference::CellKey;

const SIDE: u32 = 4;

fn address() -> impl Strategy<Value = String> {
    (1..=SIDE, 1..=SIDE).prop_map(|(c, r)| Address::new(c, r).to_string())
}

fn cell_text() -> impl Strategy<Value = String> {
    prop_oneof![
        (-20i32..20).prop_map(|n| n.to_string()),
        (address(), address()).prop_map(|(a, b)| format!("={a}+{b}")),
        (address(), address()).prop_map(|(a, b)| format!("=SUM({a}:{b})")),
        address().prop_map(|a| format!("={a}*2")),
    ]
}

fn grid() -> impl Strategy<Value = Vec<((u32, u32), String)>> {
    prop::collection::vec(((1..=SIDE, 1..=SIDE), cell_text()), 1..24)
}

fn build(cells: &[((u32, u32), String)]) -> (Engine, SheetId) {
    let (mut e, s) = engine();
    for ((col, row), text) in cells {
        e.set_formula(s, Address::new(*col, *row), text).unwrap();
    }
    (e, s)
}

fn positions(sheet: SheetId) -> impl Iterator<Item = CellKey> {
    (1..=SIDE).flat_map(move |row| (1..=SIDE).map(move |col| CellKey::new(sheet, col, row)))
}

proptest! {
    #[test]
    fn edges_agree_from_both_ends(cells in grid()) {
        let (e, s) = build(&cells);
        for key in positions(s) {
            for reader in e.dependents_of(s, key.address()) {
                let covered = e
                    .precedents_of(s, reader.address())
                    .iter()
                    .any(|d| d.covers(key));
                prop_assert!(covered, "{reader} lists no edge to {key}");
            }
            for dep in e.precedents_of(s, key.address()) {
                for target in positions(s).filter(|t| dep.covers(*t)) {
                    prop_assert!(e.dependents_of(s, target.address()).contains(&key));
                }
            }
        }
    }

    #[test]
    fn finished_passes_are_idempotent(cells in grid()) {
        let (mut e, _) = build(&cells);
        e.recalculate(RecalcScope::Transitive).unwrap();
        prop_assert!(e.dirty_cells().is_empty());

        let again = e.recalculate(RecalcScope::Transitive).unwrap();
        prop_assert_eq!(again.computed_cells, 0);
        prop_assert!(again.changed.is_empty());

        let full = e.recalculate(RecalcScope::Full).unwrap();
        prop_assert!(full.changed.is_empty());
    }

    #[test]
    fn pass_order_does_not_change_results(cells in grid()) {
        let (mut forward, s) = build(&cells);
        forward.recalculate(RecalcScope::Transitive).unwrap();

        let (mut pulled, t) = build(&cells);
        for key in positions(t).collect::<Vec<_>>().into_iter().rev() {
            pulled.evaluate_cell(t, key.address()).unwrap();
        }
        for key in positions(s) {
            let a = forward.get_value(s, key.address()).unwrap();
            let b = pulled.get_value(t, key.address()).unwrap();
            prop_assert_eq!(a.is_error(), b.is_error(), "{}", key);
            if !a.is_error() {
                prop_assert_eq!(a, b);
            }
        }
    }
}
