use gridcalc_common::ErrorKind;

use super::common::*;
use crate::engine::{CellState, RecalcScope};
use crate::reference::CellKey;

#[test]
fn self_reference_is_circular() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "=A1+1");
    let result = recalc(&mut e);
    assert_eq!(error_kind(&value(&e, s, "A1")), Some(ErrorKind::Circular));
    assert_eq!(result.cycle_errors, 1);
    assert_eq!(e.cell_state(s, a1("A1")), Some(CellState::Error));
}

#[test]
fn readers_of_a_cycle_are_not_part_of_it() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "=B1");
    set(&mut e, s, "B1", "=A1");
    set(&mut e, s, "C1", "=A1*2");
    let result = recalc(&mut e);
    assert_eq!(result.cycle_errors, 2);
    assert_eq!(error_kind(&value(&e, s, "C1")), Some(ErrorKind::ReferencedCell));
}

#[test]
fn breaking_the_cycle_recovers() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "=B1");
    set(&mut e, s, "B1", "=A1");
    set(&mut e, s, "C1", "=A1*2");
    recalc(&mut e);

    set(&mut e, s, "B1", "5");
    let result = recalc(&mut e);
    assert_eq!(result.cycle_errors, 0);
    assert_eq!(value(&e, s, "A1"), num(5.0));
    assert_eq!(value(&e, s, "C1"), num(10.0));
    assert_eq!(e.cell_state(s, a1("A1")), Some(CellState::Clean));
}

#[test]
fn cycles_through_ranges_are_found() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "1");
    set(&mut e, s, "A2", "=SUM(A1:A3)");
    set(&mut e, s, "A3", "2");
    let result = recalc(&mut e);
    assert_eq!(result.cycle_errors, 1);
    assert_eq!(error_kind(&value(&e, s, "A2")), Some(ErrorKind::Circular));
    assert_eq!(value(&e, s, "A1"), num(1.0));
}

#[test]
fn long_chains_do_not_overflow() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "1");
    for row in 2..=2000 {
        let text = format!("=A{}+1", row - 1);
        set(&mut e, s, &format!("A{row}"), &text);
    }
    assert_eq!(e.evaluate_cell(s, a1("A2000")).unwrap(), num(2000.0));
    assert!(e.dirty_cells().is_empty());
}

#[test]
fn single_cell_pass_on_a_clean_cycle_member_stays_circular() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "=B1");
    set(&mut e, s, "B1", "=A1");
    recalc(&mut e);

    let again = e.evaluate_cell(s, a1("A1")).unwrap();
    assert_eq!(error_kind(&again), Some(ErrorKind::Circular));
    assert_eq!(error_kind(&value(&e, s, "B1")), Some(ErrorKind::Circular));

    let result = e.recalculate(RecalcScope::Cell(CellKey::new(s, 2, 1))).unwrap();
    assert_eq!(result.cycle_errors, 2);
    assert!(result.changed.is_empty());
    assert_eq!(error_kind(&value(&e, s, "B1")), Some(ErrorKind::Circular));
}
