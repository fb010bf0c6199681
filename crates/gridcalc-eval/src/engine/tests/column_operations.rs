use gridcalc_common::ErrorKind;

use super::common::*;

#[test]
fn inserting_columns_moves_references() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "2");
    set(&mut e, s, "B1", "3");
    set(&mut e, s, "A2", "=A1*B1");
    set(&mut e, s, "A3", "=SUM(A1:B1)");
    e.insert_columns(s, 2, 1).unwrap();

    assert_eq!(e.formula(s, a1("A2")).as_deref(), Some("=A1*C1"));
    assert_eq!(e.formula(s, a1("A3")).as_deref(), Some("=SUM(A1:C1)"));
    assert_eq!(value(&e, s, "C1"), num(3.0));
    recalc(&mut e);
    assert_eq!(value(&e, s, "A2"), num(6.0));
    assert_eq!(value(&e, s, "A3"), num(5.0));
}

#[test]
fn deleting_columns_shrinks_ranges() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "1");
    set(&mut e, s, "B1", "10");
    set(&mut e, s, "C1", "100");
    set(&mut e, s, "A2", "=SUM(A1:C1)");
    set(&mut e, s, "A3", "=B1");
    set(&mut e, s, "A4", "=$C1+C1");
    e.delete_columns(s, 2, 1).unwrap();

    assert_eq!(e.formula(s, a1("A2")).as_deref(), Some("=SUM(A1:B1)"));
    assert_eq!(e.formula(s, a1("A3")).as_deref(), Some("=#REF!"));
    assert_eq!(e.formula(s, a1("A4")).as_deref(), Some("=$C1+B1"));
    recalc(&mut e);
    assert_eq!(value(&e, s, "A2"), num(101.0));
    assert_eq!(error_kind(&value(&e, s, "A3")), Some(ErrorKind::InvalidReference));
    assert_eq!(value(&e, s, "A4"), num(100.0));
}

#[test]
fn cells_in_deleted_columns_vanish() {
    let (mut e, s) = engine();
    set(&mut e, s, "B2", "=1+1");
    e.delete_columns(s, 2, 1).unwrap();
    assert!(e.cell_state(s, a1("B2")).is_none());
    assert!(e.dirty_cells().is_empty());
}
