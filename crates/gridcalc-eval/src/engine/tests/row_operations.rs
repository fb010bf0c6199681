use gridcalc_common::{ErrorKind, Rect};

use super::common::*;

#[test]
fn inserting_rows_moves_cells_and_references() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "1");
    set(&mut e, s, "A2", "2");
    set(&mut e, s, "B1", "=SUM(A1:A2)");
    set(&mut e, s, "C5", "=A2*10");
    recalc(&mut e);

    e.insert_rows(s, 2, 1).unwrap();
    assert_eq!(e.formula(s, a1("B1")).as_deref(), Some("=SUM(A1:A3)"));
    assert_eq!(e.formula(s, a1("C6")).as_deref(), Some("=A3*10"));
    assert!(e.cell_state(s, a1("C5")).is_none());
    // Stored values move with their cells.
    assert_eq!(value(&e, s, "A3"), num(2.0));
    assert_eq!(value(&e, s, "C6"), num(20.0));

    set(&mut e, s, "A2", "4");
    recalc(&mut e);
    assert_eq!(value(&e, s, "B1"), num(7.0));
}

#[test]
fn fixed_rows_keep_their_text() {
    let (mut e, s) = engine();
    set(&mut e, s, "A2", "5");
    set(&mut e, s, "A3", "7");
    set(&mut e, s, "C1", "=A$3+A3");
    e.delete_rows(s, 2, 1).unwrap();
    assert_eq!(e.formula(s, a1("C1")).as_deref(), Some("=A$3+A2"));
    recalc(&mut e);
    assert_eq!(value(&e, s, "C1"), num(7.0));
}

#[test]
fn deleted_targets_become_reference_errors() {
    let (mut e, s) = engine();
    set(&mut e, s, "A2", "5");
    set(&mut e, s, "B1", "=A2*2");
    set(&mut e, s, "B5", "=SUM(A2:A3)");
    e.delete_rows(s, 2, 2).unwrap();
    assert_eq!(e.formula(s, a1("B1")).as_deref(), Some("=#REF!*2"));
    assert_eq!(e.formula(s, a1("B3")).as_deref(), Some("=SUM(#REF!)"));
    recalc(&mut e);
    assert_eq!(error_kind(&value(&e, s, "B1")), Some(ErrorKind::InvalidReference));
    let message = value(&e, s, "B1").as_error().and_then(|err| err.message.clone());
    assert_eq!(message.as_deref(), Some("reference no longer exists"));
}

#[test]
fn other_sheets_follow_the_edit() {
    let (mut e, s1) = engine();
    let s2 = e.add_sheet("Sheet2").unwrap();
    set(&mut e, s1, "A3", "9");
    set(&mut e, s2, "A3", "=Sheet1!A3");
    set(&mut e, s2, "B1", "=A3");
    e.insert_rows(s1, 1, 2).unwrap();
    assert_eq!(e.formula(s2, a1("A3")).as_deref(), Some("=Sheet1!A5"));
    // Unqualified references on other sheets are untouched.
    assert_eq!(e.formula(s2, a1("B1")).as_deref(), Some("=A3"));
    recalc(&mut e);
    assert_eq!(value(&e, s2, "A3"), num(9.0));
}

#[test]
fn names_and_merges_shift_with_rows() {
    let (mut e, s) = engine();
    e.define_name("block", s, Rect::new(1, 3, 2, 4)).unwrap();
    e.merge_cells(s, Rect::new(4, 3, 5, 4)).unwrap();
    set(&mut e, s, "A4", "3");
    set(&mut e, s, "F1", "=SUM(block)");
    recalc(&mut e);
    assert_eq!(value(&e, s, "F1"), num(3.0));

    e.insert_rows(s, 2, 2).unwrap();
    assert_eq!(e.named_area("block").unwrap().rect, Rect::new(1, 5, 2, 6));
    assert_eq!(e.workbook().get(s).unwrap().merges(), &[Rect::new(4, 5, 5, 6)]);
    set(&mut e, s, "B5", "4");
    recalc(&mut e);
    assert_eq!(value(&e, s, "F1"), num(7.0));
}

#[test]
fn invalid_counts_are_rejected() {
    let (mut e, s) = engine();
    assert!(e.delete_rows(s, 0, 1).is_err());
    assert!(e.insert_rows(s, 3, 0).is_err());
}
