//! End-to-end walkthroughs of the basic editing workflows.
use gridcalc_common::ErrorKind;

use super::common::*;

#[test]
fn constant_edit_flows_into_formula() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "2");
    set(&mut e, s, "B1", "=A1*3");
    recalc(&mut e);
    assert_eq!(value(&e, s, "B1"), num(6.0));

    set(&mut e, s, "A1", "5");
    // Nothing moves until the next pass.
    assert_eq!(value(&e, s, "B1"), num(6.0));
    recalc(&mut e);
    assert_eq!(value(&e, s, "B1"), num(15.0));
}

#[test]
fn text_functions_read_text_cells() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "text");
    set(&mut e, s, "B1", "=LEN(A1)");
    recalc(&mut e);
    assert_eq!(value(&e, s, "B1"), num(4.0));
}

#[test]
fn two_cell_cycle_marks_both_cells() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "=B1");
    set(&mut e, s, "B1", "=A1");
    let result = recalc(&mut e);
    assert_eq!(error_kind(&value(&e, s, "A1")), Some(ErrorKind::Circular));
    assert_eq!(error_kind(&value(&e, s, "B1")), Some(ErrorKind::Circular));
    assert_eq!(result.cycle_errors, 2);
}

#[test]
fn deleting_a_row_shrinks_the_sum() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "1");
    set(&mut e, s, "A2", "2");
    set(&mut e, s, "A3", "3");
    set(&mut e, s, "B1", "=SUM(A1:A3)");
    recalc(&mut e);
    assert_eq!(value(&e, s, "B1"), num(6.0));

    e.delete_rows(s, 2, 1).unwrap();
    assert_eq!(e.formula(s, a1("B1")).as_deref(), Some("=SUM(A1:A2)"));
    recalc(&mut e);
    assert_eq!(value(&e, s, "B1"), num(4.0));
    assert_eq!(value(&e, s, "A2"), num(3.0));
}

#[test]
fn errors_propagate_as_referenced_cell() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "=1/0");
    set(&mut e, s, "B1", "=A1+1");
    recalc(&mut e);
    assert_eq!(error_kind(&value(&e, s, "A1")), Some(ErrorKind::Domain));
    assert_eq!(error_kind(&value(&e, s, "B1")), Some(ErrorKind::ReferencedCell));
}

#[test]
fn renaming_a_sheet_rewrites_qualifiers() {
    let (mut e, s1) = engine();
    let s2 = e.add_sheet("Sheet2").unwrap();
    set(&mut e, s1, "A1", "21");
    set(&mut e, s2, "A1", "=Sheet1!A1*2");
    recalc(&mut e);
    assert_eq!(value(&e, s2, "A1"), num(42.0));

    e.rename_sheet(s1, "Data").unwrap();
    assert_eq!(e.formula(s2, a1("A1")).as_deref(), Some("=Data!A1*2"));
    recalc(&mut e);
    assert_eq!(value(&e, s2, "A1"), num(42.0));
    assert_eq!(e.sheet_id("data"), Some(s1));
    assert_eq!(e.sheet_id("Sheet1"), None);
}
