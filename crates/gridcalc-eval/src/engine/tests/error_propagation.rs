use gridcalc_common::ErrorKind;

use super::common::*;
use crate::engine::CellState;

#[test]
fn propagated_errors_remember_their_origin() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "=1/0");
    set(&mut e, s, "B1", "=A1+1");
    set(&mut e, s, "C1", "=B1*2");
    recalc(&mut e);

    let c1 = value(&e, s, "C1");
    let err = c1.as_error().unwrap();
    assert_eq!(err.kind, ErrorKind::ReferencedCell);
    let origin = err.origin.as_ref().unwrap();
    assert_eq!(origin.sheet.as_deref(), Some("Sheet1"));
    assert_eq!((origin.col, origin.row), (1, 1));
    assert_eq!(e.cell_state(s, a1("C1")), Some(CellState::Error));
}

#[test]
fn each_failure_has_its_own_kind() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "=(1+");
    set(&mut e, s, "A2", "=NOSUCHFUNC(1)");
    set(&mut e, s, "A3", "=LEN()");
    set(&mut e, s, "A4", "=1+\"abc\"");
    set(&mut e, s, "A5", "=SQRT(-1)");
    set(&mut e, s, "A6", "=Nowhere!A1");
    recalc(&mut e);

    let kinds: Vec<_> = (1..=6)
        .map(|row| error_kind(&value(&e, s, &format!("A{row}"))))
        .collect();
    assert_eq!(
        kinds,
        vec![
            Some(ErrorKind::Syntax),
            Some(ErrorKind::UnknownFunction),
            Some(ErrorKind::InvalidArgumentCount),
            Some(ErrorKind::InvalidArgumentType),
            Some(ErrorKind::Domain),
            Some(ErrorKind::InvalidReference),
        ]
    );
}

#[test]
fn ranges_propagate_errors_inside_them() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "1");
    set(&mut e, s, "A2", "=1/0");
    set(&mut e, s, "B1", "=SUM(A1:A3)");
    recalc(&mut e);
    let b1 = value(&e, s, "B1");
    assert_eq!(error_kind(&b1), Some(ErrorKind::ReferencedCell));
    assert_eq!(b1.as_error().unwrap().origin.as_ref().map(|o| o.row), Some(2));

    set(&mut e, s, "A2", "5");
    recalc(&mut e);
    assert_eq!(value(&e, s, "B1"), num(6.0));
}

#[test]
fn error_literals_are_values() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "=#NUM!");
    set(&mut e, s, "B1", "=A1");
    recalc(&mut e);
    assert_eq!(error_kind(&value(&e, s, "A1")), Some(ErrorKind::Domain));
    assert_eq!(error_kind(&value(&e, s, "B1")), Some(ErrorKind::ReferencedCell));
}
