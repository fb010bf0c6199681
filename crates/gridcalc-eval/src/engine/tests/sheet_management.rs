use gridcalc_common::ErrorKind;

use super::common::*;
use crate::error::EngineError;

#[test]
fn sheet_names_are_unique_ignoring_case() {
    let (mut e, _) = engine();
    assert_eq!(
        e.add_sheet("SHEET1"),
        Err(EngineError::DuplicateSheet("SHEET1".to_string()))
    );
    assert!(matches!(e.add_sheet("a/b"), Err(EngineError::InvalidSheetName(_))));
    assert!(matches!(e.add_sheet("   "), Err(EngineError::InvalidSheetName(_))));
    e.add_sheet("Second").unwrap();
    assert_eq!(e.sheet_names(), vec!["Sheet1".to_string(), "Second".to_string()]);
}

#[test]
fn formulas_wait_for_sheets_added_later() {
    let (mut e, s) = engine();
    set(&mut e, s, "A1", "=Later!A1+1");
    recalc(&mut e);
    assert_eq!(error_kind(&value(&e, s, "A1")), Some(ErrorKind::InvalidReference));

    let later = e.add_sheet("Later").unwrap();
    set(&mut e, later, "A1", "4");
    recalc(&mut e);
    assert_eq!(value(&e, s, "A1"), num(5.0));
}

#[test]
fn removing_a_sheet_breaks_its_readers() {
    let (mut e, s1) = engine();
    let s2 = e.add_sheet("Data").unwrap();
    set(&mut e, s2, "A1", "3");
    set(&mut e, s1, "A1", "=Data!A1*2");
    recalc(&mut e);
    assert_eq!(value(&e, s1, "A1"), num(6.0));

    e.remove_sheet(s2).unwrap();
    recalc(&mut e);
    assert_eq!(error_kind(&value(&e, s1, "A1")), Some(ErrorKind::InvalidReference));
    assert_eq!(e.get_value(s2, a1("A1")), Err(EngineError::StaleSheet(s2)));

    // A new sheet may reuse the slot but never the handle.
    let again = e.add_sheet("Data").unwrap();
    assert_ne!(again, s2);
    assert!(e.get_value(s2, a1("A1")).is_err());
    set(&mut e, again, "A1", "10");
    recalc(&mut e);
    assert_eq!(value(&e, s1, "A1"), num(20.0));
}

#[test]
fn renaming_resolves_dangling_qualifiers() {
    let (mut e, s1) = engine();
    let s2 = e.add_sheet("Draft").unwrap();
    set(&mut e, s2, "B2", "8");
    set(&mut e, s1, "A1", "=Final!B2");
    recalc(&mut e);
    assert!(value(&e, s1, "A1").is_error());

    e.rename_sheet(s2, "Final").unwrap();
    recalc(&mut e);
    assert_eq!(value(&e, s1, "A1"), num(8.0));
}

#[test]
fn rename_quotes_names_that_need_it() {
    let (mut e, s1) = engine();
    let s2 = e.add_sheet("Sheet2").unwrap();
    set(&mut e, s1, "A1", "=SUM(Sheet2!A1:B2)+sheet2!C3");
    e.rename_sheet(s2, "Q1 Totals").unwrap();
    assert_eq!(
        e.formula(s1, a1("A1")).as_deref(),
        Some("=SUM('Q1 Totals'!A1:B2)+'Q1 Totals'!C3")
    );
    assert!(matches!(e.rename_sheet(s2, "sheet1"), Err(EngineError::DuplicateSheet(_))));
}

#[test]
fn out_of_grid_addresses_are_rejected() {
    let (mut e, s) = engine();
    let far = gridcalc_common::Address::new(e.config().max_columns + 1, 1);
    assert!(matches!(
        e.set_formula(s, far, "1"),
        Err(EngineError::OutOfBounds { .. })
    ));
    assert!(e.get_value(s, far).is_err());
}
