//! Ordered sheet collection with generation-checked handles.

use gridcalc_common::SheetId;

use super::sheet::Sheet;
use crate::error::EngineError;

const MAX_SHEET_NAME_LEN: usize = 31;
const FORBIDDEN_NAME_CHARS: &[char] = &['!', '\'', ':', '[', ']', '*', '?', '/', '\\'];

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    sheet: Option<Sheet>,
}

/// Owns every sheet. Removed slots are reused with a bumped generation so
/// stale [`SheetId`]s never resolve to a newer sheet.
#[derive(Debug, Default)]
pub struct Workbook {
    slots: Vec<Slot>,
    free: Vec<u32>,
    order: Vec<SheetId>,
}

/// Validates a sheet name for storage.
pub fn validate_sheet_name(name: &str) -> Result<(), EngineError> {
    let bad = name.trim().is_empty()
        || name.chars().count() > MAX_SHEET_NAME_LEN
        || name.contains(FORBIDDEN_NAME_CHARS);
    if bad {
        return Err(EngineError::InvalidSheetName(name.to_string()));
    }
    Ok(())
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, name: &str) -> Result<SheetId, EngineError> {
        validate_sheet_name(name)?;
        if self.sheet_id(name).is_some() {
            return Err(EngineError::DuplicateSheet(name.to_string()));
        }
        let sheet = Sheet::new(name);
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.sheet = Some(sheet);
                SheetId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    sheet: Some(sheet),
                });
                SheetId::new(index, 0)
            }
        };
        self.order.push(id);
        Ok(id)
    }

    pub fn remove_sheet(&mut self, id: SheetId) -> Result<Sheet, EngineError> {
        self.get(id)?;
        let slot = &mut self.slots[id.index() as usize];
        let sheet = slot.sheet.take().ok_or(EngineError::StaleSheet(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.order.retain(|s| *s != id);
        Ok(sheet)
    }

    /// Renames a sheet and returns its previous name.
    pub fn rename_sheet(&mut self, id: SheetId, name: &str) -> Result<String, EngineError> {
        validate_sheet_name(name)?;
        if self.sheet_id(name).is_some_and(|other| other != id) {
            return Err(EngineError::DuplicateSheet(name.to_string()));
        }
        let sheet = self.get_mut(id)?;
        let old = sheet.name().to_string();
        sheet.set_name(name.to_string());
        Ok(old)
    }

    pub fn get(&self, id: SheetId) -> Result<&Sheet, EngineError> {
        self.sheet(id).ok_or(EngineError::StaleSheet(id))
    }

    pub fn get_mut(&mut self, id: SheetId) -> Result<&mut Sheet, EngineError> {
        self.sheet_mut(id).ok_or(EngineError::StaleSheet(id))
    }

    pub fn sheet(&self, id: SheetId) -> Option<&Sheet> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.sheet.as_ref())
    }

    pub fn sheet_mut(&mut self, id: SheetId) -> Option<&mut Sheet> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.sheet.as_mut())
    }

    /// Case-insensitive lookup.
    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.order.iter().copied().find(|id| {
            self.sheet(*id)
                .is_some_and(|s| s.name().to_lowercase() == name.to_lowercase())
        })
    }

    pub fn contains(&self, id: SheetId) -> bool {
        self.sheet(id).is_some()
    }

    /// Sheet ids in workbook order.
    pub fn sheet_ids(&self) -> &[SheetId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (SheetId, &Sheet)> {
        self.order
            .iter()
            .filter_map(move |id| self.sheet(*id).map(|s| (*id, s)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_ignoring_case() {
        let mut wb = Workbook::new();
        let s1 = wb.add_sheet("Sheet1").unwrap();
        assert_eq!(
            wb.add_sheet("SHEET1"),
            Err(EngineError::DuplicateSheet("SHEET1".into()))
        );
        assert_eq!(wb.sheet_id("sheet1"), Some(s1));
        assert!(matches!(
            wb.add_sheet("a/b"),
            Err(EngineError::InvalidSheetName(_))
        ));
        assert!(matches!(wb.add_sheet(""), Err(EngineError::InvalidSheetName(_))));
    }

    #[test]
    fn removed_handles_go_stale() {
        let mut wb = Workbook::new();
        let s1 = wb.add_sheet("One").unwrap();
        wb.remove_sheet(s1).unwrap();
        let s2 = wb.add_sheet("Two").unwrap();
        assert_eq!(s1.index(), s2.index());
        assert_ne!(s1, s2);
        assert!(wb.sheet(s1).is_none());
        assert_eq!(wb.get(s1).err(), Some(EngineError::StaleSheet(s1)));
        assert_eq!(wb.sheet(s2).map(Sheet::name), Some("Two"));
    }

    #[test]
    fn order_and_rename() {
        let mut wb = Workbook::new();
        let a = wb.add_sheet("A").unwrap();
        let b = wb.add_sheet("B").unwrap();
        assert_eq!(wb.sheet_ids(), &[a, b]);
        assert_eq!(wb.rename_sheet(a, "Data").unwrap(), "A");
        assert_eq!(wb.sheet_id("data"), Some(a));
        assert!(wb.rename_sheet(b, "DATA").is_err());
        assert!(wb.rename_sheet(a, "data").is_ok());
    }
}
