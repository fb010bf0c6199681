use std::collections::BTreeMap;

use gridcalc_common::{Rect, SheetId};
use gridcalc_parse::reference::is_name_identifier;

use crate::error::EngineError;

/// A user-defined name pointing at a rectangle on one sheet.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedArea {
    /// Name as it was defined; lookups ignore case.
    pub name: String,
    pub sheet: SheetId,
    pub rect: Rect,
}

/// Workbook-scoped names, keyed by lower-cased name.
#[derive(Debug, Default, Clone)]
pub struct NamedAreaTable {
    entries: BTreeMap<String, NamedArea>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl NamedAreaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines or redefines `name`. Returns the previous definition.
    pub fn define(
        &mut self,
        name: &str,
        sheet: SheetId,
        rect: Rect,
    ) -> Result<Option<NamedArea>, EngineError> {
        if !is_name_identifier(name) {
            return Err(EngineError::InvalidName(name.to_string()));
        }
        let area = NamedArea {
            name: name.to_string(),
            sheet,
            rect,
        };
        Ok(self.entries.insert(key(name), area))
    }

    pub fn remove(&mut self, name: &str) -> Option<NamedArea> {
        self.entries.remove(&key(name))
    }

    pub fn get(&self, name: &str) -> Option<&NamedArea> {
        self.entries.get(&key(name))
    }

    /// Definitions sorted by lower-cased name.
    pub fn iter(&self) -> impl Iterator<Item = &NamedArea> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies `f` to every rectangle on `sheet`. Names whose rectangle maps
    /// to `None` are removed. Returns the lower-cased names that moved or
    /// disappeared.
    pub fn adjust<F>(&mut self, sheet: SheetId, f: F) -> Vec<String>
    where
        F: Fn(Rect) -> Option<Rect>,
    {
        let mut touched = Vec::new();
        self.entries.retain(|k, area| {
            if area.sheet != sheet {
                return true;
            }
            match f(area.rect) {
                Some(rect) => {
                    if rect != area.rect {
                        area.rect = rect;
                        touched.push(k.clone());
                    }
                    true
                }
                None => {
                    touched.push(k.clone());
                    false
                }
            }
        });
        touched
    }

    /// Drops every name on `sheet`, returning the lower-cased names.
    pub fn remove_sheet(&mut self, sheet: SheetId) -> Vec<String> {
        self.adjust(sheet, |_| None)
    }
}
