//! Normalization of raw tables.
//!
//! [`clean`] applies, in order:
//!
//! 1. trim whitespace around every column name
//! 2. trim whitespace around every cell of text columns
//! 3. turn every empty or whitespace-only text cell into [`Value::Null`]
//!
//! No column is dropped, renamed beyond the trim, or retyped, and cleaning a cleaned table is a
//! no-op.

use std::ops::Deref;

use crate::types::{StorageType, Table, Value};

/// A table that has been through [`clean`].
///
/// Only the cleaner and the table store (when reloading a persisted table) construct one, so
/// holding a `CleanedTable` means the normalizations above hold.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedTable(Table);

impl CleanedTable {
    /// Wrap a table read back from durable storage. It was cleaned before it was written.
    pub(crate) fn from_persisted(table: Table) -> Self {
        Self(table)
    }

    /// Borrow the underlying table.
    pub fn table(&self) -> &Table {
        &self.0
    }

    /// Unwrap into the underlying table.
    pub fn into_inner(self) -> Table {
        self.0
    }
}

impl Deref for CleanedTable {
    type Target = Table;

    fn deref(&self) -> &Table {
        &self.0
    }
}

/// Normalize a raw table. Pure; never fails.
pub fn clean(mut table: Table) -> CleanedTable {
    for field in &mut table.schema.fields {
        let trimmed = field.name.trim();
        if trimmed.len() != field.name.len() {
            field.name = trimmed.to_string();
        }
    }

    let text_columns: Vec<bool> = table
        .schema
        .fields
        .iter()
        .map(|f| f.storage == StorageType::Utf8)
        .collect();

    for row in &mut table.rows {
        for (idx, cell) in row.iter_mut().enumerate() {
            let blank = match cell {
                Value::Utf8(s) => {
                    if text_columns.get(idx).copied().unwrap_or(false) {
                        trim_in_place(s);
                    }
                    s.trim().is_empty()
                }
                _ => false,
            };
            if blank {
                *cell = Value::Null;
            }
        }
    }

    CleanedTable(table)
}

fn trim_in_place(s: &mut String) {
    let trimmed = s.trim();
    if trimmed.len() != s.len() {
        *s = trimmed.to_string();
    }
}
