//! Report structure: nested relational groups

use crate::data::{DataCursor, RowStream};
use crate::error::{ProcessingError, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One group level, keyed on one or more columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDef {
    pub name: String,
    pub key_columns: SmallVec<[usize; 2]>,
}

impl GroupDef {
    pub fn new(name: impl Into<String>, key_columns: &[usize]) -> Self {
        Self {
            name: name.into(),
            key_columns: SmallVec::from_slice(key_columns),
        }
    }
}

/// Read-only description of the group nesting, outermost first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStructure {
    groups: Vec<GroupDef>,
}

impl ReportStructure {
    pub fn new(groups: Vec<GroupDef>) -> Self {
        Self { groups }
    }

    /// Structure without groups
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group(&self, level: usize) -> Option<&GroupDef> {
        self.groups.get(level)
    }

    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    /// Check that every key column exists in the cursor
    pub fn validate(&self, cursor: &dyn DataCursor) -> Result<()> {
        for group in &self.groups {
            if let Some(col) = group
                .key_columns
                .iter()
                .find(|&&c| c >= cursor.column_count())
            {
                return Err(ProcessingError::DataAccess(format!(
                    "group '{}' keys on column {} but source has {} columns",
                    group.name,
                    col,
                    cursor.column_count()
                )));
            }
        }
        Ok(())
    }

    /// Outermost group level that breaks between `row` and `next`
    ///
    /// Keys are cumulative: a change in level `g`'s key breaks `g` and every
    /// level nested inside it.
    pub fn break_level(
        &self,
        cursor: &dyn DataCursor,
        stream: &RowStream,
        row: usize,
        next: usize,
    ) -> Result<Option<usize>> {
        let current = stream.data_item(row)?;
        let following = stream.data_item(next)?;
        if current == following {
            return Ok(None);
        }
        for (level, group) in self.groups.iter().enumerate() {
            for &column in &group.key_columns {
                if cursor.value_at(current, column)? != cursor.value_at(following, column)? {
                    return Ok(Some(level));
                }
            }
        }
        Ok(None)
    }
}
