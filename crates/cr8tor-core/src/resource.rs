//! Key/value resource documents (`project.toml`, `access.toml`, `dataset*.toml`).
//!
//! A `ResourceDoc` is read whole, edited in memory and written back
//! atomically. Sections are top-level keys; list sections hold tables that
//! are matched by one of their keys.

use crate::error::{Cr8torError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use toml::{Table, Value};

#[derive(Debug, Clone)]
pub struct ResourceDoc {
    path: PathBuf,
    table: Table,
}

impl ResourceDoc {
    // ---------------------------------------------------------------------------
    // Whole-document operations
    // ---------------------------------------------------------------------------

    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Cr8torError::ResourceNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let table: Table = data.parse()?;
        Ok(Self {
            path: path.to_path_buf(),
            table,
        })
    }

    /// New empty document bound to `path`. Nothing is written until `write`.
    pub fn create(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            table: Table::new(),
        }
    }

    pub fn write(&self) -> Result<()> {
        crate::io::write_toml(&self.path, &self.table)?;
        tracing::debug!(path = %self.path.display(), "updated resource file");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ---------------------------------------------------------------------------
    // Section access
    // ---------------------------------------------------------------------------

    pub fn section(&self, key: &str) -> Option<&Value> {
        self.table.get(key)
    }

    pub fn has_section(&self, key: &str) -> bool {
        self.table.contains_key(key)
    }

    /// Deserialize a section into `T`, failing with `MissingSection` if absent.
    pub fn section_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.section(key).ok_or_else(|| self.missing(key))?;
        Ok(value.clone().try_into()?)
    }

    /// Deserialize the whole document into `T`.
    pub fn parse_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(Value::Table(self.table.clone()).try_into()?)
    }

    pub fn table_section(&self, key: &str) -> Result<&Table> {
        self.section(key)
            .and_then(Value::as_table)
            .ok_or_else(|| self.missing(key))
    }

    pub fn table_section_mut(&mut self, key: &str) -> Result<&mut Table> {
        let missing = self.missing(key);
        self.table
            .get_mut(key)
            .and_then(Value::as_table_mut)
            .ok_or(missing)
    }

    pub fn set_section(&mut self, key: &str, value: impl Serialize) -> Result<()> {
        let value = Value::try_from(value)?;
        self.table.insert(key.to_string(), value);
        Ok(())
    }

    /// Create an empty list section if the document has none.
    pub fn ensure_list_section(&mut self, key: &str) {
        self.table
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
    }

    // ---------------------------------------------------------------------------
    // List section operations
    // ---------------------------------------------------------------------------

    /// Remove every entry of list section `key` whose `match_key` equals the
    /// record's, then append the record. Returns true if an entry was replaced.
    pub fn append_or_replace(
        &mut self,
        key: &str,
        record: impl Serialize,
        match_key: &str,
    ) -> Result<bool> {
        let record = Value::try_from(record)?;
        let match_value = record.get(match_key).cloned().ok_or_else(|| {
            Cr8torError::Validation(format!("record has no '{match_key}' to match on"))
        })?;
        let replaced = self.remove_matching(key, match_key, &match_value)? > 0;
        self.list_section_mut(key)?.push(record);
        Ok(replaced)
    }

    /// Remove entries of list section `key` whose `match_key` equals `value`.
    /// Returns the number of entries removed.
    pub fn remove_matching(&mut self, key: &str, match_key: &str, value: &Value) -> Result<usize> {
        let list = self.list_section_mut(key)?;
        let before = list.len();
        list.retain(|entry| entry.get(match_key) != Some(value));
        Ok(before - list.len())
    }

    pub fn list_section(&self, key: &str) -> Result<&[Value]> {
        self.section(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| self.missing(key))
    }

    fn list_section_mut(&mut self, key: &str) -> Result<&mut Vec<Value>> {
        let missing = self.missing(key);
        self.table
            .get_mut(key)
            .and_then(Value::as_array_mut)
            .ok_or(missing)
    }

    fn missing(&self, key: &str) -> Cr8torError {
        Cr8torError::MissingSection {
            section: key.to_string(),
            path: self.path.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
