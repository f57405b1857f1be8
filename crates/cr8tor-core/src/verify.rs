use crate::contract::TableMetadata;
use std::collections::{HashMap, HashSet};

/// Check that every locally requested table and column exists in the
/// metadata the source returned. Returns the first mismatch as a message.
///
/// A local table with no listed columns only requires the table itself.
pub fn verify_tables_metadata(remote: &[TableMetadata], local: &[TableMetadata]) -> Option<String> {
    let lookup: HashMap<&str, HashSet<&str>> = remote
        .iter()
        .map(|t| {
            let cols = t
                .columns
                .iter()
                .flatten()
                .map(|c| c.name.as_str())
                .collect();
            (t.name.as_str(), cols)
        })
        .collect();

    for table in local {
        let Some(remote_cols) = lookup.get(table.name.as_str()) else {
            return Some(format!(
                "Table '{}' is missing from target schema metadata.",
                table.name
            ));
        };
        for col in table.columns.iter().flatten() {
            if !remote_cols.contains(col.name.as_str()) {
                return Some(format!(
                    "Column '{}' is missing from target schema table '{}' metadata.",
                    col.name, table.name
                ));
            }
        }
    }
    None
}
