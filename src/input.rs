//! Common routines for reading the flat input tables.
//!
//! Every set and parameter lives in its own tab-delimited file with a fixed
//! header naming the index columns followed by the value column. Whitespace
//! around string keys is stripped during deserialisation so that node and
//! plant identifiers match exactly across files.
use crate::id::IdLike;
use anyhow::{ensure, Context, Result};
use csv::{ReaderBuilder, Trim};
use indexmap::IndexSet;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

/// Open a tab-delimited reader with whitespace trimming
fn tab_reader(file_path: &Path) -> Result<csv::Reader<File>> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))
}

/// Read a series of rows of type `T` from a tab file
pub fn read_tab_vec<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let records: Vec<T> = tab_reader(file_path)?
        .deserialize()
        .collect::<Result<_, _>>()
        .with_context(|| input_err_msg(file_path))?;
    ensure!(!records.is_empty(), "Input file {file_path:?} is empty");
    Ok(records)
}

/// Like [`read_tab_vec`], but a missing file yields an empty table.
///
/// Used by optional-module tables (heat, hydrogen) which are only present
/// when the module's data has been prepared.
pub fn read_tab_vec_optional<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    if !file_path.is_file() {
        return Ok(Vec::new());
    }
    tab_reader(file_path)?
        .deserialize()
        .collect::<Result<_, _>>()
        .with_context(|| input_err_msg(file_path))
}

/// Read a one-column set file into an ordered set of IDs
pub fn read_id_set<ID: IdLike + DeserializeOwned>(file_path: &Path) -> Result<IndexSet<ID>> {
    #[derive(Deserialize)]
    struct Row<ID>(ID);

    let mut ids = IndexSet::new();
    for row in read_tab_vec::<Row<ID>>(file_path)? {
        ensure!(
            ids.insert(row.0.clone()),
            "Duplicate entry {} in {file_path:?}",
            row.0
        );
    }
    Ok(ids)
}

/// As [`read_id_set`], but a missing file yields an empty set
pub fn read_id_set_optional<ID: IdLike + DeserializeOwned>(
    file_path: &Path,
) -> Result<IndexSet<ID>> {
    if !file_path.is_file() {
        return Ok(IndexSet::new());
    }
    read_id_set(file_path)
}

/// Format the error message to use if an input file cannot be read
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeID;
    use serde::Deserialize;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Deserialize, Debug, PartialEq)]
    struct ParamRow {
        #[serde(rename = "Node")]
        node: NodeID,
        #[serde(rename = "Period")]
        period: u32,
        #[serde(rename = "Value")]
        value: f64,
    }

    #[test]
    fn test_read_tab_vec_trims_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("param.tab");
        fs::write(&path, "Node\tPeriod\tValue\n Norway \t1\t2.5\n").unwrap();

        let rows: Vec<ParamRow> = read_tab_vec(&path).unwrap();
        assert_eq!(
            rows,
            vec![ParamRow {
                node: "Norway".into(),
                period: 1,
                value: 2.5
            }]
        );
    }

    #[test]
    fn test_read_tab_vec_empty_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("param.tab");
        fs::write(&path, "Node\tPeriod\tValue\n").unwrap();
        assert!(read_tab_vec::<ParamRow>(&path).is_err());
    }

    #[test]
    fn test_read_id_set_rejects_duplicates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nodes.tab");
        fs::write(&path, "Node\nNorway\nSweden\nNorway\n").unwrap();
        assert!(read_id_set::<NodeID>(&path).is_err());
    }

    #[test]
    fn test_read_optional_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.tab");
        assert!(read_tab_vec_optional::<ParamRow>(&path).unwrap().is_empty());
        assert!(read_id_set_optional::<NodeID>(&path).unwrap().is_empty());
    }
}
