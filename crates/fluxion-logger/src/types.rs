// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote file or folder identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A single spreadsheet cell as written with user-entered semantics.
///
/// Formulas are plain strings starting with `=`; the storage backend
/// evaluates them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Formula(String),
    Empty,
}

impl CellValue {
    pub fn formula(expr: impl Into<String>) -> Self {
        Self::Formula(expr.into())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) | Self::Formula(_) | Self::Empty => None,
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

pub type Row = Vec<CellValue>;

/// Build a header row from column titles.
pub fn header_row<S: AsRef<str>>(titles: &[S]) -> Row {
    titles
        .iter()
        .map(|t| CellValue::Text(t.as_ref().to_owned()))
        .collect()
}

/// Result of a write against the storage backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub updated_cells: u64,
    pub updated_range: Option<String>,
}

/// Identifiers of the current day's sheets.
///
/// Persisted so a restart on the same day keeps writing to the same sheets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodaySnapshot {
    pub derived: FileId,
    pub measurements: FileId,
    pub forecast: FileId,
    /// Local day label (`MM-DD-YYYY`) the sheets were created for.
    pub date: String,
    /// Fingerprint of the storage session that created the sheets.
    pub auth_token: String,
}

impl TodaySnapshot {
    pub fn is_valid_for(&self, date: &str, auth_token: &str) -> bool {
        self.date == date && self.auth_token == auth_token
    }
}

/// Folder hierarchy the daily sheets are filed into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderLayout {
    pub root: FileId,
    pub derived: FileId,
    pub measurements: FileId,
    pub forecast: FileId,
    pub auth_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cells_serialize_as_plain_values() {
        let row: Row = vec![
            CellValue::Number(1.5),
            CellValue::from("12:00:00 PM"),
            CellValue::formula("=D2+1"),
            CellValue::Empty,
        ];
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!([1.5, "12:00:00 PM", "=D2+1", null])
        );
    }

    #[test]
    fn test_snapshot_validity_requires_date_and_token() {
        let snapshot = TodaySnapshot {
            derived: "d".into(),
            measurements: "m".into(),
            forecast: "f".into(),
            date: "01-15-2024".to_owned(),
            auth_token: "abc".to_owned(),
        };
        assert!(snapshot.is_valid_for("01-15-2024", "abc"));
        assert!(!snapshot.is_valid_for("01-16-2024", "abc"));
        assert!(!snapshot.is_valid_for("01-15-2024", "other"));
    }
}
