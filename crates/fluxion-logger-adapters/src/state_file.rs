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

//! JSON state files (daily snapshot, folder layout).

use fluxion_logger::{Error, Result, StateStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default path of the daily snapshot file.
pub const DEFAULT_TODAY_PATH: &str = "./data/today.json";

/// Default path of the folder layout file.
pub const DEFAULT_LAYOUT_PATH: &str = "./data/drive.json";

#[derive(Debug)]
pub struct JsonStateFile<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonStateFile<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> StateStore<T> for JsonStateFile<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            debug!("State file {} not found", self.path.display());
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| Error::State(format!("Failed to read {}: {e}", self.path.display())))?;
        let value = serde_json::from_str(&contents)
            .map_err(|e| Error::State(format!("Failed to parse {}: {e}", self.path.display())))?;

        Ok(Some(value))
    }

    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn save(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                Error::State(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(value)?;

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &json).map_err(|e| {
            Error::State(format!(
                "Failed to write temp file {}: {e}",
                temp_path.display()
            ))
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            Error::State(format!(
                "Failed to rename temp file to {}: {e}",
                self.path.display()
            ))
        })?;

        info!("💾 Saved state to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxion_logger::TodaySnapshot;
    use tempfile::tempdir;

    fn snapshot() -> TodaySnapshot {
        TodaySnapshot {
            derived: "d".into(),
            measurements: "m".into(),
            forecast: "f".into(),
            date: "01-15-2024".to_owned(),
            auth_token: "fp".to_owned(),
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let dir = tempdir().unwrap();
        let file = JsonStateFile::<TodaySnapshot>::new(dir.path().join("today.json"));
        assert_eq!(file.load().unwrap(), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let file = JsonStateFile::new(dir.path().join("nested").join("today.json"));

        file.save(&snapshot()).unwrap();
        assert_eq!(file.load().unwrap(), Some(snapshot()));
        assert!(!file.path().with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_a_state_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("today.json");
        fs::write(&path, "{ not json").unwrap();

        let file = JsonStateFile::<TodaySnapshot>::new(path);
        assert!(matches!(file.load(), Err(Error::State(_))));
    }
}
