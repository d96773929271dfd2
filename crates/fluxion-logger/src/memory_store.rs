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

//! In-memory collaborators.
//!
//! Used when debug mode is on (nothing leaves the process) and by tests.

use crate::error::{Error, Result};
use crate::traits::{SheetStore, StateStore};
use crate::types::{CellValue, FileId, Row, UpdateSummary};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct MemorySheet {
    pub title: String,
    pub parent: Option<FileId>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    folders: HashMap<FileId, (String, Option<FileId>)>,
    sheets: HashMap<FileId, MemorySheet>,
    calls: usize,
    fail_appends: bool,
    fail_resizes: bool,
}

impl Inner {
    fn allocate(&mut self, prefix: &str) -> FileId {
        self.next_id += 1;
        FileId(format!("{prefix}-{}", self.next_id))
    }

    fn sheet_mut(&mut self, sheet: &FileId) -> Result<&mut MemorySheet> {
        self.sheets
            .get_mut(sheet)
            .ok_or_else(|| Error::Storage(format!("sheet not found: {sheet}")))
    }
}

#[derive(Debug, Default)]
pub struct MemorySheetStore {
    inner: Mutex<Inner>,
}

impl MemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following append fail with a storage error.
    pub fn fail_appends(&self, fail: bool) {
        self.inner.lock().fail_appends = fail;
    }

    /// Make every following resize fail with a storage error.
    pub fn fail_resizes(&self, fail: bool) {
        self.inner.lock().fail_resizes = fail;
    }

    /// Total number of trait calls received.
    pub fn call_count(&self) -> usize {
        self.inner.lock().calls
    }

    pub fn sheet(&self, sheet: &FileId) -> Option<MemorySheet> {
        self.inner.lock().sheets.get(sheet).cloned()
    }

    pub fn sheet_count(&self) -> usize {
        self.inner.lock().sheets.len()
    }

    pub fn folder_parent(&self, folder: &FileId) -> Option<FileId> {
        self.inner
            .lock()
            .folders
            .get(folder)
            .and_then(|(_, parent)| parent.clone())
    }
}

/// Parse the 1-based row number out of an `A12`-style start cell.
fn start_row(range: &str) -> Result<usize> {
    let cell = range.rsplit('!').next().unwrap_or(range);
    let cell = cell.split(':').next().unwrap_or(cell);
    cell.trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse::<usize>()
        .ok()
        .filter(|row| *row > 0)
        .ok_or_else(|| Error::Storage(format!("invalid range: {range}")))
}

fn cell_count(rows: &[Row]) -> u64 {
    rows.iter().map(|row| row.len() as u64).sum()
}

#[async_trait]
impl SheetStore for MemorySheetStore {
    async fn create_folder(&self, title: &str) -> Result<FileId> {
        let mut inner = self.inner.lock();
        inner.calls += 1;
        let id = inner.allocate("folder");
        inner.folders.insert(id.clone(), (title.to_owned(), None));
        debug!("Created folder '{}' as {}", title, id);
        Ok(id)
    }

    async fn create_sheet(&self, title: &str) -> Result<FileId> {
        let mut inner = self.inner.lock();
        inner.calls += 1;
        let id = inner.allocate("sheet");
        inner.sheets.insert(
            id.clone(),
            MemorySheet {
                title: title.to_owned(),
                ..Default::default()
            },
        );
        debug!("Created sheet '{}' as {}", title, id);
        Ok(id)
    }

    async fn move_to_folder(&self, file: &FileId, folder: &FileId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls += 1;
        if !inner.folders.contains_key(folder) {
            return Err(Error::Storage(format!("folder not found: {folder}")));
        }
        if let Some(sheet) = inner.sheets.get_mut(file) {
            sheet.parent = Some(folder.clone());
            return Ok(());
        }
        match inner.folders.get_mut(file) {
            Some((_, parent)) => {
                *parent = Some(folder.clone());
                Ok(())
            }
            None => Err(Error::Storage(format!("file not found: {file}"))),
        }
    }

    async fn append_rows(
        &self,
        sheet: &FileId,
        rows: &[Row],
        _range: Option<&str>,
    ) -> Result<UpdateSummary> {
        let mut inner = self.inner.lock();
        inner.calls += 1;
        if inner.fail_appends {
            return Err(Error::Storage("append rejected".to_owned()));
        }
        let target = inner.sheet_mut(sheet)?;
        let first = target.rows.len() + 1;
        target.rows.extend_from_slice(rows);
        Ok(UpdateSummary {
            updated_cells: cell_count(rows),
            updated_range: Some(format!("A{first}")),
        })
    }

    async fn overwrite_rows(
        &self,
        sheet: &FileId,
        rows: &[Row],
        range: &str,
    ) -> Result<UpdateSummary> {
        let start = start_row(range)? - 1;
        let mut inner = self.inner.lock();
        inner.calls += 1;
        let target = inner.sheet_mut(sheet)?;
        if target.rows.len() < start + rows.len() {
            target.rows.resize(start + rows.len(), Vec::new());
        }
        for (offset, row) in rows.iter().enumerate() {
            target.rows[start + offset].clone_from(row);
        }
        Ok(UpdateSummary {
            updated_cells: cell_count(rows),
            updated_range: Some(range.to_owned()),
        })
    }

    async fn resize_columns(&self, sheet: &FileId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls += 1;
        if inner.fail_resizes {
            return Err(Error::Storage("resize rejected".to_owned()));
        }
        inner.sheet_mut(sheet).map(|_| ())
    }

    async fn count_rows(&self, sheet: &FileId) -> Result<usize> {
        let mut inner = self.inner.lock();
        inner.calls += 1;
        let target = inner.sheet_mut(sheet)?;
        Ok(target
            .rows
            .iter()
            .rposition(|row| row.iter().any(|c| *c != CellValue::Empty))
            .map_or(0, |last| last + 1))
    }
}

/// State document kept in memory.
#[derive(Debug)]
pub struct MemoryStateStore<T> {
    value: Mutex<Option<T>>,
    fail_saves: bool,
}

impl<T> MemoryStateStore<T> {
    pub fn new(initial: Option<T>) -> Self {
        Self {
            value: Mutex::new(initial),
            fail_saves: false,
        }
    }

    /// Store whose saves always fail.
    pub fn failing(initial: Option<T>) -> Self {
        Self {
            value: Mutex::new(initial),
            fail_saves: true,
        }
    }
}

impl<T: Clone> MemoryStateStore<T> {
    pub fn get(&self) -> Option<T> {
        self.value.lock().clone()
    }
}

impl<T: Clone + Send> StateStore<T> for MemoryStateStore<T> {
    fn load(&self) -> Result<Option<T>> {
        Ok(self.value.lock().clone())
    }

    fn save(&self, value: &T) -> Result<()> {
        if self.fail_saves {
            return Err(Error::State("save rejected".to_owned()));
        }
        *self.value.lock() = Some(value.clone());
        Ok(())
    }
}
