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

//! Collaborator interfaces.
//!
//! The core never talks to a concrete backend. Adapters for the remote
//! spreadsheet service, the forecast API and local state files implement
//! these traits.

use crate::error::Result;
use crate::forecast::ForecastSample;
use crate::types::{FileId, Row, UpdateSummary};
use async_trait::async_trait;

/// Spreadsheet-backed storage.
#[async_trait]
pub trait SheetStore: Send + Sync {
    async fn create_folder(&self, title: &str) -> Result<FileId>;

    async fn create_sheet(&self, title: &str) -> Result<FileId>;

    /// Re-parent `file` under `folder`, detaching it from previous parents.
    async fn move_to_folder(&self, file: &FileId, folder: &FileId) -> Result<()>;

    /// Append after the last non-empty row. `range` narrows the table
    /// detection start, `None` means `A1`.
    async fn append_rows(
        &self,
        sheet: &FileId,
        rows: &[Row],
        range: Option<&str>,
    ) -> Result<UpdateSummary>;

    /// Overwrite cells starting at `range` (e.g. `A12`).
    async fn overwrite_rows(
        &self,
        sheet: &FileId,
        rows: &[Row],
        range: &str,
    ) -> Result<UpdateSummary>;

    /// Fit column widths to content.
    async fn resize_columns(&self, sheet: &FileId) -> Result<()>;

    /// Number of occupied rows, header included.
    async fn count_rows(&self, sheet: &FileId) -> Result<usize>;
}

/// Source of irradiance forecasts for the remainder of the day.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch_forecast(&self) -> Result<Vec<ForecastSample>>;
}

/// Small persisted state document.
pub trait StateStore<T>: Send + Sync {
    /// Returns `None` when nothing was stored yet.
    fn load(&self) -> Result<Option<T>>;

    fn save(&self, value: &T) -> Result<()>;
}
