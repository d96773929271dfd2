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

//! FluxION Logger core.
//!
//! Joins pushed solar telemetry into timestamped rows, derives power and
//! energy metrics and files everything into daily spreadsheets next to an
//! irradiance forecast. Backends are reached through the traits in
//! [`traits`]; concrete adapters live in `fluxion-logger-adapters`.

pub mod context;
pub mod derived;
pub mod error;
pub mod forecast;
pub mod ingest;
pub mod memory_store;
pub mod reconciler;
pub mod rollover;
pub mod settings;
pub mod setup;
pub mod task_queue;
pub mod time;
pub mod traits;
pub mod types;
pub mod writer;

pub use context::{RunContext, session_fingerprint};
pub use derived::DerivedLayout;
pub use error::{Error, Result};
pub use forecast::{ForecastReport, ForecastSample, ForecastUpdater};
pub use ingest::{FeedEvent, run_ingest};
pub use memory_store::{MemorySheetStore, MemoryStateStore};
pub use reconciler::{
    ReadyRow, Reconciler, ReportOutcome, Sample, SharedReconciler, StagingHealth,
};
pub use rollover::{Rollover, RolloverState};
pub use settings::{
    FolderTitles, ForecastSettings, PanelGeometry, PowerChannel, SheetHeaders, StagingThresholds,
    WriterSettings,
};
pub use setup::DriveSetup;
pub use task_queue::TaskQueue;
pub use traits::{ForecastSource, SheetStore, StateStore};
pub use types::{CellValue, FileId, FolderLayout, Row, TodaySnapshot, UpdateSummary};
pub use writer::{FlushReport, Writer};
