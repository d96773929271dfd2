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

//! Periodic flush of completed measurements to storage.

use crate::context::RunContext;
use crate::derived::DerivedLayout;
use crate::error::Result;
use crate::reconciler::SharedReconciler;
use crate::settings::WriterSettings;
use crate::traits::SheetStore;
use crate::types::{FileId, Row};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub rows: usize,
    /// Sheet row the first derived row was written to.
    pub derived_start_row: Option<usize>,
}

pub struct Writer {
    store: Arc<dyn SheetStore>,
    reconciler: SharedReconciler,
    layout: DerivedLayout,
    settings: WriterSettings,
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("layout", &self.layout)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Writer {
    pub fn new(
        store: Arc<dyn SheetStore>,
        reconciler: SharedReconciler,
        layout: DerivedLayout,
        settings: WriterSettings,
    ) -> Self {
        Self {
            store,
            reconciler,
            layout,
            settings,
        }
    }

    pub fn layout(&self) -> &DerivedLayout {
        &self.layout
    }

    /// Drain ready rows and append them with their derived rows.
    ///
    /// Drained rows are not restored when an append fails.
    pub async fn flush(&self, ctx: &RunContext) -> Result<FlushReport> {
        let today = ctx.today()?;

        let ready = self.reconciler.lock().drain_ready(self.settings.reserve);
        if ready.is_empty() {
            info!("No telemetry received since the last flush");
            return Ok(FlushReport {
                rows: 0,
                derived_start_row: None,
            });
        }

        let first_row = self.store.count_rows(&today.derived).await? + 1;
        let raw: Vec<Row> = ready.iter().map(|row| row.to_row()).collect();
        let derived = self.layout.rows(&ready, first_row, ctx.total_irradiance);

        let summary = self
            .store
            .append_rows(&today.measurements, &raw, None)
            .await?;
        debug!(
            "Measurements appended: {} cells at {:?}",
            summary.updated_cells, summary.updated_range
        );
        self.resize_best_effort(&today.measurements).await;

        self.store
            .append_rows(&today.derived, &derived, None)
            .await?;
        self.resize_best_effort(&today.derived).await;

        info!(
            "📝 Flushed {} measurements (derived from row {})",
            ready.len(),
            first_row
        );
        Ok(FlushReport {
            rows: ready.len(),
            derived_start_row: Some(first_row),
        })
    }

    async fn resize_best_effort(&self, sheet: &FileId) {
        if let Err(e) = self.store.resize_columns(sheet).await {
            warn!("⚠️ Failed to resize columns of {}: {}", sheet, e);
        }
    }
}
