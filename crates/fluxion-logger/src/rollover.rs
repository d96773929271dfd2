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

//! Daily rollover of the output sheets.
//!
//! On startup and at every local midnight the controller either restores the
//! current day's sheets from the local snapshot or creates a fresh set. The
//! snapshot is only trusted when it was written for the same local day by the
//! same storage session.
//!
//! Rollover is not atomic: a crash between sheet creation and snapshot save
//! leaves orphaned sheets behind and the next start creates new ones.

use crate::context::RunContext;
use crate::error::Result;
use crate::settings::SheetHeaders;
use crate::time;
use crate::traits::{SheetStore, StateStore};
use crate::types::{FileId, TodaySnapshot, header_row};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverState {
    /// New sheets were created for today.
    Fresh,
    /// Today's sheets were taken from the snapshot.
    Restored,
}

pub struct Rollover {
    store: Arc<dyn SheetStore>,
    snapshots: Arc<dyn StateStore<TodaySnapshot>>,
    headers: SheetHeaders,
}

impl std::fmt::Debug for Rollover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rollover")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl Rollover {
    pub fn new(
        store: Arc<dyn SheetStore>,
        snapshots: Arc<dyn StateStore<TodaySnapshot>>,
        headers: SheetHeaders,
    ) -> Self {
        Self {
            store,
            snapshots,
            headers,
        }
    }

    /// Roll over to the current local day.
    pub async fn run(&self, ctx: &mut RunContext) -> Result<RolloverState> {
        let today = time::today_label(ctx.timezone);
        self.run_for(ctx, &today).await
    }

    /// Roll over to the day labelled `date`.
    pub async fn run_for(&self, ctx: &mut RunContext, date: &str) -> Result<RolloverState> {
        let stored = self.snapshots.load().unwrap_or_else(|e| {
            warn!("⚠️ Ignoring unreadable daily snapshot: {}", e);
            None
        });

        if let Some(snapshot) = stored
            && snapshot.is_valid_for(date, ctx.session())
        {
            info!("📂 Restored sheets for {} from snapshot", date);
            ctx.today = Some(snapshot);
            return Ok(RolloverState::Restored);
        }

        info!("📅 Starting new day {}", date);
        let derived = self
            .create_destination(date, &ctx.folders.derived, &self.headers.derived)
            .await?;
        let measurements = self
            .create_destination(date, &ctx.folders.measurements, &self.headers.measurements)
            .await?;
        let forecast = self
            .create_destination(date, &ctx.folders.forecast, &self.headers.forecast)
            .await?;

        let snapshot = TodaySnapshot {
            derived,
            measurements,
            forecast,
            date: date.to_owned(),
            auth_token: ctx.session().to_owned(),
        };
        if let Err(e) = self.snapshots.save(&snapshot) {
            error!("❌ Failed to save daily snapshot: {}", e);
        }
        ctx.today = Some(snapshot);

        Ok(RolloverState::Fresh)
    }

    async fn create_destination(
        &self,
        title: &str,
        folder: &FileId,
        header: &[String],
    ) -> Result<FileId> {
        let sheet = self.store.create_sheet(title).await?;
        self.store.move_to_folder(&sheet, folder).await?;
        self.store
            .append_rows(&sheet, &[header_row(header)], None)
            .await?;
        if let Err(e) = self.store.resize_columns(&sheet).await {
            warn!("⚠️ Failed to resize columns of {}: {}", sheet, e);
        }
        Ok(sheet)
    }
}
