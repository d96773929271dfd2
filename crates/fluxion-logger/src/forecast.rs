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

//! Irradiance forecast handling.
//!
//! The forecast sheet holds one row per sample slot of the day. Each update
//! rewrites the slots from the first returned sample up to midnight, so past
//! slots keep the last forecast they received.

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::settings::{ForecastSettings, PanelGeometry};
use crate::time;
use crate::traits::{ForecastSource, SheetStore};
use crate::types::{CellValue, Row};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One forecast period. Angles in degrees, irradiance in W/m².
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub period_end: DateTime<Utc>,
    #[serde(default)]
    pub dhi: f64,
    #[serde(default)]
    pub dni: f64,
    #[serde(default)]
    pub zenith: f64,
    #[serde(default)]
    pub azimuth: f64,
    /// Remaining provider attributes (`ghi`, `air_temp`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ForecastSample {
    /// Cell for a named attribute; unknown attributes are empty.
    pub fn field(&self, name: &str) -> CellValue {
        match name {
            "period_end" => {
                CellValue::Text(self.period_end.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            "dhi" => CellValue::Number(self.dhi),
            "dni" => CellValue::Number(self.dni),
            "zenith" => CellValue::Number(self.zenith),
            "azimuth" => CellValue::Number(self.azimuth),
            other => match self.extra.get(other) {
                Some(Value::Number(n)) => n.as_f64().map_or(CellValue::Empty, CellValue::Number),
                Some(Value::String(s)) => CellValue::Text(s.clone()),
                Some(Value::Bool(b)) => CellValue::Text(b.to_string()),
                Some(Value::Null | Value::Array(_) | Value::Object(_)) | None => CellValue::Empty,
            },
        }
    }

    pub fn to_row(&self, fields: &[String]) -> Row {
        fields.iter().map(|f| self.field(f)).collect()
    }
}

/// Cosine of the angle between the sun direction and the panel normal.
pub fn incidence_cos(zenith_deg: f64, azimuth_deg: f64, panel: &PanelGeometry) -> f64 {
    let zenith = zenith_deg.to_radians();
    let tilt = panel.tilt_deg.to_radians();
    let relative_azimuth = (azimuth_deg - panel.azimuth_deg).to_radians();

    zenith.sin() * tilt.sin() * relative_azimuth.cos() + zenith.cos() * tilt.cos()
}

/// Irradiance reaching the panel for one sample, scaled by panel area.
pub fn total_irradiance(sample: &ForecastSample, panel: &PanelGeometry) -> f64 {
    let cos_incidence = incidence_cos(sample.zenith, sample.azimuth, panel);
    (sample.dhi + sample.dni * cos_incidence) * panel.area_m2
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastReport {
    pub rows_written: usize,
    /// Start cell of the overwritten block, `None` when nothing was written.
    pub range: Option<String>,
}

pub struct ForecastUpdater {
    store: Arc<dyn SheetStore>,
    source: Arc<dyn ForecastSource>,
    panel: PanelGeometry,
    settings: ForecastSettings,
}

impl std::fmt::Debug for ForecastUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastUpdater")
            .field("panel", &self.panel)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ForecastUpdater {
    pub fn new(
        store: Arc<dyn SheetStore>,
        source: Arc<dyn ForecastSource>,
        panel: PanelGeometry,
        settings: ForecastSettings,
    ) -> Self {
        Self {
            store,
            source,
            panel,
            settings,
        }
    }

    /// Forecast sheet header.
    pub fn header(&self) -> Vec<String> {
        self.settings.fields.clone()
    }

    /// Sample slots left from `first_period_end` until local midnight.
    fn remaining_slots(&self, first_period_end: DateTime<Utc>, ctx: &RunContext) -> usize {
        let until = time::until_midnight(first_period_end, ctx.timezone);
        let interval_ms = self.settings.sample_interval.as_millis().max(1) as f64;
        let slots = (until.num_milliseconds() as f64 / interval_ms).round();
        time::clamp(slots as usize, None, Some(self.settings.slots_per_day()))
    }

    /// Refresh the irradiance estimate and rewrite today's forecast slots.
    pub async fn update(&self, ctx: &mut RunContext) -> Result<ForecastReport> {
        let sheet = ctx.today()?.forecast.clone();

        let samples = match self.source.fetch_forecast().await {
            Ok(samples) => samples,
            Err(e) => {
                error!("❌ No forecast data available: {}", e);
                return Err(e);
            }
        };
        let Some(first) = samples.first() else {
            error!("❌ No forecast data available: empty response");
            return Err(Error::Forecast("empty forecast".to_owned()));
        };

        ctx.total_irradiance = total_irradiance(first, &self.panel);
        debug!("Total irradiance estimate: {:.1}", ctx.total_irradiance);

        let remaining = self.remaining_slots(first.period_end, ctx);
        let start_index = self.settings.slots_per_day().saturating_sub(remaining);
        let range = format!("A{}", 2 + start_index);

        let rows: Vec<Row> = samples
            .iter()
            .take(remaining)
            .map(|s| s.to_row(&self.settings.fields))
            .collect();
        if rows.is_empty() {
            info!("Forecast has no slots left for today");
            return Ok(ForecastReport {
                rows_written: 0,
                range: None,
            });
        }

        let summary = self.store.overwrite_rows(&sheet, &rows, &range).await?;
        info!(
            "☀️ Forecast updated: {} slots from {} ({} cells)",
            rows.len(),
            range,
            summary.updated_cells
        );

        if let Err(e) = self.store.resize_columns(&sheet).await {
            warn!("⚠️ Failed to resize forecast sheet columns: {}", e);
        }

        Ok(ForecastReport {
            rows_written: rows.len(),
            range: Some(range),
        })
    }
}
