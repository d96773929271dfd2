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

//! Runtime settings consumed by the core components.
//!
//! These are plain values; loading and validation live in the binary's
//! configuration layer.

use std::time::Duration;

/// Fixed panel installation used for irradiance estimates. Angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelGeometry {
    pub area_m2: f64,
    pub tilt_deg: f64,
    pub azimuth_deg: f64,
}

impl Default for PanelGeometry {
    fn default() -> Self {
        Self {
            area_m2: 1.6,
            tilt_deg: 30.0,
            azimuth_deg: 0.0,
        }
    }
}

/// A voltage/current channel pair whose product is a power reading.
///
/// Indices refer to positions in the configured channel list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerChannel {
    pub name: String,
    pub voltage_index: usize,
    pub current_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterSettings {
    /// Completed rows held back on every flush to absorb late completions.
    pub reserve: usize,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self { reserve: 10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingThresholds {
    pub warn: usize,
    pub error: usize,
}

impl Default for StagingThresholds {
    fn default() -> Self {
        Self {
            warn: 10,
            error: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastSettings {
    /// Sample attributes written to the forecast sheet, in column order.
    pub fields: Vec<String>,
    /// Spacing between consecutive forecast samples.
    pub sample_interval: Duration,
}

impl ForecastSettings {
    /// Number of forecast samples covering one full day.
    pub fn slots_per_day(&self) -> usize {
        let interval = self.sample_interval.as_secs().max(1);
        usize::try_from(86_400 / interval).unwrap_or(usize::MAX)
    }
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            fields: ["period_end", "ghi", "dni", "dhi", "zenith", "azimuth"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            sample_interval: Duration::from_secs(30 * 60),
        }
    }
}

/// Titles of the folder hierarchy created on first start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderTitles {
    pub root: String,
    pub derived: String,
    pub measurements: String,
    pub forecast: String,
}

impl Default for FolderTitles {
    fn default() -> Self {
        Self {
            root: "FluxION Solar Monitoring".to_owned(),
            derived: "Derived Values".to_owned(),
            measurements: "Measurements".to_owned(),
            forecast: "Forecast Data".to_owned(),
        }
    }
}

/// Header rows written into freshly created daily sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetHeaders {
    pub derived: Vec<String>,
    pub measurements: Vec<String>,
    pub forecast: Vec<String>,
}
