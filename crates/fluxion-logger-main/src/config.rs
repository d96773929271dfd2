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

use anyhow::{Context, Result};
use chrono_tz::Tz;
use fluxion_logger::{
    FolderTitles, ForecastSettings, PanelGeometry, PowerChannel, SheetHeaders, StagingThresholds,
    WriterSettings,
};
use fluxion_logger_adapters::pusher::PusherConfig;
use fluxion_logger_adapters::sheets::{DEFAULT_DRIVE_URL, DEFAULT_SHEETS_URL};
use fluxion_logger_adapters::{DEFAULT_LAYOUT_PATH, DEFAULT_TODAY_PATH};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound for every task interval (one week)
const MAX_INTERVAL_SECS: u64 = 7 * 86_400;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub system: SystemConfig,

    /// Telemetry channels in column order
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelConfig>,

    /// Voltage/current pairs turned into power and energy columns
    #[serde(default = "default_power_channels")]
    pub power: Vec<PowerChannelConfig>,

    #[serde(default)]
    pub panel: PanelConfig,

    #[serde(default)]
    pub pusher: PusherSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub writer: WriterConfig,

    #[serde(default)]
    pub staging: StagingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// IANA timezone of the installation; day boundaries follow it
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Safe mode: sheets are kept in memory, nothing is written to storage
    #[serde(default = "default_true")]
    pub debug_mode: bool,

    /// Delay before retrying a failed daily rollover (seconds)
    #[serde(default = "default_rollover_retry_secs")]
    pub rollover_retry_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Feed channel name
    pub id: String,

    /// Column title in the measurements sheet
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PowerChannelConfig {
    pub name: String,

    /// Channel id carrying voltage
    pub voltage: String,

    /// Channel id carrying current
    pub current: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default = "default_panel_area")]
    pub area_m2: f64,

    #[serde(default = "default_panel_tilt")]
    pub tilt_deg: f64,

    #[serde(default)]
    pub azimuth_deg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PusherSettings {
    /// Pusher app key
    #[serde(default)]
    pub key: String,

    #[serde(default = "default_pusher_cluster")]
    pub cluster: String,

    /// Event carrying telemetry payloads
    #[serde(default = "default_pusher_event")]
    pub event: String,

    /// Full websocket URL, overrides key/cluster (self-hosted servers, tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// OAuth access token for the spreadsheet service
    #[serde(default, skip_serializing)]
    pub token: String,

    #[serde(default = "default_sheets_url")]
    pub sheets_url: String,

    #[serde(default = "default_drive_url")]
    pub drive_url: String,

    #[serde(default = "default_root_folder")]
    pub root_folder: String,

    #[serde(default = "default_derived_folder")]
    pub derived_folder: String,

    #[serde(default = "default_measurements_folder")]
    pub measurements_folder: String,

    #[serde(default = "default_forecast_folder")]
    pub forecast_folder: String,

    /// Daily snapshot file
    #[serde(default = "default_today_path")]
    pub today_path: String,

    /// Folder layout file
    #[serde(default = "default_layout_path")]
    pub layout_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Forecast endpoint including site id and query
    #[serde(default)]
    pub url: String,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Sample attributes written to the forecast sheet
    #[serde(default = "default_forecast_fields")]
    pub fields: Vec<String>,

    /// Spacing of forecast samples (minutes)
    #[serde(default = "default_sample_interval_minutes")]
    pub sample_interval_minutes: u64,

    /// How often the forecast is refreshed (seconds)
    #[serde(default = "default_forecast_update_secs")]
    pub update_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// How often completed measurements are flushed (seconds)
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Completed rows held back on each flush to absorb late completions
    #[serde(default = "default_reserve")]
    pub reserve: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    #[serde(default = "default_staging_warn")]
    pub warn_threshold: usize,

    #[serde(default = "default_staging_error")]
    pub error_threshold: usize,

    /// How often the staging buffer size is checked (seconds)
    #[serde(default = "default_staging_check_secs")]
    pub check_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    "America/Chicago".to_owned()
}

fn default_rollover_retry_secs() -> u64 {
    300
}

fn default_channels() -> Vec<ChannelConfig> {
    [
        ("ch0", "MPPT Voltage (V)"),
        ("ch1", "MPPT Current (A)"),
        ("ch2", "Load Voltage (V)"),
        ("ch3", "Load Current (A)"),
    ]
    .into_iter()
    .map(|(id, name)| ChannelConfig {
        id: id.to_owned(),
        name: name.to_owned(),
    })
    .collect()
}

fn default_power_channels() -> Vec<PowerChannelConfig> {
    vec![
        PowerChannelConfig {
            name: "MPPT".to_owned(),
            voltage: "ch0".to_owned(),
            current: "ch1".to_owned(),
        },
        PowerChannelConfig {
            name: "Load-Only".to_owned(),
            voltage: "ch2".to_owned(),
            current: "ch3".to_owned(),
        },
    ]
}

fn default_panel_area() -> f64 {
    PanelGeometry::default().area_m2
}

fn default_panel_tilt() -> f64 {
    PanelGeometry::default().tilt_deg
}

fn default_pusher_cluster() -> String {
    "us2".to_owned()
}

fn default_pusher_event() -> String {
    "new-data".to_owned()
}

fn default_sheets_url() -> String {
    DEFAULT_SHEETS_URL.to_owned()
}

fn default_drive_url() -> String {
    DEFAULT_DRIVE_URL.to_owned()
}

fn default_root_folder() -> String {
    FolderTitles::default().root
}

fn default_derived_folder() -> String {
    FolderTitles::default().derived
}

fn default_measurements_folder() -> String {
    FolderTitles::default().measurements
}

fn default_forecast_folder() -> String {
    FolderTitles::default().forecast
}

fn default_today_path() -> String {
    DEFAULT_TODAY_PATH.to_owned()
}

fn default_layout_path() -> String {
    DEFAULT_LAYOUT_PATH.to_owned()
}

fn default_forecast_fields() -> Vec<String> {
    ForecastSettings::default().fields
}

fn default_sample_interval_minutes() -> u64 {
    30
}

fn default_forecast_update_secs() -> u64 {
    1800
}

fn default_flush_interval_secs() -> u64 {
    60
}

fn default_reserve() -> usize {
    WriterSettings::default().reserve
}

fn default_staging_warn() -> usize {
    StagingThresholds::default().warn
}

fn default_staging_error() -> usize {
    StagingThresholds::default().error
}

fn default_staging_check_secs() -> u64 {
    60
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            debug_mode: true,
            rollover_retry_secs: default_rollover_retry_secs(),
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            area_m2: default_panel_area(),
            tilt_deg: default_panel_tilt(),
            azimuth_deg: 0.0,
        }
    }
}

impl Default for PusherSettings {
    fn default() -> Self {
        Self {
            key: String::new(),
            cluster: default_pusher_cluster(),
            event: default_pusher_event(),
            url: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            sheets_url: default_sheets_url(),
            drive_url: default_drive_url(),
            root_folder: default_root_folder(),
            derived_folder: default_derived_folder(),
            measurements_folder: default_measurements_folder(),
            forecast_folder: default_forecast_folder(),
            today_path: default_today_path(),
            layout_path: default_layout_path(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            fields: default_forecast_fields(),
            sample_interval_minutes: default_sample_interval_minutes(),
            update_interval_secs: default_forecast_update_secs(),
        }
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
            reserve: default_reserve(),
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            warn_threshold: default_staging_warn(),
            error_threshold: default_staging_error(),
            check_interval_secs: default_staging_check_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            system: SystemConfig::default(),
            channels: default_channels(),
            power: default_power_channels(),
            panel: PanelConfig::default(),
            pusher: PusherSettings::default(),
            storage: StorageConfig::default(),
            forecast: ForecastConfig::default(),
            writer: WriterConfig::default(),
            staging: StagingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or from `config.toml` / `config.json`
    /// in the working directory, falling back to defaults. Environment
    /// overrides are applied on top in every case.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let config = Self::from_file(path)?;
                info!("✅ Loaded configuration from {}", path.display());
                config
            }
            None => Self::discover()?,
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn discover() -> Result<Self> {
        for candidate in ["config.toml", "config.json"] {
            let path = Path::new(candidate);
            if path.exists() {
                let config = Self::from_file(path)?;
                info!("✅ Loaded configuration from {}", candidate);
                return Ok(config);
            }
        }

        warn!("No configuration file found, using defaults with environment overrides");
        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&contents, path)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            toml::from_str(contents).with_context(|| format!("Failed to parse {}", path.display()))
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("FLUXION_LOGGER_STORAGE_TOKEN") {
            self.storage.token = token;
        }

        if let Ok(key) = std::env::var("PUSHER_KEY") {
            self.pusher.key = key;
        }

        if let Ok(url) = std::env::var("SOLCAST_URL") {
            self.forecast.url = url;
        }

        if let Ok(key) = std::env::var("SOLCAST_API_KEY") {
            self.forecast.api_key = Some(key);
        }

        if let Ok(tz) = std::env::var("FLUXION_LOGGER_TIMEZONE") {
            self.system.timezone = tz;
        }

        if let Ok(debug_mode) = std::env::var("DEBUG_MODE")
            && let Ok(enabled) = debug_mode.parse::<bool>()
        {
            self.system.debug_mode = enabled;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.timezone()?;

        if self.channels.is_empty() {
            anyhow::bail!("Configuration must include at least one channel");
        }
        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.id.is_empty() {
                anyhow::bail!("Channel '{}' has empty id", channel.name);
            }
            if !seen.insert(channel.id.as_str()) {
                anyhow::bail!("Duplicate channel id '{}'", channel.id);
            }
        }
        self.power_channels()?;

        if self.panel.area_m2 <= 0.0 {
            anyhow::bail!("panel.area_m2 must be positive");
        }

        if self.pusher.key.is_empty() && self.pusher.url.is_none() {
            anyhow::bail!("pusher.key must be set (or PUSHER_KEY environment variable)");
        }
        if self.pusher.event.is_empty() {
            anyhow::bail!("pusher.event cannot be empty");
        }

        if !self.system.debug_mode && self.storage.token.is_empty() {
            anyhow::bail!(
                "storage.token must be set when debug_mode is off (or FLUXION_LOGGER_STORAGE_TOKEN)"
            );
        }

        if self.forecast.url.is_empty() {
            anyhow::bail!("forecast.url must be set (or SOLCAST_URL environment variable)");
        }
        if self.forecast.fields.is_empty() {
            anyhow::bail!("forecast.fields cannot be empty");
        }
        if !(1..=1440).contains(&self.forecast.sample_interval_minutes) {
            anyhow::bail!("forecast.sample_interval_minutes must be between 1 and 1440");
        }

        let intervals = [
            (
                "forecast.update_interval_secs",
                self.forecast.update_interval_secs,
            ),
            (
                "writer.flush_interval_secs",
                self.writer.flush_interval_secs,
            ),
            (
                "staging.check_interval_secs",
                self.staging.check_interval_secs,
            ),
            (
                "system.rollover_retry_secs",
                self.system.rollover_retry_secs,
            ),
        ];
        for (name, secs) in intervals {
            if !(1..=MAX_INTERVAL_SECS).contains(&secs) {
                anyhow::bail!("{name} must be between 1 and {MAX_INTERVAL_SECS} seconds");
            }
        }

        if self.staging.warn_threshold >= self.staging.error_threshold {
            anyhow::bail!("staging.warn_threshold must be less than staging.error_threshold");
        }

        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.system
            .timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {e}", self.system.timezone))
    }

    pub fn channel_ids(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.id.clone()).collect()
    }

    fn channel_index(&self, id: &str, role: &str, pair: &str) -> Result<usize> {
        self.channels
            .iter()
            .position(|c| c.id == id)
            .with_context(|| {
                format!("Power channel '{pair}' references unknown {role} channel '{id}'")
            })
    }

    pub fn power_channels(&self) -> Result<Vec<PowerChannel>> {
        self.power
            .iter()
            .map(|p| {
                Ok(PowerChannel {
                    name: p.name.clone(),
                    voltage_index: self.channel_index(&p.voltage, "voltage", &p.name)?,
                    current_index: self.channel_index(&p.current, "current", &p.name)?,
                })
            })
            .collect()
    }

    pub fn panel_geometry(&self) -> PanelGeometry {
        PanelGeometry {
            area_m2: self.panel.area_m2,
            tilt_deg: self.panel.tilt_deg,
            azimuth_deg: self.panel.azimuth_deg,
        }
    }

    pub fn writer_settings(&self) -> WriterSettings {
        WriterSettings {
            reserve: self.writer.reserve,
        }
    }

    pub fn staging_thresholds(&self) -> StagingThresholds {
        StagingThresholds {
            warn: self.staging.warn_threshold,
            error: self.staging.error_threshold,
        }
    }

    pub fn forecast_settings(&self) -> ForecastSettings {
        ForecastSettings {
            fields: self.forecast.fields.clone(),
            sample_interval: Duration::from_secs(self.forecast.sample_interval_minutes * 60),
        }
    }

    pub fn folder_titles(&self) -> FolderTitles {
        FolderTitles {
            root: self.storage.root_folder.clone(),
            derived: self.storage.derived_folder.clone(),
            measurements: self.storage.measurements_folder.clone(),
            forecast: self.storage.forecast_folder.clone(),
        }
    }

    /// Header rows of the three daily sheets
    pub fn sheet_headers(&self, derived: Vec<String>, forecast: Vec<String>) -> SheetHeaders {
        let mut measurements = vec!["Timestamp".to_owned(), "Local Time".to_owned()];
        measurements.extend(self.channels.iter().map(|c| c.name.clone()));

        SheetHeaders {
            derived,
            measurements,
            forecast,
        }
    }

    pub fn pusher_config(&self) -> PusherConfig {
        PusherConfig {
            url: self
                .pusher
                .url
                .clone()
                .unwrap_or_else(|| PusherConfig::endpoint(&self.pusher.key, &self.pusher.cluster)),
            channels: self.channel_ids(),
            event: self.pusher.event.clone(),
        }
    }
}
