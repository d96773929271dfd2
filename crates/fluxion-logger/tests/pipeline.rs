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

//! End-to-end tests of the logging pipeline against in-memory storage.

use async_trait::async_trait;
use chrono_tz::UTC;
use fluxion_logger::{
    CellValue, DerivedLayout, DriveSetup, Error, FolderLayout, FolderTitles, ForecastSample,
    ForecastSettings, ForecastSource, ForecastUpdater, MemorySheetStore, MemoryStateStore,
    PanelGeometry, PowerChannel, Reconciler, Result, Rollover, RolloverState, RunContext, Sample,
    SharedReconciler, SheetHeaders, TodaySnapshot, Writer, WriterSettings,
};
use serde_json::Map;
use std::sync::Arc;

const CHANNELS: [&str; 4] = ["ch0", "ch1", "ch2", "ch3"];
const DAY: &str = "01-15-2024";
// 2024-01-15T12:00:00Z
const NOON_MS: i64 = 1_705_320_000_000;

struct StaticForecast(Vec<ForecastSample>);

#[async_trait]
impl ForecastSource for StaticForecast {
    async fn fetch_forecast(&self) -> Result<Vec<ForecastSample>> {
        Ok(self.0.clone())
    }
}

struct FailingForecast;

#[async_trait]
impl ForecastSource for FailingForecast {
    async fn fetch_forecast(&self) -> Result<Vec<ForecastSample>> {
        Err(Error::Forecast("service unavailable".to_owned()))
    }
}

fn power_channels() -> Vec<PowerChannel> {
    vec![
        PowerChannel {
            name: "MPPT".to_owned(),
            voltage_index: 0,
            current_index: 1,
        },
        PowerChannel {
            name: "Load-Only".to_owned(),
            voltage_index: 2,
            current_index: 3,
        },
    ]
}

fn panel() -> PanelGeometry {
    PanelGeometry {
        area_m2: 1.5,
        tilt_deg: 0.0,
        azimuth_deg: 0.0,
    }
}

struct Harness {
    store: Arc<MemorySheetStore>,
    reconciler: SharedReconciler,
    writer: Writer,
    ctx: RunContext,
}

async fn harness(reserve: usize) -> Harness {
    let store = Arc::new(MemorySheetStore::new());
    let setup = DriveSetup::new(
        store.clone(),
        Arc::new(MemoryStateStore::<FolderLayout>::new(None)),
        FolderTitles::default(),
    );
    let folders = setup.ensure("session").await.unwrap();
    let mut ctx = RunContext::new(UTC, "session", folders);

    let layout = DerivedLayout::new(power_channels(), panel());
    let headers = SheetHeaders {
        derived: layout.header(),
        measurements: ["Timestamp", "Local Time", "V1", "I1", "V2", "I2"]
            .into_iter()
            .map(str::to_owned)
            .collect(),
        forecast: ForecastSettings::default().fields,
    };
    let rollover = Rollover::new(
        store.clone(),
        Arc::new(MemoryStateStore::<TodaySnapshot>::new(None)),
        headers,
    );
    assert_eq!(
        rollover.run_for(&mut ctx, DAY).await.unwrap(),
        RolloverState::Fresh
    );

    let reconciler = Reconciler::new(CHANNELS, UTC).shared();
    let writer = Writer::new(
        store.clone(),
        reconciler.clone(),
        layout,
        WriterSettings { reserve },
    );

    Harness {
        store,
        reconciler,
        writer,
        ctx,
    }
}

fn forecast_sample(minutes_after_noon: i64) -> ForecastSample {
    ForecastSample {
        period_end: chrono::DateTime::from_timestamp_millis(NOON_MS + minutes_after_noon * 60_000)
            .unwrap(),
        dhi: 100.0,
        dni: 500.0,
        zenith: 0.0,
        azimuth: 180.0,
        extra: Map::new(),
    }
}

#[tokio::test]
async fn test_out_of_order_reports_are_flushed_in_timestamp_order() {
    let mut h = harness(10).await;

    // 15 timestamps, channels report in rotating order and timestamps arrive
    // interleaved back to front
    for (i, ts) in (0..15_i64).rev().enumerate() {
        for k in 0..CHANNELS.len() {
            let channel = CHANNELS[(i + k) % CHANNELS.len()];
            h.reconciler
                .lock()
                .report(channel, Sample::new(NOON_MS + ts * 1_000, 2.0))
                .unwrap();
        }
    }
    // One timestamp is still missing a channel
    h.reconciler
        .lock()
        .report("ch0", Sample::new(NOON_MS + 99_000, 1.0))
        .unwrap();

    let report = h.writer.flush(&h.ctx).await.unwrap();
    assert_eq!(report.rows, 5);
    assert_eq!(report.derived_start_row, Some(2));
    assert_eq!(h.reconciler.lock().ready_len(), 10);

    let today = h.ctx.today.clone().unwrap();
    let measurements = h.store.sheet(&today.measurements).unwrap().rows;
    assert_eq!(measurements.len(), 6);
    let stamps: Vec<f64> = measurements[1..]
        .iter()
        .map(|row| row[0].as_number().unwrap())
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));

    let derived = h.store.sheet(&today.derived).unwrap().rows;
    assert_eq!(derived.len(), 6);
    // First data row of the day seeds every integral at zero
    assert_eq!(derived[1][3], CellValue::Number(0.0));
    assert_eq!(derived[1][5], CellValue::Number(0.0));
    assert_eq!(
        derived[2][3],
        CellValue::formula("=D2+(C2+C3)/2*(A3-A2)/3600000")
    );
    // No forecast yet
    assert_eq!(derived[1][6], CellValue::Number(0.0));

    // Remaining rows go out once the reserve is released
    h.ctx.total_irradiance = 200.0;
    let writer = Writer::new(
        h.store.clone(),
        h.reconciler.clone(),
        DerivedLayout::new(power_channels(), panel()),
        WriterSettings { reserve: 0 },
    );
    let report = writer.flush(&h.ctx).await.unwrap();
    assert_eq!(report.rows, 10);
    assert_eq!(report.derived_start_row, Some(7));

    let derived = h.store.sheet(&today.derived).unwrap().rows;
    assert_eq!(derived.len(), 16);
    assert_eq!(
        derived[6][3],
        CellValue::formula("=D6+(C6+C7)/2*(A7-A6)/3600000")
    );
    assert_eq!(derived[6][6], CellValue::Number(200.0));
    assert_eq!(derived[6][7], CellValue::Number(300.0));
    assert_eq!(h.reconciler.lock().staging_len(), 1);
}

#[tokio::test]
async fn test_reserve_is_taken_from_the_latest_completions() {
    let h = harness(1).await;
    let (t1, t2) = (NOON_MS, NOON_MS + 1_000);

    {
        let mut reconciler = h.reconciler.lock();
        for channel in &CHANNELS[..3] {
            reconciler.report(channel, Sample::new(t2, 1.0)).unwrap();
            reconciler.report(channel, Sample::new(t1, 1.0)).unwrap();
        }
        reconciler.report("ch3", Sample::new(t2, 1.0)).unwrap();
        reconciler.report("ch3", Sample::new(t1, 1.0)).unwrap();
    }

    let report = h.writer.flush(&h.ctx).await.unwrap();
    assert_eq!(report.rows, 1);
    assert_eq!(h.reconciler.lock().ready_len(), 1);

    let writer = Writer::new(
        h.store.clone(),
        h.reconciler.clone(),
        DerivedLayout::new(power_channels(), panel()),
        WriterSettings { reserve: 0 },
    );
    assert_eq!(writer.flush(&h.ctx).await.unwrap().rows, 1);

    // Each flush is sorted on its own, the sheet keeps append order
    let today = h.ctx.today.clone().unwrap();
    let measurements = h.store.sheet(&today.measurements).unwrap().rows;
    let stamps: Vec<f64> = measurements[1..]
        .iter()
        .map(|row| row[0].as_number().unwrap())
        .collect();
    assert_eq!(stamps, vec![t2 as f64, t1 as f64]);
}

#[tokio::test]
async fn test_empty_flush_makes_no_storage_calls() {
    let h = harness(10).await;
    let calls = h.store.call_count();

    let report = h.writer.flush(&h.ctx).await.unwrap();
    assert_eq!(report.rows, 0);
    assert_eq!(h.store.call_count(), calls);
}

#[tokio::test]
async fn test_flush_without_rollover_is_a_configuration_error() {
    let h = harness(0).await;
    let ctx = RunContext::new(UTC, "session", h.ctx.folders.clone());

    assert!(matches!(
        h.writer.flush(&ctx).await,
        Err(Error::MissingDestination(_))
    ));
}

#[tokio::test]
async fn test_append_failure_propagates() {
    let h = harness(0).await;
    for channel in CHANNELS {
        h.reconciler
            .lock()
            .report(channel, Sample::new(NOON_MS, 1.0))
            .unwrap();
    }
    h.store.fail_appends(true);

    let err = h.writer.flush(&h.ctx).await.unwrap_err();
    assert!(err.is_transient());
    // Drained rows are not put back
    assert_eq!(h.reconciler.lock().ready_len(), 0);
}

#[tokio::test]
async fn test_resize_failure_does_not_fail_flush() {
    let h = harness(0).await;
    for channel in CHANNELS {
        h.reconciler
            .lock()
            .report(channel, Sample::new(NOON_MS, 1.0))
            .unwrap();
    }
    h.store.fail_resizes(true);

    assert_eq!(h.writer.flush(&h.ctx).await.unwrap().rows, 1);
}

#[tokio::test]
async fn test_forecast_overwrites_remaining_slots_of_the_day() {
    let mut h = harness(10).await;
    // First sample ends at 12:30 UTC: 23 half-hour slots remain until midnight
    let samples: Vec<ForecastSample> = (0..30).map(|i| forecast_sample(30 + i * 30)).collect();
    let updater = ForecastUpdater::new(
        h.store.clone(),
        Arc::new(StaticForecast(samples)),
        panel(),
        ForecastSettings::default(),
    );

    let report = updater.update(&mut h.ctx).await.unwrap();
    assert_eq!(report.rows_written, 23);
    assert_eq!(report.range.as_deref(), Some("A27"));
    // Flat panel, sun overhead: (dhi + dni) * area
    assert!((h.ctx.total_irradiance - 900.0).abs() < 1e-9);

    let today = h.ctx.today.clone().unwrap();
    let rows = h.store.sheet(&today.forecast).unwrap().rows;
    assert_eq!(rows.len(), 26 + 23);
    assert_eq!(
        rows[26][0],
        CellValue::Text("2024-01-15T12:30:00Z".to_owned())
    );
}

#[tokio::test]
async fn test_forecast_failure_keeps_previous_irradiance() {
    let mut h = harness(10).await;
    h.ctx.total_irradiance = 123.0;
    let updater = ForecastUpdater::new(
        h.store.clone(),
        Arc::new(FailingForecast),
        panel(),
        ForecastSettings::default(),
    );

    assert!(matches!(
        updater.update(&mut h.ctx).await,
        Err(Error::Forecast(_))
    ));
    assert_eq!(h.ctx.total_irradiance, 123.0);
}

#[tokio::test]
async fn test_empty_forecast_is_an_error() {
    let mut h = harness(10).await;
    let updater = ForecastUpdater::new(
        h.store.clone(),
        Arc::new(StaticForecast(Vec::new())),
        panel(),
        ForecastSettings::default(),
    );

    assert!(updater.update(&mut h.ctx).await.is_err());
    assert!(h.ctx.total_irradiance.is_nan());
}
