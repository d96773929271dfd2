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

//! Wiring of the logger: startup sequence, periodic tasks and shutdown.

use crate::config::AppConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use chrono_tz::Tz;
use fluxion_logger::{
    DerivedLayout, DriveSetup, FolderLayout, ForecastSource, ForecastUpdater, MemorySheetStore,
    MemoryStateStore, Reconciler, Rollover, RolloverState, RunContext, SharedReconciler,
    SheetStore, StagingHealth, StagingThresholds, StateStore, TaskQueue, TodaySnapshot, Writer,
    run_ingest, session_fingerprint, time,
};
use fluxion_logger_adapters::{GoogleSheetsStore, JsonStateFile, PusherFeed, SolcastClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Capacity of the feed to ingest channel
const FEED_BUFFER: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Rollover,
    UpdateForecast,
    FlushMeasurements,
    CheckStaging,
}

/// Backends the services run against.
pub struct Backends {
    pub store: Arc<dyn SheetStore>,
    pub forecast: Arc<dyn ForecastSource>,
    pub snapshots: Arc<dyn StateStore<TodaySnapshot>>,
    pub layouts: Arc<dyn StateStore<FolderLayout>>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
struct Intervals {
    forecast: Duration,
    flush: Duration,
    staging: Duration,
    rollover_retry: Duration,
}

pub struct Services {
    timezone: Tz,
    session: String,
    setup: DriveSetup,
    rollover: Rollover,
    forecast: ForecastUpdater,
    writer: Writer,
    reconciler: SharedReconciler,
    thresholds: StagingThresholds,
    intervals: Intervals,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("timezone", &self.timezone)
            .field("intervals", &self.intervals)
            .finish_non_exhaustive()
    }
}

impl Services {
    pub fn new(
        config: &AppConfig,
        backends: Backends,
        reconciler: SharedReconciler,
    ) -> Result<Self> {
        let timezone = config.timezone()?;
        let layout = DerivedLayout::new(config.power_channels()?, config.panel_geometry());
        let forecast = ForecastUpdater::new(
            backends.store.clone(),
            backends.forecast,
            config.panel_geometry(),
            config.forecast_settings(),
        );
        let writer = Writer::new(
            backends.store.clone(),
            reconciler.clone(),
            layout,
            config.writer_settings(),
        );
        let headers = config.sheet_headers(writer.layout().header(), forecast.header());

        Ok(Self {
            timezone,
            session: session_fingerprint(&config.storage.token),
            setup: DriveSetup::new(
                backends.store.clone(),
                backends.layouts,
                config.folder_titles(),
            ),
            rollover: Rollover::new(backends.store, backends.snapshots, headers),
            forecast,
            writer,
            reconciler,
            thresholds: config.staging_thresholds(),
            intervals: Intervals {
                forecast: Duration::from_secs(config.forecast.update_interval_secs),
                flush: Duration::from_secs(config.writer.flush_interval_secs),
                staging: Duration::from_secs(config.staging.check_interval_secs),
                rollover_retry: Duration::from_secs(config.system.rollover_retry_secs),
            },
        })
    }

    /// Prepare folders and today's sheets, then run the periodic tasks.
    ///
    /// Only returns when the startup sequence fails.
    pub async fn drive(&self, queue: &mut TaskQueue<Task>) -> Result<()> {
        let mut ctx = self.start().await?;
        self.schedule(queue);

        while let Some(task) = queue.next().await {
            self.dispatch(task, &mut ctx, queue).await;
        }
        Ok(())
    }

    /// Folder setup and the first rollover are fatal, the first forecast is not.
    pub async fn start(&self) -> Result<RunContext> {
        let folders = self
            .setup
            .ensure(&self.session)
            .await
            .context("Failed to prepare storage folders")?;
        let mut ctx = RunContext::new(self.timezone, self.session.clone(), folders);

        let state = self
            .rollover
            .run(&mut ctx)
            .await
            .context("Failed to prepare today's sheets")?;
        info!("📅 Daily sheets ready ({:?})", state);

        if let Err(e) = self.forecast.update(&mut ctx).await {
            warn!("⚠️ Starting without forecast, will retry: {}", e);
        }
        if let Err(e) = self.writer.flush(&ctx).await {
            warn!("⚠️ Initial flush failed: {}", e);
        }

        Ok(ctx)
    }

    pub fn schedule(&self, queue: &mut TaskQueue<Task>) {
        queue.once(Task::Rollover, self.until_midnight());
        queue.repeat(Task::UpdateForecast, self.intervals.forecast);
        queue.repeat(Task::FlushMeasurements, self.intervals.flush);
        queue.repeat(Task::CheckStaging, self.intervals.staging);
    }

    fn until_midnight(&self) -> Duration {
        time::delay_from(time::until_midnight(Utc::now(), self.timezone))
    }

    pub async fn dispatch(&self, task: Task, ctx: &mut RunContext, queue: &mut TaskQueue<Task>) {
        match task {
            Task::Rollover => match self.rollover.run(ctx).await {
                Ok(state) => {
                    info!("📅 Rolled over to a new day ({:?})", state);
                    if state == RolloverState::Fresh {
                        queue.once(Task::UpdateForecast, Duration::ZERO);
                    }
                    queue.once(Task::Rollover, self.until_midnight());
                }
                Err(e) => {
                    error!(
                        "❌ Daily rollover failed, retrying in {}s: {}",
                        self.intervals.rollover_retry.as_secs(),
                        e
                    );
                    queue.once(Task::Rollover, self.intervals.rollover_retry);
                }
            },
            Task::UpdateForecast => {
                if let Err(e) = self.forecast.update(ctx).await {
                    warn!("⚠️ Forecast update failed: {}", e);
                }
            }
            Task::FlushMeasurements => {
                if let Err(e) = self.writer.flush(ctx).await {
                    if e.is_transient() {
                        warn!("⚠️ Flush failed, rows of this batch are lost: {}", e);
                    } else {
                        error!("❌ Flush failed: {}", e);
                    }
                }
            }
            Task::CheckStaging => self.check_staging(),
        }
    }

    fn check_staging(&self) {
        let health = self.reconciler.lock().health(&self.thresholds);
        match health {
            StagingHealth::Normal => debug!("Staging buffer healthy"),
            StagingHealth::Elevated(n) => {
                warn!("⚠️ {} incomplete measurements waiting for missing channels", n);
            }
            StagingHealth::Critical(n) => {
                error!(
                    "❌ {} incomplete measurements staged, a channel may have stopped reporting",
                    n
                );
            }
        }
    }
}

/// Build backends from configuration. Debug mode keeps all sheets and
/// state in memory.
pub fn backends(config: &AppConfig) -> Result<Backends> {
    let forecast = Arc::new(
        SolcastClient::new(&config.forecast.url, config.forecast.api_key.clone())
            .context("Invalid forecast configuration")?,
    );

    if config.system.debug_mode {
        warn!("🔒 DEBUG MODE: sheets are kept in memory, nothing is written to storage");
        return Ok(Backends {
            store: Arc::new(MemorySheetStore::new()),
            forecast,
            snapshots: Arc::new(MemoryStateStore::<TodaySnapshot>::new(None)),
            layouts: Arc::new(MemoryStateStore::<FolderLayout>::new(None)),
        });
    }

    let store = GoogleSheetsStore::with_base_urls(
        &config.storage.sheets_url,
        &config.storage.drive_url,
        &config.storage.token,
    )
    .context("Invalid storage configuration")?;

    Ok(Backends {
        store: Arc::new(store),
        forecast,
        snapshots: Arc::new(JsonStateFile::<TodaySnapshot>::new(&config.storage.today_path)),
        layouts: Arc::new(JsonStateFile::<FolderLayout>::new(&config.storage.layout_path)),
    })
}

/// Run until the feed disconnects, startup fails or a shutdown signal arrives.
pub async fn run(config: AppConfig) -> Result<()> {
    let reconciler = Reconciler::new(config.channel_ids(), config.timezone()?).shared();
    let services = Services::new(&config, backends(&config)?, reconciler.clone())?;

    let (events_tx, events_rx) = mpsc::channel(FEED_BUFFER);
    let feed = PusherFeed::connect(config.pusher_config(), events_tx)
        .await
        .context("Failed to connect to the telemetry feed")?;
    let mut ingest = tokio::spawn(run_ingest(events_rx, reconciler));

    let mut queue = TaskQueue::new();
    let result = tokio::select! {
        result = services.drive(&mut queue) => result,
        joined = &mut ingest => match joined {
            Ok(e) => {
                error!("❌ Telemetry feed lost: {}", e);
                Err(e.into())
            }
            Err(e) => Err(anyhow::anyhow!("Ingest task failed: {e}")),
        },
        () = shutdown_signal() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    feed.disconnect().await;
    ingest.abort();
    info!("Shutting down");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("⚠️ Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("⚠️ Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use fluxion_logger::{ForecastSample, Sample};
    use serde_json::json;

    struct StaticForecast;

    #[async_trait]
    impl ForecastSource for StaticForecast {
        async fn fetch_forecast(&self) -> fluxion_logger::Result<Vec<ForecastSample>> {
            let period_end = Utc::now() + TimeDelta::minutes(30);
            let sample = serde_json::from_value(json!({
                "period_end": period_end,
                "ghi": 500.0,
                "dni": 400.0,
                "dhi": 100.0,
                "zenith": 40.0,
                "azimuth": 0.0,
            }))?;
            Ok(vec![sample])
        }
    }

    struct Fixture {
        store: Arc<MemorySheetStore>,
        snapshots: Arc<MemoryStateStore<TodaySnapshot>>,
        reconciler: SharedReconciler,
        services: Services,
    }

    fn fixture() -> Fixture {
        let mut config = AppConfig::default();
        config.system.timezone = "UTC".to_owned();

        let store = Arc::new(MemorySheetStore::new());
        let snapshots = Arc::new(MemoryStateStore::<TodaySnapshot>::new(None));
        let reconciler = Reconciler::new(config.channel_ids(), chrono_tz::UTC).shared();
        let backends = Backends {
            store: store.clone(),
            forecast: Arc::new(StaticForecast),
            snapshots: snapshots.clone(),
            layouts: Arc::new(MemoryStateStore::<FolderLayout>::new(None)),
        };
        let services = Services::new(&config, backends, reconciler.clone()).unwrap();

        Fixture {
            store,
            snapshots,
            reconciler,
            services,
        }
    }

    fn report_rows(reconciler: &SharedReconciler, count: i64) {
        let mut reconciler = reconciler.lock();
        for i in 0..count {
            for channel in ["ch0", "ch1", "ch2", "ch3"] {
                reconciler
                    .report(channel, Sample::new(1_000 * (i + 1), 12.0))
                    .unwrap();
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_prepares_sheets_and_forecast() {
        let f = fixture();

        let ctx = f.services.start().await.unwrap();

        let today = ctx.today().unwrap().clone();
        assert_eq!(f.snapshots.get(), Some(today.clone()));
        assert!(ctx.total_irradiance > 0.0);
        assert_eq!(f.store.sheet_count(), 3);
        assert_eq!(
            f.store.folder_parent(&ctx.folders.derived),
            Some(ctx.folders.root.clone())
        );

        let forecast = f.store.sheet(&today.forecast).unwrap();
        assert!(forecast.rows.len() > 1);
        assert_eq!(forecast.rows[0][0], "period_end".into());
        assert_eq!(forecast.rows[0].len(), f.services.forecast.header().len());

        let derived = f.store.sheet(&today.derived).unwrap();
        assert_eq!(
            derived.rows[0].len(),
            f.services.writer.layout().header().len()
        );
        assert_eq!(derived.rows[0][3], "MPPT Energy Accumulated (Wh)".into());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_flushes_periodically() {
        let f = fixture();
        let mut queue = TaskQueue::new();

        report_rows(&f.reconciler, 15);
        let result =
            tokio::time::timeout(Duration::from_secs(65), f.services.drive(&mut queue)).await;
        assert!(result.is_err(), "drive only returns on startup failure");

        let today = f.snapshots.get().unwrap();
        let measurements = f.store.sheet(&today.measurements).unwrap();
        // Header plus 5 rows, 10 stay in reserve across both flushes
        assert_eq!(measurements.rows.len(), 1 + 5);
        assert_eq!(f.reconciler.lock().ready_len(), 10);

        // Midnight rollover plus the three repeating tasks
        assert_eq!(queue.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_rollover_is_retried() {
        let f = fixture();
        let started = f.services.start().await.unwrap();
        // A new session invalidates the stored snapshot
        let mut ctx = RunContext::new(chrono_tz::UTC, "other-session", started.folders);
        let mut queue = TaskQueue::new();

        f.store.fail_appends(true);
        f.services
            .dispatch(Task::Rollover, &mut ctx, &mut queue)
            .await;

        assert!(ctx.today.is_none());
        assert_eq!(
            queue.due_times(),
            vec![tokio::time::Instant::now() + Duration::from_secs(300)]
        );

        f.store.fail_appends(false);
        f.services
            .dispatch(Task::Rollover, &mut ctx, &mut queue)
            .await;

        assert!(ctx.today.is_some());
        // Forecast refresh for the new sheet, next midnight, pending retry
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.next().await, Some(Task::UpdateForecast));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_without_rollover_keeps_running() {
        let f = fixture();
        let folders = FolderLayout {
            root: "r".into(),
            derived: "d".into(),
            measurements: "m".into(),
            forecast: "f".into(),
            auth_token: String::new(),
        };
        let mut ctx = RunContext::new(chrono_tz::UTC, "", folders);
        let mut queue = TaskQueue::new();

        report_rows(&f.reconciler, 12);
        f.services
            .dispatch(Task::FlushMeasurements, &mut ctx, &mut queue)
            .await;
        f.services
            .dispatch(Task::CheckStaging, &mut ctx, &mut queue)
            .await;

        assert!(queue.is_empty());
        assert_eq!(f.store.call_count(), 0);
        assert_eq!(f.reconciler.lock().ready_len(), 12);
    }
}
