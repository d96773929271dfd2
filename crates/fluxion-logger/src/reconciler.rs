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

//! Joins per-channel samples into complete measurement rows.
//!
//! Each channel reports `(timestamp, value)` pairs independently and in any
//! order. A timestamp is *staged* until every configured channel has
//! reported for it, then moved to the ready buffer in completion order.
//! The writer drains the ready buffer and re-sorts by timestamp.

use crate::error::{Error, Result};
use crate::settings::StagingThresholds;
use crate::time;
use crate::types::{CellValue, Row};
use chrono_tz::Tz;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// One channel reading. `timestamp` is epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A timestamp for which every channel has reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadyRow {
    pub timestamp: i64,
    pub local_time: String,
    /// Channel values in configured channel order.
    pub values: Vec<f64>,
}

impl ReadyRow {
    /// Raw measurement row: timestamp, local time, then every channel value.
    pub fn to_row(&self) -> Row {
        let mut row = Vec::with_capacity(self.values.len() + 2);
        row.push(CellValue::Number(self.timestamp as f64));
        row.push(CellValue::Text(self.local_time.clone()));
        row.extend(self.values.iter().copied().map(CellValue::Number));
        row
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The timestamp is still waiting for other channels.
    Staged,
    /// This report completed the timestamp; a row was queued.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingHealth {
    Normal,
    /// Above the soft threshold.
    Elevated(usize),
    /// Above the hard threshold.
    Critical(usize),
}

pub type SharedReconciler = Arc<Mutex<Reconciler>>;

#[derive(Debug)]
pub struct Reconciler {
    channels: Vec<String>,
    index: HashMap<String, usize>,
    timezone: Tz,
    staging: HashMap<i64, Vec<Option<f64>>>,
    ready: Vec<ReadyRow>,
}

impl Reconciler {
    pub fn new<I, S>(channels: I, timezone: Tz) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels: Vec<String> = channels.into_iter().map(Into::into).collect();
        let index = channels
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        Self {
            channels,
            index,
            timezone,
            staging: HashMap::new(),
            ready: Vec::new(),
        }
    }

    pub fn shared(self) -> SharedReconciler {
        Arc::new(Mutex::new(self))
    }

    /// Record one channel sample.
    ///
    /// A repeated report for an already filled slot overwrites it. Zero is a
    /// valid reading and counts as present.
    pub fn report(&mut self, channel: &str, sample: Sample) -> Result<ReportOutcome> {
        let slot = *self
            .index
            .get(channel)
            .ok_or_else(|| Error::UnknownChannel(channel.to_owned()))?;

        let width = self.channels.len();
        let partial = self
            .staging
            .entry(sample.timestamp)
            .or_insert_with(|| vec![None; width]);
        partial[slot] = Some(sample.value);

        if partial.iter().any(Option::is_none) {
            return Ok(ReportOutcome::Staged);
        }

        let values = self
            .staging
            .remove(&sample.timestamp)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect();

        self.ready.push(ReadyRow {
            timestamp: sample.timestamp,
            local_time: time::time_label(sample.timestamp, self.timezone),
            values,
        });
        trace!(
            "Timestamp {} complete, {} rows ready",
            sample.timestamp,
            self.ready.len()
        );

        Ok(ReportOutcome::Completed)
    }

    /// Number of timestamps still waiting for at least one channel.
    pub fn staging_len(&self) -> usize {
        self.staging.len()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn health(&self, thresholds: &StagingThresholds) -> StagingHealth {
        let pending = self.staging.len();
        if pending > thresholds.error {
            StagingHealth::Critical(pending)
        } else if pending > thresholds.warn {
            StagingHealth::Elevated(pending)
        } else {
            StagingHealth::Normal
        }
    }

    /// Take every ready row except the newest `reserve`, sorted by timestamp.
    pub fn drain_ready(&mut self, reserve: usize) -> Vec<ReadyRow> {
        let take = self.ready.len().saturating_sub(reserve);
        let mut rows: Vec<ReadyRow> = self.ready.drain(..take).collect();
        rows.sort_by_key(|row| row.timestamp);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Chicago;

    const CHANNELS: [&str; 4] = ["ch0", "ch1", "ch2", "ch3"];

    fn reconciler() -> Reconciler {
        Reconciler::new(CHANNELS, Chicago)
    }

    fn report_all(r: &mut Reconciler, ts: i64, order: &[usize]) {
        for &i in order {
            r.report(CHANNELS[i], Sample::new(ts, i as f64 + 1.0))
                .unwrap();
        }
    }

    #[test]
    fn test_row_completes_only_when_all_channels_report() {
        let mut r = reconciler();
        for ch in &CHANNELS[..3] {
            assert_eq!(
                r.report(ch, Sample::new(1_000, 1.0)).unwrap(),
                ReportOutcome::Staged
            );
        }
        assert_eq!(r.ready_len(), 0);
        assert_eq!(r.staging_len(), 1);

        assert_eq!(
            r.report("ch3", Sample::new(1_000, 1.0)).unwrap(),
            ReportOutcome::Completed
        );
        assert_eq!(r.ready_len(), 1);
        assert_eq!(r.staging_len(), 0);
    }

    #[test]
    fn test_each_complete_timestamp_yields_exactly_one_row() {
        let mut r = reconciler();
        report_all(&mut r, 1_000, &[0, 1, 2, 3]);
        report_all(&mut r, 2_000, &[3, 2, 1, 0]);
        // Partial timestamp never finalizes
        r.report("ch0", Sample::new(3_000, 9.0)).unwrap();

        let rows = r.drain_ready(0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp, 1_000);
        assert_eq!(rows[1].timestamp, 2_000);
        assert_eq!(r.staging_len(), 1);
    }

    #[test]
    fn test_report_order_does_not_change_the_row() {
        let orders: [[usize; 4]; 4] = [[0, 1, 2, 3], [3, 2, 1, 0], [1, 3, 0, 2], [2, 0, 3, 1]];
        let mut results = Vec::new();
        for order in orders {
            let mut r = reconciler();
            report_all(&mut r, 5_000, &order);
            results.push(r.drain_ready(0));
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(results[0][0].values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_zero_counts_as_present() {
        let mut r = reconciler();
        for ch in CHANNELS {
            r.report(ch, Sample::new(1_000, 0.0)).unwrap();
        }
        assert_eq!(r.drain_ready(0)[0].values, vec![0.0; 4]);
    }

    #[test]
    fn test_duplicate_report_overwrites_slot() {
        let mut r = reconciler();
        r.report("ch0", Sample::new(1_000, 1.0)).unwrap();
        r.report("ch0", Sample::new(1_000, 7.0)).unwrap();
        for ch in &CHANNELS[1..] {
            r.report(ch, Sample::new(1_000, 1.0)).unwrap();
        }
        assert_eq!(r.drain_ready(0)[0].values[0], 7.0);
    }

    #[test]
    fn test_unknown_channel_is_rejected_without_side_effects() {
        let mut r = reconciler();
        let err = r.report("ch9", Sample::new(1_000, 1.0)).unwrap_err();
        assert!(matches!(err, Error::UnknownChannel(ref ch) if ch == "ch9"));
        assert_eq!(r.staging_len(), 0);
    }

    #[test]
    fn test_drain_keeps_trailing_reserve() {
        let mut r = reconciler();
        for ts in 0..15 {
            report_all(&mut r, ts * 1_000, &[0, 1, 2, 3]);
        }
        let drained = r.drain_ready(10);
        assert_eq!(drained.len(), 5);
        assert_eq!(r.ready_len(), 10);
    }

    #[test]
    fn test_drain_sorts_out_of_order_completions() {
        let mut r = reconciler();
        report_all(&mut r, 3_000, &[0, 1, 2, 3]);
        report_all(&mut r, 1_000, &[0, 1, 2, 3]);
        report_all(&mut r, 2_000, &[0, 1, 2, 3]);

        let stamps: Vec<i64> = r.drain_ready(0).iter().map(|row| row.timestamp).collect();
        assert_eq!(stamps, vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn test_reserve_holds_back_latest_completion_not_latest_timestamp() {
        let mut r = Reconciler::new(["a", "b"], Chicago);
        r.report("b", Sample::new(2_000, 1.0)).unwrap();
        r.report("a", Sample::new(1_000, 1.0)).unwrap();
        r.report("a", Sample::new(2_000, 2.0)).unwrap();
        r.report("b", Sample::new(1_000, 2.0)).unwrap();

        // 2000 completed first, so 1000 is the one kept back
        let drained = r.drain_ready(1);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].timestamp, 2_000);
        assert_eq!(drained[0].values, vec![2.0, 1.0]);

        let rest = r.drain_ready(0);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].timestamp, 1_000);
        assert_eq!(rest[0].values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_health_thresholds() {
        let thresholds = StagingThresholds { warn: 2, error: 4 };
        let mut r = reconciler();
        assert_eq!(r.health(&thresholds), StagingHealth::Normal);

        for ts in 0..3 {
            r.report("ch0", Sample::new(ts, 1.0)).unwrap();
        }
        assert_eq!(r.health(&thresholds), StagingHealth::Elevated(3));

        for ts in 3..5 {
            r.report("ch0", Sample::new(ts, 1.0)).unwrap();
        }
        assert_eq!(r.health(&thresholds), StagingHealth::Critical(5));
    }

    #[test]
    fn test_ready_row_to_measurement_row() {
        let mut r = reconciler();
        // 2024-01-15 12:30:05 PM in Chicago
        report_all(&mut r, 1_705_343_405_000, &[0, 1, 2, 3]);
        let row = r.drain_ready(0)[0].to_row();
        assert_eq!(row[0], CellValue::Number(1_705_343_405_000.0));
        assert_eq!(row[1], CellValue::Text("12:30:05 PM".to_owned()));
        assert_eq!(row.len(), 6);
    }
}
