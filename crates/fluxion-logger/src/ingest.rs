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

//! Pump from the telemetry feed into the reconciler.

use crate::error::Error;
use crate::reconciler::{ReportOutcome, Sample, SharedReconciler};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Messages produced by a telemetry feed adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Sample { channel: String, sample: Sample },
    Disconnected { reason: String },
}

/// Feed samples into the reconciler until the feed goes away.
///
/// Always ends with [`Error::FeedDisconnected`]; losing the feed is fatal
/// to the process.
pub async fn run_ingest(
    mut events: mpsc::Receiver<FeedEvent>,
    reconciler: SharedReconciler,
) -> Error {
    while let Some(event) = events.recv().await {
        match event {
            FeedEvent::Sample { channel, sample } => {
                let outcome = reconciler.lock().report(&channel, sample);
                match outcome {
                    Ok(ReportOutcome::Completed) => {
                        debug!("Row complete for timestamp {}", sample.timestamp);
                    }
                    Ok(ReportOutcome::Staged) => {}
                    Err(e) => warn!("⚠️ Dropping sample from '{}': {}", channel, e),
                }
            }
            FeedEvent::Disconnected { reason } => {
                return Error::FeedDisconnected(reason);
            }
        }
    }

    Error::FeedDisconnected("feed channel closed".to_owned())
}
