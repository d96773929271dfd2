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

//! Error types for the logger core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("no {0} sheet for today, daily rollover has not run")]
    MissingDestination(&'static str),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("forecast error: {0}")]
    Forecast(String),

    #[error("state persistence error: {0}")]
    State(String),

    #[error("state serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("telemetry feed disconnected: {0}")]
    FeedDisconnected(String),
}

impl Error {
    /// Transient failures are retried by the next periodic run.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Forecast(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
