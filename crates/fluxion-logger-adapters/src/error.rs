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

//! Error types for the adapters

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("authentication failed, the access token was rejected")]
    AuthenticationFailed,

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("rate limited by the storage API")]
    RateLimited,

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("config error: {0}")]
    ConfigError(String),
}

pub type SheetsResult<T> = Result<T, SheetsError>;

impl From<SheetsError> for fluxion_logger::Error {
    fn from(err: SheetsError) -> Self {
        match err {
            SheetsError::ConfigError(msg) => Self::Config(msg),
            other @ (SheetsError::HttpError(_)
            | SheetsError::AuthenticationFailed
            | SheetsError::NotFound(_)
            | SheetsError::RateLimited
            | SheetsError::ApiError { .. }
            | SheetsError::InvalidResponse(_)) => Self::Storage(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SolcastError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("config error: {0}")]
    ConfigError(String),
}

impl From<SolcastError> for fluxion_logger::Error {
    fn from(err: SolcastError) -> Self {
        match err {
            SolcastError::ConfigError(msg) => Self::Config(msg),
            other @ (SolcastError::HttpError(_) | SolcastError::ApiError { .. }) => {
                Self::Forecast(other.to_string())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed frame: {0}")]
    Frame(#[from] serde_json::Error),

    #[error("feed error: {0}")]
    Protocol(String),
}

impl From<FeedError> for fluxion_logger::Error {
    fn from(err: FeedError) -> Self {
        Self::FeedDisconnected(err.to_string())
    }
}
