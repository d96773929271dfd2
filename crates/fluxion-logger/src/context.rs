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

//! Mutable state shared by the scheduled jobs of one running process.

use crate::error::{Error, Result};
use crate::types::{FolderLayout, TodaySnapshot};
use chrono_tz::Tz;
use sha2::{Digest, Sha256};

/// Stable fingerprint of a storage session credential.
///
/// Persisted instead of the credential itself so state files never hold
/// secrets.
pub fn session_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct RunContext {
    pub timezone: Tz,
    pub folders: FolderLayout,
    /// Sheets of the current day, set by the daily rollover.
    pub today: Option<TodaySnapshot>,
    /// Latest irradiance estimate, `NaN` until the first forecast arrives.
    pub total_irradiance: f64,
    session: String,
}

impl RunContext {
    pub fn new(timezone: Tz, session: impl Into<String>, folders: FolderLayout) -> Self {
        Self {
            timezone,
            folders,
            today: None,
            total_irradiance: f64::NAN,
            session: session.into(),
        }
    }

    /// Fingerprint of the active storage session.
    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn today(&self) -> Result<&TodaySnapshot> {
        self.today
            .as_ref()
            .ok_or(Error::MissingDestination("daily"))
    }
}
