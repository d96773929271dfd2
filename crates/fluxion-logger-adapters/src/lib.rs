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

//! Concrete backends for the FluxION Logger core traits.

pub mod error;
pub mod pusher;
pub mod sheets;
pub mod solcast;
pub mod state_file;

pub use error::{FeedError, SheetsError, SheetsResult, SolcastError};
pub use pusher::{FeedHandle, PusherConfig, PusherFeed, PusherFrame, parse_frame};
pub use sheets::GoogleSheetsStore;
pub use solcast::SolcastClient;
pub use state_file::{DEFAULT_LAYOUT_PATH, DEFAULT_TODAY_PATH, JsonStateFile};
