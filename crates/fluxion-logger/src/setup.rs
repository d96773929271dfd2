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

//! One-time creation of the storage folder hierarchy.

use crate::error::Result;
use crate::settings::FolderTitles;
use crate::traits::{SheetStore, StateStore};
use crate::types::FolderLayout;
use std::sync::Arc;
use tracing::{info, warn};

pub struct DriveSetup {
    store: Arc<dyn SheetStore>,
    layouts: Arc<dyn StateStore<FolderLayout>>,
    titles: FolderTitles,
}

impl std::fmt::Debug for DriveSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveSetup")
            .field("titles", &self.titles)
            .finish_non_exhaustive()
    }
}

impl DriveSetup {
    pub fn new(
        store: Arc<dyn SheetStore>,
        layouts: Arc<dyn StateStore<FolderLayout>>,
        titles: FolderTitles,
    ) -> Self {
        Self {
            store,
            layouts,
            titles,
        }
    }

    /// Reuse the persisted folder layout of this session or create a new one.
    ///
    /// Unlike the daily snapshot, failing to persist a new layout is an
    /// error: every restart would otherwise create another folder tree.
    pub async fn ensure(&self, session: &str) -> Result<FolderLayout> {
        match self.layouts.load() {
            Ok(Some(layout)) if layout.auth_token == session => {
                info!("📂 Using existing folder layout (root {})", layout.root);
                return Ok(layout);
            }
            Ok(Some(_)) => info!("Folder layout belongs to another session, creating a new one"),
            Ok(None) => info!("No folder layout found, creating one"),
            Err(e) => warn!("⚠️ Ignoring unreadable folder layout: {}", e),
        }

        let root = self.store.create_folder(&self.titles.root).await?;
        let derived = self.store.create_folder(&self.titles.derived).await?;
        let measurements = self.store.create_folder(&self.titles.measurements).await?;
        let forecast = self.store.create_folder(&self.titles.forecast).await?;

        for folder in [&derived, &measurements, &forecast] {
            self.store.move_to_folder(folder, &root).await?;
        }

        let layout = FolderLayout {
            root,
            derived,
            measurements,
            forecast,
            auth_token: session.to_owned(),
        };
        self.layouts.save(&layout)?;
        info!("✅ Created folder layout under '{}'", self.titles.root);

        Ok(layout)
    }
}
