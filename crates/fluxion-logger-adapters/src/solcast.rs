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

//! Solcast radiation forecast client.

use crate::error::SolcastError;
use async_trait::async_trait;
use fluxion_logger::{ForecastSample, ForecastSource};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    forecasts: Vec<ForecastSample>,
}

#[derive(Clone)]
pub struct SolcastClient {
    url: String,
    api_key: Option<String>,
    client: Client,
}

impl std::fmt::Debug for SolcastClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolcastClient")
            .field("url", &self.url)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl SolcastClient {
    /// `url` is the full forecast endpoint including site and query parameters.
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self, SolcastError> {
        let url = url.into();
        if url.is_empty() {
            return Err(SolcastError::ConfigError(
                "forecast URL is empty".to_owned(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| SolcastError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            url,
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    pub async fn fetch(&self) -> Result<Vec<ForecastSample>, SolcastError> {
        debug!("🔍 [FORECAST] Fetching {}", self.url);

        let mut request = self.client.get(&self.url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::OK => {
                let body: ForecastResponse = response.json().await?;
                info!("☀️ [FORECAST] Received {} samples", body.forecasts.len());
                Ok(body.forecasts)
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                error!("❌ [FORECAST] Status {}: {}", status, message);
                Err(SolcastError::ApiError {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl ForecastSource for SolcastClient {
    async fn fetch_forecast(&self) -> fluxion_logger::Result<Vec<ForecastSample>> {
        Ok(self.fetch().await?)
    }
}
