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

use crate::error::{SheetsError, SheetsResult};
use async_trait::async_trait;
use fluxion_logger::{FileId, Row, SheetStore, UpdateSummary};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_SHEETS_URL: &str = "https://sheets.googleapis.com";
pub const DEFAULT_DRIVE_URL: &str = "https://www.googleapis.com";

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
/// Columns covered by auto-resize (A..Z).
const RESIZE_COLUMNS: u32 = 26;

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSpreadsheet {
    spreadsheet_id: String,
}

#[derive(Debug, Deserialize)]
struct FileParents {
    #[serde(default)]
    parents: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    #[serde(default)]
    updated_cells: u64,
    #[serde(default)]
    updated_range: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: UpdateResponse,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl From<UpdateResponse> for UpdateSummary {
    fn from(update: UpdateResponse) -> Self {
        Self {
            updated_cells: update.updated_cells,
            updated_range: update.updated_range,
        }
    }
}

/// Google Sheets v4 / Drive v3 REST client
#[derive(Clone)]
pub struct GoogleSheetsStore {
    sheets_url: String,
    drive_url: String,
    token: String,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for GoogleSheetsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetsStore")
            .field("sheets_url", &self.sheets_url)
            .field("drive_url", &self.drive_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl GoogleSheetsStore {
    /// Create a client against the public Google endpoints
    pub fn new(token: impl Into<String>) -> SheetsResult<Self> {
        Self::with_base_urls(DEFAULT_SHEETS_URL, DEFAULT_DRIVE_URL, token)
    }

    /// Create a client with custom endpoints (proxies, tests)
    pub fn with_base_urls(
        sheets_url: impl Into<String>,
        drive_url: impl Into<String>,
        token: impl Into<String>,
    ) -> SheetsResult<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(SheetsError::ConfigError(
                "storage access token is empty".to_owned(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SheetsError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            sheets_url: sheets_url.into().trim_end_matches('/').to_owned(),
            drive_url: drive_url.into().trim_end_matches('/').to_owned(),
            token,
            client,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Set custom retry configuration
    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    fn values_url(&self, sheet: &FileId, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.sheets_url,
            sheet,
            urlencoding::encode(range)
        )
    }

    async fn create_folder_impl(&self, title: &str) -> SheetsResult<FileId> {
        let url = format!("{}/drive/v3/files", self.drive_url);
        let body = json!({ "name": title, "mimeType": FOLDER_MIME_TYPE });

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .query(&[("fields", "id")])
                    .json(&body)
                    .send()
                    .await
            })
            .await?;
        let created: CreatedFile = check_status(response, title).await?.json().await?;

        info!("📁 [STORAGE] Created folder '{}' ({})", title, created.id);
        Ok(FileId(created.id))
    }

    async fn create_sheet_impl(&self, title: &str) -> SheetsResult<FileId> {
        let url = format!("{}/v4/spreadsheets", self.sheets_url);
        let body = json!({ "properties": { "title": title } });

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .query(&[("fields", "spreadsheetId")])
                    .json(&body)
                    .send()
                    .await
            })
            .await?;
        let created: CreatedSpreadsheet = check_status(response, title).await?.json().await?;

        info!(
            "📄 [STORAGE] Created spreadsheet '{}' ({})",
            title, created.spreadsheet_id
        );
        Ok(FileId(created.spreadsheet_id))
    }

    async fn move_to_folder_impl(&self, file: &FileId, folder: &FileId) -> SheetsResult<()> {
        let url = format!("{}/drive/v3/files/{}", self.drive_url, file);

        let response = self
            .retry_request(|| async {
                self.client
                    .get(&url)
                    .bearer_auth(&self.token)
                    .query(&[("fields", "parents")])
                    .send()
                    .await
            })
            .await?;
        let current: FileParents = check_status(response, file.as_str()).await?.json().await?;
        let previous = current.parents.join(",");

        let response = self
            .retry_request(|| async {
                self.client
                    .patch(&url)
                    .bearer_auth(&self.token)
                    .query(&[
                        ("addParents", folder.as_str()),
                        ("removeParents", previous.as_str()),
                        ("fields", "id, parents"),
                    ])
                    .json(&json!({}))
                    .send()
                    .await
            })
            .await?;
        check_status(response, file.as_str()).await?;

        debug!("[STORAGE] Moved {} into {}", file, folder);
        Ok(())
    }

    async fn append_rows_impl(
        &self,
        sheet: &FileId,
        rows: &[Row],
        range: Option<&str>,
    ) -> SheetsResult<UpdateSummary> {
        let url = format!("{}:append", self.values_url(sheet, range.unwrap_or("A1")));
        let body = json!({ "values": rows });

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .query(&[
                        ("valueInputOption", "USER_ENTERED"),
                        ("insertDataOption", "INSERT_ROWS"),
                    ])
                    .json(&body)
                    .send()
                    .await
            })
            .await?;
        let appended: AppendResponse = check_status(response, sheet.as_str()).await?.json().await?;

        debug!(
            "[STORAGE] Appended {} rows to {} ({} cells)",
            rows.len(),
            sheet,
            appended.updates.updated_cells
        );
        Ok(appended.updates.into())
    }

    async fn overwrite_rows_impl(
        &self,
        sheet: &FileId,
        rows: &[Row],
        range: &str,
    ) -> SheetsResult<UpdateSummary> {
        let url = self.values_url(sheet, range);
        let body = json!({ "values": rows });

        let response = self
            .retry_request(|| async {
                self.client
                    .put(&url)
                    .bearer_auth(&self.token)
                    .query(&[("valueInputOption", "USER_ENTERED")])
                    .json(&body)
                    .send()
                    .await
            })
            .await?;
        let updated: UpdateResponse = check_status(response, sheet.as_str()).await?.json().await?;

        debug!(
            "[STORAGE] Overwrote {} rows of {} at {}",
            rows.len(),
            sheet,
            range
        );
        Ok(updated.into())
    }

    async fn resize_columns_impl(&self, sheet: &FileId) -> SheetsResult<()> {
        let url = format!("{}/v4/spreadsheets/{}:batchUpdate", self.sheets_url, sheet);
        let body = json!({
            "requests": [{
                "autoResizeDimensions": {
                    "dimensions": {
                        "sheetId": 0,
                        "dimension": "COLUMNS",
                        "startIndex": 0,
                        "endIndex": RESIZE_COLUMNS
                    }
                }
            }]
        });

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .json(&body)
                    .send()
                    .await
            })
            .await?;
        check_status(response, sheet.as_str()).await?;
        Ok(())
    }

    async fn count_rows_impl(&self, sheet: &FileId) -> SheetsResult<usize> {
        let url = self.values_url(sheet, "A:A");

        let response = self
            .retry_request(|| async {
                self.client
                    .get(&url)
                    .bearer_auth(&self.token)
                    .query(&[("majorDimension", "ROWS")])
                    .send()
                    .await
            })
            .await?;
        let range: ValueRange = check_status(response, sheet.as_str()).await?.json().await?;

        Ok(range.values.len())
    }

    /// Retry logic for HTTP requests
    async fn retry_request<F, Fut>(&self, mut request_fn: F) -> SheetsResult<Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    if attempts >= self.max_retries {
                        error!("Rate limited after {} attempts", attempts);
                        return Err(SheetsError::RateLimited);
                    }
                    warn!(
                        "Rate limited (attempt {}/{}). Retrying in {:?}",
                        attempts, self.max_retries, delay
                    );
                }
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    error!("Request failed after {} attempts: {}", attempts, e);
                    return Err(SheetsError::HttpError(e));
                }
                Err(e) => {
                    warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts, self.max_retries, e, delay
                    );
                }
            }
            tokio::time::sleep(delay).await;
            delay *= 2; // Exponential backoff
        }
    }
}

/// Map non-success statuses to errors
async fn check_status(response: Response, target: &str) -> SheetsResult<Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::NOT_FOUND => {
            error!("❌ [STORAGE ERROR] Not found: {}", target);
            Err(SheetsError::NotFound(target.to_owned()))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            error!("❌ [STORAGE ERROR] Authentication failed for: {}", target);
            Err(SheetsError::AuthenticationFailed)
        }
        status => {
            let error_text = response.text().await.unwrap_or_default();
            error!("❌ [STORAGE ERROR] Status {}: {}", status, error_text);
            Err(SheetsError::ApiError {
                status: status.as_u16(),
                message: error_text,
            })
        }
    }
}

#[async_trait]
impl SheetStore for GoogleSheetsStore {
    async fn create_folder(&self, title: &str) -> fluxion_logger::Result<FileId> {
        Ok(self.create_folder_impl(title).await?)
    }

    async fn create_sheet(&self, title: &str) -> fluxion_logger::Result<FileId> {
        Ok(self.create_sheet_impl(title).await?)
    }

    async fn move_to_folder(&self, file: &FileId, folder: &FileId) -> fluxion_logger::Result<()> {
        Ok(self.move_to_folder_impl(file, folder).await?)
    }

    async fn append_rows(
        &self,
        sheet: &FileId,
        rows: &[Row],
        range: Option<&str>,
    ) -> fluxion_logger::Result<UpdateSummary> {
        Ok(self.append_rows_impl(sheet, rows, range).await?)
    }

    async fn overwrite_rows(
        &self,
        sheet: &FileId,
        rows: &[Row],
        range: &str,
    ) -> fluxion_logger::Result<UpdateSummary> {
        Ok(self.overwrite_rows_impl(sheet, rows, range).await?)
    }

    async fn resize_columns(&self, sheet: &FileId) -> fluxion_logger::Result<()> {
        Ok(self.resize_columns_impl(sheet).await?)
    }

    async fn count_rows(&self, sheet: &FileId) -> fluxion_logger::Result<usize> {
        Ok(self.count_rows_impl(sheet).await?)
    }
}
