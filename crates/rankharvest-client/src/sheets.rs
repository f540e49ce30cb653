use std::time::Duration;

use rankharvest_core::error::HarvestError;
use rankharvest_core::models::ResultRow;
use rankharvest_core::traits::{RenderingSurface, SurfaceConnector};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens one [`SheetsSurface`] per spreadsheet, authenticated with an OAuth
/// bearer token (e.g. from `gcloud auth print-access-token` or a service
/// account token exchange).
#[derive(Clone)]
pub struct SheetsConnector {
    client: Client,
    base_url: String,
    access_token: String,
    worksheet_name: String,
    timeout_secs: u64,
}

impl SheetsConnector {
    pub fn new(access_token: &str, worksheet_name: &str) -> Result<Self, HarvestError> {
        Self::with_base_url(access_token, worksheet_name, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        access_token: &str,
        worksheet_name: &str,
        base_url: &str,
    ) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| HarvestError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            worksheet_name: worksheet_name.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        })
    }
}

impl SurfaceConnector for SheetsConnector {
    type Surface = SheetsSurface;

    /// Checks that the token can see the spreadsheet before handing out a
    /// surface for it.
    async fn connect(&self, spreadsheet_id: &str) -> Result<SheetsSurface, HarvestError> {
        let surface = SheetsSurface {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            access_token: self.access_token.clone(),
            spreadsheet_id: spreadsheet_id.to_string(),
            worksheet_name: self.worksheet_name.clone(),
            timeout_secs: self.timeout_secs,
        };

        let mut url = surface.spreadsheet_url()?;
        url.query_pairs_mut().append_pair("fields", "spreadsheetId");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout_secs))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(%spreadsheet_id, "Logged into spreadsheet");
            return Ok(surface);
        }

        let message = format!(
            "spreadsheet {spreadsheet_id}: {}",
            api_error_message(response).await
        );
        if is_auth_status(status) {
            Err(HarvestError::Auth(message))
        } else {
            Err(HarvestError::Http(message))
        }
    }
}

/// One worksheet of a Google spreadsheet used as an IMPORTXML evaluator.
#[derive(Clone)]
pub struct SheetsSurface {
    client: Client,
    base_url: String,
    access_token: String,
    spreadsheet_id: String,
    worksheet_name: String,
    timeout_secs: u64,
}

// ---- Sheets API types ----

#[derive(Serialize)]
struct ValueRangeUpdate {
    range: String,
    #[serde(rename = "majorDimension")]
    major_dimension: &'static str,
    values: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl SheetsSurface {
    /// A1 range qualified with the sheet name, e.g. `'My Sheet'!A1:B100`.
    fn range(&self, cells: &str) -> String {
        format!("'{}'!{}", self.worksheet_name.replace('\'', "''"), cells)
    }

    fn spreadsheet_url(&self) -> Result<Url, HarvestError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| HarvestError::Http(format!("Invalid Sheets base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| HarvestError::Http("Sheets base URL cannot have a path".into()))?
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()]);
        Ok(url)
    }

    fn values_url(&self, range: &str) -> Result<Url, HarvestError> {
        let mut url = self.spreadsheet_url()?;
        url.path_segments_mut()
            .map_err(|_| HarvestError::Http("Sheets base URL cannot have a path".into()))?
            .extend(["values", range]);
        Ok(url)
    }
}

impl RenderingSurface for SheetsSurface {
    async fn submit(&self, cell: &str, query: &str) -> Result<(), HarvestError> {
        let range = self.range(cell);
        let mut url = self.values_url(&range).map_err(submit_error)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");

        let body = ValueRangeUpdate {
            range,
            major_dimension: "ROWS",
            values: vec![vec![query.to_string()]],
        };

        let response = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| submit_error(transport_error(e, self.timeout_secs)))?;

        if !response.status().is_success() {
            return Err(HarvestError::Submit(api_error_message(response).await));
        }
        Ok(())
    }

    async fn read_cells(&self, max_rows: u32) -> Result<Vec<ResultRow>, HarvestError> {
        let range = self.range(&format!("A1:B{}", max_rows.max(1)));
        let mut url = self.values_url(&range)?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "FORMATTED_VALUE")
            .append_pair("majorDimension", "ROWS");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| HarvestError::Read(transport_error(e, self.timeout_secs).to_string()))?;

        if !response.status().is_success() {
            return Err(HarvestError::Read(api_error_message(response).await));
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| HarvestError::Read(format!("Failed to parse values response: {e}")))?;

        Ok(rows_from_values(range.values))
    }
}

/// Convert a Sheets `values` grid into result rows. Cells past the end of a
/// row (Sheets drops trailing empties) become `None`.
fn rows_from_values(values: Vec<Vec<serde_json::Value>>) -> Vec<ResultRow> {
    values
        .into_iter()
        .map(|row| {
            let mut cells = row.into_iter().map(cell_text);
            ResultRow {
                title: cells.next(),
                url: cells.next(),
            }
        })
        .collect()
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Statuses Sheets uses for a bad token or a spreadsheet the token cannot see.
fn is_auth_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::NOT_FOUND
}

fn transport_error(e: reqwest::Error, timeout_secs: u64) -> HarvestError {
    if e.is_timeout() {
        HarvestError::Timeout(timeout_secs)
    } else if e.is_connect() {
        HarvestError::Network(format!("Connection failed: {e}"))
    } else {
        HarvestError::Http(e.to_string())
    }
}

fn submit_error(e: HarvestError) -> HarvestError {
    match e {
        HarvestError::Submit(_) => e,
        other => HarvestError::Submit(other.to_string()),
    }
}

async fn api_error_message(response: reqwest::Response) -> String {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ApiError>(&body)
        .map(|e| format!("HTTP {status}: {}", e.error.message))
        .unwrap_or_else(|_| format!("HTTP {status}: {body}"))
}
