//! Google Sheets v4 REST implementation of [`SpreadsheetBackend`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::TokenProvider;
use crate::error::{SheetsError, SheetsResult};
use crate::sheets::{
    A1Range, Cell, FormatRequest, InputMode, NewSheet, SheetProperties, SpreadsheetBackend,
};

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

pub struct GoogleSheetsClient {
    base_url: Url,
    spreadsheet_id: String,
    tokens: TokenProvider,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ApiSheet {
    properties: ApiSheetProperties,
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<ApiSheet>,
}

impl From<ApiSheetProperties> for SheetProperties {
    fn from(props: ApiSheetProperties) -> Self {
        SheetProperties {
            sheet_id: props.sheet_id,
            title: props.title,
        }
    }
}

impl GoogleSheetsClient {
    pub fn new(
        base_url: &str,
        spreadsheet_id: impl Into<String>,
        tokens: TokenProvider,
        http: reqwest::Client,
    ) -> SheetsResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| SheetsError::Config {
            message: format!("invalid sheets base URL {base_url:?}: {e}"),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SheetsError::Config {
                message: format!("sheets base URL {base_url} cannot be a base"),
            });
        }

        Ok(Self {
            base_url,
            spreadsheet_id: spreadsheet_id.into(),
            tokens,
            http,
        })
    }

    /// Build `{base}/spreadsheets/{segments...}` with each segment
    /// percent-encoded.
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("spreadsheets").extend(segments);
        }
        url
    }

    fn values_url(&self, range: &A1Range, suffix: &str) -> Url {
        let last = format!("{range}{suffix}");
        self.url([self.spreadsheet_id.as_str(), "values", last.as_str()])
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> SheetsResult<Response> {
        let token = self.tokens.token().await?;
        let resp = request.bearer_auth(token).send().await?;
        check_status(resp).await
    }

    async fn batch_update(&self, requests: Value) -> SheetsResult<Value> {
        let id = format!("{}:batchUpdate", self.spreadsheet_id);
        let resp = self
            .send(
                self.http
                    .post(self.url([id.as_str()]))
                    .json(&json!({ "requests": requests })),
            )
            .await?;
        resp.json().await.map_err(invalid_response)
    }
}

fn invalid_response(err: reqwest::Error) -> SheetsError {
    SheetsError::InvalidResponse {
        message: err.to_string(),
    }
}

/// Delay-seconds form of a `Retry-After` header.
pub fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Map non-success statuses onto [`SheetsError`] kinds.
async fn check_status(resp: Response) -> SheetsResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let retry_after = retry_after(&resp);
    let message = resp.text().await.unwrap_or_default();

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SheetsError::Unauthorized { message },
        StatusCode::NOT_FOUND => SheetsError::NotFound { message },
        StatusCode::TOO_MANY_REQUESTS => SheetsError::RateLimited { retry_after },
        _ => SheetsError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

/// Formatted values come back as strings, but be lenient with other JSON.
fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SpreadsheetBackend for GoogleSheetsClient {
    async fn read_range(&self, range: &A1Range) -> SheetsResult<Vec<Vec<String>>> {
        let resp = self.send(self.http.get(self.values_url(range, ""))).await?;
        let body: ValueRange = resp.json().await.map_err(invalid_response)?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn write_range(
        &self,
        range: &A1Range,
        rows: Vec<Vec<Cell>>,
        mode: InputMode,
    ) -> SheetsResult<()> {
        let body = json!({
            "range": range.to_string(),
            "majorDimension": "ROWS",
            "values": rows,
        });
        self.send(
            self.http
                .put(self.values_url(range, ""))
                .query(&[("valueInputOption", mode.as_str())])
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn clear_range(&self, range: &A1Range) -> SheetsResult<()> {
        self.send(
            self.http
                .post(self.values_url(range, ":clear"))
                .json(&json!({})),
        )
        .await?;
        Ok(())
    }

    async fn list_sheets(&self) -> SheetsResult<Vec<SheetProperties>> {
        let resp = self
            .send(
                self.http
                    .get(self.url([self.spreadsheet_id.as_str()]))
                    .query(&[("fields", "sheets.properties")]),
            )
            .await?;
        let body: Spreadsheet = resp.json().await.map_err(invalid_response)?;
        Ok(body
            .sheets
            .into_iter()
            .map(|sheet| sheet.properties.into())
            .collect())
    }

    async fn add_sheet(&self, sheet: &NewSheet) -> SheetsResult<SheetProperties> {
        let request = json!([{
            "addSheet": {
                "properties": {
                    "title": sheet.title,
                    "gridProperties": {
                        "rowCount": sheet.row_count,
                        "columnCount": sheet.column_count,
                    },
                    "tabColor": sheet.tab_color,
                }
            }
        }]);

        let reply = self.batch_update(request).await?;
        let props = reply
            .pointer("/replies/0/addSheet/properties")
            .cloned()
            .ok_or_else(|| SheetsError::InvalidResponse {
                message: "addSheet reply missing properties".to_string(),
            })?;
        let props: ApiSheetProperties =
            serde_json::from_value(props).map_err(|e| SheetsError::InvalidResponse {
                message: format!("malformed addSheet reply: {e}"),
            })?;
        Ok(props.into())
    }

    async fn batch_format(&self, requests: Vec<FormatRequest>) -> SheetsResult<()> {
        let requests = serde_json::to_value(&requests).map_err(|e| SheetsError::InvalidResponse {
            message: format!("failed to encode format requests: {e}"),
        })?;
        self.batch_update(requests).await?;
        Ok(())
    }
}
