use crate::cloud_adapters::auth::{SHEETS_SCOPE, TokenProvider};
use crate::cloud_adapters::{CloudSpreadsheetService, SpreadsheetError};
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::Method;
use hyper::Request;
use hyper::StatusCode;
use hyper::body::Bytes;
use hyper::header;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde_json::{Value, json};
use tracing::{debug, info};
use yup_oauth2::hyper_rustls::HttpsConnectorBuilder;

/// Last ledger column.
const LAST_COLUMN: char = 'P';

/// Adapter backed by the Google Sheets v4 REST API.
///
/// All ledgers live on a tab named `sheet_name` inside each group's
/// spreadsheet. Rows are read in formula form so hyperlink cells survive a
/// read-modify-write.
pub struct GoogleSheets4Adapter {
    client: Client<yup_oauth2::hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>,
    auth: Box<dyn TokenProvider>,
    rt: tokio::runtime::Runtime,
    sheets_base_url: String,
    sheet_name: String,
}

impl GoogleSheets4Adapter {
    /// Create a new adapter using the public API endpoint.
    pub fn new<A: TokenProvider>(
        auth: A,
        sheet_name: impl Into<String>,
    ) -> Result<Self, SpreadsheetError> {
        Self::with_base_url(auth, "https://sheets.googleapis.com/v4/", sheet_name)
    }

    /// Create an adapter with a custom base URL (ends with `/`).
    pub fn with_base_url<A: TokenProvider>(
        auth: A,
        sheets_base_url: impl Into<String>,
        sheet_name: impl Into<String>,
    ) -> Result<Self, SpreadsheetError> {
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| SpreadsheetError::Permanent(e.to_string()))?;
        let https = HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| SpreadsheetError::Permanent(e.to_string()))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(https);
        Ok(Self {
            client,
            auth: Box::new(auth),
            rt,
            sheets_base_url: sheets_base_url.into(),
            sheet_name: sheet_name.into(),
        })
    }

    fn range(&self, cells: &str) -> String {
        let sheet = if self.sheet_name.contains(' ') {
            format!("'{}'", self.sheet_name)
        } else {
            self.sheet_name.clone()
        };
        encode_path(&format!("{sheet}!{cells}"))
    }

    fn values_url(&self, sheet_id: &str, range: &str, query: &str) -> String {
        format!(
            "{}spreadsheets/{}/values/{}{}",
            self.sheets_base_url, sheet_id, range, query
        )
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<Value, SpreadsheetError> {
        let token = self
            .auth
            .token(&[SHEETS_SCOPE])
            .await
            .map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        let mut builder = Request::builder()
            .method(method)
            .uri(url)
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
        let payload = match body {
            Some(json) => {
                debug!(url, body = %json, "Sheets request");
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Full::from(Bytes::from(json.to_string()))
            }
            None => Full::new(Bytes::new()),
        };
        let req = builder
            .body(payload)
            .map_err(|e| SpreadsheetError::Permanent(e.to_string()))?;
        let res = self
            .client
            .request(req)
            .await
            .map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        let status = res.status();
        let bytes = res
            .into_body()
            .collect()
            .await
            .map_err(|e| SpreadsheetError::Transient(e.to_string()))?
            .to_bytes();
        if !status.is_success() {
            return Err(status_error(status, &String::from_utf8_lossy(&bytes)));
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes[..]).map_err(|e| SpreadsheetError::Transient(e.to_string()))
    }
}

fn status_error(status: StatusCode, body: &str) -> SpreadsheetError {
    if status == StatusCode::NOT_FOUND {
        SpreadsheetError::SheetNotFound
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        SpreadsheetError::Transient(format!("{status}: {body}"))
    } else {
        SpreadsheetError::Permanent(format!("{status}: {body}"))
    }
}

/// Percent-encodes the characters of an A1 range that are not path-safe.
fn encode_path(range: &str) -> String {
    let mut out = String::with_capacity(range.len());
    for ch in range.chars() {
        match ch {
            ' ' => out.push_str("%20"),
            '\'' => out.push_str("%27"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            _ => out.push(ch),
        }
    }
    out
}

/// Extracts the first row number of an A1 range such as `Transaksi!A12:P12`.
fn row_from_range(range: &str) -> Option<usize> {
    let cells = range.rsplit('!').next()?;
    let digits: String = cells
        .chars()
        .skip_while(|c| c.is_ascii_alphabetic())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        _ => String::new(),
    }
}

fn rows_from_body(body: &Value) -> Vec<Vec<String>> {
    body["values"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| cells.iter().map(cell_to_string).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

const READ_QUERY: &str = "?valueRenderOption=FORMULA&dateTimeRenderOption=FORMATTED_STRING";

impl CloudSpreadsheetService for GoogleSheets4Adapter {
    fn append_row(
        &mut self,
        sheet_id: &str,
        values: Vec<String>,
    ) -> Result<usize, SpreadsheetError> {
        self.rt.block_on(async {
            let range = self.range(&format!("A:{LAST_COLUMN}"));
            let url = self.values_url(
                sheet_id,
                &range,
                ":append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            );
            let body = json!({"majorDimension": "ROWS", "values": [values]});
            let res = self.send(Method::POST, &url, Some(body)).await?;
            let updated = res["updates"]["updatedRange"].as_str().unwrap_or_default();
            let row = row_from_range(updated).ok_or_else(|| {
                SpreadsheetError::Permanent(format!("unexpected updated range {updated:?}"))
            })?;
            info!(sheet_id, row, "Appended row");
            Ok(row)
        })
    }

    fn read_row(&self, sheet_id: &str, row: usize) -> Result<Vec<String>, SpreadsheetError> {
        self.rt.block_on(async {
            let range = self.range(&format!("A{row}:{LAST_COLUMN}{row}"));
            let url = self.values_url(sheet_id, &range, READ_QUERY);
            let body = self.send(Method::GET, &url, None).await?;
            rows_from_body(&body)
                .into_iter()
                .next()
                .ok_or(SpreadsheetError::RowNotFound)
        })
    }

    fn list_rows(&self, sheet_id: &str) -> Result<Vec<Vec<String>>, SpreadsheetError> {
        self.rt.block_on(async {
            let range = self.range(&format!("A:{LAST_COLUMN}"));
            let url = self.values_url(sheet_id, &range, READ_QUERY);
            let body = self.send(Method::GET, &url, None).await?;
            let rows = rows_from_body(&body);
            debug!(sheet_id, rows = rows.len(), "Listed rows");
            Ok(rows)
        })
    }

    fn update_row(
        &mut self,
        sheet_id: &str,
        row: usize,
        values: Vec<String>,
    ) -> Result<(), SpreadsheetError> {
        self.rt.block_on(async {
            let cells = format!("A{row}:{LAST_COLUMN}{row}");
            let range = self.range(&cells);
            let url = self.values_url(sheet_id, &range, "?valueInputOption=USER_ENTERED");
            let body = json!({"majorDimension": "ROWS", "values": [values]});
            self.send(Method::PUT, &url, Some(body)).await?;
            info!(sheet_id, row, "Updated row");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_row_from_updated_range() {
        assert_eq!(row_from_range("Transaksi!A12:P12"), Some(12));
        assert_eq!(row_from_range("'Buku Besar'!A3:P3"), Some(3));
        assert_eq!(row_from_range("Transaksi!A:P"), None);
    }

    #[test]
    fn numbers_become_strings() {
        let body = json!({"values": [["2024-06-01", 1500000, true], []]});
        assert_eq!(
            rows_from_body(&body),
            vec![
                vec!["2024-06-01".to_string(), "1500000".to_string(), "TRUE".to_string()],
                vec![]
            ]
        );
    }

    #[test]
    fn quotes_sheet_names_with_spaces() {
        assert_eq!(encode_path("'Buku Besar'!A:P"), "%27Buku%20Besar%27!A:P");
    }
}
