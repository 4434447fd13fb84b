//! Google Sheets v4 `values` API as a [`TableStore`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::credentials::TokenSource;
use crate::error::{LeaderboardError, Result};
use crate::store::{Table, TableStore};

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// One worksheet of one spreadsheet.
pub struct SheetsTableStore {
    client: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    api_base: String,
    spreadsheet_id: String,
    worksheet: String,
}

/// Quotes a worksheet name for use in an A1 range, doubling embedded quotes.
pub fn quote_sheet(worksheet: &str) -> String {
    format!("'{}'", worksheet.replace('\'', "''"))
}

impl SheetsTableStore {
    pub fn new(
        client: reqwest::Client,
        tokens: Arc<dyn TokenSource>,
        api_base: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        worksheet: impl Into<String>,
    ) -> Self {
        SheetsTableStore {
            client,
            tokens,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            worksheet: worksheet.into(),
        }
    }

    /// `.../values/{range}{suffix}` with the range percent-encoded.
    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}{}",
            self.api_base,
            urlencoding::encode(&self.spreadsheet_id),
            urlencoding::encode(range),
            suffix
        )
    }

    fn range(&self, cell: Option<&str>) -> String {
        match cell {
            Some(cell) => format!("{}!{}", quote_sheet(&self.worksheet), cell),
            None => quote_sheet(&self.worksheet),
        }
    }

    async fn send(&self, what: &str, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let token = self.tokens.token().await?;
        log::debug!("sheets {} on {:?}", what, self.worksheet);
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| LeaderboardError::StoreUnavailable(format!("{} failed: {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LeaderboardError::Auth(format!("{} rejected ({}): {}", what, status, body)));
        }
        Err(LeaderboardError::StoreUnavailable(format!(
            "{} returned {}: {}",
            what, status, body
        )))
    }

    async fn write(&self, range: String, rows: Vec<Vec<Value>>) -> Result<()> {
        let url = self.values_url(&range, "?valueInputOption=RAW");
        let body = json!({ "majorDimension": "ROWS", "values": rows });
        self.send("update", self.client.put(url).json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl TableStore for SheetsTableStore {
    async fn get_all_values(&self) -> Result<Table> {
        let url = self.values_url(
            &self.range(None),
            "?majorDimension=ROWS&valueRenderOption=UNFORMATTED_VALUE",
        );
        let response = self.send("read", self.client.get(url)).await?;
        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| LeaderboardError::StoreUnavailable(format!("bad read response: {}", e)))?;
        Ok(Table::new(range.values))
    }

    async fn clear(&self) -> Result<()> {
        let url = self.values_url(&self.range(None), ":clear");
        self.send("clear", self.client.post(url).json(&json!({}))).await?;
        Ok(())
    }

    async fn update(&self, rows: Vec<Vec<Value>>) -> Result<()> {
        self.write(self.range(Some("A1")), rows).await
    }

    async fn update_row(&self, row_number: usize, row: Vec<Value>) -> Result<()> {
        if row_number == 0 {
            return Err(LeaderboardError::StoreUnavailable(
                "sheet rows are numbered from 1".to_string(),
            ));
        }
        self.write(self.range(Some(&format!("A{}", row_number))), vec![row])
            .await
    }

    async fn append_row(&self, row: Vec<Value>) -> Result<()> {
        let url = self.values_url(
            &self.range(Some("A1")),
            ":append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
        );
        let body = json!({ "majorDimension": "ROWS", "values": [row] });
        self.send("append", self.client.post(url).json(&body)).await?;
        Ok(())
    }
}
