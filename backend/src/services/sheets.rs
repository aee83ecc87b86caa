use crate::config::{SyncSettings, SHEETS_API_URL};
use crate::error::StoreError;
use crate::models::{Cell, Row};
use crate::services::store::DestinationStore;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use url::Url;

/// Google Sheets backed store: one spreadsheet, one sheet per table.
pub struct SheetsStore {
    http: Client,
    access_token: String,
    spreadsheet_id: String,
}

impl SheetsStore {
    pub fn new(settings: &SyncSettings) -> Self {
        SheetsStore {
            http: Client::new(),
            access_token: settings.sheets_token.clone(),
            spreadsheet_id: settings.spreadsheet_id.clone(),
        }
    }

    fn url(&self, segment: &str, params: &[(&str, &str)]) -> Result<Url, StoreError> {
        let mut url = Url::parse(SHEETS_API_URL.as_str()).map_err(|e| StoreError::Api {
            status: 0,
            message: format!("invalid SHEETS_API_URL: {e}"),
        })?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Api {
                status: 0,
                message: "SHEETS_API_URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .push("spreadsheets")
            .push(segment);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    fn values_url(
        &self,
        range: &str,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<Url, StoreError> {
        let mut url = self.url(&self.spreadsheet_id, &[])?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push("values").push(&format!("{range}{action}"));
        }
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, StoreError> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(StoreError::Api {
                status: status.as_u16(),
                message: body["error"]["message"]
                    .as_str()
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }
        Ok(body)
    }

    async fn sheet_exists(&self, table: &str) -> Result<bool, StoreError> {
        let url = self.url(&self.spreadsheet_id, &[("fields", "sheets.properties.title")])?;
        let body = self.send(self.http.get(url)).await?;
        Ok(sheet_titles(&body).iter().any(|t| t == table))
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Row>, StoreError> {
        let url = self.values_url(range, "", &[("valueRenderOption", "UNFORMATTED_VALUE")])?;
        let body = self.send(self.http.get(url)).await?;
        Ok(parse_values(&body))
    }

    async fn put_values(&self, range: &str, rows: &[Row]) -> Result<(), StoreError> {
        let url = self.values_url(range, "", &[("valueInputOption", "RAW")])?;
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": rows_to_json(rows),
        });
        self.send(self.http.put(url).json(&body)).await?;
        Ok(())
    }

    async fn clear_range(&self, range: &str) -> Result<(), StoreError> {
        let url = self.values_url(range, ":clear", &[])?;
        self.send(self.http.post(url).json(&json!({}))).await?;
        Ok(())
    }

    async fn write_header(&self, table: &str, header: &[String]) -> Result<(), StoreError> {
        let row: Row = header.iter().map(|h| Cell::text(h.as_str())).collect();
        self.put_values(&header_range(table), &[row]).await
    }
}

fn quoted(table: &str) -> String {
    format!("'{}'", table.replace('\'', "''"))
}

fn header_range(table: &str) -> String {
    format!("{}!1:1", quoted(table))
}

fn data_range(table: &str) -> String {
    format!("{}!A2:ZZ", quoted(table))
}

pub fn sheet_titles(body: &Value) -> Vec<String> {
    body["sheets"]
        .as_array()
        .map(|sheets| {
            sheets
                .iter()
                .filter_map(|s| s["properties"]["title"].as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_values(body: &Value) -> Vec<Row> {
    body["values"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| cells.iter().map(Cell::from_json).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn rows_to_json(rows: &[Row]) -> Value {
    Value::Array(
        rows.iter()
            .map(|row| Value::Array(row.iter().map(Cell::to_json).collect()))
            .collect(),
    )
}

/// New rows followed by blank rows covering whatever the previous run left
/// below them, so one range update replaces the whole data area.
pub fn replacement_block(rows: &[Row], previous_rows: usize, width: usize) -> Vec<Row> {
    let mut block: Vec<Row> = rows.to_vec();
    if previous_rows > rows.len() {
        let blank = vec![Cell::Empty; width];
        block.extend(std::iter::repeat(blank).take(previous_rows - rows.len()));
    }
    block
}

#[async_trait]
impl DestinationStore for SheetsStore {
    async fn read_header(&self, table: &str) -> Result<Option<Vec<String>>, StoreError> {
        if !self.sheet_exists(table).await? {
            return Ok(None);
        }
        let rows = self.get_values(&header_range(table)).await?;
        let header = rows
            .first()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .unwrap_or_default();
        Ok(Some(header))
    }

    async fn create_table(&self, table: &str, header: &[String]) -> Result<(), StoreError> {
        let url = self.url(&format!("{}:batchUpdate", self.spreadsheet_id), &[])?;
        let body = json!({
            "requests": [{"addSheet": {"properties": {"title": table}}}]
        });
        self.send(self.http.post(url).json(&body)).await?;
        self.write_header(table, header).await
    }

    async fn reset_table(&self, table: &str, header: &[String]) -> Result<(), StoreError> {
        self.clear_range(&quoted(table)).await?;
        self.write_header(table, header).await
    }

    async fn clear_rows(&self, table: &str) -> Result<(), StoreError> {
        self.clear_range(&data_range(table)).await
    }

    async fn append_rows(&self, table: &str, rows: &[Row]) -> Result<(), StoreError> {
        let url = self.values_url(
            &format!("{}!A1", quoted(table)),
            ":append",
            &[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")],
        )?;
        let body = json!({
            "majorDimension": "ROWS",
            "values": rows_to_json(rows),
        });
        self.send(self.http.post(url).json(&body)).await?;
        debug!("Appended {} rows to sheet '{table}'", rows.len());
        Ok(())
    }

    async fn replace_rows(&self, table: &str, rows: &[Row]) -> Result<(), StoreError> {
        let previous = self.get_values(&data_range(table)).await?;
        let width = rows
            .iter()
            .map(Vec::len)
            .chain(previous.iter().map(Vec::len))
            .max()
            .unwrap_or(0);
        let block = replacement_block(rows, previous.len(), width);
        self.put_values(&format!("{}!A2", quoted(table)), &block).await
    }

    async fn read_rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        self.get_values(&data_range(table)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn replacement_blanks_leftover_rows() {
        let rows = vec![vec![Cell::text("C"), Cell::Int(1)]];
        let block = replacement_block(&rows, 3, 2);
        assert_eq!(
            block,
            vec![
                vec![Cell::text("C"), Cell::Int(1)],
                vec![Cell::Empty, Cell::Empty],
                vec![Cell::Empty, Cell::Empty],
            ]
        );
        assert_eq!(replacement_block(&rows, 0, 2), rows);
    }

    #[test]
    fn values_response_becomes_rows() {
        let body = serde_json::json!({
            "range": "'Video_Master'!A2:ZZ1000",
            "values": [["v1", 12, true], ["v2", ""]]
        });
        assert_eq!(
            parse_values(&body),
            vec![
                vec![Cell::text("v1"), Cell::Int(12), Cell::Bool(true)],
                vec![Cell::text("v2"), Cell::Empty],
            ]
        );
        assert!(parse_values(&serde_json::json!({"range": "x"})).is_empty());
    }

    #[test]
    fn sheet_titles_are_listed() {
        let body = serde_json::json!({
            "sheets": [
                {"properties": {"title": "Daily_Metrics"}},
                {"properties": {"title": "Video_Master"}}
            ]
        });
        assert_eq!(sheet_titles(&body), vec!["Daily_Metrics", "Video_Master"]);
    }

    #[test]
    fn ranges_quote_sheet_names() {
        assert_eq!(header_range("Video_Master"), "'Video_Master'!1:1");
        assert_eq!(data_range("Bob's"), "'Bob''s'!A2:ZZ");
    }
}
