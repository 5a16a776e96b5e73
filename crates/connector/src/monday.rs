//! GraphQL client for monday.com boards.
//!
//! Items are read page by page through `items_page` / `next_items_page`.
//! Every item becomes one [`RawRecord`]: `Item Name` holds the item name and
//! each column value is stored under its (trimmed) column title.

use std::time::Duration;

use async_trait::async_trait;
use boardsight_core::config::MondayConfig;
use boardsight_core::{Board, RawRecord};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::source::{ConnectorError, RecordSource};

pub const ITEM_NAME_FIELD: &str = "Item Name";

const FIRST_PAGE_QUERY: &str = r#"query ($board: [ID!], $limit: Int!) {
  boards(ids: $board) {
    items_page(limit: $limit) {
      cursor
      items { name column_values { column { title } text } }
    }
  }
}"#;

const NEXT_PAGE_QUERY: &str = r#"query ($cursor: String!, $limit: Int!) {
  next_items_page(cursor: $cursor, limit: $limit) {
    cursor
    items { name column_values { column { title } text } }
  }
}"#;

#[derive(Clone)]
pub struct MondayClient {
    client: reqwest::Client,
    api_url: String,
    api_version: String,
    api_key: SecretString,
    page_limit: u32,
    max_pages: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemsPage {
    cursor: Option<String>,
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Item {
    name: String,
    #[serde(default)]
    column_values: Vec<ColumnValue>,
}

#[derive(Debug, Deserialize)]
struct ColumnValue {
    column: ColumnRef,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ColumnRef {
    title: String,
}

#[derive(Debug, Deserialize)]
struct BoardsResponse {
    boards: Vec<BoardNode>,
}

#[derive(Debug, Deserialize)]
struct BoardNode {
    items_page: ItemsPage,
}

#[derive(Debug, Deserialize)]
struct NextPageResponse {
    next_items_page: ItemsPage,
}

impl MondayClient {
    pub fn new(config: &MondayConfig) -> Result<Self, ConnectorError> {
        let api_key = config.require_api_key()?.clone();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ConnectorError::Transport)?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_version: config.api_version.clone(),
            api_key,
            page_limit: config.page_limit,
            max_pages: config.max_pages,
        })
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, ConnectorError> {
        let body = json!({ "query": query, "variables": variables });
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", self.api_key.expose_secret())
            .header("API-Version", &self.api_version)
            .json(&body)
            .send()
            .await
            .map_err(ConnectorError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Status { status: status.as_u16(), body });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|error| ConnectorError::Decode(error.to_string()))?;
        decode_data(payload)
    }
}

#[async_trait]
impl RecordSource for MondayClient {
    async fn fetch_board(
        &self,
        board: Board,
        board_id: &str,
    ) -> Result<Vec<RawRecord>, ConnectorError> {
        let first: BoardsResponse = self
            .graphql(FIRST_PAGE_QUERY, json!({ "board": [board_id], "limit": self.page_limit }))
            .await?;
        let page = first
            .boards
            .into_iter()
            .next()
            .map(|node| node.items_page)
            .ok_or_else(|| ConnectorError::BoardNotFound(board_id.to_string()))?;

        let mut records = items_to_records(page.items);
        let mut cursor = page.cursor;
        let mut pages = 1;

        while let Some(next) = cursor.take() {
            if pages >= self.max_pages {
                debug!(
                    event_name = "boardsight.fetch.page_cap_reached",
                    board = %board,
                    pages,
                    "stopping pagination at configured page cap"
                );
                break;
            }

            let response: NextPageResponse = self
                .graphql(NEXT_PAGE_QUERY, json!({ "cursor": next, "limit": self.page_limit }))
                .await?;
            records.extend(items_to_records(response.next_items_page.items));
            cursor = response.next_items_page.cursor;
            pages += 1;
        }

        debug!(
            event_name = "boardsight.fetch.completed",
            board = %board,
            pages,
            records = records.len(),
            "board items fetched"
        );
        Ok(records)
    }
}

pub(crate) fn decode_data<T: DeserializeOwned>(payload: Value) -> Result<T, ConnectorError> {
    if let Some(errors) = payload.get("errors").filter(|errors| !errors.is_null()) {
        return Err(ConnectorError::GraphQl(graphql_error_message(errors)));
    }
    if let Some(message) = payload.get("error_message").and_then(Value::as_str) {
        return Err(ConnectorError::GraphQl(message.to_string()));
    }

    let data = payload
        .get("data")
        .cloned()
        .ok_or_else(|| ConnectorError::Decode("missing `data` in response".to_string()))?;
    serde_json::from_value(data).map_err(|error| ConnectorError::Decode(error.to_string()))
}

fn graphql_error_message(errors: &Value) -> String {
    let messages: Vec<&str> = errors
        .as_array()
        .map(|errors| {
            errors.iter().filter_map(|error| error.get("message").and_then(Value::as_str)).collect()
        })
        .unwrap_or_default();

    if messages.is_empty() {
        errors.to_string()
    } else {
        messages.join("; ")
    }
}

pub(crate) fn items_to_records(items: Vec<Item>) -> Vec<RawRecord> {
    items
        .into_iter()
        .map(|item| {
            let mut record = RawRecord::new();
            record.insert(ITEM_NAME_FIELD, Value::String(item.name));
            for column in item.column_values {
                let value = column.text.map(Value::String).unwrap_or(Value::Null);
                record.insert(column.column.title.trim().to_string(), value);
            }
            record
        })
        .collect()
}
