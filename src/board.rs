use crate::config::BoardConfig;
use crate::credentials::CredentialProvider;
use crate::error::BoardError;
use crate::projection::{project_all, StagePalette};
use crate::types::BoardItem;
use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest {
    pub query: String,
    pub variables: PageVariables,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageVariables {
    pub board_id: String,
    pub cursor: Option<String>,
    pub limit: u32,
}

/// Sends one GraphQL request and hands back the raw JSON body.
#[async_trait]
pub trait BoardTransport: Send + Sync {
    async fn post(&self, request: &GraphQlRequest) -> Result<serde_json::Value, BoardError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawItem {
    pub name: String,
    pub status_column: Vec<StatusValue>,
    pub location_column: Vec<LocationValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusValue {
    #[serde(default)]
    pub text: Option<String>,
}

// Only the LocationValue fragment is selected, so other column types come back as `{}`
#[derive(Debug, Clone, Deserialize)]
pub struct LocationValue {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<BoardsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct BoardsData {
    #[serde(default)]
    boards: Option<Vec<Board>>,
}

#[derive(Debug, Deserialize)]
struct Board {
    items_page: ItemsPage,
}

#[derive(Debug, Deserialize)]
struct ItemsPage {
    cursor: Option<String>,
    items: Vec<RawItem>,
}

pub struct BoardQuery {
    query: String,
    page_size: u32,
}

impl BoardQuery {
    pub fn new(status_column_id: &str, location_column_id: &str, page_size: u32) -> Self {
        let query = format!(
            "query($board_id: ID!, $cursor: String, $limit: Int!) {{ boards(ids: [$board_id]) {{ \
             items_page(limit: $limit, cursor: $cursor) {{ cursor items {{ name \
             status_column: column_values(ids: [\"{}\"]) {{ text }} \
             location_column: column_values(ids: [\"{}\"]) {{ ... on LocationValue {{ lat lng }} }} \
             }} }} }} }}",
            status_column_id, location_column_id
        );
        Self { query, page_size }
    }

    pub fn from_config(config: &BoardConfig) -> Self {
        Self::new(
            &config.status_column_id,
            &config.location_column_id,
            config.page_size,
        )
    }

    fn request(&self, board_id: &str, cursor: Option<String>) -> GraphQlRequest {
        GraphQlRequest {
            query: self.query.clone(),
            variables: PageVariables {
                board_id: board_id.to_string(),
                cursor,
                limit: self.page_size,
            },
        }
    }
}

pub struct HttpTransport {
    client: ClientWithMiddleware,
    endpoint: String,
    api_version: String,
    api_key: String,
}

impl HttpTransport {
    /// Resolves the API key up front so credential problems surface at startup.
    pub fn new(config: &BoardConfig, credentials: &dyn CredentialProvider) -> Result<Self, BoardError> {
        let api_key = credentials.api_key()?;

        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_version: config.api_version.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl BoardTransport for HttpTransport {
    async fn post(&self, request: &GraphQlRequest) -> Result<serde_json::Value, BoardError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.api_key)
            .header("API-Version", &self.api_version)
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<serde_json::Value>().await?)
    }
}

// None means the API answered but returned no board
fn decode_page(body: serde_json::Value) -> Result<Option<ItemsPage>, BoardError> {
    let response: GraphQlResponse =
        serde_json::from_value(body).map_err(|e| BoardError::Decode(e.to_string()))?;

    let data = match response.data {
        Some(data) => data,
        None if !response.errors.is_empty() => return Err(api_error(response.errors)),
        None => return Err(BoardError::Decode("response has no data".to_string())),
    };

    let page = data
        .boards
        .and_then(|boards| boards.into_iter().next())
        .map(|board| board.items_page);

    // Partial data: the board was withheld, and the errors say why
    if page.is_none() && !response.errors.is_empty() {
        return Err(api_error(response.errors));
    }

    Ok(page)
}

fn api_error(errors: Vec<GraphQlError>) -> BoardError {
    let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
    BoardError::Api(messages.join("; "))
}

/// Fetches every item on the board, following page cursors until the API
/// returns a null cursor. Items keep the order the API returned them in.
pub async fn fetch_board_items(
    transport: &dyn BoardTransport,
    query: &BoardQuery,
    board_id: &str,
) -> Result<Vec<RawItem>, BoardError> {
    let unavailable = || BoardError::Unavailable {
        board_id: board_id.to_string(),
    };

    if board_id.trim().is_empty() {
        return Err(unavailable());
    }

    let first = decode_page(transport.post(&query.request(board_id, None)).await?)?;
    let Some(page) = first else {
        warn!("Board with ID {} not found or not correctly permissioned.", board_id);
        return Err(unavailable());
    };

    let mut items = page.items;
    let mut cursor = page.cursor;
    let mut pages = 1;
    debug!("Fetched page 1 of board {} ({} items)", board_id, items.len());

    while let Some(next) = cursor {
        let page = decode_page(transport.post(&query.request(board_id, Some(next))).await?)?
            .ok_or_else(|| BoardError::Decode(format!("board {} missing from follow-up page", board_id)))?;
        pages += 1;
        debug!("Fetched page {} of board {} ({} items)", pages, board_id, page.items.len());
        items.extend(page.items);
        cursor = page.cursor;
    }

    info!("Fetched {} items from board {} in {} pages", items.len(), board_id, pages);
    Ok(items)
}

/// Fetches the configured board and projects it into map-ready items.
pub async fn fetch_board(
    transport: &dyn BoardTransport,
    config: &BoardConfig,
    palette: &StagePalette,
) -> Result<Vec<BoardItem>, BoardError> {
    let query = BoardQuery::from_config(config);
    let raw_items = fetch_board_items(transport, &query, &config.board_id).await?;
    project_all(raw_items, palette)
}
