use crate::config::AppConfig;
use crate::error::{BoardError, ViewError};
use crate::geodata::RegionTable;
use crate::render::{build_figure, Figure};
use crate::types::BoardItem;
use crate::view::{select_view, SiteIndex};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

const PLACEHOLDER_GROUP: &str = "-- Select MSA --";

/// Everything the dashboard reads, loaded once at startup.
pub struct AppState {
    pub config: AppConfig,
    pub regions: RegionTable,
    pub sites: SiteIndex,
    // Set when the board could not be loaded; the map still renders regions
    pub board_status: Option<String>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        regions: RegionTable,
        board: Result<Vec<BoardItem>, BoardError>,
    ) -> Self {
        let (items, board_status) = match board {
            Ok(items) => (items, None),
            Err(err) => (Vec::new(), Some(err.to_string())),
        };
        Self {
            config,
            regions,
            sites: SiteIndex::new(items),
            board_status,
        }
    }
}

#[derive(Deserialize)]
pub struct FigureParams {
    msa: Option<String>,
    attribute: Option<String>,
}

#[derive(Serialize)]
pub struct FigureResponse {
    figure: Option<Figure>,
    board_status: Option<String>,
}

#[derive(Serialize)]
pub struct AttributeOption {
    name: String,
    label: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (StatusCode::NOT_FOUND, body).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        .route("/api/groups", get(groups_handler))
        .route("/api/attributes", get(attributes_handler))
        .route("/api/figure", get(figure_handler))
        .fallback_service(static_dir)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(state: AppState) -> Result<()> {
    let port = state.config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    info!("Starting server on http://{}", addr);

    let app = router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn groups_handler(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.regions.groups())
}

async fn attributes_handler(State(state): State<Arc<AppState>>) -> Json<Vec<AttributeOption>> {
    Json(
        state
            .config
            .attributes
            .iter()
            .map(|a| AttributeOption {
                name: a.name.clone(),
                label: a.label.clone(),
            })
            .collect(),
    )
}

async fn figure_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FigureParams>,
) -> Result<Json<FigureResponse>, ViewError> {
    let board_status = state.board_status.clone();

    let group = match params.msa.as_deref().map(str::trim) {
        Some(group) if !group.is_empty() && group != PLACEHOLDER_GROUP => group,
        _ => {
            return Ok(Json(FigureResponse {
                figure: None,
                board_status,
            }))
        }
    };

    // No attribute chosen yet: the first configured one
    let attribute = match params.attribute.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => state
            .config
            .attributes
            .first()
            .map(|a| a.name.clone())
            .ok_or_else(|| ViewError::UnknownAttribute(String::new()))?,
    };

    let view = select_view(
        &state.regions,
        &state.sites,
        &state.config.attributes,
        group,
        &attribute,
    )?;

    Ok(Json(FigureResponse {
        figure: Some(build_figure(&view)),
        board_status,
    }))
}
