use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use thiserror::Error;
use tokio::task;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::models::{AddressEntry, Blockchain, NewAddress, PortfolioReport};
use crate::db;
use crate::registry::{self, NotFoundError, ValidationError};

#[derive(Clone)]
pub struct AppState {
    pub conn: Arc<Mutex<Connection>>,
    pub aggregator: Aggregator,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("malformed address id: {0}")]
    MalformedId(String),

    #[error(transparent)]
    BadBody(#[from] JsonRejection),

    #[error("{0}")]
    Internal(String),
}

impl From<eyre::Report> for ApiError {
    fn from(e: eyre::Report) -> Self {
        ApiError::Internal(format!("{e:?}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::NotFound(_) | ApiError::MalformedId(_) => {
                (StatusCode::NOT_FOUND, "Address not found.".to_string())
            }
            ApiError::BadBody(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[derive(Serialize)]
struct AddressesResponse {
    message: &'static str,
    addresses: Vec<AddressEntry>,
}

#[derive(Serialize)]
struct BlockchainInfo {
    id: Blockchain,
    name: String,
    symbol: String,
    decimals: u32,
    #[serde(rename = "priceUSD")]
    price_usd: String,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/blockchains", get(blockchains))
        .route("/api/portfolio/:user_id", get(get_portfolio))
        .route("/api/portfolio/:user_id/addresses", get(list_addresses))
        .route("/api/portfolio/:user_id/address", post(add_address))
        .route("/api/portfolio/:user_id/address/:id", delete(delete_address))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

pub async fn serve(cfg: Config, state: AppState) -> eyre::Result<()> {
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], cfg.port));
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "message": "Server is running!" }))
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Route not found" })))
}

async fn blockchains() -> Json<Vec<BlockchainInfo>> {
    let list = Blockchain::SUPPORTED
        .into_iter()
        .filter_map(|chain| {
            let denom = chain.denomination()?;
            Some(BlockchainInfo {
                name: chain.display_name().to_string(),
                symbol: chain.symbol(),
                decimals: denom.decimals,
                price_usd: denom.usd_price.to_string(),
                id: chain,
            })
        })
        .collect();
    Json(list)
}

async fn get_portfolio(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PortfolioReport>, ApiError> {
    let entries = with_db(&state.conn, move |conn| {
        db::load_addresses(conn, &user_id).map_err(ApiError::from)
    })
    .await?;
    let report = state.aggregator.build_portfolio(&entries).await;
    Ok(Json(report))
}

async fn list_addresses(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<AddressEntry>>, ApiError> {
    let entries = with_db(&state.conn, move |conn| {
        db::load_addresses(conn, &user_id).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(entries))
}

async fn add_address(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Result<Json<NewAddress>, JsonRejection>,
) -> Result<(StatusCode, Json<AddressesResponse>), ApiError> {
    let Json(candidate) = body?;
    let addresses = with_db(&state.conn, move |conn| {
        let existing = db::load_addresses(conn, &user_id)?;
        let updated = registry::add_address(&existing, candidate)?;
        if let Some(added) = updated.last() {
            db::insert_address(conn, &user_id, added)?;
            info!("➕ {} now tracks {} address {}", user_id, added.blockchain, added.address);
        }
        Ok(updated)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AddressesResponse {
            message: "Address added successfully.",
            addresses,
        }),
    ))
}

async fn delete_address(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(String, String)>,
) -> Result<Json<AddressesResponse>, ApiError> {
    // a non-UUID id can never match a stored address
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::MalformedId(id))?;
    let addresses = with_db(&state.conn, move |conn| {
        let existing = db::load_addresses(conn, &user_id)?;
        let updated = registry::delete_address(&existing, id)?;
        db::delete_address(conn, &user_id, id)?;
        info!("➖ {} removed address {}", user_id, id);
        Ok(updated)
    })
    .await?;

    Ok(Json(AddressesResponse {
        message: "Address removed successfully.",
        addresses,
    }))
}

// ---------- DB wrapper (spawn_blocking) ----------

async fn with_db<T, F>(conn: &Arc<Mutex<Connection>>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, ApiError> + Send + 'static,
{
    let conn = Arc::clone(conn);
    task::spawn_blocking(move || {
        let db = conn
            .lock()
            .map_err(|_| ApiError::Internal("database mutex poisoned".to_string()))?;
        f(&*db)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("db task failed: {e}")))?
}
