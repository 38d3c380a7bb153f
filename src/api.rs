//! HTTP API for a RageChain node
//!
//! Every route answers JSON. Peers pull `GET /chain` from each other during
//! conflict resolution, so that route's shape is part of the wire protocol.

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use crate::blockchain::Block;
use crate::error::ChainError;
use crate::network::ChainResponse;
use crate::node::Node;
use crate::transaction::{Transaction, TransactionRequest, VoteType};

#[derive(Debug)]
pub enum ApiError {
    BlockchainError(ChainError),
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BlockchainError(e) if e.is_malformed_input() => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::BlockchainError(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::BlockchainError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize, Deserialize)]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
    pub node_id: String,
}

#[derive(Serialize, Deserialize)]
pub struct SubmitResponse {
    pub message: String,
    pub block_index: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub report_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub nodes: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub total_nodes: Vec<String>,
    pub node_id: String,
}

#[derive(Serialize, Deserialize)]
pub struct ResolveResponse {
    pub message: String,
    pub replaced: bool,
    pub chain: Vec<Block>,
    /// Same blocks as `chain`, present only after a replacement. Older
    /// clients read the adopted chain from this key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_chain: Option<Vec<Block>>,
    pub node_id: String,
}

#[derive(Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: i128,
    pub message: String,
    pub node_id: String,
}

#[derive(Serialize, Deserialize)]
pub struct StakedBalanceResponse {
    pub address: String,
    pub staked_balance: u64,
    pub message: String,
    pub node_id: String,
}

#[derive(Serialize, Deserialize)]
pub struct RageIndexRequest {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct RageIndexResponse {
    pub content_hash: String,
    pub rage_index: usize,
    pub message: String,
    pub node_id: String,
}

#[derive(Serialize, Deserialize)]
pub struct PendingReportEntry {
    pub report_id: String,
    pub reporter_address: String,
    pub content_hash: String,
    pub reason_code: String,
    pub stake_amount: u64,
    /// Voter address to vote, ordered by voter.
    pub current_votes: BTreeMap<String, VoteType>,
}

#[derive(Serialize, Deserialize)]
pub struct PendingReportsResponse {
    pub pending_reports: Vec<PendingReportEntry>,
    pub count: usize,
    pub node_id: String,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub height: usize,
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status and duration of every request.
async fn logging_middleware(State(node): State<Arc<Node>>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    info!(
        node = %node.id(),
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(node: Arc<Node>) -> Router {
    // CORS configuration - allow all origins with credentials
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        // Ledger endpoints
        .route("/mine", get(mine))
        .route("/transactions/new", post(new_transaction))
        .route("/chain", get(full_chain))
        // Peer endpoints
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(resolve_conflicts))
        // Query endpoints
        .route("/balance/:address", get(get_balance))
        .route("/staked_balance/:address", get(get_staked_balance))
        .route("/rage_index", post(get_rage_index))
        .route("/pending_rage_reports", get(get_pending_rage_reports))
        // System endpoints
        .route("/health", get(health_check))
        .layer(middleware::from_fn_with_state(node.clone(), logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serve the API on `0.0.0.0:{port}` until the process exits.
pub async fn run_api_server(node: Arc<Node>, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(node = %node.id(), "API server listening on http://{}", addr);

    axum::serve(listener, build_api_router(node)).await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn mine(State(node): State<Arc<Node>>) -> Result<Json<MineResponse>, ApiError> {
    let block = node.mine().await?;
    Ok(Json(MineResponse {
        message: "New block forged".to_string(),
        index: block.index,
        transactions: block.transactions,
        proof: block.proof,
        previous_hash: block.previous_hash,
        node_id: node.id().to_string(),
    }))
}

async fn new_transaction(
    State(node): State<Arc<Node>>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(request) = payload?;
    let receipt = node.submit(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            message: format!("Transaction will be added to Block {}", receipt.block_index),
            block_index: receipt.block_index,
            report_id: receipt.report_id,
        }),
    ))
}

async fn full_chain(State(node): State<Arc<Node>>) -> Json<ChainResponse> {
    let chain = node.chain().await;
    Json(ChainResponse {
        length: chain.len(),
        chain,
        node_id: Some(node.id().to_string()),
    })
}

async fn register_nodes(
    State(node): State<Arc<Node>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Json(request) = payload?;
    let nodes = request
        .nodes
        .ok_or_else(|| ApiError::InvalidInput("Please supply a valid list of nodes".to_string()))?;

    let peers = node.register_peers(&nodes).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "New nodes have been added".to_string(),
            total_nodes: peers.iter().map(ToString::to_string).collect(),
            node_id: node.id().to_string(),
        }),
    ))
}

async fn resolve_conflicts(State(node): State<Arc<Node>>) -> Result<Json<ResolveResponse>, ApiError> {
    let replaced = node.resolve_conflicts().await?;
    let message = if replaced {
        "Our chain was replaced"
    } else {
        "Our chain is authoritative"
    };
    let chain = node.chain().await;
    Ok(Json(ResolveResponse {
        message: message.to_string(),
        replaced,
        new_chain: replaced.then(|| chain.clone()),
        chain,
        node_id: node.id().to_string(),
    }))
}

async fn get_balance(
    State(node): State<Arc<Node>>,
    Path(address): Path<String>,
) -> Json<BalanceResponse> {
    let balance = node.balance(&address).await;
    Json(BalanceResponse {
        message: format!("Balance of {} is {} RAGE", address, balance),
        address,
        balance,
        node_id: node.id().to_string(),
    })
}

async fn get_staked_balance(
    State(node): State<Arc<Node>>,
    Path(address): Path<String>,
) -> Json<StakedBalanceResponse> {
    let staked_balance = node.staked_balance(&address).await;
    Json(StakedBalanceResponse {
        message: format!("{} has {} RAGE staked", address, staked_balance),
        address,
        staked_balance,
        node_id: node.id().to_string(),
    })
}

async fn get_rage_index(
    State(node): State<Arc<Node>>,
    payload: Result<Json<RageIndexRequest>, JsonRejection>,
) -> Result<Json<RageIndexResponse>, ApiError> {
    let Json(request) = payload?;
    let content = request
        .content
        .ok_or_else(|| ApiError::InvalidInput("Field \"content\" is required".to_string()))?;

    let (content_hash, rage_index) = node.rage_index_for_content(&content).await?;
    Ok(Json(RageIndexResponse {
        message: format!("Rage index for this content: {}", rage_index),
        content_hash,
        rage_index,
        node_id: node.id().to_string(),
    }))
}

async fn get_pending_rage_reports(State(node): State<Arc<Node>>) -> Json<PendingReportsResponse> {
    let pending_reports: Vec<PendingReportEntry> = node
        .pending_reports()
        .await
        .into_iter()
        .map(|(report_id, pending)| PendingReportEntry {
            current_votes: pending.votes.into_iter().collect(),
            reporter_address: pending.report_data.reporter_address,
            content_hash: pending.report_data.content_hash,
            reason_code: pending.report_data.reason_code,
            stake_amount: pending.report_data.stake_amount,
            report_id,
        })
        .collect();

    Json(PendingReportsResponse {
        count: pending_reports.len(),
        pending_reports,
        node_id: node.id().to_string(),
    })
}

async fn health_check(State(node): State<Arc<Node>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: node.id().to_string(),
        height: node.height().await,
    })
}
