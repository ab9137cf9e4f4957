//! REST API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use nrtsched_core::{
    aggregate_allocatable, NrtError, NrtResult, NumaZone, ResourceList, ScoringConfig,
    ScoringStrategy, TopologyPolicy, Workload,
};
use nrtsched_scheduler::{
    require_topology, FilterVerdict, ResourceAllocationScorer, TopologyMatch, TopologyProvider,
    TopologyStore,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Application state shared across handlers
pub struct AppState {
    /// Current topology snapshots; a reload swaps the whole store
    pub topologies: RwLock<Arc<TopologyStore>>,
    /// Default scoring configuration
    pub scoring: ScoringConfig,
    /// Where topologies are reloaded from, if anywhere
    pub source: Option<PathBuf>,
}

impl AppState {
    pub fn new(store: TopologyStore, scoring: ScoringConfig, source: Option<PathBuf>) -> Self {
        Self {
            topologies: RwLock::new(Arc::new(store)),
            scoring,
            source,
        }
    }

    /// The store as of now; later reloads do not affect it
    pub async fn snapshot(&self) -> Arc<TopologyStore> {
        Arc::clone(&*self.topologies.read().await)
    }

    /// Re-read topologies from the source path, returning the object count
    pub async fn reload(&self) -> NrtResult<usize> {
        let Some(path) = self.source.clone() else {
            return Err(NrtError::Config("no topology path configured".to_string()));
        };
        let namespaces = self.snapshot().await.namespaces().to_vec();

        let store = tokio::task::spawn_blocking(move || TopologyStore::load(&path, namespaces))
            .await
            .map_err(|e| NrtError::Config(format!("Topology reload task failed: {}", e)))??;

        let count = store.len();
        *self.topologies.write().await = Arc::new(store);
        info!(objects = count, "Topologies reloaded");
        Ok(count)
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>, cors_enabled: bool) -> Router {
    let router = Router::new()
        .route("/api/v1/filter", post(filter_nodes))
        .route("/api/v1/score", post(score_nodes))
        .route("/api/v1/topologies", get(list_topologies))
        .route("/api/v1/topologies/:node", get(get_topology))
        .route("/api/v1/status", get(get_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

fn error_response(e: NrtError) -> (StatusCode, String) {
    let status = match e {
        NrtError::TopologyNotFound(_) => StatusCode::NOT_FOUND,
        NrtError::InvalidQuantity(_) | NrtError::InvalidZone(_) => StatusCode::BAD_REQUEST,
        NrtError::NoNumaZones | NrtError::QuantityOverflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

/// Nodes named in a request, or every known node when none are named
fn requested_nodes(nodes: Vec<String>, store: &TopologyStore) -> Vec<String> {
    if nodes.is_empty() {
        store.node_names()
    } else {
        nodes
    }
}

/// Request to filter nodes for a workload
#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    pub workload: Workload,
    /// Candidate nodes; all known nodes when empty
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Filter result split into feasible and infeasible nodes
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FilterResponse {
    pub feasible: Vec<String>,
    pub infeasible: BTreeMap<String, String>,
}

/// Filter candidate nodes
async fn filter_nodes(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FilterRequest>,
) -> Result<Json<FilterResponse>, (StatusCode, String)> {
    let store = state.snapshot().await;
    let nodes = requested_nodes(req.nodes, &store);
    info!(
        workload = %req.workload.log_id(),
        nodes = nodes.len(),
        "Filtering nodes"
    );

    let filter = TopologyMatch::new(store);
    let mut response = FilterResponse::default();
    for node in nodes {
        match filter.filter(&req.workload, &node) {
            FilterVerdict::Feasible => response.feasible.push(node),
            FilterVerdict::Infeasible { reason } => {
                response.infeasible.insert(node, reason);
            }
        }
    }

    Ok(Json(response))
}

/// Request to score nodes for a workload
#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub workload: Workload,
    /// Candidate nodes; all known nodes when empty
    #[serde(default)]
    pub nodes: Vec<String>,
    /// Overrides the configured strategy
    #[serde(default)]
    pub strategy: Option<ScoringStrategy>,
}

/// Score of one node, or why it could not be scored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeScore {
    pub node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Score candidate nodes
async fn score_nodes(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<Vec<NodeScore>>, (StatusCode, String)> {
    let store = state.snapshot().await;
    let nodes = requested_nodes(req.nodes, &store);

    let mut scorer = ResourceAllocationScorer::new(store, &state.scoring);
    if let Some(strategy) = req.strategy {
        scorer = scorer.with_strategy(strategy);
    }
    info!(
        workload = %req.workload.log_id(),
        nodes = nodes.len(),
        strategy = %scorer.strategy(),
        "Scoring nodes"
    );

    let scores = nodes
        .into_iter()
        .map(|node| match scorer.score(&req.workload, &node) {
            Ok(score) => NodeScore {
                node,
                score: Some(score),
                error: None,
            },
            Err(e) => {
                debug!(node = %node, error = %e, "Node could not be scored");
                NodeScore {
                    node,
                    score: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    Ok(Json(scores))
}

/// Normalized topology of one node
#[derive(Debug, Serialize)]
pub struct TopologyResponse {
    pub node: String,
    pub policies: Vec<String>,
    /// Allocatable resources summed over every zone
    pub allocatable: ResourceList,
    pub zones: Vec<NumaZone>,
}

impl TopologyResponse {
    fn new(node: &str, policies: &[TopologyPolicy], zones: &[NumaZone]) -> NrtResult<Self> {
        Ok(Self {
            node: node.to_string(),
            policies: policies.iter().map(|p| p.to_string()).collect(),
            allocatable: aggregate_allocatable(zones)?,
            zones: zones.to_vec(),
        })
    }
}

/// List normalized topologies of every visible node
async fn list_topologies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TopologyResponse>>, (StatusCode, String)> {
    let store = state.snapshot().await;
    let responses = store
        .node_names()
        .iter()
        .filter_map(|node| store.node_topology(node))
        .map(|t| TopologyResponse::new(&t.node_name, &t.policies, &t.zones))
        .collect::<NrtResult<Vec<_>>>()
        .map_err(error_response)?;
    Ok(Json(responses))
}

/// Get the normalized topology of one node
async fn get_topology(
    State(state): State<Arc<AppState>>,
    Path(node): Path<String>,
) -> Result<Json<TopologyResponse>, (StatusCode, String)> {
    let store = state.snapshot().await;
    let topology = require_topology(&*store, &node).map_err(error_response)?;
    let response = TopologyResponse::new(&node, &topology.policies, &topology.zones)
        .map_err(error_response)?;
    Ok(Json(response))
}

/// System status response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub nodes: usize,
    pub strategy: ScoringStrategy,
    pub namespaces: Vec<String>,
}

/// Get system status
async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let store = state.snapshot().await;
    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        nodes: store.node_names().len(),
        strategy: state.scoring.strategy,
        namespaces: store.namespaces().to_vec(),
    }))
}
