//! CLI commands implementation

use anyhow::{Context, Result};
use nrtsched_core::{ResourceList, SchedulerConfig, ScoringConfig, ScoringStrategy, Workload};
use nrtsched_scheduler::{FilterVerdict, ResourceAllocationScorer, TopologyMatch, TopologyStore};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

/// API client for communicating with the daemon
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Filter response from API
#[derive(Debug, Deserialize)]
pub struct FilterResponse {
    pub feasible: Vec<String>,
    pub infeasible: BTreeMap<String, String>,
}

/// Node score from API
#[derive(Debug, Deserialize)]
pub struct NodeScore {
    pub node: String,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// NUMA zone from API
#[derive(Debug, Deserialize)]
pub struct ZoneResponse {
    pub id: usize,
    pub resources: ResourceList,
}

/// Node topology from API
#[derive(Debug, Deserialize)]
pub struct TopologyResponse {
    pub node: String,
    pub policies: Vec<String>,
    pub allocatable: ResourceList,
    pub zones: Vec<ZoneResponse>,
}

/// Status response
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub nodes: usize,
    pub strategy: String,
    pub namespaces: Vec<String>,
}

#[derive(Serialize)]
struct EvaluationRequest<'a> {
    workload: &'a Workload,
    nodes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    strategy: Option<String>,
}

async fn read_workload(path: &Path) -> Result<Workload> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading workload {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing workload {}", path.display()))
}

/// Filter verdict and score of one node
#[derive(Debug)]
pub struct Evaluation {
    pub node: String,
    pub verdict: FilterVerdict,
    /// Only feasible nodes are scored
    pub score: Option<std::result::Result<i64, String>>,
}

impl Evaluation {
    fn score_value(&self) -> Option<i64> {
        self.score.as_ref().and_then(|s| s.as_ref().ok().copied())
    }
}

/// Filter, then score, every node of `store` concurrently. Results are
/// ordered feasible first, best score first, then by name.
pub async fn evaluate_nodes(
    store: Arc<TopologyStore>,
    workload: Workload,
    scoring: &ScoringConfig,
) -> Result<Vec<Evaluation>> {
    let filter = Arc::new(TopologyMatch::new(store.clone()));
    let scorer = Arc::new(ResourceAllocationScorer::new(store.clone(), scoring));
    let workload = Arc::new(workload);

    let mut tasks = JoinSet::new();
    for node in store.node_names() {
        let filter = Arc::clone(&filter);
        let scorer = Arc::clone(&scorer);
        let workload = Arc::clone(&workload);
        tasks.spawn_blocking(move || {
            let verdict = filter.filter(&workload, &node);
            let score = verdict
                .is_feasible()
                .then(|| scorer.score(&workload, &node).map_err(|e| e.to_string()));
            Evaluation {
                node,
                verdict,
                score,
            }
        });
    }

    let mut evaluations = Vec::new();
    while let Some(evaluation) = tasks.join_next().await {
        evaluations.push(evaluation.context("evaluation task failed")?);
    }

    evaluations.sort_by(|a, b| {
        b.verdict
            .is_feasible()
            .cmp(&a.verdict.is_feasible())
            .then_with(|| match (a.score_value(), b.score_value()) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.node.cmp(&b.node))
    });
    Ok(evaluations)
}

/// Evaluate a workload against local topology files
pub async fn evaluate(
    topology: PathBuf,
    workload: PathBuf,
    strategy: Option<String>,
    namespaces: Vec<String>,
    config: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => SchedulerConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SchedulerConfig::default(),
    };
    if let Some(strategy) = strategy {
        config.scoring.strategy = ScoringStrategy::from_name(&strategy);
    }
    if !namespaces.is_empty() {
        config.topology.namespaces = namespaces;
    }

    let workload = read_workload(&workload).await?;
    let namespaces = config.topology.namespaces.clone();
    let store = tokio::task::spawn_blocking(move || TopologyStore::load(&topology, namespaces))
        .await
        .context("topology loading task failed")??;
    debug!(nodes = store.node_names().len(), "Topologies loaded");

    println!(
        "Workload {} ({}), strategy {}",
        workload.log_id(),
        workload.qos_class(),
        config.scoring.strategy
    );

    let evaluations = evaluate_nodes(Arc::new(store), workload, &config.scoring).await?;
    if evaluations.is_empty() {
        println!("No nodes found");
        return Ok(());
    }

    println!("{:<30} {:<12} {:<6} {}", "NODE", "VERDICT", "SCORE", "DETAIL");
    println!("{}", "-".repeat(80));
    for evaluation in evaluations {
        let (verdict, detail) = match &evaluation.verdict {
            FilterVerdict::Feasible => ("feasible", String::new()),
            FilterVerdict::Infeasible { reason } => ("infeasible", reason.clone()),
        };
        let (score, detail) = match evaluation.score {
            Some(Ok(score)) => (score.to_string(), detail),
            Some(Err(error)) => ("-".to_string(), error),
            None => ("-".to_string(), detail),
        };
        println!("{:<30} {:<12} {:<6} {}", evaluation.node, verdict, score, detail);
    }

    Ok(())
}

/// Filter nodes through the daemon
pub async fn filter(client: &ApiClient, workload: PathBuf, nodes: Vec<String>) -> Result<()> {
    let workload = read_workload(&workload).await?;

    let response = client
        .client
        .post(client.url("/api/v1/filter"))
        .json(&EvaluationRequest {
            workload: &workload,
            nodes,
            strategy: None,
        })
        .send()
        .await?;

    if response.status().is_success() {
        let result: FilterResponse = response.json().await?;

        println!("Feasible nodes: {}", result.feasible.len());
        for node in &result.feasible {
            println!("  {}", node);
        }
        if !result.infeasible.is_empty() {
            println!("Infeasible nodes: {}", result.infeasible.len());
            for (node, reason) in &result.infeasible {
                println!("  {} - {}", node, reason);
            }
        }
    } else {
        let error = response.text().await?;
        eprintln!("Failed to filter nodes: {}", error);
    }

    Ok(())
}

/// Score nodes through the daemon
pub async fn score(
    client: &ApiClient,
    workload: PathBuf,
    nodes: Vec<String>,
    strategy: Option<String>,
) -> Result<()> {
    let workload = read_workload(&workload).await?;

    let response = client
        .client
        .post(client.url("/api/v1/score"))
        .json(&EvaluationRequest {
            workload: &workload,
            nodes,
            strategy,
        })
        .send()
        .await?;

    if response.status().is_success() {
        let mut scores: Vec<NodeScore> = response.json().await?;
        scores.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.node.cmp(&b.node)));

        println!("{:<30} {:<6} {}", "NODE", "SCORE", "ERROR");
        println!("{}", "-".repeat(60));
        for s in scores {
            let score = s.score.map_or_else(|| "-".to_string(), |v| v.to_string());
            println!("{:<30} {:<6} {}", s.node, score, s.error.unwrap_or_default());
        }
    } else {
        let error = response.text().await?;
        eprintln!("Failed to score nodes: {}", error);
    }

    Ok(())
}

/// List node topologies known to the daemon
pub async fn nodes(client: &ApiClient) -> Result<()> {
    let response = client
        .client
        .get(client.url("/api/v1/topologies"))
        .send()
        .await?;

    if response.status().is_success() {
        let topologies: Vec<TopologyResponse> = response.json().await?;

        if topologies.is_empty() {
            println!("No node topologies found");
        } else {
            for topology in topologies {
                println!("{} [{}]", topology.node, topology.policies.join(", "));
                println!("  total: {}", topology.allocatable);
                for zone in topology.zones {
                    println!("  node-{}: {}", zone.id, zone.resources);
                }
            }
        }
    } else {
        let error = response.text().await?;
        eprintln!("Failed to list nodes: {}", error);
    }

    Ok(())
}

/// Show daemon status
pub async fn status(client: &ApiClient) -> Result<()> {
    let response = client
        .client
        .get(client.url("/api/v1/status"))
        .send()
        .await?;

    if response.status().is_success() {
        let status: StatusResponse = response.json().await?;

        println!("nrtsched v{}", status.version);
        println!();
        println!("Nodes: {}", status.nodes);
        println!("Strategy: {}", status.strategy);
        println!("Namespaces: {}", status.namespaces.join(", "));
    } else {
        let error = response.text().await?;
        eprintln!("Failed to get status: {}", error);
    }

    Ok(())
}
