//! Node resource topology objects and their normalization into NUMA zones
//!
//! A [`NodeResourceTopology`] is the raw per-node object published by the
//! node agent: a list of zones, each tagged with a free-text type and a list
//! of resource records whose amounts are decimal strings. Normalization keeps
//! only the NUMA zones (`type == "Node"`, named `node-<id>`) and parses their
//! allocatable amounts. Malformed records are dropped with a diagnostic;
//! they never abort normalization of the rest of the node.

use crate::{NrtError, NrtResult, Quantity, ResourceList};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

/// Zone type that identifies a NUMA zone
pub const NUMA_ZONE_TYPE: &str = "Node";

/// Name prefix of NUMA zones (`node-0`, `node-1`, ...)
pub const NUMA_ZONE_NAME_PREFIX: &str = "node-";

/// Highest NUMA id accepted from a topology object
pub const MAX_NUMA_ID: usize = 63;

/// Topology manager policy declared by a node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopologyPolicy {
    /// All subunits of a workload must fit together on one NUMA zone
    SingleNumaNodePodLevel,
    /// Every subunit must fit on some NUMA zone on its own
    SingleNumaNodeContainerLevel,
    /// Any other declared policy, kept verbatim
    Other(String),
}

impl TopologyPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            TopologyPolicy::SingleNumaNodePodLevel => "SingleNUMANodePodLevel",
            TopologyPolicy::SingleNumaNodeContainerLevel => "SingleNUMANodeContainerLevel",
            TopologyPolicy::Other(name) => name,
        }
    }
}

impl From<&str> for TopologyPolicy {
    fn from(name: &str) -> Self {
        match name {
            "SingleNUMANodePodLevel" => TopologyPolicy::SingleNumaNodePodLevel,
            "SingleNUMANodeContainerLevel" => TopologyPolicy::SingleNumaNodeContainerLevel,
            other => TopologyPolicy::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TopologyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resource record of a zone, amounts as published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub name: String,
    #[serde(default)]
    pub capacity: String,
    pub allocatable: String,
}

/// One zone of a node resource topology object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    #[serde(rename = "type")]
    pub zone_type: String,
    #[serde(default)]
    pub resources: Vec<ResourceInfo>,
}

/// Raw per-node topology object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResourceTopology {
    /// Node name
    pub name: String,
    /// Namespace the object was published in
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Declared topology manager policies, in order
    #[serde(default)]
    pub topology_policies: Vec<String>,
    /// Zones of the node
    #[serde(default)]
    pub zones: Vec<Zone>,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// A NUMA zone with its allocatable resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumaZone {
    pub id: usize,
    pub resources: ResourceList,
}

impl NumaZone {
    pub fn new(id: usize, resources: ResourceList) -> Self {
        Self { id, resources }
    }
}

/// Normalized topology snapshot of one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTopology {
    pub node_name: String,
    pub policies: Vec<TopologyPolicy>,
    pub zones: Vec<NumaZone>,
}

impl NodeTopology {
    /// Normalize a raw topology object
    pub fn from_raw(raw: &NodeResourceTopology) -> Self {
        Self {
            node_name: raw.name.clone(),
            policies: raw
                .topology_policies
                .iter()
                .map(|p| TopologyPolicy::from(p.as_str()))
                .collect(),
            zones: normalize_zones(&raw.zones),
        }
    }
}

/// Parse the NUMA id out of a zone name of the form `node-<id>`, rejecting
/// ids above [`MAX_NUMA_ID`]
pub fn parse_numa_id(zone_name: &str) -> NrtResult<usize> {
    let raw: i64 = zone_name
        .strip_prefix(NUMA_ZONE_NAME_PREFIX)
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| NrtError::InvalidZone(format!("{zone_name}: not of the form node-<id>")))?;

    usize::try_from(raw)
        .ok()
        .filter(|id| *id <= MAX_NUMA_ID)
        .ok_or_else(|| {
            NrtError::InvalidZone(format!("{zone_name}: NUMA id out of range 0..={MAX_NUMA_ID}"))
        })
}

/// Parse the allocatable amounts of a zone, dropping unparseable records
pub fn extract_resources(zone: &Zone) -> ResourceList {
    let mut resources = ResourceList::new();
    for info in &zone.resources {
        match info.allocatable.parse::<Quantity>() {
            Ok(quantity) => {
                debug!(
                    zone = %zone.name,
                    resource = %info.name,
                    allocatable = %quantity,
                    "Extracted zone resource"
                );
                resources.insert(info.name.as_str(), quantity);
            }
            Err(e) => {
                warn!(
                    zone = %zone.name,
                    resource = %info.name,
                    error = %e,
                    "Dropping resource with unparseable allocatable amount"
                );
            }
        }
    }
    resources
}

/// Turn a raw zone list into the ordered list of NUMA zones
pub fn normalize_zones(zones: &[Zone]) -> Vec<NumaZone> {
    let mut seen = BTreeSet::new();
    let mut numa_zones = Vec::new();

    for zone in zones {
        if zone.zone_type != NUMA_ZONE_TYPE {
            continue;
        }

        let id = match parse_numa_id(&zone.name) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Skipping zone");
                continue;
            }
        };

        if !seen.insert(id) {
            warn!(zone = %zone.name, id, "Duplicate NUMA id, keeping the first zone");
            continue;
        }

        numa_zones.push(NumaZone::new(id, extract_resources(zone)));
    }

    numa_zones
}

/// Sum allocatable resources over every zone of a node
pub fn aggregate_allocatable(zones: &[NumaZone]) -> NrtResult<ResourceList> {
    let mut total = ResourceList::new();
    for zone in zones {
        total.add_all(&zone.resources)?;
    }
    Ok(total)
}
