//! Single-NUMA-zone feasibility filter
//!
//! Runs a simplified version of the node resource manager's admission check:
//! for every requested resource it computes which NUMA zones could host it,
//! intersects those sets, and rejects the node when nothing is left.

use nrtsched_core::{
    NodeTopology, NumaZone, QosClass, Quantity, ResourceList, ResourceName, TopologyPolicy, Workload,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, debug_span, warn};
use uuid::Uuid;

use crate::mask::ZoneMask;
use crate::provider::TopologyProvider;

/// Outcome of filtering one node for one workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum FilterVerdict {
    Feasible,
    Infeasible { reason: String },
}

impl FilterVerdict {
    pub fn infeasible(reason: impl Into<String>) -> Self {
        FilterVerdict::Infeasible {
            reason: reason.into(),
        }
    }

    pub fn is_feasible(&self) -> bool {
        matches!(self, FilterVerdict::Feasible)
    }
}

/// Whether one zone could host `requested` of `name`
fn zone_can_align(zone: &NumaZone, name: &ResourceName, requested: Quantity, qos: QosClass) -> bool {
    let available = zone.resources.get(name);
    if available.is_none() && !requested.is_zero() {
        return false;
    }

    // Memory and hugepages are satisfied by the resource manager without
    // rigid pinning, and non-guaranteed CPU floats across zones.
    name.is_memory()
        || name.is_hugepages()
        || (name.is_cpu() && qos != QosClass::Guaranteed)
        || requested.is_zero()
        || available.is_some_and(|available| available >= requested)
}

/// Zones able to host every resource of `requests` on their own
pub fn eligible_zones(zones: &[NumaZone], requests: &ResourceList, qos: QosClass) -> ZoneMask {
    let mut mask = ZoneMask::for_zones(zones);

    for (name, requested) in requests.iter() {
        let mut resource_mask = ZoneMask::with_width(mask.width());
        for zone in zones {
            if zone_can_align(zone, name, requested, qos) {
                resource_mask.set(zone.id);
            }
        }

        mask &= &resource_mask;
        if mask.is_empty() {
            debug!(resource = %name, requested = %requested, "No NUMA zone can align resource");
            break;
        }
    }

    mask
}

/// Whether `requests` fit entirely inside a single zone
pub fn can_align(zones: &[NumaZone], requests: &ResourceList, qos: QosClass) -> bool {
    requests.is_empty() || !eligible_zones(zones, requests, qos).is_empty()
}

/// Handler deciding feasibility for one topology policy
pub type PolicyHandler = fn(&Workload, QosClass, &[NumaZone]) -> FilterVerdict;

/// Every subunit must fit some zone on its own; subunits need not share one
pub fn single_numa_container_level_handler(
    workload: &Workload,
    qos: QosClass,
    zones: &[NumaZone],
) -> FilterVerdict {
    debug!("Single NUMA zone container level handler");

    for subunit in workload.all_subunits() {
        if !can_align(zones, &subunit.requests, qos) {
            return FilterVerdict::infeasible(format!("cannot align subunit {}", subunit.name));
        }
    }
    FilterVerdict::Feasible
}

/// The summed requests of all subunits must fit one zone
pub fn single_numa_pod_level_handler(
    workload: &Workload,
    qos: QosClass,
    zones: &[NumaZone],
) -> FilterVerdict {
    debug!("Single NUMA zone pod level handler");

    let requests = match workload.aggregate_requests() {
        Ok(requests) => requests,
        Err(e) => {
            warn!(error = %e, "Cannot sum workload requests");
            return FilterVerdict::infeasible(format!(
                "cannot align workload {}: {}",
                workload.name, e
            ));
        }
    };
    if !can_align(zones, &requests, qos) {
        return FilterVerdict::infeasible(format!("cannot align workload {}", workload.name));
    }
    FilterVerdict::Feasible
}

/// Registered policy handlers
#[derive(Clone)]
pub struct PolicyHandlerMap {
    handlers: HashMap<TopologyPolicy, PolicyHandler>,
}

impl PolicyHandlerMap {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, policy: TopologyPolicy, handler: PolicyHandler) {
        self.handlers.insert(policy, handler);
    }

    pub fn get(&self, policy: &TopologyPolicy) -> Option<PolicyHandler> {
        self.handlers.get(policy).copied()
    }

    /// The first declared policy with a handler decides; a node without
    /// one imposes no constraint.
    pub fn dispatch(
        &self,
        policies: &[TopologyPolicy],
        workload: &Workload,
        qos: QosClass,
        zones: &[NumaZone],
    ) -> FilterVerdict {
        for policy in policies {
            match self.get(policy) {
                Some(handler) => return handler(workload, qos, zones),
                None => debug!(policy = %policy, "Handler for policy not found"),
            }
        }
        FilterVerdict::Feasible
    }
}

impl Default for PolicyHandlerMap {
    fn default() -> Self {
        let mut map = Self::empty();
        map.register(
            TopologyPolicy::SingleNumaNodePodLevel,
            single_numa_pod_level_handler,
        );
        map.register(
            TopologyPolicy::SingleNumaNodeContainerLevel,
            single_numa_container_level_handler,
        );
        map
    }
}

/// Decide feasibility of `workload` against an already-fetched topology
pub fn filter_topology(
    workload: &Workload,
    qos: QosClass,
    topology: &NodeTopology,
) -> FilterVerdict {
    if qos == QosClass::BestEffort {
        return FilterVerdict::Feasible;
    }
    PolicyHandlerMap::default().dispatch(&topology.policies, workload, qos, &topology.zones)
}

/// Node filter backed by a topology provider
pub struct TopologyMatch {
    provider: Arc<dyn TopologyProvider>,
    handlers: PolicyHandlerMap,
}

impl TopologyMatch {
    /// Create a filter with both single-NUMA-zone handlers registered
    pub fn new(provider: Arc<dyn TopologyProvider>) -> Self {
        Self::with_handlers(provider, PolicyHandlerMap::default())
    }

    pub fn with_handlers(provider: Arc<dyn TopologyProvider>, handlers: PolicyHandlerMap) -> Self {
        Self { provider, handlers }
    }

    /// Decide whether `workload` can be aligned on `node_name`
    pub fn filter(&self, workload: &Workload, node_name: &str) -> FilterVerdict {
        let span = debug_span!(
            "filter",
            log_id = %Uuid::new_v4(),
            workload = %workload.log_id(),
            node = %node_name
        );
        let _enter = span.enter();

        let qos = workload.qos_class();
        if qos == QosClass::BestEffort {
            debug!("Best effort workload, no alignment required");
            return FilterVerdict::Feasible;
        }

        let Some(topology) = self.provider.node_topology(node_name) else {
            debug!("No topology for node, no constraint applied");
            return FilterVerdict::Feasible;
        };

        let verdict = self
            .handlers
            .dispatch(&topology.policies, workload, qos, &topology.zones);
        debug!(qos = %qos, verdict = ?verdict, "Filter finished");
        verdict
    }
}
