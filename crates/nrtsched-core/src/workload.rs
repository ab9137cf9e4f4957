//! Workload, subunit and QoS class definitions

use crate::{NrtResult, ResourceList, ResourceName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An independently resource-accounted part of a workload (a container)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subunit {
    /// Subunit name, used in infeasibility reasons
    pub name: String,
    /// Requested resources
    #[serde(default)]
    pub requests: ResourceList,
    /// Resource limits
    #[serde(default)]
    pub limits: ResourceList,
}

impl Subunit {
    /// Create a subunit with only requests declared
    pub fn new(name: impl Into<String>, requests: ResourceList) -> Self {
        Self {
            name: name.into(),
            requests,
            limits: ResourceList::new(),
        }
    }

    /// Create a subunit whose limits equal its requests
    pub fn guaranteed(name: impl Into<String>, resources: ResourceList) -> Self {
        Self {
            name: name.into(),
            requests: resources.clone(),
            limits: resources,
        }
    }
}

/// A workload (pod) to place on a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    /// Workload name
    pub name: String,
    /// Workload namespace
    #[serde(default)]
    pub namespace: String,
    /// Subunits that run to completion before the regular ones
    #[serde(default)]
    pub init_subunits: Vec<Subunit>,
    /// Regular subunits
    #[serde(default)]
    pub subunits: Vec<Subunit>,
}

impl Workload {
    /// Create a workload from its regular subunits
    pub fn new(name: impl Into<String>, subunits: Vec<Subunit>) -> Self {
        Self {
            name: name.into(),
            namespace: String::new(),
            init_subunits: Vec::new(),
            subunits,
        }
    }

    /// Identifier used in logs: `namespace/name`, or the bare name
    pub fn log_id(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }

    /// All subunits, init subunits first
    pub fn all_subunits(&self) -> impl Iterator<Item = &Subunit> {
        self.init_subunits.iter().chain(self.subunits.iter())
    }

    /// Requests summed across every subunit
    pub fn aggregate_requests(&self) -> NrtResult<ResourceList> {
        let mut total = ResourceList::new();
        for subunit in self.all_subunits() {
            total.add_all(&subunit.requests)?;
        }
        Ok(total)
    }

    /// Derive the QoS class from the requests and limits of every subunit
    pub fn qos_class(&self) -> QosClass {
        let compute = [ResourceName::cpu(), ResourceName::memory()];
        let mut declares_compute = false;
        let mut guaranteed = true;

        for subunit in self.all_subunits() {
            for name in &compute {
                let declared = |list: &ResourceList| list.get(name).is_some_and(|q| !q.is_zero());
                if declared(&subunit.requests) || declared(&subunit.limits) {
                    declares_compute = true;
                }
            }

            if !compute.iter().all(|name| subunit.limits.contains(name)) {
                guaranteed = false;
            }

            // A missing request defaults to its limit; a request without a
            // limit can never be guaranteed.
            for (name, request) in subunit.requests.iter() {
                if subunit.limits.get(name) != Some(request) {
                    guaranteed = false;
                }
            }
        }

        if !declares_compute {
            QosClass::BestEffort
        } else if guaranteed {
            QosClass::Guaranteed
        } else {
            QosClass::Burstable
        }
    }
}

/// Workload-level quality of service classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QosClass {
    Guaranteed,
    Burstable,
    BestEffort,
}

impl fmt::Display for QosClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QosClass::Guaranteed => write!(f, "Guaranteed"),
            QosClass::Burstable => write!(f, "Burstable"),
            QosClass::BestEffort => write!(f, "BestEffort"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Quantity;

    fn resources(cpu: i64, memory: i64) -> ResourceList {
        [
            ("cpu", Quantity::from_units(cpu)),
            ("memory", Quantity::from_units(memory)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_best_effort_without_requests() {
        let workload = Workload::new("idle", vec![Subunit::new("c0", ResourceList::new())]);
        assert_eq!(workload.qos_class(), QosClass::BestEffort);
    }

    #[test]
    fn test_best_effort_ignores_extended_resources() {
        let requests: ResourceList = [("vendor.com/nic", Quantity::from_units(1))].into_iter().collect();
        let workload = Workload::new("nic-only", vec![Subunit::new("c0", requests)]);
        assert_eq!(workload.qos_class(), QosClass::BestEffort);
    }

    #[test]
    fn test_guaranteed_when_requests_equal_limits() {
        let workload = Workload::new(
            "pinned",
            vec![
                Subunit::guaranteed("c0", resources(2, 1024)),
                Subunit::guaranteed("c1", resources(1, 512)),
            ],
        );
        assert_eq!(workload.qos_class(), QosClass::Guaranteed);
    }

    #[test]
    fn test_guaranteed_with_limits_only() {
        let subunit = Subunit {
            name: "c0".to_string(),
            requests: ResourceList::new(),
            limits: resources(2, 1024),
        };
        let workload = Workload::new("limits-only", vec![subunit]);
        assert_eq!(workload.qos_class(), QosClass::Guaranteed);
    }

    #[test]
    fn test_burstable_when_requests_differ() {
        let subunit = Subunit {
            name: "c0".to_string(),
            requests: resources(1, 1024),
            limits: resources(2, 1024),
        };
        let workload = Workload::new("burst", vec![subunit]);
        assert_eq!(workload.qos_class(), QosClass::Burstable);
    }

    #[test]
    fn test_burstable_when_memory_limit_missing() {
        let limits: ResourceList = [("cpu", Quantity::from_units(2))].into_iter().collect();
        let subunit = Subunit {
            name: "c0".to_string(),
            requests: limits.clone(),
            limits,
        };
        let workload = Workload::new("cpu-only", vec![subunit]);
        assert_eq!(workload.qos_class(), QosClass::Burstable);
    }

    #[test]
    fn test_one_burstable_subunit_downgrades_workload() {
        let workload = Workload::new(
            "mixed",
            vec![
                Subunit::guaranteed("c0", resources(2, 1024)),
                Subunit::new("c1", resources(1, 512)),
            ],
        );
        assert_eq!(workload.qos_class(), QosClass::Burstable);
    }

    #[test]
    fn test_aggregate_requests_includes_init_subunits() {
        let mut workload = Workload::new("app", vec![Subunit::new("main", resources(2, 100))]);
        workload.init_subunits.push(Subunit::new("setup", resources(1, 50)));

        let total = workload.aggregate_requests().unwrap();
        assert_eq!(total.get(&ResourceName::cpu()), Some(Quantity::from_units(3)));
        assert_eq!(total.get(&ResourceName::memory()), Some(Quantity::from_units(150)));

        let names: Vec<&str> = workload.all_subunits().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["setup", "main"]);
    }

    #[test]
    fn test_workload_json() {
        let json = r#"{
            "name": "web",
            "namespace": "prod",
            "initSubunits": [{"name": "init", "requests": {"cpu": "500m"}}],
            "subunits": [{"name": "app", "requests": {"cpu": "2", "memory": "1Gi"}, "limits": {"cpu": "2", "memory": "1Gi"}}]
        }"#;
        let workload: Workload = serde_json::from_str(json).unwrap();
        assert_eq!(workload.log_id(), "prod/web");
        assert_eq!(workload.init_subunits.len(), 1);
        assert_eq!(workload.qos_class(), QosClass::Burstable);
    }
}
