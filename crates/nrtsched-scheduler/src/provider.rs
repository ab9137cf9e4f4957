//! Node topology snapshot sources

use nrtsched_core::{NodeResourceTopology, NodeTopology, NrtError, NrtResult};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Source of immutable node topology snapshots.
///
/// Implementations must hand out snapshots that do not change for the
/// lifetime of one filter or score call.
pub trait TopologyProvider: Send + Sync {
    /// Topology of `node_name`, or `None` when the node is unknown
    fn node_topology(&self, node_name: &str) -> Option<Arc<NodeTopology>>;
}

impl<P: TopologyProvider + ?Sized> TopologyProvider for Arc<P> {
    fn node_topology(&self, node_name: &str) -> Option<Arc<NodeTopology>> {
        (**self).node_topology(node_name)
    }
}

struct StoredTopology {
    raw: NodeResourceTopology,
    normalized: Arc<NodeTopology>,
}

/// In-memory set of node resource topology objects keyed by namespace and
/// node name
pub struct TopologyStore {
    namespaces: Vec<String>,
    objects: HashMap<(String, String), StoredTopology>,
}

impl TopologyStore {
    /// Create an empty store searching `namespaces` in order
    pub fn new(namespaces: Vec<String>) -> Self {
        Self {
            namespaces,
            objects: HashMap::new(),
        }
    }

    /// Create a store from a list of objects
    pub fn from_objects(
        namespaces: Vec<String>,
        objects: impl IntoIterator<Item = NodeResourceTopology>,
    ) -> Self {
        let mut store = Self::new(namespaces);
        for object in objects {
            store.insert(object);
        }
        store
    }

    /// Load objects from a JSON file (one object or an array) or from every
    /// `*.json` file of a directory
    pub fn load(path: &Path, namespaces: Vec<String>) -> NrtResult<Self> {
        let mut objects = Vec::new();

        if path.is_dir() {
            let mut files: Vec<_> = std::fs::read_dir(path)?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            files.sort();
            for file in files {
                objects.extend(read_objects(&file)?);
            }
        } else {
            objects.extend(read_objects(path)?);
        }

        let store = Self::from_objects(namespaces, objects);
        info!(
            path = %path.display(),
            objects = store.len(),
            "Loaded node resource topologies"
        );
        Ok(store)
    }

    /// Insert or replace an object, returning the previous one
    pub fn insert(&mut self, object: NodeResourceTopology) -> Option<NodeResourceTopology> {
        let key = (object.namespace.clone(), object.name.clone());
        let normalized = Arc::new(NodeTopology::from_raw(&object));
        self.objects
            .insert(key, StoredTopology { raw: object, normalized })
            .map(|old| old.raw)
    }

    /// Raw object for `node_name` from the first configured namespace that
    /// has one. Objects are never merged across namespaces.
    pub fn find(&self, node_name: &str) -> Option<&NodeResourceTopology> {
        self.find_stored(node_name).map(|stored| &stored.raw)
    }

    fn find_stored(&self, node_name: &str) -> Option<&StoredTopology> {
        for namespace in &self.namespaces {
            let key = (namespace.clone(), node_name.to_string());
            if let Some(stored) = self.objects.get(&key) {
                return Some(stored);
            }
            debug!(namespace = %namespace, node = %node_name, "No topology in namespace");
        }
        None
    }

    /// Names of nodes visible through the configured namespaces
    pub fn node_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self
            .objects
            .keys()
            .filter(|(namespace, _)| self.namespaces.contains(namespace))
            .map(|(_, name)| name)
            .collect();
        names.into_iter().cloned().collect()
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl TopologyProvider for TopologyStore {
    fn node_topology(&self, node_name: &str) -> Option<Arc<NodeTopology>> {
        self.find_stored(node_name)
            .map(|stored| Arc::clone(&stored.normalized))
    }
}

fn read_objects(path: &Path) -> NrtResult<Vec<NodeResourceTopology>> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let objects = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(objects)
}

/// Convenience lookup used when the caller only needs presence
pub fn require_topology(
    provider: &dyn TopologyProvider,
    node_name: &str,
) -> NrtResult<Arc<NodeTopology>> {
    provider
        .node_topology(node_name)
        .ok_or_else(|| NrtError::TopologyNotFound(node_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nrtsched_core::{ResourceInfo, Zone};
    use std::io::Write;

    fn object(namespace: &str, name: &str, cpu: &str) -> NodeResourceTopology {
        NodeResourceTopology {
            name: name.to_string(),
            namespace: namespace.to_string(),
            topology_policies: vec!["SingleNUMANodePodLevel".to_string()],
            zones: vec![Zone {
                name: "node-0".to_string(),
                zone_type: "Node".to_string(),
                resources: vec![ResourceInfo {
                    name: "cpu".to_string(),
                    capacity: cpu.to_string(),
                    allocatable: cpu.to_string(),
                }],
            }],
        }
    }

    #[test]
    fn test_unknown_node() {
        let store = TopologyStore::new(vec!["default".to_string()]);
        assert!(store.node_topology("missing").is_none());
        assert!(matches!(
            require_topology(&store, "missing"),
            Err(NrtError::TopologyNotFound(_))
        ));
    }

    #[test]
    fn test_first_namespace_wins() {
        let store = TopologyStore::from_objects(
            vec!["numa".to_string(), "default".to_string()],
            vec![object("default", "worker-1", "2"), object("numa", "worker-1", "8")],
        );

        let found = store.find("worker-1").unwrap();
        assert_eq!(found.namespace, "numa");
        assert_eq!(found.zones[0].resources[0].allocatable, "8");
    }

    #[test]
    fn test_unconfigured_namespace_is_invisible() {
        let store = TopologyStore::from_objects(
            vec!["default".to_string()],
            vec![object("other", "worker-1", "2")],
        );
        assert!(store.find("worker-1").is_none());
        assert!(store.node_names().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_normalized_snapshot_is_shared() {
        let store = TopologyStore::from_objects(
            vec!["default".to_string()],
            vec![object("default", "worker-1", "4")],
        );
        let a = store.node_topology("worker-1").unwrap();
        let b = store.node_topology("worker-1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.zones.len(), 1);
    }

    #[test]
    fn test_insert_replaces() {
        let mut store = TopologyStore::new(vec!["default".to_string()]);
        assert!(store.insert(object("default", "worker-1", "2")).is_none());
        let previous = store.insert(object("default", "worker-1", "4")).unwrap();
        assert_eq!(previous.zones[0].resources[0].allocatable, "2");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_load_file_and_directory() {
        let dir = tempfile::tempdir().unwrap();

        let array = serde_json::to_string(&vec![
            object("default", "worker-1", "2"),
            object("default", "worker-2", "4"),
        ])
        .unwrap();
        let mut file = std::fs::File::create(dir.path().join("a.json")).unwrap();
        file.write_all(array.as_bytes()).unwrap();

        let single = serde_json::to_string(&object("default", "worker-3", "8")).unwrap();
        std::fs::write(dir.path().join("b.json"), single).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let from_file =
            TopologyStore::load(&dir.path().join("a.json"), vec!["default".to_string()]).unwrap();
        assert_eq!(from_file.len(), 2);

        let from_dir = TopologyStore::load(dir.path(), vec!["default".to_string()]).unwrap();
        assert_eq!(
            from_dir.node_names(),
            vec!["worker-1".to_string(), "worker-2".to_string(), "worker-3".to_string()]
        );
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = TopologyStore::load(&path, vec!["default".to_string()]);
        assert!(matches!(result, Err(NrtError::Serialization(_))));
    }
}
