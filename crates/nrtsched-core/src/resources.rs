//! Resource names and resource lists

use crate::{NrtError, NrtResult, Quantity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the CPU resource
pub const RESOURCE_CPU: &str = "cpu";
/// Name of the memory resource
pub const RESOURCE_MEMORY: &str = "memory";
/// Prefix shared by all hugepage resources (e.g. `hugepages-2Mi`)
pub const RESOURCE_HUGEPAGES_PREFIX: &str = "hugepages-";

/// Name of a resource: `cpu`, `memory`, `hugepages-1Gi`, or any extended
/// resource such as `vendor.com/nic`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceName(String);

impl ResourceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn cpu() -> Self {
        Self::new(RESOURCE_CPU)
    }

    pub fn memory() -> Self {
        Self::new(RESOURCE_MEMORY)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_cpu(&self) -> bool {
        self.0 == RESOURCE_CPU
    }

    pub fn is_memory(&self) -> bool {
        self.0 == RESOURCE_MEMORY
    }

    pub fn is_hugepages(&self) -> bool {
        self.0.starts_with(RESOURCE_HUGEPAGES_PREFIX)
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ResourceName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Mapping from resource name to quantity.
///
/// A missing key means "nothing declared", which is not the same as an
/// explicit zero: a zone that does not list a resource cannot satisfy a
/// nonzero request for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceList(BTreeMap<ResourceName, Quantity>);

impl ResourceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &ResourceName) -> Option<Quantity> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &ResourceName) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<ResourceName>, quantity: Quantity) -> Option<Quantity> {
        self.0.insert(name.into(), quantity)
    }

    /// Sum every entry of `other` into this list. A sum that leaves the
    /// `Quantity` range fails with [`NrtError::QuantityOverflow`], leaving
    /// the entries summed before it in place.
    pub fn add_all(&mut self, other: &ResourceList) -> NrtResult<()> {
        for (name, quantity) in other.iter() {
            let slot = self.0.entry(name.clone()).or_insert(Quantity::ZERO);
            *slot = slot
                .checked_add(quantity)
                .ok_or_else(|| NrtError::QuantityOverflow(name.to_string()))?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceName, Quantity)> {
        self.0.iter().map(|(name, quantity)| (name, *quantity))
    }

    pub fn names(&self) -> impl Iterator<Item = &ResourceName> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<ResourceName>> FromIterator<(N, Quantity)> for ResourceList {
    fn from_iter<I: IntoIterator<Item = (N, Quantity)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(n, q)| (n.into(), q)).collect())
    }
}

impl fmt::Display for ResourceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, quantity)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {quantity}")?;
        }
        f.write_str("}")
    }
}
