//! Resource model.
//!
//! A processing node owns exactly two execution units: a classical
//! processor (CPU) and a quantum processor (QPU). Demands and capacities
//! are fixed-length vectors indexed by [`Resource::index`].
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 1.2

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of resource types on a node.
pub const RESOURCE_COUNT: usize = 2;

/// Per-resource demand of a single block, indexed by [`Resource::index`].
pub type ResourceDemand = [i32; RESOURCE_COUNT];

/// An execution unit of a processing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resource {
    /// Classical processor.
    #[serde(rename = "CPU")]
    Cpu,
    /// Quantum processor.
    #[serde(rename = "QPU")]
    Qpu,
}

impl Resource {
    /// All resources in index order.
    pub const ALL: [Resource; RESOURCE_COUNT] = [Resource::Cpu, Resource::Qpu];

    /// Position of this resource in demand and capacity vectors.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Resource::Cpu => 0,
            Resource::Qpu => 1,
        }
    }

    /// Short upper-case label ("CPU" / "QPU").
    pub fn label(self) -> &'static str {
        match self {
            Resource::Cpu => "CPU",
            Resource::Qpu => "QPU",
        }
    }

    /// Demand vector requesting one unit of this resource.
    pub fn unit_demand(self) -> ResourceDemand {
        let mut demand = [0; RESOURCE_COUNT];
        demand[self.index()] = 1;
        demand
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Declared capacity of each resource.
///
/// The reference node runs one block per unit at a time (`[1, 1]`), but the
/// model accepts any non-negative integer capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCapacities(pub [i32; RESOURCE_COUNT]);

impl ResourceCapacities {
    /// Creates capacities for CPU and QPU.
    pub fn new(cpu: i32, qpu: i32) -> Self {
        Self([cpu, qpu])
    }

    /// Capacity of one resource.
    #[inline]
    pub fn get(&self, resource: Resource) -> i32 {
        self.0[resource.index()]
    }
}

impl Default for ResourceCapacities {
    fn default() -> Self {
        Self([1; RESOURCE_COUNT])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_indices_are_dense() {
        for (i, r) in Resource::ALL.iter().enumerate() {
            assert_eq!(r.index(), i);
        }
    }

    #[test]
    fn test_unit_demand() {
        assert_eq!(Resource::Cpu.unit_demand(), [1, 0]);
        assert_eq!(Resource::Qpu.unit_demand(), [0, 1]);
    }

    #[test]
    fn test_capacities() {
        let caps = ResourceCapacities::default();
        assert_eq!(caps.get(Resource::Cpu), 1);
        assert_eq!(caps.get(Resource::Qpu), 1);

        let caps = ResourceCapacities::new(2, 1);
        assert_eq!(caps.get(Resource::Cpu), 2);
    }

    #[test]
    fn test_serde_labels() {
        let json = serde_json::to_string(&Resource::Qpu).unwrap();
        assert_eq!(json, "\"QPU\"");
        assert_eq!(Resource::Cpu.to_string(), "CPU");
    }
}
