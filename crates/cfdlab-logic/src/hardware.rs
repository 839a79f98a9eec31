//! Compute hardware tiers and their solver throughput.

use serde::{Deserialize, Serialize};

/// Hardware the lab runs its solver on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HardwareTier {
    #[default]
    Laptop,
    Workstation,
    HpcCluster,
}

impl HardwareTier {
    /// All tiers, slowest first.
    pub const ALL: [HardwareTier; 3] = [
        HardwareTier::Laptop,
        HardwareTier::Workstation,
        HardwareTier::HpcCluster,
    ];

    /// Progress multiplier applied to every non-divergent step.
    pub fn throughput(self) -> f64 {
        match self {
            HardwareTier::Laptop => 1.0,
            HardwareTier::Workstation => 2.0,
            HardwareTier::HpcCluster => 5.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HardwareTier::Laptop => "Laptop",
            HardwareTier::Workstation => "Workstation",
            HardwareTier::HpcCluster => "HPC Cluster",
        }
    }
}
