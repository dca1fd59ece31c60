//! Device topology planning
//!
//! Maps a device count onto the tensor-parallel / expert-parallel split used
//! to partition a distributed inference run.

use serde::{Deserialize, Serialize};

/// Largest tensor-parallel degree the planner will choose
const MAX_TENSOR_PARALLEL: u32 = 4;

/// Parallelism configuration for one inference run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub tp_size: u32,
    pub ep_size: u32,
}

impl Topology {
    /// Topology of a single-device run
    pub const SINGLE: Topology = Topology {
        tp_size: 1,
        ep_size: 1,
    };

    /// Plans the topology for `device_count` devices
    ///
    /// Known layouts are fixed (1, 2, 4 and 8 devices); any other count
    /// prefers tensor parallelism up to 4 and spreads the rest over experts.
    /// A count of zero is planned as a single device.
    pub fn for_devices(device_count: u32) -> Self {
        let (tp_size, ep_size) = match device_count {
            0 | 1 => (1, 1),
            2 => (2, 1),
            4 => (4, 1),
            8 => (4, 2),
            n => {
                let tp = n.min(MAX_TENSOR_PARALLEL);
                (tp, n / tp)
            }
        };

        Self { tp_size, ep_size }
    }

    /// Number of devices the topology actually occupies
    pub fn devices_used(&self) -> u32 {
        self.tp_size * self.ep_size
    }
}
