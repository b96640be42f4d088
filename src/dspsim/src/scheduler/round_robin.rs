use crate::cluster::Cluster;
use crate::topology::Topology;
use crate::{Error, Result};

use super::{free_slots, num_subgraphs, Placement, Scheduler};

/// Cycles over the available nodes, one sub task graph per turn.
///
/// The cursor survives across calls so consecutive topologies start where the
/// previous one stopped.
#[derive(Debug, Default)]
pub struct RoundRobinScheduler {
    next: usize,
}

impl RoundRobinScheduler {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Scheduler for RoundRobinScheduler {
    fn name(&self) -> &str {
        "round-robin"
    }

    fn place(&mut self, topology: &Topology, cluster: &Cluster) -> Result<Placement> {
        let requested = num_subgraphs(topology)?;
        let mut slots = free_slots(cluster);
        let available: usize = slots.iter().map(|s| s.1).sum();
        if available < requested {
            return Err(Error::NoCapacity {
                available,
                requested,
            });
        }

        let mut placement = Vec::with_capacity(requested);
        for _ in 0..requested {
            let n = slots.len();
            let pick = (0..n)
                .map(|k| (self.next + k) % n)
                .find(|&i| slots[i].1 > 0)
                .ok_or(Error::NoCapacity {
                    available,
                    requested,
                })?;
            slots[pick].1 -= 1;
            placement.push(slots[pick].0.id().to_owned());
            self.next = (pick + 1) % n;
        }

        Ok(Placement(placement))
    }
}
