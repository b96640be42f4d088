use crate::cluster::Cluster;
use crate::node::PhysicalNode;
use crate::topology::Topology;
use crate::{Error, Result};

use super::{free_slots, num_subgraphs, Placement, Scheduler};

/// Places sub task graphs one at a time, each on the node that maximises the
/// weighted objective of the placement built so far.
#[derive(Debug, Clone)]
pub struct GreedyScheduler {
    availability_weight: f64,
    response_time_weight: f64,
}

impl Default for GreedyScheduler {
    fn default() -> Self {
        GreedyScheduler::new(1.0, 1.0)
    }
}

impl GreedyScheduler {
    pub fn new(availability_weight: f64, response_time_weight: f64) -> Self {
        GreedyScheduler {
            availability_weight,
            response_time_weight,
        }
    }
}

impl Scheduler for GreedyScheduler {
    fn name(&self) -> &str {
        "greedy"
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

        let objective = cluster.objective();
        let mut partial: Vec<&PhysicalNode> = Vec::with_capacity(requested);
        for _ in 0..requested {
            let mut best: Option<(usize, f64)> = None;
            for (i, &(node, free)) in slots.iter().enumerate() {
                if free == 0 {
                    continue;
                }
                partial.push(node);
                let value = objective
                    .score(&partial)
                    .weighted(self.availability_weight, self.response_time_weight);
                partial.pop();
                if best.map_or(true, |(_, v)| value > v) {
                    best = Some((i, value));
                }
            }

            let (pick, value) = best.ok_or(Error::NoCapacity {
                available,
                requested,
            })?;
            log::trace!("greedy picks {} with value {:.4}", slots[pick].0.id(), value);
            slots[pick].1 -= 1;
            partial.push(slots[pick].0);
        }

        Ok(Placement(partial.iter().map(|n| n.id().to_owned()).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_common::*;
    use super::*;

    #[test]
    fn availability_spreads() {
        let cluster = make_cluster(2, 2, 4);
        let topo = make_topology("t", 3);
        let mut sched = GreedyScheduler::new(1.0, 0.0);
        let placement = sched.place(&topo, &cluster).unwrap();
        let mut nodes = placement.0.clone();
        nodes.sort();
        nodes.dedup();
        assert_eq!(nodes.len(), 4);
    }

    #[test]
    fn response_time_packs() {
        let cluster = make_cluster(2, 2, 4);
        let topo = make_topology("t", 3);
        let mut sched = GreedyScheduler::new(0.0, 1.0);
        let placement = sched.place(&topo, &cluster).unwrap();
        assert_eq!(placement.0, vec!["node-0"; 4]);
    }

    #[test]
    fn respects_free_workers() {
        let cluster = make_cluster(2, 2, 1);
        let topo = make_topology("t", 3);
        let mut sched = GreedyScheduler::new(0.0, 1.0);
        let placement = sched.place(&topo, &cluster).unwrap();
        let mut nodes = placement.0.clone();
        nodes.sort();
        assert_eq!(nodes, vec!["node-0", "node-1", "node-2", "node-3"]);

        let topo = make_topology("u", 4);
        assert!(matches!(
            sched.place(&topo, &cluster),
            Err(Error::NoCapacity { .. })
        ));
    }
}
