//! Placement policies mapping sub task graphs onto physical nodes.

use crate::cluster::{AssignOutcome, Cluster};
use crate::node::PhysicalNode;
use crate::topology::Topology;
use crate::{Error, Result};

mod greedy;
mod round_robin;

pub use greedy::GreedyScheduler;
pub use round_robin::RoundRobinScheduler;

/// Node ids, the i-th entry hosts the i-th sub task graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement(pub Vec<String>);

pub trait Scheduler {
    fn name(&self) -> &str;

    /// Decide a node for every sub task graph of the instantiated topology
    /// without touching the cluster. No node may receive more sub task graphs
    /// than it has free workers.
    fn place(&mut self, topology: &Topology, cluster: &Cluster) -> Result<Placement>;

    /// Check feasibility, place and commit the placement into the cluster.
    ///
    /// Fails with [`Error::NoCapacity`] and leaves the cluster untouched when
    /// there are not enough free workers.
    fn schedule(
        &mut self,
        topology: &Topology,
        cluster: &mut Cluster,
    ) -> Result<(Placement, AssignOutcome)> {
        let requested = topology
            .taskgraph()
            .ok_or_else(|| Error::NotInstantiated(topology.id().to_owned()))?
            .len();
        if cluster.is_deployed(topology.id()) {
            return Err(Error::AlreadyDeployed(topology.id().to_owned()));
        }
        if !cluster.check_topology_can_be_allocated(topology) {
            return Err(Error::NoCapacity {
                available: cluster.available_worker_count(),
                requested,
            });
        }

        let placement = self.place(topology, cluster)?;
        log::debug!("{} placement of {}: {:?}", self.name(), topology.id(), placement);
        let outcome = cluster.assign_topology(topology, &placement.0)?;
        Ok((placement, outcome))
    }
}

/// Available nodes paired with the number of workers still free for planning.
pub(crate) fn free_slots(cluster: &Cluster) -> Vec<(&PhysicalNode, usize)> {
    cluster
        .get_available_physical_node()
        .into_iter()
        .map(|n| (n, n.available_count()))
        .collect()
}

/// The number of sub task graphs to place.
pub(crate) fn num_subgraphs(topology: &Topology) -> Result<usize> {
    topology
        .taskgraph()
        .map(|tg| tg.len())
        .ok_or_else(|| Error::NotInstantiated(topology.id().to_owned()))
}

#[cfg(test)]
pub(crate) mod tests_common {
    use crate::cluster::{Cluster, ClusterLayout, ClusterSetting};
    use crate::topology::{GroupingType, Topology};
    use crate::vertex::Vertex;

    pub fn make_cluster(nracks: usize, rack_size: usize, max_worker: usize) -> Cluster {
        Cluster::generate(&ClusterSetting {
            seed: 0,
            worker_capability: 100.0,
            layout: ClusterLayout::Fixed {
                nracks,
                rack_size,
                max_worker,
            },
        })
        .unwrap()
    }

    pub fn make_topology(id: &str, split: usize) -> Topology {
        let mut t = Topology::new(id);
        t.add_source(Vertex::source("spout", 24.0, 1)).unwrap();
        t.add_operator(Vertex::operator("split", 16.0, split)).unwrap();
        t.connect("spout", "split", GroupingType::Shuffle).unwrap();
        t.instantiate(split.max(1)).unwrap();
        t
    }
}

#[cfg(test)]
mod tests {
    use super::tests_common::*;
    use super::*;

    #[test]
    fn schedule_without_capacity_changes_nothing() {
        let mut cluster = make_cluster(2, 2, 2);
        let topo = make_topology("t", 8);
        let mut sched = RoundRobinScheduler::new();
        let err = sched.schedule(&topo, &mut cluster).unwrap_err();
        assert_eq!(
            err,
            Error::NoCapacity {
                available: 8,
                requested: 9
            }
        );
        assert!(!err.is_configuration());
        assert_eq!(cluster.available_worker_count(), 8);
        assert_eq!(cluster.topologies().count(), 0);
    }

    #[test]
    fn schedule_requires_instantiation() {
        let mut cluster = make_cluster(2, 2, 2);
        let topo = Topology::new("raw");
        let mut sched = GreedyScheduler::default();
        assert_eq!(
            sched.schedule(&topo, &mut cluster).unwrap_err(),
            Error::NotInstantiated("raw".to_owned())
        );
    }

    #[test]
    fn schedule_twice_is_rejected() {
        let mut cluster = make_cluster(2, 2, 2);
        let topo = make_topology("t", 2);
        let mut sched = RoundRobinScheduler::new();
        let (placement, outcome) = sched.schedule(&topo, &mut cluster).unwrap();
        assert_eq!(placement.0.len(), 3);
        assert!(outcome.is_complete());
        assert_eq!(
            sched.schedule(&topo, &mut cluster).unwrap_err(),
            Error::AlreadyDeployed("t".to_owned())
        );
        assert_eq!(cluster.available_worker_count(), 5);
    }

    #[test]
    fn reschedule_moves_topology() {
        let mut cluster = make_cluster(2, 2, 2);
        let topo = make_topology("t", 3);
        let mut sched = GreedyScheduler::default();
        sched.schedule(&topo, &mut cluster).unwrap();
        let (placement, outcome) = cluster.reschedule(&topo, &mut sched).unwrap();
        assert_eq!(placement.0.len(), 4);
        assert!(outcome.is_complete());
        assert_eq!(cluster.available_worker_count(), 4);
        assert_eq!(cluster.topology_to_worker()["t"].len(), 4);
    }
}
