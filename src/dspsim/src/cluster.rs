use std::rc::Rc;

use fnv::FnvHashMap as HashMap;
use indexmap::IndexMap;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::node::{PhysicalNode, Worker};
use crate::objective::{Calibration, Objective, ObjectiveScore};
use crate::scheduler::{Placement, Scheduler};
use crate::topology::Topology;
use crate::{Error, Result};

/// The default capability of a worker, in CPU-equivalent units.
pub const DEFAULT_WORKER_CAPABILITY: f64 = 100.0;

fn default_worker_capability() -> f64 {
    DEFAULT_WORKER_CAPABILITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterSetting {
    /// Random seed for rack generation and rack membership
    pub seed: u64,
    /// Capability of every worker
    #[serde(default = "default_worker_capability")]
    pub worker_capability: f64,
    /// How physical nodes are laid out into racks
    pub layout: ClusterLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args")]
pub enum ClusterLayout {
    /// A random number of racks, every node joins a random rack.
    Random {
        max_node: usize,
        max_rack: usize,
        max_worker: usize,
        nodes_per_rack: usize,
    },
    /// `nracks` racks of `rack_size` nodes each, filled rack by rack.
    Fixed {
        nracks: usize,
        rack_size: usize,
        max_worker: usize,
    },
}

impl ClusterLayout {
    /// `None` when the node count overflows.
    pub fn num_nodes(&self) -> Option<usize> {
        match *self {
            ClusterLayout::Random { max_node, .. } => Some(max_node),
            ClusterLayout::Fixed {
                nracks, rack_size, ..
            } => nracks.checked_mul(rack_size),
        }
    }

    pub fn max_worker(&self) -> usize {
        match *self {
            ClusterLayout::Random { max_worker, .. } | ClusterLayout::Fixed { max_worker, .. } => {
                max_worker
            }
        }
    }

    /// Returns the number of nodes the layout describes.
    fn validate(&self) -> Result<usize> {
        let num_nodes = self
            .num_nodes()
            .ok_or_else(|| Error::InvalidSetting("number of nodes overflows".to_owned()))?;
        if num_nodes <= 3 {
            return Err(Error::TooFewNodes(num_nodes));
        }
        if self.max_worker() == 0 {
            return Err(Error::InvalidSetting(
                "max_worker must be at least 1".to_owned(),
            ));
        }
        if num_nodes.checked_mul(self.max_worker()).is_none() {
            return Err(Error::InvalidSetting(
                "number of workers overflows".to_owned(),
            ));
        }
        if let ClusterLayout::Random {
            max_rack,
            nodes_per_rack,
            ..
        } = *self
        {
            if max_rack == 0 {
                return Err(Error::InvalidSetting("max_rack must be at least 1".to_owned()));
            }
            if nodes_per_rack == 0 {
                return Err(Error::InvalidSetting(
                    "nodes_per_rack must be at least 1".to_owned(),
                ));
            }
        }
        Ok(num_nodes)
    }
}

/// Hands out `rack-N`, `node-N` and `worker-N` ids, counting from 0 for every
/// cluster.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    racks: usize,
    nodes: usize,
    workers: usize,
}

impl IdAllocator {
    pub fn new() -> Self {
        Default::default()
    }

    fn next(counter: &mut usize, prefix: &str) -> String {
        let id = format!("{}-{}", prefix, counter);
        *counter += 1;
        id
    }

    pub fn next_rack(&mut self) -> String {
        Self::next(&mut self.racks, "rack")
    }

    pub fn next_node(&mut self) -> String {
        Self::next(&mut self.nodes, "node")
    }

    pub fn next_worker(&mut self) -> String {
        Self::next(&mut self.workers, "worker")
    }
}

/// Where a sub task graph runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerRef {
    pub node_id: String,
    pub worker_id: String,
}

/// Result of committing an assignment.
///
/// Assignment is best-effort: a slot whose node has no free worker is skipped
/// and the rest of the topology is still placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    Complete,
    /// Ids of the sub task graphs left without a worker.
    Partial { skipped: Vec<String> },
}

impl AssignOutcome {
    #[inline]
    pub fn is_complete(&self) -> bool {
        matches!(self, AssignOutcome::Complete)
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    setting: ClusterSetting,
    ids: IdAllocator,
    racks: Vec<String>,
    nodes: Vec<PhysicalNode>,
    /// node id -> position in `nodes`
    node_index: HashMap<String, usize>,
    /// deployed topologies in deployment order, each mapping sub task graph id
    /// to the worker it occupies
    topology_to_worker: IndexMap<String, IndexMap<String, WorkerRef>>,
    objective: Objective,
}

impl Cluster {
    /// Build the racks, nodes and workers described by `setting` and
    /// calibrate the objective against them.
    pub fn generate(setting: &ClusterSetting) -> Result<Self> {
        let num_nodes = setting.layout.validate()?;
        if !(setting.worker_capability > 0.0) {
            return Err(Error::InvalidSetting(format!(
                "worker_capability must be positive, got {}",
                setting.worker_capability
            )));
        }

        let mut cluster = Cluster {
            setting: setting.clone(),
            ids: IdAllocator::new(),
            racks: Vec::new(),
            nodes: Vec::new(),
            node_index: HashMap::default(),
            topology_to_worker: IndexMap::new(),
            objective: Objective::new(Calibration::from_nodes(&[])),
        };

        let mut rng = StdRng::seed_from_u64(setting.seed);
        match setting.layout {
            ClusterLayout::Random {
                max_node,
                max_rack,
                max_worker,
                nodes_per_rack,
            } => {
                // ceil(max_node / nodes_per_rack), max_node > 3 here
                let lower = ((max_node - 1) / nodes_per_rack + 1)
                    .min(max_rack)
                    .max(1);
                let num_rack = rng.gen_range(lower..=max_rack);
                cluster.add_racks(num_rack);
                cluster.add_nodes(max_node, max_worker);
                let racks = &cluster.racks;
                for node in &mut cluster.nodes {
                    node.set_rack(&racks[rng.gen_range(0..num_rack)]);
                }
            }
            ClusterLayout::Fixed {
                nracks,
                rack_size,
                max_worker,
            } => {
                cluster.add_racks(nracks);
                cluster.add_nodes(num_nodes, max_worker);
                let racks = &cluster.racks;
                for (i, node) in cluster.nodes.iter_mut().enumerate() {
                    node.set_rack(&racks[i / rack_size]);
                }
            }
        }

        log::info!(
            "cluster generated: {} racks, {} nodes, {} workers",
            cluster.racks.len(),
            cluster.nodes.len(),
            cluster.total_worker_count()
        );

        cluster.initialize_objective();
        Ok(cluster)
    }

    fn add_racks(&mut self, n: usize) {
        for _ in 0..n {
            let rack = self.ids.next_rack();
            self.racks.push(rack);
        }
    }

    fn add_nodes(&mut self, n: usize, max_worker: usize) {
        for _ in 0..n {
            let node_id = self.ids.next_node();
            let workers = (0..max_worker)
                .map(|_| {
                    Worker::new(
                        self.ids.next_worker(),
                        &node_id,
                        self.setting.worker_capability,
                    )
                })
                .collect();
            self.node_index.insert(node_id.clone(), self.nodes.len());
            self.nodes.push(PhysicalNode::new(node_id, workers));
        }
    }

    /// Recompute the calibration bounds from the full worker population.
    pub fn initialize_objective(&mut self) {
        let calibration = Calibration::from_nodes(&self.nodes);
        log::info!(
            "objective calibrated: availability [{:.4}, {:.4}], response time [{:.4}, {:.4}]",
            calibration.availability_min,
            calibration.availability_max,
            calibration.response_time_min,
            calibration.response_time_max
        );
        self.objective = Objective::new(calibration);
    }

    #[inline]
    pub fn setting(&self) -> &ClusterSetting {
        &self.setting
    }

    #[inline]
    pub fn racks(&self) -> &[String] {
        &self.racks
    }

    #[inline]
    pub fn nodes(&self) -> &[PhysicalNode] {
        &self.nodes
    }

    #[inline]
    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn get_physical_node(&self, node_id: &str) -> Option<&PhysicalNode> {
        self.node_index.get(node_id).map(|&i| &self.nodes[i])
    }

    /// Ids of the deployed topologies, in deployment order.
    pub fn topologies(&self) -> impl Iterator<Item = &str> {
        self.topology_to_worker.keys().map(|k| k.as_str())
    }

    pub fn is_deployed(&self, topology_id: &str) -> bool {
        self.topology_to_worker.contains_key(topology_id)
    }

    #[inline]
    pub fn topology_to_worker(&self) -> &IndexMap<String, IndexMap<String, WorkerRef>> {
        &self.topology_to_worker
    }

    pub fn total_worker_count(&self) -> usize {
        self.nodes.iter().map(|n| n.workers().len()).sum()
    }

    pub fn available_worker_count(&self) -> usize {
        self.nodes.iter().map(|n| n.available_count()).sum()
    }

    /// Nodes with at least one free worker.
    pub fn get_available_physical_node(&self) -> Vec<&PhysicalNode> {
        self.nodes
            .iter()
            .filter(|n| n.available_count() > 0)
            .collect()
    }

    /// Whether the free workers suffice for every sub task graph of the
    /// instantiated topology.
    pub fn check_topology_can_be_allocated(&self, topology: &Topology) -> bool {
        let requested = match topology.taskgraph() {
            Some(tg) => tg.len(),
            None => {
                log::warn!("topology {} has not been instantiated", topology.id());
                return false;
            }
        };
        let available = self.available_worker_count();
        if available < requested {
            log::warn!(
                "not enough workers for {}, available: {}, requested: {}",
                topology.id(),
                available,
                requested
            );
            return false;
        }
        true
    }

    /// Bind the i-th sub task graph to a free worker of the i-th node of
    /// `assignment`.
    ///
    /// Every node id is resolved against this cluster before any worker is
    /// touched. A node without a free worker makes the slot be skipped,
    /// which the returned outcome reports.
    pub fn assign_topology(
        &mut self,
        topology: &Topology,
        assignment: &[String],
    ) -> Result<AssignOutcome> {
        let taskgraph = topology
            .taskgraph()
            .ok_or_else(|| Error::NotInstantiated(topology.id().to_owned()))?;
        if self.is_deployed(topology.id()) {
            return Err(Error::AlreadyDeployed(topology.id().to_owned()));
        }
        if assignment.len() != taskgraph.len() {
            return Err(Error::AssignmentOutOfRange {
                assignment: assignment.len(),
                subgraphs: taskgraph.len(),
            });
        }
        let positions = assignment
            .iter()
            .map(|node_id| {
                self.node_index
                    .get(node_id.as_str())
                    .copied()
                    .ok_or_else(|| Error::UnknownNode(node_id.clone()))
            })
            .collect::<Result<Vec<usize>>>()?;

        let mut placed = IndexMap::new();
        let mut skipped = Vec::new();
        for (i, pos) in positions.into_iter().enumerate() {
            // lengths were checked above
            let subgraph = match taskgraph.subgraph(i) {
                Some(sg) => Rc::clone(sg),
                None => break,
            };
            let node = &mut self.nodes[pos];
            match node.assign(Rc::clone(&subgraph)) {
                Some(worker) => {
                    log::debug!("{} -> {}/{}", subgraph, worker.node_id(), worker.id());
                    let worker_ref = WorkerRef {
                        node_id: worker.node_id().to_owned(),
                        worker_id: worker.id().to_owned(),
                    };
                    placed.insert(subgraph.id().to_owned(), worker_ref);
                }
                None => {
                    log::warn!("node {} has no free worker, {} skipped", node.id(), subgraph);
                    skipped.push(subgraph.id().to_owned());
                }
            }
        }

        log::info!(
            "assigned {}: {} placed, {} skipped, {} workers left",
            topology.id(),
            placed.len(),
            skipped.len(),
            self.available_worker_count()
        );
        self.topology_to_worker
            .insert(topology.id().to_owned(), placed);

        if skipped.is_empty() {
            Ok(AssignOutcome::Complete)
        } else {
            Ok(AssignOutcome::Partial { skipped })
        }
    }

    /// Release every worker bound to the topology and return the nodes that
    /// are available afterwards.
    pub fn get_reschedulable_physical_node(
        &mut self,
        topology: &Topology,
    ) -> Result<Vec<&PhysicalNode>> {
        let placed = self
            .topology_to_worker
            .shift_remove(topology.id())
            .ok_or_else(|| Error::TopologyNotDeployed(topology.id().to_owned()))?;
        for worker_ref in placed.values() {
            let pos = self.node_index[&worker_ref.node_id];
            self.nodes[pos].deassign(&worker_ref.worker_id);
        }
        log::info!(
            "reclaimed {}: {} workers released, {} workers left",
            topology.id(),
            placed.len(),
            self.available_worker_count()
        );
        Ok(self.get_available_physical_node())
    }

    /// Reclaim the topology and place it again with `scheduler`.
    pub fn reschedule(
        &mut self,
        topology: &Topology,
        scheduler: &mut dyn Scheduler,
    ) -> Result<(Placement, AssignOutcome)> {
        self.get_reschedulable_physical_node(topology)?;
        scheduler.schedule(topology, self)
    }

    /// Nodes occupied by a deployed topology, one entry per worker.
    pub fn placement_of(&self, topology_id: &str) -> Result<Vec<&PhysicalNode>> {
        let placed = self
            .topology_to_worker
            .get(topology_id)
            .ok_or_else(|| Error::TopologyNotDeployed(topology_id.to_owned()))?;
        Ok(placed
            .values()
            .map(|w| &self.nodes[self.node_index[&w.node_id]])
            .collect())
    }

    /// Normalised objective score of a deployed topology.
    pub fn score(&self, topology_id: &str) -> Result<ObjectiveScore> {
        let placement = self.placement_of(topology_id)?;
        Ok(self.objective.score(&placement))
    }
}

impl std::fmt::Display for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "cluster: {} racks, {} nodes, {}/{} workers free",
            self.racks.len(),
            self.nodes.len(),
            self.available_worker_count(),
            self.total_worker_count()
        )?;
        for node in &self.nodes {
            writeln!(f, "  {}", node)?;
        }
        for (topo, placed) in &self.topology_to_worker {
            writeln!(f, "  {}: {} sub task graphs", topo, placed.len())?;
        }
        Ok(())
    }
}
