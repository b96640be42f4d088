//! Placement of stream-processing topologies onto a simulated cluster.
//!
//! A [`topology::Topology`] is a logical DAG of sources, operators and sinks.
//! Instantiating it yields a [`taskgraph::TaskGraph`] whose sub task graphs are
//! mapped onto the workers of a [`cluster::Cluster`] by a
//! [`scheduler::Scheduler`], and the quality of that mapping is judged by the
//! cluster's [`objective::Objective`].

use thiserror::Error;

pub mod cluster;
pub mod config;
pub mod message;
pub mod node;
pub mod objective;
pub mod scheduler;
pub mod taskgraph;
pub mod topology;
pub mod vertex;
pub mod workload;

pub use cluster::{AssignOutcome, Cluster, ClusterLayout, ClusterSetting, WorkerRef};
pub use node::{PhysicalNode, Worker};
pub use objective::{Calibration, Objective, ObjectiveScore};
pub use scheduler::{GreedyScheduler, Placement, RoundRobinScheduler, Scheduler};
pub use taskgraph::{SubTaskGraph, TaskGraph};
pub use topology::{GroupingType, Topology};
pub use vertex::{Vertex, VertexKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("the number of nodes should be larger than 3, got {0}")]
    TooFewNodes(usize),
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
    #[error("vertex {id} is a {found}, expected a {expected}")]
    VertexKindMismatch {
        id: String,
        expected: VertexKind,
        found: VertexKind,
    },
    #[error("sink {0} cannot be the source of an edge")]
    InvalidSource(String),
    #[error("source {0} cannot be the target of an edge")]
    InvalidTarget(String),
    #[error("no such grouping type: {0}, expected one of shuffle, all, global")]
    UnknownGrouping(String),
    #[error("no such workload shape: {0}")]
    UnknownWorkloadShape(String),
    #[error("vertex {0} is not a member of the topology")]
    UnknownVertex(String),
    #[error("vertex id {0} is reserved")]
    ReservedVertexId(String),
    #[error("topology {0} contains a cycle through vertex {1}")]
    CyclicTopology(String, String),
    #[error("topology {0} has not been instantiated")]
    NotInstantiated(String),
    #[error("no such physical node: {0}")]
    UnknownNode(String),
    #[error("assignment has {assignment} entries but the task graph has {subgraphs} sub task graphs")]
    AssignmentOutOfRange { assignment: usize, subgraphs: usize },
    #[error("topology {0} is already deployed")]
    AlreadyDeployed(String),
    #[error("topology {0} is not deployed")]
    TopologyNotDeployed(String),
    #[error("not enough workers available, available: {available}, requested: {requested}")]
    NoCapacity { available: usize, requested: usize },
}

impl Error {
    /// Whether the error stems from a misconfigured cluster or topology.
    ///
    /// Everything except [`Error::NoCapacity`] is a configuration error; a
    /// capacity shortage may go away once other topologies are reclaimed.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Error::NoCapacity { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
