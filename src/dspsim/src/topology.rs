use indexmap::IndexMap;
use petgraph::graph::Graph;
use serde::{Deserialize, Serialize};

use crate::taskgraph::TaskGraph;
use crate::vertex::{Vertex, VertexKind};
use crate::workload::{self, WorkloadSetting};
use crate::{Error, Result};

/// Key of the adjacency entry listing every source.
pub const ROOT: &str = "root";

/// How a producer's output is partitioned across a consumer's replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingType {
    Shuffle,
    All,
    Global,
}

impl std::str::FromStr for GroupingType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shuffle" => Ok(GroupingType::Shuffle),
            "all" => Ok(GroupingType::All),
            "global" => Ok(GroupingType::Global),
            _ => Err(Error::UnknownGrouping(s.to_owned())),
        }
    }
}

impl std::fmt::Display for GroupingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GroupingType::Shuffle => "shuffle",
            GroupingType::All => "all",
            GroupingType::Global => "global",
        };
        write!(f, "{}", name)
    }
}

/// A logical dataflow DAG of sources, operators and sinks.
#[derive(Debug, Clone)]
pub struct Topology {
    id: String,
    /// registration order is kept, it decides the order of sub task graphs
    vertices: IndexMap<String, Vertex>,
    edges: IndexMap<(String, String), GroupingType>,
    /// adjacency index, `ROOT` lists all sources
    graph: IndexMap<String, Vec<String>>,
    workload: WorkloadSetting,
    workload_dist: Vec<f64>,
    taskgraph: Option<TaskGraph>,
}

impl Topology {
    /// Create a topology with the default two-step workload.
    pub fn new(id: &str) -> Self {
        Self::with_workload(id, WorkloadSetting::default())
    }

    pub fn with_workload(id: &str, workload: WorkloadSetting) -> Self {
        let mut graph = IndexMap::new();
        graph.insert(ROOT.to_owned(), Vec::new());
        Topology {
            id: id.to_owned(),
            vertices: IndexMap::new(),
            edges: IndexMap::new(),
            graph,
            workload,
            workload_dist: workload::generate(&workload),
            taskgraph: None,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn workload(&self) -> &WorkloadSetting {
        &self.workload
    }

    #[inline]
    pub fn workload_dist(&self) -> &[f64] {
        &self.workload_dist
    }

    #[inline]
    pub fn edges(&self) -> &IndexMap<(String, String), GroupingType> {
        &self.edges
    }

    #[inline]
    pub fn graph(&self) -> &IndexMap<String, Vec<String>> {
        &self.graph
    }

    #[inline]
    pub fn taskgraph(&self) -> Option<&TaskGraph> {
        self.taskgraph.as_ref()
    }

    pub fn vertex(&self, id: &str) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn sources(&self) -> impl Iterator<Item = &Vertex> {
        self.of_kind(VertexKind::Source)
    }

    pub fn operators(&self) -> impl Iterator<Item = &Vertex> {
        self.of_kind(VertexKind::Operator)
    }

    pub fn sinks(&self) -> impl Iterator<Item = &Vertex> {
        self.of_kind(VertexKind::Sink)
    }

    fn of_kind(&self, kind: VertexKind) -> impl Iterator<Item = &Vertex> {
        self.vertices.values().filter(move |v| v.kind() == kind)
    }

    fn is_kind(&self, vertex_id: &str, kind: VertexKind) -> bool {
        self.vertices
            .get(vertex_id)
            .map_or(false, |v| v.kind() == kind)
    }

    pub fn is_source(&self, vertex_id: &str) -> bool {
        self.is_kind(vertex_id, VertexKind::Source)
    }

    pub fn is_operator(&self, vertex_id: &str) -> bool {
        self.is_kind(vertex_id, VertexKind::Operator)
    }

    pub fn is_sink(&self, vertex_id: &str) -> bool {
        self.is_kind(vertex_id, VertexKind::Sink)
    }

    /// Register a source; it receives the topology's workload curve.
    pub fn add_source(&mut self, mut source: Vertex) -> Result<()> {
        source.update_rate_distribution(&self.workload_dist);
        self.add_vertex(VertexKind::Source, source)
    }

    pub fn add_operator(&mut self, operator: Vertex) -> Result<()> {
        self.add_vertex(VertexKind::Operator, operator)
    }

    pub fn add_sink(&mut self, sink: Vertex) -> Result<()> {
        self.add_vertex(VertexKind::Sink, sink)
    }

    fn add_vertex(&mut self, expected: VertexKind, vertex: Vertex) -> Result<()> {
        if vertex.kind() != expected {
            return Err(Error::VertexKindMismatch {
                id: vertex.id().to_owned(),
                expected,
                found: vertex.kind(),
            });
        }

        if self.vertices.contains_key(vertex.id()) {
            log::warn!(
                "vertex {} already exists in {}, ignored",
                vertex.id(),
                self.id
            );
            return Ok(());
        }

        if vertex.id() == ROOT {
            return Err(Error::ReservedVertexId(ROOT.to_owned()));
        }

        if vertex.parallelism() == 0 {
            return Err(Error::InvalidSetting(format!(
                "parallelism of vertex {} must be at least 1",
                vertex.id()
            )));
        }

        let id = vertex.id().to_owned();
        if expected == VertexKind::Source {
            self.graph[ROOT].push(id.clone());
        }
        self.graph.insert(id.clone(), Vec::new());
        self.vertices.insert(id, vertex);
        Ok(())
    }

    /// Connect two registered vertices.
    ///
    /// The requested grouping is overridden in two cases: an edge leaving a
    /// source is always `Shuffle`, and an edge entering a sink is always
    /// `Global` (the latter wins for a source-to-sink edge). Connecting the
    /// same pair twice is a no-op.
    pub fn connect(&mut self, source: &str, target: &str, grouping: GroupingType) -> Result<()> {
        let src_kind = self
            .vertices
            .get(source)
            .map(|v| v.kind())
            .ok_or_else(|| Error::UnknownVertex(source.to_owned()))?;
        let dst_kind = self
            .vertices
            .get(target)
            .map(|v| v.kind())
            .ok_or_else(|| Error::UnknownVertex(target.to_owned()))?;

        if dst_kind == VertexKind::Source {
            return Err(Error::InvalidTarget(target.to_owned()));
        }
        if src_kind == VertexKind::Sink {
            return Err(Error::InvalidSource(source.to_owned()));
        }

        let mut grouping = grouping;
        if src_kind == VertexKind::Source && grouping != GroupingType::Shuffle {
            log::warn!(
                "edge ({}, {}) leaves a source, grouping {} is replaced by shuffle",
                source,
                target,
                grouping
            );
            grouping = GroupingType::Shuffle;
        }
        if dst_kind == VertexKind::Sink && grouping != GroupingType::Global {
            log::warn!(
                "edge ({}, {}) enters a sink, grouping {} is replaced by global",
                source,
                target,
                grouping
            );
            grouping = GroupingType::Global;
        }

        let edge = (source.to_owned(), target.to_owned());
        if self.edges.contains_key(&edge) {
            log::warn!("edge ({}, {}) already exists in {}", source, target, self.id);
            return Ok(());
        }

        self.graph[source].push(target.to_owned());
        self.vertices[source].add_outdegree(target);
        self.vertices[target].add_indegree(source);
        self.edges.insert(edge, grouping);
        Ok(())
    }

    /// Operator successors of a vertex, in connection order.
    pub fn get_target(&self, vertex_id: &str) -> Vec<&str> {
        self.edges
            .keys()
            .filter(|(u, v)| u == vertex_id && self.is_operator(v))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Vertex ids in a topological order of the logical graph.
    pub fn vertex_order(&self) -> Result<Vec<&str>> {
        let mut g: Graph<&str, ()> = Graph::new();
        let ixs: IndexMap<&str, _> = self
            .vertices
            .keys()
            .map(|id| (id.as_str(), g.add_node(id.as_str())))
            .collect();
        for (u, v) in self.edges.keys() {
            g.add_edge(ixs[u.as_str()], ixs[v.as_str()], ());
        }
        petgraph::algo::toposort(&g, None)
            .map(|order| order.into_iter().map(|ix| g[ix]).collect())
            .map_err(|cycle| Error::CyclicTopology(self.id.clone(), g[cycle.node_id()].to_owned()))
    }

    /// Build the task graph, replicating every vertex up to its parallelism
    /// hint but no more than `max_num_operators` times.
    pub fn instantiate(&mut self, max_num_operators: usize) -> Result<&TaskGraph> {
        let ordered = self
            .sources()
            .chain(self.operators())
            .chain(self.sinks());
        let taskgraph = TaskGraph::build(&self.id, ordered, &self.edges, max_num_operators)?;
        log::info!(
            "instantiated {} into {} sub task graphs",
            self.id,
            taskgraph.len()
        );
        Ok(&*self.taskgraph.insert(taskgraph))
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} Topology {} {}", "=".repeat(25), self.id, "=".repeat(25))?;
        for v in self.sources().chain(self.operators()).chain(self.sinks()) {
            writeln!(f, "{}", v)?;
        }
        for ((u, v), grouping) in &self.edges {
            writeln!(f, "({}, {}): {}", u, v, grouping)?;
        }
        write!(f, "{}", "=".repeat(50))
    }
}
