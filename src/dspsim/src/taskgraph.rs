//! The physical form of a topology.
//!
//! Every vertex is replicated `min(parallelism, max_num_operators)` times and
//! each replica becomes one `SubTaskGraph`, the unit that occupies a worker.
//! Logical edges are expanded to replica pairs according to their grouping:
//! `shuffle` and `all` connect every upstream replica to every downstream
//! replica, `global` connects every upstream replica to downstream replica 0.

use std::rc::Rc;

use indexmap::IndexMap;
use petgraph::graph::{Graph, NodeIndex};

use crate::topology::GroupingType;
use crate::vertex::{Vertex, VertexKind};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SubTaskGraph {
    id: String,
    topology_id: String,
    vertex_id: String,
    kind: VertexKind,
    replica: usize,
    capability: f64,
    upstream: Vec<(String, GroupingType)>,
    downstream: Vec<(String, GroupingType)>,
}

impl SubTaskGraph {
    pub fn new(
        topology_id: &str,
        vertex_id: &str,
        kind: VertexKind,
        replica: usize,
        capability: f64,
    ) -> Self {
        SubTaskGraph {
            id: format!("{}-{}", vertex_id, replica),
            topology_id: topology_id.to_owned(),
            vertex_id: vertex_id.to_owned(),
            kind,
            replica,
            capability,
            upstream: Vec::new(),
            downstream: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn topology_id(&self) -> &str {
        &self.topology_id
    }

    #[inline]
    pub fn vertex_id(&self) -> &str {
        &self.vertex_id
    }

    #[inline]
    pub fn kind(&self) -> VertexKind {
        self.kind
    }

    #[inline]
    pub fn replica(&self) -> usize {
        self.replica
    }

    #[inline]
    pub fn capability(&self) -> f64 {
        self.capability
    }

    /// Sub task graphs feeding this one.
    #[inline]
    pub fn upstream(&self) -> &[(String, GroupingType)] {
        &self.upstream
    }

    /// Sub task graphs this one emits to.
    #[inline]
    pub fn downstream(&self) -> &[(String, GroupingType)] {
        &self.downstream
    }
}

impl std::fmt::Display for SubTaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.topology_id, self.id)
    }
}

#[derive(Debug, Clone)]
pub struct TaskGraph {
    topology_id: String,
    max_num_operators: usize,
    graph: Graph<Rc<SubTaskGraph>, GroupingType>,
    node_map: IndexMap<String, NodeIndex>,
}

impl TaskGraph {
    /// Expand the logical vertices and edges into replicas.
    ///
    /// `vertices` must already be in placement order (sources, operators,
    /// sinks); `edges` is iterated in insertion order.
    pub(crate) fn build<'a, I>(
        topology_id: &str,
        vertices: I,
        edges: &IndexMap<(String, String), GroupingType>,
        max_num_operators: usize,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Vertex>,
    {
        if max_num_operators == 0 {
            return Err(Error::InvalidSetting(
                "max_num_operators must be at least 1".to_owned(),
            ));
        }

        let mut subgraphs = Vec::new();
        // vertex id -> positions of its replicas in `subgraphs`
        let mut replicas: IndexMap<&str, Vec<usize>> = IndexMap::new();
        for v in vertices {
            let n = v.parallelism().min(max_num_operators);
            let pos = replicas.entry(v.id()).or_insert_with(Vec::new);
            for r in 0..n {
                pos.push(subgraphs.len());
                subgraphs.push(SubTaskGraph::new(
                    topology_id,
                    v.id(),
                    v.kind(),
                    r,
                    v.capability(),
                ));
            }
        }

        let mut pairs = Vec::new();
        for ((u, v), &grouping) in edges {
            let ups = replicas
                .get(u.as_str())
                .ok_or_else(|| Error::UnknownVertex(u.clone()))?;
            let downs = replicas
                .get(v.as_str())
                .ok_or_else(|| Error::UnknownVertex(v.clone()))?;
            let downs: &[usize] = match grouping {
                GroupingType::Shuffle | GroupingType::All => downs,
                GroupingType::Global => &downs[..downs.len().min(1)],
            };
            for &x in ups {
                for &y in downs {
                    pairs.push((x, y, grouping));
                }
            }
        }

        for &(x, y, grouping) in &pairs {
            let to = subgraphs[y].id.clone();
            let from = subgraphs[x].id.clone();
            subgraphs[x].downstream.push((to, grouping));
            subgraphs[y].upstream.push((from, grouping));
        }

        let mut graph = Graph::new();
        let mut node_map = IndexMap::new();
        for sg in subgraphs {
            let id = sg.id.clone();
            let ix = graph.add_node(Rc::new(sg));
            let old = node_map.insert(id, ix);
            assert!(old.is_none(), "repeated sub task graph in {}", topology_id);
        }
        for (x, y, grouping) in pairs {
            graph.add_edge(NodeIndex::new(x), NodeIndex::new(y), grouping);
        }

        if let Err(cycle) = petgraph::algo::toposort(&graph, None) {
            let culprit = graph[cycle.node_id()].vertex_id().to_owned();
            return Err(Error::CyclicTopology(topology_id.to_owned(), culprit));
        }

        log::debug!(
            "task graph of {}: {} sub task graphs, {} edges",
            topology_id,
            graph.node_count(),
            graph.edge_count()
        );

        Ok(TaskGraph {
            topology_id: topology_id.to_owned(),
            max_num_operators,
            graph,
            node_map,
        })
    }

    #[inline]
    pub fn topology_id(&self) -> &str {
        &self.topology_id
    }

    #[inline]
    pub fn max_num_operators(&self) -> usize {
        self.max_num_operators
    }

    /// Number of sub task graphs, i.e. the number of workers needed.
    #[inline]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn subgraph(&self, idx: usize) -> Option<&Rc<SubTaskGraph>> {
        self.graph.node_weight(NodeIndex::new(idx))
    }

    pub fn subgraphs(&self) -> impl Iterator<Item = &Rc<SubTaskGraph>> {
        self.graph.raw_nodes().iter().map(|n| &n.weight)
    }

    pub fn find(&self, id: &str) -> Option<&Rc<SubTaskGraph>> {
        self.node_map.get(id).map(|&ix| &self.graph[ix])
    }

    /// Position of a sub task graph, the index an assignment refers to.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.node_map.get(id).map(|ix| ix.index())
    }

    pub fn replicas_of(&self, vertex_id: &str) -> usize {
        self.subgraphs()
            .filter(|sg| sg.vertex_id() == vertex_id)
            .count()
    }

    /// All replica edges as (from, to, grouping), in expansion order.
    pub fn edges(&self) -> Vec<(&str, &str, GroupingType)> {
        self.graph
            .raw_edges()
            .iter()
            .map(|e| {
                (
                    self.graph[e.source()].id(),
                    self.graph[e.target()].id(),
                    e.weight,
                )
            })
            .collect()
    }
}
