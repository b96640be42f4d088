use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertexKind {
    Source,
    Operator,
    Sink,
}

impl std::fmt::Display for VertexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VertexKind::Source => "source",
            VertexKind::Operator => "operator",
            VertexKind::Sink => "sink",
        };
        write!(f, "{}", name)
    }
}

/// One stage of a logical dataflow.
///
/// The kind is fixed at construction. Sources never receive edges and sinks
/// never emit them, which `Topology::connect` enforces.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    id: String,
    kind: VertexKind,
    /// resource demand, in the same unit as worker capability
    capability: f64,
    /// number of replicas requested
    parallelism: usize,
    outbound: Vec<String>,
    inbound: Vec<String>,
    /// only sources carry an input-rate curve
    rate_distribution: Vec<f64>,
}

impl Vertex {
    pub fn new(kind: VertexKind, id: &str, capability: f64, parallelism: usize) -> Self {
        Vertex {
            id: id.to_owned(),
            kind,
            capability,
            parallelism,
            outbound: Vec::new(),
            inbound: Vec::new(),
            rate_distribution: Vec::new(),
        }
    }

    #[inline]
    pub fn source(id: &str, capability: f64, parallelism: usize) -> Self {
        Self::new(VertexKind::Source, id, capability, parallelism)
    }

    #[inline]
    pub fn operator(id: &str, capability: f64, parallelism: usize) -> Self {
        Self::new(VertexKind::Operator, id, capability, parallelism)
    }

    #[inline]
    pub fn sink(id: &str, capability: f64, parallelism: usize) -> Self {
        Self::new(VertexKind::Sink, id, capability, parallelism)
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn kind(&self) -> VertexKind {
        self.kind
    }

    #[inline]
    pub fn capability(&self) -> f64 {
        self.capability
    }

    #[inline]
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    #[inline]
    pub fn outbound(&self) -> &[String] {
        &self.outbound
    }

    #[inline]
    pub fn inbound(&self) -> &[String] {
        &self.inbound
    }

    #[inline]
    pub fn rate_distribution(&self) -> &[f64] {
        &self.rate_distribution
    }

    /// The input-rate multiplier of a source at a discrete time step.
    pub fn input_rate_at(&self, step: usize) -> Option<f64> {
        self.rate_distribution.get(step).copied()
    }

    pub(crate) fn update_rate_distribution(&mut self, dist: &[f64]) {
        self.rate_distribution = dist.to_vec();
    }

    pub(crate) fn add_outdegree(&mut self, target: &str) {
        debug_assert_ne!(self.kind, VertexKind::Sink);
        self.outbound.push(target.to_owned());
    }

    pub(crate) fn add_indegree(&mut self, source: &str) {
        debug_assert_ne!(self.kind, VertexKind::Source);
        self.inbound.push(source.to_owned());
    }
}

impl std::fmt::Display for Vertex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}",
            self.id, self.capability, self.kind, self.parallelism
        )
    }
}
