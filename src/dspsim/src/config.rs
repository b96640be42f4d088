use serde::{Deserialize, Serialize};

use crate::cluster::ClusterSetting;
use crate::scheduler::{GreedyScheduler, RoundRobinScheduler, Scheduler};
use crate::topology::{GroupingType, Topology};
use crate::vertex::{Vertex, VertexKind};
use crate::workload::WorkloadSetting;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VertexSpec {
    pub id: String,
    pub kind: VertexKind,
    /// Resource demand of every replica
    pub capability: f64,
    /// Number of replicas requested
    pub parallelism: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeSpec {
    pub source: String,
    pub target: String,
    /// One of "shuffle", "all", "global"
    pub grouping: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologySpec {
    pub name: String,
    /// Upper bound on the replicas of a single vertex
    pub max_num_operators: usize,
    /// Input-rate curve of the sources; default twostep over 900 steps
    #[serde(default)]
    pub workload: WorkloadSetting,
    #[serde(rename = "vertex")]
    pub vertices: Vec<VertexSpec>,
    #[serde(rename = "edge", default)]
    pub edges: Vec<EdgeSpec>,
}

impl TopologySpec {
    /// Register every vertex and edge with the same checks as programmatic
    /// construction. The result is not instantiated yet.
    pub fn build(&self) -> crate::Result<Topology> {
        let mut topology = Topology::with_workload(&self.name, self.workload);
        for v in &self.vertices {
            let vertex = Vertex::new(v.kind, &v.id, v.capability, v.parallelism);
            match v.kind {
                VertexKind::Source => topology.add_source(vertex)?,
                VertexKind::Operator => topology.add_operator(vertex)?,
                VertexKind::Sink => topology.add_sink(vertex)?,
            }
        }
        for e in &self.edges {
            let grouping: GroupingType = e.grouping.parse()?;
            topology.connect(&e.source, &e.target, grouping)?;
        }
        Ok(topology)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args")]
pub enum SchedulerPolicy {
    RoundRobin,
    Greedy {
        availability_weight: f64,
        response_time_weight: f64,
    },
}

impl SchedulerPolicy {
    pub fn build(&self) -> Box<dyn Scheduler> {
        match *self {
            SchedulerPolicy::RoundRobin => Box::new(RoundRobinScheduler::new()),
            SchedulerPolicy::Greedy {
                availability_weight,
                response_time_weight,
            } => Box::new(GreedyScheduler::new(
                availability_weight,
                response_time_weight,
            )),
        }
    }
}

fn default_reschedule_rounds() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    /// Cluster settings
    pub cluster: ClusterSetting,

    /// The topology to deploy
    pub topology: TopologySpec,

    /// Placement policy
    pub scheduler: SchedulerPolicy,

    /// Number of reclaim and reschedule rounds after the first placement; default 1
    #[serde(default = "default_reschedule_rounds")]
    pub reschedule_rounds: usize,

    /// Environment variables
    #[serde(default)]
    pub envs: toml::value::Table,
}

pub fn parse_config(content: &str) -> anyhow::Result<ExperimentConfig> {
    Ok(toml::from_str(content)?)
}

pub fn read_config<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<ExperimentConfig> {
    use anyhow::Context;
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("fail to open file: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("parse failed: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterLayout;
    use crate::workload::WorkloadShape;
    use crate::Error;

    const WORDCOUNT: &str = r#"
[cluster]
seed = 1

[cluster.layout]
type = "Random"
args = { max_node = 50, max_rack = 5, max_worker = 5, nodes_per_rack = 10 }

[topology]
name = "wordcount"
max_num_operators = 4
workload = { shape = "constant", step = 10 }

[[topology.vertex]]
id = "source"
kind = "source"
capability = 24.0
parallelism = 5

[[topology.vertex]]
id = "split"
kind = "operator"
capability = 16.0
parallelism = 8

[[topology.edge]]
source = "source"
target = "split"
grouping = "all"

[scheduler]
type = "Greedy"
args = { availability_weight = 1.0, response_time_weight = 0.5 }
"#;

    #[test]
    fn parse_wordcount() {
        let config = parse_config(WORDCOUNT).unwrap();
        assert_eq!(config.cluster.worker_capability, 100.0);
        assert_eq!(
            config.cluster.layout,
            ClusterLayout::Random {
                max_node: 50,
                max_rack: 5,
                max_worker: 5,
                nodes_per_rack: 10
            }
        );
        assert_eq!(config.topology.workload.shape, WorkloadShape::Constant);
        assert_eq!(config.topology.vertices.len(), 2);
        assert_eq!(config.reschedule_rounds, 1);
        assert!(matches!(config.scheduler, SchedulerPolicy::Greedy { .. }));
        assert_eq!(config.scheduler.build().name(), "greedy");

        let mut topology = config.topology.build().unwrap();
        // leaving a source forces shuffle
        assert_eq!(
            topology.edges()[&("source".to_owned(), "split".to_owned())],
            GroupingType::Shuffle
        );
        let tg = topology.instantiate(config.topology.max_num_operators).unwrap();
        assert_eq!(tg.len(), 8);
    }

    #[test]
    fn unit_policy_and_fixed_layout() {
        let content = r#"
[cluster]
seed = 0
worker_capability = 50.0
layout = { type = "Fixed", args = { nracks = 2, rack_size = 4, max_worker = 2 } }

[topology]
name = "t"
max_num_operators = 2
vertex = [{ id = "s", kind = "source", capability = 1.0, parallelism = 1 }]

[scheduler]
type = "RoundRobin"
"#;
        let config = parse_config(content).unwrap();
        assert_eq!(config.scheduler, SchedulerPolicy::RoundRobin);
        assert_eq!(config.topology.workload, WorkloadSetting::default());
        assert!(config.topology.edges.is_empty());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let content = WORDCOUNT.replace("seed = 1", "seed = 1\ncolour = \"blue\"");
        assert!(parse_config(&content).is_err());
    }

    #[test]
    fn bad_grouping_surfaces() {
        let content = WORDCOUNT.replace("grouping = \"all\"", "grouping = \"fields\"");
        let config = parse_config(&content).unwrap();
        assert_eq!(
            config.topology.build().unwrap_err(),
            Error::UnknownGrouping("fields".to_owned())
        );
    }

    #[test]
    fn missing_file() {
        assert!(read_config("/nonexistent/dspsim.toml").is_err());
    }
}
