use dspsim::config::read_config;
use dspsim::{Cluster, GroupingType, Scheduler, Topology, Vertex, VertexKind};

fn wordcount() -> Topology {
    let mut t = Topology::new("wordcount");
    t.add_source(Vertex::source("source", 24.0, 1)).unwrap();
    t.add_operator(Vertex::operator("split", 16.0, 2)).unwrap();
    t.add_operator(Vertex::operator("count", 10.0, 1)).unwrap();
    t.connect("source", "split", GroupingType::Shuffle).unwrap();
    t.connect("split", "count", GroupingType::Shuffle).unwrap();
    t
}

#[test]
fn linear_topology_partitions_per_replica() {
    logging::init_log();

    let mut t = wordcount();
    let tg = t.instantiate(4).unwrap();

    assert_eq!(tg.len(), 4);
    assert_eq!(tg.replicas_of("source"), 1);
    assert_eq!(tg.replicas_of("split"), 2);
    assert_eq!(tg.replicas_of("count"), 1);

    let ids: Vec<&str> = tg.subgraphs().map(|sg| sg.id()).collect();
    assert_eq!(ids, vec!["source-0", "split-0", "split-1", "count-0"]);
    assert!(tg.subgraphs().all(|sg| sg.topology_id() == "wordcount"));
    assert_eq!(tg.find("source-0").unwrap().kind(), VertexKind::Source);

    let edges: Vec<(&str, &str)> = tg.edges().into_iter().map(|(u, v, _)| (u, v)).collect();
    assert_eq!(
        edges,
        vec![
            ("source-0", "split-0"),
            ("source-0", "split-1"),
            ("split-0", "count-0"),
            ("split-1", "count-0"),
        ]
    );
    assert!(tg
        .edges()
        .iter()
        .all(|&(_, _, g)| g == GroupingType::Shuffle));

    let count = tg.find("count-0").unwrap();
    let upstream: Vec<&str> = count.upstream().iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(upstream, vec!["split-0", "split-1"]);
    assert_eq!(tg.find("source-0").unwrap().downstream().len(), 2);
}

#[test]
fn reinstantiate_replaces_taskgraph() {
    let mut t = wordcount();
    assert_eq!(t.instantiate(4).unwrap().len(), 4);
    assert_eq!(t.instantiate(1).unwrap().len(), 3);
    assert_eq!(t.taskgraph().unwrap().max_num_operators(), 1);
}

#[test]
fn sample_config_runs_end_to_end() {
    logging::init_log();

    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/wordcount.toml");
    let config = read_config(path).unwrap();

    let mut cluster = Cluster::generate(&config.cluster).unwrap();
    let mut topology = config.topology.build().unwrap();
    let expected = topology
        .instantiate(config.topology.max_num_operators)
        .unwrap()
        .len();
    assert_eq!(expected, 5 + 8 + 12);

    let mut scheduler = config.scheduler.build();
    let (placement, outcome) = scheduler.schedule(&topology, &mut cluster).unwrap();
    assert!(outcome.is_complete());
    assert_eq!(placement.0.len(), expected);
    assert_eq!(cluster.available_worker_count(), 250 - expected);

    let (_, outcome) = cluster.reschedule(&topology, scheduler.as_mut()).unwrap();
    assert!(outcome.is_complete());
    assert_eq!(cluster.topology_to_worker()["wordcount"].len(), expected);

    let score = cluster.score("wordcount").unwrap();
    assert!(score.availability > 0.0);
}
