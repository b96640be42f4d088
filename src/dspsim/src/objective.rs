//! Availability and network-proximity objectives.
//!
//! A placement is a list of physical nodes, one entry per occupied worker, so
//! a node hosting two sub task graphs appears twice. Raw scores are normalised
//! against bounds calibrated on the whole worker population of a cluster.

use fnv::FnvHashSet as HashSet;

use crate::node::PhysicalNode;

/// Availability of a single physical node, in percent.
pub const NODE_AVAILABILITY: f64 = 97.0;
/// Availability of a rack, in percent.
pub const RACK_AVAILABILITY: f64 = 99.0;
/// Bandwidth between a host and its ToR switch, in Gbps.
pub const HOST_BANDWIDTH: f64 = 1.2;
/// Bandwidth between a ToR switch and the core, in Gbps.
pub const RACK_BANDWIDTH: f64 = 1.0;

/// Network distance between the workers of two nodes.
///
/// Co-located workers cost nothing. Within a rack the path is
/// host → ToR → host; across racks it also climbs to the core and back.
pub fn get_network_distance(a: &PhysicalNode, b: &PhysicalNode) -> f64 {
    if a.id() == b.id() {
        return 0.0;
    }
    let intra_rack = 2.0 / HOST_BANDWIDTH;
    match (a.rack(), b.rack()) {
        (Some(ra), Some(rb)) if ra == rb => intra_rack,
        _ => intra_rack + 2.0 / RACK_BANDWIDTH,
    }
}

/// Grows with the number of independent nodes and racks involved.
pub fn availability(placement: &[&PhysicalNode]) -> f64 {
    if placement.is_empty() {
        return 0.0;
    }
    let nodes: HashSet<&str> = placement.iter().map(|n| n.id()).collect();
    let racks: HashSet<Option<&str>> = placement.iter().map(|n| n.rack()).collect();
    nodes.len() as f64 * NODE_AVAILABILITY.ln()
        + (racks.len() - 1) as f64 * RACK_AVAILABILITY.ln()
}

/// Sum of network distances over every unordered pair of the placement.
pub fn topology_network_distance(placement: &[&PhysicalNode]) -> f64 {
    let mut total = 0.0;
    for (i, a) in placement.iter().enumerate() {
        for b in &placement[i + 1..] {
            total += get_network_distance(a, b);
        }
    }
    total
}

/// Normalisation bounds for the objectives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub availability_min: f64,
    pub availability_max: f64,
    pub response_time_min: f64,
    pub response_time_max: f64,
}

impl Calibration {
    /// The minimum bounds are fixed: a single node for availability and two
    /// intra-rack hops for response time. The maximum bounds come from
    /// spreading over every worker of the cluster.
    pub fn from_nodes(nodes: &[PhysicalNode]) -> Self {
        let workers: Vec<&PhysicalNode> = nodes
            .iter()
            .flat_map(|n| std::iter::repeat(n).take(n.workers().len()))
            .collect();
        Calibration {
            availability_min: NODE_AVAILABILITY.ln(),
            availability_max: availability(&workers),
            response_time_min: 2.0 * (1.0 / HOST_BANDWIDTH + 1.0 / HOST_BANDWIDTH),
            response_time_max: topology_network_distance(&workers),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveScore {
    pub availability: f64,
    pub response_time: f64,
}

impl ObjectiveScore {
    /// Higher is better: availability is rewarded, response time penalised.
    pub fn weighted(&self, availability_weight: f64, response_time_weight: f64) -> f64 {
        availability_weight * self.availability - response_time_weight * self.response_time
    }
}

/// Scores placements against the bounds of one cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Objective {
    calibration: Calibration,
}

impl Objective {
    pub fn new(calibration: Calibration) -> Self {
        Objective { calibration }
    }

    #[inline]
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// `(raw - min) / (max - min)`, not clamped to [0, 1].
    pub fn normalize(raw: f64, min: f64, max: f64) -> f64 {
        let span = max - min;
        if span == 0.0 {
            0.0
        } else {
            (raw - min) / span
        }
    }

    pub fn availability(&self, placement: &[&PhysicalNode]) -> f64 {
        let c = &self.calibration;
        Self::normalize(
            availability(placement),
            c.availability_min,
            c.availability_max,
        )
    }

    pub fn response_time(&self, placement: &[&PhysicalNode]) -> f64 {
        let c = &self.calibration;
        Self::normalize(
            topology_network_distance(placement),
            c.response_time_min,
            c.response_time_max,
        )
    }

    pub fn score(&self, placement: &[&PhysicalNode]) -> ObjectiveScore {
        ObjectiveScore {
            availability: self.availability(placement),
            response_time: self.response_time(placement),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Worker;

    fn make_node(id: &str, rack: &str, nworkers: usize) -> PhysicalNode {
        let workers = (0..nworkers)
            .map(|i| Worker::new(format!("{}-w{}", id, i), id, 100.0))
            .collect();
        let mut node = PhysicalNode::new(id.to_owned(), workers);
        node.set_rack(rack);
        node
    }

    #[test]
    fn distance_is_rack_aware() {
        let a = make_node("a", "rack-0", 1);
        let b = make_node("b", "rack-0", 1);
        let c = make_node("c", "rack-1", 1);
        assert_eq!(get_network_distance(&a, &a), 0.0);
        assert!(get_network_distance(&a, &b) < get_network_distance(&a, &c));
        assert_eq!(get_network_distance(&a, &c), get_network_distance(&c, &a));
    }

    #[test]
    fn availability_counts_independent_resources() {
        let a = make_node("a", "rack-0", 2);
        let b = make_node("b", "rack-0", 2);
        let c = make_node("c", "rack-1", 2);
        assert_eq!(availability(&[]), 0.0);
        assert_eq!(availability(&[&a]), NODE_AVAILABILITY.ln());
        assert_eq!(availability(&[&a, &a]), NODE_AVAILABILITY.ln());
        assert!(availability(&[&a, &b]) > availability(&[&a, &a]));
        assert!(availability(&[&a, &c]) > availability(&[&a, &b]));
    }

    #[test]
    fn pairwise_distance_sum() {
        let a = make_node("a", "rack-0", 1);
        let b = make_node("b", "rack-0", 1);
        let c = make_node("c", "rack-1", 1);
        let expected = get_network_distance(&a, &b)
            + get_network_distance(&a, &c)
            + get_network_distance(&b, &c);
        assert!((topology_network_distance(&[&a, &b, &c]) - expected).abs() < 1e-9);
        assert_eq!(topology_network_distance(&[&a]), 0.0);
    }

    #[test]
    fn calibration_spans_all_workers() {
        let nodes = vec![
            make_node("a", "rack-0", 2),
            make_node("b", "rack-0", 2),
            make_node("c", "rack-1", 2),
            make_node("d", "rack-1", 2),
        ];
        let calib = Calibration::from_nodes(&nodes);
        assert_eq!(calib.availability_min, NODE_AVAILABILITY.ln());
        assert_eq!(
            calib.availability_max,
            4.0 * NODE_AVAILABILITY.ln() + RACK_AVAILABILITY.ln()
        );
        assert!(calib.response_time_max > calib.response_time_min);

        let obj = Objective::new(calib);
        let all: Vec<&PhysicalNode> = nodes.iter().collect();
        assert!((obj.availability(&all) - 1.0).abs() < 1e-9);
        assert_eq!(obj.availability(&all[..1]), 0.0);
    }

    #[test]
    fn normalisation_is_not_clamped() {
        assert_eq!(Objective::normalize(3.0, 1.0, 2.0), 2.0);
        assert_eq!(Objective::normalize(0.0, 1.0, 2.0), -1.0);
        assert_eq!(Objective::normalize(5.0, 1.0, 1.0), 0.0);
    }
}
