use std::rc::Rc;

use crate::taskgraph::SubTaskGraph;

/// An exclusive execution slot on a physical node.
///
/// A worker runs at most one sub task graph; `graph` is `Some` iff the worker
/// is assigned.
#[derive(Debug, Clone)]
pub struct Worker {
    id: String,
    node_id: String,
    capability: f64,
    graph: Option<Rc<SubTaskGraph>>,
}

impl Worker {
    pub fn new(id: String, node_id: &str, capability: f64) -> Self {
        Worker {
            id,
            node_id: node_id.to_owned(),
            capability,
            graph: None,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The physical node this worker lives on.
    #[inline]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    #[inline]
    pub fn capability(&self) -> f64 {
        self.capability
    }

    #[inline]
    pub fn assigned(&self) -> bool {
        self.graph.is_some()
    }

    #[inline]
    pub fn graph(&self) -> Option<&Rc<SubTaskGraph>> {
        self.graph.as_ref()
    }

    pub fn assign(&mut self, graph: Rc<SubTaskGraph>) {
        self.graph = Some(graph);
    }

    pub fn deassign(&mut self) -> Option<Rc<SubTaskGraph>> {
        self.graph.take()
    }
}

/// A physical machine holding a fixed set of workers.
#[derive(Debug, Clone)]
pub struct PhysicalNode {
    id: String,
    workers: Vec<Worker>,
    rack: Option<String>,
}

impl PhysicalNode {
    pub fn new(id: String, workers: Vec<Worker>) -> Self {
        PhysicalNode {
            id,
            workers,
            rack: None,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    #[inline]
    pub fn rack(&self) -> Option<&str> {
        self.rack.as_deref()
    }

    pub fn set_rack(&mut self, rack: &str) {
        if let Some(old) = &self.rack {
            log::debug!("node {} moves from {} to {}", self.id, old, rack);
        }
        self.rack = Some(rack.to_owned());
    }

    pub fn get_available_worker(&self) -> Vec<&Worker> {
        self.workers.iter().filter(|w| !w.assigned()).collect()
    }

    #[inline]
    pub fn available_count(&self) -> usize {
        self.workers.iter().filter(|w| !w.assigned()).count()
    }

    #[inline]
    pub fn assigned_count(&self) -> usize {
        self.workers.len() - self.available_count()
    }

    pub fn capability(&self) -> f64 {
        self.workers.iter().map(|w| w.capability).sum()
    }

    /// Sum of the capability of unassigned workers.
    pub fn remaining_capability(&self) -> f64 {
        self.workers
            .iter()
            .filter(|w| !w.assigned())
            .map(|w| w.capability)
            .sum()
    }

    /// Bind the sub task graph to the first free worker.
    ///
    /// Returns `None` without touching any worker when the node is full.
    pub fn assign(&mut self, graph: Rc<SubTaskGraph>) -> Option<&Worker> {
        let worker = self.workers.iter_mut().find(|w| !w.assigned())?;
        log::trace!("assign {} to {}/{}", graph.id(), self.id, worker.id);
        worker.assign(graph);
        Some(&*worker)
    }

    /// Release a worker regardless of which topology it currently serves.
    pub fn deassign(&mut self, worker_id: &str) -> Option<Rc<SubTaskGraph>> {
        self.workers
            .iter_mut()
            .find(|w| w.id == worker_id)
            .and_then(|w| w.deassign())
    }
}

impl std::fmt::Display for PhysicalNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.id,
            self.capability(),
            self.rack.as_deref().unwrap_or("-"),
            self.remaining_capability()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taskgraph::SubTaskGraph;
    use crate::vertex::VertexKind;

    fn make_node(nworkers: usize) -> PhysicalNode {
        let workers = (0..nworkers)
            .map(|i| Worker::new(format!("worker-{}", i), "node-0", 100.0))
            .collect();
        PhysicalNode::new("node-0".to_owned(), workers)
    }

    fn make_graph(replica: usize) -> Rc<SubTaskGraph> {
        Rc::new(SubTaskGraph::new("wc", "split", VertexKind::Operator, replica, 16.0))
    }

    #[test]
    fn workers_start_unassigned() {
        let node = make_node(3);
        assert_eq!(node.workers().len(), 3);
        assert!(node.workers().iter().all(|w| !w.assigned() && w.graph().is_none()));
        assert_eq!(node.remaining_capability(), 300.0);
    }

    #[test]
    fn assign_takes_first_free_worker() {
        let mut node = make_node(2);
        let g = make_graph(0);
        let worker_id = node.assign(Rc::clone(&g)).map(|w| w.id().to_owned());
        assert_eq!(worker_id.as_deref(), Some("worker-0"));
        assert_eq!(node.assigned_count(), 1);
        assert_eq!(node.workers()[0].graph(), Some(&g));
        assert_eq!(node.remaining_capability(), 100.0);
    }

    #[test]
    fn assign_to_full_node_changes_nothing() {
        let mut node = make_node(1);
        node.assign(make_graph(0));
        let before: Vec<_> = node.workers().iter().map(|w| w.graph().cloned()).collect();
        assert!(node.assign(make_graph(1)).is_none());
        let after: Vec<_> = node.workers().iter().map(|w| w.graph().cloned()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn deassign_releases_named_worker() {
        let mut node = make_node(2);
        node.assign(make_graph(0));
        node.assign(make_graph(1));
        let released = node.deassign("worker-1");
        assert_eq!(released.map(|g| g.id().to_owned()).as_deref(), Some("split-1"));
        assert_eq!(node.available_count(), 1);
        assert!(node.deassign("worker-1").is_none());
        assert!(node.deassign("worker-9").is_none());
    }
}
