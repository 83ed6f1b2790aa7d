use crate::app::common::MergeResult;
use crate::representation::{DeviceID, Link, Path};
use petgraph::prelude::{EdgeRef, NodeIndex};
use petgraph::stable_graph::StableGraph;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Directed switch graph with per-link cost.
#[derive(Debug, Default)]
pub struct DefaultGraph {
    base: StableGraph<DeviceID, u32>,
    node_index: HashMap<DeviceID, NodeIndex>,
    edge_to_link: HashMap<petgraph::prelude::EdgeIndex, Link>,
    link_to_edge: HashMap<Link, petgraph::prelude::EdgeIndex>,
}

impl DefaultGraph {
    pub fn new() -> DefaultGraph {
        Default::default()
    }

    pub fn add_device(&mut self, device: DeviceID) {
        if self.node_index.contains_key(&device) {
            return;
        }
        let node = self.base.add_node(device);
        self.node_index.insert(device, node);
    }

    pub fn remove_device(&mut self, device: &DeviceID) {
        if let Some(index) = self.node_index.remove(device) {
            self.base.remove_node(index);
            let stale: Vec<Link> = self
                .link_to_edge
                .keys()
                .filter(|l| l.src.device == *device || l.dst.device == *device)
                .copied()
                .collect();
            for link in stale {
                if let Some(edge) = self.link_to_edge.remove(&link) {
                    self.edge_to_link.remove(&edge);
                }
            }
        }
    }

    /// Both endpoints must already be known devices.
    pub fn add_link(&mut self, link: &Link, cost: u32) -> MergeResult<()> {
        if let Some(index) = self.link_to_edge.get(link) {
            if let Some(weight) = self.base.edge_weight_mut(*index) {
                *weight = cost;
            }
            return MergeResult::MERGED;
        }
        let (src, dst) = match (
            self.node_index.get(&link.src.device),
            self.node_index.get(&link.dst.device),
        ) {
            (Some(src), Some(dst)) => (*src, *dst),
            _ => return MergeResult::CONFLICT,
        };
        let index = self.base.add_edge(src, dst, cost);
        self.link_to_edge.insert(*link, index);
        self.edge_to_link.insert(index, *link);
        MergeResult::ADDED(())
    }

    pub fn remove_link(&mut self, link: &Link) {
        if let Some(index) = self.link_to_edge.remove(link) {
            self.edge_to_link.remove(&index);
            self.base.remove_edge(index);
        }
    }

    /// Dijkstra over link costs; zero-cost links are treated as down.
    /// Path costs saturate at `u32::MAX`.
    pub fn get_path(&self, src: DeviceID, dst: DeviceID) -> Option<Path> {
        let src = *self.node_index.get(&src)?;
        let dst = *self.node_index.get(&dst)?;

        let mut dist = HashMap::new();
        dist.insert(src, 0);
        let mut prev = HashMap::new();
        let mut visited = HashSet::with_capacity(self.base.node_count());

        let mut vertx_heap = BinaryHeap::with_capacity(self.base.node_count());
        vertx_heap.push(ReversePrioritywithVertx {
            vertx: src,
            priority: 0,
        });

        while let Some(ReversePrioritywithVertx { vertx, priority }) = vertx_heap.pop() {
            if !visited.insert(vertx) {
                continue;
            }

            for i in self.base.edges(vertx) {
                if *i.weight() != 0 {
                    let new_dist = priority.saturating_add(*i.weight());
                    let target = i.target();
                    let is_shorter = dist
                        .get(&target)
                        .map_or(true, |&current| new_dist < current);

                    if is_shorter {
                        dist.insert(target, new_dist);
                        prev.insert(target, i);
                        vertx_heap.push(ReversePrioritywithVertx {
                            vertx: target,
                            priority: new_dist,
                        })
                    }
                }
            }
        }

        let mut one = *prev.get(&dst)?;
        let mut links = Vec::new();
        let mut weight = 0;
        loop {
            links.push(*self.edge_to_link.get(&one.id())?);
            weight = one.weight().saturating_add(weight);
            if one.source() == src {
                break;
            }
            one = *prev.get(&one.source())?;
        }
        links.reverse();
        Some(Path { links, weight })
    }
}

#[derive(Eq)]
struct ReversePrioritywithVertx {
    pub vertx: NodeIndex,
    pub priority: u32,
}

impl Ord for ReversePrioritywithVertx {
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority.cmp(&self.priority)
    }
}

impl PartialOrd for ReversePrioritywithVertx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ReversePrioritywithVertx {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
