//! graph.rs — HNSW graph used by the reference index backend.
//!
//! Insertion is split in two halves so a batch of vectors can be planned
//! concurrently against a frozen graph and then linked one by one:
//!
//! * `plan`: read-only beam search producing neighbour candidates per layer.
//! * `link`: push the node and wire forward/back edges with pruning.

use crate::{
    math::Metric,
    node::{Node, NodeId, MAX_LINKS_PER_LVL},
};

use ordered_float::OrderedFloat;
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

/// Neighbour candidates for one pending insert, `plan[l]` sorted nearest first.
pub type LinkPlan = Vec<Vec<NodeId>>;

/// In-memory HNSW graph.
#[derive(Debug)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub(crate) max_level: usize,
    pub(crate) entry: Option<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), max_level: 0, entry: None }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self { nodes: Vec::with_capacity(n), max_level: 0, entry: None }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Neighbours of `nid` on `layer` (empty slice if absent).
    #[inline]
    fn neighbors(&self, nid: NodeId, layer: usize) -> &[NodeId] {
        match self.nodes.get(nid).and_then(|n| n.links.get(layer)) {
            Some(adj) => adj,
            None => &[],
        }
    }

    /// Insert a vector at `level`. Returns its id.
    pub fn insert<M: Metric>(
        &mut self,
        vec: Vec<f32>,
        level: usize,
        metric: &M,
        m: usize,
        ef_construction: usize,
    ) -> NodeId {
        let plan = self.plan(&vec, level, metric, m, ef_construction);
        self.link(vec, level, &plan, metric, m)
    }

    /// Find link candidates for `vec` without touching the graph.
    pub fn plan<M: Metric>(
        &self,
        vec: &[f32],
        level: usize,
        metric: &M,
        m: usize,
        ef_construction: usize,
    ) -> LinkPlan {
        let mut plan: LinkPlan = vec![Vec::new(); level + 1];
        let Some(mut ep) = self.entry else { return plan; };

        for l in (level + 1..=self.max_level).rev() {
            ep = self.greedy(ep, vec, l, metric);
        }

        let ef = ef_construction.max(m.max(1));
        for l in (0..=level.min(self.max_level)).rev() {
            let cand = self.search_layer(ep, vec, ef, l, metric);
            if let Some(&(closest, _)) = cand.first() {
                ep = closest;
            }
            plan[l] = cand.into_iter().map(|(nid, _)| nid).collect();
        }
        plan
    }

    /// Append a node and connect it using a plan made by `plan`.
    ///
    /// Layer 0 keeps up to `2·m` links, upper layers `m`.
    pub fn link<M: Metric>(
        &mut self,
        vec: Vec<f32>,
        level: usize,
        plan: &LinkPlan,
        metric: &M,
        m: usize,
    ) -> NodeId {
        let node_id = self.nodes.len();
        self.nodes.push(Node::new(level, vec));

        for (l, cand) in plan.iter().enumerate().take(level + 1) {
            if !cand.is_empty() {
                self.connect(node_id, cand, layer_cap(m, l), l, metric);
            }
        }

        if self.entry.is_none() || level > self.max_level {
            self.entry = Some(node_id);
            self.max_level = level;
        }
        node_id
    }

    /// k-NN search, nearest first (returns `(node id, distance)`).
    pub fn knn<M: Metric>(&self, query: &[f32], k: usize, metric: &M, ef: usize) -> Vec<(NodeId, f32)> {
        let Some(mut ep) = self.entry else { return Vec::new(); };
        if k == 0 { return Vec::new(); }

        for l in (1..=self.max_level).rev() {
            ep = self.greedy(ep, query, l, metric);
        }

        let mut cand = self.search_layer(ep, query, ef.max(k), 0, metric);
        cand.truncate(k);
        cand
    }

    /* ---------------- internal helpers ----------------------------------- */

    fn greedy<M: Metric>(&self, mut curr: NodeId, q: &[f32], layer: usize, metric: &M) -> NodeId {
        let mut best = metric.distance(&self.nodes[curr].vec, q);
        loop {
            let mut improved = false;
            for &nb in self.neighbors(curr, layer) {
                let d = metric.distance(&self.nodes[nb].vec, q);
                if d < best {
                    best = d;
                    curr = nb;
                    improved = true;
                }
            }
            if !improved { break; }
        }
        curr
    }

    /// ef-search core; returns `(NodeId, distance)` sorted nearest first.
    fn search_layer<M: Metric>(
        &self, entry: NodeId, query: &[f32], ef: usize, layer: usize, metric: &M,
    ) -> Vec<(NodeId, f32)> {
        let mut visited = HashSet::with_capacity(ef * 4);
        let mut top: BinaryHeap<(OrderedFloat<f32>, NodeId)> = BinaryHeap::new();
        let mut to_visit: BinaryHeap<(Reverse<OrderedFloat<f32>>, NodeId)> = BinaryHeap::new();

        let d0 = metric.distance(&self.nodes[entry].vec, query);
        visited.insert(entry);
        top.push((OrderedFloat(d0), entry));
        to_visit.push((Reverse(OrderedFloat(d0)), entry));

        while let Some((Reverse(OrderedFloat(dc)), curr)) = to_visit.pop() {
            let worst = top.peek().map(|x| x.0.into_inner()).unwrap_or(f32::INFINITY);
            if top.len() >= ef && dc > worst { break; }

            for &nb in self.neighbors(curr, layer) {
                if !visited.insert(nb) { continue; }
                let d = metric.distance(&self.nodes[nb].vec, query);
                let worst = top.peek().map(|x| x.0.into_inner()).unwrap_or(f32::INFINITY);
                if top.len() < ef || d < worst {
                    to_visit.push((Reverse(OrderedFloat(d)), nb));
                    top.push((OrderedFloat(d), nb));
                    if top.len() > ef { top.pop(); }
                }
            }
        }

        let mut out: Vec<(NodeId, f32)> = top.into_iter().map(|(od, nid)| (nid, od.into_inner())).collect();
        out.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        out
    }

    fn connect<M: Metric>(
        &mut self,
        nid: NodeId,
        candidates: &[NodeId],
        cap: usize,
        layer: usize,
        metric: &M,
    ) {
        let ranked: Vec<(NodeId, f32)> = candidates
            .iter()
            .copied()
            .filter(|&c| c != nid)
            .map(|c| (c, metric.distance(&self.nodes[c].vec, &self.nodes[nid].vec)))
            .collect();
        let selected = self.select(nid, &ranked, cap, metric);
        self.nodes[nid].links[layer] = selected.to_vec();

        // Back-edges (selected -> nid)
        for &s in &selected {
            if layer >= self.nodes[s].links.len() {
                self.nodes[s].links.resize(layer + 1, Vec::new());
            }
            let adj = &mut self.nodes[s].links[layer];
            if adj.contains(&nid) { continue; }
            adj.push(nid);
            if adj.len() > cap {
                self.prune(s, layer, cap, metric);
            }
        }
    }

    /// Re-select `nid`'s links on `layer` down to `cap`.
    fn prune<M: Metric>(&mut self, nid: NodeId, layer: usize, cap: usize, metric: &M) {
        let adj = std::mem::take(&mut self.nodes[nid].links[layer]);
        let mut ranked: Vec<(NodeId, f32)> = adj
            .into_iter()
            .filter(|&c| c != nid)
            .map(|c| (c, metric.distance(&self.nodes[c].vec, &self.nodes[nid].vec)))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        self.nodes[nid].links[layer] = self.select(nid, &ranked, cap, metric).to_vec();
    }

    /// HNSW neighbour heuristic over candidates sorted by distance to `base`;
    /// discarded candidates back-fill the list if the heuristic keeps fewer than `cap`.
    fn select<M: Metric>(
        &self,
        base: NodeId,
        ranked: &[(NodeId, f32)],
        cap: usize,
        metric: &M,
    ) -> SmallVec<[NodeId; MAX_LINKS_PER_LVL]> {
        let mut keep = SmallVec::<[NodeId; MAX_LINKS_PER_LVL]>::new();
        let mut skipped = SmallVec::<[NodeId; MAX_LINKS_PER_LVL]>::new();

        for &(c, d_base) in ranked {
            if c == base { continue; }
            if keep.len() >= cap { break; }
            let diverse = keep
                .iter()
                .all(|&s| d_base < metric.distance(&self.nodes[c].vec, &self.nodes[s].vec));
            if diverse { keep.push(c); } else { skipped.push(c); }
        }
        for c in skipped {
            if keep.len() >= cap { break; }
            keep.push(c);
        }
        keep
    }
}

#[inline]
fn layer_cap(m: usize, layer: usize) -> usize {
    if layer == 0 { 2 * m.max(1) } else { m.max(1) }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
