//! node.rs — node definition for the HNSW graph.
//!
//! A node's id is its insertion position, which is also the row of the
//! train matrix it came from.

pub type NodeId = usize;

/// Inline capacity for neighbour selection scratch space.
pub(crate) const MAX_LINKS_PER_LVL: usize = 32;

#[derive(Debug)]
pub struct Node {
    pub(crate) vec: Vec<f32>,
    /// `links[l]` = neighbours on layer `l`; `links.len() - 1` is the node's level.
    pub(crate) links: Vec<Vec<NodeId>>,
}

impl Node {
    pub fn new(level: usize, vec: Vec<f32>) -> Self {
        Self { vec, links: vec![Vec::new(); level + 1] }
    }
}
