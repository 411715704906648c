use crate::{LinkId, NodeId};
use smallvec::SmallVec;

/// A node in the road network, where links start and end.
#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    links_in: SmallVec<[LinkId; 4]>,
    links_out: SmallVec<[LinkId; 4]>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            links_in: SmallVec::new(),
            links_out: SmallVec::new(),
        }
    }

    /// Gets the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Gets the node's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The links that end at this node.
    pub fn links_in(&self) -> &[LinkId] {
        &self.links_in
    }

    /// The links that start at this node.
    pub fn links_out(&self) -> &[LinkId] {
        &self.links_out
    }

    /// Whether there is more than one way to leave this node.
    pub fn is_branch(&self) -> bool {
        self.links_out.len() > 1
    }

    pub(crate) fn add_link_in(&mut self, link: LinkId) {
        self.links_in.push(link);
    }

    pub(crate) fn add_link_out(&mut self, link: LinkId) {
        self.links_out.push(link);
    }
}
