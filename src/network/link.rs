use crate::{LaneId, LinkId, NodeId};
use smallvec::SmallVec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A directed road segment between two nodes.
#[derive(Clone, Debug)]
pub struct Link {
    id: LinkId,
    start: NodeId,
    end: NodeId,
    link_type: LinkType,
    /// The lanes of the link, ordered left to right.
    lanes: SmallVec<[LaneId; 4]>,
    /// The length of the longest lane in m.
    length: f64,
}

/// The kind of a [Link].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkType {
    /// An ordinary road link.
    #[default]
    Ordinary,
    /// A connector between the road network and a traffic centroid.
    Connector,
}

impl Link {
    pub(crate) fn new(id: LinkId, start: NodeId, end: NodeId, link_type: LinkType) -> Self {
        Self {
            id,
            start,
            end,
            link_type,
            lanes: SmallVec::new(),
            length: 0.0,
        }
    }

    /// Gets the link's ID.
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// The node the link starts at.
    pub fn start(&self) -> NodeId {
        self.start
    }

    /// The node the link ends at.
    pub fn end(&self) -> NodeId {
        self.end
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// The lanes of the link, ordered left to right.
    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }

    /// The length of the link in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub(crate) fn add_lane(&mut self, lane: LaneId, length: f64) {
        self.lanes.push(lane);
        self.length = self.length.max(length);
    }
}
