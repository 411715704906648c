//! The road network: nodes, links and lanes stored in arenas.

pub use gtu_type::GtuType;
pub use lane::{Lane, LaneAttributes, LaneType};
pub use link::{Link, LinkType};
pub use node::Node;

use crate::{GtuId, GtuTypeId, LaneId, LaneSet, LinkId, LinkSet, NodeId, NodeSet};
use slotmap::SlotMap;
use smallvec::SmallVec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod gtu_type;
mod lane;
mod link;
mod node;

/// A direction perpendicular to the direction of travel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LateralDirection {
    Left,
    Right,
}

impl LateralDirection {
    /// Gets the opposite direction.
    pub fn flip(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// A road network.
#[derive(Clone, Debug, Default)]
pub struct Network {
    gtu_types: SlotMap<GtuTypeId, GtuType>,
    nodes: NodeSet,
    links: LinkSet,
    lanes: LaneSet,
}

impl Network {
    /// Creates an empty network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a GTU type.
    pub fn add_gtu_type(&mut self, name: &str) -> GtuTypeId {
        self.gtu_types.insert_with_key(|id| GtuType::new(id, name))
    }

    /// Adds a node.
    pub fn add_node(&mut self, name: &str) -> NodeId {
        self.nodes.insert_with_key(|id| Node::new(id, name))
    }

    /// Adds a link from `start` to `end`.
    pub fn add_link(&mut self, start: NodeId, end: NodeId, link_type: LinkType) -> LinkId {
        let link_id = self
            .links
            .insert_with_key(|id| Link::new(id, start, end, link_type));
        self.nodes[start].add_link_out(link_id);
        self.nodes[end].add_link_in(link_id);
        link_id
    }

    /// Adds a lane to the right hand side of a link.
    pub fn add_lane(&mut self, link: LinkId, attributes: &LaneAttributes) -> LaneId {
        let lane_id = self
            .lanes
            .insert_with_key(|id| Lane::new(id, link, attributes));
        self.links[link].add_lane(lane_id, attributes.length);
        lane_id
    }

    /// Specifies that the end of the `from` lane connects to the start of the `to` lane.
    pub fn connect_lanes(&mut self, from: LaneId, to: LaneId) {
        debug_assert_eq!(
            self.links[self.lanes[from].link()].end(),
            self.links[self.lanes[to].link()].start(),
            "connected lanes must meet at a node"
        );
        self.lanes[from].add_next(to);
        self.lanes[to].add_prev(from);
    }

    /// Specifies that `left` and `right` are adjacent lanes on the same link,
    /// and that GTUs may change between them.
    pub fn set_adjacent(&mut self, left: LaneId, right: LaneId) {
        debug_assert_eq!(self.lanes[left].link(), self.lanes[right].link());
        self.lanes[left].set_right(right);
        self.lanes[right].set_left(left);
    }

    /// Gets a reference to the GTU type with the given ID.
    pub fn gtu_type(&self, id: GtuTypeId) -> &GtuType {
        &self.gtu_types[id]
    }

    /// Gets a reference to the node with the given ID.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Gets a reference to the link with the given ID.
    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id]
    }

    /// Gets a reference to the lane with the given ID.
    pub fn lane(&self, id: LaneId) -> &Lane {
        &self.lanes[id]
    }

    /// Gets a reference to the lane with the given ID, if it exists.
    pub fn get_lane(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.get(id)
    }

    /// Returns an iterator over all the nodes in the network.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Returns an iterator over all the links in the network.
    pub fn iter_links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Returns an iterator over all the lanes in the network.
    pub fn iter_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values()
    }

    /// The links leaving a node.
    pub fn links_out(&self, node: NodeId) -> &[LinkId] {
        self.nodes[node].links_out()
    }

    /// The successors of a lane that the GTU type may use.
    /// Empty if the lane ends or only feeds incompatible lanes.
    pub fn next_lanes(&self, lane: LaneId, gtu_type: GtuTypeId) -> SmallVec<[LaneId; 2]> {
        self.compatible(self.lanes[lane].next(), gtu_type)
    }

    /// The predecessors of a lane that the GTU type may use.
    pub fn prev_lanes(&self, lane: LaneId, gtu_type: GtuTypeId) -> SmallVec<[LaneId; 2]> {
        self.compatible(self.lanes[lane].prev(), gtu_type)
    }

    /// The adjacent lane in the given direction, if the GTU type may change into it.
    pub fn accessible_adjacent_lane(
        &self,
        lane: LaneId,
        direction: LateralDirection,
        gtu_type: GtuTypeId,
    ) -> Option<LaneId> {
        let lane = &self.lanes[lane];
        let adjacent = match direction {
            LateralDirection::Left => lane.left(),
            LateralDirection::Right => lane.right(),
        }?;
        self.lanes[adjacent]
            .lane_type()
            .is_compatible(gtu_type)
            .then_some(adjacent)
    }

    /// The lanes of a link that the GTU type may use, ordered left to right.
    pub fn compatible_lanes(&self, link: LinkId, gtu_type: GtuTypeId) -> SmallVec<[LaneId; 8]> {
        self.compatible(self.links[link].lanes(), gtu_type)
    }

    /// The number of lanes of a link that the GTU type may use.
    pub fn compatible_lane_count(&self, link: LinkId, gtu_type: GtuTypeId) -> usize {
        self.links[link]
            .lanes()
            .iter()
            .filter(|id| self.lanes[**id].lane_type().is_compatible(gtu_type))
            .count()
    }

    /// Registers a GTU as an occupant of a lane.
    pub(crate) fn add_gtu(&mut self, lane: LaneId, gtu: GtuId) -> bool {
        self.lanes[lane].add_gtu(gtu)
    }

    /// Removes a GTU from the occupants of a lane.
    pub(crate) fn remove_gtu(&mut self, lane: LaneId, gtu: GtuId) -> bool {
        self.lanes[lane].remove_gtu(gtu)
    }

    fn compatible<A>(&self, lanes: &[LaneId], gtu_type: GtuTypeId) -> SmallVec<A>
    where
        A: smallvec::Array<Item = LaneId>,
    {
        lanes
            .iter()
            .copied()
            .filter(|id| self.lanes[*id].lane_type().is_compatible(gtu_type))
            .collect()
    }
}
