//! Scores how well a lane serves a GTU's route.
//!
//! A suitability is a distance: the distance within which the GTU should leave the lane
//! in order to stay on its route. Larger is better.

use super::RouteNavigator;
use crate::error::NetworkError;
use crate::network::{LateralDirection, Network};
use crate::{GtuTypeId, LaneId, NodeId};
use smallvec::SmallVec;

/// The suitability of a lane that can be followed for the whole time horizon,
/// or up to a point where the route no longer constrains the choice of lane.
pub const NO_LANE_CHANGE_NEEDED: f64 = f64::MAX;

/// The suitability of a lane that must be left immediately.
pub const GET_OFF_THIS_LANE_NOW: f64 = 0.0;

/// Determines the suitability of being at `position` on `lane` for following the route.
///
/// The network ahead is scanned up to the first branch node within `horizon` seconds of
/// travel at the speed limit. At the branch, the lanes that connect to the route's
/// continuation are scored recursively over the time that remains, and lanes that need
/// `k` lane changes to reach one of them score lower the larger `k` is.
pub fn suitability(
    network: &Network,
    navigator: &RouteNavigator,
    gtu_type: GtuTypeId,
    lane: LaneId,
    position: f64,
    horizon: f64,
) -> Result<f64, NetworkError> {
    let scan = Scan {
        network,
        navigator,
        gtu_type,
    };
    let from = navigator.last_visited_index();
    scan.suitability(lane, position, horizon, from, &mut SmallVec::new())
}

/// Determines the distance to the point where `lane` ends without a successor, following
/// the lane through link boundaries.
///
/// Returns [NO_LANE_CHANGE_NEEDED] if the lane can be followed for longer than `horizon`,
/// up to a split, or up to the edge of the network.
pub fn lane_drop(
    network: &Network,
    gtu_type: GtuTypeId,
    lane: LaneId,
    position: f64,
    horizon: f64,
) -> f64 {
    let start = network.lane(lane);
    let mut remaining = start.length() - position;
    let mut spare = horizon - remaining / start.speed_limit();
    let mut current = lane;
    while spare >= 0.0 {
        match network.next_lanes(current, gtu_type).as_slice() {
            [] => {
                let end = network.link(network.lane(current).link()).end();
                return if network.links_out(end).is_empty() {
                    NO_LANE_CHANGE_NEEDED
                } else {
                    remaining
                };
            }
            [next] => {
                current = *next;
                let lane = network.lane(current);
                spare -= lane.length() / lane.speed_limit();
                remaining += lane.length();
            }
            _ => return NO_LANE_CHANGE_NEEDED,
        }
    }
    NO_LANE_CHANGE_NEEDED
}

/// The nodes passed on the way from the lane being scored, with their index in the route
/// if they are on it; guards against loops.
type Visited = SmallVec<[(NodeId, Option<usize>); 8]>;

struct Scan<'a> {
    network: &'a Network,
    navigator: &'a RouteNavigator,
    gtu_type: GtuTypeId,
}

/// A lane on the link before a branch that connects to the route's continuation.
struct SuitableLane {
    lane: LaneId,
    value: f64,
}

impl Scan<'_> {
    fn suitability(
        &self,
        lane: LaneId,
        position: f64,
        horizon: f64,
        from: usize,
        visited: &mut Visited,
    ) -> Result<f64, NetworkError> {
        let depth = visited.len();
        let result = self.scan(lane, position, horizon, from, visited);
        visited.truncate(depth);
        result
    }

    /// `from` is the route index of the node the lane's link starts at, or of the last
    /// route node passed before it.
    fn scan(
        &self,
        lane: LaneId,
        position: f64,
        horizon: f64,
        mut from: usize,
        visited: &mut Visited,
    ) -> Result<f64, NetworkError> {
        let net = self.network;
        let route = self.navigator.route();
        let start = net.lane(lane);
        let mut remaining = start.length() - position;
        let mut spare = horizon - remaining / start.speed_limit();
        let mut current = lane;
        let mut link = start.link();

        // Find the first branch ahead
        let (node, idx) = loop {
            if spare <= 0.0 {
                return Ok(NO_LANE_CHANGE_NEEDED);
            }
            match net.compatible_lane_count(link, self.gtu_type) {
                0 => return Err(NetworkError::NoCompatibleLanes { link }),
                1 => return Ok(NO_LANE_CHANGE_NEEDED),
                _ => {}
            }
            let node = net.link(link).end();
            let idx = route.index_of(node, from + 1);
            if idx == Some(route.len() - 1) || visited.contains(&(node, idx)) {
                return Ok(NO_LANE_CHANGE_NEEDED);
            }
            visited.push((node, idx));

            let next_link = match net.links_out(node) {
                [] => return Ok(NO_LANE_CHANGE_NEEDED),
                [next_link] => *next_link,
                _ => break (node, idx),
            };
            from = idx.unwrap_or(from);
            if net.next_lanes(current, self.gtu_type).is_empty() {
                current = self.forced_lane_change(current)?;
            }
            let next_lanes = net.next_lanes(current, self.gtu_type);
            current = next_lanes
                .iter()
                .copied()
                .find(|id| net.lane(*id).link() == next_link)
                .unwrap_or(next_lanes[0]);
            let lane = net.lane(current);
            remaining += lane.length();
            spare -= lane.length() / lane.speed_limit();
            link = lane.link();
        };

        // Score the lanes before the branch that lead onto the route
        let idx = idx.ok_or(NetworkError::NotOnRoute { node })?;
        let link_after = self.navigator.link_towards(net, link, idx, self.gtu_type)?;
        let mut suitable = SmallVec::<[SuitableLane; 8]>::new();
        for before in net.compatible_lanes(link, self.gtu_type) {
            for after in net.next_lanes(before, self.gtu_type) {
                if net.lane(after).link() != link_after {
                    continue;
                }
                let value = self.suitability(after, 0.0, spare, idx, visited)?;
                let value = if value == NO_LANE_CHANGE_NEEDED {
                    value
                } else {
                    value + remaining
                };
                match suitable.iter_mut().find(|s| s.lane == before) {
                    Some(s) => s.value = s.value.min(value),
                    None => suitable.push(SuitableLane {
                        lane: before,
                        value,
                    }),
                }
            }
        }
        if suitable.is_empty() {
            return Err(NetworkError::NoConnectingLane {
                from: link,
                to: link_after,
            });
        }
        if let Some(s) = suitable.iter().find(|s| s.lane == current) {
            return Ok(s.value);
        }

        let total = net.compatible_lane_count(link, self.gtu_type);
        let left =
            self.with_lane_changes(current, remaining, &suitable, total, LateralDirection::Left);
        let right =
            self.with_lane_changes(current, remaining, &suitable, total, LateralDirection::Right);
        Ok(left.max(right))
    }

    /// The lane to continue on when `lane` ends before the next link.
    fn forced_lane_change(&self, lane: LaneId) -> Result<LaneId, NetworkError> {
        [LateralDirection::Right, LateralDirection::Left]
            .into_iter()
            .filter_map(|dir| {
                self.network
                    .accessible_adjacent_lane(lane, dir, self.gtu_type)
            })
            .find(|adj| !self.network.next_lanes(*adj, self.gtu_type).is_empty())
            .ok_or(NetworkError::LaneEnds { lane })
    }

    /// Scores a lane from which lane changes in `direction` are needed to reach a suitable lane.
    ///
    /// The score decreases linearly with the number of lane changes, relative to the
    /// number of unsuitable lanes on the link.
    fn with_lane_changes(
        &self,
        start: LaneId,
        remaining: f64,
        suitable: &[SuitableLane],
        total: usize,
        direction: LateralDirection,
    ) -> f64 {
        let mut lane = start;
        let mut changes = 0;
        let value = loop {
            changes += 1;
            match self
                .network
                .accessible_adjacent_lane(lane, direction, self.gtu_type)
            {
                Some(adjacent) => lane = adjacent,
                None => return GET_OFF_THIS_LANE_NOW,
            }
            if let Some(s) = suitable.iter().find(|s| s.lane == lane) {
                break s.value;
            }
        };
        let fraction = if value == NO_LANE_CHANGE_NEEDED { 0.0 } else { 0.5 };
        let unsuitable = total.saturating_sub(suitable.len()) as f64;
        remaining * (unsuitable - changes as f64 + 1.0 + fraction) / (unsuitable + fraction)
    }
}
