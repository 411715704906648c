//! Perception of the traffic around a GTU.

use super::following::Headway;
use crate::network::Network;
use crate::{GtuId, GtuSet, GtuTypeId, LaneId};
use itertools::Itertools;
use once_cell::unsync::OnceCell;
use smallvec::SmallVec;

/// The traffic on one lane as perceived by a GTU during a single evaluation.
#[derive(Clone, Debug, Default)]
pub struct LaneTraffic {
    /// Perceived vehicles, sorted by distance.
    headways: Vec<Headway>,
    /// The anticipated speed, computed on first use.
    anticipated_speed: OnceCell<f64>,
}

impl LaneTraffic {
    /// Creates the perceived traffic on a lane from headways in any order.
    pub fn new(mut headways: Vec<Headway>) -> Self {
        headways.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Self {
            headways,
            anticipated_speed: OnceCell::new(),
        }
    }

    /// All perceived vehicles, sorted by distance.
    pub fn headways(&self) -> &[Headway] {
        &self.headways
    }

    /// The nearest vehicle entirely ahead.
    pub fn leader(&self) -> Option<&Headway> {
        self.headways.iter().find(|h| h.is_ahead())
    }

    /// The nearest vehicle entirely behind a subject of the given length.
    pub fn follower(&self, own_length: f64) -> Option<&Headway> {
        self.headways.iter().rev().find(|h| h.is_behind(own_length))
    }

    /// Adds a stationary obstacle, such as the end of a lane.
    pub fn add_obstacle(&mut self, distance: f64) {
        let idx = self.headways.partition_point(|h| h.distance < distance);
        self.headways.insert(idx, Headway::new(distance, 0.0, 0.0));
        self.anticipated_speed = OnceCell::new();
    }

    /// The speed a driver expects to reach on this lane.
    ///
    /// Only the first call computes the value; the arguments must not change
    /// during an evaluation.
    pub fn anticipated_speed(&self, own_length: f64, desired_speed: f64, x0: f64) -> f64 {
        *self.anticipated_speed.get_or_init(|| {
            super::lane_change::anticipated_speed(&self.headways, own_length, desired_speed, x0)
        })
    }
}

/// Collects the vehicles around a position in the network.
pub struct Perception<'a> {
    network: &'a Network,
    gtus: &'a GtuSet,
    gtu_type: GtuTypeId,
    /// The perceiving GTU, which does not perceive itself.
    own: Option<GtuId>,
    own_length: f64,
    now: f64,
    forward: f64,
    reverse: f64,
}

impl<'a> Perception<'a> {
    /// Creates a perception for a vehicle of the given type and length.
    ///
    /// # Parameters
    /// * `forward` - The maximum distance to a leader's rear, in m.
    /// * `reverse` - The maximum gap to a follower's front, in m.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        network: &'a Network,
        gtus: &'a GtuSet,
        gtu_type: GtuTypeId,
        own: Option<GtuId>,
        own_length: f64,
        now: f64,
        forward: f64,
        reverse: f64,
    ) -> Self {
        Self {
            network,
            gtus,
            gtu_type,
            own,
            own_length,
            now,
            forward,
            reverse,
        }
    }

    /// Perceives the traffic on a lane from a front position on it.
    ///
    /// Leaders are searched through successor lanes, followers through predecessor lanes.
    /// A vehicle registered on several lanes is reported once.
    pub fn lane_traffic(&self, lane: LaneId, front: f64) -> LaneTraffic {
        let mut headways = vec![];
        let mut visited = SmallVec::<[LaneId; 8]>::new();
        self.collect(lane, -front, &mut headways);
        visited.push(lane);
        self.search_forward(lane, -front, &mut headways, &mut visited);
        self.search_backward(lane, -front, &mut headways, &mut visited);

        headways.sort_by(|a, b| a.distance.abs().total_cmp(&b.distance.abs()));
        let headways = headways.into_iter().unique_by(|h| h.gtu).collect();
        LaneTraffic::new(headways)
    }

    fn search_forward(
        &self,
        lane: LaneId,
        offset: f64,
        headways: &mut Vec<Headway>,
        visited: &mut SmallVec<[LaneId; 8]>,
    ) {
        let offset = offset + self.network.lane(lane).length();
        if offset > self.forward {
            return;
        }
        for next in self.network.next_lanes(lane, self.gtu_type) {
            if visited.contains(&next) {
                continue;
            }
            visited.push(next);
            self.collect(next, offset, headways);
            self.search_forward(next, offset, headways, visited);
        }
    }

    fn search_backward(
        &self,
        lane: LaneId,
        offset: f64,
        headways: &mut Vec<Headway>,
        visited: &mut SmallVec<[LaneId; 8]>,
    ) {
        if offset < -(self.own_length + self.reverse) {
            return;
        }
        for prev in self.network.prev_lanes(lane, self.gtu_type) {
            if visited.contains(&prev) {
                continue;
            }
            visited.push(prev);
            let offset = offset - self.network.lane(prev).length();
            self.collect(prev, offset, headways);
            self.search_backward(prev, offset, headways, visited);
        }
    }

    /// Adds the vehicles within range on a lane whose start is `offset` from the subject's front.
    fn collect(&self, lane: LaneId, offset: f64, headways: &mut Vec<Headway>) {
        for id in self.network.lane(lane).gtus() {
            if Some(*id) == self.own {
                continue;
            }
            let Some(gtu) = self.gtus.get(*id) else {
                continue;
            };
            let Ok(front) = gtu.position(lane, self.now) else {
                continue;
            };
            let distance = offset + front - gtu.length();
            let min_distance = -(self.reverse + self.own_length + gtu.length());
            if distance <= self.forward && distance >= min_distance {
                headways.push(Headway {
                    distance,
                    speed: gtu.speed_at(self.now),
                    length: gtu.length(),
                    gtu: Some(*id),
                });
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::{LaneAttributes, LinkType};
    use crate::route::{Route, RouteNavigator};
    use crate::vehicle::following::FixedAcceleration;
    use crate::vehicle::lane_change::NoLaneChange;
    use crate::vehicle::{Gtu, GtuAttributes, LanePosition};
    use assert_approx_eq::assert_approx_eq;
    use std::rc::Rc;

    /// Three consecutive lanes of 100 m.
    fn road() -> (Network, GtuSet, GtuTypeId, [LaneId; 3]) {
        let mut net = Network::new();
        let car = net.add_gtu_type("car");
        let nodes = ["a", "b", "c", "d"].map(|name| net.add_node(name));
        let lanes = [0, 1, 2].map(|i| {
            let link = net.add_link(nodes[i], nodes[i + 1], LinkType::Ordinary);
            net.add_lane(link, &LaneAttributes::new(100.0, 25.0))
        });
        net.connect_lanes(lanes[0], lanes[1]);
        net.connect_lanes(lanes[1], lanes[2]);
        (net, GtuSet::with_key(), car, lanes)
    }

    fn place(net: &mut Network, gtus: &mut GtuSet, car: GtuTypeId, positions: &[(LaneId, f64)]) {
        let (lane, front) = positions[0];
        let start = net.link(net.lane(lane).link()).start();
        let route = Rc::new(Route::new(vec![start]).unwrap());
        let id = gtus.insert_with_key(|id| {
            Gtu::new(
                id,
                &GtuAttributes {
                    gtu_type: car,
                    length: 4.0,
                    width: 2.0,
                    max_speed: 30.0,
                },
                RouteNavigator::new(route),
                Box::new(FixedAcceleration {
                    acceleration: 0.0,
                    duration: 1.0,
                }),
                Box::new(NoLaneChange),
                LanePosition { lane, front },
                10.0,
                0.0,
            )
        });
        net.add_gtu(lane, id);
        for (lane, front) in &positions[1..] {
            gtus[id].enter_lane(*lane, *front).unwrap();
            net.add_gtu(*lane, id);
        }
    }

    #[test]
    fn searches_across_lane_boundaries() {
        let (mut net, mut gtus, car, lanes) = road();
        // Straddles the first lane boundary
        place(&mut net, &mut gtus, car, &[(lanes[1], 102.0), (lanes[2], 2.0)]);
        place(&mut net, &mut gtus, car, &[(lanes[2], 60.0)]);
        place(&mut net, &mut gtus, car, &[(lanes[0], 80.0)]);

        let perception = Perception::new(&net, &gtus, car, None, 4.0, 0.0, 500.0, 200.0);
        let traffic = perception.lane_traffic(lanes[1], 50.0);
        let distances: Vec<f64> = traffic.headways().iter().map(|h| h.distance).collect();
        assert_eq!(distances.len(), 3);
        assert_approx_eq!(distances[0], -74.0);
        assert_approx_eq!(distances[1], 48.0);
        assert_approx_eq!(distances[2], 106.0);
        assert_approx_eq!(traffic.leader().unwrap().distance, 48.0);
        assert_approx_eq!(traffic.follower(4.0).unwrap().distance, -74.0);
        assert_eq!(traffic.leader().unwrap().speed, 10.0);

        // Limited range
        let perception = Perception::new(&net, &gtus, car, None, 4.0, 0.0, 100.0, 50.0);
        let traffic = perception.lane_traffic(lanes[1], 50.0);
        assert_eq!(traffic.headways().len(), 1);
        assert!(traffic.follower(4.0).is_none());
    }

    #[test]
    fn obstacles_reset_the_anticipated_speed() {
        let mut traffic = LaneTraffic::new(vec![Headway::new(-20.0, 5.0, 4.0)]);
        assert_eq!(traffic.anticipated_speed(4.0, 30.0, 295.0), 30.0);
        traffic.add_obstacle(59.0);
        assert_approx_eq!(traffic.anticipated_speed(4.0, 30.0, 295.0), 30.0 * 0.2);
        assert_eq!(traffic.leader().unwrap().distance, 59.0);
    }
}
