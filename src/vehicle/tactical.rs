//! The tactical planner, which combines perception, route incentives and the
//! behavioural models into a single decision per evaluation.

use super::lane_change::{LaneChangeInput, LaneMovementStep, LmrsParams};
use super::perception::{LaneTraffic, Perception};
use super::Gtu;
use crate::config::SimulationConfig;
use crate::error::{GtuError, SimResult};
use crate::network::{LateralDirection, Network};
use crate::route::{lane_drop, suitability, NO_LANE_CHANGE_NEEDED};
use crate::{GtuId, GtuSet, LaneId};

/// The desire to leave a lane with the given suitability, at the given speed.
///
/// Grows to 1 as the distance to the point where the lane must be left drops below `x0`
/// or the time to reach it drops below `t0`.
pub fn leave_desire(suitability: f64, speed: f64, params: &LmrsParams) -> f64 {
    if suitability == NO_LANE_CHANGE_NEEDED {
        return 0.0;
    }
    let by_distance = 1.0 - suitability / params.x0;
    let by_time = if speed > 0.0 {
        1.0 - suitability / speed / params.t0
    } else {
        f64::NEG_INFINITY
    };
    by_distance.max(by_time).max(0.0)
}

/// The route incentive to change from a lane with suitability `current` to an adjacent
/// lane with suitability `adjacent`, or `None` if there is no usable adjacent lane.
///
/// Positive if the adjacent lane is better for the route, negative if it is worse.
pub fn route_incentive(
    current: f64,
    adjacent: Option<f64>,
    speed: f64,
    params: &LmrsParams,
) -> f64 {
    let Some(adjacent) = adjacent else {
        return f64::NEG_INFINITY;
    };
    let leave_current = leave_desire(current, speed, params);
    let leave_adjacent = leave_desire(adjacent, speed, params);
    if leave_adjacent < leave_current {
        leave_current
    } else if leave_adjacent > leave_current {
        -leave_adjacent
    } else {
        0.0
    }
}

/// Decides the acceleration and lane change of a GTU at time `now`.
///
/// The GTU's motion must have been committed up to `now`.
pub(crate) fn plan(
    network: &Network,
    gtus: &GtuSet,
    config: &SimulationConfig,
    id: GtuId,
    now: f64,
) -> SimResult<LaneMovementStep> {
    let gtu = gtus.get(id).ok_or(GtuError::UnknownGtu(id))?;
    let gtu_type = gtu.gtu_type();
    let reference = gtu.reference_position();
    let lane = network.lane(reference.lane);
    let front = gtu.position(reference.lane, now)?;
    let fraction = front / lane.length();

    let perception = Perception::new(
        network,
        gtus,
        gtu_type,
        Some(id),
        gtu.length(),
        now,
        config.forward_headway,
        config.reverse_headway,
    );
    let adjacent = |direction| {
        network
            .accessible_adjacent_lane(reference.lane, direction, gtu_type)
            .map(|adj| (adj, fraction * network.lane(adj).length()))
    };
    let left = adjacent(LateralDirection::Left);
    let right = adjacent(LateralDirection::Right);

    let mut current = perception.lane_traffic(reference.lane, front);
    let lane_end = lane_drop(network, gtu_type, reference.lane, front, config.time_horizon);
    if lane_end != NO_LANE_CHANGE_NEEDED {
        current.add_obstacle(lane_end);
    }
    let left_traffic: Option<LaneTraffic> =
        left.map(|(lane, pos)| perception.lane_traffic(lane, pos));
    let right_traffic: Option<LaneTraffic> =
        right.map(|(lane, pos)| perception.lane_traffic(lane, pos));

    let (route_incentive_left, route_incentive_right) = match gtu.lane_change_model().params() {
        Some(params) => {
            let score = |(lane, pos): (LaneId, f64)| lane_score(network, config, gtu, lane, pos);
            let current = score((reference.lane, front))?;
            let left = left.map(score).transpose()?;
            let right = right.map(score).transpose()?;
            let speed = gtu.speed();
            (
                route_incentive(current, left, speed, params),
                route_incentive(current, right, speed, params),
            )
        }
        None => (
            if left.is_some() { 0.0 } else { f64::NEG_INFINITY },
            if right.is_some() { 0.0 } else { f64::NEG_INFINITY },
        ),
    };
    log::trace!(
        "GTU {:?} at {:.2} on lane {:?}, route incentives {:.3} / {:.3}",
        id,
        front,
        reference.lane,
        route_incentive_left,
        route_incentive_right
    );

    let input = LaneChangeInput {
        vehicle: gtu.follower_state(),
        current: &current,
        left: left_traffic.as_ref(),
        right: right_traffic.as_ref(),
        speed_limit: lane.speed_limit(),
        route_incentive_left,
        route_incentive_right,
        left_indicator: indicating_leader(
            gtus,
            &current,
            left_traffic.as_ref(),
            LateralDirection::Right,
        ),
        right_indicator: indicating_leader(
            gtus,
            &current,
            right_traffic.as_ref(),
            LateralDirection::Left,
        ),
        now,
    };
    Ok(gtu
        .lane_change_model()
        .evaluate(&input, gtu.car_following()))
}

/// The desire of the leader on an adjacent lane, if it indicates a change `toward` the
/// current lane and no vehicle on the current lane is between it and the subject.
fn indicating_leader(
    gtus: &GtuSet,
    current: &LaneTraffic,
    adjacent: Option<&LaneTraffic>,
    toward: LateralDirection,
) -> Option<f64> {
    let leader = adjacent?.leader()?;
    let indicator = gtus.get(leader.gtu?)?.indicator()?;
    let cut_off = current
        .headways()
        .iter()
        .any(|h| h.gtu.is_some() && h.is_ahead() && h.distance < leader.distance);
    (indicator.direction == toward && !cut_off).then_some(indicator.desire)
}

/// The suitability of a lane for a GTU, where a lane that is fine for the route but ends
/// before the next branch scores the distance to its end.
fn lane_score(
    network: &Network,
    config: &SimulationConfig,
    gtu: &Gtu,
    lane: LaneId,
    position: f64,
) -> SimResult<f64> {
    let value = suitability(
        network,
        gtu.navigator(),
        gtu.gtu_type(),
        lane,
        position,
        config.time_horizon,
    )?;
    if value == NO_LANE_CHANGE_NEEDED {
        Ok(lane_drop(
            network,
            gtu.gtu_type(),
            lane,
            position,
            config.time_horizon,
        ))
    } else {
        Ok(value)
    }
}
