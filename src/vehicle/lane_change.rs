//! Lane change models.

use super::following::{AccelerationStep, CarFollowingModel, FollowerState, Headway};
use super::perception::LaneTraffic;
use crate::config::Handedness;
use crate::network::LateralDirection;
use crate::util::Interval;
use std::fmt::Debug;
use std::slice;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A lane change model, which decides whether a vehicle changes lanes and how it
/// accelerates meanwhile.
pub trait LaneChangeModel: Debug {
    fn evaluate(
        &self,
        input: &LaneChangeInput,
        car_following: &dyn CarFollowingModel,
    ) -> LaneMovementStep;

    /// The parameters from which route incentives are derived,
    /// or `None` if the model ignores the route.
    fn params(&self) -> Option<&LmrsParams> {
        None
    }

    fn name(&self) -> &str;
}

/// Everything a lane change model needs to know about a vehicle's surroundings.
#[derive(Clone, Copy, Debug)]
pub struct LaneChangeInput<'a> {
    pub vehicle: FollowerState,
    /// Traffic on the current lane.
    pub current: &'a LaneTraffic,
    /// Traffic on the left lane, `None` if there is no accessible left lane.
    pub left: Option<&'a LaneTraffic>,
    /// Traffic on the right lane, `None` if there is no accessible right lane.
    pub right: Option<&'a LaneTraffic>,
    /// The speed limit in m/s.
    pub speed_limit: f64,
    /// The desire to change left in order to follow the route.
    pub route_incentive_left: f64,
    /// The desire to change right in order to follow the route.
    pub route_incentive_right: f64,
    /// The lane change desire of the leader on the left lane, if it indicates a change
    /// into the current lane directly ahead of this vehicle.
    pub left_indicator: Option<f64>,
    /// Likewise for the leader on the right lane.
    pub right_indicator: Option<f64>,
    /// The current simulation time in s.
    pub now: f64,
}

impl<'a> LaneChangeInput<'a> {
    fn side(&self, direction: LateralDirection) -> (Option<&'a LaneTraffic>, f64) {
        match direction {
            LateralDirection::Left => (self.left, self.route_incentive_left),
            LateralDirection::Right => (self.right, self.route_incentive_right),
        }
    }
}

/// The outcome of a lane change model evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneMovementStep {
    pub step: AccelerationStep,
    /// The direction of the lane change to perform now, if any.
    pub lane_change: Option<LateralDirection>,
    /// Announces a lane change that waits for a gap, so that followers in the target lane
    /// can create one.
    pub indicator: Option<Indicator>,
}

/// A turn indicator.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Indicator {
    pub direction: LateralDirection,
    /// The lane change desire of the indicating driver.
    pub desire: f64,
}

/// The outcome of a gap acceptance check.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GapCheck {
    pub accepted: bool,
    /// The acceleration of the changing vehicle behind its new leader.
    pub own_acceleration: f64,
    /// The acceleration of the new follower behind the changing vehicle, if there is one.
    pub follower_acceleration: Option<f64>,
}

/// The parameters of the LMRS lane change model.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LmrsParams {
    /// The desire above which drivers change lanes in free conditions.
    pub d_free: f64,
    /// The desire above which drivers synchronize with the target lane.
    pub d_sync: f64,
    /// The desire above which voluntary incentives are ignored.
    pub d_coop: f64,
    /// The look-ahead distance for route incentives and anticipated speed, in m.
    pub x0: f64,
    /// The look-ahead time for route incentives, in s.
    pub t0: f64,
    /// The speed gain for which the speed desire is 1, in m/s.
    pub v_gain: f64,
    /// Above this anticipated speed in m/s, traffic is not congested
    /// and overtaking on the keep side is forbidden.
    pub v_cong: f64,
    /// The shortest desired time headway in s, accepted at a lane change desire of 1
    /// when changing lanes, synchronizing or creating a gap.
    pub t_min: f64,
}

impl Default for LmrsParams {
    fn default() -> Self {
        Self {
            d_free: 0.365,
            d_sync: 0.577,
            d_coop: 0.788,
            x0: 295.0,
            t0: 43.0,
            v_gain: 69.6 / 3.6,
            v_cong: 60.0 / 3.6,
            t_min: 0.56,
        }
    }
}

/// Blends a voluntary incentive into a route incentive.
///
/// Returns 1 if both incentives point the same way or the route incentive is at most `d_sync`
/// in magnitude, 0 if they conflict and the route incentive is at least `d_coop` in magnitude,
/// and interpolates linearly in between.
pub fn theta(route: f64, voluntary: f64, params: &LmrsParams) -> f64 {
    let magnitude = route.abs();
    if route * voluntary >= 0.0 || magnitude <= params.d_sync {
        1.0
    } else if magnitude >= params.d_coop {
        0.0
    } else {
        Interval::new(params.d_coop, params.d_sync).inv_lerp(magnitude)
    }
}

/// The speed a driver expects to reach on a lane.
///
/// Each slower vehicle within `x0` ahead or alongside lowers the desired speed, the more
/// so the closer it is. Vehicles behind are ignored.
pub fn anticipated_speed(
    headways: &[Headway],
    own_length: f64,
    desired_speed: f64,
    x0: f64,
) -> f64 {
    headways
        .iter()
        .filter(|h| !h.is_behind(own_length) && h.speed < desired_speed)
        .map(|h| (f64::max(h.distance, 0.0), h.speed))
        .filter(|(s, _)| *s <= x0)
        .map(|(s, v)| Interval::new(v, desired_speed).lerp(s / x0))
        .fold(desired_speed, f64::min)
}

/// Checks whether a vehicle with lane change desire `desire` can safely change into a
/// lane with the given traffic.
///
/// Both the vehicle behind its new leader and its new follower behind it accept a desired
/// time headway shortened toward `t_min` by the desire. The change is accepted if neither
/// needs to brake harder than the comfortable deceleration scaled by the desire. The
/// follower is assumed to use the same car following model. A vehicle alongside always
/// rejects the change.
pub fn check_lane_change(
    model: &dyn CarFollowingModel,
    vehicle: &FollowerState,
    target: &[Headway],
    speed_limit: f64,
    now: f64,
    desire: f64,
    t_min: f64,
) -> GapCheck {
    if target.iter().any(|h| h.overlaps(vehicle.length)) {
        return GapCheck {
            accepted: false,
            own_acceleration: f64::NEG_INFINITY,
            follower_acceleration: None,
        };
    }

    let own_acceleration = model
        .compute_acceleration_with_desire(vehicle, target, speed_limit, now, desire, t_min)
        .acceleration;
    let follower_acceleration = target
        .iter()
        .filter(|h| h.is_behind(vehicle.length))
        .max_by(|a, b| a.distance.total_cmp(&b.distance))
        .map(|follower| {
            let state = FollowerState {
                length: follower.length,
                speed: follower.speed,
                max_speed: f64::INFINITY,
            };
            let changer = Headway::new(
                follower.gap_behind(vehicle.length),
                vehicle.speed,
                vehicle.length,
            );
            let leaders = slice::from_ref(&changer);
            model
                .compute_acceleration_with_desire(&state, leaders, speed_limit, now, desire, t_min)
                .acceleration
        });

    let threshold = -model.comfortable_deceleration() * desire;
    GapCheck {
        accepted: own_acceleration >= threshold
            && follower_acceleration.map_or(true, |a| a >= threshold),
        own_acceleration,
        follower_acceleration,
    }
}

/// A model that never changes lanes.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLaneChange;

impl LaneChangeModel for NoLaneChange {
    fn evaluate(
        &self,
        input: &LaneChangeInput,
        car_following: &dyn CarFollowingModel,
    ) -> LaneMovementStep {
        LaneMovementStep {
            step: car_following.compute_acceleration(
                &input.vehicle,
                input.current.headways(),
                input.speed_limit,
                input.now,
            ),
            lane_change: None,
            indicator: None,
        }
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// A lane change model with relaxation and synchronization.
///
/// Lane change desire combines a mandatory incentive to follow the route with voluntary
/// incentives to gain speed and to keep to the preferred side of the road.
#[derive(Clone, Debug, Default)]
pub struct Lmrs {
    params: LmrsParams,
    handedness: Handedness,
}

impl Lmrs {
    pub fn new(params: LmrsParams, handedness: Handedness) -> Self {
        Self { params, handedness }
    }

    /// The total desire to change lanes in a direction.
    fn desire(
        &self,
        input: &LaneChangeInput,
        direction: LateralDirection,
        a_gain: f64,
        desired_speed: f64,
        current_speed: f64,
    ) -> f64 {
        let p = &self.params;
        let (traffic, route) = input.side(direction);
        let Some(traffic) = traffic else {
            return route;
        };

        let keep_side = direction == self.handedness.preferred();
        let speed = traffic.anticipated_speed(input.vehicle.length, desired_speed, p.x0);
        let gain = speed - current_speed;
        let speed_incentive = if keep_side && current_speed >= p.v_cong {
            a_gain * f64::min(gain, 0.0) / p.v_gain
        } else {
            a_gain * gain / p.v_gain
        };
        let bias = if keep_side && route >= 0.0 && speed == desired_speed {
            p.d_free
        } else {
            0.0
        };

        let voluntary = speed_incentive + bias;
        route + theta(route, voluntary, p) * voluntary
    }
}

impl LaneChangeModel for Lmrs {
    fn evaluate(
        &self,
        input: &LaneChangeInput,
        car_following: &dyn CarFollowingModel,
    ) -> LaneMovementStep {
        let p = &self.params;
        let vehicle = &input.vehicle;
        let straight = car_following.compute_acceleration(
            vehicle,
            input.current.headways(),
            input.speed_limit,
            input.now,
        );

        let a = car_following.max_acceleration();
        let a_gain = if a > 0.0 {
            (a - f64::max(straight.acceleration, 0.0)) / a
        } else {
            0.0
        };
        let desired_speed = car_following.desired_speed(input.speed_limit, vehicle.max_speed);
        let current_speed = input
            .current
            .anticipated_speed(vehicle.length, desired_speed, p.x0);

        let preferred = self.handedness.preferred();
        let overtaking = self.handedness.overtaking();
        let d_preferred = self.desire(input, preferred, a_gain, desired_speed, current_speed);
        let d_overtaking = self.desire(input, overtaking, a_gain, desired_speed, current_speed);
        log::trace!(
            "LMRS desire {:?} {:.3}, {:?} {:.3}",
            preferred,
            d_preferred,
            overtaking,
            d_overtaking
        );

        // The overtaking side wins ties
        let order = if d_overtaking >= d_preferred {
            [(overtaking, d_overtaking), (preferred, d_preferred)]
        } else {
            [(preferred, d_preferred), (overtaking, d_overtaking)]
        };
        let best = order[0].1;

        for (direction, desire) in order {
            if desire < best || desire < p.d_free {
                continue;
            }
            let Some(target) = input.side(direction).0 else {
                continue;
            };
            let gap = check_lane_change(
                car_following,
                vehicle,
                target.headways(),
                input.speed_limit,
                input.now,
                desire,
                p.t_min,
            );
            if gap.accepted {
                return LaneMovementStep {
                    step: AccelerationStep {
                        acceleration: f64::min(straight.acceleration, gap.own_acceleration),
                        valid_until: straight.valid_until,
                    },
                    lane_change: Some(direction),
                    indicator: None,
                };
            }
        }

        let b = car_following.comfortable_deceleration();
        let follow = |leader: &Headway, desire: f64| {
            let a = car_following
                .compute_acceleration_with_desire(
                    vehicle,
                    slice::from_ref(leader),
                    input.speed_limit,
                    input.now,
                    desire,
                    p.t_min,
                )
                .acceleration;
            f64::max(a, -b)
        };

        // Synchronize with the target lane
        let mut acceleration = straight.acceleration;
        let (direction, desire) = order[0];
        if desire >= p.d_sync {
            if let Some(leader) = input.side(direction).0.and_then(|t| t.leader()) {
                acceleration = f64::min(acceleration, follow(leader, desire));
            }
        }

        // Create a gap for an indicating leader in an adjacent lane
        let sides = [
            (input.left, input.left_indicator),
            (input.right, input.right_indicator),
        ];
        for (traffic, indicator) in sides {
            let leader = traffic.and_then(|t| t.leader());
            if let (Some(leader), Some(desire)) = (leader, indicator) {
                acceleration = f64::min(acceleration, follow(leader, desire));
            }
        }

        let indicator = (desire >= p.d_coop).then_some(Indicator { direction, desire });
        LaneMovementStep {
            step: AccelerationStep {
                acceleration,
                valid_until: straight.valid_until,
            },
            lane_change: None,
            indicator,
        }
    }

    fn params(&self) -> Option<&LmrsParams> {
        Some(&self.params)
    }

    fn name(&self) -> &str {
        "LMRS"
    }
}
