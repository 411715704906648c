//! Simulated vehicles ("GTUs") and their behavioural models.

use self::following::{AccelerationStep, CarFollowingModel, FollowerState};
use self::lane_change::{Indicator, LaneChangeModel};
use crate::error::GtuError;
use crate::network::{LateralDirection, Network};
use crate::route::RouteNavigator;
use crate::{GtuId, GtuTypeId, LaneId};
use smallvec::SmallVec;

pub mod following;
pub mod lane_change;
pub mod perception;
pub mod tactical;

/// A simulated vehicle.
#[derive(Debug)]
pub struct Gtu {
    /// The GTU's ID
    id: GtuId,
    gtu_type: GtuTypeId,
    /// The vehicle length in m.
    length: f64,
    /// The vehicle width in m.
    width: f64,
    /// The maximum speed in m/s.
    max_speed: f64,
    /// The speed at the last evaluation in m/s.
    speed: f64,
    /// The acceleration applied since the last evaluation in m/s^2.
    acceleration: f64,
    /// The distance driven up to the last evaluation in m.
    odometer: f64,
    /// The time of the last evaluation in s.
    last_evaluation: f64,
    /// The time of the next scheduled evaluation in s.
    next_evaluation: f64,
    /// The lanes the GTU occupies, from rear to front, with the
    /// position of its front on each at the last evaluation.
    lanes: SmallVec<[LanePosition; 3]>,
    navigator: RouteNavigator,
    car_following: Box<dyn CarFollowingModel>,
    lane_change: Box<dyn LaneChangeModel>,
    /// The turn indicator set by the last evaluation.
    indicator: Option<Indicator>,
    /// Incremented whenever a new evaluation is scheduled, invalidating the previous one.
    generation: u64,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug)]
pub struct GtuAttributes {
    pub gtu_type: GtuTypeId,
    /// The vehicle length in m.
    pub length: f64,
    /// The vehicle width in m.
    pub width: f64,
    /// The maximum speed in m/s.
    pub max_speed: f64,
}

/// The position of a GTU's front on a lane, in m from the start of the lane.
/// May lie beyond the lane's end while the GTU's rear is still on it.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LanePosition {
    pub lane: LaneId,
    pub front: f64,
}

impl Gtu {
    /// Creates a new GTU at the given position.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: GtuId,
        attributes: &GtuAttributes,
        navigator: RouteNavigator,
        car_following: Box<dyn CarFollowingModel>,
        lane_change: Box<dyn LaneChangeModel>,
        position: LanePosition,
        speed: f64,
        now: f64,
    ) -> Self {
        Self {
            id,
            gtu_type: attributes.gtu_type,
            length: attributes.length,
            width: attributes.width,
            max_speed: attributes.max_speed,
            speed,
            acceleration: 0.0,
            odometer: 0.0,
            last_evaluation: now,
            next_evaluation: now,
            lanes: smallvec::smallvec![position],
            navigator,
            car_following,
            lane_change,
            indicator: None,
            generation: 0,
        }
    }

    /// Gets the GTU's ID.
    pub fn id(&self) -> GtuId {
        self.id
    }

    pub fn gtu_type(&self) -> GtuTypeId {
        self.gtu_type
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The vehicle's width in m.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// The vehicle's maximum speed in m/s.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// The speed at the last evaluation in m/s.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// The acceleration applied since the last evaluation in m/s^2.
    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    /// The distance driven up to the last evaluation in m.
    pub fn odometer(&self) -> f64 {
        self.odometer
    }

    pub fn last_evaluation(&self) -> f64 {
        self.last_evaluation
    }

    pub fn next_evaluation(&self) -> f64 {
        self.next_evaluation
    }

    /// The lanes the GTU occupies, from rear to front.
    pub fn lanes(&self) -> &[LanePosition] {
        &self.lanes
    }

    pub fn navigator(&self) -> &RouteNavigator {
        &self.navigator
    }

    pub fn car_following(&self) -> &dyn CarFollowingModel {
        &*self.car_following
    }

    pub fn lane_change_model(&self) -> &dyn LaneChangeModel {
        &*self.lane_change
    }

    /// The lane change this GTU announces while waiting for a gap.
    pub fn indicator(&self) -> Option<Indicator> {
        self.indicator
    }

    pub(crate) fn set_indicator(&mut self, indicator: Option<Indicator>) {
        self.indicator = indicator;
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// The most downstream lane, which the GTU's front is on, at the last evaluation.
    pub fn reference_position(&self) -> LanePosition {
        self.lanes[self.lanes.len() - 1]
    }

    /// Whether the GTU occupies the lane.
    pub fn is_on(&self, lane: LaneId) -> bool {
        self.lanes.iter().any(|lp| lp.lane == lane)
    }

    /// The speed at time `t` in m/s, assuming the current acceleration.
    /// A decelerating vehicle stops rather than reversing.
    pub fn speed_at(&self, t: f64) -> f64 {
        let dt = t - self.last_evaluation;
        f64::max(self.speed + self.acceleration * dt, 0.0)
    }

    /// The distance driven between the last evaluation and time `t`, in m.
    pub fn distance_at(&self, t: f64) -> f64 {
        let dt = t - self.last_evaluation;
        let (v, a) = (self.speed, self.acceleration);
        if a < 0.0 && v + a * dt < 0.0 {
            -v * v / (2.0 * a)
        } else {
            v * dt + 0.5 * a * dt * dt
        }
    }

    /// The position of the GTU's front on a lane at time `t`, in m.
    pub fn position(&self, lane: LaneId, t: f64) -> Result<f64, GtuError> {
        self.lanes
            .iter()
            .find(|lp| lp.lane == lane)
            .map(|lp| lp.front + self.distance_at(t))
            .ok_or(GtuError::NotOnLane { gtu: self.id, lane })
    }

    /// The position of the GTU's front on a lane at time `t`, as a fraction of the lane's length.
    pub fn fractional_position(
        &self,
        network: &Network,
        lane: LaneId,
        t: f64,
    ) -> Result<f64, GtuError> {
        Ok(self.position(lane, t)? / network.lane(lane).length())
    }

    /// The kinematic state used by car following models.
    pub fn follower_state(&self) -> FollowerState {
        FollowerState {
            length: self.length,
            speed: self.speed,
            max_speed: self.max_speed,
        }
    }

    /// Registers the GTU's front on an additional lane.
    pub(crate) fn enter_lane(&mut self, lane: LaneId, front: f64) -> Result<(), GtuError> {
        if self.is_on(lane) {
            return Err(GtuError::AlreadyOnLane { gtu: self.id, lane });
        }
        self.lanes.push(LanePosition { lane, front });
        Ok(())
    }

    /// Removes a lane from the GTU's occupied lanes.
    pub(crate) fn leave_lane(&mut self, lane: LaneId) -> Result<LanePosition, GtuError> {
        let idx = self
            .lanes
            .iter()
            .position(|lp| lp.lane == lane)
            .ok_or(GtuError::NotOnLane { gtu: self.id, lane })?;
        Ok(self.lanes.remove(idx))
    }

    /// Moves the GTU onto the adjacent lanes in `direction`, keeping its fractional position.
    /// Lanes without an adjacent lane are left behind. Returns the lanes that were left
    /// and the lanes that were entered.
    pub(crate) fn change_lanes(
        &mut self,
        network: &Network,
        direction: LateralDirection,
    ) -> (SmallVec<[LaneId; 3]>, SmallVec<[LaneId; 3]>) {
        let old = std::mem::take(&mut self.lanes);
        let left = old.iter().map(|lp| lp.lane).collect();
        for lp in &old {
            if let Some(adjacent) =
                network.accessible_adjacent_lane(lp.lane, direction, self.gtu_type)
            {
                let fraction = lp.front / network.lane(lp.lane).length();
                self.lanes.push(LanePosition {
                    lane: adjacent,
                    front: fraction * network.lane(adjacent).length(),
                });
            }
        }
        let entered = self.lanes.iter().map(|lp| lp.lane).collect();
        (left, entered)
    }

    /// Advances the kinematic state to time `t`.
    pub(crate) fn commit(&mut self, t: f64) {
        let dist = self.distance_at(t);
        for lp in &mut self.lanes {
            lp.front += dist;
        }
        self.speed = self.speed_at(t);
        self.odometer += dist;
        self.last_evaluation = t;
    }

    /// Applies the result of an evaluation, clamping the acceleration to the maximum
    /// deceleration. Returns the generation of the next evaluation.
    pub(crate) fn apply(&mut self, step: AccelerationStep, max_deceleration: f64) -> u64 {
        self.acceleration = f64::max(step.acceleration, -max_deceleration);
        self.next_evaluation = f64::max(step.valid_until, self.last_evaluation);
        self.generation += 1;
        self.generation
    }

    pub(crate) fn navigator_mut(&mut self) -> &mut RouteNavigator {
        &mut self.navigator
    }
}
