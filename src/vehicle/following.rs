//! Car following models.

use crate::GtuId;
use std::fmt::Debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A car following model, which computes the longitudinal acceleration of a vehicle
/// from the vehicles around it.
pub trait CarFollowingModel: Debug {
    /// Computes the acceleration of the follower and the time until which it remains valid.
    ///
    /// # Parameters
    /// * `follower` - The state of the vehicle to compute an acceleration for
    /// * `leaders` - Vehicles in the follower's lane, relative to its front. Vehicles
    ///   entirely behind the follower are ignored; an empty set means free flow.
    /// * `speed_limit` - The speed limit in m/s, must be positive
    /// * `now` - The current simulation time in s
    fn compute_acceleration(
        &self,
        follower: &FollowerState,
        leaders: &[Headway],
        speed_limit: f64,
        now: f64,
    ) -> AccelerationStep;

    /// Like [CarFollowingModel::compute_acceleration], for a driver with lane change desire
    /// `desire` who accepts a desired time headway shrinking to `t_min` at a desire of 1.
    ///
    /// Models without a desired time headway ignore the desire.
    fn compute_acceleration_with_desire(
        &self,
        follower: &FollowerState,
        leaders: &[Headway],
        speed_limit: f64,
        now: f64,
        _desire: f64,
        _t_min: f64,
    ) -> AccelerationStep {
        self.compute_acceleration(follower, leaders, speed_limit, now)
    }

    /// The speed the vehicle would like to drive at.
    fn desired_speed(&self, speed_limit: f64, max_speed: f64) -> f64;

    /// The maximum acceleration in m/s^2.
    fn max_acceleration(&self) -> f64;

    /// The comfortable deceleration, a positive number in m/s^2.
    fn comfortable_deceleration(&self) -> f64;

    fn name(&self) -> &str;
}

/// The kinematic state of a following vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FollowerState {
    /// The vehicle length in m.
    pub length: f64,
    /// The speed in m/s.
    pub speed: f64,
    /// The maximum speed of the vehicle in m/s.
    pub max_speed: f64,
}

/// Another vehicle, as perceived from the front of a subject vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Headway {
    /// The distance from the subject's front to the other vehicle's rear, in m.
    ///
    /// Positive for vehicles ahead, between `-(own length + other length)` and zero for
    /// vehicles alongside, and lower for vehicles entirely behind.
    pub distance: f64,
    /// The speed of the other vehicle in m/s.
    pub speed: f64,
    /// The length of the other vehicle in m.
    pub length: f64,
    /// The other vehicle, if it is a GTU.
    pub gtu: Option<GtuId>,
}

/// The result of a car following computation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AccelerationStep {
    /// The acceleration in m/s^2, or negative infinity if a collision is imminent.
    pub acceleration: f64,
    /// The time until which the acceleration remains valid, in s.
    pub valid_until: f64,
}

impl Headway {
    pub fn new(distance: f64, speed: f64, length: f64) -> Self {
        Self {
            distance,
            speed,
            length,
            gtu: None,
        }
    }

    /// Whether the other vehicle's rear is ahead of the subject's front.
    pub fn is_ahead(&self) -> bool {
        self.distance > 0.0
    }

    /// Whether the other vehicle is entirely behind a subject of the given length.
    pub fn is_behind(&self, own_length: f64) -> bool {
        self.distance <= -(own_length + self.length)
    }

    /// Whether the other vehicle overlaps longitudinally with a subject of the given length.
    pub fn overlaps(&self, own_length: f64) -> bool {
        !self.is_ahead() && !self.is_behind(own_length)
    }

    /// The gap between the other vehicle's front and the subject's rear,
    /// for a vehicle entirely behind.
    pub fn gap_behind(&self, own_length: f64) -> f64 {
        -self.distance - own_length - self.length
    }
}

/// The parameters of the intelligent driver model.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IdmParams {
    /// The maximum acceleration in m/s^2.
    pub a: f64,
    /// The comfortable deceleration, a positive number in m/s^2.
    pub b: f64,
    /// The distance to keep to a stationary leader in m.
    pub s0: f64,
    /// The desired time headway in s.
    pub t_safe: f64,
    /// The desired speed adherence factor, multiplied with the speed limit.
    pub delta: f64,
    /// The time between evaluations in s.
    pub step: f64,
}

impl Default for IdmParams {
    fn default() -> Self {
        Self {
            a: 1.25,
            b: 2.09,
            s0: 3.0,
            t_safe: 1.6,
            delta: 1.0,
            step: 0.5,
        }
    }
}

impl IdmParams {
    /// The parameters of a driver with lane change desire `desire`, whose desired time
    /// headway shrinks linearly from `t_safe` at no desire to `t_min` at a desire of 1.
    pub fn relaxed(&self, desire: f64, t_min: f64) -> Self {
        let desire = desire.clamp(0.0, 1.0);
        let t_safe = desire * t_min + (1. - desire) * self.t_safe;
        Self {
            t_safe: f64::min(self.t_safe, t_safe),
            ..*self
        }
    }

    /// The gap the driver would like to keep, never negative.
    fn desired_gap(&self, speed: f64, approach: f64) -> f64 {
        let factor = 1. / (2. * (self.a * self.b).sqrt());
        f64::max(self.s0 + speed * self.t_safe + speed * approach * factor, 0.0)
    }

    fn desired_speed(&self, speed_limit: f64, max_speed: f64) -> f64 {
        f64::min(self.delta * speed_limit, max_speed)
    }
}

/// Marks that a leader overlaps with the follower.
struct Collision;

/// Finds the nearest leader ahead of the follower, ignoring vehicles entirely behind it.
fn nearest_leader<'a>(
    follower: &FollowerState,
    leaders: &'a [Headway],
) -> Result<Option<&'a Headway>, Collision> {
    let mut nearest: Option<&Headway> = None;
    for leader in leaders {
        if leader.is_behind(follower.length) {
            continue;
        }
        if !leader.is_ahead() {
            return Err(Collision);
        }
        if nearest.map_or(true, |n| leader.distance < n.distance) {
            nearest = Some(leader);
        }
    }
    Ok(nearest)
}

/// The gap and approach speed to the nearest leader, or a free flow substitute.
fn gap_and_approach(follower: &FollowerState, leader: Option<&Headway>) -> (f64, f64) {
    leader
        .map(|l| (l.distance, follower.speed - l.speed))
        .unwrap_or((f64::MAX, 0.0))
}

/// IDM+, which takes the minimum of the free road and interaction terms
/// instead of their sum.
#[derive(Clone, Debug)]
pub struct IdmPlus {
    params: IdmParams,
}

impl Default for IdmPlus {
    fn default() -> Self {
        Self::new(IdmParams {
            t_safe: 1.2,
            ..Default::default()
        })
    }
}

impl IdmPlus {
    pub fn new(params: IdmParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IdmParams {
        &self.params
    }
}

impl CarFollowingModel for IdmPlus {
    fn compute_acceleration(
        &self,
        follower: &FollowerState,
        leaders: &[Headway],
        speed_limit: f64,
        now: f64,
    ) -> AccelerationStep {
        let valid_until = now + self.params.step;
        let leader = match nearest_leader(follower, leaders) {
            Ok(leader) => leader,
            Err(Collision) => {
                return AccelerationStep {
                    acceleration: f64::NEG_INFINITY,
                    valid_until,
                }
            }
        };

        let speed = follower.speed;
        let desired_speed = self.desired_speed(speed_limit, follower.max_speed);
        let (gap, approach) = gap_and_approach(follower, leader);
        let speed_incentive = 1. - (speed / desired_speed).powi(4);
        let distance_incentive = 1. - (self.params.desired_gap(speed, approach) / gap).powi(2);
        AccelerationStep {
            acceleration: self.params.a * f64::min(speed_incentive, distance_incentive),
            valid_until,
        }
    }

    fn compute_acceleration_with_desire(
        &self,
        follower: &FollowerState,
        leaders: &[Headway],
        speed_limit: f64,
        now: f64,
        desire: f64,
        t_min: f64,
    ) -> AccelerationStep {
        IdmPlus::new(self.params.relaxed(desire, t_min)).compute_acceleration(
            follower,
            leaders,
            speed_limit,
            now,
        )
    }

    fn desired_speed(&self, speed_limit: f64, max_speed: f64) -> f64 {
        self.params.desired_speed(speed_limit, max_speed)
    }

    fn max_acceleration(&self) -> f64 {
        self.params.a
    }

    fn comfortable_deceleration(&self) -> f64 {
        self.params.b
    }

    fn name(&self) -> &str {
        "IDM+"
    }
}

/// The classic intelligent driver model.
#[derive(Clone, Debug, Default)]
pub struct Idm {
    params: IdmParams,
}

impl Idm {
    pub fn new(params: IdmParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IdmParams {
        &self.params
    }
}

impl CarFollowingModel for Idm {
    fn compute_acceleration(
        &self,
        follower: &FollowerState,
        leaders: &[Headway],
        speed_limit: f64,
        now: f64,
    ) -> AccelerationStep {
        let valid_until = now + self.params.step;
        let Ok(leader) = nearest_leader(follower, leaders) else {
            return AccelerationStep {
                acceleration: f64::NEG_INFINITY,
                valid_until,
            };
        };

        let speed = follower.speed;
        let desired_speed = self.desired_speed(speed_limit, follower.max_speed);
        let (gap, approach) = gap_and_approach(follower, leader);
        let term = self.params.desired_gap(speed, approach) / gap;
        AccelerationStep {
            acceleration: self.params.a * (1. - (speed / desired_speed).powi(4) - term * term),
            valid_until,
        }
    }

    fn compute_acceleration_with_desire(
        &self,
        follower: &FollowerState,
        leaders: &[Headway],
        speed_limit: f64,
        now: f64,
        desire: f64,
        t_min: f64,
    ) -> AccelerationStep {
        Idm::new(self.params.relaxed(desire, t_min)).compute_acceleration(
            follower,
            leaders,
            speed_limit,
            now,
        )
    }

    fn desired_speed(&self, speed_limit: f64, max_speed: f64) -> f64 {
        self.params.desired_speed(speed_limit, max_speed)
    }

    fn max_acceleration(&self) -> f64 {
        self.params.a
    }

    fn comfortable_deceleration(&self) -> f64 {
        self.params.b
    }

    fn name(&self) -> &str {
        "IDM"
    }
}

/// A model with a constant acceleration, for testing.
#[derive(Clone, Debug)]
pub struct FixedAcceleration {
    /// The acceleration in m/s^2.
    pub acceleration: f64,
    /// How long each result remains valid, in s.
    pub duration: f64,
}

impl CarFollowingModel for FixedAcceleration {
    fn compute_acceleration(
        &self,
        _follower: &FollowerState,
        _leaders: &[Headway],
        _speed_limit: f64,
        now: f64,
    ) -> AccelerationStep {
        AccelerationStep {
            acceleration: self.acceleration,
            valid_until: now + self.duration,
        }
    }

    fn desired_speed(&self, speed_limit: f64, max_speed: f64) -> f64 {
        f64::min(speed_limit, max_speed)
    }

    fn max_acceleration(&self) -> f64 {
        self.acceleration.abs()
    }

    fn comfortable_deceleration(&self) -> f64 {
        IdmParams::default().b
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn idm_plus() -> IdmPlus {
        IdmPlus::new(IdmParams::default())
    }

    fn car(speed: f64) -> FollowerState {
        FollowerState {
            length: 4.0,
            speed,
            max_speed: 50.0,
        }
    }

    #[test]
    fn stationary_leader_far_ahead() {
        let leader = Headway::new(20.0, 0.0, 4.0);
        let step = idm_plus().compute_acceleration(&car(0.0), &[leader], 25.0, 3.0);
        // s* = s0 = 3 m, so the interaction term is 1 - (3/20)^2
        assert_approx_eq!(step.acceleration, 1.25 * (1.0 - 0.0225));
        assert!(step.acceleration > 0.0);
        assert_approx_eq!(step.valid_until, 3.5);
    }

    #[test]
    fn overlap_is_collision() {
        // Follower front at 10, leader rear at 9
        let leader = Headway::new(-1.0, 10.0, 4.0);
        let step = idm_plus().compute_acceleration(&car(10.0), &[leader], 25.0, 0.0);
        assert_eq!(step.acceleration, f64::NEG_INFINITY);

        for (distance, speed) in [(0.0, 0.0), (-7.9, 30.0), (-0.001, 5.0)] {
            let leader = Headway::new(distance, speed, 4.0);
            for model in [&idm_plus() as &dyn CarFollowingModel, &Idm::default()] {
                let step = model.compute_acceleration(&car(speed), &[leader], 25.0, 0.0);
                assert_eq!(step.acceleration, f64::NEG_INFINITY);
            }
        }
    }

    #[test]
    fn vehicles_behind_are_ignored() {
        let follower = Headway::new(-8.0, 30.0, 4.0);
        let free = idm_plus().compute_acceleration(&car(10.0), &[], 25.0, 0.0);
        let step = idm_plus().compute_acceleration(&car(10.0), &[follower], 25.0, 0.0);
        assert_eq!(step, free);
    }

    #[test]
    fn free_flow_uses_speed_term_only() {
        let model = idm_plus();
        for speed in [0.0, 5.0, 20.0, 25.0, 30.0] {
            let step = model.compute_acceleration(&car(speed), &[], 25.0, 0.0);
            assert_approx_eq!(step.acceleration, 1.25 * (1.0 - (speed / 25.0).powi(4)));
        }
    }

    #[test]
    fn nearest_leader_wins() {
        let near = Headway::new(10.0, 5.0, 4.0);
        let far = Headway::new(50.0, 0.0, 4.0);
        let model = idm_plus();
        let both = model.compute_acceleration(&car(10.0), &[far, near], 25.0, 0.0);
        let only_near = model.compute_acceleration(&car(10.0), &[near], 25.0, 0.0);
        assert_eq!(both, only_near);
    }

    #[test]
    fn desired_gap_is_never_negative() {
        // Leader much faster than the follower: s* would be negative
        let leader = Headway::new(1.0, 40.0, 4.0);
        let step = idm_plus().compute_acceleration(&car(10.0), &[leader], 25.0, 0.0);
        assert_approx_eq!(step.acceleration, 1.25 * (1.0 - (10.0f64 / 25.0).powi(4)));
    }

    #[test]
    fn idm_sums_terms() {
        let params = IdmParams::default();
        let leader = Headway::new(30.0, 10.0, 4.0);
        let idm = Idm::new(params).compute_acceleration(&car(10.0), &[leader], 25.0, 0.0);
        let idm_plus = IdmPlus::new(params).compute_acceleration(&car(10.0), &[leader], 25.0, 0.0);
        let s_star = 3.0 + 10.0 * 1.6;
        let free = 1.0 - (10.0f64 / 25.0).powi(4);
        let interaction = 1.0 - (s_star / 30.0f64).powi(2);
        assert_approx_eq!(idm.acceleration, 1.25 * (free + interaction - 1.0));
        assert_approx_eq!(idm_plus.acceleration, 1.25 * interaction);
    }

    #[test]
    fn desired_speed_adherence() {
        let model = IdmPlus::new(IdmParams {
            delta: 1.1,
            ..Default::default()
        });
        assert_approx_eq!(model.desired_speed(20.0, 50.0), 22.0);
        assert_approx_eq!(model.desired_speed(20.0, 15.0), 15.0);
    }

    #[test]
    fn fixed_acceleration() {
        let model = FixedAcceleration {
            acceleration: -1.5,
            duration: 2.0,
        };
        let leaders = [Headway::new(-1.0, 0.0, 4.0)];
        let step = model.compute_acceleration(&car(3.0), &leaders, 10.0, 4.0);
        assert_eq!(step.acceleration, -1.5);
        assert_eq!(step.valid_until, 6.0);
        let relaxed =
            model.compute_acceleration_with_desire(&car(3.0), &leaders, 10.0, 4.0, 1.0, 0.56);
        assert_eq!(relaxed, step);
    }

    #[test]
    fn desire_shortens_the_headway() {
        let model = idm_plus();
        let leader = [Headway::new(30.0, 10.0, 4.0)];
        let with_desire = |desire| {
            model.compute_acceleration_with_desire(&car(10.0), &leader, 25.0, 0.0, desire, 0.56)
        };

        assert_eq!(
            with_desire(0.0),
            model.compute_acceleration(&car(10.0), &leader, 25.0, 0.0)
        );
        // Halfway between 1.6 s and 0.56 s
        let s_star = 3.0 + 10.0 * 1.08;
        assert_approx_eq!(
            with_desire(0.5).acceleration,
            1.25 * (1.0 - (s_star / 30.0f64).powi(2))
        );
        // Never shorter than the minimum
        assert_eq!(with_desire(2.0), with_desire(1.0));
        assert!(with_desire(1.0).acceleration > with_desire(0.5).acceleration);
    }
}
