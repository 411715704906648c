//! Vehicle generators and the planner factories that equip new vehicles.

use crate::config::SimulationConfig;
use crate::error::{NetworkError, SimError, SimResult};
use crate::network::Network;
use crate::route::{Route, RouteGenerator};
use crate::vehicle::following::{CarFollowingModel, FollowerState, IdmParams, IdmPlus};
use crate::vehicle::lane_change::{LaneChangeModel, Lmrs, LmrsParams};
use crate::vehicle::perception::Perception;
use crate::vehicle::GtuAttributes;
use crate::{GtuSet, GtuTypeId, LaneId};
use rand::RngCore;
use rand_distr::{Distribution, Normal};
use std::fmt::Debug;
use std::rc::Rc;

/// The behavioural models and route of a new GTU.
#[derive(Debug)]
pub struct Planner {
    pub car_following: Box<dyn CarFollowingModel>,
    pub lane_change: Box<dyn LaneChangeModel>,
    pub route: Rc<Route>,
}

/// Produces a [Planner] for each generated GTU.
pub trait PlannerFactory: Debug {
    fn create(
        &mut self,
        network: &Network,
        config: &SimulationConfig,
        gtu_type: GtuTypeId,
        rng: &mut dyn RngCore,
    ) -> Result<Planner, NetworkError>;
}

/// Equips every GTU with IDM+ car following and LMRS lane changing,
/// keeping to the side of the road set in the [SimulationConfig].
///
/// The desired speed adherence can vary between drivers, following a normal
/// distribution around 1 that is clamped to `[0.75, 1.25]`.
#[derive(Debug)]
pub struct StandardPlannerFactory {
    idm: IdmParams,
    lmrs: LmrsParams,
    speed_factor: Option<Normal<f64>>,
    routes: Box<dyn RouteGenerator>,
}

impl StandardPlannerFactory {
    pub fn new(routes: impl RouteGenerator + 'static) -> Self {
        Self {
            idm: *IdmPlus::default().params(),
            lmrs: LmrsParams::default(),
            speed_factor: None,
            routes: Box::new(routes),
        }
    }

    pub fn with_idm(mut self, params: IdmParams) -> Self {
        self.idm = params;
        self
    }

    pub fn with_lmrs(mut self, params: LmrsParams) -> Self {
        self.lmrs = params;
        self
    }

    /// Randomises each driver's desired speed adherence.
    pub fn with_speed_factor_stddev(mut self, stddev: f64) -> SimResult<Self> {
        if !(stddev.is_finite() && stddev >= 0.0) {
            return Err(SimError::Config(format!(
                "invalid speed factor standard deviation {stddev}"
            )));
        }
        let distr = Normal::new(1.0, stddev).map_err(|err| SimError::Config(err.to_string()))?;
        self.speed_factor = Some(distr);
        Ok(self)
    }
}

impl PlannerFactory for StandardPlannerFactory {
    fn create(
        &mut self,
        network: &Network,
        config: &SimulationConfig,
        gtu_type: GtuTypeId,
        rng: &mut dyn RngCore,
    ) -> Result<Planner, NetworkError> {
        let route = self.routes.generate(network, gtu_type, rng)?;
        let mut idm = self.idm;
        if let Some(distr) = &self.speed_factor {
            idm.delta *= distr.sample(rng).clamp(0.75, 1.25);
        }
        Ok(Planner {
            car_following: Box::new(IdmPlus::new(idm)),
            lane_change: Box::new(Lmrs::new(self.lmrs, config.handedness)),
            route,
        })
    }
}

/// Inserts GTUs at the start of a lane at a fixed headway.
#[derive(Debug)]
pub struct VehicleGenerator {
    lane: LaneId,
    headway: f64,
    attributes: GtuAttributes,
    initial_speed: f64,
    factory: Box<dyn PlannerFactory>,
    limit: Option<usize>,
    generated: usize,
}

impl VehicleGenerator {
    /// Creates a generator that inserts a GTU every `headway` seconds.
    pub fn new(
        lane: LaneId,
        headway: f64,
        attributes: GtuAttributes,
        factory: impl PlannerFactory + 'static,
    ) -> Self {
        Self {
            lane,
            headway,
            attributes,
            initial_speed: 0.0,
            factory: Box::new(factory),
            limit: None,
            generated: 0,
        }
    }

    /// Sets the speed of the generated GTUs in m/s.
    pub fn with_initial_speed(mut self, speed: f64) -> Self {
        self.initial_speed = speed;
        self
    }

    /// Stops generating after `limit` GTUs.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn lane(&self) -> LaneId {
        self.lane
    }

    /// The time between generated GTUs in s.
    pub fn headway(&self) -> f64 {
        self.headway
    }

    pub fn attributes(&self) -> &GtuAttributes {
        &self.attributes
    }

    pub fn initial_speed(&self) -> f64 {
        self.initial_speed
    }

    /// The number of GTUs generated so far.
    pub fn generated(&self) -> usize {
        self.generated
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit.map_or(false, |limit| self.generated >= limit)
    }

    /// Prepares the next GTU, or returns `None` if the entry of the lane is occupied.
    /// The GTU's front is placed one vehicle length into the lane.
    pub(crate) fn next_vehicle(
        &mut self,
        network: &Network,
        gtus: &GtuSet,
        config: &SimulationConfig,
        now: f64,
        rng: &mut dyn RngCore,
    ) -> SimResult<Option<Planner>> {
        let planner = self
            .factory
            .create(network, config, self.attributes.gtu_type, rng)?;

        let front = self.attributes.length;
        let perception = Perception::new(
            network,
            gtus,
            self.attributes.gtu_type,
            None,
            self.attributes.length,
            now,
            config.forward_headway,
            config.reverse_headway,
        );
        let traffic = perception.lane_traffic(self.lane, front);
        if traffic
            .headways()
            .iter()
            .any(|h| h.overlaps(self.attributes.length))
        {
            return Ok(None);
        }

        let state = FollowerState {
            length: self.attributes.length,
            speed: self.initial_speed,
            max_speed: self.attributes.max_speed,
        };
        let cf = &planner.car_following;
        let acc = cf
            .compute_acceleration(
                &state,
                traffic.headways(),
                network.lane(self.lane).speed_limit(),
                now,
            )
            .acceleration;
        if acc < -cf.comfortable_deceleration() {
            return Ok(None);
        }

        self.generated += 1;
        Ok(Some(planner))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::{LaneAttributes, LinkType};
    use crate::route::FixedRouteGenerator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn speed_factor_is_clamped() {
        let mut net = Network::new();
        let car = net.add_gtu_type("car");
        let a = net.add_node("a");
        let b = net.add_node("b");
        let link = net.add_link(a, b, LinkType::Ordinary);
        net.add_lane(link, &LaneAttributes::new(100.0, 30.0));

        let route = Route::new(vec![a, b]).unwrap();
        let mut factory = StandardPlannerFactory::new(FixedRouteGenerator::new(route))
            .with_speed_factor_stddev(10.0)
            .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let planner = factory
                .create(&net, &SimulationConfig::default(), car, &mut rng)
                .unwrap();
            let v0 = planner.car_following.desired_speed(30.0, f64::INFINITY);
            assert!((0.75 * 30.0..=1.25 * 30.0).contains(&v0));
            assert_eq!(planner.route.destination(), b);
        }
    }

    #[test]
    fn invalid_speed_factor_is_rejected() {
        let mut net = Network::new();
        let a = net.add_node("a");
        let b = net.add_node("b");
        net.add_link(a, b, LinkType::Ordinary);
        let factory = || {
            StandardPlannerFactory::new(FixedRouteGenerator::new(Route::new(vec![a, b]).unwrap()))
        };

        for stddev in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                factory().with_speed_factor_stddev(stddev),
                Err(SimError::Config(_))
            ));
        }
        assert!(factory().with_speed_factor_stddev(0.0).is_ok());
    }
}
