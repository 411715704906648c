use crate::config::SimulationConfig;
use crate::error::{GtuError, NetworkError, SimResult};
use crate::generator::{Planner, VehicleGenerator};
use crate::math::Point2d;
use crate::network::{LateralDirection, Network};
use crate::route::RouteNavigator;
use crate::scheduler::{EventQueue, SimEvent};
use crate::vehicle::{tactical, Gtu, GtuAttributes, LanePosition};
use crate::{GtuId, GtuSet, LaneId};
use rand::rngs::StdRng;
use rand::SeedableRng;
#[cfg(feature = "serde")]
use serde::Serialize;

/// A lane-based traffic simulation driven by discrete events.
pub struct Simulation {
    /// The road network, including the occupants of each lane
    network: Network,
    /// The GTUs in the simulation
    gtus: GtuSet,
    /// Pending events
    queue: EventQueue<SimEvent>,
    /// The vehicle generators
    generators: Vec<VehicleGenerator>,
    config: SimulationConfig,
    rng: StdRng,
    /// The number of GTUs that left the network
    exited: usize,
}

/// The state of a GTU at a point in time.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct GtuSnapshot {
    pub id: GtuId,
    /// The lanes the GTU occupies from rear to front, with the position of its front on each.
    pub lanes: Vec<LanePosition>,
    pub speed: f64,
    pub acceleration: f64,
    pub odometer: f64,
    /// The world coordinates of the GTU's front.
    pub world: Point2d,
}

impl Simulation {
    /// Creates a new simulation on the given network.
    pub fn new(network: Network, config: SimulationConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            network,
            gtus: GtuSet::with_key(),
            queue: EventQueue::new(),
            generators: vec![],
            config,
            rng,
            exited: 0,
        }
    }

    /// The current simulation time in s.
    pub fn time(&self) -> f64 {
        self.queue.simulator_time()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The number of GTUs that left the network so far.
    pub fn exited_count(&self) -> usize {
        self.exited
    }

    /// Places a GTU with its front at `front` m along `lane` and schedules its first evaluation.
    ///
    /// The lane must be compatible with the GTU type, and its link must be on the route.
    pub fn add_gtu(
        &mut self,
        attributes: &GtuAttributes,
        planner: Planner,
        lane: LaneId,
        front: f64,
        speed: f64,
    ) -> SimResult<GtuId> {
        let lane_ref = self.network.lane(lane);
        if !lane_ref.lane_type().is_compatible(attributes.gtu_type) {
            return Err(GtuError::IncompatibleLane { lane }.into());
        }

        // Move the navigator's cursor to the start of the link
        let link = self.network.link(lane_ref.link());
        let mut navigator = RouteNavigator::new(planner.route);
        while navigator.last_visited_node() != link.start() {
            navigator
                .visit_next_node()
                .map_err(|_| NetworkError::NotOnRoute { node: link.start() })?;
        }
        if navigator.next_node_to_visit() != Some(link.end()) {
            return Err(NetworkError::NotOnRoute { node: link.end() }.into());
        }

        let now = self.time();
        let position = LanePosition { lane, front };
        let id = self.gtus.insert_with_key(|id| {
            Gtu::new(
                id,
                attributes,
                navigator,
                planner.car_following,
                planner.lane_change,
                position,
                speed,
                now,
            )
        });
        self.network.add_gtu(lane, id);
        log::debug!("GTU {:?} created on lane {:?} at {:.1} m", id, lane, front);

        self.queue.schedule_event_abs(
            now,
            SimEvent::Move {
                gtu: id,
                generation: 0,
            },
        )?;
        Ok(id)
    }

    /// Removes a GTU from the simulation. Its pending evaluation is discarded.
    pub fn remove_gtu(&mut self, id: GtuId) -> SimResult<Gtu> {
        let gtu = self.gtus.remove(id).ok_or(GtuError::UnknownGtu(id))?;
        for lp in gtu.lanes() {
            self.network.remove_gtu(lp.lane, id);
        }
        log::debug!("GTU {:?} destroyed", id);
        Ok(gtu)
    }

    /// Adds a vehicle generator, which fires for the first time now.
    pub fn add_generator(&mut self, generator: VehicleGenerator) -> SimResult<usize> {
        let idx = self.generators.len();
        self.generators.push(generator);
        self.queue
            .schedule_event_rel(0.0, SimEvent::Generate { generator: idx })?;
        Ok(idx)
    }

    pub fn generator(&self, idx: usize) -> Option<&VehicleGenerator> {
        self.generators.get(idx)
    }

    /// Gets a reference to the GTU with the given ID.
    pub fn get_gtu(&self, id: GtuId) -> Option<&Gtu> {
        self.gtus.get(id)
    }

    /// Gets an iterator over all GTUs in the simulation.
    pub fn iter_gtus(&self) -> impl Iterator<Item = &Gtu> {
        self.gtus.values()
    }

    /// Fires the next event. Returns false if there are no more events.
    pub fn step(&mut self) -> bool {
        let Some((time, event)) = self.queue.pop() else {
            return false;
        };
        match event {
            SimEvent::Move { gtu, generation } => {
                let current = self.gtus.get(gtu).map(|g| g.generation());
                if current != Some(generation) {
                    log::trace!("Dropped stale evaluation of GTU {:?}", gtu);
                    return true;
                }
                if let Err(err) = self.move_gtu(gtu, time) {
                    log::error!("GTU {:?} terminated at {:.2} s: {}", gtu, time, err);
                    self.remove_gtu(gtu).ok();
                }
            }
            SimEvent::Generate { generator } => {
                if let Err(err) = self.fire_generator(generator) {
                    log::error!("Generator {} failed at {:.2} s: {}", generator, time, err);
                }
            }
        }
        true
    }

    /// Fires all events up to and including time `t`, then advances the clock to `t`.
    pub fn run_until(&mut self, t: f64) {
        while self.queue.peek_time().map_or(false, |next| next <= t) {
            self.step();
        }
        self.queue.advance_to(t);
    }

    /// Captures the state of every GTU at the current time.
    pub fn snapshot(&self) -> Vec<GtuSnapshot> {
        let now = self.time();
        self.gtus
            .iter()
            .map(|(id, gtu)| {
                let dist = gtu.distance_at(now);
                let lanes: Vec<_> = gtu
                    .lanes()
                    .iter()
                    .map(|lp| LanePosition {
                        lane: lp.lane,
                        front: lp.front + dist,
                    })
                    .collect();
                let front = gtu.reference_position();
                let world = self
                    .network
                    .lane(front.lane)
                    .world_position(front.front + dist);
                GtuSnapshot {
                    id,
                    lanes,
                    speed: gtu.speed_at(now),
                    acceleration: gtu.acceleration(),
                    odometer: gtu.odometer() + dist,
                    world,
                }
            })
            .collect()
    }

    /// Captures the state of every GTU as JSON.
    #[cfg(feature = "serde")]
    pub fn snapshot_json(&self) -> serde_json::Value {
        serde_json::json!({
            "time": self.time(),
            "gtus": self.snapshot(),
        })
    }

    fn fire_generator(&mut self, idx: usize) -> SimResult<()> {
        let now = self.time();
        let generator = &mut self.generators[idx];
        if generator.is_exhausted() {
            return Ok(());
        }
        let headway = generator.headway();
        let next = generator.next_vehicle(
            &self.network,
            &self.gtus,
            &self.config,
            now,
            &mut self.rng,
        );
        self.queue
            .schedule_event_rel(headway, SimEvent::Generate { generator: idx })?;

        match next? {
            Some(planner) => {
                let attributes = *generator.attributes();
                let (lane, speed) = (generator.lane(), generator.initial_speed());
                self.add_gtu(&attributes, planner, lane, attributes.length, speed)?;
            }
            None => log::debug!("Generator {} postponed, entry is occupied", idx),
        }
        Ok(())
    }

    /// Evaluates a GTU: advances it to `now`, updates its lanes, plans and reschedules.
    fn move_gtu(&mut self, id: GtuId, now: f64) -> SimResult<()> {
        self.gtus
            .get_mut(id)
            .ok_or(GtuError::UnknownGtu(id))?
            .commit(now);

        if !self.advance_front(id)? {
            return Ok(());
        }
        self.leave_passed_lanes(id)?;

        let step = tactical::plan(&self.network, &self.gtus, &self.config, id, now)?;
        if let Some(direction) = step.lane_change {
            self.change_lanes(id, direction);
        }

        let gtu = &mut self.gtus[id];
        let generation = gtu.apply(step.step, self.config.max_deceleration);
        gtu.set_indicator(step.indicator);
        log::trace!(
            "GTU {:?} at {:.2} s: v = {:.2} m/s, a = {:.2} m/s^2",
            id,
            now,
            gtu.speed(),
            gtu.acceleration()
        );
        let next = gtu.next_evaluation();
        self.queue.schedule_event_abs(
            next,
            SimEvent::Move {
                gtu: id,
                generation,
            },
        )?;
        Ok(())
    }

    /// Registers the GTU on the lanes its front has entered.
    /// Returns false if the GTU left the network.
    fn advance_front(&mut self, id: GtuId) -> SimResult<bool> {
        loop {
            let gtu = &self.gtus[id];
            let front = gtu.reference_position();
            let lane = self.network.lane(front.lane);
            if front.front <= lane.length() {
                return Ok(true);
            }

            let link = self.network.link(lane.link());
            let navigator = gtu.navigator();
            let at_destination = navigator.next_node_to_visit() == Some(link.end())
                && navigator.last_visited_index() + 2 == navigator.route().len();
            let next_lanes = self.network.next_lanes(front.lane, gtu.gtu_type());
            let next = match next_lanes.as_slice() {
                _ if at_destination => None,
                [] => None,
                [next] => Some(*next),
                candidates => {
                    let to = navigator.next_link(&self.network, lane.link(), gtu.gtu_type())?;
                    let next = candidates
                        .iter()
                        .copied()
                        .find(|c| self.network.lane(*c).link() == to)
                        .ok_or(NetworkError::NoConnectingLane {
                            from: lane.link(),
                            to,
                        })?;
                    Some(next)
                }
            };

            let Some(next) = next else {
                if at_destination || self.network.links_out(link.end()).is_empty() {
                    log::debug!("GTU {:?} left the network at {:?}", id, link.end());
                } else {
                    log::warn!("GTU {:?} ran off the end of lane {:?}", id, front.lane);
                }
                self.remove_gtu(id)?;
                self.exited += 1;
                return Ok(false);
            };

            let overshoot = front.front - lane.length();
            let next_start = self.network.link(self.network.lane(next).link()).start();
            let gtu = &mut self.gtus[id];
            gtu.enter_lane(next, overshoot)?;
            if gtu.navigator().next_node_to_visit() == Some(next_start) {
                gtu.navigator_mut().visit_next_node()?;
            }
            self.network.add_gtu(next, id);
        }
    }

    /// Deregisters the GTU from the lanes its rear has left.
    fn leave_passed_lanes(&mut self, id: GtuId) -> SimResult<()> {
        let gtu = &self.gtus[id];
        let passed: Vec<LaneId> = gtu.lanes()[..gtu.lanes().len() - 1]
            .iter()
            .filter(|lp| lp.front - gtu.length() >= self.network.lane(lp.lane).length())
            .map(|lp| lp.lane)
            .collect();
        for lane in passed {
            self.gtus[id].leave_lane(lane)?;
            self.network.remove_gtu(lane, id);
        }
        Ok(())
    }

    fn change_lanes(&mut self, id: GtuId, direction: LateralDirection) {
        let gtu = &mut self.gtus[id];
        let (left, entered) = gtu.change_lanes(&self.network, direction);
        for lane in left {
            self.network.remove_gtu(lane, id);
        }
        for lane in &entered {
            self.network.add_gtu(*lane, id);
        }
        log::debug!("GTU {:?} changed lanes {:?} to {:?}", id, direction, entered);
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("time", &self.time())
            .field("gtus", &self.gtus.len())
            .field("events", &self.queue.len())
            .field("generators", &self.generators.len())
            .finish()
    }
}
