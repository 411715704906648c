//! A lane-based microscopic traffic simulation.
//!
//! Vehicles ("GTUs") drive over a network of nodes, links and lanes. Every
//! vehicle is re-evaluated at discrete times by its tactical planner, which
//! combines an IDM+ car-following model, an LMRS-style lane change model and
//! a route navigator that scores how suitable each lane is for staying on
//! the vehicle's route.

pub use cgmath;
pub use config::{Handedness, SimulationConfig};
pub use error::{GtuError, NetworkError, SimError, SimResult};
pub use generator::{Planner, PlannerFactory, StandardPlannerFactory, VehicleGenerator};
pub use network::{
    GtuType, Lane, LaneAttributes, LaneType, LateralDirection, Link, LinkType, Network, Node,
};
pub use route::{
    lane_drop, suitability, FixedRouteGenerator, OdRouteGenerator, ProbabilisticRouteGenerator,
    Route, RouteGenerator, RouteNavigator, GET_OFF_THIS_LANE_NOW, NO_LANE_CHANGE_NEEDED,
};
pub use scheduler::{EventQueue, SimEvent};
pub use simulation::{GtuSnapshot, Simulation};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use util::Interval;
pub use vehicle::following::{
    AccelerationStep, CarFollowingModel, FixedAcceleration, FollowerState, Headway, Idm,
    IdmParams, IdmPlus,
};
pub use vehicle::lane_change::{
    anticipated_speed, check_lane_change, theta, GapCheck, Indicator, LaneChangeInput,
    LaneChangeModel, LaneMovementStep, Lmrs, LmrsParams, NoLaneChange,
};
pub use vehicle::perception::LaneTraffic;
pub use vehicle::tactical::{leave_desire, route_incentive};
pub use vehicle::{Gtu, GtuAttributes, LanePosition};

mod config;
mod error;
mod generator;
pub mod math;
mod network;
mod route;
mod scheduler;
mod simulation;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Node].
    pub struct NodeId;
    /// Unique ID of a [Link].
    pub struct LinkId;
    /// Unique ID of a [Lane].
    pub struct LaneId;
    /// Unique ID of a [GtuType].
    pub struct GtuTypeId;
    /// Unique ID of a [Gtu].
    pub struct GtuId;
}

type NodeSet = SlotMap<NodeId, Node>;
type LinkSet = SlotMap<LinkId, Link>;
type LaneSet = SlotMap<LaneId, Lane>;
type GtuSet = SlotMap<GtuId, Gtu>;
