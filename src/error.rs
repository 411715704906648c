//! Error types.
//!
//! Topology inconsistencies and kinematic precondition violations are
//! reported through these enums. Expected network conditions (dead ends,
//! single-lane links, an empty leader set, overlapping vehicles) are not
//! errors and are handled with sentinel values where they occur.

use thiserror::Error;

use crate::{GtuId, LaneId, LinkId, NodeId};

/// An inconsistency in the network topology or in a route through it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NetworkError {
    #[error("no lanes on link {link:?} are compatible with the GTU type")]
    NoCompatibleLanes { link: LinkId },

    #[error("more than one link leads from node {node:?} to route node {next:?}")]
    AmbiguousRoute { node: NodeId, next: NodeId },

    #[error("lane {lane:?} ends and there is no compatible adjacent lane that continues")]
    LaneEnds { lane: LaneId },

    #[error("cannot determine the link that continues the route after link {link:?}")]
    NoContinuation { link: LinkId },

    #[error("no lane on link {from:?} connects to link {to:?}")]
    NoConnectingLane { from: LinkId, to: LinkId },

    #[error("node {node:?} is not on the remaining route")]
    NotOnRoute { node: NodeId },

    #[error("no route from {from:?} to {to:?}")]
    NoRoute { from: NodeId, to: NodeId },

    #[error("a route must contain at least one node")]
    EmptyRoute,

    #[error("the route has already reached its destination")]
    RouteCompleted,
}

/// A violated precondition on a GTU's kinematic state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GtuError {
    #[error("GTU {gtu:?} is not on lane {lane:?}")]
    NotOnLane { gtu: GtuId, lane: LaneId },

    #[error("GTU {gtu:?} is already registered on lane {lane:?}")]
    AlreadyOnLane { gtu: GtuId, lane: LaneId },

    #[error("GTU {0:?} does not exist")]
    UnknownGtu(GtuId),

    #[error("lane {lane:?} is not compatible with the type of the GTU")]
    IncompatibleLane { lane: LaneId },
}

/// Any error raised while running a simulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Gtu(#[from] GtuError),

    #[error("cannot schedule an event at {time} s, the simulator is already at {now} s")]
    EventInPast { time: f64, now: f64 },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Shorthand result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;
