use crate::math::{Point2d, Polyline2d};
use crate::{GtuId, GtuTypeId, LaneId, LinkId};
use smallvec::SmallVec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single lane of a [crate::Link].
#[derive(Clone, Debug)]
pub struct Lane {
    id: LaneId,
    link: LinkId,
    length: f64,
    speed_limit: f64,
    lane_type: LaneType,
    centre_line: Polyline2d,
    next: SmallVec<[LaneId; 2]>,
    prev: SmallVec<[LaneId; 2]>,
    left: Option<LaneId>,
    right: Option<LaneId>,
    /// The GTUs with at least part of their body on this lane.
    gtus: Vec<GtuId>,
}

/// The attributes of a lane.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LaneAttributes {
    /// The length of the lane in m.
    pub length: f64,
    /// The speed limit in m/s.
    pub speed_limit: f64,
    /// The GTU types allowed on the lane.
    pub lane_type: LaneType,
    /// The centre line in world coordinates.
    /// When absent, the lane is laid out along the x axis.
    pub centre_line: Option<Polyline2d>,
}

/// The set of GTU types that may use a lane.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LaneType {
    /// Every GTU type may use the lane.
    #[default]
    Any,
    /// Only the listed GTU types may use the lane.
    Only(SmallVec<[GtuTypeId; 4]>),
    /// No GTU may use the lane, e.g. a closed lane.
    Closed,
}

impl LaneType {
    /// Creates a lane type restricted to the given GTU types.
    pub fn only(types: impl IntoIterator<Item = GtuTypeId>) -> Self {
        Self::Only(types.into_iter().collect())
    }

    /// Whether a GTU of the given type may use the lane.
    pub fn is_compatible(&self, gtu_type: GtuTypeId) -> bool {
        match self {
            Self::Any => true,
            Self::Only(types) => types.contains(&gtu_type),
            Self::Closed => false,
        }
    }
}

impl LaneAttributes {
    /// Creates the attributes of a lane open to all GTU types.
    pub fn new(length: f64, speed_limit: f64) -> Self {
        Self {
            length,
            speed_limit,
            lane_type: LaneType::Any,
            centre_line: None,
        }
    }
}

impl Lane {
    pub(crate) fn new(id: LaneId, link: LinkId, attribs: &LaneAttributes) -> Self {
        let centre_line = attribs.centre_line.clone().unwrap_or_else(|| {
            Polyline2d::straight(Point2d::new(0.0, 0.0), Point2d::new(attribs.length, 0.0))
        });
        Self {
            id,
            link,
            length: attribs.length,
            speed_limit: attribs.speed_limit,
            lane_type: attribs.lane_type.clone(),
            centre_line,
            next: SmallVec::new(),
            prev: SmallVec::new(),
            left: None,
            right: None,
            gtus: vec![],
        }
    }

    /// Gets the lane's ID.
    pub fn id(&self) -> LaneId {
        self.id
    }

    /// The link the lane belongs to.
    pub fn link(&self) -> LinkId {
        self.link
    }

    /// The length of the lane in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The speed limit of the lane in m/s.
    pub fn speed_limit(&self) -> f64 {
        self.speed_limit
    }

    pub fn lane_type(&self) -> &LaneType {
        &self.lane_type
    }

    pub fn centre_line(&self) -> &Polyline2d {
        &self.centre_line
    }

    /// All successor lanes, regardless of GTU type.
    pub fn next(&self) -> &[LaneId] {
        &self.next
    }

    /// All predecessor lanes, regardless of GTU type.
    pub fn prev(&self) -> &[LaneId] {
        &self.prev
    }

    /// The lane directly to the left, if there is one.
    pub fn left(&self) -> Option<LaneId> {
        self.left
    }

    /// The lane directly to the right, if there is one.
    pub fn right(&self) -> Option<LaneId> {
        self.right
    }

    /// The GTUs currently registered on the lane.
    pub fn gtus(&self) -> &[GtuId] {
        &self.gtus
    }

    /// Maps a longitudinal position on the lane to world coordinates.
    /// The centre line is stretched to the lane's nominal length.
    pub fn world_position(&self, pos: f64) -> Point2d {
        let scale = if self.length > 0.0 {
            self.centre_line.length() / self.length
        } else {
            1.0
        };
        self.centre_line.sample(pos * scale).0
    }

    pub(crate) fn add_next(&mut self, lane: LaneId) {
        if !self.next.contains(&lane) {
            self.next.push(lane);
        }
    }

    pub(crate) fn add_prev(&mut self, lane: LaneId) {
        if !self.prev.contains(&lane) {
            self.prev.push(lane);
        }
    }

    pub(crate) fn set_left(&mut self, lane: LaneId) {
        self.left = Some(lane);
    }

    pub(crate) fn set_right(&mut self, lane: LaneId) {
        self.right = Some(lane);
    }

    /// Registers a GTU on the lane. Returns false if it was already registered.
    pub(crate) fn add_gtu(&mut self, gtu: GtuId) -> bool {
        if self.gtus.contains(&gtu) {
            false
        } else {
            self.gtus.push(gtu);
            true
        }
    }

    /// Deregisters a GTU from the lane. Returns false if it was not registered.
    pub(crate) fn remove_gtu(&mut self, gtu: GtuId) -> bool {
        let len = self.gtus.len();
        self.gtus.retain(|id| *id != gtu);
        self.gtus.len() != len
    }
}
