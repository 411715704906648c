use super::{rot90, Point2d, Vector2d};
use cgmath::prelude::*;
use itertools::Itertools;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A piecewise linear curve, used as the centre line of a lane.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Polyline2d {
    points: Vec<Point2d>,
    /// Cumulative arc length at each point.
    lengths: Vec<f64>,
}

impl Polyline2d {
    /// Creates a polyline through the given points.
    /// Consecutive duplicate points are discarded.
    pub fn new(points: impl IntoIterator<Item = Point2d>) -> Self {
        let points: Vec<Point2d> = points.into_iter().dedup().collect();
        let mut lengths = Vec::with_capacity(points.len());
        let mut total = 0.0;
        lengths.push(total);
        for (a, b) in points.iter().tuple_windows() {
            total += (b - a).magnitude();
            lengths.push(total);
        }
        lengths.truncate(points.len().max(1));
        Self { points, lengths }
    }

    /// Creates a straight polyline between two points.
    pub fn straight(start: Point2d, end: Point2d) -> Self {
        Self::new([start, end])
    }

    /// The total arc length of the polyline.
    pub fn length(&self) -> f64 {
        self.lengths.last().copied().unwrap_or(0.0)
    }

    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    /// Samples the point at the given distance along the polyline,
    /// along with the unit tangent at that point.
    ///
    /// Distances outside the polyline are extrapolated along the first or last segment.
    pub fn sample(&self, dist: f64) -> (Point2d, Vector2d) {
        match self.points.len() {
            0 => (Point2d::new(0.0, 0.0), Vector2d::unit_x()),
            1 => (self.points[0], Vector2d::unit_x()),
            n => {
                let idx = match self.lengths.binary_search_by(|l| l.total_cmp(&dist)) {
                    Ok(idx) | Err(idx) => idx.clamp(1, n - 1),
                };
                let (p0, p1) = (self.points[idx - 1], self.points[idx]);
                let tangent = (p1 - p0).normalize();
                (p0 + tangent * (dist - self.lengths[idx - 1]), tangent)
            }
        }
    }

    /// Samples the point at the given distance along the polyline,
    /// offset laterally to the left by `offset`.
    pub fn sample_offset(&self, dist: f64, offset: f64) -> Point2d {
        let (pos, tangent) = self.sample(dist);
        pos + rot90(tangent) * offset
    }
}
