//! Mathematical structs and functions.

use cgmath::{Point2, Vector2};
pub use polyline::Polyline2d;

mod polyline;

/// A 2D point
pub type Point2d = Point2<f64>;

/// A 2D vector
pub type Vector2d = Vector2<f64>;

/// Rotates a vector 90 degrees clockwise.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}
