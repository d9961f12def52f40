//! Planar point and outline types.

use serde::{Deserialize, Serialize};

/// A planar coordinate in millimeters.
pub type Point2 = nalgebra::Point2<f64>;

/// A planar offset in millimeters.
pub type Vec2 = nalgebra::Vector2<f64>;

/// Two points closer than this (per axis) are the same point.
pub const COINCIDENT_EPS: f64 = 1e-9;

/// Are two points coincident?
pub fn coincident(a: &Point2, b: &Point2) -> bool {
    (a.x - b.x).abs() <= COINCIDENT_EPS && (a.y - b.y).abs() <= COINCIDENT_EPS
}

/// An ordered point sequence within a layer.
///
/// Outlines recovered from a motion stream are built with [`Polygon::closed`]
/// and always end on their first point. Point-stream layers carry their raw
/// point sequence as a single, unvalidated polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    /// Vertices in toolpath order.
    pub points: Vec<Point2>,
}

impl Polygon {
    /// Create a polygon from raw points, without validation.
    pub fn new(points: Vec<Point2>) -> Self {
        Self { points }
    }

    /// Close an outline and validate it.
    ///
    /// Appends the first point if the last one is not already on it. Returns
    /// `None` when the outline has fewer than 3 distinct vertices.
    pub fn closed(mut points: Vec<Point2>) -> Option<Self> {
        let first = *points.first()?;
        let last = *points.last()?;
        if !coincident(&first, &last) {
            points.push(first);
        }
        let polygon = Self { points };
        (polygon.distinct_count() >= 3).then_some(polygon)
    }

    /// Check if the polygon is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of stored points (including a closing duplicate).
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Does the sequence end where it starts?
    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => self.points.len() > 1 && coincident(first, last),
            _ => false,
        }
    }

    /// Number of distinct vertices.
    pub fn distinct_count(&self) -> usize {
        let mut sorted = self.points.clone();
        sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        sorted.dedup_by(|a, b| coincident(a, b));
        sorted.len()
    }

    /// Length of the path through all stored points, in order.
    pub fn path_length(&self) -> f64 {
        self.points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
    }

    /// A copy moved by `offset`.
    pub fn translated(&self, offset: &Vec2) -> Self {
        Self {
            points: self.points.iter().map(|p| p + offset).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ]
    }

    #[test]
    fn test_closed_appends_first_point() {
        let polygon = Polygon::closed(square()).unwrap();
        assert_eq!(polygon.len(), 5);
        assert!(polygon.is_closed());
        assert_eq!(polygon.points[4], Point2::new(0.0, 0.0));
    }

    #[test]
    fn test_closed_keeps_existing_closure() {
        let mut points = square();
        points.push(Point2::new(0.0, 0.0));
        let polygon = Polygon::closed(points).unwrap();
        assert_eq!(polygon.len(), 5);
    }

    #[test]
    fn test_closed_rejects_degenerate() {
        assert!(Polygon::closed(Vec::new()).is_none());
        let there_and_back = vec![
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 0.0),
            Point2::new(0.0, 0.0),
        ];
        assert!(Polygon::closed(there_and_back).is_none());
    }

    #[test]
    fn test_path_length() {
        let polygon = Polygon::closed(square()).unwrap();
        assert!((polygon.path_length() - 40.0).abs() < 1e-10);
    }

    #[test]
    fn test_serializes_as_point_list() {
        let polygon = Polygon::new(vec![Point2::new(1.0, 2.0)]);
        let json = serde_json::to_string(&polygon).unwrap();
        assert_eq!(json, "[[1.0,2.0]]");
    }
}
