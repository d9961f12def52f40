//! Layers and layer sets.

use serde::{Deserialize, Serialize};

use crate::path::{Point2, Polygon};

/// One horizontal cross-section's worth of outlines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Layer index (0 = first layer).
    pub index: usize,
    /// Layer height (mm), or the index when no height is known.
    pub z: f64,
    /// Outlines in insertion (toolpath) order.
    pub polygons: Vec<Polygon>,
}

impl Layer {
    /// Create a new empty layer.
    pub fn new(index: usize, z: f64) -> Self {
        Self {
            index,
            z,
            polygons: Vec::new(),
        }
    }

    /// Total number of points in this layer.
    pub fn point_count(&self) -> usize {
        self.polygons.iter().map(Polygon::len).sum()
    }

    /// Does the layer hold no points at all?
    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    /// Iterate over every point of every polygon.
    pub fn points(&self) -> impl Iterator<Item = &Point2> {
        self.polygons.iter().flat_map(|p| p.points.iter())
    }
}

/// Axis-aligned planar bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds2 {
    /// Minimum corner.
    pub min: Point2,
    /// Maximum corner.
    pub max: Point2,
}

impl Bounds2 {
    /// Center of the box.
    pub fn center(&self) -> Point2 {
        nalgebra::center(&self.min, &self.max)
    }
}

/// Ordered sequence of layers, bottom to top.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerSet {
    /// The layers, heights non-decreasing.
    pub layers: Vec<Layer>,
}

impl LayerSet {
    /// Create an empty layer set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if there are no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Iterate over layers.
    pub fn iter(&self) -> std::slice::Iter<'_, Layer> {
        self.layers.iter()
    }

    /// Total number of points across all layers.
    pub fn point_count(&self) -> usize {
        self.layers.iter().map(Layer::point_count).sum()
    }

    /// Total number of polygons across all layers.
    pub fn polygon_count(&self) -> usize {
        self.layers.iter().map(|l| l.polygons.len()).sum()
    }

    /// Bounding box of all points, or `None` when there are none.
    pub fn bounds(&self) -> Option<Bounds2> {
        let mut points = self.layers.iter().flat_map(Layer::points);
        let first = *points.next()?;
        let mut bounds = Bounds2 {
            min: first,
            max: first,
        };
        for p in points {
            bounds.min.x = bounds.min.x.min(p.x);
            bounds.min.y = bounds.min.y.min(p.y);
            bounds.max.x = bounds.max.x.max(p.x);
            bounds.max.y = bounds.max.y.max(p.y);
        }
        Some(bounds)
    }
}

impl From<Vec<Layer>> for LayerSet {
    fn from(layers: Vec<Layer>) -> Self {
        Self { layers }
    }
}

impl IntoIterator for LayerSet {
    type Item = Layer;
    type IntoIter = std::vec::IntoIter<Layer>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.into_iter()
    }
}

impl<'a> IntoIterator for &'a LayerSet {
    type Item = &'a Layer;
    type IntoIter = std::slice::Iter<'a, Layer>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let mut layer = Layer::new(0, 0.0);
        layer.polygons.push(Polygon::new(vec![
            Point2::new(-1.0, 2.0),
            Point2::new(3.0, -4.0),
        ]));
        let mut upper = Layer::new(1, 0.2);
        upper.polygons.push(Polygon::new(vec![Point2::new(5.0, 0.0)]));
        let set = LayerSet::from(vec![layer, upper]);

        let bounds = set.bounds().unwrap();
        assert_eq!(bounds.min, Point2::new(-1.0, -4.0));
        assert_eq!(bounds.max, Point2::new(5.0, 2.0));
        assert_eq!(bounds.center(), Point2::new(2.0, -1.0));
        assert_eq!(set.point_count(), 3);
        assert_eq!(set.polygon_count(), 2);
    }

    #[test]
    fn test_bounds_empty() {
        let set = LayerSet::from(vec![Layer::new(0, 0.0)]);
        assert!(set.bounds().is_none());
        assert!(set.layers[0].is_empty());
    }
}
