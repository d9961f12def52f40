//! Recentering of layer geometry for display.

use crate::layer::{Layer, LayerSet};
use crate::path::{Vec2, COINCIDENT_EPS};

/// Translate every point so the combined planar bounding box is centered
/// on the origin.
///
/// Heights, layer structure and point counts are preserved. A set with no
/// points, or one already centered to within rounding, is returned unchanged.
pub fn center(layers: &LayerSet) -> LayerSet {
    let Some(bounds) = layers.bounds() else {
        return layers.clone();
    };
    let offset = -bounds.center().coords;
    let extent = (bounds.max - bounds.min).amax().max(1.0);
    if offset.amax() <= COINCIDENT_EPS * extent {
        return layers.clone();
    }
    translate(layers, &offset)
}

/// Translate every point of every layer by `offset`.
pub fn translate(layers: &LayerSet, offset: &Vec2) -> LayerSet {
    layers
        .iter()
        .map(|layer| Layer {
            index: layer.index,
            z: layer.z,
            polygons: layer.polygons.iter().map(|p| p.translated(offset)).collect(),
        })
        .collect::<Vec<_>>()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{Point2, Polygon};
    use approx::assert_relative_eq;

    fn sample() -> LayerSet {
        let mut bottom = Layer::new(0, 0.2);
        bottom.polygons.push(Polygon::new(vec![
            Point2::new(10.0, 20.0),
            Point2::new(30.0, 20.0),
            Point2::new(30.0, 60.0),
        ]));
        let empty = Layer::new(1, 0.4);
        let mut top = Layer::new(2, 0.6);
        top.polygons.push(Polygon::new(vec![Point2::new(12.0, 25.0)]));
        LayerSet::from(vec![bottom, empty, top])
    }

    #[test]
    fn test_center_moves_bbox_to_origin() {
        let centered = center(&sample());
        let bounds = centered.bounds().unwrap();
        assert_relative_eq!(bounds.min.x, -10.0);
        assert_relative_eq!(bounds.max.x, 10.0);
        assert_relative_eq!(bounds.min.y, -20.0);
        assert_relative_eq!(bounds.max.y, 20.0);
    }

    #[test]
    fn test_center_preserves_structure() {
        let input = sample();
        let centered = center(&input);
        assert_eq!(centered.len(), input.len());
        for (a, b) in input.iter().zip(centered.iter()) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.z, b.z);
            assert_eq!(a.point_count(), b.point_count());
        }
        // Uniform shift: every point moves by the same amount.
        let shifts: Vec<_> = input
            .iter()
            .flat_map(Layer::points)
            .zip(centered.iter().flat_map(Layer::points))
            .map(|(a, b)| a - b)
            .collect();
        assert!(shifts.iter().all(|s| (s - shifts[0]).norm() < 1e-12));
    }

    #[test]
    fn test_center_is_idempotent() {
        let once = center(&sample());
        let twice = center(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_center_is_idempotent_for_fractional_coordinates() {
        let mut layer = Layer::new(0, 0.2);
        layer.polygons.push(Polygon::new(vec![
            Point2::new(0.1, 0.1),
            Point2::new(0.7, 0.7),
            Point2::new(0.3, 1.7),
            Point2::new(2.9, 0.35),
        ]));
        let set = LayerSet::from(vec![layer]);

        let once = center(&set);
        let twice = center(&once);
        assert_eq!(once, twice);

        let bounds = once.bounds().unwrap();
        assert_relative_eq!(bounds.min.x, -bounds.max.x, epsilon = 1e-12);
        assert_relative_eq!(bounds.min.y, -bounds.max.y, epsilon = 1e-12);
    }

    #[test]
    fn test_center_without_points_is_identity() {
        let set = LayerSet::from(vec![Layer::new(0, 0.0), Layer::new(1, 1.0)]);
        assert_eq!(center(&set), set);
        assert_eq!(center(&LayerSet::new()), LayerSet::new());
    }

    #[test]
    fn test_center_does_not_mutate_input() {
        let input = sample();
        let copy = input.clone();
        let _ = center(&input);
        assert_eq!(input, copy);
    }
}
