//! Slice result decoding.
//!
//! The engine returns every layer's points in one flat `f32` array of
//! `x, y` pairs. Layers are separated in-band by a sentinel pair; this module
//! is the only place that knows its value.

use tracing::debug;

use crate::error::{Result, SliceError};
use crate::layer::{Layer, LayerSet};
use crate::path::{Point2, Polygon};

/// Coordinate value of the layer separator pair `(-9999, -9999)`.
pub const LAYER_SENTINEL: f32 = -9999.0;

fn is_sentinel(x: f32, y: f32) -> bool {
    x == LAYER_SENTINEL && y == LAYER_SENTINEL
}

/// Decode a flat point stream, using each layer's index as its height.
pub fn decode(stream: &[f32]) -> Result<LayerSet> {
    decode_with_height(stream, 1.0)
}

/// Decode a flat point stream into layers at `index * layer_height`.
///
/// Each layer holds its points as a single sequence. A sentinel commits the
/// current layer even if it is empty; points left after the last sentinel
/// form a final layer. `layer_height` must lie in `(0, 1]` mm.
pub fn decode_with_height(stream: &[f32], layer_height: f64) -> Result<LayerSet> {
    if !(layer_height > 0.0 && layer_height <= 1.0) {
        return Err(SliceError::InvalidSettings(
            "layer_height must be between 0 and 1mm".into(),
        ));
    }
    if stream.len() % 2 != 0 {
        return Err(SliceError::MalformedStream {
            values: stream.len(),
        });
    }

    let mut layers = Vec::new();
    let mut current = Vec::new();

    for pair in stream.chunks_exact(2) {
        let (x, y) = (pair[0], pair[1]);
        if is_sentinel(x, y) {
            layers.push(make_layer(layers.len(), layer_height, std::mem::take(&mut current)));
        } else {
            current.push(Point2::new(f64::from(x), f64::from(y)));
        }
    }

    if !current.is_empty() {
        layers.push(make_layer(layers.len(), layer_height, current));
    }

    debug!(
        values = stream.len(),
        layers = layers.len(),
        "decoded point stream"
    );

    Ok(LayerSet::from(layers))
}

fn make_layer(index: usize, layer_height: f64, points: Vec<Point2>) -> Layer {
    let mut layer = Layer::new(index, index as f64 * layer_height);
    if !points.is_empty() {
        layer.polygons.push(Polygon::new(points));
    }
    layer
}

#[cfg(test)]
mod tests {
    use super::*;

    const S: f32 = LAYER_SENTINEL;

    fn layer_points(set: &LayerSet, index: usize) -> Vec<(f64, f64)> {
        set.layers[index].points().map(|p| (p.x, p.y)).collect()
    }

    #[test]
    fn test_two_layers() {
        let set = decode(&[0.0, 0.0, 1.0, 1.0, S, S, 2.0, 2.0]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(layer_points(&set, 0), vec![(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(layer_points(&set, 1), vec![(2.0, 2.0)]);
        assert_eq!(set.layers[1].index, 1);
    }

    #[test]
    fn test_empty_stream() {
        let set = decode(&[]).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_no_sentinel_is_one_layer() {
        let set = decode(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0]).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.point_count(), 3);
    }

    #[test]
    fn test_consecutive_sentinels_keep_empty_layer() {
        let set = decode(&[0.0, 0.0, S, S, S, S, 2.0, 2.0]).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.layers[1].is_empty());
        assert!(set.layers[1].polygons.is_empty());
        assert_eq!(layer_points(&set, 2), vec![(2.0, 2.0)]);
    }

    #[test]
    fn test_trailing_sentinel() {
        let set = decode(&[0.0, 0.0, 1.0, 1.0, S, S]).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_leading_sentinel_commits_empty_layer() {
        let set = decode(&[S, S, 1.0, 1.0]).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.layers[0].is_empty());
    }

    #[test]
    fn test_odd_length_is_malformed() {
        let err = decode(&[0.0, 0.0, 1.0]).unwrap_err();
        assert_eq!(err, SliceError::MalformedStream { values: 3 });
    }

    #[test]
    fn test_half_sentinel_is_a_point() {
        let set = decode(&[S, 0.0, 1.0, 1.0]).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.point_count(), 2);
    }

    #[test]
    fn test_point_count_matches_stream() {
        let stream = [
            0.0, 0.0, 1.0, 0.0, S, S, 2.0, 2.0, S, S, S, S, 3.0, 3.0, 4.0, 4.0, 5.0, 5.0,
        ];
        let sentinels = stream
            .chunks_exact(2)
            .filter(|p| is_sentinel(p[0], p[1]))
            .count();
        let set = decode(&stream).unwrap();
        assert_eq!(set.point_count(), stream.len() / 2 - sentinels);
    }

    #[test]
    fn test_rejects_bad_layer_height() {
        for layer_height in [0.0, -0.2, 1.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                decode_with_height(&[0.0, 0.0, S, S, 1.0, 1.0], layer_height),
                Err(SliceError::InvalidSettings(_))
            ));
        }
    }

    #[test]
    fn test_scaled_heights() {
        let set = decode_with_height(&[0.0, 0.0, S, S, 1.0, 1.0, S, S, 2.0, 2.0], 0.2).unwrap();
        let heights: Vec<f64> = set.iter().map(|l| l.z).collect();
        assert_eq!(heights.len(), 3);
        assert!((heights[2] - 0.4).abs() < 1e-12);
        assert!(heights.windows(2).all(|w| w[0] <= w[1]));
    }
}
