#![warn(missing_docs)]

//! Host-side bridge to an external mesh slicing engine.
//!
//! The engine lives in its own linear memory and speaks a small offset-based
//! ABI ([`SliceEngine`]). This crate moves model bytes into that memory,
//! decodes the sentinel-delimited point stream it returns, recovers closed
//! outlines from its motion-instruction output, and centers the result for
//! display.
//!
//! # Example
//!
//! ```ignore
//! use layerlink::{RawModelBuffer, SliceSettings, Slicer};
//!
//! let engine = /* anything implementing SliceEngine */;
//! let mut slicer = Slicer::new(engine, SliceSettings::default())?;
//! let layers = slicer.slice_points(RawModelBuffer::new(std::fs::read("part.stl")?))?;
//!
//! println!("Layers: {}", layers.len());
//! ```

pub mod bridge;
pub mod decode;
pub mod error;
pub mod layer;
pub mod normalize;
pub mod path;
pub mod session;
pub mod toolpath;

pub use bridge::{BufferBridge, EngineHandle, RawModelBuffer, SliceEngine};
pub use decode::{decode, decode_with_height, LAYER_SENTINEL};
pub use error::{Result, SliceError};
pub use layer::{Bounds2, Layer, LayerSet};
pub use normalize::{center, translate};
pub use path::{Point2, Polygon, Vec2};
pub use session::{Slicer, Toolpath};
pub use toolpath::{reconstruct, MotionCommand, Reconstructor, State};

use serde::{Deserialize, Serialize};

/// Slicing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceSettings {
    /// Layer height passed to the engine (mm).
    pub layer_height: f64,
    /// Center decoded layers on the origin.
    pub center: bool,
}

impl Default for SliceSettings {
    fn default() -> Self {
        Self {
            layer_height: 0.2,
            center: true,
        }
    }
}

impl SliceSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !(self.layer_height > 0.0 && self.layer_height <= 1.0) {
            return Err(SliceError::InvalidSettings(
                "layer_height must be between 0 and 1mm".into(),
            ));
        }
        Ok(())
    }
}
