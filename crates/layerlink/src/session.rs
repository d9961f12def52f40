//! End-to-end slicing calls against an engine.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bridge::{BufferBridge, RawModelBuffer, SliceEngine};
use crate::decode::decode_with_height;
use crate::error::Result;
use crate::layer::LayerSet;
use crate::normalize::center;
use crate::toolpath::reconstruct;
use crate::SliceSettings;

/// Output of a toolpath slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toolpath {
    /// The motion-instruction stream as rendered by the engine.
    pub gcode: String,
    /// Outlines recovered from `gcode`.
    pub layers: LayerSet,
}

/// A slicing session over one engine.
///
/// Each call transfers the model in, parses it, slices, and releases the
/// model region again, whether or not the call succeeded.
pub struct Slicer<E: SliceEngine> {
    bridge: BufferBridge<E>,
    settings: SliceSettings,
}

impl<E: SliceEngine> Slicer<E> {
    /// Create a session with validated settings.
    pub fn new(engine: E, settings: SliceSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            bridge: BufferBridge::new(engine),
            settings,
        })
    }

    /// Settings in use.
    pub fn settings(&self) -> &SliceSettings {
        &self.settings
    }

    /// The underlying bridge.
    pub fn bridge(&self) -> &BufferBridge<E> {
        &self.bridge
    }

    /// Slice a model into per-layer point sequences.
    pub fn slice_points(&mut self, model: RawModelBuffer) -> Result<LayerSet> {
        let layer_height = self.settings.layer_height;
        let stream = self.with_model(model, |bridge| bridge.slice_points(layer_height as f32))?;
        let layers = decode_with_height(&stream, layer_height)?;
        Ok(self.finish(layers))
    }

    /// Slice a model into a motion-instruction stream and its outlines.
    pub fn slice_toolpath(&mut self, model: RawModelBuffer) -> Result<Toolpath> {
        let layer_height = self.settings.layer_height;
        let gcode = self.with_model(model, |bridge| bridge.render_toolpath(layer_height as f32))?;
        let layers = reconstruct(&gcode)?;
        Ok(Toolpath {
            gcode,
            layers: self.finish(layers),
        })
    }

    fn with_model<T>(
        &mut self,
        model: RawModelBuffer,
        call: impl FnOnce(&mut BufferBridge<E>) -> Result<T>,
    ) -> Result<T> {
        if let Some(declared) = model.declared_triangles() {
            debug!(declared, bytes = model.len(), "handing model to engine");
        }

        let handle = self.bridge.transfer_in(model)?;
        let result = self.bridge.parse(&handle).and_then(|triangles| {
            debug!(triangles, "engine parsed model");
            call(&mut self.bridge)
        });
        let released = self.bridge.release(handle);

        let value = result?;
        released?;
        Ok(value)
    }

    fn finish(&self, layers: LayerSet) -> LayerSet {
        debug!(
            layers = layers.len(),
            polygons = layers.polygon_count(),
            points = layers.point_count(),
            "sliced"
        );
        if self.settings.center {
            center(&layers)
        } else {
            layers
        }
    }
}
