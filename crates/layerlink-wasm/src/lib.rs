//! WASM bindings for layerlink.
//!
//! The slicing engine is an Emscripten module living next to this one in the
//! page. [`EmscriptenEngine`] drives it through its exported functions and
//! heap view; the rest of this crate exposes decoding and slicing to the
//! viewer as plain JS values.

use js_sys::{Array, Function, Reflect, Uint8Array};
use layerlink::{
    LayerSet, RawModelBuffer, SliceEngine, SliceError, SliceSettings, Slicer, Toolpath,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Initialize panic hook for better error messages.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_error(e: impl ToString) -> JsError {
    JsError::new(&e.to_string())
}

/// Slicer settings for WASM.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen]
pub struct WasmSliceSettings {
    /// Layer height (mm).
    pub layer_height: f64,
    /// Center layers on the origin.
    pub center: bool,
}

#[wasm_bindgen]
impl WasmSliceSettings {
    /// Create default settings.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        SliceSettings::default().into()
    }

    /// Create from JSON.
    #[wasm_bindgen(js_name = fromJson)]
    pub fn from_json(json: &str) -> Result<WasmSliceSettings, JsError> {
        serde_json::from_str(json).map_err(js_error)
    }

    /// Convert to JSON.
    #[wasm_bindgen(js_name = toJson)]
    pub fn to_json(&self) -> Result<String, JsError> {
        serde_json::to_string(self).map_err(js_error)
    }
}

impl Default for WasmSliceSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl From<SliceSettings> for WasmSliceSettings {
    fn from(settings: SliceSettings) -> Self {
        Self {
            layer_height: settings.layer_height,
            center: settings.center,
        }
    }
}

impl From<WasmSliceSettings> for SliceSettings {
    fn from(settings: WasmSliceSettings) -> Self {
        Self {
            layer_height: settings.layer_height,
            center: settings.center,
        }
    }
}

/// An Emscripten-compiled engine, reached through its module object.
///
/// The heap view is looked up on every access: the engine may grow its
/// memory during a call, which detaches the previous view.
pub struct EmscriptenEngine {
    module: JsValue,
}

impl EmscriptenEngine {
    const MALLOC: &'static str = "_malloc";
    const FREE: &'static str = "_free";
    const PARSE: &'static str = "_parseSTL";
    const SLICE: &'static str = "_slice";
    const TOOLPATH: &'static str = "getGcode";
    const HEAP: &'static str = "HEAPU8";

    /// Wrap a loaded module object.
    pub fn new(module: JsValue) -> Self {
        Self { module }
    }

    fn call(&self, name: &'static str, args: &[JsValue]) -> layerlink::Result<JsValue> {
        let function: Function = Reflect::get(&self.module, &JsValue::from_str(name))
            .ok()
            .and_then(|f| f.dyn_into().ok())
            .ok_or_else(|| SliceError::engine(name, "not exported"))?;
        let args: Array = args.iter().collect();
        function
            .apply(&self.module, &args)
            .map_err(|e| SliceError::engine(name, describe(&e)))
    }

    fn call_u32(&self, name: &'static str, args: &[JsValue]) -> layerlink::Result<u32> {
        self.call(name, args)?
            .as_f64()
            .map(|n| n as u32)
            .ok_or_else(|| SliceError::engine(name, "returned a non-number"))
    }

    fn heap(&self) -> layerlink::Result<Uint8Array> {
        Reflect::get(&self.module, &JsValue::from_str(Self::HEAP))
            .ok()
            .and_then(|heap| heap.dyn_into().ok())
            .ok_or_else(|| SliceError::engine(Self::HEAP, "heap view missing"))
    }

    fn region(&self, offset: u32, len: usize) -> layerlink::Result<Uint8Array> {
        let heap = self.heap()?;
        let end = u32::try_from(len)
            .ok()
            .and_then(|len| offset.checked_add(len))
            .filter(|&end| end <= heap.length())
            .ok_or(SliceError::OutOfBounds { offset, len })?;
        Ok(heap.subarray(offset, end))
    }
}

fn describe(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

impl SliceEngine for EmscriptenEngine {
    fn malloc(&mut self, len: u32) -> layerlink::Result<u32> {
        self.call_u32(Self::MALLOC, &[len.into()])
    }

    fn free(&mut self, offset: u32) -> layerlink::Result<()> {
        self.call(Self::FREE, &[offset.into()]).map(|_| ())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> layerlink::Result<()> {
        self.region(offset, bytes.len())?.copy_from(bytes);
        Ok(())
    }

    fn read(&self, offset: u32, len: u32) -> layerlink::Result<Vec<u8>> {
        Ok(self.region(offset, len as usize)?.to_vec())
    }

    fn parse_model(&mut self, offset: u32, len: u32) -> layerlink::Result<i32> {
        self.call(Self::PARSE, &[offset.into(), len.into()])?
            .as_f64()
            .map(|n| n as i32)
            .ok_or_else(|| SliceError::engine(Self::PARSE, "returned a non-number"))
    }

    fn slice(&mut self, layer_height: f32, out_count: u32) -> layerlink::Result<u32> {
        self.call_u32(Self::SLICE, &[layer_height.into(), out_count.into()])
    }

    fn render_toolpath(&mut self, layer_height: f32) -> layerlink::Result<String> {
        self.call(Self::TOOLPATH, &[layer_height.into()])?
            .as_string()
            .ok_or_else(|| SliceError::engine(Self::TOOLPATH, "returned a non-string"))
    }
}

/// A slicing session bound to one engine module.
#[wasm_bindgen]
pub struct WasmSlicer {
    inner: Slicer<EmscriptenEngine>,
}

#[wasm_bindgen]
impl WasmSlicer {
    /// Create a session over a loaded engine module.
    #[wasm_bindgen(constructor)]
    pub fn new(module: JsValue, settings: &WasmSliceSettings) -> Result<WasmSlicer, JsError> {
        let inner = Slicer::new(EmscriptenEngine::new(module), settings.clone().into())
            .map_err(js_error)?;
        Ok(Self { inner })
    }

    /// Slice model bytes into per-layer point sequences.
    #[wasm_bindgen(js_name = slicePoints)]
    pub fn slice_points(&mut self, model: Vec<u8>) -> Result<JsValue, JsError> {
        let layers = self
            .inner
            .slice_points(RawModelBuffer::new(model))
            .map_err(js_error)?;
        serde_wasm_bindgen::to_value(&layers).map_err(js_error)
    }

    /// Slice model bytes into `{ gcode, layers }`.
    #[wasm_bindgen(js_name = sliceToolpath)]
    pub fn slice_toolpath(&mut self, model: Vec<u8>) -> Result<JsValue, JsError> {
        let toolpath: Toolpath = self
            .inner
            .slice_toolpath(RawModelBuffer::new(model))
            .map_err(js_error)?;
        serde_wasm_bindgen::to_value(&toolpath).map_err(js_error)
    }
}

/// Decode a sentinel-delimited point stream.
#[wasm_bindgen(js_name = decodeSlice)]
pub fn decode_slice(stream: &[f32], layer_height: f64) -> Result<JsValue, JsError> {
    let layers = layerlink::decode_with_height(stream, layer_height).map_err(js_error)?;
    serde_wasm_bindgen::to_value(&layers).map_err(js_error)
}

/// Center layers on the origin.
#[wasm_bindgen(js_name = centerLayers)]
pub fn center_layers(layers: JsValue) -> Result<JsValue, JsError> {
    let layers: LayerSet = serde_wasm_bindgen::from_value(layers).map_err(js_error)?;
    serde_wasm_bindgen::to_value(&layerlink::center(&layers)).map_err(js_error)
}

/// Recover closed outlines from a motion-instruction stream.
#[wasm_bindgen(js_name = reconstructToolpath)]
pub fn reconstruct_toolpath(gcode: &str) -> Result<JsValue, JsError> {
    let layers = layerlink::reconstruct(gcode).map_err(js_error)?;
    serde_wasm_bindgen::to_value(&layers).map_err(js_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = WasmSliceSettings::new();
        assert!((settings.layer_height - 0.2).abs() < 0.01);
        assert!(settings.center);
    }

    #[test]
    fn test_settings_convert() {
        let settings = WasmSliceSettings {
            layer_height: 0.3,
            center: false,
        };
        let core: SliceSettings = settings.into();
        assert_eq!(core.layer_height, 0.3);
        assert!(!core.center);
        assert!(core.validate().is_ok());
    }
}
