//! Buffer bridge between the host and the engine's linear memory.
//!
//! The engine is a foreign module with its own address space. Everything the
//! host hands it goes through [`BufferBridge`], which owns the single model
//! region the engine is allowed to see and hands out opaque [`EngineHandle`]s
//! in place of raw offsets.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace, warn};

use crate::error::{Result, SliceError};

/// Foreign ABI of the slicing engine.
///
/// Offsets are byte addresses in the engine's linear memory; `0` is null.
/// Implementations only translate calls; the bridge enforces ownership.
pub trait SliceEngine {
    /// Allocate `len` bytes. Returns `0` when the engine is out of memory.
    fn malloc(&mut self, len: u32) -> Result<u32>;

    /// Free a region returned by [`SliceEngine::malloc`].
    fn free(&mut self, offset: u32) -> Result<()>;

    /// Copy `bytes` into engine memory at `offset`.
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<()>;

    /// Copy `len` bytes out of engine memory at `offset`.
    fn read(&self, offset: u32, len: u32) -> Result<Vec<u8>>;

    /// `parseModel(bufferOffset, length) -> triangleCount`; `<= 0` is failure.
    fn parse_model(&mut self, offset: u32, len: u32) -> Result<i32>;

    /// `slice(layerHeightMm, outCountOffset) -> pointsOffset`.
    ///
    /// Writes the number of points (sentinels included) as an `i32` at
    /// `out_count` and returns the offset of `2 * count` `f32` values.
    fn slice(&mut self, layer_height: f32, out_count: u32) -> Result<u32>;

    /// `renderToolpath(layerHeightMm) -> text`.
    fn render_toolpath(&mut self, layer_height: f32) -> Result<String>;
}

/// A binary triangulated model, as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModelBuffer {
    bytes: Vec<u8>,
}

impl RawModelBuffer {
    /// Size of the binary STL header plus triangle count.
    pub const HEADER_LEN: usize = 84;

    /// Wrap raw model bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Triangle count declared in the binary STL header, if there is one.
    pub fn declared_triangles(&self) -> Option<u32> {
        let count = self.bytes.get(80..Self::HEADER_LEN)?;
        Some(u32::from_le_bytes([count[0], count[1], count[2], count[3]]))
    }
}

impl From<Vec<u8>> for RawModelBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for RawModelBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

/// Opaque reference to a model region in engine memory.
///
/// Not `Clone`: releasing consumes the handle.
#[derive(Debug, PartialEq, Eq)]
pub struct EngineHandle {
    id: u64,
    offset: u32,
    len: u32,
}

impl EngineHandle {
    /// Length of the region in bytes.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Check if the region is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Handle ids are unique across all bridges, so a handle from one bridge
/// never matches a region of another.
static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    id: u64,
    offset: u32,
    len: u32,
}

/// Owner of the engine and of the one model region it may hold.
pub struct BufferBridge<E: SliceEngine> {
    engine: E,
    outstanding: Option<Region>,
}

impl<E: SliceEngine> BufferBridge<E> {
    /// Wrap an engine.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            outstanding: None,
        }
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Is a model region currently held by the engine?
    pub fn has_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Copy a model into engine memory.
    ///
    /// A previously transferred region is released first, so its handle goes
    /// stale.
    pub fn transfer_in(&mut self, model: RawModelBuffer) -> Result<EngineHandle> {
        if let Some(previous) = self.outstanding.take() {
            debug!(id = previous.id, "releasing previous model region");
            self.engine.free(previous.offset)?;
        }

        let requested = model.len();
        let len = u32::try_from(requested).map_err(|_| SliceError::Allocation { requested })?;
        // malloc(0) may legitimately return null.
        let offset = self.engine.malloc(len.max(1))?;
        if offset == 0 {
            return Err(SliceError::Allocation { requested });
        }

        if let Err(err) = self.engine.write(offset, model.as_bytes()) {
            if let Err(free_err) = self.engine.free(offset) {
                warn!(%free_err, "failed to free model region after write error");
            }
            return Err(err);
        }

        let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
        self.outstanding = Some(Region { id, offset, len });
        debug!(id, offset, len, "model transferred to engine");

        Ok(EngineHandle { id, offset, len })
    }

    /// Free a model region. Stale or unknown handles are ignored.
    pub fn release(&mut self, handle: EngineHandle) -> Result<()> {
        match self.outstanding {
            Some(region) if region.id == handle.id => {
                self.outstanding = None;
                debug!(id = region.id, "model region released");
                self.engine.free(region.offset)
            }
            _ => {
                trace!(id = handle.id, "ignoring release of stale handle");
                Ok(())
            }
        }
    }

    /// Ask the engine to parse the model behind `handle`.
    ///
    /// Returns the triangle count; a count `<= 0` is a parse failure.
    pub fn parse(&mut self, handle: &EngineHandle) -> Result<u32> {
        let region = self.current(handle)?;
        let triangles = self.engine.parse_model(region.offset, region.len)?;
        if triangles <= 0 {
            return Err(SliceError::ParseFailure { triangles });
        }
        Ok(triangles as u32)
    }

    /// Slice the parsed model and copy the flat point stream out.
    pub fn slice_points(&mut self, layer_height: f32) -> Result<Vec<f32>> {
        const COUNT_LEN: u32 = 4;
        let cell = self.engine.malloc(COUNT_LEN)?;
        if cell == 0 {
            return Err(SliceError::Allocation {
                requested: COUNT_LEN as usize,
            });
        }

        let stream = self.read_stream(layer_height, cell);
        self.engine.free(cell)?;
        stream
    }

    /// Render the parsed model as a motion-instruction stream.
    pub fn render_toolpath(&mut self, layer_height: f32) -> Result<String> {
        self.engine.render_toolpath(layer_height)
    }

    fn current(&self, handle: &EngineHandle) -> Result<Region> {
        match self.outstanding {
            Some(region) if region.id == handle.id => Ok(region),
            _ => Err(SliceError::StaleHandle),
        }
    }

    fn read_stream(&mut self, layer_height: f32, cell: u32) -> Result<Vec<f32>> {
        let points = self.engine.slice(layer_height, cell)?;

        let raw = self.engine.read(cell, 4)?;
        let count = i32::from_le_bytes(le_word(&raw, "slice")?);
        let count = u32::try_from(count)
            .map_err(|_| SliceError::engine("slice", format!("negative point count {count}")))?;

        if count == 0 {
            return Ok(Vec::new());
        }
        if points == 0 {
            return Err(SliceError::engine(
                "slice",
                format!("null point buffer for {count} points"),
            ));
        }

        let byte_len = count
            .checked_mul(8)
            .ok_or_else(|| SliceError::engine("slice", format!("point count {count} too large")))?;
        let bytes = self.engine.read(points, byte_len)?;
        let stream: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        debug!(points = count, "copied point stream out of engine");
        Ok(stream)
    }
}

impl<E: SliceEngine> Drop for BufferBridge<E> {
    fn drop(&mut self) {
        if let Some(region) = self.outstanding.take() {
            if let Err(err) = self.engine.free(region.offset) {
                debug!(%err, "failed to free model region on drop");
            }
        }
    }
}

fn le_word(raw: &[u8], call: &'static str) -> Result<[u8; 4]> {
    raw.get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| SliceError::engine(call, "short read"))
}
