//! Toolpath reconstruction from a motion-instruction stream.
//!
//! A motion stream never says "start outline" or "end outline"; outlines are
//! implied by extrusion switching on and off. The reconstructor is a small
//! state machine over the stream's lines:
//!
//! | state       | extruding move | non-extruding move |
//! |-------------|----------------|--------------------|
//! | `NoLayer`   | travel         | travel             |
//! | `Idle`      | start outline  | travel             |
//! | `Extruding` | extend outline | stop outline       |
//!
//! A layer marker always lands in `Idle`, dropping any outline in progress.

use tracing::trace;

use crate::error::{Result, SliceError};
use crate::layer::{Layer, LayerSet};
use crate::path::{Point2, Polygon};

/// Prefix of the comment line that opens a new layer, e.g. `;LAYER:3`.
pub const LAYER_MARKER: &str = "LAYER:";

/// One parsed motion instruction. Absent fields keep their last value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionCommand {
    /// Target X (mm).
    pub x: Option<f64>,
    /// Target Y (mm).
    pub y: Option<f64>,
    /// Target Z (mm).
    pub z: Option<f64>,
    /// Extrusion amount.
    pub e: Option<f64>,
}

impl MotionCommand {
    /// Does this move deposit material?
    pub fn is_extruding(&self) -> bool {
        matches!(self.e, Some(e) if e > 0.0)
    }
}

/// Classification of a single line of the stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    /// `;LAYER:<index>` marker.
    LayerMarker(usize),
    /// `G0`/`G1` move.
    Motion(MotionCommand),
    /// Comments, blank lines and every other command.
    Ignored,
}

/// Parse one line. `line_no` is 1-based and only used for error reporting.
pub fn parse_line(line: &str, line_no: usize) -> Result<Instruction> {
    let line = line.trim();

    if let Some(comment) = line.strip_prefix(';') {
        let Some(index) = comment.trim_start().strip_prefix(LAYER_MARKER) else {
            return Ok(Instruction::Ignored);
        };
        let index = index.trim().parse().map_err(|_| SliceError::Command {
            line: line_no,
            message: format!("invalid layer index `{}`", index.trim()),
        })?;
        return Ok(Instruction::LayerMarker(index));
    }

    // Inline comments end the command.
    let code = line.split(';').next().unwrap_or_default();
    let mut words = code.split_whitespace();

    match words.next().map(|op| op.to_ascii_uppercase()).as_deref() {
        Some("G0" | "G1" | "G00" | "G01") => {}
        _ => return Ok(Instruction::Ignored),
    }

    let mut command = MotionCommand::default();
    for word in words {
        let mut chars = word.chars();
        let Some(letter) = chars.next() else { continue };
        let slot = match letter.to_ascii_uppercase() {
            'X' => &mut command.x,
            'Y' => &mut command.y,
            'Z' => &mut command.z,
            'E' => &mut command.e,
            _ => continue,
        };
        let value: f64 = chars.as_str().parse().map_err(|_| SliceError::Command {
            line: line_no,
            message: format!("invalid value in `{word}`"),
        })?;
        *slot = Some(value);
    }

    Ok(Instruction::Motion(command))
}

/// Reconstructor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// No layer marker seen yet.
    #[default]
    NoLayer,
    /// Inside a layer, not extruding.
    Idle,
    /// Inside a layer, extruding an outline.
    Extruding,
}

/// What a move does to the open outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to record.
    Travel,
    /// Open an outline at the pre-move position.
    Start,
    /// Append the post-move position.
    Continue,
    /// Close and commit (or discard) the open outline.
    Stop,
}

impl State {
    /// Transition for a move with the given extrusion state.
    pub fn on_motion(self, extruding: bool) -> (State, Transition) {
        match (self, extruding) {
            (State::NoLayer, _) => (State::NoLayer, Transition::Travel),
            (State::Idle, false) => (State::Idle, Transition::Travel),
            (State::Idle, true) => (State::Extruding, Transition::Start),
            (State::Extruding, true) => (State::Extruding, Transition::Continue),
            (State::Extruding, false) => (State::Idle, Transition::Stop),
        }
    }
}

/// Incremental toolpath reconstructor.
#[derive(Debug, Default)]
pub struct Reconstructor {
    state: State,
    position: [f64; 3],
    layer: Option<Layer>,
    z_fixed: bool,
    outline: Option<Vec<Point2>>,
    layers: Vec<Layer>,
}

impl Reconstructor {
    /// Create a reconstructor at the origin with no open layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Feed one line of the stream.
    pub fn feed(&mut self, line: &str, line_no: usize) -> Result<()> {
        match parse_line(line, line_no)? {
            Instruction::LayerMarker(index) => self.begin_layer(index),
            Instruction::Motion(command) => self.apply(&command),
            Instruction::Ignored => {}
        }
        Ok(())
    }

    /// Apply a motion command.
    pub fn apply(&mut self, command: &MotionCommand) {
        let before = self.planar();
        let [x, y, z] = &mut self.position;
        *x = command.x.unwrap_or(*x);
        *y = command.y.unwrap_or(*y);
        *z = command.z.unwrap_or(*z);
        let after = self.planar();

        let (state, transition) = self.state.on_motion(command.is_extruding());
        self.state = state;

        match transition {
            Transition::Travel => {}
            Transition::Start => self.outline = Some(vec![before, after]),
            Transition::Continue => {
                if let Some(outline) = &mut self.outline {
                    outline.push(after);
                }
            }
            Transition::Stop => self.end_outline(),
        }

        // Z follows travel until the layer's first extruding move.
        if let Some(layer) = &mut self.layer {
            if !self.z_fixed {
                layer.z = self.position[2];
                self.z_fixed = command.is_extruding();
            }
        }
    }

    /// Commit the open layer (if any) and start a new one.
    pub fn begin_layer(&mut self, index: usize) {
        if let Some(outline) = self.outline.take() {
            trace!(layer = index, points = outline.len(), "dropping outline cut by layer marker");
        }
        if let Some(layer) = self.layer.take() {
            self.layers.push(layer);
        }
        self.layer = Some(Layer::new(index, self.position[2]));
        self.z_fixed = false;
        self.state = State::Idle;
    }

    /// Finish the stream. An outline still open counts as stopped here.
    pub fn finish(mut self) -> LayerSet {
        self.end_outline();
        if let Some(layer) = self.layer.take() {
            self.layers.push(layer);
        }
        LayerSet::from(self.layers)
    }

    fn planar(&self) -> Point2 {
        Point2::new(self.position[0], self.position[1])
    }

    fn end_outline(&mut self) {
        let Some(points) = self.outline.take() else {
            return;
        };
        let count = points.len();
        let polygon = if count > 2 { Polygon::closed(points) } else { None };
        match (polygon, &mut self.layer) {
            (Some(polygon), Some(layer)) => layer.polygons.push(polygon),
            _ => trace!(points = count, "discarding degenerate outline"),
        }
    }
}

/// Reconstruct per-layer closed outlines from a motion-instruction stream.
pub fn reconstruct(stream: &str) -> Result<LayerSet> {
    let mut reconstructor = Reconstructor::new();
    for (i, line) in stream.lines().enumerate() {
        reconstructor.feed(line, i + 1)?;
    }
    let layers = reconstructor.finish();
    tracing::debug!(
        layers = layers.len(),
        polygons = layers.polygon_count(),
        "reconstructed toolpath"
    );
    Ok(layers)
}
