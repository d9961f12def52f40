//! Error types for the slicing bridge.

use thiserror::Error;

/// Errors that can occur while talking to the engine or decoding its output.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SliceError {
    /// The engine could not allocate a region of the requested size.
    #[error("engine could not allocate {requested} bytes")]
    Allocation {
        /// Number of bytes that was requested.
        requested: usize,
    },

    /// The flat point stream does not consist of whole coordinate pairs.
    #[error("malformed point stream: {values} values is not a whole number of pairs")]
    MalformedStream {
        /// Number of float values in the stream.
        values: usize,
    },

    /// The engine rejected the model buffer.
    #[error("engine failed to parse model (triangle count {triangles})")]
    ParseFailure {
        /// Triangle count reported by the engine (always <= 0).
        triangles: i32,
    },

    /// A foreign call into the engine failed or returned garbage.
    #[error("engine call `{call}` failed: {message}")]
    Engine {
        /// Name of the engine entry point.
        call: &'static str,
        /// What went wrong.
        message: String,
    },

    /// A model handle that was already released or replaced.
    #[error("stale model handle")]
    StaleHandle,

    /// Access outside the engine's linear memory.
    #[error("engine memory access out of bounds: {len} bytes at offset {offset}")]
    OutOfBounds {
        /// Start offset of the access.
        offset: u32,
        /// Length of the access in bytes.
        len: usize,
    },

    /// A motion or layer-marker line carries a value that is not a number.
    #[error("line {line}: {message}")]
    Command {
        /// 1-based line number in the command stream.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// Invalid slice settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

impl SliceError {
    /// Shorthand for an [`SliceError::Engine`] error.
    pub fn engine(call: &'static str, message: impl Into<String>) -> Self {
        Self::Engine {
            call,
            message: message.into(),
        }
    }
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, SliceError>;
