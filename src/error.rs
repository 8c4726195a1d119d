//! Error types for level loading, mesh decoding and GPU resource management
//!
//! Each stage of the pipeline has its own error enum so callers can decide
//! which failures are recoverable. Only [`RenderError::ShaderCompile`] is
//! fatal: without compiled programs no frame can be produced.

use std::path::PathBuf;

use thiserror::Error;

use crate::gfx::device::ShaderStage;

/// Failures while reading a level description file.
#[derive(Error, Debug)]
pub enum LevelError {
    /// The level file itself could not be opened.
    #[error("game level not found: {}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read level file: {0}")]
    Io(#[from] std::io::Error),
    /// Input ended in the middle of a `MESH` record.
    #[error("level file ended inside the record for '{name}'")]
    Truncated { name: String },
    #[error("malformed transform on line {line}: {text:?}")]
    MalformedTransform { line: usize, text: String },
    #[error("object name {0:?} does not name a mesh asset")]
    InvalidName(String),
}

/// Failures while decoding an H2B mesh asset.
#[derive(Error, Debug)]
pub enum AssetError {
    /// Missing or unreadable asset file.
    #[error("H2B not found: {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported H2B version tag {0:02x?}")]
    UnsupportedVersion([u8; 4]),
    #[error("H2B data ends while reading {0}")]
    Truncated(&'static str),
    #[error("submesh '{name}' draws indices {start}..{end} but only {available} exist")]
    DrawRangeOutOfBounds {
        name: String,
        start: u64,
        end: u64,
        available: usize,
    },
    #[error("submesh '{name}' uses material {index} but only {available} exist")]
    MaterialOutOfBounds {
        name: String,
        index: u32,
        available: usize,
    },
    #[error("index {index} addresses past the {available} vertices")]
    IndexOutOfBounds { index: u32, available: usize },
    #[error("H2B string is not valid UTF-8")]
    InvalidString,
}

/// Failures reported by a graphics device or by the draw protocol.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A buffer, layout or binding could not be created.
    #[error("failed to create {label}: {message}")]
    ResourceCreation { label: String, message: String },
    #[error("{stage:?} program '{label}' failed to compile: {message}")]
    ShaderCompile {
        stage: ShaderStage,
        label: String,
        message: String,
    },
    #[error("model '{name}' has no GPU resources; upload it before drawing")]
    NotResident { name: String },
    #[error("no frame target is set on the device")]
    NoFrameTarget,
    #[error("draw issued before any buffers or pipeline were bound")]
    NothingBound,
}

impl RenderError {
    /// Whether no valid frame can be rendered after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RenderError::ShaderCompile { .. })
    }
}
