// src/lib.rs
//! Level Renderer
//!
//! Loads Blender level exports and the H2B meshes they reference, then draws
//! every placed object with its own GPU resources through wgpu.

pub mod app;
pub mod assets;
pub mod config;
pub mod error;
pub mod gfx;
pub mod logging;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::LevelViewer;
pub use error::{AssetError, LevelError, RenderError};
pub use gfx::{level::Level, model::Model};
