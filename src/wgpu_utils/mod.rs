//! WGPU utility functions and helpers
//!
//! Provides the wgpu backend of the level renderer's graphics device.

pub mod binding_types;
pub mod device;

// Re-export main types
pub use device::{FrameTarget, WgpuDevice};
