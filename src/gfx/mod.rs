//! # Graphics Module
//!
//! Everything between decoded assets and draw calls.
//!
//! - **Device boundary** ([`device`]) - the [`GraphicsDevice`] trait models and
//!   levels render through
//! - **Constant blocks** ([`constants`]) - scene and mesh uniform layouts
//! - **Models** ([`model`]) - one placed mesh with its own GPU resources
//! - **Levels** ([`level`]) - ordered collection of models plus the sun light
//! - **Camera** ([`camera`]) - fly camera used by the viewer
//!
//! [`GraphicsDevice`]: device::GraphicsDevice

pub mod camera;
pub mod constants;
pub mod device;
pub mod level;
pub mod model;
pub mod shaders;
pub mod vertex;

#[cfg(test)]
pub(crate) mod recording_device;

// Re-export commonly used types
pub use constants::LightConfig;
pub use device::GraphicsDevice;
pub use level::Level;
pub use model::{Model, ModelState};
