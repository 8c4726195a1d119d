//! On-disk formats: H2B mesh assets and level description files.

pub mod h2b;
pub mod level_file;

pub use h2b::{Material, MaterialAttributes, MeshAsset, Submesh};
pub use level_file::{LevelEntry, LevelReader};
