//! # Vertex Data Structures
//!
//! This module defines the vertex layout stored in H2B mesh assets and
//! consumed by the level shaders.

use crate::gfx::device::{AttributeFormat, VertexAttribute, VertexLayout};

/// A mesh vertex with position, texture coordinate and normal.
///
/// # Memory Layout
///
/// The `#[repr(C)]` attribute keeps the fields tightly packed in file order,
/// 36 bytes per vertex, so vertex arrays can be copied straight from an H2B
/// file into a GPU buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Object-space position [x, y, z]
    pub position: [f32; 3],
    /// Texture coordinate [u, v, w]
    pub uvw: [f32; 3],
    /// Normal vector [nx, ny, nz] for lighting calculations
    pub normal: [f32; 3],
}

impl Vertex {
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

    const LAYOUT: VertexLayout = VertexLayout {
        stride: Self::STRIDE,
        attributes: &ATTRIBUTES,
    };

    /// Returns the input layout of the level vertex program.
    ///
    /// - Attribute 0: Position (Float32x3) at offset 0
    /// - Attribute 1: UVW (Float32x3) at offset 12
    /// - Attribute 2: Normal (Float32x3) at offset 24
    pub fn layout() -> VertexLayout {
        Self::LAYOUT
    }
}

const ATTRIBUTES: [VertexAttribute; 3] = [
    VertexAttribute {
        semantic: "POSITION",
        location: 0,
        offset: 0,
        format: AttributeFormat::Float32x3,
    },
    VertexAttribute {
        semantic: "UVW",
        location: 1,
        offset: AttributeFormat::Float32x3.size(),
        format: AttributeFormat::Float32x3,
    },
    VertexAttribute {
        semantic: "NORMAL",
        location: 2,
        offset: 2 * AttributeFormat::Float32x3.size(),
        format: AttributeFormat::Float32x3,
    },
];
