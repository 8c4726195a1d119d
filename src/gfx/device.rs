//! Graphics device boundary
//!
//! The level renderer never talks to a graphics API directly. Everything a
//! [`Model`](crate::gfx::model::Model) needs from its host is expressed by the
//! [`GraphicsDevice`] trait: buffer creation with a usage class, program
//! compilation, vertex input layouts, constant-block binding, buffer rewrites
//! and indexed draws over a sub-range.
//!
//! Handles returned by a device are owned values. Dropping a handle releases
//! the underlying GPU resource, so a model that goes out of scope (or whose
//! upload fails half way) never leaks device memory.

use crate::error::RenderError;

/// What a buffer is bound as.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Constant,
}

/// Whether the CPU rewrites a buffer after creation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferAccess {
    /// Filled once at creation and never written again.
    Static,
    /// Rewritten by the CPU before draws.
    Dynamic,
}

/// Creation parameters for a GPU buffer.
#[derive(Copy, Clone, Debug)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub kind: BufferKind,
    pub access: BufferAccess,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AttributeFormat {
    Float32x3,
}

impl AttributeFormat {
    pub const fn size(self) -> u64 {
        match self {
            AttributeFormat::Float32x3 => 12,
        }
    }
}

/// One per-vertex input of the vertex program.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub semantic: &'static str,
    pub location: u32,
    pub offset: u64,
    pub format: AttributeFormat,
}

/// Attribute schema of a single interleaved vertex stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: &'static [VertexAttribute],
}

/// A contiguous slice of the index buffer drawn with one call.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawRange {
    pub index_count: u32,
    pub index_offset: u32,
}

impl DrawRange {
    pub fn new(index_count: u32, index_offset: u32) -> Self {
        Self {
            index_count,
            index_offset,
        }
    }

    /// One past the last index read by this range.
    pub fn end(&self) -> u64 {
        self.index_offset as u64 + self.index_count as u64
    }
}

/// Everything bound once before a model issues its draws.
pub struct DrawBindings<'a, D: GraphicsDevice + ?Sized> {
    pub vertex_buffer: &'a D::Buffer,
    pub index_buffer: &'a D::Buffer,
    pub pipeline: &'a D::Pipeline,
    pub constants: &'a D::ConstantBinding,
}

/// Capabilities the renderer requires from its host graphics API.
///
/// All calls happen on the caller's thread, in order. `bind` establishes the
/// state that subsequent `draw_indexed` calls use until the next `bind`.
pub trait GraphicsDevice {
    type Buffer;
    type Program;
    /// Compiled programs plus the vertex input layout they consume.
    type Pipeline;
    type ConstantBinding;

    fn create_buffer(
        &mut self,
        desc: &BufferDesc<'_>,
        contents: &[u8],
    ) -> Result<Self::Buffer, RenderError>;

    fn compile_program(
        &mut self,
        stage: ShaderStage,
        label: &str,
        source: &str,
    ) -> Result<Self::Program, RenderError>;

    fn create_input_layout(
        &mut self,
        vertex: &Self::Program,
        pixel: &Self::Program,
        layout: &VertexLayout,
    ) -> Result<Self::Pipeline, RenderError>;

    /// Binds constant blocks to consecutive slots starting at 0.
    fn bind_constants(
        &mut self,
        pipeline: &Self::Pipeline,
        blocks: &[&Self::Buffer],
    ) -> Result<Self::ConstantBinding, RenderError>;

    /// Replaces the whole content of a dynamic buffer.
    fn write_buffer(&mut self, buffer: &Self::Buffer, data: &[u8]) -> Result<(), RenderError>;

    fn bind(&mut self, bindings: DrawBindings<'_, Self>) -> Result<(), RenderError>;

    fn draw_indexed(&mut self, range: DrawRange) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_range_end() {
        let range = DrawRange::new(36, 12);
        assert_eq!(range.end(), 48);

        let wide = DrawRange::new(u32::MAX, u32::MAX);
        assert_eq!(wide.end(), 2 * u32::MAX as u64);
    }
}
