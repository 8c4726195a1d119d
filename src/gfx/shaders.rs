//! Level Shaders Module
//!
//! WGSL sources for the level pipeline. Each model compiles its own copy.

/// Vertex program, entry point `vs_main`.
pub const LEVEL_VERTEX_SHADER: &str = include_str!("shaders/vertex.wgsl");

/// Pixel program, entry point `fs_main`.
pub const LEVEL_PIXEL_SHADER: &str = include_str!("shaders/pixel.wgsl");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_programs_share_constant_layout() {
        for source in [LEVEL_VERTEX_SHADER, LEVEL_PIXEL_SHADER] {
            assert!(source.contains("@group(0) @binding(0)\nvar<uniform> scene: SceneConstants;"));
            assert!(source.contains("@group(0) @binding(1)\nvar<uniform> mesh: MeshConstants;"));
        }
        assert!(LEVEL_VERTEX_SHADER.contains("fn vs_main"));
        assert!(LEVEL_PIXEL_SHADER.contains("fn fs_main"));
    }
}
