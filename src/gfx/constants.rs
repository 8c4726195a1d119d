//! Constant blocks shared between the CPU and the level shaders
//!
//! Two blocks feed every draw: [`SceneConstants`] (camera and sun, slot 0) and
//! [`MeshConstants`] (placement and material, slot 1). Both MUST match the
//! structs of the same name in `shaders/vertex.wgsl` and `shaders/pixel.wgsl`.

use cgmath::Matrix4;

use crate::{
    assets::h2b::MaterialAttributes,
    error::RenderError,
    gfx::device::{BufferAccess, BufferDesc, BufferKind, GraphicsDevice},
};

/// Sun light applied to every model of a level.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LightConfig {
    /// Direction the light travels in, not yet normalized.
    pub direction: [f32; 4],
    pub color: [f32; 4],
    pub ambient: [f32; 4],
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            direction: [3.0, -3.0, 2.0, 1.0],
            color: [0.9, 0.9, 1.0, 1.0],
            ambient: [0.25, 0.25, 0.35, 1.0],
        }
    }
}

/// Camera and lighting state, slot 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneConstants {
    pub light_direction: [f32; 4],
    pub light_color: [f32; 4],
    pub sun_ambient: [f32; 4],
    pub camera_position: [f32; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}
// 4 * 16 + 2 * 64 = 192 bytes

impl SceneConstants {
    pub fn new(light: &LightConfig, view: Matrix4<f32>, projection: Matrix4<f32>) -> Self {
        Self {
            light_direction: light.direction,
            light_color: light.color,
            sun_ambient: light.ambient,
            camera_position: [0.0, 0.0, 0.0, 1.0],
            view: view.into(),
            projection: projection.into(),
        }
    }

    /// Updates the view matrix and takes the eye position from the
    /// translation of the camera's world matrix.
    pub fn set_camera(&mut self, view: Matrix4<f32>, camera_world: Matrix4<f32>) {
        self.view = view.into();
        self.camera_position = camera_world.w.into();
    }
}

/// Per-object placement and the material of the submesh being drawn, slot 1.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshConstants {
    pub world: [[f32; 4]; 4],
    pub material: MaterialAttributes,
}
// 64 + 80 = 144 bytes

impl MeshConstants {
    pub fn new(world: Matrix4<f32>) -> Self {
        Self {
            world: world.into(),
            material: MaterialAttributes::default(),
        }
    }
}

/// A dynamic constant buffer plus the CPU copy it is flushed from.
///
/// Writes go to the CPU copy through [`content_mut`](Self::content_mut) and
/// reach the GPU on [`flush`](Self::flush), which always rewrites the whole
/// block.
pub struct ConstantBlock<Content, B> {
    buffer: B,
    content: Content,
}

impl<Content: bytemuck::Pod, B> ConstantBlock<Content, B> {
    pub(crate) fn name() -> &'static str {
        let type_name = std::any::type_name::<Content>();
        let pos = type_name.rfind(':').unwrap_or(0);
        if pos > 0 {
            &type_name[(pos + 1)..]
        } else {
            type_name
        }
    }

    /// Creates the buffer already holding `initial_content`.
    pub fn new_with_data<D>(
        device: &mut D,
        owner: &str,
        initial_content: Content,
    ) -> Result<Self, RenderError>
    where
        D: GraphicsDevice<Buffer = B> + ?Sized,
    {
        let label = format!("{owner} {}", Self::name());
        let buffer = device.create_buffer(
            &BufferDesc {
                label: &label,
                kind: BufferKind::Constant,
                access: BufferAccess::Dynamic,
            },
            bytemuck::bytes_of(&initial_content),
        )?;

        Ok(ConstantBlock {
            buffer,
            content: initial_content,
        })
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut Content {
        &mut self.content
    }

    /// Writes the CPU copy to the GPU buffer.
    pub fn flush<D>(&self, device: &mut D) -> Result<(), RenderError>
    where
        D: GraphicsDevice<Buffer = B> + ?Sized,
    {
        device.write_buffer(&self.buffer, bytemuck::bytes_of(&self.content))
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn size() -> u64 {
        std::mem::size_of::<Content>() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Matrix4, SquareMatrix, Vector3};

    #[test]
    fn test_block_sizes_match_shaders() {
        assert_eq!(ConstantBlock::<SceneConstants, ()>::size(), 192);
        assert_eq!(ConstantBlock::<MeshConstants, ()>::size(), 144);
    }

    #[test]
    fn test_block_name_is_type_name() {
        assert_eq!(ConstantBlock::<SceneConstants, ()>::name(), "SceneConstants");
        assert_eq!(ConstantBlock::<MeshConstants, ()>::name(), "MeshConstants");
    }

    #[test]
    fn test_camera_position_is_translation() {
        let mut scene = SceneConstants::new(
            &LightConfig::default(),
            Matrix4::identity(),
            Matrix4::identity(),
        );
        let camera_world = Matrix4::from_translation(Vector3::new(1.0, 8.0, -18.0));
        let view = camera_world.invert().unwrap();
        scene.set_camera(view, camera_world);

        assert_eq!(scene.camera_position, [1.0, 8.0, -18.0, 1.0]);
        assert_eq!(scene.view[3], [-1.0, -8.0, 18.0, 1.0]);
        assert_eq!(scene.light_direction, [3.0, -3.0, 2.0, 1.0]);
    }
}
