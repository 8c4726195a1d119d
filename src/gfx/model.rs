//! One placed mesh and the GPU resources built for it
//!
//! A [`Model`] owns its decoded [`MeshAsset`] and, once uploaded, a complete
//! private resource set: vertex and index buffers, the two constant blocks,
//! both compiled programs, the pipeline and the constant binding. Nothing is
//! shared between models.

use std::path::Path;

use cgmath::Matrix4;

use crate::{
    assets::h2b::MeshAsset,
    error::{AssetError, RenderError},
    gfx::{
        constants::{ConstantBlock, LightConfig, MeshConstants, SceneConstants},
        device::{BufferAccess, BufferDesc, BufferKind, DrawBindings, GraphicsDevice, ShaderStage},
        shaders::{LEVEL_PIXEL_SHADER, LEVEL_VERTEX_SHADER},
        vertex::Vertex,
    },
};

/// Residency of a model's data.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModelState {
    /// Mesh decoded, nothing on the GPU.
    CpuLoaded,
    /// Buffers, programs and bindings exist and the model can be drawn.
    GpuResident,
}

/// Camera and light values a model's constant blocks start from.
#[derive(Copy, Clone, Debug)]
pub struct UploadParams {
    pub world: Matrix4<f32>,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub light: LightConfig,
}

// GPU resources owned by one model. Dropping this releases all of them.
struct GpuResources<D: GraphicsDevice + ?Sized> {
    vertex_buffer: D::Buffer,
    index_buffer: D::Buffer,
    scene_constants: ConstantBlock<SceneConstants, D::Buffer>,
    mesh_constants: ConstantBlock<MeshConstants, D::Buffer>,
    // Programs are kept alive for as long as the pipeline built from them.
    _vertex_program: D::Program,
    _pixel_program: D::Program,
    pipeline: D::Pipeline,
    constants: D::ConstantBinding,
}

pub struct Model<D: GraphicsDevice + ?Sized> {
    name: String,
    world: Matrix4<f32>,
    mesh: MeshAsset,
    gpu: Option<GpuResources<D>>, // None until upload
}

impl<D: GraphicsDevice + ?Sized> Model<D> {
    /// Decodes the mesh at `asset_path` and places it with `world`.
    pub fn load(
        name: impl Into<String>,
        world: Matrix4<f32>,
        asset_path: impl AsRef<Path>,
    ) -> Result<Self, AssetError> {
        let mesh = MeshAsset::from_file(asset_path)?;
        Ok(Self::from_mesh(name, world, mesh))
    }

    pub fn from_mesh(name: impl Into<String>, world: Matrix4<f32>, mesh: MeshAsset) -> Self {
        Self {
            name: name.into(),
            world,
            mesh,
            gpu: None,
        }
    }

    /// Replaces the mesh with the one at `asset_path`.
    ///
    /// On failure the model keeps its current mesh and GPU resources. On
    /// success any GPU resources built from the old mesh are released.
    pub fn load_from_disk(&mut self, asset_path: impl AsRef<Path>) -> Result<(), AssetError> {
        let mesh = MeshAsset::from_file(asset_path)?;
        self.mesh = mesh;
        self.release();
        Ok(())
    }

    /// Creates every GPU resource this model needs.
    ///
    /// Resources are committed only once all of them exist; on error the ones
    /// created so far are dropped. Uploading a resident model replaces its
    /// resources.
    pub fn upload(&mut self, device: &mut D, params: &UploadParams) -> Result<(), RenderError> {
        let name = self.name.as_str();

        let vertex_buffer = device.create_buffer(
            &BufferDesc {
                label: &format!("{name} Vertex Buffer"),
                kind: BufferKind::Vertex,
                access: BufferAccess::Static,
            },
            self.mesh.vertex_bytes(),
        )?;
        let index_buffer = device.create_buffer(
            &BufferDesc {
                label: &format!("{name} Index Buffer"),
                kind: BufferKind::Index,
                access: BufferAccess::Static,
            },
            self.mesh.index_bytes(),
        )?;

        let scene_constants = ConstantBlock::new_with_data(
            device,
            name,
            SceneConstants::new(&params.light, params.view, params.projection),
        )?;
        let mesh_constants =
            ConstantBlock::new_with_data(device, name, MeshConstants::new(params.world))?;

        let vertex_program = device.compile_program(
            ShaderStage::Vertex,
            &format!("{name} Vertex Program"),
            LEVEL_VERTEX_SHADER,
        )?;
        let pixel_program = device.compile_program(
            ShaderStage::Pixel,
            &format!("{name} Pixel Program"),
            LEVEL_PIXEL_SHADER,
        )?;
        let pipeline =
            device.create_input_layout(&vertex_program, &pixel_program, &Vertex::layout())?;
        let constants = device.bind_constants(
            &pipeline,
            &[scene_constants.buffer(), mesh_constants.buffer()],
        )?;

        self.gpu = Some(GpuResources {
            vertex_buffer,
            index_buffer,
            scene_constants,
            mesh_constants,
            _vertex_program: vertex_program,
            _pixel_program: pixel_program,
            pipeline,
            constants,
        });
        log::debug!("Uploaded '{}' to the device", self.name);
        Ok(())
    }

    /// Draws every submesh in order.
    ///
    /// `camera_world` is the camera's own world matrix; its translation is the
    /// eye position used for specular lighting.
    pub fn draw(
        &mut self,
        device: &mut D,
        view: Matrix4<f32>,
        camera_world: Matrix4<f32>,
    ) -> Result<(), RenderError> {
        let Some(gpu) = self.gpu.as_mut() else {
            return Err(RenderError::NotResident {
                name: self.name.clone(),
            });
        };

        device.bind(DrawBindings {
            vertex_buffer: &gpu.vertex_buffer,
            index_buffer: &gpu.index_buffer,
            pipeline: &gpu.pipeline,
            constants: &gpu.constants,
        })?;

        gpu.mesh_constants.content_mut().world = self.world.into();

        for submesh in &self.mesh.submeshes {
            if let Some(material) = self.mesh.material_for(submesh) {
                gpu.mesh_constants.content_mut().material = material.attributes;
            }
            gpu.mesh_constants.flush(device)?;

            gpu.scene_constants.content_mut().set_camera(view, camera_world);
            gpu.scene_constants.flush(device)?;

            device.draw_indexed(submesh.draw)?;
        }
        Ok(())
    }

    /// Rewrites the projection in the scene block. Does nothing when the model
    /// is not resident or the projection is unchanged.
    pub fn set_projection(
        &mut self,
        device: &mut D,
        projection: Matrix4<f32>,
    ) -> Result<(), RenderError> {
        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(());
        };
        let projection: [[f32; 4]; 4] = projection.into();
        if gpu.scene_constants.content().projection == projection {
            return Ok(());
        }
        gpu.scene_constants.content_mut().projection = projection;
        gpu.scene_constants.flush(device)
    }

    /// Drops all GPU resources. Does nothing when none exist.
    pub fn release(&mut self) {
        if self.gpu.take().is_some() {
            log::debug!("Released GPU resources of '{}'", self.name);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn world(&self) -> Matrix4<f32> {
        self.world
    }

    pub fn mesh(&self) -> &MeshAsset {
        &self.mesh
    }

    pub fn state(&self) -> ModelState {
        if self.gpu.is_some() {
            ModelState::GpuResident
        } else {
            ModelState::CpuLoaded
        }
    }

    pub fn is_resident(&self) -> bool {
        self.gpu.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::h2b::tests::two_quad_asset,
        gfx::{
            device::DrawRange,
            recording_device::{Command, RecordingDevice},
        },
    };
    use cgmath::{SquareMatrix, Vector3};

    fn params() -> UploadParams {
        UploadParams {
            world: Matrix4::identity(),
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            light: LightConfig::default(),
        }
    }

    fn placed_model() -> Model<RecordingDevice> {
        let world = Matrix4::from_translation(Vector3::new(4.0, 0.5, -2.0));
        Model::from_mesh("Ball.001", world, two_quad_asset())
    }

    fn write_asset(file_name: &str, asset: &MeshAsset) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(file_name);
        std::fs::write(&path, asset.to_bytes()).unwrap();
        path
    }

    #[test]
    fn test_upload_creates_every_resource() {
        let mut device = RecordingDevice::new();
        let mut model = placed_model();
        assert_eq!(model.state(), ModelState::CpuLoaded);

        model.upload(&mut device, &params()).unwrap();

        assert_eq!(model.state(), ModelState::GpuResident);
        // 4 buffers, 2 programs, pipeline, constant binding
        assert_eq!(device.live_resources(), 8);
        assert_eq!(
            device.commands[0],
            Command::CreateBuffer {
                label: "Ball.001 Vertex Buffer".into(),
                kind: BufferKind::Vertex,
                access: BufferAccess::Static,
                size: 4 * 36,
            }
        );
        assert_eq!(
            device.commands[1],
            Command::CreateBuffer {
                label: "Ball.001 Index Buffer".into(),
                kind: BufferKind::Index,
                access: BufferAccess::Static,
                size: 12 * 4,
            }
        );
        assert!(device.commands.contains(&Command::CreateInputLayout {
            stride: 36,
            attributes: vec!["POSITION", "UVW", "NORMAL"],
        }));
        assert!(device.commands.contains(&Command::BindConstants {
            slots: vec![
                "Ball.001 SceneConstants".into(),
                "Ball.001 MeshConstants".into()
            ],
        }));
    }

    #[test]
    fn test_draw_issues_one_draw_per_submesh() {
        let mut device = RecordingDevice::new();
        let mut model = placed_model();
        model.upload(&mut device, &params()).unwrap();
        device.commands.clear();

        let camera_world = Matrix4::from_translation(Vector3::new(0.0, 8.0, -18.0));
        let view = camera_world.invert().unwrap();
        model.draw(&mut device, view, camera_world).unwrap();

        assert_eq!(
            device.draws(),
            vec![DrawRange::new(6, 0), DrawRange::new(6, 6)]
        );
        assert_eq!(
            device.count(|c| matches!(c, Command::Bind { .. })),
            1,
            "buffers and pipeline are bound once per model"
        );
    }

    #[test]
    fn test_draw_writes_material_and_camera_before_each_draw() {
        let mut device = RecordingDevice::new();
        let mut model = placed_model();
        model.upload(&mut device, &params()).unwrap();
        device.commands.clear();

        let camera_world = Matrix4::from_translation(Vector3::new(0.0, 8.0, -18.0));
        let view = camera_world.invert().unwrap();
        model.draw(&mut device, view, camera_world).unwrap();

        let mesh_writes: Vec<MeshConstants> = device
            .writes_to("MeshConstants")
            .into_iter()
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(mesh_writes.len(), 2);
        assert_eq!(mesh_writes[0].material.diffuse, [1.0, 0.0, 0.0]);
        assert_eq!(mesh_writes[1].material.diffuse, [0.0, 0.0, 1.0]);
        assert_eq!(mesh_writes[1].world[3], [4.0, 0.5, -2.0, 1.0]);

        let scene_writes: Vec<SceneConstants> = device
            .writes_to("SceneConstants")
            .into_iter()
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(scene_writes.len(), 2);
        assert_eq!(scene_writes[0].camera_position, [0.0, 8.0, -18.0, 1.0]);
        let expected_view: [[f32; 4]; 4] = view.into();
        assert_eq!(scene_writes[0].view, expected_view);

        // Each draw follows the writes it reads.
        let last = device.commands.len() - 1;
        assert!(matches!(device.commands[last], Command::DrawIndexed(_)));
        assert!(matches!(
            &device.commands[last - 1],
            Command::WriteBuffer { label, .. } if label.ends_with("SceneConstants")
        ));
    }

    #[test]
    fn test_draw_before_upload_is_rejected() {
        let mut device = RecordingDevice::new();
        let mut model = placed_model();

        let result = model.draw(&mut device, Matrix4::identity(), Matrix4::identity());

        assert!(matches!(result, Err(RenderError::NotResident { name }) if name == "Ball.001"));
        assert!(device.commands.is_empty());
    }

    #[test]
    fn test_shader_failure_releases_partial_upload() {
        let mut device = RecordingDevice::new();
        device.fail_program = Some(ShaderStage::Pixel);
        let mut model = placed_model();

        let err = model.upload(&mut device, &params()).unwrap_err();

        assert!(err.is_fatal());
        assert!(!model.is_resident());
        assert_eq!(device.live_resources(), 0);
    }

    #[test]
    fn test_buffer_failure_is_surfaced() {
        let mut device = RecordingDevice::new();
        device.fail_buffer = Some("Ball.001 Index Buffer".into());
        let mut model = placed_model();

        let err = model.upload(&mut device, &params()).unwrap_err();

        assert!(matches!(err, RenderError::ResourceCreation { .. }));
        assert!(!err.is_fatal());
        assert_eq!(device.live_resources(), 0);
    }

    #[test]
    fn test_reupload_replaces_resources() {
        let mut device = RecordingDevice::new();
        let mut model = placed_model();
        model.upload(&mut device, &params()).unwrap();
        model.upload(&mut device, &params()).unwrap();

        assert_eq!(device.live_resources(), 8);
    }

    #[test]
    fn test_new_projection_reaches_following_draws() {
        let mut device = RecordingDevice::new();
        let mut model = placed_model();
        model.set_projection(&mut device, Matrix4::from_scale(2.0)).unwrap();
        assert!(device.commands.is_empty());

        model.upload(&mut device, &params()).unwrap();
        device.commands.clear();

        let projection = Matrix4::from_nonuniform_scale(0.5, 1.0, 1.0);
        model.set_projection(&mut device, projection).unwrap();
        model.set_projection(&mut device, projection).unwrap();
        assert_eq!(device.writes_to("SceneConstants").len(), 1);

        model.draw(&mut device, Matrix4::identity(), Matrix4::identity()).unwrap();

        let expected: [[f32; 4]; 4] = projection.into();
        let scene_writes: Vec<SceneConstants> = device
            .writes_to("SceneConstants")
            .into_iter()
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(scene_writes.len(), 3);
        assert!(scene_writes.iter().all(|scene| scene.projection == expected));
    }

    #[test]
    fn test_release_returns_to_cpu_loaded() {
        let mut device = RecordingDevice::new();
        let mut model = placed_model();
        model.upload(&mut device, &params()).unwrap();

        model.release();
        model.release();

        assert_eq!(model.state(), ModelState::CpuLoaded);
        assert_eq!(device.live_resources(), 0);
    }

    #[test]
    fn test_failed_reload_keeps_model_intact() {
        let mut device = RecordingDevice::new();
        let mut model = placed_model();
        model.upload(&mut device, &params()).unwrap();

        let missing = std::env::temp_dir().join("level-renderer-model-missing.h2b");
        assert!(model.load_from_disk(&missing).is_err());

        assert!(model.is_resident());
        assert_eq!(model.mesh(), &two_quad_asset());
    }

    #[test]
    fn test_reload_replaces_mesh_and_drops_gpu_resources() {
        let mut device = RecordingDevice::new();
        let mut model = placed_model();
        model.upload(&mut device, &params()).unwrap();

        let mut smaller = two_quad_asset();
        smaller.submeshes.truncate(1);
        let path = write_asset("level-renderer-model-reload.h2b", &smaller);

        model.load_from_disk(&path).unwrap();

        assert_eq!(model.mesh().submeshes.len(), 1);
        assert_eq!(model.state(), ModelState::CpuLoaded);
        assert_eq!(device.live_resources(), 0);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_load_reads_asset_file() {
        let path = write_asset("level-renderer-model-load.h2b", &two_quad_asset());

        let model = Model::<RecordingDevice>::load("Crate", Matrix4::identity(), &path).unwrap();

        assert_eq!(model.name(), "Crate");
        assert_eq!(model.mesh().indices.len(), 12);
        assert_eq!(model.world(), Matrix4::identity());
        let _ = std::fs::remove_file(path);
    }
}
