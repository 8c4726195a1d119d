//! wgpu implementation of [`GraphicsDevice`]
//!
//! Programs are WGSL modules, pipelines share one bind group layout (scene
//! constants at binding 0, mesh constants at binding 1) and every indexed draw
//! is recorded and submitted on its own so the constant writes queued before
//! it are visible to it.

use wgpu::util::DeviceExt;

use crate::{
    error::RenderError,
    gfx::device::{
        AttributeFormat, BufferAccess, BufferDesc, BufferKind, DrawBindings, DrawRange,
        GraphicsDevice, ShaderStage, VertexLayout,
    },
    wgpu_utils::binding_types,
};

/// Texture views the current frame is drawn into.
pub struct FrameTarget {
    pub color: wgpu::TextureView,
    pub depth: Option<wgpu::TextureView>,
}

struct BoundState {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    constants_layout: wgpu::BindGroupLayout,
    frame: Option<FrameTarget>,
    bound: Option<BoundState>,
}

impl WgpuDevice {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let constants_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Level Constants Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: binding_types::uniform(),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: binding_types::uniform(),
                    count: None,
                },
            ],
        });

        Self {
            device,
            queue,
            color_format,
            depth_format,
            constants_layout,
            frame: None,
            bound: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Sets the views subsequent draws render into.
    pub fn begin_frame(&mut self, target: FrameTarget) {
        self.frame = Some(target);
    }

    /// Clears the color and depth views of the current frame.
    pub fn clear_frame(&mut self, color: wgpu::Color) -> Result<(), RenderError> {
        let frame = self.frame.as_ref().ok_or(RenderError::NoFrameTarget)?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: frame.depth.as_ref().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Ends the frame and drops the bound state.
    pub fn end_frame(&mut self) -> Option<FrameTarget> {
        self.bound = None;
        self.frame.take()
    }

    /// Runs `create` inside validation and out-of-memory error scopes.
    fn scoped<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        (value, validation.or(out_of_memory))
    }
}

fn vertex_format(format: AttributeFormat) -> wgpu::VertexFormat {
    match format {
        AttributeFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
    }
}

fn buffer_usage(kind: BufferKind, access: BufferAccess) -> wgpu::BufferUsages {
    let usage = match kind {
        BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
        BufferKind::Index => wgpu::BufferUsages::INDEX,
        BufferKind::Constant => wgpu::BufferUsages::UNIFORM,
    };
    match access {
        BufferAccess::Static => usage,
        BufferAccess::Dynamic => usage | wgpu::BufferUsages::COPY_DST,
    }
}

impl GraphicsDevice for WgpuDevice {
    type Buffer = wgpu::Buffer;
    type Program = wgpu::ShaderModule;
    type Pipeline = wgpu::RenderPipeline;
    type ConstantBinding = wgpu::BindGroup;

    fn create_buffer(
        &mut self,
        desc: &BufferDesc<'_>,
        contents: &[u8],
    ) -> Result<wgpu::Buffer, RenderError> {
        let (buffer, error) = self.scoped(|device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(desc.label),
                contents,
                usage: buffer_usage(desc.kind, desc.access),
            })
        });
        match error {
            Some(err) => Err(RenderError::ResourceCreation {
                label: desc.label.to_owned(),
                message: err.to_string(),
            }),
            None => Ok(buffer),
        }
    }

    fn compile_program(
        &mut self,
        stage: ShaderStage,
        label: &str,
        source: &str,
    ) -> Result<wgpu::ShaderModule, RenderError> {
        let (module, error) = self.scoped(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });
        match error {
            Some(err) => Err(RenderError::ShaderCompile {
                stage,
                label: label.to_owned(),
                message: err.to_string(),
            }),
            None => Ok(module),
        }
    }

    fn create_input_layout(
        &mut self,
        vertex: &wgpu::ShaderModule,
        pixel: &wgpu::ShaderModule,
        layout: &VertexLayout,
    ) -> Result<wgpu::RenderPipeline, RenderError> {
        let attributes: Vec<wgpu::VertexAttribute> = layout
            .attributes
            .iter()
            .map(|attribute| wgpu::VertexAttribute {
                offset: attribute.offset,
                shader_location: attribute.location,
                format: vertex_format(attribute.format),
            })
            .collect();
        let vertex_buffers = [wgpu::VertexBufferLayout {
            array_stride: layout.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        }];
        let color_targets = [Some(wgpu::ColorTargetState {
            format: self.color_format,
            blend: Some(wgpu::BlendState::REPLACE),
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let depth_stencil = self.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let (pipeline, error) = self.scoped(|device| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Level Pipeline Layout"),
                bind_group_layouts: &[&self.constants_layout],
                push_constant_ranges: &[],
            });

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Level Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: Some("vs_main"),
                    buffers: &vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: pixel,
                    entry_point: Some("fs_main"),
                    targets: &color_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    // H2B meshes are exported with clockwise winding.
                    front_face: wgpu::FrontFace::Cw,
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        });
        match error {
            Some(err) => Err(RenderError::ResourceCreation {
                label: "Level Pipeline".into(),
                message: err.to_string(),
            }),
            None => Ok(pipeline),
        }
    }

    fn bind_constants(
        &mut self,
        _pipeline: &wgpu::RenderPipeline,
        blocks: &[&wgpu::Buffer],
    ) -> Result<wgpu::BindGroup, RenderError> {
        let entries: Vec<wgpu::BindGroupEntry> = blocks
            .iter()
            .enumerate()
            .map(|(slot, buffer)| wgpu::BindGroupEntry {
                binding: slot as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        let (bind_group, error) = self.scoped(|device| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Level Constants Bind Group"),
                layout: &self.constants_layout,
                entries: &entries,
            })
        });
        match error {
            Some(err) => Err(RenderError::ResourceCreation {
                label: "Level Constants Bind Group".into(),
                message: err.to_string(),
            }),
            None => Ok(bind_group),
        }
    }

    fn write_buffer(&mut self, buffer: &wgpu::Buffer, data: &[u8]) -> Result<(), RenderError> {
        self.queue.write_buffer(buffer, 0, data);
        Ok(())
    }

    fn bind(&mut self, bindings: DrawBindings<'_, Self>) -> Result<(), RenderError> {
        self.bound = Some(BoundState {
            vertex_buffer: bindings.vertex_buffer.clone(),
            index_buffer: bindings.index_buffer.clone(),
            pipeline: bindings.pipeline.clone(),
            bind_group: bindings.constants.clone(),
        });
        Ok(())
    }

    fn draw_indexed(&mut self, range: DrawRange) -> Result<(), RenderError> {
        let frame = self.frame.as_ref().ok_or(RenderError::NoFrameTarget)?;
        let bound = self.bound.as_ref().ok_or(RenderError::NothingBound)?;
        if range.index_count == 0 {
            return Ok(());
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Level Draw Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Level Draw Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: frame.depth.as_ref().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&bound.pipeline);
            pass.set_bind_group(0, &bound.bind_group, &[]);
            pass.set_vertex_buffer(0, bound.vertex_buffer.slice(..));
            pass.set_index_buffer(bound.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            let start = range.index_offset;
            pass.draw_indexed(start..start + range.index_count, 0, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}
