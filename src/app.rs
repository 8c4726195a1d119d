use std::{path::PathBuf, sync::Arc, time::Instant};

use cgmath::{Matrix4, SquareMatrix};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{
    config::ViewerConfig,
    error::RenderError,
    gfx::{
        camera::{FlyCamera, FlyController},
        level::Level,
    },
    logging::StandardLog,
    wgpu_utils::{FrameTarget, WgpuDevice},
};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Interactive level viewer: one window, one level at a time.
pub struct LevelViewer {
    event_loop: Option<EventLoop<()>>,
    app_state: AppState,
}

struct AppState {
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    level: Level<WgpuDevice>,
    camera: FlyCamera,
    controller: FlyController,
    last_frame: Instant,
    error: Option<anyhow::Error>,
}

/// Surface, depth buffer and the device the level renders through.
struct Renderer {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    device: WgpuDevice,
}

impl Renderer {
    async fn new(window: Arc<Window>, width: u32, height: u32) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Using adapter {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Level Viewer Device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface reports no texture formats"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, &config);

        Ok(Self {
            surface,
            config,
            depth_view,
            device: WgpuDevice::new(device, queue, format, Some(DEPTH_FORMAT)),
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(self.device.device(), &self.config);
        self.depth_view = create_depth_view(self.device.device(), &self.config);
    }

    fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}

fn create_depth_view(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

impl LevelViewer {
    pub fn new(config: ViewerConfig) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new()?;

        let mut camera = FlyCamera::look_at(
            config.eye,
            config.target,
            config.fov_y,
            config.near,
            config.far,
        );
        camera.resize_projection(config.width, config.height);
        let controller = FlyController::new(config.speed);

        let mut level = Level::new();
        level.set_light(config.light);

        Ok(Self {
            event_loop: Some(event_loop),
            app_state: AppState {
                config,
                window: None,
                renderer: None,
                level,
                camera,
                controller,
                last_frame: Instant::now(),
                error: None,
            },
        })
    }

    /// Runs until the window closes. Returns the error that stopped the
    /// viewer, if any.
    pub fn run(mut self) -> anyhow::Result<()> {
        let event_loop = self
            .event_loop
            .take()
            .ok_or_else(|| anyhow::anyhow!("event loop already consumed"))?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self.app_state)?;

        match self.app_state.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl AppState {
    /// Unloads the current level, then loads and uploads `path`.
    fn switch_level(&mut self, path: PathBuf) -> Result<(), RenderError> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        self.level.unload_level();
        if let Err(err) = self
            .level
            .load_level(&path, &self.config.models, &mut StandardLog)
        {
            log::error!("{err}");
            return Ok(());
        }

        let view = self.camera.view_matrix();
        let projection = self.camera.projection_matrix();
        let report = self.level.upload_level_to_device(
            &mut renderer.device,
            Matrix4::identity(),
            view,
            projection,
            &mut StandardLog,
        )?;
        if !report.failed.is_empty() {
            log::warn!(
                "{} of {} models could not be uploaded",
                report.failed.len(),
                report.failed.len() + report.uploaded
            );
        }
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if self.controller.process_keyboard(event) {
            return;
        }
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };

        if code == KeyCode::Escape {
            event_loop.exit();
            return;
        }
        let Some(slot) = level_slot(code) else {
            return;
        };
        let Some(path) = self.config.levels.get(slot).cloned() else {
            log::warn!("No level bound to key {}", slot + 1);
            return;
        };
        if let Err(err) = self.switch_level(path) {
            self.fail(event_loop, err.into());
        }
    }

    fn render(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        let (width, height) = renderer.size();
        self.controller
            .update_camera(&mut self.camera, dt, width, height);

        let surface_texture = match renderer.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                renderer.resize(width, height);
                return;
            }
            Err(wgpu::SurfaceError::Timeout) => return,
            Err(err) => {
                self.fail(event_loop, err.into());
                return;
            }
        };
        let color = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let [r, g, b, a] = self.config.clear_color;
        renderer.device.begin_frame(FrameTarget {
            color,
            depth: Some(renderer.depth_view.clone()),
        });
        if let Err(err) = renderer.device.clear_frame(wgpu::Color { r, g, b, a }) {
            log::error!("Unable to clear frame: {err}");
        }

        self.level.render_level(
            &mut renderer.device,
            self.camera.view_matrix(),
            self.camera.world_matrix(),
        );

        renderer.device.end_frame();
        surface_texture.present();
    }
}

fn level_slot(code: KeyCode) -> Option<usize> {
    let slot = match code {
        KeyCode::Digit1 => 0,
        KeyCode::Digit2 => 1,
        KeyCode::Digit3 => 2,
        KeyCode::Digit4 => 3,
        KeyCode::Digit5 => 4,
        KeyCode::Digit6 => 5,
        KeyCode::Digit7 => 6,
        KeyCode::Digit8 => 7,
        KeyCode::Digit9 => 8,
        _ => return None,
    };
    Some(slot)
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = WindowAttributes::default()
            .with_title("Level Renderer")
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => return self.fail(event_loop, err.into()),
        };
        self.window = Some(window.clone());

        let (width, height) = window.inner_size().into();
        let renderer = match pollster::block_on(Renderer::new(window, width, height)) {
            Ok(renderer) => renderer,
            Err(err) => return self.fail(event_loop, err),
        };
        self.camera.resize_projection(width, height);
        self.renderer = Some(renderer);
        self.last_frame = Instant::now();

        if let Some(first) = self.config.levels.first().cloned() {
            if let Err(err) = self.switch_level(first) {
                self.fail(event_loop, err.into());
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                self.camera.resize_projection(width, height);
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(width, height);
                    self.level
                        .set_projection(&mut renderer.device, self.camera.projection_matrix());
                }
            }
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => self.render(event_loop),
            _ => (),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        self.controller.process_mouse(&event);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
