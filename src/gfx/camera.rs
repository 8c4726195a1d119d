//! Fly camera for the level viewer
//!
//! Left-handed, +Y up, +Z forward, with depth mapped to `0..1` for wgpu. The
//! camera is stored as a position plus yaw and pitch; its world matrix is
//! `T * R_y(yaw) * R_x(pitch)` and the view matrix is the inverse of that.

use cgmath::{Deg, EuclideanSpace, InnerSpace, Matrix, Matrix3, Matrix4, Point3, Rad, Vector3};
use winit::{
    event::{DeviceEvent, ElementState, KeyEvent},
    keyboard::{KeyCode, PhysicalKey},
};

const PITCH_LIMIT: Rad<f32> = Rad(1.55);

pub struct FlyCamera {
    pub position: Point3<f32>,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
    pub fov_y: Deg<f32>,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl FlyCamera {
    /// A camera at `eye` facing `target`.
    pub fn look_at(eye: Point3<f32>, target: Point3<f32>, fov_y: Deg<f32>, near: f32, far: f32) -> Self {
        let dir = (target - eye).normalize();
        Self {
            position: eye,
            yaw: Rad(dir.x.atan2(dir.z)),
            pitch: Rad((-dir.y).asin()),
            fov_y,
            aspect: 1.0,
            near,
            far,
        }
    }

    fn rotation(&self) -> Matrix3<f32> {
        Matrix3::from_angle_y(self.yaw) * Matrix3::from_angle_x(self.pitch)
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.rotation() * Vector3::unit_z()
    }

    pub fn right(&self) -> Vector3<f32> {
        self.rotation() * Vector3::unit_x()
    }

    /// The camera's placement in the world. Its `w` column is the eye.
    pub fn world_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position.to_vec()) * Matrix4::from(self.rotation())
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        let inverse_rotation = self.rotation().transpose();
        Matrix4::from(inverse_rotation) * Matrix4::from_translation(-self.position.to_vec())
    }

    /// Left-handed perspective projection with depth in `0..1`.
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        let f = 1.0 / (Rad::from(self.fov_y).0 / 2.0).tan();
        let range = self.far / (self.far - self.near);
        #[rustfmt::skip]
        let projection = Matrix4::new(
            f / self.aspect, 0.0, 0.0,                     0.0,
            0.0,             f,   0.0,                     0.0,
            0.0,             0.0, range,                   1.0,
            0.0,             0.0, -self.near * range,      0.0,
        );
        projection
    }

    pub fn resize_projection(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn rotate(&mut self, yaw: Rad<f32>, pitch: Rad<f32>) {
        self.yaw += yaw;
        self.pitch = Rad((self.pitch + pitch).0.clamp(-PITCH_LIMIT.0, PITCH_LIMIT.0));
    }
}

/// Keyboard and mouse state driving a [`FlyCamera`].
pub struct FlyController {
    /// World units per second.
    pub speed: f32,
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
    up: bool,
    down: bool,
    mouse_delta: (f64, f64),
}

impl FlyController {
    pub fn new(speed: f32) -> Self {
        Self {
            speed,
            forward: false,
            back: false,
            left: false,
            right: false,
            up: false,
            down: false,
            mouse_delta: (0.0, 0.0),
        }
    }

    /// Returns true when the key moves the camera.
    pub fn process_keyboard(&mut self, event: &KeyEvent) -> bool {
        let PhysicalKey::Code(code) = event.physical_key else {
            return false;
        };
        let pressed = event.state == ElementState::Pressed;
        self.set_key(code, pressed)
    }

    pub fn set_key(&mut self, code: KeyCode, pressed: bool) -> bool {
        match code {
            KeyCode::KeyW => self.forward = pressed,
            KeyCode::KeyS => self.back = pressed,
            KeyCode::KeyA => self.left = pressed,
            KeyCode::KeyD => self.right = pressed,
            KeyCode::Space => self.up = pressed,
            KeyCode::ShiftLeft | KeyCode::ShiftRight => self.down = pressed,
            _ => return false,
        }
        true
    }

    pub fn process_mouse(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.mouse_delta.0 += delta.0;
            self.mouse_delta.1 += delta.1;
        }
    }

    /// Applies movement and accumulated mouse motion for a frame of `dt`
    /// seconds in a window of `width` x `height` pixels.
    pub fn update_camera(&mut self, camera: &mut FlyCamera, dt: f32, width: u32, height: u32) {
        let axis = |positive: bool, negative: bool| positive as i32 as f32 - negative as i32 as f32;
        let step = self.speed * dt;

        camera.position += camera.forward() * axis(self.forward, self.back) * step;
        camera.position += camera.right() * axis(self.right, self.left) * step;
        camera.position += Vector3::unit_y() * axis(self.up, self.down) * step;

        // A full window of mouse travel turns the camera by one field of view.
        let (dx, dy) = std::mem::take(&mut self.mouse_delta);
        if width > 0 && height > 0 {
            let fov = Rad::from(camera.fov_y).0;
            let yaw = fov * camera.aspect * dx as f32 / width as f32;
            let pitch = fov * dy as f32 / height as f32;
            camera.rotate(Rad(yaw), Rad(pitch));
        }
    }
}
