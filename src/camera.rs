use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

pub const PITCH_LIMIT: f32 = 89.0;
pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 45.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;

/// Direction of a held movement key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Movement {
    Forward,
    Backward,
    Left,
    Right,
}

/// Initial camera pose and tuning, as read from the scene description.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    pub position: Vec3,
    #[serde(default = "default_world_up")]
    pub world_up: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub zoom: f32,
    pub movement_speed: f32,
    pub mouse_sensitivity: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: Vec3::new(3.0, 0.5, 3.0),
            world_up: default_world_up(),
            yaw: -90.0,
            pitch: 0.0,
            zoom: 45.0,
            movement_speed: 5.0,
            mouse_sensitivity: 0.1,
        }
    }
}

fn default_world_up() -> Vec3 {
    Vec3::Y
}

/// First person fly camera driven by pointer, scroll and held keys.
///
/// Orientation is kept as yaw/pitch in degrees; `front`, `right` and `up`
/// are re-derived from them after every look update rather than integrated,
/// so the basis cannot drift.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraController {
    position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
    zoom: f32,
    movement_speed: f32,
    mouse_sensitivity: f32,
    last_pointer: Option<Vec2>,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(CameraSettings::default())
    }
}

impl CameraController {
    pub fn new(settings: CameraSettings) -> Self {
        let world_up = settings.world_up.try_normalize().unwrap_or(Vec3::Y);
        let mut camera = Self {
            position: settings.position,
            front: Vec3::NEG_Z,
            up: world_up,
            right: Vec3::X,
            world_up,
            yaw: settings.yaw,
            pitch: settings.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            zoom: settings.zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            movement_speed: settings.movement_speed,
            mouse_sensitivity: settings.mouse_sensitivity,
            last_pointer: None,
        };
        camera.update_vectors();
        camera
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Forget the previous pointer sample; the next one only seeds it.
    pub fn reset_pointer(&mut self) {
        self.last_pointer = None;
    }

    /// Handles an absolute pointer position in screen space (y grows down).
    pub fn process_pointer(&mut self, x: f32, y: f32) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        let sample = Vec2::new(x, y);
        let Some(last) = self.last_pointer.replace(sample) else {
            return;
        };
        let x_offset = (sample.x - last.x) * self.mouse_sensitivity;
        let y_offset = (last.y - sample.y) * self.mouse_sensitivity;
        self.look(x_offset, y_offset);
    }

    /// Applies already scaled yaw/pitch offsets in degrees.
    pub fn look(&mut self, yaw_offset: f32, pitch_offset: f32) {
        if !yaw_offset.is_finite() || !pitch_offset.is_finite() {
            return;
        }
        self.yaw += yaw_offset;
        self.pitch = (self.pitch + pitch_offset).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_vectors();
    }

    pub fn process_scroll(&mut self, delta: f32) {
        if !delta.is_finite() {
            return;
        }
        self.zoom = (self.zoom - delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn process_movement(&mut self, movement: Movement, delta_time: f32) {
        if !delta_time.is_finite() || delta_time <= 0.0 {
            return;
        }
        let velocity = self.movement_speed * delta_time;
        let step = match movement {
            Movement::Forward => self.front * velocity,
            Movement::Backward => -self.front * velocity,
            Movement::Left => -self.right * velocity,
            Movement::Right => self.right * velocity,
        };
        self.position += step;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() { aspect.max(0.01) } else { 1.0 };
        Mat4::perspective_rh_gl(self.zoom.to_radians(), aspect, NEAR_PLANE, FAR_PLANE)
    }

    fn update_vectors(&mut self) {
        let (yaw_sin, yaw_cos) = self.yaw.to_radians().sin_cos();
        let (pitch_sin, pitch_cos) = self.pitch.to_radians().sin_cos();
        self.front = Vec3::new(yaw_cos * pitch_cos, pitch_sin, yaw_sin * pitch_cos).normalize();
        // Looking along world up leaves the cross product undefined; carry the
        // previous right over, squared against the new front.
        self.right = self
            .front
            .cross(self.world_up)
            .try_normalize()
            .or_else(|| (self.right - self.front * self.right.dot(self.front)).try_normalize())
            .unwrap_or_else(|| self.front.any_orthonormal_vector());
        self.up = self.right.cross(self.front).normalize();
    }
}
