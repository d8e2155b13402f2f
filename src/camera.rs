use bitflags::bitflags;
use glam::{Mat4, Vec3, Vec4};
use serde::Deserialize;

const DEFAULT_UP: Vec3 = Vec3::Y;

bitflags! {
    /// Buffers cleared before the camera draws.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        const DEPTH = 0b01;
        const COLOR = 0b10;
    }
}

impl Default for ClearFlags {
    fn default() -> Self {
        ClearFlags::DEPTH | ClearFlags::COLOR
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraType {
    #[default]
    Game,
    SceneView,
    Preview,
}

/// Perspective camera handed to the forward renderer once per frame.
#[derive(Debug, Clone)]
pub struct Camera {
    pub name: String,
    pub camera_type: CameraType,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
    pub clear_flags: ClearFlags,
    pub background: Vec4,
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3, fov_y_radians: f32, near: f32, far: f32) -> Self {
        Self {
            name: "Camera".to_string(),
            camera_type: CameraType::Game,
            position,
            target,
            up: DEFAULT_UP,
            fov_y_radians,
            near,
            far,
            clear_flags: ClearFlags::default(),
            background: Vec4::new(0.19, 0.3, 0.47, 1.0),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_type(mut self, camera_type: CameraType) -> Self {
        self.camera_type = camera_type;
        self
    }

    pub fn with_clear_flags(mut self, clear_flags: ClearFlags) -> Self {
        self.clear_flags = clear_flags;
        self
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_radians, aspect.max(0.0001), self.near, self.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// A camera with a collapsed frustum cannot produce culling parameters.
    pub fn is_degenerate(&self) -> bool {
        !(self.near > 0.0)
            || !(self.far > self.near)
            || !(self.fov_y_radians > 0.0)
            || self.forward().length_squared() < f32::EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_view_projection_is_finite() {
        let camera = Camera::new(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO, 60.0_f32.to_radians(), 0.1, 1000.0);
        let vp = camera.view_projection(16.0 / 9.0);
        assert!(!vp.to_cols_array().iter().any(|v| v.is_nan() || v.is_infinite()));
        assert!(!camera.is_degenerate());
    }

    #[test]
    fn collapsed_frustum_is_degenerate() {
        let flat = Camera::new(Vec3::ZERO, Vec3::Z, 1.0, 5.0, 5.0);
        assert!(flat.is_degenerate());
        let blind = Camera::new(Vec3::ZERO, Vec3::ZERO, 1.0, 0.1, 10.0);
        assert!(blind.is_degenerate());
    }

    #[test]
    fn default_clear_flags_cover_depth_and_color() {
        let flags = ClearFlags::default();
        assert!(flags.contains(ClearFlags::DEPTH));
        assert!(flags.contains(ClearFlags::COLOR));
    }
}
