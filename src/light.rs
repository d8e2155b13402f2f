use glam::{Mat4, Quat, Vec3, Vec4};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightType {
    Directional,
    Point,
    Spot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightShadows {
    #[default]
    None,
    Hard,
    Soft,
}

impl LightShadows {
    pub fn is_enabled(self) -> bool {
        self != LightShadows::None
    }

    pub fn is_soft(self) -> bool {
        self == LightShadows::Soft
    }
}

/// A light that survived culling for the current camera. Index order is stable for the frame.
#[derive(Debug, Clone)]
pub struct VisibleLight {
    pub light_type: LightType,
    pub local_to_world: Mat4,
    /// Color premultiplied by intensity, linear space.
    pub final_color: Vec4,
    pub range: f32,
    /// Full cone angle in degrees.
    pub spot_angle: f32,
    pub shadows: LightShadows,
    pub shadow_strength: f32,
    pub shadow_bias: f32,
    pub shadow_near_plane: f32,
}

impl VisibleLight {
    const DEFAULT_SHADOW_BIAS: f32 = 0.05;
    const DEFAULT_SHADOW_NEAR_PLANE: f32 = 0.2;

    fn base(light_type: LightType, local_to_world: Mat4, final_color: Vec4) -> Self {
        Self {
            light_type,
            local_to_world,
            final_color,
            range: 10.0,
            spot_angle: 30.0,
            shadows: LightShadows::None,
            shadow_strength: 1.0,
            shadow_bias: Self::DEFAULT_SHADOW_BIAS,
            shadow_near_plane: Self::DEFAULT_SHADOW_NEAR_PLANE,
        }
    }

    pub fn directional(rotation: Quat, final_color: Vec4) -> Self {
        Self::base(LightType::Directional, Mat4::from_quat(rotation), final_color)
    }

    pub fn point(position: Vec3, final_color: Vec4, range: f32) -> Self {
        let mut light = Self::base(LightType::Point, Mat4::from_translation(position), final_color);
        light.range = range;
        light
    }

    pub fn spot(position: Vec3, rotation: Quat, final_color: Vec4, range: f32, spot_angle: f32) -> Self {
        let mut light =
            Self::base(LightType::Spot, Mat4::from_rotation_translation(rotation, position), final_color);
        light.range = range;
        light.spot_angle = spot_angle;
        light
    }

    pub fn with_shadows(mut self, shadows: LightShadows, strength: f32) -> Self {
        self.shadows = shadows;
        self.shadow_strength = strength;
        self
    }

    pub fn with_shadow_bias(mut self, bias: f32) -> Self {
        self.shadow_bias = bias;
        self
    }

    /// Third basis column of the transform, the direction the light shines along.
    pub fn forward(&self) -> Vec3 {
        self.local_to_world.z_axis.truncate()
    }

    pub fn position(&self) -> Vec3 {
        self.local_to_world.w_axis.truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spot_light_keeps_position_and_forward() {
        let light = VisibleLight::spot(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY, Vec4::ONE, 5.0, 45.0);
        assert_eq!(light.position(), Vec3::new(1.0, 2.0, 3.0));
        assert!((light.forward() - Vec3::Z).length() < 1e-6);
        assert_eq!(light.local_to_world.w_axis.w, 1.0);
    }

    #[test]
    fn shadows_default_to_disabled() {
        let light = VisibleLight::point(Vec3::ZERO, Vec4::ONE, 4.0);
        assert!(!light.shadows.is_enabled());
        let shadowed = light.with_shadows(LightShadows::Soft, 0.8);
        assert!(shadowed.shadows.is_soft());
        assert!((shadowed.shadow_strength - 0.8).abs() < f32::EPSILON);
    }
}
