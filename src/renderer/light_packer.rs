use glam::{Vec2, Vec4};
use log::debug;

use super::MAX_VISIBLE_LIGHTS;
use crate::culling::{CullResults, EXCLUDED_LIGHT_INDEX};
use crate::light::{LightType, VisibleLight};

const MIN_RANGE_SQUARED: f32 = 0.00001;
const MIN_SPOT_ANGLE_RANGE: f32 = 0.001;
/// Inner cone tangent as a fraction of the outer one, approximating the smooth falloff.
const INNER_SPOT_TAN_RATIO: f32 = 46.0 / 64.0;

/// Shader-visible light arrays. Slot `i` holds visible light `i`.
#[derive(Clone, Debug, PartialEq)]
pub struct LightArrays {
    pub colors: [Vec4; MAX_VISIBLE_LIGHTS],
    /// Directional lights store the direction towards the light (`w = 0`), others the position (`w = 1`).
    pub directions_or_positions: [Vec4; MAX_VISIBLE_LIGHTS],
    pub attenuations: [Vec4; MAX_VISIBLE_LIGHTS],
    pub spot_directions: [Vec4; MAX_VISIBLE_LIGHTS],
}

impl Default for LightArrays {
    fn default() -> Self {
        Self {
            colors: [Vec4::ZERO; MAX_VISIBLE_LIGHTS],
            directions_or_positions: [Vec4::ZERO; MAX_VISIBLE_LIGHTS],
            attenuations: [Vec4::ZERO; MAX_VISIBLE_LIGHTS],
            spot_directions: [Vec4::ZERO; MAX_VISIBLE_LIGHTS],
        }
    }
}

impl LightArrays {
    fn clear_slot(&mut self, index: usize) {
        self.colors[index] = Vec4::ZERO;
        self.directions_or_positions[index] = Vec4::ZERO;
        self.attenuations[index] = Vec4::ZERO;
        self.spot_directions[index] = Vec4::ZERO;
    }

    pub fn to_uniform(&self) -> LightUniform {
        LightUniform {
            colors: self.colors.map(|v| v.to_array()),
            directions_or_positions: self.directions_or_positions.map(|v| v.to_array()),
            attenuations: self.attenuations.map(|v| v.to_array()),
            spot_directions: self.spot_directions.map(|v| v.to_array()),
        }
    }
}

/// Constant-buffer layout of [`LightArrays`] for hosts that upload raw bytes.
///
/// Four `float4[MAX_VISIBLE_LIGHTS]` arrays back to back, in the order colors,
/// directions/positions, attenuations, spot directions. Upload with `bytemuck::bytes_of`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub colors: [[f32; 4]; MAX_VISIBLE_LIGHTS],
    pub directions_or_positions: [[f32; 4]; MAX_VISIBLE_LIGHTS],
    pub attenuations: [[f32; 4]; MAX_VISIBLE_LIGHTS],
    pub spot_directions: [[f32; 4]; MAX_VISIBLE_LIGHTS],
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShadowDescriptor {
    pub strength: f32,
    pub soft: bool,
    pub directional: bool,
    /// UV offset of the atlas tile, set once the light has been rendered into one.
    pub tile_offset: Option<Vec2>,
}

impl ShadowDescriptor {
    pub fn is_valid(&self) -> bool {
        self.strength > 0.0
    }

    /// `(strength, soft, z, w)`; `zw` carry the tile offset once placed, else the directional marker.
    pub fn to_vec4(&self) -> Vec4 {
        let soft = if self.soft { 1.0 } else { 0.0 };
        match self.tile_offset {
            Some(offset) => Vec4::new(self.strength, soft, offset.x, offset.y),
            None => Vec4::new(self.strength, soft, if self.directional { 1.0 } else { 0.0 }, 0.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpotCone {
    pub outer_cos: f32,
    pub inner_cos: f32,
    /// `attenuation.z`
    pub scale: f32,
    /// `attenuation.w`
    pub offset: f32,
}

impl SpotCone {
    pub fn from_angle(spot_angle_degrees: f32) -> Self {
        let outer_rad = (0.5 * spot_angle_degrees).to_radians();
        let outer_cos = outer_rad.cos();
        let inner_cos = (INNER_SPOT_TAN_RATIO * outer_rad.tan()).atan().cos();
        let scale = 1.0 / (inner_cos - outer_cos).max(MIN_SPOT_ANGLE_RANGE);
        Self { outer_cos, inner_cos, scale, offset: -outer_cos * scale }
    }
}

/// Per-frame light state shared by the shadow renderers and the draw step.
#[derive(Clone, Debug, Default)]
pub struct PackedLights {
    pub arrays: LightArrays,
    pub shadows: [ShadowDescriptor; MAX_VISIBLE_LIGHTS],
    /// Tiles requested from the shared shadow atlas. Can dip below zero, see [`pack_lights`].
    pub shadow_tile_count: i32,
    pub main_light: Option<usize>,
    pub visible_count: usize,
}

impl PackedLights {
    pub fn packed_count(&self) -> usize {
        self.visible_count.min(MAX_VISIBLE_LIGHTS)
    }

    pub fn excluded_count(&self) -> usize {
        self.visible_count.saturating_sub(MAX_VISIBLE_LIGHTS)
    }

    pub fn shadow_data(&self) -> [Vec4; MAX_VISIBLE_LIGHTS] {
        self.shadows.map(|descriptor| descriptor.to_vec4())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn configure_shadows(
    results: &dyn CullResults,
    index: usize,
    light: &VisibleLight,
    tile_count: &mut i32,
) -> ShadowDescriptor {
    let mut shadow = ShadowDescriptor::default();
    if light.shadows.is_enabled() && results.shadow_caster_bounds(index).is_some() {
        *tile_count += 1;
        shadow.strength = light.shadow_strength;
        shadow.soft = light.shadows.is_soft();
    }
    shadow
}

/// Fills `out` from the visible lights of this frame.
///
/// A shadowed directional light at index 0 becomes the main light when cascades are enabled.
/// It is rendered by the cascade pass instead of the tiled atlas, so one tile is taken back
/// off the count. The main light and every light past [`MAX_VISIBLE_LIGHTS`] are written back
/// to the host as [`EXCLUDED_LIGHT_INDEX`].
pub fn pack_lights(results: &mut dyn CullResults, cascade_count: usize, out: &mut PackedLights) {
    let visible_count = results.visible_lights().len();
    out.visible_count = visible_count;
    out.shadow_tile_count = 0;
    out.main_light = None;
    let packed = visible_count.min(MAX_VISIBLE_LIGHTS);

    for index in 0..packed {
        let light = &results.visible_lights()[index];
        let arrays = &mut out.arrays;
        arrays.colors[index] = light.final_color;
        arrays.spot_directions[index] = Vec4::ZERO;
        let mut attenuation = Vec4::new(0.0, 0.0, 0.0, 1.0);
        let mut shadow = ShadowDescriptor::default();

        match light.light_type {
            LightType::Directional => {
                arrays.directions_or_positions[index] = -light.local_to_world.z_axis;
                shadow = configure_shadows(&*results, index, light, &mut out.shadow_tile_count);
                if shadow.is_valid() {
                    shadow.directional = true;
                    if index == 0 && cascade_count > 0 {
                        out.main_light = Some(index);
                        out.shadow_tile_count -= 1;
                    }
                }
            }
            LightType::Point | LightType::Spot => {
                arrays.directions_or_positions[index] = light.local_to_world.w_axis;
                attenuation.x = 1.0 / (light.range * light.range).max(MIN_RANGE_SQUARED);
                if light.light_type == LightType::Spot {
                    arrays.spot_directions[index] = -light.local_to_world.z_axis;
                    let cone = SpotCone::from_angle(light.spot_angle);
                    attenuation.z = cone.scale;
                    attenuation.w = cone.offset;
                    shadow = configure_shadows(&*results, index, light, &mut out.shadow_tile_count);
                }
            }
        }
        arrays.attenuations[index] = attenuation;
        out.shadows[index] = shadow;
    }

    for index in packed..MAX_VISIBLE_LIGHTS {
        out.arrays.clear_slot(index);
        out.shadows[index] = ShadowDescriptor::default();
    }

    if out.main_light.is_some() || visible_count > MAX_VISIBLE_LIGHTS {
        let mut map = results.light_index_map();
        if out.main_light.is_some() {
            if let Some(first) = map.first_mut() {
                *first = EXCLUDED_LIGHT_INDEX;
            }
        }
        for entry in map.iter_mut().skip(MAX_VISIBLE_LIGHTS) {
            *entry = EXCLUDED_LIGHT_INDEX;
        }
        results.set_light_index_map(map);
        if visible_count > MAX_VISIBLE_LIGHTS {
            debug!(
                target: "renderer",
                "{} visible light(s) exceed the per-object budget (max {}) and were excluded.",
                visible_count - MAX_VISIBLE_LIGHTS,
                MAX_VISIBLE_LIGHTS
            );
        }
    }
}
