//! Interface to the host culling subsystem.
//!
//! The forward renderer never culls on its own. It asks a [`Culler`] for per-camera
//! parameters, runs the cull, and then queries the resulting [`CullResults`] for shadow
//! matrices and the per-object light index map.

use glam::{Mat4, Vec3, Vec4};

use crate::camera::Camera;
use crate::light::VisibleLight;

/// Light index value that makes the host skip a light during per-object light indexing.
pub const EXCLUDED_LIGHT_INDEX: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullingParameters {
    pub camera_position: Vec3,
    pub camera_forward: Vec3,
    pub view_projection: Mat4,
    /// Distance beyond which shadow casters are ignored. The renderer clamps it to the far plane.
    pub shadow_distance: f32,
}

/// Opaque handle to the renderers that survived culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RendererList(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub center: Vec3,
    pub extents: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShadowSplitData {
    /// World-space centre in `xyz`, radius in `w`.
    pub culling_sphere: Vec4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    pub split: ShadowSplitData,
}

/// Parameters for a directional shadow slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalShadowQuery {
    pub cascade_index: usize,
    pub cascade_count: usize,
    /// Cumulative normalized split distances. Two cascades read `x` only.
    pub split_ratios: Vec3,
    pub resolution: u32,
    pub near_plane: f32,
}

impl DirectionalShadowQuery {
    /// A single, uncascaded slice for a directional light rendered into the tiled atlas.
    pub fn single(resolution: u32, near_plane: f32) -> Self {
        Self { cascade_index: 0, cascade_count: 1, split_ratios: Vec3::X, resolution, near_plane }
    }
}

/// Everything the culling pass produced for one camera.
pub trait CullResults {
    fn visible_lights(&self) -> &[VisibleLight];

    fn renderers(&self) -> RendererList;

    /// Bounds of the casters affected by a light, `None` when nothing casts.
    fn shadow_caster_bounds(&self, light_index: usize) -> Option<Bounds>;

    fn spot_shadow_matrices(&self, light_index: usize) -> Option<ShadowMatrices>;

    fn directional_shadow_matrices(
        &self,
        light_index: usize,
        query: &DirectionalShadowQuery,
    ) -> Option<ShadowMatrices>;

    fn light_index_map(&self) -> Vec<i32>;

    fn set_light_index_map(&mut self, map: Vec<i32>);
}

pub trait Culler {
    type Results: CullResults;

    /// Editor hook run before culling scene-view cameras.
    fn emit_scene_view_geometry(&mut self, _camera: &Camera) {}

    /// `None` means the camera cannot be rendered this frame.
    fn culling_parameters(&mut self, camera: &Camera) -> Option<CullingParameters>;

    fn cull(&mut self, params: &CullingParameters) -> Self::Results;
}
