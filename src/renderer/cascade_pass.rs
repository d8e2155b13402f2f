use glam::{Mat4, Vec3, Vec4};
use log::warn;

use super::shadow_math::{cascade_sentinel, world_to_shadow};
use super::shadow_tiles::ShadowTileLayout;
use crate::config::ShadowMapSize;
use crate::culling::{CullResults, DirectionalShadowQuery};
use crate::draw::{AtlasHandle, DrawTarget, ShadowAtlasDesc, ShadowDrawSettings};
use crate::shader_params::{ShaderKeyword, ShaderParams};

pub const MAX_SHADOW_CASCADES: usize = 4;
const CASCADE_SPLIT: u32 = 2;
const SAMPLE_NAME: &str = "Render Cascaded Shadows";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeDescriptor {
    pub world_to_shadow: Mat4,
    /// Centre in `xyz`, squared radius in `w`. Zero when the cascade was not rendered.
    pub culling_sphere: Vec4,
    pub rendered: bool,
}

impl Default for CascadeDescriptor {
    fn default() -> Self {
        Self { world_to_shadow: Mat4::ZERO, culling_sphere: Vec4::ZERO, rendered: false }
    }
}

/// Renders the main directional light into a 2x2 cascade atlas.
#[derive(Default)]
pub struct CascadePass {
    atlas: Option<AtlasHandle>,
    cascades: [CascadeDescriptor; MAX_SHADOW_CASCADES],
    cascade_count: usize,
}

pub struct CascadePassParams<'a> {
    pub target: &'a mut dyn DrawTarget,
    pub results: &'a dyn CullResults,
    pub light_index: usize,
    pub cascade_count: usize,
    pub split_ratios: Vec3,
    pub atlas_size: ShadowMapSize,
    pub params: &'static ShaderParams,
}

impl CascadePass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atlas(&self) -> Option<AtlasHandle> {
        self.atlas
    }

    pub fn cascades(&self) -> &[CascadeDescriptor] {
        &self.cascades[..self.cascade_count]
    }

    pub fn disable_keywords(target: &mut dyn DrawTarget) {
        target.set_keyword(ShaderKeyword::CascadedShadowsHard, false);
        target.set_keyword(ShaderKeyword::CascadedShadowsSoft, false);
    }

    pub fn render(&mut self, params: CascadePassParams<'_>) {
        let CascadePassParams { target, results, light_index, cascade_count, split_ratios, atlas_size, params } =
            params;
        let cascade_count = cascade_count.min(MAX_SHADOW_CASCADES);
        let size = atlas_size.pixels();
        let layout = ShadowTileLayout::fixed(size, CASCADE_SPLIT);
        let reversed_z = target.uses_reversed_z();
        let sentinel = cascade_sentinel(reversed_z);
        self.cascade_count = cascade_count;
        self.cascades = [CascadeDescriptor { world_to_shadow: sentinel, ..CascadeDescriptor::default() };
            MAX_SHADOW_CASCADES];

        let atlas = target.acquire_shadow_atlas(&ShadowAtlasDesc::shadow_map("Cascaded Shadow Map", size));
        self.atlas = Some(atlas);
        target.begin_sample(SAMPLE_NAME);
        target.set_shadow_render_target(atlas);

        let light = &results.visible_lights()[light_index];
        target.set_global_float(params.shadow_bias, light.shadow_bias);

        for cascade_index in 0..cascade_count {
            let query = DirectionalShadowQuery {
                cascade_index,
                cascade_count,
                split_ratios,
                resolution: layout.tile_resolution(),
                near_plane: light.shadow_near_plane,
            };
            let Some(matrices) = results.directional_shadow_matrices(light_index, &query) else {
                warn!(target: "renderer", "Cascade {cascade_index} of the main light has no shadow frustum.");
                continue;
            };
            let tile = layout.tile(cascade_index);
            target.set_viewport(tile.viewport);
            target.enable_scissor(tile.scissor);
            target.set_view_projection(matrices.view, matrices.projection);

            let sphere = matrices.split.culling_sphere;
            let cascade = &mut self.cascades[cascade_index];
            cascade.culling_sphere = Vec4::new(sphere.x, sphere.y, sphere.z, sphere.w * sphere.w);
            target.draw_shadows(&ShadowDrawSettings {
                light_index,
                renderers: results.renderers(),
                split: matrices.split,
            });
            cascade.world_to_shadow =
                layout.tile_matrix(tile.offset) * world_to_shadow(matrices.view, matrices.projection, reversed_z);
            cascade.rendered = true;
        }

        target.disable_scissor();
        let mut matrices = [sentinel; MAX_SHADOW_CASCADES + 1];
        let mut spheres = [Vec4::ZERO; MAX_SHADOW_CASCADES];
        for (index, cascade) in self.cascades.iter().enumerate() {
            matrices[index] = cascade.world_to_shadow;
            spheres[index] = cascade.culling_sphere;
        }
        target.set_global_texture(params.cascaded_shadow_map, atlas);
        target.set_global_vector_array(params.cascade_culling_spheres, &spheres);
        target.set_global_matrix_array(params.world_to_shadow_cascade_matrices, &matrices);
        target.set_global_vector(params.cascaded_shadow_map_size, atlas_size.texel_size_vector());
        target.set_global_float(params.cascaded_shadow_strength, light.shadow_strength);
        let hard = !light.shadows.is_soft();
        target.set_keyword(ShaderKeyword::CascadedShadowsHard, hard);
        target.set_keyword(ShaderKeyword::CascadedShadowsSoft, !hard);
        target.end_sample(SAMPLE_NAME);
    }

    pub fn release(&mut self, target: &mut dyn DrawTarget) {
        if let Some(atlas) = self.atlas.take() {
            target.release_shadow_atlas(atlas);
        }
    }
}
