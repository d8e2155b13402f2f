use glam::{Mat4, Vec4};
use log::{debug, warn};

use super::light_packer::PackedLights;
use super::shadow_math::world_to_shadow;
use super::shadow_tiles::ShadowTileLayout;
use super::MAX_VISIBLE_LIGHTS;
use crate::config::ShadowMapSize;
use crate::culling::{CullResults, DirectionalShadowQuery};
use crate::draw::{AtlasHandle, DrawTarget, ShadowAtlasDesc, ShadowDrawSettings};
use crate::shader_params::{ShaderKeyword, ShaderParams};

const SAMPLE_NAME: &str = "Render Shadows";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadowPassStats {
    pub split: u32,
    pub tiles_used: u32,
    pub skipped_lights: u32,
    pub hard_shadows: bool,
    pub soft_shadows: bool,
}

/// Renders every non-main shadowed light into one tiled atlas.
pub struct ShadowPass {
    atlas: Option<AtlasHandle>,
    world_to_shadow: [Mat4; MAX_VISIBLE_LIGHTS],
    stats: ShadowPassStats,
}

impl Default for ShadowPass {
    fn default() -> Self {
        Self { atlas: None, world_to_shadow: [Mat4::IDENTITY; MAX_VISIBLE_LIGHTS], stats: ShadowPassStats::default() }
    }
}

pub struct ShadowPassParams<'a> {
    pub target: &'a mut dyn DrawTarget,
    pub results: &'a dyn CullResults,
    pub lights: &'a mut PackedLights,
    pub atlas_size: ShadowMapSize,
    pub shadow_distance: f32,
    pub params: &'static ShaderParams,
}

impl ShadowPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atlas(&self) -> Option<AtlasHandle> {
        self.atlas
    }

    pub fn world_to_shadow_matrices(&self) -> &[Mat4; MAX_VISIBLE_LIGHTS] {
        &self.world_to_shadow
    }

    pub fn stats(&self) -> ShadowPassStats {
        self.stats
    }

    pub fn disable_keywords(target: &mut dyn DrawTarget) {
        target.set_keyword(ShaderKeyword::ShadowsHard, false);
        target.set_keyword(ShaderKeyword::ShadowsSoft, false);
    }

    pub fn render(&mut self, params: ShadowPassParams<'_>) {
        let ShadowPassParams { target, results, lights, atlas_size, shadow_distance, params } = params;
        let size = atlas_size.pixels();
        let layout = ShadowTileLayout::new(size, lights.shadow_tile_count);
        self.stats = ShadowPassStats { split: layout.split, ..ShadowPassStats::default() };
        self.world_to_shadow = [Mat4::IDENTITY; MAX_VISIBLE_LIGHTS];

        let atlas = target.acquire_shadow_atlas(&ShadowAtlasDesc::shadow_map("Shadow Map", size));
        self.atlas = Some(atlas);
        target.begin_sample(SAMPLE_NAME);
        target.set_shadow_render_target(atlas);

        let reversed_z = target.uses_reversed_z();
        let first = if lights.main_light.is_some() { 1 } else { 0 };
        let mut tile_index = 0usize;

        for index in first..lights.packed_count() {
            let descriptor = lights.shadows[index];
            if !descriptor.is_valid() {
                continue;
            }
            let light = &results.visible_lights()[index];
            let matrices = if descriptor.directional {
                let query = DirectionalShadowQuery::single(layout.tile_resolution(), light.shadow_near_plane);
                results.directional_shadow_matrices(index, &query)
            } else {
                results.spot_shadow_matrices(index)
            };
            let Some(matrices) = matrices else {
                debug!(target: "renderer", "No shadow frustum for light {index}; shadows disabled this frame.");
                lights.shadows[index].strength = 0.0;
                self.stats.skipped_lights += 1;
                continue;
            };
            if tile_index >= layout.capacity() {
                warn!(
                    target: "renderer",
                    "Shadow atlas is full ({} tiles); light {index} renders without shadows.",
                    layout.capacity()
                );
                lights.shadows[index].strength = 0.0;
                self.stats.skipped_lights += 1;
                continue;
            }

            let tile = layout.tile(tile_index);
            if layout.is_tiled() {
                target.set_viewport(tile.viewport);
                target.enable_scissor(tile.scissor);
            }
            lights.shadows[index].tile_offset = Some(tile.offset * layout.tile_scale);
            target.set_view_projection(matrices.view, matrices.projection);
            target.set_global_float(params.shadow_bias, light.shadow_bias);
            target.draw_shadows(&ShadowDrawSettings {
                light_index: index,
                renderers: results.renderers(),
                split: matrices.split,
            });
            self.world_to_shadow[index] =
                layout.tile_matrix(tile.offset) * world_to_shadow(matrices.view, matrices.projection, reversed_z);
            tile_index += 1;
            if descriptor.soft {
                self.stats.soft_shadows = true;
            } else {
                self.stats.hard_shadows = true;
            }
        }
        self.stats.tiles_used = tile_index as u32;

        if layout.is_tiled() {
            target.disable_scissor();
        }
        target.set_global_texture(params.shadow_map, atlas);
        target.set_global_vector_array(params.shadow_data, &lights.shadow_data());
        target.set_global_matrix_array(params.world_to_shadow_matrices, &self.world_to_shadow);
        target.set_global_vector(params.shadow_map_size, atlas_size.texel_size_vector());
        target.set_global_vector(
            params.global_shadow_data,
            Vec4::new(layout.tile_scale, shadow_distance * shadow_distance, 0.0, 0.0),
        );
        target.set_keyword(ShaderKeyword::ShadowsHard, self.stats.hard_shadows);
        target.set_keyword(ShaderKeyword::ShadowsSoft, self.stats.soft_shadows);
        target.end_sample(SAMPLE_NAME);
    }

    pub fn release(&mut self, target: &mut dyn DrawTarget) {
        if let Some(atlas) = self.atlas.take() {
            target.release_shadow_atlas(atlas);
        }
    }
}
