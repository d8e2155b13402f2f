mod cascade_pass;
mod light_packer;
mod shadow_math;
mod shadow_pass;
mod shadow_tiles;

use anyhow::Result;
use glam::Vec4;
use log::debug;
use smallvec::{smallvec, SmallVec};

use crate::camera::{Camera, CameraType};
use crate::config::PipelineConfig;
use crate::culling::{CullResults, Culler};
use crate::draw::{
    DrawRendererFlags, DrawSettings, DrawTarget, FilterSettings, MaterialHandle, PerObjectData, RenderQueueRange,
    ShaderPassName, SortCriteria,
};
use crate::shader_params::{ShaderKeyword, ShaderParams};

pub use cascade_pass::{CascadeDescriptor, CascadePass, CascadePassParams, MAX_SHADOW_CASCADES};
pub use light_packer::{pack_lights, LightArrays, LightUniform, PackedLights, ShadowDescriptor, SpotCone};
pub use shadow_math::{cascade_sentinel, flip_projection_depth, world_to_shadow, CLIP_TO_TEXTURE};
pub use shadow_pass::{ShadowPass, ShadowPassParams, ShadowPassStats};
pub use shadow_tiles::{shadow_split, ShadowTile, ShadowTileLayout, MAX_SHADOW_SPLIT, SHADOW_TILE_BORDER};

/// Lights the shaders can address per frame. Array strides on the GPU depend on it.
pub const MAX_VISIBLE_LIGHTS: usize = 16;
const _: () = assert!(MAX_VISIBLE_LIGHTS > 0 && MAX_VISIBLE_LIGHTS <= (MAX_SHADOW_SPLIT * MAX_SHADOW_SPLIT) as usize);

pub const ERROR_SHADER: &str = "Hidden/InternalErrorShader";
pub const FORWARD_PASS: ShaderPassName = ShaderPassName("SRPDefaultUnlit");
/// Built-in passes this pipeline does not render; drawn with the error material when debugging.
pub const LEGACY_PASSES: [ShaderPassName; 6] = [
    ShaderPassName("ForwardBase"),
    ShaderPassName("PrepassBase"),
    ShaderPassName("Always"),
    ShaderPassName("Vertex"),
    ShaderPassName("VertexLMRGBM"),
    ShaderPassName("VertexLM"),
];
const CAMERA_SAMPLE: &str = "Render Camera";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CameraStats {
    pub visible_lights: usize,
    pub packed_lights: usize,
    pub main_light: Option<usize>,
    pub shadow_tile_count: i32,
    pub shadow_tiles_used: u32,
    pub cascades_rendered: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub cameras_rendered: u32,
    pub cameras_skipped: u32,
}

/// Forward pipeline: culls, packs lights, renders shadow atlases and draws each camera.
pub struct ForwardRenderer {
    config: PipelineConfig,
    params: &'static ShaderParams,
    draw_flags: DrawRendererFlags,
    lights: PackedLights,
    shadow_pass: ShadowPass,
    cascade_pass: CascadePass,
    error_material: Option<MaterialHandle>,
    last_camera: Option<CameraStats>,
}

impl ForwardRenderer {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let draw_flags = config.draw_flags();
        Ok(Self {
            config,
            params: ShaderParams::global(),
            draw_flags,
            lights: PackedLights::default(),
            shadow_pass: ShadowPass::new(),
            cascade_pass: CascadePass::new(),
            error_material: None,
            last_camera: None,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn params(&self) -> &'static ShaderParams {
        self.params
    }

    pub fn lights(&self) -> &PackedLights {
        &self.lights
    }

    /// Light arrays of the last rendered camera in constant-buffer layout.
    pub fn light_uniform(&self) -> LightUniform {
        self.lights.arrays.to_uniform()
    }

    pub fn shadow_pass(&self) -> &ShadowPass {
        &self.shadow_pass
    }

    pub fn cascade_pass(&self) -> &CascadePass {
        &self.cascade_pass
    }

    pub fn last_camera_stats(&self) -> Option<CameraStats> {
        self.last_camera
    }

    /// Renders the cameras in order; each one is recorded and submitted before the next starts.
    pub fn render<T: DrawTarget, C: Culler>(
        &mut self,
        target: &mut T,
        culler: &mut C,
        cameras: &[Camera],
    ) -> FrameStats {
        let mut stats = FrameStats::default();
        for camera in cameras {
            match self.render_camera(target, culler, camera) {
                Some(_) => stats.cameras_rendered += 1,
                None => stats.cameras_skipped += 1,
            }
        }
        stats
    }

    pub fn render_camera<T: DrawTarget, C: Culler>(
        &mut self,
        target: &mut T,
        culler: &mut C,
        camera: &Camera,
    ) -> Option<CameraStats> {
        if camera.camera_type == CameraType::SceneView && self.config.debug.emit_scene_view_geometry {
            culler.emit_scene_view_geometry(camera);
        }

        let Some(mut cull_params) = culler.culling_parameters(camera) else {
            debug!(target: "renderer", "Camera '{}' produced no culling parameters; skipped.", camera.name);
            self.last_camera = None;
            return None;
        };
        cull_params.shadow_distance = self.config.shadow_distance.min(camera.far);
        let mut results = culler.cull(&cull_params);

        let stats = self.configure_lights_and_shadows(target, &mut results, cull_params.shadow_distance);
        self.draw_camera(target, &results, camera);
        self.release_transients(target);
        self.last_camera = Some(stats);
        Some(stats)
    }

    fn configure_lights_and_shadows(
        &mut self,
        target: &mut dyn DrawTarget,
        results: &mut dyn CullResults,
        shadow_distance: f32,
    ) -> CameraStats {
        let visible_lights = results.visible_lights().len();
        if visible_lights == 0 {
            self.lights.clear();
            target.set_global_vector(self.params.light_indices_offset_and_count, Vec4::ZERO);
            for keyword in ShaderKeyword::ALL {
                target.set_keyword(keyword, false);
            }
            return CameraStats::default();
        }

        let cascade_count = self.config.shadow_cascades.count();
        pack_lights(results, cascade_count, &mut self.lights);
        let mut stats = CameraStats {
            visible_lights,
            packed_lights: self.lights.packed_count(),
            main_light: self.lights.main_light,
            shadow_tile_count: self.lights.shadow_tile_count,
            ..CameraStats::default()
        };

        if let Some(light_index) = self.lights.main_light {
            self.cascade_pass.render(CascadePassParams {
                target: &mut *target,
                results: &*results,
                light_index,
                cascade_count,
                split_ratios: self.config.cascade_split_ratios(),
                atlas_size: self.config.shadow_map_size,
                params: self.params,
            });
            stats.cascades_rendered = self.cascade_pass.cascades().iter().filter(|c| c.rendered).count();
        } else {
            CascadePass::disable_keywords(target);
        }

        if self.lights.shadow_tile_count > 0 {
            self.shadow_pass.render(ShadowPassParams {
                target: &mut *target,
                results: &*results,
                lights: &mut self.lights,
                atlas_size: self.config.shadow_map_size,
                shadow_distance,
                params: self.params,
            });
            stats.shadow_tiles_used = self.shadow_pass.stats().tiles_used;
        } else {
            ShadowPass::disable_keywords(target);
        }
        stats
    }

    fn draw_camera(&mut self, target: &mut dyn DrawTarget, results: &dyn CullResults, camera: &Camera) {
        target.setup_camera_properties(camera);
        target.clear_render_target(camera.clear_flags, camera.background);

        target.begin_sample(CAMERA_SAMPLE);
        let arrays = &self.lights.arrays;
        target.set_global_vector_array(self.params.visible_light_colors, &arrays.colors);
        target.set_global_vector_array(
            self.params.visible_light_directions_or_positions,
            &arrays.directions_or_positions,
        );
        target.set_global_vector_array(self.params.visible_light_attenuations, &arrays.attenuations);
        target.set_global_vector_array(self.params.visible_light_spot_directions, &arrays.spot_directions);

        let renderers = results.renderers();
        let mut draw = self.scene_draw_settings(SortCriteria::CommonOpaque);
        target.draw_renderers(renderers, &draw, &FilterSettings { queue_range: RenderQueueRange::OPAQUE });
        target.draw_skybox(camera);
        draw.sorting = SortCriteria::CommonTransparent;
        target.draw_renderers(renderers, &draw, &FilterSettings { queue_range: RenderQueueRange::TRANSPARENT });

        if self.config.debug.draw_unsupported_shaders {
            self.draw_unsupported_shaders(target, results);
        }

        target.end_sample(CAMERA_SAMPLE);
        target.submit();
    }

    fn scene_draw_settings(&self, sorting: SortCriteria) -> DrawSettings {
        DrawSettings {
            passes: smallvec![FORWARD_PASS],
            sorting,
            flags: self.draw_flags,
            per_object: PerObjectData::LIGHT_INDICES_8,
            override_material: None,
        }
    }

    fn draw_unsupported_shaders(&mut self, target: &mut dyn DrawTarget, results: &dyn CullResults) {
        let material = *self.error_material.get_or_insert_with(|| target.create_material(ERROR_SHADER));
        let passes: SmallVec<[ShaderPassName; 6]> = SmallVec::from_buf(LEGACY_PASSES);
        let draw = DrawSettings {
            passes,
            sorting: SortCriteria::Unsorted,
            flags: DrawRendererFlags::empty(),
            per_object: PerObjectData::empty(),
            override_material: Some(material),
        };
        target.draw_renderers(results.renderers(), &draw, &FilterSettings { queue_range: RenderQueueRange::ALL });
    }

    fn release_transients(&mut self, target: &mut dyn DrawTarget) {
        self.shadow_pass.release(target);
        self.cascade_pass.release(target);
    }
}
