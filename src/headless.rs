//! In-process host used by tests and the `frame_trace` tool.
//!
//! [`RecordingTarget`] keeps every command it receives plus the resulting global state.
//! [`ScriptedCuller`] hands out a fixed light list and derives shadow frusta from the light
//! transforms, so the pipeline can be driven end to end without a GPU.

use anyhow::{Context, Result};
use glam::{EulerRot, Mat4, Quat, Vec3, Vec4};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use crate::camera::{Camera, CameraType, ClearFlags};
use crate::culling::{
    Bounds, CullResults, Culler, CullingParameters, DirectionalShadowQuery, RendererList, ShadowMatrices,
    ShadowSplitData,
};
use crate::draw::{
    AtlasHandle, DrawSettings, DrawTarget, FilterSettings, MaterialHandle, Rect, ShadowAtlasDesc, ShadowDrawSettings,
};
use crate::light::{LightShadows, LightType, VisibleLight};
use crate::renderer::flip_projection_depth;
use crate::shader_params::{ParamId, ShaderKeyword, ShaderParams};

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    SetupCamera { camera: String },
    Clear { flags: ClearFlags, color: Vec4 },
    BeginSample(String),
    EndSample(String),
    AcquireAtlas { atlas: AtlasHandle, desc: ShadowAtlasDesc },
    ReleaseAtlas(AtlasHandle),
    SetShadowRenderTarget(AtlasHandle),
    SetViewport(Rect),
    EnableScissor(Rect),
    DisableScissor,
    SetViewProjection { view: Mat4, projection: Mat4 },
    SetGlobalFloat(ParamId, f32),
    SetGlobalVector(ParamId, Vec4),
    SetGlobalVectorArray(ParamId, Vec<Vec4>),
    SetGlobalMatrixArray(ParamId, Vec<Mat4>),
    SetGlobalTexture(ParamId, AtlasHandle),
    SetKeyword(ShaderKeyword, bool),
    CreateMaterial { material: MaterialHandle, shader: String },
    DrawShadows(ShadowDrawSettings),
    DrawRenderers { renderers: RendererList, draw: DrawSettings, filter: FilterSettings },
    DrawSkybox { camera: String },
    Submit,
}

impl DrawCommand {
    /// One-line summary with parameter names resolved.
    pub fn describe(&self, params: &ShaderParams) -> String {
        match self {
            DrawCommand::SetupCamera { camera } => format!("setup camera '{camera}'"),
            DrawCommand::Clear { flags, color } => format!("clear {flags:?} {color}"),
            DrawCommand::BeginSample(name) => format!("begin sample '{name}'"),
            DrawCommand::EndSample(name) => format!("end sample '{name}'"),
            DrawCommand::AcquireAtlas { atlas, desc } => {
                format!(
                    "acquire atlas #{} '{}' {}x{} ({}-bit depth)",
                    atlas.0, desc.label, desc.size, desc.size, desc.depth_bits
                )
            }
            DrawCommand::ReleaseAtlas(atlas) => format!("release atlas #{}", atlas.0),
            DrawCommand::SetShadowRenderTarget(atlas) => format!("target atlas #{} (clear depth)", atlas.0),
            DrawCommand::SetViewport(rect) => {
                format!("viewport ({}, {}) {}x{}", rect.x, rect.y, rect.width, rect.height)
            }
            DrawCommand::EnableScissor(rect) => {
                format!("scissor ({}, {}) {}x{}", rect.x, rect.y, rect.width, rect.height)
            }
            DrawCommand::DisableScissor => "scissor off".to_string(),
            DrawCommand::SetViewProjection { .. } => "set view/projection".to_string(),
            DrawCommand::SetGlobalFloat(id, value) => format!("{} = {value}", params.name(*id)),
            DrawCommand::SetGlobalVector(id, value) => format!("{} = {value}", params.name(*id)),
            DrawCommand::SetGlobalVectorArray(id, values) => {
                format!("{} = vector[{}]", params.name(*id), values.len())
            }
            DrawCommand::SetGlobalMatrixArray(id, values) => {
                format!("{} = matrix[{}]", params.name(*id), values.len())
            }
            DrawCommand::SetGlobalTexture(id, atlas) => format!("{} = atlas #{}", params.name(*id), atlas.0),
            DrawCommand::SetKeyword(keyword, enabled) => {
                format!("{} {}", if *enabled { "enable" } else { "disable" }, keyword.name())
            }
            DrawCommand::CreateMaterial { material, shader } => format!("material #{} <- '{shader}'", material.0),
            DrawCommand::DrawShadows(settings) => format!(
                "draw shadows light {} sphere {}",
                settings.light_index, settings.split.culling_sphere
            ),
            DrawCommand::DrawRenderers { draw, filter, .. } => {
                let passes: Vec<&str> = draw.passes.iter().map(|pass| pass.0).collect();
                format!(
                    "draw renderers queue {}..={} {:?} passes [{}]{}",
                    filter.queue_range.min,
                    filter.queue_range.max,
                    draw.sorting,
                    passes.join(", "),
                    if draw.override_material.is_some() { " (override material)" } else { "" }
                )
            }
            DrawCommand::DrawSkybox { camera } => format!("draw skybox '{camera}'"),
            DrawCommand::Submit => "submit".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlobalValue {
    Float(f32),
    Vector(Vec4),
    VectorArray(Vec<Vec4>),
    MatrixArray(Vec<Mat4>),
    Texture(AtlasHandle),
}

/// [`DrawTarget`] that records instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    reversed_z: bool,
    commands: Vec<DrawCommand>,
    globals: HashMap<ParamId, GlobalValue>,
    keywords: HashMap<ShaderKeyword, bool>,
    acquired: Vec<ShadowAtlasDesc>,
    live_atlases: HashSet<AtlasHandle>,
    next_atlas: u32,
    next_material: u32,
    submits: u32,
}

impl RecordingTarget {
    pub fn new(reversed_z: bool) -> Self {
        Self { reversed_z, ..Self::default() }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn count(&self, predicate: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|cmd| predicate(cmd)).count()
    }

    pub fn global(&self, id: ParamId) -> Option<&GlobalValue> {
        self.globals.get(&id)
    }

    pub fn global_float(&self, id: ParamId) -> Option<f32> {
        match self.globals.get(&id)? {
            GlobalValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn global_vector(&self, id: ParamId) -> Option<Vec4> {
        match self.globals.get(&id)? {
            GlobalValue::Vector(value) => Some(*value),
            _ => None,
        }
    }

    pub fn global_vector_array(&self, id: ParamId) -> Option<&[Vec4]> {
        match self.globals.get(&id)? {
            GlobalValue::VectorArray(values) => Some(values),
            _ => None,
        }
    }

    pub fn global_matrix_array(&self, id: ParamId) -> Option<&[Mat4]> {
        match self.globals.get(&id)? {
            GlobalValue::MatrixArray(values) => Some(values),
            _ => None,
        }
    }

    pub fn keyword(&self, keyword: ShaderKeyword) -> Option<bool> {
        self.keywords.get(&keyword).copied()
    }

    /// Every atlas requested since construction, in order.
    pub fn acquired_atlases(&self) -> &[ShadowAtlasDesc] {
        &self.acquired
    }

    pub fn live_atlas_count(&self) -> usize {
        self.live_atlases.len()
    }

    pub fn submit_count(&self) -> u32 {
        self.submits
    }

    fn set_global(&mut self, id: ParamId, value: GlobalValue) {
        self.globals.insert(id, value);
    }
}

impl DrawTarget for RecordingTarget {
    fn uses_reversed_z(&self) -> bool {
        self.reversed_z
    }

    fn setup_camera_properties(&mut self, camera: &Camera) {
        self.commands.push(DrawCommand::SetupCamera { camera: camera.name.clone() });
    }

    fn clear_render_target(&mut self, flags: ClearFlags, color: Vec4) {
        self.commands.push(DrawCommand::Clear { flags, color });
    }

    fn begin_sample(&mut self, name: &str) {
        self.commands.push(DrawCommand::BeginSample(name.to_string()));
    }

    fn end_sample(&mut self, name: &str) {
        self.commands.push(DrawCommand::EndSample(name.to_string()));
    }

    fn acquire_shadow_atlas(&mut self, desc: &ShadowAtlasDesc) -> AtlasHandle {
        self.next_atlas += 1;
        let atlas = AtlasHandle(self.next_atlas);
        self.acquired.push(*desc);
        self.live_atlases.insert(atlas);
        self.commands.push(DrawCommand::AcquireAtlas { atlas, desc: *desc });
        atlas
    }

    fn release_shadow_atlas(&mut self, atlas: AtlasHandle) {
        self.live_atlases.remove(&atlas);
        self.commands.push(DrawCommand::ReleaseAtlas(atlas));
    }

    fn set_shadow_render_target(&mut self, atlas: AtlasHandle) {
        self.commands.push(DrawCommand::SetShadowRenderTarget(atlas));
    }

    fn set_viewport(&mut self, viewport: Rect) {
        self.commands.push(DrawCommand::SetViewport(viewport));
    }

    fn enable_scissor(&mut self, scissor: Rect) {
        self.commands.push(DrawCommand::EnableScissor(scissor));
    }

    fn disable_scissor(&mut self) {
        self.commands.push(DrawCommand::DisableScissor);
    }

    fn set_view_projection(&mut self, view: Mat4, projection: Mat4) {
        self.commands.push(DrawCommand::SetViewProjection { view, projection });
    }

    fn set_global_float(&mut self, id: ParamId, value: f32) {
        self.set_global(id, GlobalValue::Float(value));
        self.commands.push(DrawCommand::SetGlobalFloat(id, value));
    }

    fn set_global_vector(&mut self, id: ParamId, value: Vec4) {
        self.set_global(id, GlobalValue::Vector(value));
        self.commands.push(DrawCommand::SetGlobalVector(id, value));
    }

    fn set_global_vector_array(&mut self, id: ParamId, values: &[Vec4]) {
        self.set_global(id, GlobalValue::VectorArray(values.to_vec()));
        self.commands.push(DrawCommand::SetGlobalVectorArray(id, values.to_vec()));
    }

    fn set_global_matrix_array(&mut self, id: ParamId, values: &[Mat4]) {
        self.set_global(id, GlobalValue::MatrixArray(values.to_vec()));
        self.commands.push(DrawCommand::SetGlobalMatrixArray(id, values.to_vec()));
    }

    fn set_global_texture(&mut self, id: ParamId, atlas: AtlasHandle) {
        self.set_global(id, GlobalValue::Texture(atlas));
        self.commands.push(DrawCommand::SetGlobalTexture(id, atlas));
    }

    fn set_keyword(&mut self, keyword: ShaderKeyword, enabled: bool) {
        self.keywords.insert(keyword, enabled);
        self.commands.push(DrawCommand::SetKeyword(keyword, enabled));
    }

    fn create_material(&mut self, shader: &str) -> MaterialHandle {
        self.next_material += 1;
        let material = MaterialHandle(self.next_material);
        self.commands.push(DrawCommand::CreateMaterial { material, shader: shader.to_string() });
        material
    }

    fn draw_shadows(&mut self, settings: &ShadowDrawSettings) {
        self.commands.push(DrawCommand::DrawShadows(*settings));
    }

    fn draw_renderers(&mut self, renderers: RendererList, draw: &DrawSettings, filter: &FilterSettings) {
        self.commands.push(DrawCommand::DrawRenderers { renderers, draw: draw.clone(), filter: *filter });
    }

    fn draw_skybox(&mut self, camera: &Camera) {
        self.commands.push(DrawCommand::DrawSkybox { camera: camera.name.clone() });
    }

    fn submit(&mut self) {
        self.submits += 1;
        self.commands.push(DrawCommand::Submit);
    }
}

fn light_up_vector(direction: Vec3) -> Vec3 {
    if direction.y.abs() > 0.95 {
        Vec3::X
    } else {
        Vec3::Y
    }
}

/// Culling stand-in with a fixed light list.
#[derive(Debug, Default)]
pub struct ScriptedCuller {
    lights: Vec<VisibleLight>,
    without_casters: HashSet<usize>,
    failing_shadows: HashSet<usize>,
    failing_cascades: HashSet<(usize, usize)>,
    reversed_z: bool,
    index_map: Rc<RefCell<Vec<i32>>>,
    directional_queries: Rc<RefCell<Vec<(usize, DirectionalShadowQuery)>>>,
    scene_view_emits: u32,
    cull_count: u32,
    last_parameters: Option<CullingParameters>,
}

impl ScriptedCuller {
    pub fn new(lights: Vec<VisibleLight>) -> Self {
        Self { lights, ..Self::default() }
    }

    /// Light `index` reports no shadow caster bounds.
    pub fn without_casters(mut self, index: usize) -> Self {
        self.without_casters.insert(index);
        self
    }

    /// Light `index` has caster bounds but no usable shadow frustum.
    pub fn with_failing_shadow(mut self, index: usize) -> Self {
        self.failing_shadows.insert(index);
        self
    }

    /// Cascade `cascade_index` of light `index` has no usable frustum.
    pub fn with_failing_cascade(mut self, index: usize, cascade_index: usize) -> Self {
        self.failing_cascades.insert((index, cascade_index));
        self
    }

    /// Emits depth-reversed shadow projections, for targets that use reversed Z.
    pub fn with_reversed_z(mut self, reversed_z: bool) -> Self {
        self.reversed_z = reversed_z;
        self
    }

    pub fn set_lights(&mut self, lights: Vec<VisibleLight>) {
        self.lights = lights;
    }

    /// Index map as left by the renderer after the most recent cull.
    pub fn last_light_index_map(&self) -> Vec<i32> {
        self.index_map.borrow().clone()
    }

    /// Directional shadow queries made against the most recent cull, in order.
    pub fn directional_queries(&self) -> Vec<(usize, DirectionalShadowQuery)> {
        self.directional_queries.borrow().clone()
    }

    pub fn last_parameters(&self) -> Option<CullingParameters> {
        self.last_parameters
    }

    pub fn scene_view_emits(&self) -> u32 {
        self.scene_view_emits
    }

    pub fn cull_count(&self) -> u32 {
        self.cull_count
    }
}

impl Culler for ScriptedCuller {
    type Results = ScriptedResults;

    fn emit_scene_view_geometry(&mut self, _camera: &Camera) {
        self.scene_view_emits += 1;
    }

    fn culling_parameters(&mut self, camera: &Camera) -> Option<CullingParameters> {
        if camera.is_degenerate() {
            return None;
        }
        Some(CullingParameters {
            camera_position: camera.position,
            camera_forward: camera.forward(),
            view_projection: camera.view_projection(1.0),
            shadow_distance: camera.far,
        })
    }

    fn cull(&mut self, params: &CullingParameters) -> ScriptedResults {
        self.cull_count += 1;
        self.last_parameters = Some(*params);
        *self.index_map.borrow_mut() = (0..self.lights.len() as i32).collect();
        self.directional_queries.borrow_mut().clear();
        ScriptedResults {
            lights: self.lights.clone(),
            without_casters: self.without_casters.clone(),
            failing_shadows: self.failing_shadows.clone(),
            failing_cascades: self.failing_cascades.clone(),
            reversed_z: self.reversed_z,
            params: *params,
            renderers: RendererList(u64::from(self.cull_count)),
            index_map: Rc::clone(&self.index_map),
            directional_queries: Rc::clone(&self.directional_queries),
        }
    }
}

#[derive(Debug)]
pub struct ScriptedResults {
    lights: Vec<VisibleLight>,
    without_casters: HashSet<usize>,
    failing_shadows: HashSet<usize>,
    failing_cascades: HashSet<(usize, usize)>,
    reversed_z: bool,
    params: CullingParameters,
    renderers: RendererList,
    index_map: Rc<RefCell<Vec<i32>>>,
    directional_queries: Rc<RefCell<Vec<(usize, DirectionalShadowQuery)>>>,
}

impl ScriptedResults {
    /// GL clip depth (-1..1), negated into reversed Z when the target expects it.
    fn host_projection(&self, projection: Mat4) -> Mat4 {
        if self.reversed_z {
            flip_projection_depth(projection)
        } else {
            projection
        }
    }

    fn has_shadow_frustum(&self, light_index: usize) -> bool {
        light_index < self.lights.len()
            && !self.without_casters.contains(&light_index)
            && !self.failing_shadows.contains(&light_index)
    }
}

impl CullResults for ScriptedResults {
    fn visible_lights(&self) -> &[VisibleLight] {
        &self.lights
    }

    fn renderers(&self) -> RendererList {
        self.renderers
    }

    fn shadow_caster_bounds(&self, light_index: usize) -> Option<Bounds> {
        if self.without_casters.contains(&light_index) {
            return None;
        }
        let light = self.lights.get(light_index)?;
        Some(Bounds { center: light.position(), extents: Vec3::splat(light.range.max(1.0)) })
    }

    fn spot_shadow_matrices(&self, light_index: usize) -> Option<ShadowMatrices> {
        if !self.has_shadow_frustum(light_index) {
            return None;
        }
        let light = &self.lights[light_index];
        if light.light_type != LightType::Spot {
            return None;
        }
        let forward = light.forward().normalize_or_zero();
        if forward.length_squared() < f32::EPSILON {
            return None;
        }
        let position = light.position();
        let near = light.shadow_near_plane.max(0.01);
        let far = light.range.max(near + 0.01);
        let view = Mat4::look_at_rh(position, position + forward, light_up_vector(forward));
        let projection =
            self.host_projection(Mat4::perspective_rh_gl(light.spot_angle.to_radians().max(0.01), 1.0, near, far));
        let radius = far * 0.5;
        let center = position + forward * radius;
        Some(ShadowMatrices { view, projection, split: ShadowSplitData { culling_sphere: center.extend(radius) } })
    }

    fn directional_shadow_matrices(
        &self,
        light_index: usize,
        query: &DirectionalShadowQuery,
    ) -> Option<ShadowMatrices> {
        self.directional_queries.borrow_mut().push((light_index, *query));
        if !self.has_shadow_frustum(light_index)
            || query.cascade_index >= query.cascade_count.max(1)
            || self.failing_cascades.contains(&(light_index, query.cascade_index))
        {
            return None;
        }
        let light = &self.lights[light_index];
        if light.light_type != LightType::Directional {
            return None;
        }
        let direction = light.forward().normalize_or_zero();
        if direction.length_squared() < f32::EPSILON {
            return None;
        }
        let count = query.cascade_count.max(1);
        let boundary = |index: usize| -> f32 {
            if index == 0 {
                0.0
            } else if index >= count {
                1.0
            } else {
                query.split_ratios[index - 1]
            }
        };
        let distance = self.params.shadow_distance;
        let near = distance * boundary(query.cascade_index);
        let far = distance * boundary(query.cascade_index + 1);
        let radius = ((far - near) * 0.5).max(0.5);
        let center = self.params.camera_position + self.params.camera_forward * (near + far) * 0.5;
        let eye = center - direction * radius * 2.0;
        let view = Mat4::look_at_rh(eye, center, light_up_vector(direction));
        let projection = self.host_projection(Mat4::orthographic_rh_gl(
            -radius,
            radius,
            -radius,
            radius,
            query.near_plane.max(0.0),
            radius * 4.0,
        ));
        Some(ShadowMatrices { view, projection, split: ShadowSplitData { culling_sphere: center.extend(radius) } })
    }

    fn light_index_map(&self) -> Vec<i32> {
        self.index_map.borrow().clone()
    }

    fn set_light_index_map(&mut self, map: Vec<i32>) {
        *self.index_map.borrow_mut() = map;
    }
}

/// JSON scene consumed by `frame_trace`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SceneDescription {
    #[serde(default)]
    pub cameras: Vec<CameraDescription>,
    #[serde(default)]
    pub lights: Vec<LightDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraDescription {
    #[serde(default = "default_camera_name")]
    pub name: String,
    #[serde(default)]
    pub camera_type: CameraType,
    pub position: [f32; 3],
    pub target: [f32; 3],
    #[serde(default = "default_fov_degrees")]
    pub fov_degrees: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    #[serde(default = "default_true")]
    pub clear_depth: bool,
    #[serde(default = "default_true")]
    pub clear_color: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LightDescription {
    #[serde(rename = "type")]
    pub light_type: LightType,
    #[serde(default)]
    pub position: [f32; 3],
    /// Euler angles in degrees, applied yaw (Y), pitch (X), roll (Z).
    #[serde(default)]
    pub rotation_degrees: [f32; 3],
    #[serde(default = "default_color")]
    pub color: [f32; 4],
    #[serde(default = "default_one")]
    pub intensity: f32,
    #[serde(default = "default_range")]
    pub range: f32,
    #[serde(default = "default_spot_angle")]
    pub spot_angle: f32,
    #[serde(default)]
    pub shadows: LightShadows,
    #[serde(default = "default_one")]
    pub shadow_strength: f32,
    #[serde(default = "default_true")]
    pub casters: bool,
    #[serde(default)]
    pub fail_shadow_frustum: bool,
}

fn default_camera_name() -> String {
    "Camera".to_string()
}

const fn default_fov_degrees() -> f32 {
    60.0
}

const fn default_near() -> f32 {
    0.3
}

const fn default_far() -> f32 {
    1000.0
}

const fn default_true() -> bool {
    true
}

const fn default_color() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

const fn default_one() -> f32 {
    1.0
}

const fn default_range() -> f32 {
    10.0
}

const fn default_spot_angle() -> f32 {
    30.0
}

impl CameraDescription {
    pub fn to_camera(&self) -> Camera {
        let mut clear_flags = ClearFlags::empty();
        if self.clear_depth {
            clear_flags |= ClearFlags::DEPTH;
        }
        if self.clear_color {
            clear_flags |= ClearFlags::COLOR;
        }
        Camera::new(
            Vec3::from_array(self.position),
            Vec3::from_array(self.target),
            self.fov_degrees.to_radians(),
            self.near,
            self.far,
        )
        .with_name(self.name.clone())
        .with_type(self.camera_type)
        .with_clear_flags(clear_flags)
    }
}

impl LightDescription {
    pub fn to_visible_light(&self) -> VisibleLight {
        let [pitch, yaw, roll] = self.rotation_degrees.map(f32::to_radians);
        let rotation = Quat::from_euler(EulerRot::YXZ, yaw, pitch, roll);
        let color = Vec4::from_array(self.color) * self.intensity;
        let position = Vec3::from_array(self.position);
        let light = match self.light_type {
            LightType::Directional => VisibleLight::directional(rotation, color),
            LightType::Point => VisibleLight::point(position, color, self.range),
            LightType::Spot => VisibleLight::spot(position, rotation, color, self.range, self.spot_angle),
        };
        light.with_shadows(self.shadows, self.shadow_strength)
    }
}

impl SceneDescription {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Failed to read scene {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse scene {}", path.display()))
    }

    pub fn cameras(&self) -> Vec<Camera> {
        self.cameras.iter().map(CameraDescription::to_camera).collect()
    }

    /// `reversed_z` must match the target the frame is recorded into.
    pub fn culler(&self, reversed_z: bool) -> ScriptedCuller {
        let lights = self.lights.iter().map(LightDescription::to_visible_light).collect();
        let mut culler = ScriptedCuller::new(lights).with_reversed_z(reversed_z);
        for (index, light) in self.lights.iter().enumerate() {
            if !light.casters {
                culler = culler.without_casters(index);
            }
            if light.fail_shadow_frustum {
                culler = culler.with_failing_shadow(index);
            }
        }
        culler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::world_to_shadow;

    #[test]
    fn degenerate_camera_gets_no_parameters() {
        let mut culler = ScriptedCuller::default();
        let camera = Camera::new(Vec3::ZERO, Vec3::Z, 1.0, 1.0, 0.5);
        assert!(culler.culling_parameters(&camera).is_none());
    }

    #[test]
    fn cascades_cover_increasing_depth_ranges() {
        let sun = VisibleLight::directional(Quat::from_rotation_x(-0.9), Vec4::ONE)
            .with_shadows(LightShadows::Hard, 1.0);
        let mut culler = ScriptedCuller::new(vec![sun]);
        let camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 1.0, 0.3, 100.0);
        let params = culler.culling_parameters(&camera).expect("parameters");
        let results = culler.cull(&params);
        let mut previous_radius = 0.0;
        for cascade_index in 0..4 {
            let query = DirectionalShadowQuery {
                cascade_index,
                cascade_count: 4,
                split_ratios: Vec3::new(0.1, 0.3, 0.6),
                resolution: 512,
                near_plane: 0.2,
            };
            let matrices = results.directional_shadow_matrices(0, &query).expect("cascade matrices");
            let radius = matrices.split.culling_sphere.w;
            assert!(radius >= previous_radius);
            previous_radius = radius;
        }
    }

    fn shadow_depth(matrices: &ShadowMatrices, point: Vec3, reversed_z: bool) -> f32 {
        let clip = world_to_shadow(matrices.view, matrices.projection, reversed_z) * point.extend(1.0);
        clip.z / clip.w
    }

    #[test]
    fn spot_shadow_depth_spans_near_to_far() {
        let spot = VisibleLight::spot(Vec3::new(1.0, 4.0, 0.0), Quat::IDENTITY, Vec4::ONE, 12.0, 45.0)
            .with_shadows(LightShadows::Hard, 1.0);
        let camera = Camera::new(Vec3::new(0.0, 2.0, 10.0), Vec3::ZERO, 1.0, 0.3, 100.0);
        for reversed_z in [false, true] {
            let mut culler = ScriptedCuller::new(vec![spot.clone()]).with_reversed_z(reversed_z);
            let params = culler.culling_parameters(&camera).expect("parameters");
            let matrices = culler.cull(&params).spot_shadow_matrices(0).expect("spot matrices");
            let origin = spot.position();
            let near = shadow_depth(&matrices, origin + Vec3::Z * spot.shadow_near_plane, reversed_z);
            let mid = shadow_depth(&matrices, origin + Vec3::Z * 6.0, reversed_z);
            let far = shadow_depth(&matrices, origin + Vec3::Z * spot.range, reversed_z);
            assert!(near.abs() < 1e-3, "near plane depth {near} (reversed {reversed_z})");
            assert!((far - 1.0).abs() < 1e-3, "far plane depth {far} (reversed {reversed_z})");
            assert!(near < mid && mid < far);
        }
    }

    #[test]
    fn directional_shadow_depth_spans_near_to_far() {
        let sun = VisibleLight::directional(Quat::from_rotation_x(0.7), Vec4::ONE)
            .with_shadows(LightShadows::Hard, 1.0);
        let direction = sun.forward().normalize();
        let camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 1.0, 0.3, 100.0);
        let query = DirectionalShadowQuery::single(512, 0.2);
        for reversed_z in [false, true] {
            let mut culler = ScriptedCuller::new(vec![sun.clone()]).with_reversed_z(reversed_z);
            let params = culler.culling_parameters(&camera).expect("parameters");
            let matrices = culler.cull(&params).directional_shadow_matrices(0, &query).expect("matrices");
            let sphere = matrices.split.culling_sphere;
            let eye = sphere.truncate() - direction * sphere.w * 2.0;
            let near = shadow_depth(&matrices, eye + direction * 0.2, reversed_z);
            let far = shadow_depth(&matrices, eye + direction * sphere.w * 4.0, reversed_z);
            assert!(near.abs() < 1e-4, "near plane depth {near} (reversed {reversed_z})");
            assert!((far - 1.0).abs() < 1e-4, "far plane depth {far} (reversed {reversed_z})");
        }
    }

    #[test]
    fn failing_cascade_only_affects_that_slice() {
        let sun = VisibleLight::directional(Quat::from_rotation_x(0.7), Vec4::ONE)
            .with_shadows(LightShadows::Hard, 1.0);
        let mut culler = ScriptedCuller::new(vec![sun]).with_failing_cascade(0, 1);
        let camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 1.0, 0.3, 100.0);
        let params = culler.culling_parameters(&camera).expect("parameters");
        let results = culler.cull(&params);
        let query = |cascade_index| DirectionalShadowQuery {
            cascade_index,
            cascade_count: 2,
            split_ratios: Vec3::new(0.25, 0.0, 0.0),
            resolution: 512,
            near_plane: 0.2,
        };
        assert!(results.directional_shadow_matrices(0, &query(0)).is_some());
        assert!(results.directional_shadow_matrices(0, &query(1)).is_none());
        let recorded: Vec<usize> = culler.directional_queries().iter().map(|(_, q)| q.cascade_index).collect();
        assert_eq!(recorded, vec![0, 1]);
    }

    #[test]
    fn recording_target_tracks_atlas_lifetime() {
        let mut target = RecordingTarget::new(false);
        let atlas = target.acquire_shadow_atlas(&ShadowAtlasDesc::shadow_map("Shadow Map", 512));
        assert_eq!(target.live_atlas_count(), 1);
        target.release_shadow_atlas(atlas);
        assert_eq!(target.live_atlas_count(), 0);
        assert_eq!(target.acquired_atlases().len(), 1);
    }

    #[test]
    fn scene_description_parses_minimal_json() {
        let scene: SceneDescription = serde_json::from_str(
            r#"{
                "cameras": [{ "position": [0, 2, 10], "target": [0, 0, 0] }],
                "lights": [
                    { "type": "directional", "rotation_degrees": [50, -30, 0], "shadows": "soft" },
                    { "type": "spot", "position": [0, 4, 0], "rotation_degrees": [90, 0, 0], "casters": false }
                ]
            }"#,
        )
        .expect("parse scene");
        let cameras = scene.cameras();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].clear_flags, ClearFlags::DEPTH | ClearFlags::COLOR);
        let culler = scene.culler(false);
        assert!(culler.without_casters.contains(&1));
        assert_eq!(culler.lights[0].shadows, LightShadows::Soft);
    }
}
