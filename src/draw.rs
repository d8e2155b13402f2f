//! Command surface the host exposes to the forward renderer.

use bitflags::bitflags;
use glam::{Mat4, Vec4};
use smallvec::SmallVec;

use crate::camera::{Camera, ClearFlags};
use crate::culling::{RendererList, ShadowSplitData};
use crate::shader_params::{ParamId, ShaderKeyword};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn x_max(&self) -> f32 {
        self.x + self.width
    }

    pub fn y_max(&self) -> f32 {
        self.y + self.height
    }

    /// Shrinks every edge by `border`.
    pub fn inset(&self, border: f32) -> Rect {
        Rect::new(self.x + border, self.y + border, self.width - border * 2.0, self.height - border * 2.0)
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x && other.y >= self.y && other.x_max() <= self.x_max() && other.y_max() <= self.y_max()
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x_max() && other.x < self.x_max() && self.y < other.y_max() && other.y < self.y_max()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtlasHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Point,
    Bilinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowAtlasDesc {
    pub label: &'static str,
    pub size: u32,
    pub depth_bits: u32,
    pub filter: FilterMode,
}

impl ShadowAtlasDesc {
    pub fn shadow_map(label: &'static str, size: u32) -> Self {
        Self { label, size, depth_bits: 16, filter: FilterMode::Bilinear }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderQueueRange {
    pub min: u32,
    pub max: u32,
}

impl RenderQueueRange {
    pub const ALL: RenderQueueRange = RenderQueueRange { min: 0, max: 5000 };
    pub const OPAQUE: RenderQueueRange = RenderQueueRange { min: 0, max: 2500 };
    pub const TRANSPARENT: RenderQueueRange = RenderQueueRange { min: 2501, max: 5000 };

    pub fn contains(&self, queue: u32) -> bool {
        queue >= self.min && queue <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCriteria {
    Unsorted,
    /// Front to back, grouped by material state.
    CommonOpaque,
    /// Back to front.
    CommonTransparent,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct DrawRendererFlags: u8 {
        const DYNAMIC_BATCHING = 0b01;
        const INSTANCING = 0b10;
    }
}

bitflags! {
    /// Per-object data the host fills in while drawing.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PerObjectData: u8 {
        const LIGHT_INDICES_8 = 0b01;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderPassName(pub &'static str);

#[derive(Debug, Clone, PartialEq)]
pub struct DrawSettings {
    pub passes: SmallVec<[ShaderPassName; 6]>,
    pub sorting: SortCriteria,
    pub flags: DrawRendererFlags,
    pub per_object: PerObjectData,
    pub override_material: Option<MaterialHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    pub queue_range: RenderQueueRange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowDrawSettings {
    pub light_index: usize,
    pub renderers: RendererList,
    pub split: ShadowSplitData,
}

/// Recording surface for one camera. Commands take effect in call order and are flushed by
/// [`DrawTarget::submit`].
pub trait DrawTarget {
    /// Whether clip-space depth runs from 1 at the near plane to 0 at the far plane.
    fn uses_reversed_z(&self) -> bool;

    fn setup_camera_properties(&mut self, camera: &Camera);

    fn clear_render_target(&mut self, flags: ClearFlags, color: Vec4);

    fn begin_sample(&mut self, name: &str);

    fn end_sample(&mut self, name: &str);

    fn acquire_shadow_atlas(&mut self, desc: &ShadowAtlasDesc) -> AtlasHandle;

    fn release_shadow_atlas(&mut self, atlas: AtlasHandle);

    /// Binds the atlas as depth target and clears its depth.
    fn set_shadow_render_target(&mut self, atlas: AtlasHandle);

    fn set_viewport(&mut self, viewport: Rect);

    fn enable_scissor(&mut self, scissor: Rect);

    fn disable_scissor(&mut self);

    fn set_view_projection(&mut self, view: Mat4, projection: Mat4);

    fn set_global_float(&mut self, id: ParamId, value: f32);

    fn set_global_vector(&mut self, id: ParamId, value: Vec4);

    fn set_global_vector_array(&mut self, id: ParamId, values: &[Vec4]);

    fn set_global_matrix_array(&mut self, id: ParamId, values: &[Mat4]);

    fn set_global_texture(&mut self, id: ParamId, atlas: AtlasHandle);

    fn set_keyword(&mut self, keyword: ShaderKeyword, enabled: bool);

    fn create_material(&mut self, shader: &str) -> MaterialHandle;

    fn draw_shadows(&mut self, settings: &ShadowDrawSettings);

    fn draw_renderers(&mut self, renderers: RendererList, draw: &DrawSettings, filter: &FilterSettings);

    fn draw_skybox(&mut self, camera: &Camera);

    fn submit(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inset_rect_stays_inside() {
        let outer = Rect::new(10.0, 20.0, 100.0, 50.0);
        let inner = outer.inset(4.0);
        assert!(outer.contains_rect(&inner));
        assert_eq!(inner, Rect::new(14.0, 24.0, 92.0, 42.0));
    }

    #[test]
    fn adjacent_rects_do_not_overlap() {
        let left = Rect::new(0.0, 0.0, 64.0, 64.0);
        let right = Rect::new(64.0, 0.0, 64.0, 64.0);
        assert!(!left.overlaps(&right));
        assert!(left.overlaps(&Rect::new(32.0, 32.0, 64.0, 64.0)));
    }

    #[test]
    fn queue_ranges_split_opaque_and_transparent() {
        assert!(RenderQueueRange::OPAQUE.contains(2000));
        assert!(!RenderQueueRange::OPAQUE.contains(3000));
        assert!(RenderQueueRange::TRANSPARENT.contains(3000));
        assert!(RenderQueueRange::ALL.contains(3000));
    }
}
