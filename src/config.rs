use anyhow::{bail, Context, Result};
use glam::Vec3;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::draw::DrawRendererFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(try_from = "u32")]
pub enum ShadowMapSize {
    S256,
    S512,
    #[default]
    S1024,
    S2048,
    S4096,
}

impl ShadowMapSize {
    pub const fn pixels(self) -> u32 {
        match self {
            ShadowMapSize::S256 => 256,
            ShadowMapSize::S512 => 512,
            ShadowMapSize::S1024 => 1024,
            ShadowMapSize::S2048 => 2048,
            ShadowMapSize::S4096 => 4096,
        }
    }

    /// `(1/size, 1/size, size, size)` as bound for shadow filtering.
    pub fn texel_size_vector(self) -> glam::Vec4 {
        let size = self.pixels() as f32;
        let inv = 1.0 / size;
        glam::Vec4::new(inv, inv, size, size)
    }
}

impl TryFrom<u32> for ShadowMapSize {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            256 => Ok(ShadowMapSize::S256),
            512 => Ok(ShadowMapSize::S512),
            1024 => Ok(ShadowMapSize::S1024),
            2048 => Ok(ShadowMapSize::S2048),
            4096 => Ok(ShadowMapSize::S4096),
            other => Err(format!("unsupported shadow map size {other}; use 256, 512, 1024, 2048 or 4096")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(try_from = "u32")]
pub enum ShadowCascades {
    Zero,
    Two,
    #[default]
    Four,
}

impl ShadowCascades {
    pub const fn count(self) -> usize {
        match self {
            ShadowCascades::Zero => 0,
            ShadowCascades::Two => 2,
            ShadowCascades::Four => 4,
        }
    }
}

impl TryFrom<u32> for ShadowCascades {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ShadowCascades::Zero),
            2 => Ok(ShadowCascades::Two),
            4 => Ok(ShadowCascades::Four),
            other => Err(format!("unsupported cascade count {other}; use 0, 2 or 4")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DebugConfig {
    /// Draws geometry whose shaders have no supported pass with the error material.
    #[serde(default)]
    pub draw_unsupported_shaders: bool,
    #[serde(default = "DebugConfig::default_emit_scene_view_geometry")]
    pub emit_scene_view_geometry: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub dynamic_batching: bool,
    #[serde(default)]
    pub instancing: bool,
    #[serde(default)]
    pub shadow_map_size: ShadowMapSize,
    #[serde(default = "PipelineConfig::default_shadow_distance")]
    pub shadow_distance: f32,
    #[serde(default)]
    pub shadow_cascades: ShadowCascades,
    #[serde(default = "PipelineConfig::default_cascade_split_two")]
    pub cascade_split_two: f32,
    #[serde(default = "PipelineConfig::default_cascade_split_four")]
    pub cascade_split_four: [f32; 3],
    #[serde(default)]
    pub debug: DebugConfig,
}

impl DebugConfig {
    const fn default_emit_scene_view_geometry() -> bool {
        true
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            draw_unsupported_shaders: false,
            emit_scene_view_geometry: Self::default_emit_scene_view_geometry(),
        }
    }
}

impl PipelineConfig {
    const fn default_shadow_distance() -> f32 {
        100.0
    }

    const fn default_cascade_split_two() -> f32 {
        0.25
    }

    const fn default_cascade_split_four() -> [f32; 3] {
        [0.067, 0.2, 0.467]
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dynamic_batching: false,
            instancing: false,
            shadow_map_size: ShadowMapSize::default(),
            shadow_distance: Self::default_shadow_distance(),
            shadow_cascades: ShadowCascades::default(),
            cascade_split_two: Self::default_cascade_split_two(),
            cascade_split_four: Self::default_cascade_split_four(),
            debug: DebugConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read pipeline config {}", path.display()))?;
        let cfg: PipelineConfig = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse pipeline config {}", path.display()))?;
        cfg.validate().with_context(|| format!("Invalid pipeline config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!(target: "config", "Pipeline config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.shadow_distance.is_finite() || self.shadow_distance <= 0.0 {
            bail!("shadow_distance must be a positive finite value, got {}", self.shadow_distance);
        }
        if !(self.cascade_split_two > 0.0 && self.cascade_split_two < 1.0) {
            bail!("cascade_split_two must lie in (0, 1), got {}", self.cascade_split_two);
        }
        let [a, b, c] = self.cascade_split_four;
        if !(0.0 < a && a < b && b < c && c < 1.0) {
            bail!("cascade_split_four must be increasing within (0, 1), got {:?}", self.cascade_split_four);
        }
        Ok(())
    }

    pub fn draw_flags(&self) -> DrawRendererFlags {
        let mut flags = DrawRendererFlags::empty();
        if self.dynamic_batching {
            flags |= DrawRendererFlags::DYNAMIC_BATCHING;
        }
        if self.instancing {
            flags |= DrawRendererFlags::INSTANCING;
        }
        flags
    }

    /// Cumulative split fractions passed to the directional shadow query.
    pub fn cascade_split_ratios(&self) -> Vec3 {
        match self.shadow_cascades {
            ShadowCascades::Zero => Vec3::ZERO,
            ShadowCascades::Two => Vec3::new(self.cascade_split_two, 0.0, 0.0),
            ShadowCascades::Four => Vec3::from_array(self.cascade_split_four),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = PipelineConfig::default();
        cfg.validate().expect("default config validates");
        assert_eq!(cfg.shadow_map_size.pixels(), 1024);
        assert_eq!(cfg.shadow_cascades.count(), 4);
        assert!(cfg.draw_flags().is_empty());
    }

    #[test]
    fn parses_partial_json_with_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{ "instancing": true, "shadow_map_size": 2048, "shadow_cascades": 2 }"#)
                .expect("parse config");
        assert_eq!(cfg.shadow_map_size, ShadowMapSize::S2048);
        assert_eq!(cfg.shadow_cascades, ShadowCascades::Two);
        assert_eq!(cfg.draw_flags(), DrawRendererFlags::INSTANCING);
        assert_eq!(cfg.cascade_split_ratios(), Vec3::new(0.25, 0.0, 0.0));
        assert!(cfg.debug.emit_scene_view_geometry);
        assert!(!cfg.debug.draw_unsupported_shaders);
    }

    #[test]
    fn rejects_unsupported_sizes_and_cascades() {
        assert!(serde_json::from_str::<PipelineConfig>(r#"{ "shadow_map_size": 1000 }"#).is_err());
        assert!(serde_json::from_str::<PipelineConfig>(r#"{ "shadow_cascades": 3 }"#).is_err());
    }

    #[test]
    fn validate_rejects_unordered_splits() {
        let cfg = PipelineConfig { cascade_split_four: [0.3, 0.2, 0.5], ..PipelineConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = PipelineConfig { shadow_distance: 0.0, ..PipelineConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn texel_size_vector_inverts_resolution() {
        let v = ShadowMapSize::S512.texel_size_vector();
        assert!((v.x - 1.0 / 512.0).abs() < f32::EPSILON);
        assert_eq!(v.w, 512.0);
    }
}
