use std::sync::OnceLock;

/// Handle to a global shader parameter, resolved once per process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(u32);

impl ParamId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Shader feature toggles driven by the shadow renderers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderKeyword {
    ShadowsHard,
    ShadowsSoft,
    CascadedShadowsHard,
    CascadedShadowsSoft,
}

impl ShaderKeyword {
    pub const ALL: [ShaderKeyword; 4] = [
        ShaderKeyword::ShadowsHard,
        ShaderKeyword::ShadowsSoft,
        ShaderKeyword::CascadedShadowsHard,
        ShaderKeyword::CascadedShadowsSoft,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ShaderKeyword::ShadowsHard => "_SHADOWS_HARD",
            ShaderKeyword::ShadowsSoft => "_SHADOWS_SOFT",
            ShaderKeyword::CascadedShadowsHard => "_CASCADED_SHADOWS_HARD",
            ShaderKeyword::CascadedShadowsSoft => "_CASCADED_SHADOWS_SOFT",
        }
    }
}

#[derive(Default)]
struct ParamRegistry {
    names: Vec<&'static str>,
}

impl ParamRegistry {
    fn resolve(&mut self, name: &'static str) -> ParamId {
        if let Some(pos) = self.names.iter().position(|existing| *existing == name) {
            return ParamId(pos as u32);
        }
        self.names.push(name);
        ParamId((self.names.len() - 1) as u32)
    }
}

/// Every global parameter the forward pipeline binds.
#[derive(Debug)]
pub struct ShaderParams {
    pub visible_light_colors: ParamId,
    pub visible_light_directions_or_positions: ParamId,
    pub visible_light_attenuations: ParamId,
    pub visible_light_spot_directions: ParamId,
    pub light_indices_offset_and_count: ParamId,
    pub shadow_map: ParamId,
    pub shadow_bias: ParamId,
    pub shadow_data: ParamId,
    pub shadow_map_size: ParamId,
    pub world_to_shadow_matrices: ParamId,
    pub global_shadow_data: ParamId,
    pub cascaded_shadow_map: ParamId,
    pub cascaded_shadow_map_size: ParamId,
    pub cascaded_shadow_strength: ParamId,
    pub world_to_shadow_cascade_matrices: ParamId,
    pub cascade_culling_spheres: ParamId,
    names: Vec<&'static str>,
}

static SHADER_PARAMS: OnceLock<ShaderParams> = OnceLock::new();

impl ShaderParams {
    /// Process-wide registry; names are resolved on first access only.
    pub fn global() -> &'static ShaderParams {
        SHADER_PARAMS.get_or_init(ShaderParams::resolve)
    }

    fn resolve() -> Self {
        let mut registry = ParamRegistry::default();
        let visible_light_colors = registry.resolve("_VisibleLightColors");
        let visible_light_directions_or_positions = registry.resolve("_VisibleLightDirectionsOrPositions");
        let visible_light_attenuations = registry.resolve("_VisibleLightAttenuations");
        let visible_light_spot_directions = registry.resolve("_VisibleLightSpotDirections");
        let light_indices_offset_and_count = registry.resolve("_LightIndicesOffsetAndCount");
        let shadow_map = registry.resolve("_ShadowMap");
        let shadow_bias = registry.resolve("_ShadowBias");
        let shadow_data = registry.resolve("_ShadowData");
        let shadow_map_size = registry.resolve("_ShadowMapSize");
        let world_to_shadow_matrices = registry.resolve("_WorldToShadowMatrices");
        let global_shadow_data = registry.resolve("_GlobalShadowData");
        let cascaded_shadow_map = registry.resolve("_CascadedShadowMap");
        let cascaded_shadow_map_size = registry.resolve("_CascadedShadowMapSize");
        let cascaded_shadow_strength = registry.resolve("_CascadedShadowStrength");
        let world_to_shadow_cascade_matrices = registry.resolve("_WorldToShadowCascadeMatrices");
        let cascade_culling_spheres = registry.resolve("_CascadeCullingSpheres");
        Self {
            visible_light_colors,
            visible_light_directions_or_positions,
            visible_light_attenuations,
            visible_light_spot_directions,
            light_indices_offset_and_count,
            shadow_map,
            shadow_bias,
            shadow_data,
            shadow_map_size,
            world_to_shadow_matrices,
            global_shadow_data,
            cascaded_shadow_map,
            cascaded_shadow_map_size,
            cascaded_shadow_strength,
            world_to_shadow_cascade_matrices,
            cascade_culling_spheres,
            names: registry.names,
        }
    }

    pub fn name(&self, id: ParamId) -> &'static str {
        self.names.get(id.index()).copied().unwrap_or("<unknown>")
    }

    pub fn lookup(&self, name: &str) -> Option<ParamId> {
        self.names.iter().position(|existing| *existing == name).map(|pos| ParamId(pos as u32))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_registry_is_resolved_once() {
        let first = ShaderParams::global();
        let second = ShaderParams::global();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.shadow_data, second.shadow_data);
    }

    #[test]
    fn names_round_trip_through_lookup() {
        let params = ShaderParams::global();
        assert_eq!(params.name(params.world_to_shadow_matrices), "_WorldToShadowMatrices");
        assert_eq!(params.lookup("_CascadeCullingSpheres"), Some(params.cascade_culling_spheres));
        assert_eq!(params.lookup("_Missing"), None);
        assert_eq!(params.len(), 16);
    }

    #[test]
    fn registry_deduplicates_names() {
        let mut registry = ParamRegistry::default();
        let a = registry.resolve("_ShadowMap");
        let b = registry.resolve("_ShadowBias");
        assert_ne!(a, b);
        assert_eq!(registry.resolve("_ShadowMap"), a);
        assert_eq!(registry.names.len(), 2);
    }
}
