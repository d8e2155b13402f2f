use glam::{Mat4, Vec4};

/// Clip space [-1, 1] to texture space [0, 1] on every axis.
pub const CLIP_TO_TEXTURE: Mat4 = Mat4::from_cols(
    Vec4::new(0.5, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 0.5, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 0.5, 0.0),
    Vec4::new(0.5, 0.5, 0.5, 1.0),
);

/// Negates the depth row so that reversed-Z projections sample like conventional ones.
pub fn flip_projection_depth(projection: Mat4) -> Mat4 {
    let mut flipped = projection;
    flipped.x_axis.z = -flipped.x_axis.z;
    flipped.y_axis.z = -flipped.y_axis.z;
    flipped.z_axis.z = -flipped.z_axis.z;
    flipped.w_axis.z = -flipped.w_axis.z;
    flipped
}

pub fn world_to_shadow(view: Mat4, projection: Mat4, reversed_z: bool) -> Mat4 {
    let projection = if reversed_z { flip_projection_depth(projection) } else { projection };
    CLIP_TO_TEXTURE * projection * view
}

/// Matrix bound after the last cascade. Under reversed Z it keeps `w = 1` so fragments past
/// the final cascade land at depth 0 and read as unshadowed.
pub fn cascade_sentinel(reversed_z: bool) -> Mat4 {
    let mut sentinel = Mat4::ZERO;
    if reversed_z {
        sentinel.w_axis.w = 1.0;
    }
    sentinel
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn sample_inputs() -> (Mat4, Mat4) {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 5.0, 5.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh_gl(0.8, 1.0, 0.2, 20.0);
        (view, projection)
    }

    #[test]
    fn clip_corners_map_to_unit_cube() {
        let low = CLIP_TO_TEXTURE.transform_point3(Vec3::splat(-1.0));
        let high = CLIP_TO_TEXTURE.transform_point3(Vec3::splat(1.0));
        assert!((low - Vec3::ZERO).length() < 1e-6);
        assert!((high - Vec3::ONE).length() < 1e-6);
    }

    #[test]
    fn depth_flip_negates_only_the_third_row() {
        let (_, projection) = sample_inputs();
        let flipped = flip_projection_depth(projection);
        assert_eq!(flipped.row(0), projection.row(0));
        assert_eq!(flipped.row(1), projection.row(1));
        assert_eq!(flipped.row(2), -projection.row(2));
        assert_eq!(flipped.row(3), projection.row(3));
        assert_eq!(flip_projection_depth(flipped), projection);
    }

    #[test]
    fn world_to_shadow_is_a_pure_function() {
        let (view, projection) = sample_inputs();
        for reversed in [false, true] {
            let a = world_to_shadow(view, projection, reversed);
            let b = world_to_shadow(view, projection, reversed);
            assert_eq!(a, b);
        }
        assert_ne!(world_to_shadow(view, projection, false), world_to_shadow(view, projection, true));
    }

    #[test]
    fn light_target_projects_to_texture_centre() {
        let (view, projection) = sample_inputs();
        let m = world_to_shadow(view, projection, false);
        let clip = m * Vec3::ZERO.extend(1.0);
        let uv = clip.truncate() / clip.w;
        assert!((uv.x - 0.5).abs() < 1e-5);
        assert!((uv.y - 0.5).abs() < 1e-5);
        assert!(uv.z > 0.0 && uv.z < 1.0);
    }

    #[test]
    fn sentinel_only_keeps_w_under_reversed_z() {
        assert_eq!(cascade_sentinel(false), Mat4::ZERO);
        let sentinel = cascade_sentinel(true);
        assert_eq!(sentinel * Vec4::new(3.0, 4.0, 5.0, 1.0), Vec4::new(0.0, 0.0, 0.0, 1.0));
    }
}
