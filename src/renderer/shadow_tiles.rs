use glam::{Mat4, Vec2, Vec4};

use crate::draw::Rect;

/// Margin kept free around every tile so bilinear filtering never samples a neighbour.
pub const SHADOW_TILE_BORDER: f32 = 4.0;
pub const MAX_SHADOW_SPLIT: u32 = 4;

/// Atlas grid dimension for a number of shadow tiles.
pub fn shadow_split(tile_count: i32) -> u32 {
    if tile_count <= 1 {
        1
    } else if tile_count <= 4 {
        2
    } else if tile_count <= 9 {
        3
    } else {
        4
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowTile {
    pub index: usize,
    /// Grid coordinates, column then row.
    pub offset: Vec2,
    pub viewport: Rect,
    pub scissor: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowTileLayout {
    pub atlas_size: u32,
    pub split: u32,
    pub tile_size: f32,
    pub tile_scale: f32,
}

impl ShadowTileLayout {
    pub fn new(atlas_size: u32, tile_count: i32) -> Self {
        Self::fixed(atlas_size, shadow_split(tile_count))
    }

    pub fn fixed(atlas_size: u32, split: u32) -> Self {
        let split = split.clamp(1, MAX_SHADOW_SPLIT);
        Self {
            atlas_size,
            split,
            tile_size: (atlas_size / split) as f32,
            tile_scale: 1.0 / split as f32,
        }
    }

    pub fn capacity(&self) -> usize {
        (self.split * self.split) as usize
    }

    pub fn is_tiled(&self) -> bool {
        self.split > 1
    }

    pub fn tile_resolution(&self) -> u32 {
        self.tile_size as u32
    }

    /// Row-major placement of tile `index`.
    pub fn tile(&self, index: usize) -> ShadowTile {
        let split = self.split as usize;
        let offset = Vec2::new((index % split) as f32, (index / split) as f32);
        let viewport = Rect::new(offset.x * self.tile_size, offset.y * self.tile_size, self.tile_size, self.tile_size);
        ShadowTile { index, offset, viewport, scissor: viewport.inset(SHADOW_TILE_BORDER) }
    }

    pub fn tiles(&self) -> impl Iterator<Item = ShadowTile> + '_ {
        (0..self.capacity()).map(move |index| self.tile(index))
    }

    /// Maps the unit square of a full shadow map onto the tile at `offset`.
    pub fn tile_matrix(&self, offset: Vec2) -> Mat4 {
        let scale = self.tile_scale;
        Mat4::from_cols(
            Vec4::new(scale, 0.0, 0.0, 0.0),
            Vec4::new(0.0, scale, 0.0, 0.0),
            Vec4::Z,
            Vec4::new(offset.x * scale, offset.y * scale, 0.0, 1.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn split_follows_thresholds() {
        let expected = [(0, 1), (1, 1), (2, 2), (4, 2), (5, 3), (9, 3), (10, 4), (16, 4), (40, 4)];
        for (count, split) in expected {
            assert_eq!(shadow_split(count), split, "tile count {count}");
        }
        assert_eq!(shadow_split(-1), 1);
    }

    #[test]
    fn split_is_monotonic_and_holds_every_tile() {
        let mut previous = 0;
        for count in 1..=16 {
            let split = shadow_split(count);
            assert!(split >= previous);
            assert!((split * split) as i32 >= count);
            assert!((1..=4).contains(&split));
            previous = split;
        }
    }

    #[test]
    fn scissor_is_inset_on_all_sides() {
        for count in [1, 3, 7, 16] {
            let layout = ShadowTileLayout::new(1024, count);
            for tile in layout.tiles() {
                let v = tile.viewport;
                let s = tile.scissor;
                assert_eq!(s.x - v.x, SHADOW_TILE_BORDER);
                assert_eq!(s.y - v.y, SHADOW_TILE_BORDER);
                assert_eq!(v.x_max() - s.x_max(), SHADOW_TILE_BORDER);
                assert_eq!(v.y_max() - s.y_max(), SHADOW_TILE_BORDER);
                assert!(v.contains_rect(&s));
            }
        }
    }

    #[test]
    fn tiles_partition_the_atlas_without_overlap() {
        let atlas = Rect::new(0.0, 0.0, 2048.0, 2048.0);
        for split in 1..=4 {
            let layout = ShadowTileLayout::fixed(2048, split);
            let tiles: Vec<ShadowTile> = layout.tiles().collect();
            assert_eq!(tiles.len(), (split * split) as usize);
            for (i, a) in tiles.iter().enumerate() {
                assert!(atlas.contains_rect(&a.viewport));
                for b in tiles.iter().skip(i + 1) {
                    assert!(!a.viewport.overlaps(&b.viewport), "tiles {} and {} overlap", a.index, b.index);
                }
            }
        }
    }

    #[test]
    fn offsets_are_row_major() {
        let layout = ShadowTileLayout::new(900, 5);
        assert_eq!(layout.split, 3);
        assert_eq!(layout.tile_size, 300.0);
        assert_eq!(layout.tile(0).offset, Vec2::new(0.0, 0.0));
        assert_eq!(layout.tile(2).offset, Vec2::new(2.0, 0.0));
        assert_eq!(layout.tile(4).offset, Vec2::new(1.0, 1.0));
        assert_eq!(layout.tile(4).viewport, Rect::new(300.0, 300.0, 300.0, 300.0));
    }

    #[test]
    fn tile_matrix_places_unit_square_in_tile() {
        let layout = ShadowTileLayout::fixed(1024, 2);
        let m = layout.tile_matrix(Vec2::new(1.0, 1.0));
        let corner = m.transform_point3(Vec3::new(0.0, 0.0, 0.25));
        let far_corner = m.transform_point3(Vec3::new(1.0, 1.0, 0.75));
        assert!((corner - Vec3::new(0.5, 0.5, 0.25)).length() < 1e-6);
        assert!((far_corner - Vec3::new(1.0, 1.0, 0.75)).length() < 1e-6);
        assert_eq!(ShadowTileLayout::fixed(1024, 1).tile_matrix(Vec2::ZERO), Mat4::IDENTITY);
    }
}
