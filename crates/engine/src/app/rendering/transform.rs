use crate::app::{GridPos, Vec2};

/// Vertical alignment between a tile image's top-left anchor and the point
/// the inverse projection treats as the diamond origin, in world pixels.
pub const DEFAULT_PROJECTION_ORIGIN_Y: f32 = 48.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsoProjection {
    tile_width: f32,
    tile_height: f32,
    origin_offset_y: f32,
}

impl IsoProjection {
    pub fn new(tile_width: u32, tile_height: u32) -> Self {
        Self {
            tile_width: tile_width.max(1) as f32,
            tile_height: tile_height.max(1) as f32,
            origin_offset_y: DEFAULT_PROJECTION_ORIGIN_Y,
        }
    }

    pub fn with_origin_offset_y(mut self, origin_offset_y: f32) -> Self {
        if origin_offset_y.is_finite() {
            self.origin_offset_y = origin_offset_y;
        }
        self
    }

    pub fn tile_width(&self) -> f32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> f32 {
        self.tile_height
    }

    pub fn half_tile_width(&self) -> f32 {
        self.tile_width * 0.5
    }

    pub fn half_tile_height(&self) -> f32 {
        self.tile_height * 0.5
    }

    pub fn origin_offset_y(&self) -> f32 {
        self.origin_offset_y
    }

    pub fn tile_world_position(&self, row: u32, col: u32, layer_y_offset: f32) -> Vec2 {
        let row = row as f32;
        let col = col as f32;
        Vec2 {
            x: row * self.half_tile_width() - col * self.half_tile_width(),
            y: col * self.half_tile_height() + row * self.half_tile_height() + layer_y_offset,
        }
    }

    /// Inverse projection. Both axes truncate toward zero (integer-cast
    /// semantics, not floor); boundary cells depend on it.
    pub fn world_to_grid(&self, world: Vec2) -> GridPos {
        let half_w = f64::from(self.tile_width) / 2.0;
        let half_h = f64::from(self.tile_height) / 2.0;
        let down = (f64::from(-world.y) + f64::from(self.origin_offset_y)) / half_h;
        let across = f64::from(world.x) / half_w;
        let col = -(((down + across) / 2.0).trunc() as i32) + 1;
        let row = -(((down - across) / 2.0).trunc() as i32);
        GridPos { col, row }
    }
}

pub fn world_to_screen(world: Vec2, scroll_offset: Vec2) -> Vec2 {
    world + scroll_offset
}

pub fn screen_to_world(screen: Vec2, scroll_offset: Vec2) -> Vec2 {
    screen - scroll_offset
}
