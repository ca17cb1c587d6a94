use std::cmp::Ordering;

use crate::app::{TileKey, Vec2};
use crate::content::ImageId;

pub trait DrawSurface {
    type Error;

    fn begin_frame(&mut self);
    fn draw_background(&mut self);
    fn draw_sprite(&mut self, image: ImageId, screen_position: Vec2);
    fn present(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawableKind {
    Tile(TileKey),
    Actor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drawable {
    pub kind: DrawableKind,
    pub image: ImageId,
    pub position: Vec2,
    pub sort_key: f32,
    pub load_order: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RenderList {
    entries: Vec<Drawable>,
    offset: Vec2,
    generation: u64,
    next_load_order: u32,
}

impl RenderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_rebuild(&mut self) {
        self.entries.clear();
        self.next_load_order = 0;
        self.generation += 1;
    }

    pub fn push(
        &mut self,
        kind: DrawableKind,
        image: ImageId,
        position: Vec2,
        sort_key: f32,
    ) -> u32 {
        let load_order = self.next_load_order;
        self.next_load_order += 1;
        self.entries.push(Drawable {
            kind,
            image,
            position,
            sort_key,
            load_order,
        });
        load_order
    }

    pub fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| a.sort_key.total_cmp(&b.sort_key));
    }

    /// Lands after entries with an equal key. O(n) in the list length.
    pub fn reinsert_actor(&mut self, image: ImageId, position: Vec2, sort_key: f32) -> bool {
        let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry.kind == DrawableKind::Actor)
        else {
            return false;
        };
        let mut actor = self.entries.remove(index);
        actor.image = image;
        actor.position = position;
        actor.sort_key = sort_key;
        let slot = self
            .entries
            .partition_point(|entry| entry.sort_key.total_cmp(&sort_key) != Ordering::Greater);
        self.entries.insert(slot, actor);
        true
    }

    pub fn set_offset(&mut self, offset: Vec2) {
        self.offset = offset;
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Drawable> {
        self.entries.iter()
    }

    pub fn is_sorted(&self) -> bool {
        self.entries
            .windows(2)
            .all(|pair| pair[0].sort_key.total_cmp(&pair[1].sort_key) != Ordering::Greater)
    }

    pub fn render<S: DrawSurface>(&self, surface: &mut S) {
        for entry in &self.entries {
            surface.draw_sprite(entry.image, entry.position + self.offset);
        }
    }
}
