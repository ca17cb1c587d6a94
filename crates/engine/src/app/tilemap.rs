use tracing::info;

use crate::app::{GridPos, IsoProjection, Vec2};
use crate::content::{ImageId, ImageRegistry, MapSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub row: u32,
    pub col: u32,
    pub layer: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSprite {
    pub normal: ImageId,
    pub outline: ImageId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub grid: GridPos,
    pub world_position: Vec2,
    pub layer: usize,
    pub sort_key: f32,
    pub sprite: TileSprite,
    pub selected: bool,
}

impl Tile {
    pub fn key(&self) -> TileKey {
        TileKey {
            row: self.grid.row as u32,
            col: self.grid.col as u32,
            layer: self.layer,
        }
    }

    pub fn active_image(&self) -> ImageId {
        if self.selected {
            self.sprite.outline
        } else {
            self.sprite.normal
        }
    }
}

/// Paint-order constants. Layers below `ground_layers` sort by their anchor
/// plus `ground_bias`; higher layers sort by the un-offset anchor plus
/// `object_center`, nudged by `layer_epsilon` per layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortKeyRules {
    pub ground_layers: usize,
    pub ground_bias: f32,
    pub object_center: f32,
    pub layer_epsilon: f32,
}

impl Default for SortKeyRules {
    fn default() -> Self {
        Self {
            ground_layers: 2,
            ground_bias: 32.0,
            object_center: 48.0,
            layer_epsilon: 0.01,
        }
    }
}

impl SortKeyRules {
    pub fn tile_sort_key(&self, world_y: f32, layer: usize, layer_y_offset: f32) -> f32 {
        if layer < self.ground_layers {
            return world_y + self.ground_bias;
        }
        world_y + self.object_center - layer_y_offset + (layer as f32 - 1.0) * self.layer_epsilon
    }
}

#[derive(Debug, Clone, Default)]
pub struct TileStore {
    rows: u32,
    cols: u32,
    layers: usize,
    cells: Vec<Option<Tile>>,
    occupied: usize,
}

impl TileStore {
    pub fn build(
        source: &dyn MapSource,
        projection: &IsoProjection,
        rules: &SortKeyRules,
        images: &mut ImageRegistry,
    ) -> Self {
        let rows = source.rows();
        let cols = source.cols();
        let layers = source.layer_count();
        let mut cells = vec![None; rows as usize * cols as usize * layers];
        let mut occupied = 0usize;

        for row in 0..rows {
            for col in 0..cols {
                for layer in 0..layers {
                    let Some(normal) = source.tile_image(row, col, layer) else {
                        continue;
                    };
                    let layer_y_offset = source.layer_y_offset(layer);
                    let world_position = projection.tile_world_position(row, col, layer_y_offset);
                    let outline = images.outline_variant(normal).unwrap_or(normal);
                    let index = slot_index(cols, layers, row, col, layer);
                    cells[index] = Some(Tile {
                        grid: GridPos {
                            col: col as i32,
                            row: row as i32,
                        },
                        world_position,
                        layer,
                        sort_key: rules.tile_sort_key(world_position.y, layer, layer_y_offset),
                        sprite: TileSprite { normal, outline },
                        selected: false,
                    });
                    occupied += 1;
                }
            }
        }

        info!(rows, cols, layers, tiles = occupied, "tile_store_built");
        Self {
            rows,
            cols,
            layers,
            cells,
            occupied,
        }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn layers(&self) -> usize {
        self.layers
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied
    }

    pub fn tile(&self, key: TileKey) -> Option<&Tile> {
        let index = self.index_of(key)?;
        self.cells[index].as_ref()
    }

    pub fn tile_at(&self, row: i32, col: i32, layer: usize) -> Option<&Tile> {
        let key = self.key_at(row, col, layer)?;
        self.tile(key)
    }

    pub fn topmost_at(&self, row: i32, col: i32) -> Option<&Tile> {
        (0..self.layers)
            .rev()
            .find_map(|layer| self.tile_at(row, col, layer))
    }

    pub fn set_selected(&mut self, key: TileKey, selected: bool) -> bool {
        let Some(index) = self.index_of(key) else {
            return false;
        };
        match self.cells[index].as_mut() {
            Some(tile) => {
                tile.selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.cells.iter().flatten()
    }

    fn key_at(&self, row: i32, col: i32, layer: usize) -> Option<TileKey> {
        let row = u32::try_from(row).ok()?;
        let col = u32::try_from(col).ok()?;
        let key = TileKey { row, col, layer };
        self.index_of(key).map(|_| key)
    }

    fn index_of(&self, key: TileKey) -> Option<usize> {
        if key.row >= self.rows || key.col >= self.cols || key.layer >= self.layers {
            return None;
        }
        Some(slot_index(self.cols, self.layers, key.row, key.col, key.layer))
    }
}

fn slot_index(cols: u32, layers: usize, row: u32, col: u32, layer: usize) -> usize {
    (row as usize * cols as usize + col as usize) * layers + layer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{GridMap, ImageSource, OUTLINE_TINT};

    fn build(map: &GridMap) -> (TileStore, ImageRegistry) {
        let mut images = map.images().clone();
        let store = TileStore::build(
            map,
            &IsoProjection::new(64, 32),
            &SortKeyRules::default(),
            &mut images,
        );
        (store, images)
    }

    #[test]
    fn single_ground_tile_at_origin() {
        let mut map = GridMap::new(64, 32, 1, 1);
        let grass = map.register_image(ImageSource::file("grass.png"));
        let ground = map.add_layer(0.0);
        map.set_tile(0, 0, ground, grass);

        let (store, _) = build(&map);
        let tile = store.tile_at(0, 0, 0).expect("tile");
        assert_eq!(tile.world_position, Vec2 { x: 0.0, y: 0.0 });
        assert_eq!(tile.sort_key, 32.0);
        assert_eq!(tile.grid, GridPos { col: 0, row: 0 });
        assert_eq!(store.occupied_count(), 1);
    }

    #[test]
    fn world_positions_follow_staggered_layout_and_layer_offset() {
        let mut map = GridMap::new(64, 32, 4, 4);
        let wall = map.register_image(ImageSource::file("wall.png"));
        map.add_layer(0.0);
        map.add_layer(0.0);
        let walls = map.add_layer(-32.0);
        map.set_tile(3, 1, walls, wall);

        let (store, _) = build(&map);
        let tile = store.tile_at(3, 1, walls).expect("wall");
        assert_eq!(tile.world_position, Vec2 { x: 64.0, y: 32.0 });
        // 32 + 48 + 32 + 0.01
        assert!((tile.sort_key - 112.01).abs() < 1e-4);
    }

    #[test]
    fn ground_sorts_under_objects_at_or_below_it() {
        let mut map = GridMap::new(64, 32, 3, 3);
        let grass = map.register_image(ImageSource::file("grass.png"));
        let tree = map.register_image(ImageSource::file("tree.png"));
        let ground = map.add_layer(0.0);
        map.add_layer(0.0);
        let objects = map.add_layer(-32.0);
        map.fill_layer(ground, grass);
        map.set_tile(1, 1, objects, tree);
        map.set_tile(2, 1, objects, tree);

        let (store, _) = build(&map);
        let ground_tile = store.tile_at(1, 1, ground).expect("ground");
        for (row, col) in [(1, 1), (2, 1)] {
            let object = store.tile_at(row, col, objects).expect("object");
            assert!(ground_tile.sort_key < object.sort_key);
        }
    }

    #[test]
    fn each_tile_gets_a_tinted_outline_variant() {
        let mut map = GridMap::new(64, 32, 2, 2);
        let grass = map.register_image(ImageSource::file("grass.png"));
        let ground = map.add_layer(0.0);
        map.fill_layer(ground, grass);

        let (store, images) = build(&map);
        let tile = store.tile_at(1, 0, ground).expect("tile");
        assert_eq!(tile.sprite.normal, grass);
        assert_ne!(tile.sprite.outline, grass);
        assert_eq!(
            images.get(tile.sprite.outline).expect("outline").tint,
            Some(OUTLINE_TINT)
        );
        // Shared image, shared outline.
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn signed_lookups_outside_store_are_none() {
        let mut map = GridMap::new(64, 32, 2, 2);
        let grass = map.register_image(ImageSource::file("grass.png"));
        let ground = map.add_layer(0.0);
        map.fill_layer(ground, grass);

        let (store, _) = build(&map);
        assert!(store.tile_at(-1, 0, 0).is_none());
        assert!(store.tile_at(0, -1, 0).is_none());
        assert!(store.tile_at(2, 0, 0).is_none());
        assert!(store.tile_at(0, 0, 1).is_none());
        assert!(store.topmost_at(i32::MIN, i32::MAX).is_none());
    }

    #[test]
    fn empty_slots_are_not_tiles() {
        let mut map = GridMap::new(64, 32, 3, 3);
        let grass = map.register_image(ImageSource::file("grass.png"));
        let ground = map.add_layer(0.0);
        map.set_tile(0, 2, ground, grass);

        let (store, _) = build(&map);
        assert_eq!(store.occupied_count(), 1);
        assert_eq!(store.iter().count(), 1);
        assert!(store.tile_at(1, 1, ground).is_none());
    }

    #[test]
    fn topmost_prefers_highest_layer() {
        let mut map = GridMap::new(64, 32, 2, 2);
        let grass = map.register_image(ImageSource::file("grass.png"));
        let tree = map.register_image(ImageSource::file("tree.png"));
        let ground = map.add_layer(0.0);
        map.add_layer(0.0);
        let objects = map.add_layer(-32.0);
        map.fill_layer(ground, grass);
        map.set_tile(0, 1, objects, tree);

        let (store, _) = build(&map);
        assert_eq!(store.topmost_at(0, 1).expect("tree").layer, objects);
        assert_eq!(store.topmost_at(1, 1).expect("grass").layer, ground);
    }

    #[test]
    fn selection_swaps_active_image_only() {
        let mut map = GridMap::new(64, 32, 1, 1);
        let grass = map.register_image(ImageSource::file("grass.png"));
        let ground = map.add_layer(0.0);
        map.set_tile(0, 0, ground, grass);

        let (mut store, _) = build(&map);
        let key = TileKey {
            row: 0,
            col: 0,
            layer: ground,
        };
        let before = store.tile(key).expect("tile").clone();
        assert!(store.set_selected(key, true));
        let after = store.tile(key).expect("tile");
        assert_eq!(after.active_image(), before.sprite.outline);
        assert_eq!(after.world_position, before.world_position);
        assert_eq!(after.sort_key, before.sort_key);
        assert_eq!(after.key(), key);

        assert!(store.set_selected(key, false));
        assert_eq!(store.tile(key).expect("tile").active_image(), grass);
        assert!(!store.set_selected(
            TileKey {
                row: 0,
                col: 0,
                layer: 4
            },
            true
        ));
    }
}
