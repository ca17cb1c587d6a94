use std::collections::HashMap;
use std::path::PathBuf;

pub const OUTLINE_TINT: [u8; 4] = [255, 236, 120, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageSource {
    pub path: PathBuf,
    pub region: Option<PixelRect>,
    pub tint: Option<[u8; 4]>,
}

impl ImageSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            region: None,
            tint: None,
        }
    }

    pub fn region(path: impl Into<PathBuf>, region: PixelRect) -> Self {
        Self {
            path: path.into(),
            region: Some(region),
            tint: None,
        }
    }

    pub fn with_tint(mut self, tint: [u8; 4]) -> Self {
        self.tint = Some(tint);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageRegistry {
    sources: Vec<ImageSource>,
    by_source: HashMap<ImageSource, ImageId>,
}

impl ImageRegistry {
    pub fn register(&mut self, source: ImageSource) -> ImageId {
        if let Some(existing) = self.by_source.get(&source) {
            return *existing;
        }
        let id = ImageId(self.sources.len() as u32);
        self.by_source.insert(source.clone(), id);
        self.sources.push(source);
        id
    }

    pub fn get(&self, id: ImageId) -> Option<&ImageSource> {
        self.sources.get(id.0 as usize)
    }

    pub fn outline_variant(&mut self, id: ImageId) -> Option<ImageId> {
        let source = self.get(id)?.clone().with_tint(OUTLINE_TINT);
        Some(self.register(source))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ImageId, &ImageSource)> {
        self.sources
            .iter()
            .enumerate()
            .map(|(index, source)| (ImageId(index as u32), source))
    }
}

pub trait MapSource {
    fn tile_width(&self) -> u32;
    fn tile_height(&self) -> u32;
    fn rows(&self) -> u32;
    fn cols(&self) -> u32;
    fn layer_count(&self) -> usize;
    fn layer_y_offset(&self, layer: usize) -> f32;
    fn tile_image(&self, row: u32, col: u32, layer: usize) -> Option<ImageId>;
    fn images(&self) -> &ImageRegistry;
}

#[derive(Debug, Clone)]
struct GridLayer {
    y_offset: f32,
    cells: Vec<Option<ImageId>>,
}

#[derive(Debug, Clone)]
pub struct GridMap {
    tile_width: u32,
    tile_height: u32,
    rows: u32,
    cols: u32,
    layers: Vec<GridLayer>,
    images: ImageRegistry,
}

impl GridMap {
    pub fn new(tile_width: u32, tile_height: u32, rows: u32, cols: u32) -> Self {
        Self {
            tile_width,
            tile_height,
            rows,
            cols,
            layers: Vec::new(),
            images: ImageRegistry::default(),
        }
    }

    pub fn register_image(&mut self, source: ImageSource) -> ImageId {
        self.images.register(source)
    }

    pub fn add_layer(&mut self, y_offset: f32) -> usize {
        self.layers.push(GridLayer {
            y_offset,
            cells: vec![None; self.rows as usize * self.cols as usize],
        });
        self.layers.len() - 1
    }

    pub fn set_tile(&mut self, row: u32, col: u32, layer: usize, image: ImageId) -> bool {
        if row >= self.rows || col >= self.cols {
            return false;
        }
        let index = row as usize * self.cols as usize + col as usize;
        match self.layers.get_mut(layer) {
            Some(grid_layer) => {
                grid_layer.cells[index] = Some(image);
                true
            }
            None => false,
        }
    }

    pub fn fill_layer(&mut self, layer: usize, image: ImageId) {
        if let Some(grid_layer) = self.layers.get_mut(layer) {
            grid_layer.cells.iter_mut().for_each(|cell| *cell = Some(image));
        }
    }
}

impl MapSource for GridMap {
    fn tile_width(&self) -> u32 {
        self.tile_width
    }

    fn tile_height(&self) -> u32 {
        self.tile_height
    }

    fn rows(&self) -> u32 {
        self.rows
    }

    fn cols(&self) -> u32 {
        self.cols
    }

    fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn layer_y_offset(&self, layer: usize) -> f32 {
        self.layers
            .get(layer)
            .map(|grid_layer| grid_layer.y_offset)
            .unwrap_or(0.0)
    }

    fn tile_image(&self, row: u32, col: u32, layer: usize) -> Option<ImageId> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        let index = row as usize * self.cols as usize + col as usize;
        self.layers.get(layer)?.cells.get(index).copied().flatten()
    }

    fn images(&self) -> &ImageRegistry {
        &self.images
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_deduplicates_identical_sources() {
        let mut registry = ImageRegistry::default();
        let a = registry.register(ImageSource::file("tiles.png"));
        let b = registry.register(ImageSource::file("tiles.png"));
        let c = registry.register(ImageSource::file("player.png"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn outline_variant_keeps_region_and_adds_tint() {
        let mut registry = ImageRegistry::default();
        let rect = PixelRect {
            x: 64,
            y: 0,
            width: 64,
            height: 32,
        };
        let normal = registry.register(ImageSource::region("atlas.png", rect));
        let outline = registry.outline_variant(normal).expect("outline");
        let again = registry.outline_variant(normal).expect("outline");

        assert_ne!(normal, outline);
        assert_eq!(outline, again);
        let source = registry.get(outline).expect("source");
        assert_eq!(source.region, Some(rect));
        assert_eq!(source.tint, Some(OUTLINE_TINT));
    }

    #[test]
    fn outline_variant_of_unknown_id_is_none() {
        let mut registry = ImageRegistry::default();
        assert_eq!(registry.outline_variant(ImageId(3)), None);
    }

    #[test]
    fn grid_map_reports_empty_slots_and_out_of_range_as_none() {
        let mut map = GridMap::new(64, 32, 2, 3);
        let grass = map.register_image(ImageSource::file("grass.png"));
        let ground = map.add_layer(0.0);
        let objects = map.add_layer(-32.0);
        assert!(map.set_tile(1, 2, ground, grass));
        assert!(!map.set_tile(2, 0, ground, grass));
        assert!(!map.set_tile(0, 0, 5, grass));

        assert_eq!(map.tile_image(1, 2, ground), Some(grass));
        assert_eq!(map.tile_image(0, 0, ground), None);
        assert_eq!(map.tile_image(1, 2, objects), None);
        assert_eq!(map.tile_image(9, 9, ground), None);
        assert_eq!(map.layer_y_offset(objects), -32.0);
        assert_eq!(map.layer_y_offset(7), 0.0);
    }

    #[test]
    fn fill_layer_occupies_every_cell() {
        let mut map = GridMap::new(64, 32, 3, 4);
        let grass = map.register_image(ImageSource::file("grass.png"));
        let ground = map.add_layer(0.0);
        map.fill_layer(ground, grass);
        for row in 0..3 {
            for col in 0..4 {
                assert_eq!(map.tile_image(row, col, ground), Some(grass));
            }
        }
    }
}
