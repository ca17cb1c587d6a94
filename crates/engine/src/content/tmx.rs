use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::{debug, info};

use crate::image_paths::validate_image_path;

use super::map_source::{ImageId, ImageRegistry, ImageSource, MapSource, PixelRect};

/// Tiled stores horizontal/vertical/diagonal/hex flip flags in the top four gid bits.
const GID_FLIP_FLAGS_MASK: u32 = 0xF000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    MissingAttribute,
    MissingElement,
    InvalidValue,
    UnsupportedOrientation,
    UnsupportedEncoding,
    TileCountMismatch,
    UnknownGid,
    InvalidImagePath,
}

#[derive(Debug, Clone)]
pub struct MapLoadError {
    pub code: MapErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for MapLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for MapLoadError {}

#[derive(Debug, Clone)]
struct TmxLayer {
    name: String,
    y_offset: f32,
    cells: Vec<Option<ImageId>>,
}

/// Tiled's isometric renderer draws tile `(x, y)` at `((x - y) * w/2, (x + y) * h/2)`,
/// so the tile store's row axis runs along Tiled's x and its column axis along Tiled's y.
#[derive(Debug, Clone)]
pub struct TmxMap {
    path: PathBuf,
    tile_width: u32,
    tile_height: u32,
    width: u32,
    height: u32,
    layers: Vec<TmxLayer>,
    images: ImageRegistry,
}

pub fn load_tmx_map(path: &Path) -> Result<TmxMap, MapLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| MapLoadError {
        code: MapErrorCode::ReadFile,
        message: format!("failed to read map file: {source}"),
        file_path: path.to_path_buf(),
        location: None,
    })?;
    let map = TmxMap::parse_str(&raw, path)?;
    info!(
        path = %path.display(),
        width = map.width,
        height = map.height,
        layers = map.layers.len(),
        images = map.images.len(),
        "tmx_map_loaded"
    );
    Ok(map)
}

impl TmxMap {
    pub fn parse_str(raw: &str, map_path: &Path) -> Result<Self, MapLoadError> {
        let doc = parse_document(raw, map_path)?;
        let file = XmlFile {
            path: map_path,
            doc: &doc,
        };
        let root = doc.root_element();
        if root.tag_name().name() != "map" {
            return Err(file.error_at(
                MapErrorCode::InvalidRoot,
                "root element must be <map>".to_string(),
                root,
            ));
        }

        let orientation: String = file.required_attr(root, "orientation")?;
        if orientation != "isometric" {
            return Err(file.error_at(
                MapErrorCode::UnsupportedOrientation,
                format!("orientation '{orientation}' is not supported; expected 'isometric'"),
                root,
            ));
        }
        if root.attribute("infinite") == Some("1") {
            return Err(file.error_at(
                MapErrorCode::InvalidValue,
                "infinite maps are not supported".to_string(),
                root,
            ));
        }
        let width: u32 = file.required_positive_attr(root, "width")?;
        let height: u32 = file.required_positive_attr(root, "height")?;
        let tile_width: u32 = file.required_positive_attr(root, "tilewidth")?;
        let tile_height: u32 = file.required_positive_attr(root, "tileheight")?;

        let base_dir = parent_dir(map_path);
        let mut images = ImageRegistry::default();
        let mut tilesets = Vec::<Tileset>::new();
        let mut raw_layers = Vec::<RawLayer>::new();

        for child in root.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "tileset" => {
                    tilesets.push(parse_tileset_ref(&file, child, &base_dir, &mut images)?);
                }
                "layer" => {
                    if let Some(layer) = parse_layer(&file, child, width, height)? {
                        raw_layers.push(layer);
                    }
                }
                other => debug!(element = other, "tmx_element_ignored"),
            }
        }

        tilesets.sort_by_key(|tileset| tileset.first_gid);
        let mut gid_cache = HashMap::<u32, ImageId>::new();
        let mut layers = Vec::with_capacity(raw_layers.len());
        for raw_layer in raw_layers {
            let mut cells = Vec::with_capacity(raw_layer.gids.len());
            for raw_gid in raw_layer.gids.iter().copied() {
                let image = resolve_gid(&tilesets, raw_gid, &mut images, &mut gid_cache)
                    .map_err(|gid| MapLoadError {
                        code: MapErrorCode::UnknownGid,
                        message: format!(
                            "layer '{}' references gid {gid} which no tileset covers",
                            raw_layer.name
                        ),
                        file_path: map_path.to_path_buf(),
                        location: Some(raw_layer.location),
                    })?;
                cells.push(image);
            }
            layers.push(TmxLayer {
                name: raw_layer.name,
                y_offset: raw_layer.y_offset,
                cells,
            });
        }

        Ok(Self {
            path: map_path.to_path_buf(),
            tile_width,
            tile_height,
            width,
            height,
            layers,
            images,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|layer| layer.name.as_str())
    }
}

impl MapSource for TmxMap {
    fn tile_width(&self) -> u32 {
        self.tile_width
    }

    fn tile_height(&self) -> u32 {
        self.tile_height
    }

    fn rows(&self) -> u32 {
        self.width
    }

    fn cols(&self) -> u32 {
        self.height
    }

    fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn layer_y_offset(&self, layer: usize) -> f32 {
        self.layers
            .get(layer)
            .map(|tmx_layer| tmx_layer.y_offset)
            .unwrap_or(0.0)
    }

    fn tile_image(&self, row: u32, col: u32, layer: usize) -> Option<ImageId> {
        if row >= self.width || col >= self.height {
            return None;
        }
        let index = col as usize * self.width as usize + row as usize;
        self.layers.get(layer)?.cells.get(index).copied().flatten()
    }

    fn images(&self) -> &ImageRegistry {
        &self.images
    }
}

struct XmlFile<'a, 'input> {
    path: &'a Path,
    doc: &'a Document<'input>,
}

impl XmlFile<'_, '_> {
    fn location_of(&self, node: Node<'_, '_>) -> SourceLocation {
        let pos = self.doc.text_pos_at(node.range().start);
        SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }
    }

    fn error_at(&self, code: MapErrorCode, message: String, node: Node<'_, '_>) -> MapLoadError {
        MapLoadError {
            code,
            message,
            file_path: self.path.to_path_buf(),
            location: Some(self.location_of(node)),
        }
    }

    fn optional_attr<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        name: &str,
    ) -> Result<Option<T>, MapLoadError> {
        let Some(raw) = node.attribute(name) else {
            return Ok(None);
        };
        raw.trim().parse::<T>().map(Some).map_err(|_| {
            self.error_at(
                MapErrorCode::InvalidValue,
                format!(
                    "attribute '{name}' on <{}> has invalid value '{raw}'",
                    node.tag_name().name()
                ),
                node,
            )
        })
    }

    fn required_attr<T: FromStr>(&self, node: Node<'_, '_>, name: &str) -> Result<T, MapLoadError> {
        self.optional_attr(node, name)?.ok_or_else(|| {
            self.error_at(
                MapErrorCode::MissingAttribute,
                format!(
                    "missing required attribute '{name}' on <{}>",
                    node.tag_name().name()
                ),
                node,
            )
        })
    }

    fn required_positive_attr(&self, node: Node<'_, '_>, name: &str) -> Result<u32, MapLoadError> {
        let value: u32 = self.required_attr(node, name)?;
        if value == 0 {
            return Err(self.error_at(
                MapErrorCode::InvalidValue,
                format!("attribute '{name}' must be greater than zero"),
                node,
            ));
        }
        Ok(value)
    }
}

fn parse_document<'input>(
    raw: &'input str,
    file_path: &Path,
) -> Result<Document<'input>, MapLoadError> {
    Document::parse(raw).map_err(|error| MapLoadError {
        code: MapErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Lexical join: `.` is dropped and `..` folds into the preceding name.
fn join_relative(base_dir: &Path, relative: &str) -> PathBuf {
    let mut joined = PathBuf::new();
    for component in base_dir.join(relative).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match joined.components().next_back() {
                Some(Component::Normal(_)) => {
                    joined.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => joined.push(".."),
            },
            other => joined.push(other),
        }
    }
    joined
}

#[derive(Debug, Clone)]
struct AtlasGrid {
    path: PathBuf,
    columns: u32,
    tile_width: u32,
    tile_height: u32,
    spacing: u32,
    margin: u32,
}

impl AtlasGrid {
    fn region(&self, local_id: u32) -> PixelRect {
        let column = local_id % self.columns;
        let row = local_id / self.columns;
        PixelRect {
            x: self.margin + column * (self.tile_width + self.spacing),
            y: self.margin + row * (self.tile_height + self.spacing),
            width: self.tile_width,
            height: self.tile_height,
        }
    }
}

#[derive(Debug, Clone)]
enum TilesetKind {
    Atlas(AtlasGrid),
    Collection(HashMap<u32, ImageId>),
}

#[derive(Debug, Clone)]
struct Tileset {
    first_gid: u32,
    tile_count: Option<u32>,
    kind: TilesetKind,
}

fn parse_tileset_ref(
    file: &XmlFile<'_, '_>,
    node: Node<'_, '_>,
    base_dir: &Path,
    images: &mut ImageRegistry,
) -> Result<Tileset, MapLoadError> {
    let first_gid: u32 = file.required_positive_attr(node, "firstgid")?;
    let Some(source) = node.attribute("source") else {
        return parse_tileset_body(file, node, base_dir, first_gid, images);
    };

    let tsx_path = join_relative(base_dir, source);
    let raw = fs::read_to_string(&tsx_path).map_err(|error| MapLoadError {
        code: MapErrorCode::ReadFile,
        message: format!("failed to read external tileset '{source}': {error}"),
        file_path: file.path.to_path_buf(),
        location: Some(file.location_of(node)),
    })?;
    let doc = parse_document(&raw, &tsx_path)?;
    let tsx_file = XmlFile {
        path: &tsx_path,
        doc: &doc,
    };
    let root = doc.root_element();
    if root.tag_name().name() != "tileset" {
        return Err(tsx_file.error_at(
            MapErrorCode::InvalidRoot,
            "root element must be <tileset>".to_string(),
            root,
        ));
    }
    parse_tileset_body(&tsx_file, root, &parent_dir(&tsx_path), first_gid, images)
}

fn parse_tileset_body(
    file: &XmlFile<'_, '_>,
    node: Node<'_, '_>,
    base_dir: &Path,
    first_gid: u32,
    images: &mut ImageRegistry,
) -> Result<Tileset, MapLoadError> {
    let tile_width: u32 = file.required_positive_attr(node, "tilewidth")?;
    let tile_height: u32 = file.required_positive_attr(node, "tileheight")?;
    let spacing: u32 = file.optional_attr(node, "spacing")?.unwrap_or(0);
    let margin: u32 = file.optional_attr(node, "margin")?.unwrap_or(0);
    let tile_count: Option<u32> = file.optional_attr(node, "tilecount")?;
    let columns: Option<u32> = file.optional_attr(node, "columns")?;

    if let Some(image_node) = child_element(node, "image") {
        let image_path = image_source_path(file, image_node, base_dir)?;
        let image_width: Option<u32> = file.optional_attr(image_node, "width")?;
        let columns = columns
            .filter(|count| *count > 0)
            .or_else(|| {
                image_width
                    .map(|width| {
                        (width.saturating_sub(2 * margin) + spacing) / (tile_width + spacing)
                    })
                    .filter(|count| *count > 0)
            })
            .ok_or_else(|| {
                file.error_at(
                    MapErrorCode::MissingAttribute,
                    "atlas tileset needs 'columns' or an image 'width'".to_string(),
                    node,
                )
            })?;
        return Ok(Tileset {
            first_gid,
            tile_count,
            kind: TilesetKind::Atlas(AtlasGrid {
                path: image_path,
                columns,
                tile_width,
                tile_height,
                spacing,
                margin,
            }),
        });
    }

    let mut collection = HashMap::<u32, ImageId>::new();
    for tile in node
        .children()
        .filter(|child| child.is_element() && child.tag_name().name() == "tile")
    {
        let local_id: u32 = file.required_attr(tile, "id")?;
        let image_node = child_element(tile, "image").ok_or_else(|| {
            file.error_at(
                MapErrorCode::MissingElement,
                format!("collection tile {local_id} has no <image>"),
                tile,
            )
        })?;
        let image_path = image_source_path(file, image_node, base_dir)?;
        collection.insert(local_id, images.register(ImageSource::file(image_path)));
    }
    Ok(Tileset {
        first_gid,
        tile_count,
        kind: TilesetKind::Collection(collection),
    })
}

fn image_source_path(
    file: &XmlFile<'_, '_>,
    image_node: Node<'_, '_>,
    base_dir: &Path,
) -> Result<PathBuf, MapLoadError> {
    let source: String = file.required_attr(image_node, "source")?;
    validate_image_path(&source).map_err(|error| {
        file.error_at(
            MapErrorCode::InvalidImagePath,
            format!("invalid image source '{source}': {error}"),
            image_node,
        )
    })?;
    Ok(join_relative(base_dir, &source))
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

fn resolve_gid(
    tilesets: &[Tileset],
    raw_gid: u32,
    images: &mut ImageRegistry,
    cache: &mut HashMap<u32, ImageId>,
) -> Result<Option<ImageId>, u32> {
    let gid = raw_gid & !GID_FLIP_FLAGS_MASK;
    if gid == 0 {
        return Ok(None);
    }
    if let Some(image) = cache.get(&gid) {
        return Ok(Some(*image));
    }
    let tileset = tilesets
        .iter()
        .rev()
        .find(|tileset| tileset.first_gid <= gid)
        .ok_or(gid)?;
    let local_id = gid - tileset.first_gid;
    if tileset.tile_count.is_some_and(|count| local_id >= count) {
        return Err(gid);
    }
    let image = match &tileset.kind {
        TilesetKind::Atlas(grid) => {
            images.register(ImageSource::region(grid.path.clone(), grid.region(local_id)))
        }
        TilesetKind::Collection(tiles) => *tiles.get(&local_id).ok_or(gid)?,
    };
    cache.insert(gid, image);
    Ok(Some(image))
}

#[derive(Debug)]
struct RawLayer {
    name: String,
    y_offset: f32,
    gids: Vec<u32>,
    location: SourceLocation,
}

fn parse_layer(
    file: &XmlFile<'_, '_>,
    node: Node<'_, '_>,
    width: u32,
    height: u32,
) -> Result<Option<RawLayer>, MapLoadError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    if node.attribute("visible") == Some("0") {
        debug!(layer = %name, "tmx_hidden_layer_skipped");
        return Ok(None);
    }
    let y_offset: f32 = file.optional_attr(node, "offsety")?.unwrap_or(0.0);
    let data = child_element(node, "data").ok_or_else(|| {
        file.error_at(
            MapErrorCode::MissingElement,
            format!("layer '{name}' has no <data>"),
            node,
        )
    })?;
    if let Some(compression) = data.attribute("compression") {
        return Err(file.error_at(
            MapErrorCode::UnsupportedEncoding,
            format!("compressed layer data ('{compression}') is not supported; save as CSV"),
            data,
        ));
    }

    let gids = match data.attribute("encoding") {
        Some("csv") => data
            .text()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| {
                token.parse::<u32>().map_err(|_| {
                    file.error_at(
                        MapErrorCode::InvalidValue,
                        format!("layer '{name}' has invalid gid '{token}'"),
                        data,
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => data
            .children()
            .filter(|child| child.is_element() && child.tag_name().name() == "tile")
            .map(|tile| Ok(file.optional_attr::<u32>(tile, "gid")?.unwrap_or(0)))
            .collect::<Result<Vec<_>, MapLoadError>>()?,
        Some(other) => {
            return Err(file.error_at(
                MapErrorCode::UnsupportedEncoding,
                format!("layer encoding '{other}' is not supported; save as CSV"),
                data,
            ))
        }
    };

    let expected = width as usize * height as usize;
    if gids.len() != expected {
        return Err(file.error_at(
            MapErrorCode::TileCountMismatch,
            format!(
                "layer '{name}' has {} tiles, expected {expected}",
                gids.len()
            ),
            data,
        ));
    }

    Ok(Some(RawLayer {
        name,
        y_offset,
        gids,
        location: file.location_of(node),
    }))
}
