mod map_source;
mod tmx;

pub use map_source::{
    GridMap, ImageId, ImageRegistry, ImageSource, MapSource, PixelRect, OUTLINE_TINT,
};
pub use tmx::{load_tmx_map, MapErrorCode, MapLoadError, SourceLocation, TmxMap};
