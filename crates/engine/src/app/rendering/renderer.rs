use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{imageops, ImageReader, RgbaImage};
use pixels::{Error, Pixels, SurfaceTexture};
use tracing::warn;
use winit::window::Window;

use crate::app::Vec2;
use crate::content::{ImageId, ImageRegistry, ImageSource, PixelRect};

use super::{DrawSurface, Viewport};

#[derive(Debug)]
struct LoadedSprite {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
    clear_color: [u8; 4],
    images: ImageRegistry,
    sprite_cache: HashMap<ImageId, Option<LoadedSprite>>,
    decoded_files: HashMap<PathBuf, Result<RgbaImage, String>>,
    warned_images: HashSet<ImageId>,
}

impl Renderer {
    pub fn new(window: Arc<Window>, clear_color: [u8; 4]) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
            clear_color,
            images: ImageRegistry::default(),
            sprite_cache: HashMap::new(),
            decoded_files: HashMap::new(),
            warned_images: HashSet::new(),
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    pub fn sync_images(&mut self, images: &ImageRegistry) {
        if images.len() != self.images.len() {
            self.images = images.clone();
        }
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width.max(1), height.max(1), surface)
    }
}

impl DrawSurface for Renderer {
    type Error = Error;

    // The background pass overwrites the whole buffer.
    fn begin_frame(&mut self) {}

    fn draw_background(&mut self) {
        fill_frame(self.pixels.frame_mut(), self.clear_color);
    }

    fn draw_sprite(&mut self, image: ImageId, screen_position: Vec2) {
        let Some(sprite) = resolve_cached_sprite(
            &mut self.sprite_cache,
            &mut self.decoded_files,
            &mut self.warned_images,
            &self.images,
            image,
        ) else {
            return;
        };
        let Viewport { width, height } = self.viewport;
        draw_sprite_top_left(
            self.pixels.frame_mut(),
            width,
            height,
            screen_position.x.round() as i32,
            screen_position.y.round() as i32,
            sprite,
        );
    }

    fn present(&mut self) -> Result<(), Self::Error> {
        self.pixels.render()
    }
}

fn resolve_cached_sprite<'a>(
    cache: &'a mut HashMap<ImageId, Option<LoadedSprite>>,
    decoded_files: &mut HashMap<PathBuf, Result<RgbaImage, String>>,
    warned_images: &mut HashSet<ImageId>,
    images: &ImageRegistry,
    id: ImageId,
) -> Option<&'a LoadedSprite> {
    if !cache.contains_key(&id) {
        let source = images.get(id);
        let loaded = match source {
            Some(source) => load_image_source(decoded_files, source),
            None => Err("unregistered_image".to_string()),
        };
        let sprite = match loaded {
            Ok(sprite) => Some(sprite),
            Err(reason) => {
                warn_image_load_once(
                    warned_images,
                    id,
                    source.map(|source| source.path.as_path()),
                    &reason,
                );
                None
            }
        };
        cache.insert(id, sprite);
    }
    cache.get(&id).and_then(Option::as_ref)
}

fn load_image_source(
    decoded_files: &mut HashMap<PathBuf, Result<RgbaImage, String>>,
    source: &ImageSource,
) -> Result<LoadedSprite, String> {
    let decoded = decoded_files
        .entry(source.path.clone())
        .or_insert_with(|| decode_rgba(&source.path));
    let image = decoded.as_ref().map_err(Clone::clone)?;
    let mut pixels = match source.region {
        Some(region) => crop_region(image, region)?,
        None => image.clone(),
    };
    if let Some(tint) = source.tint {
        apply_tint(&mut pixels, tint);
    }
    Ok(LoadedSprite {
        width: pixels.width(),
        height: pixels.height(),
        rgba: pixels.into_raw(),
    })
}

fn decode_rgba(path: &Path) -> Result<RgbaImage, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    Ok(decoded.to_rgba8())
}

fn crop_region(image: &RgbaImage, region: PixelRect) -> Result<RgbaImage, String> {
    let fits_x = region
        .x
        .checked_add(region.width)
        .is_some_and(|right| right <= image.width());
    let fits_y = region
        .y
        .checked_add(region.height)
        .is_some_and(|bottom| bottom <= image.height());
    if !fits_x || !fits_y || region.width == 0 || region.height == 0 {
        return Err(format!(
            "region_out_of_bounds:{}x{}+{}+{} in {}x{}",
            region.width,
            region.height,
            region.x,
            region.y,
            image.width(),
            image.height()
        ));
    }
    Ok(imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image())
}

fn apply_tint(image: &mut RgbaImage, tint: [u8; 4]) {
    for pixel in image.pixels_mut() {
        for (channel, factor) in pixel.0.iter_mut().zip(tint) {
            *channel = ((u16::from(*channel) * u16::from(factor) + 127) / 255) as u8;
        }
    }
}

fn warn_image_load_once(
    warned_images: &mut HashSet<ImageId>,
    id: ImageId,
    path: Option<&Path>,
    reason: &str,
) {
    if !warned_images.insert(id) {
        return;
    }
    let path_display = path
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unregistered>".to_string());
    warn!(
        image_id = id.0,
        path = %path_display,
        reason = reason,
        "renderer_image_load_failed_skipping_sprite"
    );
}

fn fill_frame(frame: &mut [u8], color: [u8; 4]) {
    for pixel in frame.chunks_exact_mut(4) {
        pixel.copy_from_slice(&color);
    }
}

fn draw_sprite_top_left(
    frame: &mut [u8],
    width: u32,
    height: u32,
    left: i32,
    top: i32,
    sprite: &LoadedSprite,
) {
    if sprite.width == 0 || sprite.height == 0 || width == 0 || height == 0 {
        return;
    }
    let expected_rgba_len = sprite.width as usize * sprite.height as usize * 4;
    if sprite.rgba.len() < expected_rgba_len || frame.len() < width as usize * height as usize * 4
    {
        return;
    }

    let right = left.saturating_add(sprite.width as i32);
    let bottom = top.saturating_add(sprite.height as i32);
    let draw_left = left.max(0);
    let draw_top = top.max(0);
    let draw_right = right.min(width as i32);
    let draw_bottom = bottom.min(height as i32);
    if draw_left >= draw_right || draw_top >= draw_bottom {
        return;
    }

    let frame_width = width as usize;
    let sprite_width = sprite.width as usize;
    for out_y in draw_top..draw_bottom {
        let src_row_offset = (out_y - top) as usize * sprite_width * 4;
        let dst_row_offset = out_y as usize * frame_width * 4;
        for out_x in draw_left..draw_right {
            let src_offset = src_row_offset + (out_x - left) as usize * 4;
            if sprite.rgba[src_offset + 3] == 0 {
                continue;
            }
            let dst_offset = dst_row_offset + out_x as usize * 4;
            frame[dst_offset..dst_offset + 4]
                .copy_from_slice(&sprite.rgba[src_offset..src_offset + 4]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    fn solid_sprite(width: u32, height: u32, color: [u8; 4]) -> LoadedSprite {
        LoadedSprite {
            width,
            height,
            rgba: color
                .iter()
                .copied()
                .cycle()
                .take(width as usize * height as usize * 4)
                .collect(),
        }
    }

    fn pixel_at(frame: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let offset = (y as usize * width as usize + x as usize) * 4;
        [
            frame[offset],
            frame[offset + 1],
            frame[offset + 2],
            frame[offset + 3],
        ]
    }

    fn write_atlas(dir: &Path) -> PathBuf {
        let mut atlas = RgbaImage::new(4, 2);
        for (x, y, pixel) in atlas.enumerate_pixels_mut() {
            *pixel = if x < 2 {
                Rgba([200, 100, 50, 255])
            } else {
                Rgba([10, 20, 30, if y == 0 { 255 } else { 0 }])
            };
        }
        let path = dir.join("atlas.png");
        atlas.save(&path).expect("save atlas");
        path
    }

    #[test]
    fn background_fills_every_pixel() {
        let mut frame = vec![0u8; 3 * 2 * 4];
        fill_frame(&mut frame, [1, 2, 3, 255]);
        assert!(frame.chunks_exact(4).all(|pixel| pixel == [1, 2, 3, 255]));
    }

    #[test]
    fn blit_is_clipped_to_frame() {
        let (width, height) = (4u32, 4u32);
        let mut frame = vec![0u8; (width * height * 4) as usize];
        let sprite = solid_sprite(3, 3, [9, 9, 9, 255]);

        draw_sprite_top_left(&mut frame, width, height, -1, 2, &sprite);
        assert_eq!(pixel_at(&frame, width, 0, 2), [9, 9, 9, 255]);
        assert_eq!(pixel_at(&frame, width, 1, 3), [9, 9, 9, 255]);
        assert_eq!(pixel_at(&frame, width, 2, 2), [0, 0, 0, 0]);
        assert_eq!(pixel_at(&frame, width, 0, 1), [0, 0, 0, 0]);

        // Fully off-screen draws are no-ops.
        draw_sprite_top_left(&mut frame, width, height, 10, 10, &sprite);
        draw_sprite_top_left(&mut frame, width, height, -3, -3, &sprite);
    }

    #[test]
    fn blit_skips_transparent_pixels() {
        let (width, height) = (2u32, 1u32);
        let mut frame = vec![7u8; (width * height * 4) as usize];
        let sprite = LoadedSprite {
            width: 2,
            height: 1,
            rgba: vec![1, 2, 3, 255, 4, 5, 6, 0],
        };
        draw_sprite_top_left(&mut frame, width, height, 0, 0, &sprite);
        assert_eq!(pixel_at(&frame, width, 0, 0), [1, 2, 3, 255]);
        assert_eq!(pixel_at(&frame, width, 1, 0), [7, 7, 7, 7]);
    }

    #[test]
    fn tint_multiplies_channels() {
        let mut image = RgbaImage::from_pixel(1, 1, Rgba([255, 128, 0, 255]));
        apply_tint(&mut image, [255, 236, 120, 255]);
        assert_eq!(image.get_pixel(0, 0).0, [255, 118, 0, 255]);
    }

    #[test]
    fn crop_rejects_out_of_bounds_regions() {
        let image = RgbaImage::new(4, 4);
        let inside = PixelRect {
            x: 2,
            y: 2,
            width: 2,
            height: 2,
        };
        assert_eq!(crop_region(&image, inside).expect("crop").dimensions(), (2, 2));
        let outside = PixelRect {
            x: 3,
            y: 0,
            width: 2,
            height: 1,
        };
        assert!(crop_region(&image, outside).is_err());
    }

    #[test]
    fn atlas_regions_are_cut_from_one_decode() {
        let temp = TempDir::new().expect("temp");
        let path = write_atlas(temp.path());
        let mut registry = ImageRegistry::default();
        let left = registry.register(ImageSource::region(
            &path,
            PixelRect {
                x: 0,
                y: 0,
                width: 2,
                height: 2,
            },
        ));
        let right = registry.register(ImageSource::region(
            &path,
            PixelRect {
                x: 2,
                y: 0,
                width: 2,
                height: 2,
            },
        ));

        let mut cache = HashMap::new();
        let mut files = HashMap::new();
        let mut warned = HashSet::new();
        let left_sprite =
            resolve_cached_sprite(&mut cache, &mut files, &mut warned, &registry, left)
                .expect("left");
        assert_eq!((left_sprite.width, left_sprite.height), (2, 2));
        assert_eq!(&left_sprite.rgba[0..4], &[200, 100, 50, 255]);

        let right_sprite =
            resolve_cached_sprite(&mut cache, &mut files, &mut warned, &registry, right)
                .expect("right");
        assert_eq!(&right_sprite.rgba[0..4], &[10, 20, 30, 255]);
        assert_eq!(right_sprite.rgba[2 * 4 + 3], 0);

        assert_eq!(files.len(), 1);
        assert!(warned.is_empty());
    }

    #[test]
    fn missing_image_warns_once_and_caches_failure() {
        let temp = TempDir::new().expect("temp");
        let mut registry = ImageRegistry::default();
        let missing = registry.register(ImageSource::file(temp.path().join("missing.png")));

        let mut cache = HashMap::new();
        let mut files = HashMap::new();
        let mut warned = HashSet::new();
        for _ in 0..3 {
            assert!(
                resolve_cached_sprite(&mut cache, &mut files, &mut warned, &registry, missing)
                    .is_none()
            );
        }
        assert_eq!(warned.len(), 1);
        assert_eq!(cache.len(), 1);

        assert!(
            resolve_cached_sprite(&mut cache, &mut files, &mut warned, &registry, ImageId(42))
                .is_none()
        );
        assert!(warned.contains(&ImageId(42)));
    }

    #[test]
    fn outline_variant_decodes_with_tint() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("white.png");
        RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]))
            .save(&path)
            .expect("save");
        let mut registry = ImageRegistry::default();
        let normal = registry.register(ImageSource::file(&path));
        let outline = registry.outline_variant(normal).expect("outline");

        let mut cache = HashMap::new();
        let mut files = HashMap::new();
        let mut warned = HashSet::new();
        let sprite =
            resolve_cached_sprite(&mut cache, &mut files, &mut warned, &registry, outline)
                .expect("outline sprite");
        assert_eq!(&sprite.rgba[..], &crate::content::OUTLINE_TINT[..]);
    }
}
