mod render_list;
mod renderer;
mod transform;
mod visible_window;

pub use render_list::{DrawSurface, Drawable, DrawableKind, RenderList};
pub use renderer::Renderer;
pub use transform::{
    screen_to_world, world_to_screen, IsoProjection, Viewport, DEFAULT_PROJECTION_ORIGIN_Y,
};
pub use visible_window::{compute_visible_window, VisibleWindow, WindowMargins};

#[cfg(test)]
pub(crate) use render_list::tests::{RecordingSurface, SurfaceCall};
