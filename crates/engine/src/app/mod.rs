mod actor;
mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod scene;
mod tilemap;

pub use actor::{Actor, ActorState, ACTOR_ARRIVAL_THRESHOLD};
pub use input::InputAction;
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig, SLOW_FRAME_ENV_VAR};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use rendering::{
    compute_visible_window, screen_to_world, world_to_screen, DrawSurface, Drawable,
    DrawableKind, IsoProjection, RenderList, Renderer, Viewport, VisibleWindow, WindowMargins,
    DEFAULT_PROJECTION_ORIGIN_Y,
};
pub use scene::{
    GridPos, InputSnapshot, Scene, SceneCommand, SceneWorld, ScrollCamera, Vec2,
};
pub use tilemap::{SortKeyRules, Tile, TileKey, TileSprite, TileStore};
