use std::ops::{Add, AddAssign, Mul, Sub};

use tracing::{debug, info};

use super::actor::Actor;
use super::input::{ActionStates, InputAction};
use super::rendering::{
    compute_visible_window, screen_to_world, DrawSurface, DrawableKind, IsoProjection, RenderList,
    Viewport, VisibleWindow, WindowMargins,
};
use super::tilemap::{SortKeyRules, TileKey, TileStore};
use crate::content::{ImageId, ImageRegistry, ImageSource, MapSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    actions: ActionStates,
    cursor_position_px: Option<Vec2>,
    left_click_pressed: bool,
    right_click_pressed: bool,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(
        quit_requested: bool,
        actions: ActionStates,
        cursor_position_px: Option<Vec2>,
        left_click_pressed: bool,
        right_click_pressed: bool,
        window_width: u32,
        window_height: u32,
    ) -> Self {
        Self {
            quit_requested,
            actions,
            cursor_position_px,
            left_click_pressed,
            right_click_pressed,
            window_width,
            window_height,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_cursor_position_px(mut self, cursor_position_px: Option<Vec2>) -> Self {
        self.cursor_position_px = cursor_position_px;
        self
    }

    pub fn with_left_click_pressed(mut self, left_click_pressed: bool) -> Self {
        self.left_click_pressed = left_click_pressed;
        self
    }

    pub fn with_right_click_pressed(mut self, right_click_pressed: bool) -> Self {
        self.right_click_pressed = right_click_pressed;
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }

    pub fn cursor_position_px(&self) -> Option<Vec2> {
        self.cursor_position_px
    }

    pub fn left_click_pressed(&self) -> bool {
        self.left_click_pressed
    }

    pub fn right_click_pressed(&self) -> bool {
        self.right_click_pressed
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2 {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GridPos {
    pub col: i32,
    pub row: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollCamera {
    pub offset: Vec2,
    pub viewport: Viewport,
    pub top_left_grid: Option<GridPos>,
}

impl ScrollCamera {
    pub fn new(offset: Vec2, viewport: Viewport) -> Self {
        Self {
            offset,
            viewport,
            top_left_grid: None,
        }
    }

    pub fn top_left_world(&self) -> Vec2 {
        screen_to_world(Vec2::default(), self.offset)
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct SceneWorld {
    projection: IsoProjection,
    margins: WindowMargins,
    tiles: TileStore,
    images: ImageRegistry,
    camera: ScrollCamera,
    window: VisibleWindow,
    render_list: RenderList,
    actor: Option<Actor>,
    selected_tile: Option<TileKey>,
    force_refresh: bool,
}

impl SceneWorld {
    pub fn new(projection: IsoProjection, viewport: Viewport) -> Self {
        Self {
            projection,
            margins: WindowMargins::default(),
            tiles: TileStore::default(),
            images: ImageRegistry::default(),
            camera: ScrollCamera::new(Vec2::default(), viewport),
            window: VisibleWindow::empty(),
            render_list: RenderList::new(),
            actor: None,
            selected_tile: None,
            force_refresh: true,
        }
    }

    pub fn from_map(source: &dyn MapSource, viewport: Viewport) -> Self {
        let projection = IsoProjection::new(source.tile_width(), source.tile_height());
        Self::from_map_with(source, projection, SortKeyRules::default(), viewport)
    }

    pub fn from_map_with(
        source: &dyn MapSource,
        projection: IsoProjection,
        sort_rules: SortKeyRules,
        viewport: Viewport,
    ) -> Self {
        let mut world = Self::new(projection, viewport);
        world.images = source.images().clone();
        world.tiles = TileStore::build(source, &projection, &sort_rules, &mut world.images);
        world
    }

    pub fn projection(&self) -> &IsoProjection {
        &self.projection
    }

    pub fn tiles(&self) -> &TileStore {
        &self.tiles
    }

    pub fn images(&self) -> &ImageRegistry {
        &self.images
    }

    pub fn camera(&self) -> &ScrollCamera {
        &self.camera
    }

    pub fn visible_window(&self) -> &VisibleWindow {
        &self.window
    }

    pub fn render_list(&self) -> &RenderList {
        &self.render_list
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    pub fn selected_tile(&self) -> Option<TileKey> {
        self.selected_tile
    }

    pub fn set_margins(&mut self, margins: WindowMargins) {
        self.margins = margins;
        self.force_refresh = true;
    }

    pub fn register_image(&mut self, source: ImageSource) -> ImageId {
        self.images.register(source)
    }

    pub fn set_actor(&mut self, actor: Actor) {
        self.actor = Some(actor);
        self.force_refresh = true;
    }

    pub fn update_actor(&mut self, dt_seconds: f32) -> bool {
        let Some(actor) = self.actor.as_mut() else {
            return false;
        };
        if !actor.update(dt_seconds) {
            return false;
        }
        self.render_list
            .reinsert_actor(actor.image(), actor.sprite_position(), actor.sort_key());
        true
    }

    pub fn scroll_by(&mut self, delta: Vec2) {
        if delta.is_finite() {
            self.camera.offset += delta;
        }
    }

    pub fn set_scroll_offset(&mut self, offset: Vec2) {
        if offset.is_finite() {
            self.camera.offset = offset;
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.camera.viewport == viewport {
            return;
        }
        self.camera.viewport = viewport;
        self.force_refresh = true;
    }

    pub fn refresh_visible_window(&mut self) -> bool {
        let top_left_grid = self.projection.world_to_grid(self.camera.top_left_world());
        let moved_cell = self.camera.top_left_grid != Some(top_left_grid);
        let rebuilt = moved_cell || self.force_refresh;
        if rebuilt {
            self.camera.top_left_grid = Some(top_left_grid);
            self.force_refresh = false;
            self.rebuild_render_list();
        }
        self.render_list.set_offset(self.camera.offset);
        rebuilt
    }

    pub fn rebuild_render_list(&mut self) {
        self.window = compute_visible_window(
            &self.projection,
            self.camera.top_left_world(),
            self.camera.viewport,
            self.margins,
            (self.tiles.rows(), self.tiles.cols()),
        );

        self.render_list.begin_rebuild();
        for (row, col) in self.window.cells() {
            for layer in 0..self.tiles.layers() {
                let key = TileKey { row, col, layer };
                if let Some(tile) = self.tiles.tile(key) {
                    self.render_list.push(
                        DrawableKind::Tile(key),
                        tile.active_image(),
                        tile.world_position,
                        tile.sort_key,
                    );
                }
            }
        }
        if let Some(actor) = &self.actor {
            self.render_list.push(
                DrawableKind::Actor,
                actor.image(),
                actor.sprite_position(),
                actor.sort_key(),
            );
        }
        self.render_list.sort();

        debug!(
            generation = self.render_list.generation(),
            drawables = self.render_list.len(),
            cells = self.window.cell_count(),
            "render_list_rebuilt"
        );
    }

    pub fn render<S: DrawSurface>(&self, surface: &mut S) -> Result<(), S::Error> {
        surface.begin_frame();
        surface.draw_background();
        self.render_list.render(surface);
        surface.present()
    }

    pub fn set_actor_target_at_screen(&mut self, screen: Vec2) -> Option<Vec2> {
        let actor = self.actor.as_mut()?;
        let target = screen_to_world(screen, self.camera.offset);
        actor.set_target(target);
        Some(target)
    }

    pub fn select_tile_at_screen(&mut self, screen: Vec2) -> Option<TileKey> {
        let world = screen_to_world(screen, self.camera.offset);
        let grid = self.projection.world_to_grid(world);
        info!(
            world_x = world.x,
            world_y = world.y,
            grid_col = grid.col,
            grid_row = grid.row,
            "tile_clicked"
        );

        if let Some(previous) = self.selected_tile.take() {
            self.tiles.set_selected(previous, false);
        }
        let key = self.tiles.topmost_at(grid.row, grid.col).map(|tile| tile.key());
        if let Some(key) = key {
            self.tiles.set_selected(key, true);
            self.selected_tile = Some(key);
            info!(row = key.row, col = key.col, layer = key.layer, "tile_selected");
        }
        self.force_refresh = true;
        key
    }
}
