use engine::{
    Actor, ImageId, InputAction, InputSnapshot, Scene, SceneCommand, SceneWorld, Vec2,
};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub(crate) struct DemoSceneConfig {
    pub(crate) player_image: ImageId,
    pub(crate) player_start: Vec2,
    pub(crate) player_feet_offset: Vec2,
    pub(crate) walk_speed: f32,
    pub(crate) view_offset: Vec2,
    pub(crate) scroll_speed: f32,
}

pub(crate) struct DemoScene {
    config: DemoSceneConfig,
}

impl DemoScene {
    pub(crate) fn new(config: DemoSceneConfig) -> Self {
        Self { config }
    }
}

impl Scene for DemoScene {
    fn load(&mut self, world: &mut SceneWorld) {
        let config = self.config;
        world.set_actor(Actor::new(
            config.player_start,
            config.walk_speed,
            config.player_feet_offset,
            config.player_image,
        ));
        world.set_scroll_offset(config.view_offset);
        info!(
            tiles = world.tiles().occupied_count(),
            player_x = config.player_start.x,
            player_y = config.player_start.y,
            "demo_scene_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        if input.is_down(InputAction::Quit) {
            return SceneCommand::Quit;
        }

        if let Some(cursor) = input.cursor_position_px() {
            if input.left_click_pressed() {
                if let Some(target) = world.set_actor_target_at_screen(cursor) {
                    debug!(target_x = target.x, target_y = target.y, "actor_target_set");
                }
            }
            if input.right_click_pressed() {
                world.select_tile_at_screen(cursor);
            }
        }

        world.update_actor(fixed_dt_seconds);
        world.scroll_by(scroll_delta(input, fixed_dt_seconds, self.config.scroll_speed));
        SceneCommand::None
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        info!(
            offset_x = world.camera().offset.x,
            offset_y = world.camera().offset.y,
            "demo_scene_unloaded"
        );
    }

    fn debug_title(&self, world: &SceneWorld) -> Option<String> {
        let actor = world.actor()?;
        let selected = match world.selected_tile() {
            Some(key) => format!("({}, {}, {})", key.row, key.col, key.layer),
            None => "none".to_string(),
        };
        Some(format!(
            "Actor: ({:.0}, {:.0}) {:?} | Selected: {selected}",
            actor.position().x,
            actor.position().y,
            actor.state()
        ))
    }
}

/// Scrolling moves the map, so pressing down shifts the offset up and
/// pressing right shifts it left. Axes are independent.
fn scroll_delta(input: &InputSnapshot, fixed_dt_seconds: f32, speed: f32) -> Vec2 {
    let mut x = 0.0f32;
    let mut y = 0.0f32;

    if input.is_down(InputAction::ScrollDown) {
        y -= 1.0;
    }
    if input.is_down(InputAction::ScrollUp) {
        y += 1.0;
    }
    if input.is_down(InputAction::ScrollLeft) {
        x += 1.0;
    }
    if input.is_down(InputAction::ScrollRight) {
        x -= 1.0;
    }

    Vec2 {
        x: x * speed * fixed_dt_seconds,
        y: y * speed * fixed_dt_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{ActorState, GridMap, ImageSource, MapSource, Viewport};

    const DT: f32 = 1.0 / 60.0;

    fn world_and_scene() -> (SceneWorld, DemoScene) {
        let mut map = GridMap::new(64, 32, 40, 40);
        let grass = map.register_image(ImageSource::file("grass.png"));
        let ground = map.add_layer(0.0);
        map.fill_layer(ground, grass);
        let mut world = SceneWorld::from_map(
            &map as &dyn MapSource,
            Viewport {
                width: 800,
                height: 600,
            },
        );
        let player_image = world.register_image(ImageSource::file("player.png"));
        let scene = DemoScene::new(DemoSceneConfig {
            player_image,
            player_start: Vec2 { x: 0.0, y: 400.0 },
            player_feet_offset: Vec2 { x: 32.0, y: 64.0 },
            walk_speed: 100.0,
            view_offset: Vec2 { x: 300.0, y: 0.0 },
            scroll_speed: 300.0,
        });
        (world, scene)
    }

    fn snapshot_from_actions(actions: &[InputAction]) -> InputSnapshot {
        let mut snapshot = InputSnapshot::empty();
        for action in actions {
            snapshot = snapshot.with_action_down(*action, true);
        }
        snapshot
    }

    #[test]
    fn scroll_directions_move_the_offset() {
        let cases = [
            (InputAction::ScrollDown, Vec2 { x: 0.0, y: -300.0 }),
            (InputAction::ScrollUp, Vec2 { x: 0.0, y: 300.0 }),
            (InputAction::ScrollLeft, Vec2 { x: 300.0, y: 0.0 }),
            (InputAction::ScrollRight, Vec2 { x: -300.0, y: 0.0 }),
        ];
        for (action, expected) in cases {
            let delta = scroll_delta(&snapshot_from_actions(&[action]), 1.0, 300.0);
            assert_eq!(delta, expected, "{action:?}");
        }
    }

    #[test]
    fn diagonal_scroll_is_not_normalized() {
        let delta = scroll_delta(
            &snapshot_from_actions(&[InputAction::ScrollUp, InputAction::ScrollRight]),
            0.5,
            300.0,
        );
        assert_eq!(delta, Vec2 { x: -150.0, y: 150.0 });
    }

    #[test]
    fn opposite_keys_cancel() {
        let delta = scroll_delta(
            &snapshot_from_actions(&[InputAction::ScrollUp, InputAction::ScrollDown]),
            1.0,
            300.0,
        );
        assert_eq!(delta, Vec2::default());
    }

    #[test]
    fn load_spawns_actor_and_sets_offset() {
        let (mut world, mut scene) = world_and_scene();
        scene.load(&mut world);
        let actor = world.actor().expect("actor");
        assert_eq!(actor.position(), Vec2 { x: 0.0, y: 400.0 });
        assert_eq!(actor.state(), ActorState::Idle);
        assert_eq!(world.camera().offset, Vec2 { x: 300.0, y: 0.0 });
        assert!(scene.debug_title(&world).is_some());
    }

    #[test]
    fn left_click_sends_actor_toward_world_point() {
        let (mut world, mut scene) = world_and_scene();
        scene.load(&mut world);
        let input = InputSnapshot::empty()
            .with_left_click_pressed(true)
            .with_cursor_position_px(Some(Vec2 { x: 400.0, y: 400.0 }))
            .with_window_size((800, 600));

        let command = scene.update(DT, &input, &mut world);
        assert_eq!(command, SceneCommand::None);
        let actor = world.actor().expect("actor");
        assert_eq!(actor.target(), Vec2 { x: 100.0, y: 400.0 });
        assert_eq!(actor.state(), ActorState::Moving);
        assert!(actor.position().x > 0.0);
    }

    #[test]
    fn right_click_selects_tile_under_cursor() {
        let (mut world, mut scene) = world_and_scene();
        scene.load(&mut world);
        world.set_scroll_offset(Vec2::default());
        let input = InputSnapshot::empty()
            .with_right_click_pressed(true)
            .with_cursor_position_px(Some(Vec2 { x: 32.0, y: 64.0 }));

        scene.update(DT, &input, &mut world);
        assert!(world.selected_tile().is_some());
        let title = scene.debug_title(&world).expect("title");
        assert!(!title.contains("Selected: none"));
    }

    #[test]
    fn clicks_without_cursor_are_ignored() {
        let (mut world, mut scene) = world_and_scene();
        scene.load(&mut world);
        let input = InputSnapshot::empty()
            .with_left_click_pressed(true)
            .with_right_click_pressed(true);
        scene.update(DT, &input, &mut world);
        assert_eq!(world.actor().expect("actor").state(), ActorState::Idle);
        assert_eq!(world.selected_tile(), None);
    }

    #[test]
    fn quit_action_returns_quit_command() {
        let (mut world, mut scene) = world_and_scene();
        scene.load(&mut world);
        let input = snapshot_from_actions(&[InputAction::Quit]);
        assert_eq!(scene.update(DT, &input, &mut world), SceneCommand::Quit);
    }

    #[test]
    fn held_scroll_key_accumulates_over_ticks() {
        let (mut world, mut scene) = world_and_scene();
        scene.load(&mut world);
        let input = snapshot_from_actions(&[InputAction::ScrollDown]);
        for _ in 0..60 {
            scene.update(DT, &input, &mut world);
        }
        assert!((world.camera().offset.y + 300.0).abs() < 0.01);
        assert_eq!(world.camera().offset.x, 300.0);
    }
}
