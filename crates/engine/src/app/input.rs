use winit::event::{ElementState, KeyEvent, MouseButton};
use winit::keyboard::{KeyCode, PhysicalKey};

use super::scene::{InputSnapshot, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    ScrollUp,
    ScrollDown,
    ScrollLeft,
    ScrollRight,
    Quit,
}

const ACTION_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::ScrollUp => 0,
            InputAction::ScrollDown => 1,
            InputAction::ScrollLeft => 2,
            InputAction::ScrollRight => 3,
            InputAction::Quit => 4,
        }
    }

    pub(crate) fn for_key(key: PhysicalKey) -> Option<Self> {
        let PhysicalKey::Code(code) = key else {
            return None;
        };
        match code {
            KeyCode::ArrowUp | KeyCode::KeyW => Some(InputAction::ScrollUp),
            KeyCode::ArrowDown | KeyCode::KeyS => Some(InputAction::ScrollDown),
            KeyCode::ArrowLeft | KeyCode::KeyA => Some(InputAction::ScrollLeft),
            KeyCode::ArrowRight | KeyCode::KeyD => Some(InputAction::ScrollRight),
            KeyCode::Escape => Some(InputAction::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ClickEdge {
    held: bool,
    pending: bool,
}

impl ClickEdge {
    fn apply(&mut self, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.pending |= !self.held;
                self.held = true;
            }
            ElementState::Released => self.held = false,
        }
    }

    fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

#[derive(Debug, Default)]
pub(crate) struct InputCollector {
    quit_requested: bool,
    actions: ActionStates,
    cursor_position_px: Option<Vec2>,
    left_click: ClickEdge,
    right_click: ClickEdge,
    window_size: (u32, u32),
}

impl InputCollector {
    pub(crate) fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            window_size: (window_width, window_height),
            ..Self::default()
        }
    }

    pub(crate) fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub(crate) fn request_quit(&mut self) {
        self.quit_requested = true;
    }

    pub(crate) fn handle_key_event(&mut self, event: &KeyEvent) {
        self.handle_key(event.physical_key, event.state == ElementState::Pressed);
    }

    fn handle_key(&mut self, key: PhysicalKey, is_pressed: bool) {
        let Some(action) = InputAction::for_key(key) else {
            return;
        };
        self.actions.set(action, is_pressed);
        if action == InputAction::Quit && is_pressed {
            self.request_quit();
        }
    }

    pub(crate) fn handle_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        match button {
            MouseButton::Left => self.left_click.apply(state),
            MouseButton::Right => self.right_click.apply(state),
            _ => {}
        }
    }

    pub(crate) fn set_cursor_position(&mut self, cursor_position_px: Option<Vec2>) {
        self.cursor_position_px = cursor_position_px;
    }

    pub(crate) fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_size = (width, height);
    }

    pub(crate) fn snapshot_for_tick(&mut self) -> InputSnapshot {
        InputSnapshot::new(
            self.quit_requested,
            self.actions,
            self.cursor_position_px,
            self.left_click.take(),
            self.right_click.take(),
            self.window_size.0,
            self.window_size.1,
        )
    }
}
