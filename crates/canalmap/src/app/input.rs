use winit::event::{ElementState, MouseButton, MouseScrollDelta};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::geo::ScreenPoint;
use crate::interaction::{InputEvent, Key};

/// Pixel-precise scroll deltas are divided by this to get wheel steps.
const PIXELS_PER_WHEEL_STEP: f64 = 50.0;

/// Viewer-level commands bound to single keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shortcut {
    PlaceWaterPoint,
    CreateWaterRoute,
    ToggleAnimation,
    Quit,
}

const SHORTCUT_COUNT: usize = 4;

impl Shortcut {
    const fn index(self) -> usize {
        match self {
            Shortcut::PlaceWaterPoint => 0,
            Shortcut::CreateWaterRoute => 1,
            Shortcut::ToggleAnimation => 2,
            Shortcut::Quit => 3,
        }
    }

    fn from_physical_key(key: PhysicalKey) -> Option<Self> {
        match key {
            PhysicalKey::Code(KeyCode::KeyW) => Some(Shortcut::PlaceWaterPoint),
            PhysicalKey::Code(KeyCode::KeyR) => Some(Shortcut::CreateWaterRoute),
            PhysicalKey::Code(KeyCode::KeyF) => Some(Shortcut::ToggleAnimation),
            PhysicalKey::Code(KeyCode::KeyQ) => Some(Shortcut::Quit),
            _ => None,
        }
    }
}

fn controller_key(key: PhysicalKey) -> Option<Key> {
    match key {
        PhysicalKey::Code(KeyCode::ArrowLeft) => Some(Key::ArrowLeft),
        PhysicalKey::Code(KeyCode::ArrowRight) => Some(Key::ArrowRight),
        PhysicalKey::Code(KeyCode::Enter) | PhysicalKey::Code(KeyCode::NumpadEnter) => {
            Some(Key::Enter)
        }
        PhysicalKey::Code(KeyCode::Escape) => Some(Key::Escape),
        _ => None,
    }
}

/// Everything collected since the previous simulation tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    events: Vec<InputEvent>,
    shortcuts: Vec<Shortcut>,
    cursor_position_px: Option<ScreenPoint>,
    right_click_pressed: bool,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    pub fn shortcuts(&self) -> &[Shortcut] {
        &self.shortcuts
    }

    pub fn pressed(&self, shortcut: Shortcut) -> bool {
        self.shortcuts.contains(&shortcut)
    }

    pub fn cursor_position_px(&self) -> Option<ScreenPoint> {
        self.cursor_position_px
    }

    /// Secondary click is left to session hooks; the controller never sees it.
    pub fn right_click_pressed(&self) -> bool {
        self.right_click_pressed
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

/// Translates window events into controller input, holding them until the
/// next tick takes a snapshot. Keys are edge-triggered: holding one down
/// produces a single event until it is released.
#[derive(Debug, Default)]
pub(crate) struct InputCollector {
    events: Vec<InputEvent>,
    shortcuts: Vec<Shortcut>,
    shortcut_is_down: [bool; SHORTCUT_COUNT],
    controller_keys_down: Vec<Key>,
    quit_requested: bool,
    cursor_position_px: Option<ScreenPoint>,
    left_mouse_is_down: bool,
    right_mouse_is_down: bool,
    right_click_pressed_edge: bool,
    window_width: u32,
    window_height: u32,
}

impl InputCollector {
    pub(crate) fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            window_width,
            window_height,
            ..Self::default()
        }
    }

    pub(crate) fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub(crate) fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    pub(crate) fn handle_keyboard_input(&mut self, key_event: &winit::event::KeyEvent) {
        self.handle_physical_key(key_event.physical_key, key_event.state);
    }

    pub(crate) fn handle_physical_key(&mut self, key: PhysicalKey, state: ElementState) {
        if let Some(shortcut) = Shortcut::from_physical_key(key) {
            let is_down = &mut self.shortcut_is_down[shortcut.index()];
            match state {
                ElementState::Pressed => {
                    if !*is_down {
                        self.shortcuts.push(shortcut);
                        if shortcut == Shortcut::Quit {
                            self.quit_requested = true;
                        }
                    }
                    *is_down = true;
                }
                ElementState::Released => *is_down = false,
            }
            return;
        }

        let Some(key) = controller_key(key) else {
            return;
        };
        match state {
            ElementState::Pressed => {
                if !self.controller_keys_down.contains(&key) {
                    self.controller_keys_down.push(key);
                    self.events.push(InputEvent::Key(key));
                }
            }
            ElementState::Released => self.controller_keys_down.retain(|down| *down != key),
        }
    }

    pub(crate) fn set_window_size(&mut self, width: u32, height: u32) {
        if (width, height) == (self.window_width, self.window_height) {
            return;
        }
        self.window_width = width;
        self.window_height = height;
        self.events.push(InputEvent::Resize { width, height });
    }

    pub(crate) fn set_cursor_position_px(&mut self, x: f64, y: f64) {
        let position = ScreenPoint::new(x, y);
        self.cursor_position_px = Some(position);
        self.events.push(InputEvent::PointerMove(position));
    }

    pub(crate) fn clear_cursor_position(&mut self) {
        self.cursor_position_px = None;
    }

    pub(crate) fn handle_mouse_wheel(&mut self, delta: MouseScrollDelta) {
        let steps = zoom_steps_from_scroll_delta(delta);
        if steps != 0.0 {
            self.events.push(InputEvent::Wheel(steps));
        }
    }

    pub(crate) fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState) {
        match button {
            MouseButton::Left => {
                let Some(position) = self.cursor_position_px else {
                    self.left_mouse_is_down = state == ElementState::Pressed;
                    return;
                };
                match state {
                    ElementState::Pressed => {
                        if !self.left_mouse_is_down {
                            self.events.push(InputEvent::PointerDown(position));
                        }
                        self.left_mouse_is_down = true;
                    }
                    ElementState::Released => {
                        if self.left_mouse_is_down {
                            self.events.push(InputEvent::PointerUp(position));
                        }
                        self.left_mouse_is_down = false;
                    }
                }
            }
            MouseButton::Right => match state {
                ElementState::Pressed => {
                    if !self.right_mouse_is_down {
                        self.right_click_pressed_edge = true;
                    }
                    self.right_mouse_is_down = true;
                }
                ElementState::Released => self.right_mouse_is_down = false,
            },
            _ => {}
        }
    }

    pub(crate) fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot {
            events: std::mem::take(&mut self.events),
            shortcuts: std::mem::take(&mut self.shortcuts),
            cursor_position_px: self.cursor_position_px,
            right_click_pressed: self.right_click_pressed_edge,
            window_width: self.window_width,
            window_height: self.window_height,
        };
        self.right_click_pressed_edge = false;
        snapshot
    }
}

fn zoom_steps_from_scroll_delta(delta: MouseScrollDelta) -> f64 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y as f64,
        MouseScrollDelta::PixelDelta(position) => position.y / PIXELS_PER_WHEEL_STEP,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(input: &mut InputCollector, code: KeyCode) {
        input.handle_physical_key(PhysicalKey::Code(code), ElementState::Pressed);
    }

    fn release(input: &mut InputCollector, code: KeyCode) {
        input.handle_physical_key(PhysicalKey::Code(code), ElementState::Released);
    }

    #[test]
    fn shortcut_press_is_edge_triggered_for_single_tick() {
        let mut input = InputCollector::new(1280, 720);
        press(&mut input, KeyCode::KeyW);
        let first = input.snapshot_for_tick();
        let second = input.snapshot_for_tick();

        assert!(first.pressed(Shortcut::PlaceWaterPoint));
        assert!(!second.pressed(Shortcut::PlaceWaterPoint));
    }

    #[test]
    fn held_shortcut_does_not_spam_press_edges() {
        let mut input = InputCollector::new(1280, 720);
        press(&mut input, KeyCode::KeyR);
        press(&mut input, KeyCode::KeyR);
        assert_eq!(input.snapshot_for_tick().shortcuts(), &[Shortcut::CreateWaterRoute]);

        press(&mut input, KeyCode::KeyR);
        assert!(input.snapshot_for_tick().shortcuts().is_empty());

        release(&mut input, KeyCode::KeyR);
        press(&mut input, KeyCode::KeyR);
        assert!(input.snapshot_for_tick().pressed(Shortcut::CreateWaterRoute));
    }

    #[test]
    fn quit_shortcut_marks_quit_requested() {
        let mut input = InputCollector::new(1280, 720);
        assert!(!input.quit_requested());
        press(&mut input, KeyCode::KeyQ);
        assert!(input.quit_requested());
    }

    #[test]
    fn arrow_enter_and_escape_reach_the_controller_once_per_press() {
        let mut input = InputCollector::new(1280, 720);
        press(&mut input, KeyCode::ArrowLeft);
        press(&mut input, KeyCode::ArrowLeft);
        press(&mut input, KeyCode::Enter);
        press(&mut input, KeyCode::Escape);
        press(&mut input, KeyCode::KeyZ);

        assert_eq!(
            input.snapshot_for_tick().events(),
            &[
                InputEvent::Key(Key::ArrowLeft),
                InputEvent::Key(Key::Enter),
                InputEvent::Key(Key::Escape),
            ]
        );
        assert!(!input.quit_requested());
    }

    #[test]
    fn left_button_becomes_pointer_events_at_the_cursor() {
        let mut input = InputCollector::new(1280, 720);
        input.set_cursor_position_px(100.0, 200.0);
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);
        input.set_cursor_position_px(110.0, 200.0);
        input.handle_mouse_input(MouseButton::Left, ElementState::Released);

        assert_eq!(
            input.snapshot_for_tick().events(),
            &[
                InputEvent::PointerMove(ScreenPoint::new(100.0, 200.0)),
                InputEvent::PointerDown(ScreenPoint::new(100.0, 200.0)),
                InputEvent::PointerMove(ScreenPoint::new(110.0, 200.0)),
                InputEvent::PointerUp(ScreenPoint::new(110.0, 200.0)),
            ]
        );
    }

    #[test]
    fn press_without_a_cursor_is_dropped() {
        let mut input = InputCollector::new(1280, 720);
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);
        input.handle_mouse_input(MouseButton::Left, ElementState::Released);
        assert!(input.snapshot_for_tick().events().is_empty());
    }

    #[test]
    fn right_click_is_edge_triggered_for_single_tick() {
        let mut input = InputCollector::new(1280, 720);
        input.set_cursor_position_px(10.0, 20.0);
        input.handle_mouse_input(MouseButton::Right, ElementState::Pressed);
        let first = input.snapshot_for_tick();
        input.handle_mouse_input(MouseButton::Right, ElementState::Pressed);
        let second = input.snapshot_for_tick();

        assert!(first.right_click_pressed());
        assert_eq!(first.cursor_position_px(), Some(ScreenPoint::new(10.0, 20.0)));
        assert!(!second.right_click_pressed());
    }

    #[test]
    fn wheel_deltas_become_fractional_zoom_steps() {
        let mut input = InputCollector::new(1280, 720);
        input.handle_mouse_wheel(MouseScrollDelta::LineDelta(0.0, 1.0));
        input.handle_mouse_wheel(MouseScrollDelta::PixelDelta(
            winit::dpi::PhysicalPosition::new(0.0, -25.0),
        ));
        input.handle_mouse_wheel(MouseScrollDelta::LineDelta(0.0, 0.0));

        assert_eq!(
            input.snapshot_for_tick().events(),
            &[InputEvent::Wheel(1.0), InputEvent::Wheel(-0.5)]
        );
    }

    #[test]
    fn resize_is_reported_only_when_the_size_changes() {
        let mut input = InputCollector::new(1280, 720);
        input.set_window_size(1280, 720);
        input.set_window_size(1024, 768);

        let snapshot = input.snapshot_for_tick();
        assert_eq!(
            snapshot.events(),
            &[InputEvent::Resize {
                width: 1024,
                height: 768
            }]
        );
        assert_eq!(snapshot.window_size(), (1024, 768));
    }
}
