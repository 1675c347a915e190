use tracing::info;

use super::shared::SharedCell;
use super::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Interact,
    Quit,
}

const ACTION_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, Default)]
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

    /// Screen-space direction of the held movement keys, length 0 or 1.
    pub(crate) fn intent_vector(&self) -> Vec2 {
        let axis = |negative: InputAction, positive: InputAction| -> f32 {
            match (self.is_down(negative), self.is_down(positive)) {
                (true, false) => -1.0,
                (false, true) => 1.0,
                _ => 0.0,
            }
        };
        let raw = Vec2::new(
            axis(InputAction::MoveLeft, InputAction::MoveRight),
            axis(InputAction::MoveUp, InputAction::MoveDown),
        );
        raw.clamp_length(1.0)
    }

    pub(crate) fn clear(&mut self) {
        self.down = [false; ACTION_COUNT];
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Interact => 4,
            InputAction::Quit => 5,
        }
    }
}

/// Host-facing joystick hook. Values are clamped to the unit disc.
#[derive(Clone, Debug)]
pub struct JoystickHandle {
    vector: SharedCell<Vec2>,
}

impl Default for JoystickHandle {
    fn default() -> Self {
        Self {
            vector: SharedCell::new("joystick", Vec2::ZERO),
        }
    }
}

impl JoystickHandle {
    pub fn set(&self, vector: Vec2) {
        let vector = if vector.x.is_finite() && vector.y.is_finite() {
            vector.clamp_length(1.0)
        } else {
            Vec2::ZERO
        };
        self.vector.set(vector);
    }

    pub fn release(&self) {
        self.vector.set(Vec2::ZERO);
    }

    pub fn get(&self) -> Vec2 {
        self.vector.get()
    }
}

pub const JOYSTICK_SIZE_PX: f32 = 100.0;
const JOYSTICK_MARGIN_PX: f32 = 32.0;

/// On-screen analog stick anchored to the bottom-right corner.
///
/// The stick travels at most `radius - knob_radius` from the centre; the
/// published vector is that offset divided by the travel distance.
#[derive(Debug, Clone)]
pub struct VirtualJoystick {
    handle: JoystickHandle,
    center: Vec2,
    radius: f32,
    knob_radius: f32,
    knob_offset: Vec2,
    active_pointer: Option<u64>,
}

impl VirtualJoystick {
    pub fn new(handle: JoystickHandle, size_px: f32, viewport: (u32, u32)) -> Self {
        let size_px = if size_px.is_finite() && size_px > 0.0 {
            size_px
        } else {
            JOYSTICK_SIZE_PX
        };
        let mut joystick = Self {
            handle,
            center: Vec2::ZERO,
            radius: size_px * 0.5,
            knob_radius: size_px * 0.25,
            knob_offset: Vec2::ZERO,
            active_pointer: None,
        };
        joystick.layout(viewport.0, viewport.1);
        joystick
    }

    pub fn layout(&mut self, width: u32, height: u32) {
        self.center = Vec2::new(
            width as f32 - JOYSTICK_MARGIN_PX - self.radius,
            height as f32 - JOYSTICK_MARGIN_PX - self.radius,
        );
    }

    pub fn contains(&self, point: Vec2) -> bool {
        (point - self.center).length() <= self.radius
    }

    /// Captures `pointer` when the press lands on the base.
    pub fn press(&mut self, pointer: u64, point: Vec2) -> bool {
        if self.active_pointer.is_some() || !self.contains(point) {
            return false;
        }
        self.active_pointer = Some(pointer);
        self.drag_to(pointer, point);
        true
    }

    pub fn drag_to(&mut self, pointer: u64, point: Vec2) -> bool {
        if self.active_pointer != Some(pointer) {
            return false;
        }
        let travel = self.max_travel();
        self.knob_offset = (point - self.center).clamp_length(travel);
        self.handle.set(self.knob_offset * (1.0 / travel));
        true
    }

    pub fn release(&mut self, pointer: u64) -> bool {
        if self.active_pointer != Some(pointer) {
            return false;
        }
        self.active_pointer = None;
        self.knob_offset = Vec2::ZERO;
        self.handle.release();
        true
    }

    /// Drops whichever pointer holds the stick.
    pub fn cancel(&mut self) {
        if let Some(pointer) = self.active_pointer {
            self.release(pointer);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active_pointer.is_some()
    }

    pub fn handle(&self) -> &JoystickHandle {
        &self.handle
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn knob_radius(&self) -> f32 {
        self.knob_radius
    }

    pub fn knob_position(&self) -> Vec2 {
        self.center + self.knob_offset
    }

    fn max_travel(&self) -> f32 {
        (self.radius - self.knob_radius).max(f32::EPSILON)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    Keyboard,
    PointerDrag,
    PointerWheel,
    TouchJoystick,
}

impl ListenerKind {
    pub const ALL: [ListenerKind; 4] = [
        ListenerKind::Keyboard,
        ListenerKind::PointerDrag,
        ListenerKind::PointerWheel,
        ListenerKind::TouchJoystick,
    ];

    fn name(self) -> &'static str {
        match self {
            ListenerKind::Keyboard => "keyboard",
            ListenerKind::PointerDrag => "pointer_drag",
            ListenerKind::PointerWheel => "pointer_wheel",
            ListenerKind::TouchJoystick => "touch_joystick",
        }
    }
}

/// Owns which input listeners are live. Events for a listener that is not
/// registered are dropped by the runtime.
#[derive(Debug, Default)]
pub struct InputPort {
    registered: Vec<ListenerKind>,
}

impl InputPort {
    pub fn start(&mut self) {
        if !self.registered.is_empty() {
            return;
        }
        for kind in ListenerKind::ALL {
            self.registered.push(kind);
            info!(listener = kind.name(), "input_listener_registered");
        }
    }

    /// Unregisters everything, newest first, and returns the removal order.
    pub fn stop(&mut self) -> Vec<ListenerKind> {
        let mut removed = Vec::with_capacity(self.registered.len());
        while let Some(kind) = self.registered.pop() {
            info!(listener = kind.name(), "input_listener_unregistered");
            removed.push(kind);
        }
        removed
    }

    pub fn accepts(&self, kind: ListenerKind) -> bool {
        self.registered.contains(&kind)
    }

    pub fn is_running(&self) -> bool {
        !self.registered.is_empty()
    }
}
