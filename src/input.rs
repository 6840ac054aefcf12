//! Input events routed to the engine
//!
//! Window systems translate their own events into [`InputEvent`]s. The
//! engine only looks at pointer motion and key presses; everything else stays
//! with the caller.

use bitflags::bitflags;
use glam::Vec2;

use crate::scene::NodeId;

bitflags! {
    /// Pointer buttons held during an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PointerButtons: u32 {
        /// Primary (usually left) button.
        const PRIMARY = 1 << 0;
        /// Secondary (usually right) button.
        const SECONDARY = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

bitflags! {
    /// Keyboard modifiers active during an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const META = 1 << 3;
    }
}

/// What happened
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEventKind {
    /// Pointer moved to window coordinates `(x, y)`, y growing downwards
    Motion { x: f32, y: f32 },
    /// Key with a platform key code went down or up
    Key { code: u32, pressed: bool },
}

/// An input event delivered through a camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputEvent {
    pub kind: InputEventKind,
    pub buttons: PointerButtons,
    pub modifiers: Modifiers,
    /// Camera entity whose view the event happened in
    pub camera: NodeId,
}

impl InputEvent {
    pub fn motion(camera: NodeId, x: f32, y: f32) -> Self {
        Self {
            kind: InputEventKind::Motion { x, y },
            buttons: PointerButtons::empty(),
            modifiers: Modifiers::empty(),
            camera,
        }
    }

    pub fn key(camera: NodeId, code: u32, pressed: bool) -> Self {
        Self {
            kind: InputEventKind::Key { code, pressed },
            buttons: PointerButtons::empty(),
            modifiers: Modifiers::empty(),
            camera,
        }
    }

    pub fn with_buttons(mut self, buttons: PointerButtons) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Pointer position of motion events
    pub fn position(&self) -> Option<Vec2> {
        match self.kind {
            InputEventKind::Motion { x, y } => Some(Vec2::new(x, y)),
            InputEventKind::Key { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneGraph;

    #[test]
    fn test_motion_event() {
        let camera = SceneGraph::new().add_group();
        let event = InputEvent::motion(camera, 3.0, 4.0)
            .with_buttons(PointerButtons::PRIMARY | PointerButtons::MIDDLE)
            .with_modifiers(Modifiers::SHIFT);
        assert_eq!(event.position(), Some(Vec2::new(3.0, 4.0)));
        assert!(event.buttons.contains(PointerButtons::PRIMARY));
        assert!(!event.buttons.contains(PointerButtons::SECONDARY));
        assert_eq!(event.modifiers, Modifiers::SHIFT);
    }

    #[test]
    fn test_key_event_has_no_position() {
        let camera = SceneGraph::new().add_group();
        let event = InputEvent::key(camera, 32, true);
        assert_eq!(event.position(), None);
        assert!(event.buttons.is_empty());
    }
}
