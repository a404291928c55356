use std::fmt;
use std::sync::Arc;

use scene::{InputSurface, PointerHandler, PointerHandlerId, ScreenPos};

/// Movement beyond this between press and release makes the gesture a drag.
pub const DRAG_THRESHOLD_PX: f64 = 4.0;

/// A pointer handler registered on a surface for as long as the binding lives.
///
/// Detaching is idempotent and dropping detaches; once it returns the
/// handler is never called again.
pub struct PointerBinding {
    surface: Arc<dyn InputSurface>,
    id: Option<PointerHandlerId>,
}

impl PointerBinding {
    pub fn attach(surface: Arc<dyn InputSurface>, handler: PointerHandler) -> Self {
        let id = surface.add_pointer_handler(handler);
        Self {
            surface,
            id: Some(id),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.id.is_some()
    }

    pub fn detach(&mut self) {
        if let Some(id) = self.id.take() {
            self.surface.remove_pointer_handler(id);
        }
    }
}

impl Drop for PointerBinding {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for PointerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerBinding").field("id", &self.id).finish()
    }
}

/// Tells clicks apart from the tail of a drag.
///
/// Surfaces report a click after every press/release pair, including one
/// where the pointer travelled (a camera pan or a marker drag).
#[derive(Debug, Default, Clone, Copy)]
pub struct GestureTracker {
    pressed_at: Option<ScreenPos>,
    dragged: bool,
}

impl GestureTracker {
    pub fn press(&mut self, at: ScreenPos) {
        self.pressed_at = Some(at);
        self.dragged = false;
    }

    /// Returns `true` once the pointer has left the press tolerance.
    pub fn moved(&mut self, to: ScreenPos) -> bool {
        if let Some(start) = self.pressed_at
            && start.distance(to) > DRAG_THRESHOLD_PX
        {
            self.dragged = true;
        }
        self.dragged
    }

    pub fn release(&mut self) {
        self.pressed_at = None;
    }

    /// Whether a click arriving now is a genuine click.
    pub fn is_click(&self) -> bool {
        !self.dragged
    }

    /// Forgets the last gesture after its click has been seen.
    pub fn consume_click(&mut self) -> bool {
        let click = self.is_click();
        self.dragged = false;
        click
    }
}

#[cfg(test)]
mod tests {
    use super::{GestureTracker, PointerBinding};
    use scene::{InputSurface, PointerEvent, PointerKind, RecordingSurface, ScreenPos};
    use std::sync::Arc;

    #[test]
    fn small_jitter_is_still_a_click() {
        let mut g = GestureTracker::default();
        g.press(ScreenPos::new(100.0, 100.0));
        assert!(!g.moved(ScreenPos::new(102.0, 101.0)));
        g.release();
        assert!(g.consume_click());
    }

    #[test]
    fn click_after_drag_is_suppressed_once() {
        let mut g = GestureTracker::default();
        g.press(ScreenPos::new(0.0, 0.0));
        assert!(g.moved(ScreenPos::new(30.0, 0.0)));
        g.release();
        assert!(!g.consume_click());
        assert!(g.consume_click());
    }

    #[test]
    fn dropping_binding_unregisters() {
        let surface = Arc::new(RecordingSurface::new());
        let input: Arc<dyn InputSurface> = surface.clone();
        let mut binding = PointerBinding::attach(input, Arc::new(|_: &PointerEvent| {}));
        assert_eq!(surface.pointer_handler_count(), 1);
        binding.detach();
        binding.detach();
        assert!(!binding.is_attached());
        assert_eq!(surface.pointer_handler_count(), 0);
        drop(binding);
        assert_eq!(
            surface.emit(PointerEvent::primary(PointerKind::Click, 0.0, 0.0)),
            0
        );
    }
}
