// SPDX-License-Identifier: CEPL-1.0
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// What the renderer needs from the OS window.
///
/// Surface creation goes through the raw handles; everything else is
/// event plumbing for the frame loop.
pub trait WindowSystem: HasWindowHandle + HasDisplayHandle {
    /// Current drawable size in pixels.
    fn size(&self) -> RenderSize;

    fn should_close(&self) -> bool;

    /// Iconified, or shrunk to a zero-sized drawable.
    fn is_minimized(&self) -> bool;

    /// Block until at least one event arrives.
    fn wait_events(&mut self);

    /// Drain pending events without blocking.
    fn poll_events(&mut self);

    /// Returns true once per resize since the last call.
    fn take_resized(&mut self) -> bool;

    fn set_title(&mut self, title: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_is_empty() {
        assert!(RenderSize::new(0, 720).is_empty());
        assert!(RenderSize::new(1280, 0).is_empty());
        assert!(!RenderSize::new(1280, 720).is_empty());
    }
}
