// SPDX-License-Identifier: CEPL-1.0
//! winit-backed window for the renderer.
//!
//! The frame loop wants to poll and block on events itself, so the event loop
//! is pumped instead of handed over to `run_app`.
use std::time::Duration;

use anyhow::{bail, Result};
use easyvk_render::{RenderSize, WindowSystem};
use tracing::{debug, info};

pub use winit;

use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    },
    window::{Fullscreen, Window, WindowId},
};

/// How many pumps we give the platform to deliver `resumed`.
const OPEN_ATTEMPTS: u32 = 100;

#[derive(Clone, Debug)]
pub struct WindowConfig {
    pub title: String,
    pub size: RenderSize,
    pub fullscreen: bool,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "EasyVK".to_owned(),
            size: RenderSize::new(1280, 720),
            fullscreen: false,
            resizable: true,
        }
    }
}

struct ShimState {
    cfg: WindowConfig,
    window: Option<Window>,
    create_error: Option<String>,
    close_requested: bool,
    resized: bool,
    fullscreen_toggled: bool,
}

impl ApplicationHandler for ShimState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let mut attrs = Window::default_attributes()
            .with_title(self.cfg.title.clone())
            .with_resizable(self.cfg.resizable);
        attrs = if self.cfg.fullscreen {
            attrs.with_fullscreen(Some(Fullscreen::Borderless(None)))
        } else {
            attrs.with_inner_size(PhysicalSize::new(self.cfg.size.width, self.cfg.size.height))
        };

        match event_loop.create_window(attrs) {
            Ok(window) => {
                let size = window.inner_size();
                info!(
                    "window created ({}x{}, fullscreen={})",
                    size.width, size.height, self.cfg.fullscreen
                );
                self.window = Some(window);
            }
            Err(e) => self.create_error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.close_requested = true;
            }
            WindowEvent::Resized(new_size) => {
                debug!("Resized → {}x{}", new_size.width, new_size.height);
                self.resized = true;
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && !event.repeat
                    && event.logical_key == Key::Named(NamedKey::F11) =>
            {
                self.fullscreen_toggled = true;
            }
            _ => {}
        }
    }
}

pub struct WinitWindow {
    // Field order matters: the window must go before its event loop.
    state: ShimState,
    event_loop: EventLoop<()>,
}

impl WinitWindow {
    pub fn open(cfg: WindowConfig) -> Result<Self> {
        let event_loop: EventLoop<()> = EventLoop::new()?;
        let mut shim = Self {
            state: ShimState {
                cfg,
                window: None,
                create_error: None,
                close_requested: false,
                resized: false,
                fullscreen_toggled: false,
            },
            event_loop,
        };

        for _ in 0..OPEN_ATTEMPTS {
            shim.pump(Some(Duration::ZERO));
            if let Some(e) = shim.state.create_error.take() {
                bail!("failed to create a window: {e}");
            }
            if shim.state.window.is_some() {
                return Ok(shim);
            }
        }
        bail!("platform never resumed the event loop; no window was created")
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            debug!("event loop exited with {code}");
            self.state.close_requested = true;
        }
    }

    pub fn window(&self) -> Option<&Window> {
        self.state.window.as_ref()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.state
            .window
            .as_ref()
            .is_some_and(|w| w.fullscreen().is_some())
    }

    /// True once per F11 press since the last call.
    pub fn take_fullscreen_toggle(&mut self) -> bool {
        std::mem::take(&mut self.state.fullscreen_toggled)
    }

    pub fn outer_position(&self) -> Option<PhysicalPosition<i32>> {
        self.state
            .window
            .as_ref()
            .and_then(|w| w.outer_position().ok())
    }

    pub fn make_fullscreen(&self) {
        if let Some(w) = &self.state.window {
            w.set_fullscreen(Some(Fullscreen::Borderless(None)));
        }
    }

    pub fn make_windowed(&self, position: PhysicalPosition<i32>, size: RenderSize) {
        if let Some(w) = &self.state.window {
            w.set_fullscreen(None);
            w.set_outer_position(position);
            let _ = w.request_inner_size(PhysicalSize::new(size.width, size.height));
        }
    }
}

impl HasWindowHandle for WinitWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        match &self.state.window {
            Some(w) => w.window_handle(),
            None => Err(HandleError::Unavailable),
        }
    }
}

impl HasDisplayHandle for WinitWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.event_loop.display_handle()
    }
}

impl WindowSystem for WinitWindow {
    fn size(&self) -> RenderSize {
        match &self.state.window {
            Some(w) => {
                let s = w.inner_size();
                RenderSize::new(s.width, s.height)
            }
            None => RenderSize::new(0, 0),
        }
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn is_minimized(&self) -> bool {
        let iconified = self
            .state
            .window
            .as_ref()
            .and_then(|w| w.is_minimized())
            .unwrap_or(false);
        iconified || self.size().is_empty()
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.state.resized)
    }

    fn set_title(&mut self, title: &str) {
        if let Some(w) = &self.state.window {
            w.set_title(title);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_windowed_720p() {
        let cfg = WindowConfig::default();
        assert_eq!(cfg.size, RenderSize::new(1280, 720));
        assert!(!cfg.fullscreen);
        assert!(cfg.resizable);
        assert_eq!(cfg.title, "EasyVK");
    }
}
