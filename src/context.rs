use std::sync::Arc;

use winit::window::{CursorGrabMode, Window};

use crate::camera::{CameraPose, NavigationConfig, NavigationController, Projection};

/// Everything the event loop needs per window: the window itself and the viewer driving it.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub controller: NavigationController,
    pub projection: Projection,
}

impl Context {
    pub fn new(window: Arc<Window>, pose: CameraPose, config: NavigationConfig) -> Self {
        let size = window.inner_size();
        let projection = Projection::new(size.width, size.height, cgmath::Deg(45.0), 0.1, 500.0);
        Self {
            window,
            controller: NavigationController::new(pose, config),
            projection,
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.projection.resize(width, height);
        }
    }

    /// Grabs the pointer for mouse look. Browsers and macOS only know `Locked` or `Confined`
    /// respectively, so the other one is tried when the first fails.
    pub fn lock_pointer(&mut self) {
        let grabbed = self
            .window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));
        match grabbed {
            Ok(()) => {
                self.window.set_cursor_visible(false);
                self.controller.set_pointer_locked(true);
            }
            Err(e) => {
                log::warn!("Pointer lock is not available: {}", e);
                self.controller.set_pointer_locked(false);
            }
        }
    }

    pub fn release_pointer(&mut self) {
        if let Err(e) = self.window.set_cursor_grab(CursorGrabMode::None) {
            log::warn!("Could not release the pointer: {}", e);
        }
        self.window.set_cursor_visible(true);
        self.controller.set_pointer_locked(false);
    }
}
