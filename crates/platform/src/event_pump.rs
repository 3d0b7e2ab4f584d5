//! Event loop ownership and the per-frame quit check.
//!
//! [`Platform`] drives winit through the pump-events API so the frame loop
//! stays in the caller's hands: each iteration drains whatever events are
//! pending, without blocking, and reports whether the window has been closed.

use std::time::Duration;

use tracing::{debug, info, warn};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::WindowId;

use clearframe_core::{Error, Result};

use crate::window::Window;

/// Number of zero-timeout pumps to wait for the initial `Resumed` event.
const STARTUP_PUMP_LIMIT: usize = 64;

/// Source of the external quit condition for a frame loop.
pub trait EventPump {
    /// Drains pending window messages. Returns `true` once the loop should stop.
    fn poll_and_dispatch(&mut self) -> bool;
}

/// Returns true for events that end the frame loop.
pub fn is_quit_event(event: &WindowEvent) -> bool {
    matches!(event, WindowEvent::CloseRequested | WindowEvent::Destroyed)
}

/// Handler state shared with winit during a pump.
struct PumpState {
    width: u32,
    height: u32,
    title: String,
    window: Option<Window>,
    created: bool,
    quit: bool,
    error: Option<Error>,
}

impl ApplicationHandler for PumpState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.created {
            return;
        }
        self.created = true;

        match Window::new(event_loop, self.width, self.height, &self.title) {
            Ok(window) => self.window = Some(window),
            Err(e) => {
                self.error = Some(e);
                self.quit = true;
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if is_quit_event(&event) {
            info!("Window closed, requesting quit");
            self.quit = true;
            event_loop.exit();
        }
    }
}

/// Owns the winit event loop and the single application window.
pub struct Platform {
    // Dropped before the event loop.
    window: Window,
    state: PumpState,
    event_loop: EventLoop<()>,
}

impl Platform {
    /// Creates the event loop and a non-resizable window.
    ///
    /// # Errors
    ///
    /// Returns `Error::Window` if the event loop or the window cannot be created.
    pub fn new(width: u32, height: u32, title: &str) -> Result<Self> {
        let mut event_loop = EventLoop::new().map_err(|e| Error::Window(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut state = PumpState {
            width,
            height,
            title: title.to_string(),
            window: None,
            created: false,
            quit: false,
            error: None,
        };

        for _ in 0..STARTUP_PUMP_LIMIT {
            let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut state);

            if let Some(e) = state.error.take() {
                return Err(e);
            }
            if let Some(window) = state.window.take() {
                debug!("Platform ready");
                return Ok(Self {
                    window,
                    state,
                    event_loop,
                });
            }
            if let PumpStatus::Exit(code) = status {
                return Err(Error::Window(format!(
                    "Event loop exited with code {} before the window was created",
                    code
                )));
            }
        }

        Err(Error::Window(
            "Event loop never resumed; no window was created".to_string(),
        ))
    }

    /// The application window.
    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl EventPump for Platform {
    fn poll_and_dispatch(&mut self) -> bool {
        if self.state.quit {
            return true;
        }

        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state);

        if let PumpStatus::Exit(code) = status {
            if code != 0 {
                warn!("Event loop exited with code {}", code);
            }
            self.state.quit = true;
        }

        self.state.quit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_requested_is_quit() {
        assert!(is_quit_event(&WindowEvent::CloseRequested));
        assert!(is_quit_event(&WindowEvent::Destroyed));
    }

    #[test]
    fn test_other_events_are_not_quit() {
        assert!(!is_quit_event(&WindowEvent::Focused(true)));
        assert!(!is_quit_event(&WindowEvent::RedrawRequested));
    }
}
