//! Platform layer for the frame loop.
//!
//! This crate provides platform-specific functionality:
//! - Event loop ownership with a non-blocking quit check
//! - A fixed-size window via winit
//! - Raw window handles for Vulkan surface creation

mod event_pump;
mod window;

pub use event_pump::{EventPump, Platform, is_quit_event};
pub use window::{Window, WindowSurface};
