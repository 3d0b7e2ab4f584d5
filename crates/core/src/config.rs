//! Compiled-in frame loop configuration.
//!
//! The program takes no arguments and reads no files; every knob lives in
//! [`FrameConfig`]. The default is an 800x600 window cleared to a pale green
//! at one present per refresh.

use crate::error::{Error, Result};

/// Settings for the window, the presentation engine and the frame loop.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfig {
    /// Client-area width in pixels.
    pub width: u32,
    /// Client-area height in pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
    /// RGBA clear color, each component in `[0, 1]`.
    pub clear_color: [f32; 4],
    /// Display refreshes per present. 1 waits for vertical sync, 0 does not.
    pub sync_interval: u32,
    /// Enable the Khronos validation layer when it is installed.
    pub enable_validation: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "MainWindow".to_string(),
            clear_color: [0.7, 1.0, 0.7, 1.0],
            sync_interval: 1,
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl FrameConfig {
    /// Checks that the configuration describes something the loop can run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for zero dimensions, a sync interval other
    /// than 0 or 1, or a clear color component outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "window dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }

        if self.sync_interval > 1 {
            return Err(Error::Config(format!(
                "sync interval must be 0 or 1, got {}",
                self.sync_interval
            )));
        }

        if let Some(component) = self
            .clear_color
            .iter()
            .find(|c| !(0.0..=1.0).contains(*c))
        {
            return Err(Error::Config(format!(
                "clear color component {} is outside [0, 1]",
                component
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_reference_setup() {
        let config = FrameConfig::default();
        assert_eq!(config.width, 800);
        assert_eq!(config.height, 600);
        assert_eq!(config.clear_color, [0.7, 1.0, 0.7, 1.0]);
        assert_eq!(config.sync_interval, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let config = FrameConfig {
            height: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_sync_interval_above_one_rejected() {
        let config = FrameConfig {
            sync_interval: 2,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_out_of_range_color_rejected() {
        let config = FrameConfig {
            clear_color: [0.7, 1.5, 0.7, 1.0],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("1.5"));
    }
}
