//! Renderer error types.

use std::fmt;

use thiserror::Error;

use clearframe_rhi::RhiError;

use crate::surface::SurfaceState;

/// The step of a frame iteration an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePhase {
    /// Reading the current surface index
    Acquire,
    /// Waiting for and resetting the frame slot
    Reclaim,
    /// Recording transitions, clear and bind
    Record,
    /// Handing the recording to the queue
    Submit,
    /// Displaying the surface
    Present,
    /// Advancing the completion signal
    Signal,
}

impl fmt::Display for FramePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FramePhase::Acquire => "Acquire",
            FramePhase::Reclaim => "Reclaim",
            FramePhase::Record => "Record",
            FramePhase::Submit => "Submit",
            FramePhase::Present => "Present",
            FramePhase::Signal => "Signal",
        };
        f.write_str(name)
    }
}

/// Errors raised while building or running the frame loop.
#[derive(Error, Debug)]
pub enum RendererError {
    /// A device call failed during one of the frame steps
    #[error("{phase} failed")]
    Frame {
        phase: FramePhase,
        #[source]
        source: RhiError,
    },

    /// A surface was not in the state a transition started from
    #[error("Surface {index} expected in {expected:?} state, found {found:?}")]
    InvalidTransition {
        index: usize,
        expected: SurfaceState,
        found: SurfaceState,
    },

    /// The presentation engine reported an index outside the pool
    #[error("Surface index {index} is out of range")]
    SurfaceOutOfRange { index: usize },

    /// Device, swapchain or frame resource creation failed
    #[error("Initialization failed")]
    Init(#[source] RhiError),

    /// Waiting for outstanding GPU work at shutdown failed
    #[error("Waiting for the GPU to go idle failed")]
    Drain(#[source] RhiError),

    /// Window or config failure
    #[error(transparent)]
    Platform(#[from] clearframe_core::Error),
}

impl RendererError {
    pub(crate) fn frame(phase: FramePhase) -> impl FnOnce(RhiError) -> Self {
        move |source| RendererError::Frame { phase, source }
    }

    /// Returns the raw device status code behind this error, if there is one.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            RendererError::Frame { source, .. }
            | RendererError::Init(source)
            | RendererError::Drain(source) => source.status_code(),
            _ => None,
        }
    }

    /// Returns the frame step that failed, for per-frame errors.
    pub fn phase(&self) -> Option<FramePhase> {
        match self {
            RendererError::Frame { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Result type alias for renderer operations.
pub type RendererResult<T> = std::result::Result<T, RendererError>;

#[cfg(test)]
mod tests {
    use super::*;
    use clearframe_rhi::vk;

    #[test]
    fn test_frame_error_carries_phase_and_status() {
        let err = RendererError::frame(FramePhase::Submit)(RhiError::from(
            vk::Result::ERROR_DEVICE_LOST,
        ));
        assert_eq!(err.phase(), Some(FramePhase::Submit));
        assert_eq!(err.status_code(), Some(-4));
        assert_eq!(err.to_string(), "Submit failed");
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = RendererError::InvalidTransition {
            index: 1,
            expected: SurfaceState::Presentable,
            found: SurfaceState::RenderTarget,
        };
        assert_eq!(
            err.to_string(),
            "Surface 1 expected in Presentable state, found RenderTarget"
        );
        assert_eq!(err.status_code(), None);
        assert_eq!(err.phase(), None);
    }

    #[test]
    fn test_platform_error_is_transparent() {
        let err = RendererError::from(clearframe_core::Error::Window("no display".to_string()));
        assert_eq!(err.to_string(), "Window error: no display");
    }
}
