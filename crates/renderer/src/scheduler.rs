//! The per-frame state machine.
//!
//! Each iteration runs, strictly in order:
//!
//! ```text
//! 1. Acquire  - read the current surface index
//! 2. Reclaim  - wait for the slot's previous frame, reset its arena
//! 3. Record   - Presentable -> RenderTarget, clear, bind,
//!               RenderTarget -> Presentable, end
//! 4. Submit   - enqueue the recording
//! 5. Present  - display the surface, pick up the next index
//! 6. Signal   - advance the completion signal behind the frame
//! ```
//!
//! [`FrameScheduler::run`] repeats this until the event pump reports a quit.
//! Any failure stops the loop; there is no per-frame retry.

use tracing::{debug, error, info, trace};

use clearframe_core::FrameConfig;
use clearframe_platform::EventPump;

use crate::backend::{FrameBackend, FrameResources};
use crate::completion::CompletionSignal;
use crate::error::{FramePhase, RendererError, RendererResult};
use crate::frame_slot::FrameSlotPool;
use crate::surface::{SurfacePool, SurfaceState};

/// What one iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Surface (and slot) used by the frame.
    pub surface_index: usize,
    /// Completion value signaled behind the frame.
    pub signal_value: u64,
    /// Completion value waited for before the slot was reset.
    pub awaited_value: u64,
}

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub frames_presented: u64,
    pub final_signal: u64,
}

/// Drives the double-buffered clear-and-present loop.
pub struct FrameScheduler<B: FrameBackend> {
    surfaces: SurfacePool<B::Surface, B::View>,
    slots: FrameSlotPool<B::Arena>,
    signal: CompletionSignal<B::Fence>,
    clear_color: [f32; 4],
    sync_interval: u32,
    frames_presented: u64,
    // Declared last so pools and fence are released before the device
    // they were created from.
    backend: B,
}

impl<B: FrameBackend> FrameScheduler<B> {
    /// Creates a scheduler over the resources a backend handed out.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::SurfaceOutOfRange`] if the initial surface
    /// index is invalid.
    pub fn new(
        backend: B,
        resources: FrameResources<B>,
        config: &FrameConfig,
    ) -> RendererResult<Self> {
        let FrameResources {
            surfaces,
            views,
            arenas,
            fence,
            initial_index,
        } = resources;

        let surfaces = SurfacePool::new(surfaces, views, initial_index)?;

        debug!(
            initial_index,
            sync_interval = config.sync_interval,
            "Frame scheduler created"
        );

        Ok(Self {
            surfaces,
            slots: FrameSlotPool::new(arenas),
            signal: CompletionSignal::new(fence),
            clear_color: config.clear_color,
            sync_interval: config.sync_interval,
            frames_presented: 0,
            backend,
        })
    }

    /// Runs one iteration of the frame state machine.
    ///
    /// # Errors
    ///
    /// Device failures are returned as [`RendererError::Frame`] tagged with
    /// the failing step. The scheduler must not be used for further frames
    /// after an error.
    pub fn run_frame(&mut self) -> RendererResult<FrameReport> {
        // 1. Acquire
        let index = self.surfaces.current_index();
        trace!(phase = %FramePhase::Acquire, index);

        // 2. Reclaim
        trace!(phase = %FramePhase::Reclaim, index);
        let awaited_value = self
            .slots
            .reset(index, &self.signal)
            .map_err(RendererError::frame(FramePhase::Reclaim))?;

        // 3. Record
        trace!(phase = %FramePhase::Record, index);
        self.record(index)?;

        // 4. Submit
        trace!(phase = %FramePhase::Submit, index);
        self.backend
            .submit()
            .map_err(RendererError::frame(FramePhase::Submit))?;

        // 5. Present
        trace!(phase = %FramePhase::Present, index);
        let found = self.surfaces.state_of(index);
        if found != SurfaceState::Presentable {
            return Err(RendererError::InvalidTransition {
                index,
                expected: SurfaceState::Presentable,
                found,
            });
        }
        let next = self
            .backend
            .present(self.sync_interval)
            .map_err(RendererError::frame(FramePhase::Present))?;
        self.surfaces.advance(next)?;
        self.frames_presented += 1;

        // 6. Signal
        trace!(phase = %FramePhase::Signal, index);
        let signal_value = self
            .signal
            .advance()
            .map_err(RendererError::frame(FramePhase::Signal))?;
        self.slots.mark_submitted(index, signal_value);

        Ok(FrameReport {
            surface_index: index,
            signal_value,
            awaited_value,
        })
    }

    fn record(&mut self, index: usize) -> RendererResult<()> {
        let surface = self.surfaces.surface_at(index);
        let view = self.surfaces.view_at(index);
        let arena = self.slots.slot_at(index).arena();
        let backend = &mut self.backend;

        backend
            .begin_recording(arena)
            .map_err(RendererError::frame(FramePhase::Record))?;

        self.surfaces.transition(
            index,
            SurfaceState::Presentable,
            SurfaceState::RenderTarget,
        )?;
        backend
            .transition(surface, SurfaceState::Presentable, SurfaceState::RenderTarget)
            .map_err(RendererError::frame(FramePhase::Record))?;

        backend
            .clear(view, self.clear_color)
            .map_err(RendererError::frame(FramePhase::Record))?;
        backend
            .bind_render_target(view)
            .map_err(RendererError::frame(FramePhase::Record))?;

        self.surfaces.transition(
            index,
            SurfaceState::RenderTarget,
            SurfaceState::Presentable,
        )?;
        backend
            .transition(surface, SurfaceState::RenderTarget, SurfaceState::Presentable)
            .map_err(RendererError::frame(FramePhase::Record))?;

        backend
            .end_recording()
            .map_err(RendererError::frame(FramePhase::Record))
    }

    /// Runs frames until `pump` reports a quit, then drains the GPU.
    ///
    /// The pump is polled once before every frame, so a quit that is already
    /// pending produces no frames at all.
    ///
    /// # Errors
    ///
    /// Returns the first frame error. The GPU is drained on that path too;
    /// a drain failure there is logged and the frame error is returned.
    pub fn run(&mut self, pump: &mut impl EventPump) -> RendererResult<RunSummary> {
        info!("Entering frame loop");

        loop {
            if pump.poll_and_dispatch() {
                debug!("Quit requested");
                break;
            }

            if let Err(e) = self.run_frame() {
                error!(
                    frames_presented = self.frames_presented,
                    "Frame loop aborted: {}", e
                );
                if let Err(drain_err) = self.shutdown() {
                    error!("Drain after failure also failed: {}", drain_err);
                }
                return Err(e);
            }
        }

        self.shutdown()?;
        Ok(self.summary())
    }

    /// Blocks until every submitted frame has finished on the GPU.
    pub fn shutdown(&mut self) -> RendererResult<()> {
        self.signal.drain().map_err(RendererError::Drain)?;
        debug!(
            final_signal = self.signal.last_submitted(),
            "GPU work drained"
        );
        Ok(())
    }

    /// Frames presented and the final completion value so far.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            frames_presented: self.frames_presented,
            final_signal: self.signal.last_submitted(),
        }
    }

    #[inline]
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    #[inline]
    pub fn surfaces(&self) -> &SurfacePool<B::Surface, B::View> {
        &self.surfaces
    }

    #[inline]
    pub fn slots(&self) -> &FrameSlotPool<B::Arena> {
        &self.slots
    }

    #[inline]
    pub fn signal(&self) -> &CompletionSignal<B::Fence> {
        &self.signal
    }
}
