//! Device-side seams of the frame loop.
//!
//! The scheduler only knows about these traits. The Vulkan implementation
//! lives in [`crate::vulkan`]; tests drive the scheduler with recording doubles.

use std::fmt::Debug;

use clearframe_rhi::RhiResult;

use crate::SURFACE_COUNT;
use crate::surface::SurfaceState;

/// Command allocation memory owned by one frame slot.
pub trait CommandArena {
    /// Returns the arena to empty. The GPU must be done with its contents.
    fn reset(&mut self) -> RhiResult<()>;
}

/// GPU-updated marker behind the completion signal.
pub trait SignalFence {
    /// Enqueues a GPU-side update that sets the marker to `value` once all
    /// previously submitted work has finished.
    fn signal(&self, value: u64) -> RhiResult<()>;

    /// Blocks until the marker reaches at least `value`.
    fn wait_until(&self, value: u64) -> RhiResult<()>;

    /// The value the GPU has reached so far.
    fn completed_value(&self) -> RhiResult<u64>;
}

/// Recording, submission and presentation for one window.
pub trait FrameBackend {
    /// Handle to a presentable color image.
    type Surface: Copy + Debug;
    /// Render-target view of a surface.
    type View: Copy + Debug;
    /// Per-slot command allocation memory.
    type Arena: CommandArena;
    /// Completion signal fence.
    type Fence: SignalFence;

    /// Starts recording into the command memory of `arena`.
    fn begin_recording(&mut self, arena: &Self::Arena) -> RhiResult<()>;

    /// Records a usage-state transition of `surface`.
    fn transition(
        &mut self,
        surface: Self::Surface,
        before: SurfaceState,
        after: SurfaceState,
    ) -> RhiResult<()>;

    /// Records a clear of `view` to `color`.
    fn clear(&mut self, view: Self::View, color: [f32; 4]) -> RhiResult<()>;

    /// Binds `view` as the sole render output.
    fn bind_render_target(&mut self, view: Self::View) -> RhiResult<()>;

    /// Finishes the recording.
    fn end_recording(&mut self) -> RhiResult<()>;

    /// Enqueues the finished recording. Does not wait for execution.
    fn submit(&mut self) -> RhiResult<()>;

    /// Displays the current surface and returns the index of the surface
    /// that becomes current.
    fn present(&mut self, sync_interval: u32) -> RhiResult<usize>;
}

/// Everything a backend hands over to the scheduler at startup.
pub struct FrameResources<B: FrameBackend> {
    pub surfaces: [B::Surface; SURFACE_COUNT],
    pub views: [B::View; SURFACE_COUNT],
    pub arenas: [B::Arena; SURFACE_COUNT],
    pub fence: B::Fence,
    /// Surface that is current before the first present.
    pub initial_index: usize,
}
