//! Per-frame recording contexts.
//!
//! Slot `i` is used whenever surface `i` is current, so with N surfaces a
//! slot comes back every N frames. Before it is reset the slot waits for the
//! completion value its previous frame signaled.

use tracing::trace;

use clearframe_rhi::RhiResult;

use crate::SURFACE_COUNT;
use crate::backend::{CommandArena, SignalFence};
use crate::completion::CompletionSignal;

/// One recording context and the signal value that covers its last frame.
#[derive(Debug)]
pub struct FrameSlot<A> {
    arena: A,
    last_signal: u64,
}

impl<A> FrameSlot<A> {
    #[inline]
    pub fn arena(&self) -> &A {
        &self.arena
    }

    /// Completion value signaled after this slot's last frame. 0 if unused.
    #[inline]
    pub fn last_signal(&self) -> u64 {
        self.last_signal
    }
}

/// Fixed pool of [`SURFACE_COUNT`] frame slots.
#[derive(Debug)]
pub struct FrameSlotPool<A> {
    slots: [FrameSlot<A>; SURFACE_COUNT],
}

impl<A: CommandArena> FrameSlotPool<A> {
    pub fn new(arenas: [A; SURFACE_COUNT]) -> Self {
        Self {
            slots: arenas.map(|arena| FrameSlot {
                arena,
                last_signal: 0,
            }),
        }
    }

    /// # Panics
    ///
    /// Panics if `index >= SURFACE_COUNT`.
    #[inline]
    pub fn slot_at(&self, index: usize) -> &FrameSlot<A> {
        &self.slots[index]
    }

    /// Waits until the GPU has retired the slot's previous frame, then
    /// empties its arena.
    ///
    /// Returns the completion value that was waited for.
    pub fn reset<F: SignalFence>(
        &mut self,
        index: usize,
        signal: &CompletionSignal<F>,
    ) -> RhiResult<u64> {
        let slot = &mut self.slots[index];
        let awaited = slot.last_signal;

        signal.wait_until(awaited)?;
        slot.arena.reset()?;

        trace!(slot = index, awaited, "Frame slot reset");
        Ok(awaited)
    }

    /// Records that the slot's latest frame is covered by `value`.
    pub fn mark_submitted(&mut self, index: usize, value: u64) {
        self.slots[index].last_signal = value;
    }
}
