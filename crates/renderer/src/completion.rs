//! Completion signal: a monotonic counter paired with a GPU-updated fence.
//!
//! Every submitted frame advances the counter by one and enqueues a fence
//! update to that value behind the frame's work. Waiting for a value therefore
//! means waiting for every frame up to and including the one that signaled it.

use tracing::{debug, trace};

use clearframe_rhi::RhiResult;

use crate::backend::SignalFence;

/// The counter the scheduler advances once per frame.
#[derive(Debug)]
pub struct CompletionSignal<F> {
    fence: F,
    last_submitted: u64,
}

impl<F: SignalFence> CompletionSignal<F> {
    /// Wraps a fence whose marker starts at 0.
    pub fn new(fence: F) -> Self {
        Self {
            fence,
            last_submitted: 0,
        }
    }

    /// The last value handed to the GPU. 0 before the first frame.
    #[inline]
    pub fn last_submitted(&self) -> u64 {
        self.last_submitted
    }

    /// Increments the counter and enqueues the matching GPU-side signal.
    ///
    /// Returns the new value. The counter only moves once the signal has
    /// been enqueued, so it never names a value the GPU will not reach.
    pub fn advance(&mut self) -> RhiResult<u64> {
        let next = self.last_submitted + 1;
        self.fence.signal(next)?;
        self.last_submitted = next;
        trace!(value = next, "Completion signal enqueued");
        Ok(next)
    }

    /// Blocks until the GPU has reached `value`. A value of 0 returns at once.
    pub fn wait_until(&self, value: u64) -> RhiResult<()> {
        if value == 0 {
            return Ok(());
        }
        debug_assert!(
            value <= self.last_submitted,
            "waiting for value {} that was never signaled (last {})",
            value,
            self.last_submitted
        );

        trace!(value, "Waiting for completion signal");
        self.fence.wait_until(value)
    }

    /// The value the GPU has reached so far.
    pub fn completed_value(&self) -> RhiResult<u64> {
        self.fence.completed_value()
    }

    /// Blocks until every signaled frame has finished on the GPU.
    pub fn drain(&self) -> RhiResult<()> {
        debug!(value = self.last_submitted, "Draining completion signal");
        self.wait_until(self.last_submitted)
    }

    /// The underlying fence.
    #[inline]
    pub fn fence(&self) -> &F {
        &self.fence
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use clearframe_rhi::{RhiError, vk};

    use super::*;

    /// Fence that completes signals as soon as they are enqueued, unless told
    /// to fail.
    #[derive(Default)]
    struct ImmediateFence {
        signaled: RefCell<Vec<u64>>,
        waits: RefCell<Vec<u64>>,
        fail_signal: Cell<bool>,
    }

    impl SignalFence for ImmediateFence {
        fn signal(&self, value: u64) -> RhiResult<()> {
            if self.fail_signal.get() {
                return Err(RhiError::from(vk::Result::ERROR_DEVICE_LOST));
            }
            self.signaled.borrow_mut().push(value);
            Ok(())
        }

        fn wait_until(&self, value: u64) -> RhiResult<()> {
            self.waits.borrow_mut().push(value);
            Ok(())
        }

        fn completed_value(&self) -> RhiResult<u64> {
            Ok(self.signaled.borrow().last().copied().unwrap_or(0))
        }
    }

    #[test]
    fn test_advance_increments_by_one() {
        let mut signal = CompletionSignal::new(ImmediateFence::default());
        assert_eq!(signal.last_submitted(), 0);

        assert_eq!(signal.advance().unwrap(), 1);
        assert_eq!(signal.advance().unwrap(), 2);
        assert_eq!(signal.advance().unwrap(), 3);

        assert_eq!(signal.last_submitted(), 3);
        assert_eq!(*signal.fence().signaled.borrow(), vec![1, 2, 3]);
        assert_eq!(signal.completed_value().unwrap(), 3);
    }

    #[test]
    fn test_failed_signal_leaves_counter_unchanged() {
        let mut signal = CompletionSignal::new(ImmediateFence::default());
        signal.advance().unwrap();
        signal.fence().fail_signal.set(true);

        assert!(signal.advance().is_err());
        assert_eq!(signal.last_submitted(), 1);
    }

    #[test]
    fn test_wait_for_zero_does_not_touch_fence() {
        let signal = CompletionSignal::new(ImmediateFence::default());
        signal.wait_until(0).unwrap();
        signal.drain().unwrap();
        assert!(signal.fence().waits.borrow().is_empty());
    }

    #[test]
    fn test_drain_waits_for_last_submitted() {
        let mut signal = CompletionSignal::new(ImmediateFence::default());
        signal.advance().unwrap();
        signal.advance().unwrap();

        signal.drain().unwrap();
        assert_eq!(*signal.fence().waits.borrow(), vec![2]);
    }
}
