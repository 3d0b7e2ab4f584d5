//! Rotating presentable surfaces and their usage states.

use tracing::trace;

use crate::SURFACE_COUNT;
use crate::error::{RendererError, RendererResult};

/// Usage state of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceState {
    /// Readable by the display engine
    Presentable,
    /// Writable by render commands
    RenderTarget,
}

/// The N surfaces backing the window, their views, and which one is current.
///
/// View `i` always belongs to surface `i`. The current index only moves
/// through [`advance`](Self::advance), after a successful present.
#[derive(Debug)]
pub struct SurfacePool<S, V> {
    surfaces: [S; SURFACE_COUNT],
    views: [V; SURFACE_COUNT],
    states: [SurfaceState; SURFACE_COUNT],
    current: usize,
}

impl<S: Copy, V: Copy> SurfacePool<S, V> {
    /// Creates a pool with every surface presentable.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::SurfaceOutOfRange`] if `initial_index` is not
    /// a valid surface index.
    pub fn new(
        surfaces: [S; SURFACE_COUNT],
        views: [V; SURFACE_COUNT],
        initial_index: usize,
    ) -> RendererResult<Self> {
        check_index(initial_index)?;
        Ok(Self {
            surfaces,
            views,
            states: [SurfaceState::Presentable; SURFACE_COUNT],
            current: initial_index,
        })
    }

    /// Index of the surface that is next to be displayed.
    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// # Panics
    ///
    /// Panics if `index >= SURFACE_COUNT`.
    #[inline]
    pub fn surface_at(&self, index: usize) -> S {
        self.surfaces[index]
    }

    /// # Panics
    ///
    /// Panics if `index >= SURFACE_COUNT`.
    #[inline]
    pub fn view_at(&self, index: usize) -> V {
        self.views[index]
    }

    /// # Panics
    ///
    /// Panics if `index >= SURFACE_COUNT`.
    #[inline]
    pub fn state_of(&self, index: usize) -> SurfaceState {
        self.states[index]
    }

    /// Moves surface `index` from `before` to `after`.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::InvalidTransition`] if the surface is not
    /// currently in `before`; the tracked state is left unchanged.
    pub fn transition(
        &mut self,
        index: usize,
        before: SurfaceState,
        after: SurfaceState,
    ) -> RendererResult<()> {
        check_index(index)?;
        let found = self.states[index];
        if found != before {
            return Err(RendererError::InvalidTransition {
                index,
                expected: before,
                found,
            });
        }

        trace!(index, ?before, ?after, "Surface transition");
        self.states[index] = after;
        Ok(())
    }

    /// Makes `next` the current surface.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::SurfaceOutOfRange`] for an invalid index.
    pub fn advance(&mut self, next: usize) -> RendererResult<()> {
        check_index(next)?;
        self.current = next;
        Ok(())
    }
}

fn check_index(index: usize) -> RendererResult<()> {
    if index < SURFACE_COUNT {
        Ok(())
    } else {
        Err(RendererError::SurfaceOutOfRange { index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> SurfacePool<u32, &'static str> {
        SurfacePool::new([10, 11], ["view-0", "view-1"], 0).unwrap()
    }

    #[test]
    fn test_new_pool_is_presentable() {
        let pool = pool();
        assert_eq!(pool.current_index(), 0);
        for i in 0..SURFACE_COUNT {
            assert_eq!(pool.state_of(i), SurfaceState::Presentable);
        }
    }

    #[test]
    fn test_view_matches_surface_index() {
        let pool = pool();
        assert_eq!(pool.surface_at(1), 11);
        assert_eq!(pool.view_at(1), "view-1");
    }

    #[test]
    fn test_transition_round_trip() {
        let mut pool = pool();
        pool.transition(1, SurfaceState::Presentable, SurfaceState::RenderTarget)
            .unwrap();
        assert_eq!(pool.state_of(1), SurfaceState::RenderTarget);
        assert_eq!(pool.state_of(0), SurfaceState::Presentable);

        pool.transition(1, SurfaceState::RenderTarget, SurfaceState::Presentable)
            .unwrap();
        assert_eq!(pool.state_of(1), SurfaceState::Presentable);
    }

    #[test]
    fn test_transition_rejects_wrong_before_state() {
        let mut pool = pool();
        let err = pool
            .transition(0, SurfaceState::RenderTarget, SurfaceState::Presentable)
            .unwrap_err();

        assert!(matches!(
            err,
            RendererError::InvalidTransition {
                index: 0,
                expected: SurfaceState::RenderTarget,
                found: SurfaceState::Presentable,
            }
        ));
        assert_eq!(pool.state_of(0), SurfaceState::Presentable);
    }

    #[test]
    fn test_advance_changes_current_index() {
        let mut pool = pool();
        pool.advance(1).unwrap();
        assert_eq!(pool.current_index(), 1);
        pool.advance(0).unwrap();
        assert_eq!(pool.current_index(), 0);
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let mut pool = pool();
        assert!(matches!(
            pool.advance(SURFACE_COUNT),
            Err(RendererError::SurfaceOutOfRange { index: SURFACE_COUNT })
        ));
        assert_eq!(pool.current_index(), 0);

        assert!(SurfacePool::new([1, 2], [3, 4], 5).is_err());
    }
}
