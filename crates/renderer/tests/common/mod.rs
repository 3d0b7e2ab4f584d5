//! Recording frame backend with a simulated, lagging GPU.
//!
//! The GPU completes a signal only once more than `lag` newer signals are
//! queued behind it, or when the host waits for it. Every backend call is
//! appended to a command log, and any call kind can be made to fail on its
//! n-th invocation.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use clearframe_core::FrameConfig;
use clearframe_platform::EventPump;
use clearframe_renderer::{
    CommandArena, FrameBackend, FrameResources, FrameScheduler, SURFACE_COUNT, SignalFence,
    SurfaceState,
};
use clearframe_rhi::{RhiError, RhiResult, vk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestSurface(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestView(pub usize);

/// One entry in the GPU command log.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginRecording {
        slot: usize,
    },
    Transition {
        surface: usize,
        before: SurfaceState,
        after: SurfaceState,
    },
    Clear {
        view: usize,
        color: [f32; 4],
    },
    BindRenderTarget {
        view: usize,
    },
    EndRecording,
    Submit {
        slot: usize,
    },
    Present {
        surface: usize,
        sync_interval: u32,
    },
    Signal {
        value: u64,
    },
    Wait {
        value: u64,
        completed_before: u64,
    },
    Reset {
        slot: usize,
        completed: u64,
        required: u64,
    },
}

/// Backend entry points that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Record,
    Submit,
    Present,
    Signal,
    Wait,
    Reset,
}

/// Shared state of the simulated device.
pub struct Gpu {
    pub log: Vec<Command>,
    pub completed: u64,
    lag: usize,
    pending: VecDeque<u64>,
    signals_enqueued: u64,
    current: usize,
    recording_slot: Option<usize>,
    submitted_slot: Option<usize>,
    /// Signal value that covers each slot's latest submission.
    slot_required: [u64; SURFACE_COUNT],
    calls: HashMap<Call, usize>,
    fail_at: Option<(Call, usize)>,
}

impl Gpu {
    fn new(lag: usize) -> Self {
        Self {
            log: Vec::new(),
            completed: 0,
            lag,
            pending: VecDeque::new(),
            signals_enqueued: 0,
            current: 0,
            recording_slot: None,
            submitted_slot: None,
            slot_required: [0; SURFACE_COUNT],
            calls: HashMap::new(),
            fail_at: None,
        }
    }

    /// Makes the `nth` (1-based) call of `call` fail with `ERROR_DEVICE_LOST`.
    pub fn fail_at(&mut self, call: Call, nth: usize) {
        self.fail_at = Some((call, nth));
    }

    fn check(&mut self, call: Call) -> RhiResult<()> {
        let count = self.calls.entry(call).or_insert(0);
        *count += 1;
        if self.fail_at == Some((call, *count)) {
            return Err(RhiError::from(vk::Result::ERROR_DEVICE_LOST));
        }
        Ok(())
    }

    fn retire_until(&mut self, value: u64) {
        while self.completed < value {
            match self.pending.pop_front() {
                Some(next) => self.completed = next,
                None => break,
            }
        }
    }

    pub fn presents(&self) -> Vec<usize> {
        self.log
            .iter()
            .filter_map(|c| match c {
                Command::Present { surface, .. } => Some(*surface),
                _ => None,
            })
            .collect()
    }

    pub fn signals(&self) -> Vec<u64> {
        self.log
            .iter()
            .filter_map(|c| match c {
                Command::Signal { value } => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.log.iter().filter(|c| pred(*c)).count()
    }
}

pub type SharedGpu = Rc<RefCell<Gpu>>;

pub struct TestArena {
    slot: usize,
    gpu: SharedGpu,
}

impl CommandArena for TestArena {
    fn reset(&mut self) -> RhiResult<()> {
        let mut gpu = self.gpu.borrow_mut();
        gpu.check(Call::Reset)?;
        let entry = Command::Reset {
            slot: self.slot,
            completed: gpu.completed,
            required: gpu.slot_required[self.slot],
        };
        gpu.log.push(entry);
        Ok(())
    }
}

pub struct TestFence {
    gpu: SharedGpu,
}

impl SignalFence for TestFence {
    fn signal(&self, value: u64) -> RhiResult<()> {
        let mut gpu = self.gpu.borrow_mut();
        gpu.check(Call::Signal)?;
        gpu.log.push(Command::Signal { value });

        gpu.signals_enqueued = value;
        gpu.pending.push_back(value);
        while gpu.pending.len() > gpu.lag {
            if let Some(done) = gpu.pending.pop_front() {
                gpu.completed = done;
            }
        }
        Ok(())
    }

    fn wait_until(&self, value: u64) -> RhiResult<()> {
        let mut gpu = self.gpu.borrow_mut();
        gpu.check(Call::Wait)?;
        let completed_before = gpu.completed;
        gpu.log.push(Command::Wait {
            value,
            completed_before,
        });

        gpu.retire_until(value);
        if gpu.completed < value {
            return Err(RhiError::from(vk::Result::TIMEOUT));
        }
        Ok(())
    }

    fn completed_value(&self) -> RhiResult<u64> {
        Ok(self.gpu.borrow().completed)
    }
}

pub struct TestBackend {
    gpu: SharedGpu,
}

impl TestBackend {
    fn record(&self, command: Command) -> RhiResult<()> {
        let mut gpu = self.gpu.borrow_mut();
        gpu.check(Call::Record)?;
        gpu.log.push(command);
        Ok(())
    }
}

impl FrameBackend for TestBackend {
    type Surface = TestSurface;
    type View = TestView;
    type Arena = TestArena;
    type Fence = TestFence;

    fn begin_recording(&mut self, arena: &TestArena) -> RhiResult<()> {
        self.record(Command::BeginRecording { slot: arena.slot })?;
        self.gpu.borrow_mut().recording_slot = Some(arena.slot);
        Ok(())
    }

    fn transition(
        &mut self,
        surface: TestSurface,
        before: SurfaceState,
        after: SurfaceState,
    ) -> RhiResult<()> {
        self.record(Command::Transition {
            surface: surface.0,
            before,
            after,
        })
    }

    fn clear(&mut self, view: TestView, color: [f32; 4]) -> RhiResult<()> {
        self.record(Command::Clear {
            view: view.0,
            color,
        })
    }

    fn bind_render_target(&mut self, view: TestView) -> RhiResult<()> {
        self.record(Command::BindRenderTarget { view: view.0 })
    }

    fn end_recording(&mut self) -> RhiResult<()> {
        self.record(Command::EndRecording)
    }

    fn submit(&mut self) -> RhiResult<()> {
        let mut gpu = self.gpu.borrow_mut();
        gpu.check(Call::Submit)?;
        let slot = gpu.recording_slot.take().ok_or(RhiError::NotRecording)?;

        // Covered by the next signal the scheduler enqueues.
        let covering = gpu.signals_enqueued + 1;
        gpu.slot_required[slot] = covering;
        gpu.submitted_slot = Some(slot);
        gpu.log.push(Command::Submit { slot });
        Ok(())
    }

    fn present(&mut self, sync_interval: u32) -> RhiResult<usize> {
        let mut gpu = self.gpu.borrow_mut();
        gpu.check(Call::Present)?;
        let surface = gpu.current;
        gpu.log.push(Command::Present {
            surface,
            sync_interval,
        });
        gpu.current = (surface + 1) % SURFACE_COUNT;
        Ok(gpu.current)
    }
}

/// Builds a backend and its resources over a GPU lagging by `lag` signals.
pub fn backend_with_lag(lag: usize) -> (TestBackend, FrameResources<TestBackend>, SharedGpu) {
    let gpu = Rc::new(RefCell::new(Gpu::new(lag)));
    let backend = TestBackend { gpu: gpu.clone() };
    let resources = FrameResources {
        surfaces: std::array::from_fn(TestSurface),
        views: std::array::from_fn(TestView),
        arenas: std::array::from_fn(|slot| TestArena {
            slot,
            gpu: gpu.clone(),
        }),
        fence: TestFence { gpu: gpu.clone() },
        initial_index: 0,
    };
    (backend, resources, gpu)
}

/// Scheduler over a GPU that trails the CPU by a full double buffer.
pub fn scheduler() -> (FrameScheduler<TestBackend>, SharedGpu) {
    let (backend, resources, gpu) = backend_with_lag(SURFACE_COUNT);
    let scheduler = FrameScheduler::new(backend, resources, &FrameConfig::default())
        .expect("Failed to create scheduler");
    (scheduler, gpu)
}

/// Event pump that lets `frames` iterations through, then requests a quit.
pub struct QuitAfter {
    remaining: usize,
    pub polls: usize,
}

impl QuitAfter {
    pub fn new(frames: usize) -> Self {
        Self {
            remaining: frames,
            polls: 0,
        }
    }
}

impl EventPump for QuitAfter {
    fn poll_and_dispatch(&mut self) -> bool {
        self.polls += 1;
        if self.remaining == 0 {
            return true;
        }
        self.remaining -= 1;
        false
    }
}
