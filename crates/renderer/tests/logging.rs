//! The steady-state frame path stays silent under the default log filter.

mod common;

use std::io;
use std::sync::{Arc, Mutex};

use clearframe_core::DEFAULT_LOG_FILTER;
use tracing_subscriber::EnvFilter;

use common::scheduler;

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().expect("log buffer poisoned").clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .expect("log buffer poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_frames_log_nothing_under_default_filter() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(DEFAULT_LOG_FILTER))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let (mut scheduler, _gpu) = scheduler();

    tracing::subscriber::with_default(subscriber, || {
        for _ in 0..100 {
            scheduler.run_frame().expect("Frame failed");
        }
    });

    let lines = captured.lines();
    assert!(
        lines.is_empty(),
        "{} log lines for 100 frames: {:?}",
        lines.len(),
        lines.iter().take(4).collect::<Vec<_>>()
    );
}

#[test]
fn test_default_filter_still_shows_debug_events() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(DEFAULT_LOG_FILTER))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let (mut scheduler, _gpu) = scheduler();

    tracing::subscriber::with_default(subscriber, || {
        scheduler.run_frame().expect("Frame failed");
        scheduler.shutdown().expect("Drain failed");
    });

    let lines = captured.lines();
    assert_eq!(lines.len(), 2, "{:?}", lines);
    assert!(lines.iter().any(|line| line.contains("GPU work drained")));
}
