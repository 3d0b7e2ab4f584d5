//! clearframe - clears a window to a solid color every frame.
//!
//! Brings up a fixed 800x600 window, a Vulkan device and a two-image
//! swapchain, then runs the double-buffered frame loop until the window is
//! closed.

use anyhow::{Context, Result};
use tracing::{error, info};

use clearframe_core::{FrameConfig, Timer};
use clearframe_platform::Platform;
use clearframe_renderer::vulkan::VulkanBackend;
use clearframe_renderer::{FrameScheduler, RendererError, RunSummary};
use clearframe_rhi::RhiError;

fn run() -> Result<RunSummary> {
    let config = FrameConfig::default();
    config
        .validate()
        .context("Invalid frame configuration")?;

    // Declared first so the window outlives the surface created from it
    let mut platform = Platform::new(config.width, config.height, &config.title)
        .context("Failed to create window")?;

    let (backend, resources) =
        VulkanBackend::new(platform.window(), &config).context("Failed to initialize Vulkan")?;
    let mut scheduler = FrameScheduler::new(backend, resources, &config)
        .context("Failed to create frame scheduler")?;

    let timer = Timer::new();
    let summary = scheduler
        .run(&mut platform)
        .context("Frame loop aborted")?;

    info!(
        frames_presented = summary.frames_presented,
        final_signal = summary.final_signal,
        "Average {:.1} frames/s over {:.2}s",
        timer.rate(summary.frames_presented),
        timer.elapsed_secs()
    );

    Ok(summary)
}

/// Finds the device status code anywhere in the error chain.
fn status_code(err: &anyhow::Error) -> Option<i32> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<RendererError>() {
            e.status_code()
        } else if let Some(e) = cause.downcast_ref::<RhiError>() {
            e.status_code()
        } else {
            None
        }
    })
}

fn failure_report(err: &anyhow::Error) -> String {
    match status_code(err) {
        Some(code) => format!(">>> Failure with status {}: {:#}", code, err),
        None => format!(">>> Failure: {:#}", err),
    }
}

fn main() {
    clearframe_core::init_logging();
    info!("Starting clearframe");

    // Failures are reported on stderr; the exit status stays 0.
    match run() {
        Ok(summary) => info!("Shut down cleanly after {} frames", summary.frames_presented),
        Err(err) => {
            error!("{:#}", err);
            eprintln!("{}", failure_report(&err));
        }
    }
}
