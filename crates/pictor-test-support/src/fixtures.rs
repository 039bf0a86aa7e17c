//! Sample data and logging helpers shared across suites.

use pictor_core::{ImageFrame, ProgressUpdate};
use tracing_subscriber::EnvFilter;

/// Canonical sample source URL used across suites.
pub const SAMPLE_URL: &str = "https://example.com/image.jpeg";

/// Frame of the given dimensions with a small deterministic payload.
#[must_use]
pub fn frame(width: u32, height: u32) -> ImageFrame {
    ImageFrame {
        width,
        height,
        data: vec![0xAB; 4],
    }
}

/// Progress update without a preview frame.
#[must_use]
pub const fn progress(completed_bytes: u64, total_bytes: u64) -> ProgressUpdate {
    ProgressUpdate {
        completed_bytes,
        total_bytes,
        preview: None,
    }
}

/// Install a compact tracing subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
