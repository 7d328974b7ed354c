//! Shared filesystem helpers for anime-seed unit and integration tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Create a unique, not yet existing directory path under
/// `target/anime-seed-tests`.
#[must_use]
pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let process_id = std::process::id();
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("target")
        .join("anime-seed-tests")
        .join(format!("{prefix}-{process_id}-{counter}"))
}

/// Directory of the bundled CSV fixture datasets.
#[must_use]
pub fn fixture_datasets_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("datasets")
}
