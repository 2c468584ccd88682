//! Progress-callback trait for per-unit batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ConvertConfigBuilder::progress_callback`] (or the split
//! builder) to receive real-time events as the engine works through the
//! batch.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a Tokio broadcast channel, a WebSocket, a database
//! record, or a terminal progress bar — without the library knowing
//! anything about how the host application communicates. The trait is
//! `Send + Sync` so it works correctly when units are processed
//! concurrently.
//!
//! # Example
//!
//! ```rust
//! use mdcorpus::{BatchProgressCallback, ConvertConfig};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_unit_complete(&self, rel_path: &Path, output_bytes: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("[{}] {} done ({} bytes)", done, rel_path.display(), output_bytes);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConvertConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by both batch engines as they work through their units.
///
/// Implementations must be `Send + Sync` (units are processed concurrently
/// when `workers != 1`). All methods have default no-op implementations so
/// callers only override what they care about.
///
/// # Thread safety
///
/// `on_unit_start`, `on_unit_complete`, `on_unit_skipped`, and
/// `on_unit_error` may be called concurrently from different worker
/// futures. Implementations must protect shared mutable state with
/// appropriate synchronisation primitives (e.g. `Mutex`, `AtomicUsize`).
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after planning, before any unit is processed.
    ///
    /// # Arguments
    /// * `total_units` — number of units that will be processed
    fn on_batch_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called just before work begins on a unit.
    ///
    /// # Arguments
    /// * `rel_path` — the unit's path relative to the source root
    fn on_unit_start(&self, rel_path: &Path) {
        let _ = rel_path;
    }

    /// Called when a unit's output has been written.
    ///
    /// # Arguments
    /// * `rel_path`     — the unit's path relative to the source root
    /// * `output_bytes` — total bytes written for the unit
    fn on_unit_complete(&self, rel_path: &Path, output_bytes: usize) {
        let _ = (rel_path, output_bytes);
    }

    /// Called when a unit is skipped because its output is up to date,
    /// or (splitter) because the no-match policy produced no output.
    fn on_unit_skipped(&self, rel_path: &Path) {
        let _ = rel_path;
    }

    /// Called when a unit fails. The batch continues with the next unit.
    ///
    /// # Arguments
    /// * `rel_path` — the unit's path relative to the source root
    /// * `error`    — human-readable error description
    fn on_unit_error(&self, rel_path: &Path, error: String) {
        let _ = (rel_path, error);
    }

    /// Called once after every unit has been attempted.
    ///
    /// # Arguments
    /// * `total_units` — units in the batch
    /// * `succeeded`   — units that produced output (skips not counted)
    fn on_batch_complete(&self, total_units: usize, succeeded: usize) {
        let _ = (total_units, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in the engine configs.
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
